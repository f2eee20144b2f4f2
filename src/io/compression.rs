// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Transparent compression and network-path handling shared by every file
//! reader and writer in the crate.
//!
//! Files ending in `.gz` or `.zst` are wrapped in exactly one decompression
//! layer around exactly one handle. Paths under `/eos` live on network
//! storage and are reached through a configurable URL (or mount) prefix;
//! such handles are treated as streams, so they cannot seek.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;

/// Resolve `/eos` paths through the configured prefix.
pub(crate) fn resolve_path(path: &Path, url_prefix: &str) -> (PathBuf, bool) {
    let is_network = path.starts_with("/eos");
    if is_network && !url_prefix.is_empty() {
        let joined = format!("{}{}", url_prefix, path.display());
        info!("Opening network path {joined}");
        (PathBuf::from(joined), true)
    } else {
        (path.to_path_buf(), is_network)
    }
}

/// Open a (possibly compressed, possibly network) file for reading. The
/// boolean is true for stream handles that cannot be reopened for seeking.
pub(crate) fn open_input(
    path: &Path,
    url_prefix: &str,
) -> io::Result<(Box<dyn Read + Send>, bool)> {
    let (resolved, is_stream) = resolve_path(path, url_prefix);
    let file = BufReader::new(File::open(resolved)?);
    let reader: Box<dyn Read + Send> = match extension(path) {
        Some("gz") => Box::new(flate2::read::GzDecoder::new(file)),
        Some("zst") => Box::new(zstd::stream::read::Decoder::new(file)?),
        _ => Box::new(file),
    };
    Ok((reader, is_stream))
}

/// A writable handle whose compression layer must be finished explicitly so
/// close-time errors surface instead of disappearing in `Drop`.
pub(crate) enum OutputStream {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
}

impl OutputStream {
    pub(crate) fn create(path: &Path, url_prefix: &str) -> io::Result<OutputStream> {
        let (resolved, _) = resolve_path(path, url_prefix);
        let file = BufWriter::new(File::create(resolved)?);
        Ok(match extension(path) {
            Some("gz") => OutputStream::Gzip(GzEncoder::new(file, Compression::default())),
            Some("zst") => OutputStream::Zstd(zstd::stream::write::Encoder::new(file, 0)?),
            _ => OutputStream::Plain(file),
        })
    }

    pub(crate) fn finish(self) -> io::Result<()> {
        match self {
            OutputStream::Plain(mut w) => w.flush(),
            OutputStream::Gzip(w) => w.finish()?.flush(),
            OutputStream::Zstd(w) => w.finish()?.flush(),
        }
    }
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::Plain(w) => w.write(buf),
            OutputStream::Gzip(w) => w.write(buf),
            OutputStream::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::Plain(w) => w.flush(),
            OutputStream::Gzip(w) => w.flush(),
            OutputStream::Zstd(w) => w.flush(),
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_every_compression() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["plain.bin", "packed.bin.gz", "packed.bin.zst"] {
            let path = dir.path().join(name);
            let mut out = OutputStream::create(&path, "").unwrap();
            out.write_all(b"lact payload").unwrap();
            out.finish().unwrap();

            let (mut input, is_stream) = open_input(&path, "").unwrap();
            let mut buf = Vec::new();
            input.read_to_end(&mut buf).unwrap();
            assert_eq!(buf, b"lact payload");
            assert!(!is_stream);
        }
    }

    #[test]
    fn eos_paths_use_the_prefix() {
        let (resolved, is_stream) = resolve_path(Path::new("/eos/lact/run1.dat"), "/mnt/xrootd");
        assert_eq!(resolved, PathBuf::from("/mnt/xrootd/eos/lact/run1.dat"));
        assert!(is_stream);
    }
}
