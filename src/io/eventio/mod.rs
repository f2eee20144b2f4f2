// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The block transport of the simulation event stream.
//!
//! The stream is a sequence of self-describing blocks. Each starts with a
//! 16-byte header: the 4-byte synchronization tag `D4 1F 8A 37` (reversed
//! for the opposite byte order), then type, identifier and payload length in
//! the detected byte order. Arbitrary junk between blocks is tolerated by
//! walking forward byte by byte until the tag reappears; the number of
//! skipped bytes is counted and reported.

mod blocks;
mod error;

pub use blocks::*;
pub use error::EventioError;

use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use log::warn;

use super::compression::open_input;

/// The block synchronization tag, most significant byte first.
pub const SYNC_TAG: [u8; 4] = [0xD4, 0x1F, 0x8A, 0x37];

/// A decoded 16-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub block_type: u32,
    /// Block identifier; per-telescope blocks carry the telescope id here.
    pub ident: i32,
    /// Payload length in bytes.
    pub length: u32,
    /// True when the sync tag arrived byte-reversed.
    pub reversed: bool,
}

/// A forward-only reader over the blocks of one (possibly compressed)
/// stream.
pub struct BlockStream {
    reader: Box<dyn Read + Send>,
    /// Bytes skipped while searching for the most recent sync tag.
    skipped_last: u64,
    skipped_total: u64,
}

impl BlockStream {
    /// Open a stream; `/eos` paths go through the URL prefix. The boolean is
    /// true for stream-only handles (no random access).
    pub fn open(path: &Path, url_prefix: &str) -> Result<(BlockStream, bool), EventioError> {
        let (reader, is_stream) =
            open_input(path, url_prefix).map_err(|err| EventioError::FileOpen {
                path: path.display().to_string(),
                err,
            })?;
        Ok((
            BlockStream {
                reader,
                skipped_last: 0,
                skipped_total: 0,
            },
            is_stream,
        ))
    }

    /// Wrap an already-open reader (used by tests and by in-memory tools).
    pub fn from_reader(reader: Box<dyn Read + Send>) -> BlockStream {
        BlockStream {
            reader,
            skipped_last: 0,
            skipped_total: 0,
        }
    }

    /// Bytes skipped hunting for the last sync tag.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_last
    }

    /// Bytes skipped over the lifetime of the stream.
    pub fn total_skipped_bytes(&self) -> u64 {
        self.skipped_total
    }

    /// The next block, or `Ok(None)` at a clean end of stream. A stream
    /// that ends inside a header or payload is corrupt.
    pub fn next_block(&mut self) -> Result<Option<(BlockHeader, Vec<u8>)>, EventioError> {
        let reversed = match self.find_sync()? {
            Some(reversed) => reversed,
            None => return Ok(None),
        };

        let mut rest = [0u8; 12];
        self.reader
            .read_exact(&mut rest)
            .map_err(|_| EventioError::CorruptBlock {
                what: "block header truncated",
            })?;
        let (block_type, ident, length) = if reversed {
            (
                BigEndian::read_u32(&rest[0..4]),
                BigEndian::read_i32(&rest[4..8]),
                BigEndian::read_u32(&rest[8..12]),
            )
        } else {
            (
                LittleEndian::read_u32(&rest[0..4]),
                LittleEndian::read_i32(&rest[4..8]),
                LittleEndian::read_u32(&rest[8..12]),
            )
        };

        let mut payload = vec![0u8; length as usize];
        self.reader
            .read_exact(&mut payload)
            .map_err(|_| EventioError::CorruptBlock {
                what: "block payload truncated",
            })?;
        Ok(Some((
            BlockHeader {
                block_type,
                ident,
                length,
                reversed,
            },
            payload,
        )))
    }

    /// Byte-walk to the next sync tag. Returns the byte order, or `None` at
    /// end of stream. Counts skipped bytes the way the reference stream
    /// walker does: matching from either end of the tag, restarting on a
    /// mismatch.
    fn find_sync(&mut self) -> Result<Option<bool>, EventioError> {
        let mut skipped: i64 = -4;
        let mut matched = 0usize;
        // 0 undecided, 1 forward, -1 reversed.
        let mut order = 0i8;
        loop {
            let mut byte = [0u8; 1];
            match self.reader.read_exact(&mut byte) {
                Ok(()) => {}
                // No more sync tags: a normal end of stream, even when the
                // trailing bytes looked like the start of a tag.
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(err) => return Err(EventioError::Io(err)),
            }
            skipped += 1;

            let b = byte[0];
            if order == 0 {
                if b == SYNC_TAG[0] {
                    order = 1;
                    matched = 1;
                } else if b == SYNC_TAG[3] {
                    order = -1;
                    matched = 1;
                }
                continue;
            }
            let expected = if order == 1 {
                SYNC_TAG[matched]
            } else {
                SYNC_TAG[3 - matched]
            };
            if b == expected {
                matched += 1;
                if matched == 4 {
                    let skipped = skipped.max(0) as u64;
                    if skipped > 0 {
                        warn!("Skipped {skipped} bytes before the next sync tag");
                    }
                    self.skipped_last = skipped;
                    self.skipped_total += skipped;
                    return Ok(Some(order < 0));
                }
            } else {
                // Restart the match, reconsidering this byte as a first.
                order = 0;
                matched = 0;
                if b == SYNC_TAG[0] {
                    order = 1;
                    matched = 1;
                } else if b == SYNC_TAG[3] {
                    order = -1;
                    matched = 1;
                }
            }
        }
    }
}

/// Writes blocks in the forward byte order. Used by the stream synthesis
/// tools and the test suite.
pub struct BlockWriter<W: Write> {
    writer: W,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(writer: W) -> BlockWriter<W> {
        BlockWriter { writer }
    }

    pub fn write_block(
        &mut self,
        block_type: u32,
        ident: i32,
        payload: &[u8],
    ) -> Result<(), EventioError> {
        self.writer.write_all(&SYNC_TAG)?;
        self.writer.write_u32::<LittleEndian>(block_type)?;
        self.writer.write_i32::<LittleEndian>(ident)?;
        self.writer.write_u32::<LittleEndian>(payload.len() as u32)?;
        self.writer.write_all(payload)?;
        Ok(())
    }

    /// Raw bytes between blocks; the reader must resynchronize over them.
    pub fn write_junk(&mut self, junk: &[u8]) -> Result<(), EventioError> {
        self.writer.write_all(junk)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_over(bytes: Vec<u8>) -> BlockStream {
        BlockStream::from_reader(Box::new(std::io::Cursor::new(bytes)))
    }

    #[test]
    fn block_round_trip() {
        let mut writer = BlockWriter::new(Vec::new());
        writer.write_block(2000, -1, &[1, 2, 3]).unwrap();
        writer.write_block(2010, 42, &[]).unwrap();
        let mut stream = stream_over(writer.into_inner());

        let (header, payload) = stream.next_block().unwrap().unwrap();
        assert_eq!(header.block_type, 2000);
        assert_eq!(header.ident, -1);
        assert_eq!(payload, vec![1, 2, 3]);

        let (header, payload) = stream.next_block().unwrap().unwrap();
        assert_eq!(header.block_type, 2010);
        assert_eq!(header.ident, 42);
        assert!(payload.is_empty());

        assert!(stream.next_block().unwrap().is_none());
        assert_eq!(stream.total_skipped_bytes(), 0);
    }

    #[test]
    fn resynchronizes_over_junk() {
        let mut writer = BlockWriter::new(Vec::new());
        writer.write_junk(&[0xAB; 17]).unwrap();
        writer.write_block(2020, 0, &[9, 9]).unwrap();
        writer.write_junk(&[0xD4, 0x00]).unwrap();
        writer.write_block(2021, 0, &[8]).unwrap();
        let mut stream = stream_over(writer.into_inner());

        let (header, _) = stream.next_block().unwrap().unwrap();
        assert_eq!(header.block_type, 2020);
        assert_eq!(stream.skipped_bytes(), 17);

        // A stray first sync byte restarts the match without losing the
        // following block.
        let (header, _) = stream.next_block().unwrap().unwrap();
        assert_eq!(header.block_type, 2021);
        assert_eq!(stream.skipped_bytes(), 2);
        assert_eq!(stream.total_skipped_bytes(), 19);
    }

    #[test]
    fn reversed_byte_order_header() {
        let mut bytes = Vec::new();
        let mut tag = SYNC_TAG;
        tag.reverse();
        bytes.extend_from_slice(&tag);
        bytes.write_u32::<BigEndian>(2000).unwrap();
        bytes.write_i32::<BigEndian>(7).unwrap();
        bytes.write_u32::<BigEndian>(2).unwrap();
        bytes.extend_from_slice(&[5, 6]);
        let mut stream = stream_over(bytes);

        let (header, payload) = stream.next_block().unwrap().unwrap();
        assert!(header.reversed);
        assert_eq!(header.block_type, 2000);
        assert_eq!(header.ident, 7);
        assert_eq!(payload, vec![5, 6]);
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let mut writer = BlockWriter::new(Vec::new());
        writer.write_block(2000, 0, &[1, 2, 3, 4]).unwrap();
        let mut bytes = writer.into_inner();
        bytes.truncate(bytes.len() - 2);
        let mut stream = stream_over(bytes);
        assert!(matches!(
            stream.next_block(),
            Err(EventioError::CorruptBlock { .. })
        ));
    }

    #[test]
    fn clean_end_of_stream() {
        let mut stream = stream_over(Vec::new());
        assert!(stream.next_block().unwrap().is_none());
        // Trailing junk without a tag is a clean end too.
        let mut stream = stream_over(vec![1, 2, 3]);
        assert!(stream.next_block().unwrap().is_none());
    }
}
