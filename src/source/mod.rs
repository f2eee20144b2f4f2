// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The streaming event source over the simulation block format.
//!
//! On open, header blocks are read until the static configuration is
//! complete: the subarray (geometry and readout per telescope), the
//! atmosphere model, the simulation configuration and the metadata. After
//! that the source is a lazy, single-pass sequence of [`ArrayEvent`]s.
//!
//! A shower block overwrites the single current-shower slot; subsequent
//! events inherit that shower until the next shower block arrives. This
//! mirrors the upstream producer, which interleaves shower and event
//! blocks.

mod error;

pub use error::SourceError;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use ndarray::prelude::*;
use serde::Deserialize;

use crate::atmosphere::TableAtmosphereModel;
use crate::calib::r0_to_r1;
use crate::camera::{CameraDescription, CameraGeometry, CameraReadout};
use crate::constants::DEFAULT_GAIN_SELECTION_THRESHOLD;
use crate::event::{
    ArrayEvent, EventMonitor, Pointing, R0Camera, R0Event, R1Event, SimulatedCamera,
    SimulatedEvent, SimulatedShower, TelMonitor, TelescopePointing,
};
use crate::io::eventio::{
    Block, BlockHeader, BlockStream, CameraSettingsBlock, EventBlock, McRunHeaderBlock,
    McShowerBlock, PixelSettingsBlock, BLOCK_CAMERA_ORGANISATION, BLOCK_CAMERA_SETTINGS,
    BLOCK_CAMERA_SOFTWARE_SETTINGS, BLOCK_EVENT, BLOCK_LASER_CALIBRATION, BLOCK_MC_EVENT,
    BLOCK_MC_SHOWER, BLOCK_PIXEL_DISABLED, BLOCK_PIXEL_MONITOR, BLOCK_PIXEL_SETTINGS,
    BLOCK_POINTING_CORRECTIONS, BLOCK_TRACKING_SETTINGS, BLOCK_TELESCOPE_MONITOR,
    BLOCK_TRUE_IMAGE,
};
use crate::simconfig::SimulationConfig;
use crate::subarray::{OpticsDescription, SubarrayDescription, TelId, TelescopeDescription};

/// Options for opening an event source. Deserializable so a pipeline
/// configuration can carry a `SimtelEventSource` section.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Maximum number of events to emit; -1 for unlimited.
    pub max_events: i64,
    /// Telescope filter; empty selects the whole array.
    pub allowed_tels: Vec<TelId>,
    /// Pre-scan the file and collect every simulated shower up front.
    pub load_all_showers: bool,
    /// URL (or mount) prefix for `/eos` network paths.
    pub url_prefix: String,
    /// High-gain saturation threshold for the gain selection \[ADC\].
    pub gain_selection_threshold: f64,
}

impl Default for SourceOptions {
    fn default() -> SourceOptions {
        SourceOptions {
            max_events: -1,
            allowed_tels: Vec::new(),
            load_all_showers: false,
            url_prefix: String::new(),
            gain_selection_threshold: DEFAULT_GAIN_SELECTION_THRESHOLD,
        }
    }
}

#[derive(Default)]
struct TelConfigBuilder {
    camera: Option<CameraSettingsBlock>,
    pixels: Option<PixelSettingsBlock>,
}

/// A streaming event source over one (possibly compressed) block file.
/// Single pass: the iterator is not restartable, but local files support
/// random access through [`SimtelEventSource::seek_event`].
pub struct SimtelEventSource {
    filename: PathBuf,
    options: SourceOptions,
    stream: BlockStream,
    is_stream: bool,

    subarray: Arc<SubarrayDescription>,
    atmosphere: Option<TableAtmosphereModel>,
    simulation_config: Option<SimulationConfig>,
    global_metadata: BTreeMap<String, String>,
    tel_metadata: BTreeMap<TelId, BTreeMap<String, String>>,
    history: Vec<(i64, String)>,
    run_id: i32,

    tel_builders: BTreeMap<TelId, TelConfigBuilder>,
    run_header_tels: Vec<(TelId, [f64; 3])>,
    reference_position: [f64; 3],

    current_shower: Option<SimulatedShower>,
    current_core: Option<(f64, f64)>,
    shower_array: Vec<SimulatedShower>,
    showers_preloaded: bool,
    monitors: BTreeMap<TelId, TelMonitor>,
    pending_true_images: BTreeMap<TelId, SimulatedCamera>,

    lookahead: Option<(BlockHeader, Vec<u8>)>,
    emitted: u64,
    finished: bool,
}

impl SimtelEventSource {
    pub fn new<P: AsRef<Path>>(
        path: P,
        options: SourceOptions,
    ) -> Result<SimtelEventSource, SourceError> {
        let filename = path.as_ref().to_path_buf();
        let (stream, is_stream) = BlockStream::open(&filename, &options.url_prefix)?;
        let mut source = SimtelEventSource {
            filename,
            options,
            stream,
            is_stream,
            subarray: Arc::new(SubarrayDescription::default()),
            atmosphere: None,
            simulation_config: None,
            global_metadata: BTreeMap::new(),
            tel_metadata: BTreeMap::new(),
            history: Vec::new(),
            run_id: -1,
            tel_builders: BTreeMap::new(),
            run_header_tels: Vec::new(),
            reference_position: [0.0; 3],
            current_shower: None,
            current_core: None,
            shower_array: Vec::new(),
            showers_preloaded: false,
            monitors: BTreeMap::new(),
            pending_true_images: BTreeMap::new(),
            lookahead: None,
            emitted: 0,
            finished: false,
        };
        source.read_static_configuration()?;
        if source.options.load_all_showers {
            source.preload_showers()?;
        }
        Ok(source)
    }

    /// The subarray described by the stream header, restricted to the
    /// telescope filter.
    pub fn subarray(&self) -> Arc<SubarrayDescription> {
        Arc::clone(&self.subarray)
    }

    pub fn atmosphere(&self) -> Option<&TableAtmosphereModel> {
        self.atmosphere.as_ref()
    }

    pub fn simulation_config(&self) -> Option<&SimulationConfig> {
        self.simulation_config.as_ref()
    }

    pub fn global_metadata(&self) -> &BTreeMap<String, String> {
        &self.global_metadata
    }

    pub fn tel_metadata(&self) -> &BTreeMap<TelId, BTreeMap<String, String>> {
        &self.tel_metadata
    }

    pub fn history(&self) -> &[(i64, String)] {
        &self.history
    }

    pub fn run_id(&self) -> i32 {
        self.run_id
    }

    /// Every simulated shower decoded so far (or, with `load_all_showers`,
    /// every shower in the file).
    pub fn shower_array(&self) -> &[SimulatedShower] {
        &self.shower_array
    }

    /// Bytes skipped by sync recovery since the stream was opened.
    pub fn skipped_bytes(&self) -> u64 {
        self.stream.total_skipped_bytes()
    }

    /// Whether this source reads from a network stream (no random access).
    pub fn is_stream(&self) -> bool {
        self.is_stream
    }

    /// Random access: close and reopen the file, then fast-forward to the
    /// requested event index. Stream sources cannot do this.
    pub fn seek_event(&mut self, index: usize) -> Result<ArrayEvent, SourceError> {
        if self.is_stream {
            return Err(SourceError::UnsupportedFeature {
                what: "random access",
            });
        }
        let mut reopened = SimtelEventSource::new(&self.filename, self.options.clone())?;
        let mut remaining = index;
        loop {
            match reopened.next_event()? {
                Some(event) => {
                    if remaining == 0 {
                        *self = reopened;
                        return Ok(event);
                    }
                    remaining -= 1;
                }
                None => {
                    return Err(SourceError::IndexOutOfRange {
                        index,
                        available: index - remaining,
                    })
                }
            }
        }
    }

    /// Read header blocks until the first shower or event block, building
    /// the static configuration; that block is kept for the iteration.
    fn read_static_configuration(&mut self) -> Result<(), SourceError> {
        loop {
            let (header, payload) = match self.stream.next_block()? {
                Some(block) => block,
                None => break,
            };
            if matches!(
                header.block_type,
                BLOCK_MC_SHOWER | BLOCK_MC_EVENT | BLOCK_EVENT
            ) {
                self.lookahead = Some((header, payload));
                break;
            }
            self.handle_block(&header, &payload)?;
        }
        self.finalize_subarray();
        Ok(())
    }

    /// Scan the whole file with a second handle and collect every shower.
    fn preload_showers(&mut self) -> Result<(), SourceError> {
        let (mut scan, _) = BlockStream::open(&self.filename, &self.options.url_prefix)?;
        while let Some((header, payload)) = scan.next_block()? {
            if header.block_type != BLOCK_MC_SHOWER {
                continue;
            }
            if let Some(Block::McShower(shower)) = Block::decode(&header, &payload)? {
                self.shower_array.push(convert_shower(&shower));
            }
        }
        self.showers_preloaded = true;
        debug!("Preloaded {} simulated showers", self.shower_array.len());
        Ok(())
    }

    fn tel_allowed(&self, tel_id: TelId) -> bool {
        self.options.allowed_tels.is_empty() || self.options.allowed_tels.contains(&tel_id)
    }

    fn finalize_subarray(&mut self) {
        let mut subarray = SubarrayDescription {
            reference_position: self.reference_position,
            ..Default::default()
        };
        for &(tel_id, position) in &self.run_header_tels {
            if !self.tel_allowed(tel_id) {
                continue;
            }
            let builder = match self.tel_builders.get(&tel_id) {
                Some(builder) => builder,
                None => {
                    warn!("Telescope {tel_id} has no configuration blocks; skipping it");
                    continue;
                }
            };
            let (camera, pixels) = match (&builder.camera, &builder.pixels) {
                (Some(camera), Some(pixels)) => (camera, pixels),
                _ => {
                    warn!("Telescope {tel_id} has incomplete configuration; skipping it");
                    continue;
                }
            };
            let geometry = match CameraGeometry::new(
                camera.camera_name.clone(),
                Array1::from_vec(camera.pix_x.clone()),
                Array1::from_vec(camera.pix_y.clone()),
                Array1::from_vec(camera.pix_area.clone()),
                Array1::from_vec(camera.pix_type.clone()),
                camera.cam_rotation,
                false,
            ) {
                Ok(geometry) => geometry,
                Err(err) => {
                    warn!("Telescope {tel_id} camera geometry rejected: {err}");
                    continue;
                }
            };
            let n_ref = pixels.n_ref_samples as usize;
            let n_channels = (pixels.n_channels as usize).max(1);
            let shape = Array2::from_shape_vec(
                (n_channels, n_ref),
                pixels.reference_pulse_shape.clone(),
            )
            .unwrap_or_else(|_| Array2::zeros((n_channels, 0)));
            let readout = CameraReadout {
                camera_name: camera.camera_name.clone(),
                sampling_rate: pixels.sampling_rate_ghz,
                reference_pulse_shape: shape,
                reference_pulse_sample_width: pixels.reference_pulse_sample_width_ns,
                n_channels,
                n_pixels: pixels.n_pixels as usize,
                n_samples: pixels.n_samples as usize,
            };
            let optics = OpticsDescription {
                optics_name: camera.camera_name.clone(),
                num_mirrors: camera.num_mirrors,
                mirror_area: camera.mirror_area,
                equivalent_focal_length: camera.equivalent_focal_length,
                effective_focal_length: camera.effective_focal_length,
            };
            subarray.tels.insert(
                tel_id,
                TelescopeDescription::new(CameraDescription { geometry, readout }, optics),
            );
            subarray.tel_positions.insert(tel_id, position);
        }
        debug!("Subarray ready with {} telescopes", subarray.n_tels());
        self.subarray = Arc::new(subarray);
    }

    /// Dispatch one block to its handler. Per-telescope blocks outside the
    /// subarray filter are skipped before decoding.
    fn handle_block(&mut self, header: &BlockHeader, payload: &[u8]) -> Result<(), SourceError> {
        if is_per_telescope(header.block_type) && !self.tel_allowed(header.ident) {
            debug!(
                "Skipping block type {} for filtered telescope {}",
                header.block_type, header.ident
            );
            return Ok(());
        }
        let block = match Block::decode(header, payload)? {
            Some(block) => block,
            None => {
                warn!("No handler for block type {}; skipping", header.block_type);
                return Ok(());
            }
        };
        match block {
            Block::History(history) => self.history.extend(history.entries),
            Block::MetaParam(meta) => {
                if header.ident < 0 {
                    self.global_metadata.extend(meta.entries);
                } else {
                    self.tel_metadata
                        .entry(header.ident)
                        .or_default()
                        .extend(meta.entries);
                }
            }
            Block::RunHeader(run) => {
                self.run_id = run.run_id;
                self.reference_position = run.reference_position;
                self.run_header_tels = run
                    .tel_ids
                    .iter()
                    .copied()
                    .zip(run.tel_positions.iter().copied())
                    .collect();
                for &tel_id in &run.tel_ids {
                    self.tel_builders.entry(tel_id).or_default();
                }
            }
            Block::McRunHeader(mc) => self.simulation_config = Some(convert_mc_run_header(&mc)),
            Block::Atmosphere(atm) => {
                self.atmosphere = Some(TableAtmosphereModel {
                    name: atm.name,
                    alt_km: Array1::from_vec(atm.alt_km),
                    rho: Array1::from_vec(atm.rho),
                    thick: Array1::from_vec(atm.thick),
                    refidx_m1: Array1::from_vec(atm.refidx_m1),
                });
            }
            Block::CameraSettings(camera) => {
                self.tel_builders.entry(header.ident).or_default().camera = Some(camera);
            }
            Block::PixelSettings(pixels) => {
                self.tel_builders.entry(header.ident).or_default().pixels = Some(pixels);
            }
            // Wiring, disabled-pixel and correction blocks are decoded for
            // validation but carry nothing the pipeline consumes.
            Block::CameraOrganisation(_)
            | Block::PixelDisabled(_)
            | Block::CameraSoftwareSettings(_)
            | Block::PointingCorrections(_)
            | Block::TrackingSettings(_)
            | Block::LaserCalibration(_)
            | Block::PixelMonitor(_)
            | Block::McPeSum(_) => {
                debug!("Block type {} noted for telescope {}", header.block_type, header.ident);
            }
            Block::McShower(shower) => {
                let shower = convert_shower(&shower);
                if !self.showers_preloaded {
                    self.shower_array.push(shower);
                }
                // Deliberately a single slot: each shower block replaces
                // the previous one and subsequent events inherit it.
                self.current_shower = Some(shower);
                self.current_core = None;
            }
            Block::McEvent(mc_event) => {
                self.current_core = Some((mc_event.core_x, mc_event.core_y));
            }
            Block::TelescopeMonitor(monitor) => {
                let n_pixels = monitor.n_pixels as usize;
                if monitor.pedestal_high.len() != n_pixels
                    || monitor.pedestal_low.len() != n_pixels
                    || monitor.dc_to_pe_high.len() != n_pixels
                    || monitor.dc_to_pe_low.len() != n_pixels
                {
                    warn!(
                        "Monitor block for telescope {} has inconsistent pixel counts; ignoring it",
                        header.ident
                    );
                    return Ok(());
                }
                self.monitors.insert(
                    header.ident,
                    TelMonitor {
                        n_channels: monitor.n_channels as usize,
                        n_pixels,
                        pedestal_per_sample: [
                            Array1::from_vec(monitor.pedestal_high),
                            Array1::from_vec(monitor.pedestal_low),
                        ],
                        dc_to_pe: [
                            Array1::from_vec(monitor.dc_to_pe_high),
                            Array1::from_vec(monitor.dc_to_pe_low),
                        ],
                    },
                );
            }
            Block::TrueImage(image) => {
                let true_image = Array1::from_vec(image.pe_count);
                let true_image_sum = true_image.sum();
                self.pending_true_images.insert(
                    header.ident,
                    SimulatedCamera {
                        true_image,
                        true_image_sum,
                        impact_parameter: image.impact_parameter,
                    },
                );
            }
            Block::Event(event) => {
                // Handled by the iteration loop; reaching this arm means a
                // caller fed us an event block out of band.
                debug!("Unexpected event block {} in handler", event.event_id);
            }
        }
        Ok(())
    }

    /// Advance to the next array event, or `None` at the end of the stream
    /// or once `max_events` is reached.
    pub fn next_event(&mut self) -> Result<Option<ArrayEvent>, SourceError> {
        if self.finished {
            return Ok(None);
        }
        if self.options.max_events >= 0 && self.emitted >= self.options.max_events as u64 {
            self.finished = true;
            return Ok(None);
        }
        loop {
            let (header, payload) = match self.lookahead.take() {
                Some(block) => block,
                None => match self.stream.next_block()? {
                    Some(block) => block,
                    None => {
                        self.finished = true;
                        return Ok(None);
                    }
                },
            };
            if header.block_type == BLOCK_EVENT {
                if let Some(Block::Event(event)) = Block::decode(&header, &payload)? {
                    let event = self.assemble_event(event);
                    self.emitted += 1;
                    return Ok(Some(event));
                }
            } else {
                self.handle_block(&header, &payload)?;
            }
        }
    }

    fn assemble_event(&mut self, block: EventBlock) -> ArrayEvent {
        let mut r0 = R0Event::new();
        let mut r1 = R1Event::new();
        let mut monitor = EventMonitor::new();
        let mut pointing = Pointing {
            array_azimuth: block.array_azimuth,
            array_altitude: block.array_altitude,
            tels: BTreeMap::new(),
        };

        for tel in block.telescopes {
            if !self.tel_allowed(tel.tel_id) {
                continue;
            }
            let n_pixels = tel.n_pixels as usize;
            let n_samples = tel.n_samples as usize;
            let high = waveform_array(tel.waveform_high, n_pixels, n_samples);
            let low = waveform_array(tel.waveform_low, n_pixels, n_samples);
            let waveform_sum = tel.waveform_sum.map(|(high_sum, low_sum)| {
                [Array1::from_vec(high_sum), Array1::from_vec(low_sum)]
            });
            let r0_camera = R0Camera {
                waveform: [high, low],
                waveform_sum,
            };
            let tel_monitor = self
                .monitors
                .get(&tel.tel_id)
                .filter(|m| m.n_pixels == n_pixels)
                .cloned()
                .unwrap_or_else(|| TelMonitor::unit(n_pixels));
            let r1_camera = r0_to_r1(
                &r0_camera,
                &tel_monitor,
                self.options.gain_selection_threshold,
            );
            pointing.tels.insert(
                tel.tel_id,
                TelescopePointing {
                    azimuth: tel.azimuth,
                    altitude: tel.altitude,
                },
            );
            monitor.add_tel(tel.tel_id, tel_monitor);
            r0.add_tel(tel.tel_id, r0_camera);
            r1.add_tel(tel.tel_id, r1_camera);
        }

        let true_images = std::mem::take(&mut self.pending_true_images);
        let simulation = self.current_shower.map(|mut shower| {
            if let Some((core_x, core_y)) = self.current_core {
                shower.core_x = core_x;
                shower.core_y = core_y;
            }
            SimulatedEvent {
                shower,
                tels: true_images
                    .into_iter()
                    .filter(|(tel_id, _)| self.tel_allowed(*tel_id))
                    .collect(),
            }
        });

        ArrayEvent {
            event_id: block.event_id,
            run_id: if block.run_id >= 0 {
                block.run_id
            } else {
                self.run_id
            },
            simulation,
            r0: Some(r0),
            r1: Some(r1),
            dl0: None,
            dl1: None,
            dl2: None,
            monitor: Some(monitor),
            pointing: Some(pointing),
        }
    }
}

impl Iterator for SimtelEventSource {
    type Item = Result<ArrayEvent, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

fn is_per_telescope(block_type: u32) -> bool {
    matches!(
        block_type,
        BLOCK_CAMERA_SETTINGS
            | BLOCK_CAMERA_ORGANISATION
            | BLOCK_PIXEL_SETTINGS
            | BLOCK_PIXEL_DISABLED
            | BLOCK_CAMERA_SOFTWARE_SETTINGS
            | BLOCK_POINTING_CORRECTIONS
            | BLOCK_TRACKING_SETTINGS
            | BLOCK_TELESCOPE_MONITOR
            | BLOCK_LASER_CALIBRATION
            | BLOCK_PIXEL_MONITOR
            | BLOCK_TRUE_IMAGE
    )
}

fn waveform_array(flat: Vec<u16>, n_pixels: usize, n_samples: usize) -> Array2<u16> {
    if flat.len() == n_pixels * n_samples {
        Array2::from_shape_vec((n_pixels, n_samples), flat)
            .unwrap_or_else(|_| Array2::zeros((n_pixels, n_samples)))
    } else {
        Array2::zeros((n_pixels, n_samples))
    }
}

fn convert_shower(block: &McShowerBlock) -> SimulatedShower {
    SimulatedShower {
        energy: block.energy,
        alt: block.alt,
        az: block.az,
        core_x: block.core_x,
        core_y: block.core_y,
        h_first_int: block.h_first_int,
        x_max: block.x_max,
        h_max: block.h_max,
        starting_grammage: block.starting_grammage,
        shower_primary_id: block.primary_id,
    }
}

fn convert_mc_run_header(block: &McRunHeaderBlock) -> SimulationConfig {
    SimulationConfig {
        run_number: block.run_number,
        corsika_version: block.corsika_version,
        simtel_version: block.simtel_version,
        energy_range_min: block.energy_range_min,
        energy_range_max: block.energy_range_max,
        spectral_index: block.spectral_index,
        obs_level: block.obs_level,
        core_pos_mode: block.core_pos_mode,
        core_range_x: block.core_range_x,
        core_range_y: block.core_range_y,
        viewcone_min: block.viewcone_min,
        viewcone_max: block.viewcone_max,
        n_showers: block.n_showers,
        shower_reuse: block.shower_reuse,
        primary_id: block.primary_id,
        injection_height: block.injection_height,
        atmosphere_id: block.atmosphere_id,
    }
}

#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
mod tests {
    use super::testutil::{write_test_stream, StreamSpec};
    use super::*;

    fn write_stream_file(path: &Path, spec: &StreamSpec) {
        let bytes = write_test_stream(spec);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn reads_static_configuration_and_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat");
        write_stream_file(&path, &StreamSpec::new(3));

        let mut source = SimtelEventSource::new(&path, SourceOptions::default()).unwrap();
        let subarray = source.subarray();
        assert_eq!(subarray.n_tels(), 2);
        assert!(source.atmosphere().is_some());
        assert!(source.simulation_config().is_some());
        assert_eq!(source.run_id(), 900);

        let mut event_ids = Vec::new();
        while let Some(event) = source.next_event().unwrap() {
            assert!(event.r0.is_some());
            assert!(event.r1.is_some());
            assert!(event.pointing.is_some());
            assert!(event.simulation.is_some());
            event_ids.push(event.event_id);
        }
        assert_eq!(event_ids, vec![0, 1, 2]);
        assert_eq!(source.shower_array().len(), 3);
    }

    #[test]
    fn max_events_limits_the_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat");
        write_stream_file(&path, &StreamSpec::new(5));

        let options = SourceOptions {
            max_events: 2,
            ..Default::default()
        };
        let source = SimtelEventSource::new(&path, options).unwrap();
        let events: Vec<_> = source.map(Result::unwrap).collect();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn subarray_filter_drops_telescopes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat");
        write_stream_file(&path, &StreamSpec::new(2));

        let options = SourceOptions {
            allowed_tels: vec![2],
            ..Default::default()
        };
        let mut source = SimtelEventSource::new(&path, options).unwrap();
        assert_eq!(source.subarray().tel_ids(), vec![2]);
        let event = source.next_event().unwrap().unwrap();
        assert_eq!(event.r0.as_ref().unwrap().tel_ids(), vec![2]);
        assert_eq!(event.r1.as_ref().unwrap().tel_ids(), vec![2]);
    }

    #[test]
    fn events_inherit_the_current_shower() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat");
        write_stream_file(&path, &StreamSpec::new(3));

        let source = SimtelEventSource::new(&path, SourceOptions::default()).unwrap();
        for (index, event) in source.enumerate() {
            let event = event.unwrap();
            let shower = event.simulation.as_ref().unwrap().shower;
            // The test stream gives shower k the energy k + 1 TeV.
            assert!((shower.energy - (index as f64 + 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn random_access_reopens_and_fast_forwards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat");
        write_stream_file(&path, &StreamSpec::new(4));

        let mut source = SimtelEventSource::new(&path, SourceOptions::default()).unwrap();
        let event = source.seek_event(2).unwrap();
        assert_eq!(event.event_id, 2);
        // The iterator continues from there.
        let event = source.next_event().unwrap().unwrap();
        assert_eq!(event.event_id, 3);

        assert!(matches!(
            source.seek_event(10),
            Err(SourceError::IndexOutOfRange { index: 10, .. })
        ));
    }

    #[test]
    fn sync_recovery_preserves_the_event_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let clean = dir.path().join("clean.dat");
        write_stream_file(&clean, &StreamSpec::new(2));
        let dirty = dir.path().join("dirty.dat");
        let mut bytes = vec![0x42u8; 23];
        bytes.extend(write_test_stream(&StreamSpec::new(2)));
        std::fs::write(&dirty, bytes).unwrap();

        let clean_events: Vec<_> = SimtelEventSource::new(&clean, SourceOptions::default())
            .unwrap()
            .map(Result::unwrap)
            .map(|e| e.event_id)
            .collect();
        let mut dirty_source = SimtelEventSource::new(&dirty, SourceOptions::default()).unwrap();
        let mut dirty_events = Vec::new();
        while let Some(event) = dirty_source.next_event().unwrap() {
            dirty_events.push(event.event_id);
        }
        assert_eq!(clean_events, dirty_events);
        assert_eq!(dirty_source.skipped_bytes(), 23);
    }

    #[test]
    fn zstd_stream_with_max_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat.zst");
        let raw = write_test_stream(&StreamSpec::new(15));
        std::fs::write(&path, zstd::stream::encode_all(&raw[..], 0).unwrap()).unwrap();

        let options = SourceOptions {
            max_events: 10,
            ..Default::default()
        };
        let mut source = SimtelEventSource::new(&path, options).unwrap();
        let mut count = 0;
        while let Some(_event) = source.next_event().unwrap() {
            count += 1;
        }
        assert_eq!(count, 10);
        // One shower precedes each emitted event in the test stream.
        assert_eq!(source.shower_array().len(), 10);
    }

    #[test]
    fn load_all_showers_prescans_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.dat");
        write_stream_file(&path, &StreamSpec::new(6));

        let options = SourceOptions {
            max_events: 1,
            load_all_showers: true,
            ..Default::default()
        };
        let mut source = SimtelEventSource::new(&path, options).unwrap();
        assert_eq!(source.shower_array().len(), 6);
        while source.next_event().unwrap().is_some() {}
        // Iteration does not duplicate the preloaded showers.
        assert_eq!(source.shower_array().len(), 6);
    }
}
