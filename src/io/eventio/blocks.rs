// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed decoding of block payloads.
//!
//! Payload contents are fixed little-endian regardless of the header byte
//! order: strings are a u32 length plus UTF-8 bytes, arrays a u32 count
//! plus elements. Every record can also encode itself, which the stream
//! synthesis tools and the test suite use.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use super::{BlockHeader, EventioError};

// Block type codes.
pub const BLOCK_HISTORY: u32 = 70;
pub const BLOCK_METAPARAM: u32 = 75;
pub const BLOCK_RUN_HEADER: u32 = 2000;
pub const BLOCK_MC_RUN_HEADER: u32 = 2001;
pub const BLOCK_CAMERA_SETTINGS: u32 = 2002;
pub const BLOCK_CAMERA_ORGANISATION: u32 = 2003;
pub const BLOCK_PIXEL_SETTINGS: u32 = 2004;
pub const BLOCK_PIXEL_DISABLED: u32 = 2005;
pub const BLOCK_CAMERA_SOFTWARE_SETTINGS: u32 = 2006;
pub const BLOCK_POINTING_CORRECTIONS: u32 = 2007;
pub const BLOCK_TRACKING_SETTINGS: u32 = 2008;
pub const BLOCK_EVENT: u32 = 2010;
pub const BLOCK_TRUE_IMAGE: u32 = 2014;
pub const BLOCK_MC_SHOWER: u32 = 2020;
pub const BLOCK_MC_EVENT: u32 = 2021;
pub const BLOCK_TELESCOPE_MONITOR: u32 = 2022;
pub const BLOCK_LASER_CALIBRATION: u32 = 2023;
pub const BLOCK_MC_PE_SUM: u32 = 2026;
pub const BLOCK_ATMOSPHERE: u32 = 2030;
pub const BLOCK_PIXEL_MONITOR: u32 = 2033;

/// Processing history carried over from the production chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryBlock {
    pub entries: Vec<(i64, String)>,
}

/// Global (ident -1) or per-telescope metadata key/value pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaParamBlock {
    pub entries: Vec<(String, String)>,
}

/// Run-level static configuration: the telescope list and positions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunHeaderBlock {
    pub run_id: i32,
    pub reference_position: [f64; 3],
    pub tel_ids: Vec<i32>,
    pub tel_positions: Vec<[f64; 3]>,
}

/// The MC run header: simulation production parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McRunHeaderBlock {
    pub run_number: i32,
    pub corsika_version: f64,
    pub simtel_version: f64,
    pub energy_range_min: f64,
    pub energy_range_max: f64,
    pub spectral_index: f64,
    pub obs_level: f64,
    pub core_pos_mode: i32,
    pub core_range_x: f64,
    pub core_range_y: f64,
    pub viewcone_min: f64,
    pub viewcone_max: f64,
    pub n_showers: i32,
    pub shower_reuse: i32,
    pub primary_id: i32,
    pub injection_height: f64,
    pub atmosphere_id: i32,
}

/// Tabulated atmosphere profile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AtmosphereBlock {
    pub name: String,
    pub alt_km: Vec<f64>,
    pub rho: Vec<f64>,
    pub thick: Vec<f64>,
    pub refidx_m1: Vec<f64>,
}

/// Camera geometry and optics of one telescope (ident = tel id).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraSettingsBlock {
    pub camera_name: String,
    pub n_pixels: u32,
    pub equivalent_focal_length: f64,
    pub effective_focal_length: f64,
    pub mirror_area: f64,
    pub num_mirrors: i32,
    pub cam_rotation: f64,
    pub pix_x: Vec<f64>,
    pub pix_y: Vec<f64>,
    pub pix_area: Vec<f64>,
    pub pix_type: Vec<i32>,
}

/// Drawer/channel wiring summary of one camera.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraOrganisationBlock {
    pub n_pixels: u32,
    pub n_drawers: u32,
}

/// Readout parameters of one telescope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelSettingsBlock {
    pub n_channels: u32,
    pub n_pixels: u32,
    pub n_samples: u32,
    pub sampling_rate_ghz: f64,
    pub reference_pulse_sample_width_ns: f64,
    /// Flattened (n_channels, n_ref_samples).
    pub n_ref_samples: u32,
    pub reference_pulse_shape: Vec<f64>,
}

/// Pixels taken out of the trigger/readout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelDisabledBlock {
    pub pixel_ids: Vec<i32>,
}

/// Camera firmware settings; carried through but not interpreted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraSoftwareSettingsBlock {
    pub dyn_trig_mode: i32,
    pub dyn_trig_threshold: i32,
}

/// Static pointing corrections of one telescope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointingCorrectionsBlock {
    pub azimuth_offset: f64,
    pub altitude_offset: f64,
}

/// Nominal tracking of one telescope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackingSettingsBlock {
    pub azimuth: f64,
    pub altitude: f64,
}

/// Ground truth of one simulated shower.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McShowerBlock {
    pub energy: f64,
    pub alt: f64,
    pub az: f64,
    pub core_x: f64,
    pub core_y: f64,
    pub h_first_int: f64,
    pub x_max: f64,
    pub h_max: f64,
    pub starting_grammage: f64,
    pub primary_id: i32,
}

/// The rethrown core of one use of the current shower.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McEventBlock {
    pub event_id: u64,
    pub core_x: f64,
    pub core_y: f64,
}

/// Calibration monitor data of one telescope (ident = tel id).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelescopeMonitorBlock {
    pub n_channels: u32,
    pub n_pixels: u32,
    pub pedestal_high: Vec<f64>,
    pub pedestal_low: Vec<f64>,
    pub dc_to_pe_high: Vec<f64>,
    pub dc_to_pe_low: Vec<f64>,
}

/// Laser calibration constants per gain channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaserCalibrationBlock {
    pub calib: Vec<f64>,
}

/// Per-pixel status flags of one telescope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelMonitorBlock {
    pub status: Vec<i32>,
}

/// Noise-free photo-electron image of one telescope (ident = tel id).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrueImageBlock {
    pub impact_parameter: f64,
    pub pe_count: Vec<i32>,
}

/// Total true photo-electrons per telescope for one event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McPeSumBlock {
    pub event_id: u64,
    pub tel_ids: Vec<i32>,
    pub pe_sum: Vec<f64>,
}

/// One telescope's share of a triggered event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventTelescope {
    pub tel_id: i32,
    pub azimuth: f64,
    pub altitude: f64,
    pub n_pixels: u32,
    pub n_samples: u32,
    pub n_channels: u32,
    /// Flattened (n_pixels, n_samples), high gain then low gain.
    pub waveform_high: Vec<u16>,
    pub waveform_low: Vec<u16>,
    pub waveform_sum: Option<(Vec<u32>, Vec<u32>)>,
}

/// One triggered array event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventBlock {
    pub event_id: u64,
    pub run_id: i32,
    pub array_azimuth: f64,
    pub array_altitude: f64,
    pub telescopes: Vec<EventTelescope>,
}

/// Every block kind the pipeline knows how to decode.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    History(HistoryBlock),
    MetaParam(MetaParamBlock),
    RunHeader(RunHeaderBlock),
    McRunHeader(McRunHeaderBlock),
    Atmosphere(AtmosphereBlock),
    CameraSettings(CameraSettingsBlock),
    CameraOrganisation(CameraOrganisationBlock),
    PixelSettings(PixelSettingsBlock),
    PixelDisabled(PixelDisabledBlock),
    CameraSoftwareSettings(CameraSoftwareSettingsBlock),
    PointingCorrections(PointingCorrectionsBlock),
    TrackingSettings(TrackingSettingsBlock),
    McShower(McShowerBlock),
    McEvent(McEventBlock),
    TelescopeMonitor(TelescopeMonitorBlock),
    LaserCalibration(LaserCalibrationBlock),
    PixelMonitor(PixelMonitorBlock),
    TrueImage(TrueImageBlock),
    McPeSum(McPeSumBlock),
    Event(EventBlock),
}

impl Block {
    /// Decode a payload by header type. `Ok(None)` for block types without
    /// a registered decoder; the caller logs and skips those.
    pub fn decode(header: &BlockHeader, payload: &[u8]) -> Result<Option<Block>, EventioError> {
        decode_typed(header.block_type, payload).map_err(|_| EventioError::BadPayload {
            block_type: header.block_type,
            what: "truncated or malformed payload",
        })
    }
}

fn decode_typed(block_type: u32, payload: &[u8]) -> io::Result<Option<Block>> {
    let mut r = Cursor::new(payload);
    let decoded = match block_type {
        BLOCK_HISTORY => decode_history(&mut r).map(Block::History),
        BLOCK_METAPARAM => decode_metaparam(&mut r).map(Block::MetaParam),
        BLOCK_RUN_HEADER => decode_run_header(&mut r).map(Block::RunHeader),
        BLOCK_MC_RUN_HEADER => decode_mc_run_header(&mut r).map(Block::McRunHeader),
        BLOCK_ATMOSPHERE => decode_atmosphere(&mut r).map(Block::Atmosphere),
        BLOCK_CAMERA_SETTINGS => decode_camera_settings(&mut r).map(Block::CameraSettings),
        BLOCK_CAMERA_ORGANISATION => Ok(Block::CameraOrganisation(CameraOrganisationBlock {
            n_pixels: r.read_u32::<LittleEndian>()?,
            n_drawers: r.read_u32::<LittleEndian>()?,
        })),
        BLOCK_PIXEL_SETTINGS => decode_pixel_settings(&mut r).map(Block::PixelSettings),
        BLOCK_PIXEL_DISABLED => Ok(Block::PixelDisabled(PixelDisabledBlock {
            pixel_ids: read_vec_i32(&mut r)?,
        })),
        BLOCK_CAMERA_SOFTWARE_SETTINGS => {
            Ok(Block::CameraSoftwareSettings(CameraSoftwareSettingsBlock {
                dyn_trig_mode: r.read_i32::<LittleEndian>()?,
                dyn_trig_threshold: r.read_i32::<LittleEndian>()?,
            }))
        }
        BLOCK_POINTING_CORRECTIONS => {
            Ok(Block::PointingCorrections(PointingCorrectionsBlock {
                azimuth_offset: r.read_f64::<LittleEndian>()?,
                altitude_offset: r.read_f64::<LittleEndian>()?,
            }))
        }
        BLOCK_TRACKING_SETTINGS => Ok(Block::TrackingSettings(TrackingSettingsBlock {
            azimuth: r.read_f64::<LittleEndian>()?,
            altitude: r.read_f64::<LittleEndian>()?,
        })),
        BLOCK_MC_SHOWER => decode_mc_shower(&mut r).map(Block::McShower),
        BLOCK_MC_EVENT => Ok(Block::McEvent(McEventBlock {
            event_id: r.read_u64::<LittleEndian>()?,
            core_x: r.read_f64::<LittleEndian>()?,
            core_y: r.read_f64::<LittleEndian>()?,
        })),
        BLOCK_TELESCOPE_MONITOR => decode_telescope_monitor(&mut r).map(Block::TelescopeMonitor),
        BLOCK_LASER_CALIBRATION => Ok(Block::LaserCalibration(LaserCalibrationBlock {
            calib: read_vec_f64(&mut r)?,
        })),
        BLOCK_PIXEL_MONITOR => Ok(Block::PixelMonitor(PixelMonitorBlock {
            status: read_vec_i32(&mut r)?,
        })),
        BLOCK_TRUE_IMAGE => Ok(Block::TrueImage(TrueImageBlock {
            impact_parameter: r.read_f64::<LittleEndian>()?,
            pe_count: read_vec_i32(&mut r)?,
        })),
        BLOCK_MC_PE_SUM => Ok(Block::McPeSum(McPeSumBlock {
            event_id: r.read_u64::<LittleEndian>()?,
            tel_ids: read_vec_i32(&mut r)?,
            pe_sum: read_vec_f64(&mut r)?,
        })),
        BLOCK_EVENT => decode_event(&mut r).map(Block::Event),
        _ => return Ok(None),
    };
    decoded.map(Some)
}

fn decode_history(r: &mut Cursor<&[u8]>) -> io::Result<HistoryBlock> {
    let n = r.read_u32::<LittleEndian>()?;
    let mut entries = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let time = r.read_i64::<LittleEndian>()?;
        entries.push((time, read_str(r)?));
    }
    Ok(HistoryBlock { entries })
}

fn decode_metaparam(r: &mut Cursor<&[u8]>) -> io::Result<MetaParamBlock> {
    let n = r.read_u32::<LittleEndian>()?;
    let mut entries = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let name = read_str(r)?;
        entries.push((name, read_str(r)?));
    }
    Ok(MetaParamBlock { entries })
}

fn decode_run_header(r: &mut Cursor<&[u8]>) -> io::Result<RunHeaderBlock> {
    let run_id = r.read_i32::<LittleEndian>()?;
    let reference_position = [
        r.read_f64::<LittleEndian>()?,
        r.read_f64::<LittleEndian>()?,
        r.read_f64::<LittleEndian>()?,
    ];
    let n_tels = r.read_u32::<LittleEndian>()?;
    let mut tel_ids = Vec::with_capacity(n_tels as usize);
    let mut tel_positions = Vec::with_capacity(n_tels as usize);
    for _ in 0..n_tels {
        tel_ids.push(r.read_i32::<LittleEndian>()?);
        tel_positions.push([
            r.read_f64::<LittleEndian>()?,
            r.read_f64::<LittleEndian>()?,
            r.read_f64::<LittleEndian>()?,
        ]);
    }
    Ok(RunHeaderBlock {
        run_id,
        reference_position,
        tel_ids,
        tel_positions,
    })
}

fn decode_mc_run_header(r: &mut Cursor<&[u8]>) -> io::Result<McRunHeaderBlock> {
    Ok(McRunHeaderBlock {
        run_number: r.read_i32::<LittleEndian>()?,
        corsika_version: r.read_f64::<LittleEndian>()?,
        simtel_version: r.read_f64::<LittleEndian>()?,
        energy_range_min: r.read_f64::<LittleEndian>()?,
        energy_range_max: r.read_f64::<LittleEndian>()?,
        spectral_index: r.read_f64::<LittleEndian>()?,
        obs_level: r.read_f64::<LittleEndian>()?,
        core_pos_mode: r.read_i32::<LittleEndian>()?,
        core_range_x: r.read_f64::<LittleEndian>()?,
        core_range_y: r.read_f64::<LittleEndian>()?,
        viewcone_min: r.read_f64::<LittleEndian>()?,
        viewcone_max: r.read_f64::<LittleEndian>()?,
        n_showers: r.read_i32::<LittleEndian>()?,
        shower_reuse: r.read_i32::<LittleEndian>()?,
        primary_id: r.read_i32::<LittleEndian>()?,
        injection_height: r.read_f64::<LittleEndian>()?,
        atmosphere_id: r.read_i32::<LittleEndian>()?,
    })
}

fn decode_atmosphere(r: &mut Cursor<&[u8]>) -> io::Result<AtmosphereBlock> {
    Ok(AtmosphereBlock {
        name: read_str(r)?,
        alt_km: read_vec_f64(r)?,
        rho: read_vec_f64(r)?,
        thick: read_vec_f64(r)?,
        refidx_m1: read_vec_f64(r)?,
    })
}

fn decode_camera_settings(r: &mut Cursor<&[u8]>) -> io::Result<CameraSettingsBlock> {
    Ok(CameraSettingsBlock {
        camera_name: read_str(r)?,
        n_pixels: r.read_u32::<LittleEndian>()?,
        equivalent_focal_length: r.read_f64::<LittleEndian>()?,
        effective_focal_length: r.read_f64::<LittleEndian>()?,
        mirror_area: r.read_f64::<LittleEndian>()?,
        num_mirrors: r.read_i32::<LittleEndian>()?,
        cam_rotation: r.read_f64::<LittleEndian>()?,
        pix_x: read_vec_f64(r)?,
        pix_y: read_vec_f64(r)?,
        pix_area: read_vec_f64(r)?,
        pix_type: read_vec_i32(r)?,
    })
}

fn decode_pixel_settings(r: &mut Cursor<&[u8]>) -> io::Result<PixelSettingsBlock> {
    Ok(PixelSettingsBlock {
        n_channels: r.read_u32::<LittleEndian>()?,
        n_pixels: r.read_u32::<LittleEndian>()?,
        n_samples: r.read_u32::<LittleEndian>()?,
        sampling_rate_ghz: r.read_f64::<LittleEndian>()?,
        reference_pulse_sample_width_ns: r.read_f64::<LittleEndian>()?,
        n_ref_samples: r.read_u32::<LittleEndian>()?,
        reference_pulse_shape: read_vec_f64(r)?,
    })
}

fn decode_mc_shower(r: &mut Cursor<&[u8]>) -> io::Result<McShowerBlock> {
    Ok(McShowerBlock {
        energy: r.read_f64::<LittleEndian>()?,
        alt: r.read_f64::<LittleEndian>()?,
        az: r.read_f64::<LittleEndian>()?,
        core_x: r.read_f64::<LittleEndian>()?,
        core_y: r.read_f64::<LittleEndian>()?,
        h_first_int: r.read_f64::<LittleEndian>()?,
        x_max: r.read_f64::<LittleEndian>()?,
        h_max: r.read_f64::<LittleEndian>()?,
        starting_grammage: r.read_f64::<LittleEndian>()?,
        primary_id: r.read_i32::<LittleEndian>()?,
    })
}

fn decode_telescope_monitor(r: &mut Cursor<&[u8]>) -> io::Result<TelescopeMonitorBlock> {
    Ok(TelescopeMonitorBlock {
        n_channels: r.read_u32::<LittleEndian>()?,
        n_pixels: r.read_u32::<LittleEndian>()?,
        pedestal_high: read_vec_f64(r)?,
        pedestal_low: read_vec_f64(r)?,
        dc_to_pe_high: read_vec_f64(r)?,
        dc_to_pe_low: read_vec_f64(r)?,
    })
}

fn decode_event(r: &mut Cursor<&[u8]>) -> io::Result<EventBlock> {
    let event_id = r.read_u64::<LittleEndian>()?;
    let run_id = r.read_i32::<LittleEndian>()?;
    let array_azimuth = r.read_f64::<LittleEndian>()?;
    let array_altitude = r.read_f64::<LittleEndian>()?;
    let n_tels = r.read_u32::<LittleEndian>()?;
    let mut telescopes = Vec::with_capacity(n_tels as usize);
    for _ in 0..n_tels {
        let tel_id = r.read_i32::<LittleEndian>()?;
        let azimuth = r.read_f64::<LittleEndian>()?;
        let altitude = r.read_f64::<LittleEndian>()?;
        let n_pixels = r.read_u32::<LittleEndian>()?;
        let n_samples = r.read_u32::<LittleEndian>()?;
        let n_channels = r.read_u32::<LittleEndian>()?;
        let waveform_high = read_vec_u16(r)?;
        let waveform_low = read_vec_u16(r)?;
        let waveform_sum = match r.read_u8()? {
            0 => None,
            _ => Some((read_vec_u32(r)?, read_vec_u32(r)?)),
        };
        telescopes.push(EventTelescope {
            tel_id,
            azimuth,
            altitude,
            n_pixels,
            n_samples,
            n_channels,
            waveform_high,
            waveform_low,
            waveform_sum,
        });
    }
    Ok(EventBlock {
        event_id,
        run_id,
        array_azimuth,
        array_altitude,
        telescopes,
    })
}

fn read_str(r: &mut Cursor<&[u8]>) -> io::Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad utf-8"))
}

fn read_vec_f64(r: &mut Cursor<&[u8]>) -> io::Result<Vec<f64>> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        v.push(r.read_f64::<LittleEndian>()?);
    }
    Ok(v)
}

fn read_vec_i32(r: &mut Cursor<&[u8]>) -> io::Result<Vec<i32>> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        v.push(r.read_i32::<LittleEndian>()?);
    }
    Ok(v)
}

fn read_vec_u16(r: &mut Cursor<&[u8]>) -> io::Result<Vec<u16>> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        v.push(r.read_u16::<LittleEndian>()?);
    }
    Ok(v)
}

fn read_vec_u32(r: &mut Cursor<&[u8]>) -> io::Result<Vec<u32>> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        v.push(r.read_u32::<LittleEndian>()?);
    }
    Ok(v)
}

// Encoding. Writes into a Vec never fail, so these build buffers directly.

fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_vec_f64(buf: &mut Vec<u8>, v: &[f64]) {
    put_u32(buf, v.len() as u32);
    for &x in v {
        put_f64(buf, x);
    }
}

fn put_vec_i32(buf: &mut Vec<u8>, v: &[i32]) {
    put_u32(buf, v.len() as u32);
    for &x in v {
        put_i32(buf, x);
    }
}

fn put_vec_u16(buf: &mut Vec<u8>, v: &[u16]) {
    put_u32(buf, v.len() as u32);
    for &x in v {
        put_u16(buf, x);
    }
}

fn put_vec_u32(buf: &mut Vec<u8>, v: &[u32]) {
    put_u32(buf, v.len() as u32);
    for &x in v {
        put_u32(buf, x);
    }
}

impl HistoryBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, self.entries.len() as u32);
        for (time, line) in &self.entries {
            put_i64(&mut buf, *time);
            put_str(&mut buf, line);
        }
        buf
    }
}

impl MetaParamBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, self.entries.len() as u32);
        for (name, value) in &self.entries {
            put_str(&mut buf, name);
            put_str(&mut buf, value);
        }
        buf
    }
}

impl RunHeaderBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_i32(&mut buf, self.run_id);
        for &c in &self.reference_position {
            put_f64(&mut buf, c);
        }
        put_u32(&mut buf, self.tel_ids.len() as u32);
        for (tel_id, position) in self.tel_ids.iter().zip(&self.tel_positions) {
            put_i32(&mut buf, *tel_id);
            for &c in position {
                put_f64(&mut buf, c);
            }
        }
        buf
    }
}

impl McRunHeaderBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_i32(&mut buf, self.run_number);
        put_f64(&mut buf, self.corsika_version);
        put_f64(&mut buf, self.simtel_version);
        put_f64(&mut buf, self.energy_range_min);
        put_f64(&mut buf, self.energy_range_max);
        put_f64(&mut buf, self.spectral_index);
        put_f64(&mut buf, self.obs_level);
        put_i32(&mut buf, self.core_pos_mode);
        put_f64(&mut buf, self.core_range_x);
        put_f64(&mut buf, self.core_range_y);
        put_f64(&mut buf, self.viewcone_min);
        put_f64(&mut buf, self.viewcone_max);
        put_i32(&mut buf, self.n_showers);
        put_i32(&mut buf, self.shower_reuse);
        put_i32(&mut buf, self.primary_id);
        put_f64(&mut buf, self.injection_height);
        put_i32(&mut buf, self.atmosphere_id);
        buf
    }
}

impl AtmosphereBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_str(&mut buf, &self.name);
        put_vec_f64(&mut buf, &self.alt_km);
        put_vec_f64(&mut buf, &self.rho);
        put_vec_f64(&mut buf, &self.thick);
        put_vec_f64(&mut buf, &self.refidx_m1);
        buf
    }
}

impl CameraSettingsBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_str(&mut buf, &self.camera_name);
        put_u32(&mut buf, self.n_pixels);
        put_f64(&mut buf, self.equivalent_focal_length);
        put_f64(&mut buf, self.effective_focal_length);
        put_f64(&mut buf, self.mirror_area);
        put_i32(&mut buf, self.num_mirrors);
        put_f64(&mut buf, self.cam_rotation);
        put_vec_f64(&mut buf, &self.pix_x);
        put_vec_f64(&mut buf, &self.pix_y);
        put_vec_f64(&mut buf, &self.pix_area);
        put_vec_i32(&mut buf, &self.pix_type);
        buf
    }
}

impl CameraOrganisationBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, self.n_pixels);
        put_u32(&mut buf, self.n_drawers);
        buf
    }
}

impl PixelSettingsBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, self.n_channels);
        put_u32(&mut buf, self.n_pixels);
        put_u32(&mut buf, self.n_samples);
        put_f64(&mut buf, self.sampling_rate_ghz);
        put_f64(&mut buf, self.reference_pulse_sample_width_ns);
        put_u32(&mut buf, self.n_ref_samples);
        put_vec_f64(&mut buf, &self.reference_pulse_shape);
        buf
    }
}

impl PixelDisabledBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_vec_i32(&mut buf, &self.pixel_ids);
        buf
    }
}

impl CameraSoftwareSettingsBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_i32(&mut buf, self.dyn_trig_mode);
        put_i32(&mut buf, self.dyn_trig_threshold);
        buf
    }
}

impl PointingCorrectionsBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_f64(&mut buf, self.azimuth_offset);
        put_f64(&mut buf, self.altitude_offset);
        buf
    }
}

impl TrackingSettingsBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_f64(&mut buf, self.azimuth);
        put_f64(&mut buf, self.altitude);
        buf
    }
}

impl McShowerBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_f64(&mut buf, self.energy);
        put_f64(&mut buf, self.alt);
        put_f64(&mut buf, self.az);
        put_f64(&mut buf, self.core_x);
        put_f64(&mut buf, self.core_y);
        put_f64(&mut buf, self.h_first_int);
        put_f64(&mut buf, self.x_max);
        put_f64(&mut buf, self.h_max);
        put_f64(&mut buf, self.starting_grammage);
        put_i32(&mut buf, self.primary_id);
        buf
    }
}

impl McEventBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.event_id);
        put_f64(&mut buf, self.core_x);
        put_f64(&mut buf, self.core_y);
        buf
    }
}

impl TelescopeMonitorBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, self.n_channels);
        put_u32(&mut buf, self.n_pixels);
        put_vec_f64(&mut buf, &self.pedestal_high);
        put_vec_f64(&mut buf, &self.pedestal_low);
        put_vec_f64(&mut buf, &self.dc_to_pe_high);
        put_vec_f64(&mut buf, &self.dc_to_pe_low);
        buf
    }
}

impl LaserCalibrationBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_vec_f64(&mut buf, &self.calib);
        buf
    }
}

impl PixelMonitorBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_vec_i32(&mut buf, &self.status);
        buf
    }
}

impl TrueImageBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_f64(&mut buf, self.impact_parameter);
        put_vec_i32(&mut buf, &self.pe_count);
        buf
    }
}

impl McPeSumBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.event_id);
        put_vec_i32(&mut buf, &self.tel_ids);
        put_vec_f64(&mut buf, &self.pe_sum);
        buf
    }
}

impl EventBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u64(&mut buf, self.event_id);
        put_i32(&mut buf, self.run_id);
        put_f64(&mut buf, self.array_azimuth);
        put_f64(&mut buf, self.array_altitude);
        put_u32(&mut buf, self.telescopes.len() as u32);
        for tel in &self.telescopes {
            put_i32(&mut buf, tel.tel_id);
            put_f64(&mut buf, tel.azimuth);
            put_f64(&mut buf, tel.altitude);
            put_u32(&mut buf, tel.n_pixels);
            put_u32(&mut buf, tel.n_samples);
            put_u32(&mut buf, tel.n_channels);
            put_vec_u16(&mut buf, &tel.waveform_high);
            put_vec_u16(&mut buf, &tel.waveform_low);
            match &tel.waveform_sum {
                None => put_u8(&mut buf, 0),
                Some((high, low)) => {
                    put_u8(&mut buf, 1);
                    put_vec_u32(&mut buf, high);
                    put_vec_u32(&mut buf, low);
                }
            }
        }
        buf
    }
}
