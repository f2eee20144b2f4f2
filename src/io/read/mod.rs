// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The data-level reader: discovers the tables of a columnar file, rebuilds
//! the static descriptions, and reassembles [`ArrayEvent`]s through the
//! per-level event indices and `(event_id, tel_id)` joins. Missing tables
//! simply leave the matching event fields empty.

mod error;

pub use error::ReaderError;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use log::debug;
use ndarray::prelude::*;

use crate::atmosphere::TableAtmosphereModel;
use crate::camera::{CameraDescription, CameraGeometry, CameraReadout};
use crate::event::{
    ArrayEvent, ConcentrationParameters, Dl0Camera, Dl0Event, Dl1Camera, Dl1Event, Dl2Event,
    EventMonitor, ExtraParameters, HillasParameters, ImageParameters, IntensityParameters,
    LeakageParameters, MorphologyParameters, Pointing, R0Camera, R0Event, R1Camera, R1Event,
    ReconstructedEnergy, ReconstructedGeometry, SimulatedCamera, SimulatedEvent, SimulatedShower,
    TelImpactParameter, TelMonitor, TelescopePointing,
};
use crate::io::table::{Table, TableFile};
use crate::simconfig::SimulationConfig;
use crate::stats::{Axis, Histogram, Histogram1D, Histogram2D, Statistics};
use crate::subarray::{OpticsDescription, SubarrayDescription, TelId, TelescopeDescription};

/// The order in which levels are consulted for the event list.
const INDEX_PRIORITY: [&str; 5] = ["r0", "r1", "dl0", "dl1", "dl2"];

/// Reads one columnar data file and iterates its events. Random access by
/// event position is supported.
pub struct DataFileReader {
    file: TableFile,
    subarray: Option<SubarrayDescription>,
    atmosphere: Option<TableAtmosphereModel>,
    simulation_config: Option<SimulationConfig>,
    statistics: Statistics,
    event_ids: Vec<u64>,
    joins: HashMap<String, HashMap<(u64, TelId), usize>>,
    cursor: usize,
}

impl DataFileReader {
    pub fn open<P: AsRef<Path>>(path: P, url_prefix: &str) -> Result<DataFileReader, ReaderError> {
        let file = TableFile::read_from(path.as_ref(), url_prefix)?;

        // Event list from the highest-priority level index present.
        let mut event_ids = Vec::new();
        for level in INDEX_PRIORITY {
            if let Some(index) = file.get(&format!("events/event_index/{level}")) {
                event_ids = u64_column(index, "event_id")?;
                break;
            }
        }

        // (event_id, tel_id) joins: persisted indices where available,
        // rebuilt otherwise.
        let mut joins = HashMap::new();
        for (name, data_table) in &file.tables {
            if !name.starts_with("events/")
                || name.ends_with("/_index")
                || !data_table.has_column("tel_id")
                || !data_table.has_column("event_id")
            {
                continue;
            }
            let triples = match file.get(&format!("{name}/_index")) {
                Some(index_table) => {
                    let events = u64_column(index_table, "event_id")?;
                    let tels = i32_column(index_table, "tel_id")?;
                    let rows = u64_column(index_table, "row")?;
                    events
                        .into_iter()
                        .zip(tels)
                        .zip(rows)
                        .map(|((event, tel), row)| (event, tel, row))
                        .collect()
                }
                None => data_table.build_event_tel_index(),
            };
            let mut join = HashMap::with_capacity(triples.len());
            for (event, tel, row) in triples {
                join.insert((event, tel), row as usize);
            }
            joins.insert(name.clone(), join);
        }
        debug!(
            "Opened data file with {} tables and {} events",
            file.tables.len(),
            event_ids.len()
        );

        let mut reader = DataFileReader {
            file,
            subarray: None,
            atmosphere: None,
            simulation_config: None,
            statistics: Statistics::new(),
            event_ids,
            joins,
            cursor: 0,
        };
        reader.subarray = reader.read_subarray()?;
        reader.atmosphere = reader.read_atmosphere()?;
        reader.simulation_config = reader.read_simulation_config()?;
        reader.statistics = reader.read_statistics()?;
        Ok(reader)
    }

    pub fn n_events(&self) -> usize {
        self.event_ids.len()
    }

    pub fn subarray(&self) -> Option<&SubarrayDescription> {
        self.subarray.as_ref()
    }

    pub fn atmosphere(&self) -> Option<&TableAtmosphereModel> {
        self.atmosphere.as_ref()
    }

    pub fn simulation_config(&self) -> Option<&SimulationConfig> {
        self.simulation_config.as_ref()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// The pipeline configuration document stored in the file, if any.
    pub fn config_document(&self) -> Option<serde_json::Value> {
        let table = self.file.get("cfg/config")?;
        let text = table.value("config", 0).ok()?;
        serde_json::from_str(text.as_str()?).ok()
    }

    /// Random access by event position.
    pub fn event_at(&self, index: usize) -> Result<ArrayEvent, ReaderError> {
        let event_id = *self
            .event_ids
            .get(index)
            .ok_or(ReaderError::IndexOutOfRange {
                index,
                available: self.event_ids.len(),
            })?;
        self.assemble_event(event_id)
    }

    fn index_tels(&self, level: &str, event_id: u64) -> Result<Option<Vec<TelId>>, ReaderError> {
        let table = match self.file.get(&format!("events/event_index/{level}")) {
            Some(table) => table,
            None => return Ok(None),
        };
        for row in table.rows_for_event(event_id) {
            let tels = table
                .value("telescopes", row)?
                .into_list_i32()
                .ok_or_else(|| ReaderError::BadCell {
                    table: table.name.clone(),
                    column: "telescopes".to_string(),
                })?;
            return Ok(Some(tels));
        }
        Ok(None)
    }

    fn join_row(&self, table: &str, event_id: u64, tel_id: TelId) -> Option<usize> {
        self.joins.get(table)?.get(&(event_id, tel_id)).copied()
    }

    fn run_id_of(&self, event_id: u64) -> Result<i32, ReaderError> {
        for level in INDEX_PRIORITY {
            let table = match self.file.get(&format!("events/event_index/{level}")) {
                Some(table) if table.has_column("run_id") => table,
                _ => continue,
            };
            if let Some(&row) = table.rows_for_event(event_id).first() {
                return i32_at(table, "run_id", row);
            }
        }
        Ok(0)
    }

    fn assemble_event(&self, event_id: u64) -> Result<ArrayEvent, ReaderError> {
        let mut event = ArrayEvent {
            event_id,
            run_id: self.run_id_of(event_id)?,
            ..Default::default()
        };
        event.simulation = self.read_simulation(event_id)?;
        event.r0 = self.read_r0(event_id)?;
        event.r1 = self.read_r1(event_id)?;
        event.dl0 = self.read_dl0(event_id)?;
        event.dl1 = self.read_dl1(event_id)?;
        event.dl2 = self.read_dl2(event_id)?;
        event.monitor = self.read_monitor(event_id)?;
        event.pointing = self.read_pointing(event_id)?;
        Ok(event)
    }

    fn read_subarray(&self) -> Result<Option<SubarrayDescription>, ReaderError> {
        let positions = match self.file.get("subarray/tel_positions") {
            Some(table) => table,
            None => return Ok(None),
        };
        let mut subarray = SubarrayDescription::default();
        if let Some(reference) = self.file.get("subarray/reference_position") {
            if reference.n_rows() > 0 {
                subarray.reference_position = [
                    f64_at(reference, "pos_x", 0)?,
                    f64_at(reference, "pos_y", 0)?,
                    f64_at(reference, "pos_z", 0)?,
                ];
            }
        }
        for row in 0..positions.n_rows() {
            let tel_id = i32_at(positions, "tel_id", row)?;
            subarray.tel_positions.insert(
                tel_id,
                [
                    f64_at(positions, "pos_x", row)?,
                    f64_at(positions, "pos_y", row)?,
                    f64_at(positions, "pos_z", row)?,
                ],
            );
        }

        let geometry = self.file.get("subarray/camera/geometry");
        let readout = self.file.get("subarray/camera/readout");
        let optics = self.file.get("subarray/optics");
        if let (Some(geometry), Some(readout), Some(optics)) = (geometry, readout, optics) {
            for row in 0..geometry.n_rows() {
                let tel_id = i32_at(geometry, "tel_id", row)?;
                let camera_geometry = CameraGeometry::new(
                    str_at(geometry, "camera_name", row)?,
                    Array1::from_vec(list_f64_at(geometry, "pix_x", row)?),
                    Array1::from_vec(list_f64_at(geometry, "pix_y", row)?),
                    Array1::from_vec(list_f64_at(geometry, "pix_area", row)?),
                    Array1::from_vec(list_i32_at(geometry, "pix_type", row)?),
                    f64_at(geometry, "cam_rotation", row)?,
                    false,
                )?;

                let readout_row = row_for_tel(readout, tel_id)?;
                let shape_flat = list_f64_at(readout, "reference_pulse_shape", readout_row)?;
                let shape_length =
                    i32_at(readout, "reference_pulse_shape_length", readout_row)? as usize;
                let n_channels = i32_at(readout, "n_channels", readout_row)? as usize;
                let shape = Array2::from_shape_vec((n_channels.max(1), shape_length), shape_flat)
                    .unwrap_or_else(|_| Array2::zeros((n_channels.max(1), 0)));
                let camera_readout = CameraReadout {
                    camera_name: str_at(readout, "camera_name", readout_row)?,
                    sampling_rate: f64_at(readout, "sampling_rate", readout_row)?,
                    reference_pulse_shape: shape,
                    reference_pulse_sample_width: f64_at(
                        readout,
                        "reference_pulse_sample_width",
                        readout_row,
                    )?,
                    n_channels,
                    n_pixels: i32_at(readout, "n_pixels", readout_row)? as usize,
                    n_samples: i32_at(readout, "n_samples", readout_row)? as usize,
                };

                let optics_row = row_for_tel(optics, tel_id)?;
                let optics_description = OpticsDescription {
                    optics_name: str_at(optics, "optics_name", optics_row)?,
                    num_mirrors: i32_at(optics, "num_mirrors", optics_row)?,
                    mirror_area: f64_at(optics, "mirror_area", optics_row)?,
                    equivalent_focal_length: f64_at(
                        optics,
                        "equivalent_focal_length",
                        optics_row,
                    )?,
                    effective_focal_length: f64_at(optics, "effective_focal_length", optics_row)?,
                };
                subarray.tels.insert(
                    tel_id,
                    TelescopeDescription::new(
                        CameraDescription {
                            geometry: camera_geometry,
                            readout: camera_readout,
                        },
                        optics_description,
                    ),
                );
            }
        }
        Ok(Some(subarray))
    }

    fn read_atmosphere(&self) -> Result<Option<TableAtmosphereModel>, ReaderError> {
        let table = match self.file.get("cfg/atmosphere_model") {
            Some(table) if table.n_rows() > 0 => table,
            _ => return Ok(None),
        };
        Ok(Some(TableAtmosphereModel {
            name: str_at(table, "name", 0)?,
            alt_km: Array1::from_vec(list_f64_at(table, "alt_km", 0)?),
            rho: Array1::from_vec(list_f64_at(table, "rho", 0)?),
            thick: Array1::from_vec(list_f64_at(table, "thick", 0)?),
            refidx_m1: Array1::from_vec(list_f64_at(table, "refidx_m1", 0)?),
        }))
    }

    fn read_simulation_config(&self) -> Result<Option<SimulationConfig>, ReaderError> {
        let table = match self.file.get("cfg/simulation_config") {
            Some(table) if table.n_rows() > 0 => table,
            _ => return Ok(None),
        };
        Ok(Some(SimulationConfig {
            run_number: i32_at(table, "run_number", 0)?,
            corsika_version: f64_at(table, "corsika_version", 0)?,
            simtel_version: f64_at(table, "simtel_version", 0)?,
            energy_range_min: f64_at(table, "energy_range_min", 0)?,
            energy_range_max: f64_at(table, "energy_range_max", 0)?,
            spectral_index: f64_at(table, "spectral_index", 0)?,
            obs_level: f64_at(table, "obs_level", 0)?,
            core_pos_mode: i32_at(table, "core_pos_mode", 0)?,
            core_range_x: f64_at(table, "core_range_x", 0)?,
            core_range_y: f64_at(table, "core_range_y", 0)?,
            viewcone_min: f64_at(table, "viewcone_min", 0)?,
            viewcone_max: f64_at(table, "viewcone_max", 0)?,
            n_showers: i32_at(table, "n_showers", 0)?,
            shower_reuse: i32_at(table, "shower_reuse", 0)?,
            primary_id: i32_at(table, "primary_id", 0)?,
            injection_height: f64_at(table, "injection_height", 0)?,
            atmosphere_id: i32_at(table, "atmosphere_id", 0)?,
        }))
    }

    fn read_statistics(&self) -> Result<Statistics, ReaderError> {
        let mut statistics = Statistics::new();
        for name in self.file.names_with_prefix("statistics/") {
            let table = self.file.get(name).unwrap();
            if table.n_rows() == 0 {
                continue;
            }
            let histogram_name = name.trim_start_matches("statistics/").to_string();
            let dimension = i32_at(table, "dimension", 0)?;
            let x_axis = Axis::from_kind_edges(
                &str_at(table, "x_axis", 0)?,
                list_f64_at(table, "x_edges", 0)?,
            )?;
            let bins = list_f64_at(table, "bins", 0)?;
            let histogram = if dimension == 1 {
                let mut h = Histogram1D::new(x_axis);
                h.bins = bins;
                h.underflow = f64_at(table, "underflow", 0)?;
                h.overflow = f64_at(table, "overflow", 0)?;
                Histogram::One(h)
            } else {
                let y_axis = Axis::from_kind_edges(
                    &str_at(table, "y_axis", 0)?,
                    list_f64_at(table, "y_edges", 0)?,
                )?;
                let mut h = Histogram2D::new(x_axis, y_axis);
                h.bins = bins;
                h.out_x = f64_at(table, "out_x", 0)?;
                h.out_y = f64_at(table, "out_y", 0)?;
                h.out_both = f64_at(table, "out_both", 0)?;
                Histogram::Two(h)
            };
            statistics.histograms.insert(histogram_name, histogram);
        }
        Ok(statistics)
    }

    fn read_simulation(&self, event_id: u64) -> Result<Option<SimulatedEvent>, ReaderError> {
        let shower_table = match self.file.get("events/simulation/shower") {
            Some(table) => table,
            None => return Ok(None),
        };
        let row = match shower_table.rows_for_event(event_id).first() {
            Some(&row) => row,
            None => return Ok(None),
        };
        let shower = SimulatedShower {
            energy: f64_at(shower_table, "energy", row)?,
            alt: f64_at(shower_table, "alt", row)?,
            az: f64_at(shower_table, "az", row)?,
            core_x: f64_at(shower_table, "core_x", row)?,
            core_y: f64_at(shower_table, "core_y", row)?,
            h_first_int: f64_at(shower_table, "h_first_int", row)?,
            x_max: f64_at(shower_table, "x_max", row)?,
            h_max: f64_at(shower_table, "h_max", row)?,
            starting_grammage: f64_at(shower_table, "starting_grammage", row)?,
            shower_primary_id: i32_at(shower_table, "shower_primary_id", row)?,
        };

        let mut tels = BTreeMap::new();
        if let Some(camera_table) = self.file.get("events/simulation/tels") {
            for row in camera_table.rows_for_event(event_id) {
                tels.insert(
                    i32_at(camera_table, "tel_id", row)?,
                    SimulatedCamera {
                        true_image: Array1::from_vec(list_i32_at(camera_table, "true_image", row)?),
                        true_image_sum: i32_at(camera_table, "true_image_sum", row)?,
                        impact_parameter: f64_at(camera_table, "impact_parameter", row)?,
                    },
                );
            }
        }
        Ok(Some(SimulatedEvent { shower, tels }))
    }

    fn read_r0(&self, event_id: u64) -> Result<Option<R0Event>, ReaderError> {
        let tels = match self.index_tels("r0", event_id)? {
            Some(tels) => tels,
            None => return Ok(None),
        };
        let table = match self.file.get("events/r0") {
            Some(table) => table,
            None => return Ok(None),
        };
        let mut r0 = R0Event::new();
        for tel_id in tels {
            let row = match self.join_row("events/r0", event_id, tel_id) {
                Some(row) => row,
                None => continue,
            };
            let n_pixels = i32_at(table, "n_pixels", row)? as usize;
            let n_samples = i32_at(table, "n_samples", row)? as usize;
            let high = list_u16_at(table, "high_gain_waveform", row)?;
            let low = list_u16_at(table, "low_gain_waveform", row)?;
            let waveform_sum = if bool_at(table, "has_waveform_sum", row)? {
                Some([
                    Array1::from_vec(list_u32_at(table, "high_gain_waveform_sum", row)?),
                    Array1::from_vec(list_u32_at(table, "low_gain_waveform_sum", row)?),
                ])
            } else {
                None
            };
            r0.add_tel(
                tel_id,
                R0Camera {
                    waveform: [
                        shape_waveform(high, n_pixels, n_samples),
                        shape_waveform(low, n_pixels, n_samples),
                    ],
                    waveform_sum,
                },
            );
        }
        Ok(Some(r0))
    }

    fn read_r1(&self, event_id: u64) -> Result<Option<R1Event>, ReaderError> {
        let tels = match self.index_tels("r1", event_id)? {
            Some(tels) => tels,
            None => return Ok(None),
        };
        let table = match self.file.get("events/r1") {
            Some(table) => table,
            None => return Ok(None),
        };
        let mut r1 = R1Event::new();
        for tel_id in tels {
            let row = match self.join_row("events/r1", event_id, tel_id) {
                Some(row) => row,
                None => continue,
            };
            let n_pixels = i32_at(table, "n_pixels", row)? as usize;
            let n_samples = i32_at(table, "n_samples", row)? as usize;
            let flat = list_f64_at(table, "waveform", row)?;
            let waveform = Array2::from_shape_vec((n_pixels, n_samples), flat)
                .unwrap_or_else(|_| Array2::zeros((n_pixels, n_samples)));
            r1.add_tel(
                tel_id,
                R1Camera {
                    waveform,
                    gain_selection: Array1::from_vec(list_i32_at(table, "gain_selection", row)?),
                },
            );
        }
        Ok(Some(r1))
    }

    fn read_dl0(&self, event_id: u64) -> Result<Option<Dl0Event>, ReaderError> {
        let tels = match self.index_tels("dl0", event_id)? {
            Some(tels) => tels,
            None => return Ok(None),
        };
        let table = match self.file.get("events/dl0") {
            Some(table) => table,
            None => return Ok(None),
        };
        let mut dl0 = Dl0Event::new();
        for tel_id in tels {
            let row = match self.join_row("events/dl0", event_id, tel_id) {
                Some(row) => row,
                None => continue,
            };
            dl0.add_tel(
                tel_id,
                Dl0Camera {
                    image: Array1::from_vec(list_f64_at(table, "image", row)?),
                    peak_time: Array1::from_vec(list_f64_at(table, "peak_time", row)?),
                },
            );
        }
        Ok(Some(dl0))
    }

    fn read_dl1(&self, event_id: u64) -> Result<Option<Dl1Event>, ReaderError> {
        let tels = match self.index_tels("dl1", event_id)? {
            Some(tels) => tels,
            None => return Ok(None),
        };
        let table = match self.file.get("events/dl1") {
            Some(table) => table,
            None => return Ok(None),
        };
        let has_image = table.has_column("image");
        let mut dl1 = Dl1Event::new();
        for tel_id in tels {
            let row = match self.join_row("events/dl1", event_id, tel_id) {
                Some(row) => row,
                None => continue,
            };
            let parameters = ImageParameters {
                hillas: HillasParameters {
                    x: f64_at(table, "hillas_x", row)?,
                    y: f64_at(table, "hillas_y", row)?,
                    length: f64_at(table, "hillas_length", row)?,
                    width: f64_at(table, "hillas_width", row)?,
                    psi: f64_at(table, "hillas_psi", row)?,
                    phi: f64_at(table, "hillas_phi", row)?,
                    r: f64_at(table, "hillas_r", row)?,
                    intensity: f64_at(table, "hillas_intensity", row)?,
                    skewness: f64_at(table, "hillas_skewness", row)?,
                    kurtosis: f64_at(table, "hillas_kurtosis", row)?,
                },
                leakage: LeakageParameters {
                    pixels_width_1: f64_at(table, "leakage_pixels_width_1", row)?,
                    pixels_width_2: f64_at(table, "leakage_pixels_width_2", row)?,
                    intensity_width_1: f64_at(table, "leakage_intensity_width_1", row)?,
                    intensity_width_2: f64_at(table, "leakage_intensity_width_2", row)?,
                },
                concentration: ConcentrationParameters {
                    cog: f64_at(table, "concentration_cog", row)?,
                    core: f64_at(table, "concentration_core", row)?,
                    pixel: f64_at(table, "concentration_pixel", row)?,
                },
                morphology: MorphologyParameters {
                    n_pixels: i32_at(table, "morphology_n_pixels", row)?,
                    n_islands: i32_at(table, "morphology_n_islands", row)?,
                    n_small_islands: i32_at(table, "morphology_n_small_islands", row)?,
                    n_medium_islands: i32_at(table, "morphology_n_medium_islands", row)?,
                    n_large_islands: i32_at(table, "morphology_n_large_islands", row)?,
                },
                intensity: IntensityParameters {
                    intensity_max: f64_at(table, "intensity_max", row)?,
                    intensity_mean: f64_at(table, "intensity_mean", row)?,
                    intensity_std: f64_at(table, "intensity_std", row)?,
                },
                extra: ExtraParameters {
                    miss: f64_at(table, "miss", row)?,
                    disp: f64_at(table, "disp", row)?,
                    theta: f64_at(table, "theta", row)?,
                },
            };
            let (image, peak_time, mask) = if has_image {
                (
                    Array1::from_vec(list_f64_at(table, "image", row)?),
                    Array1::from_vec(list_f64_at(table, "peak_time", row)?),
                    list_i32_at(table, "mask", row)?
                        .into_iter()
                        .map(|m| m != 0)
                        .collect(),
                )
            } else {
                (Array1::zeros(0), Array1::zeros(0), Vec::new())
            };
            dl1.add_tel(
                tel_id,
                Dl1Camera {
                    image,
                    peak_time,
                    mask,
                    parameters,
                },
            );
        }
        Ok(Some(dl1))
    }

    fn read_dl2(&self, event_id: u64) -> Result<Option<Dl2Event>, ReaderError> {
        let geometry_tables = self.file.names_with_prefix("events/dl2/geometry/");
        let mut dl2 = Dl2Event::default();
        let mut any = false;

        for name in geometry_tables {
            if name.ends_with("/_index") {
                continue;
            }
            let table = self.file.get(name).unwrap();
            let reconstructor = name.trim_start_matches("events/dl2/geometry/").to_string();
            for row in table.rows_for_event(event_id) {
                any = true;
                dl2.geometry.insert(
                    reconstructor.clone(),
                    ReconstructedGeometry {
                        is_valid: bool_at(table, "is_valid", row)?,
                        alt: f64_at(table, "alt", row)?,
                        az: f64_at(table, "az", row)?,
                        alt_uncertainty: f64_at(table, "alt_uncertainty", row)?,
                        az_uncertainty: f64_at(table, "az_uncertainty", row)?,
                        core_x: f64_at(table, "core_x", row)?,
                        core_y: f64_at(table, "core_y", row)?,
                        tilted_core_x: f64_at(table, "tilted_core_x", row)?,
                        tilted_core_y: f64_at(table, "tilted_core_y", row)?,
                        tilted_core_uncertainty_x: f64_at(table, "tilted_core_uncertainty_x", row)?,
                        tilted_core_uncertainty_y: f64_at(table, "tilted_core_uncertainty_y", row)?,
                        hmax: f64_at(table, "hmax", row)?,
                        direction_error: f64_at(table, "direction_error", row)?,
                        telescopes: table
                            .value("telescopes", row)?
                            .into_list_i32()
                            .unwrap_or_default(),
                    },
                );
            }
        }

        for name in self.file.names_with_prefix("events/dl2/energy/") {
            if name.ends_with("/_index") {
                continue;
            }
            let table = self.file.get(name).unwrap();
            let reconstructor = name.trim_start_matches("events/dl2/energy/").to_string();
            for row in table.rows_for_event(event_id) {
                any = true;
                dl2.energy.insert(
                    reconstructor.clone(),
                    ReconstructedEnergy {
                        estimate_energy: f64_at(table, "estimate_energy", row)?,
                        is_valid: bool_at(table, "is_valid", row)?,
                    },
                );
            }
        }

        if let Some(table) = self.file.get("events/dl2/tels") {
            for row in table.rows_for_event(event_id) {
                any = true;
                let tel_id = i32_at(table, "tel_id", row)?;
                let reconstructor = str_at(table, "reconstructor", row)?;
                let tel = dl2.tels.entry(tel_id).or_default();
                tel.impact.insert(
                    reconstructor,
                    TelImpactParameter {
                        distance: f64_at(table, "impact_distance", row)?,
                        distance_uncertainty: f64_at(table, "impact_distance_uncertainty", row)?,
                    },
                );
                tel.estimate_energy = f64_at(table, "estimate_energy", row)?;
                tel.estimate_disp = f64_at(table, "estimate_disp", row)?;
            }
        }

        Ok(if any { Some(dl2) } else { None })
    }

    fn read_monitor(&self, event_id: u64) -> Result<Option<EventMonitor>, ReaderError> {
        let table = match self.file.get("events/monitor") {
            Some(table) => table,
            None => return Ok(None),
        };
        let mut monitor = EventMonitor::new();
        for row in table.rows_for_event(event_id) {
            monitor.add_tel(
                i32_at(table, "tel_id", row)?,
                TelMonitor {
                    n_channels: i32_at(table, "n_channels", row)? as usize,
                    n_pixels: i32_at(table, "n_pixels", row)? as usize,
                    pedestal_per_sample: [
                        Array1::from_vec(list_f64_at(table, "pedestal_high", row)?),
                        Array1::from_vec(list_f64_at(table, "pedestal_low", row)?),
                    ],
                    dc_to_pe: [
                        Array1::from_vec(list_f64_at(table, "dc_to_pe_high", row)?),
                        Array1::from_vec(list_f64_at(table, "dc_to_pe_low", row)?),
                    ],
                },
            );
        }
        Ok(if monitor.is_empty() {
            None
        } else {
            Some(monitor)
        })
    }

    fn read_pointing(&self, event_id: u64) -> Result<Option<Pointing>, ReaderError> {
        let table = match self.file.get("events/pointing") {
            Some(table) => table,
            None => return Ok(None),
        };
        let row = match table.rows_for_event(event_id).first() {
            Some(&row) => row,
            None => return Ok(None),
        };
        let tel_ids = list_i32_at(table, "tel_id", row)?;
        let azimuths = list_f64_at(table, "tel_azimuth", row)?;
        let altitudes = list_f64_at(table, "tel_altitude", row)?;
        let mut tels = BTreeMap::new();
        for ((tel_id, azimuth), altitude) in tel_ids.into_iter().zip(azimuths).zip(altitudes) {
            tels.insert(tel_id, TelescopePointing { azimuth, altitude });
        }
        Ok(Some(Pointing {
            array_azimuth: f64_at(table, "array_azimuth", row)?,
            array_altitude: f64_at(table, "array_altitude", row)?,
            tels,
        }))
    }
}

impl Iterator for DataFileReader {
    type Item = Result<ArrayEvent, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.event_ids.len() {
            return None;
        }
        let event = self.event_at(self.cursor);
        self.cursor += 1;
        Some(event)
    }
}

fn shape_waveform(flat: Vec<u16>, n_pixels: usize, n_samples: usize) -> Array2<u16> {
    Array2::from_shape_vec((n_pixels, n_samples), flat)
        .unwrap_or_else(|_| Array2::zeros((n_pixels, n_samples)))
}

fn row_for_tel(table: &Table, tel_id: TelId) -> Result<usize, ReaderError> {
    for row in 0..table.n_rows() {
        if i32_at(table, "tel_id", row)? == tel_id {
            return Ok(row);
        }
    }
    Err(ReaderError::BadCell {
        table: table.name.clone(),
        column: "tel_id".to_string(),
    })
}

fn bad_cell(table: &Table, column: &str) -> ReaderError {
    ReaderError::BadCell {
        table: table.name.clone(),
        column: column.to_string(),
    }
}

fn f64_at(table: &Table, column: &str, row: usize) -> Result<f64, ReaderError> {
    table
        .value(column, row)?
        .as_f64()
        .ok_or_else(|| bad_cell(table, column))
}

fn i32_at(table: &Table, column: &str, row: usize) -> Result<i32, ReaderError> {
    table
        .value(column, row)?
        .as_i32()
        .ok_or_else(|| bad_cell(table, column))
}

fn bool_at(table: &Table, column: &str, row: usize) -> Result<bool, ReaderError> {
    table
        .value(column, row)?
        .as_bool()
        .ok_or_else(|| bad_cell(table, column))
}

fn str_at(table: &Table, column: &str, row: usize) -> Result<String, ReaderError> {
    table
        .value(column, row)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| bad_cell(table, column))
}

fn list_f64_at(table: &Table, column: &str, row: usize) -> Result<Vec<f64>, ReaderError> {
    table
        .value(column, row)?
        .into_list_f64()
        .ok_or_else(|| bad_cell(table, column))
}

fn list_i32_at(table: &Table, column: &str, row: usize) -> Result<Vec<i32>, ReaderError> {
    table
        .value(column, row)?
        .into_list_i32()
        .ok_or_else(|| bad_cell(table, column))
}

fn list_u16_at(table: &Table, column: &str, row: usize) -> Result<Vec<u16>, ReaderError> {
    table
        .value(column, row)?
        .into_list_u16()
        .ok_or_else(|| bad_cell(table, column))
}

fn list_u32_at(table: &Table, column: &str, row: usize) -> Result<Vec<u32>, ReaderError> {
    table
        .value(column, row)?
        .into_list_u32()
        .ok_or_else(|| bad_cell(table, column))
}

fn u64_column(table: &Table, column: &str) -> Result<Vec<u64>, ReaderError> {
    (0..table.n_rows())
        .map(|row| {
            table
                .value(column, row)?
                .as_u64()
                .ok_or_else(|| bad_cell(table, column))
        })
        .collect()
}

fn i32_column(table: &Table, column: &str) -> Result<Vec<i32>, ReaderError> {
    (0..table.n_rows())
        .map(|row| i32_at(table, column, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraDescription, CameraGeometry, CameraReadout};
    use crate::event::{
        Dl0Camera, Dl0Event, Dl1Camera, Dl1Event, Dl2Event, EventMonitor, Pointing, R0Camera,
        R0Event, R1Camera, R1Event, ReconstructedGeometry, SimulatedEvent, SimulatedShower,
        TelMonitor, TelescopePointing,
    };
    use crate::io::write::DataWriter;
    use crate::stats::{Axis, Histogram, Histogram1D, Statistics};
    use crate::subarray::{OpticsDescription, SubarrayDescription, TelescopeDescription};
    use approx::assert_abs_diff_eq;

    fn test_subarray() -> SubarrayDescription {
        let mut subarray = SubarrayDescription {
            reference_position: [0.0, 0.0, 2200.0],
            ..Default::default()
        };
        for (tel_id, x) in [(1, 75.0), (2, -75.0)] {
            let geometry = CameraGeometry::new(
                "RoundTripCam".to_string(),
                ndarray::array![0.0, 0.1, 0.2, 0.3],
                ndarray::array![0.0, 0.0, 0.1, 0.1],
                Array1::from_elem(4, 0.01),
                Array1::from_elem(4, 2),
                5.0,
                false,
            )
            .unwrap();
            let readout = CameraReadout {
                camera_name: "RoundTripCam".to_string(),
                sampling_rate: 1.0,
                reference_pulse_shape: ndarray::array![[0.0, 1.0, 0.5], [0.2, 0.9, 0.1]],
                reference_pulse_sample_width: 1.0,
                n_channels: 2,
                n_pixels: 4,
                n_samples: 3,
            };
            let optics = OpticsDescription {
                optics_name: "MST".to_string(),
                num_mirrors: 1,
                mirror_area: 88.0,
                equivalent_focal_length: 16.0,
                effective_focal_length: 16.4,
            };
            subarray.tels.insert(
                tel_id,
                TelescopeDescription::new(CameraDescription { geometry, readout }, optics),
            );
            subarray.tel_positions.insert(tel_id, [x, 10.0, 0.5]);
        }
        subarray
    }

    fn test_event(event_id: u64) -> ArrayEvent {
        let mut event = ArrayEvent {
            event_id,
            run_id: 900,
            ..Default::default()
        };

        let mut r0 = R0Event::new();
        let mut r1 = R1Event::new();
        let mut dl0 = Dl0Event::new();
        let mut dl1 = Dl1Event::new();
        let mut monitor = EventMonitor::new();
        for tel_id in [1, 2] {
            let scale = tel_id as f64;
            r0.add_tel(
                tel_id,
                R0Camera {
                    waveform: [
                        Array2::from_shape_fn((4, 3), |(p, s)| (p * 3 + s) as u16),
                        Array2::zeros((4, 3)),
                    ],
                    waveform_sum: if tel_id == 1 {
                        Some([Array1::from_vec(vec![3, 12, 21, 30]), Array1::zeros(4)])
                    } else {
                        None
                    },
                },
            );
            r1.add_tel(
                tel_id,
                R1Camera {
                    waveform: Array2::from_shape_fn((4, 3), |(p, s)| scale * (p + s) as f64),
                    gain_selection: ndarray::array![0, 1, 0, 0],
                },
            );
            dl0.add_tel(
                tel_id,
                Dl0Camera {
                    image: ndarray::array![1.5, 2.5, 3.5, 4.5] * scale,
                    peak_time: ndarray::array![1.0, 1.25, 1.5, 1.75],
                },
            );
            let mut parameters = crate::event::ImageParameters::default();
            parameters.hillas.intensity = 120.0 * scale;
            parameters.hillas.x = 0.01;
            parameters.hillas.y = -0.02;
            parameters.hillas.length = 0.05;
            parameters.hillas.width = 0.01;
            parameters.hillas.psi = 0.3;
            parameters.morphology.n_pixels = 3;
            parameters.morphology.n_islands = 1;
            parameters.morphology.n_small_islands = 1;
            parameters.leakage.intensity_width_1 = 0.125;
            parameters.concentration.pixel = 0.4;
            parameters.intensity.intensity_max = 4.5 * scale;
            parameters.extra.miss = 0.012;
            dl1.add_tel(
                tel_id,
                Dl1Camera {
                    image: ndarray::array![1.5, 2.5, 3.5, 4.5] * scale,
                    peak_time: ndarray::array![1.0, 1.25, 1.5, 1.75],
                    mask: vec![false, true, true, true],
                    parameters,
                },
            );
            let mut tel_monitor = TelMonitor::unit(4);
            tel_monitor.pedestal_per_sample[0].fill(20.0);
            monitor.add_tel(tel_id, tel_monitor);
        }

        let mut dl2 = Dl2Event::default();
        dl2.geometry.insert(
            "HillasReconstructor".to_string(),
            ReconstructedGeometry {
                is_valid: true,
                alt: 1.25,
                az: 0.4,
                alt_uncertainty: 1e-6,
                az_uncertainty: 2e-6,
                core_x: 42.0,
                core_y: -17.0,
                tilted_core_x: 40.0,
                tilted_core_y: -16.0,
                tilted_core_uncertainty_x: 0.5,
                tilted_core_uncertainty_y: 0.6,
                hmax: 9400.0,
                direction_error: 0.001,
                telescopes: vec![1, 2],
            },
        );
        dl2.add_tel_impact(1, "HillasReconstructor", 101.5);
        dl2.add_tel_impact(2, "HillasReconstructor", 88.25);

        event.simulation = Some(SimulatedEvent {
            shower: SimulatedShower {
                energy: 2.5,
                alt: 1.26,
                az: 0.41,
                core_x: 44.0,
                core_y: -15.0,
                h_first_int: 21000.0,
                x_max: 380.0,
                h_max: 9100.0,
                starting_grammage: 0.0,
                shower_primary_id: 0,
            },
            tels: BTreeMap::new(),
        });
        event.pointing = Some(Pointing {
            array_azimuth: 0.4,
            array_altitude: 1.25,
            tels: [(1, TelescopePointing { azimuth: 0.4, altitude: 1.25 })]
                .into_iter()
                .collect(),
        });
        event.r0 = Some(r0);
        event.r1 = Some(r1);
        event.dl0 = Some(dl0);
        event.dl1 = Some(dl1);
        event.dl2 = Some(dl2);
        event.monitor = Some(monitor);
        event
    }

    fn all_levels_config() -> serde_json::Value {
        serde_json::json!({
            "write_r0": true,
            "write_r1": true,
            "write_dl0": true,
            "write_dl1": true,
            "write_dl1_image": true,
            "write_dl2": true,
            "write_monitor": true,
            "write_pointing": true,
        })
    }

    #[test]
    fn round_trip_preserves_every_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.lact");
        let subarray = test_subarray();

        let mut writer = DataWriter::new(&path, Some(&all_levels_config())).unwrap();
        writer.write_subarray(&subarray).unwrap();
        let events = [test_event(11), test_event(12)];
        for event in &events {
            writer.write_event(event).unwrap();
        }
        let mut statistics = Statistics::new();
        statistics.add_histogram(
            "intensity",
            Histogram::One(Histogram1D::new(Axis::regular(0.0, 10.0, 5))),
        );
        statistics.fill_1d("intensity", 3.0);
        writer.write_statistics(&statistics).unwrap();
        writer.close().unwrap();

        let reader = DataFileReader::open(&path, "").unwrap();
        assert_eq!(reader.n_events(), 2);
        assert_eq!(reader.statistics(), &statistics);

        let restored_subarray = reader.subarray().unwrap();
        assert_eq!(restored_subarray.n_tels(), 2);
        assert_abs_diff_eq!(
            restored_subarray.tels[&1].optics.effective_focal_length,
            16.4,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            restored_subarray.tels[&2].camera.readout.reference_pulse_shape[(1, 1)],
            0.9,
            epsilon = 1e-12
        );

        for (index, original) in events.iter().enumerate() {
            let restored = reader.event_at(index).unwrap();
            assert_eq!(restored.event_id, original.event_id);
            assert_eq!(restored.run_id, 900);

            let (r0_a, r0_b) = (original.r0.as_ref().unwrap(), restored.r0.as_ref().unwrap());
            assert_eq!(r0_a.tel_ids(), r0_b.tel_ids());
            for tel_id in r0_a.tel_ids() {
                let (a, b) = (&r0_a.tels[&tel_id], &r0_b.tels[&tel_id]);
                assert_eq!(a.waveform, b.waveform);
                assert_eq!(a.waveform_sum, b.waveform_sum);
            }

            let (r1_a, r1_b) = (original.r1.as_ref().unwrap(), restored.r1.as_ref().unwrap());
            for tel_id in r1_a.tel_ids() {
                let (a, b) = (&r1_a.tels[&tel_id], &r1_b.tels[&tel_id]);
                assert_eq!(a.gain_selection, b.gain_selection);
                for (x, y) in a.waveform.iter().zip(b.waveform.iter()) {
                    assert_abs_diff_eq!(x, y, epsilon = 1e-12);
                }
            }

            let (dl0_a, dl0_b) = (
                original.dl0.as_ref().unwrap(),
                restored.dl0.as_ref().unwrap(),
            );
            for tel_id in dl0_a.tel_ids() {
                let (a, b) = (&dl0_a.tels[&tel_id], &dl0_b.tels[&tel_id]);
                for (x, y) in a.image.iter().zip(b.image.iter()) {
                    assert_abs_diff_eq!(x, y, epsilon = 1e-12);
                }
                for (x, y) in a.peak_time.iter().zip(b.peak_time.iter()) {
                    assert_abs_diff_eq!(x, y, epsilon = 1e-12);
                }
            }

            let (dl1_a, dl1_b) = (
                original.dl1.as_ref().unwrap(),
                restored.dl1.as_ref().unwrap(),
            );
            for tel_id in dl1_a.tel_ids() {
                let (a, b) = (&dl1_a.tels[&tel_id], &dl1_b.tels[&tel_id]);
                assert_eq!(a.mask, b.mask);
                assert_abs_diff_eq!(
                    a.parameters.hillas.intensity,
                    b.parameters.hillas.intensity,
                    epsilon = 1e-12
                );
                assert_abs_diff_eq!(
                    a.parameters.leakage.intensity_width_1,
                    b.parameters.leakage.intensity_width_1,
                    epsilon = 1e-12
                );
                assert_eq!(
                    a.parameters.morphology.n_small_islands,
                    b.parameters.morphology.n_small_islands
                );
                assert_abs_diff_eq!(
                    a.parameters.extra.miss,
                    b.parameters.extra.miss,
                    epsilon = 1e-12
                );
            }

            let (dl2_a, dl2_b) = (
                original.dl2.as_ref().unwrap(),
                restored.dl2.as_ref().unwrap(),
            );
            let (geo_a, geo_b) = (
                &dl2_a.geometry["HillasReconstructor"],
                &dl2_b.geometry["HillasReconstructor"],
            );
            assert_eq!(geo_a.is_valid, geo_b.is_valid);
            assert_eq!(geo_a.telescopes, geo_b.telescopes);
            assert_abs_diff_eq!(geo_a.alt, geo_b.alt, epsilon = 1e-12);
            assert_abs_diff_eq!(geo_a.hmax, geo_b.hmax, epsilon = 1e-12);
            assert_abs_diff_eq!(
                dl2_a.tels[&1].impact["HillasReconstructor"].distance,
                dl2_b.tels[&1].impact["HillasReconstructor"].distance,
                epsilon = 1e-12
            );

            let (sim_a, sim_b) = (
                original.simulation.as_ref().unwrap(),
                restored.simulation.as_ref().unwrap(),
            );
            assert_abs_diff_eq!(sim_a.shower.energy, sim_b.shower.energy, epsilon = 1e-12);
            assert_abs_diff_eq!(sim_a.shower.core_x, sim_b.shower.core_x, epsilon = 1e-12);

            let (point_a, point_b) = (
                original.pointing.as_ref().unwrap(),
                restored.pointing.as_ref().unwrap(),
            );
            assert_abs_diff_eq!(
                point_a.array_altitude,
                point_b.array_altitude,
                epsilon = 1e-12
            );
            assert_eq!(point_a.tels.len(), point_b.tels.len());

            let (mon_a, mon_b) = (
                original.monitor.as_ref().unwrap(),
                restored.monitor.as_ref().unwrap(),
            );
            for tel_id in mon_a.tel_ids() {
                assert_eq!(
                    mon_a.tels[&tel_id].pedestal_per_sample,
                    mon_b.tels[&tel_id].pedestal_per_sample
                );
            }
        }
    }

    #[test]
    fn missing_tables_read_back_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dl1only.lact");
        // Default flags: no R0/R1/DL0.
        let mut writer = DataWriter::new(&path, None).unwrap();
        writer.write_event(&test_event(5)).unwrap();
        writer.close().unwrap();

        let reader = DataFileReader::open(&path, "").unwrap();
        let event = reader.event_at(0).unwrap();
        assert!(event.r0.is_none());
        assert!(event.r1.is_none());
        assert!(event.dl0.is_none());
        assert!(event.dl1.is_some());
        assert!(event.dl2.is_some());
        // Image arrays were not written with the default flags.
        assert!(event.dl1.as_ref().unwrap().tels[&1].image.is_empty());
    }

    #[test]
    fn random_access_is_bounds_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounds.lact");
        let mut writer = DataWriter::new(&path, None).unwrap();
        writer.write_event(&test_event(1)).unwrap();
        writer.close().unwrap();

        let reader = DataFileReader::open(&path, "").unwrap();
        assert!(reader.event_at(0).is_ok());
        assert!(matches!(
            reader.event_at(3),
            Err(ReaderError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn overwrite_protection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.lact");
        std::fs::write(&path, b"occupied").unwrap();
        let config = serde_json::json!({ "overwrite": false });
        assert!(matches!(
            DataWriter::new(&path, Some(&config)),
            Err(crate::io::write::WriterError::AlreadyExists { .. })
        ));
        assert!(DataWriter::new(&path, None).is_ok());
    }
}
