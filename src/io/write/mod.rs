// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The data-level writer: each level goes to its own named table, plus a
//! per-level event-index table recording `(event_id, [telescope_ids])`.
//! Tables are created lazily on the first occurrence of their level; the
//! `(event_id, tel_id)` secondary indices are built on close.

mod error;

pub use error::WriterError;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info};
use strum_macros::{Display, EnumString};

use crate::atmosphere::TableAtmosphereModel;
use crate::config::{get_bool, get_str, merge_with_defaults};
use crate::event::ArrayEvent;
use crate::io::compression::resolve_path;
use crate::io::table::{ColumnType, Table, TableFile, Value};
use crate::simconfig::SimulationConfig;
use crate::stats::{Histogram, Statistics};
use crate::subarray::{SubarrayDescription, TelId};

/// Output container kinds. There is only one today, but the tag keeps the
/// configuration format stable.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
pub enum OutputType {
    #[strum(serialize = "lactdf")]
    Lactdf,
}

#[derive(Clone, Debug)]
struct WriterConfig {
    overwrite: bool,
    url_prefix: String,
    write_r0: bool,
    write_r1: bool,
    write_dl0: bool,
    write_dl1: bool,
    write_dl1_image: bool,
    write_dl2: bool,
    write_monitor: bool,
    write_pointing: bool,
    write_simulation_shower: bool,
    write_simulated_camera: bool,
    write_atmosphere_model: bool,
    write_subarray: bool,
    write_simulation_config: bool,
    write_metaparam: bool,
}

/// Writes selected data levels of a run to one columnar file.
pub struct DataWriter {
    path: PathBuf,
    config: WriterConfig,
    config_document: serde_json::Value,
    file: TableFile,
    closed: bool,
}

impl DataWriter {
    /// Open an output file. With `overwrite` unset, an existing file is an
    /// error; otherwise it is truncated immediately so a crashed run cannot
    /// leave a stale complete-looking file behind.
    pub fn new<P: AsRef<Path>>(
        path: P,
        config: Option<&serde_json::Value>,
    ) -> Result<DataWriter, WriterError> {
        let path = path.as_ref().to_path_buf();
        let config_document = merge_with_defaults(DataWriter::default_config(), config);

        let output_type = get_str(&config_document, "output_type")?;
        OutputType::from_str(&output_type)
            .map_err(|_| WriterError::BadOutputType(output_type.clone()))?;

        let config = WriterConfig {
            overwrite: get_bool(&config_document, "overwrite")?,
            url_prefix: get_str(&config_document, "eos_url")?,
            write_r0: get_bool(&config_document, "write_r0")?,
            write_r1: get_bool(&config_document, "write_r1")?,
            write_dl0: get_bool(&config_document, "write_dl0")?,
            write_dl1: get_bool(&config_document, "write_dl1")?,
            write_dl1_image: get_bool(&config_document, "write_dl1_image")?,
            write_dl2: get_bool(&config_document, "write_dl2")?,
            write_monitor: get_bool(&config_document, "write_monitor")?,
            write_pointing: get_bool(&config_document, "write_pointing")?,
            write_simulation_shower: get_bool(&config_document, "write_simulation_shower")?,
            write_simulated_camera: get_bool(&config_document, "write_simulated_camera")?,
            write_atmosphere_model: get_bool(&config_document, "write_atmosphere_model")?,
            write_subarray: get_bool(&config_document, "write_subarray")?,
            write_simulation_config: get_bool(&config_document, "write_simulation_config")?,
            write_metaparam: get_bool(&config_document, "write_metaparam")?,
        };

        let (resolved, _) = resolve_path(&path, &config.url_prefix);
        if resolved.exists() && !config.overwrite {
            return Err(WriterError::AlreadyExists { path: resolved });
        }
        std::fs::File::create(&resolved).map_err(|err| WriterError::FileOpen {
            path: resolved.clone(),
            err,
        })?;
        info!("Writing to {}", path.display());

        Ok(DataWriter {
            path,
            config,
            config_document,
            file: TableFile::new(),
            closed: false,
        })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "output_type": "lactdf",
            "eos_url": "",
            "overwrite": true,
            "write_simulation_shower": true,
            "write_simulated_camera": false,
            "write_r0": false,
            "write_r1": false,
            "write_dl0": false,
            "write_dl1": true,
            "write_dl1_image": false,
            "write_dl2": true,
            "write_monitor": false,
            "write_pointing": true,
            "write_simulation_config": true,
            "write_atmosphere_model": true,
            "write_subarray": true,
            "write_metaparam": true,
        })
    }

    /// Static subarray tables, written once at the start of a run.
    pub fn write_subarray(&mut self, subarray: &SubarrayDescription) -> Result<(), WriterError> {
        if !self.config.write_subarray {
            return Ok(());
        }
        let reference = table(
            &mut self.file,
            "subarray/reference_position",
            &[
                ("pos_x", ColumnType::F64),
                ("pos_y", ColumnType::F64),
                ("pos_z", ColumnType::F64),
            ],
        );
        reference.push_row(vec![
            Value::F64(subarray.reference_position[0]),
            Value::F64(subarray.reference_position[1]),
            Value::F64(subarray.reference_position[2]),
        ])?;

        let positions = table(
            &mut self.file,
            "subarray/tel_positions",
            &[
                ("tel_id", ColumnType::I32),
                ("pos_x", ColumnType::F64),
                ("pos_y", ColumnType::F64),
                ("pos_z", ColumnType::F64),
            ],
        );
        for (&tel_id, position) in &subarray.tel_positions {
            positions.push_row(vec![
                Value::I32(tel_id),
                Value::F64(position[0]),
                Value::F64(position[1]),
                Value::F64(position[2]),
            ])?;
        }

        let optics = table(
            &mut self.file,
            "subarray/optics",
            &[
                ("tel_id", ColumnType::I32),
                ("optics_name", ColumnType::Str),
                ("num_mirrors", ColumnType::I32),
                ("mirror_area", ColumnType::F64),
                ("equivalent_focal_length", ColumnType::F64),
                ("effective_focal_length", ColumnType::F64),
            ],
        );
        for (&tel_id, description) in &subarray.tels {
            optics.push_row(vec![
                Value::I32(tel_id),
                Value::Str(description.optics.optics_name.clone()),
                Value::I32(description.optics.num_mirrors),
                Value::F64(description.optics.mirror_area),
                Value::F64(description.optics.equivalent_focal_length),
                Value::F64(description.optics.effective_focal_length),
            ])?;
        }

        let geometry = table(
            &mut self.file,
            "subarray/camera/geometry",
            &[
                ("tel_id", ColumnType::I32),
                ("camera_name", ColumnType::Str),
                ("pix_x", ColumnType::ListF64),
                ("pix_y", ColumnType::ListF64),
                ("pix_area", ColumnType::ListF64),
                ("pix_type", ColumnType::ListI32),
                ("cam_rotation", ColumnType::F64),
            ],
        );
        for (&tel_id, description) in &subarray.tels {
            let g = &description.camera.geometry;
            geometry.push_row(vec![
                Value::I32(tel_id),
                Value::Str(g.camera_name.clone()),
                Value::ListF64(g.pix_x.to_vec()),
                Value::ListF64(g.pix_y.to_vec()),
                Value::ListF64(g.pix_area.to_vec()),
                Value::ListI32(g.pix_type.to_vec()),
                Value::F64(g.cam_rotation),
            ])?;
        }

        let readout = table(
            &mut self.file,
            "subarray/camera/readout",
            &[
                ("tel_id", ColumnType::I32),
                ("camera_name", ColumnType::Str),
                ("sampling_rate", ColumnType::F64),
                ("reference_pulse_sample_width", ColumnType::F64),
                ("reference_pulse_shape", ColumnType::ListF64),
                ("reference_pulse_shape_length", ColumnType::I32),
                ("n_channels", ColumnType::I32),
                ("n_pixels", ColumnType::I32),
                ("n_samples", ColumnType::I32),
            ],
        );
        for (&tel_id, description) in &subarray.tels {
            let r = &description.camera.readout;
            let shape_length = r.reference_pulse_shape.ncols();
            readout.push_row(vec![
                Value::I32(tel_id),
                Value::Str(r.camera_name.clone()),
                Value::F64(r.sampling_rate),
                Value::F64(r.reference_pulse_sample_width),
                Value::ListF64(r.reference_pulse_shape.iter().copied().collect()),
                Value::I32(shape_length as i32),
                Value::I32(r.n_channels as i32),
                Value::I32(r.n_pixels as i32),
                Value::I32(r.n_samples as i32),
            ])?;
        }
        Ok(())
    }

    pub fn write_atmosphere(&mut self, model: &TableAtmosphereModel) -> Result<(), WriterError> {
        if !self.config.write_atmosphere_model {
            return Ok(());
        }
        let atmosphere = table(
            &mut self.file,
            "cfg/atmosphere_model",
            &[
                ("name", ColumnType::Str),
                ("alt_km", ColumnType::ListF64),
                ("rho", ColumnType::ListF64),
                ("thick", ColumnType::ListF64),
                ("refidx_m1", ColumnType::ListF64),
            ],
        );
        atmosphere.push_row(vec![
            Value::Str(model.name.clone()),
            Value::ListF64(model.alt_km.to_vec()),
            Value::ListF64(model.rho.to_vec()),
            Value::ListF64(model.thick.to_vec()),
            Value::ListF64(model.refidx_m1.to_vec()),
        ])?;
        Ok(())
    }

    pub fn write_simulation_config(
        &mut self,
        config: &SimulationConfig,
    ) -> Result<(), WriterError> {
        if !self.config.write_simulation_config {
            return Ok(());
        }
        let simulation = table(
            &mut self.file,
            "cfg/simulation_config",
            &[
                ("run_number", ColumnType::I32),
                ("corsika_version", ColumnType::F64),
                ("simtel_version", ColumnType::F64),
                ("energy_range_min", ColumnType::F64),
                ("energy_range_max", ColumnType::F64),
                ("spectral_index", ColumnType::F64),
                ("obs_level", ColumnType::F64),
                ("core_pos_mode", ColumnType::I32),
                ("core_range_x", ColumnType::F64),
                ("core_range_y", ColumnType::F64),
                ("viewcone_min", ColumnType::F64),
                ("viewcone_max", ColumnType::F64),
                ("n_showers", ColumnType::I32),
                ("shower_reuse", ColumnType::I32),
                ("primary_id", ColumnType::I32),
                ("injection_height", ColumnType::F64),
                ("atmosphere_id", ColumnType::I32),
            ],
        );
        simulation.push_row(vec![
            Value::I32(config.run_number),
            Value::F64(config.corsika_version),
            Value::F64(config.simtel_version),
            Value::F64(config.energy_range_min),
            Value::F64(config.energy_range_max),
            Value::F64(config.spectral_index),
            Value::F64(config.obs_level),
            Value::I32(config.core_pos_mode),
            Value::F64(config.core_range_x),
            Value::F64(config.core_range_y),
            Value::F64(config.viewcone_min),
            Value::F64(config.viewcone_max),
            Value::I32(config.n_showers),
            Value::I32(config.shower_reuse),
            Value::I32(config.primary_id),
            Value::F64(config.injection_height),
            Value::I32(config.atmosphere_id),
        ])?;
        Ok(())
    }

    /// Global and per-telescope metadata pairs.
    pub fn write_metadata<'a, I>(&mut self, entries: I) -> Result<(), WriterError>
    where
        I: IntoIterator<Item = (TelId, &'a str, &'a str)>,
    {
        if !self.config.write_metaparam {
            return Ok(());
        }
        let metadata = table(
            &mut self.file,
            "cfg/metadata",
            &[
                ("tel_id", ColumnType::I32),
                ("name", ColumnType::Str),
                ("value", ColumnType::Str),
            ],
        );
        for (tel_id, name, value) in entries {
            metadata.push_row(vec![
                Value::I32(tel_id),
                Value::Str(name.to_string()),
                Value::Str(value.to_string()),
            ])?;
        }
        Ok(())
    }

    /// Append one event: every enabled level that is present, plus the
    /// per-level event index rows.
    pub fn write_event(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        if self.config.write_simulation_shower {
            self.write_shower(event)?;
        }
        if self.config.write_simulated_camera {
            self.write_simulated_cameras(event)?;
        }
        if self.config.write_r0 {
            self.write_r0(event)?;
        }
        if self.config.write_r1 {
            self.write_r1(event)?;
        }
        if self.config.write_dl0 {
            self.write_dl0(event)?;
        }
        if self.config.write_dl1 {
            self.write_dl1(event)?;
        }
        if self.config.write_dl2 {
            self.write_dl2(event)?;
        }
        if self.config.write_monitor {
            self.write_monitor(event)?;
        }
        if self.config.write_pointing {
            self.write_pointing(event)?;
        }
        Ok(())
    }

    pub fn write_statistics(&mut self, statistics: &Statistics) -> Result<(), WriterError> {
        for (name, histogram) in &statistics.histograms {
            let table_name = format!("statistics/{name}");
            let stats_table = table(
                &mut self.file,
                &table_name,
                &[
                    ("dimension", ColumnType::I32),
                    ("x_axis", ColumnType::Str),
                    ("x_edges", ColumnType::ListF64),
                    ("y_axis", ColumnType::Str),
                    ("y_edges", ColumnType::ListF64),
                    ("bins", ColumnType::ListF64),
                    ("underflow", ColumnType::F64),
                    ("overflow", ColumnType::F64),
                    ("out_x", ColumnType::F64),
                    ("out_y", ColumnType::F64),
                    ("out_both", ColumnType::F64),
                ],
            );
            match histogram {
                Histogram::One(h) => stats_table.push_row(vec![
                    Value::I32(1),
                    Value::Str(h.axis.kind_name().to_string()),
                    Value::ListF64(h.axis.edges()),
                    Value::Str(String::new()),
                    Value::ListF64(Vec::new()),
                    Value::ListF64(h.bins.clone()),
                    Value::F64(h.underflow),
                    Value::F64(h.overflow),
                    Value::F64(0.0),
                    Value::F64(0.0),
                    Value::F64(0.0),
                ])?,
                Histogram::Two(h) => stats_table.push_row(vec![
                    Value::I32(2),
                    Value::Str(h.x_axis.kind_name().to_string()),
                    Value::ListF64(h.x_axis.edges()),
                    Value::Str(h.y_axis.kind_name().to_string()),
                    Value::ListF64(h.y_axis.edges()),
                    Value::ListF64(h.bins.clone()),
                    Value::F64(0.0),
                    Value::F64(0.0),
                    Value::F64(h.out_x),
                    Value::F64(h.out_y),
                    Value::F64(h.out_both),
                ])?,
            }
        }
        Ok(())
    }

    /// Build the secondary indices and flush everything to disk. Any error
    /// leaves the file corrupt; there is no partial rollback.
    pub fn close(mut self) -> Result<(), WriterError> {
        let mut indices = Vec::new();
        for (name, data_table) in &self.file.tables {
            if !name.starts_with("events/") || name.ends_with("/_index") {
                continue;
            }
            let index = data_table.build_event_tel_index();
            if !index.is_empty() {
                indices.push((format!("{name}/_index"), index));
            }
        }
        for (name, index) in indices {
            debug!("Building index {name} with {} entries", index.len());
            let index_table = table(
                &mut self.file,
                &name,
                &[
                    ("event_id", ColumnType::U64),
                    ("tel_id", ColumnType::I32),
                    ("row", ColumnType::U64),
                ],
            );
            for (event_id, tel_id, row) in index {
                index_table.push_row(vec![
                    Value::U64(event_id),
                    Value::I32(tel_id),
                    Value::U64(row),
                ])?;
            }
        }

        let config_table = table(
            &mut self.file,
            "cfg/config",
            &[("config", ColumnType::Str)],
        );
        if config_table.n_rows() == 0 {
            let document = self.config_document.to_string();
            config_table.push_row(vec![Value::Str(document)])?;
        }

        self.file.write_to(&self.path, &self.config.url_prefix)?;
        self.closed = true;
        info!("Closed {}", self.path.display());
        Ok(())
    }

    fn push_index(
        &mut self,
        level: &str,
        event: &ArrayEvent,
        tels: Vec<TelId>,
    ) -> Result<(), WriterError> {
        let name = format!("events/event_index/{level}");
        let index = table(
            &mut self.file,
            &name,
            &[
                ("event_id", ColumnType::U64),
                ("run_id", ColumnType::I32),
                ("telescopes", ColumnType::ListI32),
            ],
        );
        index.push_row(vec![
            Value::U64(event.event_id),
            Value::I32(event.run_id),
            Value::ListI32(tels),
        ])?;
        Ok(())
    }

    fn write_shower(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let simulation = match &event.simulation {
            Some(simulation) => simulation,
            None => return Ok(()),
        };
        let shower_table = table(
            &mut self.file,
            "events/simulation/shower",
            &[
                ("event_id", ColumnType::U64),
                ("energy", ColumnType::F64),
                ("alt", ColumnType::F64),
                ("az", ColumnType::F64),
                ("core_x", ColumnType::F64),
                ("core_y", ColumnType::F64),
                ("h_first_int", ColumnType::F64),
                ("x_max", ColumnType::F64),
                ("h_max", ColumnType::F64),
                ("starting_grammage", ColumnType::F64),
                ("shower_primary_id", ColumnType::I32),
            ],
        );
        let s = &simulation.shower;
        shower_table.push_row(vec![
            Value::U64(event.event_id),
            Value::F64(s.energy),
            Value::F64(s.alt),
            Value::F64(s.az),
            Value::F64(s.core_x),
            Value::F64(s.core_y),
            Value::F64(s.h_first_int),
            Value::F64(s.x_max),
            Value::F64(s.h_max),
            Value::F64(s.starting_grammage),
            Value::I32(s.shower_primary_id),
        ])?;
        Ok(())
    }

    fn write_simulated_cameras(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let simulation = match &event.simulation {
            Some(simulation) if !simulation.tels.is_empty() => simulation,
            _ => return Ok(()),
        };
        let cameras = table(
            &mut self.file,
            "events/simulation/tels",
            &[
                ("event_id", ColumnType::U64),
                ("tel_id", ColumnType::I32),
                ("true_image", ColumnType::ListI32),
                ("true_image_sum", ColumnType::I32),
                ("impact_parameter", ColumnType::F64),
            ],
        );
        for (&tel_id, camera) in &simulation.tels {
            cameras.push_row(vec![
                Value::U64(event.event_id),
                Value::I32(tel_id),
                Value::ListI32(camera.true_image.to_vec()),
                Value::I32(camera.true_image_sum),
                Value::F64(camera.impact_parameter),
            ])?;
        }
        Ok(())
    }

    fn write_r0(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let r0 = match &event.r0 {
            Some(r0) if !r0.is_empty() => r0,
            _ => return Ok(()),
        };
        let r0_table = table(
            &mut self.file,
            "events/r0",
            &[
                ("event_id", ColumnType::U64),
                ("tel_id", ColumnType::I32),
                ("n_pixels", ColumnType::I32),
                ("n_samples", ColumnType::I32),
                ("high_gain_waveform", ColumnType::ListU16),
                ("low_gain_waveform", ColumnType::ListU16),
                ("has_waveform_sum", ColumnType::Bool),
                ("high_gain_waveform_sum", ColumnType::ListU32),
                ("low_gain_waveform_sum", ColumnType::ListU32),
            ],
        );
        for (&tel_id, camera) in &r0.tels {
            let (has_sum, high_sum, low_sum) = match &camera.waveform_sum {
                Some([high, low]) => (true, high.to_vec(), low.to_vec()),
                None => (false, Vec::new(), Vec::new()),
            };
            r0_table.push_row(vec![
                Value::U64(event.event_id),
                Value::I32(tel_id),
                Value::I32(camera.n_pixels() as i32),
                Value::I32(camera.n_samples() as i32),
                Value::ListU16(camera.waveform[0].iter().copied().collect()),
                Value::ListU16(camera.waveform[1].iter().copied().collect()),
                Value::Bool(has_sum),
                Value::ListU32(high_sum),
                Value::ListU32(low_sum),
            ])?;
        }
        self.push_index("r0", event, r0.tel_ids())
    }

    fn write_r1(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let r1 = match &event.r1 {
            Some(r1) if !r1.is_empty() => r1,
            _ => return Ok(()),
        };
        let r1_table = table(
            &mut self.file,
            "events/r1",
            &[
                ("event_id", ColumnType::U64),
                ("tel_id", ColumnType::I32),
                ("n_pixels", ColumnType::I32),
                ("n_samples", ColumnType::I32),
                ("waveform", ColumnType::ListF64),
                ("gain_selection", ColumnType::ListI32),
            ],
        );
        for (&tel_id, camera) in &r1.tels {
            r1_table.push_row(vec![
                Value::U64(event.event_id),
                Value::I32(tel_id),
                Value::I32(camera.n_pixels() as i32),
                Value::I32(camera.n_samples() as i32),
                Value::ListF64(camera.waveform.iter().copied().collect()),
                Value::ListI32(camera.gain_selection.to_vec()),
            ])?;
        }
        self.push_index("r1", event, r1.tel_ids())
    }

    fn write_dl0(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let dl0 = match &event.dl0 {
            Some(dl0) if !dl0.is_empty() => dl0,
            _ => return Ok(()),
        };
        let dl0_table = table(
            &mut self.file,
            "events/dl0",
            &[
                ("event_id", ColumnType::U64),
                ("tel_id", ColumnType::I32),
                ("n_pixels", ColumnType::I32),
                ("image", ColumnType::ListF64),
                ("peak_time", ColumnType::ListF64),
            ],
        );
        for (&tel_id, camera) in &dl0.tels {
            dl0_table.push_row(vec![
                Value::U64(event.event_id),
                Value::I32(tel_id),
                Value::I32(camera.image.len() as i32),
                Value::ListF64(camera.image.to_vec()),
                Value::ListF64(camera.peak_time.to_vec()),
            ])?;
        }
        self.push_index("dl0", event, dl0.tel_ids())
    }

    fn write_dl1(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let dl1 = match &event.dl1 {
            Some(dl1) if !dl1.is_empty() => dl1,
            _ => return Ok(()),
        };
        let mut schema = vec![
            ("event_id", ColumnType::U64),
            ("tel_id", ColumnType::I32),
            ("hillas_x", ColumnType::F64),
            ("hillas_y", ColumnType::F64),
            ("hillas_length", ColumnType::F64),
            ("hillas_width", ColumnType::F64),
            ("hillas_psi", ColumnType::F64),
            ("hillas_phi", ColumnType::F64),
            ("hillas_r", ColumnType::F64),
            ("hillas_intensity", ColumnType::F64),
            ("hillas_skewness", ColumnType::F64),
            ("hillas_kurtosis", ColumnType::F64),
            ("leakage_pixels_width_1", ColumnType::F64),
            ("leakage_pixels_width_2", ColumnType::F64),
            ("leakage_intensity_width_1", ColumnType::F64),
            ("leakage_intensity_width_2", ColumnType::F64),
            ("concentration_cog", ColumnType::F64),
            ("concentration_core", ColumnType::F64),
            ("concentration_pixel", ColumnType::F64),
            ("morphology_n_pixels", ColumnType::I32),
            ("morphology_n_islands", ColumnType::I32),
            ("morphology_n_small_islands", ColumnType::I32),
            ("morphology_n_medium_islands", ColumnType::I32),
            ("morphology_n_large_islands", ColumnType::I32),
            ("intensity_max", ColumnType::F64),
            ("intensity_mean", ColumnType::F64),
            ("intensity_std", ColumnType::F64),
            ("miss", ColumnType::F64),
            ("disp", ColumnType::F64),
            ("theta", ColumnType::F64),
        ];
        if self.config.write_dl1_image {
            schema.extend_from_slice(&[
                ("n_pixels", ColumnType::I32),
                ("image", ColumnType::ListF64),
                ("peak_time", ColumnType::ListF64),
                ("mask", ColumnType::ListI32),
            ]);
        }
        let write_image = self.config.write_dl1_image;
        let dl1_table = table(&mut self.file, "events/dl1", &schema);
        for (&tel_id, camera) in &dl1.tels {
            let p = &camera.parameters;
            let mut row = vec![
                Value::U64(event.event_id),
                Value::I32(tel_id),
                Value::F64(p.hillas.x),
                Value::F64(p.hillas.y),
                Value::F64(p.hillas.length),
                Value::F64(p.hillas.width),
                Value::F64(p.hillas.psi),
                Value::F64(p.hillas.phi),
                Value::F64(p.hillas.r),
                Value::F64(p.hillas.intensity),
                Value::F64(p.hillas.skewness),
                Value::F64(p.hillas.kurtosis),
                Value::F64(p.leakage.pixels_width_1),
                Value::F64(p.leakage.pixels_width_2),
                Value::F64(p.leakage.intensity_width_1),
                Value::F64(p.leakage.intensity_width_2),
                Value::F64(p.concentration.cog),
                Value::F64(p.concentration.core),
                Value::F64(p.concentration.pixel),
                Value::I32(p.morphology.n_pixels),
                Value::I32(p.morphology.n_islands),
                Value::I32(p.morphology.n_small_islands),
                Value::I32(p.morphology.n_medium_islands),
                Value::I32(p.morphology.n_large_islands),
                Value::F64(p.intensity.intensity_max),
                Value::F64(p.intensity.intensity_mean),
                Value::F64(p.intensity.intensity_std),
                Value::F64(p.extra.miss),
                Value::F64(p.extra.disp),
                Value::F64(p.extra.theta),
            ];
            if write_image {
                row.push(Value::I32(camera.image.len() as i32));
                row.push(Value::ListF64(camera.image.to_vec()));
                row.push(Value::ListF64(camera.peak_time.to_vec()));
                row.push(Value::ListI32(
                    camera.mask.iter().map(|&m| i32::from(m)).collect(),
                ));
            }
            dl1_table.push_row(row)?;
        }
        self.push_index("dl1", event, dl1.tel_ids())
    }

    fn write_dl2(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let dl2 = match &event.dl2 {
            Some(dl2) => dl2,
            None => return Ok(()),
        };
        for (reconstructor, geometry) in &dl2.geometry {
            let name = format!("events/dl2/geometry/{reconstructor}");
            let geometry_table = table(
                &mut self.file,
                &name,
                &[
                    ("event_id", ColumnType::U64),
                    ("is_valid", ColumnType::Bool),
                    ("alt", ColumnType::F64),
                    ("az", ColumnType::F64),
                    ("alt_uncertainty", ColumnType::F64),
                    ("az_uncertainty", ColumnType::F64),
                    ("core_x", ColumnType::F64),
                    ("core_y", ColumnType::F64),
                    ("tilted_core_x", ColumnType::F64),
                    ("tilted_core_y", ColumnType::F64),
                    ("tilted_core_uncertainty_x", ColumnType::F64),
                    ("tilted_core_uncertainty_y", ColumnType::F64),
                    ("hmax", ColumnType::F64),
                    ("direction_error", ColumnType::F64),
                    ("telescopes", ColumnType::ListI32),
                ],
            );
            geometry_table.push_row(vec![
                Value::U64(event.event_id),
                Value::Bool(geometry.is_valid),
                Value::F64(geometry.alt),
                Value::F64(geometry.az),
                Value::F64(geometry.alt_uncertainty),
                Value::F64(geometry.az_uncertainty),
                Value::F64(geometry.core_x),
                Value::F64(geometry.core_y),
                Value::F64(geometry.tilted_core_x),
                Value::F64(geometry.tilted_core_y),
                Value::F64(geometry.tilted_core_uncertainty_x),
                Value::F64(geometry.tilted_core_uncertainty_y),
                Value::F64(geometry.hmax),
                Value::F64(geometry.direction_error),
                Value::ListI32(geometry.telescopes.clone()),
            ])?;
        }
        for (reconstructor, energy) in &dl2.energy {
            let name = format!("events/dl2/energy/{reconstructor}");
            let energy_table = table(
                &mut self.file,
                &name,
                &[
                    ("event_id", ColumnType::U64),
                    ("estimate_energy", ColumnType::F64),
                    ("is_valid", ColumnType::Bool),
                ],
            );
            energy_table.push_row(vec![
                Value::U64(event.event_id),
                Value::F64(energy.estimate_energy),
                Value::Bool(energy.is_valid),
            ])?;
        }
        if !dl2.tels.is_empty() {
            let tels_table = table(
                &mut self.file,
                "events/dl2/tels",
                &[
                    ("event_id", ColumnType::U64),
                    ("tel_id", ColumnType::I32),
                    ("reconstructor", ColumnType::Str),
                    ("impact_distance", ColumnType::F64),
                    ("impact_distance_uncertainty", ColumnType::F64),
                    ("estimate_energy", ColumnType::F64),
                    ("estimate_disp", ColumnType::F64),
                ],
            );
            for (&tel_id, tel) in &dl2.tels {
                for (reconstructor, impact) in &tel.impact {
                    tels_table.push_row(vec![
                        Value::U64(event.event_id),
                        Value::I32(tel_id),
                        Value::Str(reconstructor.clone()),
                        Value::F64(impact.distance),
                        Value::F64(impact.distance_uncertainty),
                        Value::F64(tel.estimate_energy),
                        Value::F64(tel.estimate_disp),
                    ])?;
                }
            }
        }
        self.push_index("dl2", event, dl2.tels.keys().copied().collect())
    }

    fn write_monitor(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let monitor = match &event.monitor {
            Some(monitor) if !monitor.is_empty() => monitor,
            _ => return Ok(()),
        };
        let monitor_table = table(
            &mut self.file,
            "events/monitor",
            &[
                ("event_id", ColumnType::U64),
                ("tel_id", ColumnType::I32),
                ("n_channels", ColumnType::I32),
                ("n_pixels", ColumnType::I32),
                ("pedestal_high", ColumnType::ListF64),
                ("pedestal_low", ColumnType::ListF64),
                ("dc_to_pe_high", ColumnType::ListF64),
                ("dc_to_pe_low", ColumnType::ListF64),
            ],
        );
        for (&tel_id, tel) in &monitor.tels {
            monitor_table.push_row(vec![
                Value::U64(event.event_id),
                Value::I32(tel_id),
                Value::I32(tel.n_channels as i32),
                Value::I32(tel.n_pixels as i32),
                Value::ListF64(tel.pedestal_per_sample[0].to_vec()),
                Value::ListF64(tel.pedestal_per_sample[1].to_vec()),
                Value::ListF64(tel.dc_to_pe[0].to_vec()),
                Value::ListF64(tel.dc_to_pe[1].to_vec()),
            ])?;
        }
        self.push_index("monitor", event, monitor.tel_ids())
    }

    fn write_pointing(&mut self, event: &ArrayEvent) -> Result<(), WriterError> {
        let pointing = match &event.pointing {
            Some(pointing) => pointing,
            None => return Ok(()),
        };
        let pointing_table = table(
            &mut self.file,
            "events/pointing",
            &[
                ("event_id", ColumnType::U64),
                ("array_azimuth", ColumnType::F64),
                ("array_altitude", ColumnType::F64),
                ("tel_id", ColumnType::ListI32),
                ("tel_azimuth", ColumnType::ListF64),
                ("tel_altitude", ColumnType::ListF64),
            ],
        );
        let tel_ids: Vec<i32> = pointing.tels.keys().copied().collect();
        let azimuths: Vec<f64> = pointing.tels.values().map(|t| t.azimuth).collect();
        let altitudes: Vec<f64> = pointing.tels.values().map(|t| t.altitude).collect();
        pointing_table.push_row(vec![
            Value::U64(event.event_id),
            Value::F64(pointing.array_azimuth),
            Value::F64(pointing.array_altitude),
            Value::ListI32(tel_ids),
            Value::ListF64(azimuths),
            Value::ListF64(altitudes),
        ])?;
        Ok(())
    }
}

impl Drop for DataWriter {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Data writer for {} dropped without close", self.path.display());
        }
    }
}

/// Get a table, creating it with `schema` on first use.
fn table<'f>(file: &'f mut TableFile, name: &str, schema: &[(&str, ColumnType)]) -> &'f mut Table {
    if file.get(name).is_none() {
        debug!("Creating table {name}");
        file.insert(Table::new(name, schema));
    }
    file.get_mut(name).unwrap()
}
