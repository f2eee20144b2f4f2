// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! DL0 to DL1: image cleaning and parametrization.

mod cleaning;
mod parametrize;

pub use cleaning::{tailcuts_clean, CleanerKind, TailcutsCleaner};
pub use parametrize::{
    concentration_parameters, extra_parameters, hillas_parameters, intensity_parameters,
    leakage_parameters, morphology_parameters,
};

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::prelude::*;
use rayon::prelude::*;

use crate::config::{get_i64, get_str, merge_with_defaults, ConfigError};
use crate::event::{ArrayEvent, Dl1Camera, Dl1Event, ImageParameters};
use crate::subarray::{SubarrayDescription, TelId};

/// The DL0 to DL1 stage: clean each telescope image and fill the
/// parameter block the downstream reconstruction reads.
pub struct ImageProcessor {
    subarray: Arc<SubarrayDescription>,
    cleaner: TailcutsCleaner,
    small_island_max: i64,
    medium_island_max: i64,
}

impl ImageProcessor {
    pub fn new(
        subarray: Arc<SubarrayDescription>,
        config: Option<&serde_json::Value>,
    ) -> Result<ImageProcessor, ConfigError> {
        let config = merge_with_defaults(ImageProcessor::default_config(), config);
        let cleaner_tag = get_str(&config, "image_cleaner_type")?;
        let CleanerKind::Tailcuts = CleanerKind::from_str(&cleaner_tag).map_err(|_| {
            ConfigError::BadValue {
                key: "image_cleaner_type".to_string(),
                value: cleaner_tag,
            }
        })?;
        let cleaner = TailcutsCleaner::new(config.get("Tailcuts_cleaner"))?;
        Ok(ImageProcessor {
            subarray,
            cleaner,
            small_island_max: get_i64(&config, "small_island_max")?,
            medium_island_max: get_i64(&config, "medium_island_max")?,
        })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "image_cleaner_type": "Tailcuts_cleaner",
            "Tailcuts_cleaner": TailcutsCleaner::default_config(),
            "small_island_max": 3,
            "medium_island_max": 10,
        })
    }

    /// Populate DL1 from DL0 for every telescope in the event.
    pub fn process(&self, event: &mut ArrayEvent) {
        let dl0 = match &event.dl0 {
            Some(dl0) => dl0,
            None => return,
        };
        let processed: Vec<(TelId, Dl1Camera)> = dl0
            .tels
            .par_iter()
            .filter_map(|(&tel_id, camera)| {
                let geometry = &self.subarray.tels.get(&tel_id)?.camera.geometry;
                let mask = self.cleaner.clean(geometry, &camera.image);
                let masked: Array1<f64> = camera
                    .image
                    .iter()
                    .zip(&mask)
                    .map(|(&v, &m)| if m { v } else { 0.0 })
                    .collect();

                let hillas = parametrize::hillas_parameters(geometry, &masked);
                let parameters = ImageParameters {
                    hillas,
                    leakage: parametrize::leakage_parameters(geometry, &masked),
                    concentration: parametrize::concentration_parameters(
                        geometry, &masked, &hillas,
                    ),
                    morphology: parametrize::morphology_parameters(
                        geometry,
                        &mask,
                        self.small_island_max,
                        self.medium_island_max,
                    ),
                    intensity: parametrize::intensity_parameters(&masked),
                    extra: parametrize::extra_parameters(&hillas),
                };
                Some((
                    tel_id,
                    Dl1Camera {
                        image: camera.image.clone(),
                        peak_time: camera.peak_time.clone(),
                        mask,
                        parameters,
                    },
                ))
            })
            .collect();

        let mut dl1 = Dl1Event::new();
        dl1.tels = processed.into_iter().collect::<BTreeMap<_, _>>();
        event.dl1 = Some(dl1);
    }
}
