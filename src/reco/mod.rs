// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! DL1 to DL2: stereo shower reconstruction.

mod hillas;

pub use hillas::HillasReconstructor;

use std::str::FromStr;
use std::sync::Arc;

use strum_macros::{Display, EnumString};

use crate::config::{merge_with_defaults, ConfigError};
use crate::event::ArrayEvent;
use crate::subarray::SubarrayDescription;

/// The closed set of geometry reconstructors selectable from configuration.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
pub enum ReconstructorKind {
    HillasReconstructor,
}

/// The DL1 to DL2 stage: runs every configured geometry reconstructor over
/// the event.
pub struct ShowerProcessor {
    reconstructors: Vec<HillasReconstructor>,
}

impl ShowerProcessor {
    pub fn new(
        subarray: Arc<SubarrayDescription>,
        config: Option<&serde_json::Value>,
    ) -> Result<ShowerProcessor, ConfigError> {
        let config = merge_with_defaults(ShowerProcessor::default_config(), config);
        let kinds = config
            .get("GeometryReconstructionTypes")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ConfigError::WrongType {
                key: "GeometryReconstructionTypes".to_string(),
                expected: "array of strings",
            })?;

        let mut reconstructors = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let tag = kind.as_str().ok_or_else(|| ConfigError::WrongType {
                key: "GeometryReconstructionTypes".to_string(),
                expected: "array of strings",
            })?;
            let kind =
                ReconstructorKind::from_str(tag).map_err(|_| ConfigError::BadValue {
                    key: "GeometryReconstructionTypes".to_string(),
                    value: tag.to_string(),
                })?;
            match kind {
                ReconstructorKind::HillasReconstructor => reconstructors.push(
                    HillasReconstructor::new(Arc::clone(&subarray), config.get(tag))?,
                ),
            }
        }
        Ok(ShowerProcessor { reconstructors })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "GeometryReconstructionTypes": ["HillasReconstructor"],
            "HillasReconstructor": HillasReconstructor::default_config(),
        })
    }

    pub fn process(&self, event: &mut ArrayEvent) {
        for reconstructor in &self.reconstructors {
            reconstructor.reconstruct(event);
        }
    }
}
