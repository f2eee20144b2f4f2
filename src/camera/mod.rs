// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-telescope camera model: pixel geometry with its neighbor graph, and
//! the readout description.

mod geometry;
mod readout;

pub use geometry::{CameraGeometry, CameraGeometryError, PixelShape};
pub use readout::CameraReadout;

/// A camera is its pixel geometry paired with its readout parameters.
#[derive(Clone, Debug)]
pub struct CameraDescription {
    pub geometry: CameraGeometry,
    pub readout: CameraReadout,
}
