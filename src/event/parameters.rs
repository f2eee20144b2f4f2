// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parametrized descriptors of a cleaned camera image.

/// First and second moments of the cleaned charge distribution: the ellipse
/// approximating the shower image. Angles in radians, positions in the
/// field-of-view frame \[rad\].
#[derive(Clone, Copy, Debug, Default)]
pub struct HillasParameters {
    /// Centroid x
    pub x: f64,
    /// Centroid y
    pub y: f64,
    /// Standard deviation along the major axis
    pub length: f64,
    /// Standard deviation along the minor axis
    pub width: f64,
    /// Orientation of the major axis
    pub psi: f64,
    /// Polar angle of the centroid
    pub phi: f64,
    /// Distance of the centroid from the frame origin
    pub r: f64,
    /// Total charge of the cleaned image \[p.e.\]
    pub intensity: f64,
    pub skewness: f64,
    pub kurtosis: f64,
}

/// How much of the image sits on the camera border.
#[derive(Clone, Copy, Debug, Default)]
pub struct LeakageParameters {
    pub pixels_width_1: f64,
    pub pixels_width_2: f64,
    pub intensity_width_1: f64,
    pub intensity_width_2: f64,
}

/// Fractions of the image intensity inside small on-axis windows.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcentrationParameters {
    /// Within one pixel diameter of the centroid
    pub cog: f64,
    /// Inside the Hillas ellipse
    pub core: f64,
    /// In the hottest pixel
    pub pixel: f64,
}

/// Pixel and island counts of the cleaned image.
#[derive(Clone, Copy, Debug, Default)]
pub struct MorphologyParameters {
    pub n_pixels: i32,
    pub n_islands: i32,
    pub n_small_islands: i32,
    pub n_medium_islands: i32,
    pub n_large_islands: i32,
}

/// Charge statistics over the cleaned pixels.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntensityParameters {
    pub intensity_max: f64,
    pub intensity_mean: f64,
    pub intensity_std: f64,
}

/// Axis-related quantities consumed by downstream direction estimators.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtraParameters {
    /// Perpendicular distance of the major axis from the frame origin
    pub miss: f64,
    /// Distance from the origin projection to the centroid along the axis
    pub disp: f64,
    /// Angle between the major axis and the centroid radius vector
    pub theta: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageParameters {
    pub hillas: HillasParameters,
    pub leakage: LeakageParameters,
    pub concentration: ConcentrationParameters,
    pub morphology: MorphologyParameters,
    pub intensity: IntensityParameters,
    pub extra: ExtraParameters,
}
