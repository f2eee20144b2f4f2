// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Stereo geometry reconstruction by intersecting the per-telescope Hillas
//! axes, in the nominal frame for the direction and in the tilted ground
//! frame for the core position.

use std::collections::BTreeMap;
use std::sync::Arc;

use itertools::Itertools;
use log::trace;

use crate::config::{get_f64, merge_with_defaults, ConfigError};
use crate::constants::{DEFAULT_HMAX_CLAMP, DEFAULT_HMAX_OFFSET};
use crate::coord::{Line2D, Point2D, SphericalDirection, TelescopeFrame, TiltedGroundFrame};
use crate::event::{ArrayEvent, Dl2Event, ReconstructedGeometry};
use crate::math::{point_line_distance_3d, weighted_mean_variance};
use crate::query::ImageQuery;
use crate::subarray::{SubarrayDescription, TelId};

/// One telescope's Hillas parameters carried into the nominal frame.
#[derive(Clone, Copy, Debug)]
struct NominalHillas {
    x: f64,
    y: f64,
    psi: f64,
    r: f64,
    intensity: f64,
    width: f64,
    length: f64,
}

/// The classical intersection method: project each passing telescope's
/// image axis into the nominal frame, intersect all pairs with Konrad
/// weights, and repeat in the tilted ground frame for the core.
pub struct HillasReconstructor {
    subarray: Arc<SubarrayDescription>,
    query: ImageQuery,
    hmax_offset: f64,
    hmax_clamp: f64,
}

impl HillasReconstructor {
    pub const NAME: &'static str = "HillasReconstructor";

    pub fn new(
        subarray: Arc<SubarrayDescription>,
        config: Option<&serde_json::Value>,
    ) -> Result<HillasReconstructor, ConfigError> {
        let config = merge_with_defaults(HillasReconstructor::default_config(), config);
        let query = match config.get("ImageQuery") {
            Some(query_config) => {
                ImageQuery::from_config(query_config).map_err(|e| ConfigError::BadValue {
                    key: "ImageQuery".to_string(),
                    value: e.to_string(),
                })?
            }
            None => ImageQuery::default(),
        };
        Ok(HillasReconstructor {
            subarray,
            query,
            hmax_offset: get_f64(&config, "hmax_offset_m")?,
            hmax_clamp: get_f64(&config, "hmax_clamp_m")?,
        })
    }

    pub fn default_config() -> serde_json::Value {
        serde_json::json!({
            "ImageQuery": "hillas_intensity > 100 && hillas_length > 0",
            "hmax_offset_m": DEFAULT_HMAX_OFFSET,
            "hmax_clamp_m": DEFAULT_HMAX_CLAMP,
        })
    }

    /// Reconstruct this event and record the geometry under
    /// [`HillasReconstructor::NAME`]. Fewer than two passing telescopes
    /// yield an invalid geometry, not an error.
    pub fn reconstruct(&self, event: &mut ArrayEvent) {
        let outcome = self.try_reconstruct(event);
        let dl2 = event.dl2.get_or_insert_with(Dl2Event::default);
        for (tel_id, impact) in outcome.telescopes {
            dl2.add_tel_impact(tel_id, HillasReconstructor::NAME, impact);
        }
        dl2.geometry
            .insert(HillasReconstructor::NAME.to_string(), outcome.geometry);
    }

    fn try_reconstruct(&self, event: &ArrayEvent) -> ReconstructionOutcome {
        let invalid = ReconstructionOutcome {
            geometry: ReconstructedGeometry::default(),
            telescopes: Vec::new(),
        };

        let (dl1, pointing) = match (&event.dl1, &event.pointing) {
            (Some(dl1), Some(pointing)) => (dl1, pointing),
            _ => return invalid,
        };

        // Telescope selection: the image query plus a finite-shape guard.
        let mut selected: Vec<TelId> = Vec::new();
        for (&tel_id, camera) in &dl1.tels {
            let hillas = &camera.parameters.hillas;
            if self.query.evaluate(&camera.parameters)
                && hillas.x.is_finite()
                && hillas.y.is_finite()
                && hillas.psi.is_finite()
            {
                selected.push(tel_id);
            }
        }
        if selected.len() < 2 {
            trace!(
                "Event {}: only {} telescopes pass the stereo query",
                event.event_id,
                selected.len()
            );
            return invalid;
        }

        let array_pointing =
            SphericalDirection::new(pointing.array_azimuth, pointing.array_altitude);
        let nominal_frame = TelescopeFrame::new(array_pointing);
        let tilted_frame = TiltedGroundFrame::new(array_pointing);

        // Project each Hillas ellipse into the nominal frame through two
        // points on its major axis.
        let mut nominal: BTreeMap<TelId, NominalHillas> = BTreeMap::new();
        for &tel_id in &selected {
            let hillas = &dl1.tels[&tel_id].parameters.hillas;
            let tel_pointing = pointing.tel_pointing(tel_id);
            let tel_frame = TelescopeFrame::new(SphericalDirection::new(
                tel_pointing.azimuth,
                tel_pointing.altitude,
            ));
            let centre = tel_frame.to_altaz(&Point2D::new(hillas.x, hillas.y));
            let along = tel_frame.to_altaz(&Point2D::new(
                hillas.x + hillas.psi.cos(),
                hillas.y + hillas.psi.sin(),
            ));
            let centre = nominal_frame.from_altaz(&centre);
            let along = nominal_frame.from_altaz(&along);
            nominal.insert(
                tel_id,
                NominalHillas {
                    x: centre.x,
                    y: centre.y,
                    psi: (along.y - centre.y).atan2(along.x - centre.x),
                    r: centre.x.hypot(centre.y),
                    intensity: hillas.intensity,
                    width: hillas.width,
                    length: hillas.length,
                },
            );
        }

        // Direction from the axis intersections in the nominal frame.
        let (fov_x, fov_y, var_x, var_y) = match intersect_pairs(&selected, &nominal, |tel_id| {
            let h = &nominal[&tel_id];
            Line2D::new(Point2D::new(h.x, h.y), (h.psi.cos(), h.psi.sin()))
        }) {
            Some(result) => result,
            None => return invalid,
        };
        let direction = nominal_frame.to_altaz(&Point2D::new(fov_x, fov_y));

        // Core from the same intersections in the tilted ground frame.
        let mut tilted_positions: BTreeMap<TelId, Point2D> = BTreeMap::new();
        for &tel_id in &selected {
            let position = match self.subarray.position(tel_id) {
                Some(p) => p,
                None => return invalid,
            };
            let tilted = tilted_frame.to_tilted(position);
            tilted_positions.insert(tel_id, Point2D::new(tilted[0], tilted[1]));
        }
        let (tilted_x, tilted_y, tilted_var_x, tilted_var_y) =
            match intersect_pairs(&selected, &nominal, |tel_id| {
                let h = &nominal[&tel_id];
                let p = tilted_positions[&tel_id];
                Line2D::new(p, (h.psi.cos(), h.psi.sin()))
            }) {
                Some(result) => result,
                None => return invalid,
            };

        // Project the tilted core back to the ground along the
        // reconstructed direction.
        let ground = tilted_frame.to_ground([tilted_x, tilted_y, 0.0]);
        let axis = direction.to_cartesian();
        let (core_x, core_y) = if axis.z.abs() < 1e-10 {
            (ground[0], ground[1])
        } else {
            let t = -ground[2] / axis.z;
            (ground[0] + t * axis.x, ground[1] + t * axis.y)
        };

        // Per-telescope impact parameter: distance to the shower axis in 3D.
        let mut telescopes: Vec<(TelId, f64)> = Vec::with_capacity(selected.len());
        for &tel_id in &selected {
            let position = self.subarray.position(tel_id).unwrap_or_default();
            let impact = point_line_distance_3d(
                position,
                [core_x, core_y, 0.0],
                [axis.x, axis.y, axis.z],
            );
            telescopes.push((tel_id, impact));
        }

        // Weighted shower-maximum height estimate.
        let hmax_terms: Vec<f64> = telescopes
            .iter()
            .map(|(tel_id, impact)| impact / nominal[tel_id].r)
            .collect();
        let hmax_weights: Vec<f64> = selected.iter().map(|t| nominal[t].intensity).collect();
        let (hmax_mean, _) = weighted_mean_variance(&hmax_terms, &hmax_weights);
        let hmax = (hmax_mean * direction.altitude.sin() + self.hmax_offset).min(self.hmax_clamp);

        let direction_error = event
            .simulation
            .as_ref()
            .map(|sim| {
                SphericalDirection::new(sim.shower.az, sim.shower.alt).angle_separation(&direction)
            })
            .unwrap_or(f64::NAN);

        ReconstructionOutcome {
            geometry: ReconstructedGeometry {
                is_valid: true,
                alt: direction.altitude,
                az: direction.azimuth,
                alt_uncertainty: var_x,
                az_uncertainty: var_y,
                core_x,
                core_y,
                tilted_core_x: tilted_x,
                tilted_core_y: tilted_y,
                tilted_core_uncertainty_x: tilted_var_x,
                tilted_core_uncertainty_y: tilted_var_y,
                hmax,
                direction_error,
                telescopes: selected,
            },
            telescopes,
        }
    }
}

struct ReconstructionOutcome {
    geometry: ReconstructedGeometry,
    telescopes: Vec<(TelId, f64)>,
}

/// Intersect all telescope pairs with the Konrad weight
/// `A_red * delta_1 * delta_2 * sin^2(psi_1 - psi_2)` where
/// `A_red = I1 I2 / (I1 + I2)` and `delta = 1 - width/length`. Pairs with a
/// zero weight denominator or parallel axes are skipped. Returns the
/// weighted mean and variance of the intersection cloud, or `None` when
/// nothing intersects.
fn intersect_pairs<F>(
    telescopes: &[TelId],
    nominal: &BTreeMap<TelId, NominalHillas>,
    line_for: F,
) -> Option<(f64, f64, f64, f64)>
where
    F: Fn(TelId) -> Line2D,
{
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut weights = Vec::new();
    for (&tel_1, &tel_2) in telescopes.iter().tuple_combinations() {
        let h1 = &nominal[&tel_1];
        let h2 = &nominal[&tel_2];
        if h1.intensity + h2.intensity == 0.0 {
            continue;
        }
        // Axes parallel to rounding precision have no usable intersection
        // even when the line solver returns a (huge) finite point.
        let sin_part = (h1.psi - h2.psi).sin();
        if sin_part.abs() < 1e-12 {
            continue;
        }
        let intersection = match line_for(tel_1).intersection(&line_for(tel_2)) {
            Some(p) => p,
            None => continue,
        };
        let reduced_amplitude = h1.intensity * h2.intensity / (h1.intensity + h2.intensity);
        let delta_1 = 1.0 - h1.width / h1.length;
        let delta_2 = 1.0 - h2.width / h2.length;
        let weight = reduced_amplitude * delta_1 * delta_2 * sin_part * sin_part;
        if !weight.is_finite() {
            continue;
        }
        xs.push(intersection.x);
        ys.push(intersection.y);
        weights.push(weight);
    }
    if weights.is_empty() || weights.iter().sum::<f64>() <= 0.0 {
        return None;
    }
    let (mean_x, var_x) = weighted_mean_variance(&xs, &weights);
    let (mean_y, var_y) = weighted_mean_variance(&ys, &weights);
    Some((mean_x, mean_y, var_x, var_y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Dl1Camera, Dl1Event, HillasParameters, ImageParameters, Pointing};
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    fn subarray_with_positions(positions: &[(TelId, [f64; 3])]) -> Arc<SubarrayDescription> {
        let mut subarray = SubarrayDescription::default();
        for &(tel_id, position) in positions {
            subarray.tel_positions.insert(tel_id, position);
        }
        Arc::new(subarray)
    }

    fn dl1_camera(hillas: HillasParameters) -> Dl1Camera {
        Dl1Camera {
            image: Array1::zeros(0),
            peak_time: Array1::zeros(0),
            mask: Vec::new(),
            parameters: ImageParameters {
                hillas,
                ..Default::default()
            },
        }
    }

    fn hillas(x: f64, y: f64, psi: f64, intensity: f64) -> HillasParameters {
        HillasParameters {
            x,
            y,
            psi,
            r: x.hypot(y),
            phi: y.atan2(x),
            length: 0.1,
            width: 0.02,
            intensity,
            skewness: 0.0,
            kurtosis: 0.0,
        }
    }

    fn stereo_event(intensity: f64) -> ArrayEvent {
        // Three axes through the common nominal-frame point (0.01, 0.02),
        // all telescopes pointing with the array.
        let mut dl1 = Dl1Event::new();
        dl1.add_tel(1, dl1_camera(hillas(0.005, 0.02, 0.0, intensity)));
        dl1.add_tel(2, dl1_camera(hillas(0.01, 0.016, std::f64::consts::FRAC_PI_2, intensity)));
        dl1.add_tel(
            3,
            dl1_camera(hillas(0.007, 0.017, std::f64::consts::FRAC_PI_4, intensity)),
        );

        let mut event = ArrayEvent {
            event_id: 1,
            ..Default::default()
        };
        event.dl1 = Some(dl1);
        event.pointing = Some(Pointing {
            array_azimuth: 0.4,
            array_altitude: 1.25,
            tels: BTreeMap::new(),
        });
        event
    }

    fn reconstructor() -> HillasReconstructor {
        let subarray = subarray_with_positions(&[
            (1, [100.0, 0.0, 0.0]),
            (2, [-60.0, 80.0, 0.0]),
            (3, [-60.0, -80.0, 5.0]),
        ]);
        HillasReconstructor::new(subarray, None).unwrap()
    }

    #[test]
    fn recovers_a_common_intersection_point() {
        let mut event = stereo_event(200.0);
        reconstructor().reconstruct(&mut event);

        let dl2 = event.dl2.as_ref().unwrap();
        let geometry = &dl2.geometry[HillasReconstructor::NAME];
        assert!(geometry.is_valid);
        assert_eq!(geometry.telescopes, vec![1, 2, 3]);

        // The weighted intersection must sit on the common point; check by
        // projecting the reconstructed direction back into the nominal
        // frame.
        let nominal = TelescopeFrame::new(SphericalDirection::new(0.4, 1.25));
        let recovered = nominal.from_altaz(&SphericalDirection::new(geometry.az, geometry.alt));
        assert_abs_diff_eq!(recovered.x, 0.01, epsilon = 1e-6);
        assert_abs_diff_eq!(recovered.y, 0.02, epsilon = 1e-6);

        // All three telescopes got an impact parameter.
        for tel_id in [1, 2, 3] {
            let impact = dl2.tels[&tel_id].impact[HillasReconstructor::NAME].distance;
            assert!(impact.is_finite() && impact >= 0.0);
        }
        assert!(geometry.hmax.is_finite());
        assert!(geometry.hmax <= 100_000.0);
    }

    #[test]
    fn too_few_passing_telescopes_yield_invalid_geometry() {
        // Intensity below the default query threshold: nothing passes.
        let mut event = stereo_event(50.0);
        reconstructor().reconstruct(&mut event);

        let dl2 = event.dl2.as_ref().unwrap();
        let geometry = &dl2.geometry[HillasReconstructor::NAME];
        assert!(!geometry.is_valid);
        assert!(geometry.telescopes.is_empty());
        assert!(dl2.tels.is_empty());
        assert!(geometry.alt.is_nan());
    }

    #[test]
    fn direction_error_against_simulation() {
        use crate::event::{SimulatedEvent, SimulatedShower};

        let mut event = stereo_event(200.0);
        let reconstructor = reconstructor();
        reconstructor.reconstruct(&mut event);
        let geometry = event.dl2.as_ref().unwrap().geometry[HillasReconstructor::NAME].clone();

        let mut with_truth = stereo_event(200.0);
        with_truth.simulation = Some(SimulatedEvent {
            shower: SimulatedShower {
                az: geometry.az,
                alt: geometry.alt,
                ..Default::default()
            },
            tels: BTreeMap::new(),
        });
        reconstructor.reconstruct(&mut with_truth);
        let geometry = &with_truth.dl2.as_ref().unwrap().geometry[HillasReconstructor::NAME];
        assert_abs_diff_eq!(geometry.direction_error, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn parallel_axes_cannot_be_intersected() {
        let mut dl1 = Dl1Event::new();
        dl1.add_tel(1, dl1_camera(hillas(0.0, 0.0, 0.3, 500.0)));
        dl1.add_tel(2, dl1_camera(hillas(0.01, 0.01, 0.3, 500.0)));
        let mut event = ArrayEvent {
            event_id: 2,
            ..Default::default()
        };
        event.dl1 = Some(dl1);
        event.pointing = Some(Pointing {
            array_azimuth: 0.0,
            array_altitude: std::f64::consts::FRAC_PI_2,
            tels: BTreeMap::new(),
        });

        let reconstructor = HillasReconstructor::new(
            subarray_with_positions(&[(1, [0.0, 0.0, 0.0]), (2, [100.0, 0.0, 0.0])]),
            None,
        )
        .unwrap();
        reconstructor.reconstruct(&mut event);
        let geometry = &event.dl2.as_ref().unwrap().geometry[HillasReconstructor::NAME];
        assert!(!geometry.is_valid);
    }
}
