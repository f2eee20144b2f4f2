// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthesis of small but complete block streams for the test suite: two
//! 4x4 square-pixel telescopes, one shower per event, and a bright blob in
//! each camera so the downstream stages have something to reconstruct.

use crate::io::eventio::*;

pub(crate) const TEST_RUN_ID: i32 = 900;
pub(crate) const N_PIXELS: usize = 16;
pub(crate) const N_SAMPLES: usize = 8;
pub(crate) const PEDESTAL: f64 = 20.0;

pub(crate) struct StreamSpec {
    pub(crate) n_events: usize,
}

impl StreamSpec {
    pub(crate) fn new(n_events: usize) -> StreamSpec {
        StreamSpec { n_events }
    }
}

fn camera_settings() -> CameraSettingsBlock {
    let mut pix_x = Vec::with_capacity(N_PIXELS);
    let mut pix_y = Vec::with_capacity(N_PIXELS);
    for i in 0..N_PIXELS {
        pix_x.push((i % 4) as f64 * 0.1);
        pix_y.push((i / 4) as f64 * 0.1);
    }
    CameraSettingsBlock {
        camera_name: "SquareCam".to_string(),
        n_pixels: N_PIXELS as u32,
        equivalent_focal_length: 5.0,
        effective_focal_length: 5.0,
        mirror_area: 88.0,
        num_mirrors: 1,
        cam_rotation: 0.0,
        pix_x,
        pix_y,
        pix_area: vec![0.01; N_PIXELS],
        pix_type: vec![2; N_PIXELS],
    }
}

fn pixel_settings() -> PixelSettingsBlock {
    let mut shape = vec![0.0, 1.0, 4.0, 1.0, 0.0, 0.0];
    shape.extend_from_slice(&[1.0; 6]);
    PixelSettingsBlock {
        n_channels: 2,
        n_pixels: N_PIXELS as u32,
        n_samples: N_SAMPLES as u32,
        sampling_rate_ghz: 1.0,
        reference_pulse_sample_width_ns: 1.0,
        n_ref_samples: 6,
        reference_pulse_shape: shape,
    }
}

fn monitor() -> TelescopeMonitorBlock {
    TelescopeMonitorBlock {
        n_channels: 2,
        n_pixels: N_PIXELS as u32,
        pedestal_high: vec![PEDESTAL; N_PIXELS],
        pedestal_low: vec![PEDESTAL; N_PIXELS],
        dc_to_pe_high: vec![1.0; N_PIXELS],
        dc_to_pe_low: vec![1.0; N_PIXELS],
    }
}

/// Peak pulse amplitude of one pixel: a short bright bar, horizontal in
/// telescope 1 and vertical in telescope 2.
fn pulse_amplitude(tel_id: i32, pixel: usize) -> f64 {
    match (tel_id, pixel) {
        (1, 5) => 200.0,
        (1, 6) => 150.0,
        (2, 5) => 200.0,
        (2, 9) => 150.0,
        _ => 0.0,
    }
}

fn event_telescope(tel_id: i32) -> EventTelescope {
    let mut waveform_high = vec![0u16; N_PIXELS * N_SAMPLES];
    for pixel in 0..N_PIXELS {
        let amplitude = pulse_amplitude(tel_id, pixel);
        for sample in 0..N_SAMPLES {
            let pulse = match sample {
                3 | 5 => amplitude / 2.0,
                4 => amplitude,
                _ => 0.0,
            };
            waveform_high[pixel * N_SAMPLES + sample] = (PEDESTAL + pulse) as u16;
        }
    }
    let waveform_sum: Vec<u32> = (0..N_PIXELS)
        .map(|pixel| {
            (0..N_SAMPLES)
                .map(|s| u32::from(waveform_high[pixel * N_SAMPLES + s]))
                .sum()
        })
        .collect();
    EventTelescope {
        tel_id,
        azimuth: 0.2,
        altitude: 1.3,
        n_pixels: N_PIXELS as u32,
        n_samples: N_SAMPLES as u32,
        n_channels: 2,
        waveform_high,
        waveform_low: vec![0; N_PIXELS * N_SAMPLES],
        waveform_sum: Some((waveform_sum, vec![0; N_PIXELS])),
    }
}

fn true_image(tel_id: i32) -> TrueImageBlock {
    TrueImageBlock {
        impact_parameter: 120.0,
        pe_count: (0..N_PIXELS)
            .map(|pixel| (pulse_amplitude(tel_id, pixel) * 2.0) as i32)
            .collect(),
    }
}

/// Serialize a complete stream: static configuration, then one shower and
/// one triggered event per round. Shower k carries the energy k + 1 TeV.
pub(crate) fn write_test_stream(spec: &StreamSpec) -> Vec<u8> {
    let mut writer = BlockWriter::new(Vec::new());

    let history = HistoryBlock {
        entries: vec![(1700000000, "corsika -run 900".to_string())],
    };
    writer
        .write_block(BLOCK_HISTORY, -1, &history.encode())
        .unwrap();
    let meta = MetaParamBlock {
        entries: vec![("production".to_string(), "lact-test".to_string())],
    };
    writer
        .write_block(BLOCK_METAPARAM, -1, &meta.encode())
        .unwrap();

    let run_header = RunHeaderBlock {
        run_id: TEST_RUN_ID,
        reference_position: [0.0, 0.0, 2200.0],
        tel_ids: vec![1, 2],
        tel_positions: vec![[75.0, 0.0, 0.0], [-75.0, 0.0, 0.0]],
    };
    writer
        .write_block(BLOCK_RUN_HEADER, -1, &run_header.encode())
        .unwrap();

    let mc_run_header = McRunHeaderBlock {
        run_number: TEST_RUN_ID,
        corsika_version: 7750.0,
        simtel_version: 1600.0,
        energy_range_min: 0.01,
        energy_range_max: 100.0,
        spectral_index: -2.0,
        obs_level: 2200.0,
        core_pos_mode: 1,
        core_range_x: 1000.0,
        core_range_y: 1000.0,
        viewcone_min: 0.0,
        viewcone_max: 0.0,
        n_showers: spec.n_events as i32,
        shower_reuse: 1,
        primary_id: 0,
        injection_height: 100_000.0,
        atmosphere_id: 1,
    };
    writer
        .write_block(BLOCK_MC_RUN_HEADER, -1, &mc_run_header.encode())
        .unwrap();

    let atmosphere = AtmosphereBlock {
        name: "test-atmosphere".to_string(),
        alt_km: vec![0.0, 5.0, 10.0, 20.0],
        rho: vec![1.2e-3, 7.4e-4, 4.1e-4, 8.9e-5],
        thick: vec![1030.0, 550.0, 270.0, 58.0],
        refidx_m1: vec![2.8e-4, 1.7e-4, 9.6e-5, 2.1e-5],
    };
    writer
        .write_block(BLOCK_ATMOSPHERE, -1, &atmosphere.encode())
        .unwrap();

    for tel_id in [1, 2] {
        writer
            .write_block(BLOCK_CAMERA_SETTINGS, tel_id, &camera_settings().encode())
            .unwrap();
        let organisation = CameraOrganisationBlock {
            n_pixels: N_PIXELS as u32,
            n_drawers: 4,
        };
        writer
            .write_block(BLOCK_CAMERA_ORGANISATION, tel_id, &organisation.encode())
            .unwrap();
        writer
            .write_block(BLOCK_PIXEL_SETTINGS, tel_id, &pixel_settings().encode())
            .unwrap();
        writer
            .write_block(
                BLOCK_PIXEL_DISABLED,
                tel_id,
                &PixelDisabledBlock::default().encode(),
            )
            .unwrap();
        let software = CameraSoftwareSettingsBlock {
            dyn_trig_mode: 0,
            dyn_trig_threshold: 0,
        };
        writer
            .write_block(BLOCK_CAMERA_SOFTWARE_SETTINGS, tel_id, &software.encode())
            .unwrap();
        writer
            .write_block(
                BLOCK_POINTING_CORRECTIONS,
                tel_id,
                &PointingCorrectionsBlock::default().encode(),
            )
            .unwrap();
        let tracking = TrackingSettingsBlock {
            azimuth: 0.2,
            altitude: 1.3,
        };
        writer
            .write_block(BLOCK_TRACKING_SETTINGS, tel_id, &tracking.encode())
            .unwrap();
        writer
            .write_block(BLOCK_TELESCOPE_MONITOR, tel_id, &monitor().encode())
            .unwrap();
    }

    for k in 0..spec.n_events {
        let shower = McShowerBlock {
            energy: k as f64 + 1.0,
            alt: 1.3,
            az: 0.2,
            core_x: 40.0 * k as f64,
            core_y: -15.0 * k as f64,
            h_first_int: 22_000.0,
            x_max: 350.0,
            h_max: 9000.0,
            starting_grammage: 0.0,
            primary_id: 0,
        };
        writer
            .write_block(BLOCK_MC_SHOWER, k as i32, &shower.encode())
            .unwrap();
        let mc_event = McEventBlock {
            event_id: k as u64,
            core_x: 40.0 * k as f64 + 5.0,
            core_y: -15.0 * k as f64 - 5.0,
        };
        writer
            .write_block(BLOCK_MC_EVENT, k as i32, &mc_event.encode())
            .unwrap();
        for tel_id in [1, 2] {
            writer
                .write_block(BLOCK_TRUE_IMAGE, tel_id, &true_image(tel_id).encode())
                .unwrap();
        }
        let event = EventBlock {
            event_id: k as u64,
            run_id: TEST_RUN_ID,
            array_azimuth: 0.2,
            array_altitude: 1.3,
            telescopes: vec![event_telescope(1), event_telescope(2)],
        };
        writer
            .write_block(BLOCK_EVENT, k as i32, &event.encode())
            .unwrap();
    }
    writer.into_inner()
}
