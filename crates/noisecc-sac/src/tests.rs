use std::f64::consts::PI;

use chrono::NaiveDate;

use crate::dsp;
use crate::geo::great_circle;
use crate::header::{GeoPoint, Header};
use crate::polezero::PoleZero;
use crate::trace::Trace;

fn reference(h: u32, m: u32, s: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn sine_trace(npts: usize, delta: f64, freq: f64) -> Trace {
    let mut header = Header::new(delta);
    header.reference = Some(reference(0, 0, 0));
    let data = (0..npts)
        .map(|i| (2.0 * PI * freq * i as f64 * delta).sin())
        .collect();
    Trace::new(header, data)
}

#[test]
fn codec_roundtrips_header_and_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.sac");

    let mut trace = sine_trace(100, 0.025, 1.0);
    trace.header.b = 12.5;
    trace.header.kstnm = Some("ANMO".into());
    trace.header.knetwk = Some("IU".into());
    trace.header.kcmpnm = Some("BHZ".into());
    trace.header.kevnm = Some("COLA".into());
    trace.header.cmpaz = Some(90.0);
    trace.header.cmpinc = Some(90.0);
    trace.header.user0 = Some(7.0);
    trace.header.station = Some(GeoPoint {
        latitude: 34.946,
        longitude: -106.457,
        elevation_m: 1850.0,
    });
    trace.write(&path).expect("write");

    let restored = Trace::read(&path).expect("read");
    assert_eq!(restored.npts(), 100);
    assert_eq!(restored.header.kstnm.as_deref(), Some("ANMO"));
    assert_eq!(restored.header.knetwk.as_deref(), Some("IU"));
    assert_eq!(restored.header.kevnm.as_deref(), Some("COLA"));
    assert_eq!(restored.header.user0, Some(7.0));
    assert_eq!(restored.header.reference, trace.header.reference);
    assert!((restored.header.b - 12.5).abs() < 1e-4);
    let station = restored.header.station.expect("station coords");
    assert!((station.latitude - 34.946).abs() < 1e-3);
    for (a, b) in trace.data.iter().zip(restored.data.iter()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn codec_autodetects_big_endian_files() {
    let dir = tempfile::tempdir().unwrap();
    let little = dir.path().join("little.sac");
    let big = dir.path().join("big.sac");

    let mut trace = sine_trace(64, 0.025, 1.0);
    trace.header.kstnm = Some("ANMO".into());
    trace.header.user0 = Some(3.0);
    trace.write(&little).expect("write");

    // Swap every numeric word: the 440-byte float/int block and the sample
    // section. The character block is byte order free.
    let mut bytes = std::fs::read(&little).unwrap();
    for offset in (0..440).step_by(4).chain((632..bytes.len()).step_by(4)) {
        bytes[offset..offset + 4].reverse();
    }
    std::fs::write(&big, &bytes).unwrap();

    let restored = Trace::read(&big).expect("big-endian read");
    assert_eq!(restored.npts(), 64);
    assert_eq!(restored.header.kstnm.as_deref(), Some("ANMO"));
    assert_eq!(restored.header.user0, Some(3.0));
    assert_eq!(restored.header.reference, trace.header.reference);
    for (a, b) in trace.data.iter().zip(restored.data.iter()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn codec_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.sac");
    std::fs::write(&path, b"definitely not a sac file").unwrap();
    assert!(Trace::read(&path).is_err());
}

#[test]
fn merge_zero_fills_gaps_without_interpolating() {
    let delta = 0.5;
    let mut first = sine_trace(10, delta, 0.2);
    first.data = vec![1.0; 10];
    let mut second = sine_trace(10, delta, 0.2);
    second.data = vec![2.0; 10];
    // Second segment starts 10 s after the first ends: a 10 s gap.
    second.header.b = 10.0;

    let merged = Trace::merge(vec![second, first], 0.0).expect("merge");
    assert_eq!(merged.header.b, 0.0);
    assert_eq!(merged.npts(), 30);
    assert_eq!(merged.data[0], 1.0);
    assert_eq!(merged.data[9], 1.0);
    assert_eq!(merged.data[10], 0.0, "gap must be zero, not interpolated");
    assert_eq!(merged.data[19], 0.0);
    assert_eq!(merged.data[20], 2.0);
}

#[test]
fn merge_rejects_mixed_sampling_rates() {
    let first = sine_trace(10, 0.5, 0.2);
    let second = sine_trace(10, 0.25, 0.2);
    assert!(Trace::merge(vec![first, second], 0.0).is_err());
}

#[test]
fn cut_is_a_projection() {
    let trace = sine_trace(1000, 0.025, 1.0);
    let once = trace.cut(5.0, 15.0).expect("first cut");
    let twice = once.cut(5.0, 15.0).expect("second cut");
    assert_eq!(once.npts(), 400);
    assert_eq!(once.header.b, 5.0);
    assert_eq!(once.data, twice.data);
}

#[test]
fn cut_zero_fills_outside_the_recorded_span() {
    let trace = sine_trace(100, 1.0, 0.01);
    let padded = trace.cut(-10.0, 110.0).expect("cut");
    assert_eq!(padded.npts(), 120);
    assert_eq!(padded.data[0], 0.0);
    assert_eq!(padded.data[119], 0.0);
    assert!((padded.data[10] - trace.data[0]).abs() < 1e-12);
}

#[test]
fn demean_and_detrend_remove_their_models() {
    let mut trace = sine_trace(500, 0.1, 0.3);
    for (i, sample) in trace.data.iter_mut().enumerate() {
        *sample += 4.0 + 0.01 * i as f64;
    }
    dsp::detrend_linear(&mut trace);
    let mean: f64 = trace.data.iter().sum::<f64>() / trace.data.len() as f64;
    assert!(mean.abs() < 1e-9);
    // Residual should be the sine alone, no ramp.
    let early: f64 = trace.data[..50].iter().map(|x| x.abs()).sum();
    let late: f64 = trace.data[450..].iter().map(|x| x.abs()).sum();
    assert!((early - late).abs() / early < 0.2);
}

#[test]
fn decimate_by_twenty_keeps_the_passband() {
    // 40 Hz -> 2 Hz, the conditioning-stage scenario.
    let mut trace = sine_trace(40 * 600, 0.025, 0.1);
    dsp::decimate(&mut trace, 20).expect("decimate");
    assert_eq!(trace.npts(), 2 * 600);
    assert!((trace.header.delta - 0.5).abs() < 1e-12);
    let peak = trace.data.iter().cloned().fold(0.0f64, |a, b| a.max(b.abs()));
    assert!(peak > 0.9, "0.1 Hz signal should survive, peak {peak}");
}

#[test]
fn bandpass_attenuates_out_of_band_energy() {
    let mut in_band = sine_trace(4096, 0.05, 1.0);
    let mut out_band = sine_trace(4096, 0.05, 6.0);
    dsp::taper_hann(&mut in_band, 0.05);
    dsp::taper_hann(&mut out_band, 0.05);
    dsp::bandpass(&mut in_band, 0.5, 2.0, 4, 2);
    dsp::bandpass(&mut out_band, 0.5, 2.0, 4, 2);
    let rms = |t: &Trace| {
        (t.data.iter().map(|x| x * x).sum::<f64>() / t.data.len() as f64).sqrt()
    };
    assert!(rms(&in_band) > 10.0 * rms(&out_band));
}

#[test]
fn normalized_autocorrelation_peaks_at_one_at_zero_lag() {
    let trace = sine_trace(2048, 0.05, 0.7);
    let cc = dsp::correlate(&trace, &trace, true, None).expect("correlate");
    assert_eq!(cc.npts(), 2 * 2048 - 1);
    let zero_lag = cc.data[2048 - 1];
    assert!((zero_lag - 1.0).abs() < 1e-9);
    assert!((cc.header.b + 2047.0 * 0.05).abs() < 1e-9);
    for value in &cc.data {
        assert!(*value <= 1.0 + 1e-9);
    }
}

#[test]
fn correlation_recovers_a_known_shift() {
    let n = 1024;
    let mut header = Header::new(0.1);
    header.reference = Some(reference(0, 0, 0));
    let mut a = vec![0.0; n];
    let mut b = vec![0.0; n];
    a[100] = 1.0;
    b[130] = 1.0; // b lags a by 30 samples = 3.0 s
    let a = Trace::new(header.clone(), a);
    let b = Trace::new(header, b);
    let cc = dsp::correlate(&a, &b, false, None).expect("correlate");
    let (best, _) = cc
        .data
        .iter()
        .enumerate()
        .max_by(|x, y| x.1.partial_cmp(y.1).unwrap())
        .unwrap();
    let lag = cc.header.b + best as f64 * cc.header.delta;
    assert!((lag - 3.0).abs() < 1e-9);
}

#[test]
fn correlate_honors_max_lag() {
    let trace = sine_trace(1000, 0.5, 0.1);
    let cc = dsp::correlate(&trace, &trace, true, Some(50.0)).expect("correlate");
    assert!((cc.header.b + 50.0).abs() < 1e-9);
    assert_eq!(cc.npts(), 201);
}

#[test]
fn symmetrize_is_idempotent() {
    let mut trace = sine_trace(801, 0.5, 0.07);
    for (i, sample) in trace.data.iter_mut().enumerate() {
        *sample += (i as f64 * 0.37).cos();
    }
    dsp::symmetrize(&mut trace);
    let once = trace.data.clone();
    dsp::symmetrize(&mut trace);
    assert_eq!(once, trace.data);
    for i in 0..trace.npts() {
        assert!((trace.data[i] - trace.data[trace.npts() - 1 - i]).abs() < 1e-12);
    }
}

#[test]
fn rotation_of_pure_radial_motion_has_no_transverse_energy() {
    let baz: f64 = 60.0;
    // Ground motion aligned with the radial direction (baz + 180).
    let amp = |i: usize| (i as f64 * 0.1).sin();
    let radial_az = (baz + 180.0).to_radians();
    let north: Vec<f64> = (0..256).map(|i| amp(i) * radial_az.cos()).collect();
    let east: Vec<f64> = (0..256).map(|i| amp(i) * radial_az.sin()).collect();
    let (r, t) = dsp::rotate_ne_to_rt(&north, &east, baz);
    let r_energy: f64 = r.iter().map(|x| x * x).sum();
    let t_energy: f64 = t.iter().map(|x| x * x).sum();
    assert!(r_energy > 1.0);
    assert!(t_energy < 1e-18 * r_energy.max(1.0) + 1e-12);
}

#[test]
fn great_circle_matches_known_pair() {
    // ANMO (Albuquerque) to COLA (College, Alaska).
    let anmo = GeoPoint {
        latitude: 34.946,
        longitude: -106.457,
        elevation_m: 1850.0,
    };
    let cola = GeoPoint {
        latitude: 64.874,
        longitude: -147.862,
        elevation_m: 200.0,
    };
    let gc = great_circle(anmo, cola);
    assert!((gc.gcarc - 38.8).abs() < 0.5, "gcarc {}", gc.gcarc);
    assert!((gc.az - 333.4).abs() < 1.0, "az {}", gc.az);
    // Back azimuth is the reverse-direction azimuth, not az +/- 180 exactly.
    let reverse = great_circle(cola, anmo);
    assert!((gc.baz - reverse.az).abs() < 1e-9);
}

#[test]
fn polezero_parses_and_evaluates() {
    let content = "\
* network IU station ANMO
ZEROS 3
POLES 2
-0.0123 0.0123
-0.0123 -0.0123
CONSTANT 6.03e8
";
    let pz = PoleZero::parse(content).expect("parse");
    assert_eq!(pz.zeros.len(), 3);
    assert_eq!(pz.poles.len(), 2);
    assert!((pz.constant - 6.03e8).abs() < 1.0);
    assert_eq!(pz.zeros[0], num_complex::Complex::new(0.0, 0.0));
    // Flat velocity response well above the corner: |H| ~ constant * omega.
    let h1 = pz.evaluate(1.0).norm();
    let h2 = pz.evaluate(2.0).norm();
    assert!((h2 / h1 - 2.0).abs() < 0.05);
}

#[test]
fn polezero_rejects_malformed_files() {
    assert!(PoleZero::parse("ZEROS two").is_err());
    assert!(PoleZero::parse("0.0 0.0").is_err());
    assert!(PoleZero::parse("ZEROS 1\n0.0 0.0\n1.0 1.0").is_err());
}
