mod common;

use noisecc_core::correlator::{CorrelationOptions, EventCorrelator};
use noisecc_core::engine::NativeEngine;
use noisecc_core::error::PipelineError;
use noisecc_core::types::StationIndex;
use noisecc_sac::Trace;

use common::{event, station, synthetic_trace, two_station_catalog, write_trace};

fn signal(i: usize) -> f64 {
    let t = i as f64 * 0.1;
    (2.0 * std::f64::consts::PI * 0.5 * t).sin() + 0.3 * (2.0 * std::f64::consts::PI * 1.3 * t).cos()
}

/// Three-component station with the given horizontal azimuths.
fn write_station(
    dir: &std::path::Path,
    tag: &str,
    name: &str,
    azimuth_east: f64,
    azimuth_north: f64,
) {
    for (channel, cmpaz, cmpinc) in [
        ("BHE", azimuth_east, 90.0),
        ("BHN", azimuth_north, 90.0),
        ("BHZ", 0.0, 0.0),
    ] {
        let mut trace = synthetic_trace(0.1, 1000, signal);
        trace.header.cmpaz = Some(cmpaz);
        trace.header.cmpinc = Some(cmpinc);
        trace.header.kstnm = Some(name.to_string());
        trace.header.knetwk = Some("XX".to_string());
        trace.header.kcmpnm = Some(channel.to_string());
        write_trace(dir, &format!("{tag}_{name}.{channel}"), &trace);
    }
}

#[test]
fn orthogonal_horizontals_produce_all_three_products() {
    let dir = tempfile::tempdir().unwrap();
    let key = event();
    let tag = key.tag();
    write_station(dir.path(), &tag, "AAA", 90.0, 0.0);
    write_station(dir.path(), &tag, "BBB", 90.0, 0.0);

    let catalog = two_station_catalog();
    let stations = catalog.station_index();
    let correlator = EventCorrelator {
        engine: &NativeEngine,
        stations: &stations,
        options: CorrelationOptions::default(),
    };
    let outcome = correlator.correlate_event(&key, dir.path()).unwrap();

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let mut names: Vec<String> = outcome.produced.iter().map(|p| p.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["AAA_BBB.RR", "AAA_BBB.TT", "AAA_BBB.ZZ"]);

    // Only final products survive cleanup.
    let mut remaining: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    remaining.sort();
    assert_eq!(remaining, vec!["AAA_BBB.RR", "AAA_BBB.TT", "AAA_BBB.ZZ"]);
}

#[test]
fn product_metadata_follows_the_direction_convention() {
    let dir = tempfile::tempdir().unwrap();
    let key = event();
    let tag = key.tag();
    write_station(dir.path(), &tag, "AAA", 90.0, 0.0);
    write_station(dir.path(), &tag, "BBB", 90.0, 0.0);

    let catalog = two_station_catalog();
    let stations = catalog.station_index();
    let correlator = EventCorrelator {
        engine: &NativeEngine,
        stations: &stations,
        options: CorrelationOptions::default(),
    };
    correlator.correlate_event(&key, dir.path()).unwrap();

    let product = Trace::read(&dir.path().join("AAA_BBB.ZZ")).unwrap();
    // Station fields belong to the second input's station, event fields to
    // the first's.
    let station_loc = product.header.station.unwrap();
    let event_loc = product.header.event.unwrap();
    // Headers are stored as f32 on disk, so compare loosely.
    assert!((station_loc.latitude - 35.9).abs() < 1e-4);
    assert!((event_loc.latitude - 35.0).abs() < 1e-4);
    assert_eq!(product.header.kstnm.as_deref(), Some("AAA-BBB"));
    assert_eq!(product.header.knetwk.as_deref(), Some("XX-XX"));
    assert_eq!(product.header.kevnm.as_deref(), Some("AAA"));
    assert_eq!(product.header.kcmpnm.as_deref(), Some("ZZ"));
    assert!(product.header.dist_km.unwrap() > 90.0);
    assert!(product.header.gcarc.unwrap() > 0.8);
}

#[test]
fn skewed_horizontals_fail_rotation_but_not_verticals() {
    let dir = tempfile::tempdir().unwrap();
    let key = event();
    let tag = key.tag();
    // AAA's horizontals are 45 degrees apart; BBB's are orthogonal.
    write_station(dir.path(), &tag, "AAA", 90.0, 45.0);
    write_station(dir.path(), &tag, "BBB", 90.0, 0.0);

    let catalog = two_station_catalog();
    let stations = catalog.station_index();
    let correlator = EventCorrelator {
        engine: &NativeEngine,
        stations: &stations,
        options: CorrelationOptions::default(),
    };
    let outcome = correlator.correlate_event(&key, dir.path()).unwrap();

    let names: Vec<String> = outcome.produced.iter().map(|p| p.to_string()).collect();
    assert_eq!(names, vec!["AAA_BBB.ZZ"]);
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].1,
        PipelineError::GeometryPrecondition { separation: 45, .. }
    ));
}

#[test]
fn azimuth_separation_grid_gates_rotation() {
    // One degree off orthogonal must refuse rotation; exactly 90 or 270
    // must rotate. BBB stays orthogonal throughout.
    for (separation, expect_rotation) in
        [(89.0, false), (90.0, true), (91.0, false), (269.0, false), (270.0, true), (271.0, false)]
    {
        let dir = tempfile::tempdir().unwrap();
        let key = event();
        let tag = key.tag();
        write_station(dir.path(), &tag, "AAA", separation, 0.0);
        write_station(dir.path(), &tag, "BBB", 90.0, 0.0);

        let catalog = two_station_catalog();
        let stations = catalog.station_index();
        let correlator = EventCorrelator {
            engine: &NativeEngine,
            stations: &stations,
            options: CorrelationOptions::default(),
        };
        let outcome = correlator.correlate_event(&key, dir.path()).unwrap();

        let mut names: Vec<String> = outcome.produced.iter().map(|p| p.to_string()).collect();
        names.sort();
        if expect_rotation {
            assert_eq!(
                names,
                vec!["AAA_BBB.RR", "AAA_BBB.TT", "AAA_BBB.ZZ"],
                "separation {separation}"
            );
            assert!(outcome.failures.is_empty(), "separation {separation}");
        } else {
            assert_eq!(names, vec!["AAA_BBB.ZZ"], "separation {separation}");
            assert!(
                outcome
                    .failures
                    .iter()
                    .any(|(_, e)| matches!(e, PipelineError::GeometryPrecondition { .. })),
                "separation {separation}"
            );
        }
    }
}

#[test]
fn rounded_azimuth_separation_tolerates_survey_noise() {
    let dir = tempfile::tempdir().unwrap();
    let key = event();
    let tag = key.tag();
    // 90.3 - 0.1 rounds to 90; rotation must proceed.
    write_station(dir.path(), &tag, "AAA", 90.3, 0.1);
    write_station(dir.path(), &tag, "BBB", 269.8, 0.2);

    let catalog = two_station_catalog();
    let stations = catalog.station_index();
    let correlator = EventCorrelator {
        engine: &NativeEngine,
        stations: &stations,
        options: CorrelationOptions::default(),
    };
    let outcome = correlator.correlate_event(&key, dir.path()).unwrap();
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.produced.len(), 3);
}

#[test]
fn three_stations_yield_each_unordered_pair_once() {
    let dir = tempfile::tempdir().unwrap();
    let key = event();
    let tag = key.tag();
    // Verticals only.
    for name in ["AAA", "BBB", "CCC"] {
        let mut trace = synthetic_trace(0.1, 500, signal);
        trace.header.cmpinc = Some(0.0);
        trace.header.kstnm = Some(name.to_string());
        trace.header.kcmpnm = Some("BHZ".to_string());
        write_trace(dir.path(), &format!("{tag}_{name}.BHZ"), &trace);
    }

    let mut catalog = two_station_catalog();
    catalog.stations.push(station("YY", "CCC", 36.2, -105.5));
    let stations = catalog.station_index();
    let correlator = EventCorrelator {
        engine: &NativeEngine,
        stations: &stations,
        options: CorrelationOptions::default(),
    };
    let outcome = correlator.correlate_event(&key, dir.path()).unwrap();

    let mut names: Vec<String> = outcome.produced.iter().map(|p| p.to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["AAA_BBB.ZZ", "AAA_CCC.ZZ", "BBB_CCC.ZZ"]);
}

#[test]
fn missing_coordinates_degrade_that_pair_only() {
    let dir = tempfile::tempdir().unwrap();
    let key = event();
    let tag = key.tag();
    for name in ["AAA", "BBB", "DDD"] {
        let mut trace = synthetic_trace(0.1, 500, signal);
        trace.header.cmpinc = Some(0.0);
        trace.header.kstnm = Some(name.to_string());
        trace.header.kcmpnm = Some("BHZ".to_string());
        write_trace(dir.path(), &format!("{tag}_{name}.BHZ"), &trace);
    }

    // DDD is in no catalog and stamps no coordinates.
    let catalog = two_station_catalog();
    let stations = catalog.station_index();
    let correlator = EventCorrelator {
        engine: &NativeEngine,
        stations: &stations,
        options: CorrelationOptions::default(),
    };
    let outcome = correlator.correlate_event(&key, dir.path()).unwrap();

    let names: Vec<String> = outcome.produced.iter().map(|p| p.to_string()).collect();
    assert_eq!(names, vec!["AAA_BBB.ZZ"]);
    assert!(outcome
        .failures
        .iter()
        .all(|(_, e)| matches!(e, PipelineError::CorrelationPrecondition { .. })));
    assert!(!outcome.failures.is_empty());
}
