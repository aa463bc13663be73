// Shared fixtures for the noisecc-core integration tests.
#![allow(dead_code)]

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};

use noisecc_core::types::{DatasetCatalog, EventEntry, EventKey, StationEntry};
use noisecc_sac::{Header, Trace};

pub fn origin() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn event() -> EventKey {
    EventKey::from_origin(Utc.from_utc_datetime(&origin()))
}

/// A trace with its reference at the event origin, zero begin offset.
pub fn synthetic_trace(delta: f64, npts: usize, value: impl Fn(usize) -> f64) -> Trace {
    let mut header = Header::new(delta);
    header.reference = Some(origin());
    Trace::new(header, (0..npts).map(value).collect())
}

pub fn write_trace(dir: &Path, name: &str, trace: &Trace) {
    trace.write(&dir.join(name)).unwrap();
}

pub fn station(network: &str, name: &str, latitude: f64, longitude: f64) -> StationEntry {
    StationEntry {
        network: network.to_string(),
        name: name.to_string(),
        latitude,
        longitude,
        elevation_m: 0.0,
    }
}

/// Two stations roughly 100 km apart and a single event at `origin()`.
pub fn two_station_catalog() -> DatasetCatalog {
    DatasetCatalog {
        stations: vec![
            station("XX", "AAA", 35.0, -106.0),
            station("XX", "BBB", 35.9, -106.0),
        ],
        events: vec![EventEntry {
            origin: Utc.from_utc_datetime(&origin()),
        }],
    }
}
