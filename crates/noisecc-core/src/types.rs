// crates/noisecc-core/src/types.rs
//
// Structured identifiers. Each is parsed from a filename or catalog entry
// exactly once, at ingestion, and carried as data through the rest of the
// pipeline.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use noisecc_sac::{GeoPoint, Header};
use serde::{Deserialize, Serialize};

/// Compact event directory tag, `YYJJJHHMMSS`: two-digit year-of-century,
/// three-digit day-of-year, two digits each of hour/minute/second. This is
/// the ONE place the tag is derived; no other code formats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    origin: NaiveDateTime,
}

impl EventKey {
    pub fn from_origin(origin: DateTime<Utc>) -> Self {
        Self {
            origin: origin.naive_utc(),
        }
    }

    pub fn origin(&self) -> NaiveDateTime {
        self.origin
    }

    pub fn tag(&self) -> String {
        format!(
            "{:02}{:03}{:02}{:02}{:02}",
            self.origin.year().rem_euclid(100),
            self.origin.ordinal(),
            self.origin.hour(),
            self.origin.minute(),
            self.origin.second()
        )
    }

    /// Seconds since midnight of the origin's day; the request window for
    /// this event starts here.
    pub fn seconds_since_midnight(&self) -> f64 {
        self.origin.num_seconds_from_midnight() as f64
    }

    pub fn midnight(&self) -> NaiveDateTime {
        self.origin.date().and_hms_opt(0, 0, 0).unwrap()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// `network.station.channel`, the identity a metadata file is named by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId {
    pub network: String,
    pub station: String,
    pub channel: String,
}

impl ChannelId {
    pub fn new(network: &str, station: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            channel: channel.to_string(),
        }
    }

    /// Parse `NET.STA.CHN`; extra dots are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split('.');
        let network = parts.next()?;
        let station = parts.next()?;
        let channel = parts.next()?;
        if parts.next().is_some() || network.is_empty() || station.is_empty() || channel.is_empty()
        {
            return None;
        }
        Some(Self::new(network, station, channel))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.network, self.station, self.channel)
    }
}

/// Canonical per-event trace filename, `<eventTag>_<STA>.<CHN>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceName {
    pub event_tag: String,
    pub station: String,
    pub channel: String,
}

impl TraceName {
    pub fn new(event: &EventKey, station: &str, channel: &str) -> Self {
        Self {
            event_tag: event.tag(),
            station: station.to_string(),
            channel: channel.to_string(),
        }
    }

    /// Parse a filename against the grammar for a known event tag. Returns
    /// `None` for anything else in the directory (correlation intermediates,
    /// stray files).
    pub fn parse(file_name: &str, event_tag: &str) -> Option<Self> {
        let rest = file_name.strip_prefix(event_tag)?.strip_prefix('_')?;
        let (station, channel) = rest.split_once('.')?;
        if station.is_empty() || channel.is_empty() || channel.contains('.') {
            return None;
        }
        Some(Self {
            event_tag: event_tag.to_string(),
            station: station.to_string(),
            channel: channel.to_string(),
        })
    }
}

impl fmt::Display for TraceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.event_tag, self.station, self.channel)
    }
}

/// Directional pair filename, `<A>_<B>.<component>`. Direction matters:
/// `A_B` and `B_A` are distinct files with asymmetric metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairName {
    pub first: String,
    pub second: String,
    pub component: String,
}

impl PairName {
    pub fn new(first: &str, second: &str, component: &str) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
            component: component.to_string(),
        }
    }

    /// A final correlation product carries a doubled component letter.
    pub fn is_final_product(file_name: &str) -> bool {
        let Some((stem, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        let mut chars = ext.chars();
        matches!((chars.next(), chars.next(), chars.next()),
            (Some(a), Some(b), None) if a == b && a.is_ascii_uppercase())
            && stem.contains('_')
    }
}

impl fmt::Display for PairName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.first, self.second, self.component)
    }
}

/// Which directional motion a channel records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentClass {
    East,
    North,
    Vertical,
}

impl ComponentClass {
    /// Classify from the inclination header (vertical) and the channel-code
    /// suffix (horizontals). The azimuth header stays out of classification:
    /// a skewed north channel is still the north slot, and the orthogonality
    /// gate judges its cmpaz separately.
    pub fn classify(header: &Header, channel: &str) -> Option<Self> {
        if let Some(cmpinc) = header.cmpinc {
            let from_vertical = cmpinc.rem_euclid(180.0).min(180.0 - cmpinc.rem_euclid(180.0));
            if from_vertical < 5.0 {
                return Some(ComponentClass::Vertical);
            }
        }
        match channel.chars().last()? {
            'E' | 'e' | '2' => Some(ComponentClass::East),
            'N' | 'n' | '1' => Some(ComponentClass::North),
            'Z' | 'z' => Some(ComponentClass::Vertical),
            _ => None,
        }
    }

    /// Default azimuth assumed when a trace carries no cmpaz header.
    pub fn nominal_azimuth(&self) -> f64 {
        match self {
            ComponentClass::East => 90.0,
            ComponentClass::North => 0.0,
            ComponentClass::Vertical => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationEntry {
    pub network: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: f64,
}

impl StationEntry {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation_m: self.elevation_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub origin: DateTime<Utc>,
}

/// The event/station catalog handed over by the metadata collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetCatalog {
    #[serde(default)]
    pub stations: Vec<StationEntry>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

impl DatasetCatalog {
    pub fn event_keys(&self) -> Vec<EventKey> {
        self.events
            .iter()
            .map(|event| EventKey::from_origin(event.origin))
            .collect()
    }

    pub fn station_index(&self) -> HashMap<String, StationEntry> {
        self.stations
            .iter()
            .map(|station| (station.name.clone(), station.clone()))
            .collect()
    }
}

pub type StationIndex = HashMap<String, StationEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cmpaz: Option<f64>, cmpinc: Option<f64>) -> Header {
        let mut header = Header::new(0.1);
        header.cmpaz = cmpaz;
        header.cmpinc = cmpinc;
        header
    }

    #[test]
    fn a_skewed_north_channel_is_still_the_north_slot() {
        // A misaligned sensor keeps its code-based slot; the azimuth header
        // only matters to the rotation gate downstream.
        let skewed = header(Some(45.0), Some(90.0));
        assert_eq!(
            ComponentClass::classify(&skewed, "BHN"),
            Some(ComponentClass::North)
        );
        assert_eq!(
            ComponentClass::classify(&skewed, "BHE"),
            Some(ComponentClass::East)
        );
    }

    #[test]
    fn inclination_marks_verticals_regardless_of_code() {
        let vertical = header(Some(0.0), Some(0.0));
        assert_eq!(
            ComponentClass::classify(&vertical, "BH1"),
            Some(ComponentClass::Vertical)
        );
    }

    #[test]
    fn classification_falls_back_to_the_channel_suffix() {
        let bare = header(None, None);
        assert_eq!(ComponentClass::classify(&bare, "BH2"), Some(ComponentClass::East));
        assert_eq!(ComponentClass::classify(&bare, "BH1"), Some(ComponentClass::North));
        assert_eq!(ComponentClass::classify(&bare, "BHZ"), Some(ComponentClass::Vertical));
        assert_eq!(ComponentClass::classify(&bare, "BHQ"), None);
    }
}
