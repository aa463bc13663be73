// crates/noisecc-core/src/correlator.rs
//
// Station-pair correlation engine. Per event directory: discover traces,
// enumerate unordered station pairs, synthesize per-direction component
// files with a pseudo-event header (the "virtual source" framing the
// external engine understands), rotate horizontals into the great-circle
// frame, correlate each component both ways, and clean up everything that
// is not a final doubled-letter product.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use noisecc_sac::{geo, GeoPoint, Header, Trace};

use crate::catalog::OperatorDescriptor;
use crate::engine::{DspEngine, Script, ScriptCommand};
use crate::error::{PipelineError, Result};
use crate::types::{ComponentClass, EventKey, PairName, StationIndex, TraceName};

#[derive(Debug, Clone, Copy)]
pub struct CorrelationOptions {
    pub normalized: bool,
    pub max_lag_s: Option<f64>,
}

impl Default for CorrelationOptions {
    fn default() -> Self {
        Self {
            normalized: true,
            max_lag_s: None,
        }
    }
}

impl CorrelationOptions {
    pub fn from_descriptor(descriptor: Option<&OperatorDescriptor>) -> Self {
        let max_lag_s = descriptor
            .and_then(|d| d.params.get("max_lag_s"))
            .and_then(|v| v.as_f64());
        Self {
            normalized: true,
            max_lag_s,
        }
    }
}

#[derive(Debug, Clone)]
struct Discovered {
    path: PathBuf,
    header: Header,
}

#[derive(Debug, Clone, Default)]
struct StationSet {
    east: Option<Discovered>,
    north: Option<Discovered>,
    vertical: Option<Discovered>,
}

impl StationSet {
    fn horizontals(&self) -> Option<(&Discovered, &Discovered)> {
        Option::zip(self.east.as_ref(), self.north.as_ref())
    }

    fn header_location(&self) -> Option<GeoPoint> {
        [&self.east, &self.north, &self.vertical]
            .into_iter()
            .flatten()
            .find_map(|d| d.header.station)
    }
}

#[derive(Debug, Default)]
pub struct CorrelateOutcome {
    pub produced: Vec<PairName>,
    /// Per-direction or per-component failures; the rest of the event is
    /// unaffected by any entry here.
    pub failures: Vec<(String, PipelineError)>,
}

pub struct EventCorrelator<'a> {
    pub engine: &'a dyn DspEngine,
    pub stations: &'a StationIndex,
    pub options: CorrelationOptions,
}

impl<'a> EventCorrelator<'a> {
    pub fn correlate_event(
        &self,
        event: &EventKey,
        event_dir: &Path,
    ) -> Result<CorrelateOutcome> {
        let sets = self.discover(event, event_dir)?;
        let stations: Vec<&String> = sets.keys().collect();
        let mut outcome = CorrelateOutcome::default();

        // Unordered pair enumeration: no self-pairs, each {A, B} once.
        for (i, &a) in stations.iter().enumerate() {
            for &b in &stations[i + 1..] {
                self.correlate_pair(event_dir, a, b, &sets, &mut outcome);
            }
        }

        self.cleanup(event_dir)?;
        info!(
            event = %event,
            produced = outcome.produced.len(),
            failures = outcome.failures.len(),
            "event correlation finished"
        );
        Ok(outcome)
    }

    /// Step 1: scan the canonical trace-name grammar and classify each file
    /// into a component group by inclination (verticals) and channel-code
    /// suffix (horizontals).
    fn discover(
        &self,
        event: &EventKey,
        event_dir: &Path,
    ) -> Result<BTreeMap<String, StationSet>> {
        let tag = event.tag();
        let mut sets: BTreeMap<String, StationSet> = BTreeMap::new();
        for entry in std::fs::read_dir(event_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(|n| TraceName::parse(n, &tag)) else {
                continue;
            };
            let trace = match Trace::read(&entry.path()) {
                Ok(trace) => trace,
                Err(error) => {
                    warn!(file = %name, %error, "unreadable trace, ignoring");
                    continue;
                }
            };
            let Some(class) = ComponentClass::classify(&trace.header, &name.channel) else {
                debug!(file = %name, "component class unknown, ignoring");
                continue;
            };
            let discovered = Discovered {
                path: entry.path(),
                header: trace.header,
            };
            let set = sets.entry(name.station.clone()).or_default();
            let slot = match class {
                ComponentClass::East => &mut set.east,
                ComponentClass::North => &mut set.north,
                ComponentClass::Vertical => &mut set.vertical,
            };
            if slot.is_some() {
                warn!(file = %name, "duplicate component for station, keeping first");
            } else {
                *slot = Some(discovered);
            }
        }
        Ok(sets)
    }

    fn correlate_pair(
        &self,
        event_dir: &Path,
        a: &str,
        b: &str,
        sets: &BTreeMap<String, StationSet>,
        outcome: &mut CorrelateOutcome,
    ) {
        let set_a = &sets[a];
        let set_b = &sets[b];

        // Steps 3-4: horizontals, one direction at a time so a geometry
        // failure on A_B leaves B_A and the verticals alone.
        match (set_a.horizontals(), set_b.horizontals()) {
            (Some(pair_a), Some(pair_b)) => {
                for (src, dst, (east, north)) in [(a, b, pair_a), (b, a, pair_b)] {
                    if let Err(error) =
                        self.synthesize_and_rotate(event_dir, src, dst, east, north, sets)
                    {
                        warn!(direction = %format!("{src}_{dst}"), %error, "rotation failed");
                        outcome.failures.push((format!("{src}_{dst}"), error));
                    }
                }
            }
            _ => {
                debug!(pair = %format!("{a}_{b}"), "missing horizontal components, skipping R/T");
            }
        }

        // Step 5: verticals need no rotation, just the pseudo-event stamp.
        if let (Some(vertical_a), Some(vertical_b)) =
            (set_a.vertical.as_ref(), set_b.vertical.as_ref())
        {
            for (src, dst, vertical) in [(a, b, vertical_a), (b, a, vertical_b)] {
                if let Err(error) =
                    self.synthesize_component(event_dir, vertical, src, dst, "Z", sets)
                {
                    outcome.failures.push((format!("{src}_{dst}.Z"), error));
                }
            }
        }

        // Step 6: correlate whichever components exist in both directions.
        for component in ["R", "T", "Z"] {
            match self.correlate_component(event_dir, a, b, component, sets) {
                Ok(Some(pair)) => outcome.produced.push(pair),
                Ok(None) => {}
                Err(error) => {
                    outcome
                        .failures
                        .push((format!("{a}_{b}.{component}{component}"), error));
                }
            }
        }
    }

    /// Copy one of `src`'s components, stamping `dst`'s coordinates as a
    /// pseudo-event location, and write it as `<src>_<dst>.<code>`.
    fn synthesize_component(
        &self,
        event_dir: &Path,
        source: &Discovered,
        src: &str,
        dst: &str,
        code: &str,
        sets: &BTreeMap<String, StationSet>,
    ) -> Result<PathBuf> {
        let dst_location = self.station_location(dst, &sets[dst])?;
        let mut trace = Trace::read(&source.path)?;
        trace.header.event = Some(dst_location);
        trace.header.kevnm = Some(dst.to_string());
        if trace.header.station.is_none() {
            trace.header.station = self.catalog_location(src);
        }
        let target = event_dir.join(PairName::new(src, dst, code).to_string());
        trace.write(&target)?;
        Ok(target)
    }

    /// Steps 3-4 for one direction: synthesize `<src>_<dst>.PPE/.PPN`, check
    /// the orthogonality precondition, and rotate into `.R`/`.T`.
    #[allow(clippy::too_many_arguments)]
    fn synthesize_and_rotate(
        &self,
        event_dir: &Path,
        src: &str,
        dst: &str,
        east: &Discovered,
        north: &Discovered,
        sets: &BTreeMap<String, StationSet>,
    ) -> Result<()> {
        let azimuth_east = east
            .header
            .cmpaz
            .unwrap_or_else(|| ComponentClass::East.nominal_azimuth());
        let azimuth_north = north
            .header
            .cmpaz
            .unwrap_or_else(|| ComponentClass::North.nominal_azimuth());
        let separation = (azimuth_east - azimuth_north).rem_euclid(360.0).round() as i64;
        if separation != 90 && separation != 270 {
            return Err(PipelineError::GeometryPrecondition {
                azimuth_a: azimuth_east,
                azimuth_b: azimuth_north,
                separation,
            });
        }

        let ppe = self.synthesize_stamped(event_dir, east, src, dst, "PPE", azimuth_east, sets)?;
        let ppn = self.synthesize_stamped(event_dir, north, src, dst, "PPN", azimuth_north, sets)?;

        let radial = event_dir.join(PairName::new(src, dst, "R").to_string());
        let transverse = event_dir.join(PairName::new(src, dst, "T").to_string());
        self.engine.run_checked(&Script::new(
            vec![
                ScriptCommand::ReadPair {
                    first: ppn,
                    second: ppe,
                },
                ScriptCommand::RotateToGcp,
                ScriptCommand::WritePair {
                    first: radial.clone(),
                    second: transverse.clone(),
                },
            ],
            vec![radial, transverse],
        ))?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn synthesize_stamped(
        &self,
        event_dir: &Path,
        source: &Discovered,
        src: &str,
        dst: &str,
        code: &str,
        azimuth: f64,
        sets: &BTreeMap<String, StationSet>,
    ) -> Result<PathBuf> {
        let target = self.synthesize_component(event_dir, source, src, dst, code, sets)?;
        let mut trace = Trace::read(&target)?;
        trace.header.cmpaz = Some(azimuth);
        trace.header.cmpinc = Some(90.0);
        trace.write(&target)?;
        Ok(target)
    }

    /// Step 6 for one component: correlate `(A_B.x, B_A.x)` into `A_B.xx`
    /// and annotate the directional metadata convention: station fields from
    /// the second input's station, pseudo-event fields from the first's.
    fn correlate_component(
        &self,
        event_dir: &Path,
        a: &str,
        b: &str,
        component: &str,
        sets: &BTreeMap<String, StationSet>,
    ) -> Result<Option<PairName>> {
        let forward = event_dir.join(PairName::new(a, b, component).to_string());
        let backward = event_dir.join(PairName::new(b, a, component).to_string());
        if !forward.is_file() || !backward.is_file() {
            // One direction missing: this product is simply not made.
            return Ok(None);
        }

        let doubled = format!("{component}{component}");
        let product = PairName::new(a, b, &doubled);
        let output = event_dir.join(product.to_string());
        self.engine.run_checked(&Script::new(
            vec![
                ScriptCommand::ReadPair {
                    first: forward.clone(),
                    second: backward.clone(),
                },
                ScriptCommand::Correlate {
                    normalized: self.options.normalized,
                    max_lag_s: self.options.max_lag_s,
                },
                ScriptCommand::Write {
                    path: output.clone(),
                },
            ],
            vec![output.clone()],
        ))?;

        let location_a = self.station_location(a, &sets[a])?;
        let location_b = self.station_location(b, &sets[b])?;
        let gc = geo::great_circle(location_a, location_b);

        let mut annotated = Trace::read(&output)?;
        annotated.header.station = Some(location_b);
        annotated.header.event = Some(location_a);
        annotated.header.kstnm = Some(format!("{a}-{b}"));
        annotated.header.knetwk = Some(self.composite_network(a, b, sets));
        annotated.header.kevnm = Some(a.to_string());
        annotated.header.kcmpnm = Some(doubled);
        annotated.header.cmpaz = None;
        annotated.header.cmpinc = None;
        annotated.header.dist_km = Some(gc.dist_km);
        annotated.header.gcarc = Some(gc.gcarc);
        annotated.header.az = Some(gc.az);
        annotated.header.baz = Some(gc.baz);
        annotated.write(&output)?;
        Ok(Some(product))
    }

    /// Step 7: only doubled-letter products survive the event directory.
    fn cleanup(&self, event_dir: &Path) -> Result<()> {
        for entry in std::fs::read_dir(event_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let keep = entry
                .file_name()
                .to_str()
                .map(PairName::is_final_product)
                .unwrap_or(false);
            if !keep {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Station coordinates: the catalog first, then any stamped header from
    /// the station's own discovered traces. Both missing is a correlation
    /// precondition failure.
    fn station_location(&self, station: &str, set: &StationSet) -> Result<GeoPoint> {
        self.catalog_location(station)
            .or_else(|| set.header_location())
            .ok_or_else(|| PipelineError::CorrelationPrecondition {
                direction: station.to_string(),
                reason: "no coordinates in catalog or trace headers".into(),
            })
    }

    fn catalog_location(&self, station: &str) -> Option<GeoPoint> {
        self.stations.get(station).map(|entry| entry.location())
    }

    fn composite_network(&self, a: &str, b: &str, sets: &BTreeMap<String, StationSet>) -> String {
        let network = |station: &str| {
            self.stations
                .get(station)
                .map(|entry| entry.network.clone())
                .or_else(|| {
                    [&sets[station].east, &sets[station].north, &sets[station].vertical]
                        .into_iter()
                        .flatten()
                        .find_map(|d| d.header.knetwk.clone())
                })
                .unwrap_or_default()
        };
        format!("{}-{}", network(a), network(b))
    }
}
