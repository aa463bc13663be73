// crates/noisecc-core/src/engine.rs
//
// The external DSP engine seam. Operators build a `Script` (ordered, typed
// command records plus the outputs the script is expected to leave behind)
// and hand it to a `DspEngine`. The engine is never trusted to report
// structured errors: after `run`, every expected output must exist on disk
// or the script is treated as failed.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

use noisecc_sac::{dsp, geo, GeoPoint, SacError, Trace};

use crate::config::{EngineConfig, EngineKind};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace operation failed: {0}")]
    Sac(#[from] SacError),

    #[error("script invalid at step {index}: {reason}")]
    Script { index: usize, reason: String },

    #[error("command has no external equivalent: {0}")]
    Unsupported(String),

    #[error("engine process exited with {0}")]
    Exit(String),

    #[error("engine process timed out after {0:?}")]
    Timeout(Duration),

    #[error("expected output missing after engine run: {0}")]
    MissingOutput(PathBuf),
}

/// One typed command record. The whole script is serialized in one place
/// ([`SacEngine::render`]), so quoting concerns never leak into operators.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Pending cut window applied at the next `Read`, zero-filled.
    Cut { begin: f64, end: f64 },
    Read { path: PathBuf },
    ReadPair { first: PathBuf, second: PathBuf },
    Rmean,
    Rtrend,
    Taper { width: f64 },
    Decimate { factor: usize },
    Bandpass {
        low_hz: f64,
        high_hz: f64,
        poles: u32,
        passes: u32,
    },
    Transfer {
        polezero: PathBuf,
        freq_limits: [f64; 4],
        water_level_db: f64,
    },
    SetStationCoordinates { location: GeoPoint },
    /// Rotate the loaded horizontal pair to the great-circle frame.
    RotateToGcp,
    Correlate {
        normalized: bool,
        max_lag_s: Option<f64>,
    },
    Write { path: PathBuf },
    WritePair { first: PathBuf, second: PathBuf },
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub commands: Vec<ScriptCommand>,
    pub expected_outputs: Vec<PathBuf>,
}

impl Script {
    pub fn new(commands: Vec<ScriptCommand>, expected_outputs: Vec<PathBuf>) -> Self {
        Self {
            commands,
            expected_outputs,
        }
    }
}

pub trait DspEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, script: &Script) -> Result<(), EngineError>;

    /// Run and then verify every expected output exists.
    fn run_checked(&self, script: &Script) -> Result<(), EngineError> {
        self.run(script)?;
        for output in &script.expected_outputs {
            if !output.exists() {
                return Err(EngineError::MissingOutput(output.clone()));
            }
        }
        Ok(())
    }
}

pub fn build_engine(config: &EngineConfig) -> Box<dyn DspEngine> {
    match config.kind {
        EngineKind::Native => Box::new(NativeEngine),
        EngineKind::Sac => Box::new(SacEngine {
            command: config.command.clone(),
            timeout: config.timeout(),
        }),
    }
}

/// In-process engine executing each command against `noisecc-sac` traces.
/// Holds the same loaded-trace state the scripted interface implies: one or
/// two current traces plus a pending cut window.
pub struct NativeEngine;

struct NativeState {
    loaded: Vec<Trace>,
    pending_cut: Option<(f64, f64)>,
}

impl NativeState {
    fn one(&mut self, index: usize) -> Result<&mut Trace, EngineError> {
        self.loaded.first_mut().ok_or(EngineError::Script {
            index,
            reason: "no trace loaded".into(),
        })
    }

    fn two(&mut self, index: usize) -> Result<(&mut Trace, &mut Trace), EngineError> {
        if self.loaded.len() != 2 {
            return Err(EngineError::Script {
                index,
                reason: format!("expected two loaded traces, have {}", self.loaded.len()),
            });
        }
        let (a, b) = self.loaded.split_at_mut(1);
        Ok((&mut a[0], &mut b[0]))
    }

    fn read(&mut self, path: &Path) -> Result<Trace, EngineError> {
        let trace = Trace::read(path)?;
        Ok(match self.pending_cut {
            Some((begin, end)) => trace.cut(begin, end)?,
            None => trace,
        })
    }
}

impl DspEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn run(&self, script: &Script) -> Result<(), EngineError> {
        let mut state = NativeState {
            loaded: Vec::new(),
            pending_cut: None,
        };

        for (index, command) in script.commands.iter().enumerate() {
            match command {
                ScriptCommand::Cut { begin, end } => {
                    state.pending_cut = Some((*begin, *end));
                }
                ScriptCommand::Read { path } => {
                    let trace = state.read(path)?;
                    state.loaded = vec![trace];
                }
                ScriptCommand::ReadPair { first, second } => {
                    let first = state.read(first)?;
                    let second = state.read(second)?;
                    state.loaded = vec![first, second];
                }
                ScriptCommand::Rmean => {
                    state.one(index)?;
                    for trace in &mut state.loaded {
                        dsp::demean(trace);
                    }
                }
                ScriptCommand::Rtrend => {
                    state.one(index)?;
                    for trace in &mut state.loaded {
                        dsp::detrend_linear(trace);
                    }
                }
                ScriptCommand::Taper { width } => {
                    state.one(index)?;
                    for trace in &mut state.loaded {
                        dsp::taper_hann(trace, *width);
                    }
                }
                ScriptCommand::Decimate { factor } => {
                    let trace = state.one(index)?;
                    dsp::decimate(trace, *factor)?;
                }
                ScriptCommand::Bandpass {
                    low_hz,
                    high_hz,
                    poles,
                    passes,
                } => {
                    state.one(index)?;
                    for trace in &mut state.loaded {
                        dsp::bandpass(trace, *low_hz, *high_hz, *poles, *passes);
                    }
                }
                ScriptCommand::Transfer {
                    polezero,
                    freq_limits,
                    water_level_db,
                } => {
                    let response = noisecc_sac::PoleZero::load(polezero)?;
                    let trace = state.one(index)?;
                    noisecc_sac::polezero::remove_response(
                        trace,
                        &response,
                        *freq_limits,
                        *water_level_db,
                    )?;
                }
                ScriptCommand::SetStationCoordinates { location } => {
                    let trace = state.one(index)?;
                    trace.header.station = Some(*location);
                }
                ScriptCommand::RotateToGcp => rotate_to_gcp(&mut state, index)?,
                ScriptCommand::Correlate {
                    normalized,
                    max_lag_s,
                } => {
                    let (first, second) = state.two(index)?;
                    let cc = dsp::correlate(first, second, *normalized, *max_lag_s)?;
                    state.loaded = vec![cc];
                }
                ScriptCommand::Write { path } => {
                    state.one(index)?.write(path)?;
                }
                ScriptCommand::WritePair { first, second } => {
                    let (a, b) = state.two(index)?;
                    a.write(first)?;
                    b.write(second)?;
                }
            }
        }
        Ok(())
    }
}

/// Great-circle rotation of a loaded horizontal pair into radial/transverse.
/// Assumes the caller already verified the 90/270 degree azimuth separation;
/// here the two components are recombined to north/east via their measured
/// azimuths, then projected onto the event-station great circle.
fn rotate_to_gcp(state: &mut NativeState, index: usize) -> Result<(), EngineError> {
    let (first, second) = state.two(index)?;
    let station = first.header.station.ok_or(EngineError::Script {
        index,
        reason: "rotation input lacks station coordinates".into(),
    })?;
    let event = first.header.event.ok_or(EngineError::Script {
        index,
        reason: "rotation input lacks event coordinates".into(),
    })?;
    if first.data.len() != second.data.len() {
        return Err(EngineError::Sac(SacError::Mismatch(format!(
            "rotation inputs have {} and {} samples",
            first.data.len(),
            second.data.len()
        ))));
    }

    let az1 = first.header.cmpaz.unwrap_or(0.0).to_radians();
    let az2 = second.header.cmpaz.unwrap_or(90.0).to_radians();
    let mut north = Vec::with_capacity(first.data.len());
    let mut east = Vec::with_capacity(first.data.len());
    for (&u1, &u2) in first.data.iter().zip(second.data.iter()) {
        north.push(u1 * az1.cos() + u2 * az2.cos());
        east.push(u1 * az1.sin() + u2 * az2.sin());
    }

    // AZ is event -> station, BAZ is station -> event.
    let gc = geo::great_circle(event, station);
    let (radial, transverse) = dsp::rotate_ne_to_rt(&north, &east, gc.baz);

    let mut radial_header = first.header.clone();
    radial_header.cmpaz = Some((gc.baz + 180.0).rem_euclid(360.0));
    radial_header.cmpinc = Some(90.0);
    radial_header.kcmpnm = Some("R".into());
    let mut transverse_header = radial_header.clone();
    transverse_header.cmpaz = Some((gc.baz + 270.0).rem_euclid(360.0));
    transverse_header.kcmpnm = Some("T".into());
    for header in [&mut radial_header, &mut transverse_header] {
        header.dist_km = Some(gc.dist_km);
        header.gcarc = Some(gc.gcarc);
        header.az = Some(gc.az);
        header.baz = Some(gc.baz);
    }

    state.loaded = vec![
        Trace::new(radial_header, radial),
        Trace::new(transverse_header, transverse),
    ];
    Ok(())
}

/// Adapter around a classic line-scripted seismic-analysis subprocess.
/// Commands are rendered to the engine's dialect and fed over stdin in one
/// blocking call, with a kill-on-expiry timeout as a hardening measure.
pub struct SacEngine {
    pub command: String,
    pub timeout: Duration,
}

impl SacEngine {
    pub fn render(&self, script: &Script) -> Result<String, EngineError> {
        let mut lines = Vec::with_capacity(script.commands.len() + 1);
        for command in &script.commands {
            match command {
                ScriptCommand::Cut { begin, end } => {
                    lines.push("cuterr fillz".to_string());
                    lines.push(format!("cut {begin} {end}"));
                }
                ScriptCommand::Read { path } => lines.push(format!("r {}", path.display())),
                ScriptCommand::ReadPair { first, second } => {
                    lines.push(format!("r {} {}", first.display(), second.display()));
                }
                ScriptCommand::Rmean => lines.push("rmean".to_string()),
                ScriptCommand::Rtrend => lines.push("rtrend".to_string()),
                ScriptCommand::Taper { width } => {
                    lines.push(format!("taper type hanning width {width}"));
                }
                ScriptCommand::Decimate { factor } => {
                    // The engine caps one decimation at 7; compose factors.
                    for step in factorize_for_engine(*factor)? {
                        lines.push(format!("decimate {step}"));
                    }
                }
                ScriptCommand::Bandpass {
                    low_hz,
                    high_hz,
                    poles,
                    passes,
                } => lines.push(format!(
                    "bp butter corner {low_hz} {high_hz} npoles {poles} passes {passes}"
                )),
                ScriptCommand::Transfer {
                    polezero,
                    freq_limits: [f1, f2, f3, f4],
                    ..
                } => lines.push(format!(
                    "transfer from polezero subtype {} to none freqlimits {f1} {f2} {f3} {f4}",
                    polezero.display()
                )),
                ScriptCommand::SetStationCoordinates { location } => {
                    lines.push(format!(
                        "ch stla {} stlo {} stel {}",
                        location.latitude, location.longitude, location.elevation_m
                    ));
                    lines.push("wh".to_string());
                }
                ScriptCommand::RotateToGcp => lines.push("rotate to gcp".to_string()),
                ScriptCommand::Correlate { normalized, .. } => {
                    let mut line = "correlate master 1".to_string();
                    if *normalized {
                        line.push_str(" normalized");
                    }
                    // One lag window spanning the whole trace.
                    line.push_str(" number 1");
                    lines.push(line);
                }
                ScriptCommand::Write { path } => lines.push(format!("w {}", path.display())),
                ScriptCommand::WritePair { first, second } => {
                    lines.push(format!("w {} {}", first.display(), second.display()));
                }
            }
        }
        lines.push("quit".to_string());
        Ok(lines.join("\n") + "\n")
    }
}

impl DspEngine for SacEngine {
    fn name(&self) -> &'static str {
        "sac"
    }

    fn run(&self, script: &Script) -> Result<(), EngineError> {
        let rendered = self.render(script)?;
        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .env("SAC_DISPLAY_COPYRIGHT", "0")
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(rendered.as_bytes())?;
        }

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                if status.success() {
                    return Ok(());
                }
                return Err(EngineError::Exit(status.to_string()));
            }
            if started.elapsed() > self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Timeout(self.timeout));
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Split a decimation factor into steps of at most 7, the scripted engine's
/// per-command limit.
fn factorize_for_engine(factor: usize) -> Result<Vec<usize>, EngineError> {
    if factor == 0 {
        return Err(EngineError::Unsupported("decimate by 0".into()));
    }
    let mut rest = factor;
    let mut steps = Vec::new();
    for divisor in [7, 6, 5, 4, 3, 2] {
        while rest % divisor == 0 {
            steps.push(divisor);
            rest /= divisor;
        }
    }
    if rest != 1 {
        return Err(EngineError::Unsupported(format!(
            "decimation factor {factor} has a prime component above 7"
        )));
    }
    Ok(steps)
}
