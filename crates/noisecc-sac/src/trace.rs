use std::path::Path;

use chrono::{Duration, NaiveDateTime};

use crate::codec;
use crate::errors::SacError;
use crate::header::Header;

/// One evenly sampled waveform plus its header. Samples are held as f64 in
/// memory and truncated to f32 at the codec boundary, matching the format.
#[derive(Debug, Clone)]
pub struct Trace {
    pub header: Header,
    pub data: Vec<f64>,
}

impl Trace {
    pub fn new(header: Header, data: Vec<f64>) -> Self {
        Self { header, data }
    }

    pub fn read(path: &Path) -> Result<Self, SacError> {
        codec::read(path)
    }

    pub fn write(&self, path: &Path) -> Result<(), SacError> {
        codec::write(self, path)
    }

    pub fn npts(&self) -> usize {
        self.data.len()
    }

    pub fn delta(&self) -> f64 {
        self.header.delta
    }

    /// End offset of the last sample relative to the reference time.
    pub fn e(&self) -> f64 {
        self.header.end_for(self.data.len())
    }

    /// Absolute time of the first sample, when a reference time is set.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        let reference = self.header.reference?;
        let micros = (self.header.b * 1_000_000.0).round() as i64;
        Some(reference + Duration::microseconds(micros))
    }

    /// Cut to `[begin, end)` relative to the reference time, zero-filling
    /// samples that fall outside the recorded span. The output grid starts
    /// exactly at `begin`; cutting an already-cut trace with the same window
    /// is a no-op.
    pub fn cut(&self, begin: f64, end: f64) -> Result<Trace, SacError> {
        if !(end > begin) || !begin.is_finite() || !end.is_finite() {
            return Err(SacError::BadWindow { begin, end });
        }
        let delta = self.header.delta;
        let npts_out = ((end - begin) / delta).round() as usize;
        let mut data = vec![0.0; npts_out];
        for (i, value) in data.iter_mut().enumerate() {
            let t = begin + i as f64 * delta;
            let src = ((t - self.header.b) / delta).round();
            if src >= 0.0 && (src as usize) < self.data.len() {
                *value = self.data[src as usize];
            }
        }
        let mut header = self.header.clone();
        header.b = begin;
        Ok(Trace::new(header, data))
    }

    /// Merge fragmented segments of one channel into a single gap-free trace.
    /// Segments are sorted by absolute start time and copied onto a common
    /// grid; gaps stay at `fill` (never interpolated). Overlapping samples
    /// are last-wins. All segments must share the sample spacing; the merged
    /// reference time is the earliest segment's.
    pub fn merge(mut segments: Vec<Trace>, fill: f64) -> Result<Trace, SacError> {
        let first_delta = match segments.first() {
            Some(seg) => seg.header.delta,
            None => return Err(SacError::EmptyMerge),
        };
        for seg in &segments {
            if (seg.header.delta - first_delta).abs() > first_delta * 1e-6 {
                return Err(SacError::Mismatch(format!(
                    "segment delta {} differs from {}",
                    seg.header.delta, first_delta
                )));
            }
            if seg.header.reference.is_none() {
                return Err(SacError::Mismatch(
                    "segment lacks a reference time".into(),
                ));
            }
        }
        segments.sort_by(|a, b| {
            a.start_time()
                .partial_cmp(&b.start_time())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let base_ref = segments[0].header.reference.unwrap();
        let offset_of = |seg: &Trace| -> f64 {
            let shift = seg.header.reference.unwrap() - base_ref;
            seg.header.b + shift.num_microseconds().unwrap_or(0) as f64 / 1_000_000.0
        };

        let start = offset_of(&segments[0]);
        let end = segments
            .iter()
            .map(|seg| offset_of(seg) + seg.data.len() as f64 * first_delta)
            .fold(f64::NEG_INFINITY, f64::max);
        let npts = ((end - start) / first_delta).round() as usize;
        let mut data = vec![fill; npts];
        for seg in &segments {
            let at = ((offset_of(seg) - start) / first_delta).round() as usize;
            for (i, &value) in seg.data.iter().enumerate() {
                if at + i < data.len() {
                    data[at + i] = value;
                }
            }
        }

        let mut header = segments[0].header.clone();
        header.b = start;
        header.reference = Some(base_ref);
        Ok(Trace::new(header, data))
    }
}
