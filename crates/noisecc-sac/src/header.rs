use chrono::NaiveDateTime;

/// Sentinel used by the on-disk format for unset numeric header words.
pub const UNDEF: f32 = -12345.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
}

/// In-memory view of the SAC header. Only the words the pipeline reads or
/// writes are modeled; everything else round-trips through the codec as
/// undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// Sample spacing in seconds.
    pub delta: f64,
    /// Begin offset of the first sample relative to the reference time.
    pub b: f64,
    /// Reference time (UTC, no leap handling beyond chrono's).
    pub reference: Option<NaiveDateTime>,
    pub station: Option<GeoPoint>,
    pub event: Option<GeoPoint>,
    /// Component azimuth in degrees clockwise from north.
    pub cmpaz: Option<f64>,
    /// Component incident angle in degrees from vertical (0 = up).
    pub cmpinc: Option<f64>,
    pub kstnm: Option<String>,
    pub knetwk: Option<String>,
    pub kcmpnm: Option<String>,
    pub kevnm: Option<String>,
    /// Free slot; the stacker stores its contribution count here.
    pub user0: Option<f64>,
    pub dist_km: Option<f64>,
    pub az: Option<f64>,
    pub baz: Option<f64>,
    pub gcarc: Option<f64>,
}

impl Header {
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            b: 0.0,
            reference: None,
            station: None,
            event: None,
            cmpaz: None,
            cmpinc: None,
            kstnm: None,
            knetwk: None,
            kcmpnm: None,
            kevnm: None,
            user0: None,
            dist_km: None,
            az: None,
            baz: None,
            gcarc: None,
        }
    }

    pub fn sampling_rate(&self) -> f64 {
        1.0 / self.delta
    }

    /// End offset of the last sample for a trace of `npts` samples.
    pub fn end_for(&self, npts: usize) -> f64 {
        if npts == 0 {
            self.b
        } else {
            self.b + (npts - 1) as f64 * self.delta
        }
    }
}
