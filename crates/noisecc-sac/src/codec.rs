//! Binary SAC codec. Reads both byte orders (autodetected from the header
//! version word), always writes little-endian, header version 6.

use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::errors::SacError;
use crate::header::{GeoPoint, Header, UNDEF};
use crate::trace::Trace;

const HEADER_BYTES: usize = 632;
const FLOAT_WORDS: usize = 70;
const INT_WORDS: usize = 40;
const CHAR_BYTES: usize = 192;
const IUNDEF: i32 = -12345;

// Float word indices.
const F_DELTA: usize = 0;
const F_DEPMIN: usize = 1;
const F_DEPMAX: usize = 2;
const F_B: usize = 5;
const F_E: usize = 6;
const F_STLA: usize = 31;
const F_STLO: usize = 32;
const F_STEL: usize = 33;
const F_EVLA: usize = 35;
const F_EVLO: usize = 36;
const F_EVEL: usize = 37;
const F_USER0: usize = 40;
const F_DIST: usize = 50;
const F_AZ: usize = 51;
const F_BAZ: usize = 52;
const F_GCARC: usize = 53;
const F_CMPAZ: usize = 57;
const F_CMPINC: usize = 58;

// Integer word indices, relative to the start of the integer block.
const I_NZYEAR: usize = 0;
const I_NZJDAY: usize = 1;
const I_NZHOUR: usize = 2;
const I_NZMIN: usize = 3;
const I_NZSEC: usize = 4;
const I_NZMSEC: usize = 5;
const I_NVHDR: usize = 6;
const I_NPTS: usize = 9;
const I_IFTYPE: usize = 15;
const I_LEVEN: usize = 35;

const IFTYPE_TIME_SERIES: i32 = 1;

// Character field byte offsets within the 192-byte block.
const K_STNM: (usize, usize) = (0, 8);
const K_EVNM: (usize, usize) = (8, 16);
const K_CMPNM: (usize, usize) = (160, 8);
const K_NETWK: (usize, usize) = (168, 8);

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn word_i32(bytes: &[u8], word: usize, endian: Endian) -> i32 {
    let raw: [u8; 4] = bytes[word * 4..word * 4 + 4].try_into().unwrap();
    match endian {
        Endian::Little => i32::from_le_bytes(raw),
        Endian::Big => i32::from_be_bytes(raw),
    }
}

fn word_f32(bytes: &[u8], word: usize, endian: Endian) -> f32 {
    let raw: [u8; 4] = bytes[word * 4..word * 4 + 4].try_into().unwrap();
    match endian {
        Endian::Little => f32::from_le_bytes(raw),
        Endian::Big => f32::from_be_bytes(raw),
    }
}

fn opt_f(value: f32) -> Option<f64> {
    if (value - UNDEF).abs() < 0.5 {
        None
    } else {
        Some(value as f64)
    }
}

fn opt_k(bytes: &[u8], field: (usize, usize)) -> Option<String> {
    let raw = &bytes[440 + field.0..440 + field.0 + field.1];
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_end_matches(['\0', ' ']).trim();
    if trimmed.is_empty() || trimmed.starts_with("-12345") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read(path: &Path) -> Result<Trace, SacError> {
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_BYTES {
        return Err(SacError::Format {
            path: path.to_path_buf(),
            reason: format!("{} bytes is shorter than the header", bytes.len()),
        });
    }

    let endian = if word_i32(&bytes, FLOAT_WORDS + I_NVHDR, Endian::Little) == 6 {
        Endian::Little
    } else if word_i32(&bytes, FLOAT_WORDS + I_NVHDR, Endian::Big) == 6 {
        Endian::Big
    } else {
        return Err(SacError::Version(word_i32(
            &bytes,
            FLOAT_WORDS + I_NVHDR,
            Endian::Little,
        )));
    };

    let npts = word_i32(&bytes, FLOAT_WORDS + I_NPTS, endian);
    if npts < 0 || bytes.len() < HEADER_BYTES + npts as usize * 4 {
        return Err(SacError::Format {
            path: path.to_path_buf(),
            reason: format!("npts {} exceeds file size", npts),
        });
    }

    let f = |idx: usize| word_f32(&bytes, idx, endian);
    let i = |idx: usize| word_i32(&bytes, FLOAT_WORDS + idx, endian);

    let mut header = Header::new(f(F_DELTA) as f64);
    header.b = opt_f(f(F_B)).unwrap_or(0.0);
    header.cmpaz = opt_f(f(F_CMPAZ));
    header.cmpinc = opt_f(f(F_CMPINC));
    header.user0 = opt_f(f(F_USER0));
    header.dist_km = opt_f(f(F_DIST));
    header.az = opt_f(f(F_AZ));
    header.baz = opt_f(f(F_BAZ));
    header.gcarc = opt_f(f(F_GCARC));
    header.station = match (opt_f(f(F_STLA)), opt_f(f(F_STLO))) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
            elevation_m: opt_f(f(F_STEL)).unwrap_or(0.0),
        }),
        _ => None,
    };
    header.event = match (opt_f(f(F_EVLA)), opt_f(f(F_EVLO))) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
            elevation_m: opt_f(f(F_EVEL)).unwrap_or(0.0),
        }),
        _ => None,
    };

    if i(I_NZYEAR) != IUNDEF {
        let date = NaiveDate::from_yo_opt(i(I_NZYEAR), i(I_NZJDAY).max(1) as u32);
        let time = NaiveTime::from_hms_milli_opt(
            i(I_NZHOUR).max(0) as u32,
            i(I_NZMIN).max(0) as u32,
            i(I_NZSEC).max(0) as u32,
            i(I_NZMSEC).max(0) as u32,
        );
        header.reference = match (date, time) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            _ => {
                return Err(SacError::Format {
                    path: path.to_path_buf(),
                    reason: "invalid reference time fields".into(),
                })
            }
        };
    }

    header.kstnm = opt_k(&bytes, K_STNM);
    header.kevnm = opt_k(&bytes, K_EVNM);
    header.kcmpnm = opt_k(&bytes, K_CMPNM);
    header.knetwk = opt_k(&bytes, K_NETWK);

    let mut data = Vec::with_capacity(npts as usize);
    for idx in 0..npts as usize {
        data.push(word_f32(&bytes[HEADER_BYTES..], idx, endian) as f64);
    }

    Ok(Trace::new(header, data))
}

pub fn write(trace: &Trace, path: &Path) -> Result<(), SacError> {
    let mut floats = [UNDEF; FLOAT_WORDS];
    let mut ints = [IUNDEF; INT_WORDS];
    let mut chars = [b' '; CHAR_BYTES];

    let header = &trace.header;
    floats[F_DELTA] = header.delta as f32;
    floats[F_B] = header.b as f32;
    floats[F_E] = trace.e() as f32;
    if !trace.data.is_empty() {
        floats[F_DEPMIN] = trace.data.iter().cloned().fold(f64::INFINITY, f64::min) as f32;
        floats[F_DEPMAX] = trace.data.iter().cloned().fold(f64::NEG_INFINITY, f64::max) as f32;
    }
    if let Some(station) = header.station {
        floats[F_STLA] = station.latitude as f32;
        floats[F_STLO] = station.longitude as f32;
        floats[F_STEL] = station.elevation_m as f32;
    }
    if let Some(event) = header.event {
        floats[F_EVLA] = event.latitude as f32;
        floats[F_EVLO] = event.longitude as f32;
        floats[F_EVEL] = event.elevation_m as f32;
    }
    let set_f = |slot: &mut f32, value: Option<f64>| {
        if let Some(value) = value {
            *slot = value as f32;
        }
    };
    set_f(&mut floats[F_CMPAZ], header.cmpaz);
    set_f(&mut floats[F_CMPINC], header.cmpinc);
    set_f(&mut floats[F_USER0], header.user0);
    set_f(&mut floats[F_DIST], header.dist_km);
    set_f(&mut floats[F_AZ], header.az);
    set_f(&mut floats[F_BAZ], header.baz);
    set_f(&mut floats[F_GCARC], header.gcarc);

    ints[I_NVHDR] = 6;
    ints[I_NPTS] = trace.data.len() as i32;
    ints[I_IFTYPE] = IFTYPE_TIME_SERIES;
    ints[I_LEVEN] = 1;
    if let Some(reference) = header.reference {
        ints[I_NZYEAR] = reference.year();
        ints[I_NZJDAY] = reference.ordinal() as i32;
        ints[I_NZHOUR] = reference.hour() as i32;
        ints[I_NZMIN] = reference.minute() as i32;
        ints[I_NZSEC] = reference.second() as i32;
        ints[I_NZMSEC] = (reference.nanosecond() / 1_000_000) as i32;
    }

    let mut put_k = |field: (usize, usize), value: &Option<String>| {
        let text = match value {
            Some(text) => text.as_str(),
            None => "-12345",
        };
        for (i, byte) in text.bytes().take(field.1).enumerate() {
            chars[field.0 + i] = byte;
        }
    };
    put_k(K_STNM, &header.kstnm);
    put_k(K_EVNM, &header.kevnm);
    put_k(K_CMPNM, &header.kcmpnm);
    put_k(K_NETWK, &header.knetwk);

    let mut bytes = Vec::with_capacity(HEADER_BYTES + trace.data.len() * 4);
    for value in floats {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for value in ints {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&chars);
    for &sample in &trace.data {
        bytes.extend_from_slice(&(sample as f32).to_le_bytes());
    }

    fs::write(path, bytes)?;
    Ok(())
}
