pub mod codec;
pub mod dsp;
pub mod errors;
pub mod geo;
pub mod header;
pub mod polezero;
pub mod trace;

pub use errors::SacError;
pub use geo::{great_circle, GreatCircle};
pub use header::{GeoPoint, Header};
pub use polezero::PoleZero;
pub use trace::Trace;

#[cfg(test)]
mod tests;
