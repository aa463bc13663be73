//! Spherical-earth great-circle geometry between two points.

use crate::header::GeoPoint;

const KM_PER_DEGREE: f64 = 111.19493;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreatCircle {
    /// Arc distance in degrees.
    pub gcarc: f64,
    pub dist_km: f64,
    /// Azimuth from the first point to the second, degrees from north.
    pub az: f64,
    /// Azimuth from the second point back to the first.
    pub baz: f64,
}

pub fn great_circle(from: GeoPoint, to: GeoPoint) -> GreatCircle {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let central = (phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * dlon.cos())
        .clamp(-1.0, 1.0)
        .acos();

    let az = azimuth(phi1, phi2, dlon);
    let baz = azimuth(phi2, phi1, -dlon);

    let gcarc = central.to_degrees();
    GreatCircle {
        gcarc,
        dist_km: gcarc * KM_PER_DEGREE,
        az,
        baz,
    }
}

fn azimuth(phi_from: f64, phi_to: f64, dlon: f64) -> f64 {
    let y = dlon.sin() * phi_to.cos();
    let x = phi_from.cos() * phi_to.sin() - phi_from.sin() * phi_to.cos() * dlon.cos();
    let degrees = y.atan2(x).to_degrees();
    degrees.rem_euclid(360.0)
}
