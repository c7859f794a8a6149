//! Spherical geometry: Maidenhead locators, great-circle distance and
//! initial bearing.
use std::collections::HashMap;

use thiserror::Error;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid locator {0:?}: 2, 4, 6 or 8 characters accepted")]
    InvalidGrid(String),
}

fn haversine(value: f64) -> f64 {
    (value / 2.0).sin().powi(2)
}

/// Great-circle distance in kilometers between two (lat, lon) pairs.
pub fn distance(orig: (f64, f64), dest: (f64, f64)) -> f64 {
    let (lat1, lon1) = orig;
    let (lat2, lon2) = dest;

    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());

    let axr = haversine(dphi) + phi1.cos() * phi2.cos() * haversine(dlambda);
    2.0 * EARTH_RADIUS_KM * axr.sqrt().atan2((1.0 - axr).sqrt())
}

/// Initial bearing of `dest` as seen from `orig`, in whole degrees.
pub fn azimuth(orig: (f64, f64), dest: (f64, f64)) -> u32 {
    let (lat1, lon1) = orig;
    let (lat2, lon2) = dest;

    let d_lon = (lon2 - lon1).to_radians();
    let x = lat2.to_radians().cos() * d_lon.sin();
    let y = lat1.to_radians().cos() * lat2.to_radians().sin()
        - lat1.to_radians().sin() * lat2.to_radians().cos() * d_lon.cos();
    let bearing = x.atan2(y).to_degrees();
    (bearing.floor() as i32).unsigned_abs() % 360
}

/// Decode a Maidenhead locator into (latitude, longitude) degrees.
///
/// Accepts 2, 4, 6 or 8 character locators; each pair refines the previous
/// one (20°/10°, 2°/1°, 5′/2.5′, 30″/15″ steps).
pub fn grid_to_latlon(maiden: &str) -> Result<(f64, f64), Error> {
    let grid = maiden.trim().to_uppercase();
    let chars: Vec<char> = grid.chars().collect();
    if !matches!(chars.len(), 2 | 4 | 6 | 8) {
        return Err(Error::InvalidGrid(maiden.to_string()));
    }

    let letter = |c: char| (c as i32 - 'A' as i32) as f64;
    let digit = |c: char| c.to_digit(10).map(f64::from);

    let mut lon = -180.0 + letter(chars[0]) * 20.0;
    let mut lat = -90.0 + letter(chars[1]) * 10.0;

    if chars.len() >= 4 {
        let (d0, d1) = match (digit(chars[2]), digit(chars[3])) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(Error::InvalidGrid(maiden.to_string())),
        };
        lon += d0 * 2.0;
        lat += d1;
    }
    if chars.len() >= 6 {
        lon += letter(chars[4]) * 5.0 / 60.0;
        lat += letter(chars[5]) * 2.5 / 60.0;
    }
    if chars.len() >= 8 {
        let (d0, d1) = match (digit(chars[6]), digit(chars[7])) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(Error::InvalidGrid(maiden.to_string())),
        };
        lon += d0 * 5.0 / 600.0;
        lat += d1 * 2.5 / 600.0;
    }

    Ok((lat, lon))
}

/// Memoized locator decoding. The working set is the handful of grids seen
/// in a session, so the cache is unbounded.
#[derive(Default)]
pub struct GridCache {
    map: HashMap<String, (f64, f64)>,
}

impl GridCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latlon(&mut self, maiden: &str) -> Result<(f64, f64), Error> {
        if let Some(&hit) = self.map.get(maiden) {
            return Ok(hit);
        }
        let latlon = grid_to_latlon(maiden)?;
        self.map.insert(maiden.to_string(), latlon);
        Ok(latlon)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn four_character_grid() {
        // W1AW, Newington CT
        let (lat, lon) = grid_to_latlon("FN31").unwrap();
        assert_eq!(lat, 41.0);
        assert_eq!(lon, -74.0);
    }

    #[test]
    fn grid_is_case_insensitive() {
        assert_eq!(grid_to_latlon("fn31").unwrap(), grid_to_latlon("FN31").unwrap());
    }

    #[test]
    fn six_and_eight_character_grids_refine() {
        let (lat4, lon4) = grid_to_latlon("CM87").unwrap();
        let (lat6, lon6) = grid_to_latlon("CM87uu").unwrap();
        let (lat8, lon8) = grid_to_latlon("CM87uu00").unwrap();
        assert!(lat6 >= lat4 && lat6 < lat4 + 1.0);
        assert!(lon6 >= lon4 && lon6 < lon4 + 2.0);
        assert_eq!(lat8, lat6);
        assert_eq!(lon8, lon6);
    }

    #[test]
    fn bad_lengths_are_rejected() {
        for grid in ["", "F", "FN3", "FN31p", "FN31pr210"] {
            assert!(grid_to_latlon(grid).is_err(), "{grid:?} should fail");
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        let here = grid_to_latlon("CM87").unwrap();
        assert!(distance(here, here).abs() < 1e-9);
    }

    #[test]
    fn quarter_circumference() {
        let d = distance((0.0, 0.0), (0.0, 90.0));
        assert!((d - 10007.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn azimuth_cardinal_points() {
        assert_eq!(azimuth((0.0, 0.0), (45.0, 0.0)), 0);
        assert_eq!(azimuth((0.0, 0.0), (0.0, 90.0)), 90);
    }

    #[test]
    fn cache_memoizes() {
        let mut cache = GridCache::new();
        cache.latlon("FN31").unwrap();
        cache.latlon("FN31").unwrap();
        assert_eq!(cache.len(), 1);
    }
}
