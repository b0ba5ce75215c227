//! Axis-index resolution
//!
//! Each resolver maps an [`AxisRequest`](crate::request::AxisRequest) onto the native
//! coordinate array of one axis and returns a [`ResolvedAxis`]: the indices to extract and
//! a short descriptor appended to figure titles (`", lat=30"`, `", zonal avg"`, ...).
//!
//! Extraction order is increasing index, except for the periodic axes (longitude and time
//! of day) where a range whose lower bound maps past its upper bound wraps around the end
//! of the array.
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::axes::resolve_longitude;
//! use marsplot_core::request::AxisRequest;
//!
//! // 0-360 grid, 30 degree spacing
//! let lons: Vec<f64> = (0..12).map(|i| i as f64 * 30.0).collect();
//! let resolved = resolve_longitude(AxisRequest::Range(-60.0, 60.0), &lons).unwrap();
//! assert_eq!(resolved.indices, vec![10, 11, 0, 1, 2]);
//! ```

mod latitude;
mod level;
mod longitude;
mod solar_longitude;
mod time_of_day;

pub use latitude::resolve_latitude;
pub use level::{resolve_level, VerticalKind, SURFACE_THRESHOLD};
pub use longitude::{lon180_to_360, lon360_to_180, resolve_longitude};
pub use solar_longitude::{mars_year, resolve_solar_longitude};
pub use time_of_day::{local_time_label, resolve_time_of_day};

use crate::errors::{MarsPlotError, MarsPlotResult};
use serde::{Deserialize, Serialize};

/// Indices selected along one axis and a descriptor of the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAxis {
    pub indices: Vec<usize>,
    pub descriptor: String,
}

impl ResolvedAxis {
    pub fn new(indices: Vec<usize>, descriptor: impl Into<String>) -> Self {
        Self {
            indices,
            descriptor: descriptor.into(),
        }
    }
}

/// Index of the coordinate closest to `target`.
///
/// Ties resolve to the first occurring index. NaN coordinates never match.
pub fn nearest_index(target: f64, coords: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in coords.iter().enumerate() {
        let distance = (target - value).abs();
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

pub(crate) fn nearest(target: f64, coords: &[f64], axis: &str) -> MarsPlotResult<usize> {
    nearest_index(target, coords).ok_or_else(|| MarsPlotError::EmptyAxis(axis.to_string()))
}

pub(crate) fn check_axis(coords: &[f64], axis: &str) -> MarsPlotResult<()> {
    if coords.is_empty() {
        Err(MarsPlotError::EmptyAxis(axis.to_string()))
    } else {
        Ok(())
    }
}

/// Inclusive index range between two bounds, in increasing order.
pub(crate) fn inclusive_range(a: usize, b: usize) -> Vec<usize> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (lo..=hi).collect()
}

/// Inclusive index range on a periodic axis of length `len`.
///
/// When `start` lies after `end` the result is the tail `start..len` followed by the head
/// `0..=end`.
pub(crate) fn periodic_range(start: usize, end: usize, len: usize) -> Vec<usize> {
    if start <= end {
        (start..=end).collect()
    } else {
        (start..len).chain(0..=end).collect()
    }
}

/// Formats a value as `d.dde+XX`, matching the exponent layout of C `printf`.
pub(crate) fn format_scientific(value: f64) -> String {
    let formatted = format!("{value:.2e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_prefers_first_on_ties() {
        let coords = [0.0, 10.0, 20.0];
        assert_eq!(nearest_index(5.0, &coords), Some(0));
        assert_eq!(nearest_index(15.0, &coords), Some(1));
        assert_eq!(nearest_index(100.0, &coords), Some(2));
        assert_eq!(nearest_index(1.0, &[]), None);
    }

    #[test]
    fn nearest_skips_nan() {
        assert_eq!(nearest_index(0.0, &[f64::NAN, 3.0]), Some(1));
    }

    #[test]
    fn ranges() {
        assert_eq!(inclusive_range(4, 2), vec![2, 3, 4]);
        assert_eq!(periodic_range(1, 3, 5), vec![1, 2, 3]);
        assert_eq!(periodic_range(3, 1, 5), vec![3, 4, 0, 1]);
        assert_eq!(periodic_range(2, 2, 5), vec![2]);
    }

    #[test]
    fn scientific_notation() {
        assert_eq!(format_scientific(10.0), "1.00e+01");
        assert_eq!(format_scientific(610.0), "6.10e+02");
        assert_eq!(format_scientific(0.05), "5.00e-02");
    }
}
