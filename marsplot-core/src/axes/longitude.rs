use super::{check_axis, nearest, periodic_range, ResolvedAxis};
use crate::errors::MarsPlotResult;
use crate::request::AxisRequest;

/// Converts a -180/+180 longitude to the 0-360 convention.
pub fn lon180_to_360(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Converts a 0-360 longitude to the -180/+180 convention.
pub fn lon360_to_180(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Resolves a longitude request given in -180/+180 degrees.
///
/// The storage convention of `lons` is detected from the data: any value above 180 means
/// the grid runs 0-360 and requests are converted before matching. Descriptors always
/// report -180/+180 values. Unset requests select the zonal average.
pub fn resolve_longitude(request: AxisRequest, lons: &[f64]) -> MarsPlotResult<ResolvedAxis> {
    check_axis(lons, "longitude")?;
    let is_360 = lons.iter().any(|&lon| lon > 180.0);
    let to_native = |lon: f64| if is_360 { lon180_to_360(lon) } else { lon };
    let to_display = |lon: f64| if is_360 { lon360_to_180(lon) } else { lon };

    match request {
        AxisRequest::Unset | AxisRequest::WholeAxisAverage => {
            Ok(ResolvedAxis::new((0..lons.len()).collect(), ", zonal avg"))
        }
        AxisRequest::Value(x) => {
            let i = nearest(to_native(x), lons, "longitude")?;
            Ok(ResolvedAxis::new(
                vec![i],
                format!(", lon={:.1}", to_display(lons[i])),
            ))
        }
        AxisRequest::Range(a, b) => {
            let start = nearest(to_native(a), lons, "longitude")?;
            let end = nearest(to_native(b), lons, "longitude")?;
            let indices = periodic_range(start, end, lons.len());
            Ok(ResolvedAxis::new(
                indices,
                format!(
                    ", lon=avg[{:.1}<->{:.1}]",
                    to_display(lons[start]),
                    to_display(lons[end])
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_360(n: usize) -> Vec<f64> {
        let step = 360.0 / n as f64;
        (0..n).map(|i| i as f64 * step).collect()
    }

    fn grid_180(n: usize) -> Vec<f64> {
        let step = 360.0 / n as f64;
        (0..n).map(|i| -180.0 + i as f64 * step).collect()
    }

    #[test]
    fn default_is_zonal_average() {
        let resolved = resolve_longitude(AxisRequest::Unset, &grid_360(72)).unwrap();
        assert_eq!(resolved.indices.len(), 72);
        assert_eq!(resolved.descriptor, ", zonal avg");
    }

    #[test]
    fn western_longitude_on_360_grid() {
        let resolved = resolve_longitude(AxisRequest::Value(-90.0), &grid_360(72)).unwrap();
        assert_eq!(resolved.indices, vec![54]);
        assert_eq!(resolved.descriptor, ", lon=-90.0");
    }

    #[test]
    fn range_across_prime_meridian_wraps_on_360_grid() {
        let resolved =
            resolve_longitude(AxisRequest::Range(-10.0, 10.0), &grid_360(72)).unwrap();
        assert_eq!(resolved.indices, vec![70, 71, 0, 1, 2]);
        assert_eq!(resolved.descriptor, ", lon=avg[-10.0<->10.0]");
    }

    #[test]
    fn antimeridian_range_on_360_grid_is_contiguous() {
        let lons = grid_360(96);
        let resolved = resolve_longitude(AxisRequest::Range(170.0, -170.0), &lons).unwrap();
        assert_eq!(resolved.indices, (45..=51).collect::<Vec<_>>());
        let span = lons[51] - lons[45];
        assert!(span > 20.0 && span < 25.0);
    }

    #[test]
    fn antimeridian_range_on_180_grid_wraps() {
        let lons = grid_180(96);
        let resolved = resolve_longitude(AxisRequest::Range(170.0, -170.0), &lons).unwrap();
        assert_eq!(resolved.indices, vec![93, 94, 95, 0, 1, 2, 3]);
    }

    #[test]
    fn ordered_range_is_plain() {
        let resolved =
            resolve_longitude(AxisRequest::Range(-45.0, 45.0), &grid_180(72)).unwrap();
        assert_eq!(resolved.indices, (27..=45).collect::<Vec<_>>());
    }

    #[test]
    fn conversions() {
        assert_eq!(lon180_to_360(-90.0), 270.0);
        assert_eq!(lon180_to_360(90.0), 90.0);
        assert_eq!(lon360_to_180(270.0), -90.0);
        assert_eq!(lon360_to_180(180.0), 180.0);
    }
}
