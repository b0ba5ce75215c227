use super::{check_axis, inclusive_range, nearest, ResolvedAxis};
use crate::errors::MarsPlotResult;
use crate::request::AxisRequest;

/// Resolves a latitude request. Unset requests select the equator.
pub fn resolve_latitude(request: AxisRequest, lats: &[f64]) -> MarsPlotResult<ResolvedAxis> {
    check_axis(lats, "latitude")?;
    let single = |x: f64| -> MarsPlotResult<ResolvedAxis> {
        let i = nearest(x, lats, "latitude")?;
        Ok(ResolvedAxis::new(vec![i], format!(", lat={}", lats[i])))
    };
    match request {
        AxisRequest::WholeAxisAverage => {
            Ok(ResolvedAxis::new((0..lats.len()).collect(), ", merid. avg"))
        }
        AxisRequest::Range(a, b) => {
            let indices = inclusive_range(nearest(a, lats, "latitude")?, nearest(b, lats, "latitude")?);
            let first = lats[indices[0]];
            let last = lats[indices[indices.len() - 1]];
            Ok(ResolvedAxis::new(indices, format!(", lat=avg[{first}<->{last}]")))
        }
        AxisRequest::Value(x) => single(x),
        AxisRequest::Unset => single(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lats() -> Vec<f64> {
        (0..36).map(|i| -87.5 + 5.0 * i as f64).collect()
    }

    #[test]
    fn default_is_equator() {
        let resolved = resolve_latitude(AxisRequest::Unset, &lats()).unwrap();
        // -2.5 and 2.5 are equidistant, first wins
        assert_eq!(resolved.indices, vec![17]);
        assert_eq!(resolved.descriptor, ", lat=-2.5");
    }

    #[test]
    fn reversed_range_extracts_increasing() {
        let resolved = resolve_latitude(AxisRequest::Range(10.0, -10.0), &lats()).unwrap();
        assert_eq!(resolved.indices, vec![15, 16, 17, 18, 19]);
        assert_eq!(resolved.descriptor, ", lat=avg[-12.5<->7.5]");
    }

    #[test]
    fn whole_axis() {
        let resolved = resolve_latitude(AxisRequest::WholeAxisAverage, &lats()).unwrap();
        assert_eq!(resolved.indices.len(), 36);
        assert_eq!(resolved.descriptor, ", merid. avg");
    }

    #[test]
    fn empty_axis_is_an_error() {
        assert!(resolve_latitude(AxisRequest::Value(10.0), &[]).is_err());
    }
}
