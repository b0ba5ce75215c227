use super::{check_axis, format_scientific, inclusive_range, nearest, ResolvedAxis};
use crate::errors::MarsPlotResult;
use crate::request::AxisRequest;
use serde::{Deserialize, Serialize};

/// Requests above this value select the surface level.
pub const SURFACE_THRESHOLD: f64 = 1.0e7;

/// The kind of vertical coordinate a dataset exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalKind {
    /// Pressure in Pa (`pfull`, `pstd`), increasing towards the surface
    Pressure,
    /// Height in m (`zstd`, `zagl`), increasing away from the surface
    Height,
}

impl VerticalKind {
    pub fn units(&self) -> &'static str {
        match self {
            VerticalKind::Pressure => "Pa",
            VerticalKind::Height => "m",
        }
    }

    fn surface_index(&self, levels: &[f64]) -> usize {
        let mut best = 0;
        for (i, &value) in levels.iter().enumerate() {
            let better = match self {
                VerticalKind::Pressure => value > levels[best],
                VerticalKind::Height => value < levels[best],
            };
            if better {
                best = i;
            }
        }
        best
    }
}

/// Resolves a vertical level request in the native units of `levels`.
///
/// Unset requests and values above [`SURFACE_THRESHOLD`] select the surface level. Range
/// descriptors list pressure bounds decreasing and height bounds increasing.
pub fn resolve_level(
    request: AxisRequest,
    levels: &[f64],
    kind: VerticalKind,
) -> MarsPlotResult<ResolvedAxis> {
    check_axis(levels, "level")?;
    let units = kind.units();
    match request {
        AxisRequest::WholeAxisAverage => {
            Ok(ResolvedAxis::new((0..levels.len()).collect(), ", column avg"))
        }
        AxisRequest::Unset => Ok(ResolvedAxis::new(vec![kind.surface_index(levels)], ", at sfc")),
        AxisRequest::Value(x) if x > SURFACE_THRESHOLD => {
            Ok(ResolvedAxis::new(vec![kind.surface_index(levels)], ", at sfc"))
        }
        AxisRequest::Value(x) => {
            let i = nearest(x, levels, "level")?;
            Ok(ResolvedAxis::new(
                vec![i],
                format!(", lev={} {units}", format_scientific(levels[i])),
            ))
        }
        AxisRequest::Range(a, b) => {
            let indices = inclusive_range(nearest(a, levels, "level")?, nearest(b, levels, "level")?);
            let first = levels[indices[0]];
            let last = levels[indices[indices.len() - 1]];
            let (upper, lower) = match kind {
                VerticalKind::Pressure => (first.max(last), first.min(last)),
                VerticalKind::Height => (first.min(last), first.max(last)),
            };
            Ok(ResolvedAxis::new(
                indices,
                format!(
                    ", lev=avg[{}<->{}] {units}",
                    format_scientific(upper),
                    format_scientific(lower)
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressures() -> Vec<f64> {
        vec![1.0, 10.0, 100.0, 300.0, 500.0, 610.0]
    }

    #[test]
    fn unset_selects_surface() {
        let resolved = resolve_level(AxisRequest::Unset, &pressures(), VerticalKind::Pressure)
            .unwrap();
        assert_eq!(resolved.indices, vec![5]);
        assert_eq!(resolved.descriptor, ", at sfc");

        let heights = [10.0, 100.0, 1000.0];
        let resolved = resolve_level(AxisRequest::Unset, &heights, VerticalKind::Height).unwrap();
        assert_eq!(resolved.indices, vec![0]);
    }

    #[test]
    fn large_value_reads_as_surface() {
        let resolved = resolve_level(
            AxisRequest::Value(2.0e7),
            &pressures(),
            VerticalKind::Pressure,
        )
        .unwrap();
        assert_eq!(resolved.descriptor, ", at sfc");
    }

    #[test]
    fn single_level() {
        let resolved =
            resolve_level(AxisRequest::Value(50.0), &pressures(), VerticalKind::Pressure).unwrap();
        assert_eq!(resolved.indices, vec![1]);
        assert_eq!(resolved.descriptor, ", lev=1.00e+01 Pa");
    }

    #[test]
    fn pressure_range_displays_decreasing() {
        let resolved = resolve_level(
            AxisRequest::Range(10.0, 500.0),
            &pressures(),
            VerticalKind::Pressure,
        )
        .unwrap();
        assert_eq!(resolved.indices, vec![1, 2, 3, 4]);
        assert_eq!(resolved.descriptor, ", lev=avg[5.00e+02<->1.00e+01] Pa");
    }

    #[test]
    fn height_range_displays_increasing() {
        let heights = [10.0, 100.0, 1000.0, 5000.0];
        let resolved = resolve_level(
            AxisRequest::Range(5000.0, 100.0),
            &heights,
            VerticalKind::Height,
        )
        .unwrap();
        assert_eq!(resolved.indices, vec![1, 2, 3]);
        assert_eq!(resolved.descriptor, ", lev=avg[1.00e+02<->5.00e+03] m");
    }
}
