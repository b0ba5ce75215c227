use super::{check_axis, nearest, ResolvedAxis};
use crate::errors::MarsPlotResult;
use crate::request::AxisRequest;

/// Mars year of a continuous solar longitude. Year 1 starts at Ls 0.
pub fn mars_year(ls: f64) -> i64 {
    (ls / 360.0).floor() as i64 + 1
}

/// Continuous solar longitude for a bounded request, anchored on the year of `last`.
///
/// The year of the last sample is tried first. If the request lands past the end of the
/// data the previous year is used instead.
fn anchor(requested: f64, last: f64) -> (i64, f64) {
    let mut year = mars_year(last);
    let mut candidate = continuous(requested, year);
    if candidate > last && year > 1 {
        year -= 1;
        candidate = continuous(requested, year);
    }
    (year, candidate)
}

fn continuous(requested: f64, year: i64) -> f64 {
    if year >= 1 {
        requested + (year - 1) as f64 * 360.0
    } else {
        requested
    }
}

/// Resolves a solar longitude request (0-360) against a continuous Ls axis.
///
/// Single values are matched in the most recent year that contains them. For a range the
/// end is anchored first; the start is looked up in the same year and moved one year
/// back when it would not precede the end. Unset requests select the last sample.
pub fn resolve_solar_longitude(request: AxisRequest, ls: &[f64]) -> MarsPlotResult<ResolvedAxis> {
    check_axis(ls, "time")?;
    let last = ls[ls.len() - 1];
    let single = |requested: f64| -> MarsPlotResult<ResolvedAxis> {
        let (year, candidate) = anchor(requested, last);
        let i = nearest(candidate, ls, "time")?;
        Ok(ResolvedAxis::new(
            vec![i],
            format!(", Ls= (MY{:2}) {:.2}", year, ls[i].rem_euclid(360.0)),
        ))
    };

    match request {
        AxisRequest::Unset => single(last.rem_euclid(360.0)),
        AxisRequest::Value(requested) => single(requested),
        AxisRequest::WholeAxisAverage => {
            Ok(ResolvedAxis::new((0..ls.len()).collect(), ", time avg"))
        }
        AxisRequest::Range(begin, end) => {
            let (end_year, end_candidate) = anchor(end, last);
            let end_index = nearest(end_candidate, ls, "time")?;

            let mut begin_year = end_year;
            let mut begin_index = nearest(continuous(begin, begin_year), ls, "time")?;
            if begin_index >= end_index {
                begin_year -= 1;
                begin_index = nearest(continuous(begin, begin_year), ls, "time")?;
            }
            let begin_index = begin_index.min(end_index);

            let indices: Vec<usize> = (begin_index..=end_index).collect();
            Ok(ResolvedAxis::new(
                indices,
                format!(
                    ", Ls= avg [(MY{:2}) {:.2} <-> (MY{:2}) {:.2}]",
                    begin_year,
                    ls[begin_index].rem_euclid(360.0),
                    end_year,
                    ls[end_index].rem_euclid(360.0)
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Continuous Ls sampled every `step` degrees from 0 to `last` inclusive.
    fn axis(step: f64, last: f64) -> Vec<f64> {
        let n = (last / step).round() as usize;
        (0..=n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn years() {
        assert_eq!(mars_year(0.0), 1);
        assert_eq!(mars_year(359.9), 1);
        assert_eq!(mars_year(360.0), 2);
        assert_eq!(mars_year(1070.0), 3);
    }

    #[test]
    fn request_resolves_in_last_year_when_available() {
        // Last sample: year 3, Ls 350
        let ls = axis(10.0, 1070.0);
        let resolved = resolve_solar_longitude(AxisRequest::Value(10.0), &ls).unwrap();
        assert_eq!(resolved.indices, vec![73]);
        assert_eq!(resolved.descriptor, ", Ls= (MY 3) 10.00");
    }

    #[test]
    fn request_past_end_falls_back_one_year() {
        // Last sample: year 3, Ls 5
        let ls = axis(5.0, 725.0);
        let resolved = resolve_solar_longitude(AxisRequest::Value(10.0), &ls).unwrap();
        assert_eq!(ls[resolved.indices[0]], 370.0);
        assert_eq!(resolved.descriptor, ", Ls= (MY 2) 10.00");
    }

    #[test]
    fn consecutive_years_are_one_year_of_samples_apart() {
        let two_years = axis(10.0, 710.0);
        let one_year = axis(10.0, 350.0);
        let late = resolve_solar_longitude(AxisRequest::Value(10.0), &two_years).unwrap();
        let early = resolve_solar_longitude(AxisRequest::Value(10.0), &one_year).unwrap();
        assert_eq!(late.indices[0] - early.indices[0], 36);
    }

    #[test]
    fn default_is_last_sample() {
        let ls = axis(10.0, 1070.0);
        let resolved = resolve_solar_longitude(AxisRequest::Unset, &ls).unwrap();
        assert_eq!(resolved.indices, vec![107]);
        assert_eq!(resolved.descriptor, ", Ls= (MY 3) 350.00");
    }

    #[test]
    fn range_across_year_boundary() {
        let ls = axis(10.0, 1070.0);
        let resolved = resolve_solar_longitude(AxisRequest::Range(300.0, 30.0), &ls).unwrap();
        assert_eq!(resolved.indices, (66..=75).collect::<Vec<_>>());
        assert_eq!(
            resolved.descriptor,
            ", Ls= avg [(MY 2) 300.00 <-> (MY 3) 30.00]"
        );
    }

    #[test]
    fn range_within_year() {
        let ls = axis(10.0, 1070.0);
        let resolved = resolve_solar_longitude(AxisRequest::Range(90.0, 120.0), &ls).unwrap();
        assert_eq!(resolved.indices, (81..=84).collect::<Vec<_>>());
    }

    #[test]
    fn single_sample_file() {
        let resolved = resolve_solar_longitude(AxisRequest::Value(10.0), &[400.0]).unwrap();
        assert_eq!(resolved.indices, vec![0]);
        let resolved =
            resolve_solar_longitude(AxisRequest::Range(0.0, 90.0), &[400.0]).unwrap();
        assert_eq!(resolved.indices, vec![0]);
    }

    #[test]
    fn whole_axis() {
        let ls = axis(10.0, 710.0);
        let resolved = resolve_solar_longitude(AxisRequest::WholeAxisAverage, &ls).unwrap();
        assert_eq!(resolved.indices.len(), ls.len());
        assert_eq!(resolved.descriptor, ", time avg");
    }
}
