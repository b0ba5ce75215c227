use super::{check_axis, nearest, periodic_range, ResolvedAxis};
use crate::errors::MarsPlotResult;
use crate::request::AxisRequest;

const DEFAULT_HOUR: f64 = 15.0;

/// Formats an hour of the day (0-24) as `HH:MM`, rounded to the minute.
pub fn local_time_label(hours: f64) -> String {
    let minutes = (hours.rem_euclid(24.0) * 60.0).round() as i64;
    format!("{:02}:{:02}", (minutes / 60) % 24, minutes % 60)
}

/// Resolves a time-of-day request on the 0-24 hour axis of a diurnal dataset.
///
/// Ranges wrap around midnight the same way longitude ranges wrap around the grid edge.
/// Unset requests select 15:00.
pub fn resolve_time_of_day(request: AxisRequest, tods: &[f64]) -> MarsPlotResult<ResolvedAxis> {
    check_axis(tods, "time of day")?;
    let single = |hour: f64| -> MarsPlotResult<ResolvedAxis> {
        let i = nearest(hour, tods, "time of day")?;
        Ok(ResolvedAxis::new(
            vec![i],
            format!(", tod= {}", local_time_label(tods[i])),
        ))
    };
    match request {
        AxisRequest::Unset => single(DEFAULT_HOUR),
        AxisRequest::Value(hour) => single(hour),
        AxisRequest::WholeAxisAverage => {
            Ok(ResolvedAxis::new((0..tods.len()).collect(), ", tod avg"))
        }
        AxisRequest::Range(a, b) => {
            let start = nearest(a, tods, "time of day")?;
            let end = nearest(b, tods, "time of day")?;
            Ok(ResolvedAxis::new(
                periodic_range(start, end, tods.len()),
                format!(
                    ", tod=avg[{}<->{}]",
                    local_time_label(tods[start]),
                    local_time_label(tods[end])
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours() -> Vec<f64> {
        (0..24).map(|h| h as f64 + 0.5).collect()
    }

    #[test]
    fn labels() {
        assert_eq!(local_time_label(15.0), "15:00");
        assert_eq!(local_time_label(6.5), "06:30");
        assert_eq!(local_time_label(23.999), "00:00");
    }

    #[test]
    fn default_is_afternoon() {
        let resolved = resolve_time_of_day(AxisRequest::Unset, &hours()).unwrap();
        // 14.5 and 15.5 are equidistant, first wins
        assert_eq!(resolved.indices, vec![14]);
        assert_eq!(resolved.descriptor, ", tod= 14:30");
    }

    #[test]
    fn night_range_wraps_midnight() {
        let resolved = resolve_time_of_day(AxisRequest::Range(21.5, 2.5), &hours()).unwrap();
        assert_eq!(resolved.indices, vec![21, 22, 23, 0, 1, 2]);
        assert_eq!(resolved.descriptor, ", tod=avg[21:30<->02:30]");
    }

    #[test]
    fn whole_day() {
        let resolved = resolve_time_of_day(AxisRequest::WholeAxisAverage, &hours()).unwrap();
        assert_eq!(resolved.indices.len(), 24);
        assert_eq!(resolved.descriptor, ", tod avg");
    }
}
