//! Interpreter state shared by parsing and evaluation
//!
//! [`InterpreterContext`] holds what the script and command line establish before figures
//! are evaluated: settings, simulation directories and the selected file timestamps.

use crate::config::EngineSettings;
use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::reference::VariableReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Date selection from the command line, in file timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFilter {
    Single(u32),
    /// Inclusive
    Range(u32, u32),
}

#[derive(Debug, Clone)]
pub struct InterpreterContext {
    pub settings: EngineSettings,
    /// Root directory of each simulation. Index 0 is the reference simulation.
    pub simulations: Vec<PathBuf>,
    /// Timestamps used by references that do not name one
    pub timestamps: Vec<u32>,
}

impl InterpreterContext {
    pub fn new(settings: EngineSettings) -> Self {
        let reference = settings.input_dir.clone();
        Self {
            settings,
            simulations: vec![reference],
            timestamps: Vec::new(),
        }
    }

    pub fn with_timestamps(mut self, timestamps: Vec<u32>) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Directory of simulation `index`.
    pub fn simulation_dir(&self, index: usize) -> MarsPlotResult<&Path> {
        self.simulations
            .get(index)
            .map(PathBuf::as_path)
            .ok_or_else(|| {
                MarsPlotError::Dataset(format!(
                    "simulation @{} is not listed in the Simulations block",
                    index + 1
                ))
            })
    }

    /// Timestamps to load for `reference`.
    pub fn timestamps_for(&self, reference: &VariableReference) -> Vec<u32> {
        match reference.timestamp {
            Some(timestamp) => vec![timestamp],
            None => self.timestamps.clone(),
        }
    }

    /// Selects timestamps from the `fixed` files found in the reference directory.
    pub fn select_dates(&mut self, filter: Option<DateFilter>) -> MarsPlotResult<()> {
        let available = list_timestamps(self.simulation_dir(0)?)?;
        self.timestamps = select_timestamps(&available, filter)?;
        log::info!("Using timestamps {:?}", self.timestamps);
        Ok(())
    }
}

impl Default for InterpreterContext {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

/// Timestamps of the `NNNNN.fixed.nc` files in `dir`, sorted.
pub fn list_timestamps(dir: &Path) -> MarsPlotResult<Vec<u32>> {
    let mut timestamps = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(prefix) = name.strip_suffix(".fixed.nc") {
            if let Ok(timestamp) = prefix.parse::<u32>() {
                timestamps.push(timestamp);
            }
        }
    }
    timestamps.sort_unstable();
    Ok(timestamps)
}

/// Applies a date filter. Without one, the most recent timestamp is used.
pub fn select_timestamps(available: &[u32], filter: Option<DateFilter>) -> MarsPlotResult<Vec<u32>> {
    match filter {
        None => available
            .last()
            .map(|&last| vec![last])
            .ok_or_else(|| MarsPlotError::Dataset("no fixed files found".to_string())),
        Some(DateFilter::Single(date)) => {
            if available.contains(&date) {
                Ok(vec![date])
            } else {
                Err(MarsPlotError::Dataset(format!(
                    "no file with timestamp {date:05}, available: {available:?}"
                )))
            }
        }
        Some(DateFilter::Range(begin, end)) => {
            let selected: Vec<u32> = available
                .iter()
                .copied()
                .filter(|&t| t >= begin.min(end) && t <= begin.max(end))
                .collect();
            if selected.is_empty() {
                Err(MarsPlotError::Dataset(format!(
                    "no file with timestamp between {begin:05} and {end:05}, available: {available:?}"
                )))
            } else {
                Ok(selected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_by_default() {
        assert_eq!(select_timestamps(&[350, 700, 1050], None).unwrap(), vec![1050]);
        assert!(select_timestamps(&[], None).is_err());
    }

    #[test]
    fn single_date_must_exist() {
        assert_eq!(
            select_timestamps(&[350, 700], Some(DateFilter::Single(350))).unwrap(),
            vec![350]
        );
        assert!(select_timestamps(&[350, 700], Some(DateFilter::Single(400))).is_err());
    }

    #[test]
    fn range_is_inclusive() {
        let available = [0, 350, 700, 1050];
        assert_eq!(
            select_timestamps(&available, Some(DateFilter::Range(350, 700))).unwrap(),
            vec![350, 700]
        );
        assert!(select_timestamps(&available, Some(DateFilter::Range(10, 20))).is_err());
    }

    #[test]
    fn explicit_reference_timestamp_wins() {
        let context = InterpreterContext::default().with_timestamps(vec![700]);
        let dated = VariableReference::new("atmos_average", "ps").with_timestamp(350);
        let undated = VariableReference::new("atmos_average", "ps");
        assert_eq!(context.timestamps_for(&dated), vec![350]);
        assert_eq!(context.timestamps_for(&undated), vec![700]);
    }

    #[test]
    fn unknown_simulation() {
        let context = InterpreterContext::default();
        assert!(context.simulation_dir(0).is_ok());
        assert!(context.simulation_dir(1).is_err());
    }

    #[test]
    fn catalog_reads_fixed_files() {
        let dir = std::env::temp_dir().join(format!("marsplot-catalog-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["00700.fixed.nc", "00350.fixed.nc", "00350.atmos_average.nc", "notes.txt"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        let timestamps = list_timestamps(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(timestamps, vec![350, 700]);
    }
}
