//! Variable references and per-reference dimension overrides
//!
//! A reference names one field in one dataset file:
//!
//! ```text
//! [timestamp.]dataset_kind[@N].variable[{axis=value;axis=value}]
//! ```
//!
//! * `timestamp` - optional 5-digit file prefix (`02400`), otherwise taken from context
//! * `dataset_kind` - file family such as `atmos_average` or `fixed`
//! * `@N` - 1-based simulation number, `@1` or no suffix is the reference simulation
//! * `{...}` - overrides applied to this reference only
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::reference::{decode_overrides, VariableReference};
//! use marsplot_core::request::{AxisRequest, Dimension};
//!
//! let (base, overrides) =
//!     decode_overrides("02400.atmos_average@2.temp{lev=50}", &[Dimension::Level]).unwrap();
//! let reference = VariableReference::parse(base).unwrap();
//! assert_eq!(reference.timestamp, Some(2400));
//! assert_eq!(reference.dataset_kind, "atmos_average");
//! assert_eq!(reference.variable_name, "temp");
//! assert_eq!(reference.simulation_index, 1);
//! assert_eq!(overrides.get(Dimension::Level), Some(AxisRequest::Value(50.0)));
//! ```

use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::request::{parse_scalar, AxisRequest, Dimension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One field in one dataset file of one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableReference {
    /// Explicit file timestamp, resolved from context when absent
    pub timestamp: Option<u32>,
    pub dataset_kind: String,
    pub variable_name: String,
    /// 0 is the reference simulation
    pub simulation_index: usize,
}

impl VariableReference {
    pub fn new(dataset_kind: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            dataset_kind: dataset_kind.into(),
            variable_name: variable_name.into(),
            simulation_index: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_simulation(mut self, simulation_index: usize) -> Self {
        self.simulation_index = simulation_index;
        self
    }

    /// Parses a reference without an override block.
    pub fn parse(text: &str) -> MarsPlotResult<Self> {
        let text = text.trim();
        let malformed = |reason: String| MarsPlotError::MalformedReference {
            reference: text.to_string(),
            reason,
        };

        let parts: Vec<&str> = text.split('.').collect();
        let (timestamp, kind_and_id, variable_name) = match parts.as_slice() {
            [kind, variable] => (None, *kind, *variable),
            [timestamp, kind, variable] => {
                let timestamp = timestamp
                    .parse::<u32>()
                    .map_err(|_| malformed(format!("'{timestamp}' is not a timestamp")))?;
                (Some(timestamp), *kind, *variable)
            }
            _ => {
                return Err(malformed(format!(
                    "expected one or two '.' separators, found {}",
                    parts.len() - 1
                )))
            }
        };

        let (dataset_kind, simulation_index) = match kind_and_id.split_once('@') {
            None => (kind_and_id, 0),
            Some((kind, id)) => {
                let number = id
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("'@{id}' is not a simulation number")))?;
                if number == 0 {
                    return Err(malformed("simulation numbers start at 1".to_string()));
                }
                (kind, number - 1)
            }
        };

        if dataset_kind.is_empty() || variable_name.is_empty() {
            return Err(malformed("missing dataset or variable name".to_string()));
        }

        Ok(Self {
            timestamp,
            dataset_kind: dataset_kind.to_string(),
            variable_name: variable_name.to_string(),
            simulation_index,
        })
    }

    /// Name of the dataset file, given the timestamp to use.
    pub fn file_name(&self, timestamp: u32) -> String {
        format!("{timestamp:05}.{}.nc", self.dataset_kind)
    }
}

impl FromStr for VariableReference {
    type Err = MarsPlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VariableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(timestamp) = self.timestamp {
            write!(f, "{timestamp:05}.")?;
        }
        write!(f, "{}", self.dataset_kind)?;
        if self.simulation_index > 0 {
            write!(f, "@{}", self.simulation_index + 1)?;
        }
        write!(f, ".{}", self.variable_name)
    }
}

/// Axis selections that replace a figure's own values for a single reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionOverride {
    values: BTreeMap<Dimension, AxisRequest>,
}

impl DimensionOverride {
    pub fn get(&self, dimension: Dimension) -> Option<AxisRequest> {
        self.values.get(&dimension).copied()
    }

    pub fn set(&mut self, dimension: Dimension, request: AxisRequest) {
        self.values.insert(dimension, request);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, AxisRequest)> + '_ {
        self.values.iter().map(|(d, r)| (*d, *r))
    }

    /// The effective request for `dimension`: the override if present, else `declared`.
    pub fn apply(&self, dimension: Dimension, declared: AxisRequest) -> AxisRequest {
        self.get(dimension).unwrap_or(declared)
    }
}

/// Splits an optional trailing `{axis=value;...}` block off a reference.
///
/// Only keys naming one of `allowed` are kept. Unknown keys, keys that do not apply and
/// segments without a value are reported and skipped. An unterminated block is a
/// malformed reference.
pub fn decode_overrides<'a>(
    text: &'a str,
    allowed: &[Dimension],
) -> MarsPlotResult<(&'a str, DimensionOverride)> {
    let text = text.trim();
    let mut overrides = DimensionOverride::default();
    let Some(open) = text.find('{') else {
        return Ok((text, overrides));
    };
    let malformed = |reason: &str| MarsPlotError::MalformedReference {
        reference: text.to_string(),
        reason: reason.to_string(),
    };
    let close = text
        .rfind('}')
        .filter(|&close| close > open)
        .ok_or_else(|| malformed("unterminated '{' block"))?;
    if !text[close + 1..].trim().is_empty() {
        return Err(malformed("unexpected text after '}'"));
    }

    let block = &text[open + 1..close];
    let separators = block.matches(';').count();
    let assignments = block.matches('=').count();
    if assignments > separators + 1 {
        log::warn!(
            "*** Warning *** use a semicolon ';' to separate dimensions in '{{{block}}}'"
        );
    }

    for segment in block.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = segment.split_once('=') else {
            log::warn!("*** Warning *** ignoring '{segment}' in '{text}', expected 'axis=value'");
            continue;
        };
        let key = key.trim();
        match Dimension::from_key(key) {
            None => log::warn!(
                "*** Warning *** ignoring unknown dimension '{key}' in '{text}', use one of ls, lev, lon, lat, tod"
            ),
            Some(dimension) if !allowed.contains(&dimension) => log::warn!(
                "*** Warning *** ignoring '{key}' in '{text}', it is not a free dimension of this plot"
            ),
            Some(dimension) => {
                let request = parse_scalar(value).into_request(key);
                overrides.set(dimension, request);
            }
        }
    }

    Ok((text[..open].trim_end(), overrides))
}
