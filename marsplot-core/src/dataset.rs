//! Gridded fields and the sources they are loaded from
//!
//! Reading model output files is left to a [`DatasetSource`]. The engine asks the source
//! for one variable of one file at a time and receives a [`Field`]: an n-dimensional array
//! tagged with its dimensions and their coordinates.
//!
//! Supported layouts follow the model output conventions, dimensions always appear in the
//! order time, time of day, level, latitude, longitude:
//!
//! - `(lat, lon)` for `fixed` files
//! - `(time, lat, lon)`, `(time, lev, lat, lon)`
//! - `(time, tod, lat, lon)`, `(time, tod, lev, lat, lon)` for diurnal files
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::dataset::{Coordinates, DatasetSource, Field, MemoryDataset};
//! use marsplot_core::request::Dimension;
//! use ndarray::{ArrayD, IxDyn};
//! use std::path::Path;
//!
//! let coords = Coordinates {
//!     latitude: Some(vec![-45.0, 45.0]),
//!     longitude: Some(vec![0.0, 120.0, 240.0]),
//!     ..Coordinates::default()
//! };
//! let field = Field::new(
//!     "zsurf",
//!     vec![Dimension::Latitude, Dimension::Longitude],
//!     ArrayD::zeros(IxDyn(&[2, 3])),
//!     coords,
//! )
//! .unwrap();
//!
//! let source = MemoryDataset::default().with_field(".", "00350.fixed.nc", field);
//! let loaded = source.load(Path::new("."), "00350.fixed.nc", "zsurf").unwrap();
//! assert_eq!(loaded.shape(), &[2, 3]);
//! ```

use crate::axes::VerticalKind;
use crate::context::InterpreterContext;
use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::reference::VariableReference;
use crate::request::Dimension;
use ndarray::{concatenate, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Coordinate arrays of the dimensions a field carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Continuous solar longitude of each time sample
    pub time: Option<Vec<f64>>,
    /// Sol number of each time sample
    pub sols: Option<Vec<f64>>,
    /// Hours, 0-24
    pub time_of_day: Option<Vec<f64>>,
    pub level: Option<Vec<f64>>,
    pub vertical: VerticalKind,
    pub latitude: Option<Vec<f64>>,
    pub longitude: Option<Vec<f64>>,
}

impl Default for Coordinates {
    fn default() -> Self {
        Self {
            time: None,
            sols: None,
            time_of_day: None,
            level: None,
            vertical: VerticalKind::Pressure,
            latitude: None,
            longitude: None,
        }
    }
}

impl Coordinates {
    pub fn get(&self, dimension: Dimension) -> Option<&[f64]> {
        match dimension {
            Dimension::Time => self.time.as_deref(),
            Dimension::TimeOfDay => self.time_of_day.as_deref(),
            Dimension::Level => self.level.as_deref(),
            Dimension::Latitude => self.latitude.as_deref(),
            Dimension::Longitude => self.longitude.as_deref(),
        }
    }
}

/// One variable loaded from one or more files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub long_name: Option<String>,
    pub units: Option<String>,
    pub dims: Vec<Dimension>,
    pub data: ArrayD<f64>,
    pub coords: Coordinates,
}

fn layout_text(dims: &[Dimension]) -> String {
    dims.iter().map(|d| d.key()).collect::<Vec<_>>().join(", ")
}

impl Field {
    /// Checks the layout and that every dimension has a coordinate of matching length.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<Dimension>,
        data: ArrayD<f64>,
        coords: Coordinates,
    ) -> MarsPlotResult<Self> {
        let name = name.into();
        let unsupported = || MarsPlotError::UnsupportedLayout {
            variable: name.clone(),
            dims: layout_text(&dims),
        };

        let ordered = dims.windows(2).all(|pair| pair[0] < pair[1]);
        let horizontal = dims.ends_with(&[Dimension::Latitude, Dimension::Longitude]);
        let timed = dims.len() == 2 || dims.first() == Some(&Dimension::Time);
        if !ordered || !horizontal || !timed || dims.len() != data.ndim() {
            return Err(unsupported());
        }

        for (axis, dimension) in dims.iter().enumerate() {
            let coordinate = coords
                .get(*dimension)
                .ok_or_else(|| MarsPlotError::MissingDimension {
                    variable: name.clone(),
                    dimension: dimension.name().to_string(),
                })?;
            if coordinate.len() != data.shape()[axis] {
                return Err(MarsPlotError::Dataset(format!(
                    "{name}: {} coordinate has {} values for an axis of length {}",
                    dimension.name(),
                    coordinate.len(),
                    data.shape()[axis]
                )));
            }
        }
        if let (Some(time), Some(sols)) = (&coords.time, &coords.sols) {
            if time.len() != sols.len() {
                return Err(MarsPlotError::Dataset(format!(
                    "{name}: {} sols for {} time samples",
                    sols.len(),
                    time.len()
                )));
            }
        }

        Ok(Self {
            name,
            long_name: None,
            units: None,
            dims,
            data,
            coords,
        })
    }

    pub fn with_description(mut self, long_name: impl Into<String>, units: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self.units = Some(units.into());
        self
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Array axis holding `dimension`.
    pub fn axis_of(&self, dimension: Dimension) -> Option<usize> {
        self.dims.iter().position(|d| *d == dimension)
    }

    pub fn has(&self, dimension: Dimension) -> bool {
        self.axis_of(dimension).is_some()
    }

    /// Coordinate of `dimension`, or an error naming the variable.
    pub fn coordinate(&self, dimension: Dimension) -> MarsPlotResult<&[f64]> {
        self.coords
            .get(dimension)
            .filter(|_| self.has(dimension))
            .ok_or_else(|| MarsPlotError::MissingDimension {
                variable: self.name.clone(),
                dimension: dimension.name().to_string(),
            })
    }

    /// `long name [units]`, falling back to the variable name.
    pub fn label(&self) -> String {
        let name = self.long_name.as_deref().unwrap_or(&self.name);
        match &self.units {
            Some(units) => format!("{name} [{units}]"),
            None => name.to_string(),
        }
    }

    /// Joins fields from consecutive files along the time axis.
    pub fn concat_time(mut fields: Vec<Field>) -> MarsPlotResult<Field> {
        if fields.len() <= 1 {
            return fields
                .pop()
                .ok_or_else(|| MarsPlotError::Dataset("no file to load".to_string()));
        }
        let first = &fields[0];
        if first.axis_of(Dimension::Time) != Some(0) {
            // Time-invariant fields are identical in every file
            return Ok(fields.swap_remove(0));
        }
        if fields.iter().any(|f| f.dims != first.dims) {
            return Err(MarsPlotError::Dataset(format!(
                "{}: files do not share a dimension layout",
                first.name
            )));
        }

        let views: Vec<_> = fields.iter().map(|f| f.data.view()).collect();
        let data = concatenate(Axis(0), &views).map_err(|e| {
            MarsPlotError::Dataset(format!("{}: cannot join files: {e}", first.name))
        })?;
        let time = fields
            .iter()
            .map(|f| f.coords.time.clone())
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.concat());
        let sols = fields
            .iter()
            .map(|f| f.coords.sols.clone())
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.concat());
        let coords = Coordinates {
            time,
            sols,
            ..first.coords.clone()
        };

        let mut joined = Field::new(first.name.clone(), first.dims.clone(), data, coords)?;
        joined.long_name = first.long_name.clone();
        joined.units = first.units.clone();
        Ok(joined)
    }
}

/// Reads one variable out of a model output file.
pub trait DatasetSource {
    /// Loads `variable` from `file_name` (e.g. `00350.atmos_average.nc`) in `directory`.
    fn load(&self, directory: &Path, file_name: &str, variable: &str) -> MarsPlotResult<Field>;
}

/// Loads a reference across the timestamps selected for it.
pub fn load_reference(
    source: &dyn DatasetSource,
    context: &InterpreterContext,
    reference: &VariableReference,
) -> MarsPlotResult<Field> {
    let directory = context.simulation_dir(reference.simulation_index)?;
    let timestamps = context.timestamps_for(reference);
    if timestamps.is_empty() {
        return Err(MarsPlotError::Dataset(format!(
            "no timestamp selected for {reference}"
        )));
    }
    let fields = timestamps
        .iter()
        .map(|&timestamp| {
            let file_name = reference.file_name(timestamp);
            log::debug!("loading {} from {}", reference.variable_name, directory.join(&file_name).display());
            source.load(directory, &file_name, &reference.variable_name)
        })
        .collect::<MarsPlotResult<Vec<_>>>()?;
    Field::concat_time(fields)
}

/// An in-memory source, keyed by directory, file name and variable.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    fields: HashMap<(PathBuf, String, String), Field>,
}

impl MemoryDataset {
    pub fn insert(&mut self, directory: impl Into<PathBuf>, file_name: &str, field: Field) {
        self.fields.insert(
            (directory.into(), file_name.to_string(), field.name.clone()),
            field,
        );
    }

    pub fn with_field(mut self, directory: impl Into<PathBuf>, file_name: &str, field: Field) -> Self {
        self.insert(directory, file_name, field);
        self
    }
}

impl DatasetSource for MemoryDataset {
    fn load(&self, directory: &Path, file_name: &str, variable: &str) -> MarsPlotResult<Field> {
        let key = (directory.to_path_buf(), file_name.to_string(), variable.to_string());
        if let Some(field) = self.fields.get(&key) {
            return Ok(field.clone());
        }
        let file_exists = self
            .fields
            .keys()
            .any(|(dir, file, _)| dir == directory && file == file_name);
        if file_exists {
            Err(MarsPlotError::Dataset(format!(
                "variable {variable} not found in {file_name}"
            )))
        } else {
            Err(MarsPlotError::Dataset(format!(
                "{} does not exist",
                directory.join(file_name).display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn surface_coords(times: &[f64]) -> Coordinates {
        Coordinates {
            time: Some(times.to_vec()),
            sols: Some(times.iter().map(|t| t * 2.0).collect()),
            latitude: Some(vec![-30.0, 30.0]),
            longitude: Some(vec![0.0, 180.0]),
            ..Coordinates::default()
        }
    }

    fn surface_field(times: &[f64], value: f64) -> Field {
        Field::new(
            "ps",
            vec![Dimension::Time, Dimension::Latitude, Dimension::Longitude],
            ArrayD::from_elem(IxDyn(&[times.len(), 2, 2]), value),
            surface_coords(times),
        )
        .unwrap()
        .with_description("surface pressure", "Pa")
    }

    #[test]
    fn layout_checks() {
        let coords = surface_coords(&[1.0]);
        let swapped = Field::new(
            "ps",
            vec![Dimension::Time, Dimension::Longitude, Dimension::Latitude],
            ArrayD::zeros(IxDyn(&[1, 2, 2])),
            coords.clone(),
        );
        assert!(matches!(swapped, Err(MarsPlotError::UnsupportedLayout { .. })));

        let no_lon = Field::new(
            "ps",
            vec![Dimension::Time, Dimension::Latitude],
            ArrayD::zeros(IxDyn(&[1, 2])),
            coords.clone(),
        );
        assert!(matches!(no_lon, Err(MarsPlotError::UnsupportedLayout { .. })));

        let no_levels = Field::new(
            "temp",
            vec![
                Dimension::Time,
                Dimension::Level,
                Dimension::Latitude,
                Dimension::Longitude,
            ],
            ArrayD::zeros(IxDyn(&[1, 3, 2, 2])),
            coords,
        );
        assert!(matches!(no_levels, Err(MarsPlotError::MissingDimension { .. })));
    }

    #[test]
    fn coordinate_length_must_match() {
        let result = Field::new(
            "ps",
            vec![Dimension::Time, Dimension::Latitude, Dimension::Longitude],
            ArrayD::zeros(IxDyn(&[2, 2, 2])),
            surface_coords(&[1.0]),
        );
        assert!(matches!(result, Err(MarsPlotError::Dataset(_))));
    }

    #[test]
    fn label() {
        assert_eq!(surface_field(&[1.0], 0.0).label(), "surface pressure [Pa]");
    }

    #[test]
    fn files_join_along_time() {
        let joined = Field::concat_time(vec![
            surface_field(&[1.0, 2.0], 1.0),
            surface_field(&[3.0], 2.0),
        ])
        .unwrap();
        assert_eq!(joined.shape(), &[3, 2, 2]);
        assert_eq!(joined.coords.time, Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(joined.coords.sols, Some(vec![2.0, 4.0, 6.0]));
        assert_eq!(joined.data[[2, 0, 0]], 2.0);
        assert_eq!(joined.units.as_deref(), Some("Pa"));
    }

    #[test]
    fn fixed_fields_are_not_repeated() {
        let coords = Coordinates {
            latitude: Some(vec![0.0]),
            longitude: Some(vec![0.0, 90.0]),
            ..Coordinates::default()
        };
        let zsurf = Field::new(
            "zsurf",
            vec![Dimension::Latitude, Dimension::Longitude],
            ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![1.0, 2.0]).unwrap(),
            coords,
        )
        .unwrap();
        let joined = Field::concat_time(vec![zsurf.clone(), zsurf.clone()]).unwrap();
        assert_eq!(joined, zsurf);
    }

    #[test]
    fn load_reference_uses_selected_timestamps() {
        let source = MemoryDataset::default()
            .with_field(".", "00350.atmos_average.nc", surface_field(&[1.0], 1.0))
            .with_field(".", "00700.atmos_average.nc", surface_field(&[2.0], 2.0));
        let context = InterpreterContext::default().with_timestamps(vec![350, 700]);

        let reference = VariableReference::new("atmos_average", "ps");
        let field = load_reference(&source, &context, &reference).unwrap();
        assert_eq!(field.coords.time, Some(vec![1.0, 2.0]));

        let dated = reference.clone().with_timestamp(700);
        let field = load_reference(&source, &context, &dated).unwrap();
        assert_eq!(field.coords.time, Some(vec![2.0]));

        let missing = VariableReference::new("atmos_average", "temp");
        assert!(load_reference(&source, &context, &missing).is_err());

        let other_simulation = reference.with_simulation(1);
        assert!(load_reference(&source, &context, &other_simulation).is_err());
    }
}
