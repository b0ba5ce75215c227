//! Preparing evaluated figures for drawing
//!
//! Drawing itself is done by a [`FigureRenderer`]. This module turns an evaluated figure
//! into a [`PreparedPanel`]: titles, axis labels and limits, tick labels, contour levels
//! and the arrays to draw, already shifted to the conventions used on screen (longitudes
//! in -180/+180, time axes in solar longitude).

use crate::axes::{lon360_to_180, VerticalKind};
use crate::config::EngineSettings;
use crate::context::InterpreterContext;
use crate::dataset::{load_reference, DatasetSource};
use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::evaluate::{EvaluatedField, EvaluatedFigure, PlotAxis, PlotData};
use crate::figure::{
    Bounds, ColorScale, FigureFamily, Plot1D, Plot2D, PlotKind, PlotSpecification, Projection,
};
use crate::layout::Placement;
use crate::reference::VariableReference;
use crate::request::Dimension;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Filled contour levels of a 2D panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColorLevels {
    /// Let the renderer pick this many levels from the data
    Auto(usize),
    Levels(Vec<f64>),
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        n => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Colour levels from a `Cmin, Cmax` field.
///
/// Two values are spread over `count` levels, linearly or in log space; three or more are
/// used as given.
pub fn color_levels(
    range: Option<&[f64]>,
    scale: ColorScale,
    count: usize,
) -> MarsPlotResult<ColorLevels> {
    match (range, scale) {
        (None, _) => Ok(ColorLevels::Auto(count)),
        (Some(&[min, max]), ColorScale::Log) => {
            if min <= 0.0 || max <= 0.0 {
                return Err(MarsPlotError::InvalidLogRange { min, max });
            }
            Ok(ColorLevels::Levels(
                linspace(min.log10(), max.log10(), count)
                    .into_iter()
                    .map(|exponent| 10f64.powf(exponent))
                    .collect(),
            ))
        }
        (Some(&[min, max]), ColorScale::Linear) => {
            Ok(ColorLevels::Levels(linspace(min, max, count)))
        }
        (Some(levels), _) => Ok(ColorLevels::Levels(levels.to_vec())),
    }
}

/// Label formatting of `30S`, `30N`, `45W`, `45E`.
pub fn format_latitude(lat: f64) -> String {
    let letter = if lat < 0.0 {
        "S"
    } else if lat > 0.0 {
        "N"
    } else {
        ""
    };
    format!("{}{letter}", lat.abs().trunc())
}

pub fn format_longitude(lon: f64) -> String {
    let letter = if lon < 0.0 {
        "W"
    } else if lon > 0.0 {
        "E"
    } else {
        ""
    };
    format!("{}{letter}", lon.abs().trunc())
}

/// Ticks at multiples of `step` covering `values`.
fn multiples(values: &[f64], step: f64) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min > max {
        return Vec::new();
    }
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

/// `Ls <wrapped>\nsol <n>` labels, taking the sol of the sample nearest each tick.
pub fn time_tick_labels(ls: &[f64], sols: &[f64], ticks: &[f64]) -> Vec<String> {
    ticks
        .iter()
        .map(|&tick| {
            let sol = crate::axes::nearest_index(tick, ls)
                .and_then(|i| sols.get(i))
                .copied()
                .unwrap_or(f64::NAN);
            format!("Ls {}\nsol {}", tick.rem_euclid(360.0), sol.trunc())
        })
        .collect()
}

/// Maps bounds given in sols to the solar longitude of the nearest sol.
pub fn sol_limits_to_ls(bounds: [f64; 2], sols: &[f64], ls: &[f64]) -> Option<[f64; 2]> {
    let lookup = |sol: f64| crate::axes::nearest_index(sol, sols).and_then(|i| ls.get(i).copied());
    Some([lookup(bounds[0])?, lookup(bounds[1])?])
}

/// Reorders longitudes from 0-360 to -180/+180, moving `values` along `axis` with them.
///
/// Longitudes already in -180/+180 are returned unchanged.
pub fn shift_longitudes<D: ndarray::RemoveAxis>(
    lons: &[f64],
    values: &ndarray::Array<f64, D>,
    axis: usize,
) -> (Vec<f64>, ndarray::Array<f64, D>) {
    if !lons.iter().any(|&lon| lon > 180.0) {
        return (lons.to_vec(), values.clone());
    }
    let shifted: Vec<f64> = lons.iter().map(|&lon| lon360_to_180(lon)).collect();
    let order: Vec<usize> = (0..lons.len())
        .filter(|&i| shifted[i] < 0.0)
        .chain((0..lons.len()).filter(|&i| shifted[i] >= 0.0))
        .collect();
    let lons = order.iter().map(|&i| shifted[i]).collect();
    (lons, values.select(Axis(axis), &order))
}

/// One axis of a panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparedAxis {
    pub label: String,
    pub log_scale: bool,
    pub inverted: bool,
    pub limits: Option<[f64; 2]>,
    /// Tick positions with their labels. Empty lets the renderer choose.
    pub ticks: Vec<(f64, String)>,
}

/// Solid contours drawn over a shaded field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourOverlay {
    pub values: Array2<f64>,
    /// `None` lets the renderer pick the levels
    pub levels: Option<Vec<f64>>,
    pub line_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PanelContent {
    Shaded {
        x: Vec<f64>,
        y: Vec<f64>,
        /// `values[[j, i]]` at `(x[i], y[j])`
        values: Array2<f64>,
        levels: ColorLevels,
        scale: ColorScale,
        colormap: String,
        projection: Projection,
        contours: Vec<ContourOverlay>,
    },
    Line {
        x: Vec<f64>,
        y: Vec<f64>,
        style: String,
        legend: String,
    },
    /// The figure failed; the renderer shows the message in its place
    Failed { message: String },
}

/// Everything needed to draw one figure into its panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedPanel {
    pub placement: Placement,
    pub title: String,
    pub font_size: f64,
    pub x_axis: PreparedAxis,
    pub y_axis: PreparedAxis,
    pub content: PanelContent,
}

/// Panel grid and physical size of a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageLayout {
    pub rows: usize,
    pub cols: usize,
    /// Inches
    pub width: f64,
    pub height: f64,
    pub dpi: u32,
}

/// Draws prepared panels and writes pages.
pub trait FigureRenderer {
    /// Draws a panel. Overlays are drawn into the panel of the figure they chain onto.
    fn draw(&mut self, layout: &PageLayout, panel: &PreparedPanel) -> MarsPlotResult<()>;

    /// Writes the current page to `path` and starts a new one.
    fn save_page(&mut self, path: &Path) -> MarsPlotResult<()>;

    /// Assembles saved pages into one document.
    fn merge(&mut self, pages: &[PathBuf], document: &Path) -> MarsPlotResult<()>;
}

/// A renderer that keeps everything it is given. Used to inspect a run.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    pub panels: Vec<(PageLayout, PreparedPanel)>,
    pub pages: Vec<PathBuf>,
    pub documents: Vec<(Vec<PathBuf>, PathBuf)>,
}

impl FigureRenderer for RecordingRenderer {
    fn draw(&mut self, layout: &PageLayout, panel: &PreparedPanel) -> MarsPlotResult<()> {
        self.panels.push((*layout, panel.clone()));
        Ok(())
    }

    fn save_page(&mut self, path: &Path) -> MarsPlotResult<()> {
        self.pages.push(path.to_path_buf());
        Ok(())
    }

    fn merge(&mut self, pages: &[PathBuf], document: &Path) -> MarsPlotResult<()> {
        self.documents.push((pages.to_vec(), document.to_path_buf()));
        Ok(())
    }
}

/// `info\ndescriptors`, with the leading comma of the descriptors removed.
fn default_title(info: &str, descriptor: &str) -> String {
    let descriptor = descriptor.strip_prefix(',').unwrap_or(descriptor).trim_start();
    format!("{info}\n{descriptor}")
}

/// Title of a figure: the explicit title, else the variable and its selections.
pub fn figure_title(
    explicit: Option<&str>,
    primary: &EvaluatedField,
    secondary: Option<&EvaluatedField>,
) -> String {
    if let Some(title) = explicit {
        return title.to_string();
    }
    let mut info = primary.label.clone();
    if let Some(secondary) = secondary {
        info.push_str(&format!(" (& {})", secondary.label));
    }
    default_title(&info, &primary.descriptor)
}

fn dimension_axis(axis: &PlotAxis) -> PreparedAxis {
    match axis.dimension {
        Dimension::Longitude => PreparedAxis {
            label: "Longitude".to_string(),
            ticks: multiples(&axis.values, 30.0)
                .into_iter()
                .map(|lon| (lon, format_longitude(lon)))
                .collect(),
            ..PreparedAxis::default()
        },
        Dimension::Latitude => PreparedAxis {
            label: "Latitude".to_string(),
            ticks: multiples(&axis.values, 15.0)
                .into_iter()
                .map(|lat| (lat, format_latitude(lat)))
                .collect(),
            ..PreparedAxis::default()
        },
        Dimension::Level => match axis.vertical.unwrap_or(VerticalKind::Pressure) {
            VerticalKind::Pressure => PreparedAxis {
                label: "Pressure [Pa]".to_string(),
                log_scale: true,
                inverted: true,
                ..PreparedAxis::default()
            },
            VerticalKind::Height => PreparedAxis {
                label: "Altitude [m]".to_string(),
                ..PreparedAxis::default()
            },
        },
        Dimension::TimeOfDay => PreparedAxis {
            label: "Time [hr]".to_string(),
            limits: Some([0.0, 24.0]),
            ..PreparedAxis::default()
        },
        // Time ticks carry the information, no label
        Dimension::Time => {
            let ticks = match &axis.sols {
                Some(sols) => {
                    let positions = linspace_ticks(&axis.values, 6);
                    let labels = time_tick_labels(&axis.values, sols, &positions);
                    positions.into_iter().zip(labels).collect()
                }
                None => Vec::new(),
            };
            PreparedAxis {
                ticks,
                ..PreparedAxis::default()
            }
        }
    }
}

fn linspace_ticks(values: &[f64], count: usize) -> Vec<f64> {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if last > first => linspace(first, last, count),
        (Some(&first), _) => vec![first],
        _ => Vec::new(),
    }
}

/// Applies user bounds to a dimension axis, mapping sols to solar longitude on time axes.
fn dimension_limits(axis: &PlotAxis, bounds: Bounds) -> Option<[f64; 2]> {
    let bounds = bounds?;
    match (axis.dimension, &axis.sols) {
        (Dimension::Time, Some(sols)) => sol_limits_to_ls(bounds, sols, &axis.values),
        _ => Some(bounds),
    }
}

fn shaded_values(field: &EvaluatedField) -> MarsPlotResult<(PlotAxis, PlotAxis, Array2<f64>)> {
    match &field.data {
        PlotData::Slice { x, y, values } => {
            if x.dimension == Dimension::Longitude {
                let (lons, values) = shift_longitudes(&x.values, values, 1);
                let x = PlotAxis {
                    values: lons,
                    ..x.clone()
                };
                Ok((x, y.clone(), values))
            } else {
                Ok((x.clone(), y.clone(), values.clone()))
            }
        }
        PlotData::Line { .. } => Err(MarsPlotError::Render(
            "expected a 2D field for a 2D figure".to_string(),
        )),
    }
}

/// The `fixed.zsurf` reference drawn under maps of `reference`.
pub fn topography_reference(reference: &VariableReference) -> VariableReference {
    let mut zsurf =
        VariableReference::new("fixed", "zsurf").with_simulation(reference.simulation_index);
    zsurf.timestamp = reference.timestamp;
    zsurf
}

/// Loads the surface height matching the first reference of a map.
pub fn load_topography(
    reference: &VariableReference,
    source: &dyn DatasetSource,
    context: &InterpreterContext,
) -> Option<Array2<f64>> {
    let field = match load_reference(source, context, &topography_reference(reference)) {
        Ok(field) => field,
        Err(e) => {
            log::debug!("no topography for {reference}: {e}");
            return None;
        }
    };
    let lons = field.coordinate(Dimension::Longitude).ok()?.to_vec();
    let values = field.data.into_dimensionality::<ndarray::Ix2>().ok()?;
    Some(shift_longitudes(&lons, &values, 1).1)
}

fn prepare_2d(
    family: FigureFamily,
    plot: &Plot2D,
    figure: &EvaluatedFigure,
    settings: &EngineSettings,
    topography: Option<Array2<f64>>,
) -> MarsPlotResult<(String, PreparedAxis, PreparedAxis, PanelContent)> {
    let (x, y, values) = shaded_values(&figure.primary)?;
    let levels = color_levels(
        plot.color_range.as_deref(),
        plot.options.scale,
        settings.contour_levels,
    )?;

    let mut contours = Vec::new();
    if let Some(topography) = topography.filter(|t| t.dim() == values.dim()) {
        contours.push(ContourOverlay {
            values: topography,
            levels: None,
            line_width: 0.5,
        });
    }
    if let Some(secondary) = &figure.secondary {
        let (_, _, values) = shaded_values(secondary)?;
        contours.push(ContourOverlay {
            values,
            levels: plot.contour_levels.clone(),
            line_width: 2.0,
        });
    }

    let mut x_axis = dimension_axis(&x);
    x_axis.limits = dimension_limits(&x, plot.options.x_bounds).or(x_axis.limits);
    let mut y_axis = dimension_axis(&y);
    y_axis.limits = dimension_limits(&y, plot.options.y_bounds).or(y_axis.limits);
    log::debug!("{family}: {} x {} panel", x.values.len(), y.values.len());

    let title = figure_title(plot.title.as_deref(), &figure.primary, figure.secondary.as_ref());
    let content = PanelContent::Shaded {
        x: x.values,
        y: y.values,
        values,
        levels,
        scale: plot.options.scale,
        colormap: plot.options.colormap.clone(),
        projection: plot.options.projection,
        contours,
    };
    Ok((title, x_axis, y_axis, content))
}

fn prepare_1d(
    plot: &Plot1D,
    figure: &EvaluatedFigure,
    settings: &EngineSettings,
) -> MarsPlotResult<(PreparedAxis, PreparedAxis, PanelContent)> {
    let primary = &figure.primary;
    let PlotData::Line { x, values } = &primary.data else {
        return Err(MarsPlotError::Render(
            "expected a line for a 1D figure".to_string(),
        ));
    };

    let (mut axis, values): (PlotAxis, Array1<f64>) = if x.dimension == Dimension::Longitude {
        let (lons, values) = shift_longitudes(&x.values, values, 0);
        (
            PlotAxis {
                values: lons,
                ..x.clone()
            },
            values,
        )
    } else {
        (x.clone(), values.clone())
    };
    if axis.dimension == Dimension::Time && settings.stack_years {
        axis.values = axis.values.iter().map(|ls| ls.rem_euclid(360.0)).collect();
    }

    let legend = plot
        .legend
        .clone()
        .unwrap_or_else(|| default_title(&primary.label, &primary.descriptor));
    let mut dimension = dimension_axis(&axis);
    dimension.limits = dimension_limits(&axis, plot.options.dim_bounds).or(dimension.limits);
    let variable = PreparedAxis {
        label: plot
            .options
            .axis_label
            .clone()
            .unwrap_or_else(|| primary.label.clone()),
        limits: plot.options.var_bounds,
        ..PreparedAxis::default()
    };
    let style = plot.options.linestyle.clone();
    let values = values.to_vec();

    // Profiles are drawn with the dimension upright
    let vertical = matches!(axis.dimension, Dimension::Latitude | Dimension::Level);
    Ok(if vertical {
        (
            variable,
            dimension,
            PanelContent::Line {
                x: values,
                y: axis.values,
                style,
                legend,
            },
        )
    } else {
        (
            dimension,
            variable,
            PanelContent::Line {
                x: axis.values,
                y: values,
                style,
                legend,
            },
        )
    })
}

/// Prepares an evaluated figure for drawing.
pub fn prepare_panel(
    figure: &PlotSpecification,
    evaluated: &EvaluatedFigure,
    settings: &EngineSettings,
    topography: Option<Array2<f64>>,
) -> MarsPlotResult<PreparedPanel> {
    let (title, x_axis, y_axis, content) = match &figure.kind {
        PlotKind::Line(plot) => {
            let (x_axis, y_axis, content) = prepare_1d(plot, evaluated, settings)?;
            (String::new(), x_axis, y_axis, content)
        }
        other => {
            let plot = other.as_2d().ok_or_else(|| {
                MarsPlotError::Render(format!("{} is not a 2D figure", other.family()))
            })?;
            prepare_2d(other.family(), plot, evaluated, settings, topography)?
        }
    };
    Ok(PreparedPanel {
        placement: figure.placement,
        title,
        font_size: settings.font_size(figure.placement.panel_count),
        x_axis,
        y_axis,
        content,
    })
}

/// The panel drawn in place of a figure that failed.
pub fn failed_panel(
    figure: &PlotSpecification,
    error: &MarsPlotError,
    settings: &EngineSettings,
) -> PreparedPanel {
    PreparedPanel {
        placement: figure.placement,
        title: figure.kind.title().unwrap_or_default().to_string(),
        font_size: settings.font_size(figure.placement.panel_count),
        x_axis: PreparedAxis::default(),
        y_axis: PreparedAxis::default(),
        content: PanelContent::Failed {
            message: format!("ERROR:{error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn linear_and_explicit_levels() {
        let levels = color_levels(Some(&[0.0, 10.0]), ColorScale::Linear, 11).unwrap();
        assert_eq!(levels, ColorLevels::Levels((0..=10).map(f64::from).collect()));
        let explicit = color_levels(Some(&[1.0, 5.0, 7.0]), ColorScale::Log, 21).unwrap();
        assert_eq!(explicit, ColorLevels::Levels(vec![1.0, 5.0, 7.0]));
        assert_eq!(
            color_levels(None, ColorScale::Linear, 21).unwrap(),
            ColorLevels::Auto(21)
        );
    }

    #[test]
    fn log_levels() {
        let ColorLevels::Levels(levels) =
            color_levels(Some(&[1.0, 1000.0]), ColorScale::Log, 4).unwrap()
        else {
            panic!("expected explicit levels");
        };
        for (level, expected) in levels.iter().zip([1.0, 10.0, 100.0, 1000.0]) {
            assert_relative_eq!(*level, expected, max_relative = 1e-12);
        }
        assert!(matches!(
            color_levels(Some(&[0.0, 10.0]), ColorScale::Log, 4),
            Err(MarsPlotError::InvalidLogRange { .. })
        ));
    }

    #[test]
    fn lat_lon_labels() {
        assert_eq!(format_latitude(-30.0), "30S");
        assert_eq!(format_latitude(30.0), "30N");
        assert_eq!(format_latitude(0.0), "0");
        assert_eq!(format_longitude(-45.0), "45W");
        assert_eq!(format_longitude(45.5), "45E");
    }

    #[test]
    fn longitudes_shift_to_180() {
        let values = array![[0.0, 1.0, 2.0, 3.0]];
        let (lons, shifted) = shift_longitudes(&[0.0, 90.0, 180.0, 270.0], &values, 1);
        assert_eq!(lons, vec![-90.0, 0.0, 90.0, 180.0]);
        assert_eq!(shifted, array![[3.0, 0.0, 1.0, 2.0]]);

        let (same, _) = shift_longitudes(&[-90.0, 0.0, 90.0], &array![1.0, 2.0, 3.0], 0);
        assert_eq!(same, vec![-90.0, 0.0, 90.0]);
    }

    #[test]
    fn time_ticks_and_limits() {
        let ls = [350.0, 355.0, 360.0, 365.0];
        let sols = [660.0, 665.0, 670.0, 675.0];
        let labels = time_tick_labels(&ls, &sols, &[355.0, 365.0]);
        assert_eq!(labels, vec!["Ls 355\nsol 665", "Ls 5\nsol 675"]);
        assert_eq!(sol_limits_to_ls([661.0, 674.0], &sols, &ls), Some([350.0, 365.0]));
    }

    #[test]
    fn title_from_descriptors() {
        let field = |label: &str, descriptor: &str| EvaluatedField {
            label: label.to_string(),
            descriptor: descriptor.to_string(),
            reference: VariableReference::new("atmos_average", "temp"),
            data: PlotData::Line {
                x: PlotAxis {
                    dimension: Dimension::Latitude,
                    values: vec![0.0],
                    sols: None,
                    vertical: None,
                },
                values: array![1.0],
            },
        };
        let primary = field("temperature [K]", ", Ls= (MY 2) 90.00, zonal avg");
        let secondary = field("ucomp", "");
        assert_eq!(
            figure_title(None, &primary, Some(&secondary)),
            "temperature [K] (& ucomp)\nLs= (MY 2) 90.00, zonal avg"
        );
        assert_eq!(figure_title(Some("Mine"), &primary, None), "Mine");
    }

    #[test]
    fn map_ticks() {
        let axis = PlotAxis {
            dimension: Dimension::Latitude,
            values: vec![-40.0, 0.0, 40.0],
            sols: None,
            vertical: None,
        };
        let prepared = dimension_axis(&axis);
        let labels: Vec<&str> = prepared.ticks.iter().map(|(_, l)| l.as_str()).collect();
        assert_eq!(labels, vec!["30S", "15S", "0", "15N", "30N"]);
    }
}
