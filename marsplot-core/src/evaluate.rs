//! Figure evaluation
//!
//! Turns a [`PlotSpecification`] into the arrays a renderer draws. For every reference of
//! the variable expression:
//!
//! 1. the field is loaded across the selected timestamps,
//! 2. each free dimension gets its effective request, the reference's override block if
//!    it sets one, else the figure's own value,
//! 3. the request is resolved to indices along the native coordinate and the field is
//!    sliced,
//! 4. every dimension that is not plotted is averaged away: time of day first, then
//!    latitude (cosine weighted), longitude, level and time.
//!
//! The reduced fields are then combined through the expression formula. Averages skip
//! missing values.

use crate::axes::{
    resolve_latitude, resolve_level, resolve_longitude, resolve_solar_longitude,
    resolve_time_of_day, ResolvedAxis, VerticalKind,
};
use crate::context::InterpreterContext;
use crate::dataset::{load_reference, DatasetSource, Field};
use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::expression::{CompoundExpression, Value};
use crate::figure::{FigureFamily, LineMode, PlotKind, PlotSpecification};
use crate::reference::VariableReference;
use crate::request::{AxisRequest, Dimension};
use ndarray::{Array1, Array2, ArrayD, Axis, Ix1, Ix2, IxDyn, Zip};
use serde::Serialize;

/// Order in which dimensions that are not plotted are averaged away.
const REDUCTION_ORDER: [Dimension; 5] = [
    Dimension::TimeOfDay,
    Dimension::Latitude,
    Dimension::Longitude,
    Dimension::Level,
    Dimension::Time,
];

/// Coordinates along one plotted axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotAxis {
    pub dimension: Dimension,
    pub values: Vec<f64>,
    /// Sol number of each sample, for time axes
    pub sols: Option<Vec<f64>>,
    /// Kind of vertical coordinate, for level axes
    pub vertical: Option<VerticalKind>,
}

impl PlotAxis {
    fn from_field(field: &Field, dimension: Dimension) -> MarsPlotResult<Self> {
        Ok(Self {
            dimension,
            values: field.coordinate(dimension)?.to_vec(),
            sols: match dimension {
                Dimension::Time => field.coords.sols.clone(),
                _ => None,
            },
            vertical: match dimension {
                Dimension::Level => Some(field.coords.vertical),
                _ => None,
            },
        })
    }
}

/// Values ready to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PlotData {
    /// Shaded field, `values[[j, i]]` at `(x[i], y[j])`
    Slice { x: PlotAxis, y: PlotAxis, values: Array2<f64> },
    /// Line along one dimension
    Line { x: PlotAxis, values: Array1<f64> },
}

/// A variable expression evaluated for one figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedField {
    /// `long name [units]` for a single reference, the expression text otherwise
    pub label: String,
    /// Selection descriptors of the first reference, e.g. `, Ls= (MY 2) 270.00, lev=5.00e+01 Pa`
    pub descriptor: String,
    /// First reference of the expression
    pub reference: VariableReference,
    pub data: PlotData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedFigure {
    pub primary: EvaluatedField,
    /// Solid contours of a 2D figure
    pub secondary: Option<EvaluatedField>,
}

/// A field sliced and averaged down to its plotted dimensions.
#[derive(Debug, Clone)]
struct Reduced {
    data: ArrayD<f64>,
    dims: Vec<Dimension>,
    descriptor: String,
}

fn resolve_dimension(
    field: &Field,
    dimension: Dimension,
    request: AxisRequest,
) -> MarsPlotResult<ResolvedAxis> {
    let coords = field.coordinate(dimension)?;
    match dimension {
        Dimension::Time => resolve_solar_longitude(request, coords),
        Dimension::TimeOfDay => resolve_time_of_day(request, coords),
        Dimension::Level => resolve_level(request, coords, field.coords.vertical),
        Dimension::Latitude => resolve_latitude(request, coords),
        Dimension::Longitude => resolve_longitude(request, coords),
    }
}

/// Weighted mean along `axis`, skipping NaN. Lanes without data are NaN.
fn mean_along(data: &ArrayD<f64>, axis: usize, weights: Option<&[f64]>) -> ArrayD<f64> {
    let mut shape = data.shape().to_vec();
    shape.remove(axis);
    let mut sums = ArrayD::<f64>::zeros(IxDyn(&shape));
    let mut norms = ArrayD::<f64>::zeros(IxDyn(&shape));

    for (i, lane) in data.axis_iter(Axis(axis)).enumerate() {
        let weight = weights.and_then(|w| w.get(i).copied()).unwrap_or(1.0);
        Zip::from(&mut sums)
            .and(&mut norms)
            .and(&lane)
            .for_each(|sum, norm, &x| {
                if !x.is_nan() {
                    *sum += weight * x;
                    *norm += weight;
                }
            });
    }
    Zip::from(&mut sums).and(&norms).for_each(|sum, &norm| {
        *sum = if norm > 0.0 { *sum / norm } else { f64::NAN };
    });
    sums
}

/// Slices `field` along the free dimensions and averages them away.
///
/// `free` lists the dimensions that may be selected, in descriptor order.
fn reduce_field(
    field: &Field,
    plotted: &[Dimension],
    free: &[Dimension],
    request: impl Fn(Dimension) -> AxisRequest,
) -> MarsPlotResult<Reduced> {
    for dimension in plotted {
        field.coordinate(*dimension)?;
    }

    let mut data = field.data.clone();
    let mut descriptor = String::new();
    let mut latitudes = None;

    for &dimension in free {
        let Some(axis) = field.axis_of(dimension) else {
            continue;
        };
        let resolved = resolve_dimension(field, dimension, request(dimension))?;
        log::debug!(
            "{}: {} indices {:?}",
            field.name,
            dimension,
            resolved.indices
        );
        descriptor.push_str(&resolved.descriptor);
        data = data.select(Axis(axis), &resolved.indices);
        if dimension == Dimension::Latitude {
            let lats = field.coordinate(dimension)?;
            latitudes = Some(
                resolved
                    .indices
                    .iter()
                    .map(|&i| lats[i].to_radians().cos())
                    .collect::<Vec<_>>(),
            );
        }
    }

    let mut dims = field.dims.clone();
    for dimension in REDUCTION_ORDER {
        if plotted.contains(&dimension) {
            continue;
        }
        let Some(axis) = dims.iter().position(|d| *d == dimension) else {
            continue;
        };
        let weights = match dimension {
            Dimension::Latitude => latitudes.as_deref(),
            _ => None,
        };
        data = mean_along(&data, axis, weights);
        dims.remove(axis);
    }

    Ok(Reduced {
        data,
        dims,
        descriptor,
    })
}

/// What a figure plots and the free dimensions it selects along.
struct Selection {
    plotted: Vec<Dimension>,
    free: Vec<Dimension>,
}

impl Selection {
    /// Dimensions a reference's override block may set. Plotted dimensions never are.
    fn overridable(&self, family: FigureFamily) -> Vec<Dimension> {
        family
            .overridable()
            .into_iter()
            .filter(|d| !self.plotted.contains(d))
            .collect()
    }
}

fn selection(kind: &PlotKind) -> MarsPlotResult<Selection> {
    match kind {
        PlotKind::Line(plot) => {
            let mode = plot.mode().ok_or(MarsPlotError::MissingVaryingAxis)?;
            let varying = mode.dimension();
            let free = [
                Dimension::Time,
                Dimension::Latitude,
                Dimension::Longitude,
                Dimension::Level,
                Dimension::TimeOfDay,
            ]
            .into_iter()
            .filter(|d| *d != varying)
            .collect();
            Ok(Selection {
                plotted: vec![varying],
                free,
            })
        }
        other => {
            let family = other.family();
            let (x, y) = family
                .plotted()
                .ok_or_else(|| MarsPlotError::Error(format!("{family} has no plotted axes")))?;
            let (first, second) = family
                .free_dimensions()
                .ok_or_else(|| MarsPlotError::Error(format!("{family} has no free dimensions")))?;
            Ok(Selection {
                plotted: vec![x, y],
                free: vec![first, second, Dimension::TimeOfDay],
            })
        }
    }
}

/// Evaluates one variable expression of a figure.
fn evaluate_expression(
    text: &str,
    kind: &PlotKind,
    source: &dyn DatasetSource,
    context: &InterpreterContext,
) -> MarsPlotResult<EvaluatedField> {
    let family = kind.family();
    let selection = selection(kind)?;
    let expression = CompoundExpression::parse(text, &selection.overridable(family))?;

    let mut reduced = Vec::with_capacity(expression.references.len());
    let mut first_field = None;
    for term in &expression.references {
        let field = load_reference(source, context, &term.reference)?;
        let result = reduce_field(&field, &selection.plotted, &selection.free, |dimension| {
            term.overrides.apply(dimension, kind.request(dimension))
        })?;
        if first_field.is_none() {
            first_field = Some(field);
        }
        reduced.push(result);
    }
    let (Some(first), Some(field)) = (reduced.first(), first_field) else {
        return Err(MarsPlotError::MalformedExpression {
            expression: text.to_string(),
            reason: "no variable reference".to_string(),
        });
    };
    let dims = first.dims.clone();
    let shape = first.data.shape().to_vec();
    let descriptor = first.descriptor.clone();

    let values: Vec<Value> = reduced.into_iter().map(|r| Value::Array(r.data)).collect();
    let combined = expression.evaluate(&values)?.into_array(&shape);

    let data = match (dims.as_slice(), family.plotted()) {
        ([a, b], Some((x, y))) => {
            let values = if (*a, *b) == (x, y) {
                combined.reversed_axes()
            } else {
                combined
            };
            PlotData::Slice {
                x: PlotAxis::from_field(&field, x)?,
                y: PlotAxis::from_field(&field, y)?,
                values: values.into_dimensionality::<Ix2>().map_err(|e| {
                    MarsPlotError::Dataset(format!("{text}: unexpected shape: {e}"))
                })?,
            }
        }
        ([x], None) => PlotData::Line {
            x: PlotAxis::from_field(&field, *x)?,
            values: combined.into_dimensionality::<Ix1>().map_err(|e| {
                MarsPlotError::Dataset(format!("{text}: unexpected shape: {e}"))
            })?,
        },
        _ => {
            return Err(MarsPlotError::Dataset(format!(
                "{text}: reduced to {} dimensions for a {family}",
                dims.len()
            )))
        }
    };

    let label = if expression.is_compound() {
        expression.raw_text.clone()
    } else {
        field.label()
    };
    let reference = expression
        .references
        .first()
        .map(|term| term.reference.clone())
        .unwrap_or_else(|| VariableReference::new("", ""));

    Ok(EvaluatedField {
        label,
        descriptor,
        reference,
        data,
    })
}

/// Evaluates the variables of a figure.
///
/// Blocks that were read with defects fail here, with the defects as the message.
pub fn evaluate_figure(
    figure: &PlotSpecification,
    source: &dyn DatasetSource,
    context: &InterpreterContext,
) -> MarsPlotResult<EvaluatedFigure> {
    if !figure.defects.is_empty() {
        return Err(MarsPlotError::MalformedBlock(figure.defects.join("; ")));
    }
    let variable = figure
        .kind
        .variable()
        .ok_or_else(|| MarsPlotError::MalformedBlock("'Main Variable' is not set".to_string()))?;
    let primary = evaluate_expression(variable, &figure.kind, source, context)?;

    let secondary = match figure.kind.as_2d().and_then(|plot| plot.contour_variable.as_deref()) {
        Some(text) => Some(evaluate_expression(text, &figure.kind, source, context)?),
        None => None,
    };

    Ok(EvaluatedFigure { primary, secondary })
}

/// The plotted dimension of a 1D figure, if it has one.
pub fn line_mode(kind: &PlotKind) -> Option<LineMode> {
    match kind {
        PlotKind::Line(plot) => plot.mode(),
        _ => None,
    }
}

/// True for families whose x axis is time.
pub fn plots_time(family: FigureFamily) -> bool {
    matches!(family.plotted(), Some((Dimension::Time, _)) | Some((_, Dimension::Time)))
}
