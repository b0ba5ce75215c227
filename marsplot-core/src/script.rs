//! Script parsing
//!
//! A script is read top to bottom exactly once:
//!
//! ```text
//! =======================================================
//! ===================== |MarsPlot V3.2|===================
//! <<<<<<<<<<<<<<<<<<<<<< Simulations >>>>>>>>>>>>>>>>>>>>>
//! ref> None
//! 2> /path/to/second/simulation
//! =======================================================
//! START
//!
//! HOLD ON
//! <<<<<<<<<<<<<<| Plot 2D lon X lat = True |>>>>>>>>>>>>>
//! Title          = None
//! Main Variable  = fixed.zsurf
//! ...
//! Axis Options  : lon = [None,None] | lat = [None,None] | cmap = jet | scale = lin | proj = cart
//! HOLD OFF
//! ```
//!
//! Figure blocks are read by label rather than by position: each line is matched against
//! the labels of its family, and a block with missing or unknown lines keeps its panel but
//! carries defects that make it fail when evaluated.
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::context::InterpreterContext;
//! use marsplot_core::script::parse_script;
//!
//! let text = "\
//! <<<<<<<<<<<<<<<<<<<<<< Simulations >>>>>>>>>>>>>>>>>>>>>
//! ref> None
//! ======================================================
//! START
//! <<<<<<<<<<<<<<| Plot 1D = True |>>>>>>>>>>>>>
//! Main Variable  = atmos_average.ps
//! Ls 0-360       = AXIS
//! ";
//! let mut context = InterpreterContext::default();
//! let script = parse_script(text, &mut context).unwrap();
//! assert_eq!(script.figures.len(), 1);
//! // Missing lines are reported, not fatal
//! assert!(!script.figures[0].defects.is_empty());
//! ```

use crate::context::InterpreterContext;
use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::figure::{
    normalize_label, AxisOptions1D, AxisOptions2D, FigureFamily, Plot1D, Plot2D, PlotKind,
    PlotSpecification,
};
use crate::layout::{PanelTracker, Placement};
use crate::request::{parse_bool, parse_scalar, parse_text, ScalarValue};
use serde::Serialize;
use std::path::PathBuf;

/// Version written in generated scripts. Scripts of another major version still parse,
/// with a warning.
pub const ENGINE_VERSION: &str = "3.2";

/// A parsed script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    /// Version tag of the header, if any
    pub version: Option<String>,
    /// Simulation directories, reference first
    pub simulations: Vec<PathBuf>,
    pub figures: Vec<PlotSpecification>,
}

struct ScriptCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> ScriptCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    /// The next line and its 1-based number.
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        let line = self.peek()?;
        self.pos += 1;
        Some((self.pos, line))
    }
}

/// A `label = value` line of a figure block.
#[derive(Debug)]
struct BlockLine {
    number: usize,
    label: String,
    value: String,
}

/// Parses a script, recording simulation directories in `context`.
pub fn parse_script(text: &str, context: &mut InterpreterContext) -> MarsPlotResult<Script> {
    let mut cursor = ScriptCursor::new(text);
    let version = read_preamble(&mut cursor, context)?;

    let mut tracker = PanelTracker::default();
    let mut figures = Vec::new();

    while let Some((number, line)) = cursor.next_line() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed == "STOP" {
            log::info!("STOP on line {number}, ignoring the rest of the script");
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("HOLD ON") {
            tracker.hold_on(number, parse_grid(rest, number));
        } else if trimmed.starts_with("HOLD OFF") {
            tracker.hold_off(number);
        } else if trimmed.starts_with("ADD LINE") {
            tracker.add_line(number);
        } else if trimmed.starts_with('<') {
            let (family, wanted) = parse_header(trimmed, number)?;
            let block = read_block(&mut cursor);
            if wanted {
                let (kind, defects) = read_figure(family, &block);
                for defect in &defects {
                    log::warn!("*** Warning *** {family} on line {number}: {defect}");
                }
                tracker.place(number)?;
                figures.push(PlotSpecification {
                    kind,
                    placement: Placement::default(),
                    line: number,
                    defects,
                });
            } else {
                tracker.skip();
            }
        } else {
            log::warn!("*** Warning *** ignoring unrecognized line {number}: '{trimmed}'");
        }
    }

    let placements = tracker.finish()?;
    for (figure, placement) in figures.iter_mut().zip(placements) {
        figure.placement = placement;
    }
    log::debug!("parsed {} figures", figures.len());

    Ok(Script {
        version,
        simulations: context.simulations.clone(),
        figures,
    })
}

/// Reads everything up to and including `START`.
fn read_preamble(
    cursor: &mut ScriptCursor,
    context: &mut InterpreterContext,
) -> MarsPlotResult<Option<String>> {
    let mut version = None;
    while let Some((_, line)) = cursor.next_line() {
        let trimmed = line.trim();
        if trimmed == "START" {
            check_version(version.as_deref());
            return Ok(version);
        }
        if version.is_none() {
            version = parse_version(trimmed);
        }
        if trimmed.starts_with('<') && !trimmed.contains('|') {
            read_simulations(cursor, context);
        }
    }
    Err(MarsPlotError::MissingStart)
}

/// Extracts `3.2` from `====|MarsPlot V3.2|====`.
fn parse_version(line: &str) -> Option<String> {
    let start = line.find("MarsPlot V")? + "MarsPlot V".len();
    let rest = &line[start..];
    let end = rest.find('|').unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

fn check_version(version: Option<&str>) {
    let major = |v: &str| v.split('.').next().unwrap_or("").trim().to_string();
    match version {
        None => log::warn!("*** Warning *** no MarsPlot version tag in the script header"),
        Some(v) if major(v) != major(ENGINE_VERSION) => log::warn!(
            "*** Warning *** script version {v} differs from engine version {ENGINE_VERSION}, \
             regenerate a template to get the current syntax"
        ),
        Some(_) => {}
    }
}

fn read_simulations(cursor: &mut ScriptCursor, context: &mut InterpreterContext) {
    let mut simulations = vec![context.settings.input_dir.clone()];
    while let Some(line) = cursor.peek() {
        let trimmed = line.trim();
        if trimmed.starts_with('=') || trimmed == "START" {
            break;
        }
        cursor.next_line();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((id, path)) = trimmed.split_once('>') else {
            log::warn!("*** Warning *** ignoring simulation line '{trimmed}'");
            continue;
        };
        let Some(path) = parse_text(path) else {
            continue;
        };
        match id.trim() {
            "ref" => simulations[0] = PathBuf::from(path),
            id if id.parse::<usize>().is_ok_and(|n| n >= 2) => {
                simulations.push(PathBuf::from(path))
            }
            id => log::warn!("*** Warning *** ignoring simulation '{id}>', use ref> or N> with N >= 2"),
        }
    }
    context.simulations = simulations;
}

fn parse_grid(text: &str, number: usize) -> Option<(usize, usize)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let grid = text
        .split_once(',')
        .and_then(|(rows, cols)| {
            Some((
                rows.trim().parse::<usize>().ok()?,
                cols.trim().parse::<usize>().ok()?,
            ))
        })
        .filter(|&(rows, cols)| rows > 0 && cols > 0);
    if grid.is_none() {
        log::warn!("*** Warning *** line {number}: could not read layout '{text}', expected rows,cols");
    }
    grid
}

/// Decodes `<<<<| Plot 2D lon X lat = True |>>>>`.
fn parse_header(line: &str, number: usize) -> MarsPlotResult<(FigureFamily, bool)> {
    let malformed = || MarsPlotError::MalformedHeader {
        text: line.to_string(),
        line: number,
    };
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 3 {
        return Err(malformed());
    }
    let (name, wanted) = parts[1].split_once('=').ok_or_else(malformed)?;
    let family =
        FigureFamily::from_header_name(name).ok_or_else(|| MarsPlotError::UnknownFigureFamily {
            name: name.trim().to_string(),
            line: number,
        })?;
    Ok((family, parse_bool(wanted)))
}

fn is_structural(line: &str) -> bool {
    line.starts_with('<')
        || line.starts_with("HOLD")
        || line.starts_with("ADD LINE")
        || line == "STOP"
        || line == "START"
}

/// Reads block lines up to the axis options line or the next structural line.
fn read_block(cursor: &mut ScriptCursor) -> Vec<BlockLine> {
    let mut block = Vec::new();
    while let Some(line) = cursor.peek() {
        let trimmed = line.trim();
        if is_structural(trimmed) {
            break;
        }
        let Some((number, _)) = cursor.next_line() else {
            break;
        };
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if normalize_label(trimmed).starts_with("axisoptions") {
            block.push(BlockLine {
                number,
                label: "Axis Options".to_string(),
                value: trimmed.to_string(),
            });
            break;
        }
        let (label, value) = trimmed.split_once('=').unwrap_or((trimmed, ""));
        block.push(BlockLine {
            number,
            label: label.trim().to_string(),
            value: value.trim().to_string(),
        });
    }
    block
}

/// Matches block lines to the labels of `family`.
fn match_labels(family: FigureFamily, block: &[BlockLine]) -> (Vec<Option<String>>, Vec<String>) {
    let labels = family.block_labels();
    let mut values: Vec<Option<String>> = vec![None; labels.len()];
    let mut defects = Vec::new();

    for line in block {
        let wanted = normalize_label(&line.label);
        match labels.iter().position(|label| normalize_label(label) == wanted) {
            None => defects.push(format!("unexpected line {} '{}'", line.number, line.label)),
            Some(i) if values[i].is_some() => {
                defects.push(format!("line {} repeats '{}'", line.number, labels[i].trim()))
            }
            Some(i) => values[i] = Some(line.value.clone()),
        }
    }
    for (label, value) in labels.iter().zip(&values) {
        if value.is_none() {
            defects.push(format!("missing '{}' line", label.trim()));
        }
    }
    (values, defects)
}

/// Builds the record of one wanted figure block.
fn read_figure(family: FigureFamily, block: &[BlockLine]) -> (PlotKind, Vec<String>) {
    let (values, mut defects) = match_labels(family, block);
    let labels = family.block_labels();
    let value = |i: usize| values[i].as_deref().unwrap_or("");
    let mut kind = PlotKind::empty(family);

    match &mut kind {
        PlotKind::Line(plot) => {
            *plot = Plot1D {
                legend: parse_text(value(0)),
                variable: parse_text(value(1)),
                time: parse_scalar(value(2)).into_line_dimension(labels[2]),
                latitude: parse_scalar(value(3)).into_line_dimension(labels[3]),
                longitude: parse_scalar(value(4)).into_line_dimension(labels[4]),
                level: parse_scalar(value(5)).into_line_dimension(labels[5]),
                diurnal: match parse_scalar(value(6)) {
                    ScalarValue::Axis => true,
                    ScalarValue::None => false,
                    other => {
                        log::warn!("*** Warning *** Diurnal only accepts AXIS or None, ignoring {other:?}");
                        false
                    }
                },
                options: AxisOptions1D::parse(value(7)),
            };
            let varying = plot.varying();
            match varying.len() {
                0 => log::warn!(
                    "*** Warning *** no AXIS keyword in 1D plot of {}, use AXIS to set the plotted dimension",
                    plot.variable.as_deref().unwrap_or("None")
                ),
                1 => {}
                _ => log::warn!(
                    "*** Warning *** more than one AXIS keyword in 1D plot of {}, plotting against {:?}",
                    plot.variable.as_deref().unwrap_or("None"),
                    varying[varying.len() - 1]
                ),
            }
        }
        other => {
            if let Some(plot) = other.as_2d_mut() {
                *plot = Plot2D {
                    title: parse_text(value(0)),
                    variable: parse_text(value(1)),
                    color_range: parse_color_range(value(2)),
                    first_free: parse_scalar(value(3)).into_request(labels[3].trim()),
                    second_free: parse_scalar(value(4)).into_request(labels[4].trim()),
                    contour_variable: parse_text(value(5)),
                    contour_levels: parse_scalar(value(6)).into_numbers(labels[6]),
                    options: AxisOptions2D::parse(value(7)),
                };
            }
        }
    }

    if kind.variable().is_none() {
        defects.push("'Main Variable' is not set".to_string());
    }
    (kind, defects)
}

/// Two values give a range, three or more explicit levels. One value is not a range.
fn parse_color_range(text: &str) -> Option<Vec<f64>> {
    match parse_scalar(text) {
        ScalarValue::Numbers(values) if values.len() == 1 => {
            log::warn!(
                "*** Warning *** Cmin, Cmax needs two values or a list of levels, got {}; using default",
                values[0]
            );
            None
        }
        other => other.into_numbers("Cmin, Cmax"),
    }
}
