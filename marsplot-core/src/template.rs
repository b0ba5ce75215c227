//! Script generation
//!
//! Writes figure blocks in the same layout the parser reads, so a generated script parses
//! back into the records it was written from.
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::context::InterpreterContext;
//! use marsplot_core::script::parse_script;
//! use marsplot_core::template::{default_entries, render_template};
//!
//! let text = render_template(false);
//! let script = parse_script(&text, &mut InterpreterContext::default()).unwrap();
//! let wanted: Vec<_> = default_entries().into_iter().filter(|e| e.wanted).collect();
//! assert_eq!(script.figures.len(), wanted.len());
//! assert_eq!(script.figures[0].kind, wanted[0].kind);
//! ```

use crate::figure::{format_bounds, FigureFamily, Plot1D, Plot2D, PlotKind, PlotSpecification};
use crate::layout::closes_page;
use crate::request::{format_numbers, LineDimension};
use crate::script::ENGINE_VERSION;
use std::fmt::Write;

const QUICK_REFERENCE: &str = "\
QUICK REFERENCE:
> Find the matching template for the desired plot type. Do not edit any labels left of any '=' sign
> Duplicate/remove any of the <<<< blocks>>>>, skip by setting <<<< block = False >>>>
> 'True', 'False' and 'None' are capitalized. Do not use quotes '' anywhere in this file
> Cmin, Cmax define the colorbar range. Scientific notation (e.g. 1e-6, 2e3) is supported
       If more than 2 values are provided (e.g. 150,200,250) those define the shaded contours
> Solid contours for the 2nd variable are always provided as list, e.g.:  150,200,250
> 'Level' refers to either 'pfull', 'pstd' in [Pa], 'zstd' or 'zagl' [m], depending on the type of *.nc file
FREE DIMENSIONS:
> Use 'Dimension = 55.' to set to the closest value
> Use 'Dimension = all' to average over all values
> Use 'Dimension = -55.,55.' to get the average between -55. and 55.
> 'None' refers to the default setting for that Dimension:
    -A) time  = instant time step at Nt (i.e last timestep)
    -B) lev   = sfc
    -C) lat   = equator slice
    -D) lon   = 'all', i.e zonal average over all longitudes
    -E) tod   = '15', i.e. 3pm UT
> Overwrite the dimensions using atmos_average.temp{ls = 90 ; lev= 5.,10; lon= all ; lat=45} Use brackets '{}' and SEMI-COLONS ';'
     Specific Time Of Day (tod) in diurn files are accessed with brackets, '{}', e.g. atmos_diurn.ps{tod = 20}
>    Units must be the same as the free dimension block, i.e time [Ls], lev [Pa/m], lon [+/-180 deg], and lat [deg]
TIME SERIES AND 1D PLOTS:
> Use 'Dimension = AXIS' to set the varying axis
> The other free dimensions accept value, 'all' or 'valmin, valmax' as above
> The 'Diurnal [hr]' option may only be set to 'AXIS' or 'None', use the 'tod' syntax as above
>    to request specific time of day, for all other plots (i.e. atmos_diurn.ps{tod = 20})
AXIS OPTIONS AND PROJECTIONS:
> 'cmap' changes the colormap: 'jet' (winds), 'nipy_spectral' (temperature), 'bwr' (diff plot)
> 'linestyle' sets the line style:  '-r' (solid red), '--g' (dashed green), '-ob' (solid & blue markers)
> 'scale' sets the color mapping:  'lin' (linear) or 'log' (logarithmic) For 'log', Cmin,Cmax are typically expected
> 'proj' sets the projection: Cylindrical options are 'cart' (cartesian), 'robin'  (Robinson), 'moll' (Mollweide)
>                             Azimuthal   options are 'Npole' (north pole), 'Spole' (south pole), 'ortho' (Orthographic)
>  Azimuthal projections accept customization arguments: 'Npole lat_max', 'Spole lat_min' , 'ortho lon_center, lat_center'
KEYWORDS:
> 'HOLD ON' [blocks of figures] 'HOLD OFF' groups the figures as a multi-panel page
  (Optional: use 'HOLD ON 2,3' to force a 2 lines 3 column layout)
> [line plot 1] 'ADD LINE' [line plot 2] adds similar 1D-plots on the same figure)
> 'START' and (optionally) 'STOP' can be used to conveniently skip plots below. Use '#' to add comments.
ALGEBRA AND CROSS-SIMULATIONS PLOTS:
Use 'N>' to add a Nth simulation with matching timesteps to the <<< Simulations >>> block (e.g.  4>, 5>...)
Use full path, e.g. '2> /path/to/simu2/history' Empty fields are ignored, comment out with '#'
A variable 'var' in a 'XXXXX.file.nc' from this Nth simulation is accessed using the 'XXXXX.file@N.var' syntax
Encompass raw outputs with square brackets '[]' for element-wise operations, e.g:
> '[fixed.zsurf]/(10.**3)'                              (convert topography from [m] to [km])
> '[atmos_average.taudust_IR]/[atmos_average.ps]*610' (normalize the dust opacity)
> '[atmos_average.temp]-[atmos_average@2.temp]'    (temp. difference between ref simu and simu 2)
> '[atmos_average.temp]-[atmos_average.temp{lev=10}]'   (temp. difference between the default (near surface) and the 10 Pa level
        Supported expressions are: sqrt, log, log10, exp, abs, sin, cos, min, max, mean
";

/// A figure block of a generated template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateEntry {
    pub kind: PlotKind,
    pub wanted: bool,
}

impl TemplateEntry {
    fn new(family: FigureFamily, variable: &str, wanted: bool) -> Self {
        let mut kind = PlotKind::empty(family);
        match &mut kind {
            PlotKind::Line(plot) => {
                plot.variable = Some(variable.to_string());
                plot.time = LineDimension::Varying;
            }
            other => {
                if let Some(plot) = other.as_2d_mut() {
                    plot.variable = Some(variable.to_string());
                }
            }
        }
        Self { kind, wanted }
    }
}

/// The figures of a fresh template. The first two share a page.
pub fn default_entries() -> Vec<TemplateEntry> {
    vec![
        TemplateEntry::new(FigureFamily::LonLat, "fixed.zsurf", true),
        TemplateEntry::new(FigureFamily::LatLev, "atmos_average.ucomp", true),
        TemplateEntry::new(FigureFamily::TimeLat, "atmos_average.taudust_IR", false),
        TemplateEntry::new(FigureFamily::LonLev, "atmos_average_pstd.temp", false),
        TemplateEntry::new(FigureFamily::TimeLev, "atmos_average_pstd.temp", false),
        TemplateEntry::new(FigureFamily::LonTime, "atmos_average.temp", false),
        TemplateEntry::new(FigureFamily::Line, "atmos_average.temp", false),
    ]
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

fn version_header() -> String {
    format!("===================== |MarsPlot V{ENGINE_VERSION}|===================\n")
}

fn simulation_block(simulations: &[String]) -> String {
    let mut out = String::from("<<<<<<<<<<<<<<<<<<<<<< Simulations >>>>>>>>>>>>>>>>>>>>>\n");
    let reference = simulations.first().map(String::as_str).unwrap_or("None");
    let _ = writeln!(out, "ref> {reference}");
    for (i, path) in simulations.iter().enumerate().skip(1) {
        let _ = writeln!(out, "{}> {path}", i + 1);
    }
    out.push_str("=======================================================\n");
    out
}

fn write_2d(out: &mut String, family: FigureFamily, plot: &Plot2D, wanted: bool) {
    let Some((first, second)) = family.free_dimension_labels() else {
        return;
    };
    let (x_key, y_key) = family.axis_option_keys();
    let _ = writeln!(
        out,
        "<<<<<<<<<<<<<<| {:<15} = {} |>>>>>>>>>>>>>",
        family.header_name(),
        if wanted { "True" } else { "False" }
    );
    let _ = writeln!(out, "Title          = {}", text(&plot.title));
    let _ = writeln!(out, "Main Variable  = {}", text(&plot.variable));
    let _ = writeln!(out, "Cmin, Cmax     = {}", format_numbers(plot.color_range.as_deref()));
    let _ = writeln!(out, "{first:<15}= {}", plot.first_free);
    let _ = writeln!(out, "{second:<15}= {}", plot.second_free);
    let _ = writeln!(out, "2nd Variable   = {}", text(&plot.contour_variable));
    let _ = writeln!(
        out,
        "Contours Var 2 = {}",
        format_numbers(plot.contour_levels.as_deref())
    );
    let options = &plot.options;
    let _ = write!(
        out,
        "Axis Options  : {x_key} = {} | {y_key} = {} | cmap = {} | scale = {}",
        format_bounds(options.x_bounds),
        format_bounds(options.y_bounds),
        options.colormap,
        options.scale
    );
    if family == FigureFamily::LonLat {
        let _ = write!(out, " | proj = {}", options.projection);
    }
    out.push('\n');
}

fn write_1d(out: &mut String, plot: &Plot1D, wanted: bool) {
    let _ = writeln!(
        out,
        "<<<<<<<<<<<<<<| Plot 1D = {} |>>>>>>>>>>>>>",
        if wanted { "True" } else { "False" }
    );
    let _ = writeln!(out, "Legend         = {}", text(&plot.legend));
    let _ = writeln!(out, "Main Variable  = {}", text(&plot.variable));
    let _ = writeln!(out, "Ls 0-360       = {}", plot.time);
    let _ = writeln!(out, "Latitude       = {}", plot.latitude);
    let _ = writeln!(out, "Lon +/-180     = {}", plot.longitude);
    let _ = writeln!(out, "Level [Pa/m]   = {}", plot.level);
    let _ = writeln!(
        out,
        "Diurnal  [hr]  = {}",
        if plot.diurnal { "AXIS" } else { "None" }
    );
    let (dim_key, var_key) = FigureFamily::Line.axis_option_keys();
    let options = &plot.options;
    let _ = writeln!(
        out,
        "Axis Options  : {dim_key} = {} | {var_key} = {} | linestyle = {} | axlabel = {}",
        format_bounds(options.dim_bounds),
        format_bounds(options.var_bounds),
        options.linestyle,
        text(&options.axis_label)
    );
}

/// Writes one figure block.
pub fn write_block(kind: &PlotKind, wanted: bool) -> String {
    let mut out = String::new();
    match kind {
        PlotKind::Line(plot) => write_1d(&mut out, plot, wanted),
        other => {
            if let Some(plot) = other.as_2d() {
                write_2d(&mut out, other.family(), plot, wanted);
            }
        }
    }
    out
}

/// A fresh script with the default figures, optionally with the quick reference.
pub fn render_template(with_reference: bool) -> String {
    let mut out = version_header();
    if with_reference {
        for line in QUICK_REFERENCE.lines() {
            let _ = writeln!(out, "# {line}");
        }
    }
    out.push_str("<<<<<<<<<<<<<<<<<<<<<< Simulations >>>>>>>>>>>>>>>>>>>>>\n");
    out.push_str("ref> None\n2> \n3>\n");
    out.push_str("=======================================================\n");
    out.push_str("START\n\n");

    for (i, entry) in default_entries().iter().enumerate() {
        if i == 0 {
            out.push_str("HOLD ON\n");
        }
        out.push_str(&write_block(&entry.kind, entry.wanted));
        out.push('\n');
        if i == 1 {
            out.push_str("HOLD OFF\n");
            out.push_str("#=========================================================================\n");
            out.push_str("#================== Empty Templates (set to False)========================\n");
            out.push_str("#=========================================================================\n");
            out.push('\n');
        }
    }
    out
}

/// Writes parsed figures back as a script, keeping their pages and overlays.
pub fn write_script(simulations: &[String], figures: &[PlotSpecification]) -> String {
    let mut out = version_header();
    out.push_str(&simulation_block(simulations));
    out.push_str("START\n\n");

    let placements: Vec<_> = figures.iter().map(|f| f.placement).collect();
    for (i, figure) in figures.iter().enumerate() {
        let placement = figure.placement;
        let shared = placement.panel_count > 1;
        if placement.is_overlay() {
            out.push_str("ADD LINE\n");
        } else if shared && placement.panel_index == 1 {
            match placement.grid {
                Some((rows, cols)) => {
                    let _ = writeln!(out, "HOLD ON {rows},{cols}");
                }
                None => out.push_str("HOLD ON\n"),
            }
        }
        out.push_str(&write_block(&figure.kind, true));
        if shared && closes_page(&placements, i) {
            out.push_str("HOLD OFF\n");
        }
        out.push('\n');
    }
    out
}
