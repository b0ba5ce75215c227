//! Command line front end
//!
//! Usage: `marsplot [SCRIPT] [--template|--temp] [--date A [B]] [--output pdf|eps|png] ...`
//!
//! With `--template` (or the skinned `--temp`) a fresh `Custom.in` is written. Otherwise the
//! script is parsed and validated and its page plan is printed.

use clap::Parser;
use env_logger::Env;
use marsplot_core::config::{EngineSettings, OutputFormat};
use marsplot_core::context::{DateFilter, InterpreterContext};
use marsplot_core::engine::{page_stem, unique_path};
use marsplot_core::errors::{MarsPlotError, MarsPlotResult};
use marsplot_core::figure::PlotSpecification;
use marsplot_core::layout::{closes_page, page_grid, Placement};
use marsplot_core::script::{parse_script, Script};
use marsplot_core::template::render_template;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "marsplot")]
#[command(about = "Plan diagnostic figures of Mars climate model output from a Custom.in script")]
struct Args {
    /// Script to interpret
    script: Option<PathBuf>,

    /// Write a Custom.in template with the quick reference
    #[arg(long, conflicts_with = "temp")]
    template: bool,

    /// Write a Custom.in template without the quick reference
    #[arg(long)]
    temp: bool,

    /// File timestamp to use, or an inclusive range of two
    #[arg(long, num_args = 1..=2, value_name = "DATE")]
    date: Vec<u32>,

    /// Output format of the pages
    #[arg(short, long, value_parser = parse_format)]
    output: Option<OutputFormat>,

    /// Portrait pages
    #[arg(long)]
    vertical: bool,

    /// Page width in pixels
    #[arg(long)]
    pwidth: Option<u32>,

    /// Directory of the reference simulation
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the parsed figures as JSON
    #[arg(long)]
    plan_json: bool,

    /// Let the first figure failure abort the run
    #[arg(long)]
    debug: bool,
}

fn parse_format(text: &str) -> Result<OutputFormat, String> {
    match text.to_ascii_lowercase().as_str() {
        "pdf" => Ok(OutputFormat::Pdf),
        "eps" => Ok(OutputFormat::Eps),
        "png" => Ok(OutputFormat::Png),
        other => Err(format!("unknown output format '{other}', use pdf, eps or png")),
    }
}

fn settings(args: &Args) -> MarsPlotResult<EngineSettings> {
    let mut settings = match &args.config {
        Some(path) => EngineSettings::from_file(path)?,
        None => EngineSettings::default(),
    };
    if let Some(format) = args.output {
        settings.output_format = format;
    }
    if let Some(width) = args.pwidth {
        settings.page_width_px = width;
    }
    if let Some(directory) = &args.directory {
        settings.input_dir = directory.clone();
    }
    settings.vertical_page |= args.vertical;
    settings.debug |= args.debug;
    Ok(settings)
}

fn date_filter(dates: &[u32]) -> Option<DateFilter> {
    match dates {
        [single] => Some(DateFilter::Single(*single)),
        [begin, end] => Some(DateFilter::Range(*begin, *end)),
        _ => None,
    }
}

fn write_template(directory: &Path, with_reference: bool) -> MarsPlotResult<PathBuf> {
    let path = unique_path(&directory.join("Custom.in"), Path::exists);
    std::fs::write(&path, render_template(with_reference))?;
    Ok(path)
}

/// One figure of the page plan.
#[derive(Serialize, Debug)]
struct PlanEntry<'a> {
    #[serde(flatten)]
    figure: &'a PlotSpecification,
    /// Rows and columns of its page
    grid: (usize, usize),
    /// File written once this figure completes its page
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

/// What `--plan-json` prints.
#[derive(Serialize, Debug)]
struct Plan<'a> {
    timestamps: &'a [u32],
    figures: Vec<PlanEntry<'a>>,
}

fn plan<'a>(script: &'a Script, settings: &EngineSettings) -> Vec<PlanEntry<'a>> {
    let placements: Vec<Placement> = script.figures.iter().map(|f| f.placement).collect();
    script
        .figures
        .iter()
        .enumerate()
        .map(|(i, figure)| {
            let placement = figure.placement;
            PlanEntry {
                figure,
                grid: placement
                    .grid
                    .unwrap_or_else(|| page_grid(placement.panel_count, settings.vertical_page)),
                output: closes_page(&placements, i).then(|| {
                    format!("{}.{}", page_stem(figure), settings.output_format.extension())
                }),
            }
        })
        .collect()
}

fn print_plan(entries: &[PlanEntry]) {
    for entry in entries {
        let placement = entry.figure.placement;
        let (rows, cols) = entry.grid;
        let overlay = if placement.is_overlay() {
            format!(" + line {}", placement.overlay_depth)
        } else {
            String::new()
        };
        println!(
            "page {:>3}  panel {}/{} ({rows}x{cols}){overlay}  {:<18} {}",
            placement.page + 1,
            placement.panel_index,
            placement.panel_count,
            entry.figure.family().header_name(),
            entry.figure.kind.variable().unwrap_or("None"),
        );
        for defect in &entry.figure.defects {
            println!("          ! {defect}");
        }
        if let Some(output) = &entry.output {
            println!("          -> {output}");
        }
    }
}

fn run(args: Args) -> MarsPlotResult<()> {
    let settings = settings(&args)?;

    if args.template || args.temp {
        let path = write_template(&settings.input_dir, args.template)?;
        log::info!("{} was created", path.display());
        return Ok(());
    }

    let script_path = args.script.clone().ok_or_else(|| {
        MarsPlotError::Error("no script given, use --template to create one".to_string())
    })?;
    let text = std::fs::read_to_string(&script_path)?;
    let mut context = InterpreterContext::new(settings);
    let script = parse_script(&text, &mut context)?;

    if let Err(e) = context.select_dates(date_filter(&args.date)) {
        log::warn!("*** Warning *** {e}");
    }

    let entries = plan(&script, &context.settings);
    if args.plan_json {
        let plan = Plan {
            timestamps: &context.timestamps,
            figures: entries,
        };
        match serde_json::to_string_pretty(&plan) {
            Ok(json) => println!("{json}"),
            Err(e) => return Err(MarsPlotError::Error(e.to_string())),
        }
    } else {
        print_plan(&entries);
    }
    log::info!(
        "{} figure(s) on {} page(s)",
        script.figures.len(),
        script.figures.iter().map(|f| f.placement.page + 1).max().unwrap_or(0)
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{e}");
        process::exit(1);
    }
}
