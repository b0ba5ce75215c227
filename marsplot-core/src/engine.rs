//! Running a parsed script
//!
//! [`Engine::run`] walks the figures of a [`Script`] in order. Each figure is evaluated,
//! prepared and handed to the renderer. A figure that fails, while loading or while
//! drawing, is drawn as a placeholder carrying its error and the run moves on, unless the
//! error is fatal or the settings ask for failures to propagate. A page is saved after the
//! figure that completes it; a page that cannot be saved is recorded as a failure.
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::context::InterpreterContext;
//! use marsplot_core::dataset::MemoryDataset;
//! use marsplot_core::engine::Engine;
//! use marsplot_core::render::RecordingRenderer;
//! use marsplot_core::script::parse_script;
//!
//! let text = "START\n\
//! <<<<<<<<<<<<<<| Plot 2D lon X lat = True |>>>>>>>>>>>>>\n\
//! Title = None\n\
//! Main Variable = fixed.zsurf\n\
//! Cmin, Cmax = None\n\
//! Ls 0-360 = None\n\
//! Level Pa/m = None\n\
//! 2nd Variable = None\n\
//! Contours Var 2 = None\n\
//! Axis Options : lon = [None,None] | lat = [None,None] | cmap = jet | scale = lin | proj = cart\n";
//!
//! let mut context = InterpreterContext::default().with_timestamps(vec![0]);
//! let script = parse_script(text, &mut context).unwrap();
//! let source = MemoryDataset::default();
//! let mut engine = Engine::new(&source, &context, RecordingRenderer::default());
//! let summary = engine.run(&script, None).unwrap();
//!
//! // Nothing to load: the figure fails but the page is still produced
//! assert_eq!(summary.failures.len(), 1);
//! assert_eq!(summary.pages.len(), 1);
//! ```

use crate::config::OutputFormat;
use crate::context::InterpreterContext;
use crate::dataset::DatasetSource;
use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::evaluate::evaluate_figure;
use crate::expression::extract_references;
use crate::figure::{PlotKind, PlotSpecification};
use crate::layout::{closes_page, page_grid, Placement};
use crate::render::{
    failed_panel, load_topography, prepare_panel, FigureRenderer, PageLayout, PreparedPanel,
};
use crate::script::Script;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A figure that could not be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureFailure {
    /// Position of the figure in the script
    pub index: usize,
    /// Line of the figure header
    pub line: usize,
    pub message: String,
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub pages: Vec<PathBuf>,
    /// The merged document, for pdf output
    pub document: Option<PathBuf>,
    pub failures: Vec<FigureFailure>,
}

impl RunSummary {
    /// Logs `error` and records it against figure `index`.
    fn isolate(&mut self, index: usize, figure: &PlotSpecification, error: &MarsPlotError) {
        log::warn!(
            "*** Warning *** {} (line {}) failed: {error}",
            figure.family(),
            figure.line
        );
        self.failures.push(FigureFailure {
            index,
            line: figure.line,
            message: error.to_string(),
        });
    }
}

/// Evaluates and draws the figures of a script.
pub struct Engine<'a, R: FigureRenderer> {
    source: &'a dyn DatasetSource,
    context: &'a InterpreterContext,
    renderer: R,
    used_names: HashSet<PathBuf>,
}

impl<'a, R: FigureRenderer> Engine<'a, R> {
    pub fn new(
        source: &'a dyn DatasetSource,
        context: &'a InterpreterContext,
        renderer: R,
    ) -> Self {
        Self {
            source,
            context,
            renderer,
            used_names: HashSet::new(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Draws every wanted figure of `script`.
    ///
    /// `script_path` names the merged document; without it pages are not merged.
    pub fn run(
        &mut self,
        script: &Script,
        script_path: Option<&Path>,
    ) -> MarsPlotResult<RunSummary> {
        let context = self.context;
        let settings = &context.settings;
        let placements: Vec<Placement> = script.figures.iter().map(|f| f.placement).collect();
        let mut summary = RunSummary::default();

        for (i, figure) in script.figures.iter().enumerate() {
            log::info!(
                "Figure {}/{}: {} (line {})",
                i + 1,
                script.figures.len(),
                figure.family(),
                figure.line
            );
            let panel = match self.prepare(figure) {
                Ok(panel) => panel,
                Err(e) if settings.debug || e.is_fatal() => return Err(e),
                Err(e) => {
                    summary.isolate(i, figure, &e);
                    failed_panel(figure, &e, settings)
                }
            };

            let layout = self.page_layout(&figure.placement);
            if let Err(e) = self.renderer.draw(&layout, &panel) {
                if settings.debug {
                    return Err(e);
                }
                summary.isolate(i, figure, &e);
                let fallback = failed_panel(figure, &e, settings);
                if let Err(e) = self.renderer.draw(&layout, &fallback) {
                    log::warn!("*** Warning *** cannot draw the error panel: {e}");
                }
            }

            if closes_page(&placements, i) {
                let path = self.page_path(figure);
                match self.renderer.save_page(&path) {
                    Ok(()) => {
                        if settings.output_format != OutputFormat::Pdf {
                            log::info!("Saved: {}", path.display());
                        }
                        summary.pages.push(path);
                    }
                    Err(e) if settings.debug => return Err(e),
                    Err(e) => summary.isolate(i, figure, &e),
                }
            }
        }

        if settings.output_format == OutputFormat::Pdf && !summary.pages.is_empty() {
            if let Some(script_path) = script_path {
                let document = settings.input_dir.join(document_name(script_path));
                self.renderer.merge(&summary.pages, &document)?;
                log::info!("{} is ready", document.display());
                summary.document = Some(document);
            }
        }
        Ok(summary)
    }

    fn prepare(&self, figure: &PlotSpecification) -> MarsPlotResult<PreparedPanel> {
        let evaluated = evaluate_figure(figure, self.source, self.context)?;
        let topography = match &figure.kind {
            PlotKind::LonLat(_) => {
                load_topography(&evaluated.primary.reference, self.source, self.context)
            }
            _ => None,
        };
        prepare_panel(figure, &evaluated, &self.context.settings, topography)
    }

    fn page_layout(&self, placement: &Placement) -> PageLayout {
        let settings = &self.context.settings;
        let (rows, cols) = placement
            .grid
            .unwrap_or_else(|| page_grid(placement.panel_count, settings.vertical_page));
        let (width, height) = settings.page_size();
        PageLayout {
            rows,
            cols,
            width,
            height,
            dpi: settings.dpi,
        }
    }

    /// Output path of the page completed by `figure`, unique within the run and on disk.
    fn page_path(&mut self, figure: &PlotSpecification) -> PathBuf {
        let settings = &self.context.settings;
        let stem = page_stem(figure);
        let directory = settings.output_dir();
        let candidate = directory.join(format!("{stem}.{}", settings.output_format.extension()));
        let used = &self.used_names;
        let path = unique_path(&candidate, |p| used.contains(p) || p.exists());
        self.used_names.insert(path.clone());
        path
    }
}

/// Base name of the page completed by `figure`.
///
/// Single-panel pages are named after the variable, multi-panel pages `multi_panel`.
pub fn page_stem(figure: &PlotSpecification) -> String {
    if figure.placement.panel_count > 1 {
        return "multi_panel".to_string();
    }
    let Some(variable) = figure.kind.variable() else {
        return "figure".to_string();
    };
    if variable.contains('[') {
        let first = extract_references(variable)
            .ok()
            .and_then(|(tokens, _)| tokens.into_iter().next())
            .unwrap_or_default();
        format!("expression_{}", strip_overrides(&first))
    } else {
        strip_overrides(variable)
    }
}

fn strip_overrides(text: &str) -> String {
    text.split('{').next().unwrap_or_default().trim().to_string()
}

/// `path`, or the first of `stem_01.ext`, `stem_02.ext`, ... for which `taken` is false.
pub fn unique_path(path: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(path) {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = path.with_file_name(format!("{stem}_{n:02}{extension}"));
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Merged document name for a script: `Custom` gives `Diagnostics.pdf`, `Custom_03`
/// gives `Diagnostics_03.pdf`, anything else keeps its base name.
pub fn document_name(script_path: &Path) -> String {
    let stem = script_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.strip_prefix("Custom") {
        Some("") => "Diagnostics.pdf".to_string(),
        Some(suffix) if suffix.starts_with('_') => format!("Diagnostics{suffix}.pdf"),
        _ => format!("{stem}.pdf"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::FigureFamily;

    fn figure(variable: &str, panel_count: usize) -> PlotSpecification {
        let mut kind = PlotKind::empty(FigureFamily::LonLat);
        if let Some(plot) = kind.as_2d_mut() {
            plot.variable = Some(variable.to_string());
        }
        PlotSpecification {
            kind,
            placement: Placement {
                panel_count,
                panel_index: panel_count,
                ..Placement::default()
            },
            line: 1,
            defects: Vec::new(),
        }
    }

    #[test]
    fn page_names() {
        assert_eq!(
            page_stem(&figure("atmos_average.temp{lev=50}", 1)),
            "atmos_average.temp"
        );
        assert_eq!(
            page_stem(&figure("[atmos_average.ucomp{lat=10}]*2+[fixed.zsurf]", 1)),
            "expression_atmos_average.ucomp"
        );
        assert_eq!(page_stem(&figure("fixed.zsurf", 3)), "multi_panel");
    }

    #[test]
    fn names_are_suffixed_when_taken() {
        let taken: HashSet<PathBuf> = ["plots/a.png", "plots/a_01.png"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let path = unique_path(Path::new("plots/a.png"), |p| taken.contains(p));
        assert_eq!(path, PathBuf::from("plots/a_02.png"));
        let free = unique_path(Path::new("plots/b.png"), |p| taken.contains(p));
        assert_eq!(free, PathBuf::from("plots/b.png"));
    }

    #[test]
    fn merged_document_names() {
        assert_eq!(document_name(Path::new("/runs/Custom.in")), "Diagnostics.pdf");
        assert_eq!(document_name(Path::new("Custom_02.in")), "Diagnostics_02.pdf");
        assert_eq!(document_name(Path::new("dust_study.in")), "dust_study.pdf");
    }
}
