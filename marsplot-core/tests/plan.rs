use is_close::is_close;
use marsplot_core::config::EngineSettings;
use marsplot_core::context::InterpreterContext;
use marsplot_core::figure::FigureFamily;
use marsplot_core::layout::{closes_page, page_grid};
use marsplot_core::script::parse_script;
use marsplot_core::template::{render_template, write_script};
use std::path::PathBuf;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn template_plan() {
    init_logging();
    let mut context = InterpreterContext::default();
    let script = parse_script(&render_template(true), &mut context).unwrap();

    // Only the two enabled figures are kept, sharing a page
    assert_eq!(script.figures.len(), 2);
    assert_eq!(script.figures[0].family(), FigureFamily::LonLat);
    assert_eq!(script.figures[1].family(), FigureFamily::LatLev);
    let placements: Vec<_> = script.figures.iter().map(|f| f.placement).collect();
    assert!(placements.iter().all(|p| p.page == 0 && p.panel_count == 2));
    assert!(!closes_page(&placements, 0));
    assert!(closes_page(&placements, 1));
    assert_eq!(page_grid(2, false), (1, 2));
}

#[test]
fn plan_serializes_to_json() {
    let mut context = InterpreterContext::default();
    let script = parse_script(&render_template(false), &mut context).unwrap();
    let json = serde_json::to_value(&script).unwrap();

    let figures = json["figures"].as_array().unwrap();
    assert_eq!(figures.len(), 2);
    assert_eq!(figures[1]["placement"]["panel_index"], 2);
    assert_eq!(
        figures[0]["kind"]["LonLat"]["variable"],
        serde_json::json!("fixed.zsurf")
    );
}

#[test]
fn simulations_survive_rewrite() {
    let text = "\
<<<<<<<<<<<<<<<<<<<<<< Simulations >>>>>>>>>>>>>>>>>>>>>
ref> /runs/base
2> /runs/dusty
=======================================================
START
HOLD ON 1,3
<<<<<<<<<<<<<<| Plot 2D lon X lat = True |>>>>>>>>>>>>>
Title          = Surface
Main Variable  = fixed.zsurf
Cmin, Cmax     = -4000, 4000
Ls 0-360       = None
Level Pa/m     = None
2nd Variable   = None
Contours Var 2 = None
Axis Options  : lon = [None,None] | lat = [None,None] | cmap = jet | scale = lin | proj = cart
<<<<<<<<<<<<<<| Plot 2D lat X lev = True |>>>>>>>>>>>>>
Title          = None
Main Variable  = atmos_average@2.ucomp
Cmin, Cmax     = None
Ls 0-360       = 270
Lon +/-180     = all
2nd Variable   = None
Contours Var 2 = None
Axis Options  : Lat = [None,None] | level[Pa/m] = [None,None] | cmap = jet | scale = lin | proj = cart
HOLD OFF
";
    let mut context = InterpreterContext::default();
    let script = parse_script(text, &mut context).unwrap();
    assert_eq!(
        context.simulations,
        vec![PathBuf::from("/runs/base"), PathBuf::from("/runs/dusty")]
    );
    assert_eq!(script.figures[0].placement.grid, Some((1, 3)));

    let simulations = ["/runs/base".to_string(), "/runs/dusty".to_string()];
    let rewritten = write_script(&simulations, &script.figures);
    let mut again = InterpreterContext::default();
    let reparsed = parse_script(&rewritten, &mut again).unwrap();
    assert_eq!(again.simulations, context.simulations);
    for (a, b) in script.figures.iter().zip(&reparsed.figures) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.placement, b.placement);
    }
}

#[test]
fn page_geometry() {
    let settings = EngineSettings::default();
    let (width, height) = settings.page_size();
    assert!(is_close!(width, 2000.0 / 96.0));
    assert!(is_close!(height, 2000.0 / 1.4 / 96.0));
    assert!(is_close!(settings.font_size(3), 10.5));
}
