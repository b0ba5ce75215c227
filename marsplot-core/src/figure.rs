//! Plot specifications
//!
//! A script declares figures of seven families. The six 2D families share one record,
//! [`Plot2D`], and differ in which pair of axes is plotted and which two dimensions are
//! left free. The 1D family, [`Plot1D`], plots along whichever dimension is marked `AXIS`.
//!
//! | Family                  | x         | y        | free dims        |
//! |-------------------------|-----------|----------|------------------|
//! | [`FigureFamily::LonLat`]  | longitude | latitude | time, level      |
//! | [`FigureFamily::TimeLat`] | time      | latitude | longitude, level |
//! | [`FigureFamily::LatLev`]  | latitude  | level    | time, longitude  |
//! | [`FigureFamily::LonLev`]  | longitude | level    | time, latitude   |
//! | [`FigureFamily::TimeLev`] | time      | level    | latitude, longitude |
//! | [`FigureFamily::LonTime`] | longitude | time     | latitude, level  |

use crate::layout::Placement;
use crate::request::{parse_scalar, parse_text, AxisRequest, Dimension, LineDimension, ScalarValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of figure a block declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FigureFamily {
    LonLat,
    TimeLat,
    LatLev,
    LonLev,
    TimeLev,
    LonTime,
    Line,
}

impl FigureFamily {
    pub const ALL: [FigureFamily; 7] = [
        FigureFamily::LonLat,
        FigureFamily::TimeLat,
        FigureFamily::LatLev,
        FigureFamily::LonLev,
        FigureFamily::TimeLev,
        FigureFamily::LonTime,
        FigureFamily::Line,
    ];

    /// The name used in block headers.
    pub fn header_name(&self) -> &'static str {
        match self {
            FigureFamily::LonLat => "Plot 2D lon X lat",
            FigureFamily::TimeLat => "Plot 2D time X lat",
            FigureFamily::LatLev => "Plot 2D lat X lev",
            FigureFamily::LonLev => "Plot 2D lon X lev",
            FigureFamily::TimeLev => "Plot 2D time X lev",
            FigureFamily::LonTime => "Plot 2D lon X time",
            FigureFamily::Line => "Plot 1D",
        }
    }

    /// Looks a family up by header name, ignoring case and spacing.
    pub fn from_header_name(name: &str) -> Option<Self> {
        let wanted = normalize_label(name);
        Self::ALL
            .into_iter()
            .find(|family| normalize_label(family.header_name()) == wanted)
    }

    /// Plotted axes as (x, y). `None` for 1D figures.
    pub fn plotted(&self) -> Option<(Dimension, Dimension)> {
        use Dimension::*;
        match self {
            FigureFamily::LonLat => Some((Longitude, Latitude)),
            FigureFamily::TimeLat => Some((Time, Latitude)),
            FigureFamily::LatLev => Some((Latitude, Level)),
            FigureFamily::LonLev => Some((Longitude, Level)),
            FigureFamily::TimeLev => Some((Time, Level)),
            FigureFamily::LonTime => Some((Longitude, Time)),
            FigureFamily::Line => None,
        }
    }

    /// The two free dimensions of a 2D family, in block order.
    pub fn free_dimensions(&self) -> Option<(Dimension, Dimension)> {
        use Dimension::*;
        match self {
            FigureFamily::LonLat => Some((Time, Level)),
            FigureFamily::TimeLat => Some((Longitude, Level)),
            FigureFamily::LatLev => Some((Time, Longitude)),
            FigureFamily::LonLev => Some((Time, Latitude)),
            FigureFamily::TimeLev => Some((Latitude, Longitude)),
            FigureFamily::LonTime => Some((Latitude, Level)),
            FigureFamily::Line => None,
        }
    }

    /// Dimensions a per-reference override block may set for this family.
    pub fn overridable(&self) -> Vec<Dimension> {
        match self.free_dimensions() {
            Some((first, second)) => vec![first, second, Dimension::TimeOfDay],
            None => vec![
                Dimension::Time,
                Dimension::Latitude,
                Dimension::Longitude,
                Dimension::Level,
                Dimension::TimeOfDay,
            ],
        }
    }

    /// Labels of the block lines holding the two free dimensions.
    pub fn free_dimension_labels(&self) -> Option<(&'static str, &'static str)> {
        match self {
            FigureFamily::LonLat => Some(("Ls 0-360", "Level Pa/m")),
            FigureFamily::TimeLat => Some(("Lon +/-180", "Level [Pa/m]")),
            FigureFamily::LatLev => Some(("Ls 0-360 ", "Lon +/-180")),
            FigureFamily::LonLev => Some(("Ls 0-360 ", "Latitude")),
            FigureFamily::TimeLev => Some(("Latitude", "Lon +/-180")),
            FigureFamily::LonTime => Some(("Latitude", "Level [Pa/m]")),
            FigureFamily::Line => None,
        }
    }

    /// Keys written for the two axis bounds in the `Axis Options` line.
    pub fn axis_option_keys(&self) -> (&'static str, &'static str) {
        match self {
            FigureFamily::LonLat => ("lon", "lat"),
            FigureFamily::TimeLat => ("Ls", "lat"),
            FigureFamily::LatLev => ("Lat", "level[Pa/m]"),
            FigureFamily::LonLev => ("Lon +/-180", "level[Pa/m]"),
            FigureFamily::TimeLev => ("Ls", "level[Pa/m]"),
            FigureFamily::LonTime => ("Lon +/-180", "Ls"),
            FigureFamily::Line => ("lat,lon+/-180,[Pa/m],Ls", "var"),
        }
    }

    /// Line labels of a figure block, in order. The last line holds the axis options.
    pub fn block_labels(&self) -> [&'static str; 8] {
        match self.free_dimension_labels() {
            Some((first, second)) => [
                "Title",
                "Main Variable",
                "Cmin, Cmax",
                first,
                second,
                "2nd Variable",
                "Contours Var 2",
                "Axis Options",
            ],
            None => [
                "Legend",
                "Main Variable",
                "Ls 0-360",
                "Latitude",
                "Lon +/-180",
                "Level [Pa/m]",
                "Diurnal  [hr]",
                "Axis Options",
            ],
        }
    }

    pub fn is_2d(&self) -> bool {
        !matches!(self, FigureFamily::Line)
    }
}

impl fmt::Display for FigureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header_name())
    }
}

/// Lowercases and drops all whitespace, so `"Ls 0-360 "` matches `"ls 0-360"`.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map projection of a longitude-latitude figure.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    Cartesian,
    Robinson,
    Mollweide,
    /// Polar stereographic view bounded at a latitude
    NorthPole { bounding_lat: f64 },
    SouthPole { bounding_lat: f64 },
    Orthographic { lon: f64, lat: f64 },
}

impl Projection {
    /// Parses `cart`, `robin`, `moll`, `Npole [lat]`, `Spole [lat]` or `ortho [lon,lat]`.
    pub fn parse(text: &str) -> Projection {
        let text = text.trim();
        let (name, args) = match text.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (text, ""),
        };
        let numbers: Vec<f64> = args
            .split(',')
            .filter_map(|part| part.trim().parse::<f64>().ok())
            .collect();
        match name {
            "" | "None" | "cart" => Projection::Cartesian,
            "robin" => Projection::Robinson,
            "moll" => Projection::Mollweide,
            "Npole" => Projection::NorthPole {
                bounding_lat: numbers.first().copied().unwrap_or(60.0),
            },
            "Spole" => Projection::SouthPole {
                bounding_lat: numbers.first().copied().unwrap_or(-60.0),
            },
            "ortho" => match numbers.as_slice() {
                [lon, lat, ..] => Projection::Orthographic { lon: *lon, lat: *lat },
                _ => Projection::Orthographic {
                    lon: -120.0,
                    lat: 20.0,
                },
            },
            other => {
                log::warn!("*** Warning *** unknown projection '{other}', using cart");
                Projection::Cartesian
            }
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Cartesian => write!(f, "cart"),
            Projection::Robinson => write!(f, "robin"),
            Projection::Mollweide => write!(f, "moll"),
            Projection::NorthPole { bounding_lat } => write!(f, "Npole {bounding_lat}"),
            Projection::SouthPole { bounding_lat } => write!(f, "Spole {bounding_lat}"),
            Projection::Orthographic { lon, lat } => write!(f, "ortho {lon},{lat}"),
        }
    }
}

/// Colour scale of a 2D figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorScale {
    #[default]
    Linear,
    Log,
}

impl ColorScale {
    pub fn parse(text: &str) -> ColorScale {
        match text.trim() {
            "log" => ColorScale::Log,
            "" | "None" | "lin" => ColorScale::Linear,
            other => {
                log::warn!("*** Warning *** unknown scale '{other}', using lin");
                ColorScale::Linear
            }
        }
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorScale::Linear => write!(f, "lin"),
            ColorScale::Log => write!(f, "log"),
        }
    }
}

/// Display bounds for one axis. Either bound may be left to the data.
pub type Bounds = Option<[f64; 2]>;

/// Parses `[a,b]`. Any `None` leaves the whole bound unset.
pub fn parse_bounds(text: &str) -> Bounds {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    match parse_scalar(inner) {
        ScalarValue::Numbers(values) if values.len() == 2 => {
            Some([values[0], values[1]])
        }
        _ => None,
    }
}

pub fn format_bounds(bounds: Bounds) -> String {
    match bounds {
        Some([a, b]) => format!("[{a},{b}]"),
        None => "[None,None]".to_string(),
    }
}

/// Trailing `Axis Options` line of a 2D block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisOptions2D {
    pub x_bounds: Bounds,
    pub y_bounds: Bounds,
    pub colormap: String,
    pub scale: ColorScale,
    pub projection: Projection,
}

impl Default for AxisOptions2D {
    fn default() -> Self {
        Self {
            x_bounds: None,
            y_bounds: None,
            colormap: "jet".to_string(),
            scale: ColorScale::Linear,
            projection: Projection::Cartesian,
        }
    }
}

/// Trailing `Axis Options` line of a 1D block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisOptions1D {
    /// Bounds of the varying dimension
    pub dim_bounds: Bounds,
    /// Bounds of the plotted values
    pub var_bounds: Bounds,
    pub linestyle: String,
    pub axis_label: Option<String>,
}

impl Default for AxisOptions1D {
    fn default() -> Self {
        Self {
            dim_bounds: None,
            var_bounds: None,
            linestyle: "-".to_string(),
            axis_label: None,
        }
    }
}

/// Splits `Axis Options : a = x | b = y` into its values, in order.
pub fn split_axis_options(text: &str) -> Vec<String> {
    let body = match text.split_once(':') {
        Some((_, body)) => body,
        None => text,
    };
    body.split('|')
        .map(|segment| match segment.split_once('=') {
            Some((_, value)) => value.trim().to_string(),
            None => String::new(),
        })
        .collect()
}

impl AxisOptions2D {
    pub fn parse(text: &str) -> Self {
        let values = split_axis_options(text);
        let value = |i: usize| values.get(i).map(String::as_str).unwrap_or("");
        let defaults = Self::default();
        Self {
            x_bounds: parse_bounds(value(0)),
            y_bounds: parse_bounds(value(1)),
            colormap: parse_text(value(2)).unwrap_or(defaults.colormap),
            scale: ColorScale::parse(value(3)),
            projection: Projection::parse(value(4)),
        }
    }
}

impl AxisOptions1D {
    pub fn parse(text: &str) -> Self {
        let values = split_axis_options(text);
        let value = |i: usize| values.get(i).map(String::as_str).unwrap_or("");
        let defaults = Self::default();
        Self {
            dim_bounds: parse_bounds(value(0)),
            var_bounds: parse_bounds(value(1)),
            linestyle: parse_text(value(2)).unwrap_or(defaults.linestyle),
            axis_label: parse_text(value(3)),
        }
    }
}

/// A figure over two plotted axes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plot2D {
    pub title: Option<String>,
    pub variable: Option<String>,
    /// Two bounds, or three or more explicit contour levels
    pub color_range: Option<Vec<f64>>,
    /// Request for the first free dimension of the family
    pub first_free: AxisRequest,
    pub second_free: AxisRequest,
    /// Variable drawn as solid contours over the shaded field
    pub contour_variable: Option<String>,
    pub contour_levels: Option<Vec<f64>>,
    pub options: AxisOptions2D,
}

/// The sub-mode of a 1D figure, set by its `AXIS` dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineMode {
    Time,
    Latitude,
    Longitude,
    Level,
    Diurnal,
}

impl LineMode {
    pub fn dimension(&self) -> Dimension {
        match self {
            LineMode::Time => Dimension::Time,
            LineMode::Latitude => Dimension::Latitude,
            LineMode::Longitude => Dimension::Longitude,
            LineMode::Level => Dimension::Level,
            LineMode::Diurnal => Dimension::TimeOfDay,
        }
    }
}

/// A line figure along one dimension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Plot1D {
    pub legend: Option<String>,
    pub variable: Option<String>,
    pub time: LineDimension,
    pub latitude: LineDimension,
    pub longitude: LineDimension,
    pub level: LineDimension,
    /// Set when the diurnal field reads `AXIS`
    pub diurnal: bool,
    pub options: AxisOptions1D,
}

impl Plot1D {
    /// Dimensions marked `AXIS`, in block order.
    pub fn varying(&self) -> Vec<LineMode> {
        [
            (self.time.is_varying(), LineMode::Time),
            (self.latitude.is_varying(), LineMode::Latitude),
            (self.longitude.is_varying(), LineMode::Longitude),
            (self.level.is_varying(), LineMode::Level),
            (self.diurnal, LineMode::Diurnal),
        ]
        .into_iter()
        .filter_map(|(varying, mode)| varying.then_some(mode))
        .collect()
    }

    /// The plotted dimension. With several `AXIS` fields the last one in block order wins.
    pub fn mode(&self) -> Option<LineMode> {
        self.varying().last().copied()
    }

    /// The request held for `dimension`.
    pub fn request(&self, dimension: Dimension) -> AxisRequest {
        match dimension {
            Dimension::Time => self.time.request(),
            Dimension::Latitude => self.latitude.request(),
            Dimension::Longitude => self.longitude.request(),
            Dimension::Level => self.level.request(),
            Dimension::TimeOfDay => AxisRequest::Unset,
        }
    }
}

impl Plot2D {
    /// The declared request for a free dimension of `family`.
    pub fn request(&self, family: FigureFamily, dimension: Dimension) -> AxisRequest {
        match family.free_dimensions() {
            Some((first, _)) if first == dimension => self.first_free,
            Some((_, second)) if second == dimension => self.second_free,
            _ => AxisRequest::Unset,
        }
    }
}

/// Family-specific content of a figure block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlotKind {
    LonLat(Plot2D),
    TimeLat(Plot2D),
    LatLev(Plot2D),
    LonLev(Plot2D),
    TimeLev(Plot2D),
    LonTime(Plot2D),
    Line(Plot1D),
}

impl PlotKind {
    /// An empty record for `family`.
    pub fn empty(family: FigureFamily) -> PlotKind {
        let plot = Plot2D::default();
        match family {
            FigureFamily::LonLat => PlotKind::LonLat(plot),
            FigureFamily::TimeLat => PlotKind::TimeLat(plot),
            FigureFamily::LatLev => PlotKind::LatLev(plot),
            FigureFamily::LonLev => PlotKind::LonLev(plot),
            FigureFamily::TimeLev => PlotKind::TimeLev(plot),
            FigureFamily::LonTime => PlotKind::LonTime(plot),
            FigureFamily::Line => PlotKind::Line(Plot1D::default()),
        }
    }

    pub fn family(&self) -> FigureFamily {
        match self {
            PlotKind::LonLat(_) => FigureFamily::LonLat,
            PlotKind::TimeLat(_) => FigureFamily::TimeLat,
            PlotKind::LatLev(_) => FigureFamily::LatLev,
            PlotKind::LonLev(_) => FigureFamily::LonLev,
            PlotKind::TimeLev(_) => FigureFamily::TimeLev,
            PlotKind::LonTime(_) => FigureFamily::LonTime,
            PlotKind::Line(_) => FigureFamily::Line,
        }
    }

    pub fn as_2d(&self) -> Option<&Plot2D> {
        match self {
            PlotKind::LonLat(plot)
            | PlotKind::TimeLat(plot)
            | PlotKind::LatLev(plot)
            | PlotKind::LonLev(plot)
            | PlotKind::TimeLev(plot)
            | PlotKind::LonTime(plot) => Some(plot),
            PlotKind::Line(_) => None,
        }
    }

    pub fn as_2d_mut(&mut self) -> Option<&mut Plot2D> {
        match self {
            PlotKind::LonLat(plot)
            | PlotKind::TimeLat(plot)
            | PlotKind::LatLev(plot)
            | PlotKind::LonLev(plot)
            | PlotKind::TimeLev(plot)
            | PlotKind::LonTime(plot) => Some(plot),
            PlotKind::Line(_) => None,
        }
    }

    /// The primary variable field.
    pub fn variable(&self) -> Option<&str> {
        match self {
            PlotKind::Line(plot) => plot.variable.as_deref(),
            other => other.as_2d().and_then(|plot| plot.variable.as_deref()),
        }
    }

    /// Title of a 2D figure or legend of a 1D figure.
    pub fn title(&self) -> Option<&str> {
        match self {
            PlotKind::Line(plot) => plot.legend.as_deref(),
            other => other.as_2d().and_then(|plot| plot.title.as_deref()),
        }
    }

    /// The declared request for `dimension`, before any override.
    pub fn request(&self, dimension: Dimension) -> AxisRequest {
        match self {
            PlotKind::Line(plot) => plot.request(dimension),
            other => other
                .as_2d()
                .map(|plot| plot.request(other.family(), dimension))
                .unwrap_or_default(),
        }
    }
}

/// One wanted figure of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotSpecification {
    pub kind: PlotKind,
    pub placement: Placement,
    /// Line of the block header in the script
    pub line: usize,
    /// Problems found while reading the block. A figure with defects fails when evaluated.
    pub defects: Vec<String>,
}

impl PlotSpecification {
    pub fn family(&self) -> FigureFamily {
        self.kind.family()
    }

    pub fn is_overlay(&self) -> bool {
        self.placement.is_overlay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_names_round_trip() {
        for family in FigureFamily::ALL {
            assert_eq!(
                FigureFamily::from_header_name(family.header_name()),
                Some(family)
            );
        }
        assert_eq!(
            FigureFamily::from_header_name("plot 2d LON x LAT"),
            Some(FigureFamily::LonLat)
        );
        assert_eq!(FigureFamily::from_header_name("Plot 3D"), None);
    }

    #[test]
    fn free_and_plotted_dimensions_cover_four_axes() {
        for family in FigureFamily::ALL.into_iter().filter(FigureFamily::is_2d) {
            let (x, y) = family.plotted().unwrap();
            let (a, b) = family.free_dimensions().unwrap();
            let mut all = vec![x, y, a, b];
            all.sort();
            all.dedup();
            assert_eq!(all.len(), 4, "{family}");
            assert!(!all.contains(&Dimension::TimeOfDay));
        }
    }

    #[test]
    fn projections() {
        assert_eq!(Projection::parse("cart"), Projection::Cartesian);
        assert_eq!(
            Projection::parse("Npole 70"),
            Projection::NorthPole { bounding_lat: 70.0 }
        );
        assert_eq!(
            Projection::parse("Spole"),
            Projection::SouthPole { bounding_lat: -60.0 }
        );
        assert_eq!(
            Projection::parse("ortho 45,-10"),
            Projection::Orthographic { lon: 45.0, lat: -10.0 }
        );
        assert_eq!(Projection::parse("mercator"), Projection::Cartesian);
    }

    #[test]
    fn axis_options_2d() {
        let options = AxisOptions2D::parse(
            "Axis Options  : lon = [-180,180] | lat = [None,None] | cmap = RdBu_r | scale = log | proj = robin",
        );
        assert_eq!(options.x_bounds, Some([-180.0, 180.0]));
        assert_eq!(options.y_bounds, None);
        assert_eq!(options.colormap, "RdBu_r");
        assert_eq!(options.scale, ColorScale::Log);
        assert_eq!(options.projection, Projection::Robinson);
    }

    #[test]
    fn missing_axis_option_segments_use_defaults() {
        let options = AxisOptions2D::parse("Axis Options  : Ls = [0,360]");
        assert_eq!(options.x_bounds, Some([0.0, 360.0]));
        assert_eq!(options, AxisOptions2D {
            x_bounds: Some([0.0, 360.0]),
            ..AxisOptions2D::default()
        });
    }

    #[test]
    fn axis_options_1d() {
        let options = AxisOptions1D::parse(
            "Axis Options  : lat,lon+/-180,[Pa/m],Ls = [None,None] | var = [0,2] | linestyle = --r | axlabel = Temperature",
        );
        assert_eq!(options.dim_bounds, None);
        assert_eq!(options.var_bounds, Some([0.0, 2.0]));
        assert_eq!(options.linestyle, "--r");
        assert_eq!(options.axis_label.as_deref(), Some("Temperature"));
    }

    #[test]
    fn line_mode_detection() {
        let mut plot = Plot1D::default();
        assert_eq!(plot.mode(), None);
        plot.latitude = LineDimension::Varying;
        assert_eq!(plot.mode(), Some(LineMode::Latitude));
        plot.diurnal = true;
        assert_eq!(plot.mode(), Some(LineMode::Diurnal));
    }

    #[test]
    fn declared_requests_by_dimension() {
        let plot = Plot2D {
            first_free: AxisRequest::Value(90.0),
            second_free: AxisRequest::WholeAxisAverage,
            ..Plot2D::default()
        };
        let kind = PlotKind::LatLev(plot);
        assert_eq!(kind.request(Dimension::Time), AxisRequest::Value(90.0));
        assert_eq!(
            kind.request(Dimension::Longitude),
            AxisRequest::WholeAxisAverage
        );
        assert_eq!(kind.request(Dimension::Latitude), AxisRequest::Unset);
    }
}
