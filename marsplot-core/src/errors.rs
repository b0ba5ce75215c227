use thiserror::Error;

/// Error type for script interpretation and figure evaluation.
///
/// Script-level variants abort a run (see [`MarsPlotError::is_fatal`]); every other
/// variant is scoped to the figure that raised it.
#[derive(Error, Debug)]
pub enum MarsPlotError {
    #[error("{0}")]
    Error(String),

    #[error("Missing 'START' marker in script. Figure declarations must follow a line reading 'START'")]
    MissingStart,
    #[error("Line {line}: 'HOLD ON' is never closed. Add 'HOLD OFF' after the last panel of the page")]
    UnclosedHold { line: usize },
    #[error("Line {line}: 'ADD LINE' is not followed by a figure block")]
    DanglingOverlay { line: usize },
    #[error("Line {line}: 'ADD LINE' must follow a figure on the same page")]
    OverlayWithoutFigure { line: usize },
    #[error("Line {line}: unknown figure family '{name}'")]
    UnknownFigureFamily { name: String, line: usize },
    #[error("Line {line}: malformed figure header '{text}'")]
    MalformedHeader { text: String, line: usize },

    #[error("Malformed variable reference '{reference}': {reason}")]
    MalformedReference { reference: String, reason: String },
    #[error("Malformed expression '{expression}': {reason}")]
    MalformedExpression { expression: String, reason: String },
    #[error("Malformed figure block: {0}")]
    MalformedBlock(String),
    #[error("No varying dimension in 1D plot. Use AXIS to set the dimension to plot against")]
    MissingVaryingAxis,

    #[error("Variable '{variable}' has unsupported dimension layout ({dims})")]
    UnsupportedLayout { variable: String, dims: String },
    #[error("Variable '{variable}' has no {dimension} dimension")]
    MissingDimension { variable: String, dimension: String },
    #[error("Coordinate axis '{0}' is empty")]
    EmptyAxis(String),
    #[error("Incompatible shapes in expression: {left:?} and {right:?}")]
    IncompatibleShapes { left: Vec<usize>, right: Vec<usize> },
    #[error("Log scale requires a positive colour range, got [{min}, {max}]")]
    InvalidLogRange { min: f64, max: f64 },

    #[error("Dataset error: {0}")]
    Dataset(String),
    #[error("Render error: {0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("Cannot write settings: {0}")]
    SettingsWrite(#[from] toml::ser::Error),
}

impl MarsPlotError {
    /// True for malformed-script errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MarsPlotError::MissingStart
                | MarsPlotError::UnclosedHold { .. }
                | MarsPlotError::DanglingOverlay { .. }
                | MarsPlotError::OverlayWithoutFigure { .. }
                | MarsPlotError::UnknownFigureFamily { .. }
                | MarsPlotError::MalformedHeader { .. }
        )
    }
}

/// Convenience type for `Result<T, MarsPlotError>`.
pub type MarsPlotResult<T> = Result<T, MarsPlotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_errors_are_fatal() {
        assert!(MarsPlotError::MissingStart.is_fatal());
        assert!(MarsPlotError::UnclosedHold { line: 4 }.is_fatal());
        assert!(!MarsPlotError::MissingVaryingAxis.is_fatal());
        assert!(!MarsPlotError::Dataset("no such file".into()).is_fatal());
    }

    #[test]
    fn io_errors_are_scoped_to_a_figure() {
        let error: MarsPlotError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(!error.is_fatal());
    }

    #[test]
    fn missing_start_message_names_marker() {
        let msg = MarsPlotError::MissingStart.to_string();
        assert!(msg.contains("START"));
    }
}
