use thiserror::Error;

/// Result type for formula evaluation
pub type Result<T> = std::result::Result<T, FormulaError>;

/// Errors raised while validating figure parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    /// Parameter values are non-positive or geometrically impossible
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Figure name is not one of the known kinds
    #[error("Unknown figure '{0}'. Valid figures: {valid}", valid = crate::Figure::names().join(", "))]
    UnknownFigure(String),

    /// A required parameter was not supplied
    #[error("Missing parameter '{name}' for figure {figure}")]
    MissingParameter { figure: String, name: String },

    /// A parameter the figure does not take was supplied
    #[error("Unexpected parameter '{name}' for figure {figure}")]
    UnexpectedParameter { figure: String, name: String },
}

impl FormulaError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
