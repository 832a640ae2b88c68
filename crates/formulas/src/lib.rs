//! # Perimeter Formulas
//!
//! Pure perimeter formulas for the nine figures the calculator supports.
//!
//! Every formula validates its inputs first: values must be finite and positive,
//! polygons need at least three whole sides, and triangles must satisfy the full
//! triangle inequality. Results are rounded to two decimals.
//!
//! ## Example
//!
//! ```rust
//! use perimeter_formulas::{calculate, Parameters};
//!
//! let mut params = Parameters::new();
//! params.insert("base".into(), 3.0);
//! params.insert("altura".into(), 4.0);
//!
//! let calc = calculate("rectangulo", params).unwrap();
//! assert_eq!(calc.perimeter, 14.0);
//! ```

mod error;
mod figure;

pub use error::{FormulaError, Result};
pub use figure::{round2, Figure, Parameters};

use serde::Serialize;

/// A validated computation, ready to be recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    pub figure: Figure,
    pub perimeter: f64,
    pub parameters: Parameters,
}

/// Look up a figure by name, `None` for unknown names.
pub fn lookup(name: &str) -> Option<Figure> {
    Figure::from_name(name).ok()
}

/// Resolve `name`, validate `parameters` and compute the perimeter.
pub fn calculate(name: &str, parameters: Parameters) -> Result<Calculation> {
    let figure = Figure::from_name(name)?;
    let perimeter = figure.perimeter(&parameters)?;
    Ok(Calculation {
        figure,
        perimeter,
        parameters,
    })
}
