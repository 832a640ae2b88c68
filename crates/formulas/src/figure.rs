use crate::error::{FormulaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt;

/// Named numeric inputs of a formula, keyed by parameter name
pub type Parameters = BTreeMap<String, f64>;

/// The nine supported plane figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Figure {
    Cuadrado,
    Rectangulo,
    Trapecio,
    Circulo,
    PoligonoRegular,
    TrianguloEquilatero,
    TrianguloIsosceles,
    TrianguloEscaleno,
    TrianguloRectangulo,
}

impl Figure {
    /// Menu order
    pub const ALL: [Figure; 9] = [
        Figure::Cuadrado,
        Figure::Rectangulo,
        Figure::Trapecio,
        Figure::Circulo,
        Figure::PoligonoRegular,
        Figure::TrianguloEquilatero,
        Figure::TrianguloIsosceles,
        Figure::TrianguloEscaleno,
        Figure::TrianguloRectangulo,
    ];

    /// Identifier persisted in the history file
    pub fn as_str(self) -> &'static str {
        match self {
            Figure::Cuadrado => "cuadrado",
            Figure::Rectangulo => "rectangulo",
            Figure::Trapecio => "trapecio",
            Figure::Circulo => "circulo",
            Figure::PoligonoRegular => "poligono_regular",
            Figure::TrianguloEquilatero => "triangulo_equilatero",
            Figure::TrianguloIsosceles => "triangulo_isosceles",
            Figure::TrianguloEscaleno => "triangulo_escaleno",
            Figure::TrianguloRectangulo => "triangulo_rectangulo",
        }
    }

    /// Human label used by the menu
    pub fn label(self) -> &'static str {
        match self {
            Figure::Cuadrado => "Square",
            Figure::Rectangulo => "Rectangle",
            Figure::Trapecio => "Isosceles trapezoid",
            Figure::Circulo => "Circle",
            Figure::PoligonoRegular => "Regular polygon",
            Figure::TrianguloEquilatero => "Equilateral triangle",
            Figure::TrianguloIsosceles => "Isosceles triangle",
            Figure::TrianguloEscaleno => "Scalene triangle",
            Figure::TrianguloRectangulo => "Right triangle",
        }
    }

    /// Parameter names in prompt order
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            Figure::Cuadrado => &["lado"],
            Figure::Rectangulo => &["base", "altura"],
            Figure::Trapecio => &["base_mayor", "base_menor", "lado"],
            Figure::Circulo => &["radio"],
            Figure::PoligonoRegular => &["num_lados", "lado"],
            Figure::TrianguloEquilatero => &["lado"],
            Figure::TrianguloIsosceles => &["lados_iguales", "lado"],
            Figure::TrianguloEscaleno => &["lado_1", "lado_2", "lado_3"],
            Figure::TrianguloRectangulo => &["cateto_1", "cateto_2"],
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.as_str()).collect()
    }

    /// Parse a figure identifier. Case and surrounding whitespace are ignored and a
    /// space may stand in for an underscore (`"Poligono Regular"`).
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase().replace(' ', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| FormulaError::UnknownFigure(name.trim().to_string()))
    }

    /// Validate `params` and compute the perimeter rounded to two decimals.
    pub fn perimeter(self, params: &Parameters) -> Result<f64> {
        self.check_parameter_set(params)?;
        let get = |name: &str| params.get(name).copied().unwrap_or_default();

        let raw = match self {
            Figure::Cuadrado => {
                let lado = positive(get("lado"), "The side")?;
                4.0 * lado
            }
            Figure::Rectangulo => {
                let base = positive(get("base"), "The base")?;
                let altura = positive(get("altura"), "The height")?;
                2.0 * (base + altura)
            }
            Figure::Trapecio => {
                let base_mayor = positive(get("base_mayor"), "The major base")?;
                let base_menor = positive(get("base_menor"), "The minor base")?;
                let lado = positive(get("lado"), "The leg")?;
                base_mayor + base_menor + 2.0 * lado
            }
            Figure::Circulo => {
                let radio = positive(get("radio"), "The radius")?;
                2.0 * PI * radio
            }
            Figure::PoligonoRegular => {
                let num_lados = get("num_lados");
                if num_lados.fract() != 0.0 {
                    return Err(FormulaError::invalid(
                        "The number of sides must be a whole number",
                    ));
                }
                if num_lados < 3.0 {
                    return Err(FormulaError::invalid(
                        "A polygon must have at least 3 sides",
                    ));
                }
                let lado = positive(get("lado"), "The side")?;
                num_lados * lado
            }
            Figure::TrianguloEquilatero => {
                let lado = positive(get("lado"), "The side")?;
                3.0 * lado
            }
            Figure::TrianguloIsosceles => {
                let iguales = positive(get("lados_iguales"), "The equal sides")?;
                let lado = positive(get("lado"), "The base side")?;
                check_triangle(iguales, iguales, lado)?;
                2.0 * iguales + lado
            }
            Figure::TrianguloEscaleno => {
                let a = positive(get("lado_1"), "Side 1")?;
                let b = positive(get("lado_2"), "Side 2")?;
                let c = positive(get("lado_3"), "Side 3")?;
                check_triangle(a, b, c)?;
                a + b + c
            }
            Figure::TrianguloRectangulo => {
                let a = positive(get("cateto_1"), "Leg 1")?;
                let b = positive(get("cateto_2"), "Leg 2")?;
                a + b + a.hypot(b)
            }
        };

        if !raw.is_finite() {
            return Err(FormulaError::invalid(format!(
                "The {} perimeter is too large to represent",
                self.label().to_lowercase()
            )));
        }
        Ok(round2(raw))
    }

    fn check_parameter_set(self, params: &Parameters) -> Result<()> {
        let expected = self.parameter_names();
        if let Some(name) = expected.iter().find(|name| !params.contains_key(**name)) {
            return Err(FormulaError::MissingParameter {
                figure: self.as_str().to_string(),
                name: (*name).to_string(),
            });
        }
        if let Some(name) = params.keys().find(|k| !expected.contains(&k.as_str())) {
            return Err(FormulaError::UnexpectedParameter {
                figure: self.as_str().to_string(),
                name: name.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Figure {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

fn positive(value: f64, what: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(FormulaError::invalid(format!(
            "{what} must be greater than zero"
        )));
    }
    Ok(value)
}

fn check_triangle(a: f64, b: f64, c: f64) -> Result<()> {
    if a + b > c && b + c > a && a + c > b {
        Ok(())
    } else {
        Err(FormulaError::invalid(
            "The sides do not satisfy the triangle inequality",
        ))
    }
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
