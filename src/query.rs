// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A small arithmetic/boolean expression language over image-parameter
//! fields, used to select telescopes for the stereo combination.
//!
//! Operators, loosest to tightest: `||`, `&&`, comparisons
//! (`< <= > >= == !=`), `+ -`, `* /`, unary `! -`. Comparisons yield 1.0 or
//! 0.0 and anything non-zero is true. Comparisons against NaN are false, so
//! unparametrized images never pass a cut.

use thiserror::Error;

use crate::event::ImageParameters;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Bad number '{string}' at position {position}")]
    BadNumber { string: String, position: usize },

    #[error("Unexpected token at position {0}")]
    UnexpectedToken(usize),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Expected a closing parenthesis at position {0}")]
    UnbalancedParenthesis(usize),

    #[error("The query configuration must be a string or a map of label to expression")]
    BadConfig,
}

/// The image-parameter fields an expression may reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Variable {
    HillasX,
    HillasY,
    HillasLength,
    HillasWidth,
    HillasPsi,
    HillasPhi,
    HillasR,
    HillasIntensity,
    HillasSkewness,
    HillasKurtosis,
    LeakagePixelsWidth1,
    LeakagePixelsWidth2,
    LeakageIntensityWidth1,
    LeakageIntensityWidth2,
    ConcentrationCog,
    ConcentrationCore,
    ConcentrationPixel,
    MorphologyNPixels,
    MorphologyNIslands,
    IntensityMax,
    IntensityMean,
    IntensityStd,
    ExtraMiss,
    ExtraDisp,
    ExtraTheta,
}

impl Variable {
    fn from_name(name: &str) -> Option<Variable> {
        Some(match name {
            "hillas_x" => Variable::HillasX,
            "hillas_y" => Variable::HillasY,
            "hillas_length" => Variable::HillasLength,
            "hillas_width" => Variable::HillasWidth,
            "hillas_psi" => Variable::HillasPsi,
            "hillas_phi" => Variable::HillasPhi,
            "hillas_r" => Variable::HillasR,
            "hillas_intensity" => Variable::HillasIntensity,
            "hillas_skewness" => Variable::HillasSkewness,
            "hillas_kurtosis" => Variable::HillasKurtosis,
            "leakage_pixels_width_1" => Variable::LeakagePixelsWidth1,
            "leakage_pixels_width_2" => Variable::LeakagePixelsWidth2,
            "leakage_intensity_width_1" => Variable::LeakageIntensityWidth1,
            "leakage_intensity_width_2" => Variable::LeakageIntensityWidth2,
            "concentration_cog" => Variable::ConcentrationCog,
            "concentration_core" => Variable::ConcentrationCore,
            "concentration_pixel" => Variable::ConcentrationPixel,
            "morphology_n_pixels" => Variable::MorphologyNPixels,
            "morphology_n_islands" => Variable::MorphologyNIslands,
            "intensity_max" => Variable::IntensityMax,
            "intensity_mean" => Variable::IntensityMean,
            "intensity_std" => Variable::IntensityStd,
            "extra_miss" => Variable::ExtraMiss,
            "extra_disp" => Variable::ExtraDisp,
            "extra_theta" => Variable::ExtraTheta,
            _ => return None,
        })
    }

    fn value(self, p: &ImageParameters) -> f64 {
        match self {
            Variable::HillasX => p.hillas.x,
            Variable::HillasY => p.hillas.y,
            Variable::HillasLength => p.hillas.length,
            Variable::HillasWidth => p.hillas.width,
            Variable::HillasPsi => p.hillas.psi,
            Variable::HillasPhi => p.hillas.phi,
            Variable::HillasR => p.hillas.r,
            Variable::HillasIntensity => p.hillas.intensity,
            Variable::HillasSkewness => p.hillas.skewness,
            Variable::HillasKurtosis => p.hillas.kurtosis,
            Variable::LeakagePixelsWidth1 => p.leakage.pixels_width_1,
            Variable::LeakagePixelsWidth2 => p.leakage.pixels_width_2,
            Variable::LeakageIntensityWidth1 => p.leakage.intensity_width_1,
            Variable::LeakageIntensityWidth2 => p.leakage.intensity_width_2,
            Variable::ConcentrationCog => p.concentration.cog,
            Variable::ConcentrationCore => p.concentration.core,
            Variable::ConcentrationPixel => p.concentration.pixel,
            Variable::MorphologyNPixels => p.morphology.n_pixels as f64,
            Variable::MorphologyNIslands => p.morphology.n_islands as f64,
            Variable::IntensityMax => p.intensity.intensity_max,
            Variable::IntensityMean => p.intensity.intensity_mean,
            Variable::IntensityStd => p.intensity.intensity_std,
            Variable::ExtraMiss => p.extra.miss,
            Variable::ExtraDisp => p.extra.disp,
            Variable::ExtraTheta => p.extra.theta,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Clone, Debug)]
enum Expr {
    Number(f64),
    Var(Variable),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn eval(&self, p: &ImageParameters) -> f64 {
        match self {
            Expr::Number(v) => *v,
            Expr::Var(var) => var.value(p),
            Expr::Neg(e) => -e.eval(p),
            Expr::Not(e) => bool_to_f64(e.eval(p) == 0.0),
            Expr::Binary(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(p), rhs.eval(p));
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Lt => bool_to_f64(a < b),
                    BinOp::Le => bool_to_f64(a <= b),
                    BinOp::Gt => bool_to_f64(a > b),
                    BinOp::Ge => bool_to_f64(a >= b),
                    BinOp::Eq => bool_to_f64(a == b),
                    BinOp::Ne => bool_to_f64(a != b),
                    BinOp::And => bool_to_f64(a != 0.0 && b != 0.0),
                    BinOp::Or => bool_to_f64(a != 0.0 || b != 0.0),
                }
            }
        }
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Var(Variable),
    Op(BinOp),
    Bang,
    Minus,
    Plus,
    LeftParen,
    RightParen,
}

fn tokenize(expr: &str) -> Result<Vec<(usize, Token)>, QueryError> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push((i, Token::LeftParen));
                i += 1;
            }
            ')' => {
                tokens.push((i, Token::RightParen));
                i += 1;
            }
            '+' => {
                tokens.push((i, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((i, Token::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((i, Token::Op(BinOp::Mul)));
                i += 1;
            }
            '/' => {
                tokens.push((i, Token::Op(BinOp::Div)));
                i += 1;
            }
            '<' | '>' | '=' | '!' | '&' | '|' => {
                let two = expr.get(i..(i + 2).min(expr.len())).unwrap_or("");
                let (token, advance) = match two {
                    "<=" => (Token::Op(BinOp::Le), 2),
                    ">=" => (Token::Op(BinOp::Ge), 2),
                    "==" => (Token::Op(BinOp::Eq), 2),
                    "!=" => (Token::Op(BinOp::Ne), 2),
                    "&&" => (Token::Op(BinOp::And), 2),
                    "||" => (Token::Op(BinOp::Or), 2),
                    _ => match c {
                        '<' => (Token::Op(BinOp::Lt), 1),
                        '>' => (Token::Op(BinOp::Gt), 1),
                        '!' => (Token::Bang, 1),
                        _ => {
                            return Err(QueryError::UnexpectedCharacter {
                                character: c,
                                position: i,
                            })
                        }
                    },
                };
                tokens.push((i, token));
                i += advance;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit()
                        || bytes[i] == b'.'
                        || bytes[i] == b'e'
                        || bytes[i] == b'E'
                        || ((bytes[i] == b'+' || bytes[i] == b'-')
                            && matches!(bytes[i - 1], b'e' | b'E')))
                {
                    i += 1;
                }
                let text = &expr[start..i];
                let value = text.parse().map_err(|_| QueryError::BadNumber {
                    string: text.to_string(),
                    position: start,
                })?;
                tokens.push((start, Token::Number(value)));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let name = &expr[start..i];
                let var = Variable::from_name(name)
                    .ok_or_else(|| QueryError::UnknownVariable(name.to_string()))?;
                tokens.push((start, Token::Var(var)));
            }
            other => {
                return Err(QueryError::UnexpectedCharacter {
                    character: other,
                    position: i,
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(usize, Token)],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<&(usize, Token)> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Op(BinOp::Or)) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_comparison()?;
        while self.peek() == Some(&Token::Op(BinOp::And)) {
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, QueryError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Op(
                op @ (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne),
            )) => *op,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op @ (BinOp::Mul | BinOp::Div))) => *op,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Bang) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, QueryError> {
        match self.next() {
            Some((_, Token::Number(v))) => Ok(Expr::Number(*v)),
            Some((_, Token::Var(var))) => Ok(Expr::Var(*var)),
            Some((pos, Token::LeftParen)) => {
                let pos = *pos;
                let inner = self.parse_or()?;
                match self.next() {
                    Some((_, Token::RightParen)) => Ok(inner),
                    _ => Err(QueryError::UnbalancedParenthesis(pos)),
                }
            }
            Some((pos, _)) => Err(QueryError::UnexpectedToken(*pos)),
            None => Err(QueryError::UnexpectedEnd),
        }
    }
}

fn parse_expression(expr: &str) -> Result<Expr, QueryError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let parsed = parser.parse_or()?;
    match parser.tokens.get(parser.pos) {
        Some((pos, _)) => Err(QueryError::UnexpectedToken(*pos)),
        None => Ok(parsed),
    }
}

/// A compiled telescope-selection predicate: the conjunction of one or more
/// labelled expressions.
#[derive(Clone, Debug, Default)]
pub struct ImageQuery {
    expressions: Vec<(String, Expr)>,
}

impl ImageQuery {
    /// Compile a single expression.
    pub fn from_expr(expr: &str) -> Result<ImageQuery, QueryError> {
        Ok(ImageQuery {
            expressions: vec![(expr.to_string(), parse_expression(expr)?)],
        })
    }

    /// Build from configuration: either a single expression string, or a map
    /// from label to expression whose conjunction is used.
    pub fn from_config(config: &serde_json::Value) -> Result<ImageQuery, QueryError> {
        match config {
            serde_json::Value::String(expr) => ImageQuery::from_expr(expr),
            serde_json::Value::Object(map) => {
                let mut expressions = Vec::with_capacity(map.len());
                for (label, value) in map {
                    let expr = value.as_str().ok_or(QueryError::BadConfig)?;
                    expressions.push((label.clone(), parse_expression(expr)?));
                }
                Ok(ImageQuery { expressions })
            }
            _ => Err(QueryError::BadConfig),
        }
    }

    /// True when every expression evaluates truthy for these parameters.
    pub fn evaluate(&self, parameters: &ImageParameters) -> bool {
        self.expressions
            .iter()
            .all(|(_, expr)| expr.eval(parameters) != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ImageParameters;

    fn params(intensity: f64, length: f64) -> ImageParameters {
        let mut p = ImageParameters::default();
        p.hillas.intensity = intensity;
        p.hillas.length = length;
        p
    }

    #[test]
    fn intensity_and_length_cut() {
        let q = ImageQuery::from_expr("hillas_intensity > 100 && hillas_length > 0").unwrap();
        assert!(!q.evaluate(&params(99.0, 1.0)));
        assert!(!q.evaluate(&params(101.0, -1.0)));
        assert!(q.evaluate(&params(101.0, 1.0)));
    }

    #[test]
    fn arithmetic_and_precedence() {
        let q = ImageQuery::from_expr("hillas_intensity * 2 + 1 > 7").unwrap();
        assert!(q.evaluate(&params(4.0, 0.0)));
        assert!(!q.evaluate(&params(3.0, 0.0)));

        let q = ImageQuery::from_expr("!(hillas_length > 1) || hillas_intensity >= 10").unwrap();
        assert!(q.evaluate(&params(0.0, 0.5)));
        assert!(q.evaluate(&params(10.0, 2.0)));
        assert!(!q.evaluate(&params(9.0, 2.0)));
    }

    #[test]
    fn map_config_is_a_conjunction() {
        let config = serde_json::json!({
            "intensity": "hillas_intensity > 100",
            "shape": "hillas_length > 0",
        });
        let q = ImageQuery::from_config(&config).unwrap();
        assert!(q.evaluate(&params(101.0, 1.0)));
        assert!(!q.evaluate(&params(101.0, -1.0)));
    }

    #[test]
    fn nan_comparisons_are_false() {
        let q = ImageQuery::from_expr("hillas_length > 0").unwrap();
        assert!(!q.evaluate(&params(10.0, f64::NAN)));
        let q = ImageQuery::from_expr("!(hillas_length > 0)").unwrap();
        assert!(q.evaluate(&params(10.0, f64::NAN)));
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            ImageQuery::from_expr("bogus_variable > 1"),
            Err(QueryError::UnknownVariable(_))
        ));
        assert!(ImageQuery::from_expr("hillas_intensity >").is_err());
        assert!(ImageQuery::from_expr("(hillas_intensity > 1").is_err());
        assert!(ImageQuery::from_expr("hillas_intensity # 1").is_err());
    }

    #[test]
    fn scientific_notation() {
        let q = ImageQuery::from_expr("hillas_intensity > 1e2").unwrap();
        assert!(q.evaluate(&params(150.0, 0.0)));
        assert!(!q.evaluate(&params(50.0, 0.0)));
    }
}
