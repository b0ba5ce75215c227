//! Compound expressions over variable references
//!
//! A figure's variable field may combine several references with arithmetic:
//!
//! ```text
//! [atmos_average.ucomp]**2 + [atmos_average.vcomp{lev=50}]**2
//! ```
//!
//! Each `[...]` token is decoded into a [`ReferenceTerm`] and replaced by a positional
//! placeholder `VAR[i]`, giving the formula `VAR[0]**2+VAR[1]**2`. The formula is parsed
//! into a small arithmetic tree and evaluated directly; only numbers, placeholders, the
//! operators `+ - * / **`, parentheses and the functions `sqrt exp log log10 abs sin cos
//! min max mean` are accepted.
//!
//! # Grammar
//!
//! ```text
//! expr    = term (('+' | '-') term)*
//! term    = unary (('*' | '/') unary)*
//! unary   = ('-' | '+') unary | power
//! power   = atom ('**' unary)?
//! atom    = number | 'VAR[' index ']' | function '(' expr ')' | '(' expr ')'
//! ```
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::expression::{CompoundExpression, Value};
//! use marsplot_core::request::Dimension;
//!
//! let expression = CompoundExpression::parse(
//!     "[fixed.zsurf]/(10.**3)",
//!     &[Dimension::Time, Dimension::Level],
//! )
//! .unwrap();
//! assert_eq!(expression.formula, "VAR[0]/(10.**3)");
//! let result = expression.evaluate(&[Value::Scalar(2500.0)]).unwrap();
//! assert_eq!(result, Value::Scalar(2.5));
//! ```

use crate::errors::{MarsPlotError, MarsPlotResult};
use crate::reference::{decode_overrides, DimensionOverride, VariableReference};
use crate::request::Dimension;
use ndarray::{ArrayD, IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// A reference extracted from a compound expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTerm {
    /// The token text, without brackets
    pub text: String,
    pub reference: VariableReference,
    pub overrides: DimensionOverride,
}

impl ReferenceTerm {
    pub fn parse(text: &str, allowed: &[Dimension]) -> MarsPlotResult<Self> {
        let (base, overrides) = decode_overrides(text, allowed)?;
        Ok(Self {
            text: text.to_string(),
            reference: VariableReference::parse(base)?,
            overrides,
        })
    }

    /// The token with its override block removed.
    pub fn base_text(&self) -> String {
        match self.text.find('{') {
            Some(open) => self.text[..open].to_string(),
            None => self.text.clone(),
        }
    }
}

/// A derived field: references combined through a formula.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundExpression {
    pub raw_text: String,
    pub references: Vec<ReferenceTerm>,
    /// `raw_text` with whitespace removed and every token replaced by `VAR[i]`
    pub formula: String,
    tree: Expr,
}

impl CompoundExpression {
    /// Parses a variable field. Text without brackets is a single reference.
    ///
    /// `allowed` lists the dimensions override blocks may set.
    pub fn parse(raw: &str, allowed: &[Dimension]) -> MarsPlotResult<Self> {
        let (tokens, formula) = extract_references(raw)?;
        let references = tokens
            .iter()
            .map(|token| ReferenceTerm::parse(token, allowed))
            .collect::<MarsPlotResult<Vec<_>>>()?;
        let tree = Expr::parse(&formula).map_err(|reason| MarsPlotError::MalformedExpression {
            expression: raw.to_string(),
            reason,
        })?;
        if let Some(index) = tree.max_placeholder() {
            if index >= references.len() {
                return Err(MarsPlotError::MalformedExpression {
                    expression: raw.to_string(),
                    reason: format!("VAR[{index}] does not name a reference"),
                });
            }
        }
        Ok(Self {
            raw_text: raw.trim().to_string(),
            references,
            formula,
            tree,
        })
    }

    /// True when the text combines bracketed references.
    pub fn is_compound(&self) -> bool {
        self.raw_text.contains('[')
    }

    /// Applies the formula to the resolved value of each reference, in order.
    pub fn evaluate(&self, values: &[Value]) -> MarsPlotResult<Value> {
        self.tree.evaluate(values)
    }
}

/// Splits bracketed tokens out of a compound string.
///
/// Whitespace is dropped first. Every token, repeated or not, gets its own placeholder in
/// left-to-right order.
pub fn extract_references(raw: &str) -> MarsPlotResult<(Vec<String>, String)> {
    let text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return Err(MarsPlotError::MalformedExpression {
            expression: raw.to_string(),
            reason: "empty variable".to_string(),
        });
    }
    if !text.contains('[') && !text.contains(']') {
        return Ok((vec![text], "VAR[0]".to_string()));
    }

    let mut tokens = Vec::new();
    let mut formula = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(open) = rest.find(['[', ']']) {
        if rest[open..].starts_with(']') {
            return Err(MarsPlotError::MalformedExpression {
                expression: raw.to_string(),
                reason: "']' without matching '['".to_string(),
            });
        }
        formula.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find(']')
            .filter(|&close| !after[..close].contains('['))
            .ok_or_else(|| MarsPlotError::MalformedExpression {
                expression: raw.to_string(),
                reason: "'[' without matching ']'".to_string(),
            })?;
        formula.push_str(&format!("VAR[{}]", tokens.len()));
        tokens.push(after[..close].to_string());
        rest = &after[close + 1..];
    }
    formula.push_str(rest);
    Ok((tokens, formula))
}

/// An evaluated quantity: a scalar or a gridded field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array(ArrayD<f64>),
}

impl Value {
    fn map(self, f: impl Fn(f64) -> f64) -> Value {
        match self {
            Value::Scalar(x) => Value::Scalar(f(x)),
            Value::Array(a) => Value::Array(a.mapv(f)),
        }
    }

    fn values(&self) -> Vec<f64> {
        match self {
            Value::Scalar(x) => vec![*x],
            Value::Array(a) => a.iter().copied().collect(),
        }
    }

    /// Converts to an array, broadcasting scalars to `shape`.
    pub fn into_array(self, shape: &[usize]) -> ArrayD<f64> {
        match self {
            Value::Scalar(x) => ArrayD::from_elem(IxDyn(shape), x),
            Value::Array(a) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Function {
    Sqrt,
    Exp,
    Log,
    Log10,
    Abs,
    Sin,
    Cos,
    Min,
    Max,
    Mean,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        let name = name.strip_prefix("np.").unwrap_or(name);
        Some(match name {
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "log" => Function::Log,
            "log10" => Function::Log10,
            "abs" => Function::Abs,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "min" => Function::Min,
            "max" => Function::Max,
            "mean" => Function::Mean,
            _ => return None,
        })
    }

    fn apply(&self, value: Value) -> Value {
        match self {
            Function::Sqrt => value.map(f64::sqrt),
            Function::Exp => value.map(f64::exp),
            Function::Log => value.map(f64::ln),
            Function::Log10 => value.map(f64::log10),
            Function::Abs => value.map(f64::abs),
            Function::Sin => value.map(f64::sin),
            Function::Cos => value.map(f64::cos),
            Function::Min => Value::Scalar(
                value
                    .values()
                    .into_iter()
                    .filter(|x| !x.is_nan())
                    .fold(f64::NAN, f64::min),
            ),
            Function::Max => Value::Scalar(
                value
                    .values()
                    .into_iter()
                    .filter(|x| !x.is_nan())
                    .fold(f64::NAN, f64::max),
            ),
            Function::Mean => {
                let finite: Vec<f64> = value.values().into_iter().filter(|x| !x.is_nan()).collect();
                if finite.is_empty() {
                    Value::Scalar(f64::NAN)
                } else {
                    Value::Scalar(finite.iter().sum::<f64>() / finite.len() as f64)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Var(usize),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    fn parse(formula: &str) -> Result<Expr, String> {
        let mut parser = FormulaParser::new(formula);
        let expr = parser.parse_expression()?;
        if let Some(c) = parser.peek() {
            return Err(format!("unexpected '{c}' at position {}", parser.pos));
        }
        Ok(expr)
    }

    fn max_placeholder(&self) -> Option<usize> {
        match self {
            Expr::Number(_) => None,
            Expr::Var(i) => Some(*i),
            Expr::Neg(inner) | Expr::Call(_, inner) => inner.max_placeholder(),
            Expr::Binary(_, lhs, rhs) => lhs.max_placeholder().max(rhs.max_placeholder()),
        }
    }

    fn evaluate(&self, vars: &[Value]) -> MarsPlotResult<Value> {
        match self {
            Expr::Number(x) => Ok(Value::Scalar(*x)),
            Expr::Var(i) => vars
                .get(*i)
                .cloned()
                .ok_or_else(|| MarsPlotError::Error(format!("VAR[{i}] has no value"))),
            Expr::Neg(inner) => Ok(inner.evaluate(vars)?.map(|x| -x)),
            Expr::Call(function, inner) => Ok(function.apply(inner.evaluate(vars)?)),
            Expr::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(vars)?;
                let rhs = rhs.evaluate(vars)?;
                let op = *op;
                match (lhs, rhs) {
                    (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(op.apply(a, b))),
                    (Value::Scalar(a), Value::Array(b)) => {
                        Ok(Value::Array(b.mapv(|y| op.apply(a, y))))
                    }
                    (Value::Array(a), Value::Scalar(b)) => {
                        Ok(Value::Array(a.mapv(|x| op.apply(x, b))))
                    }
                    (Value::Array(a), Value::Array(b)) => {
                        if a.shape() != b.shape() {
                            return Err(MarsPlotError::IncompatibleShapes {
                                left: a.shape().to_vec(),
                                right: b.shape().to_vec(),
                            });
                        }
                        Ok(Value::Array(
                            Zip::from(&a).and(&b).map_collect(|&x, &y| op.apply(x, y)),
                        ))
                    }
                }
            }
        }
    }
}

struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.peek() == Some(c) {
            self.advance();
            Ok(())
        } else {
            Err(format!("expected '{c}' at position {}", self.pos))
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.starts_with("**") {
                break;
            } else {
                match self.peek() {
                    Some('*') => BinaryOp::Mul,
                    Some('/') => BinaryOp::Div,
                    _ => break,
                }
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some('-') => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some('+') => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_atom()?;
        if self.starts_with("**") {
            self.advance();
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some('(') => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.parse_identifier();
                if name == "VAR" {
                    self.expect('[')?;
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.advance();
                    }
                    let index = self.input[start..self.pos]
                        .parse::<usize>()
                        .map_err(|_| format!("expected placeholder index at position {start}"))?;
                    self.expect(']')?;
                    return Ok(Expr::Var(index));
                }
                let function =
                    Function::lookup(&name).ok_or_else(|| format!("unknown function '{name}'"))?;
                self.expect('(')?;
                let argument = self.parse_expression()?;
                self.expect(')')?;
                Ok(Expr::Call(function, Box::new(argument)))
            }
            Some(c) => Err(format!("unexpected '{c}' at position {}", self.pos)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_number(&mut self) -> Result<Expr, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(Expr::Number)
            .map_err(|_| format!("invalid number '{text}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    const DIMS: [Dimension; 2] = [Dimension::Time, Dimension::Level];

    fn eval(formula: &str, vars: &[Value]) -> Value {
        Expr::parse(formula).unwrap().evaluate(vars).unwrap()
    }

    fn scalar(formula: &str) -> f64 {
        match eval(formula, &[]) {
            Value::Scalar(x) => x,
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn extraction_preserves_order() {
        let (tokens, formula) =
            extract_references("[atmos_average.ucomp]**2 + [atmos_average.vcomp {lev=50}]**2")
                .unwrap();
        assert_eq!(
            tokens,
            vec!["atmos_average.ucomp", "atmos_average.vcomp{lev=50}"]
        );
        assert_eq!(formula, "VAR[0]**2+VAR[1]**2");
        assert_eq!(formula.matches("VAR[").count(), tokens.len());
    }

    #[test]
    fn repeated_tokens_get_their_own_placeholder() {
        let (tokens, formula) = extract_references("[a.t{lev=10}]-[a.t]+[a.t]").unwrap();
        assert_eq!(tokens, vec!["a.t{lev=10}", "a.t", "a.t"]);
        assert_eq!(formula, "VAR[0]-VAR[1]+VAR[2]");
    }

    #[test]
    fn plain_reference_is_a_single_term() {
        let (tokens, formula) = extract_references(" atmos_average.temp{lev=10} ").unwrap();
        assert_eq!(tokens, vec!["atmos_average.temp{lev=10}"]);
        assert_eq!(formula, "VAR[0]");
    }

    #[test]
    fn unbalanced_brackets() {
        assert!(extract_references("[a.b").is_err());
        assert!(extract_references("a.b]").is_err());
        assert!(extract_references("[a.[b]]").is_err());
        assert!(extract_references("  ").is_err());
    }

    #[test]
    fn precedence() {
        assert_eq!(scalar("1+2*3"), 7.0);
        assert_eq!(scalar("(1+2)*3"), 9.0);
        assert_eq!(scalar("-2**2"), -4.0);
        assert_eq!(scalar("2**3**2"), 512.0);
        assert_eq!(scalar("8/2/2"), 2.0);
        assert_eq!(scalar("10.**3"), 1000.0);
        assert_eq!(scalar("1e-3*2E3"), 2.0);
    }

    #[test]
    fn functions() {
        assert_eq!(scalar("sqrt(16)"), 4.0);
        assert!((scalar("log10(1000)") - 3.0).abs() < 1e-12);
        assert_eq!(scalar("abs(-3)"), 3.0);
        assert_eq!(scalar("np.exp(0)"), 1.0);
    }

    #[test]
    fn arbitrary_names_are_rejected() {
        assert!(Expr::parse("__import__(1)").is_err());
        assert!(Expr::parse("open(VAR[0])").is_err());
        assert!(Expr::parse("VAR[0];1").is_err());
    }

    #[test]
    fn arrays_combine_elementwise() {
        let u = Value::Array(arr1(&[3.0, 0.0]).into_dyn());
        let v = Value::Array(arr1(&[4.0, 2.0]).into_dyn());
        let speed = eval("sqrt(VAR[0]**2+VAR[1]**2)", &[u, v]);
        assert_eq!(speed, Value::Array(arr1(&[5.0, 2.0]).into_dyn()));
    }

    #[test]
    fn reductions_return_scalars() {
        let field = Value::Array(arr1(&[1.0, f64::NAN, 5.0]).into_dyn());
        assert_eq!(eval("max(VAR[0])", &[field.clone()]), Value::Scalar(5.0));
        assert_eq!(eval("min(VAR[0])", &[field.clone()]), Value::Scalar(1.0));
        assert_eq!(eval("mean(VAR[0])", &[field]), Value::Scalar(3.0));
    }

    #[test]
    fn anomaly_broadcasts_scalar() {
        let field = Value::Array(arr1(&[1.0, 2.0, 3.0]).into_dyn());
        let anomaly = eval("VAR[0]-mean(VAR[0])", &[field]);
        assert_eq!(anomaly, Value::Array(arr1(&[-1.0, 0.0, 1.0]).into_dyn()));
    }

    #[test]
    fn mismatched_shapes_fail() {
        let a = Value::Array(ArrayD::zeros(IxDyn(&[2, 3])));
        let b = Value::Array(ArrayD::zeros(IxDyn(&[3, 2])));
        let result = Expr::parse("VAR[0]+VAR[1]").unwrap().evaluate(&[a, b]);
        assert!(matches!(
            result,
            Err(MarsPlotError::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn compound_expression_decodes_references() {
        let expression = CompoundExpression::parse(
            "[00350.atmos_average@2.temp{lev=50}] - [atmos_average.temp]",
            &DIMS,
        )
        .unwrap();
        assert!(expression.is_compound());
        assert_eq!(expression.references.len(), 2);
        assert_eq!(expression.references[0].reference.timestamp, Some(350));
        assert_eq!(expression.references[0].reference.simulation_index, 1);
        assert!(!expression.references[0].overrides.is_empty());
        assert_eq!(
            expression.references[0].base_text(),
            "00350.atmos_average@2.temp"
        );
        assert!(expression.references[1].overrides.is_empty());
    }

    #[test]
    fn malformed_reference_inside_expression() {
        let result = CompoundExpression::parse("[zsurf]*2", &DIMS);
        assert!(matches!(
            result,
            Err(MarsPlotError::MalformedReference { .. })
        ));
    }
}
