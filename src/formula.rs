//! Manual conversion formula evaluator
//!
//! Grammar: an optional leading operator (`*`, `/`, `+`, `-`; absent means
//! `*`), then a numeric literal, repeated. Evaluation starts at 1.0 and
//! applies the operations left to right, so `"/392*0.917"` means
//! `1.0 / 392.0 * 0.917`. Any other token shape is a hard validation
//! failure, as is a non-finite result.

use crate::error::RateError;

/// Evaluates a manual rate formula.
pub fn evaluate(formula: &str) -> Result<f64, RateError> {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return Err(RateError::invalid_formula(formula, "empty formula"));
    }

    let expr;
    let mut rest = if trimmed.starts_with(['*', '/', '+', '-']) {
        trimmed
    } else {
        expr = format!("*{trimmed}");
        expr.as_str()
    };

    let mut result = 1.0_f64;
    while let Some(op) = rest.chars().next() {
        if !matches!(op, '*' | '/' | '+' | '-') {
            return Err(RateError::invalid_formula(
                formula,
                format!("expected an operator, found {op:?}"),
            ));
        }
        rest = rest[op.len_utf8()..].trim_start();

        let literal_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let literal = &rest[..literal_end];
        let value: f64 = literal.parse().map_err(|_| {
            RateError::invalid_formula(formula, format!("invalid numeric literal {literal:?}"))
        })?;

        result = if op == '*' {
            result * value
        } else if op == '/' {
            result / value
        } else if op == '+' {
            result + value
        } else {
            result - value
        };

        rest = rest[literal_end..].trim_start();
    }

    if !result.is_finite() {
        return Err(RateError::invalid_formula(formula, "non-finite result"));
    }
    Ok(result)
}
