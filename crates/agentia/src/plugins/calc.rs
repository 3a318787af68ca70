use std::future::ready;
use std::iter::Peekable;
use std::str::CharIndices;

use agentia_core::tool::{self, Tool, ToolResult, parameters_of};
use agentia_core::{Plugin, PluginTools};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

/// Evaluates arithmetic expressions, which models are notoriously bad at.
#[derive(Default)]
pub struct CalculatorPlugin;

impl Plugin for CalculatorPlugin {
    fn name(&self) -> &str {
        "CalculatorPlugin"
    }

    fn register(&self, tools: &mut PluginTools) {
        tools.add(EvaluateTool {
            parameter_schema: parameters_of::<EvaluateParameters>(),
        });
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct EvaluateParameters {
    #[schemars(
        description = "The math expression to evaluate, e.g. `(1 + 2) * 3 ^ 2`."
    )]
    expression: String,
}

struct EvaluateTool {
    parameter_schema: Value,
}

impl Tool for EvaluateTool {
    type Input = EvaluateParameters;

    fn name(&self) -> &str {
        "evaluate"
    }

    fn display_name(&self) -> &str {
        "Calculate"
    }

    fn description(&self) -> &str {
        "Evaluate a math expression and return the result. Supports numbers, \
        parentheses, unary minus and the operators `+ - * / % ^`."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: EvaluateParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let result = evaluate(&input.expression)
            .map(to_json)
            .map_err(|err| tool::Error::execution_error().with_reason(err));
        ready(result)
    }
}

fn to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < (1u64 << 53) as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Evaluates an arithmetic expression.
///
/// Grammar, loosest binding first:
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/' | '%') unary)*
/// unary  := ('+' | '-') unary | power
/// power  := atom ('^' unary)?
/// atom   := number | '(' expr ')'
/// ```
pub(crate) fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = Parser {
        src: expression,
        chars: expression.char_indices().peekable(),
    };
    let value = parser.expr()?;
    parser.skip_whitespace();
    if let Some((pos, c)) = parser.chars.next() {
        return Err(format!("Unexpected `{c}` at position {pos}"));
    }
    if !value.is_finite() {
        return Err("The result is not a finite number".to_owned());
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().map(|&(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err("Division by zero".to_owned());
                }
                value /= rhs;
            } else if self.eat('%') {
                let rhs = self.unary()?;
                if rhs == 0.0 {
                    return Err("Division by zero".to_owned());
                }
                value %= rhs;
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.eat('-') {
            Ok(-self.unary()?)
        } else if self.eat('+') {
            self.unary()
        } else {
            self.power()
        }
    }

    // `-2 ^ 2` is -4 and `2 ^ -1` is 0.5, with `^` right-associative.
    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.eat('^') {
            Ok(base.powf(self.unary()?))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.chars.next();
                let value = self.expr()?;
                if !self.eat(')') {
                    return Err("Missing closing parenthesis".to_owned());
                }
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => {
                let pos = self.chars.peek().map_or(0, |&(pos, _)| pos);
                Err(format!("Unexpected `{c}` at position {pos}"))
            }
            None => Err("Unexpected end of expression".to_owned()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.chars.peek().map_or(self.src.len(), |&(pos, _)| pos);
        let mut end = start;
        while let Some((pos, c)) =
            self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.')
        {
            end = pos + c.len_utf8();
        }
        // Exponent notation, e.g. `1e-3`.
        if let Some((pos, _)) = self.chars.next_if(|(_, c)| matches!(c, 'e' | 'E')) {
            end = pos + 1;
            if let Some((pos, _)) = self.chars.next_if(|(_, c)| matches!(c, '+' | '-')) {
                end = pos + 1;
            }
            while let Some((pos, _)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
                end = pos + 1;
            }
        }
        let literal = &self.src[start..end];
        literal
            .parse()
            .map_err(|_| format!("Invalid number `{literal}`"))
    }
}
