//! Evaluation of expressions against a scene snapshot.

use std::collections::HashMap;

use super::noise::noise;
use super::{AttrPath, BinaryOp, DriverProgram, Expr, UnaryOp};

/// What an expression can see: the clock and attribute values.
pub trait EvalContext {
    fn time(&self) -> f64;

    fn read(&self, path: &AttrPath) -> Option<f64>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("unknown local `${0}`")]
    UnknownVariable(String),
    #[error("attribute `{0}` could not be read")]
    UnresolvedAttribute(AttrPath),
    #[error("division by zero in `{0}`")]
    DivisionByZero(String),
    #[error("expression `{expr}` produced a non-finite value")]
    NonFinite { expr: String },
}

impl Expr {
    /// Evaluates the expression with the given locals in scope.
    pub fn evaluate(&self, ctx: &dyn EvalContext, locals: &HashMap<String, f64>) -> Result<f64, ExprError> {
        let value = match self {
            Self::Const(value) => *value,
            Self::Time => ctx.time(),
            Self::Attr(path) => ctx
                .read(path)
                .ok_or_else(|| ExprError::UnresolvedAttribute(path.clone()))?,
            Self::Var(name) => *locals
                .get(name)
                .ok_or_else(|| ExprError::UnknownVariable(name.clone()))?,
            Self::Unary { op, arg } => {
                let arg = arg.evaluate(ctx, locals)?;
                match op {
                    UnaryOp::Neg => -arg,
                    UnaryOp::Sin => arg.sin(),
                    UnaryOp::Noise => noise(arg),
                }
            }
            Self::Binary { op, lhs, rhs } => {
                let lhs_value = lhs.evaluate(ctx, locals)?;
                let rhs_value = rhs.evaluate(ctx, locals)?;
                match op {
                    BinaryOp::Add => lhs_value + rhs_value,
                    BinaryOp::Sub => lhs_value - rhs_value,
                    BinaryOp::Mul => lhs_value * rhs_value,
                    BinaryOp::Div => {
                        if rhs_value == 0.0 {
                            return Err(ExprError::DivisionByZero(self.to_string()));
                        }
                        lhs_value / rhs_value
                    }
                }
            }
            Self::Clamp { min, max, value } => {
                let lo = min.evaluate(ctx, locals)?;
                let hi = max.evaluate(ctx, locals)?;
                let value = value.evaluate(ctx, locals)?;
                // f64::clamp panics when lo > hi.
                value.max(lo).min(hi)
            }
            Self::SelectSign {
                test,
                non_negative,
                negative,
            } => {
                if test.evaluate(ctx, locals)? >= 0.0 {
                    non_negative.evaluate(ctx, locals)?
                } else {
                    negative.evaluate(ctx, locals)?
                }
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExprError::NonFinite { expr: self.to_string() })
        }
    }
}

impl DriverProgram {
    /// Runs the program once and returns the value for every assignment, in
    /// declaration order.
    pub fn run(&self, ctx: &dyn EvalContext) -> Result<Vec<(AttrPath, f64)>, ExprError> {
        let mut locals = HashMap::with_capacity(self.locals.len());
        for local in &self.locals {
            let value = local.expr.evaluate(ctx, &locals)?;
            locals.insert(local.name.clone(), value);
        }
        self.assignments
            .iter()
            .map(|assignment| {
                assignment
                    .expr
                    .evaluate(ctx, &locals)
                    .map(|value| (assignment.target.clone(), value))
            })
            .collect()
    }
}
