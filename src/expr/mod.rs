//! Typed driver expressions.
//!
//! A [`DriverProgram`] is a list of named locals followed by assignments to
//! scene attributes. Programs are evaluated per frame through
//! [`DriverProgram::run`] and rendered to a canonical formula text with
//! `Display`, which is what gets compared when checking that a recompile is
//! a no-op.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

mod eval;
pub mod noise;

pub use eval::{EvalContext, ExprError};

/// `node.attr` reference read or written by an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrPath {
    pub node: String,
    pub attr: String,
}

impl AttrPath {
    #[must_use]
    pub fn new(node: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attr: attr.into(),
        }
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Sin,
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    const fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    /// Scene time in seconds.
    Time,
    Attr(AttrPath),
    /// Read of a local declared earlier in the same program.
    Var(String),
    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `value` clamped to `[min, max]`.
    Clamp {
        min: Box<Expr>,
        max: Box<Expr>,
        value: Box<Expr>,
    },
    /// `non_negative` when `test >= 0`, otherwise `negative`.
    SelectSign {
        test: Box<Expr>,
        non_negative: Box<Expr>,
        negative: Box<Expr>,
    },
}

impl Expr {
    #[must_use]
    pub const fn constant(value: f64) -> Self {
        Self::Const(value)
    }

    #[must_use]
    pub fn attr(node: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::Attr(AttrPath::new(node, attr))
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    #[must_use]
    pub fn sin(arg: Self) -> Self {
        Self::Unary {
            op: UnaryOp::Sin,
            arg: Box::new(arg),
        }
    }

    #[must_use]
    pub fn noise(arg: Self) -> Self {
        Self::Unary {
            op: UnaryOp::Noise,
            arg: Box::new(arg),
        }
    }

    #[must_use]
    pub fn clamp(min: Self, max: Self, value: Self) -> Self {
        Self::Clamp {
            min: Box::new(min),
            max: Box::new(max),
            value: Box::new(value),
        }
    }

    #[must_use]
    pub fn select_sign(test: Self, non_negative: Self, negative: Self) -> Self {
        Self::SelectSign {
            test: Box::new(test),
            non_negative: Box::new(non_negative),
            negative: Box::new(negative),
        }
    }

    fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Collects every attribute this expression reads.
    pub fn collect_reads<'a>(&'a self, out: &mut BTreeSet<&'a AttrPath>) {
        match self {
            Self::Const(_) | Self::Time | Self::Var(_) => {}
            Self::Attr(path) => {
                out.insert(path);
            }
            Self::Unary { arg, .. } => arg.collect_reads(out),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_reads(out);
                rhs.collect_reads(out);
            }
            Self::Clamp { min, max, value } => {
                min.collect_reads(out);
                max.collect_reads(out);
                value.collect_reads(out);
            }
            Self::SelectSign {
                test,
                non_negative,
                negative,
            } => {
                test.collect_reads(out);
                non_negative.collect_reads(out);
                negative.collect_reads(out);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Binary { op, .. } => op.precedence(),
            Self::Unary { op: UnaryOp::Neg, .. } => 3,
            Self::Const(value) if *value < 0.0 => 3,
            _ => 4,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn fmt_number(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        write!(f, "{value:.0}")
    } else {
        write!(f, "{value}")
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(value) => fmt_number(f, *value),
            Self::Time => f.write_str("time"),
            Self::Attr(path) => write!(f, "{path}"),
            Self::Var(name) => write!(f, "${name}"),
            Self::Unary { op: UnaryOp::Neg, arg } => {
                f.write_str("-")?;
                arg.fmt_child(f, arg.precedence() < 4)
            }
            Self::Unary { op: UnaryOp::Sin, arg } => write!(f, "sin({arg})"),
            Self::Unary { op: UnaryOp::Noise, arg } => write!(f, "noise({arg})"),
            Self::Binary { op, lhs, rhs } => {
                let own = op.precedence();
                lhs.fmt_child(f, lhs.precedence() < own)?;
                write!(f, " {} ", op.symbol())?;
                // Right operand of - and / also needs parens at equal precedence.
                let strict = matches!(op, BinaryOp::Sub | BinaryOp::Div);
                let child = rhs.precedence();
                rhs.fmt_child(f, child < own || (strict && child == own) || child == 3)
            }
            Self::Clamp { min, max, value } => write!(f, "clamp({min}, {max}, {value})"),
            Self::SelectSign {
                test,
                non_negative,
                negative,
            } => write!(f, "({test} >= 0 ? {non_negative} : {negative})"),
        }
    }
}

impl Add for Expr {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }
}

impl Sub for Expr {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Sub, self, rhs)
    }
}

impl Mul for Expr {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Mul, self, rhs)
    }
}

impl Div for Expr {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::binary(BinaryOp::Div, self, rhs)
    }
}

impl Neg for Expr {
    type Output = Self;
    fn neg(self) -> Self {
        Self::Unary {
            op: UnaryOp::Neg,
            arg: Box::new(self),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Const(value)
    }
}

/// `float $name = expr;`
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: String,
    pub expr: Expr,
}

/// `node.attr = expr;`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: AttrPath,
    pub expr: Expr,
}

/// Locals evaluated in order, then assignments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriverProgram {
    pub locals: Vec<Local>,
    pub assignments: Vec<Assignment>,
}

impl DriverProgram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a local and returns an expression that reads it.
    pub fn local(&mut self, name: impl Into<String>, expr: Expr) -> Expr {
        let name = name.into();
        self.locals.push(Local {
            name: name.clone(),
            expr,
        });
        Expr::Var(name)
    }

    pub fn assign(&mut self, target: AttrPath, expr: Expr) {
        self.assignments.push(Assignment { target, expr });
    }

    /// Every scene attribute the program reads, without duplicates.
    #[must_use]
    pub fn attribute_reads(&self) -> Vec<&AttrPath> {
        let mut reads = BTreeSet::new();
        for local in &self.locals {
            local.expr.collect_reads(&mut reads);
        }
        for assignment in &self.assignments {
            assignment.expr.collect_reads(&mut reads);
        }
        reads.into_iter().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Canonical formula text, one statement per line.
    #[must_use]
    pub fn to_formula_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DriverProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for local in &self.locals {
            writeln!(f, "float ${} = {};", local.name, local.expr)?;
        }
        for assignment in &self.assignments {
            writeln!(f, "{} = {};", assignment.target, assignment.expr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_precedence() {
        let a = Expr::var("a");
        let b = Expr::var("b");
        let c = Expr::var("c");
        assert_eq!((a.clone() + b.clone() * c.clone()).to_string(), "$a + $b * $c");
        assert_eq!(((a.clone() + b.clone()) * c.clone()).to_string(), "($a + $b) * $c");
        assert_eq!((a.clone() - (b.clone() - c.clone())).to_string(), "$a - ($b - $c)");
        assert_eq!((a / (b * c)).to_string(), "$a / ($b * $c)");
    }

    #[test]
    fn negative_constants_are_wrapped() {
        let expr = Expr::attr("ctl", "delay_X") * Expr::constant(-7.0);
        assert_eq!(expr.to_string(), "ctl.delay_X * (-7)");
        assert_eq!(Expr::constant(0.1).to_string(), "0.1");
    }

    #[test]
    fn program_lists_locals_then_assignments() {
        let mut program = DriverProgram::new();
        let freq = program.local("freqX", Expr::attr("m", "loop_per_second_X") * Expr::Time);
        program.assign(AttrPath::new("j_01", "rotateX"), Expr::sin(freq));
        assert_eq!(
            program.to_formula_text(),
            "float $freqX = m.loop_per_second_X * time;\nj_01.rotateX = sin($freqX);\n"
        );
        assert_eq!(program.attribute_reads(), vec![&AttrPath::new("m", "loop_per_second_X")]);
    }

    #[test]
    fn clamp_and_select_render_as_functions() {
        let clamp = Expr::clamp(Expr::constant(0.0), Expr::constant(2.0), Expr::var("f"));
        assert_eq!(clamp.to_string(), "clamp(0, 2, $f)");
        let select = Expr::select_sign(Expr::var("r"), Expr::attr("m", "p"), Expr::attr("m", "n"));
        assert_eq!(select.to_string(), "($r >= 0 ? m.p : m.n)");
    }
}
