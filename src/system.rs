use std::collections::HashMap;
use std::fmt::Display;

use once_cell::sync::Lazy;

use crate::eval::EvaluationError;

/// A registry-bound native operation. Receives the already evaluated
/// arguments, left to right.
pub type Native = fn(&[f64]) -> Result<f64, EvaluationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Neg,
    Not,
    Inv,
    Lth,
    Gth,
    Leq,
    Geq,
    Equ,
    Neq,
    Near,
    Or,
    And,
    Shl,
    Shr,
}

impl Operator {
    pub const ALL: [Operator; 20] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Mod,
        Operator::Pow,
        Operator::Neg,
        Operator::Not,
        Operator::Inv,
        Operator::Lth,
        Operator::Gth,
        Operator::Leq,
        Operator::Geq,
        Operator::Equ,
        Operator::Neq,
        Operator::Near,
        Operator::Or,
        Operator::And,
        Operator::Shl,
        Operator::Shr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Sub => "sub",
            Operator::Mul => "mul",
            Operator::Div => "div",
            Operator::Mod => "mod",
            Operator::Pow => "pow",
            Operator::Neg => "neg",
            Operator::Not => "not",
            Operator::Inv => "inv",
            Operator::Lth => "lth",
            Operator::Gth => "gth",
            Operator::Leq => "leq",
            Operator::Geq => "geq",
            Operator::Equ => "equ",
            Operator::Neq => "neq",
            Operator::Near => "near",
            Operator::Or => "or",
            Operator::And => "and",
            Operator::Shl => "shl",
            Operator::Shr => "shr",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Operator::Neg | Operator::Not | Operator::Inv => 1,
            _ => 2,
        }
    }

    /// Infix spelling used when rendering, for the operators the grammar
    /// can actually produce.
    pub fn symbol(self) -> Option<char> {
        match self {
            Operator::Add => Some('+'),
            Operator::Sub => Some('-'),
            Operator::Mul => Some('*'),
            Operator::Div => Some('/'),
            Operator::Mod => Some('%'),
            Operator::Pow => Some('^'),
            _ => None,
        }
    }

    pub fn apply(self, args: &[f64]) -> Result<f64, EvaluationError> {
        let name = self.name();
        match self {
            Operator::Add => binary(name, args, |lhs, rhs| lhs + rhs),
            Operator::Sub => binary(name, args, |lhs, rhs| lhs - rhs),
            Operator::Mul => binary(name, args, |lhs, rhs| lhs * rhs),
            Operator::Div => binary(name, args, |lhs, rhs| lhs / rhs),
            Operator::Mod => binary(name, args, |lhs, rhs| lhs % rhs),
            Operator::Pow => binary(name, args, f64::powf),

            Operator::Neg => unary(name, args, |x| -x),
            Operator::Not => unary(name, args, |x| truth(!(x > 0.0))),
            Operator::Inv => unary(name, args, |x| !(x as i64) as f64),

            Operator::Lth => binary(name, args, |lhs, rhs| truth(lhs < rhs)),
            Operator::Gth => binary(name, args, |lhs, rhs| truth(lhs > rhs)),
            Operator::Leq => binary(name, args, |lhs, rhs| truth(lhs <= rhs)),
            Operator::Geq => binary(name, args, |lhs, rhs| truth(lhs >= rhs)),
            Operator::Equ => binary(name, args, |lhs, rhs| truth(lhs == rhs)),
            Operator::Neq => binary(name, args, |lhs, rhs| truth(lhs != rhs)),
            Operator::Near => binary(name, args, |lhs, rhs| truth((lhs - rhs).abs() < 1e-7)),

            // both sides are already evaluated, nothing short-circuits
            Operator::Or => binary(name, args, |lhs, rhs| truth(lhs > 0.0 || rhs > 0.0)),
            Operator::And => binary(name, args, |lhs, rhs| truth(lhs > 0.0 && rhs > 0.0)),

            Operator::Shl => binary(name, args, |lhs, rhs| {
                (lhs as i64).wrapping_shl(rhs as i64 as u32) as f64
            }),
            Operator::Shr => binary(name, args, |lhs, rhs| {
                (lhs as i64).wrapping_shr(rhs as i64 as u32) as f64
            }),
        }
    }
}

pub struct Function {
    pub name: &'static str,
    pub arity: usize,
    pub native: Native,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function({}/{})", self.name, self.arity)
    }
}

/// Whatever a call node dispatches to.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    Operator(Operator),
    Function(&'static Function),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Operator(op) => op.name(),
            Operation::Function(function) => function.name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Operation::Operator(op) => op.arity(),
            Operation::Function(function) => function.arity,
        }
    }

    pub fn apply(&self, args: &[f64]) -> Result<f64, EvaluationError> {
        match self {
            Operation::Operator(op) => op.apply(args),
            Operation::Function(function) => (function.native)(args),
        }
    }
}

impl PartialEq for Operation {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operation::Operator(lhs), Operation::Operator(rhs)) => lhs == rhs,
            (Operation::Function(lhs), Operation::Function(rhs)) => std::ptr::eq(*lhs, *rhs),
            _ => false,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name(), self.arity())
    }
}

fn truth(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

fn unary(
    name: &'static str,
    args: &[f64],
    f: impl FnOnce(f64) -> f64,
) -> Result<f64, EvaluationError> {
    match args {
        [x] => Ok(f(*x)),
        _ => Err(EvaluationError::Arity {
            name,
            expected: 1,
            found: args.len(),
        }),
    }
}

fn binary(
    name: &'static str,
    args: &[f64],
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<f64, EvaluationError> {
    match args {
        [lhs, rhs] => Ok(f(*lhs, *rhs)),
        _ => Err(EvaluationError::Arity {
            name,
            expected: 2,
            found: args.len(),
        }),
    }
}

fn ternary(
    name: &'static str,
    args: &[f64],
    f: impl FnOnce(f64, f64, f64) -> f64,
) -> Result<f64, EvaluationError> {
    match args {
        [a, b, c] => Ok(f(*a, *b, *c)),
        _ => Err(EvaluationError::Arity {
            name,
            expected: 3,
            found: args.len(),
        }),
    }
}

static FUNCTIONS: [Function; 27] = [
    Function {
        name: "abs",
        arity: 1,
        native: |args| unary("abs", args, f64::abs),
    },
    Function {
        name: "sqrt",
        arity: 1,
        native: |args| unary("sqrt", args, f64::sqrt),
    },
    Function {
        name: "cbrt",
        arity: 1,
        native: |args| unary("cbrt", args, f64::cbrt),
    },
    Function {
        name: "sin",
        arity: 1,
        native: |args| unary("sin", args, f64::sin),
    },
    Function {
        name: "cos",
        arity: 1,
        native: |args| unary("cos", args, f64::cos),
    },
    Function {
        name: "tan",
        arity: 1,
        native: |args| unary("tan", args, f64::tan),
    },
    Function {
        name: "asin",
        arity: 1,
        native: |args| unary("asin", args, f64::asin),
    },
    Function {
        name: "acos",
        arity: 1,
        native: |args| unary("acos", args, f64::acos),
    },
    Function {
        name: "atan",
        arity: 1,
        native: |args| unary("atan", args, f64::atan),
    },
    Function {
        name: "atan2",
        arity: 2,
        native: |args| binary("atan2", args, f64::atan2),
    },
    Function {
        name: "sinh",
        arity: 1,
        native: |args| unary("sinh", args, f64::sinh),
    },
    Function {
        name: "cosh",
        arity: 1,
        native: |args| unary("cosh", args, f64::cosh),
    },
    Function {
        name: "tanh",
        arity: 1,
        native: |args| unary("tanh", args, f64::tanh),
    },
    Function {
        name: "exp",
        arity: 1,
        native: |args| unary("exp", args, f64::exp),
    },
    Function {
        name: "ln",
        arity: 1,
        native: |args| unary("ln", args, f64::ln),
    },
    Function {
        name: "log",
        arity: 1,
        native: |args| unary("log", args, f64::ln),
    },
    Function {
        name: "log10",
        arity: 1,
        native: |args| unary("log10", args, f64::log10),
    },
    Function {
        name: "ceil",
        arity: 1,
        native: |args| unary("ceil", args, f64::ceil),
    },
    Function {
        name: "floor",
        arity: 1,
        native: |args| unary("floor", args, f64::floor),
    },
    Function {
        name: "rint",
        arity: 1,
        native: |args| unary("rint", args, f64::round_ties_even),
    },
    // half up, so round(-2.5) is -2
    Function {
        name: "round",
        arity: 1,
        native: |args| unary("round", args, |x| (x + 0.5).floor()),
    },
    Function {
        name: "min",
        arity: 2,
        native: |args| binary("min", args, f64::min),
    },
    Function {
        name: "min",
        arity: 3,
        native: |args| ternary("min", args, |a, b, c| a.min(b).min(c)),
    },
    Function {
        name: "max",
        arity: 2,
        native: |args| binary("max", args, f64::max),
    },
    Function {
        name: "max",
        arity: 3,
        native: |args| ternary("max", args, |a, b, c| a.max(b).max(c)),
    },
    Function {
        name: "hypot",
        arity: 2,
        native: |args| binary("hypot", args, f64::hypot),
    },
    Function {
        name: "signum",
        arity: 1,
        native: |args| unary("signum", args, signum),
    },
];

fn signum(x: f64) -> f64 {
    if x == 0.0 || x.is_nan() { x } else { x.signum() }
}

static OPERATOR_TABLE: Lazy<HashMap<&'static str, Vec<Operator>>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Vec<Operator>> = HashMap::new();
    for op in Operator::ALL {
        table.entry(op.name()).or_default().push(op);
    }
    table
});

static FUNCTION_TABLE: Lazy<HashMap<&'static str, Vec<&'static Function>>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Vec<&'static Function>> = HashMap::new();
    for function in &FUNCTIONS {
        table.entry(function.name).or_default().push(function);
    }
    table
});

/// Resolves an operator by exact name and arity.
pub fn operator(name: &str, arity: usize) -> Option<Operator> {
    OPERATOR_TABLE
        .get(name)?
        .iter()
        .copied()
        .find(|op| op.arity() == arity)
}

/// Resolves a function by exact name and arity. There is no overload
/// resolution beyond the argument count.
pub fn function(name: &str, arity: usize) -> Option<&'static Function> {
    FUNCTION_TABLE
        .get(name)?
        .iter()
        .copied()
        .find(|function| function.arity == arity)
}

pub fn functions() -> impl Iterator<Item = &'static Function> {
    FUNCTIONS.iter()
}
