//! Compiles arithmetic formulas with named variables into trees that can be
//! evaluated many times with different bindings.
//!
//! ```
//! use expression_compiler::Expression;
//!
//! let mut expr = Expression::compile("x + 1 * 2", &["x"]).unwrap();
//! expr.optimize().unwrap();
//! assert_eq!(expr.evaluate(&[5.0]).unwrap(), 7.0);
//! assert_eq!(expr.render(), "(x + 2)");
//! ```

use miette::Diagnostic;
use thiserror::Error;

pub mod eval;
pub mod expression;
pub mod lex;
pub mod parse;
pub mod system;


pub use eval::{EvaluationError, Invokable};
pub use expression::Expression;
pub use lex::{Lexer, LexicalError, Token, TokenKind};
pub use parse::{ParseError, Parser};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexicalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvaluationError),
}

/// Shorthand for [`Expression::compile`].
pub fn compile(text: &str, variable_names: &[&str]) -> Result<Expression, Error> {
    Expression::compile(text, variable_names)
}
