use std::f64::consts::{E, PI};
use std::fmt::Display;

use log::debug;

use crate::{
    Error,
    eval::{DisplayMiddle, EvaluationError, Invokable, Slots},
    lex, parse,
};

/// A compiled expression: parse once, then evaluate as often as needed with
/// different variable values.
///
/// `e` and `pi` are always declared. Every name passed to
/// [`Expression::compile`] gets a slot initialized to `0.0`, and
/// [`Expression::evaluate`] fills those slots positionally.
#[derive(Debug, Clone)]
pub struct Expression {
    slots: Slots,
    declared: Vec<usize>,
    root: Invokable,
}

impl Expression {
    pub fn compile(text: &str, variable_names: &[&str]) -> Result<Self, Error> {
        let mut slots = Slots::new();
        slots.declare("e", E);
        slots.declare("pi", PI);
        let declared = variable_names
            .iter()
            .map(|name| slots.declare(name, 0.0))
            .collect::<Vec<_>>();

        let tokens = lex::tokenize(text)?;
        debug!(
            "compiling {} tokens with {} declared variable(s)",
            tokens.len(),
            declared.len()
        );
        let root = parse::parse(&tokens, &slots)?;

        Ok(Expression {
            slots,
            declared,
            root,
        })
    }

    /// Writes `values[i]` into the slot of the i-th declared name, then
    /// evaluates. Slots without a value keep whatever they held before.
    pub fn evaluate(&mut self, values: &[f64]) -> Result<f64, EvaluationError> {
        if values.len() > self.declared.len() {
            return Err(EvaluationError::TooManyValues {
                declared: self.declared.len(),
                given: values.len(),
            });
        }
        for (&slot, &value) in self.declared.iter().zip(values) {
            self.slots.set(slot, value)?;
        }
        self.root.invoke(self.slots.values())
    }

    /// Replaces the tree with its constant-folded form.
    pub fn optimize(&mut self) -> Result<(), EvaluationError> {
        let before = self.root.size();
        self.root = self.root.optimize()?;
        debug!("optimized {before} nodes down to {}", self.root.size());
        Ok(())
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn root(&self) -> &Invokable {
        &self.root
    }

    /// The declared variable names, in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.declared
            .iter()
            .filter_map(|&slot| self.slots.name(slot))
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            DisplayMiddle {
                tree: &self.root,
                slots: &self.slots,
            }
        )
    }
}
