use std::fmt::Display;

use log::trace;
use miette::Diagnostic;
use thiserror::Error;

use crate::system::{Operation, Operator};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("`{name}` expects {expected} argument(s) but was handed {found}")]
    #[diagnostic(
        code(eval::arity),
        help("the registry binding for `{name}` does not match the call built for it")
    )]
    Arity {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("variable slot #{slot} does not exist in a table of {len} slots")]
    #[diagnostic(
        code(eval::unbound_slot),
        help("evaluate a tree against the slot table it was compiled with")
    )]
    UnboundSlot { slot: usize, len: usize },

    #[error("{given} values supplied for {declared} declared variables")]
    #[diagnostic(code(eval::too_many_values))]
    TooManyValues { declared: usize, given: usize },
}

/// The mutable cells backing `e`, `pi` and every declared variable. AST
/// leaves refer to a cell by its index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    names: Vec<String>,
    values: Vec<f64>,
}

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` and returns its slot. Declaring an existing name
    /// reuses its slot and resets it to `value`.
    pub fn declare(&mut self, name: &str, value: f64) -> usize {
        if let Some(slot) = self.lookup(name) {
            self.values[slot] = value;
            return slot;
        }
        self.names.push(name.to_string());
        self.values.push(value);
        self.values.len() - 1
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name(&self, slot: usize) -> Option<&str> {
        self.names.get(slot).map(String::as_str)
    }

    pub fn set(&mut self, slot: usize, value: f64) -> Result<(), EvaluationError> {
        let len = self.values.len();
        let cell = self
            .values
            .get_mut(slot)
            .ok_or(EvaluationError::UnboundSlot { slot, len })?;
        *cell = value;
        Ok(())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invokable {
    Constant(f64),
    Variable(usize),
    Call(Call),
}

/// An operation applied to exactly as many arguments as its arity.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    operation: Operation,
    args: Vec<Invokable>,
}

impl Call {
    /// `None` when `args` does not match the arity of `operation`.
    pub fn new(operation: Operation, args: Vec<Invokable>) -> Option<Self> {
        (args.len() == operation.arity()).then_some(Call { operation, args })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn args(&self) -> &[Invokable] {
        &self.args
    }
}

impl Drop for Call {
    // Unlinks nested calls one at a time so deep left-leaning chains don't
    // overflow the stack on drop.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.args);
        while let Some(mut node) = pending.pop() {
            if let Invokable::Call(call) = &mut node {
                pending.append(&mut call.args);
            }
        }
    }
}

impl Invokable {
    pub(crate) fn operator(op: Operator, args: Vec<Invokable>) -> Option<Self> {
        Call::new(Operation::Operator(op), args).map(Invokable::Call)
    }

    pub fn negate(self) -> Self {
        Invokable::Call(Call {
            operation: Operation::Operator(Operator::Neg),
            args: vec![self],
        })
    }

    /// Evaluates the tree against `slots`. Arguments are evaluated left to
    /// right onto a value stack, so long operator chains don't recurse.
    pub fn invoke(&self, slots: &[f64]) -> Result<f64, EvaluationError> {
        let mut work = vec![Step::Visit(self)];
        let mut values: Vec<f64> = Vec::with_capacity(16);

        while let Some(step) = work.pop() {
            match step {
                Step::Visit(Invokable::Constant(value)) => values.push(*value),
                Step::Visit(Invokable::Variable(slot)) => {
                    let value = slots.get(*slot).ok_or(EvaluationError::UnboundSlot {
                        slot: *slot,
                        len: slots.len(),
                    })?;
                    values.push(*value);
                }
                Step::Visit(Invokable::Call(call)) => {
                    work.push(Step::Finish(call));
                    work.extend(call.args.iter().rev().map(Step::Visit));
                }
                Step::Finish(call) => {
                    let at = values.len().saturating_sub(call.args.len());
                    let result = call.operation.apply(&values[at..])?;
                    values.truncate(at);
                    values.push(result);
                }
            }
        }
        // the root always leaves exactly one value behind
        Ok(values.pop().unwrap_or(f64::NAN))
    }

    /// Folds every call whose arguments are all constants. Returns a new
    /// tree; `self` is left untouched.
    pub fn optimize(&self) -> Result<Invokable, EvaluationError> {
        let mut work = vec![Step::Visit(self)];
        let mut done: Vec<Invokable> = Vec::new();

        while let Some(step) = work.pop() {
            match step {
                Step::Visit(Invokable::Call(call)) => {
                    work.push(Step::Finish(call));
                    work.extend(call.args.iter().rev().map(Step::Visit));
                }
                Step::Visit(leaf) => done.push(leaf.clone()),
                Step::Finish(call) => {
                    let at = done.len().saturating_sub(call.args.len());
                    let args = done.split_off(at);

                    let constants = args
                        .iter()
                        .map(|arg| match arg {
                            Invokable::Constant(value) => Some(*value),
                            _ => None,
                        })
                        .collect::<Option<Vec<_>>>();

                    done.push(match constants {
                        Some(values) => {
                            let folded = call.operation.apply(&values)?;
                            trace!("folded {} over {values:?} into {folded}", call.operation);
                            Invokable::Constant(folded)
                        }
                        None => Invokable::Call(Call {
                            operation: call.operation,
                            args,
                        }),
                    });
                }
            }
        }
        Ok(done.pop().unwrap_or_else(|| self.clone()))
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        let mut pending = vec![self];
        let mut count = 0;
        while let Some(node) = pending.pop() {
            count += 1;
            if let Invokable::Call(call) = node {
                pending.extend(&call.args);
            }
        }
        count
    }
}

/// Post-order walk state shared by `invoke` and `optimize`.
enum Step<'t> {
    Visit(&'t Invokable),
    Finish(&'t Call),
}

/// Renders a tree with its variable names, fully parenthesized.
pub struct DisplayMiddle<'a> {
    pub tree: &'a Invokable,
    pub slots: &'a Slots,
}

impl<'a> DisplayMiddle<'a> {
    fn nested(&self, tree: &'a Invokable) -> DisplayMiddle<'a> {
        DisplayMiddle {
            tree,
            slots: self.slots,
        }
    }

    fn write_call(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        name: &str,
        args: &'a [Invokable],
    ) -> std::fmt::Result {
        write!(f, "{name}(")?;
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.nested(arg))?;
        }
        write!(f, ")")
    }
}

impl Display for DisplayMiddle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tree {
            Invokable::Constant(value) => write!(f, "{value}"),
            Invokable::Variable(slot) => match self.slots.name(*slot) {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "${slot}"),
            },
            Invokable::Call(call) => match (call.operation, call.args.as_slice()) {
                (Operation::Operator(Operator::Neg), [arg]) => {
                    write!(f, "-({})", self.nested(arg))
                }
                (Operation::Operator(op), [lhs, rhs]) => match op.symbol() {
                    Some(symbol) => {
                        write!(f, "({} {symbol} {})", self.nested(lhs), self.nested(rhs))
                    }
                    None => self.write_call(f, op.name(), &call.args),
                },
                (operation, args) => self.write_call(f, operation.name(), args),
            },
        }
    }
}
