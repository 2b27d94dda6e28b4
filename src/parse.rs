use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::{
    eval::{Call, Invokable, Slots},
    lex::{Token, TokenKind},
    system::{self, Operation},
};

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unmatched bracket")]
    #[diagnostic(
        code(parse::unmatched_bracket),
        help("every `(` needs a `)` and arguments are separated by `,`")
    )]
    UnmatchedBracket {
        #[label("this bracket is never closed")]
        at: Option<SourceSpan>,
    },

    #[error("Extra tokens at the end of the input")]
    #[diagnostic(code(parse::extra_tokens_at_end))]
    ExtraTokensAtEnd {
        #[label("nothing may follow the expression")]
        at: Option<SourceSpan>,
    },

    #[error("Expression missing")]
    #[diagnostic(code(parse::expression_missing), help("an operand is expected here"))]
    ExpressionMissing {
        #[label("expected an expression")]
        at: Option<SourceSpan>,
    },

    #[error("Extra token found in expression: `{found}`")]
    #[diagnostic(code(parse::extra_token_found))]
    ExtraTokenFound {
        found: String,
        #[label("this cannot be combined with its neighbours")]
        at: Option<SourceSpan>,
    },

    #[error("Variable `{name}` not found")]
    #[diagnostic(
        code(parse::undefined_variable),
        help("declare `{name}` when compiling the expression")
    )]
    UndefinedVariable {
        name: String,
        #[label("undeclared")]
        at: Option<SourceSpan>,
    },

    #[error("Function `{name}` taking {arity} argument(s) not found")]
    #[diagnostic(code(parse::function_not_found))]
    FunctionNotFound {
        name: String,
        arity: usize,
        #[label("unknown function")]
        at: Option<SourceSpan>,
    },

    #[error("Couldn't find operator `{name}`")]
    #[diagnostic(code(parse::unknown_operator))]
    UnknownOperator {
        name: String,
        #[label("this operator")]
        at: Option<SourceSpan>,
    },
}

impl ParseError {
    fn span(&self) -> Option<SourceSpan> {
        match self {
            ParseError::UnmatchedBracket { at }
            | ParseError::ExtraTokensAtEnd { at }
            | ParseError::ExpressionMissing { at }
            | ParseError::ExtraTokenFound { at, .. }
            | ParseError::UndefinedVariable { at, .. }
            | ParseError::FunctionNotFound { at, .. }
            | ParseError::UnknownOperator { at, .. } => *at,
        }
    }

    /// Byte offset the error points at, or -1 when there is no token to
    /// point at.
    pub fn offset(&self) -> isize {
        self.span().map_or(-1, |span| span.offset() as isize)
    }
}

/// One element of a scope that has been scanned but not yet grouped into
/// operator levels.
#[derive(Debug, Clone)]
enum HalfProcessed<'de> {
    Node(Invokable),
    Token(Token<'de>),
    Prefix(Token<'de>),
}

/// Operators of one precedence level, mapped to registry names.
type Level = &'static [(char, &'static str)];

const ADDITIVE: Level = &[('+', "add"), ('-', "sub")];
const MULTIPLICATIVE: Level = &[('*', "mul"), ('/', "div"), ('%', "mod")];
const POWER: Level = &[('^', "pow")];

/// Parses `tokens` into a tree, resolving identifiers against `slots`.
pub fn parse(tokens: &[Token<'_>], slots: &Slots) -> Result<Invokable, ParseError> {
    Parser::new(tokens, slots).parse()
}

pub struct Parser<'a, 'de> {
    tokens: &'a [Token<'de>],
    position: usize,
    slots: &'a Slots,
}

impl<'a, 'de> Parser<'a, 'de> {
    pub fn new(tokens: &'a [Token<'de>], slots: &'a Slots) -> Self {
        Parser {
            tokens,
            position: 0,
            slots,
        }
    }

    pub fn parse(mut self) -> Result<Invokable, ParseError> {
        let tree = self.parse_scope()?;
        if let Some(extra) = self.peek() {
            return Err(ParseError::ExtraTokensAtEnd {
                at: Some(extra.span()),
            });
        }
        Ok(tree)
    }

    fn peek(&self) -> Option<Token<'de>> {
        self.tokens.get(self.position).copied()
    }

    fn bump(&mut self) -> Option<Token<'de>> {
        let token = self.peek()?;
        self.position += 1;
        Some(token)
    }

    /// Scans one bracket or argument scope, stopping before `,`, `)` or the
    /// end of input.
    fn parse_scope(&mut self) -> Result<Invokable, ParseError> {
        let mut half_processed = Vec::new();

        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Number(value) => {
                    self.position += 1;
                    half_processed.push(HalfProcessed::Node(Invokable::Constant(value)));
                }
                TokenKind::Ident => {
                    self.position += 1;
                    if self.peek().is_some_and(|next| next.is_punctuation('(')) {
                        half_processed.push(HalfProcessed::Node(self.parse_function(token)?));
                    } else {
                        let slot = self.slots.lookup(token.literal).ok_or_else(|| {
                            ParseError::UndefinedVariable {
                                name: token.literal.to_string(),
                                at: Some(token.span()),
                            }
                        })?;
                        half_processed.push(HalfProcessed::Node(Invokable::Variable(slot)));
                    }
                }
                TokenKind::Punctuation('(') => {
                    half_processed.push(HalfProcessed::Node(self.parse_bracket()?));
                }
                TokenKind::Punctuation(_) => break,
                TokenKind::Operator(_) => {
                    self.position += 1;
                    let operand_expected = matches!(
                        half_processed.last(),
                        None | Some(HalfProcessed::Token(_) | HalfProcessed::Prefix(_))
                    );
                    half_processed.push(if operand_expected {
                        HalfProcessed::Prefix(token)
                    } else {
                        HalfProcessed::Token(token)
                    });
                }
            }
        }

        self.process_additive(half_processed)
    }

    fn parse_bracket(&mut self) -> Result<Invokable, ParseError> {
        let open = self.bump().filter(|token| token.is_punctuation('('));
        let Some(open) = open else {
            return Err(ParseError::UnmatchedBracket { at: None });
        };

        let tree = self.parse_scope()?;

        match self.bump() {
            Some(close) if close.is_punctuation(')') => Ok(tree),
            Some(other) => Err(ParseError::UnmatchedBracket {
                at: Some(other.span()),
            }),
            None => Err(ParseError::UnmatchedBracket {
                at: Some(open.span()),
            }),
        }
    }

    fn parse_function(&mut self, name: Token<'de>) -> Result<Invokable, ParseError> {
        let open = self.bump().filter(|token| token.is_punctuation('('));
        let Some(open) = open else {
            return Err(ParseError::UnmatchedBracket { at: None });
        };

        let mut args = Vec::new();
        if self.peek().is_some_and(|token| token.is_punctuation(')')) {
            self.position += 1;
        } else {
            loop {
                args.push(self.parse_scope()?);

                match self.bump() {
                    Some(token) if token.is_punctuation(',') => continue,
                    Some(token) if token.is_punctuation(')') => break,
                    Some(other) => {
                        return Err(ParseError::UnmatchedBracket {
                            at: Some(other.span()),
                        });
                    }
                    None => {
                        return Err(ParseError::UnmatchedBracket {
                            at: Some(open.span()),
                        });
                    }
                }
            }
        }

        let arity = args.len();
        let not_found = || ParseError::FunctionNotFound {
            name: name.literal.to_string(),
            arity,
            at: Some(name.span()),
        };
        // operators without a symbol (near, lth, shl, ...) are reachable by name
        let operation = match system::function(name.literal, arity) {
            Some(function) => Operation::Function(function),
            None => system::operator(name.literal, arity)
                .map(Operation::Operator)
                .ok_or_else(not_found)?,
        };
        let call = Call::new(operation, args).ok_or_else(not_found)?;
        Ok(Invokable::Call(call))
    }

    fn process_additive(&self, input: Vec<HalfProcessed<'de>>) -> Result<Invokable, ParseError> {
        self.process_level(input, ADDITIVE, Self::process_multiplicative)
    }

    fn process_multiplicative(
        &self,
        input: Vec<HalfProcessed<'de>>,
    ) -> Result<Invokable, ParseError> {
        self.process_level(input, MULTIPLICATIVE, Self::process_power)
    }

    fn process_power(&self, input: Vec<HalfProcessed<'de>>) -> Result<Invokable, ParseError> {
        self.process_level(input, POWER, Self::process_primary)
    }

    /// Peels operators of `level` off the right end one at a time, resolving
    /// each right-hand group with `tighter`, then folds the groups left to
    /// right. A chain of any length is handled without recursing per operator.
    fn process_level(
        &self,
        mut input: Vec<HalfProcessed<'de>>,
        level: Level,
        tighter: fn(&Self, Vec<HalfProcessed<'de>>) -> Result<Invokable, ParseError>,
    ) -> Result<Invokable, ParseError> {
        let mut rights = Vec::new();
        let first = loop {
            let (lhs, op, rhs) = split(input, level);
            let rhs = tighter(self, rhs)?;
            match op {
                Some(op) => {
                    rights.push((op, rhs));
                    input = lhs;
                }
                None => break rhs,
            }
        };

        rights
            .into_iter()
            .rev()
            .try_fold(first, |lhs, ((op, name), rhs)| combine(op, name, lhs, rhs))
    }

    /// A single operand, optionally preceded by prefix operators which are
    /// applied innermost first.
    fn process_primary(&self, mut input: Vec<HalfProcessed<'de>>) -> Result<Invokable, ParseError> {
        let mut tree = match input.pop() {
            None => return Err(ParseError::ExpressionMissing { at: None }),
            Some(HalfProcessed::Node(tree)) => tree,
            Some(HalfProcessed::Token(token) | HalfProcessed::Prefix(token)) => {
                return Err(extra_token(&token));
            }
        };

        while let Some(last) = input.pop() {
            tree = match last {
                HalfProcessed::Prefix(token) if token.kind == TokenKind::Operator('-') => {
                    tree.negate()
                }
                HalfProcessed::Prefix(token) if token.kind == TokenKind::Operator('+') => tree,
                HalfProcessed::Prefix(token) | HalfProcessed::Token(token) => {
                    return Err(extra_token(&token));
                }
                HalfProcessed::Node(_) => {
                    return Err(ParseError::ExtraTokenFound {
                        found: "sub-expression".to_string(),
                        at: None,
                    });
                }
            };
        }
        Ok(tree)
    }
}

type Split<'de> = (
    Vec<HalfProcessed<'de>>,
    Option<(Token<'de>, &'static str)>,
    Vec<HalfProcessed<'de>>,
);

/// Splits `input` at the rightmost operator of `level`. The last element
/// always stays on the right-hand side. Without a match the whole list is
/// returned as the right-hand side.
fn split<'de>(mut input: Vec<HalfProcessed<'de>>, level: Level) -> Split<'de> {
    let found = input
        .iter()
        .enumerate()
        .rev()
        .skip(1)
        .find_map(|(i, item)| match item {
            HalfProcessed::Token(token @ Token {
                kind: TokenKind::Operator(c),
                ..
            }) => level
                .iter()
                .find(|(symbol, _)| symbol == c)
                .map(|(_, name)| (i, *token, *name)),
            _ => None,
        });

    let Some((i, op, name)) = found else {
        return (Vec::new(), None, input);
    };

    let rhs = input.split_off(i + 1);
    input.truncate(i);
    (input, Some((op, name)), rhs)
}

fn combine(
    op: Token<'_>,
    name: &str,
    lhs: Invokable,
    rhs: Invokable,
) -> Result<Invokable, ParseError> {
    system::operator(name, 2)
        .and_then(|operator| Invokable::operator(operator, vec![lhs, rhs]))
        .ok_or_else(|| ParseError::UnknownOperator {
            name: name.to_string(),
            at: Some(op.span()),
        })
}

fn extra_token(token: &Token<'_>) -> ParseError {
    ParseError::ExtraTokenFound {
        found: token.literal.to_string(),
        at: Some(token.span()),
    }
}
