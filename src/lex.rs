use std::fmt::Display;
use std::num::ParseFloatError;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum LexicalError {
    #[error("Unexpected character '{token}'")]
    #[diagnostic(
        code(lex::unexpected_character),
        help("remove or correct the character: `{token}`")
    )]
    UnexpectedCharacter {
        token: char,
        #[label("this character")]
        bad_bit: SourceSpan,
    },

    #[error("Number parsing failed for `{literal}`")]
    #[diagnostic(
        code(lex::malformed_number),
        url("https://doc.rust-lang.org/std/num/struct.ParseFloatError.html")
    )]
    MalformedNumber {
        literal: String,
        #[source]
        source: ParseFloatError,
        #[label("this numeric literal")]
        bad_bit: SourceSpan,
    },
}

impl LexicalError {
    /// Byte offset of the offending input.
    pub fn offset(&self) -> usize {
        match self {
            LexicalError::UnexpectedCharacter { bad_bit, .. }
            | LexicalError::MalformedNumber { bad_bit, .. } => bad_bit.offset(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    /// Byte offset of the first character of `literal`.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    Operator(char),
    Punctuation(char),
    Number(f64),
    Ident,
}

impl Token<'_> {
    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.literal.len())
    }

    pub fn is_punctuation(&self, c: char) -> bool {
        self.kind == TokenKind::Punctuation(c)
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::Operator(_) => write!(f, "OPERATOR {lit} null"),
            TokenKind::Punctuation('(') => write!(f, "LEFT_PAREN {lit} null"),
            TokenKind::Punctuation(')') => write!(f, "RIGHT_PAREN {lit} null"),
            TokenKind::Punctuation(_) => write!(f, "COMMA {lit} null"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::Number(n) => {
                if n == n.trunc() && n.is_finite() {
                    write!(f, "NUMBER {lit} {n}.0")
                } else {
                    write!(f, "NUMBER {lit} {n}")
                }
            }
        }
    }
}

/// Collects every token of `input`, stopping at the first lexical error.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexicalError> {
    Lexer::new(input).collect()
}

pub struct Lexer<'de> {
    rest: &'de str,
    pub byte: usize,
}

impl<'de> Lexer<'de> {
    pub fn new(input: &'de str) -> Self {
        Lexer {
            rest: input,
            byte: 0,
        }
    }

    fn advance(&mut self, len: usize) {
        self.byte += len;
        self.rest = &self.rest[len..];
    }
}

/// Length of the numeric literal at the start of `s`, following
/// `[0-9]*(\.[0-9]+)?([eE][+-]?[0-9]+)?` with a non-empty mantissa.
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut len = digits_from(0);
    if bytes.get(len) == Some(&b'.') {
        let fraction = digits_from(len + 1);
        if fraction > 0 {
            len += 1 + fraction;
        }
    }
    if len == 0 {
        return 0;
    }

    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let mut exp = len + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp.min(bytes.len()));
        if exp_digits > 0 {
            len = exp + exp_digits;
        }
    }
    len
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = self.rest.chars().next()?;
            let offset = self.byte;

            enum Start {
                Ident,
                Number,
            }

            let started = match c {
                '+' | '-' | '*' | '/' | '%' | '^' => Some(TokenKind::Operator(c)),
                ',' | '(' | ')' => Some(TokenKind::Punctuation(c)),
                c if c.is_whitespace() => {
                    self.advance(c.len_utf8());
                    continue;
                }
                _ => None,
            };

            if let Some(kind) = started {
                let literal = &self.rest[..1];
                self.advance(1);
                return Some(Ok(Token {
                    kind,
                    literal,
                    offset,
                }));
            }

            let started = match c {
                '0'..='9' | '.' if number_len(self.rest) > 0 => Start::Number,
                'a'..='z' | 'A'..='Z' => Start::Ident,
                c => {
                    self.advance(c.len_utf8());
                    return Some(Err(LexicalError::UnexpectedCharacter {
                        token: c,
                        bad_bit: SourceSpan::from(offset..offset + c.len_utf8()),
                    }));
                }
            };

            match started {
                Start::Ident => {
                    let end = self
                        .rest
                        .find(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_'))
                        .unwrap_or(self.rest.len());

                    let literal = &self.rest[..end];
                    self.advance(end);
                    return Some(Ok(Token {
                        kind: TokenKind::Ident,
                        literal,
                        offset,
                    }));
                }
                Start::Number => {
                    let literal = &self.rest[..number_len(self.rest)];
                    self.advance(literal.len());

                    let n = match literal.parse() {
                        Ok(n) => n,
                        Err(source) => {
                            return Some(Err(LexicalError::MalformedNumber {
                                literal: literal.to_string(),
                                source,
                                bad_bit: SourceSpan::from(offset..self.byte),
                            }));
                        }
                    };

                    return Some(Ok(Token {
                        kind: TokenKind::Number(n),
                        literal,
                        offset,
                    }));
                }
            }
        }
    }
}
