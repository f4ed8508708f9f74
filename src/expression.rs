// src/expression.rs
use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;

use crate::errors::{ContextError, Result};
use crate::parser::Parser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Var(String),
    And,
    Or,
    Xor,
    Not,
    LParen,
    RParen,
    Unknown(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Var(name) => f.write_str(name),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
            Token::Xor => f.write_str("><"),
            Token::Not => f.write_str("!"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Unknown(raw) => f.write_str(raw),
        }
    }
}

const OPERATORS: [&str; 4] = ["&&", "||", "><", "!"];

fn is_ident_char(c: char) -> bool {
    c == '_' || c == '-' || c.is_ascii_alphanumeric()
}

/// Lazily tokenizes a combination expression. The stream is finite; call
/// [`tokenize`] again to restart it.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    cursor: Parser<'a>,
}

/// Tokenize `expression`. Unrecognized input becomes [`Token::Unknown`] and
/// never stops the stream.
pub fn tokenize(expression: &str) -> Tokens<'_> {
    Tokens {
        cursor: Parser::new(expression),
    }
}

impl<'a> Tokens<'a> {
    fn at_boundary(&self) -> bool {
        match self.cursor.peek_char() {
            None => true,
            Some(c) if c.is_whitespace() || c == '(' || c == ')' || is_ident_char(c) => true,
            Some(_) => OPERATORS.iter().any(|op| self.cursor.peek_str(op)),
        }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.cursor.skip_ws();
        let c = self.cursor.peek_char()?;

        if self.cursor.eat("&&") {
            return Some(Token::And);
        }
        if self.cursor.eat("||") {
            return Some(Token::Or);
        }
        if self.cursor.eat("><") {
            return Some(Token::Xor);
        }
        if self.cursor.consume_char('!') {
            return Some(Token::Not);
        }
        if self.cursor.consume_char('(') {
            return Some(Token::LParen);
        }
        if self.cursor.consume_char(')') {
            return Some(Token::RParen);
        }
        if is_ident_char(c) {
            let word = self.cursor.take_while(is_ident_char);
            return Some(match word.to_ascii_lowercase().as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "xor" => Token::Xor,
                _ => Token::Var(word.to_string()),
            });
        }

        let start = self.cursor.position();
        self.cursor.bump();
        while !self.at_boundary() {
            self.cursor.bump();
        }
        Some(Token::Unknown(self.cursor.slice_from(start).to_string()))
    }
}

/// Raw text of every unrecognized token, for editor feedback.
pub fn unknown_tokens(expression: &str) -> Vec<String> {
    tokenize(expression)
        .filter_map(|t| match t {
            Token::Unknown(raw) => Some(raw),
            _ => None,
        })
        .collect()
}

/// Value bound to an expression variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Value(bool),
    /// The referenced context is disabled; it never blocks truth.
    Disabled,
}

impl Binding {
    pub fn truth(self) -> bool {
        match self {
            Binding::Value(b) => b,
            Binding::Disabled => true,
        }
    }
}

/// Case-insensitive variable bindings.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    inner: HashMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, binding: Binding) {
        self.inner.insert(name.to_ascii_lowercase(), binding);
    }

    pub fn get(&self, name: &str) -> Option<Binding> {
        self.inner.get(&name.to_ascii_lowercase()).copied()
    }

    /// Unbound names are satisfied.
    pub fn truth(&self, name: &str) -> bool {
        self.get(name).map(Binding::truth).unwrap_or(true)
    }
}

impl<S: AsRef<str>> FromIterator<(S, Binding)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (S, Binding)>>(iter: I) -> Self {
        let mut out = Bindings::new();
        for (name, binding) in iter {
            out.insert(name.as_ref(), binding);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Var(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn eval(&self, bindings: &Bindings) -> bool {
        match self {
            Expr::Var(name) => bindings.truth(name),
            Expr::Not(inner) => !inner.eval(bindings),
            Expr::And(l, r) => l.eval(bindings) && r.eval(bindings),
            Expr::Or(l, r) => l.eval(bindings) || r.eval(bindings),
            Expr::Xor(l, r) => l.eval(bindings) != r.eval(bindings),
        }
    }
}

/// A parsed combination expression.
///
/// Grammar, loosest binding first:
///
/// ```text
/// expr    := and (("||" | "><") and)*
/// and     := not ("&&" not)*
/// not     := "!" not | primary
/// primary := VAR | "(" expr ")"
/// ```
///
/// `||` and `><` share a level and associate to the left. Unknown tokens are
/// dropped before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens: Vec<Token> = tokenize(source)
            .filter(|t| !matches!(t, Token::Unknown(_)))
            .collect();
        let mut p = ExprParser { tokens, pos: 0 };
        let root = p.parse_or()?;
        if let Some(t) = p.peek() {
            return Err(ContextError::Expression(format!(
                "unexpected `{t}` in `{source}`"
            )));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    pub fn evaluate(&self, bindings: &Bindings) -> bool {
        self.root.eval(bindings)
    }

    /// Referenced variable names, first spelling wins, case-insensitively unique.
    pub fn variables(&self) -> Vec<String> {
        variables(&self.source)
    }
}

/// Variable names referenced by `expression`, deduplicated case-insensitively.
pub fn variables(expression: &str) -> Vec<String> {
    tokenize(expression)
        .filter_map(|t| match t {
            Token::Var(name) => Some(name),
            _ => None,
        })
        .unique_by(|name| name.to_ascii_lowercase())
        .collect()
}

/// Parse and evaluate in one step.
pub fn evaluate(expression: &str, bindings: &Bindings) -> Result<bool> {
    Ok(Expression::parse(expression)?.evaluate(bindings))
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        loop {
            match self.peek() {
                Some(Token::Or) => {
                    self.pos += 1;
                    let right = self.parse_and()?;
                    left = Expr::Or(Box::new(left), Box::new(right));
                }
                Some(Token::Xor) => {
                    self.pos += 1;
                    let right = self.parse_and()?;
                    left = Expr::Xor(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Var(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ContextError::Expression("expected `)`".into())),
                }
            }
            Some(t) => Err(ContextError::Expression(format!(
                "expected operand, found `{t}`"
            ))),
            None => Err(ContextError::Expression("expected operand".into())),
        }
    }
}
