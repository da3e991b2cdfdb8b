//! Boolean rule conditions over named signal values.
//!
//! A condition such as `momentum_rsi < 30 AND signal_trend_macd == BUY` is parsed once into
//! an [`Expr`] tree and evaluated against a [`SignalMap`] for every analysis. `AND` and `OR`
//! share one precedence level and chain strictly left to right, so `a OR b AND c` means
//! `(a OR b) AND c`. Parentheses make any other grouping explicit.

use crate::error::{EngineError, EngineResult};
use crate::models::SignalAction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SignalValue {
    Number(f64),
    Flag(bool),
    Action(SignalAction),
}

impl SignalValue {
    fn is_truthy(&self) -> bool {
        match self {
            SignalValue::Number(value) => value.is_finite() && *value != 0.0,
            SignalValue::Flag(flag) => *flag,
            SignalValue::Action(action) => *action != SignalAction::Hold,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            SignalValue::Number(value) => Some(*value),
            SignalValue::Flag(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            SignalValue::Action(_) => None,
        }
    }
}

/// Signal values keyed by lowercase name.
pub type SignalMap = HashMap<String, SignalValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Comparator {
    fn symbol(self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
        }
    }

    fn compare_numbers(self, left: f64, right: f64) -> bool {
        match self {
            Comparator::Greater => left > right,
            Comparator::GreaterOrEqual => left >= right,
            Comparator::Less => left < right,
            Comparator::LessOrEqual => left <= right,
            Comparator::Equal => left == right,
            Comparator::NotEqual => left != right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Signal(String),
    Number(f64),
    Action(SignalAction),
}

impl Operand {
    fn resolve(&self, signals: &SignalMap) -> Option<SignalValue> {
        match self {
            Operand::Signal(name) => signals.get(name).copied(),
            Operand::Number(value) => Some(SignalValue::Number(*value)),
            Operand::Action(action) => Some(SignalValue::Action(*action)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Signal(name) => f.write_str(name),
            Operand::Number(value) => write!(f, "{}", value),
            Operand::Action(action) => f.write_str(action.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        left: Operand,
        op: Comparator,
        right: Operand,
    },
    Truthy(Operand),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn evaluate(&self, signals: &SignalMap) -> bool {
        match self {
            Expr::Compare { left, op, right } => {
                match (left.resolve(signals), right.resolve(signals)) {
                    (Some(SignalValue::Action(a)), Some(SignalValue::Action(b))) => match op {
                        Comparator::Equal => a == b,
                        Comparator::NotEqual => a != b,
                        _ => false,
                    },
                    (Some(a), Some(b)) => match (a.as_number(), b.as_number()) {
                        (Some(x), Some(y)) => op.compare_numbers(x, y),
                        _ => false,
                    },
                    _ => false,
                }
            }
            Expr::Truthy(operand) => operand
                .resolve(signals)
                .map(|value| value.is_truthy())
                .unwrap_or(false),
            Expr::Not(inner) => !inner.evaluate(signals),
            Expr::And(left, right) => left.evaluate(signals) && right.evaluate(signals),
            Expr::Or(left, right) => left.evaluate(signals) || right.evaluate(signals),
        }
    }

    fn collect_signals<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Compare { left, right, .. } => {
                for operand in [left, right] {
                    if let Operand::Signal(name) = operand {
                        names.insert(name);
                    }
                }
            }
            Expr::Truthy(Operand::Signal(name)) => {
                names.insert(name);
            }
            Expr::Truthy(_) => {}
            Expr::Not(inner) => inner.collect_signals(names),
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_signals(names);
                right.collect_signals(names);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { left, op, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Expr::Truthy(operand) => write!(f, "{}", operand),
            Expr::Not(inner) => write!(f, "NOT ({})", inner),
            Expr::And(left, right) => write!(f, "({} AND {})", left, right),
            Expr::Or(left, right) => write!(f, "({} OR {})", left, right),
        }
    }
}

/// A parsed rule condition that keeps its source text for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> EngineResult<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(EngineError::condition_parse(source, "condition is empty"));
        }
        let mut parser = Parser {
            source,
            tokens,
            position: 0,
        };
        let expr = parser.parse_chain()?;
        if let Some(token) = parser.peek() {
            return Err(EngineError::condition_parse(
                source,
                format!("unexpected {}", token),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, signals: &SignalMap) -> bool {
        self.expr.evaluate(signals)
    }

    /// Signal names referenced anywhere in the condition.
    pub fn signal_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.expr.collect_signals(&mut names);
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Cmp(Comparator),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier `{}`", name),
            Token::Number(value) => write!(f, "number {}", value),
            Token::Text(text) => write!(f, "text '{}'", text),
            Token::Cmp(op) => write!(f, "operator `{}`", op.symbol()),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Not => f.write_str("NOT"),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
        }
    }
}

fn tokenize(source: &str) -> EngineResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '>' | '<' | '=' | '!' => {
                let next = chars.get(i + 1).copied();
                let (token, width) = match (c, next) {
                    ('>', Some('=')) => (Token::Cmp(Comparator::GreaterOrEqual), 2),
                    ('<', Some('=')) => (Token::Cmp(Comparator::LessOrEqual), 2),
                    ('=', Some('=')) => (Token::Cmp(Comparator::Equal), 2),
                    ('!', Some('=')) => (Token::Cmp(Comparator::NotEqual), 2),
                    ('>', _) => (Token::Cmp(Comparator::Greater), 1),
                    ('<', _) => (Token::Cmp(Comparator::Less), 1),
                    ('=', _) => (Token::Cmp(Comparator::Equal), 1),
                    _ => (Token::Not, 1),
                };
                tokens.push(token);
                i += width;
            }
            '&' | '|' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(EngineError::condition_parse(
                        source,
                        format!("expected `{}{}`", c, c),
                    ));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
                i += 2;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == c)
                    .ok_or_else(|| EngineError::condition_parse(source, "unterminated string"))?;
                tokens.push(Token::Text(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text.parse::<f64>().map_err(|_| {
                    EngineError::condition_parse(source, format!("invalid number `{}`", text))
                })?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(EngineError::condition_parse(
                    source,
                    format!("unexpected character `{}`", other),
                ))
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::condition_parse(self.source, message)
    }

    /// unary ((AND | OR) unary)*, folded left to right
    fn parse_chain(&mut self) -> EngineResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.next();
                    let right = self.parse_unary()?;
                    expr = Expr::And(Box::new(expr), Box::new(right));
                }
                Some(Token::Or) => {
                    self.next();
                    let right = self.parse_unary()?;
                    expr = Expr::Or(Box::new(expr), Box::new(right));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_unary(&mut self) -> EngineResult<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.next();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> EngineResult<Expr> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.next();
            let inner = self.parse_chain()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                Some(token) => Err(self.error(format!("expected `)` but found {}", token))),
                None => Err(self.error("missing `)`")),
            };
        }

        let left = self.parse_operand()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.next();
            let right = self.parse_operand()?;
            return Ok(Expr::Compare { left, op, right });
        }

        match left {
            Operand::Signal(_) => Ok(Expr::Truthy(left)),
            other => Err(self.error(format!("literal {} needs a comparison", other))),
        }
    }

    fn parse_operand(&mut self) -> EngineResult<Operand> {
        match self.next() {
            Some(Token::Number(value)) => Ok(Operand::Number(value)),
            Some(Token::Text(text)) => text
                .parse::<SignalAction>()
                .map(Operand::Action)
                .map_err(|_| self.error(format!("unknown action '{}'", text))),
            Some(Token::Ident(word)) => Ok(match word.to_ascii_uppercase().as_str() {
                "BUY" => Operand::Action(SignalAction::Buy),
                "SELL" => Operand::Action(SignalAction::Sell),
                "HOLD" => Operand::Action(SignalAction::Hold),
                _ => Operand::Signal(word.to_ascii_lowercase()),
            }),
            Some(token) => Err(self.error(format!("expected a value but found {}", token))),
            None => Err(self.error("expected a value but the condition ended")),
        }
    }
}
