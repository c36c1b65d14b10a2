//! A restricted arithmetic evaluator for conversion formulas.
//!
//! Formulas are expressions over a single variable `x`: numeric literals,
//! `+ - * / ^`, unary signs and parentheses. Nothing else is accepted, so a
//! catalog can never smuggle in anything beyond arithmetic.
//!
//! ```
//! use openweather_archive::Expression;
//!
//! let f_to_c = Expression::parse("(x - 32) * 5 / 9").unwrap();
//! assert_eq!(f_to_c.eval(212.0).unwrap(), 100.0);
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unknown identifier '{0}', only 'x' is allowed")]
    UnknownIdentifier(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(f64),
    Var,
    Neg(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Var,
    Op(Op),
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Var => f.write_str("x"),
            Token::Op(op) => f.write_str(match op {
                Op::Add => "+",
                Op::Sub => "-",
                Op::Mul => "*",
                Op::Div => "/",
                Op::Pow => "^",
            }),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

/// A parsed single-variable formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.expr()?;
        if let Some(token) = parser.peek() {
            return Err(ExpressionError::UnexpectedToken(token.to_string()));
        }
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// Evaluates the formula with `x` bound to `value`.
    pub fn eval(&self, value: f64) -> Result<f64, ExpressionError> {
        let result = eval_node(&self.root, value)?;
        if result.is_finite() {
            Ok(result)
        } else {
            Err(ExpressionError::NonFinite)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn eval_node(node: &Node, x: f64) -> Result<f64, ExpressionError> {
    Ok(match node {
        Node::Number(n) => *n,
        Node::Var => x,
        Node::Neg(inner) => -eval_node(inner, x)?,
        Node::Binary(op, lhs, rhs) => {
            let l = eval_node(lhs, x)?;
            let r = eval_node(rhs, x)?;
            match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => {
                    if r == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    l / r
                }
                Op::Pow => l.powf(r),
            }
        }
    })
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(match ch {
                    '+' => Op::Add,
                    '-' => Op::Sub,
                    '*' => Op::Mul,
                    '/' => Op::Div,
                    _ => Op::Pow,
                }));
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent, e.g. 1.5e-3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if ident != "x" {
                    return Err(ExpressionError::UnknownIdentifier(ident));
                }
                tokens.push(Token::Var);
            }
            other => return Err(ExpressionError::UnexpectedChar { ch: other, pos: i }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.term()?;
        while let Some(Token::Op(op @ (Op::Add | Op::Sub))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            node = Node::Binary(op, Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.unary()?;
        while let Some(Token::Op(op @ (Op::Mul | Op::Div))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            node = Node::Binary(op, Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<Node, ExpressionError> {
        match self.peek() {
            Some(Token::Op(Op::Sub)) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?, right associative
    fn power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.primary()?;
        if let Some(Token::Op(Op::Pow)) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(Op::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    // primary := number | 'x' | '(' expr ')'
    fn primary(&mut self) -> Result<Node, ExpressionError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Node::Number(n)),
            Some(Token::Var) => Ok(Node::Var),
            Some(Token::Open) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    Some(other) => Err(ExpressionError::UnexpectedToken(other.to_string())),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some(other) => Err(ExpressionError::UnexpectedToken(other.to_string())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, x: f64) -> f64 {
        Expression::parse(source).unwrap().eval(x).unwrap()
    }

    #[test]
    fn test_operator_precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3", 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0.0), 3.0);
        assert_eq!(eval("2 ^ 3 ^ 2", 0.0), 512.0);
        assert_eq!(eval("-2 ^ 2", 0.0), -4.0);
        assert_eq!(eval("2 ^ -1", 0.0), 0.5);
        assert_eq!(eval("x / 25.4", 25.4), 1.0);
    }

    #[test]
    fn test_catalog_style_formulas() {
        assert!((eval("x * 3.6", 10.0) - 36.0).abs() < 1e-9);
        assert!((eval("x * 0.029529983071445", 1013.25) - 29.921).abs() < 1e-3);
        assert!((eval("(x - 32) * 5 / 9", 212.0) - 100.0).abs() < 1e-9);
        assert_eq!(eval("1.5e2 + x", 0.5), 150.5);
    }

    #[test]
    fn test_rejects_anything_but_arithmetic() {
        assert_eq!(
            Expression::parse("__import__('os')"),
            Err(ExpressionError::UnknownIdentifier("__import__".into()))
        );
        assert_eq!(
            Expression::parse("value * 2"),
            Err(ExpressionError::UnknownIdentifier("value".into()))
        );
        assert!(matches!(
            Expression::parse("x; 1"),
            Err(ExpressionError::UnexpectedChar { ch: ';', .. })
        ));
        assert_eq!(Expression::parse("   "), Err(ExpressionError::Empty));
        assert_eq!(Expression::parse("(x + 1"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(
            Expression::parse("x 2"),
            Err(ExpressionError::UnexpectedToken("2".into()))
        );
    }

    #[test]
    fn test_evaluation_failures() {
        let expr = Expression::parse("1 / x").unwrap();
        assert_eq!(expr.eval(0.0), Err(ExpressionError::DivisionByZero));
        let expr = Expression::parse("x ^ 0.5").unwrap();
        assert_eq!(expr.eval(-1.0), Err(ExpressionError::NonFinite));
    }
}
