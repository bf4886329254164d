//! Threshold predicates for grading rules.
//!
//! Rule strings such as `"mean + 0.5*std_dev > total_score >= mean - 0.5*std_dev"`
//! are parsed once, when a rule set is loaded, into a small typed tree and
//! then evaluated against per-student bindings. The grammar only admits
//! numeric literals, the grading variables, `+ - * /`, the comparisons
//! `< <= > >= ==` (chainable), and `and` / `or`:
//!
//! ```text
//! predicate  := or_expr
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := comparison ("and" comparison)*
//! comparison := arith (cmp_op arith)*
//! arith      := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := ("-" | "+") unary | primary
//! primary    := NUMBER | IDENT | "(" or_expr ")"
//! ```
//!
//! Everything else (calls, attribute access, assignment, strings, unknown
//! names) is rejected at parse time.

use std::fmt;

use thiserror::Error;

/// Parenthesis/unary nesting limit.
const MAX_DEPTH: usize = 64;

/// Errors produced while compiling a predicate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("malformed number '{text}' at offset {offset}")]
    BadNumber { text: String, offset: usize },

    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("unknown name '{name}' at offset {offset}")]
    UnknownName { name: String, offset: usize },

    #[error("'{name}' is not available in {scope} predicates (offset {offset})")]
    UnboundVariable {
        name: &'static str,
        scope: Scope,
        offset: usize,
    },

    #[error("{message} at offset {offset}")]
    Type { message: &'static str, offset: usize },

    #[error("expression nested too deeply")]
    TooDeep,
}

/// Which variables a predicate may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `total_score` only.
    Absolute,
    /// `total_score`, `mean` and `std_dev`.
    Relative,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Absolute => write!(f, "absolute"),
            Scope::Relative => write!(f, "relative"),
        }
    }
}

/// A grading variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    TotalScore,
    Mean,
    StdDev,
}

impl Variable {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "total_score" => Some(Variable::TotalScore),
            "mean" => Some(Variable::Mean),
            "std_dev" => Some(Variable::StdDev),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Variable::TotalScore => "total_score",
            Variable::Mean => "mean",
            Variable::StdDev => "std_dev",
        }
    }

    fn bound_in(self, scope: Scope) -> bool {
        match scope {
            Scope::Absolute => self == Variable::TotalScore,
            Scope::Relative => true,
        }
    }
}

/// Values a predicate is evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bindings {
    pub total_score: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl Bindings {
    /// Bindings for an absolute predicate.
    pub fn score(total_score: f64) -> Self {
        Self {
            total_score,
            ..Self::default()
        }
    }

    fn get(&self, var: Variable) -> f64 {
        match var {
            Variable::TotalScore => self.total_score,
            Variable::Mean => self.mean,
            Variable::StdDev => self.std_dev,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl CmpOp {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
        }
    }
}

/// Parsed predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Var(Variable),
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `first op0 rest0 op1 rest1 ...`, evaluated pairwise like Python.
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
}

impl Expr {
    fn is_bool(&self) -> bool {
        match self {
            Expr::Compare { .. } => true,
            Expr::BinOp { op, .. } => matches!(op, BinOp::And | BinOp::Or),
            Expr::Literal(_) | Expr::Var(_) => false,
        }
    }

    fn number(&self, b: &Bindings) -> f64 {
        match self {
            Expr::Literal(v) => *v,
            Expr::Var(var) => b.get(*var),
            Expr::BinOp { op, lhs, rhs } => match op {
                BinOp::Add => lhs.number(b) + rhs.number(b),
                BinOp::Sub => lhs.number(b) - rhs.number(b),
                BinOp::Mul => lhs.number(b) * rhs.number(b),
                BinOp::Div => lhs.number(b) / rhs.number(b),
                BinOp::And | BinOp::Or => f64::from(u8::from(self.truth(b))),
            },
            Expr::Compare { .. } => f64::from(u8::from(self.truth(b))),
        }
    }

    fn truth(&self, b: &Bindings) -> bool {
        match self {
            Expr::BinOp {
                op: BinOp::And,
                lhs,
                rhs,
            } => lhs.truth(b) && rhs.truth(b),
            Expr::BinOp {
                op: BinOp::Or,
                lhs,
                rhs,
            } => lhs.truth(b) || rhs.truth(b),
            Expr::Compare { first, rest } => {
                let mut left = first.number(b);
                for (op, operand) in rest {
                    let right = operand.number(b);
                    if !op.apply(left, right) {
                        return false;
                    }
                    left = right;
                }
                true
            }
            other => other.number(b) != 0.0,
        }
    }
}

/// A compiled, boolean-typed rule predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    /// Parse and type-check `source` for the given scope.
    pub fn compile(source: &str, scope: Scope) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        if tokens.len() == 1 {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            scope,
        };
        let expr = parser.or_expr()?;
        let end = parser.peek();
        if end.kind != TokenKind::End {
            return Err(ExprError::UnexpectedToken {
                found: end.kind.describe(),
                expected: "end of expression",
                offset: end.offset,
            });
        }
        if !expr.is_bool() {
            return Err(ExprError::Type {
                message: "predicate must be a comparison or a boolean combination",
                offset: 0,
            });
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Evaluate against `bindings`. Comparisons involving NaN are false.
    pub fn evaluate(&self, bindings: &Bindings) -> bool {
        self.expr.truth(bindings)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    And,
    Or,
    Plus,
    Minus,
    Star,
    Slash,
    Cmp(CmpOp),
    LParen,
    RParen,
    End,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(v) => format!("number {v}"),
            TokenKind::Ident(name) => format!("name '{name}'"),
            TokenKind::And => "'and'".into(),
            TokenKind::Or => "'or'".into(),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Minus => "'-'".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::Slash => "'/'".into(),
            TokenKind::Cmp(op) => match op {
                CmpOp::Lt => "'<'".into(),
                CmpOp::Le => "'<='".into(),
                CmpOp::Gt => "'>'".into(),
                CmpOp::Ge => "'>='".into(),
                CmpOp::Eq => "'=='".into(),
            },
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::End => "end of expression".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'.' {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text = &source[start..i];
            let value = text.parse::<f64>().map_err(|_| ExprError::BadNumber {
                text: text.to_string(),
                offset: start,
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let kind = match &source[start..i] {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                word => TokenKind::Ident(word.to_string()),
            };
            tokens.push(Token {
                kind,
                offset: start,
            });
            continue;
        }

        let next = bytes.get(i + 1).copied();
        let (kind, width) = match (c, next) {
            (b'<', Some(b'=')) => (TokenKind::Cmp(CmpOp::Le), 2),
            (b'>', Some(b'=')) => (TokenKind::Cmp(CmpOp::Ge), 2),
            (b'=', Some(b'=')) => (TokenKind::Cmp(CmpOp::Eq), 2),
            (b'<', _) => (TokenKind::Cmp(CmpOp::Lt), 1),
            (b'>', _) => (TokenKind::Cmp(CmpOp::Gt), 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            _ => {
                let ch = source[start..].chars().next().unwrap_or('\u{fffd}');
                return Err(ExprError::UnexpectedChar { ch, offset: start });
            }
        };
        // `**` (power) is outside the grammar.
        if kind == TokenKind::Star && next == Some(b'*') {
            return Err(ExprError::UnexpectedChar {
                ch: '*',
                offset: start + 1,
            });
        }
        tokens.push(Token {
            kind,
            offset: start,
        });
        i += width;
    }

    tokens.push(Token {
        kind: TokenKind::End,
        offset: source.len(),
    });
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    scope: Scope,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with `End` and `pos` never passes it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.and_expr()?;
        while self.peek().kind == TokenKind::Or {
            let offset = self.advance().offset;
            let rhs = self.and_expr()?;
            lhs = logical(BinOp::Or, lhs, rhs, offset)?;
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.comparison()?;
        while self.peek().kind == TokenKind::And {
            let offset = self.advance().offset;
            let rhs = self.comparison()?;
            lhs = logical(BinOp::And, lhs, rhs, offset)?;
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let first_offset = self.peek().offset;
        let first = self.arith()?;
        let mut rest = Vec::new();
        while let TokenKind::Cmp(op) = self.peek().kind {
            let offset = self.advance().offset;
            let operand = self.arith()?;
            require_number(&operand, offset)?;
            rest.push((op, operand));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        require_number(&first, first_offset)?;
        Ok(Expr::Compare {
            first: Box::new(first),
            rest,
        })
    }

    fn arith(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let offset = self.advance().offset;
            let rhs = self.term()?;
            lhs = arithmetic(op, lhs, rhs, offset)?;
        }
    }

    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => return Ok(lhs),
            };
            let offset = self.advance().offset;
            let rhs = self.unary()?;
            lhs = arithmetic(op, lhs, rhs, offset)?;
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let negate = match self.peek().kind {
            TokenKind::Minus => true,
            TokenKind::Plus => false,
            _ => return self.primary(),
        };
        let offset = self.advance().offset;
        self.enter()?;
        let operand = self.unary()?;
        self.depth -= 1;
        require_number(&operand, offset)?;
        if negate {
            Ok(Expr::BinOp {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Literal(0.0)),
                rhs: Box::new(operand),
            })
        } else {
            Ok(operand)
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(v) => Ok(Expr::Literal(v)),
            TokenKind::Ident(name) => {
                let var = Variable::from_name(&name).ok_or(ExprError::UnknownName {
                    name,
                    offset: token.offset,
                })?;
                if !var.bound_in(self.scope) {
                    return Err(ExprError::UnboundVariable {
                        name: var.name(),
                        scope: self.scope,
                        offset: token.offset,
                    });
                }
                Ok(Expr::Var(var))
            }
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.or_expr()?;
                self.depth -= 1;
                let close = self.advance();
                if close.kind != TokenKind::RParen {
                    return Err(ExprError::UnexpectedToken {
                        found: close.kind.describe(),
                        expected: "')'",
                        offset: close.offset,
                    });
                }
                Ok(inner)
            }
            other => Err(ExprError::UnexpectedToken {
                found: other.describe(),
                expected: "a number, a variable or '('",
                offset: token.offset,
            }),
        }
    }
}

fn require_number(expr: &Expr, offset: usize) -> Result<(), ExprError> {
    if expr.is_bool() {
        return Err(ExprError::Type {
            message: "expected a numeric operand, found a boolean",
            offset,
        });
    }
    Ok(())
}

fn arithmetic(op: BinOp, lhs: Expr, rhs: Expr, offset: usize) -> Result<Expr, ExprError> {
    require_number(&lhs, offset)?;
    require_number(&rhs, offset)?;
    Ok(Expr::BinOp {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

fn logical(op: BinOp, lhs: Expr, rhs: Expr, offset: usize) -> Result<Expr, ExprError> {
    if !lhs.is_bool() || !rhs.is_bool() {
        return Err(ExprError::Type {
            message: "'and'/'or' operands must be comparisons",
            offset,
        });
    }
    Ok(Expr::BinOp {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}
