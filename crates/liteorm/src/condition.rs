//! WHERE-clause builder.
//!
//! A [`Condition`] accumulates tokens: predicates, the bare `OR` connective and
//! group parentheses. Conjunction is implicit: rendering inserts `AND` between
//! two neighbouring tokens unless the left one is `OR` or `(`, or the right one
//! is `OR` or `)`. Disjunction and grouping are always explicit, which gives
//! the natural precedence `a OR (b AND c)` for
//!
//! ```
//! use liteorm::Condition;
//!
//! let c = Condition::new()
//!     .equals([("a", 1)])
//!     .or()
//!     .group(|c| c.equals([("b", 2)]).equals([("c", 3)]));
//! assert_eq!(c.sql(), "a = 1 OR ( b = 2 AND c = 3 )");
//! ```
//!
//! Predicates keep their operands unrendered until [`Condition::render`], so a
//! table can coerce each right-hand side by the declared type of its column.

use crate::coerce::{quote_text, to_literal};
use crate::ident::quote_minimal;
use crate::schema::Schema;
use crate::value::Operand;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
enum PredicateKind {
    Equals(Operand),
    In(Vec<Operand>),
    Between(Operand, Operand),
    Like {
        text: String,
        leading: bool,
        trailing: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    column: String,
    kind: PredicateKind,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Predicate(Predicate),
    Or,
    Open,
    Close,
}

impl Token {
    fn joins_left(&self) -> bool {
        !matches!(self, Token::Or | Token::Open)
    }

    fn joins_right(&self) -> bool {
        !matches!(self, Token::Or | Token::Close)
    }
}

/// Fluent WHERE-clause builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    tokens: Vec<Token>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference another column as the right-hand side of a predicate.
    pub fn field(name: impl Into<String>) -> Operand {
        Operand::column(name)
    }

    /// Whether nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn push(&mut self, column: impl Into<String>, kind: PredicateKind) {
        self.tokens.push(Token::Predicate(Predicate {
            column: column.into(),
            kind,
        }));
    }

    /// `col = value` for every pair, in the given order.
    pub fn equals<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        for (col, val) in pairs {
            self.push(col, PredicateKind::Equals(val.into()));
        }
        self
    }

    /// `col IN (v1, v2, ...)` for every pair. An empty list never matches.
    pub fn in_list<I, K, L, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        for (col, vals) in pairs {
            let vals = vals.into_iter().map(Into::into).collect();
            self.push(col, PredicateKind::In(vals));
        }
        self
    }

    /// `col BETWEEN lo AND hi` for every pair.
    pub fn between<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, (V, V))>,
        K: Into<String>,
        V: Into<Operand>,
    {
        for (col, (lo, hi)) in pairs {
            self.push(col, PredicateKind::Between(lo.into(), hi.into()));
        }
        self
    }

    fn like<I, K, V>(mut self, pairs: I, leading: bool, trailing: bool) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (col, text) in pairs {
            self.push(
                col,
                PredicateKind::Like {
                    text: text.into(),
                    leading,
                    trailing,
                },
            );
        }
        self
    }

    /// `col LIKE '%text%'`
    pub fn contains<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.like(pairs, true, true)
    }

    /// `col LIKE 'text%'`
    pub fn starts_with<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.like(pairs, false, true)
    }

    /// `col LIKE '%text'`
    pub fn ends_with<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.like(pairs, true, false)
    }

    /// Append a bare `OR`.
    pub fn or(mut self) -> Self {
        self.tokens.push(Token::Or);
        self
    }

    /// Wrap whatever `f` appends in parentheses. Groups nest freely.
    pub fn group(mut self, f: impl FnOnce(Condition) -> Condition) -> Self {
        self.tokens.push(Token::Open);
        let mut inner = f(self);
        inner.tokens.push(Token::Close);
        inner
    }

    /// Render without column type information.
    pub fn sql(&self) -> String {
        self.render(None)
    }

    /// Render, coercing each right-hand side by its column's declared type.
    pub fn render(&self, schema: Option<&Schema>) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.tokens.len() * 2);
        let mut prev: Option<&Token> = None;

        for token in &self.tokens {
            if let Some(left) = prev {
                if left.joins_left() && token.joins_right() {
                    parts.push("AND".to_string());
                }
            }
            parts.push(match token {
                Token::Predicate(p) => render_predicate(p, schema),
                Token::Or => "OR".to_string(),
                Token::Open => "(".to_string(),
                Token::Close => ")".to_string(),
            });
            prev = Some(token);
        }

        parts.join(" ")
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql())
    }
}

fn render_predicate(p: &Predicate, schema: Option<&Schema>) -> String {
    let ty = schema.and_then(|s| s.column_type(&p.column));
    let col = quote_minimal(&p.column);
    match &p.kind {
        PredicateKind::Equals(v) => format!("{col} = {}", to_literal(ty, v)),
        PredicateKind::In(vals) if vals.is_empty() => "1=0".to_string(),
        PredicateKind::In(vals) => {
            let list: Vec<String> = vals.iter().map(|v| to_literal(ty, v)).collect();
            format!("{col} IN ({})", list.join(", "))
        }
        PredicateKind::Between(lo, hi) => {
            format!(
                "{col} BETWEEN {} AND {}",
                to_literal(ty, lo),
                to_literal(ty, hi)
            )
        }
        PredicateKind::Like {
            text,
            leading,
            trailing,
        } => {
            let mut pattern = String::with_capacity(text.len() + 2);
            if *leading {
                pattern.push('%');
            }
            pattern.push_str(text);
            if *trailing {
                pattern.push('%');
            }
            format!("{col} LIKE {}", quote_text(&pattern))
        }
    }
}
