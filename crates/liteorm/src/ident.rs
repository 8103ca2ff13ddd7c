//! Safe SQL identifier handling.
//!
//! [`Ident`] is a validated table or column name. Identifiers are rendered with
//! SQLite double quotes (`"name"`, embedded `"` doubled) so that reserved words
//! and mixed-case names survive DDL and DML unchanged.
//!
//! # Example
//! ```
//! use liteorm::Ident;
//!
//! let t = Ident::new("Order")?;
//! assert_eq!(t.to_sql(), r#""Order""#);
//! assert_eq!(t.to_sql_minimal(), r#""Order""#);
//! assert_eq!(Ident::new("price")?.to_sql_minimal(), "price");
//! # Ok::<(), liteorm::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// SQLite keywords that must be quoted when used as identifiers.
const KEYWORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "always", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast",
    "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross",
    "current", "current_date", "current_time", "current_timestamp", "database", "default",
    "deferrable", "deferred", "delete", "desc", "detach", "distinct", "do", "drop", "each",
    "else", "end", "escape", "except", "exclude", "exclusive", "exists", "explain", "fail",
    "filter", "first", "following", "for", "foreign", "from", "full", "generated", "glob",
    "group", "groups", "having", "if", "ignore", "immediate", "in", "index", "indexed",
    "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull", "join",
    "key", "last", "left", "like", "limit", "match", "materialized", "natural", "no", "not",
    "nothing", "notnull", "null", "nulls", "of", "offset", "on", "or", "order", "others",
    "outer", "over", "partition", "plan", "pragma", "preceding", "primary", "query", "raise",
    "range", "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "returning", "right", "rollback", "row", "rows", "savepoint", "select", "set",
    "table", "temp", "temporary", "then", "ties", "to", "transaction", "trigger", "unbounded",
    "union", "unique", "update", "using", "vacuum", "values", "view", "virtual", "when",
    "where", "window", "with", "without",
];

/// A validated SQL identifier (table or column name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    /// Validate a raw name. Any character except NUL is accepted.
    pub fn new(name: impl Into<String>) -> OrmResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(OrmError::config("Identifier cannot be empty"));
        }
        if name.contains('\0') {
            return Err(OrmError::config("Identifier cannot contain NUL character"));
        }
        Ok(Self(name))
    }

    /// The unquoted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the identifier, always quoted.
    pub fn to_sql(&self) -> String {
        quote(&self.0)
    }

    /// Render the identifier bare when it is a plain lowercase name that is not
    /// a keyword, quoted otherwise.
    pub fn to_sql_minimal(&self) -> String {
        if is_plain(&self.0) {
            self.0.clone()
        } else {
            quote(&self.0)
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Quote a name with SQLite double quotes, doubling embedded quotes.
pub fn quote(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out
}

/// Quote a name only when it would not survive as a bare identifier.
pub fn quote_minimal(name: &str) -> String {
    if is_plain(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

/// Whether `name` is a keyword-free `[a-z_][a-z0-9_]*` identifier.
pub fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return false,
    }
    if !chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return false;
    }
    !is_keyword(name)
}

/// Whether `name` is a SQLite keyword (case-insensitive).
pub fn is_keyword(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    KEYWORDS.binary_search(&lower.as_str()).is_ok()
}

/// Extract the first double-quoted identifier from a SQL fragment.
///
/// Escaped quotes (`""`) inside the identifier are unescaped. Single-quoted
/// string literals are skipped. Returns `None` when no complete quoted
/// identifier is found.
pub fn first_quoted(sql: &str) -> Option<String> {
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => in_string = true,
            '"' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                name.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(ch) => name.push(ch),
                        None => return None,
                    }
                }
                return if name.is_empty() { None } else { Some(name) };
            }
            _ => {}
        }
    }
    None
}
