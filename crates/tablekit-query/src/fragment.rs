use serde_json::Value;

/// A piece of SQL text with `?` placeholders and the values bound to them,
/// in placeholder order.
///
/// An empty fragment (no text, no params) contributes nothing when joined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    /// SQL text containing one `?` per entry in `params`.
    pub sql: String,
    /// Values to bind, in placeholder order.
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// The fragment that contributes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Join non-empty fragments with `separator`, concatenating their params.
    pub fn join<I>(parts: I, separator: &str) -> Fragment
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut texts = Vec::new();
        let mut params = Vec::new();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            texts.push(part.sql);
            params.extend(part.params);
        }
        Fragment::new(texts.join(separator), params)
    }
}

/// Quote an identifier with backticks, doubling any embedded backtick.
///
/// Backtick quoting is understood by both MySQL and SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `n` comma-separated placeholders: `"?, ?, ?"`.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
