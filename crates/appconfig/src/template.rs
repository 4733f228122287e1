//! Placeholder templates resolved against a [`ConfigStore`].
//!
//! Grammar: literal text with zero or more placeholders.
//!
//! - `{KEY}` substitutes the raw value of `KEY`.
//! - `{OUTER.INNER}` parses `OUTER` as a JSON object and yields its `INNER`
//!   attribute. Only valid as the *entire* template; inside a longer string it
//!   is rejected with [`Error::EmbeddedAttribute`] before any lookup is made.
//!
//! Identifiers are runs of alphanumerics and `_`. Braces that do not enclose a
//! well-formed placeholder are kept as literal text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::store::ConfigStore;

/// One lexical piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    /// `{KEY}`
    Key(String),
    /// `{KEY.ATTRIBUTE}`
    Attribute { key: String, attribute: String },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    tokens: Vec<Token>,
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Parse the text after an opening brace. Returns the token and the number
/// of bytes consumed including the closing brace.
fn placeholder(after_open: &str) -> Option<(Token, usize)> {
    let close = after_open.find('}')?;
    let inner = &after_open[..close];

    let token = match inner.split_once('.') {
        Some((key, attribute)) if is_ident(key) && is_ident(attribute) => Token::Attribute {
            key: key.to_string(),
            attribute: attribute.to_string(),
        },
        Some(_) => return None,
        None if is_ident(inner) => Token::Key(inner.to_string()),
        None => return None,
    };

    Some((token, close + 1))
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match placeholder(after) {
                Some((token, consumed)) => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(token);
                    rest = &after[consumed..];
                }
                None => {
                    literal.push('{');
                    rest = after;
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Self {
            source: source.to_string(),
            tokens,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True when the template has no placeholders.
    pub fn is_literal(&self) -> bool {
        self.tokens.iter().all(|t| matches!(t, Token::Literal(_)))
    }

    /// `Some((key, attribute))` when the whole template is one `{KEY.ATTR}`.
    pub fn whole_attribute(&self) -> Option<(&str, &str)> {
        match self.tokens.as_slice() {
            [Token::Attribute { key, attribute }] => Some((key, attribute)),
            _ => None,
        }
    }

    /// Keys this template will read, in order of appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Literal(_) => None,
            Token::Key(key) | Token::Attribute { key, .. } => Some(key.as_str()),
        })
    }
}

fn embedded(key: &str, attribute: &str, template: &str) -> Error {
    Error::EmbeddedAttribute {
        placeholder: format!("{key}.{attribute}"),
        template: template.to_string(),
    }
}

/// Resolves templates against one store and label.
///
/// Values are fetched once per key for the lifetime of the resolver.
pub struct Resolver {
    store: Arc<dyn ConfigStore>,
    label: Option<String>,
    cache: Mutex<HashMap<String, String>>,
}

impl Resolver {
    pub fn new(store: Arc<dyn ConfigStore>, label: Option<&str>) -> Self {
        Self {
            store,
            label: label.map(str::to_string),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Same store, different label, fresh cache.
    pub fn with_label(&self, label: Option<&str>) -> Self {
        Self::new(Arc::clone(&self.store), label)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fetch a value that may be missing or empty.
    pub fn lookup_optional(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache().get(key) {
            return Ok(Some(value.clone()));
        }

        let entry = self.store.get(key, self.label())?;
        match entry {
            Some(entry) if !entry.value.is_empty() => {
                log::debug!("Resolved config key '{key}'");
                self.cache().insert(key.to_string(), entry.value.clone());
                Ok(Some(entry.value))
            }
            _ => Ok(None),
        }
    }

    /// Fetch a required, non-empty value.
    pub fn lookup(&self, key: &str) -> Result<String> {
        if let Some(value) = self.lookup_optional(key)? {
            return Ok(value);
        }
        // Distinguish "absent" from "present but empty" for the error.
        let label = self.label.clone();
        match self.store.get(key, self.label())? {
            Some(_) => Err(Error::EmptyValue {
                key: key.to_string(),
                label,
            }),
            None => Err(Error::MissingKey {
                key: key.to_string(),
                label,
            }),
        }
    }

    /// Parse `key` as a JSON object.
    pub fn json_blob(&self, key: &str) -> Result<Map<String, Value>> {
        let raw = self.lookup(key)?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|source| Error::InvalidJson {
            key: key.to_string(),
            source,
        })?;
        match parsed {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// `value[attribute]` of the JSON blob stored at `key`, as a string.
    pub fn attribute(&self, key: &str, attribute: &str) -> Result<String> {
        let blob = self.json_blob(key)?;
        match blob.get(attribute) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) => Ok(String::new()),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::MissingAttribute {
                key: key.to_string(),
                attribute: attribute.to_string(),
            }),
        }
    }

    /// Expand every placeholder in `template`.
    pub fn resolve(&self, template: &str) -> Result<String> {
        let parsed = Template::parse(template);

        if let Some((key, attribute)) = parsed.whole_attribute() {
            return self.attribute(key, attribute);
        }

        // Reject embedded attribute placeholders before touching the store.
        if let Some(Token::Attribute { key, attribute }) = parsed
            .tokens()
            .iter()
            .find(|t| matches!(t, Token::Attribute { .. }))
        {
            return Err(embedded(key, attribute, template));
        }

        let mut out = String::with_capacity(template.len());
        for token in parsed.tokens() {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Key(key) => out.push_str(&self.lookup(key)?),
                Token::Attribute { key, attribute } => {
                    return Err(embedded(key, attribute, template));
                }
            }
        }
        Ok(out)
    }

    /// Resolve `template` only when present and non-empty.
    pub fn resolve_opt(&self, template: Option<&str>) -> Result<Option<String>> {
        match template {
            Some(t) if !t.is_empty() => self.resolve(t).map(Some),
            _ => Ok(None),
        }
    }

    /// Resolve every string leaf of a JSON document in place.
    pub fn resolve_value(&self, value: &mut Value) -> Result<()> {
        match value {
            Value::String(s) => {
                *s = self.resolve(s)?;
            }
            Value::Array(items) => {
                for item in items {
                    self.resolve_value(item)?;
                }
            }
            Value::Object(map) => {
                for (_, item) in map.iter_mut() {
                    self.resolve_value(item)?;
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
        Ok(())
    }
}
