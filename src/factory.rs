use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::context::{Context, ContextKind};
use crate::errors::{ContextError, Result};

/// A context definition as it comes out of the store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContextRow {
    pub uid: u64,
    #[serde(rename = "type")]
    pub type_tag: String,
    pub title: String,
    pub alias: String,
    pub configuration: Map<String, Value>,
    pub invert: bool,
    pub use_session: bool,
    pub disabled: bool,
    pub hidden_in_editor: bool,
    pub tstamp: i64,
}

impl ContextRow {
    pub fn new(uid: u64, type_tag: &str) -> Self {
        Self {
            uid,
            type_tag: type_tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.configuration
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// String configuration value; missing or non-string values read as empty.
    pub fn field(&self, key: &str) -> &str {
        self.configuration
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// How a builder's products may be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// One context per row.
    PerRow,
    /// A single shared instance. Contexts carry per-row state, so this is rejected.
    Shared,
}

/// Turns a row's configuration into a [`ContextKind`].
pub trait KindBuilder: Send + Sync {
    fn type_tag(&self) -> &'static str;
    fn lifecycle(&self) -> Lifecycle {
        Lifecycle::PerRow
    }
    fn build(&self, row: &ContextRow) -> Result<ContextKind>;
}

/// Type tag → builder table. A tag mapped to `None` is known but has no
/// implementation.
#[derive(Clone, Default)]
pub struct KindRegistry {
    inner: Arc<HashMap<String, Option<Arc<dyn KindBuilder>>>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(builtins::Ip);
        reg.register(builtins::Domain);
        reg.register(builtins::HttpHeader);
        reg.register(builtins::QueryParameter);
        reg.register(builtins::SessionFlag);
        reg.register(builtins::Combination);
        reg
    }

    pub fn register<B: KindBuilder + 'static>(&mut self, builder: B) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(builder.type_tag().to_string(), Some(Arc::new(builder)));
    }

    /// Declare a tag without an implementation.
    pub fn register_unimplemented(&mut self, tag: &str) {
        Arc::make_mut(&mut self.inner).insert(tag.to_string(), None);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn KindBuilder>> {
        self.inner.get(tag).cloned().flatten()
    }
}

/// Builds [`Context`]s from store rows.
#[derive(Clone)]
pub struct ContextFactory {
    kinds: KindRegistry,
}

impl Default for ContextFactory {
    fn default() -> Self {
        Self::new(KindRegistry::with_builtins())
    }
}

impl ContextFactory {
    pub fn new(kinds: KindRegistry) -> Self {
        Self { kinds }
    }

    /// `Ok(None)` for rows whose type is empty, unknown or unimplemented;
    /// such rows usually belong to types from modules that are not loaded.
    pub fn create(&self, row: &ContextRow) -> Result<Option<Context>> {
        let tag = row.type_tag.trim();
        if tag.is_empty() {
            warn!(uid = row.uid, "context row without type, skipped");
            return Ok(None);
        }
        let builder = match self.kinds.get(tag) {
            Some(b) => b,
            None => {
                warn!(uid = row.uid, tag, "no implementation for context type, skipped");
                return Ok(None);
            }
        };
        if builder.lifecycle() == Lifecycle::Shared {
            return Err(ContextError::SharedInstance {
                tag: tag.to_string(),
            });
        }
        let kind = builder.build(row)?;
        Ok(Some(
            Context::new(row.uid, kind)
                .with_title(&row.title)
                .with_alias(&row.alias)
                .with_invert(row.invert)
                .with_use_session(row.use_session)
                .with_disabled(row.disabled)
                .with_hidden_in_editor(row.hidden_in_editor)
                .with_last_modified(row.tstamp),
        ))
    }

    /// Build every row, dropping the ones [`create`](Self::create) skips.
    pub fn create_all(&self, rows: &[ContextRow]) -> Result<Vec<Context>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(ctx) = self.create(row)? {
                out.push(ctx);
            }
        }
        Ok(out)
    }
}

pub mod builtins {
    use super::*;

    pub struct Ip;
    impl KindBuilder for Ip {
        fn type_tag(&self) -> &'static str { "ip" }
        fn build(&self, row: &ContextRow) -> Result<ContextKind> {
            Ok(ContextKind::Ip { ranges: row.field("field_ip").to_string() })
        }
    }

    pub struct Domain;
    impl KindBuilder for Domain {
        fn type_tag(&self) -> &'static str { "domain" }
        fn build(&self, row: &ContextRow) -> Result<ContextKind> {
            Ok(ContextKind::Domain { patterns: row.field("field_domain").to_string() })
        }
    }

    pub struct HttpHeader;
    impl KindBuilder for HttpHeader {
        fn type_tag(&self) -> &'static str { "httpheader" }
        fn build(&self, row: &ContextRow) -> Result<ContextKind> {
            Ok(ContextKind::HttpHeader {
                name: row.field("field_name").to_string(),
                values: row.field("field_values").to_string(),
            })
        }
    }

    pub struct QueryParameter;
    impl KindBuilder for QueryParameter {
        fn type_tag(&self) -> &'static str { "getparam" }
        fn build(&self, row: &ContextRow) -> Result<ContextKind> {
            Ok(ContextKind::QueryParameter {
                name: row.field("field_name").to_string(),
                values: row.field("field_values").to_string(),
            })
        }
    }

    pub struct SessionFlag;
    impl KindBuilder for SessionFlag {
        fn type_tag(&self) -> &'static str { "session" }
        fn build(&self, row: &ContextRow) -> Result<ContextKind> {
            Ok(ContextKind::SessionFlag { variable: row.field("field_variable").to_string() })
        }
    }

    pub struct Combination;
    impl KindBuilder for Combination {
        fn type_tag(&self) -> &'static str { "combination" }
        fn build(&self, row: &ContextRow) -> Result<ContextKind> {
            Ok(ContextKind::Combination { expression: row.field("field_expression").to_string() })
        }
    }
}
