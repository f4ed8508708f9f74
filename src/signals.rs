//! Collaborators the engine reads request state through.
//!
//! The traits are the seams; the `Memory*`/`RequestSignals` types are plain
//! in-memory implementations used by tests and the `rctx` binary.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Raw request signals.
pub trait SignalSource {
    fn remote_address(&self) -> String;
    fn host(&self) -> String;
    /// Header lookup is case-insensitive on `name`.
    fn header(&self, name: &str) -> Option<String>;
    fn query_param(&self, name: &str) -> Option<String>;
}

/// Per-visitor session storage.
pub trait SessionStore {
    fn session_value(&self, key: &str) -> Option<Value>;
    fn set_session_value(&mut self, key: &str, value: Value);
    /// Whether a frontend user session exists at all.
    fn has_fe_user(&self) -> bool;
}

/// One request's view of its collaborators.
pub struct Request<'a> {
    pub signals: &'a dyn SignalSource,
    pub session: &'a mut dyn SessionStore,
}

impl<'a> Request<'a> {
    pub fn new(signals: &'a dyn SignalSource, session: &'a mut dyn SessionStore) -> Self {
        Self { signals, session }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestSignals {
    pub remote_address: String,
    pub host: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl RequestSignals {
    pub fn new(remote_address: &str, host: &str) -> Self {
        Self {
            remote_address: remote_address.to_string(),
            host: host.to_string(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }
}

impl SignalSource for RequestSignals {
    fn remote_address(&self) -> String {
        self.remote_address.clone()
    }

    fn host(&self) -> String {
        self.host.clone()
    }

    fn header(&self, name: &str) -> Option<String> {
        let wanted = name.to_ascii_lowercase();
        // Deserialized fixtures may carry mixed-case keys.
        self.headers
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == wanted)
            .map(|(_, v)| v.clone())
    }

    fn query_param(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }
}

/// In-memory session. `active: false` models a visitor without a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySession {
    active: bool,
    values: HashMap<String, Value>,
    #[serde(skip)]
    writes: usize,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self {
            active: true,
            values: HashMap::new(),
            writes: 0,
        }
    }
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_user() -> Self {
        Self {
            active: false,
            ..Self::default()
        }
    }

    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    /// Number of `set_session_value` calls seen so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SessionStore for MemorySession {
    fn session_value(&self, key: &str) -> Option<Value> {
        if !self.active {
            return None;
        }
        self.values.get(key).cloned()
    }

    fn set_session_value(&mut self, key: &str, value: Value) {
        if !self.active {
            return;
        }
        self.writes += 1;
        self.values.insert(key.to_string(), value);
    }

    fn has_fe_user(&self) -> bool {
        self.active
    }
}
