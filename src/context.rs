//! A context is a named predicate over the current request.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{trace, warn};

use crate::errors::Result;
use crate::expression::{variables, Binding, Bindings, Expression};
use crate::kinds;
use crate::signals::{Request, SessionStore};

/// The condition a context checks, with the configuration it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    Ip { ranges: String },
    Domain { patterns: String },
    HttpHeader { name: String, values: String },
    QueryParameter { name: String, values: String },
    SessionFlag { variable: String },
    Combination { expression: String },
}

impl ContextKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            ContextKind::Ip { .. } => "ip",
            ContextKind::Domain { .. } => "domain",
            ContextKind::HttpHeader { .. } => "httpheader",
            ContextKind::QueryParameter { .. } => "getparam",
            ContextKind::SessionFlag { .. } => "session",
            ContextKind::Combination { .. } => "combination",
        }
    }
}

/// Outcome of a dependency as seen by the context that depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Matched,
    NotMatched,
    /// Disabled contexts are never evaluated and count as neutral.
    Disabled,
}

impl DependencyState {
    pub fn binding(self) -> Binding {
        match self {
            DependencyState::Matched => Binding::Value(true),
            DependencyState::NotMatched => Binding::Value(false),
            DependencyState::Disabled => Binding::Disabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub uid: u64,
    pub alias: String,
    pub state: DependencyState,
}

/// Dependency bundle handed to [`Context::matches`], keyed by uid.
pub type Dependencies = BTreeMap<u64, ResolvedDependency>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    uid: u64,
    title: String,
    alias: String,
    kind: ContextKind,
    invert: bool,
    use_session: bool,
    disabled: bool,
    hidden_in_editor: bool,
    last_modified: i64,
}

impl Context {
    pub fn new(uid: u64, kind: ContextKind) -> Self {
        Self {
            uid,
            title: String::new(),
            alias: String::new(),
            kind,
            invert: false,
            use_session: false,
            disabled: false,
            hidden_in_editor: false,
            last_modified: 0,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Aliases are stored lower-cased.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = alias.trim().to_lowercase();
        self
    }

    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_use_session(mut self, use_session: bool) -> Self {
        self.use_session = use_session;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_hidden_in_editor(mut self, hidden: bool) -> Self {
        self.hidden_in_editor = hidden;
        self
    }

    pub fn with_last_modified(mut self, tstamp: i64) -> Self {
        self.last_modified = tstamp;
        self
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn use_session(&self) -> bool {
        self.use_session
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn hidden_in_editor(&self) -> bool {
        self.hidden_in_editor
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    pub fn set_invert(&mut self, invert: bool) {
        self.invert = invert;
    }

    pub fn set_use_session(&mut self, use_session: bool) {
        self.use_session = use_session;
    }

    /// Case-insensitive alias comparison. Contexts without alias match nothing.
    pub fn has_alias(&self, alias: &str) -> bool {
        !self.alias.is_empty() && self.alias == alias.trim().to_lowercase()
    }

    /// Session key under which the raw result is remembered.
    pub fn session_key(&self) -> String {
        format!("ctx-{}-{}", self.uid, self.last_modified)
    }

    /// Evaluate the context for this request.
    ///
    /// With `use_session` set, a raw result stored earlier in the session is
    /// reused and the condition is not evaluated again. Inversion is applied
    /// on top of the raw result either way.
    pub fn matches(&self, deps: &Dependencies, request: &mut Request<'_>) -> Result<bool> {
        let raw = match self.cached(&*request.session) {
            Some(raw) => {
                trace!(uid = self.uid, raw, "session cache hit");
                raw
            }
            None => {
                let raw = self.raw_match(deps, request)?;
                trace!(uid = self.uid, kind = self.kind.type_tag(), raw, "evaluated");
                if self.use_session && request.session.has_fe_user() {
                    request
                        .session
                        .set_session_value(&self.session_key(), Value::Bool(raw));
                }
                raw
            }
        };
        Ok(if self.invert { !raw } else { raw })
    }

    fn cached(&self, session: &dyn SessionStore) -> Option<bool> {
        if !self.use_session || !session.has_fe_user() {
            return None;
        }
        session.session_value(&self.session_key())?.as_bool()
    }

    fn raw_match(&self, deps: &Dependencies, request: &Request<'_>) -> Result<bool> {
        let signals = request.signals;
        Ok(match &self.kind {
            ContextKind::Ip { ranges } => kinds::ip::matches(ranges, &signals.remote_address()),
            ContextKind::Domain { patterns } => kinds::domain::matches(patterns, &signals.host()),
            ContextKind::HttpHeader { name, values } => {
                kinds::header_matches(signals, name, values)
            }
            ContextKind::QueryParameter { name, values } => {
                kinds::query_matches(self.uid, signals, name, values)?
            }
            ContextKind::SessionFlag { variable } => {
                kinds::session_flag_matches(&*request.session, variable)
            }
            ContextKind::Combination { expression } => self.combine(expression, deps),
        })
    }

    fn combine(&self, expression: &str, deps: &Dependencies) -> bool {
        match Expression::parse(expression) {
            Ok(expr) => {
                let bindings: Bindings = expr
                    .variables()
                    .into_iter()
                    .filter_map(|name| {
                        let state = self.lookup_dependency(&name, deps)?.state;
                        Some((name, state.binding()))
                    })
                    .collect();
                expr.evaluate(&bindings)
            }
            Err(e) => {
                warn!(uid = self.uid, expression, error = %e, "combination not evaluable");
                false
            }
        }
    }

    // Same lookup order as `dependencies`: alias first, then numeric uid.
    fn lookup_dependency<'d>(&self, name: &str, deps: &'d Dependencies) -> Option<&'d ResolvedDependency> {
        if self.has_alias(name) {
            return None;
        }
        let key = name.to_lowercase();
        deps.values()
            .find(|dep| !dep.alias.is_empty() && dep.alias == key)
            .or_else(|| name.parse::<u64>().ok().and_then(|uid| deps.get(&uid)))
    }

    /// Contexts this one needs resolved first, as `uid -> not disabled`.
    ///
    /// Only combinations have dependencies. Names resolve by alias, then by
    /// numeric uid; unresolved names and self references are left out.
    pub fn dependencies(&self, all: &[Context]) -> BTreeMap<u64, bool> {
        let ContextKind::Combination { expression } = &self.kind else {
            return BTreeMap::new();
        };
        let mut deps = BTreeMap::new();
        for name in variables(expression) {
            let found = all.iter().find(|c| c.has_alias(&name)).or_else(|| {
                name.parse::<u64>()
                    .ok()
                    .and_then(|uid| all.iter().find(|c| c.uid == uid))
            });
            if let Some(dep) = found {
                if dep.uid != self.uid {
                    deps.insert(dep.uid, !dep.disabled);
                }
            }
        }
        deps
    }
}
