use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::context::Context;
use crate::errors::Result;
use crate::factory::{ContextFactory, ContextRow};
use crate::resolver;
use crate::signals::Request;

/// Source of context definitions.
pub trait ContextStore {
    fn load_all_contexts(&self) -> Result<Vec<ContextRow>>;
}

/// Contexts that are enabled and matched for the current request, by uid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveContextSet {
    inner: BTreeMap<u64, Context>,
}

impl ActiveContextSet {
    pub fn contains(&self, uid: u64) -> bool {
        self.inner.contains_key(&uid)
    }

    pub fn get(&self, uid: u64) -> Option<&Context> {
        self.inner.get(&uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = u64> + '_ {
        self.inner.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> + '_ {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<Context> for ActiveContextSet {
    fn from_iter<I: IntoIterator<Item = Context>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .filter(|c| !c.disabled())
                .map(|c| (c.uid(), c))
                .collect(),
        }
    }
}

/// All contexts known for one request, plus the active set once resolved.
///
/// Built at the start of a request and dropped (or [`reset`](Self::reset))
/// at its end; nothing is shared across requests.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: Vec<Context>,
    by_uid: HashMap<u64, usize>,
    active: Option<ActiveContextSet>,
    alias_cache: HashMap<String, bool>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every definition from `store`, skipping rows the factory skips.
    pub fn load(store: &dyn ContextStore, factory: &ContextFactory) -> Result<Self> {
        let rows = store.load_all_contexts()?;
        let mut reg = Self::new();
        for ctx in factory.create_all(&rows)? {
            reg.add(ctx);
        }
        debug!(loaded = reg.contexts.len(), rows = rows.len(), "contexts loaded");
        Ok(reg)
    }

    /// Add a context. A later context with the same uid replaces the earlier one.
    pub fn add(&mut self, context: Context) {
        let existing = self.by_uid.get(&context.uid()).copied();
        match existing {
            Some(idx) => self.contexts[idx] = context,
            None => {
                self.by_uid.insert(context.uid(), self.contexts.len());
                self.contexts.push(context);
            }
        }
        self.active = None;
        self.alias_cache.clear();
    }

    pub fn all(&self) -> &[Context] {
        &self.contexts
    }

    pub fn get(&self, uid: u64) -> Option<&Context> {
        self.by_uid.get(&uid).map(|&i| &self.contexts[i])
    }

    /// Numeric keys are tried as uid first, then every key as alias.
    pub fn find_by_uid_or_alias(&self, key: &str) -> Option<&Context> {
        let key = key.trim();
        key.parse::<u64>()
            .ok()
            .and_then(|uid| self.get(uid))
            .or_else(|| self.contexts.iter().find(|c| c.has_alias(key)))
    }

    /// Compute the active set from `all` without touching registry state.
    pub fn resolve_active(all: &[Context], request: &mut Request<'_>) -> Result<ActiveContextSet> {
        let matched = resolver::resolve(all, request)?;
        Ok(matched.into_iter().map(|i| all[i].clone()).collect())
    }

    /// Resolve this registry's contexts and keep the result for later queries.
    pub fn activate(&mut self, request: &mut Request<'_>) -> Result<&ActiveContextSet> {
        let set = Self::resolve_active(&self.contexts, request)?;
        debug!(active = ?set.uids().collect::<Vec<_>>(), "active contexts");
        self.alias_cache.clear();
        Ok(self.active.insert(set))
    }

    /// The set from the last [`activate`](Self::activate), if any.
    pub fn active(&self) -> Option<&ActiveContextSet> {
        self.active.as_ref()
    }

    /// Whether the context named by `key` (uid or alias) is active.
    /// Answers are memoized until the next activation or reset.
    pub fn is_active(&mut self, key: &str) -> bool {
        let cache_key = key.trim().to_lowercase();
        if let Some(&hit) = self.alias_cache.get(&cache_key) {
            return hit;
        }
        let answer = match (self.find_by_uid_or_alias(key), self.active.as_ref()) {
            (Some(ctx), Some(active)) => active.contains(ctx.uid()),
            _ => false,
        };
        self.alias_cache.insert(cache_key, answer);
        answer
    }

    /// Drop all contexts, the active set and the memo cache.
    pub fn reset(&mut self) {
        self.contexts.clear();
        self.by_uid.clear();
        self.active = None;
        self.alias_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextKind;
    use crate::signals::{MemorySession, RequestSignals};
    use pretty_assertions::assert_eq;

    fn ip(uid: u64, alias: &str, ranges: &str) -> Context {
        Context::new(uid, ContextKind::Ip { ranges: ranges.into() }).with_alias(alias)
    }

    fn registry() -> ContextRegistry {
        let mut reg = ContextRegistry::new();
        reg.add(ip(1, "lan", "10.0.0.0/8"));
        reg.add(ip(2, "42", "192.168.0.0/16"));
        reg.add(ip(42, "answer", "*").with_disabled(true));
        reg
    }

    #[test]
    fn lookup_prefers_uid_for_numeric_keys() {
        let reg = registry();
        assert_eq!(reg.find_by_uid_or_alias("42").map(Context::uid), Some(42));
        assert_eq!(reg.find_by_uid_or_alias("LAN").map(Context::uid), Some(1));
        assert_eq!(reg.find_by_uid_or_alias("7"), None);
    }

    #[test]
    fn numeric_alias_is_found_when_no_uid_matches() {
        let mut reg = ContextRegistry::new();
        reg.add(ip(5, "2024", "*"));
        assert_eq!(reg.find_by_uid_or_alias("2024").map(Context::uid), Some(5));
    }

    #[test]
    fn add_replaces_same_uid() {
        let mut reg = registry();
        reg.add(ip(1, "office", "*"));
        assert_eq!(reg.all().len(), 3);
        assert_eq!(reg.get(1).map(Context::alias), Some("office"));
    }

    #[test]
    fn activate_excludes_disabled_and_unmatched() {
        let mut reg = registry();
        let signals = RequestSignals::new("10.2.3.4", "");
        let mut session = MemorySession::new();
        let mut req = Request::new(&signals, &mut session);
        let active = reg.activate(&mut req).unwrap();
        assert_eq!(active.uids().collect::<Vec<_>>(), vec![1]);
        assert!(reg.is_active("lan"));
        assert!(reg.is_active("LAN"));
        assert!(!reg.is_active("answer"));
        assert!(!reg.is_active("missing"));
    }

    #[test]
    fn resolving_twice_gives_the_same_set() {
        let reg = registry();
        let signals = RequestSignals::new("192.168.1.1", "");
        let mut session = MemorySession::new();
        let mut req = Request::new(&signals, &mut session);
        let first = ContextRegistry::resolve_active(reg.all(), &mut req).unwrap();
        let second = ContextRegistry::resolve_active(reg.all(), &mut req).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.uids().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut reg = registry();
        let signals = RequestSignals::new("10.2.3.4", "");
        let mut session = MemorySession::new();
        let mut req = Request::new(&signals, &mut session);
        reg.activate(&mut req).unwrap();
        assert!(reg.is_active("lan"));
        reg.reset();
        assert!(reg.all().is_empty());
        assert!(reg.active().is_none());
        assert!(!reg.is_active("lan"));
    }

    #[test]
    fn is_active_before_activation_is_false() {
        let mut reg = registry();
        assert!(!reg.is_active("lan"));
    }
}
