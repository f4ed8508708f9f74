//! Dependency-aware resolution of the active context set.
//!
//! Contexts may reference each other in any order. Each pass evaluates the
//! pending contexts whose dependencies all have an outcome; a context that
//! only depends on disabled contexts goes through immediately. After as many
//! passes as there were pending contexts, whatever is left (cycles, dangling
//! references) counts as not matched and is never evaluated.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::context::{Context, Dependencies, DependencyState, ResolvedDependency};
use crate::errors::Result;
use crate::signals::Request;

/// What the resolver needs from a context.
pub trait Resolvable: Sized {
    fn uid(&self) -> u64;
    fn alias(&self) -> &str;
    fn is_disabled(&self) -> bool;
    /// `uid -> requires resolution`; `false` marks a disabled dependency.
    fn dependencies(&self, all: &[Self]) -> BTreeMap<u64, bool>;
    fn evaluate(&self, deps: &Dependencies, request: &mut Request<'_>) -> Result<bool>;
}

impl Resolvable for Context {
    fn uid(&self) -> u64 {
        Context::uid(self)
    }

    fn alias(&self) -> &str {
        Context::alias(self)
    }

    fn is_disabled(&self) -> bool {
        self.disabled()
    }

    fn dependencies(&self, all: &[Self]) -> BTreeMap<u64, bool> {
        Context::dependencies(self, all)
    }

    fn evaluate(&self, deps: &Dependencies, request: &mut Request<'_>) -> Result<bool> {
        self.matches(deps, request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Matched,
    NotMatched,
}

/// Indices into `all` of the contexts that matched, in input order.
pub fn resolve<C: Resolvable>(all: &[C], request: &mut Request<'_>) -> Result<Vec<usize>> {
    let mut pending: Vec<usize> = (0..all.len()).filter(|&i| !all[i].is_disabled()).collect();
    let by_uid: HashMap<u64, usize> = all.iter().enumerate().map(|(i, c)| (c.uid(), i)).collect();
    let mut outcomes: HashMap<u64, Outcome> = HashMap::new();
    let mut matched = Vec::new();

    let passes = pending.len();
    for pass in 0..passes {
        if pending.is_empty() {
            break;
        }
        let mut deferred = Vec::new();
        for &idx in &pending {
            let ctx = &all[idx];
            let Some(deps) = bundle(ctx.dependencies(all), all, &by_uid, &outcomes) else {
                deferred.push(idx);
                continue;
            };
            if ctx.evaluate(&deps, request)? {
                outcomes.insert(ctx.uid(), Outcome::Matched);
                matched.push(idx);
            } else {
                outcomes.insert(ctx.uid(), Outcome::NotMatched);
            }
        }
        let progressed = deferred.len() < pending.len();
        debug!(pass, resolved = pending.len() - deferred.len(), waiting = deferred.len(), "resolver pass");
        pending = deferred;
        if !progressed {
            break;
        }
    }

    if !pending.is_empty() {
        let stuck: Vec<u64> = pending.iter().map(|&i| all[i].uid()).collect();
        debug!(?stuck, "unresolvable dependencies, treated as not matched");
    }

    matched.sort_unstable();
    Ok(matched)
}

// `None` while some dependency still lacks an outcome.
fn bundle<C: Resolvable>(
    deps: BTreeMap<u64, bool>,
    all: &[C],
    by_uid: &HashMap<u64, usize>,
    outcomes: &HashMap<u64, Outcome>,
) -> Option<Dependencies> {
    let mut out = Dependencies::new();
    for (uid, requires_resolution) in deps {
        let state = if requires_resolution {
            match outcomes.get(&uid)? {
                Outcome::Matched => DependencyState::Matched,
                Outcome::NotMatched => DependencyState::NotMatched,
            }
        } else {
            DependencyState::Disabled
        };
        let alias = by_uid
            .get(&uid)
            .map(|&i| all[i].alias().to_string())
            .unwrap_or_default();
        out.insert(uid, ResolvedDependency { uid, alias, state });
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{MemorySession, RequestSignals};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// Stub with fixed dependencies and result that counts evaluations.
    struct Stub {
        uid: u64,
        disabled: bool,
        deps: BTreeMap<u64, bool>,
        result: bool,
        calls: Cell<usize>,
        seen: std::cell::RefCell<Option<Dependencies>>,
    }

    fn stub(uid: u64, deps: &[(u64, bool)], result: bool) -> Stub {
        Stub {
            uid,
            disabled: false,
            deps: deps.iter().copied().collect(),
            result,
            calls: Cell::new(0),
            seen: Default::default(),
        }
    }

    impl Resolvable for Stub {
        fn uid(&self) -> u64 {
            self.uid
        }
        fn alias(&self) -> &str {
            ""
        }
        fn is_disabled(&self) -> bool {
            self.disabled
        }
        fn dependencies(&self, _all: &[Self]) -> BTreeMap<u64, bool> {
            self.deps.clone()
        }
        fn evaluate(&self, deps: &Dependencies, _request: &mut Request<'_>) -> Result<bool> {
            self.calls.set(self.calls.get() + 1);
            *self.seen.borrow_mut() = Some(deps.clone());
            Ok(self.result)
        }
    }

    fn run(all: &[Stub]) -> Vec<u64> {
        let signals = RequestSignals::default();
        let mut session = MemorySession::new();
        let mut req = Request::new(&signals, &mut session);
        resolve(all, &mut req)
            .unwrap()
            .into_iter()
            .map(|i| all[i].uid)
            .collect()
    }

    #[test]
    fn dependencies_listed_later_are_waited_for() {
        let all = vec![stub(1, &[(2, true)], true), stub(2, &[(3, true)], true), stub(3, &[], true)];
        assert_eq!(run(&all), vec![1, 2, 3]);
        let seen = all[0].seen.borrow().clone().unwrap();
        assert_eq!(seen[&2].state, DependencyState::Matched);
    }

    #[test]
    fn not_matched_dependencies_are_passed_through() {
        let all = vec![stub(1, &[(2, true)], true), stub(2, &[], false)];
        assert_eq!(run(&all), vec![1]);
        assert_eq!(all[0].seen.borrow().as_ref().unwrap()[&2].state, DependencyState::NotMatched);
    }

    #[test]
    fn disabled_dependency_does_not_block() {
        let mut disabled = stub(1, &[], true);
        disabled.disabled = true;
        let all = vec![disabled, stub(2, &[(1, false)], true)];
        assert_eq!(run(&all), vec![2]);
        assert_eq!(all[0].calls.get(), 0);
        assert_eq!(all[1].calls.get(), 1);
        assert_eq!(all[1].seen.borrow().as_ref().unwrap()[&1].state, DependencyState::Disabled);
    }

    #[test]
    fn dangling_dependency_is_never_evaluated() {
        let all = vec![stub(1, &[(99, true)], true), stub(2, &[], true)];
        assert_eq!(run(&all), vec![2]);
        assert_eq!(all[0].calls.get(), 0);
    }

    #[test]
    fn cycles_terminate_unmatched() {
        let all = vec![stub(1, &[(2, true)], true), stub(2, &[(1, true)], true), stub(3, &[(1, true)], true)];
        assert_eq!(run(&all), Vec::<u64>::new());
        assert!(all.iter().all(|s| s.calls.get() == 0));
    }

    #[test]
    fn every_context_is_evaluated_at_most_once() {
        let all = vec![stub(3, &[(2, true)], true), stub(2, &[(1, true)], false), stub(1, &[], true)];
        assert_eq!(run(&all), vec![3, 1]);
        assert!(all.iter().all(|s| s.calls.get() == 1));
    }
}
