use pretty_assertions::assert_eq;
use proptest::prelude::*;
use request_contexts::settings::{encode_flat, FlatColumns};
use request_contexts::{
    decode_flat_setting, Context, ContextKind, EngineOptions, MemoryStore, Record, Setting,
    TableOptions, VisibilityIndex,
};
use request_contexts::registry::ActiveContextSet;
use serde_json::{json, Value};

fn ctx(uid: u64) -> Context {
    Context::new(uid, ContextKind::Domain { patterns: String::new() })
}

fn active(uids: &[u64]) -> ActiveContextSet {
    uids.iter().map(|&u| ctx(u)).collect()
}

fn record(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        _ => unreachable!(),
    }
}

fn pages() -> EngineOptions {
    EngineOptions::default().with_table(
        "pages",
        TableOptions::default().with_flat_setting("tx_contexts"),
    )
}

#[test]
fn disable_column_lists_active_context() {
    let opts = pages();
    let store = MemoryStore::default();
    let rec = record(json!({"uid": 1, "tx_contexts_disable": "5,10", "tx_contexts_enable": ""}));

    let set = active(&[10]);
    let idx = VisibilityIndex::new(&set, &opts, &store);
    assert!(!idx.is_setting_enabled("pages", "tx_contexts", &rec));

    let set = active(&[7]);
    let idx = VisibilityIndex::new(&set, &opts, &store);
    assert!(idx.is_setting_enabled("pages", "tx_contexts", &rec));
}

#[test]
fn disabled_contexts_never_enter_the_active_set() {
    let set: ActiveContextSet = vec![ctx(1), ctx(2).with_disabled(true)].into_iter().collect();
    assert_eq!(set.uids().collect::<Vec<_>>(), vec![1]);
}

fn uid_list() -> impl Strategy<Value = Vec<u64>> {
    proptest::collection::vec(1u64..200, 0..8)
}

proptest! {
    #[test]
    fn tables_without_settings_show_every_record(uids in uid_list(), id in 0u64..1000) {
        let opts = EngineOptions::default()
            .with_table("tt_content", TableOptions::default());
        let store = MemoryStore::default();
        let set = active(&uids);
        let idx = VisibilityIndex::new(&set, &opts, &store);
        let rec = record(json!({"uid": id}));
        let empty = record(json!({}));
        prop_assert!(idx.is_enabled("tt_content", &rec));
        prop_assert!(idx.is_enabled("unconfigured", &empty));
    }

    #[test]
    fn visible_unless_an_active_context_is_disabling(
        active_uids in uid_list(),
        disabling in uid_list(),
        enabling in uid_list(),
    ) {
        let opts = pages();
        let store = MemoryStore::default();
        let set = active(&active_uids);
        let idx = VisibilityIndex::new(&set, &opts, &store);
        let join = |v: &[u64]| v.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        let rec = record(json!({
            "uid": 1,
            "tx_contexts_disable": join(disabling.as_slice()),
            "tx_contexts_enable": join(enabling.as_slice()),
        }));
        let expected = !active_uids.iter().any(|u| disabling.contains(u));
        prop_assert_eq!(idx.is_setting_enabled("pages", "tx_contexts", &rec), expected);
    }

    #[test]
    fn flat_encoding_round_trips(states in proptest::collection::btree_map(1u64..50, any::<bool>(), 0..10), uid in 1u64..50) {
        let settings: Vec<Setting> = states
            .iter()
            .map(|(&uid, &enabled)| Setting::new(uid, "pages", "tx_contexts", 3, enabled))
            .collect();
        let (disable, enable) = encode_flat(&settings);
        let rec = record(json!({"uid": 3, "tx_contexts_disable": disable, "tx_contexts_enable": enable}));
        let flat = FlatColumns::for_setting("tx_contexts");
        let decoded = decode_flat_setting(&ctx(uid), "pages", "tx_contexts", &flat, &rec);
        let expected = states
            .get(&uid)
            .map(|&enabled| Setting::new(uid, "pages", "tx_contexts", 3, enabled));
        prop_assert_eq!(decoded, expected);
    }
}

#[test]
fn enable_column_wins_when_both_list_the_uid() {
    let flat = FlatColumns::for_setting("tx_contexts");
    let rec = record(json!({"uid": 3, "tx_contexts_disable": "4", "tx_contexts_enable": "4"}));
    let decoded = decode_flat_setting(&ctx(4), "pages", "tx_contexts", &flat, &rec).unwrap();
    assert!(decoded.enabled);
}
