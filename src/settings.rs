//! Enable/disable settings and their flat two-column encoding.

use std::collections::BTreeSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;

/// A content record as a column → value map.
pub type Record = Map<String, Value>;

pub const DEFAULT_IDENTITY_FIELD: &str = "uid";

/// An explicit enable/disable decision for one context on one record.
/// `foreign_uid == 0` is the table-wide default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub context_uid: u64,
    pub foreign_table: String,
    pub foreign_uid: u64,
    pub name: String,
    pub enabled: bool,
}

impl Setting {
    pub fn new(context_uid: u64, table: &str, name: &str, foreign_uid: u64, enabled: bool) -> Self {
        Self {
            context_uid,
            foreign_table: table.to_string(),
            foreign_uid,
            name: name.to_string(),
            enabled,
        }
    }

    pub fn is_default_setting(&self) -> bool {
        self.foreign_uid == 0
    }
}

/// Lookup and persistence of relational settings.
pub trait SettingStore {
    fn find_setting(
        &self,
        context_uid: u64,
        table: &str,
        setting_name: &str,
        foreign_uid: u64,
    ) -> Option<Setting>;

    fn save_setting(&mut self, setting: Setting);
}

/// Names of the two columns holding the flat encoding of one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatColumns {
    pub disable: String,
    pub enable: String,
}

impl FlatColumns {
    pub fn new(disable: &str, enable: &str) -> Self {
        Self {
            disable: disable.to_string(),
            enable: enable.to_string(),
        }
    }

    /// `{setting}_disable` / `{setting}_enable`.
    pub fn for_setting(setting_name: &str) -> Self {
        Self {
            disable: format!("{setting_name}_disable"),
            enable: format!("{setting_name}_enable"),
        }
    }

    /// Both columns as text, or `None` if either is missing or null.
    pub fn read(&self, record: &Record) -> Option<(String, String)> {
        Some((column_text(record, &self.disable)?, column_text(record, &self.enable)?))
    }
}

fn column_text(record: &Record, column: &str) -> Option<String> {
    match record.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The record's row id from `field`; numbers and numeric strings qualify.
pub fn record_id(record: &Record, field: &str) -> Option<u64> {
    match record.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a comma separated uid list. Entries that are not uids are dropped.
pub fn parse_id_list(raw: &str) -> BTreeSet<u64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

/// Encode settings into `(disable, enable)` column values.
pub fn encode_flat(settings: &[Setting]) -> (String, String) {
    let list = |enabled: bool| {
        settings
            .iter()
            .filter(|s| s.enabled == enabled)
            .map(|s| s.context_uid)
            .sorted_unstable()
            .dedup()
            .join(",")
    };
    (list(false), list(true))
}

/// Read the tri-state setting of `context` from the flat columns.
///
/// `Some(enabled = true)` if the uid is in the enable column, `Some(false)`
/// if it is only in the disable column, `None` if it is in neither. A missing
/// or null column reads as an empty list; a record without identity yields
/// `foreign_uid = 0`.
pub fn decode_flat_setting(
    context: &Context,
    table: &str,
    setting_name: &str,
    flat: &FlatColumns,
    record: &Record,
) -> Option<Setting> {
    decode_with_identity(context, table, setting_name, flat, record, DEFAULT_IDENTITY_FIELD)
}

pub(crate) fn decode_with_identity(
    context: &Context,
    table: &str,
    setting_name: &str,
    flat: &FlatColumns,
    record: &Record,
    identity_field: &str,
) -> Option<Setting> {
    let id = record_id(record, identity_field).unwrap_or(0);
    let disable = column_text(record, &flat.disable).unwrap_or_default();
    let enable = column_text(record, &flat.enable).unwrap_or_default();
    let uid = context.uid();
    let enabled = if parse_id_list(&enable).contains(&uid) {
        true
    } else if parse_id_list(&disable).contains(&uid) {
        false
    } else {
        return None;
    };
    Some(Setting::new(uid, table, setting_name, id, enabled))
}
