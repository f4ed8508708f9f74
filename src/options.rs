//! Engine configuration: which tables are gated by which settings.
use std::collections::HashMap;

use serde::Deserialize;

use crate::settings::{FlatColumns, DEFAULT_IDENTITY_FIELD};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub tables: HashMap<String, TableOptions>,
}

impl EngineOptions {
    pub fn with_table(mut self, name: &str, table: TableOptions) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableOptions> {
        self.tables.get(name)
    }

    /// Column holding the record id for `table`; unconfigured tables use `uid`.
    pub fn identity_field(&self, table: &str) -> &str {
        self.table(table)
            .map(|t| t.identity_field.as_str())
            .unwrap_or(DEFAULT_IDENTITY_FIELD)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Settings that must all be enabled for a record to be visible.
    pub enable_settings: Vec<String>,
    /// Flat column pair per setting name.
    pub flat_columns: HashMap<String, FlatColumns>,
    pub identity_field: String,
    /// Fall back to the table-wide default setting when a record has none.
    pub inherit_defaults: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            enable_settings: Vec::new(),
            flat_columns: HashMap::new(),
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            inherit_defaults: false,
        }
    }
}

impl TableOptions {
    /// Gate on `name` without flat columns.
    pub fn with_setting(mut self, name: &str) -> Self {
        self.enable_settings.push(name.to_string());
        self
    }

    /// Gate on `name`, flat-encoded in `{name}_disable` / `{name}_enable`.
    pub fn with_flat_setting(mut self, name: &str) -> Self {
        self.flat_columns
            .insert(name.to_string(), FlatColumns::for_setting(name));
        self.with_setting(name)
    }

    pub fn with_inherit_defaults(mut self, inherit: bool) -> Self {
        self.inherit_defaults = inherit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserializes_with_defaults() {
        let opts: EngineOptions = serde_json::from_value(json!({
            "tables": {
                "pages": {
                    "enable_settings": ["tx_contexts"],
                    "flat_columns": {
                        "tx_contexts": { "disable": "tx_contexts_disable", "enable": "tx_contexts_enable" }
                    }
                }
            }
        }))
        .unwrap();
        let pages = opts.table("pages").unwrap();
        assert_eq!(pages.identity_field, "uid");
        assert!(!pages.inherit_defaults);
        assert_eq!(pages.flat_columns["tx_contexts"], FlatColumns::for_setting("tx_contexts"));
    }

    #[test]
    fn identity_field_falls_back_for_unknown_tables() {
        let mut table = TableOptions::default();
        table.identity_field = "id".into();
        let opts = EngineOptions::default().with_table("news", table);
        assert_eq!(opts.identity_field("news"), "id");
        assert_eq!(opts.identity_field("pages"), DEFAULT_IDENTITY_FIELD);
    }
}
