//! Per-record visibility from the active context set.
//!
//! Records are visible by default. An active context hides a record only
//! through an explicit disabling setting, read either from the record's flat
//! columns or from the setting store.

use tracing::debug;

use crate::context::Context;
use crate::options::{EngineOptions, TableOptions};
use crate::registry::ActiveContextSet;
use crate::settings::{decode_with_identity, parse_id_list, record_id, Record, Setting, SettingStore};

pub struct VisibilityIndex<'a> {
    active: &'a ActiveContextSet,
    options: &'a EngineOptions,
    store: &'a dyn SettingStore,
    fallback: TableOptions,
}

impl<'a> VisibilityIndex<'a> {
    pub fn new(
        active: &'a ActiveContextSet,
        options: &'a EngineOptions,
        store: &'a dyn SettingStore,
    ) -> Self {
        Self {
            active,
            options,
            store,
            fallback: TableOptions::default(),
        }
    }

    fn table(&self, table: &str) -> &TableOptions {
        self.options.table(table).unwrap_or(&self.fallback)
    }

    /// True unless some declared setting of `table` is disabled for `record`.
    pub fn is_enabled(&self, table: &str, record: &Record) -> bool {
        self.table(table)
            .enable_settings
            .iter()
            .all(|name| self.is_setting_enabled(table, name, record))
    }

    pub fn is_setting_enabled(&self, table: &str, setting_name: &str, record: &Record) -> bool {
        let opts = self.table(table);
        let Some(id) = record_id(record, &opts.identity_field) else {
            debug!(table, setting_name, "record without identity, denied");
            return false;
        };

        if let Some((disable, _)) = opts
            .flat_columns
            .get(setting_name)
            .and_then(|flat| flat.read(record))
        {
            let disabled_by = parse_id_list(&disable);
            let hit = self.active.uids().find(|uid| disabled_by.contains(uid));
            if let Some(uid) = hit {
                debug!(table, setting_name, id, context = uid, "disabled by flat column");
            }
            return hit.is_none();
        }

        for ctx in self.active.iter() {
            if let Some(setting) = self.lookup(ctx.uid(), table, setting_name, id, opts) {
                if !setting.enabled {
                    debug!(table, setting_name, id, context = ctx.uid(), "disabled by setting");
                    return false;
                }
            }
        }
        true
    }

    fn lookup(
        &self,
        context_uid: u64,
        table: &str,
        setting_name: &str,
        id: u64,
        opts: &TableOptions,
    ) -> Option<Setting> {
        self.store
            .find_setting(context_uid, table, setting_name, id)
            .or_else(|| {
                if opts.inherit_defaults && id != 0 {
                    self.store.find_setting(context_uid, table, setting_name, 0)
                } else {
                    None
                }
            })
    }

    /// Tri-state editing view of `context` on `record`, from the flat columns
    /// declared for `setting_name`.
    pub fn decode_flat_setting(
        &self,
        context: &Context,
        table: &str,
        setting_name: &str,
        record: &Record,
    ) -> Option<Setting> {
        let opts = self.table(table);
        let flat = opts.flat_columns.get(setting_name)?;
        decode_with_identity(context, table, setting_name, flat, record, &opts.identity_field)
    }
}
