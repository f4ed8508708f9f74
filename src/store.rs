use serde::Deserialize;

use crate::errors::Result;
use crate::factory::ContextRow;
use crate::registry::ContextStore;
use crate::settings::{Setting, SettingStore};

/// Context rows and settings held in memory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MemoryStore {
    contexts: Vec<ContextRow>,
    settings: Vec<Setting>,
}

impl MemoryStore {
    pub fn new(contexts: Vec<ContextRow>) -> Self {
        Self {
            contexts,
            settings: Vec::new(),
        }
    }

    /// Insert or replace the setting for the same context/table/name/record.
    pub fn save(&mut self, setting: Setting) {
        let existing = self.settings.iter_mut().find(|s| {
            s.context_uid == setting.context_uid
                && s.foreign_table == setting.foreign_table
                && s.name == setting.name
                && s.foreign_uid == setting.foreign_uid
        });
        match existing {
            Some(slot) => *slot = setting,
            None => self.settings.push(setting),
        }
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }
}

impl ContextStore for MemoryStore {
    fn load_all_contexts(&self) -> Result<Vec<ContextRow>> {
        Ok(self.contexts.clone())
    }
}

impl SettingStore for MemoryStore {
    fn find_setting(
        &self,
        context_uid: u64,
        table: &str,
        setting_name: &str,
        foreign_uid: u64,
    ) -> Option<Setting> {
        self.settings
            .iter()
            .find(|s| {
                s.context_uid == context_uid
                    && s.foreign_table == table
                    && s.name == setting_name
                    && s.foreign_uid == foreign_uid
            })
            .cloned()
    }

    fn save_setting(&mut self, setting: Setting) {
        self.save(setting);
    }
}
