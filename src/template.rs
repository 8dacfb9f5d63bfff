//! Scoped configuration merge.
//!
//! `merged = {...global, ...section, ...field}`: the narrowest matching scope
//! wins for each key.

use ob_forms_types::{ConfigScope, Configuration, FormField, Template};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub type MergedConfig = BTreeMap<String, Value>;

/// Pre-indexed view over a template's configuration entries.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    global: MergedConfig,
    sections: HashMap<String, MergedConfig>,
    fields: HashMap<String, MergedConfig>,
}

impl ConfigResolver {
    pub fn new(configurations: &[Configuration]) -> Self {
        let mut resolver = Self::default();
        for config in configurations {
            let scoped = match (config.scope, config.scope_target.as_deref()) {
                (ConfigScope::Global, _) => {
                    resolver
                        .global
                        .insert(config.key.clone(), config.value.clone());
                    continue;
                }
                (ConfigScope::Section, Some(target)) => {
                    resolver.sections.entry(target.to_string()).or_default()
                }
                (ConfigScope::Field, Some(target)) => {
                    resolver.fields.entry(target.to_string()).or_default()
                }
                (scope, None) => {
                    debug!(?scope, key = %config.key, "Scoped configuration without target ignored");
                    continue;
                }
            };
            scoped.insert(config.key.clone(), config.value.clone());
        }
        resolver
    }

    pub fn from_template(template: &Template) -> Self {
        Self::new(&template.configurations)
    }

    pub fn global(&self) -> &MergedConfig {
        &self.global
    }

    pub fn for_section(&self, section_id: &str) -> MergedConfig {
        let mut merged = self.global.clone();
        if let Some(scoped) = self.sections.get(section_id) {
            merged.extend(scoped.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    pub fn for_field(&self, field: &FormField) -> MergedConfig {
        let mut merged = self.for_section(&field.section);
        if let Some(scoped) = self.fields.get(&field.key) {
            merged.extend(scoped.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// Field-scoped entry only, without falling back to wider scopes.
    pub fn field_override(&self, field_key: &str, key: &str) -> Option<&Value> {
        self.fields.get(field_key).and_then(|c| c.get(key))
    }

    pub fn global_value(&self, key: &str) -> Option<&Value> {
        self.global.get(key)
    }
}
