//! Per-task-type conventions.
//!
//! KYB groups by a fixed business ordering, KY3P stores answers under the
//! numeric field id, Open Banking orders groups by their earliest question.

use ob_forms_types::{FieldDefinition, FormField, FormSection, TaskType};
use std::collections::{BTreeMap, HashMap};

const DEFAULT_GROUP: &str = "General";

/// KYB group names in presentation order.
const KYB_GROUP_ORDER: [&str; 4] = [
    "Company Profile",
    "Governance & Leadership",
    "Financial Profile",
    "Operations & Compliance",
];

/// Hooks distinguishing one task type's storage and grouping rules.
pub trait TaskConvention: Send + Sync + 'static {
    fn task_type(&self) -> TaskType;

    /// Key under which the backend stores the answer for `definition`.
    fn storage_key(&self, definition: &FieldDefinition) -> String {
        definition.field_key.clone()
    }

    /// Group names in section order.
    fn section_order(&self, definitions: &[FieldDefinition]) -> Vec<String> {
        groups_in_appearance_order(definitions)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KybConvention;

impl TaskConvention for KybConvention {
    fn task_type(&self) -> TaskType {
        TaskType::Kyb
    }

    fn section_order(&self, definitions: &[FieldDefinition]) -> Vec<String> {
        let present = groups_in_appearance_order(definitions);
        let mut ordered: Vec<String> = KYB_GROUP_ORDER
            .iter()
            .filter(|g| present.iter().any(|p| p.as_str() == **g))
            .map(|g| g.to_string())
            .collect();
        ordered.extend(
            present
                .into_iter()
                .filter(|g| !KYB_GROUP_ORDER.contains(&g.as_str())),
        );
        ordered
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ky3pConvention;

impl TaskConvention for Ky3pConvention {
    fn task_type(&self) -> TaskType {
        TaskType::Ky3p
    }

    fn storage_key(&self, definition: &FieldDefinition) -> String {
        definition.id.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenBankingConvention;

impl TaskConvention for OpenBankingConvention {
    fn task_type(&self) -> TaskType {
        TaskType::OpenBanking
    }

    fn section_order(&self, definitions: &[FieldDefinition]) -> Vec<String> {
        let mut first_order: BTreeMap<String, i32> = BTreeMap::new();
        for def in definitions {
            let order = first_order.entry(group_of(def).to_string()).or_insert(def.order);
            *order = (*order).min(def.order);
        }
        let mut groups: Vec<(String, i32)> = first_order.into_iter().collect();
        groups.sort_by_key(|(_, order)| *order);
        groups.into_iter().map(|(g, _)| g).collect()
    }
}

/// Sections, fields, and storage key mapping produced from raw definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltForm {
    pub sections: Vec<FormSection>,
    pub fields: Vec<FormField>,
    /// Field key to storage key, only where they differ
    pub storage_keys: HashMap<String, String>,
}

pub fn build_form<C: TaskConvention + ?Sized>(
    convention: &C,
    definitions: &[FieldDefinition],
) -> BuiltForm {
    let sections: Vec<FormSection> = convention
        .section_order(definitions)
        .into_iter()
        .enumerate()
        .map(|(i, group)| FormSection::new(slug(&group), group, i as i32))
        .collect();

    let mut built = BuiltForm {
        sections,
        ..BuiltForm::default()
    };

    for def in definitions {
        let storage_key = convention.storage_key(def);
        if storage_key != def.field_key {
            built.storage_keys.insert(def.field_key.clone(), storage_key);
        }
        built.fields.push(FormField {
            key: def.field_key.clone(),
            label: def.display_name.clone(),
            field_type: def.field_type.clone(),
            section: slug(group_of(def)),
            order: def.order,
            options: def.options.clone(),
            placeholder: def.placeholder.clone(),
            help_text: def.help_text.clone().or_else(|| def.question.clone()),
            required: def.required,
            value: None,
        });
    }
    built
}

fn group_of(def: &FieldDefinition) -> &str {
    def.group
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(DEFAULT_GROUP)
}

fn groups_in_appearance_order(definitions: &[FieldDefinition]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for def in definitions {
        let group = group_of(def);
        if !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
    }
    groups
}

/// "Governance & Leadership" -> "governance-leadership"
pub fn slug(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new(10, "revenue", "Annual revenue", "NUMBER", "Financial Profile")
                .with_order(5),
            FieldDefinition::new(11, "legalName", "Legal name", "TEXT", "Company Profile")
                .required()
                .with_order(9),
            FieldDefinition::new(12, "notes", "Notes", "TEXTAREA", "Extras").with_order(1),
        ]
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Governance & Leadership"), "governance-leadership");
        assert_eq!(slug("  Data  Access "), "data-access");
    }

    #[test]
    fn test_kyb_uses_canonical_group_order() {
        let built = build_form(&KybConvention, &defs());
        let ids: Vec<_> = built.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["company-profile", "financial-profile", "extras"]);
        assert!(built.storage_keys.is_empty());
    }

    #[test]
    fn test_ky3p_maps_keys_to_numeric_ids() {
        let built = build_form(&Ky3pConvention, &defs());
        assert_eq!(built.storage_keys.get("legalName").map(String::as_str), Some("11"));
        let ids: Vec<_> = built.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["financial-profile", "company-profile", "extras"]);
    }

    #[test]
    fn test_open_banking_orders_groups_by_first_question() {
        let built = build_form(&OpenBankingConvention, &defs());
        let ids: Vec<_> = built.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["extras", "financial-profile", "company-profile"]);
    }

    #[test]
    fn test_missing_group_lands_in_general() {
        let mut def = FieldDefinition::new(1, "x", "X", "TEXT", "");
        def.group = None;
        let built = build_form(&KybConvention, &[def]);
        assert_eq!(built.sections[0].id, "general");
        assert_eq!(built.fields[0].section, "general");
    }
}
