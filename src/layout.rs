//! Section/field layout.
//!
//! Sections are stable-sorted by `order`; each section's fields are
//! stable-sorted by `order`. Fields whose section doesn't exist are kept aside
//! as orphans: not rendered, not counted, but their answers are untouched.

use ob_forms_types::{FormField, FormSection};
use std::collections::HashMap;
use tracing::warn;

/// Id of the synthetic final section used for review and submission.
pub const REVIEW_SECTION_ID: &str = "review";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormLayout {
    /// Content sections with their fields populated
    pub sections: Vec<FormSection>,
    /// Fields referencing a section that doesn't exist
    pub orphans: Vec<FormField>,
}

impl FormLayout {
    pub fn build(sections: &[FormSection], fields: &[FormField]) -> Self {
        let mut sections: Vec<FormSection> = sections
            .iter()
            .map(|s| FormSection {
                fields: Vec::new(),
                ..s.clone()
            })
            .collect();
        sections.sort_by_key(|s| s.order);

        let index: HashMap<&str, usize> = sections
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut buckets: Vec<Vec<FormField>> = vec![Vec::new(); sections.len()];
        let mut orphans = Vec::new();
        for field in dedupe_fields(fields) {
            match index.get(field.section.as_str()) {
                Some(&i) => buckets[i].push(field),
                None => orphans.push(field),
            }
        }

        for (section, mut bucket) in sections.iter_mut().zip(buckets) {
            bucket.sort_by_key(|f| f.order);
            section.fields = bucket;
        }

        if !orphans.is_empty() {
            warn!(
                count = orphans.len(),
                "Fields reference unknown sections and will not be rendered"
            );
        }

        Self { sections, orphans }
    }

    /// All rendered fields in section order.
    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.fields().find(|f| f.key == key)
    }

    pub fn section_index(&self, section_id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == section_id)
    }

    /// The content sections plus the synthetic review section.
    pub fn with_review_section(&self) -> Vec<FormSection> {
        let mut sections = self.sections.clone();
        let order = sections.last().map(|s| s.order + 1).unwrap_or(0);
        let mut review = FormSection::new(REVIEW_SECTION_ID, "Review & Submit", order);
        review.description = Some("Review your answers before submitting".to_string());
        sections.push(review);
        sections
    }
}

/// Drop earlier definitions of repeated keys; the last one registered wins.
pub fn dedupe_fields(fields: &[FormField]) -> Vec<FormField> {
    let mut last_index: HashMap<&str, usize> = HashMap::new();
    for (i, field) in fields.iter().enumerate() {
        if let Some(prev) = last_index.insert(field.key.as_str(), i) {
            warn!(
                key = %field.key,
                shadowed = prev,
                "Duplicate field key; later definition shadows the earlier one"
            );
        }
    }

    fields
        .iter()
        .enumerate()
        .filter(|(i, f)| last_index.get(f.key.as_str()) == Some(i))
        .map(|(_, f)| f.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_sorted_stably_and_fields_grouped() {
        let sections = vec![
            FormSection::new("risk", "Risk", 2),
            FormSection::new("info", "Info", 1),
            FormSection::new("extra", "Extra", 2),
        ];
        let fields = vec![
            FormField::new("b", "B", "TEXT", "info", 2),
            FormField::new("a", "A", "TEXT", "info", 1),
            FormField::new("c", "C", "BOOLEAN", "risk", 1),
        ];

        let layout = FormLayout::build(&sections, &fields);
        let ids: Vec<_> = layout.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["info", "risk", "extra"]);

        let info_keys: Vec<_> = layout.sections[0].fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(info_keys, ["a", "b"]);
        assert!(layout.orphans.is_empty());
    }

    #[test]
    fn test_orphans_are_not_rendered() {
        let layout = FormLayout::build(
            &[FormSection::new("info", "Info", 0)],
            &[
                FormField::new("a", "A", "TEXT", "info", 0),
                FormField::new("z", "Z", "TEXT", "gone", 0),
            ],
        );
        assert_eq!(layout.fields().count(), 1);
        assert_eq!(layout.orphans.len(), 1);
        assert!(layout.field("z").is_none());
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let fields = vec![
            FormField::new("a", "First", "TEXT", "info", 0),
            FormField::new("b", "B", "TEXT", "info", 1),
            FormField::new("a", "Second", "TEXTAREA", "info", 2),
        ];
        let deduped = dedupe_fields(&fields);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[1].label, "Second");
    }

    #[test]
    fn test_review_section_is_appended_last() {
        let layout = FormLayout::build(&[FormSection::new("info", "Info", 4)], &[]);
        let sections = layout.with_review_section();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].id, REVIEW_SECTION_ID);
        assert_eq!(sections[1].order, 5);
    }
}
