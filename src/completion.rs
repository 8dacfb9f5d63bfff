//! Section and overall completion tracking, plus the one-shot initial
//! navigation that depends on it.
//!
//! Completion is a pure function of sections, fields, and answers. A section
//! is `Completed` when every required field is answered; a section with no
//! required fields is `Completed` by definition.

use ob_forms_types::{is_answered, FormData, FormField, FormSection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::layout::FormLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Completion of one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionProgress {
    pub section_id: String,
    pub status: SectionStatus,
    pub required_total: usize,
    pub required_answered: usize,
    pub optional_answered: usize,
}

/// Completion of the whole form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub sections: Vec<SectionProgress>,
    pub required_total: usize,
    pub required_answered: usize,
    /// `round(100 * answered / total)`, 100 when nothing is required
    pub overall_progress: u8,
    /// Keys of required fields still unanswered, in section order
    pub missing_required: Vec<String>,
}

impl CompletionReport {
    pub fn for_layout(layout: &FormLayout, answers: &FormData, required_only: bool) -> Self {
        let fields: Vec<FormField> = layout.fields().cloned().collect();
        compute_completion(&layout.sections, &fields, answers, required_only)
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
    }

    pub fn status_of(&self, section_id: &str) -> Option<SectionStatus> {
        self.sections
            .iter()
            .find(|s| s.section_id == section_id)
            .map(|s| s.status)
    }

    /// Index of the first section that isn't `Completed`.
    pub fn first_incomplete(&self) -> Option<usize> {
        self.sections
            .iter()
            .position(|s| s.status != SectionStatus::Completed)
    }
}

/// Compute completion for `sections` using the `fields` that belong to them.
///
/// With `required_only`, a section only counts as started once a required
/// field is answered; otherwise any answered field starts it.
pub fn compute_completion(
    sections: &[FormSection],
    fields: &[FormField],
    answers: &FormData,
    required_only: bool,
) -> CompletionReport {
    let mut by_section: HashMap<&str, Vec<&FormField>> = HashMap::new();
    for field in fields {
        by_section.entry(field.section.as_str()).or_default().push(field);
    }

    let mut report = CompletionReport {
        sections: Vec::with_capacity(sections.len()),
        required_total: 0,
        required_answered: 0,
        overall_progress: 100,
        missing_required: Vec::new(),
    };

    for section in sections {
        let members = by_section
            .get(section.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let (required, optional): (Vec<&FormField>, Vec<&FormField>) =
            members.iter().copied().partition(|f| f.required);

        let mut required_answered = 0;
        for field in &required {
            if is_answered(answers, &field.key) {
                required_answered += 1;
            } else {
                report.missing_required.push(field.key.clone());
            }
        }
        let optional_answered = optional
            .iter()
            .filter(|f| is_answered(answers, &f.key))
            .count();

        let started = if required_only {
            required_answered > 0
        } else {
            required_answered + optional_answered > 0
        };
        let status = if required_answered == required.len() {
            SectionStatus::Completed
        } else if started {
            SectionStatus::InProgress
        } else {
            SectionStatus::NotStarted
        };

        report.required_total += required.len();
        report.required_answered += required_answered;
        report.sections.push(SectionProgress {
            section_id: section.id.clone(),
            status,
            required_total: required.len(),
            required_answered,
            optional_answered,
        });
    }

    report.overall_progress = percent(report.required_answered, report.required_total);
    report
}

/// Half-up rounded percentage; 100 for an empty denominator.
fn percent(answered: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let rounded = (200 * answered + total) / (2 * total);
    rounded.min(100) as u8
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Active-section state for one task instance.
///
/// The initial auto-navigation runs at most once per instance so it never
/// fights user-driven navigation afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionNavigator {
    active: usize,
    content_sections: usize,
    has_review_section: bool,
    auto_navigated: bool,
}

impl SectionNavigator {
    pub fn new(content_sections: usize, has_review_section: bool) -> Self {
        Self {
            active: 0,
            content_sections,
            has_review_section,
            auto_navigated: false,
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn section_count(&self) -> usize {
        self.content_sections + usize::from(self.has_review_section)
    }

    pub fn has_auto_navigated(&self) -> bool {
        self.auto_navigated
    }

    /// Pick the starting section after the first successful data load.
    ///
    /// Review requested goes to the last section, a fully answered form to
    /// the last content section, anything else to the first incomplete one.
    /// Returns `None` once the one-shot has already fired.
    pub fn auto_navigate(&mut self, report: &CompletionReport, review_requested: bool) -> Option<usize> {
        if self.auto_navigated {
            return None;
        }
        self.auto_navigated = true;

        let last = self.section_count().saturating_sub(1);
        let target = if review_requested {
            last
        } else if report.overall_progress == 100 {
            self.content_sections.saturating_sub(1)
        } else {
            report.first_incomplete().unwrap_or(0)
        };
        self.active = target.min(last);
        Some(self.active)
    }

    /// Move to `index` if it exists. Returns whether the move happened.
    pub fn set_active(&mut self, index: usize) -> bool {
        if index >= self.section_count() {
            return false;
        }
        self.active = index;
        true
    }

    pub fn next(&mut self) -> bool {
        self.set_active(self.active + 1)
    }

    pub fn previous(&mut self) -> bool {
        match self.active.checked_sub(1) {
            Some(i) => self.set_active(i),
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.active = 0;
    }
}
