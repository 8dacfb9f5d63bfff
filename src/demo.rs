//! Demo answers for walkthroughs and manual testing.

use ob_forms_types::{FieldValue, FormData, FormField};

use crate::resolver::FieldKind;

/// A plausible answer for every field, keyed by field key.
pub fn demo_answers<'a, I, K>(fields: I, kind_of: K) -> FormData
where
    I: IntoIterator<Item = &'a FormField>,
    K: Fn(&FormField) -> FieldKind,
{
    fields
        .into_iter()
        .map(|field| (field.key.clone(), demo_value(field, kind_of(field))))
        .collect()
}

pub fn demo_value(field: &FormField, kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Checkbox => FieldValue::Bool(true),
        FieldKind::Dropdown => field
            .options
            .as_ref()
            .and_then(|o| o.first())
            .map(|o| FieldValue::text(o.clone()))
            .unwrap_or_else(|| FieldValue::text("Other")),
        FieldKind::MultiLine => FieldValue::text(format!(
            "Demo response for {}. Policies are documented and reviewed annually.",
            field.label
        )),
        FieldKind::SingleLine => single_line(field),
    }
}

fn single_line(field: &FormField) -> FieldValue {
    let hint = format!("{} {}", field.key, field.label).to_ascii_lowercase();
    let declared = field.field_type.to_ascii_uppercase();

    if declared == "NUMBER" || hint.contains("count") || hint.contains("number of") {
        FieldValue::number(25)
    } else if declared == "EMAIL" || hint.contains("email") {
        FieldValue::text("compliance@example.com")
    } else if declared == "PHONE" || hint.contains("phone") {
        FieldValue::text("+1 555 0100")
    } else if declared == "URL" || hint.contains("website") || hint.contains("url") {
        FieldValue::text("https://www.example.com")
    } else if declared == "DATE" || hint.contains("date") {
        FieldValue::text("2020-01-15")
    } else {
        FieldValue::text(format!("Demo {}", field.label))
    }
}
