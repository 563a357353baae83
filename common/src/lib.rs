pub mod logger;

use validator::ValidationErrors;

/// Flattens `validator` field errors into one `"; "`-separated message,
/// sorted by field name so the text is stable.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(m) => m.to_string(),
                None => format!("{field} is invalid ({})", e.code),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}
