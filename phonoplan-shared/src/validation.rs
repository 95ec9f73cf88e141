/// Flattening of `validator` errors
///
/// `validator` reports nested errors as a tree keyed by Rust field names.
/// HTTP responses want a flat, ordered list of `{field, message}` with the
/// JSON (camelCase) path of each field, e.g. `activities[0].steps[1].title`.
///
/// The tree is a hash map, so declaration order is lost. Each request type
/// restores it through [`FieldOrder`]; the first entry of the flattened list
/// is then the first failing field as the type declares them.
///
/// # Example
///
/// ```
/// use phonoplan_shared::validation::{validate_in_order, FieldOrder};
/// use validator::Validate;
///
/// #[derive(Validate)]
/// struct Input {
///     #[validate(length(min = 8, message = "Senha curta."))]
///     password: String,
///     #[validate(length(min = 2, message = "Nome muito curto."))]
///     org_name: String,
/// }
///
/// impl FieldOrder for Input {
///     const FIELD_ORDER: &'static [&'static str] = &["password", "orgName"];
/// }
///
/// let input = Input { password: "x".into(), org_name: "x".into() };
/// let flat = validate_in_order(&input).unwrap_err();
/// assert_eq!(flat[0].field, "password");
/// assert_eq!(flat[1].message, "Nome muito curto.");
/// ```

use serde::Serialize;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Message used when a rule carries no message of its own
pub const DEFAULT_MESSAGE: &str = "Valor inválido.";

/// One failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// JSON path of the field
    pub field: String,
    pub message: String,
}

/// Declaration order of a type's validated fields, as JSON names
///
/// Nested types share the list: a name ranks by its position in it wherever
/// it appears in the path. Names missing from the list sort after the listed
/// ones, alphabetically.
pub trait FieldOrder {
    const FIELD_ORDER: &'static [&'static str];
}

/// Validates `value` and flattens any failure in declaration order
pub fn validate_in_order<T: Validate + FieldOrder>(value: &T) -> Result<(), Vec<FieldError>> {
    value.validate().map_err(|e| field_errors(&e, T::FIELD_ORDER))
}

/// Name segments carry their rank in the declared order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Name(usize, String),
    Index(usize),
}

/// Flattens `errors` into field errors ordered by path, ranking names by `order`
pub fn field_errors(errors: &ValidationErrors, order: &[&str]) -> Vec<FieldError> {
    let mut collected = Vec::new();
    collect(errors, order, &mut Vec::new(), &mut collected);
    collected.sort_by(|a, b| a.0.cmp(&b.0));

    collected
        .into_iter()
        .map(|(path, message)| FieldError {
            field: render_path(&path),
            message,
        })
        .collect()
}

/// Message of the first field error, if any
pub fn first_message(errors: &[FieldError]) -> Option<&str> {
    errors.first().map(|e| e.message.as_str())
}

fn collect(
    errors: &ValidationErrors,
    order: &[&str],
    path: &mut Vec<Segment>,
    out: &mut Vec<(Vec<Segment>, String)>,
) {
    for (field, kind) in errors.errors() {
        let name = to_camel_case(field);
        let rank = order.iter().position(|n| *n == name).unwrap_or(order.len());
        path.push(Segment::Name(rank, name));

        match kind {
            ValidationErrorsKind::Field(rules) => {
                for rule in rules {
                    let message = rule
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, order, path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    path.push(Segment::Index(*index));
                    collect(nested, order, path, out);
                    path.pop();
                }
            }
        }

        path.pop();
    }
}

fn render_path(path: &[Segment]) -> String {
    let mut rendered = String::new();

    for segment in path {
        match segment {
            Segment::Name(_, name) => {
                if !rendered.is_empty() {
                    rendered.push('.');
                }
                rendered.push_str(name);
            }
            Segment::Index(index) => {
                rendered.push_str(&format!("[{}]", index));
            }
        }
    }

    rendered
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;

    for c in field.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}
