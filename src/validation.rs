//! # Webhook Request Validator
//!
//! Schema-driven validation for inbound webhook payloads. Each endpoint
//! declares an [`EndpointSchema`]: required fields, optional fields with
//! their formats, and nothing else: any key outside the schema is rejected
//! outright so malformed integrator payloads cannot silently pollute data.
//!
//! Validation never signals a generic 500; failures produce a list of
//! [`FieldError`]s that handlers turn into a 400 with a field map.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Closed set for the logistic status track.
pub const LOGISTIC_STATUSES: &[&str] =
    &["pending", "confirmed", "shipped", "delivered", "returned"];

/// Closed set for the cash-on-delivery status track.
pub const COD_STATUSES: &[&str] = &["pending", "collected", "refused"];

/// Closed set for the sales pipeline status track.
pub const KPI_STATUSES: &[&str] = &["new", "contacted", "qualified", "won", "lost"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

// Optional leading plus, then 7-20 chars of digits, spaces, dashes, parens.
// The plus does not count toward the length bound.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{5,18}[0-9]$").expect("phone regex is valid"));

/// Expected format of a single field value.
#[derive(Debug, Clone, Copy)]
pub enum FieldFormat {
    /// Any non-empty string.
    Text,
    /// String matching the email shape.
    Email,
    /// String matching the tolerant phone shape.
    Phone,
    /// JSON number (or numeric string, which platforms love to send).
    Number,
    /// String drawn from a fixed closed set.
    Enum(&'static [&'static str]),
    /// Array of non-empty strings.
    StringArray,
    /// Array of JSON objects; element contents are checked downstream.
    ObjectArray,
}

/// One field declaration in an endpoint schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub format: FieldFormat,
}

/// Declared shape of one webhook endpoint's payload.
#[derive(Debug, Clone)]
pub struct EndpointSchema {
    fields: &'static [FieldSpec],
}

/// A single validation failure, addressed to the offending field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collapse a list of field errors into the `details` map handlers return.
pub fn field_error_map(errors: &[FieldError]) -> Value {
    let mut map = Map::new();
    for err in errors {
        // First error per field wins.
        map.entry(err.field.clone())
            .or_insert_with(|| Value::String(err.message.clone()));
    }
    Value::Object(map)
}

impl EndpointSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Validate a parsed JSON payload against this schema.
    pub fn validate(&self, payload: &Value) -> Result<(), Vec<FieldError>> {
        let Some(object) = payload.as_object() else {
            return Err(vec![FieldError::new("body", "Payload must be a JSON object")]);
        };

        let mut errors = Vec::new();

        // Allow-listing: reject anything the schema does not declare.
        for key in object.keys() {
            if !self.fields.iter().any(|f| f.name == key) {
                errors.push(FieldError::new(key.clone(), "Unknown field"));
            }
        }

        for spec in self.fields {
            match object.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        errors.push(FieldError::new(spec.name, "Required field is missing"));
                    }
                }
                Some(value) => {
                    if let Some(message) = check_format(value, spec.format) {
                        errors.push(FieldError::new(spec.name, message));
                    }
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn check_format(value: &Value, format: FieldFormat) -> Option<String> {
    match format {
        FieldFormat::Text => match value.as_str() {
            Some(s) if !s.trim().is_empty() => None,
            Some(_) => Some("Must be a non-empty string".to_string()),
            None => Some("Must be a string".to_string()),
        },
        FieldFormat::Email => match value.as_str() {
            Some(s) if EMAIL_RE.is_match(s) => None,
            _ => Some("Must be a valid email address".to_string()),
        },
        FieldFormat::Phone => match value.as_str() {
            Some(s) if PHONE_RE.is_match(s) => None,
            _ => Some("Must be a valid phone number (7-20 digits)".to_string()),
        },
        FieldFormat::Number => {
            let numeric = value.is_number()
                || value
                    .as_str()
                    .is_some_and(|s| s.trim().parse::<f64>().is_ok());
            if numeric {
                None
            } else {
                Some("Must be a number".to_string())
            }
        }
        FieldFormat::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => None,
            _ => Some(format!("Must be one of: {}", allowed.join(", "))),
        },
        FieldFormat::StringArray => match value.as_array() {
            Some(items)
                if items
                    .iter()
                    .all(|i| i.as_str().is_some_and(|s| !s.trim().is_empty())) =>
            {
                None
            }
            _ => Some("Must be an array of non-empty strings".to_string()),
        },
        FieldFormat::ObjectArray => match value.as_array() {
            Some(items) if items.iter().all(Value::is_object) => None,
            _ => Some("Must be an array of objects".to_string()),
        },
    }
}

/// Schema for `POST /webhook/lead`.
pub const LEAD_SCHEMA: EndpointSchema = EndpointSchema::new(&[
    FieldSpec {
        name: "source",
        required: true,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "name",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "email",
        required: false,
        format: FieldFormat::Email,
    },
    FieldSpec {
        name: "phone",
        required: false,
        format: FieldFormat::Phone,
    },
    FieldSpec {
        name: "notes",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "logistic_status",
        required: false,
        format: FieldFormat::Enum(LOGISTIC_STATUSES),
    },
    FieldSpec {
        name: "cod_status",
        required: false,
        format: FieldFormat::Enum(COD_STATUSES),
    },
    FieldSpec {
        name: "kpi_status",
        required: false,
        format: FieldFormat::Enum(KPI_STATUSES),
    },
    FieldSpec {
        name: "tags",
        required: false,
        format: FieldFormat::StringArray,
    },
]);

/// Schema for `POST /webhook/customer`.
pub const CUSTOMER_SCHEMA: EndpointSchema = EndpointSchema::new(&[
    FieldSpec {
        name: "name",
        required: true,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "email",
        required: true,
        format: FieldFormat::Email,
    },
    FieldSpec {
        name: "phone",
        required: false,
        format: FieldFormat::Phone,
    },
    FieldSpec {
        name: "address",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "source",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "order_id",
        required: false,
        format: FieldFormat::Text,
    },
]);

/// Schema for the platform order webhook.
///
/// Platforms disagree on field spelling; the upsert layer normalizes, this
/// schema only guards shape.
pub const ORDER_SCHEMA: EndpointSchema = EndpointSchema::new(&[
    FieldSpec {
        name: "external_order_id",
        required: true,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "total",
        required: true,
        format: FieldFormat::Number,
    },
    FieldSpec {
        name: "currency",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "status",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "placed_at",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "customer_name",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "customer_email",
        required: false,
        format: FieldFormat::Email,
    },
    FieldSpec {
        name: "customer_phone",
        required: false,
        format: FieldFormat::Phone,
    },
    FieldSpec {
        name: "customer_address",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "tracking_number",
        required: false,
        format: FieldFormat::Text,
    },
    FieldSpec {
        name: "items",
        required: false,
        format: FieldFormat::ObjectArray,
    },
]);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lead_minimal_payload_passes() {
        let payload = json!({ "source": "website" });
        assert!(LEAD_SCHEMA.validate(&payload).is_ok());
    }

    #[test]
    fn test_missing_required_field_names_the_field() {
        let payload = json!({ "name": "Ada" });
        let errors = LEAD_SCHEMA.validate(&payload).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "source"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let payload = json!({ "source": "website", "surprise": true });
        let errors = LEAD_SCHEMA.validate(&payload).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "surprise"));
    }

    #[test]
    fn test_enum_fields_reject_values_outside_closed_set() {
        let payload = json!({ "source": "website", "kpi_status": "maybe" });
        let errors = LEAD_SCHEMA.validate(&payload).unwrap_err();
        let err = errors.iter().find(|e| e.field == "kpi_status").unwrap();
        assert!(err.message.contains("qualified"));

        for valid in KPI_STATUSES {
            let payload = json!({ "source": "website", "kpi_status": valid });
            assert!(LEAD_SCHEMA.validate(&payload).is_ok(), "rejected {valid}");
        }
    }

    #[test]
    fn test_email_format() {
        let bad = json!({ "name": "A", "email": "not-an-email" });
        let errors = CUSTOMER_SCHEMA.validate(&bad).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "email"));

        let good = json!({ "name": "A", "email": "a@example.com" });
        assert!(CUSTOMER_SCHEMA.validate(&good).is_ok());
    }

    #[test]
    fn test_phone_format_tolerates_punctuation() {
        for phone in ["+39 333 123 4567", "(02) 1234-5678", "3331234567"] {
            let payload = json!({ "source": "website", "phone": phone });
            assert!(LEAD_SCHEMA.validate(&payload).is_ok(), "rejected {phone}");
        }

        for phone in ["123", "abc-def-ghij", ""] {
            let payload = json!({ "source": "website", "phone": phone });
            assert!(LEAD_SCHEMA.validate(&payload).is_err(), "accepted {phone}");
        }
    }

    #[test]
    fn test_phone_length_bound_excludes_leading_plus() {
        // 7 and 20 chars after the plus are in bounds, 6 and 21 are not.
        for phone in [
            format!("+{}", "1".repeat(7)),
            format!("+{}", "1".repeat(20)),
            "1".repeat(20),
        ] {
            let payload = json!({ "source": "website", "phone": phone });
            assert!(LEAD_SCHEMA.validate(&payload).is_ok(), "rejected {phone}");
        }

        for phone in [
            format!("+{}", "1".repeat(6)),
            format!("+{}", "1".repeat(21)),
            "1".repeat(21),
        ] {
            let payload = json!({ "source": "website", "phone": phone });
            assert!(LEAD_SCHEMA.validate(&payload).is_err(), "accepted {phone}");
        }
    }

    #[test]
    fn test_empty_required_string_rejected() {
        let payload = json!({ "source": "   " });
        let errors = LEAD_SCHEMA.validate(&payload).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "source"));
    }

    #[test]
    fn test_non_object_payload_rejected() {
        let errors = LEAD_SCHEMA.validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(errors[0].field, "body");
    }

    #[test]
    fn test_order_numeric_string_total_accepted() {
        let payload = json!({ "external_order_id": "1001", "total": "49.90" });
        assert!(ORDER_SCHEMA.validate(&payload).is_ok());

        let payload = json!({ "external_order_id": "1001", "total": "lots" });
        assert!(ORDER_SCHEMA.validate(&payload).is_err());
    }

    #[test]
    fn test_field_error_map_keeps_first_error_per_field() {
        let errors = vec![
            FieldError::new("email", "Must be a valid email address"),
            FieldError::new("email", "second"),
        ];
        let map = field_error_map(&errors);
        assert_eq!(
            map.get("email").and_then(Value::as_str),
            Some("Must be a valid email address")
        );
    }
}
