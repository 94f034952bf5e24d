use std::fmt;
use std::str::FromStr;

use domain::Order;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// One failed check: which field and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

/// The set of checks an aggregate failed.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "field '{}': {}", violation.field, violation.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Pure, stateless check applied to every decoded aggregate before it is
/// persisted. Pluggable so tests and deployments can swap the rules.
pub trait OrderValidator: Send + Sync {
    fn validate(&self, order: &Order) -> Result<(), ValidationError>;
}

/// Validator backed by the declarative rules on the domain types.
pub struct SchemaValidator;

impl OrderValidator for SchemaValidator {
    fn validate(&self, order: &Order) -> Result<(), ValidationError> {
        order.validate().map_err(|errors| {
            let mut violations = Vec::new();
            collect_violations("", &errors, &mut violations);
            ValidationError { violations }
        })
    }
}

fn collect_violations(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let reason = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push(FieldViolation {
                        field: path.clone(),
                        reason,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(&path, inner, out),
            ValidationErrorsKind::List(map) => {
                for (index, inner) in map {
                    collect_violations(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

/// What the pipeline does with an aggregate that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Stop the run and surface the error (default). Systemic data-quality
    /// problems become visible instead of being silently dropped.
    #[default]
    FailClosed,
    /// Log the invalid aggregate and keep consuming.
    SkipInvalid,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail-closed" | "fail_closed" => Ok(ValidationPolicy::FailClosed),
            "skip-invalid" | "skip_invalid" => Ok(ValidationPolicy::SkipInvalid),
            other => Err(format!("unknown validation policy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::test_support::sample_order;

    #[test]
    fn test_valid_order_passes() {
        assert!(SchemaValidator.validate(&sample_order("uid-1")).is_ok());
    }

    #[test]
    fn test_violations_carry_nested_field_paths() {
        let mut order = sample_order("uid-1");
        order.delivery.email = "not-an-email".to_string();

        let error = SchemaValidator.validate(&order).unwrap_err();
        assert!(error
            .violations
            .iter()
            .any(|v| v.field == "delivery.email"));
    }

    #[test]
    fn test_violations_index_into_items() {
        let mut order = sample_order("uid-1");
        order.items[0].rid = String::new();

        let error = SchemaValidator.validate(&order).unwrap_err();
        assert!(error.violations.iter().any(|v| v.field == "items[0].rid"));
    }

    #[test]
    fn test_multiple_violations_are_collected() {
        let mut order = sample_order("uid-1");
        order.order_uid = String::new();
        order.delivery.email = "nope".to_string();

        let error = SchemaValidator.validate(&order).unwrap_err();
        assert!(error.violations.len() >= 2);

        let rendered = error.to_string();
        assert!(rendered.contains("order_uid"));
        assert!(rendered.contains("delivery.email"));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "fail-closed".parse::<ValidationPolicy>().unwrap(),
            ValidationPolicy::FailClosed
        );
        assert_eq!(
            "skip_invalid".parse::<ValidationPolicy>().unwrap(),
            ValidationPolicy::SkipInvalid
        );
        assert!("drop-everything".parse::<ValidationPolicy>().is_err());
    }
}
