//! Validation outcomes, reports and shared field-level primitives.
//!
//! Both validators ([`crate::coco`] and [`crate::info`]) follow the same
//! protocol: field-level construction first, then a single whole-collection
//! pass. Either phase can reject; success is all-or-nothing and yields a
//! [`Validated`] model whose report holds at most warnings.

pub mod primitives;
mod report;

pub use report::{
    IssueCode, IssueContext, Severity, Validated, ValidationIssue, ValidationReport,
    ViolationKind,
};

/// The outcome of validating one document: the validated model (plus any
/// warnings), or the full list of violations.
pub type Outcome<T> = Result<Validated<T>, ValidationReport>;

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

impl ValidateOptions {
    /// Applies the options to an outcome: in strict mode a model that
    /// carries warnings is rejected with them.
    pub fn apply<T>(&self, outcome: Outcome<T>) -> Outcome<T> {
        match outcome {
            Ok(validated) if self.strict && !validated.warnings.is_clean() => {
                Err(validated.warnings)
            }
            other => other,
        }
    }
}

/// Splits an outcome into the model (if any) and the report to display.
pub fn into_parts<T>(outcome: Outcome<T>) -> (Option<T>, ValidationReport) {
    match outcome {
        Ok(validated) => (Some(validated.value), validated.warnings),
        Err(report) => (None, report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warned(value: u8) -> Outcome<u8> {
        let mut warnings = ValidationReport::new();
        warnings.add(ValidationIssue::warning(
            IssueCode::ClassLabelCountMismatch,
            "num_classes=2 but 3 names",
            IssueContext::Document,
        ));
        Ok(Validated { value, warnings })
    }

    #[test]
    fn test_strict_rejects_warnings() {
        let lenient = ValidateOptions::default();
        assert!(lenient.apply(warned(1)).is_ok());

        let strict = ValidateOptions { strict: true };
        let report = strict.apply(warned(1)).unwrap_err();
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn test_into_parts() {
        let (value, report) = into_parts(warned(3));
        assert_eq!(value, Some(3));
        assert_eq!(report.warning_count(), 1);
    }
}
