//! Validation report types for structured error reporting.
//!
//! This module provides rich, structured validation results that can be
//! displayed to users, serialized as JSON, or processed programmatically.

use serde::Serialize;
use std::fmt;

/// The result of validating a document.
///
/// Contains all issues found during validation, categorized by severity.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// All issues found during validation.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Creates a new empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Adds an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Moves every issue of `other` into this report.
    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }

    /// Returns the number of errors in the report.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warnings in the report.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true if validation passed in strict mode (no errors or warnings).
    pub fn is_ok_strict(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true if any issue carries the given code.
    pub fn has_code(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    /// Returns the issues carrying the given code.
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }

    /// Labels every issue with the file it was found in.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        let source = source.into();
        for issue in &mut self.issues {
            issue.source = Some(source.clone());
        }
        self
    }

    /// Returns `value` if the report holds no errors, otherwise the report.
    pub(crate) fn into_result<T>(self, value: T) -> Result<Validated<T>, ValidationReport> {
        if self.is_ok() {
            Ok(Validated {
                value,
                warnings: self,
            })
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Validation passed: no issues found");
        }

        writeln!(
            f,
            "Validation completed with {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A successfully validated model, plus any warnings raised on the way.
#[derive(Clone, Debug)]
pub struct Validated<T> {
    /// The validated, immutable model.
    pub value: T,
    /// Non-fatal issues. Never contains errors.
    pub warnings: ValidationReport,
}

impl<T> Validated<T> {
    /// Discards the warnings and returns the model.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    /// The severity of the issue.
    pub severity: Severity,

    /// A stable code for the issue type.
    pub code: IssueCode,

    /// The violation family the code belongs to.
    pub kind: ViolationKind,

    /// A human-readable description of the issue.
    pub message: String,

    /// Context about where the issue occurred.
    pub context: IssueContext,

    /// The file the issue was found in, when validating several files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ValidationIssue {
    /// Creates a new validation issue.
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            kind: code.kind(),
            message: message.into(),
            context,
            source: None,
        }
    }

    /// Creates a new error.
    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    /// Creates a new warning.
    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }

    /// Sets the file the issue was found in.
    pub fn in_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(f, "[{}] {:?} ", severity, self.code)?;
        if let Some(source) = &self.source {
            write!(f, "{}: ", source)?;
        }
        write!(f, "{}: {}", self.context, self.message)
    }
}

/// The severity of a validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A warning that doesn't reject the document but may indicate problems.
    Warning,
    /// An error that rejects the document.
    Error,
}

/// The four families of rule a violation can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A single field violates its atomic constraint.
    MalformedField,
    /// A value that must be unique within its collection is not.
    DuplicateIdentifier,
    /// A foreign key does not resolve.
    ReferentialIntegrity,
    /// A requirement conditioned on sibling data is not met.
    SchemaContract,
}

/// A stable code identifying the type of validation issue.
///
/// These codes can be used for filtering, ignoring specific issues,
/// or programmatic handling of validation results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCode {
    // Document shape
    /// The document (or a collection in it) has the wrong JSON shape.
    InvalidDocument,
    /// A required field is absent or null.
    MissingField,
    /// A field holds a value of the wrong JSON type.
    InvalidFieldType,

    // Field-level record issues
    /// Category keypoint labels are not a list of non-empty strings.
    InvalidKeypointLabels,
    /// A skeleton pair is malformed or out of range.
    InvalidSkeleton,
    /// A bounding box has the wrong length or negative values.
    InvalidBBox,
    /// A keypoint list is not a valid flat triplet list.
    InvalidKeypoints,
    /// `iscrowd` is neither 0 nor 1.
    InvalidIscrowd,
    /// Segmentation is neither polygons nor RLE.
    InvalidSegmentation,
    /// An image has an empty filename.
    EmptyFileName,
    /// A task template names an unknown task.
    InvalidTask,
    /// A feature declaration is malformed or has an unknown `_type`.
    InvalidFeature,

    // Uniqueness issues
    /// Multiple licenses have the same ID.
    DuplicateLicenseId,
    /// Multiple categories have the same ID.
    DuplicateCategoryId,
    /// Multiple images have the same ID.
    DuplicateImageId,
    /// Multiple annotations have the same ID.
    DuplicateAnnotationId,
    /// Multiple categories have the same name.
    DuplicateCategoryName,
    /// Multiple images have the same filename.
    DuplicateFileName,

    // Reference issues
    /// An image references a non-existent license.
    MissingLicenseRef,
    /// An annotation references a non-existent image.
    MissingImageRef,
    /// An annotation references a non-existent category.
    MissingCategoryRef,
    /// A split references an annotation file that does not exist.
    MissingSplitFile,

    // Conditional schema issues
    /// Category ids are not exactly `1..=N`.
    NonContiguousCategoryIds,
    /// An annotation of a keypoint category has no keypoints.
    MissingKeypoints,
    /// An annotation has the wrong number of keypoint values for its category.
    KeypointCountMismatch,
    /// `num_keypoints` disagrees with the visible triplets.
    NumKeypointsMismatch,
    /// The manifest does not hold exactly one task template.
    TaskTemplateCount,
    /// A keypoints task lacks a positive `num_keypoints`.
    MissingNumKeypoints,
    /// A task template's `annotations` lacks fields the task requires.
    MissingTaskAnnotations,
    /// The manifest lacks one of the canonical splits.
    MissingSplits,
    /// A feature slot holds a feature of the wrong variant.
    FeatureTypeMismatch,

    // Consistency warnings
    /// `ClassLabel.num_classes` disagrees with `ClassLabel.names`.
    ClassLabelCountMismatch,
    /// Task template labels disagree with an annotation file's categories.
    LabelsMismatch,
    /// A keypoint category disagrees with the task's `num_keypoints`.
    KeypointSchemaMismatch,
    /// A detection or keypoints annotation has no bounding box.
    MissingBBox,
    /// A split's `num_examples` disagrees with its image count.
    SplitSizeMismatch,
}

impl IssueCode {
    /// Returns the violation family this code belongs to.
    pub fn kind(self) -> ViolationKind {
        use IssueCode::*;
        match self {
            InvalidDocument | MissingField | InvalidFieldType | InvalidKeypointLabels
            | InvalidSkeleton | InvalidBBox | InvalidKeypoints | InvalidIscrowd
            | InvalidSegmentation | EmptyFileName | InvalidTask | InvalidFeature => {
                ViolationKind::MalformedField
            }
            DuplicateLicenseId | DuplicateCategoryId | DuplicateImageId
            | DuplicateAnnotationId | DuplicateCategoryName | DuplicateFileName => {
                ViolationKind::DuplicateIdentifier
            }
            MissingLicenseRef | MissingImageRef | MissingCategoryRef | MissingSplitFile => {
                ViolationKind::ReferentialIntegrity
            }
            NonContiguousCategoryIds | MissingKeypoints | KeypointCountMismatch
            | NumKeypointsMismatch | TaskTemplateCount | MissingNumKeypoints
            | MissingTaskAnnotations | MissingSplits | FeatureTypeMismatch
            | ClassLabelCountMismatch | LabelsMismatch | KeypointSchemaMismatch | MissingBBox
            | SplitSizeMismatch => ViolationKind::SchemaContract,
        }
    }
}

/// Context about where a validation issue occurred.
///
/// Record ids are kept in their textual JSON form since image and
/// annotation ids may be integers, floats or strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum IssueContext {
    /// Issue with the document as a whole.
    Document,
    /// Issue with a whole collection (e.g. `categories`).
    Collection { name: &'static str },
    /// Issue with a specific license.
    License { id: String },
    /// Issue with a specific category.
    Category { id: String },
    /// Issue with a specific image.
    Image { id: String },
    /// Issue with a specific annotation.
    Annotation { id: String },
    /// Issue with a manifest entry as a whole.
    DatasetInfo { dataset: Option<String> },
    /// Issue with one task template of a manifest entry.
    TaskTemplate {
        dataset: Option<String>,
        index: usize,
    },
    /// Issue with one split of a manifest entry.
    Split {
        dataset: Option<String>,
        split: String,
    },
    /// Issue with a feature declaration, addressed by its key path.
    Feature {
        dataset: Option<String>,
        path: String,
    },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Document => write!(f, "document"),
            IssueContext::Collection { name } => write!(f, "{}", name),
            IssueContext::License { id } => write!(f, "license id={}", id),
            IssueContext::Category { id } => write!(f, "category id={}", id),
            IssueContext::Image { id } => write!(f, "image id={}", id),
            IssueContext::Annotation { id } => write!(f, "annotation id={}", id),
            IssueContext::DatasetInfo { dataset } => {
                write!(f, "dataset_info{}", DatasetSuffix(dataset))
            }
            IssueContext::TaskTemplate { dataset, index } => {
                write!(f, "task_templates[{}]{}", index, DatasetSuffix(dataset))
            }
            IssueContext::Split { dataset, split } => {
                write!(f, "split '{}'{}", split, DatasetSuffix(dataset))
            }
            IssueContext::Feature { dataset, path } => {
                write!(f, "features.{}{}", path, DatasetSuffix(dataset))
            }
        }
    }
}

struct DatasetSuffix<'a>(&'a Option<String>);

impl fmt::Display for DatasetSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(name) => write!(f, " of '{}'", name),
            None => Ok(()),
        }
    }
}
