//! `dataset_infos.json` manifest validation.
//!
//! A manifest maps dataset names to [`DatasetInfo`] entries. Each entry is
//! validated in two phases, like annotation files: field-level construction
//! of the task templates, splits and feature tree, then the entry-wide
//! contract (one template, task-specific requirements, canonical splits).

mod fields;
mod model;

pub use model::{
    BBoxFeature, ClassLabel, DatasetInfo, DatasetInfos, Feature, Features, ImageFeature,
    SequenceFeature, SplitInfo, TaskKind, TaskTemplate, TextFeature, REQUIRED_SPLITS,
};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::Value;

use crate::error::AnnoguardError;
use crate::io::{read_json_file, write_json_file};
use crate::validation::primitives::{
    extra_fields, field, json_type, optional_object, optional_str, optional_whole, FieldError,
    Object,
};
use crate::validation::{IssueCode, IssueContext, Outcome, ValidationIssue, ValidationReport};

const INFO_KEYS: &[&str] = &[
    "task_templates",
    "splits",
    "description",
    "citation",
    "homepage",
    "license",
    "features",
    "post_processed",
    "supervised_keys",
    "builder_name",
    "config_name",
    "version",
    "download_size",
    "post_processing_size",
    "dataset_size",
    "size_in_bytes",
];

const SPLITS_SHAPE: &str =
    "`splits` must be a non-empty mapping with keys: 'train', 'validation', 'test'.";

/// Validates one decoded manifest entry. `dataset` names the entry in
/// issue contexts.
pub fn validate_dataset_info(document: &Value, dataset: Option<&str>) -> Outcome<DatasetInfo> {
    let dataset = dataset.map(str::to_string);
    let mut report = ValidationReport::new();
    let entry = || IssueContext::DatasetInfo {
        dataset: dataset.clone(),
    };

    let Some(root) = document.as_object() else {
        report.add(ValidationIssue::error(
            IssueCode::InvalidDocument,
            format!("dataset info must be a JSON object; got {}", json_type(document)),
            entry(),
        ));
        return Err(report);
    };

    let templates = collect_templates(root, &dataset, &mut report);
    let splits = collect_splits(root, &dataset, &mut report);

    let features = match optional_object(root, "features") {
        Ok(None) => None,
        Ok(Some(obj)) => match fields::features_from_object(obj) {
            Ok(features) => Some(features),
            Err(errors) => {
                for (path, err) in errors {
                    report.add(ValidationIssue::error(
                        err.code,
                        err.message,
                        IssueContext::Feature {
                            dataset: dataset.clone(),
                            path,
                        },
                    ));
                }
                None
            }
        },
        Err(err) => {
            report.add(ValidationIssue::error(err.code, err.message, entry()));
            None
        }
    };

    let mut scalars = Vec::new();
    let mut text = |key: &str| match optional_str(root, key) {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            scalars.push(err);
            String::new()
        }
    };
    let description = text("description");
    let citation = text("citation");
    let homepage = text("homepage");
    let license = text("license");
    let builder_name = optional_str(root, "builder_name").unwrap_or_else(|e| keep(&mut scalars, e));
    let config_name = optional_str(root, "config_name").unwrap_or_else(|e| keep(&mut scalars, e));
    let version = optional_object(root, "version")
        .map(|v| v.cloned())
        .unwrap_or_else(|e| keep(&mut scalars, e));
    let mut size = |key: &str| optional_whole(root, key).unwrap_or_else(|e| keep(&mut scalars, e));
    let download_size = size("download_size");
    let post_processing_size = size("post_processing_size");
    let dataset_size = size("dataset_size");
    let size_in_bytes = size("size_in_bytes");
    for err in scalars {
        report.add(ValidationIssue::error(err.code, err.message, entry()));
    }

    tracing::debug!(
        dataset = dataset.as_deref().unwrap_or("-"),
        templates = templates.len(),
        splits = splits.len(),
        field_errors = report.error_count(),
        "dataset info field-level phase finished"
    );

    if !report.is_ok() {
        return Err(report);
    }

    let contract = check_contract(&templates, &splits, features.as_ref(), &dataset);
    let Ok([task_template]) = <[TaskTemplate; 1]>::try_from(templates) else {
        return Err(contract);
    };
    contract.into_result(DatasetInfo {
        task_template,
        splits,
        description,
        citation,
        homepage,
        license,
        features,
        post_processed: field(root, "post_processed").cloned(),
        supervised_keys: field(root, "supervised_keys").cloned(),
        builder_name,
        config_name,
        version,
        download_size,
        post_processing_size,
        dataset_size,
        size_in_bytes,
        extra: extra_fields(root, INFO_KEYS),
    })
}

fn keep<T: Default>(errors: &mut Vec<FieldError>, err: FieldError) -> T {
    errors.push(err);
    T::default()
}

fn collect_templates(
    root: &Object,
    dataset: &Option<String>,
    report: &mut ValidationReport,
) -> Vec<TaskTemplate> {
    let items = match field(root, "task_templates") {
        Some(Value::Array(items)) => items,
        other => {
            let (code, message) = match other {
                None => (IssueCode::MissingField, "task_templates is required".to_string()),
                Some(value) => (
                    IssueCode::InvalidFieldType,
                    format!("task_templates must be a list; got {}", json_type(value)),
                ),
            };
            report.add(ValidationIssue::error(
                code,
                message,
                IssueContext::DatasetInfo {
                    dataset: dataset.clone(),
                },
            ));
            return Vec::new();
        }
    };

    let mut templates = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let context = || IssueContext::TaskTemplate {
            dataset: dataset.clone(),
            index,
        };
        let Some(obj) = item.as_object() else {
            report.add(ValidationIssue::error(
                IssueCode::InvalidFieldType,
                format!("task template must be an object; got {}", json_type(item)),
                context(),
            ));
            continue;
        };
        match fields::task_template_from_object(obj) {
            Ok(template) => templates.push(template),
            Err(errors) => {
                for err in errors {
                    report.add(ValidationIssue::error(err.code, err.message, context()));
                }
            }
        }
    }
    templates
}

fn collect_splits(
    root: &Object,
    dataset: &Option<String>,
    report: &mut ValidationReport,
) -> BTreeMap<String, SplitInfo> {
    let entries = match field(root, "splits") {
        Some(Value::Object(entries)) => entries,
        other => {
            let code = if other.is_none() {
                IssueCode::MissingField
            } else {
                IssueCode::InvalidFieldType
            };
            report.add(ValidationIssue::error(
                code,
                SPLITS_SHAPE,
                IssueContext::DatasetInfo {
                    dataset: dataset.clone(),
                },
            ));
            return BTreeMap::new();
        }
    };

    let mut splits = BTreeMap::new();
    for (key, value) in entries {
        let context = || IssueContext::Split {
            dataset: dataset.clone(),
            split: key.clone(),
        };
        let Some(obj) = value.as_object() else {
            report.add(ValidationIssue::error(
                IssueCode::InvalidFieldType,
                format!("split must be an object; got {}", json_type(value)),
                context(),
            ));
            continue;
        };
        match fields::split_from_object(obj) {
            Ok(split) => {
                splits.insert(key.clone(), split);
            }
            Err(errors) => {
                for err in errors {
                    report.add(ValidationIssue::error(err.code, err.message, context()));
                }
            }
        }
    }
    splits
}

/// The entry-wide pass over well-formed fields.
fn check_contract(
    templates: &[TaskTemplate],
    splits: &BTreeMap<String, SplitInfo>,
    features: Option<&Features>,
    dataset: &Option<String>,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    let entry = || IssueContext::DatasetInfo {
        dataset: dataset.clone(),
    };

    if templates.len() != 1 {
        report.add(ValidationIssue::error(
            IssueCode::TaskTemplateCount,
            format!(
                "task_templates must contain exactly one element; got {}",
                templates.len()
            ),
            entry(),
        ));
    }

    for (index, template) in templates.iter().enumerate() {
        let context = || IssueContext::TaskTemplate {
            dataset: dataset.clone(),
            index,
        };
        if template.task == TaskKind::Keypoints && !matches!(template.num_keypoints, Some(n) if n > 0)
        {
            report.add(ValidationIssue::error(
                IssueCode::MissingNumKeypoints,
                "For task='keypoints', num_keypoints must be a positive integer.",
                context(),
            ));
        }
        if let Some(listed) = &template.annotations {
            let required = template.task.required_annotations();
            let missing: Vec<&str> = required
                .iter()
                .copied()
                .filter(|name| !listed.iter().any(|l| l == name))
                .collect();
            if !missing.is_empty() {
                report.add(ValidationIssue::error(
                    IssueCode::MissingTaskAnnotations,
                    format!(
                        "For task='{}', annotations must include {}; missing: {}",
                        template.task.as_str(),
                        quoted_list(required.iter().copied()),
                        quoted_list(missing)
                    ),
                    context(),
                ));
            }
        }
    }

    if splits.is_empty() {
        report.add(ValidationIssue::error(
            IssueCode::MissingSplits,
            SPLITS_SHAPE,
            entry(),
        ));
    } else {
        let missing: Vec<&str> = REQUIRED_SPLITS
            .into_iter()
            .filter(|name| !splits.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            report.add(ValidationIssue::error(
                IssueCode::MissingSplits,
                format!(
                    "splits must include ('train', 'validation', 'test'); missing: {}",
                    quoted_list(missing)
                ),
                entry(),
            ));
        }
    }

    if let Some(labels) = features.and_then(|f| f.labels.as_ref()) {
        check_class_labels(labels, "labels", dataset, &mut report);
    }
    report
}

/// Warns when a `ClassLabel` declares a class count that disagrees with its
/// names.
fn check_class_labels(
    sequence: &SequenceFeature,
    path: &str,
    dataset: &Option<String>,
    report: &mut ValidationReport,
) {
    if let Some(label) = &sequence.objects_label {
        if let (Some(count), Some(names)) = (label.num_classes, &label.names) {
            if count != names.len() as i64 {
                report.add(ValidationIssue::warning(
                    IssueCode::ClassLabelCountMismatch,
                    format!("num_classes={} but {} names are listed", count, names.len()),
                    IssueContext::Feature {
                        dataset: dataset.clone(),
                        path: format!("{}.objects_label", path),
                    },
                ));
            }
        }
    }
    if let Some(nested) = &sequence.objects_keypoint {
        check_class_labels(nested, &format!("{}.objects_keypoint", path), dataset, report);
    }
}

/// Formats names as `['a', 'b']`, sorted.
fn quoted_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let sorted: BTreeSet<&str> = names.into_iter().collect();
    let items: Vec<String> = sorted.iter().map(|n| format!("'{}'", n)).collect();
    format!("[{}]", items.join(", "))
}

/// Validates a whole decoded `dataset_infos.json` mapping.
///
/// Every entry is validated; violations from all entries are reported
/// together, each labeled with its dataset name.
pub fn validate_dataset_infos(document: &Value) -> Outcome<DatasetInfos> {
    let mut report = ValidationReport::new();
    let Some(root) = document.as_object() else {
        report.add(ValidationIssue::error(
            IssueCode::InvalidDocument,
            format!(
                "dataset infos must be a JSON object mapping dataset names to entries; got {}",
                json_type(document)
            ),
            IssueContext::Document,
        ));
        return Err(report);
    };

    let mut infos = BTreeMap::new();
    for (name, entry) in root {
        match validate_dataset_info(entry, Some(name)) {
            Ok(validated) => {
                report.extend(validated.warnings);
                infos.insert(name.clone(), validated.value);
            }
            Err(rejection) => report.extend(rejection),
        }
    }
    tracing::debug!(
        entries = root.len(),
        valid = infos.len(),
        "dataset infos validated"
    );
    report.into_result(DatasetInfos(infos))
}

/// Validates a manifest file, returning the outcome as data.
///
/// # Errors
/// Returns an error only if the file cannot be read or is not JSON.
pub fn validate_infos_file(path: &Path) -> Result<Outcome<DatasetInfos>, AnnoguardError> {
    let document = read_json_file(path)?;
    Ok(validate_dataset_infos(&document))
}

/// Reads and validates a manifest file.
pub fn read_dataset_infos(path: &Path) -> Result<DatasetInfos, AnnoguardError> {
    validate_infos_file(path)?
        .map(|validated| validated.value)
        .map_err(AnnoguardError::rejected)
}

/// Writes validated manifest entries back to a JSON file.
pub fn write_dataset_infos(path: &Path, infos: &DatasetInfos) -> Result<(), AnnoguardError> {
    write_json_file(path, infos)
}

/// Reads and validates a manifest from a JSON string.
pub fn from_infos_str(json: &str) -> Result<DatasetInfos, AnnoguardError> {
    let document: Value = serde_json::from_str(json).map_err(AnnoguardError::JsonDecode)?;
    validate_dataset_infos(&document)
        .map(|validated| validated.value)
        .map_err(AnnoguardError::rejected)
}

/// Reads and validates a manifest from raw bytes.
pub fn from_infos_slice(bytes: &[u8]) -> Result<DatasetInfos, AnnoguardError> {
    let document: Value = serde_json::from_slice(bytes).map_err(AnnoguardError::JsonDecode)?;
    validate_dataset_infos(&document)
        .map(|validated| validated.value)
        .map_err(AnnoguardError::rejected)
}

/// Writes validated manifest entries to a JSON string.
pub fn to_infos_string(infos: &DatasetInfos) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(infos)
}
