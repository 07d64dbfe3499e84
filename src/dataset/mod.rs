//! Dataset directory validation.
//!
//! A dataset directory holds a manifest and one COCO annotation file per
//! split:
//!
//! ```text
//! <root>/
//!   dataset_infos.json
//!   annotations/
//!     coco_train.json
//!     coco_validation.json
//!     coco_test.json
//! ```
//!
//! The manifest is validated first; a rejected manifest stops validation.
//! Each split file named by the manifest is then validated on its own, and
//! finally the manifest is cross-checked against the annotation files. The
//! cross-checks only raise warnings.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use serde::Serialize;

use crate::coco::{validate_coco, CocoDataset};
use crate::error::AnnoguardError;
use crate::info::{validate_infos_file, DatasetInfo, DatasetInfos, TaskKind};
use crate::io::read_json_file;
use crate::validation::{IssueCode, IssueContext, Outcome, ValidationIssue, ValidationReport};

/// File name of the manifest at the dataset root.
pub const DATASET_INFOS_FILE: &str = "dataset_infos.json";

/// Directory holding the per-split annotation files.
pub const ANNOTATIONS_DIR: &str = "annotations";

/// A dataset whose manifest and split files all validated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidatedDataset {
    pub infos: DatasetInfos,

    /// Annotation file name (relative to `annotations/`) to its contents.
    pub splits: BTreeMap<String, CocoDataset>,
}

/// A split of one manifest entry.
#[derive(Clone, Debug)]
struct SplitRef {
    dataset: String,
    split: String,
}

impl SplitRef {
    fn context(&self) -> IssueContext {
        IssueContext::Split {
            dataset: Some(self.dataset.clone()),
            split: self.split.clone(),
        }
    }
}

/// Validates a dataset directory.
///
/// # Errors
/// Returns an error if the manifest is missing, if a file cannot be read,
/// or if the manifest is not JSON. Validation failures, including split files
/// that are missing or not JSON, are returned as data in the [`Outcome`].
pub fn validate_dataset_dir(root: &Path) -> Result<Outcome<ValidatedDataset>, AnnoguardError> {
    let manifest_path = root.join(DATASET_INFOS_FILE);
    if !manifest_path.is_file() {
        return Err(AnnoguardError::ManifestNotFound(manifest_path));
    }

    let infos = match validate_infos_file(&manifest_path)? {
        Ok(validated) => validated,
        Err(report) => return Ok(Err(report.with_source(DATASET_INFOS_FILE))),
    };
    let mut report = infos.warnings.with_source(DATASET_INFOS_FILE);
    let infos = infos.value;

    if infos.is_empty() {
        report.add(
            ValidationIssue::error(
                IssueCode::InvalidDocument,
                "manifest declares no datasets",
                IssueContext::Document,
            )
            .in_source(DATASET_INFOS_FILE),
        );
        return Ok(Err(report));
    }

    let files = split_files(&infos, &mut report);
    tracing::info!(
        root = %root.display(),
        datasets = infos.len(),
        files = files.len(),
        "validating dataset directory"
    );

    let annotations_dir = root.join(ANNOTATIONS_DIR);
    let mut splits = BTreeMap::new();
    for (file, refs) in &files {
        let source = format!("{}/{}", ANNOTATIONS_DIR, file);
        let path = annotations_dir.join(file);
        if !path.is_file() {
            for split in refs {
                report.add(
                    ValidationIssue::error(
                        IssueCode::MissingSplitFile,
                        format!("annotation file '{}' not found", source),
                        split.context(),
                    )
                    .in_source(DATASET_INFOS_FILE),
                );
            }
            continue;
        }

        let document = match read_json_file(&path) {
            Ok(document) => document,
            Err(AnnoguardError::JsonParse { source: err, .. }) => {
                report.add(
                    ValidationIssue::error(
                        IssueCode::InvalidDocument,
                        format!("annotation file is not valid JSON: {}", err),
                        IssueContext::Document,
                    )
                    .in_source(source.as_str()),
                );
                continue;
            }
            Err(err) => return Err(err),
        };

        match validate_coco(&document) {
            Ok(validated) => {
                tracing::debug!(file = %source, "split file validated");
                report.extend(validated.warnings.with_source(source.as_str()));
                splits.insert(file.clone(), validated.value);
            }
            Err(rejection) => {
                tracing::debug!(file = %source, errors = rejection.error_count(), "split file rejected");
                report.extend(rejection.with_source(source.as_str()));
            }
        }
    }

    if !report.is_ok() {
        return Ok(Err(report));
    }

    for (file, refs) in &files {
        let Some(coco) = splits.get(file) else {
            continue;
        };
        let source = format!("{}/{}", ANNOTATIONS_DIR, file);
        for split in refs {
            let Some(info) = infos.get(&split.dataset) else {
                continue;
            };
            report.extend(cross_check(info, split, coco).with_source(source.as_str()));
        }
    }

    Ok(report.into_result(ValidatedDataset { infos, splits }))
}

/// Groups the manifest's splits by annotation file. Several splits may
/// share one file; it is validated once.
fn split_files(
    infos: &DatasetInfos,
    report: &mut ValidationReport,
) -> BTreeMap<String, Vec<SplitRef>> {
    let mut files: BTreeMap<String, Vec<SplitRef>> = BTreeMap::new();
    for (dataset, info) in infos.iter() {
        for (key, split) in &info.splits {
            let split_ref = SplitRef {
                dataset: dataset.clone(),
                split: key.clone(),
            };
            if !is_plain_file_name(&split.dataset_name) {
                report.add(
                    ValidationIssue::error(
                        IssueCode::InvalidFieldType,
                        format!(
                            "dataset_name must be a file name inside {}/; got '{}'",
                            ANNOTATIONS_DIR, split.dataset_name
                        ),
                        split_ref.context(),
                    )
                    .in_source(DATASET_INFOS_FILE),
                );
                continue;
            }
            files
                .entry(split.dataset_name.clone())
                .or_default()
                .push(split_ref);
        }
    }
    files
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Compares one manifest split with the annotation file it names.
fn cross_check(info: &DatasetInfo, split: &SplitRef, coco: &CocoDataset) -> ValidationReport {
    let mut report = ValidationReport::new();
    let template = &info.task_template;

    let names = coco.category_names();
    if !template.labels.is_empty() && template.labels != names {
        report.add(ValidationIssue::warning(
            IssueCode::LabelsMismatch,
            format!(
                "task labels {:?} differ from annotation categories {:?}",
                template.labels, names
            ),
            split.context(),
        ));
    }

    if template.task == TaskKind::Keypoints {
        if let Some(expected) = template.num_keypoints {
            for category in &coco.categories {
                let Some(count) = category.keypoint_count() else {
                    continue;
                };
                if count as i64 != expected {
                    report.add(ValidationIssue::warning(
                        IssueCode::KeypointSchemaMismatch,
                        format!(
                            "category id={} declares {} keypoints but num_keypoints={}",
                            category.id, count, expected
                        ),
                        split.context(),
                    ));
                }
            }
        }
    }

    if template.task.expects_bbox() {
        let mut without_bbox = coco.annotations.iter().filter(|ann| !ann.has_bbox());
        if let Some(first) = without_bbox.next() {
            let count = 1 + without_bbox.count();
            report.add(ValidationIssue::warning(
                IssueCode::MissingBBox,
                format!(
                    "{} annotation(s) have no bbox for task '{}' (first: annotation id={})",
                    count,
                    template.task.as_str(),
                    first.id
                ),
                split.context(),
            ));
        }
    }

    if let Some(declared) = info.splits.get(&split.split).and_then(|s| s.num_examples) {
        if declared != coco.images.len() as i64 {
            report.add(ValidationIssue::warning(
                IssueCode::SplitSizeMismatch,
                format!(
                    "num_examples={} but the annotation file has {} images",
                    declared,
                    coco.images.len()
                ),
                split.context(),
            ));
        }
    }
    report
}
