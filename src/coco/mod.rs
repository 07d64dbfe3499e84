//! COCO annotation file validation.
//!
//! Validation runs in two phases. The field-level phase builds typed records
//! from the decoded JSON and rejects individually malformed ones; if any
//! record is rejected the document is rejected without running the second
//! phase. The whole-collection phase ([`integrity::check_integrity`]) then
//! checks uniqueness, foreign keys and the keypoint schema contract.
//!
//! # Example
//!
//! ```
//! use annoguard::coco::from_coco_str;
//!
//! let dataset = from_coco_str(r#"{
//!     "licenses": [{"id": 1, "name": "MIT"}],
//!     "categories": [{"id": 1, "name": "cat", "supercategory": "animal"}],
//!     "images": [{"id": 1, "file_name": "img_0001.jpg", "license": 1}],
//!     "annotations": [{"id": 1, "image_id": 1, "category_id": 1}]
//! }"#)?;
//! assert_eq!(dataset.annotations[0].bbox, Vec::<f64>::new());
//! # Ok::<(), annoguard::AnnoguardError>(())
//! ```

mod fields;
mod ids;
pub mod integrity;
mod model;

pub use ids::{CategoryId, LicenseId, RecordId};
pub use model::{
    Annotation, Category, CocoDataset, Extra, Image, Info, License, Rle, RleCounts, Segmentation,
};

use std::path::Path;

use serde_json::Value;

use crate::error::AnnoguardError;
use crate::io::{read_json_file, write_json_file};
use crate::validation::primitives::{extra_fields, field, json_type, FieldError, Object};
use crate::validation::{IssueCode, IssueContext, Outcome, ValidationIssue, ValidationReport};

const TOP_LEVEL_KEYS: &[&str] = &["info", "licenses", "categories", "images", "annotations"];

/// Validates a decoded COCO annotation document.
///
/// Returns the validated dataset, or a report listing every violation.
pub fn validate_coco(document: &Value) -> Outcome<CocoDataset> {
    let mut report = ValidationReport::new();

    let Some(root) = document.as_object() else {
        report.add(ValidationIssue::error(
            IssueCode::InvalidDocument,
            format!(
                "annotation file must be a JSON object; got {}",
                json_type(document)
            ),
            IssueContext::Document,
        ));
        return Err(report);
    };

    let info = match field(root, "info") {
        None => None,
        Some(Value::Object(obj)) => match fields::info_from_object(obj) {
            Ok(info) => Some(info),
            Err(errors) => {
                add_field_errors(&mut report, errors, || IssueContext::Collection { name: "info" });
                None
            }
        },
        Some(other) => {
            report.add(ValidationIssue::error(
                IssueCode::InvalidDocument,
                format!("info must be an object; got {}", json_type(other)),
                IssueContext::Collection { name: "info" },
            ));
            None
        }
    };

    let licenses = collect_records(
        root,
        "licenses",
        false,
        |id| IssueContext::License { id },
        fields::license_from_object,
        &mut report,
    );
    let categories = collect_records(
        root,
        "categories",
        true,
        |id| IssueContext::Category { id },
        fields::category_from_object,
        &mut report,
    );
    let images = collect_records(
        root,
        "images",
        true,
        |id| IssueContext::Image { id },
        fields::image_from_object,
        &mut report,
    );
    let annotations = collect_records(
        root,
        "annotations",
        true,
        |id| IssueContext::Annotation { id },
        fields::annotation_from_object,
        &mut report,
    );

    tracing::debug!(
        licenses = licenses.len(),
        categories = categories.len(),
        images = images.len(),
        annotations = annotations.len(),
        field_errors = report.error_count(),
        "annotation field-level phase finished"
    );

    if !report.is_ok() {
        return Err(report);
    }

    let dataset = CocoDataset {
        info,
        licenses,
        images,
        annotations,
        categories,
        extra: extra_fields(root, TOP_LEVEL_KEYS),
    };
    integrity::check_integrity(&dataset).into_result(dataset)
}

/// Builds every record of one collection, reporting per-record field errors.
fn collect_records<T>(
    root: &Object,
    key: &'static str,
    required: bool,
    context: fn(String) -> IssueContext,
    build: fn(&Object) -> Result<T, Vec<FieldError>>,
    report: &mut ValidationReport,
) -> Vec<T> {
    let items = match field(root, key) {
        None => {
            if required {
                report.add(ValidationIssue::error(
                    IssueCode::MissingField,
                    format!("'{}' is required", key),
                    IssueContext::Collection { name: key },
                ));
            }
            return Vec::new();
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            report.add(ValidationIssue::error(
                IssueCode::InvalidDocument,
                format!("'{}' must be a list; got {}", key, json_type(other)),
                IssueContext::Collection { name: key },
            ));
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            report.add(ValidationIssue::error(
                IssueCode::InvalidFieldType,
                format!("{} entries must be objects; got {}", key, json_type(item)),
                context(format!("<unknown #{}>", index)),
            ));
            continue;
        };
        match build(obj) {
            Ok(record) => records.push(record),
            Err(errors) => {
                let id = fields::id_label(obj, index);
                add_field_errors(report, errors, || context(id.clone()));
            }
        }
    }
    records
}

fn add_field_errors(
    report: &mut ValidationReport,
    errors: Vec<FieldError>,
    context: impl Fn() -> IssueContext,
) {
    for err in errors {
        report.add(ValidationIssue::error(err.code, err.message, context()));
    }
}

/// Validates a COCO annotation file, returning the outcome as data.
///
/// # Errors
/// Returns an error only if the file cannot be read or is not JSON.
pub fn validate_coco_file(path: &Path) -> Result<Outcome<CocoDataset>, AnnoguardError> {
    let document = read_json_file(path)?;
    Ok(validate_coco(&document))
}

/// Reads and validates a COCO annotation file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, or if validation
/// rejects it ([`AnnoguardError::ValidationFailed`]).
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use annoguard::coco::read_coco_json;
///
/// let dataset = read_coco_json(Path::new("annotations/coco_train.json"))?;
/// # Ok::<(), annoguard::AnnoguardError>(())
/// ```
pub fn read_coco_json(path: &Path) -> Result<CocoDataset, AnnoguardError> {
    validate_coco_file(path)?
        .map(|validated| validated.value)
        .map_err(AnnoguardError::rejected)
}

/// Writes a validated dataset back to a COCO JSON file.
pub fn write_coco_json(path: &Path, dataset: &CocoDataset) -> Result<(), AnnoguardError> {
    write_json_file(path, dataset)
}

/// Reads and validates a dataset from a COCO JSON string.
///
/// Useful for testing without file I/O.
pub fn from_coco_str(json: &str) -> Result<CocoDataset, AnnoguardError> {
    let document: Value = serde_json::from_str(json).map_err(AnnoguardError::JsonDecode)?;
    validate_coco(&document)
        .map(|validated| validated.value)
        .map_err(AnnoguardError::rejected)
}

/// Reads and validates a dataset from a COCO JSON byte slice.
///
/// Useful for fuzzing and processing raw bytes without UTF-8 validation overhead.
pub fn from_coco_slice(bytes: &[u8]) -> Result<CocoDataset, AnnoguardError> {
    let document: Value = serde_json::from_slice(bytes).map_err(AnnoguardError::JsonDecode)?;
    validate_coco(&document)
        .map(|validated| validated.value)
        .map_err(AnnoguardError::rejected)
}

/// Writes a validated dataset to a COCO JSON string.
pub fn to_coco_string(dataset: &CocoDataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ViolationKind;
    use serde_json::json;

    /// 1 license, 1 category, 1 image, 1 annotation without bbox or keypoints.
    fn valid_base_dataset() -> Value {
        json!({
            "info": {"year": "2025", "version": "1.0"},
            "licenses": [{"id": 1, "name": "MIT"}],
            "categories": [{"id": 1, "name": "cat", "supercategory": "animal"}],
            "images": [{"id": 1, "file_name": "img_0001.jpg", "license": 1}],
            "annotations": [{
                "id": 1,
                "image_id": 1,
                "category_id": 1,
                "bbox": [],
                "segmentation": null,
                "iscrowd": null,
                "area": null,
                "keypoints": null,
                "num_keypoints": null
            }]
        })
    }

    fn valid_kp_dataset(k: usize) -> Value {
        let labels: Vec<String> = (0..k).map(|i| format!("k{}", i)).collect();
        let keypoints: Vec<i64> = (0..k).flat_map(|i| [i as i64 + 1, i as i64 + 1, 2]).collect();
        json!({
            "licenses": [{"id": 1}],
            "categories": [{
                "id": 1, "name": "person", "supercategory": "person", "keypoints": labels
            }],
            "images": [{"id": 1, "file_name": "img.jpg", "license": 1, "width": 100, "height": 100}],
            "annotations": [{
                "id": 1, "image_id": 1, "category_id": 1,
                "bbox": [0, 0, 10, 10], "keypoints": keypoints, "num_keypoints": k
            }]
        })
    }

    fn rejection(document: &Value) -> ValidationReport {
        match validate_coco(document) {
            Ok(_) => panic!("expected rejection"),
            Err(report) => report,
        }
    }

    fn assert_rejected_with(document: &Value, needle: &str) {
        let report = rejection(document);
        assert!(
            report.issues.iter().any(|i| i.to_string().contains(needle)),
            "no issue contains {:?}: {}",
            needle,
            report
        );
    }

    #[test]
    fn test_minimal_dataset_validates_and_normalizes() {
        let dataset = validate_coco(&valid_base_dataset())
            .expect("valid dataset")
            .into_inner();
        let ann = &dataset.annotations[0];
        assert!(ann.bbox.is_empty());
        assert_eq!(ann.segmentation, Segmentation::default());
        assert_eq!(dataset.info.as_ref().and_then(|i| i.version.as_deref()), Some("1.0"));
    }

    #[test]
    fn test_keypoint_dataset_validates() {
        assert!(validate_coco(&valid_kp_dataset(4)).is_ok());
    }

    #[test]
    fn test_document_must_be_object() {
        let report = rejection(&json!([1, 2]));
        assert_eq!(report.issues[0].code, IssueCode::InvalidDocument);
    }

    #[test]
    fn test_required_collections() {
        let report = rejection(&json!({"licenses": []}));
        assert_eq!(report.with_code(IssueCode::MissingField).count(), 3);
    }

    #[test]
    fn test_skeleton_out_of_range() {
        let mut doc = valid_base_dataset();
        doc["categories"][0]["keypoints"] = json!(["a", "b"]);
        doc["categories"][0]["skeleton"] = json!([[1, 3]]);
        assert_rejected_with(&doc, "out of range for 2 keypoints");
    }

    #[test]
    fn test_skeleton_zero_index() {
        let mut doc = valid_base_dataset();
        doc["categories"][0]["skeleton"] = json!([[0, 1]]);
        assert_rejected_with(&doc, "must be 1-based");
    }

    #[test]
    fn test_image_missing_license_reference() {
        let mut doc = valid_base_dataset();
        doc["images"][0]["license"] = json!(999);
        assert_rejected_with(&doc, "references unknown license id=999");
    }

    #[test]
    fn test_visibility_zero_needs_zero_coordinates() {
        let mut doc = valid_base_dataset();
        doc["annotations"][0]["keypoints"] = json!([5, 5, 0]);
        assert_rejected_with(&doc, "When visibility v=0");
    }

    #[test]
    fn test_bbox_negative_is_labeled_with_annotation_id() {
        let mut doc = valid_base_dataset();
        doc["annotations"][0]["id"] = json!(7);
        doc["annotations"][0]["bbox"] = json!([1, 2, -3, 4]);
        assert_rejected_with(&doc, "annotation id=7: bbox values must be non-negative");
    }

    #[test]
    fn test_field_errors_skip_integrity_pass() {
        let mut doc = valid_base_dataset();
        doc["annotations"][0]["iscrowd"] = json!(5);
        // Would be a dangling reference, but the field phase rejects first.
        doc["images"][0]["license"] = json!(999);
        let report = rejection(&doc);
        assert!(report.has_code(IssueCode::InvalidIscrowd));
        assert!(!report.has_code(IssueCode::MissingLicenseRef));
        assert!(report
            .issues
            .iter()
            .all(|i| i.kind == ViolationKind::MalformedField));
    }

    #[test]
    fn test_structural_violations_accumulate() {
        let mut doc = valid_base_dataset();
        doc["licenses"] = json!([{"id": 1}, {"id": 1}]);
        doc["images"] = json!([
            {"id": 1, "file_name": "a.jpg", "license": 3},
            {"id": 1, "file_name": "a.jpg"}
        ]);
        doc["annotations"][0]["image_id"] = json!(8);
        let report = rejection(&doc);
        for code in [
            IssueCode::DuplicateLicenseId,
            IssueCode::DuplicateImageId,
            IssueCode::DuplicateFileName,
            IssueCode::MissingLicenseRef,
            IssueCode::MissingImageRef,
        ] {
            assert!(report.has_code(code), "missing {:?} in {}", code, report);
        }
    }

    #[test]
    fn test_keypoints_length_mismatch() {
        let mut doc = valid_kp_dataset(4);
        doc["annotations"][0]["keypoints"] = json!([1, 1, 2, 1, 1, 2, 1, 1, 2]);
        doc["annotations"][0]["num_keypoints"] = json!(null);
        assert_rejected_with(&doc, "annotation id=1: keypoints length must be 12 (got 9)");
    }

    #[test]
    fn test_kp_category_requires_keypoints() {
        let mut doc = valid_kp_dataset(2);
        doc["annotations"][0]["keypoints"] = json!(null);
        assert_rejected_with(&doc, "must include 'keypoints'");
    }

    #[test]
    fn test_num_keypoints_mismatch() {
        let mut doc = valid_kp_dataset(3);
        doc["annotations"][0]["keypoints"] = json!([0, 0, 2, 0, 0, 2, 0, 0, 0]);
        doc["annotations"][0]["num_keypoints"] = json!(3);
        assert_rejected_with(&doc, "num_keypoints=3 but computed visible=2");
    }

    #[test]
    fn test_extra_keys_round_trip() {
        let mut doc = valid_base_dataset();
        doc["type"] = json!("instances");
        doc["images"][0]["camera"] = json!({"model": "x100"});
        let dataset = validate_coco(&doc).expect("valid").into_inner();
        let json = to_coco_string(&dataset).expect("serialize");
        let reparsed: Value = serde_json::from_str(&json).expect("json");
        assert_eq!(reparsed["type"], "instances");
        assert_eq!(reparsed["images"][0]["camera"]["model"], "x100");
        assert_eq!(reparsed["annotations"][0]["segmentation"], json!([[]]));
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let first = validate_coco(&valid_kp_dataset(3)).expect("valid").into_inner();
        let json = serde_json::to_value(&first).expect("serialize");
        let second = validate_coco(&json).expect("still valid").into_inner();
        assert_eq!(first, second);
    }

    #[test]
    fn test_numeric_info_text_is_accepted() {
        let mut doc = valid_base_dataset();
        doc["info"] = json!({"year": 2017, "version": 1.0, "url": 42});
        let dataset = validate_coco(&doc).expect("valid").into_inner();
        let info = dataset.info.expect("info kept");
        assert_eq!(info.version.as_deref(), Some("1.0"));
        assert_eq!(info.url.as_deref(), Some("42"));

        doc["info"]["description"] = json!(["not", "text"]);
        assert_rejected_with(&doc, "description must be a string or a number; got array");
    }

    #[test]
    fn test_integral_float_dimensions_are_accepted() {
        let mut doc = valid_kp_dataset(2);
        doc["images"][0]["height"] = json!(480.0);
        doc["annotations"][0]["num_keypoints"] = json!(2.0);
        let dataset = validate_coco(&doc).expect("valid").into_inner();
        assert_eq!(dataset.images[0].height, Some(480));
        assert_eq!(dataset.annotations[0].num_keypoints, Some(2));

        doc["images"][0]["width"] = json!(640.5);
        assert_rejected_with(&doc, "width must be an integer; got float");
    }

    #[test]
    fn test_large_unsigned_image_ids_are_not_duplicates() {
        let mut doc = valid_base_dataset();
        doc["images"] = json!([
            {"id": 18446744073709551614u64, "file_name": "a.jpg"},
            {"id": 18446744073709551615u64, "file_name": "b.jpg"}
        ]);
        doc["annotations"][0]["image_id"] = json!(18446744073709551615u64);
        let dataset = validate_coco(&doc).expect("distinct ids").into_inner();
        let json = serde_json::to_value(&dataset).expect("serialize");
        assert_eq!(json["images"][1]["id"], json!(18446744073709551615u64));
    }

    #[test]
    fn test_category_lookup() {
        let dataset = validate_coco(&valid_kp_dataset(2)).expect("valid").into_inner();
        let person = dataset.category(CategoryId::new(1)).expect("category 1");
        assert_eq!(person.name, "person");
        assert!(dataset.category(CategoryId::new(2)).is_none());
    }

    #[test]
    fn test_from_coco_str_reports_rejection_as_error() {
        let err = from_coco_str(r#"{"categories": [], "images": [], "annotations": [{}]}"#)
            .unwrap_err();
        assert!(matches!(err, AnnoguardError::ValidationFailed { .. }));
        let err = from_coco_str("not json").unwrap_err();
        assert!(matches!(err, AnnoguardError::JsonDecode(_)));
    }
}
