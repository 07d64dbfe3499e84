//! Whole-collection pass of annotation validation.
//!
//! Runs only on records that survived field-level construction. Checks
//! uniqueness, category id contiguity, foreign keys and the keypoint schema
//! contract, accumulating every violation.

use std::collections::{HashMap, HashSet};

use super::ids::{CategoryId, LicenseId, RecordId};
use super::model::CocoDataset;
use crate::validation::primitives::{find_duplicates, visible_keypoints};
use crate::validation::{IssueCode, IssueContext, ValidationIssue, ValidationReport};

/// Checks every cross-record invariant of a dataset.
pub fn check_integrity(dataset: &CocoDataset) -> ValidationReport {
    let mut report = ValidationReport::new();

    check_unique_ids(dataset, &mut report);
    check_categories(dataset, &mut report);
    check_images(dataset, &mut report);
    check_annotations(dataset, &mut report);

    tracing::debug!(
        violations = report.issues.len(),
        "annotation integrity pass finished"
    );
    report
}

/// Reports every id that occurs more than once, per collection.
fn check_unique_ids(dataset: &CocoDataset, report: &mut ValidationReport) {
    for id in find_duplicates(dataset.licenses.iter().map(|l| l.id)) {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateLicenseId,
            format!("Duplicate license id {}", id),
            IssueContext::License { id: id.to_string() },
        ));
    }
    for id in find_duplicates(dataset.categories.iter().map(|c| c.id)) {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateCategoryId,
            format!("Duplicate category id {}", id),
            IssueContext::Category { id: id.to_string() },
        ));
    }
    for id in find_duplicates(dataset.images.iter().map(|i| &i.id)) {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateImageId,
            format!("Duplicate image id {}", id),
            IssueContext::Image { id: id.to_string() },
        ));
    }
    for id in find_duplicates(dataset.annotations.iter().map(|a| &a.id)) {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateAnnotationId,
            format!("Duplicate annotation id {}", id),
            IssueContext::Annotation { id: id.to_string() },
        ));
    }
}

/// Category names must be distinct and ids exactly `1..=N`.
fn check_categories(dataset: &CocoDataset, report: &mut ValidationReport) {
    for name in find_duplicates(dataset.categories.iter().map(|c| c.name.as_str())) {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateCategoryName,
            format!("Duplicate category name '{}'", name),
            IssueContext::Collection { name: "categories" },
        ));
    }

    let expected: Vec<i64> = (1..=dataset.categories.len() as i64).collect();
    let mut actual: Vec<i64> = dataset.categories.iter().map(|c| c.id.as_i64()).collect();
    actual.sort_unstable();
    if actual != expected {
        report.add(ValidationIssue::error(
            IssueCode::NonContiguousCategoryIds,
            format!(
                "Category ids must be contiguous starting at 1; expected {:?}, got {:?}",
                expected, actual
            ),
            IssueContext::Collection { name: "categories" },
        ));
    }
}

/// File names must be unique; license references must resolve.
fn check_images(dataset: &CocoDataset, report: &mut ValidationReport) {
    for name in find_duplicates(dataset.images.iter().map(|i| i.file_name.as_str())) {
        report.add(ValidationIssue::error(
            IssueCode::DuplicateFileName,
            format!("Duplicate image file_name '{}'", name),
            IssueContext::Collection { name: "images" },
        ));
    }

    let license_ids: HashSet<LicenseId> = dataset.licenses.iter().map(|l| l.id).collect();
    for image in &dataset.images {
        if let Some(license) = image.license {
            if !license_ids.contains(&license) {
                report.add(ValidationIssue::error(
                    IssueCode::MissingLicenseRef,
                    format!("references unknown license id={}", license),
                    IssueContext::Image {
                        id: image.id.to_string(),
                    },
                ));
            }
        }
    }
}

/// Foreign keys, then the keypoint contract of the referenced category.
fn check_annotations(dataset: &CocoDataset, report: &mut ValidationReport) {
    let image_ids: HashSet<&RecordId> = dataset.images.iter().map(|i| &i.id).collect();

    // None when the category declares no keypoints.
    let expected_keypoints: HashMap<CategoryId, Option<usize>> = dataset
        .categories
        .iter()
        .map(|c| (c.id, c.keypoint_count()))
        .collect();

    for ann in &dataset.annotations {
        let context = || IssueContext::Annotation {
            id: ann.id.to_string(),
        };

        if !image_ids.contains(&ann.image_id) {
            report.add(ValidationIssue::error(
                IssueCode::MissingImageRef,
                format!("references unknown image_id={}", ann.image_id),
                context(),
            ));
        }

        let Some(expected) = expected_keypoints.get(&ann.category_id) else {
            report.add(ValidationIssue::error(
                IssueCode::MissingCategoryRef,
                format!("references unknown category_id={}", ann.category_id),
                context(),
            ));
            continue;
        };
        let Some(k) = *expected else {
            continue;
        };

        let Some(keypoints) = &ann.keypoints else {
            report.add(ValidationIssue::error(
                IssueCode::MissingKeypoints,
                format!(
                    "(category_id={}) must include 'keypoints' ({} declared)",
                    ann.category_id, k
                ),
                context(),
            ));
            continue;
        };
        if keypoints.len() != 3 * k {
            report.add(ValidationIssue::error(
                IssueCode::KeypointCountMismatch,
                format!(
                    "keypoints length must be {} (got {})",
                    3 * k,
                    keypoints.len()
                ),
                context(),
            ));
            continue;
        }
        if let Some(declared) = ann.num_keypoints {
            let visible = visible_keypoints(keypoints);
            if declared != visible as i64 {
                report.add(ValidationIssue::error(
                    IssueCode::NumKeypointsMismatch,
                    format!(
                        "num_keypoints={} but computed visible={}",
                        declared, visible
                    ),
                    context(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coco::model::{Annotation, Category, Extra, Image, License, Segmentation};

    fn category(id: i64, name: &str) -> Category {
        Category {
            id: CategoryId(id),
            name: name.into(),
            supercategory: "thing".into(),
            keypoints: None,
            skeleton: None,
            extra: Extra::new(),
        }
    }

    fn image(id: i64, file_name: &str) -> Image {
        Image {
            id: RecordId::Int(id),
            file_name: file_name.into(),
            height: None,
            width: None,
            license: None,
            date_captured: None,
            coco_url: None,
            flickr_url: None,
            extra: Extra::new(),
        }
    }

    fn annotation(id: i64, image_id: i64, category_id: i64) -> Annotation {
        Annotation {
            id: RecordId::Int(id),
            image_id: RecordId::Int(image_id),
            category_id: CategoryId(category_id),
            bbox: vec![],
            segmentation: Segmentation::default(),
            iscrowd: None,
            area: None,
            keypoints: None,
            num_keypoints: None,
            extra: Extra::new(),
        }
    }

    fn valid_dataset() -> CocoDataset {
        CocoDataset {
            info: None,
            licenses: vec![License {
                id: LicenseId(1),
                name: Some("MIT".into()),
                url: None,
                extra: Extra::new(),
            }],
            images: vec![image(1, "a.jpg")],
            annotations: vec![annotation(1, 1, 1)],
            categories: vec![category(1, "cat")],
            extra: Extra::new(),
        }
    }

    #[test]
    fn test_valid_dataset() {
        let report = check_integrity(&valid_dataset());
        assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn test_every_duplicate_is_reported() {
        let mut dataset = valid_dataset();
        dataset.images.push(image(1, "b.jpg"));
        dataset.images.push(image(2, "c.jpg"));
        dataset.images.push(image(2, "d.jpg"));

        let report = check_integrity(&dataset);
        let ids: Vec<&IssueContext> = report
            .with_code(IssueCode::DuplicateImageId)
            .map(|i| &i.context)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&&IssueContext::Image { id: "1".into() }));
        assert!(ids.contains(&&IssueContext::Image { id: "2".into() }));
    }

    #[test]
    fn test_every_duplicate_annotation_id_is_reported() {
        let mut dataset = valid_dataset();
        dataset.annotations.push(annotation(1, 1, 1));
        let mut float_id = annotation(2, 1, 1);
        float_id.id = RecordId::Float(2.0);
        dataset.annotations.push(float_id);
        dataset.annotations.push(annotation(2, 1, 1));

        let report = check_integrity(&dataset);
        let ids: Vec<&IssueContext> = report
            .with_code(IssueCode::DuplicateAnnotationId)
            .map(|i| &i.context)
            .collect();
        assert_eq!(
            ids,
            vec![
                &IssueContext::Annotation { id: "1".into() },
                &IssueContext::Annotation { id: "2".into() },
            ]
        );
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_integral_float_image_id_collides_with_int() {
        let mut dataset = valid_dataset();
        let mut dup = image(9, "b.jpg");
        dup.id = RecordId::Float(1.0);
        dataset.images.push(dup);
        let report = check_integrity(&dataset);
        assert!(report.has_code(IssueCode::DuplicateImageId));
    }

    #[test]
    fn test_category_ids_must_be_contiguous() {
        let mut dataset = valid_dataset();
        dataset.categories.push(category(3, "dog"));

        let report = check_integrity(&dataset);
        let issue = report
            .with_code(IssueCode::NonContiguousCategoryIds)
            .next()
            .expect("contiguity issue");
        assert!(issue.message.contains("expected [1, 2], got [1, 3]"));
    }

    #[test]
    fn test_duplicate_category_id_breaks_contiguity_too() {
        let mut dataset = valid_dataset();
        dataset.categories.push(category(1, "dog"));
        let report = check_integrity(&dataset);
        assert!(report.has_code(IssueCode::DuplicateCategoryId));
        assert!(report.has_code(IssueCode::NonContiguousCategoryIds));
    }

    #[test]
    fn test_duplicate_category_name() {
        let mut dataset = valid_dataset();
        dataset.categories.push(category(2, "cat"));
        let report = check_integrity(&dataset);
        assert_eq!(report.error_count(), 1);
        assert!(report.has_code(IssueCode::DuplicateCategoryName));
    }

    #[test]
    fn test_duplicate_file_name() {
        let mut dataset = valid_dataset();
        dataset.images.push(image(2, "a.jpg"));
        let report = check_integrity(&dataset);
        assert!(report.issues[0].message.contains("Duplicate image file_name"));
    }

    #[test]
    fn test_unknown_license() {
        let mut dataset = valid_dataset();
        dataset.images[0].license = Some(LicenseId(999));
        let report = check_integrity(&dataset);
        assert_eq!(report.error_count(), 1);
        assert!(report.issues[0]
            .to_string()
            .contains("image id=1: references unknown license id=999"));
    }

    #[test]
    fn test_unknown_image_and_category_are_both_reported() {
        let mut dataset = valid_dataset();
        dataset.annotations.push(annotation(2, 42, 1));
        dataset.annotations.push(annotation(3, 1, 9));
        let report = check_integrity(&dataset);
        assert!(report.has_code(IssueCode::MissingImageRef));
        assert!(report.has_code(IssueCode::MissingCategoryRef));
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_keypoint_contract() {
        let mut dataset = valid_dataset();
        dataset.categories[0].keypoints = Some(vec!["a".into(), "b".into()]);

        let report = check_integrity(&dataset);
        assert!(report.has_code(IssueCode::MissingKeypoints));

        dataset.annotations[0].keypoints = Some(vec![1.0, 1.0, 2.0]);
        let report = check_integrity(&dataset);
        assert!(report.issues[0]
            .message
            .contains("keypoints length must be 6 (got 3)"));

        dataset.annotations[0].keypoints = Some(vec![1.0, 1.0, 2.0, 0.0, 0.0, 0.0]);
        dataset.annotations[0].num_keypoints = Some(2);
        let report = check_integrity(&dataset);
        assert!(report.issues[0]
            .message
            .contains("num_keypoints=2 but computed visible=1"));

        dataset.annotations[0].num_keypoints = Some(1);
        assert!(check_integrity(&dataset).is_clean());
    }
}
