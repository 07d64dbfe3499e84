use annoguard::coco::{from_coco_str, to_coco_string, validate_coco};
use annoguard::validation::IssueCode;
use proptest::prelude::*;
use serde_json::{json, Value};

mod proptest_helpers;

fn rejection_codes(document: &Value) -> Result<Vec<IssueCode>, String> {
    match validate_coco(document) {
        Ok(_) => Err("perturbed document was accepted".to_string()),
        Err(report) => Ok(report.issues.iter().map(|issue| issue.code).collect()),
    }
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn generated_datasets_validate(document in proptest_helpers::arb_valid_coco(5, 5, 20, 4)) {
        let outcome = validate_coco(&document);
        prop_assert!(outcome.is_ok(), "{}", outcome.as_ref().err().map(|r| r.to_string()).unwrap_or_default());
        let validated = outcome.unwrap();
        prop_assert!(validated.warnings.is_clean());
    }

    #[test]
    fn validated_ids_are_contiguous(document in proptest_helpers::arb_valid_coco(3, 6, 5, 0)) {
        let dataset = from_coco_str(&document.to_string()).expect("valid dataset");
        let mut ids: Vec<i64> = dataset.categories.iter().map(|c| c.id.as_i64()).collect();
        ids.sort_unstable();
        let expected: Vec<i64> = (1..=dataset.categories.len() as i64).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn revalidation_is_idempotent(document in proptest_helpers::arb_valid_coco(5, 5, 20, 4)) {
        let first = from_coco_str(&document.to_string()).expect("first pass");
        let second = from_coco_str(&to_coco_string(&first).expect("serialize first pass"))
            .expect("second pass");
        prop_assert_eq!(&first, &second);

        let third = from_coco_str(&to_coco_string(&second).expect("serialize second pass"))
            .expect("third pass");
        prop_assert_eq!(second, third);
    }

    #[test]
    fn duplicated_image_id_is_rejected(document in proptest_helpers::arb_valid_coco(5, 3, 10, 0)) {
        let mut document = document;
        let images = document["images"].as_array_mut().unwrap();
        let mut copy = images[0].clone();
        copy["file_name"] = json!("zz_duplicate_copy.png");
        images.push(copy);

        let codes = rejection_codes(&document).map_err(TestCaseError::fail)?;
        prop_assert!(codes.contains(&IssueCode::DuplicateImageId), "{:?}", codes);
    }

    #[test]
    fn shifted_category_ids_are_rejected(document in proptest_helpers::arb_valid_coco(3, 5, 10, 0)) {
        let mut document = document;
        for category in document["categories"].as_array_mut().unwrap() {
            let id = category["id"].as_i64().unwrap();
            category["id"] = json!(id + 1);
        }

        let codes = rejection_codes(&document).map_err(TestCaseError::fail)?;
        prop_assert!(codes.contains(&IssueCode::NonContiguousCategoryIds), "{:?}", codes);
    }

    #[test]
    fn dangling_image_reference_is_rejected(document in proptest_helpers::arb_valid_keypoint_coco(10, 3)) {
        let mut document = document;
        document["annotations"][0]["image_id"] = json!("no-such-image");

        let codes = rejection_codes(&document).map_err(TestCaseError::fail)?;
        prop_assert_eq!(codes, vec![IssueCode::MissingImageRef]);
    }

    #[test]
    fn truncated_keypoints_are_rejected(document in proptest_helpers::arb_valid_keypoint_coco(10, 4)) {
        let mut document = document;
        let keypoints = document["annotations"][0]["keypoints"].as_array_mut().unwrap();
        keypoints.truncate(keypoints.len() - 3);
        document["annotations"][0]["num_keypoints"] = Value::Null;

        let codes = rejection_codes(&document).map_err(TestCaseError::fail)?;
        prop_assert!(codes.contains(&IssueCode::KeypointCountMismatch), "{:?}", codes);
    }

    #[test]
    fn wrong_num_keypoints_is_rejected(document in proptest_helpers::arb_valid_keypoint_coco(10, 4)) {
        let mut document = document;
        let declared = document["annotations"][0]["num_keypoints"].as_i64().unwrap();
        document["annotations"][0]["num_keypoints"] = json!(declared + 1);

        let codes = rejection_codes(&document).map_err(TestCaseError::fail)?;
        prop_assert_eq!(codes, vec![IssueCode::NumKeypointsMismatch]);
    }
}
