#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use serde_json::{json, Value};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Generates a COCO annotation document that satisfies every validation
/// rule. With `max_keypoints > 0`, some documents declare keypoints on all
/// categories and carry matching keypoint triplets.
pub fn arb_valid_coco(
    max_images: usize,
    max_cats: usize,
    max_anns: usize,
    max_keypoints: usize,
) -> BoxedStrategy<Value> {
    assert!(max_images > 0, "max_images must be > 0");
    assert!(max_cats > 0, "max_cats must be > 0");

    (
        1usize..=max_images,
        1usize..=max_cats,
        0usize..=max_anns,
        0usize..=max_keypoints,
    )
        .prop_flat_map(|(image_count, category_count, ann_count, keypoint_count)| {
            (
                proptest::collection::hash_map(
                    image_file_name_strategy(),
                    (2u32..=4096, 2u32..=4096),
                    image_count..=image_count,
                ),
                proptest::collection::hash_set(
                    category_name_strategy(),
                    category_count..=category_count,
                ),
                proptest::collection::vec(
                    ann_seed_strategy(keypoint_count),
                    ann_count..=ann_count,
                ),
                any::<bool>(),
                Just(keypoint_count),
            )
                .prop_map(
                    |(images, categories, ann_seeds, string_ids, keypoint_count)| {
                        build_document(images, categories, ann_seeds, string_ids, keypoint_count)
                    },
                )
        })
        .boxed()
}

/// Like [`arb_valid_coco`], but with at least one image, annotation and
/// keypoint.
pub fn arb_valid_keypoint_coco(max_anns: usize, max_keypoints: usize) -> BoxedStrategy<Value> {
    assert!(max_anns > 0 && max_keypoints > 0);
    (1usize..=max_anns, 1usize..=max_keypoints)
        .prop_flat_map(|(ann_count, keypoint_count)| {
            (
                proptest::collection::hash_map(
                    image_file_name_strategy(),
                    (2u32..=4096, 2u32..=4096),
                    1..=3,
                ),
                proptest::collection::hash_set(category_name_strategy(), 1..=3),
                proptest::collection::vec(
                    ann_seed_strategy(keypoint_count),
                    ann_count..=ann_count,
                ),
                Just(keypoint_count),
            )
                .prop_map(|(images, categories, ann_seeds, keypoint_count)| {
                    build_document(images, categories, ann_seeds, false, keypoint_count)
                })
        })
        .boxed()
}

/// (image seed, category seed, bbox seeds, keypoint seeds)
type AnnSeed = (u16, u16, [u32; 4], Vec<(u8, u32, u32)>);

fn ann_seed_strategy(keypoint_count: usize) -> impl Strategy<Value = AnnSeed> {
    (
        any::<u16>(),
        any::<u16>(),
        any::<[u32; 4]>(),
        proptest::collection::vec(
            (0u8..=2, any::<u32>(), any::<u32>()),
            keypoint_count..=keypoint_count,
        ),
    )
}

fn image_file_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z0-9_]{1,12}\\.jpg")
        .expect("valid filename regex")
        .boxed()
}

fn category_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z]{1,20}")
        .expect("valid category name regex")
        .boxed()
}

fn build_document(
    image_data: HashMap<String, (u32, u32)>,
    category_names: HashSet<String>,
    ann_seeds: Vec<AnnSeed>,
    string_ids: bool,
    keypoint_count: usize,
) -> Value {
    let mut image_rows: Vec<(String, (u32, u32))> = image_data.into_iter().collect();
    image_rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut category_rows: Vec<String> = category_names.into_iter().collect();
    category_rows.sort();

    let image_id = |idx: usize| -> Value {
        if string_ids {
            json!(format!("img-{}", idx + 1))
        } else {
            json!(idx + 1)
        }
    };

    let images: Vec<Value> = image_rows
        .iter()
        .enumerate()
        .map(|(idx, (file_name, (width, height)))| {
            json!({
                "id": image_id(idx),
                "file_name": file_name,
                "width": width,
                "height": height,
                "license": 1
            })
        })
        .collect();

    let keypoint_labels: Vec<String> = (0..keypoint_count).map(|i| format!("kp{}", i)).collect();
    let categories: Vec<Value> = category_rows
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut category = json!({
                "id": idx + 1,
                "name": name,
                "supercategory": "thing"
            });
            if keypoint_count > 0 {
                category["keypoints"] = json!(keypoint_labels);
                if keypoint_count > 1 {
                    category["skeleton"] = json!([[1, keypoint_count]]);
                }
            }
            category
        })
        .collect();

    let annotations: Vec<Value> = ann_seeds
        .into_iter()
        .enumerate()
        .map(|(idx, (image_seed, category_seed, [sx, sy, sw, sh], kp_seeds))| {
            let image_idx = image_seed as usize % image_rows.len();
            let (_, (width, height)) = image_rows[image_idx];
            let category_idx = category_seed as usize % category_rows.len();

            let x = sx % width;
            let y = sy % height;
            let w = 1 + sw % (width - x).max(1);
            let h = 1 + sh % (height - y).max(1);

            let mut ann = json!({
                "id": idx + 1,
                "image_id": image_id(image_idx),
                "category_id": category_idx + 1,
                "bbox": [x, y, w, h],
                "area": (w * h) as f64,
                "iscrowd": 0
            });
            if keypoint_count > 0 {
                let mut flat = Vec::with_capacity(keypoint_count * 3);
                let mut visible = 0;
                for (v, kx, ky) in kp_seeds {
                    if v == 0 {
                        flat.extend([0, 0, 0]);
                    } else {
                        flat.extend([kx % width, ky % height, v as u32]);
                        visible += 1;
                    }
                }
                ann["keypoints"] = json!(flat);
                ann["num_keypoints"] = json!(visible);
            }
            ann
        })
        .collect();

    json!({
        "info": {"year": 2025, "version": "1.0"},
        "licenses": [{"id": 1, "name": "MIT"}],
        "images": images,
        "categories": categories,
        "annotations": annotations
    })
}
