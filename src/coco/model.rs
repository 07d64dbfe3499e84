//! Validated COCO dataset model.
//!
//! Values of these types are only produced by the annotation validator, so
//! every invariant documented on [`CocoDataset`] holds for them. They
//! serialize back to COCO JSON, extra keys included.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::ids::{CategoryId, LicenseId, RecordId};

/// Keys a record carried that the model does not know about.
pub type Extra = BTreeMap<String, Value>;

/// A validated COCO annotation file.
///
/// Invariants:
/// - ids are unique within each collection;
/// - category names are unique and category ids are exactly `1..=N`;
/// - image file names are non-empty and unique;
/// - every license, image and category reference resolves;
/// - annotations of keypoint categories carry exactly `3K` keypoint values
///   and a consistent `num_keypoints`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CocoDataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,

    pub images: Vec<Image>,

    pub annotations: Vec<Annotation>,

    pub categories: Vec<Category>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl CocoDataset {
    /// Looks up a category by id.
    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Category names ordered by category id.
    pub fn category_names(&self) -> Vec<&str> {
        let mut categories: Vec<&Category> = self.categories.iter().collect();
        categories.sort_by_key(|c| c.id);
        categories.iter().map(|c| c.name.as_str()).collect()
    }
}

/// COCO dataset info block. Free-form; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Info {
    /// A string or an integer, as producers disagree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// COCO license entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct License {
    pub id: LicenseId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// COCO category, optionally with a keypoint schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub supercategory: String,

    /// Ordered keypoint labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<String>>,

    /// 1-based `[from, to]` keypoint connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Vec<[i64; 2]>>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Category {
    /// Number of declared keypoints, or `None` when the category declares
    /// none (an empty list counts as none).
    pub fn keypoint_count(&self) -> Option<usize> {
        self.keypoints
            .as_ref()
            .map(Vec::len)
            .filter(|&k| k > 0)
    }
}

/// COCO image entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Image {
    pub id: RecordId,
    pub file_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_captured: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coco_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flickr_url: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// COCO annotation for an object instance, optionally with keypoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Annotation {
    pub id: RecordId,
    pub image_id: RecordId,
    pub category_id: CategoryId,

    /// `[x, y, width, height]`, or empty when the annotation has no box.
    pub bbox: Vec<f64>,

    pub segmentation: Segmentation,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iscrowd: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,

    /// Flat `[x0, y0, v0, x1, y1, v1, ...]` list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_keypoints: Option<i64>,

    #[serde(flatten)]
    pub extra: Extra,
}

impl Annotation {
    /// True when the annotation carries a bounding box.
    pub fn has_bbox(&self) -> bool {
        !self.bbox.is_empty()
    }
}

/// Segmentation as polygons or as a run-length encoded mask.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// One or more flat `[x0, y0, x1, y1, ...]` polygons.
    Polygons(Vec<Vec<f64>>),
    /// Crowd-style RLE mask.
    Rle(Rle),
}

impl Default for Segmentation {
    /// A single empty polygon, the value used when the key is absent.
    fn default() -> Self {
        Segmentation::Polygons(vec![Vec::new()])
    }
}

/// Run-length encoded mask.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rle {
    pub counts: RleCounts,
    /// `[height, width]`.
    pub size: [u64; 2],
}

/// Uncompressed (list) or compressed (string) RLE counts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RleCounts {
    Uncompressed(Vec<u64>),
    Compressed(String),
}
