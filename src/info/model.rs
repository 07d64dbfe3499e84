//! Validated dataset-info manifest model.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::coco::Extra;

/// The splits every manifest entry must declare.
pub const REQUIRED_SPLITS: [&str; 3] = ["train", "validation", "test"];

/// The supervised task a dataset is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Classification,
    Detection,
    Keypoints,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::Classification,
        TaskKind::Detection,
        TaskKind::Keypoints,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|task| task.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Detection => "detection",
            TaskKind::Keypoints => "keypoints",
        }
    }

    /// Annotation fields a task template must list when it lists any.
    pub fn required_annotations(self) -> &'static [&'static str] {
        match self {
            TaskKind::Classification => &["category_id"],
            TaskKind::Detection => &["bbox", "category_id"],
            TaskKind::Keypoints => &["bbox", "category_id", "keypoints"],
        }
    }

    /// True when annotations of this task are expected to carry a box.
    pub fn expects_bbox(self) -> bool {
        self != TaskKind::Classification
    }
}

/// The single task a dataset declares.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskTemplate {
    pub task: TaskKind,

    /// Class names; position usually maps to category id - 1.
    pub labels: Vec<String>,

    /// Keypoints per instance. Always positive for keypoints tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_keypoints: Option<i64>,

    /// Field names an annotation record carries for this task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Summary of one split.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SplitInfo {
    pub name: String,

    /// The annotation file of the split, relative to `annotations/`.
    pub dataset_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_examples: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_bytes: Option<i64>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// One manifest entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Serialized as the one-element `task_templates` list.
    #[serde(rename = "task_templates", serialize_with = "as_single_list")]
    pub task_template: TaskTemplate,

    /// Always holds `train`, `validation` and `test`.
    pub splits: BTreeMap<String, SplitInfo>,

    pub description: String,
    pub citation: String,
    pub homepage: String,
    pub license: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_processed: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervised_keys: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_processing_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_size: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<i64>,

    #[serde(flatten)]
    pub extra: Extra,
}

fn as_single_list<S: Serializer>(template: &TaskTemplate, s: S) -> Result<S::Ok, S::Error> {
    [template].serialize(s)
}

/// A whole `dataset_infos.json`: dataset name to entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DatasetInfos(pub BTreeMap<String, DatasetInfo>);

impl DatasetInfos {
    pub fn get(&self, name: &str) -> Option<&DatasetInfo> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DatasetInfo)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Feature declarations
// ============================================================================

/// Declared features of a dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Features {
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "tagged::image"
    )]
    pub image: Option<ImageFeature>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "tagged::sequence"
    )]
    pub labels: Option<SequenceFeature>,

    /// Other feature keys (e.g. `image/filename`), kept verbatim.
    #[serde(flatten)]
    pub extra: Extra,
}

/// A feature declaration, discriminated by its `_type` tag.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "_type")]
pub enum Feature {
    Image(ImageFeature),
    Text(TextFeature),
    #[serde(rename = "BBoxFeature")]
    BBox(BBoxFeature),
    ClassLabel(ClassLabel),
    Sequence(SequenceFeature),
}

impl Feature {
    /// The `_type` tag of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Feature::Image(_) => "Image",
            Feature::Text(_) => "Text",
            Feature::BBox(_) => "BBoxFeature",
            Feature::ClassLabel(_) => "ClassLabel",
            Feature::Sequence(_) => "Sequence",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImageFeature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextFeature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// Declares that a sequence item carries a box. The box values themselves
/// live in the annotations.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BBoxFeature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

/// A categorical label space.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClassLabel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
}

/// A list of per-object features, nestable for per-object keypoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SequenceFeature {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "tagged::bbox"
    )]
    pub objects_bbox: Option<BBoxFeature>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "tagged::class_label"
    )]
    pub objects_label: Option<ClassLabel>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "tagged::boxed_sequence"
    )]
    pub objects_keypoint: Option<Box<SequenceFeature>>,
}

/// Serializers that write a typed feature slot with its `_type` tag.
mod tagged {
    use serde::{Serialize, Serializer};

    use super::{BBoxFeature, ClassLabel, ImageFeature, SequenceFeature};

    #[derive(Serialize)]
    #[serde(tag = "_type")]
    enum FeatureRef<'a> {
        Image(&'a ImageFeature),
        #[serde(rename = "BBoxFeature")]
        BBox(&'a BBoxFeature),
        ClassLabel(&'a ClassLabel),
        Sequence(&'a SequenceFeature),
    }

    pub fn image<S: Serializer>(f: &Option<ImageFeature>, s: S) -> Result<S::Ok, S::Error> {
        f.as_ref().map(FeatureRef::Image).serialize(s)
    }

    pub fn bbox<S: Serializer>(f: &Option<BBoxFeature>, s: S) -> Result<S::Ok, S::Error> {
        f.as_ref().map(FeatureRef::BBox).serialize(s)
    }

    pub fn class_label<S: Serializer>(f: &Option<ClassLabel>, s: S) -> Result<S::Ok, S::Error> {
        f.as_ref().map(FeatureRef::ClassLabel).serialize(s)
    }

    pub fn sequence<S: Serializer>(f: &Option<SequenceFeature>, s: S) -> Result<S::Ok, S::Error> {
        f.as_ref().map(FeatureRef::Sequence).serialize(s)
    }

    pub fn boxed_sequence<S: Serializer>(
        f: &Option<Box<SequenceFeature>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        f.as_deref().map(FeatureRef::Sequence).serialize(s)
    }
}
