//! Record construction for manifest entries: task templates, splits and the
//! feature tree.

use serde_json::Value;

use super::model::{
    BBoxFeature, ClassLabel, Feature, Features, ImageFeature, SequenceFeature, SplitInfo,
    TaskKind, TaskTemplate, TextFeature,
};
use crate::validation::primitives::{
    extra_fields, field, json_type, optional_whole, required_str, string_list, FieldError, Fields,
    Object,
};
use crate::validation::IssueCode;

const FEATURE_TYPES: &str = "Image, Text, BBoxFeature, ClassLabel, Sequence";

pub(crate) fn task_template_from_object(obj: &Object) -> Result<TaskTemplate, Vec<FieldError>> {
    let mut f = Fields::default();
    let task = f
        .take(required_str(obj, "task"))
        .and_then(|name| match TaskKind::parse(&name) {
            Some(task) => Some(task),
            None => {
                f.push(FieldError::new(
                    IssueCode::InvalidTask,
                    format!(
                        "task must be one of 'classification', 'detection', 'keypoints'; got '{}'",
                        name
                    ),
                ));
                None
            }
        });
    let labels = match field(obj, "labels") {
        None => {
            f.push(FieldError::new(IssueCode::MissingField, "labels is required"));
            None
        }
        Some(value) => f.take(string_list("labels", value)),
    };
    let num_keypoints = f.take(optional_whole(obj, "num_keypoints"));
    let annotations = match field(obj, "annotations") {
        None => Some(None),
        Some(value) => f.take(string_list("annotations", value)).map(Some),
    };

    let (Some(task), Some(labels), Some(num_keypoints), Some(annotations)) =
        (task, labels, num_keypoints, annotations)
    else {
        return Err(f.finish());
    };
    Ok(TaskTemplate {
        task,
        labels,
        num_keypoints,
        annotations,
        extra: extra_fields(obj, &["task", "labels", "num_keypoints", "annotations"]),
    })
}

pub(crate) fn split_from_object(obj: &Object) -> Result<SplitInfo, Vec<FieldError>> {
    let mut f = Fields::default();
    let name = f.take(required_str(obj, "name"));
    let dataset_name = f.take(required_str(obj, "dataset_name"));
    let num_examples = f.take(optional_whole(obj, "num_examples"));
    let num_bytes = f.take(optional_whole(obj, "num_bytes"));

    let (Some(name), Some(dataset_name), Some(num_examples), Some(num_bytes)) =
        (name, dataset_name, num_examples, num_bytes)
    else {
        return Err(f.finish());
    };
    Ok(SplitInfo {
        name,
        dataset_name,
        num_examples,
        num_bytes,
        extra: extra_fields(obj, &["name", "dataset_name", "num_examples", "num_bytes"]),
    })
}

/// Field errors inside the feature tree, each with the key path it was
/// found at (e.g. `labels.objects_label`).
pub(crate) type FeatureErrors = Vec<(String, FieldError)>;

/// Builds the top-level feature declaration. Keys other than `image` and
/// `labels` are kept verbatim.
pub(crate) fn features_from_object(obj: &Object) -> Result<Features, FeatureErrors> {
    let mut errors = FeatureErrors::new();
    let image = typed_slot(obj, "", "image", "Image", &mut errors, |feature| match feature {
        Feature::Image(image) => Ok(image),
        other => Err(other),
    });
    let labels = typed_slot(obj, "", "labels", "Sequence", &mut errors, |feature| match feature {
        Feature::Sequence(seq) => Ok(seq),
        other => Err(other),
    });

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Features {
        image,
        labels,
        extra: extra_fields(obj, &["image", "labels"]),
    })
}

/// Parses one `_type`-tagged feature declaration.
fn feature_from_value(path: &str, value: &Value, errors: &mut FeatureErrors) -> Option<Feature> {
    let Some(obj) = value.as_object() else {
        errors.push((
            path.to_string(),
            FieldError::new(
                IssueCode::InvalidFeature,
                format!("feature must be an object; got {}", json_type(value)),
            ),
        ));
        return None;
    };
    let type_name = match required_str(obj, "_type") {
        Ok(name) => name,
        Err(err) => {
            errors.push((path.to_string(), err));
            return None;
        }
    };
    let id = field(obj, "id").cloned();

    match type_name.as_str() {
        "Image" => Some(Feature::Image(ImageFeature { id })),
        "Text" => Some(Feature::Text(TextFeature { id })),
        "BBoxFeature" => Some(Feature::BBox(BBoxFeature { id })),
        "ClassLabel" => class_label(path, obj, id, errors).map(Feature::ClassLabel),
        "Sequence" => sequence(path, obj, id, errors).map(Feature::Sequence),
        other => {
            errors.push((
                path.to_string(),
                FieldError::new(
                    IssueCode::InvalidFeature,
                    format!(
                        "unknown feature type '{}'; expected one of {}",
                        other, FEATURE_TYPES
                    ),
                ),
            ));
            None
        }
    }
}

fn class_label(
    path: &str,
    obj: &Object,
    id: Option<Value>,
    errors: &mut FeatureErrors,
) -> Option<ClassLabel> {
    let num_classes = optional_whole(obj, "num_classes");
    let names = match field(obj, "names") {
        None => Ok(None),
        Some(value) => string_list("names", value).map(Some),
    };
    match (num_classes, names) {
        (Ok(num_classes), Ok(names)) => Some(ClassLabel {
            id,
            num_classes,
            names,
        }),
        (num_classes, names) => {
            for err in [num_classes.err(), names.err()].into_iter().flatten() {
                errors.push((path.to_string(), err));
            }
            None
        }
    }
}

fn sequence(
    path: &str,
    obj: &Object,
    id: Option<Value>,
    errors: &mut FeatureErrors,
) -> Option<SequenceFeature> {
    let before = errors.len();
    let objects_bbox = typed_slot(obj, path, "objects_bbox", "BBoxFeature", errors, |f| match f {
        Feature::BBox(bbox) => Ok(bbox),
        other => Err(other),
    });
    let objects_label = typed_slot(obj, path, "objects_label", "ClassLabel", errors, |f| match f {
        Feature::ClassLabel(label) => Ok(label),
        other => Err(other),
    });
    let objects_keypoint = typed_slot(obj, path, "objects_keypoint", "Sequence", errors, |f| {
        match f {
            Feature::Sequence(seq) => Ok(Box::new(seq)),
            other => Err(other),
        }
    });

    if errors.len() > before {
        return None;
    }
    Some(SequenceFeature {
        id,
        objects_bbox,
        objects_label,
        objects_keypoint,
    })
}

/// Parses the feature under `key` and checks it has the expected variant.
///
/// Returns `None` when the key is absent or on error; errors are pushed.
fn typed_slot<T>(
    obj: &Object,
    parent: &str,
    key: &str,
    expected: &str,
    errors: &mut FeatureErrors,
    pick: impl FnOnce(Feature) -> Result<T, Feature>,
) -> Option<T> {
    let value = field(obj, key)?;
    let path = if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    };
    let feature = feature_from_value(&path, value, errors)?;
    match pick(feature) {
        Ok(typed) => Some(typed),
        Err(other) => {
            errors.push((
                path,
                FieldError::new(
                    IssueCode::FeatureTypeMismatch,
                    format!(
                        "must be a {} feature; got _type '{}'",
                        expected,
                        other.type_name()
                    ),
                ),
            ));
            None
        }
    }
}
