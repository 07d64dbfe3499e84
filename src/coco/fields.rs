//! Record construction: the field-level phase of annotation validation.
//!
//! Each `*_from_object` function builds one typed record from a JSON object
//! or returns every field error it found in that record.

use serde_json::Value;

use super::ids::{CategoryId, LicenseId, RecordId};
use super::model::{Annotation, Category, Image, Info, License, Rle, RleCounts, Segmentation};
use crate::validation::primitives::{
    as_integer, as_number, extra_fields, field, optional_i64, optional_number, optional_str,
    optional_text, optional_whole, required_i64, required_str, validate_bbox, validate_iscrowd,
    validate_keypoint_labels, validate_keypoints_triplets, validate_skeleton, FieldError, Fields,
    Object,
};
use crate::validation::IssueCode;

/// Renders the raw `id` of a record for error context, before it is known
/// to be valid.
pub(crate) fn id_label(obj: &Object, index: usize) -> String {
    match field(obj, "id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("<unknown #{}>", index),
    }
}

fn record_id(obj: &Object, key: &str) -> Result<RecordId, FieldError> {
    match field(obj, key) {
        None => Err(FieldError::new(
            IssueCode::MissingField,
            format!("{} is required", key),
        )),
        Some(value) => RecordId::from_value(value).ok_or_else(|| {
            FieldError::new(
                IssueCode::InvalidFieldType,
                format!("{} must be an integer, float or string", key),
            )
        }),
    }
}

pub(crate) fn info_from_object(obj: &Object) -> Result<Info, Vec<FieldError>> {
    let mut f = Fields::default();
    let year = match field(obj, "year") {
        None => None,
        Some(v) if v.is_string() || as_integer(v).is_some() => Some(v.clone()),
        Some(_) => {
            f.push(FieldError::new(
                IssueCode::InvalidFieldType,
                "year must be a string or an integer",
            ));
            None
        }
    };
    let version = f.take(optional_text(obj, "version"));
    let description = f.take(optional_text(obj, "description"));
    let contributor = f.take(optional_text(obj, "contributor"));
    let url = f.take(optional_text(obj, "url"));
    let date_created = f.take(optional_text(obj, "date_created"));

    let (Some(version), Some(description), Some(contributor), Some(url), Some(date_created)) =
        (version, description, contributor, url, date_created)
    else {
        return Err(f.finish());
    };
    let errors = f.finish();
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Info {
        year,
        version,
        description,
        contributor,
        url,
        date_created,
        extra: extra_fields(
            obj,
            &["year", "version", "description", "contributor", "url", "date_created"],
        ),
    })
}

pub(crate) fn license_from_object(obj: &Object) -> Result<License, Vec<FieldError>> {
    let mut f = Fields::default();
    let id = f.take(required_i64(obj, "id"));
    let name = f.take(optional_str(obj, "name"));
    let url = f.take(optional_text(obj, "url"));

    let (Some(id), Some(name), Some(url)) = (id, name, url) else {
        return Err(f.finish());
    };
    Ok(License {
        id: LicenseId::new(id),
        name,
        url,
        extra: extra_fields(obj, &["id", "name", "url"]),
    })
}

pub(crate) fn category_from_object(obj: &Object) -> Result<Category, Vec<FieldError>> {
    let mut f = Fields::default();
    let id = f.take(required_i64(obj, "id"));
    let name = f.take(required_str(obj, "name"));
    let supercategory = f.take(required_str(obj, "supercategory"));
    let keypoints = f.take(validate_keypoint_labels(field(obj, "keypoints")));

    // Range-check the skeleton only against a keypoint list that parsed.
    let keypoint_count = keypoints
        .as_ref()
        .and_then(|k| k.as_ref())
        .map(Vec::len)
        .filter(|&k| k > 0);
    let skeleton = f.take(validate_skeleton(field(obj, "skeleton"), keypoint_count));

    let (Some(id), Some(name), Some(supercategory), Some(keypoints), Some(skeleton)) =
        (id, name, supercategory, keypoints, skeleton)
    else {
        return Err(f.finish());
    };
    Ok(Category {
        id: CategoryId::new(id),
        name,
        supercategory,
        keypoints,
        skeleton,
        extra: extra_fields(
            obj,
            &["id", "name", "supercategory", "keypoints", "skeleton"],
        ),
    })
}

pub(crate) fn image_from_object(obj: &Object) -> Result<Image, Vec<FieldError>> {
    let mut f = Fields::default();
    let id = f.take(record_id(obj, "id"));
    let file_name = f.take(required_str(obj, "file_name"));
    if let Some(name) = &file_name {
        if name.trim().is_empty() {
            f.push(FieldError::new(
                IssueCode::EmptyFileName,
                "image must have a non-empty 'file_name' string.",
            ));
        }
    }
    let height = f.take(optional_whole(obj, "height"));
    let width = f.take(optional_whole(obj, "width"));
    let license = f.take(optional_i64(obj, "license"));
    let date_captured = f.take(optional_str(obj, "date_captured"));
    let coco_url = f.take(optional_str(obj, "coco_url"));
    let flickr_url = f.take(optional_str(obj, "flickr_url"));

    let (
        Some(id),
        Some(file_name),
        Some(height),
        Some(width),
        Some(license),
        Some(date_captured),
        Some(coco_url),
        Some(flickr_url),
    ) = (
        id,
        file_name,
        height,
        width,
        license,
        date_captured,
        coco_url,
        flickr_url,
    )
    else {
        return Err(f.finish());
    };
    let errors = f.finish();
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Image {
        id,
        file_name,
        height,
        width,
        license: license.map(LicenseId::new),
        date_captured,
        coco_url,
        flickr_url,
        extra: extra_fields(
            obj,
            &[
                "id",
                "file_name",
                "height",
                "width",
                "license",
                "date_captured",
                "coco_url",
                "flickr_url",
            ],
        ),
    })
}

pub(crate) fn annotation_from_object(obj: &Object) -> Result<Annotation, Vec<FieldError>> {
    let mut f = Fields::default();
    let id = f.take(record_id(obj, "id"));
    let image_id = f.take(record_id(obj, "image_id"));
    let category_id = f.take(required_i64(obj, "category_id"));
    let bbox = f.take(validate_bbox(field(obj, "bbox")));
    let segmentation = f.take(segmentation(field(obj, "segmentation")));
    let iscrowd = f.take(validate_iscrowd(field(obj, "iscrowd")));
    let area = f.take(optional_number(obj, "area"));
    let keypoints = f.take(validate_keypoints_triplets(field(obj, "keypoints")));
    let num_keypoints = f.take(optional_whole(obj, "num_keypoints"));

    let (
        Some(id),
        Some(image_id),
        Some(category_id),
        Some(bbox),
        Some(segmentation),
        Some(iscrowd),
        Some(area),
        Some(keypoints),
        Some(num_keypoints),
    ) = (
        id,
        image_id,
        category_id,
        bbox,
        segmentation,
        iscrowd,
        area,
        keypoints,
        num_keypoints,
    )
    else {
        return Err(f.finish());
    };
    Ok(Annotation {
        id,
        image_id,
        category_id: CategoryId::new(category_id),
        bbox,
        segmentation,
        iscrowd,
        area,
        keypoints,
        num_keypoints,
        extra: extra_fields(
            obj,
            &[
                "id",
                "image_id",
                "category_id",
                "bbox",
                "segmentation",
                "iscrowd",
                "area",
                "keypoints",
                "num_keypoints",
            ],
        ),
    })
}

/// Reads a segmentation: a list of numeric polygons, or an RLE object.
/// Absent segmentation becomes a single empty polygon.
fn segmentation(value: Option<&Value>) -> Result<Segmentation, FieldError> {
    let invalid = || {
        FieldError::new(
            IssueCode::InvalidSegmentation,
            "segmentation must be a list of numeric polygons or an RLE object {counts, size}.",
        )
    };
    match value {
        None => Ok(Segmentation::default()),
        Some(Value::Array(polygons)) => polygons
            .iter()
            .map(|polygon| {
                polygon
                    .as_array()
                    .and_then(|points| points.iter().map(as_number).collect::<Option<Vec<f64>>>())
            })
            .collect::<Option<Vec<Vec<f64>>>>()
            .map(Segmentation::Polygons)
            .ok_or_else(invalid),
        Some(Value::Object(rle)) => {
            let counts = match rle.get("counts") {
                Some(Value::String(s)) => RleCounts::Compressed(s.clone()),
                Some(Value::Array(runs)) => RleCounts::Uncompressed(
                    runs.iter()
                        .map(Value::as_u64)
                        .collect::<Option<Vec<u64>>>()
                        .ok_or_else(invalid)?,
                ),
                _ => return Err(invalid()),
            };
            let size = match rle.get("size").and_then(Value::as_array) {
                Some(dims) if dims.len() == 2 => match (dims[0].as_u64(), dims[1].as_u64()) {
                    (Some(h), Some(w)) => [h, w],
                    _ => return Err(invalid()),
                },
                _ => return Err(invalid()),
            };
            Ok(Segmentation::Rle(Rle { counts, size }))
        }
        Some(_) => Err(invalid()),
    }
}
