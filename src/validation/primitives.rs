//! Field-level constructors shared by the annotation and manifest validators.
//!
//! Every function here looks at one field of one record (plus, at most, a
//! sibling value of the same record) and either returns the typed value or a
//! [`FieldError`]. The caller attaches the record context.

use std::collections::HashMap;
use std::hash::Hash;

use serde_json::{Map, Value};

use super::IssueCode;

/// A JSON object, as decoded by `serde_json`.
pub type Object = Map<String, Value>;

/// A single field that failed its atomic constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    /// The stable issue code to report.
    pub code: IssueCode,
    /// Human-readable description.
    pub message: String,
}

impl FieldError {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn missing(key: &str) -> Self {
        Self::new(IssueCode::MissingField, format!("{} is required", key))
    }

    fn wrong_type(key: &str, expected: &str, got: &Value) -> Self {
        Self::new(
            IssueCode::InvalidFieldType,
            format!("{} must be {}; got {}", key, expected, json_type(got)),
        )
    }
}

/// Accumulates the field errors of one record.
#[derive(Default)]
pub(crate) struct Fields {
    errors: Vec<FieldError>,
}

impl Fields {
    pub(crate) fn take<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    pub(crate) fn push(&mut self, err: FieldError) {
        self.errors.push(err);
    }

    pub(crate) fn finish(self) -> Vec<FieldError> {
        self.errors
    }
}

/// Names the JSON type of a value, for error messages.
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Looks up a key, treating an explicit `null` as absent.
pub fn field<'a>(obj: &'a Object, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Returns the value as a finite number, if it is one.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Returns the value as an integer, rejecting floats and booleans.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Returns the value as an integer, also accepting integral floats such as
/// `480.0`. Used for counts and sizes, never for identifiers.
pub fn as_whole_number(value: &Value) -> Option<i64> {
    as_integer(value).or_else(|| {
        as_number(value)
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

pub fn required_str(obj: &Object, key: &str) -> Result<String, FieldError> {
    match field(obj, key) {
        None => Err(FieldError::missing(key)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(FieldError::wrong_type(key, "a string", other)),
    }
}

pub fn optional_str(obj: &Object, key: &str) -> Result<Option<String>, FieldError> {
    match field(obj, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(FieldError::wrong_type(key, "a string", other)),
    }
}

pub fn required_i64(obj: &Object, key: &str) -> Result<i64, FieldError> {
    match field(obj, key) {
        None => Err(FieldError::missing(key)),
        Some(v) => as_integer(v).ok_or_else(|| FieldError::wrong_type(key, "an integer", v)),
    }
}

pub fn optional_i64(obj: &Object, key: &str) -> Result<Option<i64>, FieldError> {
    match field(obj, key) {
        None => Ok(None),
        Some(v) => as_integer(v)
            .map(Some)
            .ok_or_else(|| FieldError::wrong_type(key, "an integer", v)),
    }
}

pub fn optional_whole(obj: &Object, key: &str) -> Result<Option<i64>, FieldError> {
    match field(obj, key) {
        None => Ok(None),
        Some(v) => as_whole_number(v)
            .map(Some)
            .ok_or_else(|| FieldError::wrong_type(key, "an integer", v)),
    }
}

/// Reads free-form text, rendering a number in its JSON form.
pub fn optional_text(obj: &Object, key: &str) -> Result<Option<String>, FieldError> {
    match field(obj, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(FieldError::wrong_type(key, "a string or a number", other)),
    }
}

pub fn optional_number(obj: &Object, key: &str) -> Result<Option<f64>, FieldError> {
    match field(obj, key) {
        None => Ok(None),
        Some(v) => as_number(v)
            .map(Some)
            .ok_or_else(|| FieldError::wrong_type(key, "a number", v)),
    }
}

pub fn optional_object<'a>(obj: &'a Object, key: &str) -> Result<Option<&'a Object>, FieldError> {
    match field(obj, key) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(FieldError::wrong_type(key, "an object", other)),
    }
}

/// Reads a list of strings. Items must be strings; emptiness is not checked.
pub fn string_list(key: &str, value: &Value) -> Result<Vec<String>, FieldError> {
    let items = value
        .as_array()
        .ok_or_else(|| FieldError::wrong_type(key, "a list of strings", value))?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(FieldError::new(
                IssueCode::InvalidFieldType,
                format!("{} entries must be strings; got {}", key, json_type(other)),
            )),
        })
        .collect()
}

/// Copies every key not in `known` into a side-channel map.
pub fn extra_fields(obj: &Object, known: &[&str]) -> std::collections::BTreeMap<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Validates category keypoint labels: a list of non-blank strings.
pub fn validate_keypoint_labels(labels: Option<&Value>) -> Result<Option<Vec<String>>, FieldError> {
    let Some(value) = labels else {
        return Ok(None);
    };
    let Some(items) = value.as_array() else {
        return Err(FieldError::new(
            IssueCode::InvalidKeypointLabels,
            "keypoints must be a list of strings when provided.",
        ));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(label) = item.as_str() else {
            return Err(FieldError::new(
                IssueCode::InvalidKeypointLabels,
                "keypoints must be strings.",
            ));
        };
        if label.trim().is_empty() {
            return Err(FieldError::new(
                IssueCode::InvalidKeypointLabels,
                "keypoints entries must be non-empty strings.",
            ));
        }
        out.push(label.to_string());
    }
    Ok(Some(out))
}

/// Validates a skeleton: 1-based `[i, j]` pairs, in range when the keypoint
/// count is known.
pub fn validate_skeleton(
    pairs: Option<&Value>,
    keypoint_count: Option<usize>,
) -> Result<Option<Vec<[i64; 2]>>, FieldError> {
    let Some(value) = pairs else {
        return Ok(None);
    };
    let Some(items) = value.as_array() else {
        return Err(FieldError::new(
            IssueCode::InvalidSkeleton,
            "skeleton must be a list of [i, j] pairs when provided.",
        ));
    };

    // Structure first, so range errors always describe well-formed pairs.
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let pair = match item.as_array() {
            Some(pair) if pair.len() == 2 => pair,
            _ => {
                return Err(FieldError::new(
                    IssueCode::InvalidSkeleton,
                    "each skeleton entry must be a 2-item list [i, j].",
                ))
            }
        };
        match (as_integer(&pair[0]), as_integer(&pair[1])) {
            (Some(i), Some(j)) => out.push([i, j]),
            _ => {
                return Err(FieldError::new(
                    IssueCode::InvalidSkeleton,
                    "skeleton indices must be integers.",
                ))
            }
        }
    }

    for [i, j] in &out {
        if *i < 1 || *j < 1 {
            return Err(FieldError::new(
                IssueCode::InvalidSkeleton,
                format!(
                    "skeleton indices must be 1-based; got [{}, {}] (indices must be >= 1).",
                    i, j
                ),
            ));
        }
        if let Some(n) = keypoint_count {
            let n = n as i64;
            if *i > n || *j > n {
                return Err(FieldError::new(
                    IssueCode::InvalidSkeleton,
                    format!(
                        "skeleton indices out of range for {} keypoints; got [{}, {}] (must be <= {}).",
                        n, i, j, n
                    ),
                ));
            }
        }
    }
    Ok(Some(out))
}

/// Validates a COCO `[x, y, width, height]` box. Absent or empty boxes are
/// normalized to an empty list.
pub fn validate_bbox(values: Option<&Value>) -> Result<Vec<f64>, FieldError> {
    let Some(value) = values else {
        return Ok(Vec::new());
    };
    let Some(items) = value.as_array() else {
        return Err(FieldError::new(
            IssueCode::InvalidBBox,
            "bbox must be a list [x, y, width, height] when provided.",
        ));
    };
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if items.len() != 4 {
        return Err(FieldError::new(
            IssueCode::InvalidBBox,
            format!(
                "bbox must have 4 elements [x, y, width, height] when provided; got {}.",
                items.len()
            ),
        ));
    }
    let mut out = Vec::with_capacity(4);
    for item in items {
        let Some(n) = as_number(item) else {
            return Err(FieldError::new(
                IssueCode::InvalidBBox,
                "bbox values must be numeric.",
            ));
        };
        if n < 0.0 {
            return Err(FieldError::new(
                IssueCode::InvalidBBox,
                "bbox values must be non-negative.",
            ));
        }
        out.push(n);
    }
    Ok(out)
}

/// Validates a flat `[x0, y0, v0, x1, y1, v1, ...]` keypoint list.
pub fn validate_keypoints_triplets(values: Option<&Value>) -> Result<Option<Vec<f64>>, FieldError> {
    let Some(value) = values else {
        return Ok(None);
    };
    let flat_list_error = || {
        FieldError::new(
            IssueCode::InvalidKeypoints,
            "keypoints must be a flat list of length 3*K: [x0,y0,v0,...].",
        )
    };
    let items = value.as_array().ok_or_else(flat_list_error)?;
    if items.len() % 3 != 0 {
        return Err(flat_list_error());
    }
    let numbers = items
        .iter()
        .map(as_number)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| FieldError::new(IssueCode::InvalidKeypoints, "keypoints values must be numeric."))?;

    for triplet in numbers.chunks_exact(3) {
        let (x, y, v) = (triplet[0], triplet[1], triplet[2]);
        if !is_visibility(v) {
            return Err(FieldError::new(
                IssueCode::InvalidKeypoints,
                format!(
                    "keypoints visibility values must be 0,1,2; got {}. keypoints format must be [x0,y0,v0,...].",
                    v
                ),
            ));
        }
        if v == 0.0 && (x != 0.0 || y != 0.0) {
            return Err(FieldError::new(
                IssueCode::InvalidKeypoints,
                "When visibility v=0, keypoint coordinates must be (0,0).",
            ));
        }
        if v > 0.0 && (x < 0.0 || y < 0.0) {
            return Err(FieldError::new(
                IssueCode::InvalidKeypoints,
                "Visible keypoints must have non-negative coordinates.",
            ));
        }
    }
    Ok(Some(numbers))
}

fn is_visibility(v: f64) -> bool {
    v == 0.0 || v == 1.0 || v == 2.0
}

/// Counts triplets with visibility above zero.
pub fn visible_keypoints(keypoints: &[f64]) -> usize {
    keypoints
        .chunks_exact(3)
        .filter(|triplet| triplet[2] > 0.0)
        .count()
}

/// Validates the `iscrowd` flag.
pub fn validate_iscrowd(value: Option<&Value>) -> Result<Option<u8>, FieldError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match as_integer(value) {
        Some(0) => Ok(Some(0)),
        Some(1) => Ok(Some(1)),
        _ => Err(FieldError::new(
            IssueCode::InvalidIscrowd,
            "iscrowd must be integer 0 or 1 when provided.",
        )),
    }
}

/// Returns every value occurring more than once, each reported once, in
/// order of first occurrence.
pub fn find_duplicates<T, I>(values: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order = Vec::new();
    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }
    order.into_iter().filter(|v| counts[v] > 1).collect()
}
