use crate::error::ApiError;
use serde_json::{Map, Value};

/// ===============================
/// Build a merge patch from a client payload
/// ===============================
///
/// Only `allowed` top-level fields may appear. Strings are trimmed; nested
/// arrays and objects are rejected.
pub fn build_merge_patch(payload: &Value, allowed: &[&str]) -> Result<Map<String, Value>, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("Payload must be a JSON object".into()))?;

    if obj.is_empty() {
        return Err(ApiError::BadRequest("No fields provided for update".into()));
    }

    let mut patch = Map::with_capacity(obj.len());

    for (key, value) in obj {
        if !allowed.contains(&key.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Field `{}` cannot be updated",
                key
            )));
        }
        let value = match value {
            Value::String(s) => Value::String(s.trim().to_string()),
            Value::Number(_) | Value::Bool(_) | Value::Null => value.clone(),
            _ => {
                return Err(ApiError::BadRequest("Unsupported JSON value type".into()));
            }
        };
        patch.insert(key.clone(), value);
    }

    Ok(patch)
}
