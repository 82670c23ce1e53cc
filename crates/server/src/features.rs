//! Feature record validation and encoding
//!
//! Turns a loosely-typed JSON record into the fixed-order numeric vector
//! the fitted artifacts expect. Validation failures name the offending
//! field so callers can correct and resubmit.

use habitus_shared::{HabitusError, Result};
use serde_json::{Map, Value};

/// The feature order the scaler and classifier were fitted with.
///
/// Neither artifact validates field identity, only position, so this order
/// must never change without refitting.
pub const FEATURE_ORDER: [&str; 7] = [
    "appUsageTime",
    "screenOnTime",
    "batteryDrain",
    "appsInstalled",
    "dataUsage",
    "age",
    "gender",
];

/// Name of the single categorical feature
pub const GENDER_FEATURE: &str = "gender";

const INVALID_GENDER_MESSAGE: &str = "Invalid Gender value. Must be \"Male\" or \"Female\".";

/// Parses a request body into a JSON object record.
///
/// Unparsable bodies and non-object JSON are both validation failures,
/// never internal errors.
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| HabitusError::request_validation("Invalid JSON input"))?;

    match value {
        Value::Object(record) => Ok(record),
        _ => Err(HabitusError::request_validation("Invalid JSON input")),
    }
}

/// Validates a record and encodes it into the fixed-order feature vector.
///
/// The categorical field is checked first, matching the original contract:
/// a record missing both `gender` and a numeric field reports `gender`.
/// Numeric fields are then checked in declared order and the first missing
/// or non-numeric one is named. Extra fields are ignored.
pub fn encode_record(record: &Map<String, Value>) -> Result<Vec<f64>> {
    let gender_value = record
        .get(GENDER_FEATURE)
        .ok_or_else(|| missing_feature(GENDER_FEATURE))?;
    let gender_code = encode_gender(gender_value)?;

    let mut vector = Vec::with_capacity(FEATURE_ORDER.len());
    for name in &FEATURE_ORDER[..FEATURE_ORDER.len() - 1] {
        let value = record.get(*name).ok_or_else(|| missing_feature(name))?;
        let number = value.as_f64().ok_or_else(|| {
            HabitusError::request_validation(format!("Invalid numeric value for feature: {}", name))
        })?;
        vector.push(number);
    }

    // Encoded gender is the last position in the fitted order
    vector.push(gender_code);
    Ok(vector)
}

/// Encodes the categorical gender value as its fitted binary code.
///
/// Hard-coded two-way mapping: "male" → 1, "female" → 0, compared
/// case-insensitively. There is no fallback class; the fitted model
/// depends on exactly this encoding.
fn encode_gender(value: &Value) -> Result<f64> {
    let label = value
        .as_str()
        .ok_or_else(|| HabitusError::request_validation(INVALID_GENDER_MESSAGE))?;

    match label.to_lowercase().as_str() {
        "male" => Ok(1.0),
        "female" => Ok(0.0),
        _ => Err(HabitusError::request_validation(INVALID_GENDER_MESSAGE)),
    }
}

fn missing_feature(name: &str) -> HabitusError {
    HabitusError::request_validation(format!("Missing feature: {}", name))
}
