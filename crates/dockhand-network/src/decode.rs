//! Turns raw daemon responses into inspection results.

use crate::models::{Document, Inspection};
use crate::Result;
use dockhand_core::Error;
use serde_json::Value;

/// Decode a network inspection response.
///
/// | status        | result                         |
/// |---------------|--------------------------------|
/// | 2xx           | `Found(document)`              |
/// | 404           | `NotFound`                     |
/// | 401, 403      | [`Error::Auth`]                |
/// | anything else | [`Error::Server`]              |
///
/// # Errors
///
/// Besides the status mapping above, a success response whose body is not a
/// JSON object yields [`Error::Decode`]; it is never reported as `NotFound`.
pub fn decode_inspection(status: u16, body: &[u8]) -> Result<Inspection> {
    match status {
        404 => Ok(Inspection::NotFound),
        200..=299 => parse_document(body).map(Inspection::Found),
        _ => Err(Error::from_status(status, body)),
    }
}

fn parse_document(body: &[u8]) -> Result<Document> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| Error::Decode(format!("Response body is not valid JSON: {err}")))?;

    match value {
        Value::Object(document) => Ok(document),
        other => Err(Error::Decode(format!(
            "Expected a JSON object, got {}",
            kind(&other)
        ))),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
