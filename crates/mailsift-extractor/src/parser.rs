//! Parse backend output into fragments or record attributes

use crate::error::ExtractorError;
use mailsift_domain::{AttributeValue, ExtractionFragment, SourceSpan};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

const CLASS_KEYS: &[&str] = &["extraction_class", "class", "class_label"];
const TEXT_KEYS: &[&str] = &["extraction_text", "text", "matched_text"];

/// Parse a fragment-sequence response
///
/// Accepts a bare JSON array or an object with an `extractions` array.
/// Fragments that cannot be read are skipped with a warning.
pub fn parse_fragments(response: &str) -> Result<Vec<ExtractionFragment>, ExtractorError> {
    let json: Value = serde_json::from_str(&extract_json(response)?)?;

    let items = match &json {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("extractions")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ExtractorError::Generation(
                    "Expected JSON array or object with an 'extractions' array".to_string(),
                )
            })?,
        _ => {
            return Err(ExtractorError::Generation(
                "Expected JSON array or object with an 'extractions' array".to_string(),
            ))
        }
    };

    let mut fragments = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match parse_fragment_json(item) {
            Ok(fragment) => fragments.push(fragment),
            Err(e) => warn!("Skipping fragment {}: {}", idx, e),
        }
    }

    Ok(fragments)
}

/// Parse a record-object response into its attribute map
pub fn parse_record_object(response: &str) -> Result<BTreeMap<String, AttributeValue>, ExtractorError> {
    let json: Value = serde_json::from_str(&extract_json(response)?)?;
    let obj = json
        .as_object()
        .ok_or_else(|| ExtractorError::Generation("Expected a JSON object".to_string()))?;
    Ok(convert_attributes(obj))
}

/// Extract JSON from response, handling markdown code blocks
pub(crate) fn extract_json(response: &str) -> Result<String, ExtractorError> {
    let trimmed = response.trim();

    if trimmed.is_empty() {
        return Err(ExtractorError::Generation("Empty response".to_string()));
    }

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(ExtractorError::Generation("Empty code block".to_string()));
        }

        // Skip the opening fence line, and the closing one when present
        let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        Ok(lines[1..end].join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_fragment_json(json: &Value) -> Result<ExtractionFragment, String> {
    let obj = json
        .as_object()
        .ok_or_else(|| "Fragment is not a JSON object".to_string())?;

    let class_label = first_of(obj, CLASS_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "Missing or invalid 'extraction_class'".to_string())?;

    let matched_text = match first_of(obj, TEXT_KEYS) {
        None | Some(Value::Null) => String::new(),
        Some(value) => scalar_text(value)
            .ok_or_else(|| "Invalid 'extraction_text'".to_string())?,
    };

    let attributes = obj
        .get("attributes")
        .and_then(Value::as_object)
        .map(convert_attributes)
        .unwrap_or_default();

    Ok(ExtractionFragment {
        class_label: class_label.to_string(),
        matched_text,
        attributes,
        source_span: parse_span(obj),
    })
}

fn first_of<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key))
}

fn parse_span(obj: &Map<String, Value>) -> Option<SourceSpan> {
    let pair = |holder: &Map<String, Value>, start: &str, end: &str| {
        Some((holder.get(start)?.as_u64()?, holder.get(end)?.as_u64()?))
    };

    let (start, end) = obj
        .get("char_interval")
        .and_then(Value::as_object)
        .and_then(|interval| pair(interval, "start_pos", "end_pos"))
        .or_else(|| {
            obj.get("source_span")
                .and_then(Value::as_object)
                .and_then(|span| pair(span, "start", "end"))
        })
        .or_else(|| pair(obj, "start_char", "end_char"))?;

    Some(SourceSpan::new(
        usize::try_from(start).ok()?,
        usize::try_from(end).ok()?,
    ))
}

fn convert_attributes(obj: &Map<String, Value>) -> BTreeMap<String, AttributeValue> {
    obj.iter()
        .filter_map(|(key, value)| convert_value(value).map(|v| (key.clone(), v)))
        .collect()
}

fn convert_value(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::Null => None,
        Value::Array(items) => Some(AttributeValue::List(
            items.iter().filter_map(scalar_text).collect(),
        )),
        Value::Object(_) => Some(AttributeValue::Text(value.to_string())),
        scalar => scalar_text(scalar).map(AttributeValue::Text),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
