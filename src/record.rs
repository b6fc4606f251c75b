//! Flat records parsed from fenced JSON model responses.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const FENCE: &str = "```";

/// A flat string-to-string mapping extracted from one model response.
///
/// Keys keep the order the model produced them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord {
    fields: IndexMap<String, String>,
}

impl ExtractedRecord {
    /// Parse a raw model response.
    ///
    /// The payload is the text strictly between the first and the last
    /// triple-backtick fence. A leading info string such as `json` is dropped.
    /// Non-string JSON values are kept as their compact JSON text.
    pub fn from_response(response: &str) -> Result<Self, String> {
        let payload = fenced_payload(response)
            .ok_or_else(|| "response does not contain an opening and a closing ``` fence".to_string())?;

        let value: Value = serde_json::from_str(strip_info_string(payload))
            .map_err(|e| format!("fenced block is not valid JSON: {}", e))?;

        let Value::Object(object) = value else {
            return Err("fenced block is not a JSON object".to_string());
        };

        let fields = object
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();

        Ok(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    /// Compact single-line JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Trimmed text between the first and the last ``` fence, if there are two distinct fences
pub fn fenced_payload(response: &str) -> Option<&str> {
    let open = response.find(FENCE)?;
    let close = response.rfind(FENCE)?;

    if close < open + FENCE.len() {
        return None;
    }

    Some(response[open + FENCE.len()..close].trim())
}

/// Drop a leading info string such as `json`, whether it sits on its own line or
/// is followed by the payload on the same line
fn strip_info_string(payload: &str) -> &str {
    if payload.starts_with(['{', '[']) {
        return payload;
    }

    match payload.split_once(char::is_whitespace) {
        Some((tag, rest)) if is_info_string(tag) => rest.trim(),
        _ => payload,
    }
}

fn is_info_string(tag: &str) -> bool {
    !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_json_with_info_string() {
        let response = "Here you go:\n```json\n{\"name\": \"Alpha widget\", \"price\": \"$10\"}\n```\nAnything else?";
        let record = ExtractedRecord::from_response(response).unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("name"), Some("Alpha widget"));
        assert_eq!(record.get("price"), Some("$10"));
        assert_eq!(record.to_json(), r#"{"name":"Alpha widget","price":"$10"}"#);
    }

    #[test]
    fn test_parse_fenced_json_without_info_string() {
        let record = ExtractedRecord::from_response("```{\"a\": \"1\"}```").unwrap();
        assert_eq!(record.get("a"), Some("1"));
    }

    #[test]
    fn test_info_string_on_the_payload_line() {
        let record = ExtractedRecord::from_response("```json {\"a\":\"1\"}```").unwrap();
        assert_eq!(record.get("a"), Some("1"));

        let record = ExtractedRecord::from_response("```JSON\t{\"b\": 2}\n```").unwrap();
        assert_eq!(record.get("b"), Some("2"));
    }

    #[test]
    fn test_non_string_values_become_strings() {
        let response = "```\n{\"price\": 10, \"in_stock\": true, \"tags\": [\"x\"], \"note\": null}\n```";
        let record = ExtractedRecord::from_response(response).unwrap();

        assert_eq!(record.get("price"), Some("10"));
        assert_eq!(record.get("in_stock"), Some("true"));
        assert_eq!(record.get("tags"), Some(r#"["x"]"#));
        assert_eq!(record.get("note"), Some("null"));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let record = ExtractedRecord::from_response("```json\n{\"z\": \"1\", \"a\": \"2\"}\n```").unwrap();
        let keys: Vec<_> = record.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_missing_closing_fence() {
        let err = ExtractedRecord::from_response("```json\n{\"name\": \"Beta\"}").unwrap_err();
        assert!(err.contains("fence"));
    }

    #[test]
    fn test_no_fence_at_all() {
        assert!(ExtractedRecord::from_response("{\"name\": \"Beta\"}").is_err());
        assert_eq!(fenced_payload("plain text"), None);
    }

    #[test]
    fn test_invalid_json_between_fences() {
        let err = ExtractedRecord::from_response("```json\n{name: Beta}\n```").unwrap_err();
        assert!(err.contains("not valid JSON"));
    }

    #[test]
    fn test_array_is_not_a_record() {
        let err = ExtractedRecord::from_response("```\n[\"a\"]\n```").unwrap_err();
        assert!(err.contains("not a JSON object"));
    }

    #[test]
    fn test_payload_spans_first_to_last_fence() {
        let response = "```\nouter ``` inner\n```";
        assert_eq!(fenced_payload(response), Some("outer ``` inner"));
    }
}
