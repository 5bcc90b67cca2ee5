use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value };

/// A professor review returned by the vector store for one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRecord {
    pub identifier: String,
    pub course: String,
    pub rating: Option<f64>,
    pub review: String,
    /// Similarity reported by the store. Logged only, never re-ranked on.
    pub score: f32,
}

impl RetrievedRecord {
    /// Builds a record from a match id and its metadata map.
    ///
    /// Missing text fields become empty strings; a rating that is neither a
    /// number nor a numeric string is treated as absent.
    pub fn from_metadata(identifier: impl Into<String>, score: f32, metadata: &Map<String, Value>) -> Self {
        Self {
            identifier: identifier.into(),
            course: text_field(metadata, "course"),
            rating: metadata.get("rating").and_then(numeric_value),
            review: text_field(metadata, "review"),
            score,
        }
    }

    pub fn rating_display(&self) -> String {
        match self.rating {
            Some(r) => r.to_string(),
            None => "unrated".to_string(),
        }
    }
}

fn text_field(metadata: &Map<String, Value>, key: &str) -> String {
    match metadata.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
