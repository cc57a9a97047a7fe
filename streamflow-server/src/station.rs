//! Station records as served by the radio directory mirrors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields read as text.
const TEXT_FIELDS: [&str; 4] = ["stationuuid", "name", "url_resolved", "codec"];

/// Errors from decoding a station record.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    /// A field the directory reads holds the wrong JSON type
    #[error("field {field} must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// A single station record.
///
/// The record is the JSON object the mirror sent, kept as-is: fields the
/// directory never reads (`favicon`, `bitrate`, `tags`, `country`, ...) and
/// explicit `null`s are written back out unchanged. The fields it does read
/// are exposed through accessors; `null` reads as absent.
///
/// Decoding fails if `stationuuid`, `name`, `url_resolved` or `codec` is
/// present and neither a string nor `null`, or if `votes` is present and
/// neither a number nor `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct StationRecord {
    fields: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for StationRecord {
    type Error = StationError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let holds = |field: &str, ok: fn(&Value) -> bool| {
            fields.get(field).is_none_or(|v| v.is_null() || ok(v))
        };

        for field in TEXT_FIELDS {
            if !holds(field, Value::is_string) {
                return Err(StationError::InvalidField {
                    field,
                    expected: "a string",
                });
            }
        }

        if !holds("votes", Value::is_number) {
            return Err(StationError::InvalidField {
                field: "votes",
                expected: "a number",
            });
        }

        Ok(Self { fields })
    }
}

impl From<StationRecord> for Map<String, Value> {
    fn from(record: StationRecord) -> Self {
        record.fields
    }
}

impl StationRecord {
    fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Stable station identifier.
    pub fn stationuuid(&self) -> Option<&str> {
        self.text("stationuuid")
    }

    /// Display name. Not unique across the directory.
    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    /// Playable stream URL after redirects.
    pub fn url_resolved(&self) -> Option<&str> {
        self.text("url_resolved")
    }

    /// Codec label, often empty.
    pub fn codec(&self) -> Option<&str> {
        self.text("codec")
    }

    /// Popularity score; may be negative.
    ///
    /// Fractional scores are truncated and out-of-range ones saturate.
    pub fn votes(&self) -> Option<i64> {
        match self.fields.get("votes")? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// Every field as received.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Popularity used for ranking; a missing score counts as zero.
    pub fn vote_count(&self) -> i64 {
        self.votes().unwrap_or(0)
    }

    /// Name used as the deduplication key.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("")
    }

    /// Stream URL, if present and non-empty.
    pub fn stream_url(&self) -> Option<&str> {
        self.url_resolved().filter(|url| !url.is_empty())
    }
}
