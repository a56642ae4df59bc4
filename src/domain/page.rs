use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// One index entry keyed by `url`; unknown fields ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub image: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Null becomes empty, other non-strings keep their JSON text.
fn lenient_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl PageRecord {
    /// Empty incoming fields leave the existing value in place.
    pub fn merge(&mut self, incoming: PageRecord) {
        fn take(slot: &mut String, value: String) {
            if !value.is_empty() { *slot = value; }
        }
        take(&mut self.url, incoming.url);
        take(&mut self.title, incoming.title);
        take(&mut self.description, incoming.description);
        take(&mut self.image, incoming.image);
        take(&mut self.created_at, incoming.created_at);
        self.extra.extend(incoming.extra);
    }

    /// Sort key; anything that does not parse counts as the epoch.
    pub fn created_at_key(&self) -> OffsetDateTime {
        OffsetDateTime::parse(self.created_at.trim(), &Rfc3339)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

/// Formats a UTC instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn iso_millis(at: OffsetDateTime) -> String {
    let fmt = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000Z"))
}
