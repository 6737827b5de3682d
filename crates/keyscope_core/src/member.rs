use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Redis key types the browser knows how to present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    String,
    Hash,
    List,
    Set,
    SortedSet,
    Stream,
    Json,
    Unknown,
}

impl KeyType {
    /// Wire name reported in telemetry payloads.
    pub fn label(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
            KeyType::Stream => "stream",
            KeyType::Json => "ReJSON-RL",
            KeyType::Unknown => "unknown",
        }
    }

    /// Prefix shared by the test identifiers of this type's views.
    pub fn test_id_prefix(&self) -> &'static str {
        match self {
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::SortedSet => "zset",
            KeyType::Stream => "stream",
            KeyType::String => "string",
            KeyType::Json => "json",
            KeyType::Unknown => "key",
        }
    }

    /// What a single element of this type is called in prompts.
    pub fn element_noun(&self) -> &'static str {
        match self {
            KeyType::Hash => "Field",
            KeyType::List => "Element",
            KeyType::Set | KeyType::SortedSet => "Member",
            KeyType::Stream => "Entry",
            KeyType::String | KeyType::Json | KeyType::Unknown => "Value",
        }
    }
}

/// Metadata for the key whose members are being browsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key: String,
    pub key_type: KeyType,
    pub length: u64,
    pub ttl_seconds: Option<i64>,
}

impl KeyInfo {
    pub fn new(key: impl Into<String>, key_type: KeyType, length: u64) -> Self {
        Self {
            key: key.into(),
            key_type,
            length,
            ttl_seconds: None,
        }
    }
}

/// One row of a collection key.
///
/// Every member has an identifying key used to target edits and deletes and a
/// single editable value field.
pub trait CollectionMember: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    const KEY_TYPE: KeyType;

    /// Name of the editable field, used in validation messages and column ids.
    const VALUE_FIELD: &'static str;

    fn member_key(&self) -> &str;

    fn value_text(&self) -> String;

    /// Returns a copy carrying `raw` as the new value, or the reason it is invalid.
    fn with_edited_value(&self, raw: &str) -> Result<Self, ValidationError>;

    /// Length reported when the row is expanded or collapsed.
    fn largest_cell_length(&self) -> usize {
        self.member_key().chars().count()
    }
}

/// Sorted set entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZSetMember {
    pub name: String,
    pub score: f64,
}

impl ZSetMember {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

impl CollectionMember for ZSetMember {
    const KEY_TYPE: KeyType = KeyType::SortedSet;
    const VALUE_FIELD: &'static str = "score";

    fn member_key(&self) -> &str {
        &self.name
    }

    fn value_text(&self) -> String {
        format_score(self.score)
    }

    fn with_edited_value(&self, raw: &str) -> Result<Self, ValidationError> {
        let score = validate_score(raw)?;
        Ok(Self {
            name: self.name.clone(),
            score,
        })
    }
}

/// Hash field and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashField {
    pub field: String,
    pub value: String,
}

impl HashField {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl CollectionMember for HashField {
    const KEY_TYPE: KeyType = KeyType::Hash;
    const VALUE_FIELD: &'static str = "value";

    fn member_key(&self) -> &str {
        &self.field
    }

    fn value_text(&self) -> String {
        self.value.clone()
    }

    fn with_edited_value(&self, raw: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            field: self.field.clone(),
            value: raw.to_string(),
        })
    }

    fn largest_cell_length(&self) -> usize {
        self.field.chars().count().max(self.value.chars().count())
    }
}

/// Parses a score typed by the user. Infinities and NaN are rejected.
pub fn validate_score(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field: "score" });
    }

    let score = trimmed
        .parse::<f64>()
        .map_err(|_| ValidationError::NotANumber { field: "score" })?;

    if !score.is_finite() {
        return Err(ValidationError::NotFinite { field: "score" });
    }

    Ok(score)
}

/// Formats a score the way it is shown in the score column.
pub fn format_score(score: f64) -> String {
    score.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_accepts_integers_decimals_and_exponents() {
        assert_eq!(validate_score("5"), Ok(5.0));
        assert_eq!(validate_score(" -1.25 "), Ok(-1.25));
        assert_eq!(validate_score("1e3"), Ok(1000.0));
    }

    #[test]
    fn score_rejects_garbage_and_non_finite_values() {
        assert_eq!(
            validate_score(""),
            Err(ValidationError::Required { field: "score" })
        );
        assert_eq!(
            validate_score("abc"),
            Err(ValidationError::NotANumber { field: "score" })
        );
        assert_eq!(
            validate_score("inf"),
            Err(ValidationError::NotFinite { field: "score" })
        );
        assert_eq!(
            validate_score("NaN"),
            Err(ValidationError::NotFinite { field: "score" })
        );
    }

    #[test]
    fn zset_edit_keeps_name_and_replaces_score() {
        let member = ZSetMember::new("a", 1.0);
        let edited = member.with_edited_value("5").expect("valid score");

        assert_eq!(edited, ZSetMember::new("a", 5.0));
        assert_eq!(member.value_text(), "1");
    }

    #[test]
    fn hash_largest_cell_covers_field_and_value() {
        let field = HashField::new("f", "a much longer value");
        assert_eq!(field.largest_cell_length(), 19);
    }
}
