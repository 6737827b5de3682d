use crate::config::ViewType;
use crate::member::{KeyInfo, KeyType};

/// Connection-wide state a member view needs, passed in rather than looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserContext {
    pub database_id: String,
    pub key_name: String,
    pub key_type: KeyType,
    /// Server-side length of the key when it was opened.
    pub key_length: u64,
    pub view_type: ViewType,
}

impl BrowserContext {
    pub fn new(
        database_id: impl Into<String>,
        key_name: impl Into<String>,
        key_type: KeyType,
        key_length: u64,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            key_name: key_name.into(),
            key_type,
            key_length,
            view_type: ViewType::default(),
        }
    }

    pub fn from_key_info(database_id: impl Into<String>, info: &KeyInfo) -> Self {
        Self::new(database_id, info.key.clone(), info.key_type, info.length)
    }

    pub fn with_view_type(mut self, view_type: ViewType) -> Self {
        self.view_type = view_type;
        self
    }
}
