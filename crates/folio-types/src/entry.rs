//! The in-memory document shape.
//!
//! An entry is owned by the collection layer. The sync engine only reads and
//! writes its title, its fields and its body text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name holding the content type.
pub const TYPE_FIELD: &str = "type";

/// Field name holding the title. Never stored in [`Entry::fields`].
pub const TITLE_FIELD: &str = "title";

/// Field name holding the body. Never stored in [`Entry::fields`].
pub const TEXT_FIELD: &str = "text";

/// A named document with a content type, a body and arbitrary metadata fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique name of the entry within its collection.
    pub title: String,
    /// Metadata fields other than `title` and `text`, ordered by name.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Body. Binary content types keep it base64-encoded.
    #[serde(default)]
    pub text: String,
}

impl Entry {
    /// Create an empty entry with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: BTreeMap::new(),
            text: String::new(),
        }
    }

    /// Set the body text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the content type.
    pub fn with_type(self, content_type: impl Into<String>) -> Self {
        self.with_field(TYPE_FIELD, content_type)
    }

    /// Set an arbitrary field.
    ///
    /// `title` and `text` are routed to their dedicated slots.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Set an arbitrary field in place.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            TITLE_FIELD => self.title = value,
            TEXT_FIELD => self.text = value,
            _ => {
                self.fields.insert(name, value);
            }
        }
    }

    /// Look up a field by name, including `title` and `text`.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            TITLE_FIELD => Some(&self.title),
            TEXT_FIELD => Some(&self.text),
            _ => self.fields.get(name).map(String::as_str),
        }
    }

    /// Declared content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.fields
            .get(TYPE_FIELD)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}
