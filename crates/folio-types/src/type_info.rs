//! Content-type tables.
//!
//! A [`TypeRegistry`] decides, per content type, which file extension an entry
//! gets, what content type is recorded for the stored file, whether a sidecar
//! metadata file is needed, how the body is encoded in memory, and which
//! template renders a self-contained file. It is an explicit configuration
//! object: each engine owns its own copy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Content type assumed when an entry declares none, or one the registry
/// does not know.
pub const DEFAULT_CONTENT_TYPE: &str = "text/vnd.tiddlywiki";

/// Stored file type for self-describing `.tid` files.
pub const TID_FILE_TYPE: &str = "application/x-tiddler";

/// Template rendering an entry as a self-contained `.tid` file.
pub const TID_TEMPLATE: &str = "$:/core/templates/tid-tiddler";

/// Template rendering an entry's fields as a sidecar metadata block.
pub const METADATA_TEMPLATE: &str = "$:/core/templates/tiddler-metadata";

/// How an entry of some content type is laid out on disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// File extension including the dot (e.g. `.tid`). May be empty.
    #[serde(default)]
    pub extension: String,
    /// Stored file type. `None` keeps the entry's declared content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Whether the body is written raw with a sidecar metadata file.
    #[serde(default)]
    pub has_meta_file: bool,
}

impl TypeInfo {
    /// Create type info for the given extension.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            file_type: None,
            has_meta_file: false,
        }
    }

    /// Record a different stored file type.
    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    /// Store the body raw with a sidecar metadata file.
    pub fn with_meta_file(mut self) -> Self {
        self.has_meta_file = true;
        self
    }
}

/// How an entry body is held in memory.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Encoding {
    /// Plain UTF-8 text.
    #[default]
    Utf8,
    /// Base64 text standing for raw bytes on disk.
    Base64,
}

/// Outcome of looking up a content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedType {
    /// Stored file type.
    pub file_type: String,
    /// Extension to append to the generated file name.
    pub extension: String,
    /// Whether a sidecar metadata file is written.
    pub has_meta_file: bool,
}

/// Configuration object holding every content-type table the engine consults.
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    type_info: HashMap<String, TypeInfo>,
    encodings: HashMap<String, Encoding>,
    templates: HashMap<String, String>,
    default_type: String,
}

impl TypeRegistry {
    /// Create a registry with no entries and the given fallback content type.
    pub fn empty(default_type: impl Into<String>) -> Self {
        Self {
            type_info: HashMap::new(),
            encodings: HashMap::new(),
            templates: HashMap::new(),
            default_type: default_type.into(),
        }
    }

    /// The stock tables: wikitext as `.tid`, common binary types as raw body
    /// plus sidecar.
    pub fn standard() -> Self {
        let mut registry = Self::empty(DEFAULT_CONTENT_TYPE)
            .with_type(
                DEFAULT_CONTENT_TYPE,
                TypeInfo::new(".tid").with_file_type(TID_FILE_TYPE),
            )
            .with_template(TID_FILE_TYPE, TID_TEMPLATE);

        for (content_type, extension) in [
            ("image/jpeg", ".jpg"),
            ("image/png", ".png"),
            ("image/gif", ".gif"),
            ("application/pdf", ".pdf"),
        ] {
            registry = registry
                .with_type(content_type, TypeInfo::new(extension).with_meta_file())
                .with_encoding(content_type, Encoding::Base64);
        }
        registry
    }

    /// Register layout information for a content type.
    pub fn with_type(mut self, content_type: impl Into<String>, info: TypeInfo) -> Self {
        self.type_info.insert(content_type.into(), info);
        self
    }

    /// Register the in-memory encoding of a content type.
    pub fn with_encoding(mut self, content_type: impl Into<String>, encoding: Encoding) -> Self {
        self.encodings.insert(content_type.into(), encoding);
        self
    }

    /// Register the template that renders files of a stored file type.
    pub fn with_template(mut self, file_type: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(file_type.into(), template.into());
        self
    }

    /// The fallback content type.
    pub fn default_type(&self) -> &str {
        &self.default_type
    }

    /// Layout information for a content type, if registered.
    pub fn type_info(&self, content_type: &str) -> Option<&TypeInfo> {
        self.type_info.get(content_type)
    }

    /// Resolve how an entry with the given declared type is stored.
    ///
    /// Unknown types fall back to the default type's layout.
    pub fn resolve(&self, content_type: Option<&str>) -> ResolvedType {
        let declared = content_type.unwrap_or(&self.default_type);
        let info = self
            .type_info
            .get(declared)
            .or_else(|| self.type_info.get(&self.default_type));

        match info {
            Some(info) => ResolvedType {
                file_type: info
                    .file_type
                    .clone()
                    .unwrap_or_else(|| declared.to_string()),
                extension: info.extension.clone(),
                has_meta_file: info.has_meta_file,
            },
            None => ResolvedType {
                file_type: declared.to_string(),
                extension: String::new(),
                has_meta_file: false,
            },
        }
    }

    /// In-memory encoding of a content type (UTF-8 unless registered).
    pub fn encoding(&self, content_type: &str) -> Encoding {
        self.encodings.get(content_type).copied().unwrap_or_default()
    }

    /// Template for a stored file type, if any.
    pub fn template(&self, file_type: &str) -> Option<&str> {
        self.templates.get(file_type).map(String::as_str)
    }

    /// Content type whose registered extension matches, ignoring ASCII case.
    ///
    /// Used when loading a body + sidecar pair whose metadata omits `type`.
    pub fn content_type_for_extension(&self, extension: &str) -> Option<&str> {
        if extension.is_empty() {
            return None;
        }
        let mut matches: Vec<&str> = self
            .type_info
            .iter()
            .filter(|(_, info)| info.extension.eq_ignore_ascii_case(extension))
            .map(|(content_type, _)| content_type.as_str())
            .collect();
        // HashMap order is arbitrary; keep the answer stable.
        matches.sort_unstable();
        matches.first().copied()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
