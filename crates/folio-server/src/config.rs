//! Rhai-driven server configuration.
//!
//! Evaluates a `folio.rhai` script and reads its top-level bindings out of
//! the scope. Missing bindings keep their defaults:
//!
//! ```rhai
//! let root = "~/notes";
//! let bind = "127.0.0.1";
//! let port = 8081;
//! let notifications = true;
//! let managed_extension = ".tid";
//! let draft_pattern = "^Draft_of_";
//! let types = #{
//!     "image/webp": #{ extension: ".webp", meta: true, encoding: "base64" },
//! };
//! ```

use std::path::PathBuf;

use folio_kernel::SyncConfig;
use folio_kernel::config::{DEFAULT_DRAFT_PATTERN, DEFAULT_MANAGED_EXTENSION};
use folio_types::{Encoding, TID_FILE_TYPE, TypeInfo, TypeRegistry};

use crate::constants::{DEFAULT_BIND_ADDRESS, DEFAULT_ROOT_DIR, DEFAULT_WS_PORT};

/// Embedded default `folio.rhai`.
pub const DEFAULT_SERVER_CONFIG: &str = include_str!("../../../assets/defaults/folio.rhai");

/// A content type added on top of the stock type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeOverride {
    pub content_type: String,
    pub extension: String,
    /// Store the body as-is with a sidecar.
    pub meta: bool,
    pub encoding: Encoding,
}

/// Parsed server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub bind: String,
    pub port: u16,
    /// Push external changes to WebSocket observers.
    pub notifications: bool,
    pub managed_extension: String,
    pub draft_pattern: String,
    pub types: Vec<TypeOverride>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_WS_PORT,
            notifications: true,
            managed_extension: DEFAULT_MANAGED_EXTENSION.to_string(),
            draft_pattern: DEFAULT_DRAFT_PATTERN.to_string(),
            types: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// `bind:port` for the observer listener.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Stock type table plus the configured overrides.
    pub fn type_registry(&self) -> TypeRegistry {
        self.types
            .iter()
            .fold(TypeRegistry::standard(), |registry, t| {
                let info = if t.meta {
                    TypeInfo::new(&t.extension).with_meta_file()
                } else {
                    TypeInfo::new(&t.extension).with_file_type(TID_FILE_TYPE)
                };
                registry
                    .with_type(&t.content_type, info)
                    .with_encoding(&t.content_type, t.encoding)
            })
    }

    /// Engine configuration for this server.
    ///
    /// Fails on a type stored as a single file under any extension but
    /// `managed_extension`: neither boot nor the watcher would read it back.
    pub fn sync_config(&self) -> Result<SyncConfig, String> {
        if let Some(t) = self
            .types
            .iter()
            .find(|t| !t.meta && t.extension != self.managed_extension)
        {
            return Err(format!(
                "type {} uses extension {:?} without meta; only {:?} files are loaded back",
                t.content_type, t.extension, self.managed_extension
            ));
        }
        SyncConfig::new(&self.root)
            .with_managed_extension(&self.managed_extension)
            .with_types(self.type_registry())
            .with_draft_pattern(&self.draft_pattern)
            .map_err(|e| format!("invalid draft_pattern: {e}"))
    }
}

/// Default entry directory: `<data dir>/folio/entries`.
pub fn default_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_ROOT_DIR)
}

/// Expand `~` in a configured path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Parse a `folio.rhai` script into a [`ServerConfig`].
pub fn load_server_config(script: &str) -> Result<ServerConfig, String> {
    let engine = rhai::Engine::new();
    let ast = engine
        .compile(script)
        .map_err(|e| format!("folio.rhai parse error: {e}"))?;
    let mut scope = rhai::Scope::new();
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| format!("folio.rhai eval error: {e}"))?;

    let mut config = ServerConfig::default();
    if let Some(root) = get_string(&scope, "root") {
        config.root = expand_path(&root);
    }
    if let Some(bind) = get_string(&scope, "bind") {
        config.bind = bind;
    }
    if let Some(port) = scope.get_value::<i64>("port") {
        config.port = u16::try_from(port).map_err(|_| format!("port out of range: {port}"))?;
    }
    if let Some(notifications) = scope.get_value::<bool>("notifications") {
        config.notifications = notifications;
    }
    if let Some(extension) = get_string(&scope, "managed_extension") {
        config.managed_extension = extension;
    }
    if let Some(pattern) = get_string(&scope, "draft_pattern") {
        config.draft_pattern = pattern;
    }
    config.types = extract_types(&scope)?;
    Ok(config)
}

fn get_string(scope: &rhai::Scope, name: &str) -> Option<String> {
    scope
        .get_value::<rhai::ImmutableString>(name)
        .map(|s| s.to_string())
}

fn extract_types(scope: &rhai::Scope) -> Result<Vec<TypeOverride>, String> {
    let Some(types_map) = scope.get_value::<rhai::Map>("types") else {
        return Ok(Vec::new());
    };

    let mut types = Vec::new();
    for (content_type, value) in &types_map {
        let content_type = content_type.to_string();
        let Some(map) = value.clone().try_cast::<rhai::Map>() else {
            tracing::warn!(content_type = %content_type, "type entry is not a map, skipping");
            continue;
        };

        let Some(extension) = map
            .get("extension")
            .and_then(|v| v.clone().into_string().ok())
        else {
            tracing::warn!(content_type = %content_type, "type entry has no extension, skipping");
            continue;
        };

        let meta = map
            .get("meta")
            .and_then(|v| v.as_bool().ok())
            .unwrap_or(false);

        let encoding = match map.get("encoding").and_then(|v| v.clone().into_string().ok()) {
            Some(raw) => raw
                .parse::<Encoding>()
                .map_err(|_| format!("unknown encoding {raw:?} for {content_type}"))?,
            None => Encoding::Utf8,
        };

        types.push(TypeOverride {
            content_type,
            extension,
            meta,
            encoding,
        });
    }
    types.sort_by(|a, b| a.content_type.cmp(&b.content_type));
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script_loads() {
        let config = load_server_config(DEFAULT_SERVER_CONFIG).unwrap();
        assert_eq!(config.port, DEFAULT_WS_PORT);
        assert_eq!(config.bind, DEFAULT_BIND_ADDRESS);
        assert!(config.notifications);
        assert_eq!(config.root, default_root());

        let svg = config
            .types
            .iter()
            .find(|t| t.content_type == "image/svg+xml")
            .unwrap();
        assert!(svg.meta);
        assert_eq!(svg.encoding, Encoding::Utf8);
    }

    #[test]
    fn test_empty_script_keeps_defaults() {
        assert_eq!(load_server_config("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_bindings_override() {
        let config = load_server_config(
            r#"
            let root = "/srv/notes";
            let port = 9000;
            let notifications = false;
            let managed_extension = ".txt";
            "#,
        )
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/notes"));
        assert_eq!(config.port, 9000);
        assert!(!config.notifications);
        assert_eq!(config.socket_addr(), "127.0.0.1:9000");

        let sync = config.sync_config().unwrap();
        assert_eq!(sync.managed_extension, ".txt");
    }

    #[test]
    fn test_bad_port() {
        let err = load_server_config("let port = 70000;").unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn test_bad_encoding() {
        let err = load_server_config(r#"let types = #{ "a/b": #{ extension: ".ab", encoding: "rot13" } };"#)
            .unwrap_err();
        assert!(err.contains("rot13"));
    }

    #[test]
    fn test_parse_error() {
        let err = load_server_config("let = ;").unwrap_err();
        assert!(err.contains("parse error"));
    }

    #[test]
    fn test_bad_draft_pattern() {
        let config = load_server_config(r#"let draft_pattern = "(";"#).unwrap();
        assert!(config.sync_config().is_err());
    }

    #[test]
    fn test_single_file_type_must_use_managed_extension() {
        let config = load_server_config(
            r#"let types = #{ "text/x-markdown": #{ extension: ".md" } };"#,
        )
        .unwrap();
        let err = config.sync_config().unwrap_err();
        assert!(err.contains("text/x-markdown"), "{err}");

        let config = load_server_config(
            r#"
            let managed_extension = ".md";
            let types = #{ "text/x-markdown": #{ extension: ".md" } };
            "#,
        )
        .unwrap();
        assert!(config.sync_config().is_ok());

        let config = load_server_config(
            r#"let types = #{ "text/x-markdown": #{ extension: ".md", meta: true } };"#,
        )
        .unwrap();
        assert!(config.sync_config().is_ok());
    }

    #[test]
    fn test_type_overrides_reach_registry() {
        let config = load_server_config(
            r#"let types = #{ "image/webp": #{ extension: ".webp", meta: true, encoding: "base64" } };"#,
        )
        .unwrap();
        let registry = config.type_registry();

        let resolved = registry.resolve(Some("image/webp"));
        assert_eq!(resolved.extension, ".webp");
        assert!(resolved.has_meta_file);
        assert_eq!(registry.encoding("image/webp"), Encoding::Base64);
        // Stock types survive.
        assert!(registry.type_info("image/png").is_some());
    }
}
