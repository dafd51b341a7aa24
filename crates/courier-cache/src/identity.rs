use std::{collections::HashMap, fmt, sync::Arc};

use serde_json::Value;

use crate::PossibleTypes;

/// Id the server gives the mailbox root folder in every mailbox instance.
pub const ROOT_FOLDER_ID: &str = "1";

/// Computes a cache key for one kind; runs before the default policy.
pub type IdentityOverride = Arc<dyn Fn(&str, &Value) -> Option<String> + Send + Sync>;

/// Which cache a resolver serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// Server-backed cache with per-kind overrides and interface table.
    Network,
    /// Client-only cache using the default policy alone.
    Local,
}

impl CacheKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheKind::Network => "NetworkCache",
            CacheKind::Local => "LocalCache",
        }
    }
}

/// Maps normalized objects to stable cache keys.
///
/// A `None` result is not an error: the object is unkeyable and the caller
/// stores it embedded in its parent.
#[derive(Clone)]
pub struct IdentityResolver {
    kind: CacheKind,
    overrides: HashMap<String, IdentityOverride>,
    possible_types: PossibleTypes,
}

impl IdentityResolver {
    pub fn new(kind: CacheKind) -> Self {
        let mut resolver = Self {
            kind,
            overrides: HashMap::new(),
            possible_types: PossibleTypes::new(),
        };

        if kind == CacheKind::Network {
            resolver
                .register("MailboxMetadata", mailbox_metadata_identity)
                .register("Folder", folder_identity)
                .register("AutoCompleteMatch", auto_complete_match_identity);
            resolver.possible_types = PossibleTypes::mail_items();
        }

        resolver
    }

    /// Registers or replaces the override for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, identify: F) -> &mut Self
    where
        F: Fn(&str, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.overrides.insert(kind.into(), Arc::new(identify));
        self
    }

    /// Replaces the interface table.
    pub fn with_possible_types(mut self, possible_types: PossibleTypes) -> Self {
        self.possible_types = possible_types;
        self
    }

    pub fn cache_kind(&self) -> CacheKind {
        self.kind
    }

    pub fn identify(&self, kind: &str, object: &Value) -> Option<String> {
        let key = match self.overrides.get(kind) {
            Some(identify) => identify(kind, object),
            None => default_identity(kind, object),
        };

        if key.is_none() {
            tracing::trace!(kind, "object has no cache identity");
        }
        key
    }

    /// True when `kind` is a declared concrete member of `interface`.
    pub fn resolves_interface(&self, kind: &str, interface: &str) -> bool {
        self.possible_types.contains(interface, kind)
    }
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.overrides.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("IdentityResolver")
            .field("kind", &self.kind)
            .field("overrides", &kinds)
            .field("possible_types", &self.possible_types)
            .finish()
    }
}

/// `kind:id`, falling back to `_id`; `None` when neither is a scalar.
pub fn default_identity(kind: &str, object: &Value) -> Option<String> {
    let id = object
        .get("id")
        .and_then(scalar_text)
        .or_else(|| object.get("_id").and_then(scalar_text))?;
    Some(format!("{kind}:{id}"))
}

/// Metadata groups are keyed by their first section label.
fn mailbox_metadata_identity(kind: &str, object: &Value) -> Option<String> {
    match object.pointer("/meta/0/section").and_then(scalar_text) {
        Some(section) => Some(format!("{kind}:{section}")),
        None => default_identity(kind, object),
    }
}

/// The root folder id repeats across mailbox instances; the uuid tells them apart.
fn folder_identity(kind: &str, object: &Value) -> Option<String> {
    let id = object.get("id").and_then(scalar_text);
    let uuid = object.get("uuid").and_then(scalar_text);

    match (id, uuid) {
        (Some(id), Some(uuid)) if id == ROOT_FOLDER_ID => Some(format!("{kind}:{id}:{uuid}")),
        _ => default_identity(kind, object),
    }
}

/// Matches may lack an id, so the address disambiguates them.
fn auto_complete_match_identity(kind: &str, object: &Value) -> Option<String> {
    let Some(email) = object.get("email").and_then(scalar_text) else {
        return default_identity(kind, object);
    };

    let base = default_identity(kind, object).unwrap_or_else(|| kind.to_string());
    Some(format!("{base}:{email}"))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CacheKind, IdentityResolver, default_identity};

    #[test]
    fn default_prefers_id_then_underscore_id() {
        assert_eq!(
            default_identity("Tag", &json!({"id": 5, "_id": "x"})),
            Some("Tag:5".to_string())
        );
        assert_eq!(
            default_identity("Tag", &json!({"_id": "x"})),
            Some("Tag:x".to_string())
        );
        assert_eq!(default_identity("Tag", &json!({"name": "x"})), None);
        assert_eq!(default_identity("Tag", &json!({"id": null})), None);
    }

    #[test]
    fn metadata_group_falls_back_without_section() {
        let resolver = IdentityResolver::new(CacheKind::Network);
        assert_eq!(
            resolver.identify("MailboxMetadata", &json!({"meta": [{"section": "zwc:implicit"}]})),
            Some("MailboxMetadata:zwc:implicit".to_string())
        );
        assert_eq!(
            resolver.identify("MailboxMetadata", &json!({"id": "7", "meta": []})),
            Some("MailboxMetadata:7".to_string())
        );
        assert_eq!(resolver.identify("MailboxMetadata", &json!({"meta": []})), None);
    }

    #[test]
    fn root_folder_without_uuid_uses_default() {
        let resolver = IdentityResolver::new(CacheKind::Network);
        assert_eq!(
            resolver.identify("Folder", &json!({"id": "1"})),
            Some("Folder:1".to_string())
        );
    }

    #[test]
    fn registered_override_replaces_builtin() {
        let mut resolver = IdentityResolver::new(CacheKind::Network);
        resolver.register("Folder", |kind, object| {
            object
                .get("absFolderPath")
                .and_then(|path| path.as_str())
                .map(|path| format!("{kind}@{path}"))
        });
        assert_eq!(
            resolver.identify("Folder", &json!({"id": "2", "absFolderPath": "/Inbox"})),
            Some("Folder@/Inbox".to_string())
        );
    }

    #[test]
    fn local_cache_ignores_overrides_and_interfaces() {
        let resolver = IdentityResolver::new(CacheKind::Local);
        assert_eq!(resolver.cache_kind().as_str(), "LocalCache");
        assert_eq!(
            resolver.identify("Folder", &json!({"id": "1", "uuid": "U1"})),
            Some("Folder:1".to_string())
        );
        assert!(!resolver.resolves_interface("Conversation", "MailItem"));
    }
}
