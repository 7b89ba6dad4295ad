//! Dynamic context and dynamic field resolution
//!
//! A hierarchical bag of strings populated by adapters (HTTP headers,
//! query parameters, source metadata) and resolved from action values via
//! `@dynamic(path):key`. Legacy `@prefix:param` references resolve through
//! prefix-keyed resolvers registered alongside the unified context.
//!
//! The tree is a single homogeneous node variant (map or leaf); adapters
//! with typed maps convert into this representation when populating.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::DynamicFieldRef;

/// Standard context paths populated by the built-in adapters.
pub const PATH_REQUEST_HEADERS: &str = "request.headers";
pub const PATH_REQUEST_QUERY: &str = "request.query";
pub const PATH_RESPONSE_HEADERS: &str = "response.headers";
pub const PATH_SOURCE_METADATA: &str = "source.metadata";

/// One node of the context tree: an inner map or a terminal string.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextNode {
    Map(HashMap<String, ContextNode>),
    Value(String),
}

impl ContextNode {
    fn as_map_mut(&mut self) -> &mut HashMap<String, ContextNode> {
        if !matches!(self, ContextNode::Map(_)) {
            // A leaf blocking the path is replaced; set() always wins.
            *self = ContextNode::Map(HashMap::new());
        }
        match self {
            ContextNode::Map(map) => map,
            ContextNode::Value(_) => unreachable!("replaced above"),
        }
    }
}

/// Hierarchical string map addressed with dot-separated paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicContext {
    root: HashMap<String, ContextNode>,
}

impl DynamicContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` at a dot-separated path, creating intermediate maps.
    /// The final path component is the leaf key. Keys under a `headers`
    /// map are normalized to lower-case on insert.
    pub fn set(&mut self, path: &str, value: &str) {
        let mut components: Vec<&str> = path.split('.').collect();
        let Some(leaf) = components.pop() else {
            return;
        };
        if leaf.is_empty() {
            return;
        }

        let in_headers = components.last().is_some_and(|c| *c == "headers");
        let leaf_key = if in_headers {
            leaf.to_lowercase()
        } else {
            leaf.to_string()
        };

        let mut current = &mut self.root;
        for component in components {
            current = current
                .entry(component.to_string())
                .or_insert_with(|| ContextNode::Map(HashMap::new()))
                .as_map_mut();
        }
        current.insert(leaf_key, ContextNode::Value(value.to_string()));
    }

    /// Navigate to the map at `path` and look up `key` inside it.
    ///
    /// Header lookups are case-insensitive. Returns `Some` only when the
    /// value is present AND non-empty.
    pub fn resolve(&self, path: &str, key: &str) -> Option<String> {
        let mut current = &self.root;
        for component in path.split('.') {
            match current.get(component)? {
                ContextNode::Map(map) => current = map,
                ContextNode::Value(_) => return None,
            }
        }

        let lookup_key = if path.ends_with("headers") {
            key.to_lowercase()
        } else {
            key.to_string()
        };

        match current.get(&lookup_key)? {
            ContextNode::Value(value) if !value.is_empty() => Some(value.clone()),
            _ => None,
        }
    }
}

/// Resolver for legacy `@prefix:param` dynamic references. Only the text
/// after the `:` is passed.
pub trait DynamicFieldResolver: Send + Sync {
    fn resolve(&self, parameter: &str) -> Option<String>;
}

/// Glues prefix-keyed resolvers (legacy form) and the unified context
/// (`@dynamic(path):key`) behind one lookup surface.
#[derive(Default)]
pub struct DynamicFieldRegistry {
    resolvers: HashMap<String, Arc<dyn DynamicFieldResolver>>,
    context: DynamicContext,
}

impl DynamicFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resolver(&mut self, prefix: &str, resolver: Arc<dyn DynamicFieldResolver>) {
        self.resolvers.insert(prefix.to_string(), resolver);
    }

    pub fn context(&self) -> &DynamicContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut DynamicContext {
        &mut self.context
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.resolvers.contains_key(prefix)
    }

    /// Resolve a unified dynamic reference; a missing path or key is not
    /// an error and resolves to `None`.
    pub fn resolve_ref(&self, reference: &DynamicFieldRef) -> Option<String> {
        self.context.resolve(&reference.path, &reference.key)
    }

    /// Resolve a legacy `@prefix:param` reference through its registered
    /// resolver.
    pub fn resolve_legacy(&self, prefix: &str, parameter: &str) -> Option<String> {
        self.resolvers.get(prefix)?.resolve(parameter)
    }

    /// True for any identifier starting with `@` that has one of the two
    /// dynamic reference shapes this registry can resolve.
    pub fn is_dynamic_field(&self, identifier: &str) -> bool {
        if parse_dynamic_ref(identifier).is_some() {
            return true;
        }
        match identifier.strip_prefix('@').and_then(|r| r.split_once(':')) {
            Some((prefix, _)) => self.has_prefix(prefix),
            None => false,
        }
    }
}

/// Parse the unified form `@dynamic(path):key`. Both path and key must be
/// non-empty.
pub fn parse_dynamic_ref(identifier: &str) -> Option<DynamicFieldRef> {
    let rest = identifier.strip_prefix("@dynamic(")?;
    let (path, key) = rest.split_once("):")?;
    if path.is_empty() || key.is_empty() {
        return None;
    }
    Some(DynamicFieldRef {
        raw: identifier.to_string(),
        path: path.to_string(),
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_creates_intermediate_maps() {
        let mut ctx = DynamicContext::new();
        ctx.set("source.metadata.provider", "acme");
        assert_eq!(
            ctx.resolve("source.metadata", "provider"),
            Some("acme".to_string())
        );
    }

    #[test]
    fn header_keys_are_case_insensitive() {
        let mut ctx = DynamicContext::new();
        ctx.set("request.headers.X-Video-Codec", "h265");
        assert_eq!(
            ctx.resolve("request.headers", "x-video-codec"),
            Some("h265".to_string())
        );
        assert_eq!(
            ctx.resolve("request.headers", "X-VIDEO-CODEC"),
            Some("h265".to_string())
        );
    }

    #[test]
    fn query_keys_stay_case_sensitive() {
        let mut ctx = DynamicContext::new();
        ctx.set("request.query.Format", "ts");
        assert_eq!(ctx.resolve("request.query", "Format"), Some("ts".to_string()));
        assert_eq!(ctx.resolve("request.query", "format"), None);
    }

    #[test]
    fn empty_values_are_not_found() {
        let mut ctx = DynamicContext::new();
        ctx.set("request.query.empty", "");
        assert_eq!(ctx.resolve("request.query", "empty"), None);
    }

    #[test]
    fn missing_paths_resolve_to_none() {
        let ctx = DynamicContext::new();
        assert_eq!(ctx.resolve("request.headers", "anything"), None);
        assert_eq!(ctx.resolve("no.such.path", "key"), None);
    }

    #[test]
    fn unified_reference_parsing() {
        let parsed = parse_dynamic_ref("@dynamic(request.headers):x-video-codec").unwrap();
        assert_eq!(parsed.path, "request.headers");
        assert_eq!(parsed.key, "x-video-codec");
        assert_eq!(parsed.raw, "@dynamic(request.headers):x-video-codec");

        assert!(parse_dynamic_ref("@dynamic():key").is_none());
        assert!(parse_dynamic_ref("@dynamic(path):").is_none());
        assert!(parse_dynamic_ref("@time:now").is_none());
        assert!(parse_dynamic_ref("plain").is_none());
    }

    struct MetadataResolver;

    impl DynamicFieldResolver for MetadataResolver {
        fn resolve(&self, parameter: &str) -> Option<String> {
            (parameter == "provider").then(|| "acme".to_string())
        }
    }

    #[test]
    fn legacy_prefix_resolution() {
        let mut registry = DynamicFieldRegistry::new();
        registry.register_resolver("source", Arc::new(MetadataResolver));

        assert_eq!(
            registry.resolve_legacy("source", "provider"),
            Some("acme".to_string())
        );
        assert_eq!(registry.resolve_legacy("source", "other"), None);
        assert_eq!(registry.resolve_legacy("unknown", "provider"), None);

        assert!(registry.is_dynamic_field("@source:provider"));
        assert!(registry.is_dynamic_field("@dynamic(request.headers):accept"));
        assert!(!registry.is_dynamic_field("@time:now"));
        assert!(!registry.is_dynamic_field("channel_name"));
    }
}
