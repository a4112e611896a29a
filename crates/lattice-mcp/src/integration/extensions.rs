//! Extension Registry
//!
//! Namespaced protocol extensions: each registered extension contributes an
//! entry under `capabilities.experimental`, a table of extra request
//! methods, and a table of extra notification handlers. Method names are
//! globally unique in practice, so dispatch is a linear scan over the
//! registered extensions.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;
use serde_json::{json, Value};

// Layer 3: Internal module imports
use super::error::{McpError, McpResult};

/// Extension request handler
pub type ExtensionMethod =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

/// Extension notification handler
pub type ExtensionNotification = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// One registered extension
#[derive(Clone)]
pub struct Extension {
    name: String,
    version: String,
    settings: Value,
    methods: HashMap<String, ExtensionMethod>,
    notifications: HashMap<String, ExtensionNotification>,
}

impl Extension {
    /// New extension with no methods or notifications yet
    pub fn new(name: impl Into<String>, version: impl Into<String>, settings: Value) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            settings,
            methods: HashMap::new(),
            notifications: HashMap::new(),
        }
    }

    /// Add a request method
    pub fn with_method<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Value>> + Send + 'static,
    {
        let handler: ExtensionMethod = Arc::new(move |params| Box::pin(handler(params)));
        self.methods.insert(method.into(), handler);
        self
    }

    /// Add a notification handler
    pub fn with_notification<F, Fut>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handler: ExtensionNotification = Arc::new(move |params| Box::pin(handler(params)));
        self.notifications.insert(method.into(), handler);
        self
    }

    /// Namespaced extension name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("notifications", &self.notifications.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// All extensions registered on one session
#[derive(Debug, Default, Clone)]
pub struct ExtensionRegistry {
    entries: Vec<Extension>,
}

impl ExtensionRegistry {
    /// Register an extension
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidRequest`] when the name lacks the
    /// `namespace/name` form or is already registered.
    pub fn register(&mut self, extension: Extension) -> McpResult<()> {
        if !extension.name.contains('/') {
            return Err(McpError::invalid_request(format!(
                "extension name must be namespaced with '/': {:?}",
                extension.name
            )));
        }
        if self.entries.iter().any(|e| e.name == extension.name) {
            return Err(McpError::invalid_request(format!(
                "extension already registered: {:?}",
                extension.name
            )));
        }
        self.entries.push(extension);
        Ok(())
    }

    /// `capabilities.experimental` contribution: `name → {version, settings}`
    pub fn experimental(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    json!({"version": e.version, "settings": e.settings}),
                )
            })
            .collect()
    }

    /// Find a request handler for an unknown method
    pub fn find_method(&self, method: &str) -> Option<&ExtensionMethod> {
        self.entries.iter().find_map(|e| e.methods.get(method))
    }

    /// Find a notification handler for an unknown notification
    pub fn find_notification(&self, method: &str) -> Option<&ExtensionNotification> {
        self.entries
            .iter()
            .find_map(|e| e.notifications.get(method))
    }

    /// Names both sides registered: the intersection of the peer's
    /// `experimental` set with local registrations.
    pub fn negotiated(&self, peer_experimental: Option<&HashMap<String, Value>>) -> Vec<String> {
        let Some(peer) = peer_experimental else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|e| peer.contains_key(&e.name))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Whether any extensions are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracing_extension() -> Extension {
        Extension::new("acme/tracing", "1.2.0", json!({"sample_rate": 0.1}))
            .with_method("acme/tracing/snapshot", |_| async {
                Ok(json!({"spans": []}))
            })
            .with_notification("acme/tracing/flush", |_| async {})
    }

    #[test]
    fn test_name_must_be_namespaced() {
        let mut registry = ExtensionRegistry::default();
        let bare = Extension::new("tracing", "1.0.0", Value::Null);
        assert!(registry.register(bare).is_err());
        assert!(registry.register(tracing_extension()).is_ok());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ExtensionRegistry::default();
        registry.register(tracing_extension()).unwrap();
        assert!(registry.register(tracing_extension()).is_err());
    }

    #[test]
    fn test_experimental_entry_shape() {
        let mut registry = ExtensionRegistry::default();
        registry.register(tracing_extension()).unwrap();

        let experimental = registry.experimental();
        let entry = &experimental["acme/tracing"];
        assert_eq!(entry["version"], "1.2.0");
        assert_eq!(entry["settings"]["sample_rate"], 0.1);
    }

    #[tokio::test]
    async fn test_method_lookup_and_dispatch() {
        let mut registry = ExtensionRegistry::default();
        registry.register(tracing_extension()).unwrap();

        let handler = registry.find_method("acme/tracing/snapshot").unwrap();
        let result = handler(None).await.unwrap();
        assert!(result["spans"].is_array());

        assert!(registry.find_method("acme/tracing/unknown").is_none());
        assert!(registry.find_notification("acme/tracing/flush").is_some());
    }

    #[test]
    fn test_negotiation_intersects() {
        let mut registry = ExtensionRegistry::default();
        registry.register(tracing_extension()).unwrap();

        let mut peer = HashMap::new();
        peer.insert("acme/tracing".to_string(), json!({"version": "1.0.0"}));
        peer.insert("other/ext".to_string(), json!({}));

        assert_eq!(registry.negotiated(Some(&peer)), vec!["acme/tracing"]);
        assert!(registry.negotiated(None).is_empty());
    }
}
