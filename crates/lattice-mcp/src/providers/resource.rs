//! Registered Resources and Resource Templates
//!
//! Concrete resources pair a [`Resource`] definition with a zero-argument
//! reader; templates pair a [`ResourceTemplate`] with a reader over the
//! variable bindings produced by [`UriTemplate`] matching. `resources/read`
//! tries exact resources first, then templates in registration order.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::BoxFuture;

// Layer 3: Internal module imports
use super::uri_template::UriTemplate;
use crate::integration::{McpError, McpResult};
use crate::protocol::{Resource, ResourceContents, ResourceTemplate};

/// Reader for a concrete resource
pub type ResourceReader =
    Arc<dyn Fn() -> BoxFuture<'static, McpResult<Vec<ResourceContents>>> + Send + Sync>;

/// Reader for a templated resource, given the matched variable bindings
pub type TemplateReader = Arc<
    dyn Fn(HashMap<String, String>) -> BoxFuture<'static, McpResult<Vec<ResourceContents>>>
        + Send
        + Sync,
>;

/// A concrete resource bound to its reader
#[derive(Clone)]
pub struct RegisteredResource {
    resource: Resource,
    reader: ResourceReader,
}

impl RegisteredResource {
    /// Register a resource with its reader
    pub fn new<F, Fut>(resource: Resource, reader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Vec<ResourceContents>>> + Send + 'static,
    {
        let reader: ResourceReader = Arc::new(move || Box::pin(reader()));
        Self { resource, reader }
    }

    /// The wire-level resource definition
    pub fn definition(&self) -> &Resource {
        &self.resource
    }

    /// Registered uri
    pub fn uri(&self) -> &str {
        &self.resource.uri
    }

    /// Read the resource contents
    pub async fn read(&self) -> McpResult<Vec<ResourceContents>> {
        (self.reader)().await
    }
}

impl fmt::Debug for RegisteredResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredResource")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

/// A resource template bound to its reader
#[derive(Clone)]
pub struct RegisteredResourceTemplate {
    template: ResourceTemplate,
    matcher: UriTemplate,
    reader: TemplateReader,
}

impl RegisteredResourceTemplate {
    /// Register a template with its reader
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidRequest`] when the uri template cannot be
    /// parsed (unterminated or empty `{name}` placeholders).
    pub fn new<F, Fut>(template: ResourceTemplate, reader: F) -> McpResult<Self>
    where
        F: Fn(HashMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<Vec<ResourceContents>>> + Send + 'static,
    {
        let matcher = UriTemplate::parse(&template.uri_template).map_err(|e| {
            McpError::invalid_request(format!(
                "invalid uri template {:?}: {e}",
                template.uri_template
            ))
        })?;
        let reader: TemplateReader = Arc::new(move |bindings| Box::pin(reader(bindings)));
        Ok(Self {
            template,
            matcher,
            reader,
        })
    }

    /// The wire-level template definition
    pub fn definition(&self) -> &ResourceTemplate {
        &self.template
    }

    /// Try to match a uri against this template
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        self.matcher.match_uri(uri)
    }

    /// Read the resource contents for the given bindings
    pub async fn read(&self, bindings: HashMap<String, String>) -> McpResult<Vec<ResourceContents>> {
        (self.reader)(bindings).await
    }
}

impl fmt::Debug for RegisteredResourceTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredResourceTemplate")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_resource() -> Resource {
        Resource {
            uri: "info://clock".into(),
            name: "clock".into(),
            description: None,
            mime_type: Some("text/plain".into()),
            annotations: None,
        }
    }

    #[tokio::test]
    async fn test_resource_reader() {
        let registered = RegisteredResource::new(clock_resource(), || async {
            Ok(vec![ResourceContents::text("info://clock", "12:00")])
        });

        let contents = registered.read().await.unwrap();
        assert_eq!(contents[0].uri(), "info://clock");
    }

    #[tokio::test]
    async fn test_template_reader_receives_bindings() {
        let template = ResourceTemplate {
            uri_template: "db://{table}/{id}".into(),
            name: "rows".into(),
            description: None,
            mime_type: None,
            annotations: None,
        };
        let registered = RegisteredResourceTemplate::new(template, |bindings| async move {
            let uri = format!("db://{}/{}", bindings["table"], bindings["id"]);
            Ok(vec![ResourceContents::text(uri, "row data")])
        })
        .unwrap();

        let bindings = registered.match_uri("db://users/42").unwrap();
        assert_eq!(bindings["table"], "users");
        assert_eq!(bindings["id"], "42");

        let contents = registered.read(bindings).await.unwrap();
        assert_eq!(contents[0].uri(), "db://users/42");
    }

    #[test]
    fn test_malformed_template_rejected() {
        let template = ResourceTemplate {
            uri_template: "db://{unterminated".into(),
            name: "bad".into(),
            description: None,
            mime_type: None,
            annotations: None,
        };
        let result = RegisteredResourceTemplate::new(template, |_| async { Ok(vec![]) });
        assert!(result.is_err());
    }
}
