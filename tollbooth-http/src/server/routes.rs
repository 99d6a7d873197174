//! Route configuration and matching for the payment gate.

use http::Method;
use tollbooth::config::ResourceConfig;
use tollbooth::path::path_is_match;
use tollbooth::proto::ExtensionMap;

/// Payment configuration for a set of paths.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Path patterns: exact, glob (`*`, `?`, `**`), or `regex:` prefixed.
    /// The route matches when any pattern matches.
    pub paths: Vec<String>,

    /// Methods the route applies to; empty means all methods.
    pub methods: Vec<Method>,

    /// Payment options, in preference order. Each becomes one entry in the
    /// 402 `accepts` list.
    pub accepts: Vec<ResourceConfig>,

    /// Human-readable description of what the payment buys.
    pub description: String,

    /// MIME type of the protected resource.
    pub mime_type: String,

    /// Protocol version emitted on this route's 402 responses (1 or 2).
    pub x402_version: u32,

    /// Extension declarations advertised on this route.
    pub extensions: Option<ExtensionMap>,
}

impl RouteConfig {
    /// Creates a route over the given path patterns with one payment option.
    #[must_use]
    pub fn new(paths: Vec<String>, accepts: Vec<ResourceConfig>) -> Self {
        Self {
            paths,
            methods: Vec::new(),
            accepts,
            description: String::new(),
            mime_type: "application/json".into(),
            x402_version: 2,
            extensions: None,
        }
    }

    /// Restricts the route to specific methods.
    #[must_use]
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    /// Sets the resource description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the resource MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Emits legacy V1 on this route instead of V2.
    #[must_use]
    pub const fn emit_v1(mut self) -> Self {
        self.x402_version = 1;
        self
    }

    /// Attaches extension declarations.
    #[must_use]
    pub fn with_extensions(mut self, extensions: ExtensionMap) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Checks whether this route covers a request.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        let method_ok = self.methods.is_empty() || self.methods.contains(method);
        method_ok && path_is_match(&self.paths, path)
    }
}

/// Ordered route table; the first matching route wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable(Vec<RouteConfig>);

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a route, returning self for chaining.
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.0.push(route);
        self
    }

    /// Appends a route.
    pub fn add(&mut self, route: RouteConfig) {
        self.0.push(route);
    }

    /// Finds the first route covering a request, if any.
    #[must_use]
    pub fn matching(&self, method: &Method, path: &str) -> Option<&RouteConfig> {
        self.0.iter().find(|r| r.matches(method, path))
    }
}
