//! The `bazaar` extension: discovery metadata for paid endpoints.
//!
//! A server advertises the input shape of a paid endpoint so aggregators can
//! index it: query-style endpoints declare `{ input, inputSchema }`,
//! body-style endpoints additionally carry `bodyType`. The declaration is
//! enriched with the live request URL and method just before the 402
//! response is built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::PaymentPayload;
use crate::server::ResourceServerExtension;

/// Extension key.
pub const BAZAAR: &str = "bazaar";

/// Input shape advertised for a query-style endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDiscoveryInfo {
    /// Example input values.
    pub input: Value,

    /// JSON schema for the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Input shape advertised for a body-style endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDiscoveryInfo {
    /// Example input values.
    pub input: Value,

    /// JSON schema for the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// Request body encoding (e.g., `"json"`).
    pub body_type: String,
}

/// Discovery input shape, body-style or query-style.
///
/// Untagged: the body variant is tried first because only it carries the
/// `bodyType` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscoveryInfo {
    /// Body-style endpoint.
    Body(BodyDiscoveryInfo),
    /// Query-style endpoint.
    Query(QueryDiscoveryInfo),
}

/// A paid endpoint surfaced from a payment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    /// URL of the paid resource.
    pub resource_url: String,
    /// Protocol version of the payload.
    pub x402_version: u32,
    /// The advertised input shape.
    pub discovery_info: DiscoveryInfo,
}

/// Builds the server-side declaration for a discoverable endpoint.
///
/// Pass `body_type` for body-style endpoints; leave it `None` for
/// query-style.
#[must_use]
pub fn declare_discovery_extension(
    input: Value,
    input_schema: Option<Value>,
    body_type: Option<&str>,
) -> Value {
    let mut info = serde_json::Map::new();
    info.insert("input".into(), input);
    if let Some(schema) = input_schema {
        info.insert("inputSchema".into(), schema);
    }
    if let Some(body_type) = body_type {
        info.insert("bodyType".into(), Value::String(body_type.to_owned()));
    }
    serde_json::json!({ "info": Value::Object(info) })
}

/// Extracts discovery info from a payment payload, if the bazaar extension
/// is present and well-formed.
#[must_use]
pub fn extract_discovery_info(payload: &PaymentPayload) -> Option<DiscoveredResource> {
    let resource_url = payload.resource.as_ref()?.url.clone();
    let declaration = payload.extensions.as_ref()?.get(BAZAAR)?;
    let info = declaration.get("info")?;
    let discovery_info: DiscoveryInfo = serde_json::from_value(info.clone()).ok()?;
    Some(DiscoveredResource {
        resource_url,
        x402_version: payload.x402_version,
        discovery_info,
    })
}

/// Server-side bazaar extension: enriches the declaration with the live
/// request URL and method from the transport context.
#[derive(Debug, Clone, Copy, Default)]
pub struct BazaarExtension;

impl ResourceServerExtension for BazaarExtension {
    fn key(&self) -> &str {
        BAZAAR
    }

    fn enrich_declaration(&self, mut declaration: Value, transport_context: &Value) -> Value {
        let Some(obj) = declaration.as_object_mut() else {
            return declaration;
        };
        let info = obj
            .entry("info")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(info) = info.as_object_mut() {
            if let Some(url) = transport_context.get("url").cloned() {
                info.insert("resourceUrl".into(), url);
            }
            if let Some(method) = transport_context.get("method").cloned() {
                info.insert("method".into(), method);
            }
        }
        declaration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{PaymentRequirements, ResourceInfo};
    use serde_json::json;

    fn payload_with_extensions(extensions: Option<crate::proto::ExtensionMap>) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            accepted: PaymentRequirements {
                scheme: "exact".into(),
                network: "eip155:8453".into(),
                amount: "1000".into(),
                pay_to: "0xpay".into(),
                max_timeout_seconds: 300,
                asset: "0xasset".into(),
                extra: None,
            },
            payload: json!({}),
            resource: Some(ResourceInfo::from_url("https://api.example.com/weather")),
            extensions,
        }
    }

    #[test]
    fn declare_query_extension() {
        let decl = declare_discovery_extension(
            json!({"city": "SF"}),
            Some(json!({"properties": {"city": {"type": "string"}}})),
            None,
        );
        assert_eq!(decl["info"]["input"]["city"], "SF");
        assert!(decl["info"].get("bodyType").is_none());
    }

    #[test]
    fn extract_query_style() {
        let mut extensions = crate::proto::ExtensionMap::new();
        extensions.insert(
            BAZAAR.into(),
            declare_discovery_extension(
                json!({"city": "SF"}),
                Some(json!({"properties": {"city": {"type": "string"}}})),
                None,
            ),
        );
        let payload = payload_with_extensions(Some(extensions));

        let discovered = extract_discovery_info(&payload).unwrap();
        assert_eq!(discovered.resource_url, "https://api.example.com/weather");
        assert_eq!(discovered.x402_version, 2);
        assert!(matches!(discovered.discovery_info, DiscoveryInfo::Query(_)));
    }

    #[test]
    fn extract_body_style() {
        let mut extensions = crate::proto::ExtensionMap::new();
        extensions.insert(
            BAZAAR.into(),
            declare_discovery_extension(json!({"text": "hello"}), None, Some("json")),
        );
        let payload = payload_with_extensions(Some(extensions));

        let discovered = extract_discovery_info(&payload).unwrap();
        match discovered.discovery_info {
            DiscoveryInfo::Body(info) => assert_eq!(info.body_type, "json"),
            DiscoveryInfo::Query(_) => panic!("expected body-style info"),
        }
    }

    #[test]
    fn extract_absent_extension_is_none() {
        assert!(extract_discovery_info(&payload_with_extensions(None)).is_none());
        let empty = Some(crate::proto::ExtensionMap::new());
        assert!(extract_discovery_info(&payload_with_extensions(empty)).is_none());
    }

    #[test]
    fn enrichment_adds_request_context() {
        let ext = BazaarExtension;
        let decl = declare_discovery_extension(json!({"q": ""}), None, None);
        let ctx = json!({"url": "https://api.example.com/search?q=x", "method": "GET"});
        let enriched = ext.enrich_declaration(decl, &ctx);
        assert_eq!(
            enriched["info"]["resourceUrl"],
            "https://api.example.com/search?q=x"
        );
        assert_eq!(enriched["info"]["method"], "GET");
        assert_eq!(enriched["info"]["input"]["q"], "");
    }
}
