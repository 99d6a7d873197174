//! The payment gate: a tower layer enforcing x402 payments on routes.
//!
//! Pipeline per request:
//!
//! 1. match the route; unmatched requests bypass the gate;
//! 2. build the advertised requirements and enrich extension declarations;
//! 3. no payment header → 402 with the terms;
//! 4. decode and match the payload against the advertised options;
//! 5. verify through the engine (hooks may abort or recover);
//! 6. run the handler and **buffer** its output;
//! 7. settle; only a successful (or recovered) settlement releases the
//!    buffered body, with the receipt attached.
//!
//! The handler's bytes never reach the wire unless both verification and
//! settlement succeed — output is materialized into memory, never streamed,
//! until settlement commits.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::{HeaderValue, StatusCode, header};
use http_body_util::BodyExt;
use tollbooth::extensions::payment_identifier::extract_payment_id;
use tollbooth::networks::NetworkRegistry;
use tollbooth::proto::helpers::PaymentPayloadEnum;
use tollbooth::proto::v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
use tollbooth::proto::{
    ExtensionMap, PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo,
    SettleResponse,
};
use tollbooth::server::ResourceServer;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use url::Url;

use super::replay::{CachedResponse, ReplayCache};
use super::routes::{RouteConfig, RouteTable};
use crate::constants::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER,
    X_PAYMENT_RESPONSE_HEADER,
};
use crate::headers;

/// Upper bound on buffered handler output.
const MAX_BUFFERED_BODY: usize = 8 * 1024 * 1024;

/// Builds [`PaymentGate`] services around an initialized [`ResourceServer`]
/// and a route table.
#[derive(Clone)]
pub struct PaymentGateLayer {
    server: Arc<ResourceServer>,
    routes: Arc<RouteTable>,
    base_url: Option<Arc<Url>>,
    registry: Arc<NetworkRegistry>,
    replay: Arc<ReplayCache>,
}

impl std::fmt::Debug for PaymentGateLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateLayer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl PaymentGateLayer {
    /// Creates a layer. The server must already be initialized.
    #[must_use]
    pub fn new(server: Arc<ResourceServer>, routes: RouteTable) -> Self {
        Self {
            server,
            routes: Arc::new(routes),
            base_url: None,
            registry: Arc::new(NetworkRegistry::new()),
            replay: Arc::new(ReplayCache::default()),
        }
    }

    /// Sets the base URL used to compute resource URLs. Without it the
    /// request's `Host` header is used.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(Arc::new(base_url));
        self
    }

    /// Supplies the legacy-name registry used when a route emits V1.
    #[must_use]
    pub fn with_network_registry(mut self, registry: NetworkRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Replaces the replay cache (e.g., to change its capacity).
    #[must_use]
    pub fn with_replay_cache(mut self, cache: ReplayCache) -> Self {
        self.replay = Arc::new(cache);
        self
    }
}

impl<S> Layer<S> for PaymentGateLayer
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = PaymentGate;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGate {
            server: Arc::clone(&self.server),
            routes: Arc::clone(&self.routes),
            base_url: self.base_url.clone(),
            registry: Arc::clone(&self.registry),
            replay: Arc::clone(&self.replay),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// The tower service enforcing payments.
#[derive(Clone)]
pub struct PaymentGate {
    server: Arc<ResourceServer>,
    routes: Arc<RouteTable>,
    base_url: Option<Arc<Url>>,
    registry: Arc<NetworkRegistry>,
    replay: Arc<ReplayCache>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate").finish_non_exhaustive()
    }
}

impl Service<Request> for PaymentGate {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = self.clone();
        Box::pin(async move { Ok(gate.handle(req).await) })
    }
}

/// Everything derived from the matched route for one request.
struct GateContext {
    accepts: Vec<PaymentRequirements>,
    resource: ResourceInfo,
    extensions: Option<ExtensionMap>,
    emit_version: u32,
}

impl PaymentGate {
    async fn handle(mut self, req: Request) -> Response {
        let routes = Arc::clone(&self.routes);
        let route = match routes.matching(req.method(), req.uri().path()) {
            Some(route) => route.clone(),
            None => return self.pass_through(req).await,
        };

        let ctx = match self.build_context(&route, &req) {
            Ok(ctx) => ctx,
            Err(reason) => {
                tracing::error!(reason = %reason, "failed to build payment requirements");
                return self.payment_required_response(
                    &GateContext {
                        accepts: Vec::new(),
                        resource: self.resource_info(&route, &req),
                        extensions: None,
                        emit_version: route.x402_version,
                    },
                    Some(reason),
                );
            }
        };

        // Read the version-appropriate header; absence advertises the terms.
        let header_value = req
            .headers()
            .get(PAYMENT_SIGNATURE_HEADER)
            .or_else(|| req.headers().get(X_PAYMENT_HEADER))
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let Some(header_value) = header_value else {
            return self.payment_required_response(&ctx, None);
        };

        let payload = match headers::decode_payment_payload(&header_value) {
            Ok(payload) => payload,
            Err(err) => {
                return self
                    .payment_required_response(&ctx, Some(format!("invalid payment header: {err}")));
            }
        };

        match payload {
            PaymentPayloadEnum::V2(payload) => {
                self.handle_v2(req, &ctx, *payload, &header_value).await
            }
            PaymentPayloadEnum::V1(payload) => self.handle_v1(req, &ctx, *payload).await,
        }
    }

    async fn pass_through(&mut self, req: Request) -> Response {
        match self.inner.call(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    async fn handle_v2(
        mut self,
        req: Request,
        ctx: &GateContext,
        payload: PaymentPayload,
        header_value: &str,
    ) -> Response {
        let Some(selected) = self
            .server
            .find_matching_requirements(&ctx.accepts, &payload)
            .cloned()
        else {
            return self.payment_required_response(
                ctx,
                Some("payment does not match any advertised requirement".into()),
            );
        };

        // Idempotent replay: a byte-identical retry short-circuits before
        // any facilitator call; a differing payload with a known id must
        // verify to the same payer first.
        let payment_id = extract_payment_id(payload.extensions.as_ref()).map(str::to_owned);
        if payment_id.is_none() && identifier_required(ctx.extensions.as_ref()) {
            return self.payment_required_response(
                ctx,
                Some("payment-identifier is required on this route".into()),
            );
        }
        if let Some(id) = payment_id.as_deref()
            && let Some(cached) = self.replay.get(id)
        {
            if cached.header_value == header_value {
                tracing::debug!(id, "replaying cached response for identical retry");
                return replay_response(&cached);
            }
            match self.server.verify_payment(&payload, &selected).await {
                Ok(verdict) if verdict.is_valid => {
                    if verdict.payer.as_deref() == Some(cached.payer.as_str()) {
                        tracing::debug!(id, "replaying cached response for same payer");
                        return replay_response(&cached);
                    }
                    // A different payer reusing the id gets a fresh
                    // settlement below.
                }
                Ok(verdict) => {
                    let reason = verdict
                        .invalid_reason
                        .unwrap_or_else(|| "verification failed".into());
                    return self.payment_required_response(ctx, Some(reason));
                }
                Err(err) => {
                    return self.payment_required_response(ctx, Some(err.to_string()));
                }
            }
        }

        // Step: verify before the handler runs.
        let verdict = match self.server.verify_payment(&payload, &selected).await {
            Ok(verdict) => verdict,
            Err(err) => {
                return self.payment_required_response(ctx, Some(err.to_string()));
            }
        };
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "verification failed".into());
            return self.payment_required_response(ctx, Some(reason));
        }

        // Step: run the handler, buffering its entire output. Nothing is
        // flushed until settlement commits.
        let response = match self.inner.call(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let (mut parts, body) = response.into_parts();
        if parts.status.is_client_error() || parts.status.is_server_error() {
            // Handler refused; no charge, no receipt.
            return Response::from_parts(parts, body);
        }
        let buffered = match BodyExt::collect(http_body_util::Limited::new(
            body,
            MAX_BUFFERED_BODY,
        ))
        .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(_) => {
                return self.payment_required_response(
                    ctx,
                    Some("Settle failed: handler output exceeded buffer limit".into()),
                );
            }
        };

        // Step: settle; failure or abort discards the buffered body.
        let receipt = match self.server.settle_payment(&payload, &selected).await {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(error = %err, "settlement errored; suppressing handler output");
                return self
                    .payment_required_response(ctx, Some(format!("Settle failed: {err}")));
            }
        };
        if !receipt.success {
            let reason = receipt
                .error_reason
                .clone()
                .unwrap_or_else(|| "settlement failed".into());
            tracing::warn!(reason = %reason, "settlement failed; suppressing handler output");
            return self
                .payment_required_response(ctx, Some(format!("Settle failed: {reason}")));
        }

        // Step: settlement committed — attach the receipt and flush.
        let Ok(receipt_value) = headers::encode_payment_response(&receipt) else {
            return self
                .payment_required_response(ctx, Some("Settle failed: receipt encoding".into()));
        };
        if let Ok(value) = HeaderValue::from_str(&receipt_value) {
            parts.headers.insert(PAYMENT_RESPONSE_HEADER, value);
        }

        if let Some(id) = payment_id {
            self.cache_settled_response(
                &id,
                header_value,
                &receipt,
                parts.status,
                parts.headers.get(header::CONTENT_TYPE),
                &receipt_value,
                &buffered,
            );
        }

        Response::from_parts(parts, Body::from(buffered))
    }

    async fn handle_v1(
        mut self,
        req: Request,
        ctx: &GateContext,
        payload: PaymentPayloadV1,
    ) -> Response {
        let accepts_v1 = self.accepts_as_v1(ctx);
        let Some(selected) = accepts_v1
            .iter()
            .find(|r| r.scheme == payload.scheme && r.network == payload.network)
            .cloned()
        else {
            return self.payment_required_response(
                ctx,
                Some("payment does not match any advertised requirement".into()),
            );
        };

        let verdict = match self.server.verify_payment_v1(&payload, &selected).await {
            Ok(verdict) => verdict,
            Err(err) => {
                return self.payment_required_response(ctx, Some(err.to_string()));
            }
        };
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "verification failed".into());
            return self.payment_required_response(ctx, Some(reason));
        }

        let response = match self.inner.call(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let (mut parts, body) = response.into_parts();
        if parts.status.is_client_error() || parts.status.is_server_error() {
            return Response::from_parts(parts, body);
        }
        let buffered = match BodyExt::collect(http_body_util::Limited::new(
            body,
            MAX_BUFFERED_BODY,
        ))
        .await
        {
            Ok(collected) => collected.to_bytes(),
            Err(_) => {
                return self.payment_required_response(
                    ctx,
                    Some("Settle failed: handler output exceeded buffer limit".into()),
                );
            }
        };

        let receipt = match self.server.settle_payment_v1(&payload, &selected).await {
            Ok(receipt) => receipt,
            Err(err) => {
                return self
                    .payment_required_response(ctx, Some(format!("Settle failed: {err}")));
            }
        };
        if !receipt.success {
            let reason = receipt
                .error_reason
                .clone()
                .unwrap_or_else(|| "settlement failed".into());
            return self
                .payment_required_response(ctx, Some(format!("Settle failed: {reason}")));
        }

        if let Ok(value) = headers::encode_payment_response(&receipt)
            && let Ok(value) = HeaderValue::from_str(&value)
        {
            parts.headers.insert(X_PAYMENT_RESPONSE_HEADER, value);
        }

        Response::from_parts(parts, Body::from(buffered))
    }

    #[allow(clippy::too_many_arguments)]
    fn cache_settled_response(
        &self,
        id: &str,
        header_value: &str,
        receipt: &SettleResponse,
        status: StatusCode,
        content_type: Option<&HeaderValue>,
        receipt_value: &str,
        body: &[u8],
    ) {
        let Some(payer) = receipt.payer.clone() else {
            return;
        };
        self.replay.store(
            id,
            CachedResponse {
                header_value: header_value.to_owned(),
                payer,
                status,
                content_type: content_type
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned),
                receipt: receipt_value.to_owned(),
                body: body.to_vec(),
            },
        );
    }

    fn build_context(
        &self,
        route: &RouteConfig,
        req: &Request,
    ) -> Result<GateContext, String> {
        let mut accepts = Vec::with_capacity(route.accepts.len());
        for option in &route.accepts {
            let built = self
                .server
                .build_payment_requirements(option)
                .map_err(|e| e.to_string())?;
            accepts.extend(built);
        }

        let resource = self.resource_info(route, req);
        let extensions = route.extensions.as_ref().map(|declarations| {
            let transport_context = serde_json::json!({
                "url": resource.url,
                "method": req.method().as_str(),
            });
            self.server.enrich_extensions(declarations, &transport_context)
        });

        Ok(GateContext {
            accepts,
            resource,
            extensions,
            emit_version: route.x402_version,
        })
    }

    fn resource_info(&self, route: &RouteConfig, req: &Request) -> ResourceInfo {
        let mut url = self.base_url.as_deref().cloned().unwrap_or_else(|| {
            let host = req
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            Url::parse(&format!("http://{host}"))
                .unwrap_or_else(|_| Url::parse("http://localhost").expect("static URL"))
        });
        url.set_path(req.uri().path());
        url.set_query(req.uri().query());

        ResourceInfo {
            url: url.to_string(),
            description: (!route.description.is_empty()).then(|| route.description.clone()),
            mime_type: Some(route.mime_type.clone()),
        }
    }

    /// Builds the 402 response: V2 gets a JSON body plus the
    /// `PAYMENT-REQUIRED` header; V1 gets a body only.
    fn payment_required_response(&self, ctx: &GateContext, error: Option<String>) -> Response {
        if ctx.emit_version == 1 {
            let body = PaymentRequiredV1 {
                x402_version: 1,
                error,
                accepts: self.accepts_as_v1(ctx),
            };
            return json_response(StatusCode::PAYMENT_REQUIRED, &body, None);
        }

        let body = PaymentRequired {
            x402_version: 2,
            error,
            resource: Some(ctx.resource.clone()),
            accepts: ctx.accepts.clone(),
            extensions: ctx.extensions.clone(),
        };
        let mirror = headers::encode_payment_required(&body)
            .ok()
            .and_then(|v| HeaderValue::from_str(&v).ok());
        json_response(StatusCode::PAYMENT_REQUIRED, &body, mirror)
    }

    fn accepts_as_v1(&self, ctx: &GateContext) -> Vec<PaymentRequirementsV1> {
        ctx.accepts
            .iter()
            .map(|req| {
                let name = self
                    .registry
                    .name_by_caip2(&req.network)
                    .map_or_else(|| req.network.clone(), str::to_owned);
                PaymentRequirementsV1::from_v2(req, name, &ctx.resource)
            })
            .collect()
    }
}

/// Returns `true` when the route declares the payment-identifier extension
/// with `required: true`.
fn identifier_required(declarations: Option<&ExtensionMap>) -> bool {
    declarations
        .and_then(|map| map.get(tollbooth::extensions::payment_identifier::PAYMENT_IDENTIFIER))
        .and_then(|declaration| declaration.get("info"))
        .and_then(|info| info.get("required"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Re-materializes a cached settled response.
fn replay_response(cached: &CachedResponse) -> Response {
    let mut builder = http::Response::builder().status(cached.status);
    if let Some(content_type) = &cached.content_type
        && let Ok(value) = HeaderValue::from_str(content_type)
    {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&cached.receipt) {
        builder = builder.header(PAYMENT_RESPONSE_HEADER, value);
    }
    builder
        .body(Body::from(cached.body.clone()))
        .unwrap_or_else(|_| plain_402("replay failed"))
}

fn json_response<T: serde::Serialize>(
    status: StatusCode,
    body: &T,
    mirror_header: Option<HeaderValue>,
) -> Response {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut builder = http::Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(mirror) = mirror_header {
        builder = builder.header(PAYMENT_REQUIRED_HEADER, mirror);
    }
    builder
        .body(Body::from(bytes))
        .unwrap_or_else(|_| plain_402("response build failed"))
}

fn plain_402(reason: &str) -> Response {
    let mut response = Response::new(Body::from(format!("{{\"error\":\"{reason}\"}}")));
    *response.status_mut() = StatusCode::PAYMENT_REQUIRED;
    response
}
