//! Server-side payment engine.
//!
//! [`ResourceServer`] holds the registered scheme servers, facilitator
//! clients, server-side extensions, and verify/settle hooks. An HTTP
//! transport (see `tollbooth-http`) drives it: it builds the requirements
//! advertised in 402 responses, matches incoming payloads against them, and
//! delegates verification and settlement to a facilitator with the full hook
//! lifecycle.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::ResourceConfig;
use crate::error::{PaymentAbortedError, SchemeNotFoundError};
use crate::hooks::{
    PayloadView, RecoveredSettleResult, RecoveredVerifyResult, RequirementsView, SettleContext,
    SettleFailureContext, SettleResultContext, VerifyContext, VerifyFailureContext,
    VerifyResultContext,
};
use crate::hooks::AbortResult;
use crate::proto::helpers::find_by_network;
use crate::proto::v1::{PaymentPayloadV1, PaymentRequirementsV1};
use crate::proto::{
    ExtensionMap, Network, PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo,
    SettleResponse, SupportedKind, SupportedResponse, VerifyResponse,
};
use crate::scheme::{AssetAmount, BoxFuture, SchemeError, SchemeServer};

/// Facilitator interface consumed by resource servers.
///
/// Implementations either call a remote facilitator over HTTP or dispatch to
/// in-process scheme facilitators. All methods are async because the primary
/// implementation performs network I/O.
pub trait FacilitatorClient: Send + Sync {
    /// Verifies a V2 payment.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>>;

    /// Settles a V2 payment.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>>;

    /// Verifies a V1 (legacy) payment.
    fn verify_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>>;

    /// Settles a V1 (legacy) payment.
    fn settle_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>>;

    /// Returns the payment kinds the facilitator supports.
    ///
    /// Called during [`ResourceServer::initialize`] to discover which
    /// `(scheme, network)` pairs each facilitator can handle.
    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>>;
}

/// Hook called before verification. Return `Some(AbortResult)` to abort.
pub type BeforeVerifyHook =
    Box<dyn Fn(&VerifyContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Hook called after successful verification.
pub type AfterVerifyHook = Box<dyn Fn(&VerifyResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Hook called on verification failure. May recover with a substitute verdict.
pub type OnVerifyFailureHook = Box<
    dyn Fn(&VerifyFailureContext) -> BoxFuture<'_, Option<RecoveredVerifyResult>> + Send + Sync,
>;

/// Hook called before settlement. Return `Some(AbortResult)` to abort.
pub type BeforeSettleHook =
    Box<dyn Fn(&SettleContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Hook called after successful settlement.
pub type AfterSettleHook = Box<dyn Fn(&SettleResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Hook called on settlement failure. May recover with a substitute receipt.
pub type OnSettleFailureHook = Box<
    dyn Fn(&SettleFailureContext) -> BoxFuture<'_, Option<RecoveredSettleResult>> + Send + Sync,
>;

/// Server-side protocol extension.
///
/// An extension declares itself in 402 responses and may enrich its
/// declaration with per-request transport data (URL, method, declared
/// input shapes) just before the response is built.
pub trait ResourceServerExtension: Send + Sync {
    /// Unique extension key (e.g., `"bazaar"`).
    fn key(&self) -> &str;

    /// Enriches an extension declaration with transport-specific data.
    ///
    /// `declaration` is the object from the route configuration;
    /// `transport_context` carries opaque request metadata supplied by the
    /// transport layer.
    fn enrich_declaration(&self, declaration: Value, transport_context: &Value) -> Value;
}

/// Server-side payment engine: scheme registration, facilitator delegation,
/// requirement building, and the verify/settle hook lifecycle.
pub struct ResourceServer {
    facilitator_clients: Vec<Box<dyn FacilitatorClient>>,
    schemes: HashMap<Network, HashMap<String, Box<dyn SchemeServer>>>,
    facilitator_map: HashMap<Network, HashMap<String, usize>>,
    supported_responses: HashMap<Network, HashMap<String, SupportedResponse>>,
    extensions: HashMap<String, Box<dyn ResourceServerExtension>>,
    before_verify_hooks: Vec<BeforeVerifyHook>,
    after_verify_hooks: Vec<AfterVerifyHook>,
    on_verify_failure_hooks: Vec<OnVerifyFailureHook>,
    before_settle_hooks: Vec<BeforeSettleHook>,
    after_settle_hooks: Vec<AfterSettleHook>,
    on_settle_failure_hooks: Vec<OnSettleFailureHook>,
    initialized: bool,
}

impl std::fmt::Debug for ResourceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceServer")
            .field("facilitators", &self.facilitator_clients.len())
            .field("networks", &self.schemes.keys().collect::<Vec<_>>())
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Default for ResourceServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceServer {
    /// Creates a new resource server with no facilitator clients.
    #[must_use]
    pub fn new() -> Self {
        Self {
            facilitator_clients: Vec::new(),
            schemes: HashMap::new(),
            facilitator_map: HashMap::new(),
            supported_responses: HashMap::new(),
            extensions: HashMap::new(),
            before_verify_hooks: Vec::new(),
            after_verify_hooks: Vec::new(),
            on_verify_failure_hooks: Vec::new(),
            before_settle_hooks: Vec::new(),
            after_settle_hooks: Vec::new(),
            on_settle_failure_hooks: Vec::new(),
            initialized: false,
        }
    }

    /// Creates a new resource server with one facilitator client.
    #[must_use]
    pub fn with_facilitator(client: Box<dyn FacilitatorClient>) -> Self {
        let mut server = Self::new();
        server.facilitator_clients.push(client);
        server
    }

    /// Adds a facilitator client.
    pub fn add_facilitator(&mut self, client: Box<dyn FacilitatorClient>) -> &mut Self {
        self.facilitator_clients.push(client);
        self
    }

    /// Registers a scheme server for a network (or `ns:*` pattern).
    pub fn register(&mut self, network: Network, server: Box<dyn SchemeServer>) -> &mut Self {
        let scheme = server.scheme().to_owned();
        self.schemes
            .entry(network)
            .or_default()
            .insert(scheme, server);
        self
    }

    /// Checks whether a scheme is registered for a network, honoring
    /// namespace wildcards.
    #[must_use]
    pub fn has_registered_scheme(&self, network: &str, scheme: &str) -> bool {
        find_by_network(&self.schemes, network).is_some_and(|s| s.contains_key(scheme))
    }

    /// Registers a before-verify hook.
    pub fn on_before_verify(&mut self, hook: BeforeVerifyHook) -> &mut Self {
        self.before_verify_hooks.push(hook);
        self
    }

    /// Registers an after-verify hook.
    pub fn on_after_verify(&mut self, hook: AfterVerifyHook) -> &mut Self {
        self.after_verify_hooks.push(hook);
        self
    }

    /// Registers a verify-failure hook.
    pub fn on_verify_failure(&mut self, hook: OnVerifyFailureHook) -> &mut Self {
        self.on_verify_failure_hooks.push(hook);
        self
    }

    /// Registers a before-settle hook.
    pub fn on_before_settle(&mut self, hook: BeforeSettleHook) -> &mut Self {
        self.before_settle_hooks.push(hook);
        self
    }

    /// Registers an after-settle hook.
    pub fn on_after_settle(&mut self, hook: AfterSettleHook) -> &mut Self {
        self.after_settle_hooks.push(hook);
        self
    }

    /// Registers a settle-failure hook.
    pub fn on_settle_failure(&mut self, hook: OnSettleFailureHook) -> &mut Self {
        self.on_settle_failure_hooks.push(hook);
        self
    }

    /// Registers a [`ResourceServerExtension`].
    pub fn register_extension(&mut self, ext: Box<dyn ResourceServerExtension>) -> &mut Self {
        self.extensions.insert(ext.key().to_owned(), ext);
        self
    }

    /// Enriches extension declarations using the registered extensions.
    ///
    /// Keys with no registered extension pass through unchanged.
    #[must_use]
    pub fn enrich_extensions(
        &self,
        declarations: &ExtensionMap,
        transport_context: &Value,
    ) -> ExtensionMap {
        let mut result = declarations.clone();
        for (key, value) in declarations {
            if let Some(ext) = self.extensions.get(key) {
                result.insert(
                    key.clone(),
                    ext.enrich_declaration(value.clone(), transport_context),
                );
            }
        }
        result
    }

    /// Initializes the server by fetching supported kinds from all
    /// registered facilitator clients.
    ///
    /// Must be called before [`Self::verify_payment`] /
    /// [`Self::settle_payment`] / [`Self::build_payment_requirements`].
    ///
    /// # Errors
    ///
    /// Returns an error if any facilitator client fails to respond.
    pub async fn initialize(&mut self) -> Result<(), SchemeError> {
        for (idx, client) in self.facilitator_clients.iter().enumerate() {
            let supported = client.get_supported().await?;

            for kind in &supported.kinds {
                self.facilitator_map
                    .entry(kind.network.clone())
                    .or_default()
                    .entry(kind.scheme.clone())
                    .or_insert(idx);

                self.supported_responses
                    .entry(kind.network.clone())
                    .or_default()
                    .entry(kind.scheme.clone())
                    .or_insert_with(|| supported.clone());
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Returns whether the server has been initialized.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Builds the payment requirements advertised for a protected resource.
    ///
    /// Parses the configured price through the scheme server and applies
    /// scheme enhancement against the facilitator's supported kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, the scheme is not
    /// registered, or price parsing fails.
    pub fn build_payment_requirements(
        &self,
        config: &ResourceConfig,
    ) -> Result<Vec<PaymentRequirements>, SchemeError> {
        if !self.initialized {
            return Err("resource server not initialized; call initialize() first".into());
        }

        let schemes = find_by_network(&self.schemes, &config.network)
            .ok_or_else(|| SchemeNotFoundError::new(&config.scheme, &config.network))?;

        let server = schemes
            .get(&config.scheme)
            .ok_or_else(|| SchemeNotFoundError::new(&config.scheme, &config.network))?;

        let supported = find_by_network(&self.supported_responses, &config.network)
            .and_then(|m| m.get(&config.scheme))
            .ok_or_else(|| SchemeNotFoundError::new(&config.scheme, &config.network))?;

        let supported_kind = supported
            .kinds
            .iter()
            .find(|k| {
                k.scheme == config.scheme
                    && crate::proto::helpers::matches_network_pattern(&config.network, &k.network)
            })
            .ok_or_else(|| SchemeNotFoundError::new(&config.scheme, &config.network))?;

        let AssetAmount {
            amount,
            asset,
            extra,
        } = server.parse_price(&config.price, &config.network)?;

        let base = PaymentRequirements {
            scheme: config.scheme.clone(),
            network: config.network.clone(),
            asset,
            amount,
            pay_to: config.pay_to.clone(),
            max_timeout_seconds: config.max_timeout_seconds.unwrap_or(300),
            extra,
        };

        let enhanced =
            server.enhance_payment_requirements(base, supported_kind, &supported.extensions);
        enhanced.validate()?;

        Ok(vec![enhanced])
    }

    /// Assembles a 402 Payment Required body from built requirements.
    #[must_use]
    pub const fn create_payment_required(
        &self,
        requirements: Vec<PaymentRequirements>,
        resource: Option<ResourceInfo>,
        error: Option<String>,
        extensions: Option<ExtensionMap>,
    ) -> PaymentRequired {
        PaymentRequired {
            x402_version: 2,
            error,
            resource,
            accepts: requirements,
            extensions,
        }
    }

    /// Finds the advertised requirement a payload's `accepted` matches.
    ///
    /// Compares the five protocol-critical fields (scheme, network, amount,
    /// asset, `payTo`); `maxTimeoutSeconds` and `extra` are ignored so
    /// facilitator enrichment never causes false-negative rejections.
    #[must_use]
    pub fn find_matching_requirements<'a>(
        &self,
        available: &'a [PaymentRequirements],
        payload: &PaymentPayload,
    ) -> Option<&'a PaymentRequirements> {
        available.iter().find(|req| {
            payload.accepted.scheme == req.scheme
                && payload.accepted.network == req.network
                && payload.accepted.amount == req.amount
                && payload.accepted.asset == req.asset
                && payload.accepted.pay_to == req.pay_to
        })
    }

    /// Verifies a V2 payment via the matching facilitator client, running
    /// the full hook lifecycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, no facilitator is
    /// registered for the payload's scheme/network, or a before hook aborts.
    pub async fn verify_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, SchemeError> {
        if !self.initialized {
            return Err("resource server not initialized; call initialize() first".into());
        }

        let ctx = VerifyContext {
            payment_payload: PayloadView::V2(Box::new(payload.clone())),
            requirements: RequirementsView::V2(requirements.clone()),
        };

        for hook in &self.before_verify_hooks {
            if let Some(abort) = hook(&ctx).await {
                tracing::info!(reason = %abort.reason, "verification aborted by hook");
                return Err(Box::new(PaymentAbortedError::new(abort.reason)));
            }
        }

        let client = self.find_facilitator_client(payload.scheme(), payload.network())?;
        let result = client.verify(payload, requirements).await;

        match result {
            Ok(ref response) if response.is_valid => {
                let result_ctx = VerifyResultContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    result: response.clone(),
                };
                for hook in &self.after_verify_hooks {
                    hook(&result_ctx).await;
                }
                result
            }
            Ok(ref response) => {
                let failure_ctx = VerifyFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: response.invalid_reason.clone().unwrap_or_default(),
                };
                for hook in &self.on_verify_failure_hooks {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        tracing::debug!("verification failure recovered by hook");
                        return Ok(recovered.result);
                    }
                }
                result
            }
            Err(e) => {
                let failure_ctx = VerifyFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: e.to_string(),
                };
                for hook in &self.on_verify_failure_hooks {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        return Ok(recovered.result);
                    }
                }
                Err(e)
            }
        }
    }

    /// Settles a V2 payment via the matching facilitator client, running
    /// the full hook lifecycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, no facilitator is
    /// registered for the payload's scheme/network, or a before hook aborts.
    pub async fn settle_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, SchemeError> {
        if !self.initialized {
            return Err("resource server not initialized; call initialize() first".into());
        }

        let ctx = SettleContext {
            payment_payload: PayloadView::V2(Box::new(payload.clone())),
            requirements: RequirementsView::V2(requirements.clone()),
        };

        for hook in &self.before_settle_hooks {
            if let Some(abort) = hook(&ctx).await {
                tracing::info!(reason = %abort.reason, "settlement aborted by hook");
                return Err(Box::new(PaymentAbortedError::new(abort.reason)));
            }
        }

        let client = self.find_facilitator_client(payload.scheme(), payload.network())?;
        let result = client.settle(payload, requirements).await;

        match result {
            Ok(ref response) if response.success => {
                let result_ctx = SettleResultContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    result: response.clone(),
                };
                for hook in &self.after_settle_hooks {
                    hook(&result_ctx).await;
                }
                result
            }
            Ok(ref response) => {
                let failure_ctx = SettleFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: response.error_reason.clone().unwrap_or_default(),
                };
                for hook in &self.on_settle_failure_hooks {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        tracing::debug!("settlement failure recovered by hook");
                        return Ok(recovered.result);
                    }
                }
                result
            }
            Err(e) => {
                let failure_ctx = SettleFailureContext {
                    payment_payload: ctx.payment_payload,
                    requirements: ctx.requirements,
                    error: e.to_string(),
                };
                for hook in &self.on_settle_failure_hooks {
                    if let Some(recovered) = hook(&failure_ctx).await {
                        return Ok(recovered.result);
                    }
                }
                Err(e)
            }
        }
    }

    /// Verifies a V1 (legacy) payment through the facilitator without the
    /// V2 hook contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if no facilitator is registered for the payload's
    /// scheme/network.
    pub async fn verify_payment_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<VerifyResponse, SchemeError> {
        let client = self.find_facilitator_client(payload.scheme(), payload.network())?;
        client.verify_v1(payload, requirements).await
    }

    /// Settles a V1 (legacy) payment through the facilitator.
    ///
    /// # Errors
    ///
    /// Returns an error if no facilitator is registered for the payload's
    /// scheme/network.
    pub async fn settle_payment_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<SettleResponse, SchemeError> {
        let client = self.find_facilitator_client(payload.scheme(), payload.network())?;
        client.settle_v1(payload, requirements).await
    }

    /// Finds the facilitator client for a scheme/network pair, honoring
    /// namespace wildcards.
    fn find_facilitator_client(
        &self,
        scheme: &str,
        network: &str,
    ) -> Result<&dyn FacilitatorClient, SchemeError> {
        let idx = find_by_network(&self.facilitator_map, network)
            .and_then(|m| m.get(scheme))
            .copied()
            .ok_or_else(|| SchemeNotFoundError::new(scheme, network))?;

        self.facilitator_clients
            .get(idx)
            .map(AsRef::as_ref)
            .ok_or_else(|| {
                let err: SchemeError = Box::new(SchemeNotFoundError::new(scheme, network));
                err
            })
    }
}
