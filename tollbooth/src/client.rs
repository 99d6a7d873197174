//! Client-side payment engine.
//!
//! [`PaymentClient`] holds the registered scheme clients, selection policies,
//! and payment-creation hooks. An HTTP transport (see `tollbooth-http`)
//! drives it: on a 402 response it asks the engine to select a mutually
//! supported requirement and produce a signed [`PaymentPayload`].
//!
//! Selection preserves the server's preference order. Policies filter the
//! candidate list in registration order; the selector then picks one entry
//! (first, by default).

use std::collections::HashMap;

use crate::error::{NoMatchingRequirementsError, PaymentAbortedError, PaymentError,
    SchemeNotFoundError};
use crate::hooks::{
    AbortResult, PayloadView, PaymentCreatedContext, PaymentCreationContext,
    PaymentCreationFailureContext, PaymentRequiredView, RecoveredPayloadResult, RequirementsView,
};
use crate::proto::helpers::find_by_network;
use crate::proto::v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
use crate::proto::{Network, PaymentPayload, PaymentRequired, PaymentRequirements};
use crate::scheme::{BoxFuture, SchemeClient, SchemeClientV1};

/// Policy function that filters and reorders requirement candidates.
///
/// Receives the protocol version and the current candidate list; returns the
/// filtered list. Policies run in registration order, before the selector.
pub type PaymentPolicy =
    Box<dyn Fn(u32, Vec<RequirementsView>) -> Vec<RequirementsView> + Send + Sync>;

/// Selector function that picks the final requirement from a filtered list.
pub type RequirementsSelector = Box<dyn Fn(u32, &[RequirementsView]) -> usize + Send + Sync>;

/// Hook run before payment creation; may mutate the pending extensions and
/// may abort.
pub type BeforePaymentHook = Box<
    dyn for<'a> Fn(&'a mut PaymentCreationContext) -> BoxFuture<'a, Option<AbortResult>>
        + Send
        + Sync,
>;

/// Hook run after successful payment creation.
pub type AfterPaymentHook =
    Box<dyn for<'a> Fn(&'a PaymentCreatedContext) -> BoxFuture<'a, ()> + Send + Sync>;

/// Hook run when payment creation fails; may recover with a replacement
/// payload.
pub type OnPaymentFailureHook = Box<
    dyn for<'a> Fn(&'a PaymentCreationFailureContext)
            -> BoxFuture<'a, Option<RecoveredPayloadResult>>
        + Send
        + Sync,
>;

/// Creates a policy that prefers a specific network.
///
/// Matching requirements are moved to the front; nothing is dropped.
#[must_use]
pub fn prefer_network(network: Network) -> PaymentPolicy {
    Box::new(move |_version, reqs| {
        let (mut preferred, others): (Vec<_>, Vec<_>) =
            reqs.into_iter().partition(|r| r.network() == network);
        preferred.extend(others);
        preferred
    })
}

/// Creates a policy that prefers a specific scheme.
#[must_use]
pub fn prefer_scheme(scheme: String) -> PaymentPolicy {
    Box::new(move |_version, reqs| {
        let (mut preferred, others): (Vec<_>, Vec<_>) =
            reqs.into_iter().partition(|r| r.scheme() == scheme);
        preferred.extend(others);
        preferred
    })
}

/// Creates a policy that drops requirements above a maximum atomic amount.
#[must_use]
pub fn max_amount(max_value: u128) -> PaymentPolicy {
    Box::new(move |_version, reqs| {
        reqs.into_iter()
            .filter(|r| r.amount().parse::<u128>().is_ok_and(|a| a <= max_value))
            .collect()
    })
}

/// Default selector: the first candidate in server preference order.
const fn default_selector(_version: u32, _reqs: &[RequirementsView]) -> usize {
    0
}

/// Client-side payment engine with scheme registration, policy filtering,
/// selection, and the payment-creation hook lifecycle.
pub struct PaymentClient {
    schemes_v2: HashMap<Network, HashMap<String, Box<dyn SchemeClient>>>,
    schemes_v1: HashMap<Network, HashMap<String, Box<dyn SchemeClientV1>>>,
    policies: Vec<PaymentPolicy>,
    selector: RequirementsSelector,
    before_payment_hooks: Vec<BeforePaymentHook>,
    after_payment_hooks: Vec<AfterPaymentHook>,
    on_payment_failure_hooks: Vec<OnPaymentFailureHook>,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("networks_v2", &self.schemes_v2.keys().collect::<Vec<_>>())
            .field("networks_v1", &self.schemes_v1.keys().collect::<Vec<_>>())
            .field("policies", &self.policies.len())
            .field("before_hooks", &self.before_payment_hooks.len())
            .finish_non_exhaustive()
    }
}

impl Default for PaymentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentClient {
    /// Creates a new client with the default first-match selector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemes_v2: HashMap::new(),
            schemes_v1: HashMap::new(),
            policies: Vec::new(),
            selector: Box::new(default_selector),
            before_payment_hooks: Vec::new(),
            after_payment_hooks: Vec::new(),
            on_payment_failure_hooks: Vec::new(),
        }
    }

    /// Creates a new client with a custom selector.
    #[must_use]
    pub fn with_selector(selector: RequirementsSelector) -> Self {
        let mut client = Self::new();
        client.selector = selector;
        client
    }

    /// Registers a V2 scheme client for a network (or `ns:*` pattern).
    pub fn register(&mut self, network: Network, client: Box<dyn SchemeClient>) -> &mut Self {
        let scheme = client.scheme().to_owned();
        self.schemes_v2
            .entry(network)
            .or_default()
            .insert(scheme, client);
        self
    }

    /// Registers a V1 scheme client for a network name.
    pub fn register_v1(&mut self, network: Network, client: Box<dyn SchemeClientV1>) -> &mut Self {
        let scheme = client.scheme().to_owned();
        self.schemes_v1
            .entry(network)
            .or_default()
            .insert(scheme, client);
        self
    }

    /// Adds a requirement filter policy.
    pub fn register_policy(&mut self, policy: PaymentPolicy) -> &mut Self {
        self.policies.push(policy);
        self
    }

    /// Registers a before-payment-creation hook.
    pub fn on_before_payment_creation(&mut self, hook: BeforePaymentHook) -> &mut Self {
        self.before_payment_hooks.push(hook);
        self
    }

    /// Registers an after-payment-creation hook.
    pub fn on_after_payment_creation(&mut self, hook: AfterPaymentHook) -> &mut Self {
        self.after_payment_hooks.push(hook);
        self
    }

    /// Registers a payment-creation-failure hook.
    pub fn on_payment_creation_failure(&mut self, hook: OnPaymentFailureHook) -> &mut Self {
        self.on_payment_failure_hooks.push(hook);
        self
    }

    /// Selects from V2 requirements using registered schemes, policies, and
    /// the selector.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatchingRequirementsError`] when the intersection of the
    /// server's offers and the registered schemes is empty, or when policies
    /// filter everything out.
    pub fn select_requirements_v2(
        &self,
        requirements: &[PaymentRequirements],
    ) -> Result<PaymentRequirements, NoMatchingRequirementsError> {
        let supported: Vec<RequirementsView> = requirements
            .iter()
            .filter(|req| {
                find_by_network(&self.schemes_v2, &req.network)
                    .is_some_and(|schemes| schemes.contains_key(&req.scheme))
            })
            .cloned()
            .map(RequirementsView::V2)
            .collect();

        let selected = self.run_selection(2, supported)?;
        match selected {
            RequirementsView::V2(r) => Ok(r),
            RequirementsView::V1(_) => Err(NoMatchingRequirementsError::new(
                "selector returned a V1 candidate for a V2 selection",
            )),
        }
    }

    /// Selects from V1 requirements using registered schemes, policies, and
    /// the selector.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatchingRequirementsError`] when nothing matches.
    pub fn select_requirements_v1(
        &self,
        requirements: &[PaymentRequirementsV1],
    ) -> Result<PaymentRequirementsV1, NoMatchingRequirementsError> {
        let supported: Vec<RequirementsView> = requirements
            .iter()
            .filter(|req| {
                find_by_network(&self.schemes_v1, &req.network)
                    .is_some_and(|schemes| schemes.contains_key(&req.scheme))
            })
            .cloned()
            .map(RequirementsView::V1)
            .collect();

        let selected = self.run_selection(1, supported)?;
        match selected {
            RequirementsView::V1(r) => Ok(r),
            RequirementsView::V2(_) => Err(NoMatchingRequirementsError::new(
                "selector returned a V2 candidate for a V1 selection",
            )),
        }
    }

    fn run_selection(
        &self,
        version: u32,
        supported: Vec<RequirementsView>,
    ) -> Result<RequirementsView, NoMatchingRequirementsError> {
        if supported.is_empty() {
            return Err(NoMatchingRequirementsError::new(
                "no payment requirements match registered schemes",
            ));
        }

        let mut filtered = supported;
        for policy in &self.policies {
            filtered = policy(version, filtered);
            if filtered.is_empty() {
                return Err(NoMatchingRequirementsError::new(
                    "all requirements filtered out by policies",
                ));
            }
        }

        let idx = (self.selector)(version, &filtered);
        filtered
            .into_iter()
            .nth(idx)
            .ok_or_else(|| NoMatchingRequirementsError::new("selector returned invalid index"))
    }

    /// Creates a signed V2 payment payload for a 402 response.
    ///
    /// Runs the full lifecycle: selection, before hooks (which may mutate
    /// the outgoing `extensions` or abort), scheme signing, failure hooks
    /// (which may recover), and after hooks.
    ///
    /// Selection failures short-circuit before any hook runs.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NoMatchingRequirements`] when nothing matches,
    /// [`PaymentError::Aborted`] when a before hook aborts, or
    /// [`PaymentError::Scheme`] when signing fails without recovery.
    pub async fn create_payment_payload_v2(
        &self,
        payment_required: &PaymentRequired,
    ) -> Result<PaymentPayload, PaymentError> {
        let selected = self.select_requirements_v2(&payment_required.accepts)?;

        let mut ctx = PaymentCreationContext {
            payment_required: PaymentRequiredView::V2(payment_required.clone()),
            selected_requirements: RequirementsView::V2(selected.clone()),
            extensions: payment_required.extensions.clone(),
        };

        for hook in &self.before_payment_hooks {
            if let Some(abort) = hook(&mut ctx).await {
                return Err(PaymentAbortedError::new(abort.reason).into());
            }
        }

        let schemes = find_by_network(&self.schemes_v2, &selected.network)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;
        let scheme_client = schemes
            .get(&selected.scheme)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;

        let payload = match scheme_client.create_payment_payload(&selected).await {
            Ok(inner) => PaymentPayload {
                x402_version: 2,
                accepted: selected,
                payload: inner,
                resource: payment_required.resource.clone(),
                extensions: ctx.extensions.clone(),
            },
            Err(err) => {
                let failure_ctx = PaymentCreationFailureContext {
                    payment_required: ctx.payment_required.clone(),
                    selected_requirements: ctx.selected_requirements.clone(),
                    error: err.to_string(),
                };
                let mut recovered = None;
                for hook in &self.on_payment_failure_hooks {
                    if let Some(RecoveredPayloadResult::V2(payload)) = hook(&failure_ctx).await {
                        recovered = Some(*payload);
                        break;
                    }
                }
                recovered.ok_or(PaymentError::Scheme(err))?
            }
        };

        let created_ctx = PaymentCreatedContext {
            payment_required: ctx.payment_required,
            selected_requirements: ctx.selected_requirements,
            payment_payload: PayloadView::V2(Box::new(payload.clone())),
        };
        for hook in &self.after_payment_hooks {
            hook(&created_ctx).await;
        }

        Ok(payload)
    }

    /// Creates a signed V1 payment payload for a legacy 402 response.
    ///
    /// Same lifecycle as [`Self::create_payment_payload_v2`] over the V1
    /// types.
    ///
    /// # Errors
    ///
    /// See [`Self::create_payment_payload_v2`].
    pub async fn create_payment_payload_v1(
        &self,
        payment_required: &PaymentRequiredV1,
    ) -> Result<PaymentPayloadV1, PaymentError> {
        let selected = self.select_requirements_v1(&payment_required.accepts)?;

        let mut ctx = PaymentCreationContext {
            payment_required: PaymentRequiredView::V1(payment_required.clone()),
            selected_requirements: RequirementsView::V1(selected.clone()),
            extensions: None,
        };

        for hook in &self.before_payment_hooks {
            if let Some(abort) = hook(&mut ctx).await {
                return Err(PaymentAbortedError::new(abort.reason).into());
            }
        }

        let schemes = find_by_network(&self.schemes_v1, &selected.network)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;
        let scheme_client = schemes
            .get(&selected.scheme)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;

        let payload = match scheme_client.create_payment_payload(&selected).await {
            Ok(inner) => PaymentPayloadV1 {
                x402_version: 1,
                scheme: selected.scheme,
                network: selected.network,
                payload: inner,
            },
            Err(err) => {
                let failure_ctx = PaymentCreationFailureContext {
                    payment_required: ctx.payment_required.clone(),
                    selected_requirements: ctx.selected_requirements.clone(),
                    error: err.to_string(),
                };
                let mut recovered = None;
                for hook in &self.on_payment_failure_hooks {
                    if let Some(RecoveredPayloadResult::V1(payload)) = hook(&failure_ctx).await {
                        recovered = Some(payload);
                        break;
                    }
                }
                recovered.ok_or(PaymentError::Scheme(err))?
            }
        };

        let created_ctx = PaymentCreatedContext {
            payment_required: ctx.payment_required,
            selected_requirements: ctx.selected_requirements,
            payment_payload: PayloadView::V1(payload.clone()),
        };
        for hook in &self.after_payment_hooks {
            hook(&created_ctx).await;
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{SchemeClient, SchemeError};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubScheme {
        fail: bool,
    }

    impl SchemeClient for StubScheme {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn create_payment_payload<'a>(
            &'a self,
            _requirements: &'a PaymentRequirements,
        ) -> crate::scheme::BoxFuture<'a, Result<Value, SchemeError>> {
            Box::pin(async move {
                if self.fail {
                    Err("signer unavailable".into())
                } else {
                    Ok(json!({"signature": "0xstub"}))
                }
            })
        }
    }

    fn requirements(network: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: network.into(),
            amount: "1000".into(),
            pay_to: "0xpay".into(),
            max_timeout_seconds: 300,
            asset: "0xasset".into(),
            extra: None,
        }
    }

    fn payment_required(networks: &[&str]) -> PaymentRequired {
        PaymentRequired {
            x402_version: 2,
            error: None,
            resource: None,
            accepts: networks.iter().map(|n| requirements(n)).collect(),
            extensions: None,
        }
    }

    #[tokio::test]
    async fn selects_in_server_order() {
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: false }));

        let required = payment_required(&["eip155:1", "eip155:8453"]);
        let payload = client.create_payment_payload_v2(&required).await.unwrap();
        assert_eq!(payload.accepted.network, "eip155:1");
        assert_eq!(payload.x402_version, 2);
    }

    #[tokio::test]
    async fn empty_intersection_skips_hooks() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_hook = Arc::clone(&fired);

        let mut client = PaymentClient::new();
        client.register("solana:*".into(), Box::new(StubScheme { fail: false }));
        client.on_before_payment_creation(Box::new(move |_ctx| {
            let fired = Arc::clone(&fired_in_hook);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
                None
            })
        }));

        let required = payment_required(&["eip155:1"]);
        let err = client
            .create_payment_payload_v2(&required)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NoMatchingRequirements(_)));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abort_hook_short_circuits_scheme() {
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: false }));
        client.on_before_payment_creation(Box::new(|_ctx| {
            Box::pin(async { Some(AbortResult::new("policy denies")) })
        }));

        let err = client
            .create_payment_payload_v2(&payment_required(&["eip155:1"]))
            .await
            .unwrap_err();
        match err {
            PaymentError::Aborted(e) => assert_eq!(e.reason, "policy denies"),
            other => panic!("expected abort, got {other}"),
        }
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: false }));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            client.on_before_payment_creation(Box::new(move |_ctx| {
                let order = Arc::clone(&order);
                Box::pin(async move {
                    order.lock().unwrap().push(tag);
                    None
                })
            }));
        }

        client
            .create_payment_payload_v2(&payment_required(&["eip155:1"]))
            .await
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn failure_hook_recovers() {
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: true }));
        client.on_payment_creation_failure(Box::new(|ctx| {
            assert!(ctx.error.contains("signer unavailable"));
            Box::pin(async {
                let payload = PaymentPayload {
                    x402_version: 2,
                    accepted: requirements("eip155:1"),
                    payload: json!({"signature": "0xrecovered"}),
                    resource: None,
                    extensions: None,
                };
                Some(RecoveredPayloadResult::V2(Box::new(payload)))
            })
        }));

        let payload = client
            .create_payment_payload_v2(&payment_required(&["eip155:1"]))
            .await
            .unwrap();
        assert_eq!(payload.payload["signature"], "0xrecovered");
    }

    #[tokio::test]
    async fn before_hook_mutations_reach_payload_extensions() {
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: false }));
        client.on_before_payment_creation(Box::new(|ctx| {
            Box::pin(async move {
                ctx.extensions
                    .get_or_insert_with(Default::default)
                    .insert("marker".into(), json!({"set": true}));
                None
            })
        }));

        let payload = client
            .create_payment_payload_v2(&payment_required(&["eip155:1"]))
            .await
            .unwrap();
        let extensions = payload.extensions.unwrap();
        assert_eq!(extensions["marker"]["set"], true);
    }

    #[tokio::test]
    async fn policies_filter_before_selection() {
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: false }));
        client.register_policy(prefer_network("eip155:8453".into()));

        let required = payment_required(&["eip155:1", "eip155:8453"]);
        let payload = client.create_payment_payload_v2(&required).await.unwrap();
        assert_eq!(payload.accepted.network, "eip155:8453");
    }

    #[tokio::test]
    async fn max_amount_policy_can_empty_the_list() {
        let mut client = PaymentClient::new();
        client.register("eip155:*".into(), Box::new(StubScheme { fail: false }));
        client.register_policy(max_amount(10));

        let err = client
            .create_payment_payload_v2(&payment_required(&["eip155:1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NoMatchingRequirements(_)));
    }
}
