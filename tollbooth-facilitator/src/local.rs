//! Scheme routing for the facilitator.
//!
//! [`LocalFacilitator`] maps `(scheme, network)` to registered
//! [`SchemeFacilitator`] instances, with `ns:*` wildcard fallback. It also
//! implements the engine's [`FacilitatorClient`] trait, so a resource
//! server can embed it directly instead of calling a remote facilitator.

use std::collections::HashMap;
use std::sync::Arc;

use tollbooth::proto::helpers::matches_network_pattern;
use tollbooth::proto::v1::{PaymentPayloadV1, PaymentRequirementsV1};
use tollbooth::proto::{
    PaymentPayload, PaymentRequirements, SettleResponse, SupportedKind, SupportedResponse,
    VerifyResponse,
};
use tollbooth::scheme::{BoxFuture, SchemeError, SchemeFacilitator, SchemeFacilitatorV1};
use tollbooth::server::FacilitatorClient;

/// Routes payments to registered scheme facilitators.
#[derive(Default)]
pub struct LocalFacilitator {
    /// (networks or patterns, handler) in registration order.
    v2: Vec<(Vec<String>, Arc<dyn SchemeFacilitator>)>,
    v1: Vec<(Vec<String>, Arc<dyn SchemeFacilitatorV1>)>,
}

impl std::fmt::Debug for LocalFacilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let networks: Vec<&String> = self.v2.iter().flat_map(|(n, _)| n).collect();
        f.debug_struct("LocalFacilitator")
            .field("v2_networks", &networks)
            .field("v1_handlers", &self.v1.len())
            .finish()
    }
}

impl LocalFacilitator {
    /// Creates an empty facilitator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a V2 scheme facilitator for a set of networks.
    ///
    /// Network entries may be exact CAIP-2 ids or `ns:*` patterns.
    pub fn register(
        &mut self,
        networks: Vec<String>,
        facilitator: Arc<dyn SchemeFacilitator>,
    ) -> &mut Self {
        self.v2.push((networks, facilitator));
        self
    }

    /// Registers a V1 (legacy) scheme facilitator for a set of networks.
    pub fn register_v1(
        &mut self,
        networks: Vec<String>,
        facilitator: Arc<dyn SchemeFacilitatorV1>,
    ) -> &mut Self {
        self.v1.push((networks, facilitator));
        self
    }

    fn find(&self, scheme: &str, network: &str) -> Option<&Arc<dyn SchemeFacilitator>> {
        self.v2
            .iter()
            .find(|(networks, handler)| {
                handler.scheme() == scheme
                    && networks.iter().any(|n| matches_network_pattern(network, n))
            })
            .map(|(_, handler)| handler)
    }

    fn find_v1(&self, scheme: &str, network: &str) -> Option<&Arc<dyn SchemeFacilitatorV1>> {
        self.v1
            .iter()
            .find(|(networks, handler)| {
                handler.scheme() == scheme && networks.iter().any(|n| n == network)
            })
            .map(|(_, handler)| handler)
    }

    /// Verifies a V2 payment; an unknown scheme/network yields an invalid
    /// verdict rather than an error.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> VerifyResponse {
        match self.find(payload.scheme(), payload.network()) {
            Some(handler) => handler.verify(payload, requirements).await,
            None => VerifyResponse::invalid("unsupported_scheme"),
        }
    }

    /// Settles a V2 payment; an unknown scheme/network yields a failed
    /// receipt.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> SettleResponse {
        match self.find(payload.scheme(), payload.network()) {
            Some(handler) => handler.settle(payload, requirements).await,
            None => SettleResponse::error("unsupported_scheme", payload.network()),
        }
    }

    /// Verifies a V1 (legacy) payment.
    pub async fn verify_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> VerifyResponse {
        match self.find_v1(payload.scheme(), payload.network()) {
            Some(handler) => handler.verify(payload, requirements).await,
            None => VerifyResponse::invalid("unsupported_scheme"),
        }
    }

    /// Settles a V1 (legacy) payment.
    pub async fn settle_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> SettleResponse {
        match self.find_v1(payload.scheme(), payload.network()) {
            Some(handler) => handler.settle(payload, requirements).await,
            None => SettleResponse::error("unsupported_scheme", payload.network()),
        }
    }

    /// Aggregates the supported kinds and signers over every registration.
    #[must_use]
    pub fn supported(&self) -> SupportedResponse {
        let mut kinds = Vec::new();
        let mut signers: HashMap<String, Vec<String>> = HashMap::new();

        for (networks, handler) in &self.v2 {
            for network in networks {
                kinds.push(SupportedKind {
                    x402_version: 2,
                    scheme: handler.scheme().to_owned(),
                    network: network.clone(),
                    extra: handler.get_extra(network),
                });
                let handler_signers = handler.get_signers(network);
                if !handler_signers.is_empty() {
                    signers
                        .entry(handler.caip_family().to_owned())
                        .or_default()
                        .extend(handler_signers);
                }
            }
        }
        for (networks, handler) in &self.v1 {
            for network in networks {
                kinds.push(SupportedKind {
                    x402_version: 1,
                    scheme: handler.scheme().to_owned(),
                    network: network.clone(),
                    extra: None,
                });
            }
        }

        SupportedResponse {
            kinds,
            extensions: Vec::new(),
            signers,
        }
    }
}

impl FacilitatorClient for LocalFacilitator {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move { Ok(Self::verify(self, payload, requirements).await) })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move { Ok(Self::settle(self, payload, requirements).await) })
    }

    fn verify_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move { Ok(Self::verify_v1(self, payload, requirements).await) })
    }

    fn settle_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move { Ok(Self::settle_v1(self, payload, requirements).await) })
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>> {
        Box::pin(async move { Ok(self.supported()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    struct StubScheme {
        scheme: &'static str,
        family: &'static str,
    }

    impl SchemeFacilitator for StubScheme {
        fn scheme(&self) -> &str {
            self.scheme
        }

        fn caip_family(&self) -> &str {
            self.family
        }

        fn get_extra(&self, _network: &str) -> Option<Value> {
            None
        }

        fn get_signers(&self, _network: &str) -> Vec<String> {
            vec!["0xsigner".into()]
        }

        fn verify<'a>(
            &'a self,
            _payload: &'a PaymentPayload,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, VerifyResponse> {
            Box::pin(async move { VerifyResponse::valid("0xpayer") })
        }

        fn settle<'a>(
            &'a self,
            payload: &'a PaymentPayload,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, SettleResponse> {
            Box::pin(async move {
                SettleResponse::success("0xtx", payload.network(), "0xpayer")
            })
        }
    }

    fn payload(network: &str) -> PaymentPayload {
        PaymentPayload {
            x402_version: 2,
            accepted: PaymentRequirements {
                scheme: "exact".into(),
                network: network.into(),
                amount: "1000".into(),
                pay_to: "0xpay".into(),
                max_timeout_seconds: 300,
                asset: "0xasset".into(),
                extra: None,
            },
            payload: json!({}),
            resource: None,
            extensions: None,
        }
    }

    fn requirements(network: &str) -> PaymentRequirements {
        payload(network).accepted
    }

    #[tokio::test]
    async fn routes_by_scheme_and_network_pattern() {
        let mut facilitator = LocalFacilitator::new();
        facilitator.register(
            vec!["eip155:*".into()],
            Arc::new(StubScheme {
                scheme: "exact",
                family: "eip155:*",
            }),
        );

        let verdict = facilitator
            .verify(&payload("eip155:8453"), &requirements("eip155:8453"))
            .await;
        assert!(verdict.is_valid);

        let verdict = facilitator
            .verify(&payload("solana:mainnet"), &requirements("solana:mainnet"))
            .await;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.invalid_reason.as_deref(), Some("unsupported_scheme"));
    }

    #[tokio::test]
    async fn supported_aggregates_registrations() {
        let mut facilitator = LocalFacilitator::new();
        facilitator.register(
            vec!["eip155:8453".into(), "eip155:84532".into()],
            Arc::new(StubScheme {
                scheme: "exact",
                family: "eip155:*",
            }),
        );

        let supported = facilitator.supported();
        assert_eq!(supported.kinds.len(), 2);
        assert!(supported.kinds.iter().all(|k| k.x402_version == 2));
        assert_eq!(supported.signers["eip155:*"], vec!["0xsigner", "0xsigner"]);
    }

    #[tokio::test]
    async fn unknown_settle_fails_closed() {
        let facilitator = LocalFacilitator::new();
        let receipt = facilitator
            .settle(&payload("eip155:1"), &requirements("eip155:1"))
            .await;
        assert!(!receipt.success);
    }
}
