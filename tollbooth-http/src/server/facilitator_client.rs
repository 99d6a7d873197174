//! HTTP client for a remote x402 facilitator.
//!
//! Speaks the facilitator REST surface: `POST /verify`, `POST /settle`,
//! `GET /supported`, plus the legacy `/verify-v1` and `/settle-v1`
//! endpoints. Implements the engine's
//! [`FacilitatorClient`](tollbooth::server::FacilitatorClient) trait.
//!
//! Authentication is pluggable per endpoint through an
//! [`AuthHeaderProvider`], which covers bearer-token services (e.g. JWT
//! issuers) without the client knowing the mechanism.

use http::HeaderMap;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tollbooth::proto::v1::{
    PaymentPayloadV1, PaymentRequirementsV1, SettleRequestV1, VerifyRequestV1,
};
use tollbooth::proto::{
    PaymentPayload, PaymentRequirements, SettleRequest, SettleResponse, SupportedResponse,
    VerifyRequest, VerifyResponse,
};
use tollbooth::scheme::{BoxFuture, SchemeError};
use tollbooth::server::FacilitatorClient;
use url::Url;

/// Produces extra headers for a facilitator endpoint (`"verify"`,
/// `"settle"`, `"supported"`).
pub type AuthHeaderProvider = Arc<dyn Fn(&str) -> HeaderMap + Send + Sync>;

/// Errors from talking to a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// URL construction failed.
    #[error("URL error: {context}: {source}")]
    UrlParse {
        /// Which URL was being built.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The HTTP request failed at the transport level.
    #[error("facilitator unreachable: {context}: {source}")]
    Transport {
        /// Which endpoint was called.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The facilitator answered with an unexpected status.
    #[error("facilitator returned {status} on {context}: {body}")]
    Status {
        /// Which endpoint was called.
        context: &'static str,
        /// The HTTP status.
        status: StatusCode,
        /// The response body text.
        body: String,
    },

    /// The response body did not deserialize.
    #[error("facilitator response malformed: {context}: {source}")]
    Deserialize {
        /// Which endpoint was called.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

/// TTL cache for the `/supported` response.
#[derive(Debug)]
struct SupportedCache {
    ttl: Duration,
    state: RwLock<Option<(SupportedResponse, std::time::Instant)>>,
}

impl SupportedCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
        }
    }

    async fn get(&self) -> Option<SupportedResponse> {
        let guard = self.state.read().await;
        let (response, stored_at) = guard.as_ref()?;
        (stored_at.elapsed() < self.ttl).then(|| response.clone())
    }

    async fn set(&self, response: SupportedResponse) {
        let mut guard = self.state.write().await;
        *guard = Some((response, std::time::Instant::now()));
    }
}

/// A client for a remote x402 facilitator.
pub struct HttpFacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    verify_v1_url: Url,
    settle_v1_url: Url,
    supported_url: Url,
    client: Client,
    auth: Option<AuthHeaderProvider>,
    timeout: Option<Duration>,
    supported_cache: SupportedCache,
}

impl std::fmt::Debug for HttpFacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilitatorClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpFacilitatorClient {
    /// Default TTL for the `/supported` cache.
    pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(600);

    /// Constructs a client from a base URL.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError::UrlParse`] if endpoint URL
    /// construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let join = |segment: &'static str| {
            base_url
                .join(segment)
                .map_err(|source| FacilitatorClientError::UrlParse {
                    context: segment,
                    source,
                })
        };
        Ok(Self {
            verify_url: join("./verify")?,
            settle_url: join("./settle")?,
            verify_v1_url: join("./verify-v1")?,
            settle_v1_url: join("./settle-v1")?,
            supported_url: join("./supported")?,
            base_url,
            client: Client::new(),
            auth: None,
            timeout: None,
            supported_cache: SupportedCache::new(Self::DEFAULT_SUPPORTED_CACHE_TTL),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Attaches a per-endpoint auth header provider.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthHeaderProvider) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets a timeout applied to every request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the `/supported` cache TTL; zero disables caching.
    #[must_use]
    pub fn with_supported_cache_ttl(mut self, ttl: Duration) -> Self {
        self.supported_cache = SupportedCache::new(ttl);
        self
    }

    async fn post_json<T, R>(
        &self,
        url: &Url,
        endpoint: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let mut request = self.client.post(url.clone()).json(payload);
        if let Some(auth) = &self.auth {
            request = request.headers(auth(endpoint));
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|source| FacilitatorClientError::Transport {
                context: endpoint,
                source,
            })?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorClientError::Status {
                context: endpoint,
                status,
                body,
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|source| FacilitatorClientError::Deserialize {
                context: endpoint,
                source,
            })
    }

    async fn get_supported_fresh(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        let mut request = self.client.get(self.supported_url.clone());
        if let Some(auth) = &self.auth {
            request = request.headers(auth("supported"));
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|source| FacilitatorClientError::Transport {
                context: "supported",
                source,
            })?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorClientError::Status {
                context: "supported",
                status,
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|source| FacilitatorClientError::Deserialize {
                context: "supported",
                source,
            })
    }

    /// Fetches `/supported`, honoring the TTL cache.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] on transport or decode failure.
    pub async fn supported(&self) -> Result<SupportedResponse, FacilitatorClientError> {
        if let Some(cached) = self.supported_cache.get().await {
            return Ok(cached);
        }
        let response = self.get_supported_fresh().await?;
        self.supported_cache.set(response.clone()).await;
        Ok(response)
    }
}

impl TryFrom<&str> for HttpFacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Normalize to exactly one trailing slash so relative joins work.
        let mut normalized = value.trim_end_matches('/').to_owned();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|source| FacilitatorClientError::UrlParse {
            context: "base url",
            source,
        })?;
        Self::try_new(url)
    }
}

impl FacilitatorClient for HttpFacilitatorClient {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move {
            let request = VerifyRequest {
                x402_version: 2,
                payment_payload: payload.clone(),
                payment_requirements: requirements.clone(),
            };
            let response = self.post_json(&self.verify_url, "verify", &request).await?;
            Ok(response)
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move {
            let request = SettleRequest {
                x402_version: 2,
                payment_payload: payload.clone(),
                payment_requirements: requirements.clone(),
            };
            let response = self.post_json(&self.settle_url, "settle", &request).await?;
            Ok(response)
        })
    }

    fn verify_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move {
            let request = VerifyRequestV1 {
                payment_payload: payload.clone(),
                payment_requirements: requirements.clone(),
            };
            let response = self
                .post_json(&self.verify_v1_url, "verify", &request)
                .await?;
            Ok(response)
        })
    }

    fn settle_v1<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move {
            let request = SettleRequestV1 {
                payment_payload: payload.clone(),
                payment_requirements: requirements.clone(),
            };
            let response = self
                .post_json(&self.settle_v1_url, "settle", &request)
                .await?;
            Ok(response)
        })
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>> {
        Box::pin(async move {
            let response = self.supported().await?;
            Ok(response)
        })
    }
}
