//! reqwest middleware that pays 402 responses automatically.
//!
//! The lifecycle per request:
//!
//! 1. send without a payment header;
//! 2. on 402, parse the payment terms (V2 `PAYMENT-REQUIRED` header takes
//!    precedence over the body; V1 body as fallback);
//! 3. ask the engine to select a mutually supported option and sign a
//!    payload (the engine runs the hook lifecycle);
//! 4. resend the identical request once with the version-appropriate
//!    header;
//! 5. a second 402 is returned to the caller as-is — never loop.
//!
//! When no registered scheme matches or a hook aborts, the original 402 is
//! surfaced unchanged so the caller can inspect the terms.

use http::{Extensions, HeaderMap, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;
use tollbooth::client::PaymentClient;
use tollbooth::error::PaymentError;
use tollbooth::proto::SettleResponse;
use tollbooth::proto::helpers::PaymentRequiredEnum;
use url::Url;

use crate::constants::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER,
    X_PAYMENT_RESPONSE_HEADER,
};
use crate::error::HttpError;
use crate::headers;

/// A fully read 402 response that can be re-materialized.
///
/// Parsing a 402 consumes the body; buffering lets the middleware hand the
/// original response back when payment is impossible or aborted.
#[derive(Debug)]
pub struct BufferedResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Fully read body bytes.
    pub body: Vec<u8>,
    /// The request URL.
    pub url: Url,
}

impl BufferedResponse {
    /// Reads a response to completion.
    ///
    /// # Errors
    ///
    /// Returns the underlying transport error if the body read fails.
    pub async fn read(response: Response) -> reqwest::Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }

    /// Rebuilds a `reqwest::Response` from the buffered parts.
    #[must_use]
    pub fn into_response(self) -> Response {
        let mut builder = http::Response::builder().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        let response = builder
            .body(self.body)
            .unwrap_or_else(|_| http::Response::new(Vec::new()));
        Response::from(response)
    }
}

/// Parses the payment terms out of a buffered 402 response.
///
/// The V2 `PAYMENT-REQUIRED` header wins over the body; the body is tried
/// for both versions.
#[must_use]
pub fn parse_402_response(response: &BufferedResponse) -> Option<PaymentRequiredEnum> {
    if let Some(header) = response
        .headers
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|v| v.to_str().ok())
        && let Ok(required) = headers::decode_payment_required(header)
    {
        return Some(required);
    }
    headers::decode_payment_required_body(&response.body).ok()
}

/// Decodes the settlement receipt header off a paid response, if present.
#[must_use]
pub fn decode_settlement(headers: &HeaderMap) -> Option<SettleResponse> {
    let value = headers
        .get(PAYMENT_RESPONSE_HEADER)
        .or_else(|| headers.get(X_PAYMENT_RESPONSE_HEADER))?
        .to_str()
        .ok()?;
    headers::decode_payment_response(value).ok()
}

/// reqwest middleware driving the x402 client engine.
///
/// ```no_run
/// use std::sync::Arc;
/// use tollbooth::client::PaymentClient;
/// use tollbooth_http::PaymentMiddleware;
///
/// let engine = Arc::new(PaymentClient::new());
/// let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
///     .with(PaymentMiddleware::new(engine))
///     .build();
/// ```
pub struct PaymentMiddleware {
    engine: Arc<PaymentClient>,
}

impl std::fmt::Debug for PaymentMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentMiddleware").finish_non_exhaustive()
    }
}

impl PaymentMiddleware {
    /// Creates the middleware around a configured engine.
    #[must_use]
    pub const fn new(engine: Arc<PaymentClient>) -> Self {
        Self { engine }
    }

    /// Produces the payment header for a parsed 402.
    ///
    /// Returns `Ok(None)` when payment should not be attempted (no mutual
    /// support, or a hook aborted) and the original 402 belongs to the
    /// caller.
    async fn make_payment_header(
        &self,
        required: &PaymentRequiredEnum,
    ) -> Result<Option<(&'static str, String)>, PaymentError> {
        match required {
            PaymentRequiredEnum::V2(required) => {
                match self.engine.create_payment_payload_v2(required).await {
                    Ok(payload) => {
                        let value = headers::encode_payment_signature(&payload)
                            .map_err(|e| PaymentError::Scheme(Box::new(e)))?;
                        Ok(Some((PAYMENT_SIGNATURE_HEADER, value)))
                    }
                    Err(err) => Self::absorb_expected(err),
                }
            }
            PaymentRequiredEnum::V1(required) => {
                match self.engine.create_payment_payload_v1(required).await {
                    Ok(payload) => {
                        let value = headers::encode_x_payment(&payload)
                            .map_err(|e| PaymentError::Scheme(Box::new(e)))?;
                        Ok(Some((X_PAYMENT_HEADER, value)))
                    }
                    Err(err) => Self::absorb_expected(err),
                }
            }
        }
    }

    /// Maps "surface the 402" outcomes to `None`; everything else
    /// propagates.
    fn absorb_expected(
        err: PaymentError,
    ) -> Result<Option<(&'static str, String)>, PaymentError> {
        match err {
            PaymentError::NoMatchingRequirements(e) => {
                tracing::debug!(reason = %e, "no mutually supported payment option");
                Ok(None)
            }
            PaymentError::Aborted(e) => {
                tracing::info!(reason = %e.reason, "payment aborted by hook");
                Ok(None)
            }
            other => Err(other),
        }
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for PaymentMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        // Clone up front; the retry must be the same method, URL, and body.
        let retry_req = req.try_clone();

        let response = next.clone().run(req, extensions).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        let buffered = BufferedResponse::read(response)
            .await
            .map_err(rqm::Error::Reqwest)?;

        let Some(required) = parse_402_response(&buffered) else {
            tracing::debug!("402 response carried no parsable payment terms");
            return Ok(buffered.into_response());
        };

        let header = self
            .make_payment_header(&required)
            .await
            .map_err(|e| rqm::Error::Middleware(e.into()))?;
        let Some((name, value)) = header else {
            return Ok(buffered.into_response());
        };

        let mut retry = retry_req.ok_or_else(|| {
            rqm::Error::Middleware(HttpError::RequestNotCloneable.into())
        })?;
        let header_value = value
            .parse()
            .map_err(|_| rqm::Error::Middleware(HttpError::RequestNotCloneable.into()))?;
        retry.headers_mut().insert(name, header_value);

        let mut second = next.run(retry, extensions).await?;
        if second.status() == StatusCode::PAYMENT_REQUIRED {
            // One payment per request: hand the refusal back to the caller,
            // tagged so it can tell this 402 from a first-contact one.
            tracing::warn!(url = %second.url(), "402 after payment was attached; not retrying");
            second
                .extensions_mut()
                .insert(tollbooth::error::PaymentAlreadyAttemptedError);
        }
        Ok(second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tollbooth::hooks::AbortResult;
    use tollbooth::proto::{PaymentRequired, PaymentRequirements};
    use tollbooth::scheme::{BoxFuture, SchemeClient, SchemeError};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, Request as WireRequest, ResponseTemplate};

    struct StubScheme;

    impl SchemeClient for StubScheme {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn create_payment_payload<'a>(
            &'a self,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<Value, SchemeError>> {
            Box::pin(async { Ok(json!({"signature": "0xstub"})) })
        }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000".into(),
            pay_to: "0x1111111111111111111111111111111111111111".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: None,
        }
    }

    fn payment_required() -> PaymentRequired {
        PaymentRequired {
            x402_version: 2,
            error: None,
            resource: None,
            accepts: vec![requirements()],
            extensions: None,
        }
    }

    fn engine_with_scheme() -> Arc<PaymentClient> {
        let mut engine = PaymentClient::new();
        engine.register("eip155:*".into(), Box::new(StubScheme));
        Arc::new(engine)
    }

    async fn mock_paid_endpoint(server: &MockServer) {
        let body = serde_json::to_vec(&payment_required()).unwrap();
        let header = headers::encode_payment_required(&payment_required()).unwrap();

        // Unpaid requests see 402; paid requests see 200 with a receipt.
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(header_exists(PAYMENT_SIGNATURE_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"report": {"weather": "sunny", "temperature": 70}}))
                    .insert_header(
                        PAYMENT_RESPONSE_HEADER,
                        headers::encode_payment_response(&SettleResponse::success(
                            format!("0x{}", "ab".repeat(32)),
                            "eip155:84532",
                            "0x1234567890123456789012345678901234567890",
                        ))
                        .unwrap()
                        .as_str(),
                    ),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(
                ResponseTemplate::new(402)
                    .set_body_raw(body, "application/json")
                    .insert_header(PAYMENT_REQUIRED_HEADER, header.as_str()),
            )
            .mount(server)
            .await;
    }

    fn paying_client(engine: Arc<PaymentClient>) -> rqm::ClientWithMiddleware {
        rqm::ClientBuilder::new(reqwest::Client::new())
            .with(PaymentMiddleware::new(engine))
            .build()
    }

    #[tokio::test]
    async fn pays_a_402_and_reads_the_receipt() {
        let server = MockServer::start().await;
        mock_paid_endpoint(&server).await;

        let client = paying_client(engine_with_scheme());
        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let receipt = decode_settlement(response.headers()).unwrap();
        assert!(receipt.success);
        assert_eq!(receipt.network.as_deref(), Some("eip155:84532"));

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["report"]["weather"], "sunny");
    }

    #[tokio::test]
    async fn sends_at_most_two_requests() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_mock = Arc::clone(&hits);
        let body = serde_json::to_vec(&payment_required()).unwrap();

        // Always answer 402, even to paid retries.
        Mock::given(method("GET"))
            .and(path("/stingy"))
            .respond_with(move |_req: &WireRequest| {
                hits_in_mock.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(402).set_body_raw(body.clone(), "application/json")
            })
            .mount(&server)
            .await;

        let client = paying_client(engine_with_scheme());
        let response = client
            .get(format!("{}/stingy", server.uri()))
            .send()
            .await
            .unwrap();

        // The second 402 comes back unchanged; exactly two requests hit the
        // wire.
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(
            response
                .extensions()
                .get::<tollbooth::error::PaymentAlreadyAttemptedError>()
                .is_some()
        );
    }

    #[tokio::test]
    async fn surfaces_402_when_nothing_matches() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_in_mock = Arc::clone(&hits);
        let body = serde_json::to_vec(&payment_required()).unwrap();

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(move |_req: &WireRequest| {
                hits_in_mock.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(402).set_body_raw(body.clone(), "application/json")
            })
            .mount(&server)
            .await;

        // The engine only knows Solana; the server offers EVM.
        let mut engine = PaymentClient::new();
        engine.register("solana:*".into(), Box::new(StubScheme));
        let client = paying_client(Arc::new(engine));

        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        // No retry was attempted.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // The original 402 body is preserved.
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["accepts"][0]["network"], "eip155:84532");
    }

    #[tokio::test]
    async fn abort_hook_returns_original_402_without_signing() {
        let server = MockServer::start().await;
        mock_paid_endpoint(&server).await;

        let mut engine = PaymentClient::new();
        engine.register("eip155:*".into(), Box::new(StubScheme));
        engine.on_before_payment_creation(Box::new(|_ctx| {
            Box::pin(async { Some(AbortResult::new("policy denies")) })
        }));
        let client = paying_client(Arc::new(engine));

        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn non_402_passes_through_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/free"))
            .respond_with(ResponseTemplate::new(200).set_body_string("no charge"))
            .mount(&server)
            .await;

        let client = paying_client(engine_with_scheme());
        let response = client
            .get(format!("{}/free", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "no charge");
    }
}
