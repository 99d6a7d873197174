//! Axum REST surface for the facilitator.
//!
//! Endpoints:
//!
//! - `GET /supported` — supported payment kinds, extensions, and signers
//! - `POST /verify` / `POST /settle` — V2 payments
//! - `POST /verify-v1` / `POST /settle-v1` — legacy V1 payments

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tollbooth::proto::v1::{SettleRequestV1, VerifyRequestV1};
use tollbooth::proto::{
    SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse,
};

use crate::local::LocalFacilitator;

/// Shared application state.
pub type FacilitatorState = Arc<LocalFacilitator>;

/// `GET /supported`
pub async fn get_supported(State(fac): State<FacilitatorState>) -> Json<SupportedResponse> {
    Json(fac.supported())
}

/// `POST /verify`
pub async fn post_verify(
    State(fac): State<FacilitatorState>,
    Json(body): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    let verdict = fac
        .verify(&body.payment_payload, &body.payment_requirements)
        .await;
    Json(verdict)
}

/// `POST /settle`
pub async fn post_settle(
    State(fac): State<FacilitatorState>,
    Json(body): Json<SettleRequest>,
) -> Json<SettleResponse> {
    let receipt = fac
        .settle(&body.payment_payload, &body.payment_requirements)
        .await;
    Json(receipt)
}

/// `POST /verify-v1`
pub async fn post_verify_v1(
    State(fac): State<FacilitatorState>,
    Json(body): Json<VerifyRequestV1>,
) -> Json<VerifyResponse> {
    let verdict = fac
        .verify_v1(&body.payment_payload, &body.payment_requirements)
        .await;
    Json(verdict)
}

/// `POST /settle-v1`
pub async fn post_settle_v1(
    State(fac): State<FacilitatorState>,
    Json(body): Json<SettleRequestV1>,
) -> Json<SettleResponse> {
    let receipt = fac
        .settle_v1(&body.payment_payload, &body.payment_requirements)
        .await;
    Json(receipt)
}

/// Builds the facilitator router.
pub fn facilitator_router(state: FacilitatorState) -> Router {
    Router::new()
        .route("/supported", get(get_supported))
        .route("/verify", post(post_verify))
        .route("/settle", post(post_settle))
        .route("/verify-v1", post(post_verify_v1))
        .route("/settle-v1", post(post_settle_v1))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn supported_endpoint_responds() {
        let app = facilitator_router(Arc::new(LocalFacilitator::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/supported")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verify_with_no_registered_schemes_is_invalid() {
        let app = facilitator_router(Arc::new(LocalFacilitator::new()));
        let body = serde_json::json!({
            "x402Version": 2,
            "paymentPayload": {
                "x402Version": 2,
                "accepted": {
                    "scheme": "exact",
                    "network": "eip155:84532",
                    "amount": "1000",
                    "payTo": "0xpay",
                    "maxTimeoutSeconds": 300,
                    "asset": "0xasset",
                },
                "payload": {},
            },
            "paymentRequirements": {
                "scheme": "exact",
                "network": "eip155:84532",
                "amount": "1000",
                "payTo": "0xpay",
                "maxTimeoutSeconds": 300,
                "asset": "0xasset",
            },
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/verify")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let verdict: VerifyResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!verdict.is_valid);
        assert_eq!(verdict.invalid_reason.as_deref(), Some("unsupported_scheme"));
    }
}
