//! Configuration for protected resources.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::Network;

/// What a resource server charges for one payment option on an endpoint.
///
/// # Example
///
/// ```rust
/// use tollbooth::config::ResourceConfig;
///
/// let config = ResourceConfig {
///     scheme: "exact".into(),
///     pay_to: "0x1111111111111111111111111111111111111111".into(),
///     price: serde_json::json!("$0.01"),
///     network: "eip155:84532".into(),
///     max_timeout_seconds: Some(300),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// Recipient address.
    pub pay_to: String,

    /// Price for the resource: a money string (`"$0.01"`), a bare number,
    /// or a structured [`AssetAmount`](crate::scheme::AssetAmount) object.
    pub price: Value,

    /// CAIP-2 network identifier (e.g., `"eip155:84532"`).
    pub network: Network,

    /// Maximum validity window in seconds; defaults to 300 when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
}
