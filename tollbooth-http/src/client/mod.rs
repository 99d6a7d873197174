//! Client-side HTTP transport.

mod middleware;

pub use middleware::{BufferedResponse, PaymentMiddleware, decode_settlement, parse_402_response};
