//! WeChat Pay unified-order request builder
//!
//! Assembles the parameters of a "unified order" payment request, signs them with the
//! merchant API key, renders the flat XML document the gateway expects and posts it
//! over HTTPS.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  set / typed setters (lenient)
//! │  UnifiedOrder    │──────────────────────────────┐
//! │  (order)         │  finalize (strict):          │
//! │                  │  nonce → IP → sign → check   │
//! └────────┬─────────┘◄─────────────────────────────┘
//!          │ SignedFields
//! ┌────────▼─────────┐
//! │  codec::xml      │  <xml><name>value</name>…</xml>, ISO-8859-1
//! └────────┬─────────┘
//!          │ bytes
//! ┌────────▼─────────┐
//! │  Transport       │  HTTPS POST, text/xml;charset=UTF-8
//! └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use wxpay_order::order::{TradeType, UnifiedOrder};
//!
//! # fn example() -> wxpay_order::error::Result<()> {
//! let mut order = UnifiedOrder::new("192006250b4c09247ec02edce69f6a2d");
//! order
//!     .appid("wxd930ea5d5a258f4f")
//!     .mch_id("10000100")
//!     .sub_mch_id("1900000109")
//!     .body("Ipad mini 16G")
//!     .out_trade_no("20150806125346")
//!     .total_fee(888)
//!     .notify_url("https://example.com/wxpay/notify")
//!     .trade_type(TradeType::Jsapi)
//!     .openid("oUpF8uMuAJO_M2pxb1Q9zNjWeS6o");
//!
//! let signed = order.finalize()?;
//! let document = signed.to_xml(Some("xml"))?;
//! assert!(document.starts_with(b"<xml><appid>"));
//! # Ok(())
//! # }
//! ```
//!
//! Submitting goes through [`UnifiedOrderClient`], which finalizes, encodes and posts in
//! one call.
//!
//! # Module Organization
//!
//! - [`order`]: field store, signing and finalize-time validation
//! - [`codec`]: wire encoding of the request document
//! - [`transport`]: HTTPS delivery to the gateway
//! - [`client`]: finalize, encode and submit in one step
//! - [`config`]: TOML gateway configuration
//! - [`error`]: error types
//!
//! # Security Considerations
//!
//! - The signing key is zeroized on drop and never appears in `Debug` output
//! - Load the key from the environment ([`GatewayConfig::load_key`]), never from files
//! - Only HTTPS, non-loopback endpoints are accepted

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest"
)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod order;
pub mod transport;

pub use client::UnifiedOrderClient;
pub use config::GatewayConfig;
pub use error::{OrderError, Result};
pub use order::{SignedFields, TradeType, UnifiedOrder};
pub use transport::HttpTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = std::marker::PhantomData::<OrderError>;
        let _ = std::marker::PhantomData::<UnifiedOrderClient<HttpTransport>>;
        assert_eq!(TradeType::Native.as_str(), "NATIVE");
    }
}
