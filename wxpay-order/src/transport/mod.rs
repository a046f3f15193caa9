//! Gateway transport layer.
//!
//! The [`Transport`] trait posts an encoded request document to the gateway and hands the
//! raw reply back. It never parses the response; interpreting `return_code` and friends is
//! left to the caller.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wxpay_order::{
//!     codec::xml,
//!     order::{TradeType, UnifiedOrder},
//!     transport::{HttpTransport, Transport},
//! };
//!
//! # async fn example() -> wxpay_order::error::Result<()> {
//! let mut order = UnifiedOrder::new("192006250b4c09247ec02edce69f6a2d");
//! order
//!     .appid("wxd930ea5d5a258f4f")
//!     .mch_id("10000100")
//!     .sub_mch_id("1900000109")
//!     .body("Ipad mini 16G")
//!     .out_trade_no("20150806125346")
//!     .total_fee(888)
//!     .notify_url("https://example.com/notify")
//!     .trade_type(TradeType::Native)
//!     .product_id("12235413214070356458058");
//!
//! let signed = order.finalize()?;
//! let document = xml::encode(signed.as_fields(), Some("xml"))?;
//!
//! let transport = HttpTransport::new()?;
//! let response = transport.post(order.url(), &document).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use crate::error::Result;

pub mod config;
pub mod http;
pub(crate) mod sealed;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// `Content-Type` sent with every request document.
pub const CONTENT_TYPE: &str = "text/xml;charset=UTF-8";

/// Raw gateway reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body bytes.
    pub body: Vec<u8>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
}

impl TransportResponse {
    /// Returns the body as text, replacing invalid UTF-8 sequences.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::transport::TransportResponse;
    ///
    /// let response = TransportResponse {
    ///     status: 200,
    ///     body: b"<xml><return_code>SUCCESS</return_code></xml>".to_vec(),
    ///     headers: vec![],
    /// };
    /// assert!(response.text().contains("SUCCESS"));
    /// ```
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the first header value named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Delivery of request documents to the payment gateway.
///
/// This trait is sealed; only implementations within this crate are allowed.
///
/// # Security
///
/// All transport implementations:
/// - Accept HTTPS endpoints only and reject loopback hosts
/// - Send the document with `Content-Type: text/xml;charset=UTF-8`
/// - Apply request and connect timeouts
pub trait Transport: sealed::private::Sealed + Send + Sync {
    /// Posts `body` to `url` and returns the raw reply.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::TransportError`](crate::error::OrderError::TransportError) when the
    /// URL is rejected or the gateway answers with a non-success status, and
    /// [`OrderError::HttpError`](crate::error::OrderError::HttpError) when the request itself
    /// fails.
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a [u8],
    ) -> impl Future<Output = Result<TransportResponse>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &[u8]) -> TransportResponse {
        TransportResponse {
            status: 200,
            body: body.to_vec(),
            headers: vec![("Content-Type".to_owned(), "text/plain".to_owned())],
        }
    }

    #[test]
    fn test_response_text() {
        let reply = response(b"<xml><return_code><![CDATA[SUCCESS]]></return_code></xml>");
        assert_eq!(reply.text(), "<xml><return_code><![CDATA[SUCCESS]]></return_code></xml>");
    }

    #[test]
    fn test_response_text_lossy() {
        let reply = response(b"ok\xff");
        assert_eq!(reply.text(), "ok\u{fffd}");
    }

    #[test]
    fn test_response_text_empty() {
        assert_eq!(response(b"").text(), "");
    }

    #[test]
    fn test_response_header_case_insensitive() {
        let reply = response(b"");
        assert_eq!(reply.header("content-type"), Some("text/plain"));
        assert_eq!(reply.header("X-Missing"), None);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(CONTENT_TYPE, "text/xml;charset=UTF-8");
    }
}
