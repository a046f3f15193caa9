//! Client that finalizes, encodes and submits unified orders.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wxpay_order::{
//!     client::UnifiedOrderClient,
//!     order::{TradeType, UnifiedOrder},
//!     transport::HttpTransport,
//! };
//!
//! # async fn example() -> wxpay_order::error::Result<()> {
//! let client = UnifiedOrderClient::new(HttpTransport::new()?);
//!
//! let mut order = UnifiedOrder::new("192006250b4c09247ec02edce69f6a2d");
//! order
//!     .appid("wxd930ea5d5a258f4f")
//!     .mch_id("10000100")
//!     .sub_mch_id("1900000109")
//!     .body("Ipad mini 16G")
//!     .out_trade_no("20150806125346")
//!     .total_fee(888)
//!     .notify_url("https://example.com/wxpay/notify")
//!     .trade_type(TradeType::Native)
//!     .product_id("12235413214070356458058");
//!
//! let response = client.submit(&mut order).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

use tracing::{debug, info, instrument};

use crate::{
    codec::{DEFAULT_ROOT, xml},
    config::GatewayConfig,
    error::Result,
    order::{UNIFIED_ORDER_URL, UnifiedOrder},
    transport::{Transport, TransportResponse},
};

/// Submits unified orders through a [`Transport`].
///
/// Holds no per-order state; one client can serve any number of builders.
#[derive(Debug, Clone)]
pub struct UnifiedOrderClient<T: Transport> {
    transport: T,
    endpoint: String,
    root: Option<String>,
}

impl<T: Transport> UnifiedOrderClient<T> {
    /// Creates a client posting to the production endpoint with an `xml` root element.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            endpoint: UNIFIED_ORDER_URL.to_owned(),
            root: Some(DEFAULT_ROOT.to_owned()),
        }
    }

    /// Creates a client using the endpoint and root element of `config`.
    #[must_use]
    pub fn from_config(transport: T, config: &GatewayConfig) -> Self {
        Self {
            transport,
            endpoint: config.endpoint.clone(),
            root: config.root().map(str::to_owned),
        }
    }

    /// Overrides the endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns the endpoint requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Finalizes `order` and renders the request document without sending it.
    ///
    /// # Errors
    ///
    /// Returns the finalize error or [`OrderError::EncodingError`](crate::error::OrderError::EncodingError).
    pub fn prepare(&self, order: &mut UnifiedOrder) -> Result<Vec<u8>> {
        let signed = order.finalize()?;
        let document = xml::encode(signed.as_fields(), self.root.as_deref())?;
        debug!(field_count = signed.len(), bytes = document.len(), "request document encoded");
        Ok(document)
    }

    /// Finalizes, encodes and posts `order`, returning the raw gateway reply.
    ///
    /// Nothing is sent if finalization or encoding fails. The reply is not interpreted.
    ///
    /// # Errors
    ///
    /// Returns the first finalize, encoding or transport error.
    #[instrument(
        skip(self, order),
        fields(endpoint = %self.endpoint, protocol = self.transport.protocol_name())
    )]
    pub async fn submit(&self, order: &mut UnifiedOrder) -> Result<TransportResponse> {
        let document = self.prepare(order)?;
        let response = self.transport.post(&self.endpoint, &document).await?;
        info!(status = response.status, bytes = response.body.len(), "unified order submitted");
        Ok(response)
    }
}

#[cfg(test)]
#[allow(
    clippy::unreachable,
    reason = "test code uses unreachable for expected-path assertions"
)]
mod tests {
    use std::{
        net::Ipv4Addr,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        error::OrderError,
        order::{AddressResolver, NonceSource, SignKey, TradeType},
        transport::sealed,
    };

    #[derive(Debug, Default, Clone)]
    struct RecordingTransport {
        requests: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn requests(&self) -> Vec<(String, Vec<u8>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl sealed::private::Sealed for RecordingTransport {}

    impl Transport for RecordingTransport {
        async fn post<'a>(&'a self, url: &'a str, body: &'a [u8]) -> Result<TransportResponse> {
            self.requests.lock().unwrap().push((url.to_owned(), body.to_vec()));
            if self.fail {
                return Err(OrderError::TransportError("gateway returned status 503".to_owned()));
            }
            Ok(TransportResponse {
                status: 200,
                body: b"<xml><return_code><![CDATA[SUCCESS]]></return_code></xml>".to_vec(),
                headers: vec![],
            })
        }

        fn protocol_name(&self) -> &'static str {
            "recording"
        }
    }

    struct FixedNonce;

    impl NonceSource for FixedNonce {
        fn nonce(&self) -> String {
            "5K8264ILTKCH16CQ2502SI8ZNMTM67".to_owned()
        }
    }

    struct FixedAddress;

    impl AddressResolver for FixedAddress {
        fn local_ipv4(&self) -> Option<Ipv4Addr> {
            Some(Ipv4Addr::new(123, 12, 12, 123))
        }
    }

    fn order() -> UnifiedOrder {
        let mut order = UnifiedOrder::new("192006250b4c09247ec02edce69f6a2d")
            .with_nonce_source(FixedNonce)
            .with_address_resolver(FixedAddress);
        order
            .appid("wxd930ea5d5a258f4f")
            .mch_id("10000100")
            .sub_mch_id("1900000109")
            .body("Ipad mini 16G")
            .out_trade_no("20150806125346")
            .total_fee(888)
            .notify_url("https://example.com/wxpay/notify")
            .trade_type(TradeType::Native);
        order
    }

    #[tokio::test]
    async fn test_submit_posts_signed_document() {
        let transport = RecordingTransport::default();
        let client = UnifiedOrderClient::new(transport.clone());

        let response = client.submit(&mut order()).await.unwrap();
        assert!(response.text().contains("SUCCESS"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let (url, body) = &requests[0];
        assert_eq!(url, UNIFIED_ORDER_URL);

        let text = String::from_utf8(body.clone()).unwrap();
        assert!(text.starts_with("<xml><appid>wxd930ea5d5a258f4f</appid>"));
        assert!(text.contains("<nonce_str>5K8264ILTKCH16CQ2502SI8ZNMTM67</nonce_str>"));
        assert!(text.contains("<spbill_create_ip>123.12.12.123</spbill_create_ip>"));
        assert!(text.contains("<total_fee>888</total_fee>"));
        assert!(text.ends_with("</trade_type></xml>"));
    }

    #[tokio::test]
    async fn test_submitted_signature_verifies() {
        let transport = RecordingTransport::default();
        let client = UnifiedOrderClient::new(transport.clone());
        let mut order = order();

        client.submit(&mut order).await.unwrap();

        let signed = order.finalize().unwrap();
        assert!(SignKey::new("192006250b4c09247ec02edce69f6a2d").verify(signed.as_fields()));
        let body = &transport.requests()[0].1;
        let expected = format!("<sign>{}</sign>", signed.sign());
        assert!(String::from_utf8_lossy(body).contains(&expected));
    }

    #[tokio::test]
    async fn test_submit_missing_field_sends_nothing() {
        let transport = RecordingTransport::default();
        let client = UnifiedOrderClient::new(transport.clone());
        let mut order = UnifiedOrder::new("K");
        order.appid("wx1");

        let Err(OrderError::MissingRequiredField { field, .. }) = client.submit(&mut order).await
        else {
            unreachable!("expected MissingRequiredField")
        };
        assert_eq!(field, "mch_id");
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_encoding_error_sends_nothing() {
        let transport = RecordingTransport::default();
        let client = UnifiedOrderClient::new(transport.clone());
        let mut order = order();
        order.body("深圳分店-QQ公仔");

        let result = client.submit(&mut order).await;
        assert!(matches!(result, Err(OrderError::EncodingError(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_propagates_transport_error() {
        let transport = RecordingTransport { fail: true, ..Default::default() };
        let client = UnifiedOrderClient::new(transport.clone());

        let result = client.submit(&mut order()).await;
        assert!(matches!(result, Err(OrderError::TransportError(_))));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_from_config_uses_endpoint_and_root() {
        let config = GatewayConfig::from_toml(
            "endpoint = \"https://api2.mch.weixin.qq.com/pay/unifiedorder\"\nroot_element = \"\"",
        )
        .unwrap();
        let transport = RecordingTransport::default();
        let client = UnifiedOrderClient::from_config(transport.clone(), &config);
        assert_eq!(client.endpoint(), "https://api2.mch.weixin.qq.com/pay/unifiedorder");

        client.submit(&mut order()).await.unwrap();
        let (url, body) = &transport.requests()[0];
        assert_eq!(url, "https://api2.mch.weixin.qq.com/pay/unifiedorder");
        assert!(body.starts_with(b"<appid>"));
    }

    #[test]
    fn test_prepare_matches_encode() {
        let client = UnifiedOrderClient::new(RecordingTransport::default());
        let mut order = order();
        let document = client.prepare(&mut order).unwrap();

        let signed = order.finalize().unwrap();
        assert_eq!(document, signed.to_xml(Some("xml")).unwrap());
        assert_eq!(client.transport().protocol_name(), "recording");
    }

    #[test]
    fn test_with_endpoint() {
        let client = UnifiedOrderClient::new(RecordingTransport::default())
            .with_endpoint("https://api2.mch.weixin.qq.com/pay/unifiedorder");
        assert_eq!(client.endpoint(), "https://api2.mch.weixin.qq.com/pay/unifiedorder");
    }
}
