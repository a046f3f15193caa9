//! Integration tests for the unified-order request flow.
//!
//! Builds orders through the public API, finalizes them and checks the exact wire
//! document, without touching the network.

use std::net::Ipv4Addr;

use wxpay_order::{
    GatewayConfig, OrderError, TradeType, UnifiedOrder,
    codec::xml,
    order::{AddressResolver, NonceSource, RequiredFieldSpec, SignKey},
};

const KEY: &str = "192006250b4c09247ec02edce69f6a2d";
const NONCE: &str = "5K8264ILTKCH16CQ2502SI8ZNMTM67";
const EXPECTED_SIGN: &str = "2D29543E42949501F245747E09997FE8";

struct FixedNonce;

impl NonceSource for FixedNonce {
    fn nonce(&self) -> String {
        NONCE.to_owned()
    }
}

struct FixedAddress(Option<Ipv4Addr>);

impl AddressResolver for FixedAddress {
    fn local_ipv4(&self) -> Option<Ipv4Addr> {
        self.0
    }
}

fn native_order() -> UnifiedOrder {
    let mut order = UnifiedOrder::new(KEY)
        .with_nonce_source(FixedNonce)
        .with_address_resolver(FixedAddress(Some(Ipv4Addr::new(123, 12, 12, 123))));
    order
        .appid("wxd930ea5d5a258f4f")
        .mch_id("10000100")
        .sub_mch_id("1900000109")
        .body("Ipad mini 16G")
        .out_trade_no("20150806125346")
        .total_fee(888)
        .notify_url("https://example.com/wxpay/notify")
        .trade_type(TradeType::Native)
        .product_id("12235413214070356458058");
    order
}

#[test]
fn test_native_order_end_to_end() {
    let mut order = native_order();
    let signed = order.finalize().expect("complete order should finalize");

    assert_eq!(signed.sign(), EXPECTED_SIGN);
    assert_eq!(signed.nonce(), Some(NONCE));
    assert_eq!(signed.spbill_create_ip(), Some(Ipv4Addr::new(123, 12, 12, 123)));
    assert!(SignKey::new(KEY).verify(signed.as_fields()));

    let document = signed.to_xml(Some("xml")).expect("ASCII document should encode");
    let expected = concat!(
        "<xml>",
        "<appid>wxd930ea5d5a258f4f</appid>",
        "<body>Ipad mini 16G</body>",
        "<mch_id>10000100</mch_id>",
        "<nonce_str>5K8264ILTKCH16CQ2502SI8ZNMTM67</nonce_str>",
        "<notify_url>https://example.com/wxpay/notify</notify_url>",
        "<out_trade_no>20150806125346</out_trade_no>",
        "<product_id>12235413214070356458058</product_id>",
        "<sign>2D29543E42949501F245747E09997FE8</sign>",
        "<spbill_create_ip>123.12.12.123</spbill_create_ip>",
        "<sub_mch_id>1900000109</sub_mch_id>",
        "<total_fee>888</total_fee>",
        "<trade_type>NATIVE</trade_type>",
        "</xml>",
    );
    assert_eq!(document, expected.as_bytes());
}

#[test]
fn test_unwrapped_document_matches_codec() {
    let mut order = native_order();
    let signed = order.finalize().unwrap();

    let bare = xml::encode(signed.as_fields(), None).unwrap();
    assert!(bare.starts_with(b"<appid>wxd930ea5d5a258f4f</appid>"));
    assert!(bare.ends_with(b"<trade_type>NATIVE</trade_type>"));
    assert_eq!(signed.to_xml(None).unwrap(), bare);
}

#[test]
fn test_tampered_field_fails_verification() {
    let mut order = native_order();
    let signed = order.finalize().unwrap();

    let mut fields = signed.as_fields().clone();
    fields.insert("total_fee".to_owned(), 1.into());
    assert!(!SignKey::new(KEY).verify(&fields));
    assert!(!SignKey::new("another-key").verify(signed.as_fields()));
}

#[test]
fn test_lenient_set_then_strict_finalize() {
    let mut order = native_order();
    order.set("total_fee", 0).set("body", "");
    let signed = order.finalize().unwrap();
    assert_eq!(signed.sign(), EXPECTED_SIGN);

    let mut incomplete = UnifiedOrder::new(KEY)
        .with_nonce_source(FixedNonce)
        .with_address_resolver(FixedAddress(None));
    incomplete
        .appid("wxd930ea5d5a258f4f")
        .mch_id("10000100")
        .sub_mch_id("1900000109")
        .body("Ipad mini 16G")
        .out_trade_no("20150806125346")
        .total_fee(888)
        .notify_url("https://example.com/wxpay/notify")
        .trade_type(TradeType::Native);

    match incomplete.finalize() {
        Err(OrderError::MissingRequiredField { field, required }) => {
            assert_eq!(field, "spbill_create_ip");
            assert_eq!(required, RequiredFieldSpec::UNIFIED_ORDER.to_vec());
        }
        other => panic!("expected MissingRequiredField, got {other:?}"),
    }

    incomplete.set("spbill_create_ip", "10.0.0.8");
    assert!(incomplete.finalize().is_ok());
}

#[test]
fn test_non_latin1_value_is_rejected_at_encode() {
    let mut order = native_order();
    order.body("腾讯充值中心-QQ会员充值");
    let signed = order.finalize().expect("signing accepts any text");

    let err = signed.to_xml(Some("xml")).unwrap_err();
    assert!(matches!(err, OrderError::EncodingError(_)));
    assert!(err.to_string().contains("body"));
}

#[test]
fn test_config_file_drives_order_defaults() {
    let path = std::env::temp_dir()
        .join(format!("wxpay-order-config-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
        key_env = "WXPAY_INTEGRATION_TEST_KEY_UNSET"

        [merchant]
        appid = "wxd930ea5d5a258f4f"
        mch_id = "10000100"
        sub_mch_id = "1900000109"
        notify_url = "https://example.com/wxpay/notify"
        "#,
    )
    .unwrap();

    let config = GatewayConfig::from_file(&path);
    std::fs::remove_file(&path).unwrap();
    let config = config.expect("valid configuration file");

    assert_eq!(config.endpoint, wxpay_order::order::UNIFIED_ORDER_URL);
    assert_eq!(config.root(), Some("xml"));
    assert!(matches!(config.new_order(), Err(OrderError::InvalidInput(_))));

    let mut order = UnifiedOrder::new(KEY)
        .with_nonce_source(FixedNonce)
        .with_address_resolver(FixedAddress(Some(Ipv4Addr::new(123, 12, 12, 123))));
    config.merchant.apply(&mut order);
    order
        .body("Ipad mini 16G")
        .out_trade_no("20150806125346")
        .total_fee(888)
        .trade_type(TradeType::Native)
        .product_id("12235413214070356458058");

    assert_eq!(order.finalize().unwrap().sign(), EXPECTED_SIGN);
}
