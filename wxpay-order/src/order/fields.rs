//! Field names, values and the required-field rule set.

use std::fmt;

/// Gateway endpoint for the unified-order operation.
pub const UNIFIED_ORDER_URL: &str = "https://api.mch.weixin.qq.com/pay/unifiedorder";

/// Official account ID assigned by the gateway.
pub const APPID: &str = "appid";
/// Merchant ID.
pub const MCH_ID: &str = "mch_id";
/// Sub-merchant official account ID.
pub const SUB_APPID: &str = "sub_appid";
/// Sub-merchant ID.
pub const SUB_MCH_ID: &str = "sub_mch_id";
/// Terminal or store device ID (`WEB` for web and official-account payments).
pub const DEVICE_INFO: &str = "device_info";
/// Random replay-defense string.
pub const NONCE_STR: &str = "nonce_str";
/// Request signature.
pub const SIGN: &str = "sign";
/// Short order description.
pub const BODY: &str = "body";
/// Goods detail list.
pub const DETAIL: &str = "detail";
/// Merchant data echoed back in queries and notifications.
pub const ATTACH: &str = "attach";
/// Merchant-side order number.
pub const OUT_TRADE_NO: &str = "out_trade_no";
/// ISO 4217 currency code, `CNY` when absent.
pub const FEE_TYPE: &str = "fee_type";
/// Order total in cents.
pub const TOTAL_FEE: &str = "total_fee";
/// Originating terminal IP.
pub const SPBILL_CREATE_IP: &str = "spbill_create_ip";
/// Order creation time, `yyyyMMddHHmmss`.
pub const TIME_START: &str = "time_start";
/// Order expiry time, `yyyyMMddHHmmss`.
pub const TIME_EXPIRE: &str = "time_expire";
/// Coupon goods tag.
pub const GOODS_TAG: &str = "goods_tag";
/// Asynchronous notification callback URL.
pub const NOTIFY_URL: &str = "notify_url";
/// Trade type, see [`TradeType`].
pub const TRADE_TYPE: &str = "trade_type";
/// Product ID carried in the QR code; mandatory for `NATIVE` at the gateway.
pub const PRODUCT_ID: &str = "product_id";
/// Payment method restriction, e.g. `no_credit`.
pub const LIMIT_PAY: &str = "limit_pay";
/// Payer's ID under `appid`; mandatory for `JSAPI` at the gateway.
pub const OPENID: &str = "openid";
/// Payer's ID under `sub_appid`.
pub const SUB_OPENID: &str = "sub_openid";

/// A single field value.
///
/// Integers render in base-10 with no leading zeros or separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Verbatim text.
    Text(String),
    /// Integer value, stored only when greater than zero.
    Int(i64),
}

impl FieldValue {
    /// Returns `true` if the value may be stored.
    ///
    /// Empty text and non-positive integers are never stored.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Int(n) => *n > 0,
        }
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<TradeType> for FieldValue {
    fn from(value: TradeType) -> Self {
        Self::Text(value.as_str().to_owned())
    }
}

/// Trade type accepted by the unified-order endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeType {
    /// In-app browser (official account) payment.
    Jsapi,
    /// QR-code payment.
    Native,
    /// Mobile app payment.
    App,
}

impl TradeType {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Jsapi => "JSAPI",
            Self::Native => "NATIVE",
            Self::App => "APP",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeType {
    type Err = crate::error::OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JSAPI" => Ok(Self::Jsapi),
            "NATIVE" => Ok(Self::Native),
            "APP" => Ok(Self::App),
            other => Err(crate::error::OrderError::InvalidInput(format!(
                "unknown trade type: {other}"
            ))),
        }
    }
}

/// Fixed set of field names a request type declares mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredFieldSpec {
    names: &'static [&'static str],
    amount: Option<&'static str>,
}

impl RequiredFieldSpec {
    /// Mandatory fields of the unified-order request.
    ///
    /// `sub_mch_id` is required for every trade type, including direct-merchant flows.
    pub const UNIFIED_ORDER: Self = Self {
        names: &[
            APPID,
            MCH_ID,
            SUB_MCH_ID,
            NONCE_STR,
            SIGN,
            BODY,
            OUT_TRADE_NO,
            TOTAL_FEE,
            SPBILL_CREATE_IP,
            NOTIFY_URL,
            TRADE_TYPE,
        ],
        amount: Some(TOTAL_FEE),
    };

    /// Returns the mandatory names in declaration order.
    #[must_use]
    pub const fn names(&self) -> &'static [&'static str] {
        self.names
    }

    /// Returns the field that must hold a positive integer, if the request type has one.
    #[must_use]
    pub const fn amount_field(&self) -> Option<&'static str> {
        self.amount
    }

    /// Returns `true` if `name` is mandatory.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name)
    }

    /// Returns owned copies of every mandatory name, for diagnostics.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().map(|&n| n.to_owned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_order_required_fields() {
        let spec = RequiredFieldSpec::UNIFIED_ORDER;
        assert_eq!(spec.names().len(), 11);
        assert!(spec.contains(SUB_MCH_ID));
        assert!(spec.contains(SIGN));
        assert!(!spec.contains(SUB_APPID));
        assert!(!spec.contains(OPENID));
        assert_eq!(spec.to_vec()[0], "appid");
        assert_eq!(spec.amount_field(), Some(TOTAL_FEE));
    }

    #[test]
    fn test_field_value_storable() {
        assert!(FieldValue::from("wx1").is_storable());
        assert!(!FieldValue::from("").is_storable());
        assert!(FieldValue::from(1).is_storable());
        assert!(!FieldValue::from(0).is_storable());
        assert!(!FieldValue::from(-5).is_storable());
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::from(888).to_string(), "888");
        assert_eq!(FieldValue::from("Ipad mini  16G").to_string(), "Ipad mini  16G");
    }

    #[test]
    fn test_trade_type_round_trip_names() {
        assert_eq!(TradeType::Native.as_str(), "NATIVE");
        assert_eq!("jsapi".parse::<TradeType>().unwrap(), TradeType::Jsapi);
        assert_eq!("APP".parse::<TradeType>().unwrap(), TradeType::App);
        assert!("MWEB".parse::<TradeType>().is_err());
        assert_eq!(FieldValue::from(TradeType::App), FieldValue::Text("APP".to_owned()));
    }
}
