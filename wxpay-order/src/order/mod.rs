//! Signed field store for unified-order requests.
//!
//! [`UnifiedOrder`] accumulates request parameters and turns them into a signed,
//! validated [`SignedFields`] document in a single [`finalize`](UnifiedOrder::finalize) step.
//!
//! # Two-tier validation
//!
//! Accumulation is lenient: [`UnifiedOrder::set`] silently drops empty strings and
//! integers `<= 0`, and never removes a value that is already stored. Finalization is
//! strict: every mandatory field must be present and the amount must be a positive
//! integer, otherwise an error names the offending field.
//!
//! # Finalize steps
//!
//! 1. Inject a random 30-character `nonce_str` if unset.
//! 2. Inject the local IPv4 address as `spbill_create_ip` if unset and resolvable.
//! 3. Recompute `sign` over the current fields, replacing any stored value.
//! 4. Check presence of every required field, then the amount.
//!
//! # Examples
//!
//! ```rust
//! use wxpay_order::order::{TradeType, UnifiedOrder};
//!
//! # fn example() -> wxpay_order::error::Result<()> {
//! let mut order = UnifiedOrder::new("192006250b4c09247ec02edce69f6a2d");
//! order
//!     .appid("wxd930ea5d5a258f4f")
//!     .mch_id("10000100")
//!     .sub_mch_id("1230000109")
//!     .body("Ipad mini 16G")
//!     .out_trade_no("20150806125346")
//!     .total_fee(888)
//!     .notify_url("https://example.com/wxpay/notify")
//!     .trade_type(TradeType::Native)
//!     .product_id("12235413214070356458058");
//!
//! let signed = order.finalize()?;
//! assert_eq!(signed.sign().len(), 32);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! One builder corresponds to one in-flight request. Mutation and finalization take
//! `&mut self`; share a builder across tasks only behind external synchronization.

use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use tracing::{debug, instrument, warn};

use crate::error::{OrderError, Result};

pub mod defaults;
pub mod fields;
pub mod sign;

pub use defaults::{AddressResolver, InterfaceResolver, NonceSource, RandomNonce};
pub use fields::{FieldValue, RequiredFieldSpec, TradeType, UNIFIED_ORDER_URL};
pub use sign::SignKey;

use fields::{
    APPID, ATTACH, BODY, DETAIL, DEVICE_INFO, FEE_TYPE, GOODS_TAG, LIMIT_PAY, MCH_ID, NONCE_STR,
    NOTIFY_URL, OPENID, OUT_TRADE_NO, PRODUCT_ID, SIGN, SPBILL_CREATE_IP, SUB_APPID, SUB_MCH_ID,
    SUB_OPENID, TIME_EXPIRE, TIME_START, TOTAL_FEE, TRADE_TYPE,
};

/// Request parameters keyed by field name.
///
/// Iteration is in byte-wise ascending name order, which is both the signing order and
/// the rendering order.
pub type FieldSet = BTreeMap<String, FieldValue>;

/// Builder for a signed unified-order request.
pub struct UnifiedOrder {
    fields: FieldSet,
    key: SignKey,
    required: RequiredFieldSpec,
    nonce_source: Box<dyn NonceSource>,
    address_resolver: Box<dyn AddressResolver>,
}

impl fmt::Debug for UnifiedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiedOrder")
            .field("fields", &self.fields)
            .field("key", &self.key)
            .field("required", &self.required.names())
            .finish_non_exhaustive()
    }
}

impl UnifiedOrder {
    /// Creates an empty builder signing with the merchant API `key`.
    ///
    /// Defaults come from [`RandomNonce`] and [`InterfaceResolver`].
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_key(SignKey::new(key))
    }

    /// Creates an empty builder signing with an already constructed [`SignKey`].
    #[must_use]
    pub fn with_key(key: SignKey) -> Self {
        Self {
            fields: FieldSet::new(),
            key,
            required: RequiredFieldSpec::UNIFIED_ORDER,
            nonce_source: Box::new(RandomNonce),
            address_resolver: Box::new(InterfaceResolver),
        }
    }

    /// Replaces the nonce generator.
    #[must_use]
    pub fn with_nonce_source(mut self, source: impl NonceSource + 'static) -> Self {
        self.nonce_source = Box::new(source);
        self
    }

    /// Replaces the originating-IP resolver.
    #[must_use]
    pub fn with_address_resolver(mut self, resolver: impl AddressResolver + 'static) -> Self {
        self.address_resolver = Box::new(resolver);
        self
    }

    /// Returns the gateway endpoint for this request type.
    #[must_use]
    pub const fn url(&self) -> &'static str {
        UNIFIED_ORDER_URL
    }

    /// Returns the mandatory-field rule set.
    #[must_use]
    pub const fn required(&self) -> &RequiredFieldSpec {
        &self.required
    }

    /// Stores `value` under `name` if it is storable.
    ///
    /// This call never fails. Empty strings and integers `<= 0` are ignored and leave any
    /// previously stored value untouched; [`finalize`](Self::finalize) reports whatever is
    /// still missing or invalid at that point.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::order::{FieldValue, UnifiedOrder};
    ///
    /// let mut order = UnifiedOrder::new("key");
    /// order.set("total_fee", 888).set("total_fee", 0).set("total_fee", -5);
    /// assert_eq!(order.get("total_fee"), Some(&FieldValue::Int(888)));
    /// ```
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> &mut Self {
        let value = value.into();
        if value.is_storable() {
            self.fields.insert(name.to_owned(), value);
        } else {
            debug!(field = name, "ignored empty or non-positive value");
        }
        self
    }

    /// Returns the stored value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns every stored field.
    #[must_use]
    pub const fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Sets `appid`, the official account ID.
    pub fn appid(&mut self, appid: impl Into<String>) -> &mut Self {
        self.set(APPID, appid.into())
    }

    /// Sets `mch_id`, the merchant ID.
    pub fn mch_id(&mut self, mch_id: impl Into<String>) -> &mut Self {
        self.set(MCH_ID, mch_id.into())
    }

    /// Sets `sub_appid`.
    pub fn sub_appid(&mut self, sub_appid: impl Into<String>) -> &mut Self {
        self.set(SUB_APPID, sub_appid.into())
    }

    /// Sets `sub_mch_id`, mandatory for every trade type.
    pub fn sub_mch_id(&mut self, sub_mch_id: impl Into<String>) -> &mut Self {
        self.set(SUB_MCH_ID, sub_mch_id.into())
    }

    /// Sets `device_info`.
    pub fn device_info(&mut self, device_info: impl Into<String>) -> &mut Self {
        self.set(DEVICE_INFO, device_info.into())
    }

    /// Sets `body`, the short order description.
    pub fn body(&mut self, body: impl Into<String>) -> &mut Self {
        self.set(BODY, body.into())
    }

    /// Sets `detail`.
    pub fn detail(&mut self, detail: impl Into<String>) -> &mut Self {
        self.set(DETAIL, detail.into())
    }

    /// Sets `attach`.
    pub fn attach(&mut self, attach: impl Into<String>) -> &mut Self {
        self.set(ATTACH, attach.into())
    }

    /// Sets `out_trade_no`, the merchant order number.
    pub fn out_trade_no(&mut self, out_trade_no: impl Into<String>) -> &mut Self {
        self.set(OUT_TRADE_NO, out_trade_no.into())
    }

    /// Sets `fee_type`.
    pub fn fee_type(&mut self, fee_type: impl Into<String>) -> &mut Self {
        self.set(FEE_TYPE, fee_type.into())
    }

    /// Sets `total_fee` in cents. Values `<= 0` are ignored.
    pub fn total_fee(&mut self, total_fee: i64) -> &mut Self {
        self.set(TOTAL_FEE, total_fee)
    }

    /// Sets `time_start` (`yyyyMMddHHmmss`).
    pub fn time_start(&mut self, time_start: impl Into<String>) -> &mut Self {
        self.set(TIME_START, time_start.into())
    }

    /// Sets `time_expire` (`yyyyMMddHHmmss`).
    pub fn time_expire(&mut self, time_expire: impl Into<String>) -> &mut Self {
        self.set(TIME_EXPIRE, time_expire.into())
    }

    /// Sets `goods_tag`.
    pub fn goods_tag(&mut self, goods_tag: impl Into<String>) -> &mut Self {
        self.set(GOODS_TAG, goods_tag.into())
    }

    /// Sets `notify_url`, the asynchronous callback address.
    pub fn notify_url(&mut self, notify_url: impl Into<String>) -> &mut Self {
        self.set(NOTIFY_URL, notify_url.into())
    }

    /// Sets `trade_type`.
    pub fn trade_type(&mut self, trade_type: TradeType) -> &mut Self {
        self.set(TRADE_TYPE, trade_type)
    }

    /// Sets `product_id`.
    pub fn product_id(&mut self, product_id: impl Into<String>) -> &mut Self {
        self.set(PRODUCT_ID, product_id.into())
    }

    /// Sets `limit_pay`.
    pub fn limit_pay(&mut self, limit_pay: impl Into<String>) -> &mut Self {
        self.set(LIMIT_PAY, limit_pay.into())
    }

    /// Sets `openid`.
    pub fn openid(&mut self, openid: impl Into<String>) -> &mut Self {
        self.set(OPENID, openid.into())
    }

    /// Sets `sub_openid`.
    pub fn sub_openid(&mut self, sub_openid: impl Into<String>) -> &mut Self {
        self.set(SUB_OPENID, sub_openid.into())
    }

    /// Injects defaults, signs and validates the field set.
    ///
    /// Injected defaults are stored in the builder, so finalizing again without an
    /// intervening [`set`](Self::set) reproduces the same nonce, IP and signature.
    ///
    /// # Errors
    ///
    /// - [`OrderError::MissingRequiredField`] for the first absent mandatory field
    /// - [`OrderError::InvalidAmount`] if `total_fee` is not an integer greater than 0
    #[instrument(skip(self), fields(field_count = self.fields.len()))]
    pub fn finalize(&mut self) -> Result<SignedFields> {
        self.inject_defaults();

        let sign = self.key.sign(&self.fields);
        self.fields.insert(SIGN.to_owned(), FieldValue::Text(sign));

        self.validate()?;
        debug!(field_count = self.fields.len(), "unified order finalized");

        Ok(SignedFields { fields: self.fields.clone() })
    }

    fn inject_defaults(&mut self) {
        if !self.fields.contains_key(NONCE_STR) {
            let nonce = self.nonce_source.nonce();
            debug!("injected default nonce_str");
            self.set(NONCE_STR, nonce);
        }

        if !self.fields.contains_key(SPBILL_CREATE_IP) {
            match self.address_resolver.local_ipv4() {
                Some(ip) => {
                    debug!(%ip, "injected default spbill_create_ip");
                    self.set(SPBILL_CREATE_IP, ip.to_string());
                }
                None => warn!("no local IPv4 address found, spbill_create_ip left unset"),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(&missing) =
            self.required.names().iter().find(|&&name| !self.fields.contains_key(name))
        {
            return Err(OrderError::MissingRequiredField {
                field: missing.to_owned(),
                required: self.required.to_vec(),
            });
        }

        if let Some(amount) = self.required.amount_field() {
            let valid = self.fields.get(amount).and_then(FieldValue::as_int).is_some_and(|n| n > 0);
            if !valid {
                return Err(OrderError::InvalidAmount(amount.to_owned()));
            }
        }

        Ok(())
    }
}

/// Finalized, signed and validated request fields.
///
/// Immutable; hand it to [`codec::xml::encode`](crate::codec::xml::encode) or
/// [`to_xml`](Self::to_xml) to produce the wire document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFields {
    fields: FieldSet,
}

impl SignedFields {
    /// Returns the signature.
    #[must_use]
    pub fn sign(&self) -> &str {
        match self.fields.get(SIGN) {
            Some(FieldValue::Text(sign)) => sign,
            _ => "",
        }
    }

    /// Returns the nonce.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.text(NONCE_STR)
    }

    /// Returns the originating IP.
    #[must_use]
    pub fn spbill_create_ip(&self) -> Option<Ipv4Addr> {
        self.text(SPBILL_CREATE_IP).and_then(|ip| ip.parse().ok())
    }

    /// Returns the value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns every field.
    #[must_use]
    pub const fn as_fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the fields as an ISO-8859-1 XML document.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::EncodingError`] if a value is not Latin-1 representable.
    pub fn to_xml(&self, root: Option<&str>) -> Result<Vec<u8>> {
        crate::codec::xml::encode(&self.fields, root)
    }

    fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unreachable,
    reason = "test code uses unreachable for expected-path assertions"
)]
mod tests {
    mod proptest_signing;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use md5::Digest as _;

    use super::*;

    struct FixedNonce(pub &'static str);

    impl NonceSource for FixedNonce {
        fn nonce(&self) -> String {
            self.0.to_owned()
        }
    }

    struct FixedAddress(pub Option<Ipv4Addr>);

    impl AddressResolver for FixedAddress {
        fn local_ipv4(&self) -> Option<Ipv4Addr> {
            self.0
        }
    }

    struct CountingNonce(AtomicUsize);

    impl NonceSource for CountingNonce {
        fn nonce(&self) -> String {
            format!("NONCE{}", self.0.fetch_add(1, Ordering::Relaxed))
        }
    }

    fn complete_order(key: &str) -> UnifiedOrder {
        let mut order = UnifiedOrder::new(key)
            .with_nonce_source(FixedNonce("5K8264ILTKCH16CQ2502SI8ZNMTM67"))
            .with_address_resolver(FixedAddress(Some(Ipv4Addr::new(123, 12, 12, 123))));
        order
            .appid("wxd678efh567hg6787")
            .mch_id("1230000109")
            .sub_mch_id("1900000109")
            .body("Ipad mini 16G")
            .out_trade_no("20150806125346")
            .total_fee(888)
            .notify_url("https://www.example.com/wxpay/pay.php")
            .trade_type(TradeType::Native);
        order
    }

    /// Signature computed without the crate's signing code.
    fn independent_sign(fields: &FieldSet, key: &str) -> String {
        let mut names: Vec<&String> = fields.keys().filter(|k| k.as_str() != "sign").collect();
        names.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        let mut base = String::new();
        for name in names {
            base += &format!("{name}={}&", fields[name]);
        }
        base += &format!("key={key}");
        hex::encode(md5::Md5::digest(base.as_bytes())).to_uppercase()
    }

    #[test]
    fn test_finalize_complete_order() {
        let mut order = complete_order("secret");
        let signed = order.finalize().expect("complete order should finalize");

        assert_eq!(signed.nonce(), Some("5K8264ILTKCH16CQ2502SI8ZNMTM67"));
        assert_eq!(signed.spbill_create_ip(), Some(Ipv4Addr::new(123, 12, 12, 123)));
        assert_eq!(signed.sign(), independent_sign(signed.as_fields(), "secret"));
        assert!(SignKey::new("secret").verify(signed.as_fields()));
        for name in RequiredFieldSpec::UNIFIED_ORDER.names() {
            assert!(signed.get(name).is_some(), "{name} should be present");
        }
    }

    #[test]
    fn test_missing_each_required_field() {
        let mandatory_caller_fields = [
            APPID,
            MCH_ID,
            SUB_MCH_ID,
            BODY,
            OUT_TRADE_NO,
            TOTAL_FEE,
            NOTIFY_URL,
            TRADE_TYPE,
        ];
        for missing in mandatory_caller_fields {
            let mut order = complete_order("secret");
            order.fields.remove(missing);

            let Err(OrderError::MissingRequiredField { field, required }) = order.finalize() else {
                unreachable!("expected MissingRequiredField for {missing}")
            };
            assert_eq!(field, missing);
            assert_eq!(required, RequiredFieldSpec::UNIFIED_ORDER.to_vec());
        }
    }

    #[test]
    fn test_missing_ip_when_unresolvable() {
        let mut order = complete_order("secret").with_address_resolver(FixedAddress(None));

        let Err(OrderError::MissingRequiredField { field, .. }) = order.finalize() else {
            unreachable!("expected MissingRequiredField")
        };
        assert_eq!(field, SPBILL_CREATE_IP);
        assert!(order.get(SPBILL_CREATE_IP).is_none(), "no placeholder may be stored");
    }

    #[test]
    fn test_missing_nonce_when_source_yields_empty() {
        let mut order = complete_order("secret").with_nonce_source(FixedNonce(""));

        let Err(OrderError::MissingRequiredField { field, .. }) = order.finalize() else {
            unreachable!("expected MissingRequiredField")
        };
        assert_eq!(field, NONCE_STR);
    }

    #[test]
    fn test_caller_supplied_defaults_are_kept() {
        let mut order = complete_order("secret");
        order.set(NONCE_STR, "CALLERNONCE").set(SPBILL_CREATE_IP, "8.8.8.8");

        let signed = order.finalize().unwrap();
        assert_eq!(signed.nonce(), Some("CALLERNONCE"));
        assert_eq!(signed.spbill_create_ip(), Some(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn test_set_ignores_invalid_amounts() {
        let mut order = UnifiedOrder::new("secret");
        order.set(TOTAL_FEE, 0).set(TOTAL_FEE, -5);
        assert!(order.get(TOTAL_FEE).is_none());

        order.total_fee(100).total_fee(0).total_fee(-5);
        assert_eq!(order.get(TOTAL_FEE), Some(&FieldValue::Int(100)));
    }

    #[test]
    fn test_set_ignores_empty_strings() {
        let mut order = UnifiedOrder::new("secret");
        order.body("");
        assert!(order.get(BODY).is_none());

        order.body("first").body("");
        assert_eq!(order.get(BODY), Some(&FieldValue::Text("first".to_owned())));
    }

    #[test]
    fn test_text_amount_is_invalid() {
        let mut order = complete_order("secret");
        order.fields.remove(TOTAL_FEE);
        order.set(TOTAL_FEE, "888");

        let Err(OrderError::InvalidAmount(name)) = order.finalize() else {
            unreachable!("expected InvalidAmount")
        };
        assert_eq!(name, TOTAL_FEE);
    }

    #[test]
    fn test_non_positive_amount_bypassing_set_is_invalid() {
        let mut order = complete_order("secret");
        order.fields.insert(TOTAL_FEE.to_owned(), FieldValue::Int(0));

        assert!(matches!(order.finalize(), Err(OrderError::InvalidAmount(_))));
    }

    #[test]
    fn test_finalize_twice_is_stable() {
        let mut order = complete_order("secret")
            .with_nonce_source(CountingNonce(AtomicUsize::new(0)));

        let first = order.finalize().unwrap();
        let second = order.finalize().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.nonce(), Some("NONCE0"));
    }

    #[test]
    fn test_resign_after_change() {
        let mut order = complete_order("secret");
        let first = order.finalize().unwrap();

        order.attach("store 12");
        let second = order.finalize().unwrap();

        assert_ne!(first.sign(), second.sign());
        assert_eq!(second.sign(), independent_sign(second.as_fields(), "secret"));
    }

    #[test]
    fn test_stale_sign_is_overwritten() {
        let mut order = complete_order("secret");
        order.set(SIGN, "C380BEC2BFD727A4B6845133519F3AD6");

        let signed = order.finalize().unwrap();
        assert_ne!(signed.sign(), "C380BEC2BFD727A4B6845133519F3AD6");
        assert!(SignKey::new("secret").verify(signed.as_fields()));
    }

    #[test]
    fn test_random_defaults_produce_distinct_signatures() {
        let build = || {
            let mut order = complete_order("secret").with_nonce_source(RandomNonce);
            order.finalize().unwrap()
        };
        let (a, b) = (build(), build());

        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a.sign(), b.sign());
        assert!(SignKey::new("secret").verify(a.as_fields()));
        assert!(SignKey::new("secret").verify(b.as_fields()));
    }

    #[test]
    fn test_optional_setters_store_values() {
        let mut order = UnifiedOrder::new("secret");
        order
            .sub_appid("wx-sub")
            .device_info("WEB")
            .detail("detail")
            .fee_type("CNY")
            .time_start("20091225091010")
            .time_expire("20091227091010")
            .goods_tag("WXG")
            .limit_pay("no_credit")
            .openid("oUpF8uMuAJO_M2pxb1Q9zNjWeS6o")
            .sub_openid("oUpF8uMuAJO_M2pxb1Q9zNjWeS6p")
            .product_id("12235413214070356458058");

        assert_eq!(order.fields().len(), 11);
        assert_eq!(order.get(DEVICE_INFO), Some(&FieldValue::Text("WEB".to_owned())));
        assert_eq!(order.url(), "https://api.mch.weixin.qq.com/pay/unifiedorder");
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let order = UnifiedOrder::new("very-secret-key");
        let debug = format!("{order:?}");
        assert!(debug.contains("UnifiedOrder"));
        assert!(!debug.contains("very-secret-key"));
    }
}
