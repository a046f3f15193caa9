use std::net::Ipv4Addr;

use proptest::prelude::*;

use super::{FixedAddress, FixedNonce};
use crate::{
    error::OrderError,
    order::{FieldSet, FieldValue, RequiredFieldSpec, SignKey, TradeType, UnifiedOrder},
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_finalized_signature_verifies(
        key in "[a-zA-Z0-9]{32}",
        appid in "wx[a-z0-9]{16}",
        mch_id in "[0-9]{10}",
        body in "[ -~]{1,64}",
        out_trade_no in "[A-Za-z0-9]{1,32}",
        total_fee in 1i64..=i64::from(i32::MAX),
        attach in proptest::option::of("[a-z]{1,16}"),
    ) {
        let mut order = UnifiedOrder::new(key.clone())
            .with_nonce_source(FixedNonce("ABC123"))
            .with_address_resolver(FixedAddress(Some(Ipv4Addr::new(10, 1, 2, 3))));
        order
            .appid(appid)
            .mch_id(mch_id)
            .sub_mch_id("1900000109")
            .body(body)
            .out_trade_no(out_trade_no)
            .total_fee(total_fee)
            .notify_url("https://example.com/notify")
            .trade_type(TradeType::Jsapi);
        if let Some(attach) = attach {
            order.attach(attach);
        }

        let signed = order.finalize().expect("complete order must finalize");
        prop_assert!(SignKey::new(key).verify(signed.as_fields()));
    }

    #[test]
    fn test_non_positive_set_never_mutates(
        initial in proptest::option::of(1i64..1_000_000),
        invalid in i64::MIN..=0,
    ) {
        let mut order = UnifiedOrder::new("K");
        if let Some(initial) = initial {
            order.total_fee(initial);
        }
        order.set("total_fee", invalid);

        prop_assert_eq!(order.get("total_fee").and_then(FieldValue::as_int), initial);
    }

    #[test]
    fn test_signature_base_is_sorted(
        pairs in proptest::collection::vec(("[a-zA-Z_]{1,12}", "[A-Za-z0-9]{1,12}"), 0..12),
    ) {
        let key = SignKey::new("K");
        let fields: FieldSet = pairs
            .into_iter()
            .filter(|(k, _)| k != "sign")
            .map(|(k, v)| (k, FieldValue::Text(v)))
            .collect();

        let base = key.signature_base(&fields);
        let segments: Vec<&str> = base.split('&').collect();
        prop_assert_eq!(segments.len(), fields.len() + 1);
        prop_assert_eq!(*segments.last().unwrap(), "key=K");

        let names: Vec<&str> =
            segments[..fields.len()].iter().map(|s| s.split('=').next().unwrap()).collect();
        prop_assert!(names.windows(2).all(|w| w[0].as_bytes() < w[1].as_bytes()));
    }

    #[test]
    fn test_missing_single_field_is_named(index in 0usize..8) {
        let caller_fields = [
            "appid", "mch_id", "sub_mch_id", "body", "out_trade_no", "total_fee", "notify_url",
            "trade_type",
        ];
        let mut order = UnifiedOrder::new("K")
            .with_nonce_source(FixedNonce("N"))
            .with_address_resolver(FixedAddress(Some(Ipv4Addr::new(10, 0, 0, 1))));
        for (i, name) in caller_fields.iter().enumerate() {
            if i == index {
                continue;
            }
            if *name == "total_fee" {
                order.set(name, 1);
            } else if *name == "trade_type" {
                order.set(name, TradeType::App);
            } else {
                order.set(name, "v");
            }
        }

        match order.finalize() {
            Err(OrderError::MissingRequiredField { field, required }) => {
                prop_assert_eq!(field, caller_fields[index]);
                prop_assert_eq!(required, RequiredFieldSpec::UNIFIED_ORDER.to_vec());
            }
            other => prop_assert!(false, "expected MissingRequiredField, got {:?}", other),
        }
    }
}
