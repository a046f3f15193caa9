//! Request signing with the merchant API key.
//!
//! The signature base string is every field except `sign`, in byte-wise ascending
//! name order, rendered as `name=value&`, followed by `key=<secret>`. The signature
//! is the MD5 digest of that string's UTF-8 bytes as 32 uppercase hex characters.
//!
//! ```text
//! {b=2, a=1}, secret "K"  ->  "a=1&b=2&key=K"  ->  B41AB19144A0A94A02D36EFEF0782AA5
//! ```

use std::{fmt, fmt::Write as _};

use md5::{Digest, Md5};
use subtle::ConstantTimeEq;
use tracing::instrument;
use zeroize::Zeroizing;

use crate::order::{FieldSet, FieldValue, fields::SIGN};

/// Merchant API key used as trailing material of the signature base string.
///
/// The secret is zeroized on drop and never printed by `Debug`.
pub struct SignKey {
    secret: Zeroizing<String>,
}

impl fmt::Debug for SignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignKey").field("secret", &"<redacted>").finish()
    }
}

impl SignKey {
    /// Wraps a merchant API key.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::order::SignKey;
    ///
    /// let key = SignKey::new("192006250b4c09247ec02edce69f6a2d");
    /// assert!(!format!("{key:?}").contains("1920"));
    /// ```
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: Zeroizing::new(secret.into()) }
    }

    /// Builds the signature base string over `fields`.
    ///
    /// The result contains the secret and is zeroized on drop.
    #[must_use]
    pub fn signature_base(&self, fields: &FieldSet) -> Zeroizing<String> {
        let mut base = Zeroizing::new(String::new());
        for (name, value) in fields.iter().filter(|(name, _)| name.as_str() != SIGN) {
            // Writing to a String cannot fail.
            let _ = write!(base, "{name}={value}&");
        }
        base.push_str("key=");
        base.push_str(&self.secret);
        base
    }

    /// Computes the signature over `fields`, ignoring any stored `sign`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::order::{FieldSet, FieldValue, SignKey};
    ///
    /// let mut fields = FieldSet::new();
    /// fields.insert("b".to_owned(), FieldValue::Int(2));
    /// fields.insert("a".to_owned(), FieldValue::Int(1));
    ///
    /// let key = SignKey::new("K");
    /// assert_eq!(key.sign(&fields), "B41AB19144A0A94A02D36EFEF0782AA5");
    /// ```
    #[instrument(skip_all, fields(field_count = fields.len()))]
    #[must_use]
    pub fn sign(&self, fields: &FieldSet) -> String {
        let base = self.signature_base(fields);
        hex::encode_upper(Md5::digest(base.as_bytes()))
    }

    /// Checks the stored `sign` of `fields` against a fresh computation.
    ///
    /// Returns `false` when no text `sign` is present. Comparison is constant-time.
    #[must_use]
    pub fn verify(&self, fields: &FieldSet) -> bool {
        let Some(FieldValue::Text(stored)) = fields.get(SIGN) else {
            return false;
        };
        let expected = self.sign(fields);
        bool::from(expected.as_bytes().ct_eq(stored.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldSet {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn test_signature_base_sorted() {
        let key = SignKey::new("K");
        let set = fields(&[("b", FieldValue::Int(2)), ("a", FieldValue::Int(1))]);
        assert_eq!(key.signature_base(&set).as_str(), "a=1&b=2&key=K");
    }

    #[test]
    fn test_signature_base_empty_set() {
        let key = SignKey::new("K");
        assert_eq!(key.signature_base(&FieldSet::new()).as_str(), "key=K");
        assert_eq!(key.sign(&FieldSet::new()), "2C1129B9DEF095B8B55576BFFC9580BD");
    }

    #[test]
    fn test_signature_base_excludes_sign() {
        let key = SignKey::new("K");
        let set = fields(&[
            ("a", FieldValue::Int(1)),
            ("sign", FieldValue::Text("OLD".to_owned())),
            ("b", FieldValue::Int(2)),
        ]);
        assert_eq!(key.signature_base(&set).as_str(), "a=1&b=2&key=K");
    }

    #[test]
    fn test_signature_base_byte_order_not_locale() {
        let key = SignKey::new("K");
        let set = fields(&[
            ("b", FieldValue::from("x")),
            ("B", FieldValue::from("y")),
            ("a_b", FieldValue::from("z")),
            ("ab", FieldValue::from("w")),
        ]);
        // '_' (0x5F) sorts before 'b' (0x62), uppercase before lowercase
        assert_eq!(key.signature_base(&set).as_str(), "B=y&a_b=z&ab=w&b=x&key=K");
    }

    #[test]
    fn test_sign_gateway_documented_vector() {
        let key = SignKey::new("192006250b4c09247ec02edce69f6a2d");
        let set = fields(&[
            ("appid", FieldValue::from("wxd930ea5d5a258f4f")),
            ("mch_id", FieldValue::from("10000100")),
            ("device_info", FieldValue::from("1000")),
            ("body", FieldValue::from("test")),
            ("nonce_str", FieldValue::from("ibuaiVcKdpRxkhJA")),
        ]);
        assert_eq!(key.sign(&set), "9A0A8659F005D6984697E2CA0A9CF3B7");
    }

    #[test]
    fn test_sign_is_32_uppercase_hex() {
        let key = SignKey::new("secret");
        let sig = key.sign(&fields(&[("appid", FieldValue::from("wx1"))]));
        assert_eq!(sig, "B80994438D7954C021B3DEE59C34021A");
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_verify() {
        let key = SignKey::new("K");
        let mut set = fields(&[("a", FieldValue::Int(1)), ("b", FieldValue::Int(2))]);
        assert!(!key.verify(&set), "missing sign must not verify");

        set.insert(SIGN.to_owned(), FieldValue::Text(key.sign(&set)));
        assert!(key.verify(&set));

        set.insert("a".to_owned(), FieldValue::Int(3));
        assert!(!key.verify(&set), "tampered field must not verify");

        assert!(!SignKey::new("other").verify(&set));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", SignKey::new("super-secret"));
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("super-secret"));
    }
}
