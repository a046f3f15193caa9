//! Error types for unified-order assembly and submission.
//!
//! All errors implement the standard [`std::error::Error`] trait via [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Finalize errors** ([`OrderError::MissingRequiredField`], [`OrderError::InvalidAmount`]):
//!   the field set is incomplete or carries an unusable amount
//! - **Encoding errors** ([`OrderError::EncodingError`]): a value cannot be represented in the
//!   ISO-8859-1 wire document
//! - **Network errors** ([`OrderError::HttpError`], [`OrderError::TransportError`]): HTTPS
//!   communication with the gateway failed
//! - **Configuration errors** ([`OrderError::InvalidInput`]): a configuration file or value was
//!   rejected
//!
//! Setting a field never fails. Empty strings and non-positive amounts are dropped at
//! [`UnifiedOrder::set`](crate::order::UnifiedOrder::set) time and the authoritative check
//! happens in [`UnifiedOrder::finalize`](crate::order::UnifiedOrder::finalize).
//!
//! # Examples
//!
//! ```
//! use wxpay_order::error::{OrderError, Result};
//!
//! fn require_https(url: &str) -> Result<&str> {
//!     if !url.starts_with("https://") {
//!         return Err(OrderError::TransportError("URL must use HTTPS".to_owned()));
//!     }
//!     Ok(url)
//! }
//!
//! assert!(require_https("http://api.mch.weixin.qq.com").is_err());
//! ```

use thiserror::Error;

/// Result type alias for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;

/// Errors that can occur while building, encoding or submitting a unified order.
///
/// # Error Recovery
///
/// - **Finalize errors**: supply the missing field or a positive amount and finalize again
/// - **Encoding errors**: replace the offending value with Latin-1 representable text
/// - **Transient errors** ([`HttpError`](Self::HttpError)): the caller owns any retry policy;
///   re-finalizing and resending is always safe
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum OrderError {
    /// A mandatory field was never set and no default exists for it.
    ///
    /// `required` carries the full required list of the request type for diagnostics.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::error::OrderError;
    ///
    /// let err = OrderError::MissingRequiredField {
    ///     field: "body".to_owned(),
    ///     required: vec!["appid".to_owned(), "body".to_owned()],
    /// };
    /// assert_eq!(err.to_string(), "missing required field `body` (required: appid, body)");
    /// ```
    #[error("missing required field `{field}` (required: {})", required.join(", "))]
    MissingRequiredField {
        /// Name of the absent field.
        field: String,
        /// Every field the request type declares mandatory.
        required: Vec<String>,
    },

    /// The amount field is present but is not a positive integer.
    #[error("field `{0}` must be an integer greater than 0")]
    InvalidAmount(String),

    /// A field value cannot be represented in the ISO-8859-1 wire encoding.
    ///
    /// Raised before any bytes reach the transport.
    #[error("cannot encode request document: {0}")]
    EncodingError(String),

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`]: timeouts, refused connections, DNS and TLS failures.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Transport policy violation or unsuccessful gateway status.
    ///
    /// Raised for non-HTTPS or loopback endpoints and for non-2xx responses.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Rejected configuration or input outside the field store.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl OrderError {
    /// Returns `true` when resending the same document may succeed.
    ///
    /// Only network-level failures qualify; everything else needs a caller-side fix.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            Self::MissingRequiredField { .. }
            | Self::InvalidAmount(_)
            | Self::EncodingError(_)
            | Self::TransportError(_)
            | Self::InvalidInput(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_field_display() {
        let error = OrderError::MissingRequiredField {
            field: "sub_mch_id".to_owned(),
            required: vec!["appid".to_owned(), "mch_id".to_owned(), "sub_mch_id".to_owned()],
        };
        assert_eq!(
            error.to_string(),
            "missing required field `sub_mch_id` (required: appid, mch_id, sub_mch_id)"
        );
    }

    #[test]
    fn test_invalid_amount_display() {
        let error = OrderError::InvalidAmount("total_fee".to_owned());
        assert_eq!(error.to_string(), "field `total_fee` must be an integer greater than 0");
    }

    #[test]
    fn test_encoding_error_display() {
        let error = OrderError::EncodingError("field `body` contains '商'".to_owned());
        assert!(error.to_string().starts_with("cannot encode request document"));
    }

    #[test]
    fn test_non_network_errors_are_not_transient() {
        assert!(!OrderError::InvalidAmount("total_fee".into()).is_transient());
        assert!(!OrderError::TransportError("status 500".into()).is_transient());
        assert!(!OrderError::InvalidInput("bad toml".into()).is_transient());
        assert!(!OrderError::EncodingError("x".into()).is_transient());
    }
}
