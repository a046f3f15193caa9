//! Gateway configuration loaded from TOML.
//!
//! The signing secret never lives in the file. [`GatewayConfig::key_env`] names the
//! environment variable that holds it.
//!
//! # Examples
//!
//! ```
//! use wxpay_order::config::GatewayConfig;
//!
//! let config = GatewayConfig::from_toml(
//!     r#"
//!     [merchant]
//!     appid = "wxd930ea5d5a258f4f"
//!     mch_id = "10000100"
//!     sub_mch_id = "1900000109"
//!     notify_url = "https://example.com/wxpay/notify"
//!
//!     [http]
//!     timeout_secs = 15
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.endpoint, "https://api.mch.weixin.qq.com/pay/unifiedorder");
//! assert_eq!(config.key_env, "WXPAY_KEY");
//! assert_eq!(config.root(), Some("xml"));
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::{
    codec::{DEFAULT_ROOT, xml},
    error::{OrderError, Result},
    order::{SignKey, UNIFIED_ORDER_URL, UnifiedOrder},
    transport::{HttpConfig, HttpTransport, http::parse_endpoint},
};

/// Top-level gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Unified-order endpoint; must be HTTPS.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the signing secret.
    #[serde(default = "default_key_env")]
    pub key_env: String,

    /// Root element of the request document; empty for none.
    #[serde(default = "default_root_element")]
    pub root_element: String,

    /// Merchant identity applied to every order.
    #[serde(default)]
    pub merchant: MerchantDefaults,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            key_env: default_key_env(),
            root_element: default_root_element(),
            merchant: MerchantDefaults::default(),
            http: HttpConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidInput`] if the TOML is malformed or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| OrderError::InvalidInput(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidInput`] if the file cannot be read or is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OrderError::InvalidInput(format!("cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Checks the endpoint policy, the secret variable name, the root element and the
    /// HTTP bounds.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidInput`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        parse_endpoint(&self.endpoint).map_err(|e| match e {
            OrderError::TransportError(msg) | OrderError::InvalidInput(msg) => {
                OrderError::InvalidInput(format!("endpoint: {msg}"))
            }
            other => other,
        })?;

        if !is_env_var_name(&self.key_env) {
            return Err(OrderError::InvalidInput(format!(
                "key_env `{}` is not a valid environment variable name",
                self.key_env
            )));
        }

        xml::to_latin1(&self.root_element).map_err(|e| match e {
            OrderError::EncodingError(msg) => {
                OrderError::InvalidInput(format!("root_element: {msg}"))
            }
            other => other,
        })?;

        self.http.validate()
    }

    /// Returns the root element name, or `None` when documents are unwrapped.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        Some(self.root_element.as_str()).filter(|r| !r.is_empty())
    }

    /// Reads the signing secret from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidInput`] if the variable is unset or empty.
    pub fn load_key(&self) -> Result<SignKey> {
        self.load_key_with(|name| std::env::var(name).ok())
    }

    pub(crate) fn load_key_with<F>(&self, lookup: F) -> Result<SignKey>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        match lookup(&self.key_env) {
            Some(secret) if !secret.is_empty() => {
                debug!(key_env = %self.key_env, "loaded signing key");
                Ok(SignKey::new(secret))
            }
            Some(_) => Err(OrderError::InvalidInput(format!(
                "environment variable {} is empty",
                self.key_env
            ))),
            None => Err(OrderError::InvalidInput(format!(
                "environment variable {} is not set",
                self.key_env
            ))),
        }
    }

    /// Creates a builder signed with the environment secret and pre-filled with the
    /// merchant defaults.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::InvalidInput`] if the secret cannot be loaded.
    pub fn new_order(&self) -> Result<UnifiedOrder> {
        let mut order = UnifiedOrder::with_key(self.load_key()?);
        self.merchant.apply(&mut order);
        Ok(order)
    }

    /// Builds the HTTP transport described by the `[http]` table.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::HttpError`] if the client cannot be created.
    pub fn transport(&self) -> Result<HttpTransport> {
        HttpTransport::with_config(&self.http)
    }
}

/// Merchant identity fields shared by every order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MerchantDefaults {
    /// Official account ID.
    pub appid: Option<String>,
    /// Merchant ID.
    pub mch_id: Option<String>,
    /// Sub-merchant official account ID.
    pub sub_appid: Option<String>,
    /// Sub-merchant ID.
    pub sub_mch_id: Option<String>,
    /// Notification callback URL.
    pub notify_url: Option<String>,
}

impl MerchantDefaults {
    /// Stores every configured value on `order`.
    ///
    /// Absent entries leave the order untouched; empty strings are dropped by
    /// [`UnifiedOrder::set`].
    pub fn apply(&self, order: &mut UnifiedOrder) {
        if let Some(appid) = &self.appid {
            order.appid(appid);
        }
        if let Some(mch_id) = &self.mch_id {
            order.mch_id(mch_id);
        }
        if let Some(sub_appid) = &self.sub_appid {
            order.sub_appid(sub_appid);
        }
        if let Some(sub_mch_id) = &self.sub_mch_id {
            order.sub_mch_id(sub_mch_id);
        }
        if let Some(notify_url) = &self.notify_url {
            order.notify_url(notify_url);
        }
    }
}

fn is_env_var_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn default_endpoint() -> String {
    UNIFIED_ORDER_URL.to_owned()
}

fn default_key_env() -> String {
    "WXPAY_KEY".to_owned()
}

fn default_root_element() -> String {
    DEFAULT_ROOT.to_owned()
}

#[cfg(test)]
#[allow(
    clippy::unreachable,
    reason = "test code uses unreachable for expected-path assertions"
)]
mod tests {
    use super::*;
    use crate::{
        order::FieldValue,
        transport::{HttpVersion, Transport},
    };

    const FULL: &str = r#"
        endpoint = "https://api2.mch.weixin.qq.com/pay/unifiedorder"
        key_env = "SHOP_WXPAY_KEY"
        root_element = "request"

        [merchant]
        appid = "wxd930ea5d5a258f4f"
        mch_id = "10000100"
        sub_mch_id = "1900000109"
        notify_url = "https://example.com/wxpay/notify"

        [http]
        timeout_secs = 20
        connect_timeout_secs = 5
        http_version = "http1"
    "#;

    #[test]
    fn test_from_toml_full() {
        let config = GatewayConfig::from_toml(FULL).unwrap();
        assert_eq!(config.endpoint, "https://api2.mch.weixin.qq.com/pay/unifiedorder");
        assert_eq!(config.key_env, "SHOP_WXPAY_KEY");
        assert_eq!(config.root(), Some("request"));
        assert_eq!(config.merchant.appid.as_deref(), Some("wxd930ea5d5a258f4f"));
        assert_eq!(config.merchant.sub_appid, None);
        assert_eq!(config.http.timeout_secs, 20);
        assert_eq!(config.http.http_version, HttpVersion::Http1);
    }

    #[test]
    fn test_from_toml_empty_uses_defaults() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.endpoint, UNIFIED_ORDER_URL);
        assert_eq!(config.root(), Some("xml"));
    }

    #[test]
    fn test_empty_root_element_means_none() {
        let config = GatewayConfig::from_toml("root_element = \"\"").unwrap();
        assert_eq!(config.root(), None);
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let Err(OrderError::InvalidInput(msg)) = GatewayConfig::from_toml("endpoint = {{{") else {
            unreachable!("expected InvalidInput error")
        };
        assert!(msg.contains("invalid TOML config"));
    }

    #[test]
    fn test_from_toml_rejects_secret_in_file() {
        assert!(GatewayConfig::from_toml("key = \"192006250b4c09247ec02edce69f6a2d\"").is_err());
    }

    #[test]
    fn test_from_file_not_found() {
        let Err(OrderError::InvalidInput(msg)) =
            GatewayConfig::from_file("/nonexistent/path/wxpay.toml")
        else {
            unreachable!("expected InvalidInput error")
        };
        assert!(msg.contains("cannot read config file"));
    }

    #[test]
    fn test_validate_rejects_plain_http_endpoint() {
        let config = GatewayConfig {
            endpoint: "http://api.mch.weixin.qq.com/pay/unifiedorder".to_owned(),
            ..Default::default()
        };
        let Err(OrderError::InvalidInput(msg)) = config.validate() else {
            unreachable!("expected InvalidInput error")
        };
        assert!(msg.starts_with("endpoint:"));
    }

    #[test]
    fn test_validate_rejects_loopback_endpoint() {
        let config = GatewayConfig {
            endpoint: "https://127.0.0.1/pay/unifiedorder".to_owned(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(OrderError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_bad_env_name() {
        for key_env in ["", "1KEY", "WXPAY-KEY", "WX PAY"] {
            let config = GatewayConfig { key_env: key_env.to_owned(), ..Default::default() };
            assert!(config.validate().is_err(), "{key_env:?} should be rejected");
        }
    }

    #[test]
    fn test_validate_rejects_non_latin1_root() {
        let config = GatewayConfig { root_element: "请求".to_owned(), ..Default::default() };
        let Err(OrderError::InvalidInput(msg)) = config.validate() else {
            unreachable!("expected InvalidInput error")
        };
        assert!(msg.starts_with("root_element:"));
    }

    #[test]
    fn test_http_table_absent_uses_transport_defaults() {
        let config = GatewayConfig::from_toml("[merchant]\nmch_id = \"10000100\"").unwrap();
        assert_eq!(config.http, HttpConfig::default());
        assert_eq!(config.http.http_version, HttpVersion::Auto);
        assert!(config.transport().is_ok());
    }

    #[test]
    fn test_http_table_partial_override() {
        let config = GatewayConfig::from_toml(
            r#"
            [http]
            http_version = "http2"
            pool_max_idle_per_host = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.http.http_version, HttpVersion::Http2);
        assert_eq!(config.http.pool_max_idle_per_host, 4);
        assert_eq!(config.http.timeout_secs, HttpConfig::default().timeout_secs);
        assert_eq!(config.transport().unwrap().protocol_name(), "http/2");
    }

    #[test]
    fn test_http_table_rejects_unknown_key() {
        let Err(OrderError::InvalidInput(msg)) = GatewayConfig::from_toml("[http]\nretries = 3")
        else {
            unreachable!("expected InvalidInput error")
        };
        assert!(msg.contains("retries"));
    }

    #[test]
    fn test_http_table_rejects_unknown_version() {
        assert!(matches!(
            GatewayConfig::from_toml("[http]\nhttp_version = \"http3\""),
            Err(OrderError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_http_table_timeouts_out_of_range() {
        for table in [
            "[http]\ntimeout_secs = 0",
            "[http]\ntimeout_secs = 301",
            "[http]\nconnect_timeout_secs = 0",
            "[http]\nconnect_timeout_secs = 61",
        ] {
            assert!(
                matches!(GatewayConfig::from_toml(table), Err(OrderError::InvalidInput(_))),
                "{table:?} should be rejected"
            );
        }
        let upper = "[http]\ntimeout_secs = 300\nconnect_timeout_secs = 60";
        assert!(GatewayConfig::from_toml(upper).is_ok());
    }

    #[test]
    fn test_env_var_name() {
        assert!(is_env_var_name("WXPAY_KEY"));
        assert!(is_env_var_name("_KEY2"));
        assert!(!is_env_var_name(""));
        assert!(!is_env_var_name("9KEY"));
    }

    #[test]
    fn test_load_key_with() {
        let config = GatewayConfig::default();

        let key = config
            .load_key_with(|name| (name == "WXPAY_KEY").then(|| "secret".to_owned()))
            .unwrap();
        assert_eq!(key.signature_base(&crate::order::FieldSet::new()).as_str(), "key=secret");

        let Err(OrderError::InvalidInput(msg)) = config.load_key_with(|_| None) else {
            unreachable!("expected InvalidInput error")
        };
        assert_eq!(msg, "environment variable WXPAY_KEY is not set");

        let Err(OrderError::InvalidInput(msg)) = config.load_key_with(|_| Some(String::new()))
        else {
            unreachable!("expected InvalidInput error")
        };
        assert_eq!(msg, "environment variable WXPAY_KEY is empty");
    }

    #[test]
    fn test_merchant_defaults_apply() {
        let config = GatewayConfig::from_toml(FULL).unwrap();
        let mut order = UnifiedOrder::new("K");
        config.merchant.apply(&mut order);

        assert_eq!(order.get("appid"), Some(&FieldValue::from("wxd930ea5d5a258f4f")));
        assert_eq!(order.get("mch_id"), Some(&FieldValue::from("10000100")));
        assert_eq!(order.get("sub_mch_id"), Some(&FieldValue::from("1900000109")));
        assert_eq!(
            order.get("notify_url"),
            Some(&FieldValue::from("https://example.com/wxpay/notify"))
        );
        assert_eq!(order.get("sub_appid"), None);
    }

    #[test]
    fn test_merchant_defaults_empty_value_ignored() {
        let merchant = MerchantDefaults { appid: Some(String::new()), ..Default::default() };
        let mut order = UnifiedOrder::new("K");
        order.appid("wx1");
        merchant.apply(&mut order);
        assert_eq!(order.get("appid"), Some(&FieldValue::from("wx1")));
    }

    #[test]
    fn test_transport_from_config() {
        let config = GatewayConfig::from_toml(FULL).unwrap();
        assert!(config.transport().is_ok());
    }
}
