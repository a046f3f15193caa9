//! HTTPS transport implementation using reqwest.

use std::{sync::LazyLock, time::Duration};

use reqwest::{Client, Request, header::CONTENT_TYPE as CONTENT_TYPE_HEADER};
use tracing::{debug, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{OrderError, Result},
    transport::{CONTENT_TYPE, Transport, TransportResponse, sealed},
};

/// Default HTTP client with connection pooling enabled.
///
/// Using a singleton avoids recreating the client per transport instance,
/// preserving connection pooling benefits across all default transports.
static DEFAULT_HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(100)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create default HTTP client")
});

/// Parses `raw` and checks it against the endpoint policy.
///
/// # Errors
///
/// Returns [`OrderError::InvalidInput`] if `raw` is not a URL, and
/// [`OrderError::TransportError`] if it is not HTTPS or points at a loopback host.
pub(crate) fn parse_endpoint(raw: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|e| OrderError::InvalidInput(format!("invalid URL {raw}: {e}")))?;
    validate_url(&url)?;
    Ok(url)
}

/// Validates URL for security constraints.
///
/// Ensures the URL uses HTTPS and does not point to localhost.
fn validate_url(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(OrderError::TransportError("Only HTTPS URLs are allowed".to_owned()));
    }

    if let Some(host) = url.host_str()
        && (host == "localhost" || host == "127.0.0.1" || host == "::1" || host == "[::1]")
    {
        return Err(OrderError::TransportError("Localhost URLs are not allowed".to_owned()));
    }

    Ok(())
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// Supports automatic connection pooling, keep-alive, and HTTP/2 multiplexing.
///
/// # Examples
///
/// ```rust,no_run
/// use wxpay_order::transport::{HttpTransport, Transport};
///
/// # async fn example() -> wxpay_order::error::Result<()> {
/// let transport = HttpTransport::new()?;
/// let response = transport
///     .post("https://api.mch.weixin.qq.com/pay/unifiedorder", b"<xml></xml>")
///     .await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl sealed::private::Sealed for HttpTransport {}

impl HttpTransport {
    /// Creates a new HTTP transport with default settings.
    ///
    /// Uses a shared singleton client for connection pooling efficiency.
    ///
    /// Default configuration:
    /// - Pool max idle per host: 100
    /// - Timeout: 30 seconds
    /// - Connect timeout: 10 seconds
    /// - HTTP version: Auto (prefer HTTP/2)
    ///
    /// # Errors
    ///
    /// This method is infallible but returns `Result` for API consistency.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::transport::HttpTransport;
    ///
    /// let transport = HttpTransport::new().unwrap();
    /// ```
    pub fn new() -> Result<Self> {
        Ok(Self { client: DEFAULT_HTTP_CLIENT.clone(), http_version: HttpVersion::Auto })
    }

    /// Creates HTTP transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use wxpay_order::transport::{HttpConfig, HttpTransport, HttpVersion};
    ///
    /// let config = HttpConfig {
    ///     pool_max_idle_per_host: 20,
    ///     timeout_secs: 60,
    ///     connect_timeout_secs: 15,
    ///     http_version: HttpVersion::Http1,
    /// };
    ///
    /// let transport = HttpTransport::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        };

        let client = builder.build().map_err(OrderError::HttpError)?;

        Ok(Self { client, http_version: config.http_version })
    }

    /// Builds the outbound POST carrying `body` verbatim with the XML content type.
    fn build_request(&self, url: Url, body: &[u8]) -> Result<Request> {
        self.client
            .post(url)
            .header(CONTENT_TYPE_HEADER, CONTENT_TYPE)
            .body(body.to_vec())
            .build()
            .map_err(OrderError::HttpError)
    }

    #[instrument(skip(self, body), fields(body_len = body.len(), protocol = self.protocol_name()))]
    async fn execute_post(&self, url: &str, body: &[u8]) -> Result<TransportResponse> {
        let url = parse_endpoint(url)?;
        let request = self.build_request(url, body)?;

        let response = self.client.execute(request).await?;

        let status = response.status().as_u16();

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_owned()))
            .collect();

        if !response.status().is_success() {
            return Err(OrderError::TransportError(format!("gateway returned status {status}")));
        }

        let response_body = response.bytes().await.map_err(OrderError::HttpError)?.to_vec();
        debug!(status, body_len = response_body.len(), "gateway responded");

        Ok(TransportResponse { status, body: response_body, headers })
    }
}

impl Transport for HttpTransport {
    async fn post<'a>(&'a self, url: &'a str, body: &'a [u8]) -> Result<TransportResponse> {
        self.execute_post(url, body).await
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Http2 => "http/2",
            HttpVersion::Auto => "http",
        }
    }
}
