use crate::auth::TigoAuthenticator;
use crate::cache::{CachedResponse, ResponseCache};
use crate::config::{Credentials, TigoConfig};
use crate::error::{Result, TigoError};
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

enum Outcome {
    Body {
        body: Bytes,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    NotModified,
    Unauthorized,
}

/// Authenticated GET transport for the Tigo API.
///
/// Each request carries the session token as a bearer token. A `401` triggers
/// one re-login and resend. Rate limiting, server errors and transport
/// failures are retried with exponential backoff; once retries are exhausted a
/// previously cached body for the same URL is served instead of failing.
///
/// # Examples
///
/// ```no_run
/// use tigo_core::config::{Credentials, TigoConfig};
/// use tigo_core::transport::ApiTransport;
///
/// # async fn example() -> tigo_core::Result<()> {
/// let transport = ApiTransport::new(
///     Credentials::new("owner@example.com", "secret"),
///     TigoConfig::default(),
/// )?;
/// let systems: serde_json::Value = transport.get_json("/systems", &[]).await?;
/// println!("{}", systems);
/// # Ok(())
/// # }
/// ```
pub struct ApiTransport {
    client: Client,
    config: TigoConfig,
    auth: Arc<TigoAuthenticator>,
    cache: Arc<ResponseCache>,
}

impl ApiTransport {
    /// Creates a transport that logs in with `credentials` on first use.
    pub fn new(credentials: Credentials, config: TigoConfig) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(&config)?;
        let auth = TigoAuthenticator::new(credentials, config.clone(), client.clone());
        Ok(Self::from_parts(config, client, Arc::new(auth)))
    }

    /// Creates a transport around an existing session token.
    pub fn with_token(token: impl Into<String>, user_id: i64, config: TigoConfig) -> Result<Self> {
        config.validate()?;
        let client = build_http_client(&config)?;
        let auth = TigoAuthenticator::with_token(token, user_id, config.clone(), client.clone());
        Ok(Self::from_parts(config, client, Arc::new(auth)))
    }

    pub fn from_parts(config: TigoConfig, client: Client, auth: Arc<TigoAuthenticator>) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache.max_entries));
        Self {
            client,
            config,
            auth,
            cache,
        }
    }

    pub fn auth(&self) -> &TigoAuthenticator {
        &self.auth
    }

    pub fn config(&self) -> &TigoConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Builds the absolute URL for `path` with URL-encoded query parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use tigo_core::config::TigoConfig;
    /// use tigo_core::transport::ApiTransport;
    ///
    /// let transport = ApiTransport::with_token("tok", 1, TigoConfig::default()).unwrap();
    /// let url = transport.url_for("/data/combined", &[("system_id", "7".into()), ("agg", "hour".into())]);
    /// assert_eq!(url, "https://api2.tigoenergy.com/api/v3/data/combined?system_id=7&agg=hour");
    /// ```
    pub fn url_for(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = format!("{}{}", self.config.api_root(), path);
        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// GET `path`, going through the response cache when it is enabled.
    pub async fn get_bytes(&self, path: &str, query: &[(&str, String)]) -> Result<Bytes> {
        let url = self.url_for(path, query);
        self.fetch(path, &url, self.config.cache.enabled).await
    }

    /// GET `path` without reading or populating the cache.
    pub async fn get_uncached(&self, path: &str, query: &[(&str, String)]) -> Result<Bytes> {
        let url = self.url_for(path, query);
        self.fetch(path, &url, false).await
    }

    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let body = self.get_bytes(path, query).await?;
        String::from_utf8(body.to_vec()).map_err(|e| {
            let valid = e.utf8_error().valid_up_to();
            let line = body[..valid].iter().filter(|&&b| b == b'\n').count() + 1;
            TigoError::csv(line, format!("{} returned invalid UTF-8", path))
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self.get_bytes(path, query).await?;
        serde_json::from_slice(&body).map_err(|e| TigoError::decode(path, e))
    }

    async fn fetch(&self, path: &str, url: &str, use_cache: bool) -> Result<Bytes> {
        let ttl = Duration::from_secs(self.config.cache.ttl_secs);
        if use_cache && let Some(body) = self.cache.fresh(url, ttl) {
            tracing::debug!("cache hit: {}", url);
            return Ok(body);
        }

        let cached = if use_cache { self.cache.entry(url) } else { None };
        let mut relogged = false;
        let mut attempt = 0;

        loop {
            tracing::debug!("GET {} (attempt {})", url, attempt + 1);

            // Login failures share the retry and stale-body handling below
            let sent = match self.auth.token().await {
                Ok(token) => self
                    .send_once(path, url, &token, cached.as_ref())
                    .await
                    .map(|outcome| (outcome, token)),
                Err(e) => Err(e),
            };

            match sent {
                Ok((
                    Outcome::Body {
                        body,
                        etag,
                        last_modified,
                    },
                    _,
                )) => {
                    if use_cache {
                        self.cache.store(url, body.clone(), etag, last_modified);
                    }
                    return Ok(body);
                }
                Ok((Outcome::NotModified, _)) => {
                    return match &cached {
                        Some(entry) => {
                            self.cache.touch(url);
                            Ok(entry.body.clone())
                        }
                        None => Err(TigoError::api(
                            path,
                            StatusCode::NOT_MODIFIED,
                            "not modified without a cached body",
                        )),
                    };
                }
                Ok((Outcome::Unauthorized, token)) => {
                    if relogged {
                        return Err(TigoError::Auth {
                            status: 401,
                            message: format!("token rejected by {} after logging in again", path),
                        });
                    }
                    relogged = true;
                    self.auth.refresh(&token).await?;
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "request to {} failed ({}), retrying in {:?}",
                        path,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable()
                        && let Some(entry) = &cached
                    {
                        tracing::warn!("request to {} failed, using cached response: {}", path, e);
                        return Ok(entry.body.clone());
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        path: &str,
        url: &str,
        token: &str,
        cached: Option<&CachedResponse>,
    ) -> Result<Outcome> {
        let mut request = self.client.get(url).bearer_auth(token);

        if let Some(entry) = cached {
            if let Some(etag) = &entry.etag {
                request = request.header(header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                request = request.header(header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| TigoError::http(path, e))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(Outcome::NotModified);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Outcome::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TigoError::api(path, status, body.trim()));
        }

        let etag = header_string(&response, header::ETAG);
        let last_modified = header_string(&response, header::LAST_MODIFIED);
        let body = response
            .bytes()
            .await
            .map_err(|e| TigoError::http(path, e))?;

        Ok(Outcome::Body {
            body,
            etag,
            last_modified,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let millis = self.config.retry_backoff_ms.saturating_mul(factor);
        Duration::from_millis(millis).min(MAX_BACKOFF)
    }
}

fn header_string(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Builds the shared reqwest client from configuration.
pub fn build_http_client(config: &TigoConfig) -> Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()
        .map_err(|e| TigoError::InvalidConfig(format!("failed to create HTTP client: {}", e)))
}
