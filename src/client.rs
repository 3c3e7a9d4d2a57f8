//! Twitter v1.1 REST client.
//!
//! Async HTTP client that signs every call with OAuth 1.0a and posts
//! form-encoded bodies using reqwest.

use std::time::Duration;

use chrono::Utc;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Client, Response,
};
use tracing::{debug, warn};

use crate::credentials::{CredentialStore, Credentials};
use crate::error::{Result, TwitterError};
use crate::params::ParameterSet;
use crate::signature::{self, SignedRequest};
use crate::types::TwitterConfig;

/// Twitter API client context.
///
/// Construct once and share by reference (or `Arc`) with every caller; it
/// owns the credential store and the HTTP transports.
pub struct TwitterClient {
    http: Client,
    stream_http: Client,
    config: TwitterConfig,
    credentials: CredentialStore,
}

impl TwitterClient {
    /// Create a new client without credentials.
    ///
    /// Every signed operation fails with `NotAuthenticated` until
    /// [`set_credentials`](Self::set_credentials) is called.
    pub fn new(config: TwitterConfig) -> Result<Self> {
        for (name, url) in [
            ("api_base_url", &config.api_base_url),
            ("stream_base_url", &config.stream_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TwitterError::Config(format!(
                    "{} must be an http(s) URL, got {:?}",
                    name, url
                )));
            }
        }

        // An idle pool of zero gives every call its own connection.
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(0)
            .build()?;

        // No overall timeout: a stream stays open until the peer closes it.
        let stream_http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            http,
            stream_http,
            config,
            credentials: CredentialStore::new(),
        })
    }

    /// Create a client that is ready to sign.
    pub fn with_credentials(config: TwitterConfig, credentials: Credentials) -> Result<Self> {
        let client = Self::new(config)?;
        client.credentials.set(credentials);
        Ok(client)
    }

    /// Set (or replace) the OAuth credentials. See [`CredentialStore`] for
    /// the concurrency caveat.
    pub fn set_credentials(
        &self,
        consumer_key: &str,
        consumer_secret: &str,
        access_token: &str,
        access_token_secret: &str,
    ) {
        self.credentials.set_credentials(
            consumer_key,
            consumer_secret,
            access_token,
            access_token_secret,
        );
        debug!(consumer_key, "Twitter credentials set");
    }

    /// The credential store.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// The client configuration.
    pub fn config(&self) -> &TwitterConfig {
        &self.config
    }

    // =========================================================================
    // Statuses
    // =========================================================================

    /// Post a status update.
    pub async fn tweet(&self, message: &str) -> Result<String> {
        self.credentials.check_ready()?;
        let params = ParameterSet::new()
            .with("status", message)
            .with("trim_user", "1")
            .with("enable_dm_commands", "false");
        self.send("statuses/update.json", params).await
    }

    /// Send a direct message through the `D user message` status command.
    pub async fn direct_message(&self, user: &str, message: &str) -> Result<String> {
        self.credentials.check_ready()?;
        let params = ParameterSet::new()
            .with("status", format!("D {} {}", user, message))
            .with("trim_user", "1")
            .with("enable_dm_commands", "true");
        self.send("statuses/update.json", params).await
    }

    /// Retweet a user's latest status through the `RETWEET user` command.
    pub async fn retweet_last_message(&self, user: &str) -> Result<String> {
        self.credentials.check_ready()?;
        let params = ParameterSet::new()
            .with("status", format!("RETWEET {}", user))
            .with("trim_user", "1")
            .with("enable_dm_commands", "true");
        self.send("statuses/update.json", params).await
    }

    /// Retweet a status by ID.
    pub async fn retweet_message(&self, tweet_id: u64) -> Result<String> {
        self.credentials.check_ready()?;
        let params = ParameterSet::new().with("trim_user", "1");
        self.send(&format!("statuses/retweet/{}.json", tweet_id), params)
            .await
    }

    /// Quote a status: post `message` followed by a link to `tweet_id`.
    pub async fn retweet_message_with_comment(
        &self,
        tweet_id: u64,
        message: &str,
    ) -> Result<String> {
        self.credentials.check_ready()?;
        let params = ParameterSet::new()
            .with(
                "status",
                format!("{} {}{}", message, self.config.tweet_link_base, tweet_id),
            )
            .with("trim_user", "1");
        self.send("statuses/update.json", params).await
    }

    // =========================================================================
    // Signed transport
    // =========================================================================

    /// Sign `params` and POST them to `{api_base_url}{endpoint}`.
    ///
    /// Returns the raw response body whatever the HTTP status; Twitter's own
    /// error payloads are left for the caller to inspect. No retries.
    pub async fn send(&self, endpoint: &str, params: ParameterSet) -> Result<String> {
        let url = self.rest_url(endpoint);
        let signed = self.sign_request(&url, params)?;

        let response = self.post_signed(&self.http, &url, &signed).await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            debug!(%url, status = status.as_u16(), "Twitter request completed");
        } else {
            warn!(%url, status = status.as_u16(), "Twitter request returned non-success status");
        }

        Ok(body)
    }

    /// Add timestamp, nonce and signature to `params` for a POST to `url`.
    pub fn sign_request(&self, url: &str, params: ParameterSet) -> Result<SignedRequest> {
        let credentials = self.credentials.check_ready()?;
        let timestamp = Utc::now().timestamp();
        let nonce = self
            .config
            .nonce_strategy
            .generate(credentials.consumer_key(), timestamp);

        Ok(signature::authorize(
            &credentials,
            url,
            params,
            timestamp,
            &nonce,
        ))
    }

    /// POST the non-oauth fields as a form body with the OAuth header.
    pub(crate) async fn post_signed(
        &self,
        client: &Client,
        url: &str,
        signed: &SignedRequest,
    ) -> Result<Response> {
        let auth = HeaderValue::from_str(&signed.header)?;
        let response = client
            .post(url)
            .header(AUTHORIZATION, auth)
            .form(&signed.params.body_fields())
            .send()
            .await?;
        Ok(response)
    }

    pub(crate) fn stream_http(&self) -> &Client {
        &self.stream_http
    }

    fn rest_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.api_base_url, endpoint)
    }

    pub(crate) fn stream_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.stream_base_url, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_client() -> TwitterClient {
        TwitterClient::with_credentials(
            TwitterConfig::new(),
            Credentials::new("ck", "cs", "at", "ats"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_operations_require_credentials() {
        let client = TwitterClient::new(TwitterConfig::new()).unwrap();

        assert!(matches!(
            client.tweet("hi").await,
            Err(TwitterError::NotAuthenticated)
        ));
        assert!(matches!(
            client.direct_message("bob", "hi").await,
            Err(TwitterError::NotAuthenticated)
        ));
        assert!(matches!(
            client.retweet_last_message("bob").await,
            Err(TwitterError::NotAuthenticated)
        ));
        assert!(matches!(
            client.retweet_message(123).await,
            Err(TwitterError::NotAuthenticated)
        ));
        assert!(matches!(
            client.retweet_message_with_comment(123, "hi").await,
            Err(TwitterError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_sign_request_adds_oauth_fields() {
        let client = ready_client();
        let url = client.rest_url("statuses/update.json");
        let signed = client
            .sign_request(&url, ParameterSet::new().with("status", "hi"))
            .unwrap();

        let timestamp: i64 = signed
            .params
            .get("oauth_timestamp")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(
            signed.params.get("oauth_nonce"),
            Some(signature::derived_nonce("ck", timestamp).as_str())
        );
        assert_eq!(signed.params.get("oauth_consumer_key"), Some("ck"));
        assert_eq!(signed.params.get("oauth_token"), Some("at"));
        assert!(signed.params.contains_key("oauth_signature"));
        assert_eq!(signed.params.body_fields(), vec![("status", "hi")]);
        assert!(signed.header.starts_with("OAuth oauth_consumer_key=\"ck\", "));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let config = TwitterConfig {
            api_base_url: "api.twitter.com/1.1/".to_string(),
            ..TwitterConfig::new()
        };
        assert!(matches!(
            TwitterClient::new(config),
            Err(TwitterError::Config(_))
        ));
    }

    #[test]
    fn test_urls() {
        let client = ready_client();
        assert_eq!(
            client.rest_url("statuses/update.json"),
            "https://api.twitter.com/1.1/statuses/update.json"
        );
        assert_eq!(
            client.stream_url("statuses/filter.json"),
            "https://stream.twitter.com/1.1/statuses/filter.json"
        );
    }
}
