#![allow(missing_docs)]
//! Type definitions for the Twitter v1.1 API client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signature::NonceStrategy;

/// Twitter client configuration.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    /// REST API base URL (with trailing slash)
    pub api_base_url: String,
    /// Streaming API base URL (with trailing slash)
    pub stream_base_url: String,
    /// Prefix for links to a status, completed by the tweet id
    pub tweet_link_base: String,
    /// REST request timeout in seconds
    pub timeout_secs: u64,
    /// Connect timeout in seconds, applied to REST and streaming calls
    pub connect_timeout_secs: u64,
    /// Nonce generation strategy
    pub nonce_strategy: NonceStrategy,
    /// Capacity of each subscription's event channel
    pub stream_buffer: usize,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TwitterConfig {
    /// Default REST base.
    pub const API_BASE_URL: &'static str = "https://api.twitter.com/1.1/";
    /// Default streaming base.
    pub const STREAM_BASE_URL: &'static str = "https://stream.twitter.com/1.1/";
    /// Default status link prefix.
    pub const TWEET_LINK_BASE: &'static str = "https://twitter.com/TwitterDev/status/";

    /// Create a configuration pointing at the public Twitter endpoints.
    pub fn new() -> Self {
        Self {
            api_base_url: Self::API_BASE_URL.to_string(),
            stream_base_url: Self::STREAM_BASE_URL.to_string(),
            tweet_link_base: Self::TWEET_LINK_BASE.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            nonce_strategy: NonceStrategy::Derived,
            stream_buffer: 256,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Every variable is optional; unset ones keep their defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::new();

        if let Ok(url) = std::env::var("TWITTER_API_BASE_URL") {
            config = config.api_base_url(&url);
        }
        if let Ok(url) = std::env::var("TWITTER_STREAM_BASE_URL") {
            config = config.stream_base_url(&url);
        }
        if let Ok(base) = std::env::var("TWITTER_TWEET_LINK_BASE") {
            config.tweet_link_base = base;
        }
        if let Ok(secs) = std::env::var("TWITTER_TIMEOUT_SECS") {
            config.timeout_secs = secs
                .parse()
                .map_err(|_| anyhow::anyhow!("TWITTER_TIMEOUT_SECS must be an integer"))?;
        }
        if let Ok(secs) = std::env::var("TWITTER_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = secs.parse().map_err(|_| {
                anyhow::anyhow!("TWITTER_CONNECT_TIMEOUT_SECS must be an integer")
            })?;
        }
        if let Ok(strategy) = std::env::var("TWITTER_NONCE_STRATEGY") {
            config.nonce_strategy = strategy.parse().map_err(anyhow::Error::msg)?;
        }
        if let Ok(buffer) = std::env::var("TWITTER_STREAM_BUFFER") {
            let capacity = buffer
                .parse()
                .map_err(|_| anyhow::anyhow!("TWITTER_STREAM_BUFFER must be an integer"))?;
            config = config.stream_buffer(capacity);
        }

        Ok(config)
    }

    /// Set the REST base URL. A trailing slash is added if missing.
    pub fn api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = with_trailing_slash(url);
        self
    }

    /// Set the streaming base URL. A trailing slash is added if missing.
    pub fn stream_base_url(mut self, url: &str) -> Self {
        self.stream_base_url = with_trailing_slash(url);
        self
    }

    /// Set the status link prefix.
    pub fn tweet_link_base(mut self, base: &str) -> Self {
        self.tweet_link_base = base.to_string();
        self
    }

    /// Set REST request timeout.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set nonce strategy.
    pub fn nonce_strategy(mut self, strategy: NonceStrategy) -> Self {
        self.nonce_strategy = strategy;
        self
    }

    /// Set the per-subscription event channel capacity.
    pub fn stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Author of a status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TweetUser {
    /// User ID
    #[serde(default)]
    pub id: Option<u64>,
    /// User ID as string
    #[serde(default)]
    pub id_str: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Handle without @
    #[serde(default)]
    pub screen_name: Option<String>,
    /// Free-form location
    #[serde(default)]
    pub location: Option<String>,
    /// Follower count
    #[serde(default)]
    pub followers_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hashtag {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMention {
    #[serde(default)]
    pub id_str: Option<String>,
    pub screen_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlEntity {
    pub url: String,
    #[serde(default)]
    pub expanded_url: Option<String>,
}

/// Entities extracted from the status text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<Hashtag>,
    #[serde(default)]
    pub user_mentions: Vec<UserMention>,
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
}

/// GeoJSON point attached to a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    #[serde(rename = "type")]
    pub kind: String,
}

/// One status as delivered by the streaming API.
///
/// Only `text` is required; stream notices without it (deletes, limits)
/// do not parse as a `Tweet`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    /// Status text
    pub text: String,
    /// Status ID
    #[serde(default)]
    pub id: Option<u64>,
    /// Status ID as string
    #[serde(default)]
    pub id_str: Option<String>,
    /// Creation time, e.g. `Wed Oct 10 20:19:24 +0000 2018`
    #[serde(default)]
    pub created_at: Option<String>,
    /// BCP 47 language code
    #[serde(default)]
    pub lang: Option<String>,
    /// Author
    #[serde(default)]
    pub user: Option<TweetUser>,
    /// Entities
    #[serde(default)]
    pub entities: Option<Entities>,
    /// Retweet count
    #[serde(default)]
    pub retweet_count: Option<u64>,
    /// Like count
    #[serde(default)]
    pub favorite_count: Option<u64>,
    /// Status this one replies to
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<String>,
    /// Exact location, if shared
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Tweet {
    const CREATED_AT_FORMAT: &'static str = "%a %b %d %H:%M:%S %z %Y";

    /// Status ID as a string, whichever form the payload carried.
    pub fn status_id(&self) -> Option<String> {
        self.id_str
            .clone()
            .or_else(|| self.id.map(|id| id.to_string()))
    }

    /// `created_at` parsed into UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_str(s, Self::CREATED_AT_FORMAT).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Hashtag texts without the leading `#`.
    pub fn hashtags(&self) -> Vec<&str> {
        self.entities
            .as_ref()
            .map(|e| e.hashtags.iter().map(|h| h.text.as_str()).collect())
            .unwrap_or_default()
    }

    /// Link to this status under `link_base`.
    pub fn permanent_url(&self, link_base: &str) -> Option<String> {
        self.status_id().map(|id| format!("{}{}", link_base, id))
    }
}

/// Geographic rectangle: south-west corner then north-east corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon1: f64,
    pub lat1: f64,
    pub lon2: f64,
    pub lat2: f64,
}

impl BoundingBox {
    /// Create a bounding box.
    pub fn new(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> Self {
        Self {
            lon1,
            lat1,
            lon2,
            lat2,
        }
    }

    /// `lon1,lat1,lon2,lat2` with six decimal places.
    pub fn to_param(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.lon1, self.lat1, self.lon2, self.lat2
        )
    }
}

/// Filter predicates for the streaming endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamFilter {
    /// Keywords / hashtags (`track`)
    pub hashtags: Vec<String>,
    /// Language codes (`language`)
    pub languages: Vec<String>,
    /// Locations (`locations`)
    pub bounding_boxes: Vec<BoundingBox>,
}

impl StreamFilter {
    /// Create a filter from its three parts.
    pub fn new<H, L>(
        hashtags: impl IntoIterator<Item = H>,
        languages: impl IntoIterator<Item = L>,
        bounding_boxes: impl IntoIterator<Item = BoundingBox>,
    ) -> Self
    where
        H: Into<String>,
        L: Into<String>,
    {
        Self {
            hashtags: hashtags.into_iter().map(Into::into).collect(),
            languages: languages.into_iter().map(Into::into).collect(),
            bounding_boxes: bounding_boxes.into_iter().collect(),
        }
    }

    /// Filter on hashtags only.
    pub fn hashtags<H: Into<String>>(hashtags: impl IntoIterator<Item = H>) -> Self {
        Self {
            hashtags: hashtags.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Add a language code.
    pub fn language(mut self, code: &str) -> Self {
        self.languages.push(code.to_string());
        self
    }

    /// Add a bounding box.
    pub fn location(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_boxes.push(bounding_box);
        self
    }

    /// Whether no predicate at all is set.
    pub fn is_empty(&self) -> bool {
        self.hashtags.is_empty() && self.languages.is_empty() && self.bounding_boxes.is_empty()
    }

    /// `track`: trimmed hashtags joined with commas.
    pub fn track_param(&self) -> String {
        join_trimmed(&self.hashtags)
    }

    /// `language`: trimmed codes joined with commas.
    pub fn language_param(&self) -> String {
        join_trimmed(&self.languages)
    }

    /// `locations`: every box as `lon1,lat1,lon2,lat2`, joined with commas.
    pub fn locations_param(&self) -> String {
        self.bounding_boxes
            .iter()
            .map(BoundingBox::to_param)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn join_trimmed(values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.trim())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::clear_twitter_env;
    use serial_test::serial;

    #[test]
    fn test_tweet_minimal() {
        let tweet: Tweet = serde_json::from_str(r#"{"text":"a"}"#).unwrap();
        assert_eq!(tweet.text, "a");
        assert!(tweet.user.is_none());
        assert!(tweet.hashtags().is_empty());
    }

    #[test]
    fn test_tweet_without_text_is_rejected() {
        let notice = r#"{"delete":{"status":{"id":1,"id_str":"1"}}}"#;
        assert!(serde_json::from_str::<Tweet>(notice).is_err());
    }

    #[test]
    fn test_tweet_full_payload() {
        let json = r#"{
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "id": 1050118621198921728,
            "id_str": "1050118621198921728",
            "text": "To make room for more expression #rustlang",
            "lang": "en",
            "user": {"id": 6253282, "id_str": "6253282", "name": "Twitter API", "screen_name": "TwitterAPI"},
            "entities": {"hashtags": [{"text": "rustlang", "indices": [33, 42]}], "user_mentions": [], "urls": []},
            "retweet_count": 3,
            "favorite_count": 7,
            "coordinates": {"type": "Point", "coordinates": [-122.4, 37.7]},
            "unknown_field": true
        }"#;

        let tweet: Tweet = serde_json::from_str(json).unwrap();
        assert_eq!(tweet.hashtags(), vec!["rustlang"]);
        assert_eq!(
            tweet.user.as_ref().and_then(|u| u.screen_name.as_deref()),
            Some("TwitterAPI")
        );
        assert_eq!(
            tweet.permanent_url(TwitterConfig::TWEET_LINK_BASE).as_deref(),
            Some("https://twitter.com/TwitterDev/status/1050118621198921728")
        );
        let created = tweet.created_at_utc().unwrap();
        assert_eq!(created.to_rfc3339(), "2018-10-10T20:19:24+00:00");
        assert_eq!(tweet.coordinates.unwrap().kind, "Point");
    }

    #[test]
    fn test_status_id_falls_back_to_numeric() {
        let tweet = Tweet {
            text: "x".into(),
            id: Some(42),
            ..Default::default()
        };
        assert_eq!(tweet.status_id().as_deref(), Some("42"));
    }

    #[test]
    fn test_bounding_box_param() {
        let bbox = BoundingBox::new(-122.75, 36.8, -121.75, 37.8);
        assert_eq!(bbox.to_param(), "-122.750000,36.800000,-121.750000,37.800000");
    }

    #[test]
    fn test_stream_filter_params() {
        let filter = StreamFilter::new(
            [" #rust ", "tokio"],
            ["en", " es"],
            [BoundingBox::new(1.0, 2.0, 3.0, 4.0), BoundingBox::new(-1.5, -2.5, 0.0, 0.0)],
        );

        assert_eq!(filter.track_param(), "#rust,tokio");
        assert_eq!(filter.language_param(), "en,es");
        assert_eq!(
            filter.locations_param(),
            "1.000000,2.000000,3.000000,4.000000,-1.500000,-2.500000,0.000000,0.000000"
        );
    }

    #[test]
    fn test_stream_filter_empty() {
        assert!(StreamFilter::default().is_empty());
        assert!(!StreamFilter::hashtags(["rust"]).is_empty());
        assert!(!StreamFilter::default().language("en").is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config = TwitterConfig::new();
        assert_eq!(config.api_base_url, "https://api.twitter.com/1.1/");
        assert_eq!(config.stream_base_url, "https://stream.twitter.com/1.1/");
        assert_eq!(config.nonce_strategy, NonceStrategy::Derived);
    }

    #[test]
    fn test_config_builder_adds_trailing_slash() {
        let config = TwitterConfig::new()
            .api_base_url("http://127.0.0.1:8080/1.1")
            .stream_base_url("http://127.0.0.1:8081/1.1/")
            .nonce_strategy(NonceStrategy::Random)
            .stream_buffer(0);

        assert_eq!(config.api_base_url, "http://127.0.0.1:8080/1.1/");
        assert_eq!(config.stream_base_url, "http://127.0.0.1:8081/1.1/");
        assert_eq!(config.nonce_strategy, NonceStrategy::Random);
        assert_eq!(config.stream_buffer, 1);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_twitter_env();
        std::env::set_var("TWITTER_API_BASE_URL", "http://localhost:9000/1.1");
        std::env::set_var("TWITTER_STREAM_BASE_URL", "http://localhost:9001/1.1/");
        std::env::set_var("TWITTER_TWEET_LINK_BASE", "https://x.com/i/status/");
        std::env::set_var("TWITTER_TIMEOUT_SECS", "5");
        std::env::set_var("TWITTER_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("TWITTER_NONCE_STRATEGY", "random");
        std::env::set_var("TWITTER_STREAM_BUFFER", "0");

        let config = TwitterConfig::from_env();
        clear_twitter_env();
        let config = config.unwrap();

        assert_eq!(config.api_base_url, "http://localhost:9000/1.1/");
        assert_eq!(config.stream_base_url, "http://localhost:9001/1.1/");
        assert_eq!(config.tweet_link_base, "https://x.com/i/status/");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.connect_timeout_secs, 2);
        assert_eq!(config.nonce_strategy, NonceStrategy::Random);
        assert_eq!(config.stream_buffer, 1);
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        clear_twitter_env();
        let config = TwitterConfig::from_env().unwrap();
        let defaults = TwitterConfig::new();

        assert_eq!(config.api_base_url, defaults.api_base_url);
        assert_eq!(config.stream_base_url, defaults.stream_base_url);
        assert_eq!(config.tweet_link_base, defaults.tweet_link_base);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.nonce_strategy, NonceStrategy::Derived);
        assert_eq!(config.stream_buffer, 256);
    }

    #[test]
    #[serial]
    fn test_config_from_env_rejects_bad_values() {
        for (key, value, message) in [
            ("TWITTER_TIMEOUT_SECS", "soon", "TWITTER_TIMEOUT_SECS must be an integer"),
            (
                "TWITTER_CONNECT_TIMEOUT_SECS",
                "1.5",
                "TWITTER_CONNECT_TIMEOUT_SECS must be an integer",
            ),
            ("TWITTER_STREAM_BUFFER", "-1", "TWITTER_STREAM_BUFFER must be an integer"),
            ("TWITTER_NONCE_STRATEGY", "uuid", "unknown nonce strategy: uuid"),
        ] {
            clear_twitter_env();
            std::env::set_var(key, value);
            let result = TwitterConfig::from_env();
            clear_twitter_env();

            let err = result.expect_err(key);
            assert_eq!(err.to_string(), message);
        }
    }
}
