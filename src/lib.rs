//! Twitter API client
//!
//! This crate provides OAuth 1.0a request signing, authorized REST calls and
//! a filtered-stream consumer for the Twitter v1.1 API.
//!
//! # Features
//!
//! - Deterministic HMAC-SHA1 signatures over canonicalized parameters
//! - Status updates, direct-message and retweet commands, quote retweets
//! - Filtered stream by hashtags, languages and bounding boxes, delivered as
//!   an async channel with explicit cancellation
//! - Async/await with Tokio runtime
//!
//! # Example
//!
//! ```rust,no_run
//! use twitter_api_client::{StreamEvent, StreamFilter, TwitterClient, TwitterConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = TwitterClient::new(TwitterConfig::new())?;
//! client.set_credentials("consumer-key", "consumer-secret", "token", "token-secret");
//!
//! let body = client.tweet("Hello from Rust").await?;
//! println!("{}", body);
//!
//! let mut subscription = client.subscribe(&StreamFilter::hashtags(["#rustlang"])).await?;
//! while let Some(StreamEvent::TweetReceived(tweet)) = subscription.recv().await {
//!     println!("{}", tweet.text);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod credentials;
pub mod error;
pub mod params;
pub mod signature;
pub mod stream;
pub mod types;

use anyhow::Result as AnyhowResult;

// Re-export commonly used types
pub use crate::client::TwitterClient;
pub use crate::credentials::{CredentialStore, Credentials};
pub use crate::error::{Result, TwitterError};
pub use crate::params::ParameterSet;
pub use crate::signature::{NonceStrategy, SignedRequest};
pub use crate::stream::{StreamEnd, StreamEvent, Subscription};
pub use crate::types::{BoundingBox, StreamFilter, Tweet, TwitterConfig};

/// Build a Twitter API client from environment configuration.
///
/// Reads [`TwitterConfig`] and [`Credentials`] from the process environment
/// and returns a client that is ready to sign.
pub fn get_twitter_client() -> AnyhowResult<TwitterClient> {
    let config = TwitterConfig::from_env()?;
    let credentials = Credentials::from_env()?;
    Ok(TwitterClient::with_credentials(config, credentials)?)
}

#[cfg(test)]
pub(crate) mod test_env {
    /// Remove every `TWITTER_*` variable from the process environment.
    pub fn clear_twitter_env() {
        let keys: Vec<String> = std::env::vars_os()
            .filter_map(|(key, _)| key.into_string().ok())
            .filter(|key| key.starts_with("TWITTER_"))
            .collect();
        for key in keys {
            std::env::remove_var(key);
        }
    }
}
