//! OAuth 1.0a credential store.
//!
//! Holds the consumer/token pair and the HMAC-SHA1 key derived from the two
//! secrets. Every signed operation goes through [`CredentialStore::check_ready`].

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha1::Sha1;

use crate::error::{Result, TwitterError};

/// Keyed hash used for request signatures.
pub type HmacSha1 = Hmac<Sha1>;

/// Signature method advertised in `oauth_signature_method`.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Protocol version advertised in `oauth_version`.
pub const OAUTH_VERSION: &str = "1.0";

/// A complete set of user-context OAuth 1.0a credentials.
#[derive(Clone)]
pub struct Credentials {
    consumer_key: String,
    access_token: String,
    // Secrets only live inside the keyed hash.
    hasher: HmacSha1,
}

impl Credentials {
    /// Create credentials and derive the signing key
    /// `encode(consumer_secret)&encode(access_token_secret)`.
    pub fn new(
        consumer_key: &str,
        consumer_secret: &str,
        access_token: &str,
        access_token_secret: &str,
    ) -> Self {
        let signing_key = format!(
            "{}&{}",
            urlencoding::encode(consumer_secret),
            urlencoding::encode(access_token_secret)
        );
        let hasher = HmacSha1::new_from_slice(signing_key.as_bytes())
            .expect("HMAC can take key of any size");

        Self {
            consumer_key: consumer_key.to_string(),
            access_token: access_token.to_string(),
            hasher,
        }
    }

    /// Create credentials from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let consumer_key = std::env::var("TWITTER_CONSUMER_KEY")
            .map_err(|_| anyhow::anyhow!("TWITTER_CONSUMER_KEY is required"))?;
        let consumer_secret = std::env::var("TWITTER_CONSUMER_SECRET")
            .map_err(|_| anyhow::anyhow!("TWITTER_CONSUMER_SECRET is required"))?;
        let access_token = std::env::var("TWITTER_ACCESS_TOKEN")
            .map_err(|_| anyhow::anyhow!("TWITTER_ACCESS_TOKEN is required"))?;
        let access_token_secret = std::env::var("TWITTER_ACCESS_TOKEN_SECRET")
            .map_err(|_| anyhow::anyhow!("TWITTER_ACCESS_TOKEN_SECRET is required"))?;

        Ok(Self::new(
            &consumer_key,
            &consumer_secret,
            &access_token,
            &access_token_secret,
        ))
    }

    /// Consumer (API) key.
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Always [`SIGNATURE_METHOD`].
    pub fn signature_method(&self) -> &'static str {
        SIGNATURE_METHOD
    }

    /// Always [`OAUTH_VERSION`].
    pub fn version(&self) -> &'static str {
        OAUTH_VERSION
    }

    /// A fresh copy of the keyed hash, ready for one signature.
    pub(crate) fn hasher(&self) -> HmacSha1 {
        self.hasher.clone()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

/// Long-lived holder for the client's credentials.
///
/// The unset state is observable: until [`set_credentials`](Self::set_credentials)
/// runs, [`check_ready`](Self::check_ready) fails with
/// [`TwitterError::NotAuthenticated`].
///
/// Writes are last-write-wins. The lock only makes a single write atomic;
/// two callers setting different credentials concurrently still race, and
/// requests signed in between may use either pair.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<Option<Arc<Credentials>>>,
}

impl CredentialStore {
    /// Create an empty (not ready) store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the four values, build the keyed hash and mark the store ready.
    /// Overwrites any previous credentials.
    pub fn set_credentials(
        &self,
        consumer_key: &str,
        consumer_secret: &str,
        access_token: &str,
        access_token_secret: &str,
    ) {
        self.set(Credentials::new(
            consumer_key,
            consumer_secret,
            access_token,
            access_token_secret,
        ));
    }

    /// Install an already built [`Credentials`] value.
    pub fn set(&self, credentials: Credentials) {
        *self.inner.write() = Some(Arc::new(credentials));
    }

    /// Return the store to the unset state.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Whether credentials have been set.
    pub fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Snapshot of the current credentials, or `NotAuthenticated`.
    pub fn check_ready(&self) -> Result<Arc<Credentials>> {
        self.inner
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(TwitterError::NotAuthenticated)
    }
}
