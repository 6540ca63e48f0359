//! Client configuration
//!
//! Connection settings are resolved once, at startup, into a `ClientConfig`
//! that is handed to the client. Nothing here writes to the process
//! environment.

use std::fmt;
use std::time::Duration;

/// Default tracking server endpoint.
pub const DEFAULT_TRACKING_URI: &str = "http://submarine-mlflow-service:5000";
/// Default artifact store endpoint.
pub const DEFAULT_REGISTRY_URI: &str = "http://submarine-minio-service:9000";
/// Default artifact store bucket.
pub const DEFAULT_ARTIFACT_BUCKET: &str = "submarine";
/// Default artifact store region. MinIO accepts any region in signatures.
pub const DEFAULT_ARTIFACT_REGION: &str = "us-east-1";
/// Default artifact store access key id.
pub const DEFAULT_ACCESS_KEY_ID: &str = "submarine_minio";
/// Default artifact store secret access key.
pub const DEFAULT_SECRET_ACCESS_KEY: &str = "submarine_minio";
/// Default per-request timeout for HTTP collaborators.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable overriding the tracking endpoint.
pub const TRACKING_URI_ENV: &str = "MLFLOW_TRACKING_URI";
/// Environment variable overriding the artifact store endpoint.
pub const REGISTRY_URI_ENV: &str = "MLFLOW_S3_ENDPOINT_URL";
/// Environment variable overriding the access key id.
pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
/// Environment variable overriding the secret access key.
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Artifact store credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Create credentials.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Get the access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_ACCESS_KEY_ID, DEFAULT_SECRET_ACCESS_KEY)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How a follower worker polls for the leader's experiment.
///
/// The default polls every second forever. `bounded` adds exponential
/// backoff together with attempt and wall-clock limits.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first re-query.
    pub interval: Duration,
    /// Growth factor applied to the delay after each attempt (1.0 = fixed).
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay.
    pub max_interval: Duration,
    /// Maximum number of re-queries, `None` for no limit.
    pub max_attempts: Option<u32>,
    /// Maximum total waiting time, `None` for no limit.
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    /// Fixed one-second polling with no limits.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            interval: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(30),
            max_attempts: None,
            timeout: None,
        }
    }

    /// Exponential backoff (x2, capped at 30s) limited by attempts and time.
    #[must_use]
    pub const fn bounded(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            interval: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            max_attempts: Some(max_attempts),
            timeout: Some(timeout),
        }
    }

    /// Delay to wait before re-query number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.interval.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Whether another re-query is allowed after `attempts` re-queries and
    /// `elapsed` time spent waiting.
    #[must_use]
    pub fn allows(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
            && self.timeout.map_or(true, |limit| elapsed < limit)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Connection settings for the tracking server and artifact store.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    tracking_uri: String,
    registry_uri: String,
    artifact_bucket: String,
    credentials: Credentials,
    poll_policy: PollPolicy,
    request_timeout: Duration,
}

impl ClientConfig {
    /// Create a builder starting from the compiled-in defaults.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Resolve overrides from the process environment, falling back to the
    /// compiled-in defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve overrides through `lookup`, falling back to the defaults.
    /// Empty values count as unset.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let mut builder = Self::builder();
        if let Some(uri) = get(TRACKING_URI_ENV) {
            builder = builder.tracking_uri(uri);
        }
        if let Some(uri) = get(REGISTRY_URI_ENV) {
            builder = builder.registry_uri(uri);
        }
        let defaults = Credentials::default();
        builder
            .credentials(Credentials::new(
                get(ACCESS_KEY_ID_ENV).unwrap_or_else(|| defaults.access_key_id.clone()),
                get(SECRET_ACCESS_KEY_ENV).unwrap_or_else(|| defaults.secret_access_key.clone()),
            ))
            .build()
    }

    /// Get the tracking server endpoint.
    #[must_use]
    pub fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }

    /// Get the artifact store endpoint.
    #[must_use]
    pub fn registry_uri(&self) -> &str {
        &self.registry_uri
    }

    /// Get the artifact store bucket.
    #[must_use]
    pub fn artifact_bucket(&self) -> &str {
        &self.artifact_bucket
    }

    /// Get the artifact store credentials.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get the experiment polling policy.
    #[must_use]
    pub const fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    /// Get the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    tracking_uri: String,
    registry_uri: String,
    artifact_bucket: String,
    credentials: Credentials,
    poll_policy: PollPolicy,
    request_timeout: Duration,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            registry_uri: DEFAULT_REGISTRY_URI.to_string(),
            artifact_bucket: DEFAULT_ARTIFACT_BUCKET.to_string(),
            credentials: Credentials::default(),
            poll_policy: PollPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfigBuilder {
    /// Set the tracking server endpoint.
    #[must_use]
    pub fn tracking_uri(mut self, uri: impl Into<String>) -> Self {
        self.tracking_uri = uri.into();
        self
    }

    /// Set the artifact store endpoint.
    #[must_use]
    pub fn registry_uri(mut self, uri: impl Into<String>) -> Self {
        self.registry_uri = uri.into();
        self
    }

    /// Set the artifact store bucket.
    #[must_use]
    pub fn artifact_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.artifact_bucket = bucket.into();
        self
    }

    /// Set the artifact store credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the experiment polling policy.
    #[must_use]
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Build the `ClientConfig`.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            tracking_uri: self.tracking_uri.trim_end_matches('/').to_string(),
            registry_uri: self.registry_uri.trim_end_matches('/').to_string(),
            artifact_bucket: self.artifact_bucket,
            credentials: self.credentials,
            poll_policy: self.poll_policy,
            request_timeout: self.request_timeout,
        }
    }
}
