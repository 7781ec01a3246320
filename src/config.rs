//! Service configuration.
//!
//! All fields have defaults, so a `ServiceConfig` can be deserialized from a
//! partial document:
//!
//! ```rust
//! use odata_server::config::{ScopeViolationPolicy, ServiceConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config: ServiceConfig = serde_json::from_str(
//!     r#"{"baseUri": "http://localhost:9080/odata-server-tecsvc/odata.svc"}"#,
//! )?;
//! let config = config.validated()?;
//! assert_eq!(config.base_uri.path(), "/odata-server-tecsvc/odata.svc/");
//! assert_eq!(config.scope_violation, ScopeViolationPolicy::AbortBatch);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

/// Default maximum number of parts in one batch.
pub const DEFAULT_MAX_BATCH_PARTS: usize = 1000;

/// Default maximum batch body size (16 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: usize = 16 * 1024 * 1024;

/// What to do when a batch part addresses a URI outside the service root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeViolationPolicy {
    /// Reject the whole batch with 400 and no multipart body.
    #[default]
    AbortBatch,
    /// Answer only the offending part with a 400 sub-response inside a 202
    /// envelope. Relative-path and foreign-host violations still abort.
    FailFrame,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Base URI '{0}' must be an absolute http or https URI")]
    InvalidBaseUri(String),

    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
}

/// Settings of one OData service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    /// Service root; always ends with `/` once validated
    pub base_uri: Url,
    /// Value of the `OData-Version` response header
    pub odata_version: String,
    pub max_batch_parts: usize,
    pub max_batch_bytes: usize,
    pub scope_violation: ScopeViolationPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            odata_version: "4.0".to_string(),
            max_batch_parts: DEFAULT_MAX_BATCH_PARTS,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            scope_violation: ScopeViolationPolicy::default(),
        }
    }
}

fn default_base_uri() -> Url {
    // Literal is a valid absolute URL.
    Url::parse("http://localhost/odata.svc/").unwrap_or_else(|_| unreachable!())
}

impl ServiceConfig {
    /// Configuration for the given service root with default limits.
    pub fn new(base_uri: &str) -> Result<Self, ConfigError> {
        let base_uri =
            Url::parse(base_uri).map_err(|_| ConfigError::InvalidBaseUri(base_uri.to_string()))?;
        Self {
            base_uri,
            ..Self::default()
        }
        .validated()
    }

    pub fn with_scope_violation(mut self, policy: ScopeViolationPolicy) -> Self {
        self.scope_violation = policy;
        self
    }

    pub fn with_max_batch_parts(mut self, max: usize) -> Self {
        self.max_batch_parts = max;
        self
    }

    pub fn with_max_batch_bytes(mut self, max: usize) -> Self {
        self.max_batch_bytes = max;
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.base_uri;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUri(base.to_string()));
        }
        if self.max_batch_parts == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "maxBatchParts",
            });
        }
        if self.max_batch_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "maxBatchBytes",
            });
        }
        Ok(())
    }

    /// Validate and normalize the base URI to end with `/`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        if !self.base_uri.path().ends_with('/') {
            let path = format!("{}/", self.base_uri.path());
            self.base_uri.set_path(&path);
        }
        self.base_uri.set_query(None);
        self.base_uri.set_fragment(None);
        Ok(self)
    }

    /// Service root as text, ending with `/`.
    pub fn service_root(&self) -> &str {
        self.base_uri.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.service_root(), "http://localhost/odata.svc/");
        assert_eq!(config.odata_version, "4.0");
        assert_eq!(config.max_batch_parts, DEFAULT_MAX_BATCH_PARTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_uri_normalized() {
        let config = ServiceConfig::new("http://localhost:9080/svc.svc?x=1").unwrap();
        assert_eq!(config.service_root(), "http://localhost:9080/svc.svc/");
    }

    #[test]
    fn test_rejects_non_http_base() {
        assert!(matches!(
            ServiceConfig::new("ftp://localhost/svc/"),
            Err(ConfigError::InvalidBaseUri(_))
        ));
        assert!(ServiceConfig::new("relative/svc").is_err());
    }

    #[test]
    fn test_partial_deserialization() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"scopeViolation": "failFrame", "maxBatchParts": 3}"#)
                .unwrap();
        assert_eq!(config.scope_violation, ScopeViolationPolicy::FailFrame);
        assert_eq!(config.max_batch_parts, 3);
        assert_eq!(config.max_batch_bytes, DEFAULT_MAX_BATCH_BYTES);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = ServiceConfig::default().with_max_batch_parts(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                field: "maxBatchParts"
            })
        );
    }
}
