//! Directory configuration and identity derivation.
//!
//! [`DirectoryConfig`] describes how to reach a directory and which subtrees to search. It also
//! derives DNS domains from the configured DNs and turns raw usernames into userPrincipalName
//! candidates.

use crate::aggregate::AggregatingError;
use crate::dn::domain_from_dn;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;
use validator::{Validate, ValidateEmail};

/// Transport security used when connecting to the directory server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    /// Plain LDAP.
    #[default]
    None,
    /// LDAP over TLS (`ldaps://`).
    Tls,
    /// Plain LDAP upgraded with the StartTLS extended operation.
    StartTls,
}

impl SecurityType {
    /// URL scheme for this security type.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Tls => "ldaps",
            Self::None | Self::StartTls => "ldap",
        }
    }

    /// Well-known port for this security type.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 636,
            Self::None | Self::StartTls => 389,
        }
    }
}

/// Configuration for an Active Directory style server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Server host name or address
    #[validate(length(min = 1))]
    pub server: String,

    /// Server port
    #[validate(range(min = 1))]
    pub port: u16,

    /// Default search root
    #[validate(length(min = 1))]
    pub base_dn: String,

    /// Search roots overriding `base_dn` when present and non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_dn: Option<Vec<String>>,

    /// Transport security
    #[serde(default)]
    pub security: SecurityType,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds (0 disables it)
    #[validate(range(max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_connection_timeout_secs() -> u64 {
    10
}

const fn default_operation_timeout_secs() -> u64 {
    10
}

impl DirectoryConfig {
    /// Create a new directory configuration with required parameters.
    ///
    /// # Arguments
    ///
    /// * `server` - Host name or address of the directory server
    /// * `port` - Server port
    /// * `base_dn` - Default search root (e.g. `dc=corp,dc=example,dc=com`)
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(server: impl Into<String>, port: u16, base_dn: impl Into<String>) -> Result<Self> {
        let config = Self {
            server: server.into(),
            port,
            base_dn: base_dn.into(),
            search_dn: None,
            security: SecurityType::default(),
            tls_verify: default_tls_verify(),
            connection_timeout_secs: default_connection_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set the search roots that override the base DN.
    #[must_use]
    pub fn with_search_dn<I, S>(mut self, search_dn: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_dn = Some(search_dn.into_iter().map(Into::into).collect());
        self
    }

    /// Set the transport security.
    #[must_use]
    pub const fn with_security(mut self, security: SecurityType) -> Self {
        self.security = security;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Set the per-operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }

    /// Get the connection timeout as a Duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get the operation timeout, if enabled.
    #[must_use]
    pub const fn operation_timeout(&self) -> Option<Duration> {
        if self.operation_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.operation_timeout_secs))
        }
    }

    /// Build the server URL from the security type, server and port.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not form a valid URL.
    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&format!(
            "{}://{}:{}",
            self.security.scheme(),
            self.server,
            self.port
        ))?;
        Ok(url)
    }

    /// Effective search roots: `search_dn` when set and non-empty, otherwise `base_dn`.
    #[must_use]
    pub fn search_roots(&self) -> Vec<&str> {
        match self.search_dn.as_deref() {
            Some(roots) if !roots.is_empty() => roots.iter().map(String::as_str).collect(),
            _ => vec![self.base_dn.as_str()],
        }
    }

    /// Domain derived from the base DN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the base DN has no `dc=` component.
    pub fn domain(&self) -> Result<String> {
        domain_from_dn(&self.base_dn)
    }

    /// Domains derived from every search root, in order.
    ///
    /// Roots that do not yield a domain are skipped as long as at least one does; duplicates are
    /// kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aggregate`] with one message per root if no root yields a domain.
    pub fn domains(&self) -> Result<Vec<String>> {
        let mut failures = AggregatingError::new();
        let domains: Vec<String> = self
            .search_roots()
            .into_iter()
            .filter_map(|root| failures.record(domain_from_dn(root)))
            .collect();

        if domains.is_empty() {
            return Err(Error::Aggregate(failures));
        }

        if !failures.is_empty() {
            debug!(
                skipped = failures.len(),
                error = %failures,
                "ignoring search roots without a domain"
            );
        }
        Ok(domains)
    }

    /// userPrincipalName for `username` in the base DN's domain.
    ///
    /// A username that is already an email address is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the base DN has no `dc=` component.
    pub fn upn(&self, username: &str) -> Result<String> {
        if username.validate_email() {
            return Ok(username.to_string());
        }

        let domain = self.domain()?;
        Ok(format!("{username}@{domain}"))
    }

    /// userPrincipalName candidates for `username`, one per derived domain.
    ///
    /// A username that is already an email address yields itself as the only candidate.
    ///
    /// # Errors
    ///
    /// Propagates the failure of [`DirectoryConfig::domains`].
    pub fn upns(&self, username: &str) -> Result<Vec<String>> {
        if username.validate_email() {
            return Ok(vec![username.to_string()]);
        }

        Ok(self
            .domains()?
            .into_iter()
            .map(|domain| format!("{username}@{domain}"))
            .collect())
    }
}
