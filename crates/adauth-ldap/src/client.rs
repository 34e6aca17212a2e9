//! Directory connection capability consumed by the search layer.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// LDAP result code reported when a search hits its size limit.
pub const SIZE_LIMIT_EXCEEDED: u32 = 4;

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for ldap3::Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Self::Base,
            SearchScope::OneLevel => Self::OneLevel,
            SearchScope::Subtree => Self::Subtree,
        }
    }
}

/// Alias dereferencing policy for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerefAliasing {
    /// Never dereference aliases.
    Never,
    /// Dereference while searching below the base.
    Searching,
    /// Dereference when locating the base.
    Finding,
    /// Always dereference.
    Always,
}

impl From<DerefAliasing> for ldap3::DerefAliases {
    fn from(deref: DerefAliasing) -> Self {
        match deref {
            DerefAliasing::Never => Self::Never,
            DerefAliasing::Searching => Self::Searching,
            DerefAliasing::Finding => Self::Finding,
            DerefAliasing::Always => Self::Always,
        }
    }
}

/// One search against one search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search root.
    pub base_dn: String,
    /// Search scope.
    pub scope: SearchScope,
    /// Alias dereferencing.
    pub deref: DerefAliasing,
    /// Maximum number of entries the server should return (0 means no limit).
    pub size_limit: i32,
    /// Filter expression.
    pub filter: String,
    /// Requested attributes; empty requests all user attributes.
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// Creates a whole-subtree, always-dereferencing request.
    #[must_use]
    pub fn subtree(
        base_dn: impl Into<String>,
        filter: impl Into<String>,
        attributes: &[&str],
        size_limit: i32,
    ) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope: SearchScope::Subtree,
            deref: DerefAliasing::Always,
            size_limit,
            filter: filter.into(),
            attributes: attributes.iter().map(|attr| (*attr).to_string()).collect(),
        }
    }
}

/// LDAP entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LdapEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserved order from server).
    pub attributes: HashMap<String, Vec<String>>,
}

impl LdapEntry {
    /// Creates an entry without attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds values for an attribute.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.insert(
            attribute.into(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes.get(attribute).map(Vec::as_slice)
    }
}

impl From<ldap3::SearchEntry> for LdapEntry {
    fn from(entry: ldap3::SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attributes: entry.attrs,
        }
    }
}

/// Transport level failure of a single search.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server stopped because more entries matched than the size limit allows.
    #[error("LDAP Result Code 4 \"Size Limit Exceeded\"")]
    SizeLimitExceeded {
        /// Entries the server returned before it hit the limit.
        entries: Vec<LdapEntry>,
    },
    /// The server answered with a non-success result code.
    #[error("LDAP Result Code {code}: {message}")]
    ResultCode {
        /// Result code.
        code: u32,
        /// Diagnostic text from the server.
        message: String,
    },
    /// Connectivity, protocol or timeout failure.
    #[error("{0}")]
    Connection(String),
}

impl TransportError {
    /// Classifies a result code returned by the server.
    ///
    /// `entries` are the entries received before the result; only a size-limit result keeps them.
    #[must_use]
    pub fn from_result_code(
        code: u32,
        message: impl Into<String>,
        entries: Vec<LdapEntry>,
    ) -> Self {
        if code == SIZE_LIMIT_EXCEEDED {
            Self::SizeLimitExceeded { entries }
        } else {
            Self::ResultCode {
                code,
                message: message.into(),
            }
        }
    }

    /// Returns true if the search matched more entries than its size limit.
    #[must_use]
    pub const fn is_size_limit_exceeded(&self) -> bool {
        matches!(self, Self::SizeLimitExceeded { .. })
    }

    /// Entries received before the failure, if the server sent any.
    #[must_use]
    pub fn into_partial_entries(self) -> Vec<LdapEntry> {
        match self {
            Self::SizeLimitExceeded { entries } => entries,
            _ => Vec::new(),
        }
    }
}

impl From<ldap3::LdapError> for TransportError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => {
                Self::from_result_code(result.rc, result.text, Vec::new())
            }
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Capability to run searches against a directory server.
///
/// Implementations must be safe to share between tasks; the search layer adds no locking of its
/// own. Timeouts and cancellation are the implementation's responsibility.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryConnection: Send + Sync {
    /// Executes one search request.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<LdapEntry>, TransportError>;
}
