//! Directory search for Active Directory style LDAP deployments.
//!
//! This crate searches every configured search root of an [`adauth_core::DirectoryConfig`]
//! through a pluggable [`DirectoryConnection`], tolerating roots that fail as long as another
//! root answers. An `ldap3` backed connection is provided.

#![deny(missing_docs)]

mod client;
mod connection;
mod search;

pub use client::{
    DerefAliasing, DirectoryConnection, LdapEntry, SearchRequest, SearchScope, TransportError,
    SIZE_LIMIT_EXCEEDED,
};
pub use connection::{connect, Ldap3Connection};
pub use search::DirectorySearch;

/// Convenient result alias that reuses the core error type.
pub type Result<T> = adauth_core::Result<T>;
