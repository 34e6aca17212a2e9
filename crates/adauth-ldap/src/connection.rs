//! `ldap3` backed [`DirectoryConnection`].

use crate::client::{DirectoryConnection, LdapEntry, SearchRequest, TransportError};
use adauth_core::{DirectoryConfig, Error, Result, SecurityType};
use async_trait::async_trait;
use ldap3::result::SearchResult;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, SearchEntry, SearchOptions};
use native_tls::TlsConnector;
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "ldap";

/// Directory connection over an established `ldap3` handle.
///
/// The handle is cloned for every request, so one connection can serve concurrent callers.
/// Binding is left to the owner of the handle (see [`Ldap3Connection::handle`]).
#[derive(Clone)]
pub struct Ldap3Connection {
    inner: Ldap,
    operation_timeout: Option<Duration>,
}

impl Ldap3Connection {
    /// Wraps an `ldap3` handle.
    #[must_use]
    pub fn new(ldap: Ldap) -> Self {
        Self {
            inner: ldap,
            operation_timeout: None,
        }
    }

    /// Applies a timeout to every search.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Returns a clone of the underlying handle, e.g. to bind or unbind.
    #[must_use]
    pub fn handle(&self) -> Ldap {
        self.inner.clone()
    }
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn search(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<Vec<LdapEntry>, TransportError> {
        let mut ldap = self.inner.clone();
        ldap.with_search_options(
            SearchOptions::new()
                .deref(request.deref.into())
                .sizelimit(request.size_limit),
        );
        if let Some(timeout) = self.operation_timeout {
            ldap.with_timeout(timeout);
        }

        let attributes: Vec<&str> = request.attributes.iter().map(String::as_str).collect();
        let SearchResult(entries, result) = ldap
            .search(
                &request.base_dn,
                request.scope.into(),
                &request.filter,
                attributes,
            )
            .await?;

        let entries = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from)
            .collect();

        if result.rc != 0 {
            return Err(TransportError::from_result_code(result.rc, result.text, entries));
        }

        Ok(entries)
    }
}

/// Connects to the configured server without binding.
///
/// # Errors
///
/// Returns [`Error::ExternalServiceError`] if the server cannot be reached, or a configuration
/// error if the URL or TLS settings are invalid.
pub async fn connect(config: &DirectoryConfig) -> Result<Ldap3Connection> {
    let url = config.url()?;
    let settings = build_ldap_settings(config)?;

    debug!(url = %url, security = ?config.security, "connecting to directory server");
    let (conn, ldap) = LdapConnAsync::with_settings(settings, url.as_str())
        .await
        .map_err(map_ldap_error)?;

    tokio::spawn(async move {
        if let Err(err) = conn.drive().await {
            warn!(error = %err, "LDAP connection driver error");
        }
    });

    Ok(Ldap3Connection::new(ldap).with_operation_timeout(config.operation_timeout()))
}

fn build_ldap_settings(config: &DirectoryConfig) -> Result<LdapConnSettings> {
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(config.connection_timeout())
        .set_starttls(config.security == SecurityType::StartTls);

    if !config.tls_verify {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> Error {
    Error::ExternalServiceError {
        service: SERVICE.to_string(),
        message: err.to_string(),
    }
}
