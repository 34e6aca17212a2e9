//! Searches spanning every configured search root.

use crate::client::{DirectoryConnection, LdapEntry, SearchRequest, TransportError};
use adauth_core::{DirectoryConfig, Error, Result};
use std::sync::Arc;
use tracing::warn;

/// Runs searches over the search roots of a [`DirectoryConfig`].
///
/// Roots are searched one after another in configuration order. A failing root never stops the
/// iteration; an error is only returned when no root produced an answer, and in that case it is
/// the error of the last failing root.
pub struct DirectorySearch {
    config: Arc<DirectoryConfig>,
    connection: Box<dyn DirectoryConnection>,
}

impl DirectorySearch {
    /// Creates a search over `connection` using the roots of `config`.
    #[must_use]
    pub fn new(
        config: impl Into<Arc<DirectoryConfig>>,
        connection: Box<dyn DirectoryConnection>,
    ) -> Self {
        Self {
            config: config.into(),
            connection,
        }
    }

    /// Configuration the search roots are taken from.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the entries matching `filter` across all search roots.
    ///
    /// Entries keep root order and the server's order within a root. Failing roots are skipped
    /// whenever any other root returns entries. A root that hits `size_limit` still contributes
    /// the entries it sent before stopping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SearchError`] for the last failing root if no root returned an entry.
    pub async fn search(
        &self,
        filter: &str,
        attrs: &[&str],
        size_limit: i32,
    ) -> Result<Vec<LdapEntry>> {
        let mut entries = Vec::new();
        let mut last_error = None;

        for root in self.config.search_roots() {
            let request = SearchRequest::subtree(root, filter, attrs, size_limit);
            match self.connection.search(&request).await {
                Ok(found) => entries.extend(found),
                Err(err) => {
                    warn!(search_root = %root, %filter, error = %err, "directory search failed");
                    last_error = Some(search_error(filter, &err));
                    entries.extend(err.into_partial_entries());
                }
            }
        }

        match last_error {
            Some(err) if entries.is_empty() => Err(err),
            _ => Ok(entries),
        }
    }

    /// Returns the single entry matching `filter`.
    ///
    /// Each root is searched with a size limit of one. The first root that returns an entry
    /// wins and the remaining roots are not searched.
    ///
    /// # Errors
    ///
    /// If no root returns an entry, the error of the last root searched:
    /// [`Error::AmbiguousResult`] when it matched more than one entry, [`Error::NoEntries`]
    /// when it matched nothing, or [`Error::SearchError`] on transport failure.
    pub async fn search_one(&self, filter: &str, attrs: &[&str]) -> Result<LdapEntry> {
        let mut last_error = Error::NoEntries {
            filter: filter.to_string(),
        };

        for root in self.config.search_roots() {
            let request = SearchRequest::subtree(root, filter, attrs, 1);
            last_error = match self.connection.search(&request).await {
                Ok(entries) => match entries.into_iter().next() {
                    Some(entry) => return Ok(entry),
                    None => Error::NoEntries {
                        filter: filter.to_string(),
                    },
                },
                Err(TransportError::SizeLimitExceeded { .. }) => Error::AmbiguousResult {
                    filter: filter.to_string(),
                },
                Err(err) => search_error(filter, &err),
            };
            warn!(
                search_root = %root,
                %filter,
                error = %last_error,
                "no unique entry in search root"
            );
        }

        Err(last_error)
    }

    /// Returns the DN of the entry whose `attr` equals `value`.
    ///
    /// # Errors
    ///
    /// See [`DirectorySearch::search_one`].
    pub async fn get_dn(&self, attr: &str, value: &str) -> Result<String> {
        let entry = self.search_one(&equality_filter(attr, value), &[]).await?;
        Ok(entry.dn)
    }

    /// Returns the entry whose `attr` equals `value`, with only `attrs` requested.
    ///
    /// # Errors
    ///
    /// See [`DirectorySearch::search_one`].
    pub async fn get_attributes(
        &self,
        attr: &str,
        value: &str,
        attrs: &[&str],
    ) -> Result<LdapEntry> {
        self.search_one(&equality_filter(attr, value), attrs).await
    }
}

fn search_error(filter: &str, err: &TransportError) -> Error {
    Error::SearchError {
        filter: filter.to_string(),
        message: err.to_string(),
    }
}

/// Builds `(attr=value)`, escaping filter metacharacters in `value`.
fn equality_filter(attr: &str, value: &str) -> String {
    format!("({attr}={})", escape_filter_value(value))
}

fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{DerefAliasing, MockDirectoryConnection, SearchScope};

    fn multi_root_config(roots: &[&str]) -> DirectoryConfig {
        DirectoryConfig::new("ad.example.com", 389, "dc=example,dc=com")
            .unwrap()
            .with_search_dn(roots.iter().copied())
    }

    fn entry(dn: &str) -> LdapEntry {
        LdapEntry::new(dn).with_attribute("cn", [dn.split(',').next().unwrap_or_default()])
    }

    fn down() -> TransportError {
        TransportError::Connection("connection refused".to_string())
    }

    #[tokio::test]
    async fn search_uses_base_dn_without_search_roots() {
        let mut connection = MockDirectoryConnection::new();
        connection
            .expect_search()
            .withf(|request| {
                request.base_dn == "dc=example,dc=com"
                    && request.scope == SearchScope::Subtree
                    && request.deref == DerefAliasing::Always
                    && request.size_limit == 50
                    && request.filter == "(objectClass=user)"
                    && request.attributes == vec!["cn".to_string()]
            })
            .times(1)
            .returning(|_| Ok(vec![entry("cn=a,dc=example,dc=com")]));

        let config = DirectoryConfig::new("ad.example.com", 389, "dc=example,dc=com").unwrap();
        let search = DirectorySearch::new(config, Box::new(connection));
        let entries = search.search("(objectClass=user)", &["cn"], 50).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn search_success_dominates_partial_failure() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(3).returning(|request| {
            match request.base_dn.as_str() {
                "dc=one,dc=com" => Ok(vec![entry("cn=a,dc=one,dc=com")]),
                "dc=two,dc=com" => Err(down()),
                _ => Ok(vec![entry("cn=c,dc=three,dc=com")]),
            }
        });

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com", "dc=three,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let entries = search.search("(cn=*)", &[], 0).await.unwrap();

        let dns: Vec<&str> = entries.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(dns, vec!["cn=a,dc=one,dc=com", "cn=c,dc=three,dc=com"]);
    }

    #[tokio::test]
    async fn search_keeps_root_order_and_server_order() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().returning(|request| {
            if request.base_dn == "dc=one,dc=com" {
                Ok(vec![entry("cn=b,dc=one,dc=com"), entry("cn=a,dc=one,dc=com")])
            } else {
                Ok(vec![entry("cn=c,dc=two,dc=com")])
            }
        });

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let entries = search.search("(cn=*)", &[], 0).await.unwrap();

        let dns: Vec<&str> = entries.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(
            dns,
            vec!["cn=b,dc=one,dc=com", "cn=a,dc=one,dc=com", "cn=c,dc=two,dc=com"]
        );
    }

    #[tokio::test]
    async fn search_all_failed_returns_last_error() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(2).returning(|request| {
            if request.base_dn == "dc=one,dc=com" {
                Err(down())
            } else {
                Err(TransportError::from_result_code(32, "no such object", Vec::new()))
            }
        });

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let err = search.search("(uid=jdoe)", &[], 0).await.unwrap_err();

        assert_eq!(
            err,
            Error::SearchError {
                filter: "(uid=jdoe)".to_string(),
                message: "LDAP Result Code 32: no such object".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "Search error \"(uid=jdoe)\": LDAP Result Code 32: no such object"
        );
    }

    #[tokio::test]
    async fn search_keeps_entries_from_size_limited_root() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(2).returning(|request| {
            if request.base_dn == "dc=one,dc=com" {
                Err(TransportError::SizeLimitExceeded {
                    entries: vec![entry("cn=a,dc=one,dc=com"), entry("cn=b,dc=one,dc=com")],
                })
            } else {
                Err(down())
            }
        });

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let entries = search.search("(objectClass=user)", &[], 2).await.unwrap();

        let dns: Vec<&str> = entries.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(dns, vec!["cn=a,dc=one,dc=com", "cn=b,dc=one,dc=com"]);
    }

    #[tokio::test]
    async fn search_size_limit_without_entries_is_an_error() {
        let mut connection = MockDirectoryConnection::new();
        connection
            .expect_search()
            .returning(|_| Err(TransportError::SizeLimitExceeded { entries: Vec::new() }));

        let config = DirectoryConfig::new("ad.example.com", 389, "dc=example,dc=com").unwrap();
        let search = DirectorySearch::new(config, Box::new(connection));
        let err = search.search("(objectClass=user)", &[], 1).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Search error \"(objectClass=user)\": LDAP Result Code 4 \"Size Limit Exceeded\""
        );
    }

    #[tokio::test]
    async fn search_without_matches_is_empty_success() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(2).returning(|_| Ok(Vec::new()));

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        assert!(search.search("(uid=ghost)", &[], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_one_skips_ambiguous_root() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(2).returning(|request| {
            assert_eq!(request.size_limit, 1);
            if request.base_dn == "dc=one,dc=com" {
                Err(TransportError::from_result_code(4, "", Vec::new()))
            } else {
                Ok(vec![entry("cn=jdoe,dc=two,dc=com")])
            }
        });

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let found = search.search_one("(uid=jdoe)", &["cn"]).await.unwrap();
        assert_eq!(found.dn, "cn=jdoe,dc=two,dc=com");
    }

    #[tokio::test]
    async fn search_one_stops_at_first_match() {
        let mut connection = MockDirectoryConnection::new();
        connection
            .expect_search()
            .withf(|request| request.base_dn == "dc=one,dc=com")
            .times(1)
            .returning(|_| Ok(vec![entry("cn=jdoe,dc=one,dc=com")]));

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let found = search.search_one("(uid=jdoe)", &[]).await.unwrap();
        assert_eq!(found.dn, "cn=jdoe,dc=one,dc=com");
    }

    #[tokio::test]
    async fn search_one_reports_no_entries() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(2).returning(|_| Ok(Vec::new()));

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let err = search.search_one("(uid=ghost)", &[]).await.unwrap_err();

        assert_eq!(
            err,
            Error::NoEntries {
                filter: "(uid=ghost)".to_string()
            }
        );
        assert_eq!(err.to_string(), "Search error \"(uid=ghost)\": no entries returned");
    }

    #[tokio::test]
    async fn search_one_last_error_wins() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().times(3).returning(|request| {
            match request.base_dn.as_str() {
                "dc=one,dc=com" => Ok(Vec::new()),
                "dc=two,dc=com" => Err(down()),
                _ => Err(TransportError::SizeLimitExceeded {
                    entries: vec![entry("cn=admin1,dc=three,dc=com")],
                }),
            }
        });

        let config = multi_root_config(&["dc=one,dc=com", "dc=two,dc=com", "dc=three,dc=com"]);
        let search = DirectorySearch::new(config, Box::new(connection));
        let err = search.search_one("(cn=admin*)", &[]).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Search error \"(cn=admin*)\": more than one entry returned"
        );
    }

    #[tokio::test]
    async fn search_one_reports_transport_error_with_cause() {
        let mut connection = MockDirectoryConnection::new();
        connection.expect_search().returning(|_| Err(down()));

        let config = DirectoryConfig::new("ad.example.com", 389, "dc=example,dc=com").unwrap();
        let search = DirectorySearch::new(config, Box::new(connection));
        let err = search.search_one("(uid=jdoe)", &[]).await.unwrap_err();

        assert_eq!(
            err,
            Error::SearchError {
                filter: "(uid=jdoe)".to_string(),
                message: "connection refused".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn get_dn_requests_no_attributes() {
        let mut connection = MockDirectoryConnection::new();
        connection
            .expect_search()
            .withf(|request| {
                request.filter == "(sAMAccountName=jdoe)"
                    && request.attributes.is_empty()
                    && request.size_limit == 1
            })
            .returning(|_| Ok(vec![entry("cn=John Doe,ou=Users,dc=example,dc=com")]));

        let config = DirectoryConfig::new("ad.example.com", 389, "dc=example,dc=com").unwrap();
        let search = DirectorySearch::new(config, Box::new(connection));
        let dn = search.get_dn("sAMAccountName", "jdoe").await.unwrap();
        assert_eq!(dn, "cn=John Doe,ou=Users,dc=example,dc=com");
    }

    #[tokio::test]
    async fn get_attributes_passes_projection() {
        let mut connection = MockDirectoryConnection::new();
        connection
            .expect_search()
            .withf(|request| {
                request.filter == "(mail=jdoe@example.com)"
                    && request.attributes == vec!["memberOf".to_string(), "cn".to_string()]
            })
            .returning(|_| {
                Ok(vec![LdapEntry::new("cn=jdoe,dc=example,dc=com")
                    .with_attribute("memberOf", ["cn=admins,dc=example,dc=com"])])
            });

        let config = DirectoryConfig::new("ad.example.com", 389, "dc=example,dc=com").unwrap();
        let search = DirectorySearch::new(config, Box::new(connection));
        let found = search
            .get_attributes("mail", "jdoe@example.com", &["memberOf", "cn"])
            .await
            .unwrap();
        assert_eq!(found.first("memberOf"), Some("cn=admins,dc=example,dc=com"));
    }

    #[test]
    fn equality_filter_escapes_metacharacters() {
        assert_eq!(equality_filter("uid", "jdoe"), "(uid=jdoe)");
        assert_eq!(equality_filter("cn", "a*(b)\\"), "(cn=a\\2a\\28b\\29\\5c)");
    }
}
