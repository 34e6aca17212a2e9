//! Distinguished Name helpers for deriving DNS domains.

use crate::error::{Error, Result};

const DOMAIN_COMPONENT: &str = "dc=";

/// Derives the DNS-style domain from the `dc=` components of a distinguished name.
///
/// Components are split on `,`, trimmed and lower-cased; every `dc=` component contributes one
/// label, in order. Other components (`ou=`, `cn=`, ...) are ignored.
///
/// # Errors
///
/// Returns [`Error::ConfigError`] if the DN has no `dc=` component.
///
/// # Examples
///
/// ```
/// use adauth_core::dn::domain_from_dn;
///
/// let domain = domain_from_dn("DC=Corp,OU=Users,DC=Example,DC=Com").unwrap();
/// assert_eq!(domain, "corp.example.com");
/// ```
pub fn domain_from_dn(dn: &str) -> Result<String> {
    let mut domain = String::new();
    for component in dn.to_lowercase().split(',') {
        if let Some(label) = component.trim().strip_prefix(DOMAIN_COMPONENT) {
            domain.push('.');
            domain.push_str(label);
        }
    }

    if domain.len() <= 1 {
        return Err(Error::ConfigError("invalid BaseDN".to_string()));
    }

    Ok(domain[1..].to_string())
}
