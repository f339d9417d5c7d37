//! Admin gate configuration.
//!
//! Identity checks live outside the ledger core. The only thing the core layer
//! trusts is a yes/no answer to "is this caller authenticated"; this module
//! supplies the token that answer is derived from.

/// Reads the admin token from `ADMIN_TOKEN`. Empty values count as unset.
#[must_use]
pub fn get_admin_token() -> Option<String> {
    std::env::var("ADMIN_TOKEN")
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Checks a presented token against the configured one.
///
/// With no token configured the gate is open.
#[must_use]
pub fn is_authenticated(configured: Option<&str>, presented: Option<&str>) -> bool {
    match configured {
        None => true,
        Some(expected) => presented.is_some_and(|p| p == expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_gate_when_unconfigured() {
        assert!(is_authenticated(None, None));
        assert!(is_authenticated(None, Some("anything")));
    }

    #[test]
    fn test_token_must_match() {
        assert!(is_authenticated(Some("s3cret"), Some("s3cret")));
        assert!(!is_authenticated(Some("s3cret"), Some("wrong")));
        assert!(!is_authenticated(Some("s3cret"), None));
    }
}
