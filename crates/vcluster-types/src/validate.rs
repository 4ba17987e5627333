//! Name validation

use crate::NAMESPACE_PREFIX;
use thiserror::Error;

/// Longest namespace name the host cluster accepts.
const MAX_NAMESPACE_LEN: usize = 63;

/// Errors raised for names a virtual cluster cannot be given.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("clusterName is required")]
    Empty,

    #[error("cluster name '{name}' exceeds {max} characters")]
    TooLong { name: String, max: usize },

    #[error("cluster name '{0}' must not start or end with a hyphen")]
    Hyphen(String),

    #[error("cluster name '{0}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]")]
    InvalidCharacters(String),
}

/// Validate a virtual cluster name.
///
/// Rules: lowercase `[a-z0-9-]`, no leading/trailing hyphens, and short
/// enough that `vcluster-<name>` is still a valid namespace name.
pub fn validate_cluster_name(name: &str) -> Result<(), ValidationError> {
    let max = MAX_NAMESPACE_LEN - NAMESPACE_PREFIX.len();
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > max {
        return Err(ValidationError::TooLong {
            name: name.to_string(),
            max,
        });
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(ValidationError::Hyphen(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidCharacters(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_cluster_name("demo").is_ok());
        assert!(validate_cluster_name("team-a").is_ok());
        assert!(validate_cluster_name("c1").is_ok());
        assert!(validate_cluster_name(&"a".repeat(54)).is_ok());
    }

    #[test]
    fn invalid_names() {
        assert_eq!(validate_cluster_name(""), Err(ValidationError::Empty));
        assert!(matches!(
            validate_cluster_name(&"a".repeat(55)),
            Err(ValidationError::TooLong { max: 54, .. })
        ));
        assert!(validate_cluster_name("-demo").is_err());
        assert!(validate_cluster_name("demo-").is_err());
        assert!(validate_cluster_name("Demo").is_err());
        assert!(validate_cluster_name("de_mo").is_err());
        assert!(validate_cluster_name("../etc").is_err());
    }
}
