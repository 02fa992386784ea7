//! Chart name checks
//!
//! Chart names are joined straight into output paths, so a name must be a
//! single path segment.

use std::path::Path;

use crate::error::{CoreError, Result};

/// Accept `name` only if it is its own final path segment
///
/// Rejects separators (both `/` and `\`, whatever the host), `.`, `..` and
/// the empty string.
pub fn validate_name(name: &str) -> Result<()> {
    let base = Path::new(name).file_name().and_then(|n| n.to_str());

    if base != Some(name) || name.contains('\\') {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_accepted() {
        for name in ["nginx", "my-app", "app_v2", "chart.with.dots", "...", ".hidden"] {
            assert!(validate_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_path_like_names_are_rejected() {
        for name in [
            "", ".", "..", "../evil", "a/b", "/abs", "trailing/", "nested/.", "a\\b", "..\\evil",
        ] {
            let err = validate_name(name).unwrap_err();
            assert!(
                matches!(&err, CoreError::InvalidName { name: n } if n == name),
                "{name:?} should be rejected"
            );
        }
    }
}
