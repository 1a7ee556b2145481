//! Object key validation.
//!
//! Stored objects live directly under the transport root. A key is the
//! single file name an object is stored as, and doubles as the last segment
//! of its public URL.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Validates an object key and returns it as a root-relative path.
///
/// A valid key is exactly one normal path component: no separators, no `.`
/// or `..`, no null bytes. Keys never address anything outside the root.
///
/// # Examples
///
/// ```
/// use filedeck_transport::validate_key;
/// assert!(validate_key("3f2a9c.png").is_ok());
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("nested/key.png").is_err());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate(key: &str) -> Result<PathBuf> {
    let invalid = || exn::Exn::from(ErrorKind::InvalidKey(key.to_string()));
    // Null bytes pass through Path::components() on Unix but cause
    // truncation in C-based syscalls; backslashes are separators on Windows.
    if key.contains(['\0', '\\']) {
        return Err(invalid());
    }
    let mut components = Path::new(key).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if !key.ends_with('/') => Ok(PathBuf::from(name)),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abc.png")]
    #[case("0f3c.tar.gz")]
    #[case("no-extension")]
    fn test_valid_keys(#[case] key: &str) {
        assert_eq!(validate(key).unwrap(), Path::new(key));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../secret")]
    #[case("/etc/passwd")]
    #[case("a/b.png")]
    #[case("a\\b.png")]
    #[case("a.png/")]
    #[case("a\0b")]
    fn test_invalid_keys(#[case] key: &str) {
        let err = validate(key).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }
}
