//! Environment variable utilities
//!
//! Configuration overrides are read with these helpers; unparsable values
//! fall back to the compiled-in default instead of failing startup.

use std::str::FromStr;

/// Parse `key` as `T`, or return `default` when unset or unparsable
///
/// ```ignore
/// let slots: usize = env_get("COOPSOCK_TCP_SLOTS", 8);
/// ```
#[inline]
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Parse `key` as `T` if it is set and valid
#[inline]
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Read `key` as a flag
///
/// "1", "true", "yes" and "on" (any case) are true; any other value is
/// false; an unset variable yields `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_uses_default() {
        let v: usize = env_get("__COOPSOCK_TEST_UNSET__", 5);
        assert_eq!(v, 5);
        assert!(env_get_opt::<u16>("__COOPSOCK_TEST_UNSET__").is_none());
        assert!(env_get_bool("__COOPSOCK_TEST_UNSET__", true));
    }

    #[test]
    fn test_parse_and_fallback() {
        std::env::set_var("__COOPSOCK_TEST_NUM__", " 42 ");
        assert_eq!(env_get("__COOPSOCK_TEST_NUM__", 0usize), 42);

        std::env::set_var("__COOPSOCK_TEST_NUM__", "forty-two");
        assert_eq!(env_get("__COOPSOCK_TEST_NUM__", 7usize), 7);
        std::env::remove_var("__COOPSOCK_TEST_NUM__");
    }

    #[test]
    fn test_bool_values() {
        for (text, expected) in [("ON", true), ("yes", true), ("0", false), ("nah", false)] {
            std::env::set_var("__COOPSOCK_TEST_FLAG__", text);
            assert_eq!(env_get_bool("__COOPSOCK_TEST_FLAG__", !expected), expected);
        }
        std::env::remove_var("__COOPSOCK_TEST_FLAG__");
    }
}
