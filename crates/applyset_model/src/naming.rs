//! Batch record naming.
//!
//! A batch record is named `<base>.v<version>`, where `<base>` matches
//! `[a-z0-9]+`. Decoding is strict: anything else is not a batch name.

use regex::Regex;
use std::sync::LazyLock;

static BATCH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z0-9]+)\.v([0-9]+)$").unwrap_or_else(|e| panic!("batch name pattern: {e}"))
});

static BASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+$").unwrap_or_else(|e| panic!("base name pattern: {e}"))
});

/// Formats the record name for a batch version.
pub fn batch_name(base: &str, version: u32) -> String {
    format!("{base}.v{version}")
}

/// Decodes a record name into its base name and version.
///
/// Returns `None` for names that do not match the pattern, including
/// versions too large for `u32`.
pub fn decode_batch_name(name: &str) -> Option<(String, u32)> {
    let caps = BATCH_NAME.captures(name)?;
    let version = caps[2].parse().ok()?;
    Some((caps[1].to_string(), version))
}

/// Returns true if `base` can be used as a batch base name.
pub fn is_valid_base_name(base: &str) -> bool {
    BASE_NAME.is_match(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode() {
        assert_eq!(batch_name("app", 1), "app.v1");
        assert_eq!(batch_name("web2", 17), "web2.v17");
    }

    #[test]
    fn decode_valid() {
        assert_eq!(decode_batch_name("app.v1"), Some(("app".into(), 1)));
        assert_eq!(decode_batch_name("a1.v007"), Some(("a1".into(), 7)));
        assert_eq!(decode_batch_name("x.v0"), Some(("x".into(), 0)));
    }

    #[test]
    fn decode_rejects_other_names() {
        for name in [
            "",
            "app",
            "app.v",
            "App.v1",
            "my-app.v1",
            "app.v1.v2",
            "app.1",
            "app.v1x",
            " app.v1",
            "app.v99999999999",
        ] {
            assert_eq!(decode_batch_name(name), None, "{name:?}");
        }
    }

    #[test]
    fn base_name_validation() {
        assert!(is_valid_base_name("app"));
        assert!(is_valid_base_name("0x1"));
        assert!(!is_valid_base_name(""));
        assert!(!is_valid_base_name("my-app"));
        assert!(!is_valid_base_name("App"));
    }

    proptest! {
        #[test]
        fn round_trip(base in "[a-z0-9]{1,24}", version in any::<u32>()) {
            let name = batch_name(&base, version);
            prop_assert_eq!(decode_batch_name(&name), Some((base, version)));
        }

        #[test]
        fn arbitrary_strings_never_panic(name in ".*") {
            if let Some((base, version)) = decode_batch_name(&name) {
                prop_assert_eq!(batch_name(&base, version).len() <= name.len(), true);
            }
        }
    }
}
