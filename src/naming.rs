//! Metric name sanitization
//!
//! Runtime metric names such as `/gc/heap/allocs:bytes` are not valid
//! instrument names. [`sanitize_metric_name`] folds them into
//! `[a-z0-9_]`-style identifiers that always start with a letter.

/// Prefix applied when a sanitized name does not start with a letter.
const NON_LETTER_PREFIX: &str = "o_";

/// Sanitize a metric name.
///
/// 1. lower-case the name
/// 2. replace every char that is not a letter, digit or `_` with `_`
/// 3. trim leading and trailing `_`
/// 4. prepend `o_` when the first char is not a letter
///
/// A name with no letters or digits at all becomes `o`. The function is
/// idempotent.
pub fn sanitize_metric_name(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    let trimmed = replaced.trim_matches('_');
    match trimmed.chars().next() {
        None => "o".to_string(),
        Some(first) if first.is_alphabetic() => trimmed.to_string(),
        Some(_) => format!("{}{}", NON_LETTER_PREFIX, trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_runtime_style_name() {
        assert_eq!(
            sanitize_metric_name("/cpu/classes/gc/mark/assist:cpu-seconds"),
            "cpu_classes_gc_mark_assist_cpu_seconds"
        );
    }

    #[test]
    fn test_leading_digit_gets_prefix() {
        assert_eq!(sanitize_metric_name("1start"), "o_1start");
    }

    #[test]
    fn test_case_folded() {
        assert_eq!(sanitize_metric_name("noChange"), "nochange");
    }

    #[test]
    fn test_trims_underscores() {
        assert_eq!(sanitize_metric_name("/start"), "start");
        assert_eq!(sanitize_metric_name("!special$"), "special");
        assert_eq!(sanitize_metric_name("with/slash_and_123"), "with_slash_and_123");
    }

    #[test]
    fn test_degenerate_names() {
        assert_eq!(sanitize_metric_name(""), "o");
        assert_eq!(sanitize_metric_name("/:-"), "o");
        assert_eq!(sanitize_metric_name("/42"), "o_42");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(name in "[ -~]{0,40}") {
            let once = sanitize_metric_name(&name);
            prop_assert_eq!(sanitize_metric_name(&once), once.clone());
        }

        #[test]
        fn prop_sanitized_starts_with_letter(name in "[ -~]{0,40}") {
            let sanitized = sanitize_metric_name(&name);
            prop_assert!(sanitized.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false));
        }
    }
}
