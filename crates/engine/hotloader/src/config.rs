//! Runtime configuration

use std::env;

/// Default limit on nested variable references during evaluation
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 64;

/// Default limit on nested `(` scopes inside one expression
pub const DEFAULT_MAX_SCOPE_DEPTH: usize = 32;

/// Configuration for a [`Hotloader`](crate::Hotloader)
#[derive(Debug, Clone)]
pub struct HotloaderConfig {
    /// Resolve relative `include` paths against the including file's directory.
    /// When false they are resolved against the process working directory.
    pub resolve_includes_relative: bool,
    /// Maximum depth of variable references followed while evaluating
    pub max_eval_depth: usize,
    /// Maximum nesting of parenthesised scopes the parser accepts
    pub max_scope_depth: usize,
}

impl Default for HotloaderConfig {
    fn default() -> Self {
        Self {
            resolve_includes_relative: true,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
            max_scope_depth: DEFAULT_MAX_SCOPE_DEPTH,
        }
    }
}

impl HotloaderConfig {
    /// Builds a configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            resolve_includes_relative: parse_flag(
                env::var("HOTLOADER_INCLUDE_RELATIVE").ok().as_deref(),
                defaults.resolve_includes_relative,
            ),
            max_eval_depth: parse_depth(
                env::var("HOTLOADER_MAX_EVAL_DEPTH").ok().as_deref(),
                defaults.max_eval_depth,
            ),
            max_scope_depth: parse_depth(
                env::var("HOTLOADER_MAX_SCOPE_DEPTH").ok().as_deref(),
                defaults.max_scope_depth,
            ),
        }
    }
}

fn parse_depth(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|depth| *depth > 0)
        .unwrap_or(default)
}

fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HotloaderConfig::default();
        assert!(config.resolve_includes_relative);
        assert_eq!(config.max_eval_depth, DEFAULT_MAX_EVAL_DEPTH);
        assert_eq!(config.max_scope_depth, DEFAULT_MAX_SCOPE_DEPTH);
    }

    #[test]
    fn test_parse_depth() {
        assert_eq!(parse_depth(Some("16"), 64), 16);
        assert_eq!(parse_depth(Some(" 8 "), 64), 8);
        assert_eq!(parse_depth(Some("0"), 64), 64);
        assert_eq!(parse_depth(Some("deep"), 64), 64);
        assert_eq!(parse_depth(None, 32), 32);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("TRUE"), false));
        assert!(parse_flag(Some(" on "), false));
        assert!(!parse_flag(Some("0"), true));
        assert!(parse_flag(Some("maybe"), true));
        assert!(!parse_flag(None, false));
    }
}
