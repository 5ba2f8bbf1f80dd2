//! Environment variable and home directory expansion

use std::sync::OnceLock;

use directories::BaseDirs;
use regex::{Captures, Regex};

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid regex")
    })
}

/// Expand `$NAME` and `${NAME}` from the process environment
///
/// References to unset variables are left as written.
pub fn expand_vars(contents: &str) -> String {
    expand_vars_with(contents, |name| std::env::var(name).ok())
}

/// Expand variable references using a custom lookup
pub fn expand_vars_with(contents: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    variable_pattern()
        .replace_all(contents, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replace a leading `~` with the user's home directory
pub fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };

    match BaseDirs::new() {
        Some(dirs) => format!("{}{}", dirs.home_dir().display(), rest),
        None => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "BACKUP_HOST" => Some("nas.local".to_string()),
            "DB_PASSWORD" => Some("s3cret".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_both_forms() {
        let expanded = expand_vars_with("host: $BACKUP_HOST\npassword: ${DB_PASSWORD}x", lookup);
        assert_eq!(expanded, "host: nas.local\npassword: s3cretx");
    }

    #[test]
    fn test_unknown_variables_are_untouched() {
        let expanded = expand_vars_with("path: $NOT_SET/${ALSO_NOT_SET} costs $5", lookup);
        assert_eq!(expanded, "path: $NOT_SET/${ALSO_NOT_SET} costs $5");
    }

    #[test]
    fn test_expand_from_process_environment() {
        std::env::set_var("BACKEE_TEST_EXPAND_VAR", "value");
        assert_eq!(expand_vars("a=${BACKEE_TEST_EXPAND_VAR}"), "a=value");
        std::env::remove_var("BACKEE_TEST_EXPAND_VAR");
    }

    #[test]
    fn test_expand_home() {
        let home = BaseDirs::new().unwrap().home_dir().display().to_string();
        assert_eq!(expand_home("~/documents"), format!("{}/documents", home));
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~other/documents"), "~other/documents");
        assert_eq!(expand_home("/etc/hosts"), "/etc/hosts");
    }
}
