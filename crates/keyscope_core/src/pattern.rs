/// How a member filter was written, as reported to telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    ExactValueName,
    Pattern,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactValueName => "EXACT_VALUE_NAME",
            MatchType::Pattern => "PATTERN",
        }
    }
}

pub fn match_type(pattern: &str) -> MatchType {
    if is_glob_pattern(pattern) {
        MatchType::Pattern
    } else {
        MatchType::ExactValueName
    }
}

/// True when `pattern` contains an unescaped Redis glob metacharacter (`*`, `?`, `[`).
pub fn is_glob_pattern(pattern: &str) -> bool {
    let mut escaped = false;

    for ch in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }

        match ch {
            '\\' => escaped = true,
            '*' | '?' | '[' => return true,
            _ => {}
        }
    }

    false
}

/// Removes glob escapes so an exact filter can be looked up by name.
pub fn unescape_glob(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some(next) => result.push(next),
                None => result.push(ch),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_unescaped_metacharacters_only() {
        assert!(is_glob_pattern("user:*"));
        assert!(is_glob_pattern("a?c"));
        assert!(is_glob_pattern("[ab]c"));
        assert!(!is_glob_pattern("plain"));
        assert!(!is_glob_pattern("literal\\*star"));
    }

    #[test]
    fn unescape_strips_backslashes() {
        assert_eq!(unescape_glob("literal\\*star"), "literal*star");
        assert_eq!(unescape_glob("a\\\\b"), "a\\b");
        assert_eq!(unescape_glob("trailing\\"), "trailing\\");
    }

    #[test]
    fn match_type_follows_glob_detection() {
        assert_eq!(match_type("b"), MatchType::ExactValueName);
        assert_eq!(match_type("b*").as_str(), "PATTERN");
    }
}
