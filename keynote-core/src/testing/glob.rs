//! Channel pattern matching with Redis glob rules
//!
//! `*` any run, `?` one character, `[abc]` / `[^abc]` / `[a-z]` classes and
//! `\` to escape the next character. `*` also crosses `/` and `:`.

use globset::{GlobBuilder, GlobMatcher};

/// Compile a Redis channel pattern
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    // globset negates classes with `!`, Redis with `^`
    let translated = pattern.replace("[^", "[!");
    let glob = GlobBuilder::new(&translated)
        .literal_separator(false)
        .backslash_escape(true)
        .build()?;
    Ok(glob.compile_matcher())
}

/// Whether `text` matches `pattern`; an invalid pattern matches nothing
pub fn glob_match(pattern: &str, text: &str) -> bool {
    compile_pattern(pattern)
        .map(|matcher| matcher.is_match(text))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_and_star() {
        assert!(glob_match("__keyevent@0__:set", "__keyevent@0__:set"));
        assert!(!glob_match("__keyevent@0__:set", "__keyevent@0__:del"));
        assert!(glob_match("__keyevent@*__:*", "__keyevent@12__:expired"));
        assert!(glob_match("__keyspace@0__:foo/bar-*", "__keyspace@0__:foo/bar-1"));
        assert!(!glob_match("__keyspace@0__:foo", "__keyspace@1__:foo"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_question_mark_and_classes() {
        assert!(glob_match("h?llo", "hallo"));
        assert!(!glob_match("h?llo", "hllo"));
        assert!(glob_match("h[ae]llo", "hello"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("h[^e]llo", "hallo"));
        assert!(glob_match("h[a-b]llo", "hbllo"));
        assert!(!glob_match("h[a-b]llo", "hcllo"));
    }

    #[test]
    fn test_escape() {
        assert!(glob_match(r"foo\*", "foo*"));
        assert!(!glob_match(r"foo\*", "foobar"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(compile_pattern("foo[").is_err());
        assert!(!glob_match("foo[", "foo["));
    }
}
