//! Permission signatures and rule patterns
//!
//! A signature deterministically identifies a concrete tool invocation:
//! either the bare tool name (`Bash`) or the tool name with extracted
//! content (`Read(file_path:/a/b.txt)`). Rules are patterns over signatures,
//! matched with a fixed cascade: exact equality, tool-name-only prefix,
//! `*` wildcard, then glob (`**`, with `{a,b}` alternation). For path-valued
//! keys `*` stays within one path segment; for command-like content it spans
//! the whole remainder, separators included, so deny rules like
//! `Bash(command:rm *)` cover `rm -rf /tmp/x`.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

/// How a pattern matched a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Full string equality
    Exact,
    /// Tool-name-only rule covering any content
    Prefix,
    /// `*` wildcard; single-segment for path keys, spanning otherwise
    Wildcard,
    /// `**` glob, matching across segments
    Glob,
}

/// Build a signature from a tool name and optional extracted content
pub fn build_signature(tool_name: &str, content: Option<&str>) -> String {
    match content {
        Some(content) => format!("{}({})", tool_name, content),
        None => tool_name.to_string(),
    }
}

/// Split `Tool(content)` into the tool name and content part
fn split_signature(raw: &str) -> (&str, Option<&str>) {
    match raw.find('(') {
        Some(open) if raw.ends_with(')') => (&raw[..open], Some(&raw[open + 1..raw.len() - 1])),
        _ => (raw, None),
    }
}

/// Split `key:value` content at the first colon
fn split_content(content: &str) -> (Option<&str>, &str) {
    match content.find(':') {
        Some(idx) => (Some(&content[..idx]), &content[idx + 1..]),
        None => (None, content),
    }
}

/// Whether a content key names a filesystem path.
///
/// Path values get single-segment `*` semantics; everything else (commands,
/// URLs) lets `*` span separators so rules cover the whole remainder.
pub(crate) fn is_path_key(key: &str) -> bool {
    key == "path" || key.ends_with("path") || key.ends_with("file") || key.ends_with("dir")
}

/// A permission rule pattern.
///
/// The glob matcher is compiled once at construction. For path-valued keys
/// `*` is restricted to a single segment via `literal_separator` while `**`
/// spans segments; for non-path keys `*` matches separators too. Brace
/// alternation (`*.{env,key}`) comes with the glob syntax.
#[derive(Debug, Clone)]
pub struct PermissionPattern {
    raw: String,
    tool: String,
    /// Content part of the pattern, if any
    content: Option<String>,
    /// `key` of a `key:value` content pattern, compared literally
    key: Option<String>,
    matcher: Option<GlobMatcher>,
    wildcard_kind: Option<MatchType>,
}

impl PermissionPattern {
    /// Parse a pattern string (`Bash`, `Read(file_path:**/*.env)`, ...)
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let (tool, content) = split_signature(&raw);
        let tool = tool.to_string();
        let content = content.map(str::to_string);

        let (key, matcher, wildcard_kind) = match content.as_deref() {
            Some(content) => {
                let (key, value) = split_content(content);
                let wildcard_kind = if value.contains("**") {
                    Some(MatchType::Glob)
                } else if value.contains('*') {
                    Some(MatchType::Wildcard)
                } else {
                    None
                };
                let single_segment = key.map(is_path_key).unwrap_or(false);
                let matcher = if wildcard_kind.is_some() {
                    match GlobBuilder::new(value)
                        .literal_separator(single_segment)
                        .build()
                    {
                        Ok(glob) => Some(glob.compile_matcher()),
                        Err(e) => {
                            tracing::warn!(
                                "[Permissions] Invalid glob in pattern '{}': {}",
                                raw,
                                e
                            );
                            None
                        }
                    }
                } else {
                    None
                };
                (key.map(str::to_string), matcher, wildcard_kind)
            }
            None => (None, None, None),
        };

        Self {
            raw,
            tool,
            content,
            key,
            matcher,
            wildcard_kind,
        }
    }

    /// The original pattern string
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The tool name part of the pattern
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Test this pattern against a concrete signature.
    ///
    /// Returns the match type of the first cascade step that applies, or
    /// `None` when the pattern does not cover the signature.
    pub fn matches(&self, signature: &str) -> Option<MatchType> {
        if self.raw == signature {
            return Some(MatchType::Exact);
        }

        let (sig_tool, sig_content) = split_signature(signature);
        if sig_tool != self.tool {
            return None;
        }

        if self.content.is_none() {
            // Tool-name-only rule: covers any content of that tool
            return sig_content.map(|_| MatchType::Prefix);
        }
        let sig_content = sig_content?;

        // Literal content differs from the signature (exact already failed)
        let kind = self.wildcard_kind?;
        let matcher = self.matcher.as_ref()?;

        let (sig_key, sig_value) = split_content(sig_content);
        let candidate = match &self.key {
            Some(key) => {
                if sig_key != Some(key.as_str()) {
                    return None;
                }
                sig_value
            }
            None => sig_content,
        };

        matcher.is_match(candidate).then_some(kind)
    }
}

/// Match a signature against an ordered rule list, first match wins
pub fn match_list<'a>(
    patterns: &'a [PermissionPattern],
    signature: &str,
) -> Option<(&'a PermissionPattern, MatchType)> {
    patterns
        .iter()
        .find_map(|pattern| pattern.matches(signature).map(|mt| (pattern, mt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_signature() {
        assert_eq!(build_signature("Bash", None), "Bash");
        assert_eq!(
            build_signature("Read", Some("file_path:/a/b.txt")),
            "Read(file_path:/a/b.txt)"
        );
    }

    #[test]
    fn test_exact_match() {
        let pattern = PermissionPattern::new("Read(file_path:/a/b.txt)");
        assert_eq!(
            pattern.matches("Read(file_path:/a/b.txt)"),
            Some(MatchType::Exact)
        );
        assert_eq!(pattern.matches("Read(file_path:/a/c.txt)"), None);
    }

    #[test]
    fn test_tool_prefix_match() {
        let pattern = PermissionPattern::new("Read");
        assert_eq!(pattern.matches("Read"), Some(MatchType::Exact));
        assert_eq!(
            pattern.matches("Read(file_path:/a/b.txt)"),
            Some(MatchType::Prefix)
        );
        assert_eq!(pattern.matches("Write(file_path:/a/b.txt)"), None);
    }

    #[test]
    fn test_single_segment_wildcard() {
        let pattern = PermissionPattern::new("Write(file_path:/tmp/*)");
        assert_eq!(
            pattern.matches("Write(file_path:/tmp/out.txt)"),
            Some(MatchType::Wildcard)
        );
        // `*` must not cross segments
        assert_eq!(pattern.matches("Write(file_path:/tmp/sub/out.txt)"), None);
    }

    #[test]
    fn test_glob_with_brace_alternation() {
        let pattern = PermissionPattern::new("Read(file_path:**/*.{env,key,secret})");
        assert_eq!(
            pattern.matches("Read(file_path:config.env)"),
            Some(MatchType::Glob)
        );
        assert_eq!(
            pattern.matches("Read(file_path:secrets/api.key)"),
            Some(MatchType::Glob)
        );
        assert_eq!(
            pattern.matches("Read(file_path:nested/deep/db.secret)"),
            Some(MatchType::Glob)
        );
        assert_eq!(pattern.matches("Read(file_path:readme.md)"), None);
    }

    #[test]
    fn test_command_wildcard_spans_separators() {
        let pattern = PermissionPattern::new("Bash(command:rm *)");
        assert_eq!(
            pattern.matches("Bash(command:rm -rf /tmp/x)"),
            Some(MatchType::Wildcard)
        );
        assert_eq!(pattern.matches("Bash(command:ls -la)"), None);
    }

    #[test]
    fn test_key_mismatch_never_matches() {
        let pattern = PermissionPattern::new("Bash(command:git *)");
        assert_eq!(
            pattern.matches("Bash(command:git status)"),
            Some(MatchType::Wildcard)
        );
        assert_eq!(pattern.matches("Bash(cwd:git status)"), None);
    }

    #[test]
    fn test_match_list_first_wins() {
        let patterns = vec![
            PermissionPattern::new("Read(file_path:**/*.md)"),
            PermissionPattern::new("Read"),
        ];
        let (matched, mt) = match_list(&patterns, "Read(file_path:docs/a.md)").unwrap();
        assert_eq!(matched.raw(), "Read(file_path:**/*.md)");
        assert_eq!(mt, MatchType::Glob);

        let (matched, mt) = match_list(&patterns, "Read(file_path:src/a.rs)").unwrap();
        assert_eq!(matched.raw(), "Read");
        assert_eq!(mt, MatchType::Prefix);
    }
}
