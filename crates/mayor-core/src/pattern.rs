use crate::error::{MayorError, Result};
use regex::Regex;

// ---------------------------------------------------------------------------
// Path normalization
// ---------------------------------------------------------------------------

/// Normalize a repository-relative path to forward slashes with no leading `./`
/// or `/`. Patterns are always anchored at the repository root, so a leading `/` adds nothing.
pub fn normalize_path(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest.to_string();
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest.to_string();
        } else {
            return p;
        }
    }
}

// ---------------------------------------------------------------------------
// GlobPattern
// ---------------------------------------------------------------------------

/// A glob compiled to an anchored regex.
///
/// `**` spans any number of path segments, `*` spans any characters except `/`,
/// everything else is literal. Matching is case-sensitive and always against the
/// full path.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.chars().any(|c| c.is_control()) {
            return Err(invalid(pattern, "contains control characters"));
        }
        let normalized = normalize_path(pattern.trim_end_matches('/'));
        if normalized.is_empty() {
            return Err(invalid(pattern, "pattern is empty"));
        }

        let mut segments: Vec<&str> = Vec::new();
        for seg in normalized.split('/') {
            if seg == "**" && segments.last() == Some(&"**") {
                continue;
            }
            segments.push(seg);
        }

        let mut re = String::from("^");
        let n = segments.len();
        for (i, seg) in segments.iter().enumerate() {
            let last = i + 1 == n;
            if *seg == "**" {
                if n == 1 {
                    re.push_str(".*");
                } else if i == 0 {
                    re.push_str("(?:.*/)?");
                } else if last {
                    re.push_str("(?:/.*)?");
                } else {
                    re.push_str("/(?:.*/)?");
                }
                continue;
            }
            if i > 0 && segments[i - 1] != "**" {
                re.push('/');
            }
            for c in seg.chars() {
                if c == '*' {
                    re.push_str("[^/]*");
                } else {
                    re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4])));
                }
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|e| invalid(pattern, &e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a raw path. An empty path never matches.
    pub fn matches(&self, path: &str) -> bool {
        !path.is_empty() && self.is_match(&normalize_path(path))
    }

    /// Match an already-normalized path.
    fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn invalid(pattern: &str, reason: &str) -> MayorError {
    MayorError::InvalidPattern {
        pattern: pattern.escape_debug().to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// PatternSet
// ---------------------------------------------------------------------------

/// An ordered set of compiled globs. Compiled once per policy load.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<GlobPattern>,
}

impl PatternSet {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| GlobPattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn matches(&self, path: &str) -> Result<bool> {
        Ok(self.first_match(path)?.is_some())
    }

    /// The first pattern (in declaration order) matching `path`.
    pub fn first_match(&self, path: &str) -> Result<Option<&GlobPattern>> {
        if path.is_empty() {
            return Err(MayorError::EmptyPath);
        }
        let path = normalize_path(path);
        Ok(self.patterns.iter().find(|p| p.is_match(&path)))
    }
}

impl FromIterator<GlobPattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = GlobPattern>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

/// Match `path` against a list of uncompiled patterns.
pub fn matches<S: AsRef<str>>(path: &str, patterns: &[S]) -> Result<bool> {
    PatternSet::compile(patterns)?.matches(path)
}

// ---------------------------------------------------------------------------
// Allow / block precedence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathDecision {
    Allowed,
    /// Matched a blocked pattern (reported verbatim).
    Blocked(String),
    /// Allow list is non-empty and nothing in it matched.
    NotAllowed,
}

impl PathDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PathDecision::Allowed)
    }
}

/// Blocked patterns win over allowed ones; an empty allow list allows everything
/// not explicitly blocked.
pub fn decide(path: &str, allowed: &PatternSet, blocked: &PatternSet) -> Result<PathDecision> {
    if let Some(hit) = blocked.first_match(path)? {
        return Ok(PathDecision::Blocked(hit.as_str().to_string()));
    }
    if allowed.is_empty() || allowed.matches(path)? {
        Ok(PathDecision::Allowed)
    } else {
        Ok(PathDecision::NotAllowed)
    }
}

pub fn is_allowed(path: &str, allowed: &PatternSet, blocked: &PatternSet) -> Result<bool> {
    Ok(decide(path, allowed, blocked)?.is_allowed())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> PatternSet {
        PatternSet::compile(patterns).unwrap()
    }

    #[test]
    fn double_star_alone_matches_everything() {
        let s = set(&["**"]);
        for path in ["a", "a/b/c.rs", ".github/workflows/ci.yml"] {
            assert!(s.matches(path).unwrap(), "expected match: {path}");
        }
    }

    #[test]
    fn single_star_stays_within_segment() {
        let s = set(&["src/*.rs"]);
        assert!(s.matches("src/lib.rs").unwrap());
        assert!(!s.matches("src/sub/deep.rs").unwrap());
    }

    #[test]
    fn leading_double_star_matches_any_depth() {
        let s = set(&["**/*.sql"]);
        assert!(s.matches("init.sql").unwrap());
        assert!(s.matches("src/migrations/init.sql").unwrap());
        assert!(!s.matches("src/migrations/init.sql.bak").unwrap());
    }

    #[test]
    fn trailing_double_star_matches_subtree() {
        let s = set(&[".github/workflows/**"]);
        assert!(s.matches(".github/workflows/ci.yml").unwrap());
        assert!(s.matches(".github/workflows/nested/x.yml").unwrap());
        assert!(!s.matches(".github/ISSUE_TEMPLATE/task.md").unwrap());
    }

    #[test]
    fn middle_double_star_matches_zero_or_more_segments() {
        let s = set(&["src/**/mod.rs"]);
        assert!(s.matches("src/mod.rs").unwrap());
        assert!(s.matches("src/a/b/mod.rs").unwrap());
        assert!(!s.matches("lib/a/mod.rs").unwrap());
    }

    #[test]
    fn match_is_anchored_not_substring() {
        let s = set(&["src"]);
        assert!(s.matches("src").unwrap());
        assert!(!s.matches("src/main.rs").unwrap());
        assert!(!s.matches("mysrc").unwrap());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let s = set(&["README.md"]);
        assert!(!s.matches("readme.md").unwrap());
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let s = set(&["docs/**/"]);
        assert!(s.matches("docs/guide/intro.md").unwrap());
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let s = set(&["a+b(1).txt"]);
        assert!(s.matches("a+b(1).txt").unwrap());
        assert!(!s.matches("aab1.txt").unwrap());
    }

    #[test]
    fn backslash_paths_use_forward_separator() {
        let s = set(&["src/**"]);
        assert!(s.matches("src\\win\\file.rs").unwrap());
        assert!(s.matches("./src/a.rs").unwrap());
    }

    #[test]
    fn leading_slash_anchors_at_repo_root() {
        let s = set(&["/secrets/**", "/.env"]);
        assert!(s.matches("secrets/key.pem").unwrap());
        assert!(s.matches(".env").unwrap());
        assert!(s.matches("/secrets/key.pem").unwrap());
        assert!(!s.matches("app/secrets/key.pem").unwrap());
        assert!(!s.matches("app/.env").unwrap());
    }

    #[test]
    fn control_characters_rejected() {
        assert!(GlobPattern::compile("src/\0evil").is_err());
        assert!(GlobPattern::compile("src/\nx").is_err());
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(GlobPattern::compile("").is_err());
        assert!(GlobPattern::compile("/").is_err());
    }

    #[test]
    fn empty_path_is_an_error() {
        let s = set(&["**"]);
        assert!(matches!(s.matches(""), Err(MayorError::EmptyPath)));
    }

    #[test]
    fn blocked_wins_over_allowed() {
        let allowed = set(&["src/**"]);
        let blocked = set(&["**/*.sql"]);
        let decision = decide("src/migrations/init.sql", &allowed, &blocked).unwrap();
        assert_eq!(decision, PathDecision::Blocked("**/*.sql".to_string()));
        assert!(!is_allowed("src/migrations/init.sql", &allowed, &blocked).unwrap());
    }

    #[test]
    fn empty_allow_list_allows_unblocked_paths() {
        let allowed = PatternSet::default();
        let blocked = set(&["secrets/**"]);
        assert!(is_allowed("anything/at/all.txt", &allowed, &blocked).unwrap());
        assert!(!is_allowed("secrets/key.pem", &allowed, &blocked).unwrap());
    }

    #[test]
    fn path_outside_allow_list_is_not_allowed() {
        let allowed = set(&["src/**", "tests/**"]);
        let blocked = PatternSet::default();
        assert_eq!(
            decide("Makefile", &allowed, &blocked).unwrap(),
            PathDecision::NotAllowed
        );
    }

    #[test]
    fn free_function_matches() {
        assert!(matches("src/a.ts", &["src/**"]).unwrap());
        assert!(!matches("lib/a.ts", &["src/**"]).unwrap());
    }
}
