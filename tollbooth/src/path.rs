//! Route path pattern matching.
//!
//! Three pattern kinds, checked in this order:
//!
//! 1. **Exact** — case-sensitive string equality;
//! 2. **Glob** — `*` (any run of characters, across `/`), `?` (exactly one
//!    character), `**` (same as `*`);
//! 3. **`regex:`** — the rest is a regular expression matched from the start
//!    of the path (anchored at the end only if the pattern says so).
//!
//! A list of patterns matches when any element matches.

use regex::Regex;

/// Checks whether a request path matches any pattern in a list.
///
/// An empty list never matches.
#[must_use]
pub fn path_is_match<P: AsRef<str>>(patterns: &[P], path: &str) -> bool {
    patterns.iter().any(|p| pattern_matches(p.as_ref(), path))
}

/// Checks whether a request path matches a single pattern.
#[must_use]
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(expr) = pattern.strip_prefix("regex:") {
        return regex_matches_from_start(expr, path);
    }

    if pattern.contains(['*', '?', '[']) {
        return glob_matches(pattern, path);
    }

    pattern == path
}

/// Matches `expr` against `path` anchored at the start, like a
/// `re.match`-style engine. An invalid expression matches nothing.
fn regex_matches_from_start(expr: &str, path: &str) -> bool {
    let Ok(re) = Regex::new(expr) else {
        return false;
    };
    re.find(path).is_some_and(|m| m.start() == 0)
}

/// Glob matching via regex translation. `*` and `**` both match any run of
/// characters including `/`; `?` matches exactly one character.
fn glob_matches(pattern: &str, path: &str) -> bool {
    let mut translated = String::with_capacity(pattern.len() * 2 + 2);
    translated.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => {
                // Collapse `**` into a single any-run.
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                translated.push_str(".*");
            }
            '?' => translated.push('.'),
            c => {
                if regex_syntax_char(c) {
                    translated.push('\\');
                }
                translated.push(c);
            }
        }
    }
    translated.push('$');

    Regex::new(&translated).is_ok_and(|re| re.is_match(path))
}

/// Characters that carry meaning in regex syntax and need escaping when they
/// appear literally in a glob.
const fn regex_syntax_char(c: char) -> bool {
    matches!(
        c,
        '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\'
    )
}
