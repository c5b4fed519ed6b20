//! Case-insensitive wildcard matching for perspective filter values
//!
//! Two tokens are recognised: `*` matches any run of characters (including
//! none) and `?` matches exactly one character. Everything else matches
//! itself, compared after Unicode lowercasing.

/// Match `text` against `pattern`, ignoring case
pub fn matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
    matches_chars(&pattern, &text)
}

/// Greedy two-pointer match with single-star backtracking
fn matches_chars(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some(p);
                resume = t;
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some(s) => {
                    p = s + 1;
                    resume += 1;
                    t = resume;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Whether `pattern` contains wildcard tokens
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}
