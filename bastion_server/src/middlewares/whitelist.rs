//! Whitelist patterns admitting requests without authentication.
//!
//! Three shapes: an exact path, `METHOD:path`, or a glob where `*` matches
//! any run of characters (including `/`).

/// True when any configured pattern admits `method path`
pub fn is_whitelisted(patterns: &[String], method: &str, path: &str) -> bool {
  patterns.iter().any(|p| matches(p, method, path))
}

fn matches(pattern: &str, method: &str, path: &str) -> bool {
  let (pattern_method, pattern_path) = match pattern.split_once(':') {
    Some((m, p)) if is_method(m) => (Some(m), p),
    _ => (None, pattern),
  };

  if let Some(pattern_method) = pattern_method {
    if !pattern_method.eq_ignore_ascii_case(method) {
      return false;
    }
  }

  glob_match(pattern_path, path)
}

fn is_method(candidate: &str) -> bool {
  matches!(
    candidate.to_uppercase().as_str(),
    "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS"
  )
}

/// Minimal glob: `*` matches any (possibly empty) run of characters
fn glob_match(pattern: &str, input: &str) -> bool {
  let pattern: Vec<char> = pattern.chars().collect();
  let input: Vec<char> = input.chars().collect();

  // Classic two-pointer wildcard matching with backtracking
  let (mut p, mut i) = (0usize, 0usize);
  let mut star: Option<(usize, usize)> = None;

  while i < input.len() {
    if p < pattern.len() && (pattern[p] == input[i]) {
      p += 1;
      i += 1;
    } else if p < pattern.len() && pattern[p] == '*' {
      star = Some((p, i));
      p += 1;
    } else if let Some((star_p, star_i)) = star {
      p = star_p + 1;
      i = star_i + 1;
      star = Some((star_p, star_i + 1));
    } else {
      return false;
    }
  }

  while p < pattern.len() && pattern[p] == '*' {
    p += 1;
  }
  p == pattern.len()
}
