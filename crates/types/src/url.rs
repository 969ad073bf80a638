//! Upstream URL construction.

/// Join `base` and `path` with exactly one `/` at the seam.
///
/// Trailing slashes on `base` and leading slashes on `path` are collapsed;
/// anything else in either part is left untouched.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let mut url = String::with_capacity(base.len() + path.len() + 1);
    url.push_str(base);
    url.push('/');
    url.push_str(path);
    url
}
