//! Remote path helpers.
//!
//! Remote SFTP paths always use `/` as separator, whatever the local OS.

/// Join a directory and a leaf name with exactly one `/` between them.
///
/// No normalization or traversal checks are performed; `..` in `name`
/// passes through untouched.
pub fn join_remote_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Last path segment, ignoring trailing slashes.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Every ancestor of `path` followed by `path` itself, shortest first.
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`; a relative `a/b` yields `a`, `a/b`.
pub fn ancestors_inclusive(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut out = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() || absolute {
            current.push('/');
        }
        current.push_str(segment);
        out.push(current.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_adds_single_separator() {
        assert_eq!(join_remote_path("/home/user", "file.txt"), "/home/user/file.txt");
        assert_eq!(join_remote_path("/home/user/", "file.txt"), "/home/user/file.txt");
        assert_eq!(join_remote_path("/", "etc"), "/etc");
        assert_eq!(join_remote_path("", "rel"), "rel");
    }

    #[test]
    fn base_name_of_paths() {
        assert_eq!(base_name("/srv/data/report.pdf"), "report.pdf");
        assert_eq!(base_name("/srv/data/"), "data");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn ancestors_of_absolute_path() {
        assert_eq!(ancestors_inclusive("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(ancestors_inclusive("/a//b/"), vec!["/a", "/a/b"]);
    }

    #[test]
    fn ancestors_of_relative_path() {
        assert_eq!(ancestors_inclusive("a/b"), vec!["a", "a/b"]);
    }

    #[test]
    fn ancestors_of_root_is_empty() {
        assert!(ancestors_inclusive("/").is_empty());
    }
}
