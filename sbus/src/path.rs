//! Object-path parsing, composition and subtree-address walking.
//!
//! Mirrors `sbus_opath_is_subtree` / `sbus_opath_get_base_path` /
//! `sbus_opath_parent_subtree` / `sbus_opath_compose` /
//! `sbus_opath_decompose_exact` from the original C sbus implementation,
//! translated into owned-`String` operations instead of talloc-scoped
//! `char *`.

use crate::error::MethodErr;

/// True iff `path` ends in `/*`, i.e. it addresses every object under its
/// prefix rather than a single object.
pub fn is_subtree(path: &str) -> bool {
    path.len() >= 2 && path.ends_with("/*")
}

/// Strips a trailing `/*` from a subtree path. Idempotent: calling this on
/// an already-base path returns it unchanged. The degenerate subtree `/*`
/// reduces to the root `/`.
pub fn base_of(path: &str) -> String {
    if !is_subtree(path) {
        return path.to_string();
    }
    if path.len() == 2 {
        return "/".to_string();
    }
    path[..path.len() - 2].to_string()
}

/// Steps one segment up the subtree address space.
///
/// `parent_subtree("/a/b/*") == Some("/a/*")`, `parent_subtree("/a/*") ==
/// Some("/*")`... no: `parent_subtree("/a/*")` reduces base to `/a`, then
/// walks to the last `/` at index 0, yielding `/*`. `parent_subtree("/*")`
/// reduces base to `/` and returns `None` (root has no parent subtree).
/// Returns `None` if `path` is malformed (ends with `/`, other than root).
pub fn parent_subtree(path: &str) -> Option<String> {
    let base = base_of(path);
    if base == "/" {
        return None;
    }
    let slash = base.rfind('/')?;
    if slash + 1 == base.len() {
        // Path ended with '/': malformed.
        return None;
    }
    let mut parent = base[..=slash].to_string();
    parent.push('*');
    Some(parent)
}

/// Iterates the finite ordered sequence of ancestor subtree paths for
/// `path`, starting at the nearest one and excluding the root. Used by
/// `Registry::lookup_iface` and `Registry::lookup_supported`.
pub fn parent_subtrees(path: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::successors(parent_subtree(path), |p| parent_subtree(p))
}

fn is_valid_segment(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Joins `base` with one or more path segments, producing a well-formed
/// object path. Percent-encoding and other transport-level escaping is the
/// transport's concern (spec.md section 1, Non-goals); segments here are
/// validated only for the character set D-Bus object paths allow.
pub fn compose(base: &str, parts: &[&str]) -> Result<String, MethodErr> {
    if parts.is_empty() {
        return Err(MethodErr::invalid_arg("compose() requires at least one part"));
    }
    for p in parts {
        if !is_valid_segment(p) {
            return Err(MethodErr::invalid_arg(&format!(
                "invalid object path segment: {:?}",
                p
            )));
        }
    }
    let mut out = base.trim_end_matches('/').to_string();
    for p in parts {
        out.push('/');
        out.push_str(p);
    }
    Ok(out)
}

/// Strips the known prefix `base` from `path` and returns exactly `n`
/// segments from what remains. Errors if the structure doesn't match
/// (wrong prefix, too few/many segments, or an empty segment).
pub fn decompose_exact(path: &str, base: &str, n: usize) -> Result<Vec<String>, MethodErr> {
    let base = base.trim_end_matches('/');
    let rest = path.strip_prefix(base).ok_or_else(|| {
        MethodErr::invalid_arg(&format!("path {:?} does not start with {:?}", path, base))
    })?;
    let rest = rest.strip_prefix('/').ok_or_else(|| {
        MethodErr::invalid_arg(&format!("path {:?} is not a child of {:?}", path, base))
    })?;
    let parts: Vec<String> = rest.split('/').map(String::from).collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return Err(MethodErr::invalid_arg(&format!(
            "expected {} segments after {:?}, got {:?}",
            n, base, parts
        )));
    }
    Ok(parts)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subtree_detection() {
        assert!(is_subtree("/a/b/*"));
        assert!(is_subtree("/*"));
        assert!(!is_subtree("/a/b"));
        assert!(!is_subtree("/"));
        assert!(!is_subtree("*"));
    }

    #[test]
    fn base_round_trip() {
        assert_eq!(base_of("/a/b/*"), "/a/b");
        assert_eq!(base_of("/*"), "/");
        assert_eq!(base_of("/a/b"), "/a/b");
        // Invariant 4 from spec.md section 8: base/subtree round trip.
        for p in ["/a/b", "/a", "/org/example/Users"] {
            assert!(is_subtree(&(base_of(p) + "/*")));
            assert_eq!(base_of(&base_of(p)), base_of(p));
        }
    }

    #[test]
    fn parent_walk_terminates() {
        assert_eq!(parent_subtree("/a/b/*").as_deref(), Some("/a/*"));
        assert_eq!(parent_subtree("/a/*").as_deref(), Some("/*"));
        assert_eq!(parent_subtree("/*"), None);
        assert_eq!(parent_subtree("/a/b/c/"), None); // malformed: trailing slash
    }

    #[test]
    fn parent_subtrees_sequence() {
        let v: Vec<_> = parent_subtrees("/a/b/c/*").collect();
        assert_eq!(v, vec!["/a/b/*", "/a/*", "/*"]);
        // Bounded by depth(p) + 1.
        assert!(v.len() <= "/a/b/c/*".matches('/').count() + 1);
    }

    #[test]
    fn compose_and_decompose() {
        let p = compose("/org/example/Users", &["dom", "1000"]).unwrap();
        assert_eq!(p, "/org/example/Users/dom/1000");
        let parts = decompose_exact(&p, "/org/example/Users", 2).unwrap();
        assert_eq!(parts, vec!["dom".to_string(), "1000".to_string()]);

        assert!(decompose_exact(&p, "/org/example/Groups", 2).is_err());
        assert!(decompose_exact(&p, "/org/example/Users", 1).is_err());
        assert!(compose("/org/example/Users", &["dom/sneaky"]).is_err());
    }
}
