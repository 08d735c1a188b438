//! Path scopes: the `(subdirectory, pathFilters)` pair that decides which
//! tree changes contribute to version height.

use crate::error::{Error, Result};

/// A normalized, repo-relative path filter.
#[derive(Clone, PartialEq, Eq, Debug)]
struct Filter {
    /// Repo-relative path, `/`-separated, empty means the repository root.
    path: String,
    exclude: bool,
}

/// The set of repository paths a project cares about.
///
/// With no filters the scope is the subtree rooted at the subdirectory; an
/// empty subdirectory without filters matches the whole repository. Explicit
/// filters replace the implicit subdirectory include but excludes still apply
/// on top of it when only excludes are given.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PathScope {
    subdirectory: String,
    filters: Vec<Filter>,
}

impl PathScope {
    /// Builds a scope from a project subdirectory and raw pathspec strings.
    ///
    /// Filter syntax: a `:!` or `:^` prefix marks an exclude; `:/` or a
    /// leading `/` anchors at the repository root; anything else is relative
    /// to the subdirectory. `..` may ascend out of the subdirectory but never
    /// out of the repository.
    pub fn new(subdirectory: &str, path_filters: &[String]) -> Result<Self> {
        let subdirectory = normalize(subdirectory, "").map_err(|reason| Error::PathSpecFormat {
            spec: subdirectory.to_string(),
            reason,
        })?;
        let mut filters = Vec::with_capacity(path_filters.len());
        for raw in path_filters {
            filters.push(parse_filter(raw, &subdirectory)?);
        }
        Ok(Self {
            subdirectory,
            filters,
        })
    }

    /// A scope that covers the whole repository.
    pub fn everything() -> Self {
        Self {
            subdirectory: String::new(),
            filters: Vec::new(),
        }
    }

    pub fn subdirectory(&self) -> &str {
        &self.subdirectory
    }

    /// True when every commit counts: root subdirectory and no filters.
    pub fn matches_everything(&self) -> bool {
        self.subdirectory.is_empty() && self.filters.is_empty()
    }

    /// True when `path` (repo-relative, `/`-separated) is in scope.
    pub fn is_in_scope(&self, path: &str) -> bool {
        let includes: Vec<&str> = self
            .filters
            .iter()
            .filter(|f| !f.exclude)
            .map(|f| f.path.as_str())
            .collect();
        let included = if includes.is_empty() {
            path_is_under(path, &self.subdirectory)
        } else {
            includes.iter().any(|inc| path_is_under(path, inc))
        };
        included
            && !self
                .filters
                .iter()
                .filter(|f| f.exclude)
                .any(|f| path_is_under(path, &f.path))
    }

    /// True when some in-scope path may exist under the directory `dir`.
    /// Used to prune tree walks; conservative.
    pub fn may_contain(&self, dir: &str) -> bool {
        if self
            .filters
            .iter()
            .filter(|f| f.exclude)
            .any(|f| path_is_under(dir, &f.path))
        {
            return false;
        }
        let includes: Vec<&str> = self
            .filters
            .iter()
            .filter(|f| !f.exclude)
            .map(|f| f.path.as_str())
            .collect();
        if includes.is_empty() {
            return paths_overlap(dir, &self.subdirectory);
        }
        includes.iter().any(|inc| paths_overlap(dir, inc))
    }

    /// A stable identity for memoization keys.
    pub fn fingerprint(&self) -> String {
        let mut parts = vec![self.subdirectory.clone()];
        for filter in &self.filters {
            parts.push(format!(
                "{}{}",
                if filter.exclude { "!" } else { "" },
                filter.path
            ));
        }
        parts.join("\u{0}")
    }
}

fn parse_filter(raw: &str, subdirectory: &str) -> Result<Filter> {
    let bad = |reason: &str| Error::PathSpecFormat {
        spec: raw.to_string(),
        reason: reason.to_string(),
    };
    if raw.is_empty() {
        return Err(bad("empty pathspec"));
    }

    let mut rest = raw;
    let mut exclude = false;
    if let Some(stripped) = rest.strip_prefix(":!").or_else(|| rest.strip_prefix(":^")) {
        exclude = true;
        rest = stripped;
    }

    let (anchored, rest) = if let Some(stripped) = rest.strip_prefix(":/") {
        (true, stripped)
    } else if let Some(stripped) = rest.strip_prefix('/') {
        (true, stripped)
    } else if rest.starts_with(':') {
        return Err(bad("unsupported pathspec magic"));
    } else {
        (false, rest)
    };

    let base = if anchored { "" } else { subdirectory };
    let path = normalize(rest, base).map_err(|reason| bad(&reason))?;
    Ok(Filter { path, exclude })
}

/// Folds separators to `/`, resolves `.`/`..`, and joins onto `base`.
/// Ascending above the repository root is an error.
fn normalize(path: &str, base: &str) -> std::result::Result<String, String> {
    let mut segments: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.split('/').collect()
    };
    let normalized_path = path.replace('\\', "/");
    for segment in normalized_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err("path escapes the repository root".to_string());
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// True when `path` equals `prefix` or lives below it. Comparisons also
/// accept an ASCII case-insensitive match for cross-platform compatibility.
fn path_is_under(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    if path.len() < prefix.len() {
        return false;
    }
    let head = &path[..prefix.len()];
    (head == prefix || head.eq_ignore_ascii_case(prefix))
        && (path.len() == prefix.len() || path.as_bytes()[prefix.len()] == b'/')
}

/// True when the directory `dir` and the filter path `other` lie on the same
/// root-to-leaf chain, in either direction.
fn paths_overlap(dir: &str, other: &str) -> bool {
    path_is_under(dir, other) || path_is_under(other, dir)
}
