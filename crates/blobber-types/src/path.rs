//! Absolute paths inside an allocation.
//!
//! Valid paths:
//! - Start with `/`; `/` alone is the allocation root
//! - Have no trailing `/` (except the root)
//! - Have no empty, `.` or `..` components
//! - Contain no NUL characters
//! - Are at most [`MAX_PATH_DEPTH`] components deep

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Deepest path an allocation may hold. Every stored path therefore fits
/// within the proof recursion ceiling.
pub const MAX_PATH_DEPTH: usize = 150;

/// A validated absolute path inside an allocation's reference tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AllocationPath(String);

impl AllocationPath {
    /// The allocation root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Validate and wrap a path string.
    pub fn parse(path: &str) -> Result<Self, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if !path.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if path == "/" {
            return Ok(Self::root());
        }
        if path.ends_with('/') {
            return Err(invalid("must not end with '/'"));
        }
        if path.contains('\0') {
            return Err(invalid("must not contain NUL"));
        }
        for (depth, component) in path[1..].split('/').enumerate() {
            if depth >= MAX_PATH_DEPTH {
                return Err(invalid(&format!("deeper than {MAX_PATH_DEPTH} components")));
            }
            match component {
                "" => return Err(invalid("components must not be empty")),
                "." | ".." => return Err(invalid("relative components are not allowed")),
                _ => {}
            }
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The final component. The root's name is `/`.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        self.0.rsplit('/').next().unwrap_or("/")
    }

    /// The enclosing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Number of components below the root (`/` is 0, `/a/b` is 2).
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    /// Every proper ancestor, ordered from the root down to the parent.
    pub fn ancestors(&self) -> Vec<Self> {
        let mut chain = Vec::with_capacity(self.depth());
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            chain.push(path);
        }
        chain.reverse();
        chain
    }

    /// Append a single component.
    pub fn join(&self, name: &str) -> Result<Self, TypeError> {
        if self.is_root() {
            Self::parse(&format!("/{name}"))
        } else {
            Self::parse(&format!("{}/{name}", self.0))
        }
    }

    /// Returns `true` if `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

impl TryFrom<String> for AllocationPath {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AllocationPath> for String {
    fn from(path: AllocationPath) -> Self {
        path.0
    }
}

impl fmt::Debug for AllocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllocationPath({})", self.0)
    }
}

impl fmt::Display for AllocationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
