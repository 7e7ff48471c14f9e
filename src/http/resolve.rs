//! Mapping URL paths onto the served directory.
//!
//! # Design Decisions
//! - `..` is resolved lexically first; climbing above the root is refused
//!   before the filesystem is ever touched
//! - The surviving path is canonicalized, so symlinks pointing outside the
//!   root are refused too, and every spelling of one file yields one key

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where a URL path leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Escapes the served root.
    Forbidden,
    /// Nothing exists there.
    Missing,
    /// A directory; canonical path.
    Directory(PathBuf),
    /// A servable file; canonical path.
    File {
        path: PathBuf,
        content_type: &'static str,
    },
    /// An existing file with an extension we do not serve.
    UnsupportedType(PathBuf),
}

/// Unexpected filesystem failure while resolving.
#[derive(Debug, Error)]
#[error("failed to resolve {}: {source}", .path.display())]
pub struct ResolveError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

/// Content type for the extensions we serve.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => Some("text/html"),
        "png" => Some("image/png"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Resolves URL paths inside one canonical root directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Canonicalize `root`, which must be a directory.
    pub fn new(root: &Path) -> io::Result<Self> {
        let root = root.canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn resolve(&self, url_path: &str) -> Result<Resolution, ResolveError> {
        let Some(joined) = self.join(url_path) else {
            return Ok(Resolution::Forbidden);
        };

        let canonical = match tokio::fs::canonicalize(&joined).await {
            Ok(path) => path,
            Err(e) if is_missing(&e) => return Ok(Resolution::Missing),
            Err(source) => return Err(ResolveError { path: joined, source }),
        };
        if !canonical.starts_with(&self.root) {
            return Ok(Resolution::Forbidden);
        }

        let metadata = match tokio::fs::metadata(&canonical).await {
            Ok(metadata) => metadata,
            Err(e) if is_missing(&e) => return Ok(Resolution::Missing),
            Err(source) => return Err(ResolveError { path: canonical, source }),
        };
        if metadata.is_dir() {
            return Ok(Resolution::Directory(canonical));
        }

        Ok(match content_type_for(&canonical) {
            Some(content_type) => Resolution::File {
                path: canonical,
                content_type,
            },
            None => Resolution::UnsupportedType(canonical),
        })
    }

    /// Lexically join `url_path` onto the root. `None` if `..` climbs above it.
    fn join(&self, url_path: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut depth = 0usize;
        for segment in url_path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    depth = depth.checked_sub(1)?;
                    path.pop();
                }
                segment => {
                    path.push(segment);
                    depth += 1;
                }
            }
        }
        Some(path)
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidInput
    )
}
