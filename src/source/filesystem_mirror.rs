// src/source/filesystem_mirror.rs

//! Filesystem mirror: a static directory in the cache layout

use std::path::PathBuf;

use tracing::trace;

use super::local_dir::search_package_dir;
use super::{CandidateQuery, PackageMeta, Source};
use crate::error::Result;

/// Mirror directory holding unpacked packages and/or archives
pub struct FilesystemMirrorSource {
    base: PathBuf,
}

impl FilesystemMirrorSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Source for FilesystemMirrorSource {
    fn describe(&self) -> String {
        format!("filesystem mirror {}", self.base.display())
    }

    fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>> {
        let dir = self.base.join(query.identity.layout_path());
        trace!("Searching {} for {}", dir.display(), query.identity);
        search_package_dir(&dir, query.identity)
    }
}
