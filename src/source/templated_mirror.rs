// src/source/templated_mirror.rs

//! Mirror whose location is computed per provider from a template

use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;
use url::Url;

use super::http::Fetcher;
use super::local_dir::search_package_dir;
use super::network_mirror::{list_from_root, with_trailing_slash};
use super::{CandidateQuery, PackageMeta, Source};
use crate::error::{Error, Result};
use crate::template::MirrorTemplate;

/// Templated mirror
///
/// The evaluated template is either an `http(s)://` URL, used as the
/// provider's root in the network mirror protocol, or a directory that holds
/// that provider's `<version>/<os>_<arch>` trees and archives directly.
pub struct TemplatedMirrorSource {
    template: MirrorTemplate,
    fetcher: Arc<dyn Fetcher>,
}

impl TemplatedMirrorSource {
    pub fn new(template: MirrorTemplate, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { template, fetcher }
    }
}

impl Source for TemplatedMirrorSource {
    fn describe(&self) -> String {
        format!("templated mirror {:?}", self.template.as_str())
    }

    fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>> {
        let location = self.template.evaluate(query.identity)?;
        trace!("Template for {} evaluated to {}", query.identity, location);

        if location.starts_with("http://") || location.starts_with("https://") {
            let root = Url::parse(&location)
                .map_err(|e| Error::ProtocolError(format!("Invalid mirror URL {:?}: {}", location, e)))?;
            list_from_root(self.fetcher.as_ref(), &with_trailing_slash(root), query)
        } else {
            search_package_dir(&PathBuf::from(location), query.identity)
        }
    }
}
