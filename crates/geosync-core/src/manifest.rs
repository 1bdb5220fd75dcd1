//! # Repository Manifest Entries
//!
//! One [`ResourceFile`] per entry of the repository's `file_list` response.

use serde::{Deserialize, Serialize};

/// One file of a repository resource, as listed by the manifest endpoint.
///
/// Unknown fields in the manifest (checksums, sizes, modification times)
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    /// Absolute URL, e.g.
    /// `https://www.hydroshare.org/resource/{id}/data/contents/dir/a.tif`.
    pub url: String,
    /// Repository aggregation tag, e.g. `GeoRasterLogicalFile`.
    #[serde(default)]
    pub logical_file_type: String,
    #[serde(default)]
    pub content_type: String,
    /// Declared file name, e.g. `a.tif`.
    #[serde(default)]
    pub file_name: String,
}

impl ResourceFile {
    /// Extension of the last URL segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let last = self.url.rsplit('/').next()?;
        let (_, ext) = last.rsplit_once('.')?;
        Some(ext)
    }

    /// Declared file name without its last extension.
    pub fn file_stem(&self) -> &str {
        strip_extension(&self.file_name)
    }
}

/// Drop everything from the last `.` onward. Names without a dot are
/// returned whole.
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}
