use std::{path::Path, sync::Arc};

use vitrail_manifest::{Manifest, ParsedManifest};

use super::Error;

/// Loads a Vite-built `manifest.json` from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Default::default()
    }

    pub async fn load(&self, path: &Path) -> Result<Arc<Manifest>, Error> {
        let source: Arc<str> = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::ManifestUnavailable {
                path: path.to_path_buf(),
                source,
            })?
            .into();
        let parsed = ParsedManifest::parse_named(path.display().to_string(), source)?;
        Ok(Arc::new(parsed.manifest))
    }
}
