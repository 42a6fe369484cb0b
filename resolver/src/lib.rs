pub mod file;
pub mod probe;

use std::path::PathBuf;

pub use file::FileLoader;
use miette::Diagnostic;
pub use probe::{DevServerProbe, ProbeOptions};
use vitrail_manifest::ManifestDocError;

/// A manifest that cannot be read or parsed is unavailable; neither condition
/// is retried here. A caller that wants a reload issues a fresh `load`.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("manifest unavailable at `{path}`")]
    #[diagnostic(code(resolver::manifest_unavailable))]
    ManifestUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Manifest(#[from] ManifestDocError),
}
