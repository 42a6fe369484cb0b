use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::{Error as ManifestError, Manifest};

/// A manifest parsed from a named source, kept alongside that source so parse
/// diagnostics can point into it.
#[derive(Clone, Debug)]
pub struct ParsedManifest {
    pub manifest: Manifest,
    pub source: Arc<str>,
}

/// A manifest error attached to the document it came from.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ManifestDocError {
    pub kind: ManifestError,
    message: String,
    src: NamedSource<Arc<str>>,
    labels: Vec<LabeledSpan>,
}

impl ManifestDocError {
    pub fn new(name: impl AsRef<str>, source: Arc<str>, kind: ManifestError) -> Self {
        let src = NamedSource::new(name, Arc::clone(&source)).with_language("json");
        let message = kind.to_string();
        let labels = labels_for_manifest_error(&kind, &source);
        Self {
            kind,
            message,
            src,
            labels,
        }
    }
}

impl Diagnostic for ManifestDocError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.kind.code()
    }

    fn severity(&self) -> Option<miette::Severity> {
        self.kind.severity()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.kind.help()
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        (!self.labels.is_empty()).then(|| Box::new(self.labels.iter().cloned()) as _)
    }
}

impl ParsedManifest {
    pub fn parse_named(
        name: impl AsRef<str>,
        source: Arc<str>,
    ) -> Result<Self, ManifestDocError> {
        let mut deserializer = serde_json::Deserializer::from_str(&source);
        let manifest: Manifest =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
                ManifestDocError::new(name.as_ref(), Arc::clone(&source), ManifestError::Json(e))
            })?;
        Ok(Self { manifest, source })
    }
}

fn labels_for_manifest_error(err: &ManifestError, source: &str) -> Vec<LabeledSpan> {
    match err {
        ManifestError::Json(e) => {
            let span = span_for_json_error(source, e.inner());
            let path = e.path().to_string();
            let label = if path == "." {
                "invalid manifest document".to_string()
            } else {
                format!("while reading `{path}`")
            };
            vec![LabeledSpan::new_primary_with_span(Some(label), span)]
        }
        _ => Vec::new(),
    }
}

/// Turns the 1-based line/column carried by a `serde_json` error into a byte
/// offset into the source.
fn span_for_json_error(source: &str, err: &serde_json::Error) -> miette::SourceSpan {
    let line = err.line().saturating_sub(1);
    let column = err.column().saturating_sub(1);
    let offset = source
        .split_inclusive('\n')
        .take(line)
        .map(str::len)
        .sum::<usize>()
        + column;
    (offset.min(source.len()), 0usize).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_named_returns_manifest_and_source() {
        let source: Arc<str> = r#"{ "main.js": { "file": "assets/main.abc.js" } }"#.into();
        let parsed = ParsedManifest::parse_named("manifest.json", Arc::clone(&source)).unwrap();
        assert_eq!(parsed.source, source);
        assert_eq!(
            parsed.manifest.get("main.js").unwrap().output_file(),
            Some("assets/main.abc.js")
        );
    }

    #[test]
    fn parse_error_carries_named_source_and_label() {
        let source: Arc<str> = "{\n  \"main.js\": []\n}".into();
        let err = ParsedManifest::parse_named("manifest.json", source).unwrap_err();

        assert!(matches!(err.kind, ManifestError::Json(_)));
        assert!(err.source_code().is_some());
        let labels: Vec<_> = err.labels().expect("labels should be set").collect();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn json_error_span_points_at_offending_line() {
        let source = "{\n  \"main.js\": ]\n}";
        let err = source.parse::<Manifest>().unwrap_err();
        let ManifestError::Json(json) = &err else {
            panic!("expected a json error, got: {err}");
        };
        let span = span_for_json_error(source, json.inner());
        assert!(span.offset() > source.find('\n').unwrap());
        assert!(span.offset() <= source.len());
    }
}
