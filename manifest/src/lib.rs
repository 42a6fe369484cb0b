mod document;
mod resolve;
mod tags;

use std::{collections::BTreeMap, str::FromStr};

pub use document::{ManifestDocError, ParsedManifest};
use miette::Diagnostic;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{As, MapPreventDuplicates, Same};
pub use tags::{AssetTag, TagAttrs, TagCollection, TagKind};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
    #[error("{0}")]
    #[diagnostic(code(manifest::json_error))]
    Json(serde_path_to_error::Error<serde_json::Error>),

    #[error("entry `{key}` not found in asset manifest")]
    #[diagnostic(code(manifest::entry_not_found))]
    EntryNotFound { key: String },
}

/// One manifest entry: the compiled output of a source module plus its direct
/// dependencies.
///
/// Vite writes more fields than these for some chunk kinds; anything not
/// modeled here is ignored on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Output path of the compiled artifact. An entry without one cannot be
    /// served and is skipped during traversal (or rejected when requested as
    /// the root).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Subresource-integrity hash, present when the build emits one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_entry: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_dynamic_entry: bool,
    /// Manifest keys of statically imported chunks, in import order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dynamic_imports: Vec<String>,
    /// Output paths (not manifest keys) of stylesheets emitted for this chunk.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<String>,
}

impl Entry {
    /// The output path, treating an empty string the same as an absent field.
    pub fn output_file(&self) -> Option<&str> {
        self.file.as_deref().filter(|file| !file.is_empty())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The parsed manifest index: manifest key to [`Entry`], immutable after
/// construction. Duplicate keys are rejected at parse time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, Entry>,
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = As::<MapPreventDuplicates<Same, Same>>::deserialize(deserializer)?;
        Ok(Self { entries })
    }
}

impl Manifest {
    pub fn new(entries: BTreeMap<String, Entry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for Manifest {
    type Err = Error;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut deserializer = serde_json::Deserializer::from_str(source);
        serde_path_to_error::deserialize(&mut deserializer).map_err(Error::Json)
    }
}
