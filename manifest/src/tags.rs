use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered attribute set for an emitted tag.
///
/// Values are opaque JSON: strings and numbers render as attribute values,
/// `true` as a bare attribute, `false`/`null` as omitted. The resolver merges
/// caller-supplied attribute maps over its own defaults without interpreting
/// them (except for the `async` stylesheet option, which it consumes).
pub type TagAttrs = IndexMap<String, Value>;

/// Ordered, deduplicated tag set keyed by manifest key (script and preload
/// tags) or output path (stylesheet tags). First insertion wins; the primary
/// script tag is always first.
pub type TagCollection = IndexMap<String, AssetTag>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Script,
    Preload,
    Stylesheet,
}

/// One emitted asset tag. `url` is relative to the build output root; rebasing
/// onto a public base path is the consumer's concern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetTag {
    pub kind: TagKind,
    pub url: String,
    pub attrs: TagAttrs,
}
