use std::collections::HashSet;

use serde_json::Value;

use crate::{AssetTag, Error, Manifest, TagAttrs, TagCollection, TagKind};

impl Manifest {
    /// Computes the ordered, deduplicated set of tags needed to serve
    /// `entry_key`: the entry's own script tag first, then one modulepreload
    /// tag per transitively imported chunk in first-discovery order, then one
    /// stylesheet tag per distinct css output path.
    ///
    /// `js_options` is merged over the script and preload attributes,
    /// `css_options` over the stylesheet attributes; caller values win. The
    /// `async` css option is consumed here: when `true`, stylesheets default
    /// to `media="print"` with an `onload` swap to `"all"` unless the caller
    /// set those keys explicitly.
    ///
    /// Fails only with [`Error::EntryNotFound`] when `entry_key` is absent or
    /// has no output file. Cyclic or dangling imports are not errors: the walk
    /// visits every key at most once and skips entries it cannot resolve.
    pub fn resolve_tags<'m>(
        &'m self,
        entry_key: &'m str,
        css_options: &TagAttrs,
        js_options: &TagAttrs,
    ) -> Result<TagCollection, Error> {
        let not_found = || Error::EntryNotFound {
            key: entry_key.to_string(),
        };
        let root = self.get(entry_key).ok_or_else(not_found)?;
        let file = root.output_file().ok_or_else(not_found)?;

        let mut tags = TagCollection::new();

        let mut attrs = TagAttrs::new();
        attrs.insert("crossorigin".to_string(), Value::Bool(true));
        if let Some(integrity) = &root.integrity {
            attrs.insert("integrity".to_string(), Value::from(integrity.as_str()));
        }
        attrs.insert("type".to_string(), Value::from("module"));
        merge(&mut attrs, js_options);
        tags.insert(
            entry_key.to_string(),
            AssetTag {
                kind: TagKind::Script,
                url: file.to_string(),
                attrs,
            },
        );

        // One walk computes both closures: imported keys in depth-first
        // pre-order (root excluded) and css paths with each entry's own list
        // ahead of its imports'.
        let mut visited = HashSet::new();
        visited.insert(entry_key);
        let mut imports = Vec::new();
        let mut css = Vec::new();
        self.walk(entry_key, &mut visited, &mut imports, &mut css);

        for key in imports {
            let Some(entry) = self.get(key) else { continue };
            let Some(file) = entry.output_file() else {
                continue;
            };
            let mut attrs = TagAttrs::new();
            attrs.insert("crossorigin".to_string(), Value::Bool(true));
            if let Some(integrity) = &entry.integrity {
                attrs.insert("integrity".to_string(), Value::from(integrity.as_str()));
            }
            attrs.insert("rel".to_string(), Value::from("modulepreload"));
            merge(&mut attrs, js_options);
            tags.entry(key.to_string()).or_insert(AssetTag {
                kind: TagKind::Preload,
                url: file.to_string(),
                attrs,
            });
        }

        let mut css_options = css_options.clone();
        let async_css = matches!(
            css_options.shift_remove("async"),
            Some(Value::Bool(true))
        );
        if async_css {
            css_options
                .entry("media".to_string())
                .or_insert(Value::from("print"));
            css_options
                .entry("onload".to_string())
                .or_insert(Value::from("this.media='all'"));
        }

        for path in css {
            tags.entry(path.to_string()).or_insert_with(|| {
                let mut attrs = TagAttrs::new();
                attrs.insert("rel".to_string(), Value::from("stylesheet"));
                merge(&mut attrs, &css_options);
                AssetTag {
                    kind: TagKind::Stylesheet,
                    url: path.to_string(),
                    attrs,
                }
            });
        }

        Ok(tags)
    }

    fn walk<'m>(
        &'m self,
        key: &str,
        visited: &mut HashSet<&'m str>,
        imports: &mut Vec<&'m str>,
        css: &mut Vec<&'m str>,
    ) {
        let Some(entry) = self.get(key) else { return };
        css.extend(entry.css.iter().map(String::as_str));
        for import in &entry.imports {
            // Checked before recursing so a cyclic import graph terminates.
            if !visited.insert(import.as_str()) {
                continue;
            }
            imports.push(import.as_str());
            self.walk(import, visited, imports, css);
        }
    }
}

fn merge(attrs: &mut TagAttrs, overrides: &TagAttrs) {
    for (key, value) in overrides {
        attrs.insert(key.clone(), value.clone());
    }
}
