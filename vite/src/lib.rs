mod html;

use std::{
    path::PathBuf,
    sync::Arc,
};

use bon::bon;
pub use html::{HtmlTags, TagSink};
use miette::Diagnostic;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;
use vitrail_manifest::{AssetTag, Manifest, TagAttrs, TagKind};
use vitrail_resolver::{DevServerProbe, FileLoader, ProbeOptions};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Load(#[from] vitrail_resolver::Error),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] vitrail_manifest::Error),
}

/// The integration component: resolves an entry point against the built
/// manifest and registers its tags on a [`TagSink`], or serves everything
/// straight from the dev server when one is live.
///
/// The manifest and the probe result are memoized per instance, so one
/// component scoped to a request loads the manifest and pings the dev server
/// at most once regardless of how many entries it registers.
#[derive(Debug)]
pub struct Vite {
    base_url: String,
    dev_base_url: Url,
    manifest_path: PathBuf,
    use_dev_server: bool,
    check_dev_server: bool,
    loader: FileLoader,
    probe: DevServerProbe,
    manifest: OnceCell<Arc<Manifest>>,
}

fn default_dev_base_url() -> Url {
    Url::parse("http://localhost:5173/").expect("default dev server URL must be valid")
}

#[bon]
impl Vite {
    /// `dev_base_url_internal` is the URL the probe hits, which can differ
    /// from the browser-facing `dev_base_url` in containerized setups; it
    /// falls back to `dev_base_url`.
    #[builder]
    pub fn new(
        /// Public URL prefix for built assets when not using the dev server.
        #[builder(into, default = "/dist/".to_string())]
        base_url: String,
        #[builder(default = default_dev_base_url())] dev_base_url: Url,
        dev_base_url_internal: Option<Url>,
        /// Filesystem path to the Vite-built `manifest.json`.
        #[builder(into)]
        manifest_path: PathBuf,
        /// Whether the dev server should be considered at all.
        #[builder(default)]
        use_dev_server: bool,
        /// Whether to ping the dev server before trusting it; when off and
        /// `use_dev_server` is on, the dev server is assumed live.
        #[builder(default = true)]
        check_dev_server: bool,
        probe_options: Option<ProbeOptions>,
    ) -> Self {
        let internal = dev_base_url_internal.unwrap_or_else(|| dev_base_url.clone());
        let probe = DevServerProbe::with_options(internal, probe_options.unwrap_or_default());
        Self {
            base_url,
            dev_base_url,
            manifest_path,
            use_dev_server,
            check_dev_server,
            loader: FileLoader::new(),
            probe,
            manifest: OnceCell::new(),
        }
    }
}

impl Vite {
    /// Registers every tag needed to serve `entry`, from the dev server when
    /// it is live, otherwise from the manifest.
    pub async fn register(
        &self,
        entry: &str,
        css_options: &TagAttrs,
        js_options: &TagAttrs,
        sink: &mut dyn TagSink,
    ) -> Result<(), Error> {
        let entry = entry.trim_start_matches('/');

        if self.is_dev_server_running().await {
            self.register_from_dev_server(entry, js_options, sink);
            return Ok(());
        }

        self.register_from_manifest(entry, css_options, js_options, sink)
            .await
    }

    /// Registers the bare dev-server module URL for `entry`; no manifest
    /// lookup happens on this path.
    pub fn register_from_dev_server(
        &self,
        entry: &str,
        js_options: &TagAttrs,
        sink: &mut dyn TagSink,
    ) {
        tracing::debug!(entry, "serving entry from dev server");
        let url = join_url(self.dev_base_url.as_str(), entry);
        let mut attrs = js_options.clone();
        attrs
            .entry("type".to_string())
            .or_insert(Value::from("module"));
        sink.register_js_file(&url, &attrs);
    }

    pub async fn register_from_manifest(
        &self,
        entry: &str,
        css_options: &TagAttrs,
        js_options: &TagAttrs,
        sink: &mut dyn TagSink,
    ) -> Result<(), Error> {
        let manifest = self.manifest().await?;
        let tags = manifest.resolve_tags(entry, css_options, js_options)?;
        for tag in tags.values() {
            self.register_tag(tag, sink);
        }
        Ok(())
    }

    /// Returns the primary script URL for `entry` while still registering
    /// every other tag on the sink, for callers that inject the script
    /// themselves.
    pub async fn entry_url(
        &self,
        entry: &str,
        css_options: &TagAttrs,
        js_options: &TagAttrs,
        sink: &mut dyn TagSink,
    ) -> Result<String, Error> {
        let entry = entry.trim_start_matches('/');

        if self.is_dev_server_running().await {
            return Ok(join_url(self.dev_base_url.as_str(), entry));
        }

        let manifest = self.manifest().await?;
        let tags = manifest.resolve_tags(entry, css_options, js_options)?;
        let mut tags = tags.into_iter();
        let Some((_, primary)) = tags.next() else {
            // resolve_tags always emits the primary script tag first.
            return Err(Error::Resolve(vitrail_manifest::Error::EntryNotFound {
                key: entry.to_string(),
            }));
        };
        for (_, tag) in tags {
            self.register_tag(&tag, sink);
        }
        Ok(join_url(&self.base_url, &primary.url))
    }

    /// The loaded manifest index, read from disk on first use.
    pub async fn manifest(&self) -> Result<&Arc<Manifest>, Error> {
        self.manifest
            .get_or_try_init(|| self.loader.load(&self.manifest_path))
            .await
            .map_err(Error::from)
    }

    pub async fn is_dev_server_running(&self) -> bool {
        if !self.use_dev_server {
            return false;
        }
        if !self.check_dev_server {
            return true;
        }
        self.probe.is_running().await
    }

    fn register_tag(&self, tag: &AssetTag, sink: &mut dyn TagSink) {
        let url = join_url(&self.base_url, &tag.url);
        match tag.kind {
            TagKind::Script => sink.register_js_file(&url, &tag.attrs),
            TagKind::Stylesheet => sink.register_css_file(&url, &tag.attrs),
            TagKind::Preload => {
                let mut attrs = TagAttrs::new();
                attrs.insert("href".to_string(), Value::from(url));
                attrs.extend(tag.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
                sink.register_link_tag(&attrs);
            }
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;
    use tempfile::NamedTempFile;

    use super::*;

    const MANIFEST: &str = r#"
    {
      "main.js": { "file": "assets/main.abc.js", "imports": ["dep.js"], "css": ["assets/main.css"] },
      "dep.js": { "file": "assets/dep.def.js", "css": ["assets/dep.css"] }
    }
    "#;

    fn temp_manifest(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("manifest-")
            .suffix(".json")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn vite_for(file: &NamedTempFile) -> Vite {
        Vite::builder().manifest_path(file.path()).build()
    }

    #[tokio::test]
    async fn register_renders_tags_in_resolver_order() {
        let file = temp_manifest(MANIFEST);
        let vite = vite_for(&file);
        let mut html = HtmlTags::new();

        vite.register("main.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap();

        assert_eq!(
            html.render(),
            concat!(
                "<script src=\"/dist/assets/main.abc.js\" crossorigin type=\"module\"></script>\n",
                "<link href=\"/dist/assets/dep.def.js\" crossorigin rel=\"modulepreload\">\n",
                "<link href=\"/dist/assets/main.css\" rel=\"stylesheet\">\n",
                "<link href=\"/dist/assets/dep.css\" rel=\"stylesheet\">"
            )
        );
    }

    #[tokio::test]
    async fn register_strips_leading_slash_from_entry() {
        let file = temp_manifest(MANIFEST);
        let vite = vite_for(&file);
        let mut html = HtmlTags::new();

        vite.register("/main.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap();
        assert!(!html.is_empty());
    }

    #[tokio::test]
    async fn register_rebases_onto_custom_base_url() {
        let file = temp_manifest(MANIFEST);
        let vite = Vite::builder()
            .manifest_path(file.path())
            .base_url("https://cdn.example.com/build/")
            .build();
        let mut html = HtmlTags::new();

        vite.register("dep.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap();

        assert!(
            html.render()
                .contains("https://cdn.example.com/build/assets/dep.def.js")
        );
    }

    #[tokio::test]
    async fn entry_url_returns_primary_and_registers_rest() {
        let file = temp_manifest(MANIFEST);
        let vite = vite_for(&file);
        let mut html = HtmlTags::new();

        let url = vite
            .entry_url("main.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap();

        assert_eq!(url, "/dist/assets/main.abc.js");
        // Everything but the script tag landed in the sink.
        assert_eq!(html.tags().len(), 3);
        assert!(html.tags().iter().all(|tag| tag.starts_with("<link")));
    }

    #[tokio::test]
    async fn dev_server_bypasses_manifest_when_trusted() {
        // No manifest file exists; the dev-server path must not touch it.
        let vite = Vite::builder()
            .manifest_path("/nonexistent/manifest.json")
            .use_dev_server(true)
            .check_dev_server(false)
            .build();
        let mut html = HtmlTags::new();

        vite.register("main.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap();

        assert_eq!(
            html.render(),
            r#"<script src="http://localhost:5173/main.js" type="module"></script>"#
        );
    }

    #[tokio::test]
    async fn dev_server_js_options_keep_explicit_type() {
        let vite = Vite::builder()
            .manifest_path("/nonexistent/manifest.json")
            .use_dev_server(true)
            .check_dev_server(false)
            .build();
        let mut html = HtmlTags::new();

        let js_options: TagAttrs = [("type".to_string(), json!("text/javascript"))]
            .into_iter()
            .collect();
        vite.register_from_dev_server("main.js", &js_options, &mut html);

        assert!(html.render().contains(r#"type="text/javascript""#));
    }

    #[tokio::test]
    async fn manifest_is_memoized_per_instance() {
        let file = temp_manifest(MANIFEST);
        let vite = vite_for(&file);

        vite.manifest().await.unwrap();
        drop(file);

        // Second use works off the memoized index even though the file is gone.
        let mut html = HtmlTags::new();
        vite.register("dep.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap();
        assert!(!html.is_empty());
    }

    #[tokio::test]
    async fn missing_manifest_surfaces_unavailable() {
        let vite = Vite::builder()
            .manifest_path("/nonexistent/manifest.json")
            .build();
        let mut html = HtmlTags::new();

        let err = vite
            .register("main.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Load(vitrail_resolver::Error::ManifestUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn missing_entry_surfaces_entry_not_found() {
        let file = temp_manifest(MANIFEST);
        let vite = vite_for(&file);
        let mut html = HtmlTags::new();

        let err = vite
            .register("missing.js", &TagAttrs::new(), &TagAttrs::new(), &mut html)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(vitrail_manifest::Error::EntryNotFound { .. })
        ));
    }
}
