use serde_json::Value;
use vitrail_manifest::TagAttrs;

/// The seam between tag resolution and the host application's view layer.
///
/// Implementations own where tags end up: a template context, a response
/// header, an HTML buffer. [`HtmlTags`] is the buffer flavor.
pub trait TagSink {
    fn register_js_file(&mut self, url: &str, attrs: &TagAttrs);
    fn register_css_file(&mut self, url: &str, attrs: &TagAttrs);
    fn register_link_tag(&mut self, attrs: &TagAttrs);
}

/// A [`TagSink`] that renders escaped HTML tag strings in registration order.
#[derive(Clone, Debug, Default)]
pub struct HtmlTags {
    tags: Vec<String>,
}

impl HtmlTags {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn render(&self) -> String {
        self.tags.join("\n")
    }
}

impl TagSink for HtmlTags {
    fn register_js_file(&mut self, url: &str, attrs: &TagAttrs) {
        let mut tag = String::from("<script");
        push_attr(&mut tag, "src", &Value::from(url));
        push_attrs(&mut tag, attrs);
        tag.push_str("></script>");
        self.tags.push(tag);
    }

    fn register_css_file(&mut self, url: &str, attrs: &TagAttrs) {
        let mut tag = String::from("<link");
        push_attr(&mut tag, "href", &Value::from(url));
        push_attrs(&mut tag, attrs);
        tag.push('>');
        self.tags.push(tag);
    }

    fn register_link_tag(&mut self, attrs: &TagAttrs) {
        let mut tag = String::from("<link");
        push_attrs(&mut tag, attrs);
        tag.push('>');
        self.tags.push(tag);
    }
}

fn push_attrs(out: &mut String, attrs: &TagAttrs) {
    for (key, value) in attrs {
        push_attr(out, key, value);
    }
}

fn push_attr(out: &mut String, key: &str, value: &Value) {
    match value {
        // `null` and `false` drop the attribute, `true` renders it bare.
        Value::Null | Value::Bool(false) => {}
        Value::Bool(true) => {
            out.push(' ');
            out.push_str(key);
        }
        Value::String(value) => {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            push_escaped(out, value);
            out.push('"');
        }
        other => {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            push_escaped(out, &other.to_string());
            out.push('"');
        }
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}
