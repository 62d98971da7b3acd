//! Jinja-style templating over the main part of a `.docx` file.
//!
//! The template is ordinary Word markup with `{{ }}` / `{% %}` tags typed into the
//! document. Word often splits a tag across several runs, so the XML is cleaned up
//! before rendering. A tag written as `{%p ... %}`, `{%tr ... %}`, `{%tc ... %}` or
//! `{%r ... %}` (or `{{r ... }}`) replaces its whole enclosing paragraph, table row,
//! table cell or run, which is how loops over paragraphs and raw hyperlink runs are
//! written.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use log::debug;
use minijinja::{AutoEscape, Environment, Value};
use regex::{Captures, Regex};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::RenderError;
use crate::utils::xml_escape;

const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";
const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
const EMPTY_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
);

static SPLIT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:<[^>]*>)+([{%#])").expect("valid regex"));
static SPLIT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([%}#])(?:<[^>]*>)+\}").expect("valid regex"));
static TEMPLATE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{%.*?%\}|\{\{.*?\}\}|\{#.*?#\}").expect("valid regex"));
static RUN_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</w:t>.*?(?:<w:t>|<w:t [^>]*>)").expect("valid regex"));
static REL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Id="rId(\d+)""#).expect("valid regex"));

/// Element levels a tag prefix can collapse, outermost first.
const LEVELS: [&str; 4] = ["tr", "tc", "p", "r"];

fn unescape_tag(tag: &str) -> String {
    tag.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace(['‘', '’'], "'")
        .replace(['“', '”'], "\"")
        .replace("&amp;", "&")
}

/// Replace each element of `level` that holds a `{%level ..%}` or `{{level ..}}` tag
/// with the bare tag.
fn collapse_level(xml: &str, level: &str) -> String {
    let open_plain = format!("<w:{level}>");
    let open_attrs = format!("<w:{level} ");
    let close = format!("</w:{level}>");
    let block_marker = format!("{{%{level} ");
    let var_marker = format!("{{{{{level} ");

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    loop {
        let block = rest.find(&block_marker).map(|i| (i, "{%", "%}"));
        let var = rest.find(&var_marker).map(|i| (i, "{{", "}}"));
        let next = match (block, var) {
            (Some(b), Some(v)) => Some(if b.0 < v.0 { b } else { v }),
            (b, v) => b.or(v),
        };
        let Some((tag_start, opener, closer)) = next else {
            out.push_str(rest);
            break;
        };

        let body_start = tag_start + opener.len() + level.len() + 1;
        let Some(tag_end) = rest[body_start..]
            .find(closer)
            .map(|i| body_start + i + closer.len())
        else {
            out.push_str(rest);
            break;
        };

        let before = &rest[..tag_start];
        let elem_start = before.rfind(&open_plain).max(before.rfind(&open_attrs));
        let elem_end = rest[tag_end..]
            .find(&close)
            .map(|i| tag_end + i + close.len());

        match (elem_start, elem_end) {
            (Some(start), Some(end)) => {
                out.push_str(&rest[..start]);
                out.push_str(opener);
                out.push(' ');
                out.push_str(&rest[body_start..tag_end]);
                rest = &rest[end..];
            }
            _ => {
                // No enclosing element: keep the tag, dropping only the level prefix.
                out.push_str(&rest[..tag_start]);
                out.push_str(opener);
                out.push(' ');
                out.push_str(&rest[body_start..tag_end]);
                rest = &rest[tag_end..];
            }
        }
    }

    out
}

/// Turn Word's document XML into a clean Jinja template.
pub fn patch_xml(src: &str) -> String {
    let xml = SPLIT_OPEN.replace_all(src, "{$1");
    let xml = SPLIT_CLOSE.replace_all(&xml, "$1}");
    let xml = TEMPLATE_TAG.replace_all(&xml, |caps: &Captures| {
        unescape_tag(&RUN_BREAK.replace_all(&caps[0], ""))
    });

    LEVELS
        .iter()
        .fold(xml.into_owned(), |xml, level| collapse_level(&xml, level))
}

/// A hyperlink run for insertion with `{{r ... }}`.
pub fn hyperlink_xml(rel_id: &str, label: &str) -> String {
    format!(
        concat!(
            r#"<w:hyperlink r:id="{}" w:history="1"><w:r><w:rPr>"#,
            r#"<w:rStyle w:val="Hyperlink"/><w:color w:val="0563C1"/><w:u w:val="single"/>"#,
            r#"</w:rPr><w:t xml:space="preserve">{}</w:t></w:r></w:hyperlink>"#
        ),
        xml_escape(rel_id),
        xml_escape(label)
    )
}

pub struct DocxTemplate {
    parts: Vec<(String, Vec<u8>)>,
    document: String,
    rels: String,
    has_rels: bool,
    next_rel_id: u32,
    url_ids: HashMap<String, String>,
    new_rels: Vec<(String, String)>,
}

impl DocxTemplate {
    pub fn open(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path).map_err(|source| RenderError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            parts.push((file.name().to_string(), buf));
        }

        let text_part = |name: &'static str| -> Result<Option<String>, RenderError> {
            parts
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, bytes)| {
                    String::from_utf8(bytes.clone()).map_err(|_| RenderError::Encoding(name.to_string()))
                })
                .transpose()
        };

        let document = text_part(DOCUMENT_PART)?.ok_or(RenderError::MissingPart(DOCUMENT_PART))?;
        let rels = text_part(RELS_PART)?;
        let has_rels = rels.is_some();
        let rels = rels.unwrap_or_else(|| EMPTY_RELS.to_string());

        let next_rel_id = REL_ID
            .captures_iter(&rels)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        debug!("Loaded template with {} parts", parts.len());
        Ok(Self {
            parts,
            document,
            rels,
            has_rels,
            next_rel_id,
            url_ids: HashMap::new(),
            new_rels: Vec::new(),
        })
    }

    /// Relationship id for an external link, adding one per distinct target.
    pub fn build_url_id(&mut self, url: &str) -> String {
        if let Some(id) = self.url_ids.get(url) {
            return id.clone();
        }
        let id = format!("rId{}", self.next_rel_id);
        self.next_rel_id += 1;
        self.url_ids.insert(url.to_string(), id.clone());
        self.new_rels.push((id.clone(), url.to_string()));
        id
    }

    /// Render the main document part against `context`.
    pub fn render(&mut self, context: Value) -> Result<(), RenderError> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);

        let source = patch_xml(&self.document);
        self.document = env.render_str(&source, context)?;
        Ok(())
    }

    fn rendered_rels(&self) -> Result<String, RenderError> {
        if self.new_rels.is_empty() {
            return Ok(self.rels.clone());
        }
        let Some(end) = self.rels.rfind("</Relationships>") else {
            return Err(RenderError::MissingPart(RELS_PART));
        };

        let mut rels = String::with_capacity(self.rels.len() + self.new_rels.len() * 160);
        rels.push_str(&self.rels[..end]);
        for (id, target) in &self.new_rels {
            rels.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}" TargetMode="External"/>"#,
                id,
                HYPERLINK_REL_TYPE,
                xml_escape(target)
            ));
        }
        rels.push_str(&self.rels[end..]);
        Ok(rels)
    }

    pub fn document_xml(&self) -> &str {
        &self.document
    }

    /// The whole package, with the rendered document and any new relationships.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderError> {
        let rels = self.rendered_rels()?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            match name.as_str() {
                DOCUMENT_PART => zip.write_all(self.document.as_bytes())?,
                RELS_PART => zip.write_all(rels.as_bytes())?,
                _ => zip.write_all(bytes)?,
            }
        }
        if !self.has_rels {
            zip.start_file(RELS_PART, options)?;
            zip.write_all(rels.as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }
}
