use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::upload::{MediaResolver, UploadError};

/// One caller-supplied content block, as it arrives from the agent.
///
/// `type` selects the block kind: absent or `"text"` for a plain paragraph,
/// `"quote"`, `"note"` (inline note reference), or `"file"` (media
/// attachment). The remaining fields are kind-specific; validation happens
/// per block during conversion so errors can name the offending index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub texts: Vec<TextSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// A run of annotated text inside a paragraph or quote block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Media attachment category. Governs the numeric upload code and the
/// attribute naming of the emitted content node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Pdf,
}

impl MediaKind {
    /// Numeric code the upload endpoints expect.
    pub fn type_code(self) -> u32 {
        match self {
            MediaKind::Image => 1,
            MediaKind::Audio => 2,
            MediaKind::Pdf => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Pdf => "pdf",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            "pdf" => Some(MediaKind::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a media block's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A path on the local filesystem, uploaded via prepare + multipart.
    Local,
    /// A remote URL the service fetches and hosts itself.
    Url,
}

impl SourceKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(SourceKind::Local),
            "url" => Some(SourceKind::Url),
            _ => None,
        }
    }
}

/// Validated, typed view of a [`BlockSpec`]. Dispatch over this enum is
/// exhaustive; unknown kind strings never get past [`BlockSpec::typed`].
enum Block<'a> {
    Paragraph(&'a [TextSpan]),
    Quote(&'a [TextSpan]),
    NoteRef(&'a str),
    Media {
        kind: MediaKind,
        source: SourceKind,
        path: &'a str,
        metadata: &'a Map<String, Value>,
    },
}

impl BlockSpec {
    fn typed(&self) -> Result<Block<'_>, BlockError> {
        match self.kind.as_deref() {
            None | Some("text") => Ok(Block::Paragraph(&self.texts)),
            Some("quote") => Ok(Block::Quote(&self.texts)),
            Some("note") => {
                let id = self
                    .note_id
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(BlockError::MissingField("note_id"))?;
                Ok(Block::NoteRef(id))
            }
            Some("file") => {
                let kind_str = self
                    .file_type
                    .as_deref()
                    .ok_or(BlockError::MissingField("file_type"))?;
                let kind = MediaKind::parse(kind_str)
                    .ok_or_else(|| BlockError::UnknownMediaKind(kind_str.to_string()))?;
                let source_str = self
                    .source_type
                    .as_deref()
                    .ok_or(BlockError::MissingField("source_type"))?;
                let source = SourceKind::parse(source_str)
                    .ok_or_else(|| BlockError::UnknownSourceKind(source_str.to_string()))?;
                let path = self
                    .source_path
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(BlockError::MissingField("source_path"))?;
                Ok(Block::Media {
                    kind,
                    source,
                    path,
                    metadata: &self.metadata,
                })
            }
            Some(other) => Err(BlockError::UnknownType(other.to_string())),
        }
    }
}

/// Conversion failure, attributed to the block that caused it.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("paragraph list must not be empty")]
    EmptyDocument,
    #[error("block {index}: {cause}")]
    Block { index: usize, cause: BlockError },
}

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("unknown block type '{0}' (expected text, quote, note, or file)")]
    UnknownType(String),
    #[error("unknown file type '{0}' (expected image, audio, or pdf)")]
    UnknownMediaKind(String),
    #[error("unknown source type '{0}' (expected local or url)")]
    UnknownSourceKind(String),
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("span {span}: {cause}")]
    Span { span: usize, cause: SpanError },
    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Error)]
pub enum SpanError {
    #[error("text must not be empty")]
    EmptyText,
    #[error("link '{0}' must start with http:// or https://")]
    BadLinkScheme(String),
}

/// Root of the document tree the note service's content API accepts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub node_type: String,
    pub content: Vec<ContentNode>,
}

impl Document {
    fn new(content: Vec<ContentNode>) -> Self {
        Self {
            node_type: "doc".to_string(),
            content,
        }
    }
}

/// One node in the document tree: `paragraph`/`quote` carry text nodes,
/// `note`/`image`/`audio`/`pdf` carry an attribute map. Empty halves are
/// omitted on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<TextNode>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}

impl ContentNode {
    fn with_content(node_type: &str, content: Vec<TextNode>) -> Self {
        Self {
            node_type: node_type.to_string(),
            content,
            attrs: Map::new(),
        }
    }

    fn with_attrs(node_type: &str, attrs: Map<String, Value>) -> Self {
        Self {
            node_type: node_type.to_string(),
            content: Vec::new(),
            attrs,
        }
    }

    /// Structural spacer between adjacent top-level blocks.
    fn separator() -> Self {
        Self::with_content("paragraph", Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<MarkNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkNode {
    #[serde(rename = "type")]
    pub mark_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
}

impl MarkNode {
    fn plain(mark_type: &str) -> Self {
        Self {
            mark_type: mark_type.to_string(),
            attrs: None,
        }
    }

    fn link(href: &str) -> Self {
        let mut attrs = Map::new();
        attrs.insert("href".to_string(), Value::String(href.to_string()));
        Self {
            mark_type: "link".to_string(),
            attrs: Some(attrs),
        }
    }
}

/// Converts caller-supplied blocks into the service's document tree.
///
/// Blocks are processed strictly in order; the first failure aborts the
/// whole conversion, so no partial tree ever escapes. Media blocks go
/// through the resolver, which is the only part that touches the network.
pub struct DocumentConverter<'a, R: MediaResolver> {
    resolver: &'a R,
}

impl<'a, R: MediaResolver> DocumentConverter<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self { resolver }
    }

    pub async fn convert(&self, blocks: &[BlockSpec]) -> Result<Document, ConvertError> {
        if blocks.is_empty() {
            return Err(ConvertError::EmptyDocument);
        }

        let mut content = Vec::new();
        for (index, spec) in blocks.iter().enumerate() {
            let node = self
                .convert_block(spec)
                .await
                .map_err(|cause| ConvertError::Block { index, cause })?;
            if index > 0 {
                content.push(ContentNode::separator());
            }
            content.push(node);
        }

        Ok(Document::new(content))
    }

    async fn convert_block(&self, spec: &BlockSpec) -> Result<ContentNode, BlockError> {
        match spec.typed()? {
            Block::Paragraph(spans) => {
                validate_spans(spans)?;
                Ok(ContentNode::with_content("paragraph", convert_spans(spans)))
            }
            Block::Quote(spans) => {
                validate_spans(spans)?;
                Ok(ContentNode::with_content("quote", convert_spans(spans)))
            }
            Block::NoteRef(id) => {
                let mut attrs = Map::new();
                attrs.insert("uuid".to_string(), Value::String(id.to_string()));
                Ok(ContentNode::with_attrs("note", attrs))
            }
            Block::Media {
                kind,
                source,
                path,
                metadata,
            } => {
                let file_id = self.resolver.resolve(kind, source, path).await?;
                Ok(ContentNode::with_attrs(
                    kind.as_str(),
                    media_attrs(kind, file_id, metadata),
                ))
            }
        }
    }
}

/// Attribute map for a resolved media node. Audio nodes key the identifier
/// as `audio-uuid` and rename the `show_note` metadata key to `show-note`;
/// image and pdf nodes use `uuid` and pass metadata through untouched.
fn media_attrs(kind: MediaKind, file_id: String, metadata: &Map<String, Value>) -> Map<String, Value> {
    let mut attrs = Map::new();
    match kind {
        MediaKind::Audio => {
            attrs.insert("audio-uuid".to_string(), Value::String(file_id));
            for (key, value) in metadata {
                let key = if key == "show_note" { "show-note" } else { key.as_str() };
                attrs.insert(key.to_string(), value.clone());
            }
        }
        MediaKind::Image | MediaKind::Pdf => {
            attrs.insert("uuid".to_string(), Value::String(file_id));
            for (key, value) in metadata {
                attrs.insert(key.clone(), value.clone());
            }
        }
    }
    attrs
}

fn validate_spans(spans: &[TextSpan]) -> Result<(), BlockError> {
    for (span, s) in spans.iter().enumerate() {
        if s.text.is_empty() {
            return Err(BlockError::Span {
                span,
                cause: SpanError::EmptyText,
            });
        }
        if let Some(link) = &s.link {
            if !link.starts_with("http://") && !link.starts_with("https://") {
                return Err(BlockError::Span {
                    span,
                    cause: SpanError::BadLinkScheme(link.clone()),
                });
            }
        }
    }
    Ok(())
}

/// Pure span conversion: one text node per span, same order, marks emitted
/// in bold, highlight, link order and omitted when the flag is unset.
/// Spans are validated before this runs, so it cannot fail.
fn convert_spans(spans: &[TextSpan]) -> Vec<TextNode> {
    spans
        .iter()
        .map(|span| {
            let mut marks = Vec::new();
            if span.bold {
                marks.push(MarkNode::plain("bold"));
            }
            if span.highlight {
                marks.push(MarkNode::plain("highlight"));
            }
            if let Some(link) = &span.link {
                marks.push(MarkNode::link(link));
            }
            TextNode {
                node_type: "text".to_string(),
                text: span.text.clone(),
                marks,
            }
        })
        .collect()
}
