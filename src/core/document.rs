use crate::core::error::PdfError;
use crate::core::value::{Dict, NodeId, Object};
use crate::{parser, writer};

/// Binary-signature comment emitted after the `%PDF-1.N` header line.
pub const DEFAULT_BINARY_SIGNATURE: [u8; 4] = [0xBF, 0xF7, 0xA2, 0xFE];

/// How structural validation findings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// Log findings and continue (the default).
    #[default]
    Warn,
    /// Findings abort with [`PdfError::Validation`].
    Strict,
    /// Do not validate at all.
    Skip,
}

/// Options for [`Document::parse_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub validation: Validation,
}

/// Options for [`Document::to_bytes_with`].
///
/// Positive flags and their negations may both be set (callers often merge
/// option sources); a negation always wins. `optimize` is shorthand for
/// compress + minify + object streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Deflate-compress all eligible streams.
    pub compress: bool,
    /// Force all streams out uncompressed; wins over `compress`.
    pub decompress: bool,
    /// Minify page content streams.
    pub minify: bool,
    /// Shorthand for compress + minify + use_object_streams.
    pub optimize: bool,
    /// Emit a PDF 1.5 xref stream and pack eligible objects into object streams.
    pub use_object_streams: bool,
    pub no_compress: bool,
    pub no_minify: bool,
    pub no_object_streams: bool,
    pub no_optimize: bool,
    /// Re-emit the binary-signature bytes the document was read with.
    pub preserve_binary_signature: bool,
    pub validation: Validation,
    /// Epoch seconds for `Info` date entries; `None` or `0` leaves them alone.
    pub timestamp: Option<i64>,
}

impl SaveOptions {
    pub fn optimized() -> Self {
        SaveOptions {
            optimize: true,
            ..SaveOptions::default()
        }
    }

    fn optimize_active(&self) -> bool {
        self.optimize && !self.no_optimize
    }

    /// Document-wide compression after negations; `decompress` wins.
    pub fn compress_enabled(&self) -> bool {
        (self.compress || self.optimize_active()) && !self.no_compress && !self.decompress
    }

    pub fn decompress_enabled(&self) -> bool {
        self.decompress
    }

    pub fn minify_enabled(&self) -> bool {
        (self.minify || self.optimize_active()) && !self.no_minify
    }

    pub fn object_streams_enabled(&self) -> bool {
        (self.use_object_streams || self.optimize_active()) && !self.no_object_streams
    }

    /// Timestamp to apply, with the zero sentinel filtered out.
    pub(crate) fn effective_timestamp(&self) -> Option<i64> {
        self.timestamp.filter(|t| *t != 0)
    }
}

/// A PDF document: the trailer dictionary plus the node arena holding
/// every value that is (or may become) an indirect object.
///
/// The tree under [`Document::trailer`] refers to arena nodes through
/// [`Object::Link`]; cycles (page `/Parent` back-pointers) are expressed
/// that way. Indirect-object numbers are not stable: they are recomputed
/// from the enumeration order on every serialization.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Object>,
    /// The merged trailer dictionary (`Root`, `Info`, `Size`, `ID`, …).
    pub trailer: Dict,
    /// Header version as (major, minor).
    pub version: (u8, u8),
    /// The four high-bit marker bytes from the header comment.
    pub binary_signature: [u8; 4],
}

impl Document {
    /// The minimal empty document: catalog, empty page tree, empty info.
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            trailer: Dict::new(),
            version: (1, 4),
            binary_signature: DEFAULT_BINARY_SIGNATURE,
        };
        let pages = doc.insert(Object::Dictionary(crate::dict! {
            "Type" => Object::name("Pages"),
            "Kids" => Object::Array(Vec::new()),
            "Count" => 0,
        }));
        let catalog = doc.insert(Object::Dictionary(crate::dict! {
            "Type" => Object::name("Catalog"),
            "Pages" => pages,
        }));
        let info = doc.insert(Object::Dictionary(Dict::new()));
        doc.trailer.insert("Root", catalog);
        doc.trailer.insert("Info", info);
        doc
    }

    /// Parse a document from raw bytes with default options.
    pub fn parse(bytes: &[u8]) -> Result<Document, PdfError> {
        Self::parse_with(bytes, ParseOptions::default())
    }

    /// Parse a document from raw bytes.
    pub fn parse_with(bytes: &[u8], options: ParseOptions) -> Result<Document, PdfError> {
        parser::parse(bytes, options)
    }

    /// Serialize with default options (classic xref table, streams that
    /// arrived compressed go out compressed).
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PdfError> {
        self.to_bytes_with(SaveOptions::default())
    }

    /// Serialize the document into a complete PDF file.
    ///
    /// Serialization mutates the document: shared values are promoted to
    /// arena nodes, `/Length` entries are refreshed, content streams may
    /// be minified in place.
    pub fn to_bytes_with(&mut self, options: SaveOptions) -> Result<Vec<u8>, PdfError> {
        writer::save(self, options)
    }

    pub(crate) fn from_parts(
        nodes: Vec<Object>,
        trailer: Dict,
        version: (u8, u8),
        binary_signature: [u8; 4],
    ) -> Self {
        Document {
            nodes,
            trailer,
            version,
            binary_signature,
        }
    }

    /// Add a value to the arena, returning its handle.
    pub fn insert(&mut self, value: Object) -> NodeId {
        self.nodes.push(value);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Object {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Object {
        &mut self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All arena nodes with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Object)> {
        self.nodes.iter().enumerate().map(|(i, v)| (NodeId(i), v))
    }

    pub(crate) fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Follow a link one level into the arena; other values pass through.
    pub fn resolve<'a>(&'a self, value: &'a Object) -> &'a Object {
        match value {
            Object::Link(id) => self.nodes.get(id.0).unwrap_or(value),
            _ => value,
        }
    }

    /// Dictionary lookup with link resolution.
    pub fn dict_get<'a>(&'a self, dict: &'a Dict, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).map(|v| self.resolve(v))
    }

    /// The catalog node, if `Root` is present and resolved.
    pub fn root(&self) -> Option<NodeId> {
        self.trailer.get(b"Root")?.as_link()
    }

    /// True when the trailer carries an `Encrypt` entry. Encrypted
    /// documents parse, but their stream payloads stay opaque.
    pub fn is_encrypted(&self) -> bool {
        self.trailer.contains_key(b"Encrypt")
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}
