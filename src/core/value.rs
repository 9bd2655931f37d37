use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Handle to a node in the document arena.
///
/// Indirect objects and promoted shared values live in the arena; handles
/// are how the tree expresses sharing and cycles (a page's `/Parent`
/// pointing back at its page-tree node). Handles are only meaningful for
/// the [`Document`](crate::core::Document) that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// An indirect-object reference as written in the file (`N M R`).
///
/// After parsing, references whose target exists are replaced by
/// [`Object::Link`]; an `ObjRef` that survives resolution is dangling and
/// is serialized as the literal string `(N M R)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    /// Object number.
    pub id: u32,
    /// Generation number.
    pub generation: u16,
}

/// A PDF name: the bytes after the leading slash, with `#HH` escapes
/// already decoded where the document version allows them.
///
/// Names order themselves case-folded lexicographically (raw bytes as the
/// tiebreak), which is the canonical key order used for all dictionary
/// output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Name(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        let folded = self
            .0
            .iter()
            .map(u8::to_ascii_lowercase)
            .cmp(other.0.iter().map(u8::to_ascii_lowercase));
        folded.then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Name {
    fn from(b: &[u8]) -> Self {
        Name(b.to_vec())
    }
}

impl From<Vec<u8>> for Name {
    fn from(b: Vec<u8>) -> Self {
        Name(b)
    }
}

/// A real number together with its source spelling.
///
/// PDF files spell the same value many ways (`1.`, `0.250`, `-.5`); the
/// spelling is kept so content streams and document bodies round-trip
/// without reformatting drift. Two reals compare equal only when their
/// spellings match.
#[derive(Debug, Clone)]
pub struct Real {
    value: f64,
    literal: Box<str>,
}

impl Real {
    /// Build from a value; the literal is the shortest decimal spelling,
    /// always containing a decimal point so it re-reads as a real.
    pub fn new(value: f64) -> Self {
        let mut literal = format!("{value}");
        if !literal.contains('.') {
            literal.push_str(".0");
        }
        Real {
            value,
            literal: literal.into(),
        }
    }

    /// Build from a source literal, keeping the exact spelling.
    /// Returns `None` if the text is not a number.
    pub fn from_literal(text: &str) -> Option<Self> {
        let value = text.parse::<f64>().ok()?;
        Some(Real {
            value,
            literal: text.into(),
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }
}

impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.literal == other.literal
    }
}

impl From<f64> for Real {
    fn from(value: f64) -> Self {
        Real::new(value)
    }
}

/// A dictionary: unique name keys, iterated in canonical order
/// (case-folded lexicographic, raw bytes as tiebreak). Insertion order is
/// not preserved and does not matter for output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict(BTreeMap<Name, Object>);

impl Dict {
    pub fn new() -> Self {
        Dict(BTreeMap::new())
    }

    pub fn get(&self, key: &[u8]) -> Option<&Object> {
        self.0.get(&Name::from(key))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        self.0.get_mut(&Name::from(key))
    }

    /// Insert a key, replacing and returning any previous value.
    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Object>) -> Option<Object> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.remove(&Name::from(key))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.contains_key(&Name::from(key))
    }

    /// Entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Name, &mut Object)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-stream serialization hints. Never written into the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamFlags {
    /// The stream arrived FlateDecode-compressed and was inflated on read.
    /// Absent other instructions it is recompressed on write.
    pub was_compressed: bool,
    /// Compress this stream on write even if the document default says not to.
    pub compress: bool,
    /// Emit this stream uncompressed; wins over `compress`.
    pub decompress: bool,
    /// Minify this stream's content on write.
    pub minify: bool,
}

/// A stream: dictionary plus byte payload. Streams are always serialized
/// as indirect objects, and `/Length` is recomputed from the payload at
/// serialization time.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dict,
    pub data: Vec<u8>,
    pub flags: StreamFlags,
}

impl Stream {
    pub fn new(dict: Dict, data: Vec<u8>) -> Self {
        Stream {
            dict,
            data,
            flags: StreamFlags::default(),
        }
    }
}

/// A PDF value.
///
/// `Link` and `Reference` both denote indirection: `Link` points at a node
/// in the document arena (resolved, possibly cyclic), `Reference` is an
/// unresolved `N M R` from the file.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(Real),
    Name(Name),
    /// Literal string: escape sequences resolved, CR/CRLF normalized to LF.
    String(Vec<u8>),
    /// Hex string: lowercased hex digits, whitespace stripped, odd final
    /// nibble padded with `0`. Stored as digit text, not decoded bytes.
    HexString(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(Dict),
    Stream(Stream),
    Reference(ObjRef),
    Link(NodeId),
}

impl Object {
    pub fn name(bytes: impl Into<Vec<u8>>) -> Self {
        Object::Name(Name::new(bytes))
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Object::String(bytes.into())
    }

    pub fn real(value: f64) -> Self {
        Object::Real(Real::new(value))
    }

    /// Hex string from raw bytes (encoded to lowercase digit text).
    pub fn hex_string(bytes: &[u8]) -> Self {
        let mut text = Vec::with_capacity(bytes.len() * 2);
        for b in bytes {
            text.push(HEX_DIGITS[(b >> 4) as usize]);
            text.push(HEX_DIGITS[(b & 0x0F) as usize]);
        }
        Object::HexString(text)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Arrays, dictionaries and streams; everything else is a scalar.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Object::Array(_) | Object::Dictionary(_) | Object::Stream(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or real.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(r.value()),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            Object::Name(n) => Some(n.as_bytes()),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a hex string (digit pairs decoded).
    pub fn as_hex_decoded(&self) -> Option<Vec<u8>> {
        match self {
            Object::HexString(text) => {
                let mut bytes = Vec::with_capacity(text.len() / 2);
                for pair in text.chunks(2) {
                    let hi = hex_value(pair[0])?;
                    let lo = hex_value(*pair.get(1).unwrap_or(&b'0'))?;
                    bytes.push(hi << 4 | lo);
                }
                Some(bytes)
            }
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Object>> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&mut s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<NodeId> {
        match self {
            Object::Link(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::Integer(i)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i64::from(i))
    }
}

impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Object::Real(Real::new(v))
    }
}

impl From<Real> for Object {
    fn from(r: Real) -> Self {
        Object::Real(r)
    }
}

impl From<Name> for Object {
    fn from(n: Name) -> Self {
        Object::Name(n)
    }
}

impl From<Vec<Object>> for Object {
    fn from(a: Vec<Object>) -> Self {
        Object::Array(a)
    }
}

impl From<Dict> for Object {
    fn from(d: Dict) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Stream> for Object {
    fn from(s: Stream) -> Self {
        Object::Stream(s)
    }
}

impl From<NodeId> for Object {
    fn from(n: NodeId) -> Self {
        Object::Link(n)
    }
}

impl From<ObjRef> for Object {
    fn from(r: ObjRef) -> Self {
        Object::Reference(r)
    }
}

/// Build a [`Dict`] from `key => value` pairs.
///
/// ```rust
/// use pdfkern::{dict, Object};
///
/// let d = dict! {
///     "Type" => Object::name("Page"),
///     "Rotate" => 90,
/// };
/// assert_eq!(d.get(b"Rotate").unwrap().as_int(), Some(90));
/// ```
#[macro_export]
macro_rules! dict {
    () => {
        $crate::core::Dict::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::core::Dict::new();
        $(
            d.insert($crate::core::Name::from($key), $crate::core::Object::from($value));
        )+
        d
    }};
}
