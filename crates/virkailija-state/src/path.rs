//! Field paths into a loaded record.
//!
//! A path is a sequence of segments. Each segment is either a key (for maps)
//! or an explicit index (for sequences). Form inputs name their field with the
//! dotted form (`yhteystiedotRyhma.0.yhteystieto.1.yhteystietoArvo`), which
//! parses to key segments only; the bracket form (`contactGroup[2].value`)
//! produces an explicit index segment.

use crate::error::{PathError, PathResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single segment in a field path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Map key access. A numeric key also addresses an existing sequence.
    Key(String),
    /// Explicit sequence index.
    Index(usize),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// The segment as a map key. Index segments become their decimal form.
    pub fn as_field_name(&self) -> String {
        match self {
            Seg::Key(k) => k.clone(),
            Seg::Index(i) => i.to_string(),
        }
    }

    /// The segment as a sequence position, if it has one.
    ///
    /// Key segments qualify when they are canonical decimal numbers: `"7"`
    /// does, `"007"` and `"+7"` do not.
    pub fn as_position(&self) -> Option<usize> {
        match self {
            Seg::Key(k) => {
                if k.is_empty() || !k.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                if k.len() > 1 && k.starts_with('0') {
                    return None;
                }
                k.parse().ok()
            }
            Seg::Index(i) => Some(*i),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A location inside a record.
///
/// # Examples
///
/// ```
/// use virkailija_state::Path;
///
/// let path = Path::root().key("contactGroup").index(2).key("value");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.to_dotted(), "contactGroup.2.value");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (root).
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path, accepting `[n]` index suffixes on any segment.
    pub fn parse(input: &str) -> PathResult<Self> {
        parse_dotted_with(input, '.')
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment onto the path.
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Path made of the first `len` segments.
    pub fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Check if this path is a prefix of another path (or equal to it).
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Render the input-name form used by form fields.
    ///
    /// Index segments render as plain numbers, so the output parses back to
    /// key segments that address the same location.
    pub fn to_dotted(&self) -> String {
        self.to_dotted_with('.')
    }

    /// Like [`Path::to_dotted`] with a custom separator.
    pub fn to_dotted_with(&self, separator: char) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(separator);
            }
            out.push_str(&seg.as_field_name());
        }
        out
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Parse a dotted path with the default `.` separator.
pub fn parse_dotted(input: &str) -> PathResult<Path> {
    parse_dotted_with(input, '.')
}

/// Parse a separated path.
///
/// Each separated piece is an optional field name followed by any number of
/// `[n]` index suffixes. Empty input and empty pieces are rejected.
pub fn parse_dotted_with(input: &str, separator: char) -> PathResult<Path> {
    if input.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let mut path = Path::root();
    for piece in input.split(separator) {
        if piece.is_empty() {
            return Err(PathError::parse(input, "empty segment"));
        }

        let (name, mut rest) = match piece.find('[') {
            Some(pos) => (&piece[..pos], &piece[pos..]),
            None => (piece, ""),
        };
        if !name.is_empty() {
            if name.contains(']') {
                return Err(PathError::parse(input, "unbalanced ']'"));
            }
            path.push(Seg::key(name));
        }

        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| PathError::parse(input, "unclosed '['"))?;
            let digits = &rest[1..close];
            let index = digits
                .parse::<usize>()
                .map_err(|_| PathError::parse(input, format!("invalid index '{digits}'")))?;
            path.push(Seg::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(PathError::parse(input, "text after index"));
            }
        }
    }

    Ok(path)
}

/// Construct a `Path` from a sequence of segments.
///
/// String literals become key segments, numbers become index segments.
///
/// ```
/// use virkailija_state::path;
///
/// let p = path!("yhteystiedotRyhma", 0, "yhteystieto", 1, "yhteystietoArvo");
/// assert_eq!(p.len(), 5);
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::Seg::from($seg));
        )+
        p
    }};
}
