use crate::error::{Error, Result};
use crate::hash::{compute_object_id, ObjectId};
use crate::types::{Commit, Tree};

/// type tag of a stored object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    /// the ASCII tag used in frames
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(Error::InvalidObjectType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// a parsed object
///
/// the set is closed and serializers differ per variant, so this is a
/// tagged enum rather than a trait object. tag payloads are carried
/// verbatim; the core never writes one itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Vec<u8>),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    /// serialize the payload (the bytes inside the frame)
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Object::Blob(bytes) => bytes.clone(),
            Object::Tree(tree) => tree.serialize(),
            Object::Commit(commit) => commit.serialize(),
            Object::Tag(bytes) => bytes.clone(),
        }
    }

    /// deserialize a payload of the given kind
    pub fn from_payload(kind: ObjectKind, payload: &[u8]) -> Result<Self> {
        match kind {
            ObjectKind::Blob => Ok(Object::Blob(payload.to_vec())),
            ObjectKind::Tree => Ok(Object::Tree(Tree::parse(payload)?)),
            ObjectKind::Commit => Ok(Object::Commit(Commit::parse(payload)?)),
            ObjectKind::Tag => Ok(Object::Tag(payload.to_vec())),
        }
    }

    /// content address of this object
    pub fn id(&self) -> ObjectId {
        compute_object_id(self.kind(), &self.payload())
    }
}

/// build the framed byte form `"<type> <size>\0<payload>"`
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.as_str(), payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// split a frame into its kind and payload, validating the header
///
/// the header before the first NUL must be exactly two space-separated
/// fields: a known type tag and a decimal size equal to the payload
/// length. anything else is a malformed object.
pub fn parse_frame(bytes: &[u8], expected: Option<ObjectKind>) -> Result<(ObjectKind, &[u8])> {
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::MalformedObject("missing header terminator".to_string()))?;
    let header = std::str::from_utf8(&bytes[..nul])
        .map_err(|_| Error::MalformedObject("header is not valid UTF-8".to_string()))?;

    let fields: Vec<&str> = header.split(' ').collect();
    if fields.len() != 2 {
        return Err(Error::MalformedObject(format!(
            "bad object header: {:?}",
            header
        )));
    }

    let kind = ObjectKind::from_str(fields[0])
        .map_err(|_| Error::MalformedObject(format!("unknown object type: {}", fields[0])))?;
    let size: usize = fields[1]
        .parse()
        .map_err(|_| Error::MalformedObject(format!("bad object size: {:?}", fields[1])))?;

    let payload = &bytes[nul + 1..];
    if payload.len() != size {
        return Err(Error::MalformedObject(format!(
            "size mismatch: header says {}, payload is {}",
            size,
            payload.len()
        )));
    }

    if let Some(want) = expected {
        if kind != want {
            return Err(Error::MalformedObject(format!(
                "expected {}, found {}",
                want, kind
            )));
        }
    }

    Ok((kind, payload))
}
