use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_object_id, ObjectId};
use crate::repo::Repository;
use crate::types::{frame, parse_frame, Commit, Object, ObjectKind, Tree};

/// filesystem path of an object: `objects/<xx>/<yyyy…>`
pub fn object_path(repo: &Repository, id: &ObjectId) -> PathBuf {
    let (dir, file) = id.to_path_components();
    repo.objects_dir().join(dir).join(file)
}

/// check whether an object exists in the store
pub fn has_object(repo: &Repository, id: &ObjectId) -> bool {
    object_path(repo, id).exists()
}

/// write an object to the store, returning its id
///
/// the store is content-addressed: a write whose id already exists is a
/// no-op. new objects go through a temp file in the destination
/// directory and are renamed into place.
pub fn write_object(repo: &Repository, object: &Object) -> Result<ObjectId> {
    write_payload(repo, object.kind(), &object.payload())
}

fn write_payload(repo: &Repository, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
    let id = compute_object_id(kind, payload);

    let (dir, file) = id.to_path_components();
    let object_dir = repo.objects_dir().join(&dir);
    let target = object_dir.join(&file);

    if target.exists() {
        return Ok(id);
    }

    fs::create_dir_all(&object_dir).with_path(&object_dir)?;

    let tmp = NamedTempFile::new_in(&object_dir).with_path(&object_dir)?;
    let mut encoder = ZlibEncoder::new(tmp, Compression::default());
    encoder.write_all(&frame(kind, payload)).with_path(&target)?;
    let tmp = encoder.finish().with_path(&target)?;

    let _ = tmp.as_file().sync_all();
    tmp.persist(&target).map_err(|e| Error::Io {
        path: target.clone(),
        source: e.error,
    })?;

    Ok(id)
}

/// read and parse an object
pub fn read_object(repo: &Repository, id: &ObjectId) -> Result<Object> {
    let path = object_path(repo, id);
    let file = open_object(id, &path)?;

    let mut bytes = Vec::new();
    ZlibDecoder::new(file)
        .read_to_end(&mut bytes)
        .with_path(&path)?;

    let (kind, payload) = parse_frame(&bytes, None)?;
    if compute_object_id(kind, payload) != *id {
        return Err(Error::MalformedObject(format!(
            "stored bytes do not hash to {}",
            id
        )));
    }

    Object::from_payload(kind, payload)
}

/// read only an object's type and size, without parsing the payload
pub fn read_object_header(repo: &Repository, id: &ObjectId) -> Result<(ObjectKind, u64)> {
    let path = object_path(repo, id);
    let file = open_object(id, &path)?;

    let mut reader = BufReader::new(ZlibDecoder::new(file));
    let mut buf = Vec::new();
    reader.read_until(0, &mut buf).with_path(&path)?;
    if buf.last() != Some(&0) {
        return Err(Error::MalformedObject(
            "missing header terminator".to_string(),
        ));
    }

    let header = std::str::from_utf8(&buf[..buf.len() - 1])
        .map_err(|_| Error::MalformedObject("header is not valid UTF-8".to_string()))?;
    let (kind, size) = header
        .split_once(' ')
        .ok_or_else(|| Error::MalformedObject(format!("bad object header: {:?}", header)))?;

    let kind = ObjectKind::from_str(kind)
        .map_err(|_| Error::MalformedObject(format!("unknown object type: {}", kind)))?;
    let size: u64 = size
        .parse()
        .map_err(|_| Error::MalformedObject(format!("bad object size: {:?}", size)))?;

    Ok((kind, size))
}

fn open_object(id: &ObjectId, path: &std::path::Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::ObjectNotFound(id.to_hex())
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// resolve an abbreviated object id
///
/// at least 4 hex digits are required; a prefix matching more than one
/// stored object is ambiguous.
pub fn resolve_short_id(repo: &Repository, prefix: &str) -> Result<ObjectId> {
    if prefix.len() < 4
        || prefix.len() > 40
        || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(Error::ObjectNotFound(prefix.to_string()));
    }
    let prefix = prefix.to_ascii_lowercase();

    let dir = repo.objects_dir().join(&prefix[..2]);
    let rest = &prefix[2..];

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::ObjectNotFound(prefix));
        }
        Err(source) => return Err(Error::Io { path: dir, source }),
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.with_path(&dir)?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(rest) {
            matches.push(format!("{}{}", &prefix[..2], name));
        }
    }

    match matches.as_slice() {
        [] => Err(Error::ObjectNotFound(prefix)),
        [full] => ObjectId::from_hex(full),
        _ => Err(Error::AmbiguousReference(prefix)),
    }
}

/// write file contents as a blob
pub fn write_blob(repo: &Repository, content: &[u8]) -> Result<ObjectId> {
    write_payload(repo, ObjectKind::Blob, content)
}

/// read a blob's contents
pub fn read_blob(repo: &Repository, id: &ObjectId) -> Result<Vec<u8>> {
    match read_object(repo, id)? {
        Object::Blob(bytes) => Ok(bytes),
        other => Err(Error::MalformedObject(format!(
            "expected blob, found {}",
            other.kind()
        ))),
    }
}

/// write a tree object
pub fn write_tree(repo: &Repository, tree: &Tree) -> Result<ObjectId> {
    write_payload(repo, ObjectKind::Tree, &tree.serialize())
}

/// read a tree object
pub fn read_tree(repo: &Repository, id: &ObjectId) -> Result<Tree> {
    match read_object(repo, id)? {
        Object::Tree(tree) => Ok(tree),
        other => Err(Error::MalformedObject(format!(
            "expected tree, found {}",
            other.kind()
        ))),
    }
}

/// write a commit object
pub fn write_commit(repo: &Repository, commit: &Commit) -> Result<ObjectId> {
    write_payload(repo, ObjectKind::Commit, &commit.serialize())
}

/// read a commit object
pub fn read_commit(repo: &Repository, id: &ObjectId) -> Result<Commit> {
    match read_object(repo, id)? {
        Object::Commit(commit) => Ok(commit),
        other => Err(Error::MalformedObject(format!(
            "expected commit, found {}",
            other.kind()
        ))),
    }
}
