//! The loose-object envelope: framing, hashing, zlib storage.
//!
//! A `Write` adapter hashes and compresses a byte stream in one pass, and
//! the fan-out path handling mirrors a typical `hash_object`/`write_tree`
//! implementation.

use std::fmt;
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::str::FromStr;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::repo::Repository;

/// The four object kinds the store knows about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// Uninterpreted file content.
    Blob,
    /// A directory snapshot.
    Tree,
    /// A history record.
    Commit,
    /// A named pointer to another object.
    Tag,
}

impl Kind {
    /// The ASCII tag used in the on-disk envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Blob => "blob",
            Kind::Tree => "tree",
            Kind::Commit => "commit",
            Kind::Tag => "tag",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(Kind::Blob),
            "tree" => Ok(Kind::Tree),
            "commit" => Ok(Kind::Commit),
            "tag" => Ok(Kind::Tag),
            other => Err(Error::InvalidKind(other.to_string())),
        }
    }
}

/// Frames a body with its envelope header: `<kind> SP <len> NUL <body>`.
pub fn frame(kind: Kind, body: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(kind.as_str().len() + 1 + 20 + 1 + body.len());
    framed.extend_from_slice(kind.as_str().as_bytes());
    framed.push(b' ');
    framed.extend_from_slice(body.len().to_string().as_bytes());
    framed.push(0);
    framed.extend_from_slice(body);
    framed
}

/// SHA-1 of already-framed bytes, as a validated `ObjectId`.
pub fn hash_framed(framed: &[u8]) -> ObjectId {
    let digest = Sha1::digest(framed);
    ObjectId::from_raw20(digest.as_slice().try_into().expect("SHA-1 digest is 20 bytes"))
}

/// Writes already-zlib-compressed object bytes to the fan-out path, creating
/// parent directories as needed. A no-op if the destination already exists:
/// content addressing guarantees the bytes would be identical anyway.
fn write_fanout_file(repo: &Repository, id: &ObjectId, compressed: &[u8]) -> Result<()> {
    let path = repo.metadata_path(&id.relative_object_path());
    if path.exists() {
        tracing::debug!(object = %id, "object already stored, skipping write");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, compressed)?;
    tracing::trace!(object = %id, bytes = compressed.len(), "wrote object");
    Ok(())
}

/// Frames, hashes, zlib-compresses, and stores `body` under `kind`. Returns
/// the resulting object id.
pub fn store(repo: &Repository, kind: Kind, body: &[u8]) -> Result<ObjectId> {
    let framed = frame(kind, body);
    store_framed(repo, &framed)
}

/// Hashes and stores bytes that are already in framed (envelope) form.
pub fn store_framed(repo: &Repository, framed: &[u8]) -> Result<ObjectId> {
    let id = hash_framed(framed);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(framed)?;
    let compressed = encoder.finish()?;
    write_fanout_file(repo, &id, &compressed)?;
    Ok(id)
}

/// Reads and decompresses the object at `id`, splits the envelope, and
/// validates the declared body length. Returns the object's kind and raw
/// body bytes.
pub fn load(repo: &Repository, id: &ObjectId) -> Result<(Kind, Bytes)> {
    let path = repo.metadata_path(&id.relative_object_path());
    let file = fs::File::open(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::Missing(format!("object {id}"))
        } else {
            Error::Io(e)
        }
    })?;
    let mut decoder = ZlibDecoder::new(BufReader::new(file));
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;

    let space = raw
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::MalformedCannotParse(id.to_string()))?;
    let nul = raw[space..]
        .iter()
        .position(|&b| b == 0)
        .map(|offset| space + offset)
        .ok_or_else(|| Error::MalformedCannotParse(id.to_string()))?;

    let kind_str = std::str::from_utf8(&raw[..space])
        .map_err(|_| Error::MalformedCannotParse(id.to_string()))?;
    let kind = Kind::from_str(kind_str).map_err(|_| Error::MalformedCannotParse(id.to_string()))?;

    let len_str = std::str::from_utf8(&raw[space + 1..nul])
        .map_err(|_| Error::MalformedCannotParse(id.to_string()))?;
    let declared_len: usize = len_str
        .parse()
        .map_err(|_| Error::MalformedCannotParse(id.to_string()))?;

    let body = &raw[nul + 1..];
    if body.len() != declared_len {
        return Err(Error::MalformedBadLength(id.to_string()));
    }

    Ok((kind, Bytes::copy_from_slice(body)))
}

/// A `Write` adapter that feeds every byte written through both a running
/// SHA-1 hash and an inner writer (typically a zlib encoder), so a large
/// file can be hashed and compressed in a single pass.
struct HashingWriter<W> {
    hasher: Sha1,
    inner: W,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams a blob's content from disk, hashing and (optionally) compressing
/// and storing it in a single pass, without materializing the whole file in
/// memory. Used by `hash_file` for the `blob` kind.
pub fn hash_blob_file(repo: &Repository, path: &Path, persist: bool) -> Result<ObjectId> {
    let file_len = fs::metadata(path)?.len();
    let mut source = fs::File::open(path)?;
    let header = frame_header(Kind::Blob, file_len as usize);

    if persist {
        let tmp_path = repo.metadata_path(Path::new("objects")).join(".tmp-blob");
        if let Some(parent) = tmp_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = fs::File::create(&tmp_path)?;
        let mut writer = HashingWriter {
            hasher: Sha1::new(),
            inner: ZlibEncoder::new(tmp, Compression::default()),
        };
        writer.write_all(&header)?;
        io::copy(&mut source, &mut writer)?;
        let digest = writer.hasher.finalize_reset();
        let id = ObjectId::from_raw20(digest.as_slice().try_into().expect("SHA-1 digest is 20 bytes"));
        writer.inner.finish()?;

        let dest = repo.metadata_path(&id.relative_object_path());
        if dest.exists() {
            fs::remove_file(&tmp_path)?;
            tracing::debug!(object = %id, "object already stored, skipping write");
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&tmp_path, &dest)?;
            tracing::trace!(object = %id, "wrote object");
        }
        Ok(id)
    } else {
        let mut hasher = Sha1::new();
        hasher.update(&header);
        io::copy(&mut source, &mut hasher)?;
        let digest = hasher.finalize();
        Ok(ObjectId::from_raw20(
            digest.as_slice().try_into().expect("SHA-1 digest is 20 bytes"),
        ))
    }
}

fn frame_header(kind: Kind, body_len: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(kind.as_str().len() + 12);
    header.extend_from_slice(kind.as_str().as_bytes());
    header.push(b' ');
    header.extend_from_slice(body_len.to_string().as_bytes());
    header.push(0);
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repository;
    use temp_dir::TempDir;

    fn test_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), ".git").unwrap();
        (dir, repo)
    }

    #[test]
    fn frame_matches_envelope_shape() {
        let framed = frame(Kind::Blob, b"hello");
        assert_eq!(framed, b"blob 5\0hello");
    }

    #[test]
    fn hashes_the_canonical_banana_blob() {
        let framed = frame(Kind::Blob, b"I am a banana");
        let id = hash_framed(&framed);
        assert_eq!(id.as_str(), "8ff79d2828b3af736abc66a922b2c48fed82d803");
    }

    #[test]
    fn store_then_load_round_trips() {
        let (_dir, repo) = test_repo();
        let id = store(&repo, Kind::Blob, b"hello, world").unwrap();
        let (kind, body) = load(&repo, &id).unwrap();
        assert_eq!(kind, Kind::Blob);
        assert_eq!(&body[..], b"hello, world");
    }

    #[test]
    fn storing_twice_is_idempotent() {
        let (_dir, repo) = test_repo();
        let first = store(&repo, Kind::Blob, b"same bytes").unwrap();
        let second = store(&repo, Kind::Blob, b"same bytes").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn load_missing_object_fails() {
        let (_dir, repo) = test_repo();
        let id = ObjectId::try_from("000000000000000000000000000000000000000a").unwrap();
        assert!(matches!(load(&repo, &id), Err(Error::Missing(_))));
    }

    #[test]
    fn load_rejects_bad_length() {
        let (_dir, repo) = test_repo();
        // Hand-craft a corrupt object: declared length doesn't match body.
        let bogus_framed = b"blob 4\0hello".to_vec(); // declares 4, actually 5 bytes
        let id = hash_framed(&bogus_framed);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bogus_framed).unwrap();
        let compressed = encoder.finish().unwrap();
        write_fanout_file(&repo, &id, &compressed).unwrap();

        assert!(matches!(load(&repo, &id), Err(Error::MalformedBadLength(_))));
    }

    #[test]
    fn hash_blob_file_matches_in_memory_framing() {
        let (dir, repo) = test_repo();
        let file_path = dir.path().join("banana.txt");
        fs::write(&file_path, b"I am a banana").unwrap();

        let streamed = hash_blob_file(&repo, &file_path, false).unwrap();
        let in_memory = hash_framed(&frame(Kind::Blob, b"I am a banana"));
        assert_eq!(streamed, in_memory);
    }
}
