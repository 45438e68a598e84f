//! References and free-form name resolution: `create_ref`/`delete_ref`/
//! `list_refs`/`resolve_ref` for the reference half, and `resolve_name`/
//! `find` for mapping a short hash, `HEAD`, or a full hash to an object.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::{self, ObjectId};
use crate::object::{self, Kind};
use crate::repo::Repository;
use crate::store::{self, TypedObject};

/// How far a chain of symbolic references may run before being treated as
/// a cycle.
const MAX_REF_CHAIN_DEPTH: u32 = 8;

/// How far a tag/commit type-following chain may run before being treated
/// as a cycle.
const MAX_TAG_INDIRECTION_DEPTH: u32 = 10;

/// What a single reference file names: either another ref (`ref: <path>`)
/// or an object directly (`<40-hex>`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RefTarget {
    /// Names another reference by its path, relative to the metadata dir.
    Symbolic(String),
    /// Names an object directly.
    Direct(ObjectId),
}

/// Reads and parses exactly one reference file, without following it.
fn read_ref_raw(repo: &Repository, name: &str) -> Result<RefTarget> {
    let path = repo.metadata_path(Path::new(name));
    let text = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Missing(format!("ref {name}"))
        } else {
            Error::Io(e)
        }
    })?;
    let trimmed = text.trim_end_matches('\n');

    if let Some(target) = trimmed.strip_prefix("ref: ") {
        Ok(RefTarget::Symbolic(target.trim().to_string()))
    } else {
        ObjectId::try_from(trimmed)
            .map(RefTarget::Direct)
            .map_err(|_| Error::MalformedCannotParse(format!("ref {name}")))
    }
}

/// Fully resolves a reference, following symbolic indirections up to
/// `MAX_REF_CHAIN_DEPTH` times before failing with `RefCycle`.
pub fn resolve_ref(repo: &Repository, name: &str) -> Result<ObjectId> {
    let mut current = name.to_string();
    for _ in 0..MAX_REF_CHAIN_DEPTH {
        match read_ref_raw(repo, &current)? {
            RefTarget::Direct(id) => return Ok(id),
            RefTarget::Symbolic(next) => current = next,
        }
    }
    Err(Error::RefCycle(name.to_string()))
}

/// Lists every reference under `refs/`, as `(path, id)` pairs sorted by
/// path. Symbolic references encountered along the way are resolved; a ref
/// that fails to resolve is omitted rather than aborting the whole listing.
pub fn list_refs(repo: &Repository) -> Result<Vec<(String, ObjectId)>> {
    let mut out = Vec::new();
    let root = repo.metadata_path(Path::new("refs"));
    walk_refs(repo, &root, &root, &mut out)?;
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

fn walk_refs(repo: &Repository, root: &Path, dir: &Path, out: &mut Vec<(String, ObjectId)>) -> Result<()> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(());
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_refs(repo, root, &path, out)?;
        } else {
            let relative = path
                .strip_prefix(root.parent().unwrap_or(root))
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if let Ok(id) = resolve_ref(repo, &relative) {
                out.push((relative, id));
            }
        }
    }
    Ok(())
}

/// Creates or overwrites (with `force`) a reference at `name`, pointing it
/// at either an object directly or another reference by path.
pub fn create_ref(repo: &Repository, name: &str, target: &RefTarget, force: bool) -> Result<()> {
    let path = repo.metadata_path(Path::new(name));
    if path.exists() && !force {
        return Err(Error::AlreadyExists(name.to_string()));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = match target {
        RefTarget::Direct(id) => format!("{id}\n"),
        RefTarget::Symbolic(ref_path) => format!("ref: {ref_path}\n"),
    };
    fs::write(&path, contents)?;
    Ok(())
}

/// Deletes the reference at `name`, returning the object it pointed to.
pub fn delete_ref(repo: &Repository, name: &str) -> Result<ObjectId> {
    let id = resolve_ref(repo, name)?;
    let path = repo.metadata_path(Path::new(name));
    fs::remove_file(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::Missing(format!("ref {name}"))
        } else {
            Error::Io(e)
        }
    })?;
    Ok(id)
}

/// Resolves a free-form name: `HEAD`, a full object hash, or a short hex
/// prefix, in that order.
///
/// Matches `resolve_object_name`'s search order exactly: trims and
/// lowercases the name; `HEAD` (checked case-insensitively) short-circuits
/// to `resolve_ref`; a full 40-character hex string is only trusted if the
/// object file actually exists; a 4-39 character hex string scans the
/// matching fan-out directory. Anything else, including an unmatched full
/// hash, is `NotFound`.
pub fn resolve_name(repo: &Repository, name: &str) -> Result<ObjectId> {
    let trimmed = name.trim();
    if trimmed.eq_ignore_ascii_case("HEAD") {
        return resolve_ref(repo, "HEAD");
    }

    let lower = trimmed.to_lowercase();
    if lower.is_empty() {
        return Err(Error::InvalidArgument("empty name".to_string()));
    }

    if hash::is_full_hex(&lower) {
        let id = ObjectId::try_from(lower.as_str())?;
        if repo.metadata_path(&id.relative_object_path()).exists() {
            return Ok(id);
        }
        return Err(Error::NotFound(name.to_string()));
    }

    if hash::is_short_identifier(&lower) {
        return resolve_short_prefix(repo, &lower);
    }

    Err(Error::NotFound(name.to_string()))
}

/// Scans the fan-out directory matching `prefix`'s first two characters for
/// entries whose remainder starts with the rest of `prefix`. Callers only
/// reach this via `is_short_identifier`, which guarantees `prefix.len() >= 4`.
fn resolve_short_prefix(repo: &Repository, prefix: &str) -> Result<ObjectId> {
    let objects_dir = repo.metadata_path(Path::new("objects"));
    let mut matches = Vec::new();

    let (dir_name, rest) = prefix.split_at(2);
    let dir = objects_dir.join(dir_name);
    if let Ok(entries) = fs::read_dir(&dir) {
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(rest) {
                matches.push(format!("{dir_name}{file_name}"));
            }
        }
    }

    match matches.len() {
        0 => Err(Error::NotFound(prefix.to_string())),
        1 => ObjectId::try_from(matches.remove(0).as_str()),
        _ => Err(Error::Ambiguous {
            name: prefix.to_string(),
            candidates: matches,
        }),
    }
}

/// Resolves `name`, then optionally follows type indirection until an
/// object of `expected_kind` is reached.
///
/// With `expected_kind = None`, this is exactly `resolve_name`. With a
/// kind given: if the resolved object already has that kind, its hash is
/// returned; otherwise, if `follow` is false, resolution fails with
/// `NotFound`; if `follow` is true, one indirection step is taken — a tag
/// dereferences through its `object` header, a commit substitutes its
/// `tree` header when `expected_kind` is `Tree` — and the search repeats.
/// Any other mismatch is `NotFound`. Exceeding `MAX_TAG_INDIRECTION_DEPTH`
/// steps fails with `TagCycle`.
pub fn find(
    repo: &Repository,
    name: &str,
    expected_kind: Option<Kind>,
    follow: bool,
) -> Result<ObjectId> {
    let mut current = resolve_name(repo, name)?;
    let Some(wanted) = expected_kind else {
        return Ok(current);
    };

    for _ in 0..MAX_TAG_INDIRECTION_DEPTH {
        let obj = store::read_object(repo, &current)?;
        if obj.kind() == wanted {
            return Ok(current);
        }
        if !follow {
            return Err(Error::NotFound(name.to_string()));
        }
        current = match obj {
            TypedObject::Tag(msg) => {
                let target = msg
                    .header("object")
                    .ok_or_else(|| Error::MalformedCannotParse(current.to_string()))?;
                let target = std::str::from_utf8(target)
                    .map_err(|_| Error::MalformedCannotParse(current.to_string()))?;
                ObjectId::try_from(target)?
            }
            TypedObject::Commit(msg) if wanted == Kind::Tree => {
                let tree = msg
                    .header("tree")
                    .ok_or_else(|| Error::MalformedCannotParse(current.to_string()))?;
                let tree = std::str::from_utf8(tree)
                    .map_err(|_| Error::MalformedCannotParse(current.to_string()))?;
                ObjectId::try_from(tree)?
            }
            _ => return Err(Error::NotFound(name.to_string())),
        };
    }
    Err(Error::TagCycle(name.to_string()))
}

/// Sets `HEAD` to a symbolic reference naming `ref_path`.
pub fn set_head_symbolic(repo: &Repository, ref_path: &str) -> Result<()> {
    fs::write(
        repo.metadata_path(Path::new("HEAD")),
        format!("ref: {ref_path}\n"),
    )?;
    Ok(())
}
