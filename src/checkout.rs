//! Materializing a tree onto the filesystem: a recursive walk writing blobs
//! as files and trees as subdirectories. `120000` entries become real
//! symlinks built from the blob body; `160000` (gitlink) entries are
//! skipped with a warning rather than attempted as a nested checkout.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::repo::Repository;
use crate::store;
use crate::tree::Mode;

/// Checks out the tree at `tree_id` into `destination`, which must not
/// already exist or must be an empty directory.
pub fn checkout_tree(repo: &Repository, tree_id: &ObjectId, destination: &Path) -> Result<()> {
    if destination.exists() {
        if !destination.is_dir() {
            return Err(Error::NotDirectory(destination.to_path_buf()));
        }
        if fs::read_dir(destination)?.next().is_some() {
            return Err(Error::NotEmpty(destination.to_path_buf()));
        }
    } else {
        fs::create_dir_all(destination)?;
    }

    checkout_into(repo, tree_id, destination)
}

fn checkout_into(repo: &Repository, tree_id: &ObjectId, destination: &Path) -> Result<()> {
    let tree = store::read_object(repo, tree_id)?;
    let tree = tree.as_tree(tree_id)?;

    for entry in &tree.entries {
        let target = destination.join(safe_relative_path(&entry.path)?);
        match entry.mode {
            Mode::Tree => {
                fs::create_dir_all(&target)?;
                checkout_into(repo, &entry.id, &target)?;
            }
            Mode::Regular | Mode::Executable => {
                let obj = store::read_object(repo, &entry.id)?;
                fs::write(&target, obj.as_blob(&entry.id)?)?;
                set_executable(&target, entry.mode == Mode::Executable)?;
            }
            Mode::Symlink => {
                let obj = store::read_object(repo, &entry.id)?;
                let link_target = obj.as_blob(&entry.id)?;
                let link_target = std::str::from_utf8(link_target)
                    .map_err(|_| Error::MalformedCannotParse(entry.id.to_string()))?;
                write_symlink(link_target, &target)?;
            }
            Mode::Gitlink => {
                tracing::warn!(
                    path = %target.display(),
                    object = %entry.id,
                    "skipping gitlink entry during checkout",
                );
            }
        }
    }

    Ok(())
}

/// Rejects a tree entry path that isn't a single plain path segment. A tree
/// entry names one child of its directory, never a nested path, so this
/// also closes off `..`/absolute escapes and multi-segment paths that could
/// walk back out through a symlink entry checked out earlier in the tree.
fn safe_relative_path(path: &str) -> Result<&Path> {
    use std::path::Component;

    let candidate = Path::new(path);
    let mut components = candidate.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(candidate),
        _ => Err(Error::InvalidArgument(format!(
            "tree entry path is not a single path segment: {path:?}"
        ))),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path, executable: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    let mode = if executable { 0o755 } else { 0o644 };
    perms.set_mode(mode);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path, _executable: bool) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &str, link_path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link_path)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(target: &str, link_path: &Path) -> Result<()> {
    fs::write(link_path, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{self, Kind};
    use crate::store::TypedObject;
    use crate::tree::{Tree, TreeEntry};
    use temp_dir::TempDir;

    fn test_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), ".git").unwrap();
        (dir, repo)
    }

    #[test]
    fn checks_out_nested_tree_with_blob_and_subdirectory() {
        let (dir, repo) = test_repo();
        let blob_id = object::store(&repo, Kind::Blob, b"hello").unwrap();

        let inner = Tree {
            entries: vec![TreeEntry {
                mode: Mode::Regular,
                path: "nested.txt".to_string(),
                id: blob_id.clone(),
            }],
        };
        let inner_id =
            store::write_object(&repo, &TypedObject::Tree(inner)).unwrap();

        let outer = Tree {
            entries: vec![
                TreeEntry {
                    mode: Mode::Regular,
                    path: "top.txt".to_string(),
                    id: blob_id,
                },
                TreeEntry {
                    mode: Mode::Tree,
                    path: "subdir".to_string(),
                    id: inner_id,
                },
            ],
        };
        let outer_id = store::write_object(&repo, &TypedObject::Tree(outer)).unwrap();

        let destination = dir.path().join("checkout");
        checkout_tree(&repo, &outer_id, &destination).unwrap();

        assert_eq!(
            fs::read_to_string(destination.join("top.txt")).unwrap(),
            "hello"
        );
        assert_eq!(
            fs::read_to_string(destination.join("subdir").join("nested.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn refuses_nonempty_destination() {
        let (dir, repo) = test_repo();
        let tree_id = object::store(&repo, Kind::Tree, b"").unwrap();
        let destination = dir.path().join("occupied");
        fs::create_dir_all(&destination).unwrap();
        fs::write(destination.join("already-here.txt"), b"x").unwrap();

        assert!(matches!(
            checkout_tree(&repo, &tree_id, &destination),
            Err(Error::NotEmpty(_))
        ));
    }

    #[test]
    fn gitlink_entries_are_skipped_without_failing() {
        let (dir, repo) = test_repo();
        let tree = Tree {
            entries: vec![TreeEntry {
                mode: Mode::Gitlink,
                path: "vendored".to_string(),
                id: ObjectId::from_raw20(&[0x42; 20]),
            }],
        };
        let tree_id = store::write_object(&repo, &TypedObject::Tree(tree)).unwrap();
        let destination = dir.path().join("checkout");

        checkout_tree(&repo, &tree_id, &destination).unwrap();
        assert!(!destination.join("vendored").exists());
    }

    #[test]
    fn rejects_a_tree_entry_that_escapes_the_destination() {
        let (dir, repo) = test_repo();
        let blob_id = object::store(&repo, Kind::Blob, b"payload").unwrap();
        let tree = Tree {
            entries: vec![TreeEntry {
                mode: Mode::Regular,
                path: "../escaped.txt".to_string(),
                id: blob_id,
            }],
        };
        let tree_id = store::write_object(&repo, &TypedObject::Tree(tree)).unwrap();
        let destination = dir.path().join("checkout");

        assert!(matches!(
            checkout_tree(&repo, &tree_id, &destination),
            Err(Error::InvalidArgument(_))
        ));
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn rejects_a_multi_segment_entry_path() {
        let (dir, repo) = test_repo();
        let blob_id = object::store(&repo, Kind::Blob, b"payload").unwrap();
        let tree = Tree {
            entries: vec![TreeEntry {
                mode: Mode::Regular,
                path: "link/evil.txt".to_string(),
                id: blob_id,
            }],
        };
        let tree_id = store::write_object(&repo, &TypedObject::Tree(tree)).unwrap();
        let destination = dir.path().join("checkout");

        assert!(matches!(
            checkout_tree(&repo, &tree_id, &destination),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn symlink_entries_become_real_symlinks() {
        let (dir, repo) = test_repo();
        let link_target_blob = object::store(&repo, Kind::Blob, b"../target.txt").unwrap();
        let tree = Tree {
            entries: vec![TreeEntry {
                mode: Mode::Symlink,
                path: "link".to_string(),
                id: link_target_blob,
            }],
        };
        let tree_id = store::write_object(&repo, &TypedObject::Tree(tree)).unwrap();
        let destination = dir.path().join("checkout");

        checkout_tree(&repo, &tree_id, &destination).unwrap();
        let link_path = destination.join("link");
        assert_eq!(
            fs::read_link(&link_path).unwrap(),
            Path::new("../target.txt")
        );
    }
}
