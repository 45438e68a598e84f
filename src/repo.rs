//! The repository handle: path layout, discovery, bootstrap, and the one
//! config key the core contract names.
//!
//! Upward directory discovery, path helpers, the default `core` config
//! section, and the literal `.git` bootstrap layout all follow the classic
//! shape of a `Repository`/`find_repo`/`init_repo` trio.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

/// A handle to a repository's metadata directory (conventionally `.git`).
#[derive(Debug, Clone)]
pub struct Repository {
    metadata_dir: PathBuf,
    config: Config,
}

impl Repository {
    /// Wraps an already-known metadata directory directly, without upward
    /// discovery. Reads (but does not validate) its config, if any.
    pub fn at(metadata_dir: impl Into<PathBuf>) -> Result<Repository> {
        let metadata_dir = metadata_dir.into();
        let config = Config::read(&metadata_dir.join("config"))?;
        Ok(Repository {
            metadata_dir,
            config,
        })
    }

    /// Walks upward from `start_dir` looking for a subdirectory named
    /// `metadata_dir_name`. Fails with `Missing` if the filesystem root is
    /// reached without finding one.
    pub fn discover(start_dir: &Path, metadata_dir_name: &str) -> Result<Repository> {
        let mut current = start_dir
            .canonicalize()
            .unwrap_or_else(|_| start_dir.to_path_buf());

        loop {
            let candidate = current.join(metadata_dir_name);
            if candidate.is_dir() {
                tracing::debug!(path = %candidate.display(), "discovered repository");
                return Repository::at(candidate);
            }

            match current.parent() {
                Some(parent) if parent != current => current = parent.to_path_buf(),
                _ => {
                    return Err(Error::Missing(format!(
                        "no {metadata_dir_name:?} directory found above {}",
                        start_dir.display()
                    )))
                }
            }
        }
    }

    /// Bootstraps a new repository at `worktree_dir/metadata_dir_name`.
    ///
    /// The worktree directory is created if absent; if it already exists it
    /// must be empty. Writes `objects/`, `refs/`, `HEAD`, `description`, and
    /// a default `config`.
    pub fn init(worktree_dir: &Path, metadata_dir_name: &str) -> Result<Repository> {
        if worktree_dir.exists() {
            if !worktree_dir.is_dir() {
                return Err(Error::NotDirectory(worktree_dir.to_path_buf()));
            }
            if fs::read_dir(worktree_dir)?.next().is_some() {
                return Err(Error::NotEmpty(worktree_dir.to_path_buf()));
            }
        } else {
            fs::create_dir_all(worktree_dir)?;
        }

        let metadata_dir = worktree_dir.join(metadata_dir_name);
        fs::create_dir(&metadata_dir)?;
        fs::create_dir(metadata_dir.join("objects"))?;
        fs::create_dir_all(metadata_dir.join("refs").join("heads"))?;
        fs::create_dir_all(metadata_dir.join("refs").join("tags"))?;
        fs::write(
            metadata_dir.join("description"),
            "Unnamed repository; edit this file 'description' to name the repository.\n",
        )?;
        fs::write(metadata_dir.join("HEAD"), "ref: refs/heads/main\n")?;
        fs::write(metadata_dir.join("config"), Config::default_text())?;

        tracing::info!(path = %metadata_dir.display(), "initialized repository");
        Repository::at(metadata_dir)
    }

    /// The repository's metadata directory (e.g. the `.git` directory).
    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    /// Resolves a path relative to the metadata directory.
    pub fn metadata_path(&self, relative: &Path) -> PathBuf {
        self.metadata_dir.join(relative)
    }

    /// The repository's worktree: the metadata directory's parent.
    pub fn worktree_dir(&self) -> &Path {
        self.metadata_dir
            .parent()
            .expect("metadata directory always has a worktree parent")
    }

    /// Checks `core.repositoryformatversion`, the one config key the core
    /// contract names. Value `"0"` is accepted; anything else (including a
    /// missing key) fails with `UnsupportedVersion`.
    pub fn check_format_version(&self) -> Result<()> {
        match self.config.get("core", "repositoryformatversion") {
            Some("0") => Ok(()),
            Some(other) => Err(Error::UnsupportedVersion(other.to_string())),
            None => Err(Error::UnsupportedVersion("<unset>".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temp_dir::TempDir;

    #[test]
    fn init_lays_out_expected_files() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), ".git").unwrap();

        assert!(repo.metadata_path(Path::new("objects")).is_dir());
        assert!(repo.metadata_path(Path::new("refs/heads")).is_dir());
        assert!(repo.metadata_path(Path::new("HEAD")).is_file());
        assert_eq!(
            fs::read_to_string(repo.metadata_path(Path::new("HEAD"))).unwrap(),
            "ref: refs/heads/main\n"
        );
        repo.check_format_version().unwrap();
    }

    #[test]
    fn init_refuses_nonempty_worktree() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("existing.txt"), b"hi").unwrap();
        assert!(matches!(
            Repository::init(dir.path(), ".git"),
            Err(Error::NotEmpty(_))
        ));
    }

    #[test]
    fn discover_walks_up_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        Repository::init(dir.path(), ".git").unwrap();
        let nested = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        let repo = Repository::discover(&nested, ".git").unwrap();
        assert_eq!(
            repo.metadata_dir().canonicalize().unwrap(),
            dir.path().join(".git").canonicalize().unwrap()
        );
    }

    #[test]
    fn discover_fails_with_no_repository_in_ancestry() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("lonely");
        fs::create_dir_all(&nested).unwrap();
        assert!(matches!(
            Repository::discover(&nested, ".nonexistent-metadata-dir"),
            Err(Error::Missing(_))
        ));
    }

    #[test]
    fn rejects_unsupported_format_version() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path(), ".git").unwrap();
        fs::write(
            repo.metadata_path(Path::new("config")),
            "[core]\n\trepositoryformatversion = 1\n",
        )
        .unwrap();

        let reopened = Repository::at(repo.metadata_dir()).unwrap();
        assert!(matches!(
            reopened.check_format_version(),
            Err(Error::UnsupportedVersion(v)) if v == "1"
        ));
    }
}
