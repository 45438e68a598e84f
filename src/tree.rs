//! The tree object codec: mode/path/hash triples separated by a space and
//! a NUL, with a five-way mode classification (regular, executable,
//! symlink, tree, gitlink).

use crate::error::{Error, Result};
use crate::hash::ObjectId;

/// The file mode of a tree entry, as the four values the ecosystem actually
/// writes: regular, executable, symlink, tree, gitlink.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// A regular, non-executable file: `100644`.
    Regular,
    /// An executable file: `100755`.
    Executable,
    /// A symbolic link, body holds the link target: `120000`.
    Symlink,
    /// A nested tree: `40000`.
    Tree,
    /// A commit reference into another repository: `160000`.
    Gitlink,
}

impl Mode {
    /// The exact octal ASCII form stored in a tree entry.
    pub fn as_octal_str(self) -> &'static str {
        match self {
            Mode::Regular => "100644",
            Mode::Executable => "100755",
            Mode::Symlink => "120000",
            Mode::Tree => "40000",
            Mode::Gitlink => "160000",
        }
    }

    /// Parses one of the five recognized octal mode strings.
    pub fn parse(s: &str) -> Result<Mode> {
        match s {
            "100644" => Ok(Mode::Regular),
            "100755" => Ok(Mode::Executable),
            "120000" => Ok(Mode::Symlink),
            "40000" | "040000" => Ok(Mode::Tree),
            "160000" => Ok(Mode::Gitlink),
            other => Err(Error::InvalidArgument(format!(
                "{other:?} is not a recognized tree entry mode"
            ))),
        }
    }
}

/// One entry of a tree object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeEntry {
    /// The entry's mode.
    pub mode: Mode,
    /// The entry's path component (a single segment, not a full path).
    pub path: String,
    /// The id of the blob, tree, or commit this entry names.
    pub id: ObjectId,
}

/// A tree object: an ordered list of entries.
///
/// Order is preserved exactly as encountered; this crate does not impose
/// git's canonical sort order on entries it has not itself constructed.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Tree {
    /// This tree's entries, in encoded order.
    pub entries: Vec<TreeEntry>,
}

/// Parses a tree body: repeated `<mode> SP <path> NUL <20-byte-hash>`.
pub fn parse(data: &[u8]) -> Result<Tree> {
    let mut entries = Vec::new();
    let mut cursor = 0usize;

    while cursor < data.len() {
        let space = data[cursor..]
            .iter()
            .position(|&b| b == b' ')
            .map(|p| p + cursor)
            .ok_or_else(|| Error::MalformedCannotParse("<tree>".to_string()))?;
        let mode_str = std::str::from_utf8(&data[cursor..space])
            .map_err(|_| Error::MalformedCannotParse("<tree>".to_string()))?;
        let mode = Mode::parse(mode_str)?;

        let nul = data[space..]
            .iter()
            .position(|&b| b == 0)
            .map(|p| p + space)
            .ok_or_else(|| Error::MalformedCannotParse("<tree>".to_string()))?;
        let path = std::str::from_utf8(&data[space + 1..nul])
            .map_err(|_| Error::MalformedCannotParse("<tree>".to_string()))?
            .to_string();

        let hash_start = nul + 1;
        let hash_end = hash_start + 20;
        if hash_end > data.len() {
            return Err(Error::MalformedBadLength("<tree>".to_string()));
        }
        let raw: [u8; 20] = data[hash_start..hash_end]
            .try_into()
            .expect("slice length checked above");
        let id = ObjectId::from_raw20(&raw);

        entries.push(TreeEntry { mode, path, id });
        cursor = hash_end;
    }

    Ok(Tree { entries })
}

/// Emits a tree back to its binary body form.
pub fn emit(tree: &Tree) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in &tree.entries {
        out.extend_from_slice(entry.mode.as_octal_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.path.as_bytes());
        out.push(0);
        out.extend_from_slice(&entry.id.to_raw20());
    }
    out
}
