//! Tree object encoding.
//!
//! A tree payload is a sequence of lines in `ls-tree` layout:
//!
//! ```text
//! 100644 blob <hash>\t<name>
//! 040000 tree <hash>\t<name>
//! ```
//!
//! Entries are sorted bytewise by name so that equal entry sets always
//! produce the same tree hash.

use crate::error::{Error, Result};
use crate::hash::Hash;
use std::fmt;

/// Entry type in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// A blob.
    Blob,
    /// A subtree.
    Tree,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Blob => "blob",
            EntryType::Tree => "tree",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(EntryType::Blob),
            "tree" => Ok(EntryType::Tree),
            _ => Err(Error::invalid_tree_entry(format!(
                "Invalid entry type: {}",
                s
            ))),
        }
    }

    /// The only mode an entry of this type is written with.
    pub fn mode(self) -> FileMode {
        match self {
            EntryType::Blob => file_modes::BLOB,
            EntryType::Tree => file_modes::TREE,
        }
    }
}

/// File mode of a tree entry.
pub type FileMode = u32;

/// Fixed entry modes. Generic tree tooling depends on these exact values.
pub mod file_modes {
    use super::FileMode;

    /// Blob entry, rendered as `100644`.
    pub const BLOB: FileMode = 0o100644;

    /// Tree entry, rendered as `040000`.
    pub const TREE: FileMode = 0o040000;
}

/// Render a mode the way tree listings show it (six octal digits).
pub fn format_mode(mode: FileMode) -> String {
    format!("{:06o}", mode)
}

/// Parse a six-digit octal mode string.
pub fn parse_mode(s: &str) -> Result<FileMode> {
    FileMode::from_str_radix(s, 8)
        .map_err(|_| Error::invalid_tree_entry(format!("Invalid mode: {}", s)))
}

/// An entry in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub entry_type: EntryType,
    pub mode: FileMode,
    pub hash: Hash,
    /// Name of the entry (UTF-8, a single path segment).
    pub name: String,
}

impl TreeEntry {
    /// Create a new tree entry.
    pub fn new(entry_type: EntryType, mode: FileMode, hash: Hash, name: String) -> Result<Self> {
        validate_name(&name)?;
        Ok(Self {
            entry_type,
            mode,
            hash,
            name,
        })
    }

    /// A blob entry with the fixed blob mode.
    pub fn blob(hash: Hash, name: impl Into<String>) -> Result<Self> {
        Self::new(EntryType::Blob, file_modes::BLOB, hash, name.into())
    }

    /// A tree entry with the fixed tree mode.
    pub fn tree(hash: Hash, name: impl Into<String>) -> Result<Self> {
        Self::new(EntryType::Tree, file_modes::TREE, hash, name.into())
    }

    /// Encode the entry as one listing line (without the newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}\t{}",
            format_mode(self.mode),
            self.entry_type.as_str(),
            self.hash,
            self.name
        )
    }

    /// Parse one listing line.
    pub fn from_line(line: &str) -> Result<Self> {
        let (mode, entry_type, hash, name) = split_line(line)?;
        Self::new(entry_type, mode, hash, name.to_string())
    }
}

impl fmt::Display for TreeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

impl PartialOrd for TreeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeEntry {
    /// Bytewise name order, then hash, for a canonical encoding.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name
            .as_bytes()
            .cmp(other.name.as_bytes())
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

/// A leaf entry produced by a recursive listing: like a `TreeEntry`, but
/// named by its slash-separated path relative to the listed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub entry_type: EntryType,
    pub mode: FileMode,
    pub hash: Hash,
    pub path: String,
}

impl ListedEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}\t{}",
            format_mode(self.mode),
            self.entry_type.as_str(),
            self.hash,
            self.path
        )
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_tree_entry("Name cannot be empty"));
    }

    if name.len() > 255 {
        return Err(Error::invalid_tree_entry(format!(
            "Name too long: {} bytes (max 255)",
            name.len()
        )));
    }

    if name == "." || name == ".." {
        return Err(Error::invalid_tree_entry(format!(
            "Name cannot be '{}'",
            name
        )));
    }

    if let Some(c) = name.chars().find(|c| matches!(c, '\0' | '/' | '\n' | '\t')) {
        return Err(Error::invalid_tree_entry(format!(
            "Name cannot contain {:?}",
            c
        )));
    }

    Ok(())
}

fn split_line(line: &str) -> Result<(FileMode, EntryType, Hash, &str)> {
    let (fields, name) = line
        .split_once('\t')
        .ok_or_else(|| Error::invalid_tree_entry(format!("Missing name field: {}", line)))?;

    let mut fields = fields.split_whitespace();
    let (Some(mode), Some(entry_type), Some(hash), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::invalid_tree_entry(format!(
            "Expected '<mode> <type> <hash>', got: {}",
            line
        )));
    };

    Ok((
        parse_mode(mode)?,
        EntryType::parse(entry_type)?,
        Hash::from_hex(hash)?,
        name,
    ))
}

/// Encode a list of tree entries (sorted by name).
pub fn encode_tree(mut entries: Vec<TreeEntry>) -> Vec<u8> {
    entries.sort();

    let mut buf = String::new();
    for entry in entries {
        buf.push_str(&entry.to_line());
        buf.push('\n');
    }
    buf.into_bytes()
}

/// Decode a list of tree entries from bytes.
///
/// Lines end at `\n` only; any other character, `\r` included, belongs to
/// the name.
pub fn decode_tree(data: &[u8]) -> Result<Vec<TreeEntry>> {
    std::str::from_utf8(data)?
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(TreeEntry::from_line)
        .collect()
}
