//! Named references: the only mutable pointers in a realm.
//!
//! A ref is stored at `refs/<name>` as an append-only list of hashes, one per
//! line. The last valid line is the current value, so an interrupted write
//! leaves the previous value in place.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::store::Store;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\\', '\0'];

/// Manages named references (GC roots) in the store.
pub struct RefManager<'a> {
    store: &'a Store,
}

impl<'a> RefManager<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    fn refs_dir(&self) -> PathBuf {
        self.store.root().join("refs")
    }

    /// Get the path to a reference file.
    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        validate_ref_name(name)?;
        Ok(self.refs_dir().join(name))
    }

    /// Point `name` at `hash`, creating the ref if needed.
    pub fn update(&self, name: &str, hash: &Hash) -> Result<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(format!("{}\n", hash.to_hex()).as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Get the current value of a reference, `None` if it does not exist.
    pub fn get(&self, name: &str) -> Result<Option<Hash>> {
        let path = self.ref_path(name)?;

        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let current = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| Hash::from_hex(line).ok())
            .last();

        Ok(current)
    }

    /// List all references as `(name, hash)` pairs, sorted by name.
    pub fn list(&self) -> Result<Vec<(String, Hash)>> {
        let refs_dir = self.refs_dir();
        let mut names = Vec::new();
        if refs_dir.exists() {
            collect_ref_names(&refs_dir, &refs_dir, &mut names)?;
        }

        let mut refs = Vec::new();
        for name in names {
            if let Some(hash) = self.get(&name)? {
                refs.push((name, hash));
            }
        }

        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }
}

/// Validate a slash-separated ref name such as
/// `refs/datalad/object-references/metadata`.
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_ref("Ref name cannot be empty"));
    }

    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(Error::invalid_ref(format!(
            "Invalid ref name: {} (contains {:?})",
            name, c
        )));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(Error::invalid_ref(format!(
                "Invalid ref name: {} (empty path component)",
                name
            )));
        }
        if component.starts_with('.') {
            return Err(Error::invalid_ref(format!(
                "Invalid ref name: {} (component starts with '.')",
                name
            )));
        }
    }

    Ok(())
}

fn collect_ref_names(base: &Path, dir: &Path, names: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_ref_names(base, &path, names)?;
        } else if path.is_file()
            && let Ok(relative) = path.strip_prefix(base)
        {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Skip stray files (e.g. editor backups) that are not valid names
            if validate_ref_name(&name).is_ok() {
                names.push(name);
            }
        }
    }
    Ok(())
}
