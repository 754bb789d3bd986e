//! Mark-and-sweep collection of objects no ref can reach.
//!
//! Only tree entries are followed. Objects that are referenced solely from
//! inside a serialized record (a connector location inside a JSON blob) are
//! invisible here, which is why the object-reference tracker pins them from
//! dedicated refs.

use crate::error::Result;
use crate::hash::Hash;
use crate::store::Store;
use crate::tree::EntryType;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Outcome of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Objects deleted, or that would be on a dry run.
    pub objects_deleted: usize,
    pub bytes_freed: u64,
}

impl Store {
    /// Delete every object that is not reachable from the current value of
    /// some ref. A dry run only reports.
    pub fn gc(&self, dry_run: bool) -> Result<GcStats> {
        let live = self.mark_reachable()?;
        let mut stats = GcStats::default();

        for (hash, path) in self.stored_objects()? {
            if live.contains(&hash) {
                continue;
            }
            stats.bytes_freed += fs::metadata(&path)?.len();
            stats.objects_deleted += 1;
            if !dry_run {
                fs::remove_file(&path)?;
            }
        }
        if !dry_run {
            self.prune_empty_shards()?;
        }

        debug!(
            realm = self.realm(),
            live = live.len(),
            deleted = stats.objects_deleted,
            dry_run,
            "garbage collection finished"
        );
        Ok(stats)
    }

    /// Every stored object reachable from a ref through tree entries.
    pub fn mark_reachable(&self) -> Result<HashSet<Hash>> {
        let mut live = HashSet::new();
        let mut frontier: Vec<Hash> = self
            .refs()
            .list()?
            .into_iter()
            .map(|(_, hash)| hash)
            .collect();

        while let Some(hash) = frontier.pop() {
            // A ref may name an object that was never written
            if !self.contains(&hash) || !live.insert(hash) {
                continue;
            }
            if self.object_kind(&hash)? == EntryType::Tree {
                frontier.extend(self.get_tree(&hash)?.into_iter().map(|entry| entry.hash));
            }
        }

        Ok(live)
    }

    /// Object files paired with the location their path spells.
    fn stored_objects(&self) -> Result<Vec<(Hash, PathBuf)>> {
        let mut objects = Vec::new();
        for shard in fs::read_dir(self.objects_dir())? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            let shard_name = shard.file_name();

            for object in fs::read_dir(shard.path())? {
                let object = object?;
                let name = format!(
                    "{}{}",
                    shard_name.to_string_lossy(),
                    object.file_name().to_string_lossy()
                );
                // Staging files of interrupted writes are not locations
                if let Ok(hash) = Hash::from_hex(&name)
                    && object.file_type()?.is_file()
                {
                    objects.push((hash, object.path()));
                }
            }
        }
        Ok(objects)
    }

    fn prune_empty_shards(&self) -> Result<()> {
        for shard in fs::read_dir(self.objects_dir())? {
            let path = shard?.path();
            if path.is_dir() && fs::read_dir(&path)?.next().is_none() {
                fs::remove_dir(&path)?;
            }
        }
        Ok(())
    }
}
