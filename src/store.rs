use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Suffixes for the two snapshot slots kept per tracked file.
const BACKUP_SUFFIX: &str = "bak";
const REDO_SUFFIX: &str = "redo";

/// Default central root directory name, created under the user's home.
pub const DEFAULT_ROOT_DIR_NAME: &str = ".snippatch-backups";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot resolve backup paths for {path}: {reason}")]
    PathResolution { path: PathBuf, reason: String },

    #[error("snapshot failed for {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("restore failed for {path}: {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no backup or redo snapshot exists for {path}; nothing to undo")]
    NothingToUndo { path: PathBuf },

    #[error("no redo snapshot exists for {path}; nothing to redo")]
    NothingToRedo { path: PathBuf },
}

/// Which snapshot slot a restore should read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Backup,
    Redo,
}

/// Central backup/redo store.
///
/// Every tracked file gets at most one `.bak` and one `.redo` snapshot,
/// stored under a root directory outside the project tree by mirroring the
/// file's absolute path. Slot paths are recomputed deterministically from
/// the original path on every call, never cached in a side index, so the
/// layout survives process restarts.
///
/// Slot lifecycle per file: `NoHistory -> HasRedoOnly -> HasBackupAndRedo`.
/// Each [`VersionStore::snapshot`] rotates the existing redo into the backup
/// slot and copies the current on-disk content into the redo slot, so the
/// redo always holds the most recent known-good state and the backup the
/// second most recent.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
}

/// Resolved slot paths for one tracked file.
#[derive(Debug, Clone)]
pub struct SlotPaths {
    pub backup: PathBuf,
    pub redo: PathBuf,
}

impl VersionStore {
    /// Create a store rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store under the default location in the user's home
    /// directory.
    pub fn in_home() -> Result<Self, StoreError> {
        let home = home::home_dir().ok_or_else(|| StoreError::PathResolution {
            path: PathBuf::from(DEFAULT_ROOT_DIR_NAME),
            reason: "could not determine home directory".to_string(),
        })?;
        Ok(Self::new(home.join(DEFAULT_ROOT_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an original file path to its mirrored `.bak`/`.redo` slot paths,
    /// creating intermediate directories.
    ///
    /// The path is made absolute first; drive/volume prefixes are sanitized
    /// into plain path segments (`C:` becomes `C`) so the mirror works on
    /// every platform.
    pub fn slot_paths(&self, original: &Path) -> Result<SlotPaths, StoreError> {
        let absolute = if original.is_absolute() {
            original.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| StoreError::PathResolution {
                    path: original.to_path_buf(),
                    reason: e.to_string(),
                })?
                .join(original)
        };

        let mut mirrored = self.root.clone();
        for component in absolute.components() {
            match component {
                Component::Prefix(prefix) => {
                    let segment: String = prefix
                        .as_os_str()
                        .to_string_lossy()
                        .chars()
                        .filter(|c| *c != ':' && *c != '\\' && *c != '/')
                        .collect();
                    if !segment.is_empty() {
                        mirrored.push(segment);
                    }
                }
                Component::RootDir => {}
                Component::CurDir => {}
                Component::ParentDir => {
                    mirrored.pop();
                }
                Component::Normal(part) => mirrored.push(part),
            }
        }

        let parent = mirrored
            .parent()
            .ok_or_else(|| StoreError::PathResolution {
                path: original.to_path_buf(),
                reason: "mirrored path has no parent".to_string(),
            })?
            .to_path_buf();
        fs::create_dir_all(&parent).map_err(|e| StoreError::PathResolution {
            path: original.to_path_buf(),
            reason: format!("cannot create {}: {e}", parent.display()),
        })?;

        Ok(SlotPaths {
            backup: with_appended_extension(&mirrored, BACKUP_SUFFIX),
            redo: with_appended_extension(&mirrored, REDO_SUFFIX),
        })
    }

    /// Snapshot the current on-disk state of `original` before a
    /// destructive write.
    ///
    /// If the file does not exist this is a no-op, except that a stale redo
    /// slot is cleared (there is no base state to redo back to). Otherwise
    /// an existing redo is rotated into the backup slot and the current
    /// content is copied into the redo slot, byte for byte.
    pub fn snapshot(&self, original: &Path) -> Result<(), StoreError> {
        let slots = self.slot_paths(original)?;
        let wrap = |source: std::io::Error| StoreError::Backup {
            path: original.to_path_buf(),
            source,
        };

        if !original.exists() {
            if slots.redo.exists() {
                fs::remove_file(&slots.redo).map_err(wrap)?;
            }
            return Ok(());
        }

        // Rotate: previous redo becomes the backup.
        if slots.redo.exists() {
            if slots.backup.exists() {
                fs::remove_file(&slots.backup).map_err(wrap)?;
            }
            fs::rename(&slots.redo, &slots.backup).map_err(wrap)?;
        }

        fs::copy(original, &slots.redo).map_err(wrap)?;
        Ok(())
    }

    /// Restore `target` from the given slot. The restore itself is
    /// undoable: the pre-restore state ends up in a slot as described on
    /// [`VersionStore::undo`] and [`VersionStore::redo`].
    pub fn restore(&self, target: &Path, slot: Slot) -> Result<(), StoreError> {
        match slot {
            Slot::Backup => self.undo(target),
            Slot::Redo => self.redo(target),
        }
    }

    /// Restore `target` to its previous known-good state.
    ///
    /// Runs a snapshot first: the rotation moves the most recent known-good
    /// state into the backup slot and saves the current content into the
    /// redo slot, then the backup is copied onto the target.
    pub fn undo(&self, target: &Path) -> Result<(), StoreError> {
        let slots = self.slot_paths(target)?;
        if !slots.backup.exists() && !slots.redo.exists() {
            return Err(StoreError::NothingToUndo {
                path: target.to_path_buf(),
            });
        }

        self.snapshot(target)?;

        // Re-resolve: the rotation may have just created the backup slot.
        let slots = self.slot_paths(target)?;
        if !slots.backup.exists() {
            return Err(StoreError::NothingToUndo {
                path: target.to_path_buf(),
            });
        }

        fs::copy(&slots.backup, target).map_err(|source| StoreError::Restore {
            path: target.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Restore `target` from the redo slot.
    ///
    /// The current content is saved into the backup slot first so the redo
    /// can itself be undone. The redo file is kept; the next snapshot
    /// rotates it naturally.
    pub fn redo(&self, target: &Path) -> Result<(), StoreError> {
        let slots = self.slot_paths(target)?;
        if !slots.redo.exists() {
            return Err(StoreError::NothingToRedo {
                path: target.to_path_buf(),
            });
        }

        let wrap = |source: std::io::Error| StoreError::Restore {
            path: target.to_path_buf(),
            source,
        };

        if target.exists() {
            fs::copy(target, &slots.backup).map_err(wrap)?;
        }
        fs::copy(&slots.redo, target).map_err(wrap)?;
        Ok(())
    }

}

fn with_appended_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
