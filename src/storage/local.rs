//! Local filesystem output with all-or-nothing replacement.
//!
//! Every run is a full resync. Files are written into a staging location
//! next to the live output and swapped in on [`commit`](StagedDir::commit).
//! Dropping an uncommitted stage removes it, leaving the live output as the
//! previous run left it.
//!
//! ## Layout
//!
//! ```text
//! {data}/
//! ├── .events.staging/      # while a run is in progress
//! └── events/               # live output
//! {assets}/
//! ├── .images-events.staging/
//! └── images/
//!     ├── events-*.*        # owned by the events export
//!     └── ministry-*.*      # owned by the ministries export
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// A directory whose entire contents are replaced on commit.
#[derive(Debug)]
pub struct StagedDir {
    target: PathBuf,
    staging: PathBuf,
    committed: bool,
}

impl StagedDir {
    /// Start staging a replacement for `target`.
    pub async fn create(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let staging = sibling(&target, "", ".staging")?;
        fresh_dir(&staging).await?;

        Ok(Self {
            target,
            staging,
            committed: false,
        })
    }

    /// Directory files are staged in.
    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Write bytes atomically (write to temp, then rename).
    pub async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.staging.join(name), bytes).await
    }

    /// Write a value as pretty-printed JSON.
    pub async fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(name, &bytes).await
    }

    /// Replace `target` with the staged contents.
    pub async fn commit(mut self) -> Result<PathBuf> {
        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        remove_dir_if_exists(&self.target).await?;
        tokio::fs::rename(&self.staging, &self.target).await?;
        self.committed = true;

        log::info!("Committed {}", self.target.display());
        Ok(self.target.clone())
    }
}

impl Drop for StagedDir {
    fn drop(&mut self) {
        if !self.committed {
            discard(&self.staging);
        }
    }
}

/// Files in a shared images directory owned by one `<prefix>-` namespace.
///
/// On commit, every existing `<prefix>-*` file in the images directory is
/// removed and the staged files are moved in. Files of other prefixes are
/// never touched.
#[derive(Debug)]
pub struct StagedAssets {
    images_dir: PathBuf,
    staging: PathBuf,
    prefix: String,
    committed: bool,
}

impl StagedAssets {
    pub async fn create(images_dir: impl Into<PathBuf>, prefix: &str) -> Result<Self> {
        let images_dir = images_dir.into();
        let staging = sibling(&images_dir, &format!("-{}", prefix), ".staging")?;
        fresh_dir(&staging).await?;

        Ok(Self {
            images_dir,
            staging,
            prefix: prefix.to_string(),
            committed: false,
        })
    }

    /// Directory images are staged in.
    pub fn path(&self) -> &Path {
        &self.staging
    }

    fn owns(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Swap this prefix's images for the staged ones.
    pub async fn commit(mut self) -> Result<usize> {
        tokio::fs::create_dir_all(&self.images_dir).await?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.images_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if self.owns(&name.to_string_lossy()) && entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        let mut moved = 0;
        let mut staged = tokio::fs::read_dir(&self.staging).await?;
        while let Some(entry) = staged.next_entry().await? {
            tokio::fs::rename(entry.path(), self.images_dir.join(entry.file_name())).await?;
            moved += 1;
        }

        tokio::fs::remove_dir(&self.staging).await?;
        self.committed = true;

        log::info!(
            "Committed {} {}-* image(s) to {} ({} replaced)",
            moved,
            self.prefix,
            self.images_dir.display(),
            removed
        );
        Ok(moved)
    }
}

impl Drop for StagedAssets {
    fn drop(&mut self) {
        if !self.committed {
            discard(&self.staging);
        }
    }
}

/// `<parent>/.<name><infix><suffix>` for a path `<parent>/<name>`.
fn sibling(path: &Path, infix: &str, suffix: &str) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| AppError::config(format!("{} has no directory name", path.display())))?;
    Ok(path.with_file_name(format!(".{}{}{}", name.to_string_lossy(), infix, suffix)))
}

/// Create an empty directory, clearing leftovers from an interrupted run.
async fn fresh_dir(path: &Path) -> Result<()> {
    remove_dir_if_exists(path).await?;
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::Io(e)),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn discard(staging: &Path) {
    match std::fs::remove_dir_all(staging) {
        Ok(()) => log::warn!("Discarded uncommitted output {}", staging.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::error!("Failed to discard {}: {}", staging.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_commit_replaces_previous_output() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("events");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("stale.json"), "{}").unwrap();

        let staged = StagedDir::create(&target).await.unwrap();
        staged.write_json("1.json", &json!({ "id": "1" })).await.unwrap();
        staged.commit().await.unwrap();

        assert!(!target.join("stale.json").exists());
        let written = std::fs::read_to_string(target.join("1.json")).unwrap();
        assert_eq!(written, "{\n  \"id\": \"1\"\n}");
        assert!(!root.path().join(".events.staging").exists());
    }

    #[tokio::test]
    async fn test_drop_without_commit_keeps_live_output() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("events");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("old.json"), "{}").unwrap();

        {
            let staged = StagedDir::create(&target).await.unwrap();
            staged.write_bytes("new.json", b"{}").await.unwrap();
        }

        assert!(target.join("old.json").exists());
        assert!(!target.join("new.json").exists());
        assert!(!root.path().join(".events.staging").exists());
    }

    #[tokio::test]
    async fn test_assets_only_replace_own_prefix() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        std::fs::write(images.join("events-old.jpg"), "old").unwrap();
        std::fs::write(images.join("ministry-youth-1.jpg"), "keep").unwrap();
        std::fs::write(images.join("eventsful.png"), "keep").unwrap();

        let staged = StagedAssets::create(&images, "events").await.unwrap();
        std::fs::write(staged.path().join("events-new.png"), "new").unwrap();
        let moved = staged.commit().await.unwrap();

        assert_eq!(moved, 1);
        assert!(!images.join("events-old.jpg").exists());
        assert!(images.join("events-new.png").exists());
        assert!(images.join("ministry-youth-1.jpg").exists());
        assert!(images.join("eventsful.png").exists());
    }

    #[tokio::test]
    async fn test_interrupted_staging_is_cleared() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("ministries");
        let leftover = root.path().join(".ministries.staging");
        std::fs::create_dir_all(&leftover).unwrap();
        std::fs::write(leftover.join("junk.md"), "x").unwrap();

        let staged = StagedDir::create(&target).await.unwrap();
        assert!(!staged.path().join("junk.md").exists());
    }
}
