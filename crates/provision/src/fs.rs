//! File system utils.

use std::{
    future::Future,
    path::{Path, PathBuf},
    pin::Pin,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// What to do when a staged file already exists in the target directory.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the file already in the target.
    #[default]
    Preserve,
    /// Replace the target file with the staged one.
    Overwrite,
}

/// Counts of what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Entries renamed into the target (a whole directory counts once).
    pub moved: usize,
    /// Target files replaced by staged ones.
    pub overwritten: usize,
    /// Staged files dropped because the target already had them.
    pub preserved: usize,
}

/// Undo log for a merge in progress.
#[derive(Default)]
struct MergeJournal {
    /// (staged path, target path) of entries renamed into the target.
    moved: Vec<(PathBuf, PathBuf)>,
    /// (target path, backup path) of overwritten files.
    backups: Vec<(PathBuf, PathBuf)>,
}

pub struct FsHandler;

impl FsHandler {
    /// Create a directory and its parents if it doesn't exist.
    pub async fn ensure_dir(path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        tracing::trace!(path = %path.display(), "Directory ready");
        Ok(())
    }

    /// Write a generated file all-or-nothing.
    ///
    /// The content goes to a hidden sibling first and is renamed over `path`,
    /// so readers see either the previous file or the complete new one.
    pub async fn write_artifact(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
        let parent = path
            .parent()
            .with_context(|| format!("Artifact path has no parent: {}", path.display()))?;
        Self::ensure_dir(parent).await?;

        let tmp_path = Self::sibling(path, "tmp")?;

        if let Err(err) = tokio::fs::write(&tmp_path, contents).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err).with_context(|| format!("Failed to write {}", tmp_path.display()));
        }

        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to move artifact into place: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Artifact written");
        Ok(())
    }

    /// Move everything below `staging` into `target`, then remove `staging`.
    ///
    /// Entries missing from the target are renamed into place whole, directories
    /// present on both sides are merged recursively, and files present on both
    /// sides are resolved by `policy`. On error every change is undone and
    /// `staging` is left in place.
    pub async fn merge_staged(
        staging: &Path,
        target: &Path,
        policy: ConflictPolicy,
    ) -> Result<MergeSummary> {
        if !tokio::fs::try_exists(staging).await.unwrap_or(false) {
            anyhow::bail!("Staging directory does not exist: {}", staging.display());
        }
        Self::ensure_dir(target).await?;

        let mut journal = MergeJournal::default();
        let mut summary = MergeSummary::default();

        if let Err(err) =
            Self::merge_dir(staging, target, policy, &mut journal, &mut summary).await
        {
            Self::rollback(journal).await;
            return Err(err).context(format!(
                "Failed to merge {} into {}",
                staging.display(),
                target.display()
            ));
        }

        for (_, backup) in &journal.backups {
            let _ = tokio::fs::remove_file(backup).await;
        }

        tokio::fs::remove_dir_all(staging)
            .await
            .with_context(|| format!("Failed to remove staging directory {}", staging.display()))?;

        tracing::debug!(
            staging = %staging.display(),
            target = %target.display(),
            moved = summary.moved,
            overwritten = summary.overwritten,
            preserved = summary.preserved,
            "Staging merged"
        );

        Ok(summary)
    }

    /// Numeric owner of `path` as `uid:gid`, or `None` on platforms without one.
    pub async fn owner(path: &Path) -> Result<Option<String>> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        Ok(owner_of(&metadata))
    }

    fn merge_dir<'a>(
        staging: &'a Path,
        target: &'a Path,
        policy: ConflictPolicy,
        journal: &'a mut MergeJournal,
        summary: &'a mut MergeSummary,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(staging)
                .await
                .with_context(|| format!("Failed to read {}", staging.display()))?;

            let mut sources = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                sources.push(entry.path());
            }
            sources.sort();

            for source in sources {
                let Some(name) = source.file_name() else {
                    continue;
                };
                let dest = target.join(name);

                let source_meta = tokio::fs::symlink_metadata(&source)
                    .await
                    .with_context(|| format!("Failed to stat {}", source.display()))?;

                let dest_meta = match tokio::fs::symlink_metadata(&dest).await {
                    Ok(meta) => Some(meta),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("Failed to stat {}", dest.display()));
                    }
                };

                match dest_meta {
                    None => {
                        tokio::fs::rename(&source, &dest).await.with_context(|| {
                            format!("Failed to move {} to {}", source.display(), dest.display())
                        })?;
                        journal.moved.push((source, dest));
                        summary.moved += 1;
                    }
                    Some(dest_meta) if source_meta.is_dir() && dest_meta.is_dir() => {
                        Self::merge_dir(&source, &dest, policy, journal, summary).await?;
                    }
                    Some(dest_meta) if source_meta.is_dir() || dest_meta.is_dir() => {
                        anyhow::bail!(
                            "Cannot merge {}: file and directory conflict at {}",
                            source.display(),
                            dest.display()
                        );
                    }
                    Some(_) => match policy {
                        ConflictPolicy::Preserve => {
                            tracing::trace!(path = %dest.display(), "Keeping existing file");
                            summary.preserved += 1;
                        }
                        ConflictPolicy::Overwrite => {
                            let backup = Self::sibling(&dest, "backup")?;
                            tokio::fs::rename(&dest, &backup).await.with_context(|| {
                                format!("Failed to back up {}", dest.display())
                            })?;
                            journal.backups.push((dest.clone(), backup));

                            tokio::fs::rename(&source, &dest).await.with_context(|| {
                                format!("Failed to move {} to {}", source.display(), dest.display())
                            })?;
                            journal.moved.push((source, dest));
                            summary.overwritten += 1;
                        }
                    },
                }
            }

            Ok(())
        })
    }

    async fn rollback(journal: MergeJournal) {
        for (source, dest) in journal.moved.into_iter().rev() {
            if let Err(err) = tokio::fs::rename(&dest, &source).await {
                tracing::error!(error = %err, path = %dest.display(), "Failed to roll back merged entry");
            }
        }

        for (dest, backup) in journal.backups.into_iter().rev() {
            if let Err(err) = tokio::fs::rename(&backup, &dest).await {
                tracing::error!(error = %err, path = %dest.display(), "Failed to restore backup");
            }
        }
    }

    /// A hidden path next to `path`: `dir/.name.<suffix>`.
    fn sibling(path: &Path, suffix: &str) -> Result<PathBuf> {
        let name = path
            .file_name()
            .with_context(|| format!("Path has no file name: {}", path.display()))?;
        Ok(path.with_file_name(format!(".{}.{}", name.to_string_lossy(), suffix)))
    }
}

#[cfg(unix)]
fn owner_of(metadata: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::MetadataExt;
    Some(format!("{}:{}", metadata.uid(), metadata.gid()))
}

#[cfg(not(unix))]
fn owner_of(_metadata: &std::fs::Metadata) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    async fn write(path: &Path, contents: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, contents).await.unwrap();
    }

    async fn read(path: &Path) -> String {
        tokio::fs::read_to_string(path).await.unwrap()
    }

    #[tokio::test]
    async fn test_write_artifact_creates_parents() {
        let dir = TempDir::new("stackup-fs").unwrap();
        let path = dir.path().join("backend/docker/nginx.conf");

        FsHandler::write_artifact(&path, "events {}").await.unwrap();

        assert_eq!(read(&path).await, "events {}");
        assert!(!dir.path().join("backend/docker/.nginx.conf.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_artifact_overwrites() {
        let dir = TempDir::new("stackup-fs").unwrap();
        let path = dir.path().join(".env");

        FsHandler::write_artifact(&path, "A=1").await.unwrap();
        FsHandler::write_artifact(&path, "A=2").await.unwrap();

        assert_eq!(read(&path).await, "A=2");
    }

    #[tokio::test]
    async fn test_merge_preserves_existing_files() {
        let dir = TempDir::new("stackup-fs").unwrap();
        let target = dir.path().join("backend");
        let staging = target.join("scaffold-staging");

        write(&target.join(".env"), "DB_PASSWORD=secret").await;
        write(&target.join("Dockerfile"), "FROM php").await;
        write(&staging.join(".env"), "DB_CONNECTION=sqlite").await;
        write(&staging.join("composer.json"), "{}").await;
        write(&staging.join("app/Models/User.php"), "<?php").await;

        let summary = FsHandler::merge_staged(&staging, &target, ConflictPolicy::Preserve)
            .await
            .unwrap();

        assert_eq!(read(&target.join(".env")).await, "DB_PASSWORD=secret");
        assert_eq!(read(&target.join("composer.json")).await, "{}");
        assert_eq!(read(&target.join("app/Models/User.php")).await, "<?php");
        assert!(!staging.exists());
        assert_eq!(summary.preserved, 1);
        assert_eq!(summary.overwritten, 0);
        assert_eq!(summary.moved, 2);
    }

    #[tokio::test]
    async fn test_merge_overwrites_existing_files() {
        let dir = TempDir::new("stackup-fs").unwrap();
        let target = dir.path().join("frontend");
        let staging = dir.path().join("staging");

        write(&target.join("app/page.tsx"), "old").await;
        write(&target.join("app/keep.tsx"), "keep").await;
        write(&staging.join("app/page.tsx"), "new").await;

        let summary = FsHandler::merge_staged(&staging, &target, ConflictPolicy::Overwrite)
            .await
            .unwrap();

        assert_eq!(read(&target.join("app/page.tsx")).await, "new");
        assert_eq!(read(&target.join("app/keep.tsx")).await, "keep");
        assert!(!target.join("app/.page.tsx.backup").exists());
        assert_eq!(summary.overwritten, 1);
    }

    #[tokio::test]
    async fn test_merge_rolls_back_on_conflict() {
        let dir = TempDir::new("stackup-fs").unwrap();
        let target = dir.path().join("backend");
        let staging = dir.path().join("staging");

        write(&target.join("artisan"), "old").await;
        write(&target.join("storage"), "not a directory").await;
        write(&staging.join("artisan"), "new").await;
        write(&staging.join("composer.json"), "{}").await;
        write(&staging.join("storage/logs/.gitignore"), "*").await;

        let err = FsHandler::merge_staged(&staging, &target, ConflictPolicy::Overwrite)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("file and directory conflict"));
        assert_eq!(read(&target.join("artisan")).await, "old");
        assert!(!target.join("composer.json").exists());
        assert_eq!(read(&staging.join("artisan")).await, "new");
        assert_eq!(read(&staging.join("composer.json")).await, "{}");
    }

    #[tokio::test]
    async fn test_merge_requires_staging() {
        let dir = TempDir::new("stackup-fs").unwrap();
        let result = FsHandler::merge_staged(
            &dir.path().join("missing"),
            &dir.path().join("backend"),
            ConflictPolicy::Preserve,
        )
        .await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_owner_matches_metadata() {
        use std::os::unix::fs::MetadataExt;

        let dir = TempDir::new("stackup-fs").unwrap();
        let metadata = std::fs::metadata(dir.path()).unwrap();

        let owner = FsHandler::owner(dir.path()).await.unwrap();
        assert_eq!(owner, Some(format!("{}:{}", metadata.uid(), metadata.gid())));
        assert!(FsHandler::owner(&dir.path().join("missing")).await.is_err());
    }

    #[test]
    fn test_conflict_policy_parse() {
        assert_eq!("overwrite".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Overwrite);
        assert_eq!(ConflictPolicy::default().to_string(), "preserve");
    }
}
