//! Filesystem document source.
//!
//! Walks the configured root recursively, keeps files whose extension is on
//! the allow-list and whose relative path matches none of the exclude
//! globs, and extracts each into a [`DocumentRecord`]. Output is sorted by
//! path so repeated scans see documents in the same order.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use noterag_core::ids::document_id;
use noterag_core::models::{DocumentRecord, FileStats};
use noterag_core::source::DocumentSource;
use noterag_core::RagError;

use crate::config::SourceConfig;
use crate::extract::extract_text;

/// A [`DocumentSource`] over a local directory tree.
#[derive(Clone)]
pub struct FsDocumentSource {
    root: PathBuf,
    extensions: Vec<String>,
    excludes: GlobSet,
}

/// A candidate file found by the walk, before extraction.
struct FoundFile {
    path: PathBuf,
    file_type: String,
    size_bytes: u64,
    modified: DateTime<Utc>,
}

impl FsDocumentSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            root: config.root.clone(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            excludes: build_globset(&config.exclude_globs)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self) -> Result<Vec<FoundFile>> {
        if !self.root.is_dir() {
            bail!(RagError::Configuration(format!(
                "document root is not a directory: {}",
                self.root.display()
            )));
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if self.excludes.is_match(relative) {
                continue;
            }

            let Some(file_type) = file_type_of(path) else {
                continue;
            };
            if !self.extensions.contains(&file_type) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping file without metadata");
                    continue;
                }
            };
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));

            found.push(FoundFile {
                path: path.to_path_buf(),
                file_type,
                size_bytes: metadata.len(),
                modified,
            });
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    fn load(&self, file: &FoundFile) -> Result<Option<DocumentRecord>> {
        let bytes = std::fs::read(&file.path).map_err(|e| RagError::Extraction {
            path: file.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let text =
            extract_text(&file.path, &bytes, &file.file_type).map_err(|e| RagError::Extraction {
                path: file.path.display().to_string(),
                reason: e.to_string(),
            })?;

        let content = text.trim();
        if content.is_empty() {
            tracing::warn!(path = %file.path.display(), "file has no text content, skipping");
            return Ok(None);
        }

        let source_path = file.path.to_string_lossy().to_string();
        let title = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Some(DocumentRecord {
            id: document_id(&source_path),
            title,
            content: content.to_string(),
            last_modified: file.modified,
            source_path,
            file_type: file.file_type.clone(),
            size_bytes: file.size_bytes,
        }))
    }

    /// Synchronous scan used by [`DocumentSource::list_all`].
    pub fn scan(&self) -> Result<Vec<DocumentRecord>> {
        let mut documents = Vec::new();
        for file in self.walk()? {
            match self.load(&file) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "failed to extract file, skipping");
                }
            }
        }
        tracing::info!(root = %self.root.display(), documents = documents.len(), "scanned document root");
        Ok(documents)
    }

    /// Synchronous counterpart of [`DocumentSource::stats`].
    pub fn file_stats(&self) -> Result<FileStats> {
        let mut stats = FileStats::default();
        for file in self.walk()? {
            stats.file_count += 1;
            stats.total_bytes += file.size_bytes;
            *stats.type_counts.entry(file.file_type).or_insert(0) += 1;
            if stats
                .most_recent_modification
                .map_or(true, |latest| file.modified > latest)
            {
                stats.most_recent_modification = Some(file.modified);
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.scan())
            .await
            .context("document scan task failed")?
    }

    async fn stats(&self) -> Result<FileStats> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.file_stats())
            .await
            .context("file stats task failed")?
    }

    async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            tokio::fs::create_dir_all(&self.root)
                .await
                .with_context(|| format!("Failed to create document root: {}", self.root.display()))?;
            tracing::info!(root = %self.root.display(), "created document root");
        }
        Ok(())
    }
}

fn file_type_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
