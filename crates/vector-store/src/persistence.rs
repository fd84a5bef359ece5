use crate::chunk_store::ChunkStore;
use crate::error::{Result, VectorStoreError};
use crate::layout::StoreLayout;
use crate::lock::{acquire_store_read_lock, acquire_store_write_lock};
use crate::types::Chunk;
use crate::vector_file;
use crate::vector_index::VectorIndex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

pub const STORE_FORMAT_VERSION: u32 = 1;

const LOAD_ATTEMPTS: usize = 3;

/// Chunk artifact. Renaming it into place is the commit point of a save: it names the vector
/// generation it pairs with, so a reader always sees one consistent (vectors, chunks) pair.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedChunks {
    format_version: u32,
    generation: u64,
    vectors_file: String,
    dimension: usize,
    count: usize,
    vectors_sha256: String,
    saved_at_unix_ms: u64,
    chunks: Vec<Chunk>,
}

/// The part of the chunk artifact a saver needs to pick the next generation
#[derive(Deserialize)]
struct CommitHeader {
    generation: u64,
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub generation: u64,
    pub count: usize,
    pub vectors_path: PathBuf,
    pub chunks_path: PathBuf,
}

/// Atomic save/load of a (vector index, chunk store) pair
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    layout: StoreLayout,
}

impl PersistenceManager {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Whether a committed store exists on disk
    #[must_use]
    pub fn exists(&self) -> bool {
        self.layout.chunks_path().exists()
    }

    /// Save both halves. The vector artifact is written under a fresh generation and synced
    /// before the chunk artifact is published, so a crash at any point leaves either the
    /// previous pair or the new pair loadable.
    pub async fn save(&self, index: &VectorIndex, chunks: &ChunkStore) -> Result<SaveReport> {
        if index.len() != chunks.len() {
            return Err(VectorStoreError::CountMismatch {
                chunks: chunks.len(),
                vectors: index.len(),
            });
        }

        let _lock = acquire_store_write_lock(&self.layout).await?;
        let staged = self.stage_vectors(index).await?;
        let report = staged.commit(chunks).await?;
        self.remove_stale_generations(report.generation).await;

        log::info!(
            "Saved store generation {} ({} chunks) to {}",
            report.generation,
            report.count,
            report.chunks_path.display()
        );
        Ok(report)
    }

    /// First half of a save: write and sync the vector artifact under the next generation.
    /// Nothing references it until [`StagedSave::commit`] publishes the chunk artifact.
    pub async fn stage_vectors(&self, index: &VectorIndex) -> Result<StagedSave<'_>> {
        tokio::fs::create_dir_all(self.layout.dir()).await?;

        let generation = self.next_generation().await?;
        let vectors_path = self.layout.vectors_path(generation);
        let bytes = vector_file::encode(index);
        let digest = vector_file::sha256_hex(&bytes);
        write_new_synced(&vectors_path, &bytes).await?;

        log::debug!(
            "Staged {} vectors as generation {generation} at {}",
            index.len(),
            vectors_path.display()
        );
        Ok(StagedSave {
            manager: self,
            generation,
            vectors_path,
            dimension: index.dimension().unwrap_or(0),
            count: index.len(),
            vectors_sha256: digest,
        })
    }

    /// Load the committed pair. `NotFound` when nothing was ever committed, `CorruptStore` when
    /// the artifacts are unreadable, malformed, or disagree with each other. Never writes.
    ///
    /// Holds the shared side of the store lock, so a concurrent save cannot retire the
    /// generation being read. Without a lock file the read is retried when the chunk
    /// artifact moved on underneath it.
    pub async fn load(&self) -> Result<(VectorIndex, ChunkStore)> {
        let _lock = acquire_store_read_lock(&self.layout).await?;
        for attempt in 1..LOAD_ATTEMPTS {
            if let Some(loaded) = self.load_committed().await? {
                return Ok(loaded);
            }
            log::debug!("Store generation replaced during load, retrying (attempt {attempt})");
        }
        match self.load_committed().await? {
            Some(loaded) => Ok(loaded),
            None => Err(VectorStoreError::corrupt(
                &self.layout.chunks_path(),
                "vector file keeps disappearing while saves run",
            )),
        }
    }

    /// One read of the committed pair. `None` when the vector artifact vanished because a
    /// newer commit replaced the chunk artifact after it was read.
    async fn load_committed(&self) -> Result<Option<(VectorIndex, ChunkStore)>> {
        let chunks_path = self.layout.chunks_path();
        let bytes = match tokio::fs::read(&chunks_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(VectorStoreError::NotFound(
                    self.layout.prefix().display().to_string(),
                ));
            }
            Err(err) => {
                return Err(VectorStoreError::corrupt(
                    &chunks_path,
                    format!("unreadable chunk file: {err}"),
                ));
            }
        };

        let persisted: PersistedChunks = serde_json::from_slice(&bytes).map_err(|err| {
            VectorStoreError::corrupt(&chunks_path, format!("malformed chunk file: {err}"))
        })?;
        if persisted.format_version != STORE_FORMAT_VERSION {
            return Err(VectorStoreError::corrupt(
                &chunks_path,
                format!(
                    "unsupported format_version {} (expected {STORE_FORMAT_VERSION})",
                    persisted.format_version
                ),
            ));
        }
        if self
            .layout
            .parse_vectors_generation(&persisted.vectors_file)
            != Some(persisted.generation)
        {
            return Err(VectorStoreError::corrupt(
                &chunks_path,
                format!(
                    "vectors_file '{}' does not match generation {}",
                    persisted.vectors_file, persisted.generation
                ),
            ));
        }

        let vectors_path = self.layout.dir().join(&persisted.vectors_file);
        let vector_bytes = match tokio::fs::read(&vectors_path).await {
            Ok(vector_bytes) => vector_bytes,
            Err(err)
                if err.kind() == std::io::ErrorKind::NotFound
                    && self.chunk_file_changed(&bytes).await =>
            {
                return Ok(None);
            }
            Err(err) => {
                return Err(VectorStoreError::corrupt(
                    &vectors_path,
                    format!("unreadable vector file: {err}"),
                ));
            }
        };
        if vector_file::sha256_hex(&vector_bytes) != persisted.vectors_sha256 {
            return Err(VectorStoreError::corrupt(
                &vectors_path,
                "vector file digest does not match the chunk file",
            ));
        }
        let index = vector_file::decode(&vector_bytes)
            .map_err(|reason| VectorStoreError::corrupt(&vectors_path, reason))?;

        if index.len() != persisted.count || index.dimension().unwrap_or(0) != persisted.dimension
        {
            return Err(VectorStoreError::corrupt(
                &vectors_path,
                format!(
                    "vector file holds {} x {}, chunk file expects {} x {}",
                    index.len(),
                    index.dimension().unwrap_or(0),
                    persisted.count,
                    persisted.dimension
                ),
            ));
        }
        if persisted.chunks.len() != index.len() {
            return Err(VectorStoreError::corrupt(
                &chunks_path,
                format!(
                    "index holds {} vectors but chunk store holds {} chunks",
                    index.len(),
                    persisted.chunks.len()
                ),
            ));
        }
        let chunks = ChunkStore::from_records(persisted.chunks)
            .map_err(|reason| VectorStoreError::corrupt(&chunks_path, reason))?;

        log::info!(
            "Loaded store generation {} ({} chunks, dim {})",
            persisted.generation,
            chunks.len(),
            persisted.dimension
        );
        Ok(Some((index, chunks)))
    }

    async fn chunk_file_changed(&self, seen: &[u8]) -> bool {
        match tokio::fs::read(self.layout.chunks_path()).await {
            Ok(current) => current != seen,
            Err(_) => false,
        }
    }

    /// One past the highest generation named by the committed header or present on disk.
    /// Stray vector files from an interrupted save are never reused.
    async fn next_generation(&self) -> Result<u64> {
        let committed = self.committed_generation().await?;
        let on_disk = self.generations_on_disk().await?;
        let highest = on_disk.last().copied().unwrap_or(0).max(committed);
        Ok(highest + 1)
    }

    /// Generation named by the current chunk artifact, 0 when nothing is committed
    async fn committed_generation(&self) -> Result<u64> {
        let chunks_path = self.layout.chunks_path();
        let bytes = match tokio::fs::read(&chunks_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice::<CommitHeader>(&bytes) {
            Ok(header) => Ok(header.generation),
            Err(err) => {
                log::warn!(
                    "Ignoring unreadable commit header in {}: {err}",
                    chunks_path.display()
                );
                Ok(0)
            }
        }
    }

    async fn generations_on_disk(&self) -> Result<Vec<u64>> {
        let layout = self.layout.clone();
        let generations = tokio::task::spawn_blocking(move || layout.vector_generations_on_disk())
            .await
            .map_err(|err| VectorStoreError::Other(format!("join generation scan: {err}")))??;
        Ok(generations)
    }

    async fn remove_stale_generations(&self, live: u64) {
        let generations = match self.generations_on_disk().await {
            Ok(generations) => generations,
            Err(err) => {
                log::warn!("Failed to list stale vector files: {err}");
                return;
            }
        };
        for generation in generations.into_iter().filter(|g| *g != live) {
            let path = self.layout.vectors_path(generation);
            if let Err(err) = tokio::fs::remove_file(&path).await {
                log::warn!("Failed to remove stale vector file {}: {err}", path.display());
            }
        }
    }
}

/// A vector artifact written to disk but not yet referenced by the chunk artifact
pub struct StagedSave<'a> {
    manager: &'a PersistenceManager,
    generation: u64,
    vectors_path: PathBuf,
    dimension: usize,
    count: usize,
    vectors_sha256: String,
}

impl StagedSave<'_> {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Second half of a save: publish the chunk artifact naming the staged generation
    pub async fn commit(self, chunks: &ChunkStore) -> Result<SaveReport> {
        if chunks.len() != self.count {
            return Err(VectorStoreError::CountMismatch {
                chunks: chunks.len(),
                vectors: self.count,
            });
        }

        let layout = self.manager.layout();
        let chunks_path = layout.chunks_path();
        let persisted = PersistedChunks {
            format_version: STORE_FORMAT_VERSION,
            generation: self.generation,
            vectors_file: layout.vectors_file_name(self.generation),
            dimension: self.dimension,
            count: self.count,
            vectors_sha256: self.vectors_sha256,
            saved_at_unix_ms: unix_now_ms(),
            chunks: chunks.as_slice().to_vec(),
        };
        let bytes = serde_json::to_vec(&persisted)?;

        let tmp = chunks_path.with_extension("json.tmp");
        write_synced(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &chunks_path).await?;
        sync_dir(&layout.dir()).await;

        Ok(SaveReport {
            generation: self.generation,
            count: self.count,
            vectors_path: self.vectors_path,
            chunks_path,
        })
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = tokio::fs::File::create(path).await?;
    fill_and_sync(file, bytes).await
}

/// Like [`write_synced`] but fails instead of replacing an existing file
async fn write_new_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                VectorStoreError::Other(format!(
                    "refusing to overwrite existing vector file {}",
                    path.display()
                ))
            } else {
                err.into()
            }
        })?;
    fill_and_sync(file, bytes).await
}

async fn fill_and_sync(mut file: tokio::fs::File, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Persist the directory entry of a rename. Best-effort: not every platform can open a
/// directory for syncing.
async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(handle) = tokio::fs::File::open(dir).await {
            if let Err(err) = handle.sync_all().await {
                log::debug!("Directory sync failed for {}: {err}", dir.display());
            }
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
