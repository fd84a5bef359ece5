use crate::error::{Result, VectorStoreError};
use crate::layout::StoreLayout;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::time::Instant;

/// Advisory lock on `<prefix>.lock`, released on drop. Savers hold it exclusively, loaders
/// share it, so a load never observes a save halfway through replacing generations.
pub(crate) struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) async fn acquire_store_write_lock(layout: &StoreLayout) -> Result<StoreLock> {
    let path = layout.lock_path();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::task::spawn_blocking(move || -> Result<StoreLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| {
                VectorStoreError::Other(format!("open store lock {}: {err}", path.display()))
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| {
            VectorStoreError::Other(format!("acquire store lock {}: {err}", path.display()))
        })?;
        log::debug!(
            "Acquired store lock {} after {} ms",
            path.display(),
            start.elapsed().as_millis()
        );

        Ok(StoreLock { file })
    })
    .await
    .map_err(|err| VectorStoreError::Other(format!("join store lock task: {err}")))?
}

/// Shared lock for readers. `None` when no lock file exists yet: nothing has been saved, or
/// the first save is still creating it. Never creates the file.
pub(crate) async fn acquire_store_read_lock(layout: &StoreLayout) -> Result<Option<StoreLock>> {
    let path = layout.lock_path();
    tokio::task::spawn_blocking(move || -> Result<Option<StoreLock>> {
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(VectorStoreError::Other(format!(
                    "open store lock {}: {err}",
                    path.display()
                )))
            }
        };
        file.lock_shared().map_err(|err| {
            VectorStoreError::Other(format!("share store lock {}: {err}", path.display()))
        })?;
        Ok(Some(StoreLock { file }))
    })
    .await
    .map_err(|err| VectorStoreError::Other(format!("join store lock task: {err}")))?
}
