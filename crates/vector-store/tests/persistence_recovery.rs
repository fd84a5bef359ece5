use docchat_vector_store::{
    ChunkStore, PersistenceManager, StoreLayout, TextChunk, VectorIndex, VectorStoreError,
};
use serde_json::Value;
use tempfile::TempDir;

fn build(doc: &str, count: usize, offset: usize) -> (Vec<Vec<f32>>, Vec<TextChunk>) {
    let vectors = (0..count)
        .map(|i| {
            let x = (offset + i) as f32;
            vec![x, x * 0.5, 1.0 - x]
        })
        .collect();
    let spans = (0..count)
        .map(|i| TextChunk::new(format!("{doc} chunk {i}"), doc))
        .collect();
    (vectors, spans)
}

fn state_with(batches: &[(&str, usize)]) -> (VectorIndex, ChunkStore) {
    let mut index = VectorIndex::new();
    let mut chunks = ChunkStore::new();
    for (doc, count) in batches {
        let (vectors, spans) = build(doc, *count, index.len());
        index.append(&vectors).expect("append vectors");
        chunks.append(spans);
    }
    (index, chunks)
}

#[tokio::test]
async fn roundtrip_preserves_vectors_and_texts() {
    let temp = TempDir::new().expect("tempdir");
    let manager = PersistenceManager::new(StoreLayout::in_dir(temp.path()));
    let (index, chunks) = state_with(&[("a.pdf", 3), ("b.md", 1)]);

    manager.save(&index, &chunks).await.expect("save");
    let (loaded_index, loaded_chunks) = manager.load().await.expect("load");

    assert_eq!(loaded_index.len(), 4);
    assert_eq!(loaded_chunks.len(), 4);
    for position in 0..4 {
        let original = index.get(position).expect("original vector");
        let loaded = loaded_index.get(position).expect("loaded vector");
        for (a, b) in original.iter().zip(loaded) {
            assert!((a - b).abs() < 1e-6);
        }
        assert_eq!(
            loaded_chunks.get(position).expect("chunk").text,
            chunks.get(position).expect("chunk").text
        );
    }
}

#[tokio::test]
async fn crash_between_vector_and_chunk_write_keeps_previous_pair() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::in_dir(temp.path());
    let manager = PersistenceManager::new(layout.clone());

    let (index, chunks) = state_with(&[("a.pdf", 3)]);
    manager.save(&index, &chunks).await.expect("first save");

    let (grown, grown_chunks) = state_with(&[("a.pdf", 3), ("b.pdf", 2)]);
    let staged = manager.stage_vectors(&grown).await.expect("stage");
    assert_eq!(staged.generation(), 2);
    drop(staged);

    // A half-written chunk file from the interrupted commit
    tokio::fs::write(layout.chunks_path().with_extension("json.tmp"), b"{\"format")
        .await
        .expect("write stray tmp");

    let (loaded_index, loaded_chunks) = manager.load().await.expect("previous pair loads");
    assert_eq!(loaded_index, index);
    assert_eq!(loaded_chunks, chunks);

    // The next save supersedes both the orphaned generation and the stray file
    let report = manager
        .save(&grown, &grown_chunks)
        .await
        .expect("recovering save");
    assert_eq!(report.generation, 3);
    assert_eq!(manager.load().await.expect("load").0.len(), 5);
}

#[tokio::test]
async fn truncated_chunk_file_is_corrupt() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::in_dir(temp.path());
    let manager = PersistenceManager::new(layout.clone());
    let (index, chunks) = state_with(&[("a.pdf", 3)]);
    manager.save(&index, &chunks).await.expect("save");

    let bytes = tokio::fs::read(layout.chunks_path()).await.expect("read");
    tokio::fs::write(layout.chunks_path(), &bytes[..bytes.len() / 2])
        .await
        .expect("truncate");

    let err = manager.load().await.expect_err("truncated store must not load");
    assert!(matches!(err, VectorStoreError::CorruptStore { .. }), "{err}");
}

#[tokio::test]
async fn dropped_chunk_record_is_corrupt() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::in_dir(temp.path());
    let manager = PersistenceManager::new(layout.clone());
    let (index, chunks) = state_with(&[("a.pdf", 3)]);
    manager.save(&index, &chunks).await.expect("save");

    let raw = tokio::fs::read(layout.chunks_path()).await.expect("read");
    let mut doc: Value = serde_json::from_slice(&raw).expect("json");
    doc["chunks"]
        .as_array_mut()
        .expect("chunks array")
        .pop();
    tokio::fs::write(layout.chunks_path(), serde_json::to_vec(&doc).expect("encode"))
        .await
        .expect("rewrite");

    let err = manager.load().await.expect_err("misaligned store must not load");
    assert!(matches!(err, VectorStoreError::CorruptStore { .. }), "{err}");
}

#[tokio::test]
async fn tampered_vector_file_is_corrupt() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::in_dir(temp.path());
    let manager = PersistenceManager::new(layout.clone());
    let (index, chunks) = state_with(&[("a.pdf", 2)]);
    let report = manager.save(&index, &chunks).await.expect("save");

    let mut bytes = tokio::fs::read(&report.vectors_path).await.expect("read");
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    tokio::fs::write(&report.vectors_path, &bytes)
        .await
        .expect("tamper");

    let err = manager.load().await.expect_err("tampered store must not load");
    assert!(matches!(err, VectorStoreError::CorruptStore { .. }), "{err}");
}

#[tokio::test]
async fn missing_vector_file_is_corrupt() {
    let temp = TempDir::new().expect("tempdir");
    let manager = PersistenceManager::new(StoreLayout::in_dir(temp.path()));
    let (index, chunks) = state_with(&[("a.pdf", 1)]);
    let report = manager.save(&index, &chunks).await.expect("save");
    tokio::fs::remove_file(&report.vectors_path)
        .await
        .expect("remove vectors");

    assert!(matches!(
        manager.load().await,
        Err(VectorStoreError::CorruptStore { .. })
    ));
}

#[tokio::test]
async fn empty_store_roundtrips() {
    let temp = TempDir::new().expect("tempdir");
    let manager = PersistenceManager::new(StoreLayout::in_dir(temp.path()));
    manager
        .save(&VectorIndex::new(), &ChunkStore::new())
        .await
        .expect("save empty");

    let (index, chunks) = manager.load().await.expect("load empty");
    assert!(index.is_empty());
    assert!(chunks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn load_during_repeated_saves_never_sees_a_retired_generation() {
    let temp = TempDir::new().expect("tempdir");
    let layout = StoreLayout::in_dir(temp.path());
    let writer = PersistenceManager::new(layout.clone());
    let reader = PersistenceManager::new(layout);

    let (index, chunks) = state_with(&[("a.pdf", 4)]);
    writer.save(&index, &chunks).await.expect("seed save");

    let saves = tokio::spawn(async move {
        for round in 0..150 {
            let (index, chunks) = state_with(&[("a.pdf", 4), ("b.pdf", round % 3 + 1)]);
            writer.save(&index, &chunks).await.expect("save");
        }
    });
    let loads = tokio::spawn(async move {
        let mut loaded = 0usize;
        let mut failures = Vec::new();
        for _ in 0..300 {
            match reader.load().await {
                Ok((index, chunks)) => {
                    assert_eq!(index.len(), chunks.len());
                    loaded += 1;
                }
                Err(err) => failures.push(err.to_string()),
            }
            tokio::task::yield_now().await;
        }
        (loaded, failures)
    });

    saves.await.expect("save task");
    let (loaded, failures) = loads.await.expect("load task");
    assert!(failures.is_empty(), "loads failed: {failures:?}");
    assert_eq!(loaded, 300);
}

#[tokio::test]
async fn next_generation_follows_the_committed_header() {
    let temp = TempDir::new().expect("tempdir");
    let manager = PersistenceManager::new(StoreLayout::in_dir(temp.path()));
    let (index, chunks) = state_with(&[("a.pdf", 2)]);
    manager.save(&index, &chunks).await.expect("first save");
    let report = manager.save(&index, &chunks).await.expect("second save");
    assert_eq!(report.generation, 2);

    // Live vector file lost: a scan alone would restart numbering at 1
    tokio::fs::remove_file(&report.vectors_path)
        .await
        .expect("remove vectors");

    let staged = manager.stage_vectors(&index).await.expect("stage");
    assert_eq!(staged.generation(), 3);
    let report = staged.commit(&chunks).await.expect("commit");
    assert_eq!(report.generation, 3);
    assert_eq!(manager.load().await.expect("load").0, index);
}
