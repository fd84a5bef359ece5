use docchat_text_chunker::{Chunker, ChunkerConfig, Document, TextSplitter};
use tempfile::TempDir;

#[test]
fn text_file_chunks_keep_order_and_overlap() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("handbook.txt");
    let body: Vec<String> = (0..40).map(|i| format!("Rule number {i} applies.")).collect();
    std::fs::write(&path, body.join(" ")).unwrap();

    let doc = Document::from_path(&path).unwrap();
    let chunker = Chunker::new(ChunkerConfig::with_size(120, 30)).unwrap();
    let chunks = chunker.split(&doc).unwrap();

    assert!(chunks.len() > 3);
    assert!(chunks.iter().all(|c| c.origin_document == "handbook.txt"));
    assert!(chunks[0].text.starts_with("Rule number 0"));
    assert!(chunks.last().unwrap().text.ends_with("Rule number 39 applies."));

    // Consecutive chunks share overlapping words.
    for pair in chunks.windows(2) {
        let tail_word = pair[0].text.split_whitespace().last().unwrap();
        assert!(
            pair[1].text.contains(tail_word),
            "expected '{tail_word}' to carry into next chunk: {:?}",
            pair[1].text
        );
    }
}

#[test]
fn empty_file_yields_zero_chunks() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("empty.txt");
    std::fs::write(&path, "").unwrap();

    let doc = Document::from_path(&path).unwrap();
    assert!(doc.is_blank());
    assert!(Chunker::default().split(&doc).unwrap().is_empty());
}
