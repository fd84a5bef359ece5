use crate::frontend::{ChatFrontend, Turn};
use anyhow::Result;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const HELP: &str = "Commands: /ingest <path>, /list, /clear, /help, /quit. Anything else is a question.";

/// Interactive loop: one question (or slash command) per line until `/quit` or end of input.
/// Input is read asynchronously so a waiting prompt never parks a runtime worker.
pub async fn run_chat<R: AsyncBufRead + Unpin, W: Write>(
    frontend: &ChatFrontend,
    mut input: R,
    mut output: W,
) -> Result<Vec<Turn>> {
    let mut history: Vec<Turn> = Vec::new();
    writeln!(output, "{HELP}")?;

    loop {
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            writeln!(output)?;
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(char::is_whitespace).unwrap_or((line, "")) {
            ("/quit" | "/exit", _) => break,
            ("/help", _) => writeln!(output, "{HELP}")?,
            ("/clear", _) => {
                history.clear();
                writeln!(output, "History cleared.")?;
            }
            ("/list", _) => writeln!(output, "{}", frontend.list_ingested_documents().await)?,
            ("/ingest", "") => writeln!(output, "Usage: /ingest <path>")?,
            ("/ingest", path) => {
                writeln!(output, "{}", frontend.ingest(Path::new(path.trim())).await)?;
            }
            _ => {
                let asked = history.len();
                let (message, updated) = frontend.ask(line, history).await;
                history = updated;
                if !message.is_empty() {
                    writeln!(output, "{message}")?;
                } else if history.len() > asked {
                    if let Some(turn) = history.last() {
                        writeln!(output, "{}", turn.answer)?;
                    }
                }
            }
        }
    }

    log::debug!("Chat ended after {} exchanges", history.len());
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_rag::{EmbeddingMode, RagConfig, RagEngine};
    use tempfile::TempDir;

    fn frontend(dir: &Path) -> ChatFrontend {
        let mut config = RagConfig::default();
        config.store.dir = dir.join("store");
        config.embedding.mode = EmbeddingMode::Stub;
        ChatFrontend::new(RagEngine::from_config(config).expect("engine"))
    }

    #[tokio::test]
    async fn session_ingests_asks_and_clears() {
        let temp = TempDir::new().unwrap();
        let doc = temp.path().join("garden.txt");
        std::fs::write(&doc, "Tomatoes need full sun. Basil grows near tomatoes.").unwrap();
        let frontend = frontend(temp.path());

        let script = format!(
            "What do tomatoes need?\n/ingest {}\n/list\nWhat do tomatoes need?\n/clear\nHow much sun?\n/quit\nignored\n",
            doc.display()
        );
        let mut out = Vec::new();
        let history = run_chat(&frontend, script.as_bytes(), &mut out)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Please upload and process a document first."));
        assert!(out.contains("Added 1 chunks from 'garden.txt'."));
        assert!(out.contains("> garden.txt\n"));
        assert!(out.contains("Tomatoes need full sun."));
        assert!(out.contains("History cleared."));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "How much sun?");
    }

    #[tokio::test]
    async fn end_of_input_ends_the_session() {
        let temp = TempDir::new().unwrap();
        let mut out = Vec::new();
        let history = run_chat(&frontend(temp.path()), "/help\n".as_bytes(), &mut out)
            .await
            .unwrap();
        assert!(history.is_empty());
        assert!(String::from_utf8(out).unwrap().contains("/ingest <path>"));
    }

    #[tokio::test]
    async fn waiting_for_input_leaves_the_runtime_free() {
        use tokio::io::AsyncWriteExt;

        let temp = TempDir::new().unwrap();
        let frontend = frontend(temp.path());
        let (reader, mut writer) = tokio::io::duplex(64);
        let mut out = Vec::new();

        // Single-threaded runtime: the typist only runs if the chat loop yields while waiting
        let (history, ()) = tokio::join!(
            run_chat(&frontend, tokio::io::BufReader::new(reader), &mut out),
            async {
                tokio::task::yield_now().await;
                writer.write_all(b"/list
").await.unwrap();
                tokio::task::yield_now().await;
                writer.write_all(b"/quit
").await.unwrap();
            }
        );

        assert!(history.unwrap().is_empty());
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("No documents ingested yet."));
    }
}
