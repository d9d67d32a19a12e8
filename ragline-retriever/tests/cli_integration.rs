use anyhow::Result;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::path::Path;
use std::process::{Output, Stdio};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const VOCAB: [&str; 3] = ["rust", "python", "cooking"];

fn embed(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    VOCAB
        .iter()
        .map(|w| lower.matches(w).count() as f32 + 0.1)
        .collect()
}

async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
    let data: Vec<Value> = body["input"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, text)| json!({ "index": i, "embedding": embed(text.as_str().unwrap_or_default()) }))
        .collect();
    Json(json!({ "data": data }))
}

async fn chat(Json(body): Json<Value>) -> Json<Value> {
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let context = messages[1]["content"].as_str().unwrap_or_default();
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": format!("from context: {context}") } }]
    }))
}

/// Start a fake OpenAI API and return its base URL.
async fn spawn_fake_openai() -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

/// Write a config pointing both model clients at `base_url`, plus a sample document.
fn write_fixtures(dir: &Path, base_url: &str) -> Result<()> {
    std::fs::write(
        dir.join("ragline.toml"),
        format!(
            r#"
[chunking]
size = 3
overlap = 0

[embedding]
base_url = "{base_url}"
retry_backoff_ms = 1

[chat]
base_url = "{base_url}"

[retriever]
embed_concurrency = 2
"#
        ),
    )?;
    std::fs::write(
        dir.join("doc.txt"),
        "rust rust rust\npython python python\ncooking cooking cooking\n",
    )?;
    Ok(())
}

/// Helper to run the CLI binary with given args
async fn run_cli(dir: &TempDir, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_ragline"))
        .current_dir(dir.path())
        .args(args)
        .env("OPENAI_API_KEY", "sk-test")
        .env("RUST_LOG", "error")
        .output()
        .await?;
    Ok(output)
}

#[tokio::test]
async fn test_search_with_input_returns_best_chunk() -> Result<()> {
    let base = spawn_fake_openai().await;
    let dir = TempDir::new()?;
    write_fixtures(dir.path(), &base)?;

    let output = run_cli(
        &dir,
        &[
            "--config", "ragline.toml", "search", "--question", "python?", "--top-k", "1",
            "--input", "doc.txt", "--format", "json",
        ],
    )
    .await?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed["question"], "python?");
    let matches = parsed["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["id"], "1");
    assert_eq!(matches[0]["text"], "python python python");
    Ok(())
}

#[tokio::test]
async fn test_ingest_prints_report() -> Result<()> {
    let base = spawn_fake_openai().await;
    let dir = TempDir::new()?;
    write_fixtures(dir.path(), &base)?;

    let output = run_cli(
        &dir,
        &["--config", "ragline.toml", "ingest", "--input", "doc.txt", "--format", "json"],
    )
    .await?;
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["chunks_total"], 3);
    assert_eq!(report["records_upserted"], 3);
    assert_eq!(report["warnings"].as_array().unwrap().len(), 0);
    Ok(())
}

#[tokio::test]
async fn test_ingest_reads_stdin() -> Result<()> {
    let base = spawn_fake_openai().await;
    let dir = TempDir::new()?;
    write_fixtures(dir.path(), &base)?;

    let mut child = Command::new(env!("CARGO_BIN_EXE_ragline"))
        .current_dir(dir.path())
        .args(["--config", "ragline.toml", "ingest", "--input", "-", "--format", "json"])
        .env("OPENAI_API_KEY", "sk-test")
        .env("RUST_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"rust rust rust python python python").await?;
    drop(stdin);

    let output = child.wait_with_output().await?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["chunks_total"], 2);
    assert_eq!(report["records_upserted"], 2);
    Ok(())
}

#[tokio::test]
async fn test_ask_composes_answer_from_context() -> Result<()> {
    let base = spawn_fake_openai().await;
    let dir = TempDir::new()?;
    write_fixtures(dir.path(), &base)?;

    let output = run_cli(
        &dir,
        &[
            "--config", "ragline.toml", "ask", "--question", "cooking", "-k", "1", "--input",
            "doc.txt",
        ],
    )
    .await?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "from context: cooking cooking cooking");
    Ok(())
}

#[tokio::test]
async fn test_missing_api_key_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let output = Command::new(env!("CARGO_BIN_EXE_ragline"))
        .current_dir(dir.path())
        .args(["search", "--question", "anything"])
        .env_remove("OPENAI_API_KEY")
        .output()
        .await?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {stderr}");
    Ok(())
}

#[tokio::test]
async fn test_config_command_prints_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let output = run_cli(&dir, &["config"]).await?;
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("backend = \"memory\""));
    assert!(stdout.contains("text-embedding-3-small"));
    assert!(!stdout.contains("sk-test"));
    Ok(())
}

#[tokio::test]
async fn test_bad_config_is_reported() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("bad.toml"), "[chunking]\nsize = 4\noverlap = 9\n")?;
    let output = run_cli(&dir, &["--config", "bad.toml", "config"]).await?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("overlap"), "stderr: {stderr}");
    Ok(())
}
