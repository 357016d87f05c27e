use anyhow::Result;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Runs the chat binary in `work_dir` with no stdin and no inherited kbase settings
fn run_cli(work_dir: &TempDir, envs: &[(&str, &str)], args: &[&str]) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kbase-chat"));
    cmd.current_dir(work_dir.path())
        .arg("--vector-db")
        .arg(work_dir.path().join("vector_db"))
        .args(args)
        .stdin(std::process::Stdio::null());
    for var in [
        "GROQ_API_KEY",
        "KBASE_GENERATION_URL",
        "KBASE_GENERATION_MODEL",
        "KBASE_GENERATION_TIMEOUT",
        "KBASE_VECTOR_DB_PATH",
        "KBASE_EMBED_MODEL",
        "KBASE_MODEL_CACHE",
        "KBASE_TOP_K",
    ] {
        cmd.env_remove(var);
    }
    cmd.envs(envs.iter().copied());

    Ok(cmd.output()?)
}

#[test]
fn test_zero_k_rejected_before_loading_anything() -> Result<()> {
    let work_dir = TempDir::new()?;
    let output = run_cli(&work_dir, &[("GROQ_API_KEY", "test-key")], &["-k", "0"])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("k must be at least 1"), "{stderr}");
    assert!(!stderr.contains("index.bin"), "{stderr}");
    assert!(!work_dir.path().join(".fastembed_cache").exists());
    Ok(())
}

#[test]
fn test_missing_api_key_fails_fast() -> Result<()> {
    let work_dir = TempDir::new()?;
    let output = run_cli(&work_dir, &[], &[])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GROQ_API_KEY"), "{stderr}");
    Ok(())
}

#[test]
fn test_missing_artifacts_named_before_model_load() -> Result<()> {
    let work_dir = TempDir::new()?;
    let output = run_cli(&work_dir, &[("GROQ_API_KEY", "test-key")], &[])?;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("index.bin"), "{stderr}");
    assert!(!work_dir.path().join(".fastembed_cache").exists());
    Ok(())
}
