use std::fs;
use std::path::{Path, PathBuf};
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn counselor_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_counselor"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(data_dir.join("courses")).unwrap();
    fs::write(
        data_dir.join("graduation.json"),
        r#"{
  "school": "Green Level High School",
  "requirements": [
    {"requirement": "English", "credits": 4},
    {"requirement": "Math", "credits": 4, "notes": "Including Math III [2]"}
  ]
}
[1] https://example.org/source"#,
    )
    .unwrap();
    fs::write(
        data_dir.join("courses/catalog.jsonl"),
        "{\"course_name\": \"AP Biology\", \"credits\": 1}\n{\"course_name\": \"Honors Chemistry\"}\n",
    )
    .unwrap();
    fs::write(data_dir.join("broken.json"), "{ \"clubs\": [ ").unwrap();

    let config_content = format!(
        r#"[school]
name = "Green Level High School"

[data]
dir = "{root}/data"

[index]
path = "{root}/index/index.sqlite"

[logging]
level = "warn"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("counselor.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_counselor(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = counselor_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run counselor binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_sources_lists_loaded_and_skipped() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _stderr, success) = run_counselor(&config, &["sources"]);
    assert!(success);
    assert!(stdout.contains("graduation.json"));
    assert!(stdout.contains("courses/catalog.jsonl"));
    assert!(stdout.contains("skipped:"));
    assert!(stdout.contains("broken.json"));
    assert!(stdout.contains("2 sources"));
}

#[test]
fn test_classify_layers() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, success) = run_counselor(&config, &["classify", "Hi there!"]);
    assert!(success);
    assert!(stdout.contains("decision: greeting"));

    let (stdout, _, _) = run_counselor(&config, &["classify", "what is 2+2"]);
    assert!(stdout.contains("decision: out_of_scope"));

    let (stdout, _, _) = run_counselor(&config, &["classify", "what is 2+2 in my math class"]);
    assert!(stdout.contains("decision: in_scope"));

    let (stdout, _, _) = run_counselor(&config, &["classify", "What's the weather today?"]);
    assert!(stdout.contains("decision: out_of_scope"));
}

#[test]
fn test_index_errors_when_embeddings_disabled() {
    let (_tmp, config) = setup_test_env();
    let (_stdout, stderr, success) = run_counselor(&config, &["index"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _config) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(&bad, "[chunking]\nsize = 100\noverlap = 150\n").unwrap();

    let (_stdout, stderr, success) = run_counselor(&bad, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("chunking.overlap"));
}

#[test]
fn test_missing_config_file() {
    let (tmp, _config) = setup_test_env();
    let (_stdout, stderr, success) =
        run_counselor(&tmp.path().join("nope.toml"), &["classify", "hi"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_interactive_ask_reads_stdin_until_exit() {
    let (tmp, _config) = setup_test_env();
    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let config = tmp.path().join("config/interactive.toml");
    fs::write(
        &config,
        format!(
            "[data]\ndir = \"{}\"\n\n[index]\npath = \"{}\"\n\n[logging]\nlevel = \"warn\"\n",
            empty.display(),
            tmp.path().join("index/interactive.sqlite").display()
        ),
    )
    .unwrap();

    let mut child = Command::new(counselor_binary())
        .arg("--config")
        .arg(&config)
        .arg("ask")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"What's the weather today?\n\nexit\nnever answered\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout.matches("not able to answer questions outside").count(), 1);
}
