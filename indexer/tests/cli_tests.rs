use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn corpus(dir: &Path) {
    fs::create_dir_all(dir.join("input/sub")).unwrap();
    fs::write(dir.join("input/a.txt"), "Run running runs").unwrap();
    fs::write(dir.join("input/sub/b.txt"), "The runner ran home").unwrap();
    fs::write(dir.join("queries.list"), "run\nhome\n").unwrap();
}

fn run(dir: &Path, args: &[&str]) -> String {
    let out = Command::new(env!("CARGO_BIN_EXE_indexer")).current_dir(dir).env_remove("RUST_LOG").args(args).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8(out.stdout).unwrap()
}

fn json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn default_output_paths_are_used() {
    let dir = tempdir().unwrap();
    corpus(dir.path());
    let stdout = run(dir.path(), &["--text", "input", "--index", "--counts", "--query", "queries.list", "--results"]);
    assert!(stdout.starts_with("Elapsed: "));
    assert!(stdout.trim_end().ends_with(" seconds"));

    let index = json(&dir.path().join("index.json"));
    assert_eq!(index["run"]["input/a.txt"], serde_json::json!([1, 2, 3]));
    let counts = json(&dir.path().join("counts.json"));
    assert_eq!(counts["input/a.txt"], 3);
    assert_eq!(counts["input/sub/b.txt"], 4);
    let results = json(&dir.path().join("results.json"));
    let run = results["run"].as_array().unwrap();
    assert_eq!(run[0]["where"], "input/a.txt");
    assert_eq!(run[0]["count"], 3);
    assert_eq!(run[1]["where"], "input/sub/b.txt");
}

#[test]
fn threaded_mode_writes_the_same_files() {
    let dir = tempdir().unwrap();
    corpus(dir.path());
    run(dir.path(), &["--text", "input", "--index", "single.json", "--query", "queries.list", "--results", "r1.json"]);
    run(
        dir.path(),
        &["--text", "input", "--threads", "3", "--index", "multi.json", "--query", "queries.list", "--results", "r2.json"],
    );
    assert_eq!(fs::read(dir.path().join("single.json")).unwrap(), fs::read(dir.path().join("multi.json")).unwrap());
    assert_eq!(fs::read(dir.path().join("r1.json")).unwrap(), fs::read(dir.path().join("r2.json")).unwrap());
}

#[test]
fn bad_thread_count_and_missing_input_are_tolerated() {
    let dir = tempdir().unwrap();
    corpus(dir.path());
    run(dir.path(), &["--text", "nope", "--threads", "zero", "--counts"]);
    assert_eq!(json(&dir.path().join("counts.json")), serde_json::json!({}));
}
