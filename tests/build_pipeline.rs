// tests/build_pipeline.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::fs;
use std::path::Path;

use rebundle::cli::{CliArgs, Command};
use rebundle::{Finished, run};

const CONFIG: &str = r#"
[config]
output_dir = "build"

[task.clean]
kind = "clean"

[task.scripts]
kind = "bundle"
entries = ["./static/js/*.js"]

[task.vendor]
kind = "copy"
files = ["./vendor/**/*.js"]

[task.styles]
kind = "styles"
entries = ["./static/css/*.css", "!./static/css/_*.css"]

[task.build]
kind = "group"
after = ["scripts", "vendor", "styles"]
"#;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "Rebundle.toml", CONFIG);
    write(root, "static/js/main.js", "var greet = require('./lib/greet');\ngreet('world');\n");
    write(root, "static/js/lib/greet.js", "module.exports = function (who) { return 'hi ' + who; };\n");
    write(root, "static/js/lib/data.json", "{\"a\": 1}\n");
    write(root, "static/css/site.css", "body { margin: 0; }\n");
    write(root, "static/css/_partial.css", "a { color: red; }\n");
    write(root, "vendor/jquery/jquery.min.js", "/* jq */\n");
    dir
}

fn args(root: &Path, command: Command) -> CliArgs {
    CliArgs {
        command: Some(command),
        config: root.join("Rebundle.toml").to_string_lossy().into_owned(),
        production: false,
        log_level: None,
    }
}

async fn run_command(root: &Path, command: Command) -> Finished {
    with_timeout(run(args(root, command))).await.unwrap()
}

#[tokio::test]
async fn build_writes_every_asset_kind() {
    init_tracing();
    let dir = project();
    let root = dir.path();

    let finished = run_command(root, Command::Build).await;
    assert!(finished.is_success(), "{finished:?}");

    let bundle = fs::read_to_string(root.join("build/js/main.js")).unwrap();
    assert!(bundle.contains("greet('world');"));
    assert!(bundle.contains("return 'hi ' + who;"));
    assert!(bundle.contains("//# sourceMappingURL=main.js.map"));
    assert!(root.join("build/js/main.js.map").is_file());
    // Only the entry glob's direct matches are entries.
    assert!(!root.join("build/js/greet.js").exists());

    assert!(root.join("build/vendor/jquery/jquery.min.js").is_file());
    assert_eq!(
        fs::read_to_string(root.join("build/css/site.css")).unwrap(),
        "body { margin: 0; }\n"
    );
    assert!(!root.join("build/css/_partial.css").exists());
}

#[tokio::test]
async fn broken_require_fails_the_build_but_writes_other_entries() {
    init_tracing();
    let dir = project();
    let root = dir.path();
    write(root, "static/js/broken.js", "require('./nope');\n");

    let finished = run_command(root, Command::Build).await;
    assert!(!finished.is_success());
    match finished {
        Finished::Ran { report, .. } => {
            let failed: Vec<&str> = report.failed.iter().map(|(t, _)| t.as_str()).collect();
            assert_eq!(failed, vec!["scripts"]);
            assert!(report.failed[0].1.contains("./nope"), "{}", report.failed[0].1);
            assert_eq!(report.skipped.len(), 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(root.join("build/js/main.js").is_file());
    assert!(!root.join("build/js/broken.js").exists());
}

#[tokio::test]
async fn run_executes_one_task_and_clean_removes_the_output() {
    init_tracing();
    let dir = project();
    let root = dir.path();

    let finished = run_command(root, Command::Run { task: "vendor".into() }).await;
    assert!(finished.is_success());
    assert!(root.join("build/vendor/jquery/jquery.min.js").is_file());
    assert!(!root.join("build/js").exists());

    let finished = run_command(root, Command::Clean).await;
    assert!(finished.is_success());
    assert!(!root.join("build").exists());
    assert!(root.join("static/js/main.js").is_file());
}

#[tokio::test]
async fn unknown_task_is_rejected_before_running() {
    init_tracing();
    let dir = project();
    let root = dir.path();

    let err = with_timeout(run(args(root, Command::Run { task: "nope".into() })))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nope"), "{err}");
    assert!(!root.join("build").exists());
}

#[tokio::test]
async fn list_runs_nothing() {
    let dir = project();
    let root = dir.path();
    assert!(matches!(run_command(root, Command::List).await, Finished::Listed));
    assert!(!root.join("build").exists());
}
