#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// 外部の設定や環境変数に影響されないコマンドを作る
fn stackflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("STACKFLOW_PROJECT_ROOT")
        .env_remove("STACKFLOW_OUTDIR")
        .env_remove("CDK_DEFAULT_ACCOUNT")
        .env_remove("CDK_DEFAULT_REGION")
        .env_remove("AWS_ACCOUNT_ID")
        .env_remove("AWS_REGION")
        .env_remove("AWS_DEFAULT_REGION");
    cmd
}

/// Lambdaのコードを置いたプロジェクトディレクトリ
fn project_with_code() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let code = dir.path().join("resources/lexBot");
    std::fs::create_dir_all(&code).unwrap();
    std::fs::write(
        code.join("index.py"),
        "def lambda_handler(event, context):\n    return event\n",
    )
    .unwrap();
    dir
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CloudFormation"))
        .stdout(predicate::str::contains("synth"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("diff"));
}

/// バージョン表示が正しく動作することを確認
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

/// synthコマンドのヘルプに出力オプションが含まれることを確認
#[test]
fn test_synth_help() {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.arg("synth")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[STACK]"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--format"));
}

/// 存在しないコマンドはエラーになる
#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// stack.kdl がなければデモスタックを検証する
#[test]
fn test_validate_demo_stack() {
    let dir = tempfile::tempdir().unwrap();
    stackflow(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("DemoLexVaCicdStack"))
        .stdout(predicate::str::contains("14個のリソース"))
        .stdout(predicate::str::contains("6段"));
}

/// 存在しないスタック名はエラーになる
#[test]
fn test_validate_unknown_stack() {
    let dir = tempfile::tempdir().unwrap();
    stackflow(dir.path())
        .arg("validate")
        .arg("NoSuchStack")
        .assert()
        .failure()
        .stderr(predicate::str::contains("設定エラー"));
}

/// listコマンドでブループリントが表示される
#[test]
fn test_list_demo_stack() {
    let dir = tempfile::tempdir().unwrap();
    stackflow(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("DemoLexVaCicdStack"))
        .stdout(predicate::str::contains("lex-va"));
}

/// graphコマンドでプロビジョニング順序が表示される
#[test]
fn test_graph_demo_stack() {
    let dir = tempfile::tempdir().unwrap();
    stackflow(dir.path())
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1. lexCodeHookServiceRole, lexLogGroup, lexAudioBucket, \
             CustomS3AutoDeleteObjectsCustomResourceProviderHandlerServiceRole",
        ))
        .stdout(predicate::str::contains("6. lexCodeHookLexInvocation"));
}

/// synthでクラウドアセンブリが書き出され、diffは差分なしになる
#[test]
fn test_synth_then_diff() {
    let dir = project_with_code();
    let outdir = dir.path().join("out");

    stackflow(dir.path())
        .arg("synth")
        .arg("--output")
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("DemoLexVaCicdStack"));

    let template_path = outdir.join("DemoLexVaCicdStack.template.json");
    assert!(template_path.exists());
    assert!(outdir.join("manifest.json").exists());
    assert!(outdir.join("DemoLexVaCicdStack.assets.json").exists());

    let template: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&template_path).unwrap()).unwrap();
    assert_eq!(
        template["Resources"]["helloLexBot"]["Type"],
        serde_json::json!("AWS::Lex::Bot")
    );

    stackflow(dir.path())
        .arg("diff")
        .arg("--output")
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("差分はありません"));
}

/// YAML形式で書き出せる
#[test]
fn test_synth_yaml() {
    let dir = project_with_code();
    let outdir = dir.path().join("out");

    stackflow(dir.path())
        .args(["synth", "--format", "yaml", "--output"])
        .arg(&outdir)
        .assert()
        .success();

    assert!(outdir.join("DemoLexVaCicdStack.template.yaml").exists());
}

/// Lambdaのコードがなければsynthは失敗する
#[test]
fn test_synth_without_code_fails() {
    let dir = tempfile::tempdir().unwrap();
    stackflow(dir.path())
        .arg("synth")
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .failure();
}

/// diffは書き出し前なら全リソースを作成扱いにする
#[test]
fn test_diff_before_synth() {
    let dir = project_with_code();
    stackflow(dir.path())
        .arg("diff")
        .arg("--output")
        .arg(dir.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("14 to create"));
}

/// stack.kdl のスタックが使われる
#[test]
fn test_validate_kdl_project() {
    let dir = project_with_code();
    std::fs::write(
        dir.path().join("stack.kdl"),
        r#"
app "support"
env account="123456789012" region="us-east-1"

stack "SupportStack" {
    blueprint "lex-va" bot-name="SupportBot"
}
"#,
    )
    .unwrap();

    stackflow(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("SupportStack"))
        .stdout(predicate::str::contains("aws://123456789012/us-east-1"));
}
