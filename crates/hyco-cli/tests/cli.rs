use assert_cmd::Command;

fn hyco(config_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hyco").unwrap();
    cmd.arg("--config")
        .arg(config_dir.path().join("config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("hyco").unwrap().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for sub in ["listen", "send", "connect", "token"] {
        assert!(stdout.contains(sub), "missing {sub} in help");
    }
}

#[test]
fn token_from_flags() {
    let dir = tempfile::tempdir().unwrap();
    let output = hyco(&dir)
        .args([
            "--namespace",
            "ns.servicebus.windows.net",
            "--path",
            "hc1",
            "--key",
            "secret",
            "token",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with(
        "SharedAccessSignature sr=http%3A%2F%2Fns.servicebus.windows.net%2Fhc1&sig="
    ));
    assert!(stdout.trim_end().ends_with("&skn=RootManageSharedAccessKey"));
    assert!(!stdout.contains("secret"));
}

#[test]
fn token_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[relay]\nnamespace = \"ns.example\"\npath = \"orders\"\nkey_rule = \"send\"\nkey = \"k\"\n",
    )
    .unwrap();

    let output = hyco(&dir).arg("token").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("sr=http%3A%2F%2Fns.example%2Forders"));
    assert!(stdout.trim_end().ends_with("&skn=send"));
}

#[test]
fn missing_relay_settings_fail() {
    let dir = tempfile::tempdir().unwrap();
    let output = hyco(&dir).arg("token").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("relay namespace is empty"));
}
