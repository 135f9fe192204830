use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn ketchup(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ketchup");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("KETCHUP_HOME", home.join("ketchup"))
        .env("KETCHUP_CONFIG_PATH", home.join("absent.toml"));
    cmd
}

#[test]
fn register_then_follow_channels_and_users() {
    let tmp = tempdir().expect("tempdir");

    ketchup(tmp.path())
        .args(["register", "--user", "U1", "--team", "T1"])
        .args(["--bot-token", "xoxb-1", "--user-token", "xoxp-1"])
        .assert()
        .success()
        .stdout(contains("installation=created user=U1 team=T1"));

    ketchup(tmp.path())
        .args(["settings", "--user", "U1"])
        .assert()
        .success()
        .stdout(contains("followed_channels=\n"));

    ketchup(tmp.path())
        .args(["settings", "--user", "U1", "--follow-channels", "C1, C2,C1"])
        .args(["--follow-users", "U7"])
        .assert()
        .success()
        .stdout(contains("followed_channels=C1,C2"))
        .stdout(contains("followed_users=U7"));

    ketchup(tmp.path())
        .args(["settings", "--user", "U1", "--follow-users", ""])
        .assert()
        .success()
        .stdout(contains("followed_channels=C1,C2"))
        .stdout(contains("followed_users=\n"));

    let raw = fs::read_to_string(tmp.path().join("ketchup/store.json")).expect("store");
    let store: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(store["schema_version"], 1);
    assert_eq!(store["installations"][0]["bot_token"], "xoxb-1");
    assert_eq!(store["settings"]["U1"]["followed_channel_ids"][1], "C2");
}

#[test]
fn register_rejects_swapped_tokens() {
    let tmp = tempdir().expect("tempdir");

    ketchup(tmp.path())
        .args(["register", "--user", "U1", "--team", "T1"])
        .args(["--bot-token", "xoxp-1", "--user-token", "xoxb-1"])
        .assert()
        .failure()
        .stdout(contains("bot token must start with xoxb-"));
    assert!(!tmp.path().join("ketchup/store.json").exists());
}

#[test]
fn settings_for_unknown_user_is_an_issue() {
    let tmp = tempdir().expect("tempdir");

    ketchup(tmp.path())
        .args(["settings", "--user", "U404"])
        .assert()
        .failure()
        .stdout(contains("no settings for user U404"));
}
