use assert_cmd::prelude::*;
use predicates::ord::eq;
use predicates::str::{contains, is_empty, PredicateStrExt};
use std::process::Command;
use tempfile::TempDir;

fn kvctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kvctl").unwrap();
    cmd.current_dir(dir.path()).env_remove("TYPEDKV_CODEC");
    cmd
}

// `kvctl` with no args should exit with a non-zero code.
#[test]
fn cli_no_args() {
    Command::cargo_bin("kvctl").unwrap().assert().failure();
}

#[test]
fn cli_version() {
    Command::cargo_bin("kvctl")
        .unwrap()
        .args(&["-V"])
        .assert()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_get_non_existent_key() {
    let temp_dir = TempDir::new().unwrap();
    kvctl(&temp_dir)
        .args(&["get", "key1"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());
}

#[test]
fn cli_set_get_rm() {
    let temp_dir = TempDir::new().unwrap();
    kvctl(&temp_dir)
        .args(&["set", "key1", "value1"])
        .assert()
        .success()
        .stdout(is_empty());

    kvctl(&temp_dir)
        .args(&["get", "key1"])
        .assert()
        .success()
        .stdout(eq("value1").trim());

    kvctl(&temp_dir)
        .args(&["rm", "key1"])
        .assert()
        .success()
        .stdout(is_empty());

    kvctl(&temp_dir)
        .args(&["get", "key1"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());

    // removing twice is fine
    kvctl(&temp_dir).args(&["rm", "key1"]).assert().success();
}

#[test]
fn cli_append() {
    let temp_dir = TempDir::new().unwrap();
    kvctl(&temp_dir)
        .args(&["append", "missing", "x"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());

    kvctl(&temp_dir).args(&["set", "key", "abc"]).assert().success();
    kvctl(&temp_dir).args(&["append", "key", "def"]).assert().success();
    kvctl(&temp_dir)
        .args(&["get", "key"])
        .assert()
        .success()
        .stdout(eq("abcdef").trim());
}

#[test]
fn cli_ls_with_prefix() {
    let temp_dir = TempDir::new().unwrap();
    for (k, v) in &[("user/1", "ann"), ("user/2", "bob"), ("group/1", "admins")] {
        kvctl(&temp_dir).args(&["set", *k, *v]).assert().success();
    }

    kvctl(&temp_dir)
        .args(&["ls"])
        .assert()
        .success()
        .stdout(contains("user/1\tann"))
        .stdout(contains("group/1\tadmins"));

    kvctl(&temp_dir)
        .args(&["ls", "--prefix", "user/"])
        .assert()
        .success()
        .stdout(eq("user/1\tann\nuser/2\tbob").trim());
}

#[test]
fn cli_namespace() {
    let temp_dir = TempDir::new().unwrap();
    kvctl(&temp_dir)
        .args(&["--namespace", "app/", "set", "key", "inside"])
        .assert()
        .success();
    kvctl(&temp_dir).args(&["set", "key", "outside"]).assert().success();

    kvctl(&temp_dir)
        .args(&["--namespace", "app/", "get", "key"])
        .assert()
        .success()
        .stdout(eq("inside").trim());
    kvctl(&temp_dir)
        .args(&["get", "app/key"])
        .assert()
        .success()
        .stdout(eq("inside").trim());
    kvctl(&temp_dir)
        .args(&["ls", "--namespace", "app/"])
        .assert()
        .success()
        .stdout(eq("key\tinside").trim());
}

#[test]
fn cli_explicit_path_and_codec() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("store");
    let db = db.to_str().unwrap();
    kvctl(&temp_dir)
        .args(&["--path", db, "--codec", "bincode", "set", "key", "value"])
        .assert()
        .success();
    kvctl(&temp_dir)
        .args(&["--path", db, "--codec", "bincode", "get", "key"])
        .assert()
        .success()
        .stdout(eq("value").trim());

    // the current directory holds a separate database
    kvctl(&temp_dir)
        .args(&["get", "key"])
        .assert()
        .success()
        .stdout(eq("Key not found").trim());
}

#[test]
fn cli_invalid_subcommand() {
    let temp_dir = TempDir::new().unwrap();
    kvctl(&temp_dir).args(&["unknown"]).assert().failure();
    kvctl(&temp_dir).args(&["get"]).assert().failure();
    kvctl(&temp_dir)
        .args(&["set", "key"])
        .assert()
        .failure();
    kvctl(&temp_dir)
        .args(&["--codec", "yaml", "get", "key"])
        .assert()
        .failure();
}
