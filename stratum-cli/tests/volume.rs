mod common;

use common::stratum;
use predicates::prelude::*;

#[test]
fn create_then_ls_shows_the_volume() {
    let ctx = stratum();

    ctx.cmd().args(["volume", "create", "data"]).assert().success().stdout(predicate::str::contains("data"));

    ctx.cmd()
        .args(["volume", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME").and(predicate::str::contains("data")));
}

#[test]
fn create_duplicate_name_is_a_conflict() {
    let ctx = stratum();

    ctx.cmd().args(["volume", "create", "data"]).assert().success();

    ctx.cmd()
        .args(["volume", "create", "data"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[CONFLICT]"));
}

#[test]
fn rm_unknown_volume_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["volume", "rm", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn rm_removes_an_unreferenced_volume() {
    let ctx = stratum();

    ctx.cmd().args(["volume", "create", "scratch"]).assert().success();
    ctx.cmd().args(["volume", "rm", "scratch"]).assert().success().stdout(predicate::str::contains("scratch"));
    ctx.cmd()
        .args(["volume", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scratch").not());
}

#[test]
fn prune_on_an_empty_store_removes_nothing() {
    let ctx = stratum();

    ctx.cmd().args(["volume", "prune"]).assert().success().stdout(predicate::str::is_empty());
}

#[test]
fn inspect_prints_the_volume_record() {
    let ctx = stratum();

    ctx.cmd().args(["volume", "create", "data"]).assert().success();
    ctx.cmd()
        .args(["volume", "inspect", "data"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"data\""));
}
