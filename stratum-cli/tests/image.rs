mod common;

use common::stratum;
use predicates::prelude::*;

#[test]
fn ls_on_an_empty_store_prints_only_the_header() {
    let ctx = stratum();

    ctx.cmd()
        .args(["image", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DIGEST").and(predicate::str::contains("TAGS")));
}

#[test]
fn inspect_unknown_reference_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["image", "inspect", "missing:latest"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn rm_unknown_reference_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["image", "rm", "missing:latest"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn import_of_a_nonexistent_path_fails() {
    let ctx = stratum();

    ctx.cmd().args(["image", "import", "/no/such/path"]).assert().failure();
}
