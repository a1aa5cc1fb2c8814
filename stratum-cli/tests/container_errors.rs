mod common;

use common::stratum;
use predicates::prelude::*;

#[test]
fn start_unknown_reference_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["start", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn stop_unknown_reference_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["stop", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn kill_unknown_reference_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["kill", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn logs_unknown_reference_is_not_found() {
    let ctx = stratum();

    ctx.cmd()
        .args(["logs", "missing"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[NOT_FOUND]"));
}

#[test]
fn rm_with_no_targets_and_no_all_flag_is_rejected() {
    let ctx = stratum();

    ctx.cmd()
        .arg("rm")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no containers specified"));
}

#[test]
fn ls_on_an_empty_store_prints_only_the_header() {
    let ctx = stratum();

    ctx.cmd().args(["ls"]).assert().success().stdout(predicate::str::contains("ID").and(predicate::str::contains("STATUS")));
}

#[test]
fn kill_rejects_an_unknown_signal_name() {
    let ctx = stratum();

    ctx.cmd()
        .args(["kill", "--signal", "NOTASIGNAL", "missing"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("[VALIDATION]"));
}
