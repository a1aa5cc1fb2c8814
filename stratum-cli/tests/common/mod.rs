#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Each test gets its own state directory so the filesystem-backed stores
/// (volumes, images, containers) never collide between test threads, mirroring
/// the teacher's shared-home pattern but without the cross-test lock it needs
/// for real container execution.
pub struct TestContext {
    pub state_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self { state_dir: TempDir::new().expect("failed to create temp state dir") }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("stratum").expect("stratum binary not built");
        cmd.arg("--state-dir").arg(self.state_dir.path());
        cmd
    }

    pub fn path(&self) -> PathBuf {
        self.state_dir.path().to_path_buf()
    }
}

pub fn stratum() -> TestContext {
    TestContext::new()
}
