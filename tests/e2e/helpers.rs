use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Variables CI would set; cleared so the host environment never leaks into a run
const CI_ENV: [&str; 12] = [
    "INPUT_ORGANIZATION",
    "INPUT_REPOSITORY",
    "INPUT_BRANCH",
    "INPUT_VERSION",
    "INPUT_COMMIT_SHA",
    "RELEASABILITY_CHECK_RESULT",
    "OPTIONAL_CHECKS",
    "RELEASABILITY_PROJECT_KEY",
    "RELEASABILITY_SPOOL_DIR",
    "RELEASABILITY_TIMEOUT_SECS",
    "GITHUB_OUTPUT",
    "RUST_LOG",
];

pub struct TestProject {
    pub dir: TempDir,
    pub binary_path: String,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let binary_path = env!("CARGO_BIN_EXE_releasability").to_string();

        Self { dir, binary_path }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn outputs_path(&self) -> PathBuf {
        self.path().join("github-output")
    }

    pub fn write_file(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Read back the step outputs the last runs appended
    pub fn outputs(&self) -> String {
        fs::read_to_string(self.outputs_path()).unwrap_or_default()
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.run_with_env(args, &[])
    }

    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Output {
        let mut command = Command::new(&self.binary_path);
        command.args(args).current_dir(self.path());
        for name in CI_ENV {
            command.env_remove(name);
        }
        command.env("GITHUB_OUTPUT", self.outputs_path());
        for (name, value) in env {
            command.env(name, value);
        }
        command.output().expect("Failed to run releasability")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// In-memory zip with the given `(path, bytes)` entries
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, data) in entries {
        writer.start_file(*path, zip::write::FileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
