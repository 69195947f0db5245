use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::tempdir;

use wait_timeout::ChildExt;

pub struct TestContext {
    pub _work: tempfile::TempDir,
    pub device_dir: PathBuf,
    pub library_dir: PathBuf,
    pub history_file: PathBuf,
    pub cli_bin: PathBuf,
}

impl TestContext {
    pub fn new() -> Self {
        let work = tempdir().expect("tempdir");
        let workspace = work.path().to_path_buf();

        let device_dir = workspace.join("device");
        fs::create_dir_all(&device_dir).expect("device dir");
        let library_dir = workspace.join("library");
        fs::create_dir_all(&library_dir).expect("library dir");

        Self {
            _work: work,
            device_dir,
            library_dir,
            history_file: workspace.join("history"),
            cli_bin: PathBuf::from(env!("CARGO_BIN_EXE_flashfill")),
        }
    }

    pub fn add_track(&self, relative: &str, size: usize) -> PathBuf {
        let path = self.library_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("track parent");
        }
        fs::write(&path, vec![b'a'; size]).expect("write track");
        path
    }

    /// Command with every configuration key pointed into the scratch dir.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_bin);
        cmd.env("FLASH_DRIVE", &self.device_dir)
            .env("MUSIC_LIBRARY", &self.library_dir)
            .env("HISTORY_FILE", &self.history_file)
            .env("RESERVE_SIZE", "0")
            .env("THREAD_COUNT", "2")
            .env_remove("EXPECTED_SIZE_GB")
            .env_remove("ALLOWED_CAPACITY_DEVIATION")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn history_lines(&self) -> Vec<String> {
        match fs::read_to_string(&self.history_file) {
            Ok(text) => text.lines().map(str::to_owned).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn device_entries(&self) -> usize {
        count_entries(&self.device_dir)
    }
}

pub fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).expect("read dir").count()
}

pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> std::process::Output {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().expect("spawn command");

    match child.wait_timeout(timeout).expect("wait for process") {
        Some(_status) => child
            .wait_with_output()
            .expect("collect command output after completion"),
        None => {
            let _ = child.kill();
            let output = child
                .wait_with_output()
                .expect("collect output after killing command");
            panic!(
                "command timed out after {:?}\nstdout:\n{}\nstderr:\n{}",
                timeout,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}
