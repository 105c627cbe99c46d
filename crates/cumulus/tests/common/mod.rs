use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated working directory with credentials but no endpoints
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn write_manifest(&self, content: &str) {
        fs::write(self.root.path().join("cumulus.resources.yaml"), content).unwrap();
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.path().join(".cumulus").join("state.json")
    }

    pub fn write_state(&self, content: &str) {
        let path = self.state_file();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// `cumulus` running inside the project with a clean environment
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cumulus").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env_remove("CUMULUS_CONFIG")
            .env_remove("CUMULUS_STATE_DIR")
            .env_remove("OS_REGION_NAME")
            .env_remove("OS_TENANT_ID")
            .env("OS_AUTH_TOKEN", "test-token")
            .env("OS_PROJECT_ID", "proj1")
            .env("NO_COLOR", "1");
        for service in ["NETWORKING", "VBS", "ELB", "COMPUTE", "AUTOSCALING"] {
            cmd.env_remove(format!("OS_ENDPOINT_{}", service));
        }
        cmd
    }
}
