use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::KiraError;
use crate::ncbi::{VirusDatasetClient, VirusPackageRequest};

#[derive(Debug, Clone)]
pub struct DatasetsCliClient {
    datasets: Option<PathBuf>,
}

impl DatasetsCliClient {
    pub fn new() -> Self {
        Self {
            datasets: find_in_path("datasets"),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            datasets: Some(program),
        }
    }

    pub fn version(&self) -> Option<String> {
        self.datasets
            .as_ref()
            .and_then(|path| tool_version(path, &["--version"]))
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), KiraError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| KiraError::DatasetsCli(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {} ({})", program.display(), output.status)
        } else {
            stderr
        };
        Err(KiraError::DatasetsCli(message))
    }
}

impl Default for DatasetsCliClient {
    fn default() -> Self {
        Self::new()
    }
}

impl VirusDatasetClient for DatasetsCliClient {
    fn download_virus_package(
        &self,
        request: &VirusPackageRequest,
        destination: &Path,
    ) -> Result<(), KiraError> {
        let datasets = self
            .datasets
            .as_ref()
            .ok_or_else(|| KiraError::MissingTool("datasets".to_string()))?;
        let args = download_args(request, destination);
        self.run_cmd(datasets.as_path(), &args)
    }
}

pub fn download_args(request: &VirusPackageRequest, destination: &Path) -> Vec<String> {
    let mut args = vec![
        "download".to_string(),
        "virus".to_string(),
        "genome".to_string(),
        "taxon".to_string(),
        request.taxon.clone(),
        "--lineage".to_string(),
        request.lineage.to_string(),
        "--host".to_string(),
        request.host.clone(),
    ];
    if request.complete_only {
        args.push("--complete-only".to_string());
    }
    if let Some(date) = request.released_since {
        args.push("--released-after".to_string());
        args.push(date.format("%m/%d/%Y").to_string());
    }
    if request.fast_validation {
        args.push("--fast-zip-validation".to_string());
    }
    args.push("--no-progressbar".to_string());
    args.push("--filename".to_string());
    args.push(destination.to_string_lossy().to_string());
    args
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.is_file() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() { None } else { Some(stdout) }
}
