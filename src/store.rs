use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};

use crate::domain::ShortName;
use crate::error::KiraError;

pub const GENOME_FASTA: &str = "ncbi_dataset/data/genomic.fna";
pub const DATA_REPORT: &str = "ncbi_dataset/data/data_report.jsonl";

const TEMP_PREFIX: &str = ".kira-vd";

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn raw_dir(&self) -> Utf8PathBuf {
        self.root.join("raw")
    }

    pub fn raw_package_path(&self, name: &ShortName) -> Utf8PathBuf {
        self.raw_dir().join(format!("{name}.zip"))
    }

    pub fn variant_dir(&self, name: &ShortName) -> Utf8PathBuf {
        self.root.join(name.as_str())
    }

    pub fn genome_fasta_path(&self, name: &ShortName) -> Utf8PathBuf {
        self.variant_dir(name).join(GENOME_FASTA)
    }

    pub fn data_report_path(&self, name: &ShortName) -> Utf8PathBuf {
        self.variant_dir(name).join(DATA_REPORT)
    }

    pub fn raw_metadata_path(&self, name: &ShortName) -> Utf8PathBuf {
        self.variant_dir(name).join(format!("{name}_meta.tsv"))
    }

    pub fn clean_metadata_path(&self, name: &ShortName) -> Utf8PathBuf {
        self.variant_dir(name).join(format!("{name}_meta_clean.csv"))
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), KiraError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {path}: {err}")))
    }

    pub fn temp_file_for(path: &Utf8Path) -> Result<NamedTempFile, KiraError> {
        let parent = path
            .parent()
            .ok_or_else(|| KiraError::Filesystem(format!("invalid destination path {path}")))?;
        Self::ensure_dir(parent)?;
        let suffix = path
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn persist(temp: NamedTempFile, path: &Utf8Path) -> Result<(), KiraError> {
        temp.persist(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("persist {path}: {}", err.error)))?;
        Ok(())
    }

    pub fn write_atomic<F>(path: &Utf8Path, write: F) -> Result<(), KiraError>
    where
        F: FnOnce(&mut dyn Write) -> Result<(), KiraError>,
    {
        let temp = Self::temp_file_for(path)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            write(&mut writer)?;
            writer
                .flush()
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::persist(temp, path)
    }

    pub fn temp_dir_in(parent: &Utf8Path) -> Result<tempfile::TempDir, KiraError> {
        Self::ensure_dir(parent)?;
        Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(parent.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }
}

pub fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
