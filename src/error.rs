use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("invalid lineage identifier: {0}")]
    #[diagnostic(help("expected a PANGO label such as B.1.617.2 or XBB.1.5"))]
    InvalidLineage(String),

    #[error("invalid variant short name: {0}")]
    #[diagnostic(help("short names use lowercase letters, digits, '_' and '-'"))]
    InvalidShortName(String),

    #[error("duplicate variant short name: {0}")]
    DuplicateShortName(String),

    #[error("unknown variant: {0}")]
    UnknownVariant(String),

    #[error("variant registry is empty")]
    EmptyRegistry,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigValue(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("package integrity check failed: {0}")]
    Integrity(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("datasets command failed: {0}")]
    DatasetsCli(String),

    #[error("package extraction failed: {0}")]
    Extraction(String),

    #[error("metadata tabulation failed: {0}")]
    Tabulation(String),

    #[error("metadata schema error: {0}")]
    Schema(String),

    #[error("cross-reference check failed: {0}")]
    CrossReference(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KiraError::InvalidLineage(_)
                | KiraError::InvalidShortName(_)
                | KiraError::DuplicateShortName(_)
                | KiraError::UnknownVariant(_)
                | KiraError::EmptyRegistry
                | KiraError::ConfigRead(_)
                | KiraError::ConfigParse(_)
                | KiraError::ConfigValue(_)
        )
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            KiraError::NcbiHttp(_)
                | KiraError::NcbiStatus { .. }
                | KiraError::MissingTool(_)
                | KiraError::DatasetsCli(_)
        )
    }
}
