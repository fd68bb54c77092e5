use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{FetcherKind, MetadataSourceKind, ShortName, VariantDescriptor};
use crate::error::KiraError;

pub const CONFIG_FILE: &str = "kira-variants.json";
pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_TAXON: &str = "SARS-CoV-2";
pub const DEFAULT_HOST: &str = "Homo sapiens";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_root: Option<String>,
    #[serde(default)]
    pub taxon: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub released_since: Option<String>,
    #[serde(default)]
    pub metadata_source: Option<MetadataSourceKind>,
    #[serde(default)]
    pub fetcher: Option<FetcherKind>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub fast_zip_validation: Option<bool>,
    #[serde(default)]
    pub variants: Option<Vec<VariantEntry>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VariantEntry {
    pub lineage: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFilter {
    pub taxon: String,
    pub host: String,
    pub released_since: Option<NaiveDate>,
    pub fast_validation: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_root: Utf8PathBuf,
    pub filter: FetchFilter,
    pub metadata_source: MetadataSourceKind,
    pub fetcher: FetcherKind,
    pub timeout: Duration,
    pub variants: Vec<VariantDescriptor>,
}

impl ResolvedConfig {
    pub fn select(&mut self, names: &[String]) -> Result<(), KiraError> {
        if names.is_empty() {
            return Ok(());
        }
        let wanted = names
            .iter()
            .map(|name| name.parse::<ShortName>())
            .collect::<Result<Vec<_>, KiraError>>()?;
        for name in &wanted {
            if !self.variants.iter().any(|v| &v.short_name == name) {
                return Err(KiraError::UnknownVariant(name.to_string()));
            }
        }
        self.variants.retain(|v| wanted.contains(&v.short_name));
        Ok(())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(KiraError::ConfigValue(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let variants = match config.variants {
            Some(entries) => entries
                .into_iter()
                .map(|entry| VariantDescriptor::new(&entry.lineage, &entry.short_name))
                .collect::<Result<Vec<_>, KiraError>>()?,
            None => default_variants()?,
        };
        validate_registry(&variants)?;

        let released_since = config
            .released_since
            .map(|value| {
                NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                    KiraError::ConfigValue(format!("released_since is not a date: {value}"))
                })
            })
            .transpose()?;

        let host = non_empty(config.host, DEFAULT_HOST, "host")?;
        let taxon = non_empty(config.taxon, DEFAULT_TAXON, "taxon")?;
        let timeout_secs = config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(KiraError::ConfigValue(
                "timeout_secs must be positive".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            data_root: Utf8PathBuf::from(
                config
                    .data_root
                    .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string()),
            ),
            filter: FetchFilter {
                taxon,
                host,
                released_since,
                fast_validation: config.fast_zip_validation.unwrap_or(true),
            },
            metadata_source: config.metadata_source.unwrap_or_default(),
            fetcher: config.fetcher.unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs),
            variants,
        })
    }
}

pub fn validate_registry(variants: &[VariantDescriptor]) -> Result<(), KiraError> {
    if variants.is_empty() {
        return Err(KiraError::EmptyRegistry);
    }
    let mut seen = HashSet::new();
    for variant in variants {
        if !seen.insert(variant.short_name.as_str()) {
            return Err(KiraError::DuplicateShortName(
                variant.short_name.to_string(),
            ));
        }
    }
    Ok(())
}

pub fn default_variants() -> Result<Vec<VariantDescriptor>, KiraError> {
    [
        ("B.1", "b1"),
        ("B.1.1.7", "alpha"),
        ("B.1.351", "beta"),
        ("B.1.617.2", "delta"),
        ("BA.1", "omicron_ba1"),
        ("BA.2", "ba2"),
        ("XBB.1.5", "xbb15"),
    ]
    .into_iter()
    .map(|(lineage, short_name)| VariantDescriptor::new(lineage, short_name))
    .collect()
}

fn non_empty(value: Option<String>, default: &str, field: &str) -> Result<String, KiraError> {
    match value {
        None => Ok(default.to_string()),
        Some(value) if value.trim().is_empty() => {
            Err(KiraError::ConfigValue(format!("{field} must not be empty")))
        }
        Some(value) => Ok(value.trim().to_string()),
    }
}
