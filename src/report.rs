use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const RAW_HEADERS: [&str; 4] = [
    "Accession",
    "Virus Name",
    "Geographic Location",
    "Isolate Collection date",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusReportRecord {
    pub accession: String,
    #[serde(default)]
    pub virus: Option<VirusInfo>,
    #[serde(default)]
    pub location: Option<LocationInfo>,
    #[serde(default)]
    pub isolate: Option<IsolateInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusInfo {
    #[serde(default)]
    pub organism_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    #[serde(default)]
    pub geographic_location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolateInfo {
    #[serde(default)]
    pub collection_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMetadataRow {
    pub accession: String,
    pub virus_name: String,
    pub geo_location: String,
    pub collection_date: String,
}

impl From<VirusReportRecord> for RawMetadataRow {
    fn from(record: VirusReportRecord) -> Self {
        Self {
            accession: record.accession,
            virus_name: record
                .virus
                .and_then(|virus| virus.organism_name)
                .unwrap_or_default(),
            geo_location: record
                .location
                .and_then(|location| location.geographic_location)
                .unwrap_or_default(),
            collection_date: record
                .isolate
                .and_then(|isolate| isolate.collection_date)
                .unwrap_or_default(),
        }
    }
}

impl RawMetadataRow {
    pub fn fields(&self) -> [&str; 4] {
        [
            &self.accession,
            &self.virus_name,
            &self.geo_location,
            &self.collection_date,
        ]
    }
}

pub fn parse_report<R: BufRead>(reader: R, origin: &str) -> Result<Vec<RawMetadataRow>, KiraError> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line
            .map_err(|err| KiraError::Tabulation(format!("{origin}: line {}: {err}", index + 1)))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: VirusReportRecord = serde_json::from_str(&line)
            .map_err(|err| KiraError::Tabulation(format!("{origin}: line {}: {err}", index + 1)))?;
        rows.push(record.into());
    }
    Ok(rows)
}
