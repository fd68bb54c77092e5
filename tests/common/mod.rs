#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use kira_variant_datasets::app::{App, ProgressEvent, ProgressSink};
use kira_variant_datasets::config::FetchFilter;
use kira_variant_datasets::domain::MetadataSourceKind;
use kira_variant_datasets::error::KiraError;
use kira_variant_datasets::ncbi::{VirusDatasetClient, VirusPackageRequest};
use kira_variant_datasets::store::{DATA_REPORT, GENOME_FASTA, Store};

pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

// Serves a synthetic package per lineage and counts requests.
#[derive(Default)]
pub struct FixtureClient {
    pub requests: Mutex<Vec<VirusPackageRequest>>,
    pub failing: Vec<String>,
    pub corrupt: bool,
}

impl FixtureClient {
    pub fn failing(lineages: &[&str]) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failing: lineages.iter().map(|value| value.to_string()).collect(),
            corrupt: false,
        }
    }

    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl VirusDatasetClient for FixtureClient {
    fn download_virus_package(
        &self,
        request: &VirusPackageRequest,
        destination: &Path,
    ) -> Result<(), KiraError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.iter().any(|l| l == request.lineage.as_str()) {
            std::fs::write(destination, b"PK\x03\x04partial").unwrap();
            return Err(KiraError::NcbiStatus {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        let lineage = request.lineage.as_str();
        let members = [
            ("README.md", "NCBI Datasets package".to_string()),
            (GENOME_FASTA, fasta_for(lineage)),
            (DATA_REPORT, report_for(lineage)),
        ];
        let members: Vec<(&str, &str)> = members
            .iter()
            .map(|(name, content)| (*name, content.as_str()))
            .collect();
        if self.corrupt {
            write_stored_zip(destination, &members);
            let mut bytes = std::fs::read(destination).unwrap();
            let at = bytes
                .windows(8)
                .position(|window| window == b"ACGTACGT")
                .unwrap();
            bytes[at..at + 8].copy_from_slice(b"TTTTTTTT");
            std::fs::write(destination, bytes).unwrap();
        } else {
            write_zip(destination, &members);
        }
        Ok(())
    }
}

// Three records; the second lacks a collection date and the third has an
// unparseable one.
pub fn report_for(lineage: &str) -> String {
    format!(
        concat!(
            r#"{{"accession":"{l}-OK000001.1","virus":{{"organismName":"StrainX"}},"location":{{"geographicLocation":"LocY"}},"isolate":{{"collectionDate":"2021-06-01"}}}}"#,
            "\n",
            r#"{{"accession":"{l}-OK000002.1","virus":{{"organismName":"StrainZ"}}}}"#,
            "\n",
            r#"{{"accession":"{l}-OK000003.1","virus":{{"organismName":"StrainW"}},"location":{{"geographicLocation":"LocQ"}},"isolate":{{"collectionDate":"bad-date"}}}}"#,
            "\n"
        ),
        l = lineage
    )
}

pub fn fasta_for(lineage: &str) -> String {
    (1..=4)
        .map(|i| format!(">{lineage}-OK00000{i}.1 SARS-CoV-2 complete genome\nACGTACGT\n"))
        .collect()
}

pub fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn write_stored_zip(path: &Path, members: &[(&str, &str)]) {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

pub fn filter() -> FetchFilter {
    FetchFilter {
        taxon: "SARS-CoV-2".to_string(),
        host: "Homo sapiens".to_string(),
        released_since: None,
        fast_validation: true,
    }
}

pub fn app_in(
    temp: &tempfile::TempDir,
    client: FixtureClient,
    source: MetadataSourceKind,
) -> App<FixtureClient> {
    app_with_filter(temp, client, filter(), source)
}

pub fn app_with_filter(
    temp: &tempfile::TempDir,
    client: FixtureClient,
    filter: FetchFilter,
    source: MetadataSourceKind,
) -> App<FixtureClient> {
    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    App::new(Store::new(root), client, filter, source)
}
