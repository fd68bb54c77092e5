use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use serde::Serialize;

use crate::clean::{CANONICAL_COLUMNS, is_valid_collection_date};
use crate::error::KiraError;

const EXAMPLE_LOCATIONS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrossRefReport {
    pub metadata_rows: usize,
    pub sequences: usize,
    pub missing_sequences: Vec<String>,
    pub orphan_sequences: usize,
    pub first_collection_date: Option<String>,
    pub last_collection_date: Option<String>,
    pub distinct_locations: usize,
    pub example_locations: Vec<String>,
}

impl CrossRefReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_sequences.is_empty()
    }
}

pub fn fasta_accessions<R: BufRead>(reader: R) -> Result<HashSet<String>, KiraError> {
    let mut accessions = HashSet::new();
    for line in reader.lines() {
        let line = line.map_err(|err| KiraError::CrossReference(err.to_string()))?;
        if let Some(header) = line.strip_prefix('>') {
            if let Some(token) = header.split_whitespace().next() {
                accessions.insert(token.to_string());
            }
        }
    }
    Ok(accessions)
}

pub fn cross_reference<R: Read>(
    cleaned: R,
    accessions: &HashSet<String>,
) -> Result<CrossRefReport, KiraError> {
    let mut reader = csv::Reader::from_reader(cleaned);
    let headers = reader
        .headers()
        .map_err(|err| KiraError::CrossReference(err.to_string()))?;
    if headers.iter().ne(CANONICAL_COLUMNS) {
        return Err(KiraError::CrossReference(format!(
            "unexpected header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut report = CrossRefReport {
        sequences: accessions.len(),
        ..CrossRefReport::default()
    };
    let mut matched = HashSet::new();
    let mut locations = BTreeSet::new();
    for record in reader.records() {
        let record = record.map_err(|err| KiraError::CrossReference(err.to_string()))?;
        let accession = record.get(0).unwrap_or("");
        let location = record.get(2).unwrap_or("");
        let date = record.get(3).unwrap_or("");
        report.metadata_rows += 1;

        if accessions.contains(accession) {
            matched.insert(accession.to_string());
        } else {
            report.missing_sequences.push(accession.to_string());
        }
        if !location.is_empty() && !locations.contains(location) {
            locations.insert(location.to_string());
        }
        if is_valid_collection_date(date) {
            widen_range(&mut report, date);
        }
    }
    report.orphan_sequences = accessions.len() - matched.len();
    report.distinct_locations = locations.len();
    report.example_locations = locations.into_iter().take(EXAMPLE_LOCATIONS).collect();
    Ok(report)
}

fn widen_range(report: &mut CrossRefReport, date: &str) {
    let key = |value: &str| {
        let value = value.trim();
        format!("{value}{}", &"-01-01"[..10usize.saturating_sub(value.len()).min(6)])
    };
    let replace_first = report
        .first_collection_date
        .as_deref()
        .map(|current| key(date) < key(current))
        .unwrap_or(true);
    if replace_first {
        report.first_collection_date = Some(date.to_string());
    }
    let replace_last = report
        .last_collection_date
        .as_deref()
        .map(|current| key(date) > key(current))
        .unwrap_or(true);
    if replace_last {
        report.last_collection_date = Some(date.to_string());
    }
}

pub fn check_files(
    cleaned: &camino::Utf8Path,
    fasta: &camino::Utf8Path,
) -> Result<CrossRefReport, KiraError> {
    let fasta_file = File::open(fasta.as_std_path())
        .map_err(|err| KiraError::CrossReference(format!("open {fasta}: {err}")))?;
    let accessions = fasta_accessions(BufReader::new(fasta_file))?;
    let table = File::open(cleaned.as_std_path())
        .map_err(|err| KiraError::CrossReference(format!("open {cleaned}: {err}")))?;
    cross_reference(BufReader::new(table), &accessions)
}
