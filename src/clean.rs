use std::io::{Read, Write};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::KiraError;

pub const CANONICAL_COLUMNS: [&str; 4] = ["accession", "strain_name", "location", "collection_date"];

const ACCESSION: usize = 0;
const COLLECTION_DATE: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub retained: usize,
    pub dropped: usize,
}

pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' { '_' } else { ch })
        .collect()
}

pub fn canonical_index(raw: &str) -> Option<usize> {
    match normalize_header(raw).as_str() {
        "accession" => Some(0),
        "virus_name" => Some(1),
        "geographic_location" | "geo_location" => Some(2),
        "isolate_collection_date" => Some(3),
        _ => None,
    }
}

pub fn is_valid_collection_date(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let parts: Vec<&str> = value.split('-').collect();
    let digits =
        |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
    let (year, month, day) = match *parts.as_slice() {
        [y] if digits(y, 4) => (y, "01", "01"),
        [y, m] if digits(y, 4) && digits(m, 2) => (y, m, "01"),
        [y, m, d] if digits(y, 4) && digits(m, 2) && digits(d, 2) => (y, m, d),
        _ => return false,
    };
    NaiveDate::parse_from_str(&format!("{year}-{month}-{day}"), "%Y-%m-%d").is_ok()
}

fn column_mapping(headers: &csv::StringRecord) -> Result<[usize; 4], KiraError> {
    let mut positions: [Option<usize>; 4] = [None; 4];
    for (raw_index, header) in headers.iter().enumerate() {
        let canonical = canonical_index(header)
            .ok_or_else(|| KiraError::Schema(format!("unknown column '{header}'")))?;
        if positions[canonical].replace(raw_index).is_some() {
            return Err(KiraError::Schema(format!(
                "column '{}' appears more than once",
                CANONICAL_COLUMNS[canonical]
            )));
        }
    }
    let mut mapping = [0usize; 4];
    for (canonical, position) in positions.iter().enumerate() {
        mapping[canonical] = position.ok_or_else(|| {
            KiraError::Schema(format!("missing column '{}'", CANONICAL_COLUMNS[canonical]))
        })?;
    }
    Ok(mapping)
}

pub fn clean_table<R: Read, W: Write>(input: R, output: W) -> Result<CleanStats, KiraError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(input);
    let headers = reader
        .headers()
        .map_err(|err| KiraError::Schema(err.to_string()))?
        .clone();
    let mapping = column_mapping(&headers)?;

    let mut writer = csv::Writer::from_writer(output);
    writer
        .write_record(CANONICAL_COLUMNS)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;

    let mut stats = CleanStats::default();
    for record in reader.records() {
        let record = record.map_err(|err| KiraError::Schema(err.to_string()))?;
        let row: Vec<&str> = mapping
            .iter()
            .map(|&index| record.get(index).unwrap_or(""))
            .collect();
        if !is_valid_collection_date(row[COLLECTION_DATE]) {
            tracing::debug!(
                accession = row[ACCESSION],
                collection_date = row[COLLECTION_DATE],
                "dropping row without a valid collection date"
            );
            stats.dropped += 1;
            continue;
        }
        writer
            .write_record(&row)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        stats.retained += 1;
    }
    writer
        .flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(stats)
}
