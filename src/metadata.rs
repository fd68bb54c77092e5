use std::fs::File;
use std::io::{BufReader, Write};

use crate::domain::{MetadataSourceKind, VariantDescriptor};
use crate::error::KiraError;
use crate::report::{RAW_HEADERS, RawMetadataRow, parse_report};
use crate::store::{DATA_REPORT, Store};

pub trait MetadataSource {
    fn kind(&self) -> MetadataSourceKind;
    fn rows(&self, store: &Store, variant: &VariantDescriptor)
    -> Result<Vec<RawMetadataRow>, KiraError>;
}

pub struct ReportFileSource;

impl MetadataSource for ReportFileSource {
    fn kind(&self) -> MetadataSourceKind {
        MetadataSourceKind::Report
    }

    fn rows(
        &self,
        store: &Store,
        variant: &VariantDescriptor,
    ) -> Result<Vec<RawMetadataRow>, KiraError> {
        let path = store.data_report_path(&variant.short_name);
        let file = File::open(path.as_std_path())
            .map_err(|err| KiraError::Tabulation(format!("open {path}: {err}")))?;
        parse_report(BufReader::new(file), path.as_str())
    }
}

pub struct PackageArchiveSource;

impl MetadataSource for PackageArchiveSource {
    fn kind(&self) -> MetadataSourceKind {
        MetadataSourceKind::Package
    }

    fn rows(
        &self,
        store: &Store,
        variant: &VariantDescriptor,
    ) -> Result<Vec<RawMetadataRow>, KiraError> {
        let path = store.raw_package_path(&variant.short_name);
        let file = File::open(path.as_std_path())
            .map_err(|err| KiraError::Tabulation(format!("open {path}: {err}")))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|err| KiraError::Tabulation(format!("read {path}: {err}")))?;
        let entry = archive
            .by_name(DATA_REPORT)
            .map_err(|err| KiraError::Tabulation(format!("{path}: {DATA_REPORT}: {err}")))?;
        parse_report(BufReader::new(entry), &format!("{path}:{DATA_REPORT}"))
    }
}

pub fn source_for(kind: MetadataSourceKind) -> Box<dyn MetadataSource> {
    match kind {
        MetadataSourceKind::Report => Box::new(ReportFileSource),
        MetadataSourceKind::Package => Box::new(PackageArchiveSource),
    }
}

pub fn write_raw_table<W: Write>(writer: W, rows: &[RawMetadataRow]) -> Result<(), KiraError> {
    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    tsv.write_record(RAW_HEADERS)
        .map_err(|err| KiraError::Tabulation(err.to_string()))?;
    for row in rows {
        tsv.write_record(row.fields())
            .map_err(|err| KiraError::Tabulation(err.to_string()))?;
    }
    tsv.flush()
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn generate_table(
    source: &dyn MetadataSource,
    store: &Store,
    variant: &VariantDescriptor,
) -> Result<usize, KiraError> {
    let rows = source.rows(store, variant)?;
    let path = store.raw_metadata_path(&variant.short_name);
    Store::write_atomic(&path, |writer| write_raw_table(writer, &rows))?;
    Ok(rows.len())
}
