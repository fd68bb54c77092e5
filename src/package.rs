use std::ffi::OsString;
use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;

use crate::domain::VariantDescriptor;
use crate::error::KiraError;
use crate::fs_util;
use crate::store::{DATA_REPORT, GENOME_FASTA, Store, remove_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPackage {
    pub dir: Utf8PathBuf,
    pub genome_fasta: Utf8PathBuf,
    pub data_report: Utf8PathBuf,
}

pub fn extract_package(
    store: &Store,
    variant: &VariantDescriptor,
) -> Result<ExtractedPackage, KiraError> {
    let name = &variant.short_name;
    let zip_path = store.raw_package_path(name);
    if !zip_path.as_std_path().is_file() {
        return Err(KiraError::Extraction(format!(
            "raw package missing: {zip_path}"
        )));
    }

    let variant_dir = store.variant_dir(name);
    let staging = Store::temp_dir_in(&variant_dir)?;
    fs_util::extract_zip(zip_path.as_std_path(), staging.path())?;

    for required in [GENOME_FASTA, DATA_REPORT] {
        if !staging.path().join(required).is_file() {
            return Err(KiraError::Extraction(format!(
                "{zip_path} does not contain {required}"
            )));
        }
    }

    let mut kept: Vec<OsString> = [store.raw_metadata_path(name), store.clean_metadata_path(name)]
        .iter()
        .filter_map(|path| path.file_name().map(OsString::from))
        .collect();
    if let Some(staging_name) = staging.path().file_name() {
        kept.push(staging_name.to_os_string());
    }
    for entry in read_entries(variant_dir.as_std_path())? {
        if kept.contains(&entry.file_name()) {
            continue;
        }
        remove_path(&entry.path())
            .map_err(|err| KiraError::Filesystem(format!("{}: {err}", entry.path().display())))?;
    }

    for entry in read_entries(staging.path())? {
        let target = variant_dir.as_std_path().join(entry.file_name());
        fs::rename(entry.path(), &target)
            .map_err(|err| KiraError::Filesystem(format!("{}: {err}", target.display())))?;
    }

    Ok(ExtractedPackage {
        dir: variant_dir,
        genome_fasta: store.genome_fasta_path(name),
        data_report: store.data_report_path(name),
    })
}

fn read_entries(dir: &Path) -> Result<Vec<fs::DirEntry>, KiraError> {
    fs::read_dir(dir)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|err| KiraError::Filesystem(format!("{}: {err}", dir.display())))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::fs_util::testing::write_zip;

    fn setup() -> (tempfile::TempDir, Store, VariantDescriptor) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = Store::new(root);
        std::fs::create_dir_all(store.raw_dir()).unwrap();
        let variant = VariantDescriptor::new("B.1.1.7", "alpha").unwrap();
        (temp, store, variant)
    }

    #[test]
    fn extraction_overwrites_previous_contents() {
        let (_temp, store, variant) = setup();
        let zip_path = store.raw_package_path(&variant.short_name);
        write_zip(
            zip_path.as_std_path(),
            &[
                ("README.md", "package"),
                (GENOME_FASTA, ">A1\nACGT\n"),
                (DATA_REPORT, "{\"accession\":\"A1\"}\n"),
                ("ncbi_dataset/data/stale.txt", "old"),
            ],
        );
        extract_package(&store, &variant).unwrap();

        write_zip(
            zip_path.as_std_path(),
            &[
                (GENOME_FASTA, ">A2\nACGT\n"),
                (DATA_REPORT, "{\"accession\":\"A2\"}\n"),
            ],
        );
        let table = store.raw_metadata_path(&variant.short_name);
        std::fs::write(&table, "kept").unwrap();

        let extracted = extract_package(&store, &variant).unwrap();
        assert_eq!(
            std::fs::read_to_string(&extracted.genome_fasta).unwrap(),
            ">A2\nACGT\n"
        );
        assert!(!extracted.dir.join("ncbi_dataset/data/stale.txt").exists());
        assert_eq!(std::fs::read_to_string(&table).unwrap(), "kept");
        let leftovers = std::fs::read_dir(&extracted.dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".kira-vd"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn entries_missing_from_new_package_are_removed() {
        let (_temp, store, variant) = setup();
        let name = &variant.short_name;
        let zip_path = store.raw_package_path(name);
        write_zip(
            zip_path.as_std_path(),
            &[
                ("README.md", "package"),
                ("md5sum.txt", "abc  ncbi_dataset/data/genomic.fna"),
                (GENOME_FASTA, ">A1\nACGT\n"),
                (DATA_REPORT, "{\"accession\":\"A1\"}\n"),
            ],
        );
        extract_package(&store, &variant).unwrap();
        std::fs::write(store.raw_metadata_path(name), "raw table").unwrap();
        std::fs::write(store.clean_metadata_path(name), "clean table").unwrap();

        write_zip(
            zip_path.as_std_path(),
            &[
                (GENOME_FASTA, ">A2\nACGT\n"),
                (DATA_REPORT, "{\"accession\":\"A2\"}\n"),
            ],
        );
        let extracted = extract_package(&store, &variant).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(&extracted.dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["alpha_meta.tsv", "alpha_meta_clean.csv", "ncbi_dataset"]
        );
        assert_eq!(
            std::fs::read_to_string(store.clean_metadata_path(name)).unwrap(),
            "clean table"
        );
    }

    #[test]
    fn missing_members_fail_extraction() {
        let (_temp, store, variant) = setup();
        write_zip(
            store.raw_package_path(&variant.short_name).as_std_path(),
            &[(GENOME_FASTA, ">A1\nACGT\n")],
        );
        let err = extract_package(&store, &variant).unwrap_err();
        assert_matches!(err, KiraError::Extraction(message) if message.contains("data_report"));
    }

    #[test]
    fn missing_package_fails_extraction() {
        let (_temp, store, variant) = setup();
        let err = extract_package(&store, &variant).unwrap_err();
        assert_matches!(err, KiraError::Extraction(_));
    }
}
