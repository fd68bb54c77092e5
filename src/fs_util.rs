use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::KiraError;

fn open_archive(zip_path: &Path) -> Result<ZipArchive<fs::File>, KiraError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| KiraError::Extraction(format!("open zip {}: {err}", zip_path.display())))?;
    ZipArchive::new(file)
        .map_err(|err| KiraError::Extraction(format!("read zip {}: {err}", zip_path.display())))
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), KiraError> {
    let mut archive = open_archive(zip_path)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| KiraError::Extraction(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(KiraError::Extraction(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| KiraError::Extraction(format!("{}: {err}", entry.name())))?;
    }
    Ok(())
}

pub fn validate_zip(zip_path: &Path) -> Result<(), KiraError> {
    let mut archive = open_archive(zip_path).map_err(integrity)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| KiraError::Integrity(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| KiraError::Integrity(format!("{}: {err}", entry.name())))?;
    }
    Ok(())
}

pub fn validate_zip_fast(zip_path: &Path, required: &[&str]) -> Result<(), KiraError> {
    let archive = open_archive(zip_path).map_err(integrity)?;
    for name in required {
        if archive.index_for_name(name).is_none() {
            return Err(KiraError::Integrity(format!(
                "{} is missing {name}",
                zip_path.display()
            )));
        }
    }
    Ok(())
}

fn integrity(err: KiraError) -> KiraError {
    match err {
        KiraError::Extraction(message) => KiraError::Integrity(message),
        other => other,
    }
}
