use std::fs::File;
use std::io::BufReader;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clean::{CleanStats, clean_table};
use crate::config::{FetchFilter, validate_registry};
use crate::crossref::{CrossRefReport, check_files};
use crate::domain::{MetadataSourceKind, Stage, VariantDescriptor};
use crate::error::KiraError;
use crate::fs_util;
use crate::metadata::{self, MetadataSource};
use crate::ncbi::{VirusDatasetClient, VirusPackageRequest};
use crate::package::extract_package;
use crate::store::{DATA_REPORT, GENOME_FASTA, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Done,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantOutcome {
    pub short_name: String,
    pub lineage: String,
    pub stage: Stage,
    pub status: OutcomeStatus,
    pub detail: Option<String>,
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<CrossRefReport>,
}

impl VariantOutcome {
    fn new(variant: &VariantDescriptor, stage: Stage, status: OutcomeStatus) -> Self {
        Self {
            short_name: variant.short_name.to_string(),
            lineage: variant.lineage.to_string(),
            stage,
            status,
            detail: None,
            path: None,
            rows: None,
            dropped: None,
            check: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub operation: String,
    pub items: Vec<VariantOutcome>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status == OutcomeStatus::Failed)
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug)]
struct Failure {
    stage: Stage,
    error: KiraError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, Failure>;
}

impl<T> AtStage<T> for Result<T, KiraError> {
    fn at(self, stage: Stage) -> Result<T, Failure> {
        self.map_err(|error| Failure { stage, error })
    }
}

pub struct App<C: VirusDatasetClient> {
    store: Store,
    client: C,
    filter: FetchFilter,
    metadata_source: Box<dyn MetadataSource>,
}

impl<C: VirusDatasetClient> App<C> {
    pub fn new(store: Store, client: C, filter: FetchFilter, source: MetadataSourceKind) -> Self {
        Self {
            store,
            client,
            filter,
            metadata_source: metadata::source_for(source),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn acquire(
        &self,
        variants: &[VariantDescriptor],
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        self.for_each_variant("acquire", variants, sink, |variant| {
            self.acquire_one(variant, sink)
        })
    }

    pub fn tabulate(
        &self,
        variants: &[VariantDescriptor],
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        self.for_each_variant("tabulate", variants, sink, |variant| {
            self.tabulate_one(variant, sink)
        })
    }

    pub fn clean(
        &self,
        variants: &[VariantDescriptor],
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        self.for_each_variant("clean", variants, sink, |variant| {
            self.clean_one(variant, sink)
        })
    }

    pub fn check(
        &self,
        variants: &[VariantDescriptor],
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        self.for_each_variant("check", variants, sink, |variant| {
            self.check_one(variant, sink)
        })
    }

    pub fn run(
        &self,
        variants: &[VariantDescriptor],
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, KiraError> {
        self.for_each_variant("run", variants, sink, |variant| {
            let acquired = self.acquire_one(variant, sink)?;
            self.tabulate_one(variant, sink)?;
            let mut cleaned = self.clean_one(variant, sink)?;
            if acquired.status == OutcomeStatus::Skipped {
                cleaned.detail = cleaned
                    .detail
                    .map(|detail| format!("{detail}; package already present"));
            }
            Ok(cleaned)
        })
    }

    fn for_each_variant<F>(
        &self,
        operation: &str,
        variants: &[VariantDescriptor],
        sink: &dyn ProgressSink,
        mut step: F,
    ) -> Result<RunSummary, KiraError>
    where
        F: FnMut(&VariantDescriptor) -> Result<VariantOutcome, Failure>,
    {
        validate_registry(variants)?;
        let single = variants.len() == 1;
        let mut items = Vec::with_capacity(variants.len());
        for variant in variants {
            sink.event(ProgressEvent {
                message: format!("phase=Resolve; {operation} {variant}"),
                elapsed: None,
            });
            match step(variant) {
                Ok(outcome) => items.push(outcome),
                Err(failure) if single => return Err(failure.error),
                Err(failure) => {
                    sink.event(ProgressEvent {
                        message: format!(
                            "phase={}; {} failed: {}",
                            failure.stage, variant.short_name, failure.error
                        ),
                        elapsed: None,
                    });
                    let mut outcome =
                        VariantOutcome::new(variant, failure.stage, OutcomeStatus::Failed);
                    outcome.detail = Some(failure.error.to_string());
                    items.push(outcome);
                }
            }
        }
        Ok(RunSummary {
            operation: operation.to_string(),
            items,
        })
    }

    fn acquire_one(
        &self,
        variant: &VariantDescriptor,
        sink: &dyn ProgressSink,
    ) -> Result<VariantOutcome, Failure> {
        let path = self.store.raw_package_path(&variant.short_name);
        if path.as_std_path().exists() {
            sink.event(ProgressEvent {
                message: format!("phase=Store; {} already downloaded", variant.short_name),
                elapsed: None,
            });
            let mut outcome = VariantOutcome::new(variant, Stage::Download, OutcomeStatus::Skipped);
            outcome.detail = Some("already present".to_string());
            outcome.path = Some(path.to_string());
            return Ok(outcome);
        }

        let temp = Store::temp_file_for(&path).at(Stage::Download)?;
        let request = VirusPackageRequest {
            taxon: self.filter.taxon.clone(),
            lineage: variant.lineage.clone(),
            host: self.filter.host.clone(),
            complete_only: true,
            released_since: self.filter.released_since,
            fast_validation: self.filter.fast_validation,
        };

        sink.event(ProgressEvent {
            message: format!("ncbi.request lineage={}", variant.lineage),
            elapsed: None,
        });
        let start = Instant::now();
        self.client
            .download_virus_package(&request, temp.path())
            .at(Stage::Download)?;
        let elapsed = start.elapsed();
        sink.event(ProgressEvent {
            message: format!("ncbi.response latency_ms={}", elapsed.as_millis()),
            elapsed: Some(elapsed),
        });

        sink.event(ProgressEvent {
            message: "phase=Verify; validating package".to_string(),
            elapsed: None,
        });
        let size = std::fs::metadata(temp.path())
            .map(|meta| meta.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(Failure {
                stage: Stage::Download,
                error: KiraError::Integrity(format!("empty package for {}", variant.lineage)),
            });
        }
        if request.fast_validation {
            fs_util::validate_zip_fast(temp.path(), &[GENOME_FASTA, DATA_REPORT])
                .at(Stage::Download)?;
        } else {
            fs_util::validate_zip(temp.path()).at(Stage::Download)?;
        }

        Store::persist(temp, &path).at(Stage::Download)?;
        sink.event(ProgressEvent {
            message: format!("phase=Store; wrote {path}"),
            elapsed: None,
        });

        let mut outcome = VariantOutcome::new(variant, Stage::Download, OutcomeStatus::Done);
        outcome.detail = Some(format!("{size} bytes"));
        outcome.path = Some(path.to_string());
        Ok(outcome)
    }

    fn tabulate_one(
        &self,
        variant: &VariantDescriptor,
        sink: &dyn ProgressSink,
    ) -> Result<VariantOutcome, Failure> {
        sink.event(ProgressEvent {
            message: format!("phase=Prepare; extracting {}", variant.short_name),
            elapsed: None,
        });
        let extracted = extract_package(&self.store, variant).at(Stage::Extract)?;

        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; tabulating from {:?} source",
                self.metadata_source.kind()
            ),
            elapsed: None,
        });
        let rows = metadata::generate_table(self.metadata_source.as_ref(), &self.store, variant)
            .at(Stage::Tabulate)?;

        let mut outcome = VariantOutcome::new(variant, Stage::Tabulate, OutcomeStatus::Done);
        outcome.rows = Some(rows);
        outcome.detail = Some(format!("{rows} records, sequences in {}", extracted.genome_fasta));
        outcome.path = Some(self.store.raw_metadata_path(&variant.short_name).to_string());
        Ok(outcome)
    }

    fn clean_one(
        &self,
        variant: &VariantDescriptor,
        sink: &dyn ProgressSink,
    ) -> Result<VariantOutcome, Failure> {
        let raw_path = self.store.raw_metadata_path(&variant.short_name);
        let clean_path = self.store.clean_metadata_path(&variant.short_name);
        let input = File::open(raw_path.as_std_path())
            .map_err(|err| KiraError::Schema(format!("open {raw_path}: {err}")))
            .at(Stage::Clean)?;

        let mut stats = CleanStats::default();
        Store::write_atomic(&clean_path, |writer| {
            stats = clean_table(BufReader::new(input), writer)?;
            Ok(())
        })
        .at(Stage::Clean)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; {} kept {} rows, dropped {}",
                variant.short_name, stats.retained, stats.dropped
            ),
            elapsed: None,
        });

        let mut outcome = VariantOutcome::new(variant, Stage::Clean, OutcomeStatus::Done);
        outcome.rows = Some(stats.retained);
        outcome.dropped = Some(stats.dropped);
        outcome.detail = Some(format!(
            "{} rows kept, {} without collection date",
            stats.retained, stats.dropped
        ));
        outcome.path = Some(clean_path.to_string());
        Ok(outcome)
    }

    fn check_one(
        &self,
        variant: &VariantDescriptor,
        sink: &dyn ProgressSink,
    ) -> Result<VariantOutcome, Failure> {
        let name = &variant.short_name;
        let report = check_files(
            &self.store.clean_metadata_path(name),
            &self.store.genome_fasta_path(name),
        )
        .at(Stage::Check)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Verify; {name}: {} rows, {} sequences, {} missing",
                report.metadata_rows,
                report.sequences,
                report.missing_sequences.len()
            ),
            elapsed: None,
        });

        let status = if report.is_consistent() {
            OutcomeStatus::Done
        } else {
            OutcomeStatus::Failed
        };
        let mut outcome = VariantOutcome::new(variant, Stage::Check, status);
        outcome.rows = Some(report.metadata_rows);
        outcome.detail = Some(match report.missing_sequences.first() {
            None => format!(
                "{} rows paired across {} locations, {} sequences without metadata",
                report.metadata_rows, report.distinct_locations, report.orphan_sequences
            ),
            Some(first) => format!(
                "{} accessions without a sequence (first: {first})",
                report.missing_sequences.len()
            ),
        });
        outcome.check = Some(report);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;
    use crate::fs_util::testing::write_zip;
    use crate::output::JsonOutput;

    #[derive(Default)]
    struct MockClient {
        calls: Mutex<Vec<String>>,
    }

    impl VirusDatasetClient for MockClient {
        fn download_virus_package(
            &self,
            request: &VirusPackageRequest,
            destination: &Path,
        ) -> Result<(), KiraError> {
            self.calls.lock().unwrap().push(request.lineage.to_string());
            if request.lineage.as_str() == "BA.2" {
                std::fs::write(destination, b"trunc").unwrap();
                return Err(KiraError::NcbiHttp("connection reset".to_string()));
            }
            write_zip(
                destination,
                &[
                    (GENOME_FASTA, ">A1 genome\nACGT\n>A2 genome\nACGT\n"),
                    (
                        DATA_REPORT,
                        concat!(
                            r#"{"accession":"A1","virus":{"organismName":"StrainX"},"location":{"geographicLocation":"LocY"},"isolate":{"collectionDate":"2021-06-01"}}"#,
                            "\n",
                            r#"{"accession":"A2","isolate":{"collectionDate":"bad-date"}}"#,
                            "\n"
                        ),
                    ),
                ],
            );
            Ok(())
        }
    }

    fn app(temp: &tempfile::TempDir) -> App<MockClient> {
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let filter = FetchFilter {
            taxon: "SARS-CoV-2".to_string(),
            host: "Homo sapiens".to_string(),
            released_since: None,
            fast_validation: true,
        };
        App::new(
            Store::new(root),
            MockClient::default(),
            filter,
            MetadataSourceKind::Report,
        )
    }

    #[test]
    fn run_produces_cleaned_table() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(&temp);
        let variants = vec![VariantDescriptor::new("B.1.617.2", "delta").unwrap()];

        let summary = app.run(&variants, &JsonOutput).unwrap();
        assert!(!summary.has_failures());
        assert_eq!(summary.items[0].rows, Some(1));
        assert_eq!(summary.items[0].dropped, Some(1));

        let name = &variants[0].short_name;
        let cleaned =
            std::fs::read_to_string(app.store().clean_metadata_path(name)).unwrap();
        assert_eq!(
            cleaned,
            "accession,strain_name,location,collection_date\nA1,StrainX,LocY,2021-06-01\n"
        );

        let check = app.check(&variants, &JsonOutput).unwrap();
        assert_eq!(check.items[0].status, OutcomeStatus::Done);
        let report = check.items[0].check.as_ref().unwrap();
        assert_eq!(report.orphan_sequences, 1);
    }

    #[test]
    fn batch_failure_is_attributed_and_leaves_no_package() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(&temp);
        let variants = vec![
            VariantDescriptor::new("BA.2", "ba2").unwrap(),
            VariantDescriptor::new("B.1.617.2", "delta").unwrap(),
        ];

        let summary = app.acquire(&variants, &JsonOutput).unwrap();
        assert!(summary.has_failures());
        assert_eq!(summary.items[0].status, OutcomeStatus::Failed);
        assert_eq!(summary.items[0].stage, Stage::Download);
        assert_eq!(summary.items[1].status, OutcomeStatus::Done);

        let raw_dir = app.store().raw_dir();
        let names: Vec<String> = std::fs::read_dir(raw_dir.as_std_path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["delta.zip".to_string()]);
    }

    #[test]
    fn single_variant_failure_fails_the_run() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(&temp);
        let variants = vec![VariantDescriptor::new("BA.2", "ba2").unwrap()];

        let err = app.acquire(&variants, &JsonOutput).unwrap_err();
        assert_matches!(err, KiraError::NcbiHttp(_));
    }

    #[test]
    fn tabulate_without_package_fails_at_extract() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(&temp);
        let variants = vec![
            VariantDescriptor::new("B.1.617.2", "delta").unwrap(),
            VariantDescriptor::new("BA.1", "omicron_ba1").unwrap(),
        ];

        let summary = app.tabulate(&variants, &JsonOutput).unwrap();
        assert_eq!(summary.count(OutcomeStatus::Failed), 2);
        assert!(summary.items.iter().all(|item| item.stage == Stage::Extract));
    }
}
