use std::path::Path;

use chrono::NaiveDate;

use kira_variant_datasets::datasets_cli::download_args;
use kira_variant_datasets::ncbi::{VirusPackageRequest, virus_query_params};

fn request(released_since: Option<NaiveDate>) -> VirusPackageRequest {
    VirusPackageRequest {
        taxon: "SARS-CoV-2".to_string(),
        lineage: "XBB.1.5".parse().unwrap(),
        host: "Homo sapiens".to_string(),
        complete_only: true,
        released_since,
        fast_validation: true,
    }
}

#[test]
fn query_requests_genomes_and_report() {
    let params = virus_query_params(&request(None));
    assert!(params.contains(&("include_sequence", "GENOME".to_string())));
    assert!(params.contains(&("aux_report", "DATASET_REPORT".to_string())));
    assert!(!params.iter().any(|(key, _)| *key == "released_since"));
}

#[test]
fn datasets_args_match_the_filter() {
    let args = download_args(
        &request(NaiveDate::from_ymd_opt(2023, 2, 15)),
        Path::new("/tmp/xbb15.zip"),
    );
    assert_eq!(
        args,
        vec![
            "download",
            "virus",
            "genome",
            "taxon",
            "SARS-CoV-2",
            "--lineage",
            "XBB.1.5",
            "--host",
            "Homo sapiens",
            "--complete-only",
            "--released-after",
            "02/15/2023",
            "--fast-zip-validation",
            "--no-progressbar",
            "--filename",
            "/tmp/xbb15.zip",
        ]
    );
}
