use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::LineageId;
use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirusPackageRequest {
    pub taxon: String,
    pub lineage: LineageId,
    pub host: String,
    pub complete_only: bool,
    pub released_since: Option<NaiveDate>,
    pub fast_validation: bool,
}

pub trait VirusDatasetClient: Send + Sync {
    fn download_virus_package(
        &self,
        request: &VirusPackageRequest,
        destination: &Path,
    ) -> Result<(), KiraError>;
}

#[derive(Clone)]
pub struct NcbiHttpClient {
    client: Client,
    base_url: String,
}

impl NcbiHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-vd/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::NcbiHttp(err.to_string()))?,
        );
        headers.insert("X-Datasets-Client", HeaderValue::from_static("kira-vd"));
        headers.insert(
            "X-Datasets-Client-Version",
            HeaderValue::from_str(env!("CARGO_PKG_VERSION"))
                .map_err(|err| KiraError::NcbiHttp(err.to_string()))?,
        );

        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                headers.insert(
                    "api-key",
                    HeaderValue::from_str(api_key.trim())
                        .map_err(|err| KiraError::ConfigValue(format!("NCBI_API_KEY: {err}")))?,
                );
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::NcbiHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.ncbi.nlm.nih.gov/datasets/v2".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), KiraError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "NCBI request failed".to_string());
            return Err(KiraError::NcbiStatus { status, message });
        }

        let mut file =
            File::create(destination).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| KiraError::NcbiHttp(format!("reading package body: {err}")))?;
        Ok(())
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, KiraError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::NcbiHttp(err.to_string()));
                }
            }
        }
    }
}

impl VirusDatasetClient for NcbiHttpClient {
    fn download_virus_package(
        &self,
        request: &VirusPackageRequest,
        destination: &Path,
    ) -> Result<(), KiraError> {
        let url = format!(
            "{}/virus/taxon/{}/genome/download",
            self.base_url, request.taxon
        );
        let params = virus_query_params(request);
        let response = self.send_with_retries(|| self.client.get(&url).query(&params))?;
        self.write_response_to_file(response, destination)
    }
}

pub fn virus_query_params(request: &VirusPackageRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("pangolin_classification", request.lineage.to_string()),
        ("host", request.host.clone()),
        ("complete_only", request.complete_only.to_string()),
        ("include_sequence", "GENOME".to_string()),
        ("aux_report", "DATASET_REPORT".to_string()),
    ];
    if let Some(date) = request.released_since {
        params.push((
            "released_since",
            format!("{}T00:00:00.000Z", date.format("%Y-%m-%d")),
        ));
    }
    params
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    !err.is_timeout() && (err.is_connect() || err.is_request())
}
