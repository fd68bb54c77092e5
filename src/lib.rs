pub mod app;
pub mod clean;
pub mod config;
pub mod crossref;
pub mod datasets_cli;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod metadata;
pub mod ncbi;
pub mod output;
pub mod package;
pub mod report;
pub mod store;
