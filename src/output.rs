use std::io::{self, Write};

use serde::Serialize;

use crate::app::{OutcomeStatus, ProgressEvent, ProgressSink, RunSummary};
use crate::domain::VariantDescriptor;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(result: &RunSummary) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_variants(variants: &[VariantDescriptor]) -> io::Result<()> {
        Self::print_json(&variants)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(result: &RunSummary) {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let red = "\x1b[31m";
        let reset = "\x1b[0m";

        println!("{cyan}KIRA-VD {} summary{reset}", result.operation);
        println!(
            "{green}done: {}{reset}  {yellow}skipped: {}{reset}  {red}failed: {}{reset}",
            result.count(OutcomeStatus::Done),
            result.count(OutcomeStatus::Skipped),
            result.count(OutcomeStatus::Failed),
        );

        for item in &result.items {
            let (label, color) = match item.status {
                OutcomeStatus::Done => ("ok", green),
                OutcomeStatus::Skipped => ("skipped", yellow),
                OutcomeStatus::Failed => ("FAILED", red),
            };
            println!(
                "{color}{label:>7} {} ({}) [{}]{reset}",
                item.short_name, item.lineage, item.stage
            );
            if let Some(detail) = &item.detail {
                println!("{color}        {detail}{reset}");
            }
            if let Some(path) = &item.path {
                println!("        {path}");
            }
        }
    }

    pub fn print_variants(variants: &[VariantDescriptor]) {
        for variant in variants {
            println!("{}\t{}", variant.short_name, variant.lineage);
        }
    }
}
