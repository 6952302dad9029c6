use crate::output::{Output, OutputFormat};
use color_eyre::eyre::{eyre, Context};
use color_eyre::Result;
use comfy_table::{Cell, Table};
use isbnsync_config::{Config, PathManager};
use isbnsync_core::{
    BatchFetcher, BatchStatus, CatalogQuery, FetchPolicy, Orchestrator, ReconcileOutcome, Reconciler, RunSummary,
};
use isbnsync_sources::{create_store, ChromiumOptions, ChromiumProvider};
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub async fn run_batches(config: Config, paths: &PathManager, output: &Output) -> Result<()> {
    config
        .validate(paths)
        .map_err(|e| eyre!("Configuration validation failed: {}", e))?;
    paths
        .ensure_directories()
        .map_err(|e| eyre!("{}", e))
        .wrap_err("Failed to create data directories")?;

    // Fail before any scraping if the sheet is unreachable or misconfigured
    let store = create_store(&config.sheet, paths)
        .map_err(|e| eyre!("Failed to create record store: {}", e))?;
    store
        .verify()
        .await
        .wrap_err_with(|| format!("Could not access the {} store", store.store_name()))?;

    let provider = ChromiumProvider::new(ChromiumOptions {
        headless: config.catalog.headless,
        settle: Duration::from_millis(config.catalog.settle_millis),
        browser_dir: paths.browser_dir(),
    });

    let orchestrator = Orchestrator::new(
        config.resolved_batches(&paths.progress_dir()),
        BatchFetcher::new(
            FetchPolicy::from_config(&config.catalog, &config.fetch),
            CatalogQuery::from_config(&config.catalog),
        ),
        Reconciler::new(
            config.sheet.isbn_header.clone(),
            Duration::from_millis(config.sheet.rate_limit_delay_ms),
        ),
        paths.consolidated_file(),
    );
    info!("Starting run with {} batches", orchestrator.batches().len());

    let summary = orchestrator.run(&provider, Some(&*store)).await;
    report(&summary, output);
    Ok(())
}

fn report(summary: &RunSummary, output: &Output) {
    match output.format() {
        OutputFormat::Human => {
            let mut table = Table::new();
            table.set_header(vec![
                Cell::new("Batch").add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Records").add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Result").add_attribute(comfy_table::Attribute::Bold),
            ]);
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
            for batch in &summary.batches {
                table.add_row(vec![
                    Cell::new(&batch.name),
                    Cell::new(batch.records),
                    Cell::new(describe_status(&batch.status)),
                ]);
            }
            output.table(&table);

            output.success(format!(
                "Fetched {} records, removed {} duplicates, {} unique",
                summary.total_fetched, summary.duplicates_removed, summary.unique_records
            ));
            match &summary.reconcile {
                ReconcileOutcome::Completed(report) if report.failed > 0 => output.warn(format!(
                    "Corrected {} of {} rows; {} updates failed",
                    report.updated, report.rows_checked, report.failed
                )),
                ReconcileOutcome::Completed(report) => output.success(format!(
                    "Corrected {} of {} rows",
                    report.updated, report.rows_checked
                )),
                ReconcileOutcome::NoRecords => output.warn("No records collected; spreadsheet left unchanged"),
                ReconcileOutcome::NoStore => output.info("No spreadsheet configured; nothing reconciled"),
                ReconcileOutcome::Failed { error } => output.error(format!("Reconciliation failed: {}", error)),
            }
            output.info(format!("Finished in {:.1}s", summary.duration.as_secs_f64()));
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let mut value = serde_json::to_value(summary).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                obj.insert("success".to_string(), json!(true));
                obj.insert("update_count".to_string(), json!(summary.update_count()));
                obj.insert("duration_seconds".to_string(), json!(summary.duration.as_secs_f64()));
            }
            output.json(&value);
        }
    }
}

fn describe_status(status: &BatchStatus) -> String {
    match status {
        BatchStatus::AlreadyComplete => "already complete".to_string(),
        BatchStatus::FetcherUnavailable { reason } => format!("browser unavailable: {}", reason),
        BatchStatus::Fetched {
            pages_ok,
            pages_failed: 0,
            new_records,
        } => format!("{} pages, {} new", pages_ok, new_records),
        BatchStatus::Fetched {
            pages_ok,
            pages_failed,
            new_records,
        } => format!("{} pages ({} failed), {} new", pages_ok, pages_failed, new_records),
    }
}
