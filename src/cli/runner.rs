//! Command dispatch
//!
//! Wires configuration, progress store, sink, and driver together for
//! each subcommand.

use super::commands::{Cli, Commands};
use crate::config::SyncConfig;
use crate::driver::{SyncDriver, SyncReport, SyncStatus};
use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use crate::sink::{DuckdbSink, RecordSink};
use std::sync::atomic::Ordering;
use tracing::warn;

/// Executes a parsed CLI invocation
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a runner for the parsed CLI
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;

        match &self.cli.command {
            Commands::Sync => self.run_sync(config).await,
            Commands::Update { lookback_days } => self.run_update(config, *lookback_days).await,
            Commands::Status => self.run_status(config).await,
            Commands::Export { output } => self.run_export(config, output.clone()),
            Commands::Reset { yes } => self.run_reset(config, *yes).await,
        }
    }

    fn load_config(&self) -> Result<SyncConfig> {
        let mut config = match &self.cli.config {
            Some(path) => SyncConfig::from_file(path)?,
            None => SyncConfig::default(),
        };
        if let Some(dir) = &self.cli.data_dir {
            config.data_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    fn build_driver(&self, config: SyncConfig) -> Result<SyncDriver<DuckdbSink>> {
        let sink = DuckdbSink::open(config.database_path())?;
        let progress = ProgressStore::new(config.progress_path());
        SyncDriver::new(config, progress, sink)
    }

    async fn run_sync(&self, config: SyncConfig) -> Result<()> {
        let driver = self.build_driver(config)?;
        spawn_interrupt_handler(&driver);

        let report = driver.run().await?;
        print_report(&report);

        match report.status {
            SyncStatus::Aborted => Err(Error::Other("sync aborted".to_string())),
            _ => Ok(()),
        }
    }

    async fn run_update(&self, mut config: SyncConfig, lookback_days: Option<i64>) -> Result<()> {
        if let Some(days) = lookback_days {
            if days <= 0 {
                return Err(Error::invalid_config("lookback_days", "must be positive"));
            }
            config.lookback_days = days;
        }

        let progress = ProgressStore::new(config.progress_path());
        let state = progress.load().await?.ok_or_else(|| {
            Error::state("no sync progress found; run 'sbir-sync sync' first")
        })?;
        if !state.completed {
            return Err(Error::state(
                "the full sync has not completed yet; run 'sbir-sync sync' first",
            ));
        }

        let sink = DuckdbSink::open(config.database_path())?;
        let driver = SyncDriver::new(config, progress, sink)?;
        spawn_interrupt_handler(&driver);

        let report = driver.run_incremental(state).await?;
        print_report(&report);

        match report.status {
            SyncStatus::Aborted => Err(Error::Other("update aborted".to_string())),
            _ => Ok(()),
        }
    }

    async fn run_status(&self, config: SyncConfig) -> Result<()> {
        let sink = DuckdbSink::open(config.database_path())?;
        let count = sink.count().await?;
        let latest = sink.latest_award_date()?;

        println!("Stored records:    {count}");
        println!(
            "Latest award date: {}",
            latest.as_deref().unwrap_or("(none)")
        );

        match ProgressStore::new(config.progress_path()).load().await? {
            Some(state) => {
                println!("Next offset:       {}", state.next_offset);
                println!("Total fetched:     {}", state.total_fetched);
                println!("Walk completed:    {}", state.completed);
                println!("Skipped ranges:    {}", state.skipped.len());
                if let Some(at) = state.last_incremental_at {
                    println!("Last update:       {at}");
                }
            }
            None => println!("No sync progress recorded yet"),
        }

        Ok(())
    }

    fn run_export(&self, config: SyncConfig, output: Option<std::path::PathBuf>) -> Result<()> {
        let sink = DuckdbSink::open(config.database_path())?;
        let path = output.unwrap_or_else(|| config.csv_export_path());
        let count = sink.export_csv(&path)?;
        println!("Exported {count} records to {}", path.display());
        Ok(())
    }

    async fn run_reset(&self, config: SyncConfig, yes: bool) -> Result<()> {
        if !yes {
            println!("This deletes the persisted sync progress (not the award data).");
            println!("Pass --yes to confirm.");
            return Ok(());
        }

        ProgressStore::new(config.progress_path()).reset().await?;
        println!("Sync progress reset; the next sync starts from offset 0");
        Ok(())
    }
}

/// Ctrl-C sets the driver's interrupt flag; the in-flight page still
/// commits before the run stops.
fn spawn_interrupt_handler<S: RecordSink>(driver: &SyncDriver<S>) {
    let flag = driver.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current page");
            flag.store(true, Ordering::SeqCst);
        }
    });
}

fn print_report(report: &SyncReport) {
    let status = match report.status {
        SyncStatus::Completed => "completed",
        SyncStatus::Aborted => "aborted",
        SyncStatus::PartialWithSkips => "partial-with-skips",
    };

    println!("Status:          {status}");
    println!("Total fetched:   {}", report.total_fetched);
    println!(
        "Written this run: {} ({} inserted, {} updated)",
        report.records_written(),
        report.inserted,
        report.updated
    );
    println!("Pages fetched:   {}", report.pages_fetched);
    println!("Elapsed:         {:.1}s", report.duration_ms as f64 / 1000.0);

    if !report.skipped.is_empty() {
        println!("Skipped ranges:");
        for range in &report.skipped {
            println!(
                "  offset {} (+{}): {}",
                range.offset, range.length, range.reason
            );
        }
    }
}
