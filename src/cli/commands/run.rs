//! `sigstat run` command - execute the pipeline once, on demand, or weekly

use chrono::Local;
use clap::ValueEnum;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use super::report::write_control_chart;
use crate::cli::table::render_structured;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::pipeline::{run_pipeline, PipelineError, PipelineReport};
use crate::core::{Config, WeeklySchedule};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Run once now
    #[default]
    Default,
    /// Run on the configured weekly schedule (requires `autorun: true`)
    Auto,
    /// Ask for confirmation, then run once
    Manual,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Trigger mode
    #[arg(long, short = 'm', value_enum, default_value_t = RunMode::Default)]
    pub mode: RunMode,

    /// Measurement CSV (overrides config)
    #[arg(long)]
    pub measurements: Option<PathBuf>,

    /// Skip the confirmation prompt in manual mode
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub fn run(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let mut config = super::setup(global)?;
    if let Some(path) = args.measurements {
        config.measurements = Some(path);
    }

    match args.mode {
        RunMode::Default => run_once(&config, global),
        RunMode::Manual => {
            if args.yes || confirm(&config)? {
                run_once(&config, global)
            } else {
                println!("{} Run cancelled", style("!").yellow());
                Ok(())
            }
        }
        RunMode::Auto => run_scheduled(&config, global),
    }
}

fn confirm(config: &Config) -> Result<bool> {
    let source = config
        .measurements
        .as_ref()
        .ok_or(PipelineError::MissingMeasurements)?;
    let theme = ColorfulTheme::default();
    Confirm::with_theme(&theme)
        .with_prompt(format!(
            "Analyze {} and update '{}' in {}?",
            source.display(),
            config.table,
            config.database.display()
        ))
        .default(false)
        .interact()
        .into_diagnostic()
}

fn run_once(config: &Config, global: &GlobalOpts) -> Result<()> {
    let report = run_pipeline(config)?;
    print_report(&report, global)?;
    if config.visualize {
        chart(config, global)?;
    }

    if !report.is_clean() {
        return Err(miette::miette!(
            help = "Failed rows are listed above; other rows were written",
            "{} row(s) could not be written",
            report.failed_rows()
        ));
    }
    Ok(())
}

fn run_scheduled(config: &Config, global: &GlobalOpts) -> Result<()> {
    if !config.autorun {
        log::warn!("Automatic runs are disabled");
        println!(
            "{} Automatic runs are disabled; set {} in sigstat.yaml or {}",
            style("!").yellow(),
            style("autorun: true").cyan(),
            style("SIGSTAT_AUTORUN=1").cyan()
        );
        return Ok(());
    }

    let schedule: WeeklySchedule = config.schedule.parse()?;
    println!(
        "{} Scheduled weekly run: {}",
        style("→").blue(),
        style(schedule).cyan()
    );

    loop {
        let now = Local::now().naive_local();
        let next = schedule.next_after(now);
        log::info!("Next run at {}", next.format("%Y-%m-%d %H:%M"));
        std::thread::sleep((next - now).to_std().unwrap_or_default());

        // A failed run is reported and the schedule carries on
        match run_pipeline(config) {
            Ok(report) => {
                print_report(&report, global)?;
                if config.visualize {
                    if let Err(e) = chart(config, global) {
                        log::error!("Control chart failed: {}", e);
                    }
                }
            }
            Err(e) => log::error!("Scheduled run failed: {}", e),
        }
    }
}

fn chart(config: &Config, global: &GlobalOpts) -> Result<()> {
    let path = write_control_chart(config)?;
    // Structured output stays parseable; the path is logged instead
    if matches!(global.format, OutputFormat::Json | OutputFormat::Yaml) {
        return Ok(());
    }
    println!(
        "{} Control chart written to {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    Ok(())
}

fn print_report(report: &PipelineReport, global: &GlobalOpts) -> Result<()> {
    if let Some(out) = render_structured(report, global.format)? {
        print!("{}", out);
        return Ok(());
    }

    println!(
        "{} Analyzed {} measurement(s) across {} SKU(s)",
        style("✓").green(),
        report.measurements,
        report.summary.sku_count()
    );

    for sync in &report.syncs {
        if !global.quiet {
            let failed = style(sync.failed.len());
            let failed = if sync.failed.is_empty() {
                failed.dim()
            } else {
                failed.red()
            };
            println!(
                "  {:<12} {} inserted, {} updated, {} unchanged, {} failed",
                sync.metric.column(),
                style(sync.inserted).green(),
                style(sync.updated).yellow(),
                sync.unchanged,
                failed
            );
        }
        for failure in &sync.failed {
            println!(
                "    {} {}: {}",
                style("✗").red(),
                failure.sku,
                failure.reason
            );
        }
    }
    Ok(())
}
