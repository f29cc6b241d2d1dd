//! Scan command implementation.
//!
//! Builds a configuration from settings plus flags, runs the scan and
//! optionally saves the resulting index.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use metascan_ops::{InputLocation, ScanOrchestrator, ScanOutcome, ScanSettings};

use super::resolve_format;

/// Arguments of `metascan scan`.
#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Class directories, jar/zip archives or single class files.
    pub locations: Vec<PathBuf>,

    /// Platform classpath string to scan in addition to LOCATIONS.
    #[arg(long)]
    pub classpath: Option<String>,

    /// Directory whose jar/zip archives are all scanned.
    #[arg(long)]
    pub lib_dir: Vec<PathBuf>,

    /// Worker threads (1 = sequential, 0 = one per core).
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Only index classes in these packages (replaces the configured list).
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Skip classes in these packages (replaces the configured list).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Scanners to run, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub scanners: Vec<String>,

    /// Save the index to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: xml or json (defaults to the output extension).
    #[arg(short, long)]
    pub format: Option<String>,

    /// Fail when any input or scanner reported a problem.
    #[arg(long)]
    pub strict: bool,
}

impl ScanArgs {
    /// Apply flag overrides on top of persisted settings.
    fn effective_settings(&self, settings: &ScanSettings) -> Result<ScanSettings> {
        let mut effective = settings.clone();
        if let Some(threads) = self.threads {
            effective.threads = threads;
        }
        if !self.include.is_empty() {
            effective.set("include", &self.include.join(","))?;
        }
        if !self.exclude.is_empty() {
            effective.set("exclude", &self.exclude.join(","))?;
        }
        if !self.scanners.is_empty() {
            effective.set("scanners", &self.scanners.join(","))?;
        }
        Ok(effective)
    }

    /// Every requested location, in command line order.
    fn collect_locations(&self) -> Result<Vec<InputLocation>> {
        let mut locations: Vec<InputLocation> =
            self.locations.iter().cloned().map(InputLocation::from).collect();
        if let Some(classpath) = &self.classpath {
            locations.extend(InputLocation::from_classpath(classpath));
        }
        for dir in &self.lib_dir {
            let archives = InputLocation::archives_in(dir)
                .with_context(|| format!("Failed to list archives in {}", dir.display()))?;
            locations.extend(archives);
        }
        Ok(locations)
    }
}

/// Execute the scan command.
pub fn execute(settings: &ScanSettings, args: &ScanArgs, quiet: bool) -> Result<()> {
    let locations = args.collect_locations()?;
    if locations.is_empty() {
        anyhow::bail!("Nothing to scan: pass LOCATIONS, --classpath or --lib-dir");
    }

    let effective = args.effective_settings(settings)?;
    let mut builder = effective.to_builder()?.set_locations(locations);
    let kind = match &args.output {
        Some(output) => Some(resolve_format(&effective, output, args.format.as_deref())?),
        None => None,
    };
    if let Some(kind) = kind {
        builder = builder.set_serializer(kind.serializer());
    }

    let orchestrator = ScanOrchestrator::new(builder.build()?);
    let outcome = orchestrator.scan()?;

    if !quiet {
        for diagnostic in &outcome.diagnostics {
            eprintln!("warning: {}", diagnostic);
        }
    }

    if let (Some(output), Some(kind)) = (&args.output, kind) {
        orchestrator.save(&outcome.store, output)?;
        if !quiet {
            let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
            println!(
                "Saved {} index to {} ({})",
                kind,
                output.display(),
                humansize::format_size(size, humansize::DECIMAL)
            );
        }
    }

    if !quiet {
        print_summary(&outcome);
    }

    if args.strict && !outcome.is_complete() {
        anyhow::bail!(
            "Scan reported {} problem(s) in strict mode",
            outcome.diagnostics.len()
        );
    }

    Ok(())
}

fn print_summary(outcome: &ScanOutcome) {
    let stats = &outcome.stats;
    println!("Metascan Summary");
    println!("{:-<40}", "");
    println!("Inputs:       {}", stats.inputs);
    println!("Classes:      {}", stats.classes);
    println!("Entries:      {}", stats.entries);
    println!("Filtered:     {}", stats.filtered);
    for (scanner, index) in outcome.store.iter() {
        println!(
            "{:<13} {} keys, {} values",
            format!("{}:", scanner),
            index.len(),
            index.value_count()
        );
    }
    println!("Diagnostics:  {}", outcome.diagnostics.len());
}
