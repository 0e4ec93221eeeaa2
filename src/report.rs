//! Output formatting for coverage results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the `{summary, details}` report document

use colored::*;
use serde::{Deserialize, Serialize};

use crate::scan::ScanResult;
use crate::score::{overall_coverage, FileCoverage, FunctionCoverage};

/// Job-level totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_source_files: usize,
    /// Source files with at least one extracted function.
    pub analyzed_files: usize,
    pub test_files: usize,
    pub overall_coverage_percentage: f64,
    pub total_functions: usize,
    pub covered_functions: usize,
}

/// Result of one analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: Summary,
    pub details: Vec<FileCoverage>,
}

impl AnalysisReport {
    pub fn new(scan: &ScanResult, details: Vec<FileCoverage>) -> Self {
        let total_functions = details.iter().map(|f| f.functions.len()).sum();
        let covered_functions = details.iter().map(|f| f.covered_count()).sum();

        Self {
            summary: Summary {
                total_source_files: scan.source_files.len(),
                analyzed_files: details.len(),
                test_files: scan.test_files.len(),
                overall_coverage_percentage: overall_coverage(&details),
                total_functions,
                covered_functions,
            },
            details,
        }
    }

    /// Whether overall coverage reaches `min` (always true without a minimum).
    pub fn meets(&self, min: Option<f64>) -> bool {
        match min {
            Some(min) => self.summary.overall_coverage_percentage >= min,
            None => true,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write results in JSON format.
pub fn write_json(report: &AnalysisReport) -> anyhow::Result<()> {
    println!("{}", report.to_json()?);
    Ok(())
}

/// Write results in pretty format.
pub fn write_pretty(
    path: &str,
    config_path: Option<&str>,
    report: &AnalysisReport,
    verbose: bool,
    min_coverage: Option<f64>,
) {
    // Header
    println!();
    print!("  ");
    print!("{}", "sentinel".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", path);
    print!("  {}", "Config:   ".dimmed());
    println!("{}", config_path.unwrap_or("(defaults)"));
    println!();

    write_result_summary(report, min_coverage);
    println!();

    if !report.details.is_empty() {
        write_files(&report.details, verbose);
        println!();
    }

    write_counts(report);
    println!();

    if let Some(min) = min_coverage {
        write_final_status(report, min);
        println!();
    }
}

fn write_result_summary(report: &AnalysisReport, min_coverage: Option<f64>) {
    if report.meets(min_coverage) {
        print!("  {}", "✓ PASS".green());
    } else {
        print!("  {}", "✗ FAIL".red());
    }

    print!("  Coverage: ");
    write_colored_percentage(report.summary.overall_coverage_percentage);
    print!(
        "  {}",
        format!(
            "({}/{} functions)",
            report.summary.covered_functions, report.summary.total_functions
        )
        .dimmed()
    );
    println!();
}

fn write_colored_percentage(pct: f64) {
    let text = format!("{:.2}%", pct);
    match pct {
        p if p >= 80.0 => print!("{}", text.green().bold()),
        p if p >= 60.0 => print!("{}", text.green()),
        p if p >= 40.0 => print!("{}", text.yellow()),
        p if p > 0.0 => print!("{}", text.yellow().bold()),
        _ => print!("{}", text.red()),
    }
}

fn write_files(files: &[FileCoverage], verbose: bool) {
    println!("  {} ({}):", "Files".bold(), files.len());
    println!();

    for file in files {
        print!("    ");
        write_colored_percentage(file.coverage_percentage);
        print!("  {}", file.file.blue());
        match &file.paired_test_file {
            Some(test) => print!("{}", format!("  <- {}", test).dimmed()),
            None => print!("  {}", "(no test file)".yellow()),
        }
        println!();

        if verbose {
            for function in &file.functions {
                write_function(function);
            }
            println!();
        }
    }
}

fn write_function(function: &FunctionCoverage) {
    let name = match &function.class_name {
        Some(owner) => format!("{}.{}", owner, function.function_name),
        None => function.function_name.clone(),
    };
    let mut evidence = Vec::new();
    if function.details.is_called {
        evidence.push("called");
    }
    if function.details.is_mentioned {
        evidence.push("mentioned");
    }
    if function.details.is_text_match && evidence.is_empty() {
        evidence.push("text");
    }

    let score = format!("{:>3}", function.score());
    if function.covered {
        print!("        {}", score.green());
    } else {
        print!("        {}", score.red());
    }
    print!("  {:<32}", name);
    print!(
        "{}",
        format!("{}-{}", function.start_line, function.end_line).dimmed()
    );
    if !evidence.is_empty() {
        print!("  {}", evidence.join(", ").dimmed());
    }
    println!();
}

fn write_counts(report: &AnalysisReport) {
    let s = &report.summary;
    println!("  {}", "Summary:".bold());
    println!("    {:<16} {:>6}", "source files", s.total_source_files);
    println!("    {:<16} {:>6}", "analyzed files", s.analyzed_files);
    println!("    {:<16} {:>6}", "test files", s.test_files);
    println!("    {:<16} {:>6}", "functions", s.total_functions);
    println!("    {:<16} {:>6}", "covered", s.covered_functions);
}

fn write_final_status(report: &AnalysisReport, min: f64) {
    print!("  {}", format!("Minimum: {:.2}%", min).dimmed());
    print!("  Coverage: ");
    write_colored_percentage(report.summary.overall_coverage_percentage);
    print!("  ");

    if report.meets(Some(min)) {
        print!("{}", "PASSED".green());
    } else {
        print!("{}", "FAILED".red());
    }
    println!();
}
