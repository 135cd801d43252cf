// Colored terminal output for run summaries, keyword tables and config status.
//
// This module handles all terminal-specific formatting. The main.rs
// subcommands delegate here once a run has finished.

use std::path::Path;

use colored::Colorize;

use crate::analysis::keywords::{KeywordReport, TokenCount};
use crate::config::Config;
use crate::merge::MergeReport;
use crate::pipeline::llm_path::LlmRunReport;
use crate::pipeline::model_path::ModelRunReport;
use crate::records::Verdict;

/// Summary after a trained-model run.
pub fn display_model_summary(report: &ModelRunReport, output: &Path) {
    println!(
        "\n{}",
        format!("=== Trained-model run ({} titles) ===", report.total).bold()
    );
    if report.resumed > 0 {
        println!("  {} restored from progress log", report.resumed);
    }
    println!("  {:<22} {}", "Scored", report.scored.to_string().green());
    println!("  {:<22} {}", "Skipped (blank title)", report.skipped.to_string().dimmed());
    let failed = report.failed.to_string();
    println!(
        "  {:<22} {}",
        "Failed",
        if report.failed > 0 { failed.red() } else { failed.normal() }
    );
    if report.recovered_in_sweep > 0 {
        println!("  {:<22} {}", "Recovered by retry", report.recovered_in_sweep);
    }
    println!("  {:<22} {}", "Keyword overrides", report.overridden.to_string().yellow());
    print_timing(&report.started_at, report.elapsed_secs);
    println!("\n  Output: {}", output.display().to_string().bold());
}

/// Summary after an LLM run.
pub fn display_llm_summary(report: &LlmRunReport, output: &Path) {
    println!(
        "\n{}",
        format!("=== LLM run ({} titles) ===", report.total).bold()
    );
    if report.resumed > 0 {
        println!("  {} restored from progress log", report.resumed);
    }
    println!(
        "  {:<22} {}",
        colorize_verdict(Verdict::Relevant),
        report.relevant
    );
    println!(
        "  {:<22} {}",
        colorize_verdict(Verdict::NotRelevant),
        report.not_relevant
    );
    println!("  {:<22} {}", colorize_verdict(Verdict::Error), report.errors);
    println!("  {:<22} {}", colorize_verdict(Verdict::Skipped), report.skipped);
    println!();
    println!("  Requests made: {}", report.requests);
    if report.failed_batches > 0 {
        println!(
            "  {} {} batches marked ERROR ({} with unusable responses)",
            "!".red(),
            report.failed_batches,
            report.faulted_batches
        );
    }
    if report.cap_reached {
        println!(
            "  {} daily request cap reached; {} titles not classified. Re-run with --resume tomorrow.",
            "~".yellow(),
            report.absent
        );
    }
    print_timing(&report.started_at, report.elapsed_secs);
    println!("\n  Output: {}", output.display().to_string().bold());
}

/// Top tokens for both classes, side by side.
pub fn display_keywords(report: &KeywordReport) {
    println!("\n{}", "=== Title keywords ===".bold());
    println!();
    println!(
        "  {:>3}  {:<28} {:<28}",
        "#".dimmed(),
        colorize_verdict(Verdict::Relevant),
        colorize_verdict(Verdict::NotRelevant),
    );
    println!("  {}", "-".repeat(60).dimmed());

    let rows = report.relevant.len().max(report.not_relevant.len());
    for i in 0..rows {
        println!(
            "  {:>3}. {:<28} {:<28}",
            i + 1,
            token_cell(report.relevant.get(i)),
            token_cell(report.not_relevant.get(i)),
        );
    }
    if rows == 0 {
        println!("  {}", "No RELEVANT or NOT RELEVANT titles found.".dimmed());
    }
}

fn token_cell(entry: Option<&TokenCount>) -> String {
    entry
        .map(|t| format!("{} ({})", super::truncate_chars(&t.token, 20), t.count))
        .unwrap_or_default()
}

pub fn display_merge_summary(report: &MergeReport, output: &Path) {
    println!("\n{}", "=== Merge ===".bold());
    println!("  Judged titles: {}", report.judged);
    println!("  People:        {}", report.people);
    println!("  Written:       {}", report.written.to_string().green());
    println!("\n  Output: {}", output.display().to_string().bold());
}

/// Effective configuration and whether each path can run.
pub fn display_check(config: &Config) {
    println!("\n{}", "=== Titlesift configuration ===".bold());

    let model_ok = config.require_model().is_ok();
    let llm_ok = config.require_llm().is_ok();

    println!(
        "  Trained model: {} ({})",
        status_mark(model_ok),
        config.model_dir.display()
    );
    println!("  Keywords:      {}", config.keywords_source());
    println!(
        "  LLM:           {} ({} at {})",
        status_mark(llm_ok),
        config.llm_model,
        config.llm_api_url
    );
    println!("  Translation:   {}", config.translate_url);
    println!();
    println!(
        "  Batch size {}, {} requests/day, {} requests/minute, {} attempts per batch",
        config.batch_size, config.max_rpd, config.max_rpm, config.retry_attempts
    );
    println!(
        "  Cooldowns: rate limit {}s, timeout {}s, bad response {}s; translation backoff {}ms",
        config.rate_limit_cooldown.as_secs(),
        config.timeout_cooldown.as_secs(),
        config.fault_cooldown.as_secs(),
        config.translate_backoff.as_millis()
    );
    if !config.echo_check {
        println!("  {}", "Echo check disabled: verdicts are matched by position only.".yellow());
    }
}

fn print_timing(started_at: &str, elapsed_secs: i64) {
    if !started_at.is_empty() {
        println!(
            "  {}",
            format!("Started {started_at}, took {}", format_duration(elapsed_secs)).dimmed()
        );
    }
}

fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn status_mark(ok: bool) -> colored::ColoredString {
    if ok {
        "ready".green()
    } else {
        "not configured".red()
    }
}

/// Colorize a verdict label.
fn colorize_verdict(verdict: Verdict) -> colored::ColoredString {
    let label = verdict.as_str();
    match verdict {
        Verdict::Relevant => label.green().bold(),
        Verdict::NotRelevant => label.normal(),
        Verdict::Error => label.red(),
        Verdict::Skipped => label.dimmed(),
    }
}
