//! Plain-text rendering of estimates, verdicts and suggestions.

use std::fmt::Write as _;

use loadwise_core::{
    AdvisorReport, AvailableResources, GIB, MIB, OptimizationSuggestion, PerformanceCategory,
    ResourceEstimate, TaskConfig,
};

/// Format a byte count in binary units.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.0} MiB", bytes as f64 / MIB as f64)
    } else {
        format!("{bytes} B")
    }
}

pub fn format_duration(secs: f64) -> String {
    if secs <= 0.0 {
        return "none".to_string();
    }
    let total = secs.round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{secs:.1}s")
    }
}

fn format_utilization(ratio: f64) -> String {
    if ratio.is_finite() {
        format!("{:.0}%", ratio * 100.0)
    } else {
        "n/a (no capacity declared)".to_string()
    }
}

fn category_note(category: PerformanceCategory) -> &'static str {
    match category {
        PerformanceCategory::Optimal => "comfortable headroom",
        PerformanceCategory::High => "fits, with moderate headroom",
        PerformanceCategory::Risky => "fits, but close to the limit",
        PerformanceCategory::Nonviable => "does not fit",
    }
}

pub fn estimate(task: &TaskConfig, estimate: &ResourceEstimate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Estimate ({})", task.kind());
    let _ = writeln!(out, "  VRAM: {}", format_bytes(estimate.vram_bytes));
    let _ = writeln!(out, "  RAM:  {}", format_bytes(estimate.ram_bytes));
    let time = &estimate.time;
    if time.expected_secs > 0.0 {
        let _ = writeln!(
            out,
            "  Time: {} (range {} to {})",
            format_duration(time.expected_secs),
            format_duration(time.min_secs),
            format_duration(time.max_secs)
        );
    } else {
        let _ = writeln!(out, "  Time: {}", format_duration(0.0));
    }
    out
}

pub fn report(task: &TaskConfig, report: &AdvisorReport, available: &AvailableResources) -> String {
    let mut out = estimate(task, &report.estimate);
    let verdict = &report.verdict;

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Verdict: {} ({})",
        verdict.performance_category,
        category_note(verdict.performance_category)
    );
    let _ = writeln!(
        out,
        "  VRAM: {} of {} ({}){}",
        format_bytes(report.estimate.vram_bytes),
        format_bytes(available.vram_bytes),
        format_utilization(verdict.vram_utilization),
        if verdict.vram_viable { "" } else { "  exceeds capacity" }
    );
    let _ = writeln!(
        out,
        "  RAM:  {} of {} ({}){}",
        format_bytes(report.estimate.ram_bytes),
        format_bytes(available.ram_bytes),
        format_utilization(verdict.ram_utilization),
        if verdict.ram_viable { "" } else { "  exceeds capacity" }
    );

    if !report.suggestions.is_empty() {
        let _ = writeln!(out);
        out.push_str(&suggestions(&report.suggestions));
    }
    out
}

pub fn suggestions(suggestions: &[OptimizationSuggestion]) -> String {
    if suggestions.is_empty() {
        return "No suggestions: the configuration already has comfortable headroom.\n"
            .to_string();
    }

    let mut out = String::from("Suggestions\n");
    for (i, s) in suggestions.iter().enumerate() {
        let _ = writeln!(out, "  {}. [{} impact] {}", i + 1, s.impact, s.title);
        let _ = writeln!(out, "     {}", s.description);

        let mut facts = Vec::new();
        if let Some(reduction) = s.reduction_bytes {
            facts.push(format!("saves {}", format_bytes(reduction)));
        }
        if let Some(fits) = s.fits_vram {
            facts.push(if fits { "fits VRAM" } else { "still over VRAM" }.to_string());
        }
        facts.push(if s.balanced { "balanced" } else { "trade-off" }.to_string());
        let _ = writeln!(out, "     {}", facts.join(", "));
    }
    out
}
