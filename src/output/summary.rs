use std::collections::HashMap;
use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};
use indexmap::IndexMap;

use crate::insights::{ExplanationReport, FrequencyReport, PatternInsights};
use crate::mining::Pattern;

use super::styling::{bright_yellow, cyan, dim, heading, share};
use super::tables::{
    color_coded_baseline_cell, color_coded_failure_share_cell, count_cell, create_cyan_header,
    create_table,
};

const TOP_PATTERNS: usize = 20;

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{}", heading(emoji, title));
}

fn add_counts_table(output: &mut String, label: &str, counts: &IndexMap<String, usize>) {
    if counts.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("None"));
        return;
    }

    let mut table = create_table();
    table.set_header(create_cyan_header(&[label, "Runs"]));
    for (name, count) in counts {
        table.add_row(vec![Cell::new(name), count_cell(*count)]);
    }
    let _ = writeln!(output, "{table}\n");
}

/// Renders a human-readable summary of a mining pass.
///
/// Sections:
/// - Overview: window, population sizes, thresholds, excluded rows
/// - Failing Steps: anchors that met the threshold and their pattern counts
/// - Pruning: pattern counts after each pass
/// - Relevant Patterns: surviving patterns with failure and baseline shares
/// - Next Steps
#[allow(clippy::too_many_lines)]
pub fn render_insights(insights: &PatternInsights) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Build range:"),
        cyan(format!("{} - {}", insights.min_id, insights.max_id)),
        dim("Runs analyzed:"),
        bright_yellow(insights.total_runs),
        dim("Failing / successful:"),
        bright_yellow(format!(
            "{} / {}",
            insights.failing_runs, insights.successful_runs
        )),
        dim("Excluded rows:"),
        bright_yellow(insights.excluded_rows),
        dim("Failure support:"),
        bright_yellow(if insights.retried {
            format!("{} (lowered after an empty first pass)", insights.min_support)
        } else {
            insights.min_support.to_string()
        }),
        dim("Baseline support:"),
        bright_yellow(insights.baseline_support),
        dim("Analysis date:"),
        dim(insights.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if insights.anchors.is_empty() {
        let _ = writeln!(
            output,
            "{}",
            bright_yellow("No failing step reached the support threshold.")
        );
        return output;
    }

    add_section_header(&mut output, "⚓", "Failing Steps");
    let mut anchors_table = create_table();
    anchors_table.set_header(create_cyan_header(&["Step", "Failures", "Patterns", "Status"]));
    for anchor in &insights.anchors {
        let status = if anchor.timed_out {
            Cell::new("timed out").fg(TableColor::Red)
        } else {
            Cell::new("mined").fg(TableColor::Green)
        };
        anchors_table.add_row(vec![
            Cell::new(&anchor.step),
            Cell::new(anchor.failures),
            count_cell(anchor.patterns),
            status,
        ]);
    }
    let _ = writeln!(output, "{anchors_table}\n");

    add_section_header(&mut output, "✂️", "Pruning");
    let stats = &insights.prune_stats;
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Candidates:"),
        bright_yellow(stats.candidates),
        dim("After baseline dominance:"),
        bright_yellow(stats.after_dominance),
        dim("After weak-extension removal:"),
        bright_yellow(stats.after_minimality),
        dim("After repeated-step removal:"),
        bright_yellow(stats.after_validity)
    );

    add_section_header(&mut output, "🔗", "Relevant Patterns");
    if insights.pruned.is_empty() {
        let _ = writeln!(output, "  {}\n", bright_yellow("No relevant pattern survived pruning."));
    } else {
        let baseline: HashMap<&[String], f64> = insights
            .baseline
            .iter()
            .flat_map(|population| &population.patterns)
            .map(|p| (p.tokens.as_slice(), p.support_fraction))
            .collect();

        let mut patterns_table = create_table();
        patterns_table.set_header(create_cyan_header(&[
            "#",
            "Pattern",
            "Support",
            "Of Failures",
            "Of Successes",
            "Length",
        ]));

        for (idx, pattern) in insights.pruned.iter().take(TOP_PATTERNS).enumerate() {
            patterns_table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(pattern_cell_text(pattern)),
                Cell::new(pattern.support),
                color_coded_failure_share_cell(pattern.support_fraction),
                color_coded_baseline_cell(baseline.get(pattern.tokens.as_slice()).copied()),
                Cell::new(pattern.len()),
            ]);
        }

        if insights.pruned.len() > TOP_PATTERNS {
            let mut row = vec![Cell::new(format!(
                "... and {} more",
                insights.pruned.len() - TOP_PATTERNS
            ))
            .fg(TableColor::DarkGrey)];
            row.extend(vec![Cell::new(""); 5]);
            patterns_table.add_row(row);
        }
        let _ = writeln!(output, "{patterns_table}\n");
    }

    add_section_header(&mut output, "💡", "Next Steps");
    let example = insights
        .pruned
        .first()
        .map_or_else(|| "A B C".to_string(), Pattern::joined);
    let _ = writeln!(
        output,
        "  {} Run {} to see which runs exhibit a pattern\n\
         \x20 {} Use {} to persist the pattern tables as CSV",
        cyan("•"),
        bright_yellow(format!("seqlens explain --pattern \"{example}\"")),
        cyan("•"),
        bright_yellow("--write"),
    );

    output
}

fn pattern_cell_text(pattern: &Pattern) -> String {
    pattern.tokens.join("\n→ ")
}

/// Renders the breakdown of runs exhibiting one pattern.
pub fn render_explanation(report: &ExplanationReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🔎", "Pattern Analysis");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {} of {} runs ({})\n  {} {} of {} ordered runs ({})\n  {} {}\n",
        dim("Pattern:"),
        cyan(report.pattern.join(" ==> ")),
        dim("Ordering observed in:"),
        bright_yellow(report.ordered_runs),
        report.total_runs,
        share(report.ordered_fraction),
        dim(format!("{} failed in:", report.anchor)),
        bright_yellow(report.matching_runs),
        report.ordered_runs,
        share(report.anchor_failure_rate),
        dim("Share of all runs:"),
        share(report.fraction_of_table),
    );

    add_section_header(&mut output, "❌", "Failed Steps");
    add_counts_table(&mut output, "Step", &report.failures);

    add_section_header(&mut output, "📨", "Error Messages");
    add_counts_table(&mut output, "Category", &report.error_categories);

    for (label, values) in &report.labels {
        add_section_header(&mut output, "🏷️", label);
        add_counts_table(&mut output, "Value", values);
    }

    output
}

pub fn render_frequencies(report: &FrequencyReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Build range:"),
        cyan(format!("{} - {}", report.min_id, report.max_id)),
        dim("Runs analyzed:"),
        bright_yellow(report.total_runs),
        dim("Failing runs:"),
        bright_yellow(report.failing_runs),
        dim("Excluded rows:"),
        bright_yellow(report.excluded_rows),
    );

    add_section_header(&mut output, "❌", "Failed Steps");
    add_counts_table(&mut output, "Step", &report.failures);

    add_section_header(&mut output, "📨", "Error Messages");
    add_counts_table(&mut output, "Category", &report.error_categories);

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::{AnchorSummary, PatternPopulation, PruneStats, Source};
    use chrono::Utc;

    fn pattern(joined: &str, support: usize, population: usize) -> Pattern {
        Pattern::new(
            joined.split_whitespace().map(ToString::to_string).collect(),
            support,
            population,
        )
    }

    fn create_test_insights(pruned: Vec<Pattern>) -> PatternInsights {
        PatternInsights {
            collected_at: Utc::now(),
            min_id: 100,
            max_id: 130,
            total_runs: 30,
            failing_runs: 10,
            successful_runs: 20,
            excluded_rows: 2,
            min_support: 0.15,
            baseline_support: 0.1,
            retried: false,
            anchors: vec![AnchorSummary {
                step: "traffic-check".to_string(),
                failures: 10,
                patterns: pruned.len(),
                timed_out: false,
            }],
            baseline: Some(PatternPopulation {
                source: Source::Baseline,
                threshold: 0.1,
                min_count: 2,
                population_size: 20,
                patterns: vec![pattern("scale-out traffic-check", 1, 20)],
            }),
            unpruned: pruned.clone(),
            prune_stats: PruneStats {
                candidates: pruned.len(),
                after_dominance: pruned.len(),
                after_minimality: pruned.len(),
                after_validity: pruned.len(),
            },
            pruned,
        }
    }

    #[test]
    fn renders_overview_and_patterns() {
        let insights =
            create_test_insights(vec![pattern("scale-out traffic-check", 6, 10)]);
        let rendered = render_insights(&insights);

        assert!(rendered.contains("100 - 130"));
        assert!(rendered.contains("Relevant Patterns"));
        assert!(rendered.contains("traffic-check"));
        assert!(rendered.contains("60.0%"));
        assert!(rendered.contains("5.0%"));
        assert!(rendered.contains("seqlens explain --pattern \"scale-out traffic-check\""));
    }

    #[test]
    fn reports_lowered_threshold() {
        let mut insights = create_test_insights(vec![]);
        insights.retried = true;
        insights.min_support = 0.1;
        let rendered = render_insights(&insights);

        assert!(rendered.contains("lowered after an empty first pass"));
        assert!(rendered.contains("No relevant pattern survived pruning."));
    }

    #[test]
    fn stops_after_overview_without_anchors() {
        let mut insights = create_test_insights(vec![]);
        insights.anchors.clear();
        let rendered = render_insights(&insights);

        assert!(rendered.contains("No failing step reached the support threshold."));
        assert!(!rendered.contains("Relevant Patterns"));
    }

    #[test]
    fn truncates_long_pattern_lists() {
        let patterns = (0..25)
            .map(|i| pattern(&format!("step-{i} anchor"), 30 - i, 40))
            .collect();
        let rendered = render_insights(&create_test_insights(patterns));
        assert!(rendered.contains("... and 5 more"));
    }

    #[test]
    fn renders_explanation_breakdown() {
        let mut labels = IndexMap::new();
        labels.insert(
            "IP_FAMILY".to_string(),
            IndexMap::from([("dualstack".to_string(), 2)]),
        );
        let report = ExplanationReport {
            pattern: vec!["a".into(), "b".into()],
            anchor: "b".into(),
            total_runs: 10,
            ordered_runs: 4,
            matching_runs: 2,
            matching_build_ids: vec![3, 7],
            fraction_of_table: 0.2,
            ordered_fraction: 0.4,
            anchor_failure_rate: 0.5,
            failures: IndexMap::from([("b".to_string(), 2)]),
            error_categories: IndexMap::new(),
            labels,
        };

        let rendered = render_explanation(&report);
        assert!(rendered.contains("a ==> b"));
        assert!(rendered.contains("IP_FAMILY"));
        assert!(rendered.contains("dualstack"));
        assert!(rendered.contains("None"));
    }

    #[test]
    fn renders_frequencies() {
        let report = FrequencyReport {
            min_id: 1,
            max_id: 9,
            total_runs: 9,
            failing_runs: 3,
            excluded_rows: 0,
            failures: IndexMap::from([("deploy".to_string(), 3)]),
            error_categories: IndexMap::from([("Timeout occurred".to_string(), 2)]),
        };
        let rendered = render_frequencies(&report);
        assert!(rendered.contains("deploy"));
        assert!(rendered.contains("Timeout occurred"));
    }
}
