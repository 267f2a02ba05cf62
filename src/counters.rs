use std::collections::HashMap;

use indexmap::IndexMap;

use crate::runs::Run;

/// Counts, per step, the runs in which it failed.
///
/// Sorted by count descending, then by step name; steps that never failed are
/// absent.
pub fn count_failures(runs: &[&Run]) -> IndexMap<String, usize> {
    count_by(runs, |run| run.failed_steps.iter().map(String::as_str).collect())
}

/// Counts, per error category, the runs that reported it.
pub fn count_error_categories(runs: &[&Run]) -> IndexMap<String, usize> {
    count_by(runs, |run| {
        run.error_categories.iter().map(String::as_str).collect()
    })
}

/// Counts the values of every environment label over `runs`.
pub fn count_labels(runs: &[&Run]) -> IndexMap<String, IndexMap<String, usize>> {
    let mut keys: Vec<&str> = Vec::new();
    for run in runs {
        for key in run.labels.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key.as_str());
            }
        }
    }

    keys.into_iter()
        .map(|key| {
            let counts = count_by(runs, |run| {
                run.labels.get(key).map(String::as_str).into_iter().collect()
            });
            (key.to_string(), counts)
        })
        .collect()
}

fn count_by<F>(runs: &[&Run], extract: F) -> IndexMap<String, usize>
where
    F: Fn(&Run) -> Vec<&str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for run in runs {
        for value in extract(run) {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let mut items: Vec<(&str, usize)> = counts.into_iter().filter(|(_, c)| *c > 0).collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    items
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::Outcome;

    fn failing(id: u64, failed: &[&str], categories: &[&str]) -> Run {
        Run::new(id, Outcome::Failure, vec!["a".into(), "b".into(), "c".into()])
            .with_failed_steps(failed.iter().copied())
            .with_error_categories(categories.iter().copied())
    }

    #[test]
    fn counts_failures_sorted_descending() {
        let runs = [
            failing(1, &["c"], &[]),
            failing(2, &["b", "c"], &[]),
            failing(3, &["c"], &[]),
            failing(4, &["a"], &[]),
        ];
        let refs: Vec<&Run> = runs.iter().collect();

        let counts = count_failures(&refs);
        let ordered: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(ordered, vec![("c", 3), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn successful_runs_contribute_nothing() {
        let run = Run::new(1, Outcome::Success, vec!["a".into()]);
        assert!(count_failures(&[&run]).is_empty());
        assert!(count_error_categories(&[&run]).is_empty());
    }

    #[test]
    fn counts_error_categories() {
        let runs = [
            failing(1, &["c"], &["Timeout occurred", "TLS handshake timeout"]),
            failing(2, &["c"], &["Timeout occurred"]),
        ];
        let refs: Vec<&Run> = runs.iter().collect();

        let counts = count_error_categories(&refs);
        assert_eq!(counts.get_index(0), Some((&"Timeout occurred".to_string(), &2)));
        assert_eq!(counts["TLS handshake timeout"], 1);
    }

    #[test]
    fn counts_label_values_per_key() {
        let runs = [
            failing(1, &["c"], &[]).with_label("IP_FAMILY", "dualstack"),
            failing(2, &["c"], &[]).with_label("IP_FAMILY", "ipv4"),
            failing(3, &["c"], &[])
                .with_label("IP_FAMILY", "dualstack")
                .with_label("KUBERNETES_VERSION", "v1.26"),
        ];
        let refs: Vec<&Run> = runs.iter().collect();

        let labels = count_labels(&refs);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["IP_FAMILY"]["dualstack"], 2);
        assert_eq!(labels["IP_FAMILY"]["ipv4"], 1);
        assert_eq!(labels["KUBERNETES_VERSION"]["v1.26"], 1);
    }

    #[test]
    fn empty_input_gives_empty_counts() {
        assert!(count_failures(&[]).is_empty());
        assert!(count_labels(&[]).is_empty());
    }
}
