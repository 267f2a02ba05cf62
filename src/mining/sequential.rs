use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::error::Result;

/// Bounds applied to every invocation of the miner.
#[derive(Debug, Clone, Copy)]
pub struct MiningLimits {
    /// Wall-clock budget per invocation
    pub timeout: Duration,
    /// Longest sub-sequence to enumerate; unbounded when `None`
    pub max_length: Option<usize>,
}

impl Default for MiningLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_length: None,
        }
    }
}

/// Runs the miner on the blocking pool under the configured timeout.
///
/// Returns `Ok(None)` on timeout. The miner is then cancelled and awaited, so
/// no enumeration outlives the call.
///
/// # Errors
///
/// Returns an error if the mining task panics.
pub async fn mine_blocking(
    sequences: Vec<Vec<String>>,
    min_count: usize,
    limits: MiningLimits,
) -> Result<Option<Vec<FrequentSequence>>> {
    debug!(
        "Mining {} sequences with minimum count {min_count}",
        sequences.len()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let miner = SequenceMiner::new(min_count)
        .with_max_length(limits.max_length)
        .with_cancel(Arc::clone(&cancel));
    let mut task = tokio::task::spawn_blocking(move || miner.mine(&sequences));

    match tokio::time::timeout(limits.timeout, &mut task).await {
        Ok(joined) => Ok(Some(joined?)),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            // partial output is discarded
            task.await?;
            Ok(None)
        }
    }
}

/// A sub-sequence found in at least `min_count` input sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequentSequence {
    pub items: Vec<String>,
    /// Number of input sequences containing `items` in order
    pub count: usize,
}

/// Frequent sequential pattern miner over single-item events.
///
/// Uses prefix projection: every frequent prefix keeps, per input sequence,
/// the offset just after the prefix's earliest embedding and grows only with
/// items found after that offset. Items need not be adjacent to count as
/// "in order".
pub struct SequenceMiner {
    min_count: usize,
    max_length: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
}

struct Database {
    symbols: Vec<String>,
    sequences: Vec<Vec<u32>>,
}

impl SequenceMiner {
    /// `min_count` is clamped to at least one sequence.
    pub fn new(min_count: usize) -> Self {
        Self {
            min_count: min_count.max(1),
            max_length: None,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
        self.max_length = max_length;
        self
    }

    /// Stops enumeration once `cancel` is set; whatever was found so far is
    /// returned.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(Ordering::Relaxed))
    }

    /// Returns every distinct ordered sub-sequence contained in at least
    /// `min_count` of `sequences`, with its count.
    ///
    /// Output is deterministic: depth-first, items in first-seen order.
    pub fn mine<S: AsRef<str>>(&self, sequences: &[Vec<S>]) -> Vec<FrequentSequence> {
        let db = Database::intern(sequences);
        let projected: Vec<(usize, usize)> = (0..db.sequences.len()).map(|i| (i, 0)).collect();

        let mut found: Vec<(Vec<u32>, usize)> = Vec::new();
        let mut prefix = Vec::new();
        self.grow(&db, &mut prefix, &projected, &mut found);

        found
            .into_iter()
            .map(|(items, count)| FrequentSequence {
                items: items
                    .into_iter()
                    .map(|symbol| db.symbols[symbol as usize].clone())
                    .collect(),
                count,
            })
            .collect()
    }

    fn grow(
        &self,
        db: &Database,
        prefix: &mut Vec<u32>,
        projected: &[(usize, usize)],
        found: &mut Vec<(Vec<u32>, usize)>,
    ) {
        if self.is_cancelled() || self.max_length.is_some_and(|max| prefix.len() >= max) {
            return;
        }

        // symbol ids follow first-seen order, so BTreeMap iteration is stable
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for &(seq, start) in projected {
            let mut seen = HashSet::new();
            for &item in &db.sequences[seq][start..] {
                if seen.insert(item) {
                    *counts.entry(item).or_insert(0) += 1;
                }
            }
        }

        for (item, count) in counts {
            if count < self.min_count {
                continue;
            }

            prefix.push(item);
            found.push((prefix.clone(), count));

            let next: Vec<(usize, usize)> = projected
                .iter()
                .filter_map(|&(seq, start)| {
                    db.sequences[seq][start..]
                        .iter()
                        .position(|&x| x == item)
                        .map(|offset| (seq, start + offset + 1))
                })
                .collect();
            self.grow(db, prefix, &next, found);

            prefix.pop();
        }
    }
}

impl Database {
    #[allow(clippy::cast_possible_truncation)]
    fn intern<S: AsRef<str>>(sequences: &[Vec<S>]) -> Self {
        let mut ids: HashMap<&str, u32> = HashMap::new();
        let mut symbols = Vec::new();

        let sequences = sequences
            .iter()
            .map(|sequence| {
                sequence
                    .iter()
                    .map(|item| {
                        let item = item.as_ref();
                        *ids.entry(item).or_insert_with(|| {
                            symbols.push(item.to_string());
                            (symbols.len() - 1) as u32
                        })
                    })
                    .collect()
            })
            .collect();

        Self { symbols, sequences }
    }
}
