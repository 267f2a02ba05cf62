mod anchored;
mod baseline;
mod explain;
mod pattern;
mod pipeline;
mod prune;
mod sequential;

pub use anchored::AnchorSummary;
pub use explain::{explain, Explanation};
pub use pattern::{Pattern, PatternPopulation, Source};
pub use pipeline::{MiningSettings, PatternMiner};
pub use prune::PruneStats;
pub use sequential::MiningLimits;
