mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{export_explanation, export_frequencies, export_insights, persist_tables};
pub use progress::PhaseProgress;
pub use styling::dim;

use console::style;

/// Prints the `SeqLens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        style("🔍 SeqLens").magenta().bold(),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI Failure Sequence Analysis")
    );
}
