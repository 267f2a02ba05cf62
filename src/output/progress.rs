use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_yellow, heading};

/// Progress tracking for the three mining phases
pub struct PhaseProgress {
    pb: ProgressBar,
    visible: bool,
}

impl PhaseProgress {
    pub fn start_phase_1(visible: bool, min_support: f64) -> Self {
        if visible {
            eprintln!("{}", heading("⚙️", "Phases"));
        }
        let pb = create_spinner(
            visible,
            bright_yellow(format!("Phase 1/3: Mining failure patterns (support {min_support})"))
                .to_string(),
        );
        Self { pb, visible }
    }

    pub fn finish_phase_1_start_phase_2(self, pattern_count: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Found {pattern_count} failure patterns ✓"))
                .to_string(),
        );
        let pb = create_spinner(
            self.visible,
            bright_yellow("Phase 2/3: Mining baseline patterns").to_string(),
        );
        Self {
            pb,
            visible: self.visible,
        }
    }

    pub fn finish_phase_2_start_phase_3(self, pattern_count: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 2/3: Found {pattern_count} baseline patterns ✓"))
                .to_string(),
        );
        let pb = create_spinner(
            self.visible,
            bright_yellow("Phase 3/3: Pruning irrelevant patterns").to_string(),
        );
        Self {
            pb,
            visible: self.visible,
        }
    }

    pub fn finish_phase_3(self, pattern_count: usize) {
        self.pb.finish_with_message(
            bright_green(format!("Phase 3/3: Kept {pattern_count} relevant patterns ✓"))
                .to_string(),
        );
        if self.visible {
            eprintln!();
        }
    }

    /// Stops the current phase without marking it complete.
    pub fn abandon(self, reason: &str) {
        self.pb.abandon_with_message(reason.to_string());
        if self.visible {
            eprintln!();
        }
    }
}

fn create_spinner(visible: bool, message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if visible {
        pb.set_draw_target(ProgressDrawTarget::stderr());
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    if visible {
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
    }
    pb
}
