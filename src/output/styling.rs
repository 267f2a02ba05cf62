use std::fmt::Display;

use console::{style, StyledObject};

/// Thresholds above which a share is shown as alarming or notable.
const ALARMING_SHARE: f64 = 0.5;
const NOTABLE_SHARE: f64 = 0.2;

/// Highlighted value in a report line.
pub fn bright_yellow(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn cyan(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

/// Emoji followed by an underlined title.
pub fn heading(emoji: &str, title: &str) -> String {
    format!(
        "{} {}",
        style(emoji).bright(),
        style(title).bright().underlined()
    )
}

/// Formats a 0..=1 fraction as a percentage, red when a pattern explains
/// most failures and yellow when it explains a notable share.
pub fn share(fraction: f64) -> StyledObject<String> {
    let text = style(format!("{:.1}%", fraction * 100.0)).bright();
    if fraction >= ALARMING_SHARE {
        text.red()
    } else if fraction >= NOTABLE_SHARE {
        text.yellow()
    } else {
        text.green()
    }
}
