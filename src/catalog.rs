use crate::runs::MESSAGE_SEPARATOR;

/// Failure-message fragments recognised as known error categories.
///
/// A failure message belongs to the first fragment it contains, so more
/// specific fragments must precede the general ones they overlap with.
const KNOWN_MESSAGES: &[&str] = &[
    "Internal error occurred: error executing command in container: failed to exec in container: failed to create exec",
    "All targets with the stream opened should have received traffic",
    "command terminated with exit code 137",
    "Timed out after",
    "Internal error occurred: error executing command in container: failed to exec in container: failed to load task",
    "command terminated with exit code 1; FAILED mapSharedData: tshm-stream-a-i",
    "unable to upgrade connection: container not found",
    "read: connection reset by peer - error from a previous attempt",
    "Internal error occurred: failed calling webhook",
    "command terminated with exit code 143",
    "Error from server (NotFound): pods",
    "No target should have received the traffic",
    "a vip cannot be shared between 2 conduits in this version",
    "unable to decode an event from the watch stream: http2: client connection lost",
    "error sending request",
    "a vip cannot be shared between 2 attractors in this version",
    "TLS handshake timeout",
    "Timeout occurred",
    "timed out waiting for the condition on pods",
];

/// Normalises free-text failure messages into error categories.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    extra: Vec<String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MessageCatalog {
    /// Creates a catalog with additional fragments checked after the built-ins.
    pub fn new(extra: Vec<String>) -> Self {
        Self { extra }
    }

    /// Returns the category for a failure message.
    ///
    /// Unknown messages pass through verbatim, with the characters that would
    /// break a CSV row replaced.
    pub fn categorize(&self, message: &str) -> String {
        KNOWN_MESSAGES
            .iter()
            .copied()
            .chain(self.extra.iter().map(String::as_str))
            .find(|fragment| !fragment.is_empty() && message.contains(fragment))
            .map_or_else(|| sanitize_field(message), |fragment| sanitize_field(fragment))
    }
}

/// Makes a value safe to store in one comma-delimited field.
///
/// Runs of `*` long enough to read as the `MESSAGE` separator are collapsed.
pub fn sanitize_field(value: &str) -> String {
    let mut field = value.trim().replace(',', ";").replace(['\r', '\n'], " ");
    while field.contains(MESSAGE_SEPARATOR) {
        field = field.replace(MESSAGE_SEPARATOR, "*");
    }
    field
}
