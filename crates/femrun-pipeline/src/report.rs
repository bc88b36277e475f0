//! Status, warning and error messages emitted by stages.

use femrun_io::{ManifestMessage, MessageLevel};
use parking_lot::Mutex;
use tracing::{error, info, warn};

pub trait ReportSink: Send + Sync {
    fn status(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards every message to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReport;

impl ReportSink for TracingReport {
    fn status(&self, message: &str) {
        info!(target: "femrun::report", "{message}");
    }

    fn warning(&self, message: &str) {
        warn!(target: "femrun::report", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "femrun::report", "{message}");
    }
}

/// Keeps every message in order.
#[derive(Debug, Default)]
pub struct RecordingReport {
    messages: Mutex<Vec<ManifestMessage>>,
}

impl RecordingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ManifestMessage> {
        self.messages.lock().clone()
    }

    pub fn of_level(&self, level: MessageLevel) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.level == level)
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_level(MessageLevel::Error)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.of_level(MessageLevel::Warning)
    }

    fn push(&self, level: MessageLevel, message: &str) {
        self.messages.lock().push(ManifestMessage {
            level,
            text: message.to_string(),
        });
    }
}

impl ReportSink for RecordingReport {
    fn status(&self, message: &str) {
        self.push(MessageLevel::Status, message);
    }

    fn warning(&self, message: &str) {
        self.push(MessageLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.push(MessageLevel::Error, message);
    }
}

/// Records for the run manifest while forwarding to the caller's sink.
pub(crate) struct TeeReport<'a> {
    pub(crate) inner: &'a dyn ReportSink,
    pub(crate) record: RecordingReport,
}

impl<'a> TeeReport<'a> {
    pub(crate) fn new(inner: &'a dyn ReportSink) -> Self {
        Self {
            inner,
            record: RecordingReport::new(),
        }
    }
}

impl ReportSink for TeeReport<'_> {
    fn status(&self, message: &str) {
        self.record.status(message);
        self.inner.status(message);
    }

    fn warning(&self, message: &str) {
        self.record.warning(message);
        self.inner.warning(message);
    }

    fn error(&self, message: &str) {
        self.record.error(message);
        self.inner.error(message);
    }
}
