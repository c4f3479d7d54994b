// User-facing operation notifications

/// Sink for the success/failure message each auth operation produces.
///
/// The front end renders these as toasts; the gateway's default sink
/// writes structured log records.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// Notifier that records outcomes in the log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(outcome = "success", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::warn!(outcome = "error", "{}", message);
    }
}
