//! Lifecycle of the estimation poller.

/// State of the estimation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    /// No usable sample has been seen yet; polling with backoff.
    #[default]
    AwaitingFirstSample,
    /// Estimating whenever fresh data arrives.
    Running,
    /// Loop ended after a cancellation request.
    Stopped,
}
