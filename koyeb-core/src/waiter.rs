//! Waiter - Poll a single object until its status reaches a target set
//!
//! Used after create (wait for the object to become ready) and after delete
//! (wait for it to disappear). The waiter knows nothing about object types:
//! callers pass a fetch closure bound to one ID and an extractor that reads
//! the status off whatever the fetch returns.

use std::future::Future;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::ApiError;

/// Default delay between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default overall deadline
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Errors returned by [`wait_for_status`]
#[derive(Debug, Error)]
pub enum WaitError {
    /// The object disappeared while it was expected to become ready
    #[error("{label} not found while waiting for it to become ready")]
    NotFound { label: String },

    /// The deadline passed before a target status was observed
    #[error(
        "{label} failed to reach status {targets:?} after {timeout:?} (last status: {last_status})"
    )]
    Timeout {
        label: String,
        targets: Vec<String>,
        timeout: Duration,
        last_status: String,
    },

    /// The caller gave up on the wait
    #[error("Waiting for {label} was cancelled")]
    Cancelled { label: String },

    /// The fetch call failed
    #[error(transparent)]
    Upstream(ApiError),
}

pub type WaitResult<T> = Result<T, WaitError>;

/// How a wait behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// If false, a not-found response ends the wait successfully
    /// (waiting for deletion). If true, it is an error (waiting for
    /// an object to become ready).
    pub not_found_is_error: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            not_found_is_error: true,
        }
    }
}

impl WaitOptions {
    /// Options for waiting until an object reaches a ready status
    pub fn until_ready(timeout: Duration) -> Self {
        Self {
            timeout,
            not_found_is_error: true,
            ..Default::default()
        }
    }

    /// Options for waiting until an object is gone
    pub fn until_gone(timeout: Duration) -> Self {
        Self {
            timeout,
            not_found_is_error: false,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Poll `fetch` until the status read by `extract` is one of `targets`
///
/// Returns the object that reached a target status, or `None` when the
/// object was not found and `options.not_found_is_error` is false. Any other
/// fetch error is returned immediately without retrying. `cancel` aborts
/// the wait at any point, including while a fetch is in flight. No poll
/// runs past `options.timeout`.
pub async fn wait_for_status<T, F, Fut, E>(
    mut fetch: F,
    extract: E,
    label: &str,
    targets: &[&str],
    options: WaitOptions,
    cancel: &CancellationToken,
) -> WaitResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    E: Fn(&T) -> &str,
{
    let deadline = Instant::now() + options.timeout;
    let mut last_status = String::from("unknown");

    while Instant::now() < deadline {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                label: label.to_string(),
            });
        }

        // A fetch in flight is bounded by both the token and the deadline
        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    label: label.to_string(),
                });
            }
            fetched = tokio::time::timeout_at(deadline, fetch()) => fetched,
        };
        let Ok(fetched) = fetched else {
            debug!("{} fetch still pending at the deadline", label);
            break;
        };

        match fetched {
            Ok(value) => {
                let status = extract(&value);
                if targets.contains(&status) {
                    debug!("{} reached status {}", label, status);
                    return Ok(Some(value));
                }
                debug!("{} is {}, waiting for {:?}", label, status, targets);
                last_status = status.to_string();
            }
            Err(err) if err.is_not_found() => {
                if options.not_found_is_error {
                    return Err(WaitError::NotFound {
                        label: label.to_string(),
                    });
                }
                debug!("{} is gone", label);
                return Ok(None);
            }
            Err(err) => return Err(WaitError::Upstream(err)),
        }

        let pause = options
            .interval
            .min(deadline.saturating_duration_since(Instant::now()));
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    label: label.to_string(),
                });
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }

    Err(WaitError::Timeout {
        label: label.to_string(),
        targets: targets.iter().map(|t| t.to_string()).collect(),
        timeout: options.timeout,
        last_status,
    })
}
