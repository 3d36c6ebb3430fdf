use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until the predicate holds.
    pub max_attempts: Option<u32>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum PollError<E> {
    #[error(transparent)]
    Fetch(E),

    #[error("Gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Calls `fetch` every `interval` until `is_done` accepts the value.
///
/// `on_value` sees every fetched value, the final one included. A fetch
/// error stops polling immediately.
pub async fn poll_until<T, E, F, Fut, P, O>(
    options: PollOptions,
    mut fetch: F,
    is_done: P,
    mut on_value: O,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
    O: FnMut(&T),
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let value = fetch().await.map_err(PollError::Fetch)?;
        on_value(&value);
        if is_done(&value) {
            return Ok(value);
        }
        if options.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(PollError::Exhausted { attempts });
        }
        tokio::time::sleep(options.interval).await;
    }
}
