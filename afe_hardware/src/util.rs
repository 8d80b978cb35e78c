use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::error::{HwError, Result};

/// Discard everything currently buffered in `rx`; returns how many items were dropped.
pub fn drain<T>(rx: &Receiver<T>) -> usize {
    rx.try_iter().count()
}

/// Block until `rx` yields an item accepted by `is_fresh`, or `timeout` expires.
///
/// Rejected items are dropped. `interrupted` is polled at least every
/// `poll_interval` so a shutdown request ends the wait early.
pub fn recv_fresh_with_timeout<T>(
    rx: &Receiver<T>,
    mut is_fresh: impl FnMut(&T) -> bool,
    interrupted: impl Fn() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if interrupted() {
            return Err(HwError::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(HwError::Timeout);
        }
        let slice = poll_interval.min(deadline - now);
        match rx.recv_timeout(slice) {
            Ok(item) if is_fresh(&item) => return Ok(item),
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Err(HwError::Disconnected),
        }
    }
}
