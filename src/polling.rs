use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::bot::AppState;

/// Sequential long-polling loop. Owns the update cursor.
pub struct Poller {
    state: Arc<AppState>,
    offset: u32,
    timeout_secs: u32,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(state: Arc<AppState>) -> Self {
        let polling = &state.config.polling;
        let timeout_secs = polling.timeout_secs;
        let retry_delay = Duration::from_secs(polling.retry_delay_secs);
        Self {
            state,
            offset: 0,
            timeout_secs,
            retry_delay,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Fetch one batch and handle each update before acknowledging it.
    /// Returns the number of updates handled.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .state
            .api()
            .get_updates(self.offset, self.timeout_secs)
            .await?;

        let count = updates.len();
        for update in updates {
            let next = update.update_id.saturating_add(1);
            self.state.handle_update(update).await;
            self.offset = self.offset.max(next);
        }

        if count > 0 {
            debug!("Handled {} update(s), offset now {}", count, self.offset);
        }
        Ok(count)
    }

    /// Poll until Ctrl-C. Transport errors are logged and retried after a delay.
    pub async fn run(mut self) -> Result<()> {
        info!("Polling for updates...");

        loop {
            let result = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down poller");
                    return Ok(());
                }
                result = self.poll_once() => result,
            };

            if let Err(e) = result {
                warn!(
                    "Polling failed at offset {}, retrying in {:?}: {:#}",
                    self.offset(),
                    self.retry_delay,
                    e
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}
