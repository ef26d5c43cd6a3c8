use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::notification::{notification_loop, NotificationWorker};

use super::loop_worker::{integration_loop, IntegrationWorker};

/// Owns the two background loops and their shared cancellation token.
pub struct SensingController {
    handles: Vec<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.cancel_token.is_some()
    }

    pub fn start(
        &mut self,
        integration: IntegrationWorker,
        integration_period: Duration,
        notifications: NotificationWorker,
        notification_period: Duration,
    ) -> Result<()> {
        if self.is_running() {
            bail!("engine loops already active");
        }

        let cancel_token = CancellationToken::new();

        self.handles.push(tokio::spawn(integration_loop(
            integration,
            integration_period,
            cancel_token.clone(),
        )));
        self.handles.push(tokio::spawn(notification_loop(
            notifications,
            notification_period,
            cancel_token.clone(),
        )));

        info!(
            "engine loops started (integration every {:?}, notifications every {:?})",
            integration_period, notification_period
        );
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancel both loops and wait for them to exit. A no-op when stopped.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        for handle in self.handles.drain(..) {
            handle.await.context("engine loop task failed to join")?;
        }

        Ok(())
    }
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}
