use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::TokenGrant;
use super::device::{self, PollOutcome};
use super::schedule::{DeviceAuthFailure, PollSchedule, PollStatus, Transition};
use crate::client::TransportClient;
use crate::error::{Error, Result};
use crate::models::{DeviceCode, TokenValidation};
use crate::session::AuthSession;

/// Drives the device-code login and owns the at-most-one background poll.
pub struct AuthController {
    transport: Arc<TransportClient>,
    status_tx: watch::Sender<PollStatus>,
    active: Mutex<Option<CancellationToken>>,
    /// Bumped per poll run; only the newest run may publish status.
    generation: AtomicU64,
    /// Length of one "second" of upstream timing. Shortened in tests.
    poll_unit: Duration,
}

impl AuthController {
    pub fn new(transport: Arc<TransportClient>) -> Self {
        let (status_tx, _) = watch::channel(PollStatus::Idle);
        Self {
            transport,
            status_tx,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
            poll_unit: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_poll_unit(mut self, unit: Duration) -> Self {
        self.poll_unit = unit;
        self
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        self.transport.session()
    }

    pub fn status(&self) -> PollStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PollStatus> {
        self.status_tx.subscribe()
    }

    /// Request a fresh device code. Upstream fields come back untouched.
    pub async fn begin_device_auth(&self) -> Result<DeviceCode> {
        let code = device::request_device_code(&self.transport).await?;
        info!(
            verification_uri = %code.verification_uri,
            expires_in = code.expires_in,
            interval = code.poll_interval,
            "Device code issued"
        );
        Ok(code)
    }

    /// Poll until a token is granted, a terminal error arrives, the attempt
    /// budget runs out or `cancel` fires. The first attempt happens after one
    /// interval.
    #[instrument(skip(self, device_code, cancel))]
    pub async fn poll_for_token(
        &self,
        device_code: &str,
        interval_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<TokenGrant> {
        let generation = self.next_generation();
        self.run_poll(generation, device_code, interval_secs, cancel)
            .await
    }

    /// Spawn the poll as a background task, replacing any poll in flight.
    /// The task also gives up once `expires_in` seconds have passed.
    pub fn start_polling(
        self: &Arc<Self>,
        device_code: String,
        interval_secs: u64,
        expires_in: Option<u64>,
    ) -> JoinHandle<Result<TokenGrant>> {
        let token = CancellationToken::new();
        if let Some(previous) = self.active.lock().replace(token.clone()) {
            debug!("Superseding previous token poll");
            previous.cancel();
        }
        let generation = self.next_generation();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let poll = this.run_poll(generation, &device_code, interval_secs, &token);
            match expires_in {
                Some(secs) => {
                    let window = this.poll_unit.saturating_mul(secs.min(u32::MAX as u64) as u32);
                    match tokio::time::timeout(window, poll).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!("Device code expired before authorization");
                            Err(this.fail(generation, DeviceAuthFailure::Expired))
                        }
                    }
                }
                None => poll.await,
            }
        })
    }

    /// Stop the background poll. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match self.active.lock().take() {
            Some(token) => {
                let was_pending = self.status().is_pending();
                token.cancel();
                was_pending
            }
            None => false,
        }
    }

    /// Check an existing token against the validate endpoint.
    pub async fn validate(&self, access_token: &str) -> Result<TokenValidation> {
        device::validate_token(&self.transport, access_token).await
    }

    /// Drop any poll and forget its outcome, e.g. after logout.
    pub fn reset(&self) {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
        }
        self.next_generation();
        self.status_tx.send_replace(PollStatus::Idle);
    }

    /// Attach the owning user and the server-side lifetime to a fresh grant.
    /// A failed validation keeps the grant as issued.
    async fn identify(&self, mut grant: TokenGrant) -> TokenGrant {
        match device::validate_token(&self.transport, &grant.access_token).await {
            Ok(validation) => {
                debug!(login = %validation.login, "Token validated");
                grant.user_id = Some(validation.user_id);
                if let Some(secs) = validation.expires_in.filter(|s| *s > 0) {
                    grant.expires_in = Some(secs);
                }
            }
            Err(e) => warn!(error = %e, "Could not validate new token"),
        }
        grant
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, generation: u64, status: PollStatus) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.status_tx.send_replace(status);
        }
    }

    fn fail(&self, generation: u64, reason: DeviceAuthFailure) -> Error {
        self.publish(generation, PollStatus::Failed { reason });
        Error::device_auth_failed(reason)
    }

    async fn run_poll(
        &self,
        generation: u64,
        device_code: &str,
        interval_secs: u64,
        cancel: &CancellationToken,
    ) -> Result<TokenGrant> {
        let mut schedule = PollSchedule::new(interval_secs);
        self.publish(generation, PollStatus::Pending);
        debug!(
            max_attempts = schedule.max_attempts(),
            interval = interval_secs,
            "Polling for device authorization"
        );

        loop {
            let Some(wait) = schedule.next_wait() else {
                warn!(attempts = schedule.attempts(), "Device authorization timed out");
                return Err(self.fail(generation, schedule.exhausted()));
            };

            let sleep = self.poll_unit.saturating_mul(wait.min(u32::MAX as u64) as u32);
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Device authorization cancelled");
                    return Err(self.fail(generation, DeviceAuthFailure::Cancelled));
                }
                _ = tokio::time::sleep(sleep) => {}
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Device authorization cancelled");
                    return Err(self.fail(generation, DeviceAuthFailure::Cancelled));
                }
                outcome = device::poll_token_once(&self.transport, device_code) => outcome,
            };

            if let PollOutcome::Transient(reason) = &outcome {
                debug!(attempt = schedule.attempts(), %reason, "Token poll failed, retrying");
            }

            match (schedule.observe(&outcome), outcome) {
                (Transition::Authenticated, PollOutcome::Granted(grant)) => {
                    let grant = self.identify(grant).await;
                    self.session()
                        .authenticate(grant.access_token.clone(), grant.user_id.clone());
                    self.publish(generation, PollStatus::Authenticated);
                    info!(attempts = schedule.attempts(), "Device authorization granted");
                    return Ok(grant);
                }
                (Transition::Failed(reason), _) => {
                    warn!(%reason, "Device authorization failed");
                    return Err(self.fail(generation, reason));
                }
                _ => continue,
            }
        }
    }
}
