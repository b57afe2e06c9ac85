use crate::config::ReadinessPolicy;
use crate::error::FatalCondition;
use crate::monitor::{ServiceState, StateCell};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const UI_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of waiting for the service to accept requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The child left `Running` before it answered.
    ServiceGone(ServiceState),
}

#[derive(Debug, Clone)]
pub struct ReadinessGate {
    policy: ReadinessPolicy,
    health_url: String,
    client: reqwest::Client,
}

impl ReadinessGate {
    pub fn new(
        policy: ReadinessPolicy,
        health_url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            policy,
            health_url: health_url.into(),
            client,
        })
    }

    /// One bounded request to `url`. Any HTTP answer counts; only a failure
    /// to connect or a timeout is an error.
    pub async fn check_reachable(&self, url: &str) -> Result<(), reqwest::Error> {
        let resp = self.client.get(url).timeout(UI_LOAD_TIMEOUT).send().await?;
        debug!(url, status = %resp.status(), "url answered");
        Ok(())
    }

    pub async fn await_ready(&self, state: &StateCell) -> Result<Readiness, FatalCondition> {
        match self.policy {
            ReadinessPolicy::FixedDelay(delay) => {
                debug!(delay_ms = delay.as_millis() as u64, "waiting fixed warm-up");
                sleep(delay).await;
                Ok(Readiness::Ready)
            }
            ReadinessPolicy::Probe { interval, timeout } => {
                self.poll(state, interval, timeout).await
            }
        }
    }

    async fn poll(
        &self,
        state: &StateCell,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Readiness, FatalCondition> {
        let started = Instant::now();
        let deadline = started + timeout;
        let request_timeout = interval.clamp(Duration::from_millis(100), MAX_REQUEST_TIMEOUT);
        let mut attempts: u32 = 0;

        loop {
            let current = state.get();
            if current != ServiceState::Running {
                debug!(state = ?current, "service left running state during startup");
                return Ok(Readiness::ServiceGone(current));
            }

            attempts += 1;
            match self
                .client
                .get(&self.health_url)
                .timeout(request_timeout)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    info!(
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "service is ready"
                    );
                    return Ok(Readiness::Ready);
                }
                Ok(resp) => debug!(attempts, status = %resp.status(), "service not ready yet"),
                Err(err) => debug!(attempts, error = %err, "service not reachable yet"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(FatalCondition::StartupTimeout {
                    elapsed: started.elapsed(),
                });
            }
            sleep(interval.min(deadline - now)).await;
        }
    }
}
