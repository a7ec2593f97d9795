//! Out-of-band OAuth bootstrap
//!
//! 1. ask put.io for an OOB code
//! 2. send the user to the approval page
//! 3. poll the code until a token shows up, the deadline passes, or the
//!    caller cancels

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::putio::BASE_URL;

pub const CLIENT_ID: &str = "8918";

#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// The two OAuth endpoints the bootstrap needs.
#[async_trait]
pub trait OobApi: Send + Sync {
    async fn request_code(&self) -> Result<String>;
    /// `Ok(None)` while the code has not been approved yet.
    async fn check_code(&self, code: &str) -> Result<Option<String>>;
}

pub fn approval_url(code: &str) -> String {
    format!(
        "https://app.put.io/authenticate?client_id={}&response_type=oob&oob_code={}",
        CLIENT_ID, code
    )
}

/// One pending approval: the code plus when we stop waiting for it.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub code: String,
    pub deadline: Instant,
    pub poll_interval: Duration,
}

impl AuthSession {
    pub fn new(code: String, policy: &AuthPolicy) -> Self {
        Self {
            code,
            deadline: Instant::now() + policy.timeout,
            poll_interval: policy.poll_interval,
        }
    }

    /// Poll until approval. Poll errors are treated as "not yet approved".
    pub async fn wait_for_token(
        &self,
        api: &dyn OobApi,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let deadline = tokio::time::sleep_until(self.deadline);
        tokio::pin!(deadline);
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempt: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = &mut deadline => return Err(Error::Timeout("authentication".into())),
                _ = ticker.tick() => {
                    attempt += 1;
                    match api.check_code(&self.code).await {
                        Ok(Some(token)) => {
                            info!("OOB code approved after {} polls", attempt);
                            return Ok(token);
                        }
                        Ok(None) => {}
                        Err(e) => debug!("OOB poll {} failed: {}", attempt, e),
                    }
                }
            }
        }
    }
}

/// Full bootstrap. `prompt` receives the approval URL before polling starts;
/// whatever it does to show it to the user must not fail the flow.
pub async fn authenticate<F>(
    api: &dyn OobApi,
    policy: &AuthPolicy,
    cancel: &CancellationToken,
    prompt: F,
) -> Result<String>
where
    F: FnOnce(&str),
{
    let code = api.request_code().await?;
    let session = AuthSession::new(code, policy);
    prompt(&approval_url(&session.code));
    session.wait_for_token(api, cancel).await
}

/// Routes SIGINT to the bootstrap only while it is armed. The process-wide
/// handler asks `fire`; once disarmed the caller exits as if no handler were
/// installed.
#[derive(Debug, Clone, Default)]
pub struct InterruptGate {
    armed: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptGate {
    pub fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    pub fn disarm(&self) {
        self.slot().take();
    }

    /// Cancel the armed bootstrap. False when nothing is armed.
    pub fn fire(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.armed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Deserialize)]
struct CodeResponse {
    code: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    oauth_token: Option<String>,
}

/// reqwest-backed OOB endpoints. Unauthenticated.
pub struct OobClient {
    http: Client,
    base_url: String,
}

impl OobClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OobApi for OobClient {
    async fn request_code(&self) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/oauth2/oob/code", self.base_url))
            .query(&[("app_id", CLIENT_ID)])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Service(format!("unexpected status {}: {}", status, body)));
        }
        let parsed: CodeResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Service(format!("bad OOB code response: {}", e)))?;
        Ok(parsed.code)
    }

    async fn check_code(&self, code: &str) -> Result<Option<String>> {
        let resp = self
            .http
            .get(format!("{}/oauth2/oob/code/{}", self.base_url, code))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let body: TokenResponse = resp.json().await?;
        Ok(body.oauth_token.filter(|t| !t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Approves on the `approve_at`-th poll (never if 0); optionally fails
    /// every other poll with a transport error.
    struct FakeOob {
        approve_at: u32,
        flaky: bool,
        polls: AtomicU32,
    }

    impl FakeOob {
        fn new(approve_at: u32) -> Self {
            Self { approve_at, flaky: false, polls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl OobApi for FakeOob {
        async fn request_code(&self) -> Result<String> {
            Ok("ABC123".into())
        }

        async fn check_code(&self, code: &str) -> Result<Option<String>> {
            assert_eq!(code, "ABC123");
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.approve_at != 0 && n >= self.approve_at {
                return Ok(Some("tok-xyz".into()));
            }
            if self.flaky && n % 2 == 0 {
                return Err(Error::Transport("connection reset".into()));
            }
            Ok(None)
        }
    }

    #[test]
    fn interrupt_only_reaches_an_armed_bootstrap() {
        let gate = InterruptGate::default();
        assert!(!gate.fire());

        let cancel = gate.arm();
        let handler = gate.clone();
        assert!(handler.fire());
        assert!(cancel.is_cancelled());

        let next = gate.arm();
        gate.disarm();
        assert!(!handler.fire());
        assert!(!next.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn token_returned_on_approving_poll() {
        let api = FakeOob::new(4);
        let started = Instant::now();
        let token = authenticate(&api, &AuthPolicy::default(), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(token, "tok-xyz");
        assert_eq!(api.polls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_are_swallowed() {
        let api = FakeOob { approve_at: 7, flaky: true, polls: AtomicU32::new(0) };
        let token = authenticate(&api, &AuthPolicy::default(), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(token, "tok-xyz");
    }

    #[tokio::test(start_paused = true)]
    async fn never_approved_times_out_after_five_minutes() {
        let api = FakeOob::new(0);
        let started = Instant::now();
        let err = authenticate(&api, &AuthPolicy::default(), &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_before_approval() {
        let api = FakeOob::new(100);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let err = authenticate(&api, &AuthPolicy::default(), &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(api.polls.load(Ordering::SeqCst) < 100);
    }

    #[tokio::test]
    async fn prompt_sees_approval_url() {
        let api = FakeOob::new(1);
        let policy = AuthPolicy {
            poll_interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        };
        let mut shown = String::new();
        authenticate(&api, &policy, &CancellationToken::new(), |url| shown = url.to_string())
            .await
            .unwrap();
        assert!(shown.ends_with("oob_code=ABC123"));
        assert!(shown.contains("client_id=8918"));
    }
}
