//! Timed HTTP GET with a browser-like `User-Agent`, backed per-scraper by an
//! anti-bot bypass pool that is promoted to on a 401/403.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

static PRE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").unwrap());

/// Per-call options: the deadline for this specific request and the
/// request-wide cancellation signal it should abort on.
#[derive(Clone)]
pub struct FetchOpts {
    pub timeout: Duration,
    pub cancellation: CancellationToken,
}

impl Default for FetchOpts {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cancellation: CancellationToken::new(),
        }
    }
}

impl FetchOpts {
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cancellation,
        }
    }
}

/// Configuration for the bypass service (a headless-browser proxy that
/// resolves anti-bot challenges and returns the resulting HTML).
#[derive(Debug, Clone)]
pub struct BypassConfig {
    pub url: String,
    pub sessions_per_pool: usize,
    pub refresh_interval: Duration,
}

/// Per-scraper session pool state. States only ever move forward:
/// `Plain -> Probing -> ForceBypass`; recovery back to `Plain` is not
/// attempted for the process lifetime.
struct BypassPool {
    sessions: Vec<String>,
    cursor: usize,
    warmup_url: String,
    force_bypass: bool,
    refresh_in_flight: bool,
}

enum FetchErr {
    Status(StatusCode),
    Other,
}

pub struct HttpClient {
    client: Client,
    bypass: Option<BypassConfig>,
    pools: RwLock<HashMap<String, Arc<Mutex<BypassPool>>>>,
}

impl HttpClient {
    pub fn new(bypass: Option<BypassConfig>) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            bypass,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Initialize a scraper's pool: create `pool_size` bypass sessions (if a
    /// bypass service is configured) and probe the scraper's front page
    /// through the standard path. If the probe returns 401/403, the pool is
    /// marked force-bypass and every session is warmed up-front.
    pub async fn init_scraper(
        &self,
        scraper: &str,
        front_page: &str,
        warmup_url: &str,
        pool_size: usize,
    ) {
        self.ensure_pool(scraper, warmup_url).await;

        let probe = self
            .standard_get(front_page, DEFAULT_TIMEOUT, &CancellationToken::new())
            .await;
        let should_force = matches!(
            probe,
            Err(FetchErr::Status(s)) if s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN
        );

        if should_force && self.bypass.is_some() {
            self.create_sessions(scraper, pool_size).await;
            self.warm_all_sessions(scraper).await;
            if let Some(pool) = self.pools.read().await.get(scraper) {
                pool.lock().await.force_bypass = true;
            }
        }
    }

    async fn ensure_pool(&self, scraper: &str, warmup_url: &str) {
        let mut pools = self.pools.write().await;
        pools.entry(scraper.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(BypassPool {
                sessions: Vec::new(),
                cursor: 0,
                warmup_url: warmup_url.to_string(),
                force_bypass: false,
                refresh_in_flight: false,
            }))
        });
    }

    async fn pool_handle(&self, scraper: &str) -> Option<Arc<Mutex<BypassPool>>> {
        self.pools.read().await.get(scraper).cloned()
    }

    async fn is_force_bypass(&self, scraper: &str) -> bool {
        match self.pool_handle(scraper).await {
            Some(pool) => pool.lock().await.force_bypass,
            None => false,
        }
    }

    async fn create_sessions(&self, scraper: &str, count: usize) {
        let Some(bypass) = &self.bypass else { return };
        let Some(pool) = self.pool_handle(scraper).await else {
            return;
        };
        for _ in 0..count {
            if let Some(session) = self.bypass_cmd_session_create(bypass).await {
                pool.lock().await.sessions.push(session);
            }
        }
    }

    async fn warm_all_sessions(&self, scraper: &str) {
        let Some(bypass) = self.bypass.clone() else {
            return;
        };
        let Some(pool) = self.pool_handle(scraper).await else {
            return;
        };
        let (sessions, warmup_url) = {
            let guard = pool.lock().await;
            (guard.sessions.clone(), guard.warmup_url.clone())
        };
        for session in sessions {
            let ok = self
                .bypass_cmd_request_get(&bypass, &warmup_url, Some(&session))
                .await
                .is_some();
            if !ok {
                // Replace a session that fails to warm: destroy + recreate + warm.
                self.bypass_cmd_session_destroy(&bypass, &session).await;
                if let Some(new_session) = self.bypass_cmd_session_create(&bypass).await {
                    let _ = self
                        .bypass_cmd_request_get(&bypass, &warmup_url, Some(&new_session))
                        .await;
                    let mut guard = pool.lock().await;
                    if let Some(slot) = guard.sessions.iter_mut().find(|s| **s == session) {
                        *slot = new_session;
                    }
                }
            }
        }
    }

    /// Periodic session refresh: for each force-bypass pool, warm every
    /// session; on failure, destroy, recreate, and warm it again. At most
    /// one refresh runs per pool at a time.
    pub async fn refresh_all_pools(&self) {
        let scrapers: Vec<String> = self.pools.read().await.keys().cloned().collect();
        for scraper in scrapers {
            let Some(pool) = self.pool_handle(&scraper).await else {
                continue;
            };
            let (force_bypass, already_refreshing) = {
                let guard = pool.lock().await;
                (guard.force_bypass, guard.refresh_in_flight)
            };
            if !force_bypass || already_refreshing {
                continue;
            }
            pool.lock().await.refresh_in_flight = true;
            self.warm_all_sessions(&scraper).await;
            pool.lock().await.refresh_in_flight = false;
        }
    }

    async fn promote_to_bypass(&self, scraper: &str) {
        let pool = match self.pool_handle(scraper).await {
            Some(pool) => pool,
            None => {
                self.ensure_pool(scraper, "").await;
                self.pool_handle(scraper).await.expect("just inserted")
            }
        };
        let needs_sessions = pool.lock().await.sessions.is_empty();
        if needs_sessions {
            let size = self
                .bypass
                .as_ref()
                .map(|b| b.sessions_per_pool)
                .unwrap_or(1);
            self.create_sessions(scraper, size).await;
            self.warm_all_sessions(scraper).await;
        }
        pool.lock().await.force_bypass = true;
    }

    /// Fetch a URL's body as text, routing through the bypass pool if
    /// force-bypass, else via the standard path (promoting on 401/403).
    pub async fn fetch_text(&self, scraper: &str, url: &str, opts: &FetchOpts) -> Option<String> {
        if opts.cancellation.is_cancelled() {
            return None;
        }
        if self.is_force_bypass(scraper).await {
            return self.bypass_get(scraper, url).await;
        }
        match self
            .standard_get(url, opts.timeout, &opts.cancellation)
            .await
        {
            Ok(body) => Some(body),
            Err(FetchErr::Status(status))
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                self.promote_to_bypass(scraper).await;
                self.bypass_get(scraper, url).await
            }
            Err(_) => None,
        }
    }

    /// Fetch a URL and parse its body as JSON (accepting bypass-wrapped
    /// `<pre>` HTML) into `T`.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        scraper: &str,
        url: &str,
        opts: &FetchOpts,
    ) -> Option<T> {
        let body = self.fetch_text(scraper, url, opts).await?;
        extract_json(&body)
    }

    async fn standard_get(
        &self,
        url: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<String, FetchErr> {
        let request = self.client.get(url).timeout(timeout).send();
        let response = tokio::select! {
            res = request => res.map_err(|_| FetchErr::Other)?,
            _ = cancellation.cancelled() => return Err(FetchErr::Other),
        };

        if response.status().is_success() {
            response.text().await.map_err(|_| FetchErr::Other)
        } else {
            Err(FetchErr::Status(response.status()))
        }
    }

    async fn bypass_get(&self, scraper: &str, url: &str) -> Option<String> {
        let bypass = self.bypass.as_ref()?;
        let session = self.next_session(scraper).await;
        self.bypass_cmd_request_get(bypass, url, session.as_deref())
            .await
    }

    async fn next_session(&self, scraper: &str) -> Option<String> {
        let pool = self.pool_handle(scraper).await?;
        let mut guard = pool.lock().await;
        if guard.sessions.is_empty() {
            return None;
        }
        let session = guard.sessions[guard.cursor % guard.sessions.len()].clone();
        guard.cursor = (guard.cursor + 1) % guard.sessions.len();
        Some(session)
    }

    async fn bypass_cmd_session_create(&self, bypass: &BypassConfig) -> Option<String> {
        let body = serde_json::json!({ "cmd": "sessions.create" });
        let resp: Value = self
            .client
            .post(&bypass.url)
            .json(&body)
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;
        if resp.get("status").and_then(Value::as_str) != Some("ok") {
            return None;
        }
        resp.get("session")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    async fn bypass_cmd_session_destroy(&self, bypass: &BypassConfig, session: &str) {
        let body = serde_json::json!({ "cmd": "sessions.destroy", "session": session });
        let _ = self.client.post(&bypass.url).json(&body).send().await;
    }

    async fn bypass_cmd_request_get(
        &self,
        bypass: &BypassConfig,
        url: &str,
        session: Option<&str>,
    ) -> Option<String> {
        let mut body = serde_json::json!({
            "cmd": "request.get",
            "url": url,
            "maxTimeout": 60_000,
        });
        if let Some(session) = session {
            body["session"] = Value::String(session.to_string());
        }
        let resp: Value = self
            .client
            .post(&bypass.url)
            .json(&body)
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;

        if resp.get("status").and_then(Value::as_str) != Some("ok") {
            return None;
        }
        let solution = resp.get("solution")?;
        let status = solution.get("status").and_then(Value::as_u64)?;
        if !(200..300).contains(&status) {
            return None;
        }
        let response = solution.get("response").and_then(Value::as_str)?;
        if response.is_empty() {
            return None;
        }
        Some(response.to_string())
    }
}

/// Accept a body that either starts with `{`/`[` after trimming, or whose
/// first `<pre>...</pre>` contents do (the bypass service wraps HTML
/// responses inconsistently).
fn extract_json<T: DeserializeOwned>(body: &str) -> Option<T> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Some(value);
        }
    }
    if let Some(caps) = PRE_BLOCK.captures(body) {
        let inner = caps.get(1)?.as_str().trim();
        let inner = html_escape_decode(inner);
        if inner.starts_with('{') || inner.starts_with('[') {
            return serde_json::from_str(&inner).ok();
        }
    }
    None
}

fn html_escape_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        ok: bool,
    }

    #[test]
    fn extract_json_accepts_plain_json() {
        let body = r#"{"ok": true}"#;
        let parsed: Option<Sample> = extract_json(body);
        assert_eq!(parsed, Some(Sample { ok: true }));
    }

    #[test]
    fn extract_json_accepts_pre_wrapped_json() {
        let body = "<html><body><pre>{\"ok\": true}</pre></body></html>";
        let parsed: Option<Sample> = extract_json(body);
        assert_eq!(parsed, Some(Sample { ok: true }));
    }

    #[test]
    fn extract_json_rejects_non_json() {
        let parsed: Option<Sample> = extract_json("<html>not json</html>");
        assert_eq!(parsed, None);
    }

    #[tokio::test]
    async fn force_bypass_starts_false_for_new_pool() {
        let client = HttpClient::new(None);
        client.ensure_pool("test", "https://example.com").await;
        assert!(!client.is_force_bypass("test").await);
    }

    #[tokio::test]
    async fn round_robin_cursor_cycles_through_sessions() {
        let client = HttpClient::new(None);
        client.ensure_pool("test", "https://example.com").await;
        if let Some(pool) = client.pool_handle("test").await {
            pool.lock().await.sessions = vec!["a".into(), "b".into()];
        }
        let first = client.next_session("test").await;
        let second = client.next_session("test").await;
        let third = client.next_session("test").await;
        assert_eq!(first.as_deref(), Some("a"));
        assert_eq!(second.as_deref(), Some("b"));
        assert_eq!(third.as_deref(), Some("a"));
    }
}
