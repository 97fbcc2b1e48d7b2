//! Thin blocking HTTP/1.x client used for both the encrypted RPC transport
//! and the plain audio stream GET. One call in flight per `HttpClient` at a
//! time is the expected usage pattern -- callers serialize their own calls.

use std::io::Read;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Coarse result of a single HTTP attempt. Mirrors the original's waitress
/// return codes: enough detail for the dispatcher to print something
/// meaningful, nothing more.
#[derive(Debug)]
pub enum Outcome {
    Ok(Vec<u8>),
    Timeout,
    ConnectRefused,
    Forbidden,
    NotFound,
    StatusUnknown(u16),
    TlsHandshake,
    Cancelled,
    NetworkErr(String),
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build TLS/proxy configuration: {0}")]
    Config(String),
}

/// Per-request interruption: 0 = run, non-zero = abort as soon as observed.
/// Shared with the decoder interrupt callback in `rb-audio`.
pub type InterruptFlag = Arc<AtomicU8>;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retry: u32,
    pub proxy: Option<String>,
    pub control_proxy: Option<String>,
    pub ca_bundle: Option<std::path::PathBuf>,
    /// How often the cancellation watcher re-checks the interrupt flag.
    pub poll_interval: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retry: 1,
            proxy: None,
            control_proxy: None,
            ca_bundle: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

pub struct HttpClient {
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        Ok(Self { config })
    }

    fn build_agent(&self) -> Result<ureq::Agent, HttpError> {
        let mut builder = ureq::Agent::config_builder().timeout_global(Some(self.config.timeout));

        // The control proxy (routes only the control-plane RPC) overrides
        // the generic proxy when both are configured.
        let proxy_url = self
            .config
            .control_proxy
            .as_ref()
            .or(self.config.proxy.as_ref());
        if let Some(url) = proxy_url {
            let proxy = ureq::Proxy::new(url).map_err(|e| HttpError::Config(e.to_string()))?;
            builder = builder.proxy(Some(proxy));
        }

        // Status codes are interpreted by the caller, not treated as
        // transport-level errors.
        builder = builder.http_status_as_error(false);

        Ok(builder.build().into())
    }

    pub fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
        interrupted: &InterruptFlag,
    ) -> Outcome {
        self.request_with_retry("POST", url, Some(body), content_type, interrupted)
    }

    pub fn get(&self, url: &str, interrupted: &InterruptFlag) -> Outcome {
        self.request_with_retry("GET", url, None, "", interrupted)
    }

    fn request_with_retry(
        &self,
        method: &'static str,
        url: &str,
        body: Option<Vec<u8>>,
        content_type: &str,
        interrupted: &InterruptFlag,
    ) -> Outcome {
        let mut attempt = 0;
        loop {
            if interrupted.load(Ordering::SeqCst) != 0 {
                return Outcome::Cancelled;
            }
            let outcome = self.request_once(method, url, body.clone(), content_type, interrupted);
            match outcome {
                Outcome::Timeout if attempt < self.config.max_retry => {
                    attempt += 1;
                    warn!(url, attempt, "request timed out, retrying");
                    continue;
                }
                other => return other,
            }
        }
    }

    fn request_once(
        &self,
        method: &'static str,
        url: &str,
        body: Option<Vec<u8>>,
        content_type: &str,
        interrupted: &InterruptFlag,
    ) -> Outcome {
        let agent = match self.build_agent() {
            Ok(a) => a,
            Err(e) => return Outcome::NetworkErr(e.to_string()),
        };
        let url = url.to_string();
        let content_type = content_type.to_string();
        let interrupted = interrupted.clone();
        let poll_interval = self.config.poll_interval;

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            let result = run_blocking(&agent, method, &url, body, &content_type);
            // The receiver may already have given up (cancelled); ignore.
            let _ = tx.send(result);
        });

        loop {
            match rx.recv_timeout(poll_interval) {
                Ok(outcome) => {
                    let _ = worker.join();
                    return outcome;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if interrupted.load(Ordering::SeqCst) != 0 {
                        debug!(%method, "request cancelled by interrupt flag");
                        // We deliberately do not join: the socket is torn
                        // down when the worker's Agent drops after its own
                        // blocking call unwinds or times out.
                        return Outcome::Cancelled;
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Outcome::NetworkErr("worker thread died".into());
                }
            }
        }
    }
}

fn run_blocking(
    agent: &ureq::Agent,
    method: &str,
    url: &str,
    body: Option<Vec<u8>>,
    content_type: &str,
) -> Outcome {
    let result = if method == "GET" {
        agent.get(url).call()
    } else {
        let req = agent.post(url).header("Content-Type", content_type);
        match body {
            Some(b) => req.send(&b[..]),
            None => req.send(&[]),
        }
    };

    let mut response = match result {
        Ok(r) => r,
        Err(ureq::Error::Timeout(_)) => return Outcome::Timeout,
        Err(ureq::Error::ConnectionFailed) => return Outcome::ConnectRefused,
        Err(ureq::Error::Tls(_)) => return Outcome::TlsHandshake,
        Err(e) => return Outcome::NetworkErr(e.to_string()),
    };

    let status = response.status().as_u16();
    match status {
        200..=299 => {}
        403 => return Outcome::Forbidden,
        404 => return Outcome::NotFound,
        _ if status >= 400 => return Outcome::StatusUnknown(status),
        _ => {}
    }

    let mut buf = Vec::new();
    match response.body_mut().as_reader().read_to_end(&mut buf) {
        Ok(_) => Outcome::Ok(buf),
        Err(e) => Outcome::NetworkErr(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_single_retry() {
        let cfg = HttpConfig::default();
        assert_eq!(cfg.max_retry, 1);
    }

    #[test]
    fn control_proxy_overrides_generic_proxy() {
        let cfg = HttpConfig {
            proxy: Some("http://generic:8080".into()),
            control_proxy: Some("http://control:9090".into()),
            ..Default::default()
        };
        let effective = cfg.control_proxy.as_ref().or(cfg.proxy.as_ref()).unwrap();
        assert_eq!(effective, "http://control:9090");
    }

    #[test]
    fn cancelled_before_request_returns_immediately() {
        let client = HttpClient::new(HttpConfig::default()).unwrap();
        let interrupted: InterruptFlag = Arc::new(AtomicU8::new(1));
        let outcome = client.get("http://example.invalid/", &interrupted);
        assert!(matches!(outcome, Outcome::Cancelled));
    }
}
