//! Gateway to the generative classifier.
//!
//! The backend is an opaque blocking call. `InferenceGate` runs it on the
//! blocking pool behind a single process-wide lock and bounds the whole call,
//! including the wait for that lock, with a timeout.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{BehaviorState, ClassificationResult, ClassificationSource};

/// A text-in, text-out classifier. Implementations may block or hang.
pub trait GenerativeClassifier: Send + Sync {
    fn classify(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("generative classifier is disabled")]
    Disabled,

    #[error("inference did not finish within {0:?}")]
    Timeout(Duration),

    #[error("classifier backend failed: {0}")]
    Backend(String),

    #[error("inference worker failed: {0}")]
    WorkerFailed(String),

    #[error("malformed classifier output: {0}")]
    Malformed(String),
}

#[derive(Clone)]
pub struct InferenceGate {
    backend: Option<Arc<dyn GenerativeClassifier>>,
    lock: Arc<Mutex<()>>,
    timeout: Duration,
}

impl InferenceGate {
    pub fn new(backend: Arc<dyn GenerativeClassifier>, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            lock: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            lock: Arc::new(Mutex::new(())),
            timeout: Duration::ZERO,
        }
    }

    /// A gate with a new backend and timeout that shares this gate's lock,
    /// so a call still running on the old gate keeps out calls on the new one.
    pub fn reconfigured(
        &self,
        backend: Option<Arc<dyn GenerativeClassifier>>,
        timeout: Duration,
    ) -> Self {
        Self {
            timeout: if backend.is_some() { timeout } else { Duration::ZERO },
            backend,
            lock: Arc::clone(&self.lock),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One exclusive, time-bounded classification.
    ///
    /// The lock guard moves into the blocking worker, so a call abandoned on
    /// timeout still holds the lock until the backend returns.
    pub async fn infer(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<ClassificationResult, InferenceError> {
        let backend = self.backend.clone().ok_or(InferenceError::Disabled)?;
        let lock = Arc::clone(&self.lock);
        let system_prompt = system_prompt.to_string();
        let user_prompt = user_prompt.to_string();

        let call = async move {
            let guard = lock.lock_owned().await;
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                backend.classify(&system_prompt, &user_prompt)
            })
            .await
        };

        let raw = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => return Err(InferenceError::Timeout(self.timeout)),
            Ok(Err(join_err)) => return Err(InferenceError::WorkerFailed(join_err.to_string())),
            Ok(Ok(Err(err))) => return Err(InferenceError::Backend(format!("{err:#}"))),
            Ok(Ok(Ok(text))) => text,
        };

        parse_verdict(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    state: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Extract the first `{...}` span from the model output and validate it.
pub fn parse_verdict(raw: &str) -> Result<ClassificationResult, InferenceError> {
    let start = raw
        .find('{')
        .ok_or_else(|| InferenceError::Malformed("no JSON object in output".to_string()))?;
    let end = raw
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| InferenceError::Malformed("unterminated JSON object".to_string()))?;

    let verdict: RawVerdict = serde_json::from_str(&raw[start..=end])
        .map_err(|err| InferenceError::Malformed(err.to_string()))?;

    let state = match BehaviorState::parse(&verdict.state) {
        Ok(BehaviorState::Unknown) | Err(_) => {
            return Err(InferenceError::Malformed(format!(
                "unsupported state '{}'",
                verdict.state
            )))
        }
        Ok(state) => state,
    };

    let confidence = verdict.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    if !confidence.is_finite() {
        return Err(InferenceError::Malformed(format!(
            "non-finite confidence {confidence}"
        )));
    }

    Ok(ClassificationResult::new(
        state,
        confidence,
        verdict.reasoning.unwrap_or_default(),
        ClassificationSource::Llm,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(&'static str);

    impl GenerativeClassifier for Fixed {
        fn classify(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl GenerativeClassifier for Failing {
        fn classify(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            anyhow::bail!("model not loaded")
        }
    }

    /// Sleeps on every call and records the peak number of overlapping calls.
    struct Slow {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GenerativeClassifier for Slow {
        fn classify(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(r#"{"state":"focused","confidence":0.8,"reasoning":"ok"}"#.to_string())
        }
    }

    /// First call is slow, later calls answer immediately.
    struct SlowOnce {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl GenerativeClassifier for SlowOnce {
        fn classify(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::thread::sleep(self.delay);
            }
            Ok(r#"{"state":"idle","confidence":0.7,"reasoning":"no input"}"#.to_string())
        }
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let raw = "Sure! ```json\n{\"state\": \"Drowsy\", \"confidence\": 0.82, \"reasoning\": \"low EAR\"}\n```";
        let result = parse_verdict(raw).unwrap();
        assert_eq!(result.state, BehaviorState::Drowsy);
        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.reasoning, "low EAR");
        assert_eq!(result.source, ClassificationSource::Llm);
    }

    #[test]
    fn missing_confidence_defaults_and_large_values_clamp() {
        let result = parse_verdict(r#"{"state":"idle"}"#).unwrap();
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.reasoning, "");

        let result = parse_verdict(r#"{"state":"away","confidence":3}"#).unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn invalid_outputs_are_malformed() {
        for raw in [
            "I think they are focused",
            r#"{"state":"sleeping","confidence":0.9}"#,
            r#"{"state":"unknown","confidence":0.9}"#,
            r#"{"confidence":0.9}"#,
            "} {",
        ] {
            assert!(
                matches!(parse_verdict(raw), Err(InferenceError::Malformed(_))),
                "accepted {raw}"
            );
        }
    }

    #[tokio::test]
    async fn disabled_gate_refuses() {
        let gate = InferenceGate::disabled();
        assert!(!gate.is_enabled());
        assert!(matches!(
            gate.infer("s", "u").await,
            Err(InferenceError::Disabled)
        ));
    }

    #[tokio::test]
    async fn backend_errors_are_reported() {
        let gate = InferenceGate::new(Arc::new(Failing), Duration::from_secs(1));
        let err = gate.infer("s", "u").await.unwrap_err();
        assert!(matches!(err, InferenceError::Backend(ref msg) if msg.contains("not loaded")));

        let gate = InferenceGate::new(Arc::new(Fixed("no json here")), Duration::from_secs(1));
        assert!(matches!(
            gate.infer("s", "u").await,
            Err(InferenceError::Malformed(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn calls_never_overlap() {
        let backend = Arc::new(Slow {
            delay: Duration::from_millis(40),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let gate = InferenceGate::new(backend.clone(), Duration::from_secs(5));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.infer("s", "u").await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timed_out_call_keeps_the_lock_until_it_returns() {
        let backend = Arc::new(SlowOnce {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(600),
        });
        let gate = InferenceGate::new(backend.clone(), Duration::from_millis(100));

        assert!(matches!(
            gate.infer("s", "u").await,
            Err(InferenceError::Timeout(_))
        ));
        // the first backend call is still running and owns the lock
        assert!(matches!(
            gate.infer("s", "u").await,
            Err(InferenceError::Timeout(_))
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(700)).await;
        let result = gate.infer("s", "u").await.unwrap();
        assert_eq!(result.state, BehaviorState::Idle);
    }

    #[tokio::test]
    async fn reconfigured_gate_shares_the_lock() {
        let backend = Arc::new(SlowOnce {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(600),
        });
        let gate = InferenceGate::new(backend.clone(), Duration::from_millis(100));
        assert!(matches!(
            gate.infer("s", "u").await,
            Err(InferenceError::Timeout(_))
        ));

        let longer = gate.reconfigured(Some(backend.clone()), Duration::from_secs(2));
        assert_eq!(longer.timeout(), Duration::from_secs(2));
        // waits for the abandoned call, then runs
        let result = longer.infer("s", "u").await.unwrap();
        assert_eq!(result.state, BehaviorState::Idle);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

        let off = longer.reconfigured(None, Duration::from_secs(2));
        assert!(!off.is_enabled());
        assert_eq!(off.timeout(), Duration::ZERO);
    }
}
