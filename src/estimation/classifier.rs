use std::sync::{Arc, RwLock};

use crate::models::{CameraSnapshot, ClassificationResult, PcSnapshot};

use super::llm::{InferenceError, InferenceGate};
use super::prompts::{format_user_prompt, SYSTEM_PROMPT};
use super::rules::{apply_rules, fallback_classify};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Rules first, then the generative classifier, then the fallback rules.
///
/// Clones share one gate slot, so `set_gate` reaches a running loop.
#[derive(Clone)]
pub struct StateClassifier {
    gate: Arc<RwLock<InferenceGate>>,
}

impl StateClassifier {
    pub fn new(gate: InferenceGate) -> Self {
        Self {
            gate: Arc::new(RwLock::new(gate)),
        }
    }

    pub fn rules_only() -> Self {
        Self::new(InferenceGate::disabled())
    }

    pub fn gate(&self) -> InferenceGate {
        match self.gate.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_gate(&self, gate: InferenceGate) {
        match self.gate.write() {
            Ok(mut guard) => *guard = gate,
            Err(poisoned) => *poisoned.into_inner() = gate,
        }
    }

    /// Always returns a verdict; inference failures degrade to the fallback.
    pub async fn classify(
        &self,
        camera: Option<&CameraSnapshot>,
        pc: Option<&PcSnapshot>,
    ) -> ClassificationResult {
        if let Some((rule, result)) = apply_rules(camera, pc) {
            log_debug!("rule '{}' matched: {}", rule, result.state);
            return result;
        }

        let user_prompt = format_user_prompt(camera, pc);
        let gate = self.gate();
        match gate.infer(SYSTEM_PROMPT, &user_prompt).await {
            Ok(result) => {
                log_debug!(
                    "classifier verdict {} ({:.2}): {}",
                    result.state,
                    result.confidence,
                    result.reasoning
                );
                result
            }
            Err(InferenceError::Disabled) => fallback_classify(camera, pc),
            Err(err) => {
                log_warn!("inference unavailable, using fallback: {err}");
                fallback_classify(camera, pc)
            }
        }
    }
}
