pub mod classifier;
pub mod llm;
pub mod prompts;
pub mod rules;

pub use classifier::StateClassifier;
pub use llm::{GenerativeClassifier, InferenceError, InferenceGate};
