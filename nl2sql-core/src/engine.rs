use std::error::Error;

pub type EngineError = Box<dyn Error + Send + Sync>;

/// Text generation backend. Takes a full prompt and returns whatever the
/// model produced, which may include prose, echoes of the prompt or fences.
pub trait GenerationEngine {
    fn generate(&self, prompt: &str) -> Result<String, EngineError>;
}

impl<F> GenerationEngine for F
where
    F: Fn(&str) -> Result<String, EngineError>,
{
    fn generate(&self, prompt: &str) -> Result<String, EngineError> {
        self(prompt)
    }
}
