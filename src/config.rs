//! Relay configuration and the fixed generation parameters.

/// Model every relay request is sent to.
pub const MODEL: &str = "claude-3-sonnet-20240229";

/// Cap on generated tokens per response.
pub const MAX_TOKENS: u32 = 4096;

/// Sampling temperature for every request.
pub const TEMPERATURE: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_key: String,
}

impl RelayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Reads `ANTHROPIC_API_KEY`. A missing key does not prevent startup;
    /// it is reported per request so the server can boot without one.
    pub fn from_env() -> Self {
        Self::new(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default())
    }
}
