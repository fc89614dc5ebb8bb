// Constants, overridable from the environment for local development and tests.

use std::env;

lazy_static::lazy_static! {
    // Base URL of the generative-text service. Tests point this at a mock server.
    pub static ref GEMINI_BASE_URL: String = env::var("STOCKCHAT_GEMINI_URL")
        .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
    pub static ref GEMINI_MODEL: String = env::var("STOCKCHAT_MODEL")
        .unwrap_or_else(|_| "gemini-1.5-flash".to_string());
}

/// Sampling temperature for the grounded answering pass.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
