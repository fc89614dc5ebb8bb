use tracing::info;

use crate::constants::DEFAULT_TEMPERATURE;
use crate::gemini::{GeminiClient, LlmError};
use crate::ChatTurn;

/// One persistent conversation. Created once the credential is supplied and
/// kept for the rest of the process; the persona (with the inventory context
/// embedded) is frozen at construction.
#[derive(Debug)]
pub struct ChatSession {
    persona: String,
    temperature: f32,
    transcript: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(persona: String) -> Self {
        Self { persona, temperature: DEFAULT_TEMPERATURE, transcript: Vec::new() }
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Append a user turn, replay the persona plus the whole transcript to
    /// the remote model, and record the reply as an assistant turn.
    ///
    /// On failure the user turn stays in the transcript with no matching
    /// assistant turn, so the user can resubmit.
    pub async fn send(&mut self, client: &GeminiClient, text: &str) -> Result<String, LlmError> {
        self.transcript.push(ChatTurn::user(text));
        let reply = client
            .generate_with_history(&self.persona, &self.transcript, self.temperature)
            .await?;
        self.transcript.push(ChatTurn::assistant(reply.clone()));
        info!(turns = self.transcript.len(), "Recorded conversation exchange");
        Ok(reply)
    }
}

/// Build the instruction for the historyless tone-rewrite pass, embedding the
/// question and the raw answer verbatim.
pub fn polish_prompt(question: &str, raw_answer: &str) -> String {
    format!(
        "You are a helpful assistant. Rewrite the following answer in a clear, professional, and friendly tone.\n\n\nOriginal Question:\n{}\n\nOriginal Answer:\n{}\n\nPolished Answer:\n",
        question, raw_answer
    )
}

/// Stateless refinement pass: rewrite `raw_answer`'s tone without a
/// conversation history. Best-effort; nothing checks that meaning survived.
pub async fn refine(
    client: &GeminiClient,
    question: &str,
    raw_answer: &str,
) -> Result<String, LlmError> {
    let polished = client.generate_single(&polish_prompt(question, raw_answer)).await?;
    Ok(polished.trim().to_string())
}
