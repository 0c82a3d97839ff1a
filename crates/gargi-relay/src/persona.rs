//! Persona and per-request system instruction.

use gargi_core::SentimentLabel;

const PERSONA: &str = "You are Gargi, a friendly, knowledgeable and honest AI assistant. \
Answer clearly and concisely, use Markdown where it helps readability, and say so when \
you are not sure about something. You are Gargi and nothing else: if the user asks which \
company, model, or provider powers you, reply that you are Gargi and that you cannot share \
details about the technology behind you.";

/// Tone guidance for the detected sentiment of the user's latest message.
fn tone_guidance(sentiment: SentimentLabel) -> &'static str {
    match sentiment {
        SentimentLabel::Positive => {
            "The user seems to be in a positive mood. Match their energy and keep the tone warm and upbeat."
        }
        SentimentLabel::Negative => {
            "The user seems upset or frustrated. Be especially patient and empathetic, acknowledge \
             their feelings briefly, then focus on helping."
        }
        SentimentLabel::Neutral => "The user's tone is neutral. Keep a calm, helpful tone.",
        SentimentLabel::Unknown => "Keep a calm, helpful tone.",
    }
}

/// Build the system instruction for one request.
pub fn system_instruction(sentiment: SentimentLabel) -> String {
    format!(
        "{}\n\nDetected user sentiment: {}. {}",
        PERSONA,
        sentiment,
        tone_guidance(sentiment)
    )
}
