//! Prompt assembly for the medical assistant

use medrag_core::RetrievedContext;

/// Appended to replies that do not already point the user to a professional
pub const DISCLAIMER: &str = "Disclaimer: This information is for educational purposes only and \
is not a substitute for professional medical advice. Please consult a healthcare professional \
about your specific situation.";

const NO_CONTEXT_NOTE: &str = "No relevant medical context was found for this question. \
Say so, and answer only with general, widely accepted information.";

const SYSTEM_INSTRUCTIONS: &str = "You are a professional medical information assistant. \
Answer the user's question using the medical context below. \
Be accurate, empathetic and clear. \
Always add a disclaimer advising users to consult a healthcare professional.";

/// Build the generation prompt for a question and its retrieved context
pub fn build_prompt(context: &RetrievedContext, question: &str) -> String {
    let context_block = if context.has_context {
        context.context.as_str()
    } else {
        NO_CONTEXT_NOTE
    };

    format!(
        "{}\n\nMedical Context:\n{}\n\nUser Question: {}\n\nAnswer:",
        SYSTEM_INSTRUCTIONS,
        context_block,
        question.trim()
    )
}

/// Whether a reply already tells the user to see a professional
pub fn has_disclaimer(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    ["healthcare professional", "medical professional", "consult a doctor", "consult your doctor"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}

/// Return the reply unchanged if it carries a disclaimer, otherwise append one
pub fn ensure_disclaimer(reply: &str) -> String {
    if has_disclaimer(reply) {
        reply.to_string()
    } else {
        format!("{}\n\n{}", reply.trim_end(), DISCLAIMER)
    }
}
