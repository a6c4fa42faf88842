use crate::error::AdvisorError;
use agrivoice_types::{AdviceResult, Outcome};
use async_trait::async_trait;
use std::sync::Arc;

/// Returned in place of advice when the model cannot be reached.
pub const FALLBACK_ADVICE: &str = "Sorry, I couldn't generate an answer right now. \
Please try asking about farming practices, crop diseases, soil management, or agricultural techniques.";

/// Word budget for spoken answers.
const MAX_ANSWER_WORDS: usize = 200;

/// A single-shot text generation backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generates a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, AdvisorError>;

    /// Model name for logging.
    fn model_name(&self) -> &str;
}

/// Produces farming advice for a farmer's question.
#[derive(Clone)]
pub struct AdviceGenerator {
    model: Arc<dyn LanguageModel>,
}

impl AdviceGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Answers `question` with one model call.
    ///
    /// Model failures and empty completions yield [`FALLBACK_ADVICE`] as a
    /// degraded outcome.
    pub async fn generate(&self, question: &str) -> Outcome<AdviceResult> {
        let prompt = build_prompt(question);
        match self.model.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => Outcome::Complete(AdviceResult {
                text: text.trim().to_string(),
            }),
            Ok(_) => {
                tracing::error!(model = self.model.model_name(), "LLM returned an empty answer");
                Outcome::degraded(fallback(), "empty completion")
            }
            Err(e) => {
                tracing::error!(model = self.model.model_name(), error = %e, "LLM error");
                Outcome::degraded(fallback(), e.to_string())
            }
        }
    }
}

fn fallback() -> AdviceResult {
    AdviceResult {
        text: FALLBACK_ADVICE.to_string(),
    }
}

/// Wraps the farmer's question in the advisor instructions.
pub(crate) fn build_prompt(question: &str) -> String {
    format!(
        "You are an experienced agricultural advisor helping farmers. You know crop \
cultivation, plant diseases and pest control, soil health and fertilizers, weather and \
irrigation, organic and sustainable practices, farm equipment, and crop economics.

A farmer asks: \"{question}\"

Answer with:
1. Direct, practical advice.
2. Step-by-step instructions where they help.
3. Preventive measures.
4. Low-cost solutions.
5. Seasonal considerations.

If the question is not about agriculture, politely ask the farmer to ask about farming, \
crops, plant diseases, agricultural practices, livestock, or rural development instead.

Keep the answer actionable, simple enough for farmers of any experience level, and under \
{MAX_ANSWER_WORDS} words because it will be read aloud.",
        question = question.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        reply: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, AdvisorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("A farmer asks"));
            self.reply
                .map(str::to_string)
                .map_err(|msg| AdvisorError::Api(msg.to_string()))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn generator(reply: Result<&'static str, &'static str>) -> (AdviceGenerator, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel {
            reply,
            calls: AtomicUsize::new(0),
        });
        (AdviceGenerator::new(model.clone()), model)
    }

    #[test]
    fn prompt_embeds_question_and_word_budget() {
        let prompt = build_prompt("  How do I treat yellow leaves on tomato plants?  ");
        assert!(prompt.contains("\"How do I treat yellow leaves on tomato plants?\""));
        assert!(prompt.contains("under 200 words"));
        assert!(prompt.contains("not about agriculture"));
    }

    #[tokio::test]
    async fn model_answer_is_complete() {
        let (advisor, model) = generator(Ok("  Remove affected leaves.  "));
        let outcome = advisor.generate("yellow leaves?").await;
        assert_eq!(
            outcome,
            Outcome::Complete(AdviceResult {
                text: "Remove affected leaves.".to_string()
            })
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn model_error_degrades_to_apology() {
        let (advisor, model) = generator(Err("quota exceeded"));
        let outcome = advisor.generate("yellow leaves?").await;
        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("quota exceeded"));
        assert_eq!(outcome.value().text, FALLBACK_ADVICE);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_completion_degrades() {
        let (advisor, _) = generator(Ok("   "));
        let outcome = advisor.generate("yellow leaves?").await;
        assert!(outcome.is_degraded());
        assert_eq!(outcome.into_value().text, FALLBACK_ADVICE);
    }
}
