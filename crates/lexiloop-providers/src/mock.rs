//! Mock generator for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use lexiloop_core::traits::{ContentGenerator, GeneratedStory, StoryRequest, TokenUsage};

/// A mock story generator for exercising the daily guard without real API calls.
///
/// Returns configurable stories based on which terms the request contains.
pub struct MockGenerator {
    /// Map of term → story text.
    responses: HashMap<String, String>,
    /// Story returned when no term matches.
    default_response: String,
    /// Simulated generation latency.
    delay: Option<Duration>,
    /// When set, every call fails with this message.
    failure: Option<String>,
    call_count: AtomicU32,
    last_request: Mutex<Option<StoryRequest>>,
}

impl MockGenerator {
    /// Create a mock with the given term→story mappings.
    pub fn new(responses: HashMap<String, String>) -> Self {
        Self {
            responses,
            default_response: "Once upon a time there was a word.".to_string(),
            delay: None,
            failure: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always returns the same story.
    pub fn with_fixed_response(story: &str) -> Self {
        Self {
            default_response: story.to_string(),
            ..Self::new(HashMap::new())
        }
    }

    /// Create a mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(HashMap::new())
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls made so far.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// The last request received.
    pub fn last_request(&self) -> Option<StoryRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &StoryRequest) -> anyhow::Result<GeneratedStory> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            anyhow::bail!("mock generator failure: {message}");
        }

        let text = request
            .terms
            .iter()
            .find_map(|term| self.responses.get(term))
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());

        let prompt_tokens = (request.prompt().len() / 4) as u32;
        let completion_tokens = (text.len() / 4) as u32; // Rough estimate

        Ok(GeneratedStory {
            text,
            model: request.model.clone(),
            token_usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            latency_ms: self.delay.map(|d| d.as_millis() as u64).unwrap_or(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexiloop_core::model::{Level, StoryLength};

    fn request(terms: &[&str]) -> StoryRequest {
        StoryRequest {
            model: "mock-model".into(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            level: Level::A1,
            length: StoryLength::Short,
            topic: None,
        }
    }

    #[tokio::test]
    async fn fixed_response() {
        let generator = MockGenerator::with_fixed_response("A cat sat.");
        let story = generator.generate(&request(&["gato"])).await.unwrap();
        assert_eq!(story.text, "A cat sat.");
        assert_eq!(story.model, "mock-model");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.last_request().unwrap().terms, vec!["gato"]);
    }

    #[tokio::test]
    async fn term_matching() {
        let mut responses = HashMap::new();
        responses.insert("sol".to_string(), "The sun rose.".to_string());
        responses.insert("luna".to_string(), "The moon set.".to_string());
        let generator = MockGenerator::new(responses);

        let story = generator.generate(&request(&["agua", "luna"])).await.unwrap();
        assert_eq!(story.text, "The moon set.");

        let story = generator.generate(&request(&["agua"])).await.unwrap();
        assert!(story.text.starts_with("Once upon a time"));
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_mock_still_counts_calls() {
        let generator = MockGenerator::failing("quota exhausted");
        let err = generator.generate(&request(&["sol"])).await.unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied() {
        let generator = MockGenerator::with_fixed_response("late").with_delay(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        generator.generate(&request(&[])).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
