use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{
    ClaudeClient, Completion, CompletionRequest, GeminiClient, ProviderKind, TextProvider,
};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No AI providers configured")]
    NoProviders,
    #[error("All AI providers failed. Last error: {0}")]
    AllFailed(String),
}

/// Result of a dispatched call together with the provider that answered it.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub completion: Completion,
    pub provider: ProviderKind,
    pub model: String,
}

/// Configured providers in preference order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn TextProvider>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>) -> Self {
        ProviderRegistry { providers }
    }

    /// Claude first, then Gemini; providers without a key are left out.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn TextProvider>> = Vec::new();
        if let Some(claude) = ClaudeClient::from_config(config) {
            providers.push(Arc::new(claude));
        }
        if let Some(gemini) = GeminiClient::from_config(config) {
            providers.push(Arc::new(gemini));
        }
        let registry = ProviderRegistry::new(providers);
        info!(
            "AI providers available: [{}]",
            registry
                .available()
                .iter()
                .map(ProviderKind::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        registry
    }

    pub fn available(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|provider| provider.kind()).collect()
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.providers.iter().any(|provider| provider.kind() == kind)
    }

    fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn TextProvider>> {
        self.providers.iter().find(|provider| provider.kind() == kind)
    }

    /// The preferred provider when configured, else the first configured one.
    pub fn select(&self, preferred: Option<ProviderKind>) -> Option<&Arc<dyn TextProvider>> {
        preferred
            .and_then(|kind| self.get(kind))
            .or_else(|| self.providers.first())
    }

    pub fn fallback_for(&self, primary: ProviderKind) -> Option<&Arc<dyn TextProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.kind() != primary)
    }

    /// Calls the selected provider and, on failure, the first other provider
    /// exactly once. The reported error is the primary provider's.
    pub async fn complete_with_fallback(
        &self,
        preferred: Option<ProviderKind>,
        request: &CompletionRequest,
    ) -> Result<Dispatched, DispatchError> {
        let primary = self.select(preferred).ok_or(DispatchError::NoProviders)?;

        let primary_err = match primary.complete(request).await {
            Ok(completion) => {
                return Ok(Dispatched {
                    completion,
                    provider: primary.kind(),
                    model: primary.model().to_string(),
                })
            }
            Err(err) => err,
        };
        warn!(
            "{} failed during {}: {:#}",
            primary.kind(),
            request.operation,
            primary_err
        );

        let Some(fallback) = self.fallback_for(primary.kind()) else {
            return Err(DispatchError::AllFailed(format!("{primary_err:#}")));
        };

        info!(
            "Falling back from {} to {} for {}",
            primary.kind(),
            fallback.kind(),
            request.operation
        );
        match fallback.complete(request).await {
            Ok(completion) => Ok(Dispatched {
                completion,
                provider: fallback.kind(),
                model: fallback.model().to_string(),
            }),
            Err(err) => {
                warn!(
                    "{} fallback failed during {}: {:#}",
                    fallback.kind(),
                    request.operation,
                    err
                );
                Err(DispatchError::AllFailed(format!("{primary_err:#}")))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::{registry_of, ScriptedProvider};
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "prompt".to_string(),
            temperature: 0.7,
            max_output_tokens: 4000,
            top_p: None,
            top_k: None,
            operation: "generate_content",
        }
    }

    #[test]
    fn select_prefers_requested_provider_then_first_available() {
        let claude = Arc::new(ScriptedProvider::new(ProviderKind::Claude, vec![]));
        let gemini = Arc::new(ScriptedProvider::new(ProviderKind::Gemini, vec![]));
        let registry = registry_of(&[&claude, &gemini]);

        assert_eq!(
            registry.select(Some(ProviderKind::Gemini)).map(|p| p.kind()),
            Some(ProviderKind::Gemini)
        );
        assert_eq!(
            registry.select(None).map(|p| p.kind()),
            Some(ProviderKind::Claude)
        );
        assert_eq!(
            registry.fallback_for(ProviderKind::Claude).map(|p| p.kind()),
            Some(ProviderKind::Gemini)
        );

        let only = Arc::new(ScriptedProvider::new(ProviderKind::Gemini, vec![]));
        let gemini_only = registry_of(&[&only]);
        assert_eq!(
            gemini_only.select(Some(ProviderKind::Claude)).map(|p| p.kind()),
            Some(ProviderKind::Gemini)
        );
        assert!(gemini_only.fallback_for(ProviderKind::Gemini).is_none());
        assert!(!gemini_only.is_available(ProviderKind::Claude));
    }

    #[tokio::test]
    async fn empty_registry_reports_no_providers() {
        let registry = ProviderRegistry::default();
        let err = registry
            .complete_with_fallback(None, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoProviders));
    }

    #[tokio::test]
    async fn falls_back_once_when_primary_fails() {
        let claude = Arc::new(ScriptedProvider::new(
            ProviderKind::Claude,
            vec![Err("overloaded")],
        ));
        let gemini = Arc::new(ScriptedProvider::new(ProviderKind::Gemini, vec![Ok("hello")]));
        let registry = registry_of(&[&claude, &gemini]);

        let dispatched = registry
            .complete_with_fallback(Some(ProviderKind::Claude), &request())
            .await
            .unwrap();
        assert_eq!(dispatched.provider, ProviderKind::Gemini);
        assert_eq!(dispatched.model, "gemini-test-model");
        assert_eq!(dispatched.completion.text, "hello");
        assert_eq!(claude.call_count(), 1);
        assert_eq!(gemini.call_count(), 1);
    }

    #[tokio::test]
    async fn reports_primary_error_when_every_provider_fails() {
        let claude = Arc::new(ScriptedProvider::new(
            ProviderKind::Claude,
            vec![Err("claude down")],
        ));
        let gemini = Arc::new(ScriptedProvider::new(
            ProviderKind::Gemini,
            vec![Err("gemini down")],
        ));
        let registry = registry_of(&[&claude, &gemini]);

        let err = registry
            .complete_with_fallback(None, &request())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "All AI providers failed. Last error: claude down"
        );
        assert_eq!(gemini.call_count(), 1);
    }

    #[tokio::test]
    async fn single_provider_failure_does_not_retry_itself() {
        let gemini = Arc::new(ScriptedProvider::new(
            ProviderKind::Gemini,
            vec![Err("quota"), Ok("unused")],
        ));
        let registry = registry_of(&[&gemini]);
        let err = registry
            .complete_with_fallback(Some(ProviderKind::Gemini), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AllFailed(_)));
        assert_eq!(gemini.call_count(), 1);
    }
}
