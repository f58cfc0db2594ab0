// ✨ Insight Text Provider - short written summary of the workload
//
// The provider is an external collaborator (Gemini). Whatever happens to the call,
// the dashboard gets a string: either the model's text or one of two fixed fallbacks.

use crate::config::AppConfig;
use crate::entities::{Bank, Loan};
use crate::error::InsightError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Shown when there are no loans yet (the provider is not called)
pub const NO_DATA_INSIGHT: &str =
    "Add your first loan entry to see personalized professional insights.";

/// Shown when the provider fails or returns nothing
pub const FALLBACK_INSIGHT: &str =
    "Keep up the consistent appraisal work to maintain a balanced workload across your partner banks.";

/// Bucket name for loans whose bank is gone
pub const OTHER_BANK: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub total_count: usize,
    pub per_bank: BTreeMap<String, usize>,
    pub as_of: NaiveDate,
}

impl InsightRequest {
    pub fn from_records(loans: &[Loan], banks: &[Bank], as_of: NaiveDate) -> Self {
        let mut per_bank = BTreeMap::new();
        for loan in loans {
            let name = banks
                .iter()
                .find(|b| loan.belongs_to(b))
                .map(|b| b.name.clone())
                .unwrap_or_else(|| OTHER_BANK.to_string());
            *per_bank.entry(name).or_insert(0) += 1;
        }

        InsightRequest {
            total_count: loans.len(),
            per_bank,
            as_of,
        }
    }

    pub fn prompt(&self) -> String {
        let distribution = serde_json::to_string(&self.per_bank).unwrap_or_else(|_| "{}".to_string());
        format!(
            "As a professional banking consultant, analyze this gold loan appraiser's workload \
             and provide a brief, professional 2-3 sentence summary/insight.\n\
             Total Loans: {}\n\
             Distribution per bank: {}\n\
             Current Date: {}",
            self.total_count,
            distribution,
            self.as_of.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
pub trait InsightProvider: Send + Sync {
    async fn summarize(&self, request: &InsightRequest) -> Result<String, InsightError>;
}

/// Used when no API key is configured
pub struct OfflineInsightProvider;

#[async_trait]
impl InsightProvider for OfflineInsightProvider {
    async fn summarize(&self, _request: &InsightRequest) -> Result<String, InsightError> {
        Err(InsightError::Unavailable)
    }
}

/// Ask the provider, never fail
pub async fn insight_or_fallback(
    provider: &dyn InsightProvider,
    loans: &[Loan],
    banks: &[Bank],
    as_of: NaiveDate,
) -> String {
    if loans.is_empty() {
        return NO_DATA_INSIGHT.to_string();
    }

    let request = InsightRequest::from_records(loans, banks, as_of);
    match provider.summarize(&request).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!("Insight provider returned empty text");
            FALLBACK_INSIGHT.to_string()
        }
        Err(InsightError::Unavailable) => FALLBACK_INSIGHT.to_string(),
        Err(e) => {
            tracing::error!(error = %e, "Insight provider failed");
            FALLBACK_INSIGHT.to_string()
        }
    }
}

/// `insight_or_fallback`, giving up with the fallback text once `limit` has passed
pub async fn insight_within(
    provider: &dyn InsightProvider,
    loans: &[Loan],
    banks: &[Bank],
    as_of: NaiveDate,
    limit: Duration,
) -> String {
    match tokio::time::timeout(limit, insight_or_fallback(provider, loans, banks, as_of)).await {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "Insight provider timed out");
            FALLBACK_INSIGHT.to_string()
        }
    }
}

/// Gemini when the feature is on and a key is configured, offline otherwise
pub fn provider_from_config(config: &AppConfig) -> Box<dyn InsightProvider> {
    match gemini_provider(config) {
        Some(provider) => provider,
        None => Box::new(OfflineInsightProvider),
    }
}

#[cfg(feature = "gemini")]
fn gemini_provider(config: &AppConfig) -> Option<Box<dyn InsightProvider>> {
    let key = config.insight_api_key()?;
    Some(Box::new(gemini::GeminiInsightProvider::new(
        key,
        config.insight.model.clone(),
        Duration::from_secs(config.insight.timeout_secs),
    )))
}

#[cfg(not(feature = "gemini"))]
fn gemini_provider(config: &AppConfig) -> Option<Box<dyn InsightProvider>> {
    if config.insight_api_key().is_some() {
        tracing::info!("Insight API key set but the gemini feature is disabled");
    }
    None
}

// ============================================================================
// GEMINI
// ============================================================================

#[cfg(feature = "gemini")]
pub mod gemini {
    use super::{InsightProvider, InsightRequest};
    use crate::error::InsightError;
    use async_trait::async_trait;
    use reqwest::Client;
    use serde_json::json;
    use std::time::Duration;

    const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    const API_KEY_HEADER: &str = "x-goog-api-key";

    #[derive(Clone)]
    pub struct GeminiInsightProvider {
        client: Client,
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    }

    impl GeminiInsightProvider {
        pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
            Self {
                client: Client::new(),
                api_key,
                model,
                base_url: GEMINI_BASE_URL.to_string(),
                timeout,
            }
        }
    }

    #[async_trait]
    impl InsightProvider for GeminiInsightProvider {
        async fn summarize(&self, request: &InsightRequest) -> Result<String, InsightError> {
            let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

            let payload = json!({
                "contents": [{ "role": "user", "parts": [{ "text": request.prompt() }] }],
                "generationConfig": { "thinkingConfig": { "thinkingBudget": 0 } }
            });

            let res = self
                .client
                .post(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await?;
            let status = res.status();

            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(InsightError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let body: serde_json::Value = res.json().await?;
            let text = body
                .get("candidates")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("content"))
                .and_then(|c| c.get("parts"))
                .and_then(|p| p.as_array())
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                        .collect::<String>()
                })
                .ok_or(InsightError::EmptyResponse)?;

            Ok(text)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::RecordId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider(Result<&'static str, ()>, AtomicUsize);

    #[async_trait]
    impl InsightProvider for FixedProvider {
        async fn summarize(&self, _request: &InsightRequest) -> Result<String, InsightError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0
                .map(|t| t.to_string())
                .map_err(|_| InsightError::Request("connection refused".to_string()))
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn records() -> (Vec<Loan>, Vec<Bank>) {
        let mut alpha = Bank::new("Alpha");
        alpha.id = RecordId::classify("b1");
        let loans = vec![
            Loan::new("b1", day("2024-05-01")),
            Loan::new("b1", day("2024-05-02")),
            Loan::new("gone", day("2024-05-02")),
        ];
        (loans, vec![alpha])
    }

    #[test]
    fn test_request_counts_per_bank_name() {
        let (loans, banks) = records();
        let req = InsightRequest::from_records(&loans, &banks, day("2024-05-02"));

        assert_eq!(req.total_count, 3);
        assert_eq!(req.per_bank.get("Alpha"), Some(&2));
        assert_eq!(req.per_bank.get(OTHER_BANK), Some(&1));

        let prompt = req.prompt();
        assert!(prompt.contains("Total Loans: 3"));
        assert!(prompt.contains("\"Alpha\":2"));
        assert!(prompt.contains("2024-05-02"));
    }

    #[tokio::test]
    async fn test_no_loans_skips_provider() {
        let provider = FixedProvider(Ok("should not be used"), AtomicUsize::new(0));
        let text = insight_or_fallback(&provider, &[], &[], day("2024-05-02")).await;

        assert_eq!(text, NO_DATA_INSIGHT);
        assert_eq!(provider.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_uses_fallback() {
        let (loans, banks) = records();
        let provider = FixedProvider(Err(()), AtomicUsize::new(0));
        let text = insight_or_fallback(&provider, &loans, &banks, day("2024-05-02")).await;

        assert_eq!(text, FALLBACK_INSIGHT);
        assert_eq!(provider.1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_text_uses_fallback() {
        let (loans, banks) = records();
        let provider = FixedProvider(Ok("   "), AtomicUsize::new(0));
        assert_eq!(
            insight_or_fallback(&provider, &loans, &banks, day("2024-05-02")).await,
            FALLBACK_INSIGHT
        );
    }

    #[tokio::test]
    async fn test_success_passes_text_through() {
        let (loans, banks) = records();
        let provider = FixedProvider(Ok(" Alpha carries most of the load. "), AtomicUsize::new(0));
        assert_eq!(
            insight_or_fallback(&provider, &loans, &banks, day("2024-05-02")).await,
            "Alpha carries most of the load."
        );
    }

    struct StalledProvider;

    #[async_trait]
    impl InsightProvider for StalledProvider {
        async fn summarize(&self, _request: &InsightRequest) -> Result<String, InsightError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out_to_fallback() {
        let (loans, banks) = records();
        let text = insight_within(
            &StalledProvider,
            &loans,
            &banks,
            day("2024-05-02"),
            Duration::from_millis(20),
        )
        .await;

        assert_eq!(text, FALLBACK_INSIGHT);
    }

    #[tokio::test]
    async fn test_offline_provider_falls_back() {
        let (loans, banks) = records();
        assert_eq!(
            insight_or_fallback(&OfflineInsightProvider, &loans, &banks, day("2024-05-02")).await,
            FALLBACK_INSIGHT
        );
    }
}
