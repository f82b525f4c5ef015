//! HTTP client for the external classification service, plus a scriptable
//! mock for tests.

use serde::{Deserialize, Serialize};

use super::expiry::parse_flexible_date;
use super::types::{Classification, Classifier, ClassifyContext};
use super::ProviderError;

/// Classification service client over HTTP with a bounded timeout.
pub struct HttpClassifier {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpClassifier {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Request body for POST /v1/classify
#[derive(Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    text: &'a str,
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
}

/// Raw response body; dates arrive as strings in assorted formats.
#[derive(Deserialize)]
struct ClassifyResponse {
    document_type: Option<String>,
    confidence: Option<f32>,
    expiry_date: Option<String>,
    issue_date: Option<String>,
    extracted_names: Option<Vec<String>>,
    date_of_birth: Option<String>,
}

impl Classifier for HttpClassifier {
    fn classify(
        &self,
        text: &str,
        context: &ClassifyContext<'_>,
    ) -> Result<Classification, ProviderError> {
        let url = format!("{}/v1/classify", self.base_url);
        let body = ClassifyRequest {
            model: &self.model,
            text,
            filename: context.filename,
            requested_type: context.requested_type,
            due_date: context.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ProviderError::Transient(format!("Cannot reach classifier at {}", self.base_url))
            } else if e.is_timeout() {
                ProviderError::Transient(format!(
                    "Classification timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                ProviderError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!(
                "Classifier rejected credentials: {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = format!("Classifier returned {status}: {body}");
            return if status.is_server_error()
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            {
                Err(ProviderError::Transient(message))
            } else {
                Err(ProviderError::Permanent(message))
            };
        }

        let parsed: ClassifyResponse = response
            .json()
            .map_err(|e| ProviderError::Permanent(format!("Malformed classifier response: {e}")))?;

        Ok(Classification {
            document_type: parsed.document_type.unwrap_or_default(),
            confidence: parsed.confidence.unwrap_or(0.0),
            expiry_date: parsed.expiry_date.as_deref().and_then(parse_flexible_date),
            issue_date: parsed.issue_date.as_deref().and_then(parse_flexible_date),
            extracted_names: parsed.extracted_names.unwrap_or_default(),
            extracted_date_of_birth: parsed
                .date_of_birth
                .as_deref()
                .and_then(parse_flexible_date),
        }
        .normalize())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Scripted classifier for tests: pops one queued response per call and
/// records the text it was asked to classify.
pub struct MockClassifier {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<Classification, ProviderError>>>,
    pub calls: std::sync::Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn push(self, response: Result<Classification, ProviderError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// A classifier that always answers with the given type and confidence.
    pub fn always(document_type: &str, confidence: f32) -> Self {
        let mut mock = Self::new();
        // Pre-queue a generous number of identical responses.
        for _ in 0..32 {
            mock = mock.push(Ok(Classification {
                document_type: document_type.to_string(),
                confidence,
                ..Classification::unknown()
            }));
        }
        mock
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for MockClassifier {
    fn classify(
        &self,
        text: &str,
        _context: &ClassifyContext<'_>,
    ) -> Result<Classification, ProviderError> {
        self.calls.lock().unwrap().push(text.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Classification::unknown()))
            .map(Classification::normalize)
    }

    fn model_name(&self) -> &str {
        "mock-classifier"
    }
}
