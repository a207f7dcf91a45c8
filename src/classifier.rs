use crate::config::{BackendConfig, Config};
use crate::metrics_defs;
use crate::rate_limit::{RetryPolicy, reset_wait};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use url::Url;

const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

/// Instruction sent to the generative backend alongside the image.
const CLASSIFY_INSTRUCTION: &str = "What kind of garbage is shown in this photo? \
Answer with only the category name, such as general waste, plastic, or can.";

#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    #[error("classifier rate limited: maximum retries exceeded after {0} attempts")]
    RetriesExhausted(u32),

    #[error("classifier request failed: {0}")]
    UpstreamStatus(String),

    #[error("classifier HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("classifier response contained no label")]
    MissingLabel,

    #[error("image reference not usable with the configured backend: {0}")]
    UnsupportedImage(String),
}

/// Image reference supplied by the caller.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// Fetchable URL, consumed by the REST backend.
    Url(String),
    /// Base64-encoded image bytes, consumed by the generative backend.
    Inline(String),
}

/// A unified classification client over the two label-provider backends.
///
/// The backend is fixed at construction from configuration; callers only see
/// `classify`.
#[derive(Clone)]
pub struct Classifier(ClassifierInner);

#[derive(Clone)]
enum ClassifierInner {
    Rest(RestClassifier),
    Generative(GenerativeClassifier),
}

impl Classifier {
    pub fn from_config(config: &Config) -> Self {
        match &config.backend {
            BackendConfig::Rest { url } => Classifier(ClassifierInner::Rest(RestClassifier::new(
                url.clone(),
                config.classifier_api_key.clone(),
                RetryPolicy::default(),
            ))),
            BackendConfig::Generative { url } => Classifier(ClassifierInner::Generative(
                GenerativeClassifier::new(url.clone(), config.classifier_api_key.clone()),
            )),
        }
    }

    pub async fn classify(&self, image: &ImageSource) -> Result<String, ClassifierError> {
        match &self.0 {
            ClassifierInner::Rest(c) => c.classify(image).await,
            ClassifierInner::Generative(c) => c.classify(image).await,
        }
    }
}

#[derive(Serialize)]
struct ClassifyCall<'a> {
    #[serde(rename = "imageUrl")]
    image_url: &'a str,
}

#[derive(Deserialize)]
struct ClassifyReply {
    classification: String,
}

/// REST classification endpoint client.
///
/// Throttled responses are absorbed by a bounded retry: wait until the
/// server's reset time (or the fixed fallback), then try again, at most
/// `max_attempts` calls in total. Any other non-success status fails the
/// call on the spot.
#[derive(Clone)]
struct RestClassifier {
    client: reqwest::Client,
    url: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl RestClassifier {
    fn new(url: Url, api_key: String, retry: RetryPolicy) -> Self {
        RestClassifier {
            client: reqwest::Client::new(),
            url,
            api_key,
            retry,
        }
    }

    async fn classify(&self, image: &ImageSource) -> Result<String, ClassifierError> {
        let ImageSource::Url(image_url) = image else {
            return Err(ClassifierError::UnsupportedImage(
                "the REST backend needs a fetchable imageUrl".into(),
            ));
        };

        let mut attempts = 0;
        while attempts < self.retry.max_attempts {
            let response = self
                .client
                .post(self.url.clone())
                .bearer_auth(&self.api_key)
                .json(&ClassifyCall { image_url })
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let reset = response
                    .headers()
                    .get(RATE_LIMIT_RESET_HEADER)
                    .and_then(|value| value.to_str().ok());
                let wait = reset_wait(reset, SystemTime::now(), self.retry.fallback_wait);

                metrics::counter!(metrics_defs::CLASSIFY_RATE_LIMITED).increment(1);
                tracing::warn!(
                    wait_secs = wait.as_secs_f64(),
                    attempt = attempts + 1,
                    "classifier rate limited, backing off"
                );

                tokio::time::sleep(wait).await;
                attempts += 1;
            } else if !status.is_success() {
                return Err(ClassifierError::UpstreamStatus(status.to_string()));
            } else {
                let reply = response.json::<ClassifyReply>().await?;
                return Ok(reply.classification);
            }
        }

        Err(ClassifierError::RetriesExhausted(self.retry.max_attempts))
    }
}

#[derive(Serialize)]
struct GenerateCall<'a> {
    contents: Vec<GenerateContent<'a>>,
}

#[derive(Serialize)]
struct GenerateContent<'a> {
    parts: Vec<GeneratePart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeneratePart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateReply {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Deserialize)]
struct GenerateCandidate {
    content: GenerateCandidateContent,
}

#[derive(Deserialize)]
struct GenerateCandidateContent {
    #[serde(default)]
    parts: Vec<GenerateReplyPart>,
}

#[derive(Deserialize)]
struct GenerateReplyPart {
    #[serde(default)]
    text: String,
}

/// Generative-model backend: one call with a fixed instruction and the
/// inline image, the trimmed completion text is the label. No retry, every
/// failure is terminal.
#[derive(Clone)]
struct GenerativeClassifier {
    client: reqwest::Client,
    url: Url,
    api_key: String,
}

impl GenerativeClassifier {
    fn new(url: Url, api_key: String) -> Self {
        GenerativeClassifier {
            client: reqwest::Client::new(),
            url,
            api_key,
        }
    }

    async fn classify(&self, image: &ImageSource) -> Result<String, ClassifierError> {
        let ImageSource::Inline(data) = image else {
            return Err(ClassifierError::UnsupportedImage(
                "the generative backend needs inline imageData".into(),
            ));
        };

        let call = GenerateCall {
            contents: vec![GenerateContent {
                parts: vec![
                    GeneratePart::Text {
                        text: CLASSIFY_INSTRUCTION,
                    },
                    GeneratePart::Inline {
                        inline_data: InlineData {
                            mime_type: "image/jpeg",
                            data,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.api_key)
            .json(&call)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::UpstreamStatus(status.to_string()));
        }

        let reply = response.json::<GenerateReply>().await?;
        let label = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text.trim().to_string())
                    .find(|text| !text.is_empty())
            })
            .ok_or(ClassifierError::MissingLabel)?;

        Ok(label)
    }
}
