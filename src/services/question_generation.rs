use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::core::config::GenerationSettings;
use crate::core::metrics;
use crate::db::models::QuestionOption;
use crate::db::types::{DifficultyLevel, QuestionType};
use crate::services::question_contract::{QuestionContract, QuestionDraft, GENERATED_OPTION_COUNT};

const GENERATION_PROMPT: &str = r#"You are a strict examiner. Generate {count} {difficulty} level multiple-choice questions about "{topic}".

Output strictly in this JSON format:
[
  {
    "text": "Question text here",
    "type": "MCQ",
    "difficulty": "{difficulty}",
    "explanation": "Brief explanation of why the answer is correct",
    "options": [
      { "text": "Option A", "isCorrect": false },
      { "text": "Option B", "isCorrect": true },
      { "text": "Option C", "isCorrect": false },
      { "text": "Option D", "isCorrect": false }
    ]
  }
]
Every question must have exactly {options} options and exactly one option with "isCorrect": true.
Do not add any markdown formatting, no ```json blocks, and no introductory text. Just the raw JSON array.
"#;

const PREDICTION_PROMPT: &str = r#"Analyze this student's recent exam performance:
{history}

Based on this, provide a JSON response with:
1. "predictedScore": A number (0-100) predicting their next score.
2. "feedback": A brief 2-sentence motivational analysis.
3. "recommendedFocus": A short string of what to study next.

Output JSON only. No markdown.
"#;

const DEFAULT_SYLLABUS: &str = "General knowledge";

/// Builds the topic line handed to the model.
pub(crate) fn topic_context(topic: &str, syllabus: Option<&str>) -> String {
    let syllabus = syllabus.map(str::trim).filter(|value| !value.is_empty()).unwrap_or(DEFAULT_SYLLABUS);
    format!("Topic: {}. Syllabus Context: {syllabus}", topic.trim())
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationRequest {
    pub(crate) topic_context: String,
    pub(crate) count: usize,
    pub(crate) difficulty: DifficultyLevel,
}

/// Questions that passed the contract, with the model that produced them.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedBatch {
    pub(crate) model: String,
    pub(crate) questions: Vec<QuestionDraft>,
    pub(crate) dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ModelAttempt {
    pub(crate) model: String,
    pub(crate) reason: String,
}

#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error("question generation unavailable after {} model attempt(s)", .attempts.len())]
    Unavailable { attempts: Vec<ModelAttempt> },
}

#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("response has no completion content")]
    MissingContent,
    #[error("completion is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("completion is not a question list")]
    UnexpectedShape,
    #[error("no candidate passed the question contract ({dropped} dropped)")]
    NoValidQuestions { dropped: usize },
}

impl AttemptFailure {
    fn outcome(&self) -> &'static str {
        match self {
            Self::Transport(err) if err.is_timeout() => "timeout",
            Self::Transport(_) => "transport_error",
            Self::Status { .. } => "upstream_error",
            Self::MissingContent | Self::Parse(_) | Self::UnexpectedShape => "invalid_output",
            Self::NoValidQuestions { .. } => "no_valid_questions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PerformanceRecord<'a> {
    pub(crate) exam_title: &'a str,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Prediction {
    pub(crate) predicted_score: Option<f64>,
    pub(crate) feedback: String,
    pub(crate) recommended_focus: String,
}

impl Prediction {
    fn without_history() -> Self {
        Self {
            predicted_score: Some(0.0),
            feedback: "Take a few exams first so I can analyze your style!".to_string(),
            recommended_focus: "General Revision".to_string(),
        }
    }

    fn degraded() -> Self {
        Self {
            predicted_score: None,
            feedback: "AI services are currently busy. Please try again in a moment.".to_string(),
            recommended_focus: "Review your lowest scoring exam manually.".to_string(),
        }
    }
}

/// Client for an OpenAI-compatible completions endpoint that walks an ordered model list.
#[derive(Debug, Clone)]
pub(crate) struct QuestionGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    max_tokens: u32,
    temperature: f64,
}

impl QuestionGenerator {
    pub(crate) fn from_settings(settings: &GenerationSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            models: settings.models.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    pub(crate) fn models(&self) -> &[String] {
        &self.models
    }

    pub(crate) async fn generate_questions(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedBatch, GenerationError> {
        let prompt = GENERATION_PROMPT
            .replace("{count}", &request.count.to_string())
            .replace("{difficulty}", request.difficulty.as_str())
            .replace("{topic}", &request.topic_context)
            .replace("{options}", &GENERATED_OPTION_COUNT.to_string());

        let (model, (mut questions, dropped)) = self
            .run_chain("generate_questions", &prompt, |content| {
                admit_candidates(content, request.difficulty)
            })
            .await?;

        questions.truncate(request.count);
        tracing::info!(
            model = %model,
            admitted = questions.len(),
            dropped,
            "Generated questions accepted"
        );

        Ok(GeneratedBatch { model, questions, dropped })
    }

    /// Never fails: an empty history or an exhausted model chain yields a canned answer.
    pub(crate) async fn predict_performance(&self, history: &[PerformanceRecord<'_>]) -> Prediction {
        if history.is_empty() {
            return Prediction::without_history();
        }

        let history_text = history
            .iter()
            .map(|record| {
                format!(
                    "- Exam: {}, Score: {}%, Passed: {}",
                    record.exam_title,
                    record.score.round(),
                    record.is_passed
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = PREDICTION_PROMPT.replace("{history}", &history_text);

        match self.run_chain("predict_performance", &prompt, parse_prediction).await {
            Ok((_, prediction)) => prediction,
            Err(err) => {
                tracing::warn!(error = %err, "Performance prediction degraded");
                Prediction::degraded()
            }
        }
    }

    async fn run_chain<T, F>(
        &self,
        operation: &'static str,
        prompt: &str,
        mut interpret: F,
    ) -> Result<(String, T), GenerationError>
    where
        F: FnMut(&str) -> Result<T, AttemptFailure>,
    {
        let mut attempts = Vec::with_capacity(self.models.len());

        for model in &self.models {
            let timer = Instant::now();
            let result = match self.complete(model, prompt).await {
                Ok(content) => interpret(&content),
                Err(err) => Err(err),
            };

            match result {
                Ok(value) => {
                    metrics::record_generation_attempt(model, "success");
                    tracing::info!(
                        operation,
                        model = %model,
                        elapsed_ms = timer.elapsed().as_millis() as u64,
                        "Model call succeeded"
                    );
                    return Ok((model.clone(), value));
                }
                Err(err) => {
                    metrics::record_generation_attempt(model, err.outcome());
                    tracing::warn!(
                        operation,
                        model = %model,
                        elapsed_ms = timer.elapsed().as_millis() as u64,
                        error = %err,
                        "Model call failed, trying next model"
                    );
                    attempts.push(ModelAttempt { model: model.clone(), reason: err.to_string() });
                }
            }
        }

        tracing::error!(operation, attempts = attempts.len(), "All generation models failed");
        Err(GenerationError::Unavailable { attempts })
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, AttemptFailure> {
        let payload = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptFailure::Status { status, body: truncate_for_log(&body) });
        }

        let body: Value = response.json().await?;
        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .filter(|content| !content.trim().is_empty())
            .map(str::to_string)
            .ok_or(AttemptFailure::MissingContent)
    }
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")).unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn truncate_for_log(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "type")]
    question_type: Option<String>,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    options: Vec<RawOption>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "isCorrect", alias = "is_correct")]
    is_correct: bool,
}

impl RawQuestion {
    fn into_draft(self, requested: DifficultyLevel) -> QuestionDraft {
        QuestionDraft {
            text: self.text,
            question_type: self
                .question_type
                .as_deref()
                .and_then(QuestionType::parse_loose)
                .unwrap_or_default(),
            difficulty: self
                .difficulty
                .as_deref()
                .and_then(DifficultyLevel::parse_loose)
                .unwrap_or(requested),
            explanation: self.explanation,
            options: self
                .options
                .into_iter()
                .map(|option| QuestionOption { text: option.text, is_correct: option.is_correct })
                .collect(),
        }
    }
}

/// Parses model output and keeps only candidates that satisfy the generated contract.
fn admit_candidates(
    content: &str,
    requested: DifficultyLevel,
) -> Result<(Vec<QuestionDraft>, usize), AttemptFailure> {
    let parsed: Value = serde_json::from_str(strip_code_fences(content))?;
    let candidates = match parsed {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => return Err(AttemptFailure::UnexpectedShape),
        },
        _ => return Err(AttemptFailure::UnexpectedShape),
    };

    let contract = QuestionContract::generated();
    let mut admitted = Vec::with_capacity(candidates.len());
    let mut dropped = 0;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let draft = match serde_json::from_value::<RawQuestion>(candidate) {
            Ok(raw) => raw.into_draft(requested),
            Err(err) => {
                tracing::debug!(index, error = %err, "Dropping malformed generated question");
                dropped += 1;
                continue;
            }
        };

        match contract.admit(draft) {
            Ok(draft) => admitted.push(draft),
            Err(err) => {
                tracing::debug!(index, error = %err, "Dropping generated question");
                dropped += 1;
            }
        }
    }

    if admitted.is_empty() {
        return Err(AttemptFailure::NoValidQuestions { dropped });
    }
    Ok((admitted, dropped))
}

fn parse_prediction(content: &str) -> Result<Prediction, AttemptFailure> {
    let mut prediction: Prediction = serde_json::from_str(strip_code_fences(content))?;
    prediction.predicted_score = prediction.predicted_score.map(|score| score.clamp(0.0, 100.0));
    Ok(prediction)
}
