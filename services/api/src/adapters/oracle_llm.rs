//! services/api/src/adapters/oracle_llm.rs
//!
//! This module contains the adapter for the AI Oracle.
//! It implements the `Oracle` port from the `core` crate on top of an
//! OpenAI-compatible chat completion model.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use moazer_core::domain::{PathMode, SCHOOL_PATH_LABELS};
use moazer_core::ports::{
    ItemFeedback, Oracle, PathContext, PortError, PortResult, QaItem, QuestionBrief,
    SessionAnalysis,
};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

const QUESTIONS_SYSTEM: &str = "You write questions for a career guidance platform used by students \
and fresh graduates. Respond with the questions only, one per line, with no numbering, no \
introduction and no closing remarks.";

const CLASSIFY_SYSTEM: &str = "You are a career advisor. Read a student's answers and pick the single \
best matching path. Respond with the path name only.";

const ANALYSIS_SYSTEM: &str = r#"You are an experienced career coach reviewing a question and answer session.
Return ONLY a JSON object with this shape:
{
  "items": [
    {"order": 1, "strengths": "...", "weaknesses": "...", "score": 1-5}
  ],
  "summary": {
    "strengths": "...",
    "weaknesses": "...",
    "recommendation": "...",
    "overall_score": 1.0-5.0
  }
}
Include one entry in "items" for every question, using the question's order number.
Be specific and constructive. Empty answers get a low score."#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `Oracle` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiOracleAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiOracleAdapter {
    /// Creates a new `OpenAiOracleAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends one system + user exchange and returns the reply text.
    async fn complete(&self, system: &str, user: String) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Oracle response contained no text content.".to_string())
            })?;

        if content.trim().is_empty() {
            return Err(PortError::Unexpected("Oracle returned an empty reply.".to_string()));
        }
        debug!(chars = content.len(), "Oracle reply received");
        Ok(content)
    }
}

//=========================================================================================
// `Oracle` Trait Implementation
//=========================================================================================

#[async_trait]
impl Oracle for OpenAiOracleAdapter {
    async fn generate_questions(
        &self,
        brief: &QuestionBrief,
        count: usize,
    ) -> PortResult<Vec<String>> {
        let prompt = questions_prompt(brief, count);
        let reply = self.complete(QUESTIONS_SYSTEM, prompt).await?;
        let questions = parse_question_list(&reply)?;
        if questions.len() < count {
            warn!(wanted = count, got = questions.len(), "Oracle returned too few questions");
            return Err(PortError::Unexpected(format!(
                "expected {} questions, got {}",
                count,
                questions.len()
            )));
        }
        Ok(questions.into_iter().take(count).collect())
    }

    async fn classify(&self, context: &PathContext, answers: &str) -> PortResult<String> {
        let prompt = classify_prompt(context, answers);
        let reply = self.complete(CLASSIFY_SYSTEM, prompt).await?;
        parse_label(&reply)
    }

    async fn analyze_session(&self, topic: &str, items: &[QaItem]) -> PortResult<SessionAnalysis> {
        let prompt = analysis_prompt(topic, items);
        let reply = self.complete(ANALYSIS_SYSTEM, prompt).await?;
        let value = extract_json_object(&reply)?;
        parse_analysis(&value)
    }
}

//=========================================================================================
// Prompt Builders
//=========================================================================================

fn questions_prompt(brief: &QuestionBrief, count: usize) -> String {
    match brief {
        QuestionBrief::Interview { job_title } => format!(
            "Write {} realistic job interview questions for the position: {}. \
             Mix behavioural and technical questions.",
            count, job_title
        ),
        QuestionBrief::PathDiscovery {
            mode: PathMode::School,
            ..
        } => format!(
            "Write {} short questions for a high school student that reveal their interests, \
             strengths and preferred work style, so they can be matched to one of these \
             university tracks: {}.",
            count,
            SCHOOL_PATH_LABELS.join(", ")
        ),
        QuestionBrief::PathDiscovery { major, .. } => format!(
            "Write {} questions for a graduate in {} that reveal which specialization \
             inside that major suits them best.",
            count, major
        ),
        QuestionBrief::PathSpecialization { path } => format!(
            "Write {} deeper questions that test a student's fit and readiness for the \
             path: {}.",
            count, path
        ),
    }
}

fn classify_prompt(context: &PathContext, answers: &str) -> String {
    match context {
        PathContext::School => format!(
            "Choose exactly one of these paths: {}.\n\nStudent answers:\n{}",
            SCHOOL_PATH_LABELS.join(", "),
            answers
        ),
        PathContext::Grad { major } => format!(
            "The student graduated in {}. Name the single most suitable specialization \
             inside that major.\n\nStudent answers:\n{}",
            major, answers
        ),
    }
}

fn analysis_prompt(topic: &str, items: &[QaItem]) -> String {
    let body = items
        .iter()
        .map(|i| {
            let answer = if i.answer.trim().is_empty() {
                "(no answer)"
            } else {
                i.answer.as_str()
            };
            format!("{}. Q: {}\n   A: {}", i.order, i.question, answer)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Topic: {}\n\n{}", topic, body)
}

//=========================================================================================
// Reply Parsing
//=========================================================================================

/// Splits a reply into questions, dropping bullets, numbering, blanks and duplicates.
pub fn parse_question_list(reply: &str) -> PortResult<Vec<String>> {
    let prefix = Regex::new(r"^\s*(?:[-*•]+|\(?\d+[.):\-]|[Qq]\d+[.):\-]?)\s*")
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

    let mut questions: Vec<String> = Vec::new();
    for line in reply.lines() {
        let cleaned = prefix.replace(line, "").trim().trim_matches('"').trim().to_string();
        if cleaned.is_empty() || questions.contains(&cleaned) {
            continue;
        }
        questions.push(cleaned);
    }
    Ok(questions)
}

/// The first line of the reply, without quotes, markdown emphasis or a "Path:" prefix.
pub fn parse_label(reply: &str) -> PortResult<String> {
    let line = reply
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| PortError::Unexpected("empty classification".to_string()))?;
    let line = line
        .trim_matches(|c: char| c == '"' || c == '*' || c == '\'' || c == '.')
        .trim();
    let label = match line.split_once(':') {
        Some((head, tail)) if head.trim().eq_ignore_ascii_case("path") => tail.trim(),
        _ => line,
    };
    if label.is_empty() {
        return Err(PortError::Unexpected("empty classification".to_string()));
    }
    Ok(label.to_string())
}

/// Parses the first JSON object in the reply, tolerating prose or code fences around it.
pub fn extract_json_object(reply: &str) -> PortResult<Value> {
    let start = reply
        .find('{')
        .ok_or_else(|| PortError::Unexpected("no JSON object in oracle reply".to_string()))?;
    let value = serde_json::Deserializer::from_str(&reply[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| PortError::Unexpected("no JSON object in oracle reply".to_string()))?
        .map_err(|e| PortError::Unexpected(format!("malformed JSON in oracle reply: {}", e)))?;
    if !value.is_object() {
        return Err(PortError::Unexpected("oracle reply is not a JSON object".to_string()));
    }
    Ok(value)
}

pub fn parse_analysis(value: &Value) -> PortResult<SessionAnalysis> {
    let summary = value.get("summary").unwrap_or(value);

    let items = value
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| ItemFeedback {
                    order: item
                        .get("order")
                        .and_then(Value::as_u64)
                        .map(|o| o as u32)
                        .unwrap_or(i as u32 + 1),
                    strengths: text_field(item, "strengths"),
                    weaknesses: text_field(item, "weaknesses"),
                    score: item
                        .get("score")
                        .and_then(Value::as_f64)
                        .map(f64::round)
                        .filter(|s| (1.0..=5.0).contains(s))
                        .map(|s| s as u8),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let analysis = SessionAnalysis {
        items,
        strengths: text_field(summary, "strengths"),
        weaknesses: text_field(summary, "weaknesses"),
        recommendation: text_field(summary, "recommendation"),
        overall_score: summary.get("overall_score").and_then(Value::as_f64),
    };

    if analysis.items.is_empty()
        && analysis.strengths.is_empty()
        && analysis.weaknesses.is_empty()
        && analysis.recommendation.is_empty()
    {
        return Err(PortError::Unexpected("oracle analysis was empty".to_string()));
    }
    Ok(analysis)
}

/// Strings are trimmed, lists are joined with ", ", numbers are printed.
fn text_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
