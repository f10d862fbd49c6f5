//! Adapter around the external text-generation service.
//!
//! Three document contracts (daily, weekly, journal), each a structured
//! prompt instructing a strict JSON reply. Callers inject the trait and
//! own the fallback behavior when a call fails.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::aggregate::EnvSnapshot;
use crate::error::PipelineError;
use crate::ingest::CropPayload;

pub const FALLBACK_ONE_LINER: &str = "Analysis in progress...";
pub const FALLBACK_DAILY_REPORT: &str = "Report unavailable.";
pub const FALLBACK_JOURNAL_ENTRY: &str =
    "No journal entry could be written for this checkpoint.";

/// Descriptor fields the prompts need from a device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub crop_kind: String,
}

/// Latest water-model result, defaulted when none exists yet.
#[derive(Debug, Clone)]
pub struct WaterContext {
    pub score: f64,
    pub risk_level: String,
}

impl Default for WaterContext {
    fn default() -> Self {
        Self {
            score: 0.0,
            risk_level: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DailyNarrative {
    pub one_line_review: String,
    pub daily_report: String,
}

/// One checkpoint handed to the journal contract. Serialized into the
/// user prompt in checkpoint order.
#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub days_grown: i64,
    pub size_cm: f64,
    pub health: String,
    pub growth_rate_pct: f64,
    pub one_liner: Option<String>,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn daily(
        &self,
        device: &DeviceDescriptor,
        env: &EnvSnapshot,
        crop: &CropPayload,
        water: &WaterContext,
    ) -> Result<DailyNarrative, PipelineError>;

    async fn weekly(
        &self,
        device: &DeviceDescriptor,
        history_summary: &str,
    ) -> Result<String, PipelineError>;

    /// Returns one short narrative per timeline point, in order.
    async fn journal(
        &self,
        device: &DeviceDescriptor,
        timeline: &[TimelinePoint],
    ) -> Result<Vec<String>, PipelineError>;
}

const DAILY_SYSTEM_PROMPT: &str = "\
You are a cultivation assistant summarizing one day of smart-farm data.
Combine the averaged sensor window, the vision analysis and the water
analysis into a daily report. Reply with JSON only, in the exact shape
{\"one_line_review\": \"...\", \"daily_report\": \"...\"}.
The one-line review is two short lines capturing the device state at a
glance. The daily report covers environment, crop health, water quality,
two or three concrete care suggestions and a one-sentence outlook for
tomorrow, separated by blank lines.";

const WEEKLY_SYSTEM_PROMPT: &str = "\
You are a cultivation data analyst writing a weekly report from seven
days of analysis history. Reply with JSON only, in the exact shape
{\"content\": \"...\"} where content is markdown with three sections:
growth trend over the week, what went well, and one focus point for the
coming week. Ground every statement in the provided data.";

const JOURNAL_SYSTEM_PROMPT: &str = "\
You are the harvested crop itself, looking back over its life. For each
checkpoint in the provided timeline write one short diary entry, first
person, grounded in that checkpoint's size, health and environment.
Reply with JSON only, in the exact shape
{\"journals\": [{\"days_grown\": n, \"content\": \"...\"}]} with entries
in the same order as the timeline.";

/// OpenAI-compatible chat-completions client with a JSON response
/// format. Timeouts belong to the underlying reqwest client.
pub struct LlmNarrativeClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmNarrativeClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<Value, PipelineError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| PipelineError::ExternalService(err.to_string()))?
            .error_for_status()
            .map_err(|err| PipelineError::ExternalService(err.to_string()))?;

        let envelope: Value = response
            .json()
            .await
            .map_err(|err| PipelineError::ExternalService(err.to_string()))?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                PipelineError::ExternalService("completion carried no content".to_string())
            })?;

        serde_json::from_str(content).map_err(|err| {
            PipelineError::ExternalService(format!("completion was not valid JSON: {err}"))
        })
    }
}

#[async_trait]
impl NarrativeGenerator for LlmNarrativeClient {
    async fn daily(
        &self,
        device: &DeviceDescriptor,
        env: &EnvSnapshot,
        crop: &CropPayload,
        water: &WaterContext,
    ) -> Result<DailyNarrative, PipelineError> {
        let user = format!(
            "[Device] name: {}, crop: {}\n\
             [Environment] water temp: {}C, humidity: {}%, lux: {}, air temp: {}C\n\
             [Crop] growth rate: {}%, health: {}, expected harvest: {}\n\
             [Water] score: {}/100, risk: {}, ph: {}, ec: {}, do: {}",
            device.name,
            device.crop_kind,
            env.water_temp,
            env.humidity,
            env.lux,
            env.air_temp,
            crop.growth_rate_pct,
            crop.leaf_health_status,
            crop.expected_harvest_date.as_deref().unwrap_or("unknown"),
            water.score,
            water.risk_level,
            env.ph,
            env.ec,
            env.dissolved_oxygen,
        );

        let reply = self.chat(DAILY_SYSTEM_PROMPT, &user).await?;
        parse_daily(&reply)
    }

    async fn weekly(
        &self,
        device: &DeviceDescriptor,
        history_summary: &str,
    ) -> Result<String, PipelineError> {
        let user = format!(
            "[Device] name: {}, crop: {}\n\
             [Last 7 days]\n{}",
            device.name, device.crop_kind, history_summary,
        );

        let reply = self.chat(WEEKLY_SYSTEM_PROMPT, &user).await?;
        parse_weekly(&reply)
    }

    async fn journal(
        &self,
        device: &DeviceDescriptor,
        timeline: &[TimelinePoint],
    ) -> Result<Vec<String>, PipelineError> {
        let timeline_json = serde_json::to_string(timeline).map_err(|err| {
            PipelineError::ExternalService(format!("timeline serialization failed: {err}"))
        })?;
        let user = format!(
            "[My name] {}\n[My crop] {}\n[My growth album]\n{}",
            device.name, device.crop_kind, timeline_json,
        );

        let reply = self.chat(JOURNAL_SYSTEM_PROMPT, &user).await?;
        parse_journal(&reply)
    }
}

fn parse_daily(reply: &Value) -> Result<DailyNarrative, PipelineError> {
    serde_json::from_value(reply.clone()).map_err(|err| {
        PipelineError::ExternalService(format!("malformed daily narrative: {err}"))
    })
}

fn parse_weekly(reply: &Value) -> Result<String, PipelineError> {
    match reply.get("content") {
        // Some models wrap the markdown in an object; persist whatever
        // structure came back, verbatim.
        Some(Value::String(content)) => Ok(content.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(PipelineError::ExternalService(
            "weekly narrative carried no content field".to_string(),
        )),
    }
}

fn parse_journal(reply: &Value) -> Result<Vec<String>, PipelineError> {
    let journals = reply
        .get("journals")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            PipelineError::ExternalService("journal narrative carried no entries".to_string())
        })?;

    Ok(journals
        .iter()
        .map(|entry| match entry {
            Value::String(text) => text.clone(),
            other => other
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or(FALLBACK_JOURNAL_ENTRY)
                .to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_daily_reply() {
        let reply = json!({
            "one_line_review": "Steady growth.\nKeep the lights on.",
            "daily_report": "All channels nominal."
        });
        let narrative = parse_daily(&reply).expect("should parse");
        assert_eq!(narrative.daily_report, "All channels nominal.");
    }

    #[test]
    fn daily_reply_missing_fields_is_an_external_error() {
        let reply = json!({ "one_line_review": "half an answer" });
        assert!(matches!(
            parse_daily(&reply),
            Err(PipelineError::ExternalService(_))
        ));
    }

    #[test]
    fn weekly_reply_keeps_structured_content_verbatim() {
        let reply = json!({ "content": { "sections": ["trend"] } });
        let content = parse_weekly(&reply).expect("should parse");
        assert_eq!(content, r#"{"sections":["trend"]}"#);
    }

    #[test]
    fn journal_reply_accepts_objects_and_bare_strings() {
        let reply = json!({
            "journals": [
                { "days_grown": 1, "content": "I sprouted." },
                "I grew.",
                { "days_grown": 9 },
            ]
        });
        let entries = parse_journal(&reply).expect("should parse");
        assert_eq!(
            entries,
            vec![
                "I sprouted.".to_string(),
                "I grew.".to_string(),
                FALLBACK_JOURNAL_ENTRY.to_string(),
            ]
        );
    }
}
