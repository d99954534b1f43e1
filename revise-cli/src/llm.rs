use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use revise_core::{AcquisitionError, CandidateSource, GenerationBrief};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{chat_completions_url, LlmSection};

const SYSTEM_PROMPT: &str = "You are an expert study planner for secondary school students. \
Follow every rule in the brief exactly, use only the listed topic and homework titles, \
and reply with the JSON object described at the end and nothing else.";

/// Candidate source backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmSource {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout: Duration,
}

impl LlmSource {
    pub fn from_config(cfg: &LlmSection) -> anyhow::Result<Self> {
        if cfg.provider != "openai-compatible" {
            anyhow::bail!("unsupported llm provider '{}' (expected openai-compatible)", cfg.provider);
        }
        let api_key = std::env::var(&cfg.api_key_env).with_context(|| {
            format!("{} is not set; export it or pass --candidate <file>", cfg.api_key_env)
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            url: chat_completions_url(&cfg.base_url),
            model: cfg.model.clone(),
            api_key,
            temperature: cfg.temperature,
            timeout: Duration::from_secs(cfg.timeout_secs.max(1)),
        })
    }

    async fn complete(&self, prompt: String) -> Result<String, AcquisitionError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: vec![
                Msg { role: "system", content: SYSTEM_PROMPT },
                Msg { role: "user", content: &prompt },
            ],
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("chat completions request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, &txt));
        }

        let out: Resp = resp.json().await.context("parse chat completions response")?;
        let content = out
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AcquisitionError::Empty);
        }
        debug!(chars = content.len(), "llm response received");
        Ok(content)
    }

    async fn acquire_async(&self, prompt: String) -> Result<String, AcquisitionError> {
        match tokio::time::timeout(self.timeout, self.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(secs = self.timeout.as_secs(), "llm request timed out");
                Err(AcquisitionError::Timeout(self.timeout))
            }
        }
    }
}

impl CandidateSource for LlmSource {
    fn acquire(&self, brief: &GenerationBrief) -> Result<String, AcquisitionError> {
        let prompt = brief.render_prompt();
        // main runs under #[tokio::main], so a runtime is usually already live;
        // block_on inside it would panic.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.acquire_async(prompt)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.acquire_async(prompt))
        }
    }
}

fn classify_status(status: StatusCode, body: &str) -> AcquisitionError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AcquisitionError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => AcquisitionError::QuotaExhausted,
        _ => AcquisitionError::Failure(anyhow!("llm error: {status} {}", body.trim())),
    }
}
