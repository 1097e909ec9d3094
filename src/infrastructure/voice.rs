//! Text-to-speech output through NijiVoice.
//!
//! The generated MP3 is written to the data directory and handed to an external
//! player process.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;

use crate::domain::config::VoiceConfig;
use crate::domain::traits::VoiceOutput;
use crate::domain::types::truncate_chars;

/// Longest script accepted by the API.
pub const MAX_SCRIPT_CHARS: usize = 500;

pub struct NijiVoice {
    http: Client,
    api_key: Option<String>,
    actor_id: String,
    base_url: String,
    player: Vec<String>,
    audio_path: PathBuf,
    enabled: AtomicBool,
}

impl NijiVoice {
    pub fn new(config: &VoiceConfig, data_dir: PathBuf) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("{} is not set, voice output disabled", config.api_key_env);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            api_key,
            actor_id: config.actor_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            player: config.player.clone(),
            audio_path: data_dir.join("last_reply.mp3"),
            enabled: AtomicBool::new(config.enabled),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        tracing::info!("Voice mode {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Voice mode is on and an API key is available.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed) && self.api_key.is_some()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, api_key: &str, text: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/voice-actors/{}/generate-voice",
            self.base_url, self.actor_id
        );
        let response = self
            .http
            .post(&url)
            .header("x-api-key", api_key)
            .header("accept", "application/json")
            .json(&json!({
                "script": truncate_chars(text, MAX_SCRIPT_CHARS),
                "speed": "1.0",
                "format": "mp3",
            }))
            .send()
            .await
            .context("Voice generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Voice API error {status}: {body}");
        }
        let data: Value = response.json().await.context("Invalid voice API response")?;
        let audio_url = audio_url(&data).ok_or_else(|| anyhow!("No audio URL in response"))?;

        let audio = self
            .http
            .get(audio_url)
            .send()
            .await
            .context("Audio download failed")?;
        if !audio.status().is_success() {
            bail!("Audio download returned {}", audio.status());
        }
        Ok(audio.bytes().await.context("Audio download failed")?.to_vec())
    }

    async fn play(&self) -> Result<()> {
        let Some((program, args)) = self.player.split_first() else {
            bail!("No audio player configured");
        };
        let status = Command::new(program)
            .args(args)
            .arg(&self.audio_path)
            .status()
            .await
            .with_context(|| format!("Failed to start player `{program}`"))?;
        if !status.success() {
            bail!("Player `{program}` exited with {status}");
        }
        Ok(())
    }
}

#[async_trait]
impl VoiceOutput for NijiVoice {
    async fn speak(&self, text: &str) -> Result<()> {
        if !self.is_enabled() || text.trim().is_empty() {
            return Ok(());
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(());
        };
        let audio = self.generate(api_key, text).await?;
        if !is_mp3(&audio) {
            bail!("Generated data is not a valid MP3");
        }
        tokio::fs::write(&self.audio_path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", self.audio_path.display()))?;
        self.play().await
    }
}

fn audio_url(data: &Value) -> Option<&str> {
    data.pointer("/generatedVoice/audioFileUrl")
        .and_then(Value::as_str)
}

/// ID3 tag, an MPEG frame header, or simply enough bytes to be audio.
pub fn is_mp3(data: &[u8]) -> bool {
    data.starts_with(b"ID3")
        || data.starts_with(&[0xFF, 0xFB])
        || data.starts_with(&[0xFF, 0xFA])
        || data.len() > 1024
}
