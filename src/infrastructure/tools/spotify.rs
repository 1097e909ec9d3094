//! Spotify Web API client.
//!
//! Uses a long-lived refresh token (client credentials plus refresh token from the
//! environment) to obtain short-lived bearer tokens.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::config::SpotifyConfig;
use crate::domain::traits::MediaPlayer;
use crate::domain::types::SpotifyAction;

const SEARCH_LIMIT: u32 = 5;

struct Credentials {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

/// A playback device as reported by `/me/player/devices`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
}

pub struct SpotifyClient {
    http: Client,
    config: SpotifyConfig,
    credentials: Option<Credentials>,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let credentials = match (
            env(&config.client_id_env),
            env(&config.client_secret_env),
            env(&config.refresh_token_env),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(Credentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            _ => {
                tracing::warn!("Spotify disabled: credentials not set in the environment");
                None
            }
        };
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            config: config.clone(),
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let Some(credentials) = &self.credentials else {
            bail!("Spotify credentials are not configured");
        };
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref()
            && current.expires_at > Instant::now()
        {
            return Ok(current.value.clone());
        }

        let response = self
            .http
            .post(&self.config.accounts_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .context("Spotify token request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Spotify token refresh failed ({status}): {body}");
        }
        let parsed: TokenResponse = response.json().await.context("Invalid token response")?;
        let value = parsed.access_token.clone();
        *token = Some(AccessToken {
            value: parsed.access_token,
            // refresh a minute early
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in.saturating_sub(60)),
        });
        Ok(value)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Option<Value>> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.config.api_base.trim_end_matches('/'), path);
        let mut builder = self.http.request(method, &url).bearer_auth(token).query(query);
        builder = match body {
            Some(body) => builder.json(&body),
            None => builder.header("Content-Length", "0"),
        };
        let response = builder
            .send()
            .await
            .with_context(|| format!("Spotify request {path} failed"))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            bail!("Spotify {path} returned {status}: {text}");
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text).unwrap_or(Value::String(text))))
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let answer = self
            .request(Method::GET, "/me/player/devices", &[], None)
            .await?
            .unwrap_or_else(|| json!({}));
        Ok(parse_devices(&answer))
    }

    async fn search(&self, query: &str) -> Result<Value> {
        let limit = SEARCH_LIMIT.to_string();
        let answer = self
            .request(
                Method::GET,
                "/search",
                &[("q", query), ("type", "track"), ("limit", limit.as_str())],
                None,
            )
            .await?
            .ok_or_else(|| anyhow!("Empty search response"))?;
        let tracks: Vec<Value> = answer
            .pointer("/tracks/items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(track_summary).collect())
            .unwrap_or_default();
        Ok(json!({ "tracks": tracks }))
    }

    async fn play(&self, track_id: &str) -> Result<Value> {
        let devices = self.devices().await?;
        let device = pick_device(&devices, false).ok_or_else(|| {
            anyhow!("No device found. Open the Spotify app and enable a device.")
        })?;

        if !device.is_active {
            self.request(
                Method::PUT,
                "/me/player",
                &[],
                Some(json!({ "device_ids": [device.id], "play": false })),
            )
            .await
            .context("Failed to activate device")?;
        }
        self.request(
            Method::PUT,
            "/me/player/play",
            &[("device_id", device.id.as_str())],
            Some(json!({ "uris": [track_uri(track_id)] })),
        )
        .await
        .context("Failed to start playback")?;

        Ok(json!({ "status": "playing", "track_id": track_id, "device": device.name }))
    }

    async fn pause(&self) -> Result<Value> {
        let devices = self.devices().await?;
        let device =
            pick_device(&devices, true).ok_or_else(|| anyhow!("No active device available"))?;
        self.request(
            Method::PUT,
            "/me/player/pause",
            &[("device_id", device.id.as_str())],
            None,
        )
        .await
        .context("Failed to pause playback")?;
        Ok(json!({ "status": "paused" }))
    }

    async fn current_track(&self) -> Result<Value> {
        let answer = self
            .request(Method::GET, "/me/player/currently-playing", &[], None)
            .await?;
        Ok(current_track_summary(answer.as_ref()))
    }

    async fn add_to_queue(&self, track_id: &str) -> Result<Value> {
        let devices = self.devices().await?;
        let device =
            pick_device(&devices, true).ok_or_else(|| anyhow!("No active device available"))?;
        let uri = track_uri(track_id);
        self.request(
            Method::POST,
            "/me/player/queue",
            &[("uri", uri.as_str()), ("device_id", device.id.as_str())],
            None,
        )
        .await
        .context("Failed to add to queue")?;
        Ok(json!({ "status": "added_to_queue", "track_id": track_id, "device": device.name }))
    }
}

#[async_trait]
impl MediaPlayer for SpotifyClient {
    async fn perform(&self, action: &SpotifyAction) -> Result<Value> {
        tracing::debug!(action = action.name(), "Spotify action");
        match action {
            SpotifyAction::Search { query } => self.search(query).await,
            SpotifyAction::Play { track_id } => self.play(track_id).await,
            SpotifyAction::Pause => self.pause().await,
            SpotifyAction::CurrentTrack => self.current_track().await,
            SpotifyAction::AddToQueue { track_id } => self.add_to_queue(track_id).await,
        }
    }
}

fn track_uri(track_id: &str) -> String {
    if track_id.starts_with("spotify:track:") {
        track_id.to_string()
    } else {
        format!("spotify:track:{track_id}")
    }
}

pub fn parse_devices(answer: &Value) -> Vec<Device> {
    answer
        .get("devices")
        .and_then(Value::as_array)
        .map(|devices| {
            devices
                .iter()
                .filter_map(|d| serde_json::from_value::<Device>(d.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// The active device, or when `require_active` is false the first one.
pub fn pick_device(devices: &[Device], require_active: bool) -> Option<Device> {
    devices
        .iter()
        .find(|d| d.is_active)
        .or_else(|| if require_active { None } else { devices.first() })
        .cloned()
}

pub fn track_summary(track: &Value) -> Value {
    let text = |pointer: &str| {
        track
            .pointer(pointer)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    json!({
        "id": text("/id"),
        "name": text("/name"),
        "artist": text("/artists/0/name"),
        "album": text("/album/name"),
        "url": text("/external_urls/spotify"),
    })
}

pub fn current_track_summary(answer: Option<&Value>) -> Value {
    let Some(item) = answer.and_then(|a| a.get("item")).filter(|i| !i.is_null()) else {
        return json!({ "status": "no_track_playing" });
    };
    let playing = answer
        .and_then(|a| a.get("is_playing"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    json!({
        "status": if playing { "playing" } else { "paused" },
        "track": track_summary(item),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, active: bool) -> Device {
        Device {
            id: id.into(),
            name: format!("Device {id}"),
            is_active: active,
        }
    }

    #[test]
    fn test_pick_device_prefers_active() {
        let devices = vec![device("a", false), device("b", true)];
        assert_eq!(pick_device(&devices, false).unwrap().id, "b");
        assert_eq!(pick_device(&devices, true).unwrap().id, "b");

        let idle = vec![device("a", false)];
        assert_eq!(pick_device(&idle, false).unwrap().id, "a");
        assert!(pick_device(&idle, true).is_none());
        assert!(pick_device(&[], false).is_none());
    }

    #[test]
    fn test_parse_devices_skips_malformed() {
        let answer = json!({"devices": [
            {"id": "x1", "name": "Laptop", "is_active": true},
            {"name": "no id"}
        ]});
        let devices = parse_devices(&answer);
        assert_eq!(devices, vec![Device { id: "x1".into(), name: "Laptop".into(), is_active: true }]);
    }

    #[test]
    fn test_track_summaries() {
        let track = json!({
            "id": "t1",
            "name": "Song",
            "artists": [{"name": "Artist"}],
            "album": {"name": "Album"},
            "external_urls": {"spotify": "https://open.spotify.com/track/t1"}
        });
        let summary = track_summary(&track);
        assert_eq!(summary["artist"], "Artist");
        assert_eq!(summary["album"], "Album");

        let current = current_track_summary(Some(&json!({"is_playing": true, "item": track})));
        assert_eq!(current["status"], "playing");
        assert_eq!(current["track"]["id"], "t1");

        assert_eq!(current_track_summary(None)["status"], "no_track_playing");
    }

    #[test]
    fn test_track_uri() {
        assert_eq!(track_uri("abc"), "spotify:track:abc");
        assert_eq!(track_uri("spotify:track:abc"), "spotify:track:abc");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_at_call() {
        let config = SpotifyConfig {
            client_id_env: "TOOLBRIDGE_TEST_UNSET_ID".into(),
            ..Default::default()
        };
        let client = SpotifyClient::new(&config);
        let err = client.perform(&SpotifyAction::Pause).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
