//! OpenSubtitles provider client.
//!
//! Uses the REST API: https://opensubtitles.stoplight.io/docs/opensubtitles-api
//! Account credentials and the API key come from the `[subtitles]` section
//! of the rc file (`opensubtitles_username`, `opensubtitles_password`,
//! `opensubtitles_apikey`).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{score_release, Candidate, SubtitleProvider, VideoQuery};
use crate::error::{ArchivistError, Result};
use crate::lang::Language;

const BASE_URL: &str = "https://api.opensubtitles.com/api/v1";
const USER_AGENT: &str = concat!("archivist v", env!("CARGO_PKG_VERSION"));

pub struct OpenSubtitles {
    client: reqwest::Client,
    api_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
    token: tokio::sync::Mutex<Option<String>>,
}

impl OpenSubtitles {
    pub fn new(params: &HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: params.get("apikey").cloned(),
            username: params.get("username").cloned(),
            password: params.get("password").cloned(),
            token: tokio::sync::Mutex::new(None),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("User-Agent", USER_AGENT);
        match &self.api_key {
            Some(key) => builder.header("Api-Key", key),
            None => builder,
        }
    }

    /// Logs in lazily when account credentials are configured; downloads
    /// work anonymously otherwise, within the stricter anonymous quota.
    async fn bearer_token(&self) -> Result<Option<String>> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Ok(None);
        };
        let mut token = self.token.lock().await;
        if token.is_none() {
            info!("logging into OpenSubtitles as `{username}'");
            let resp = self
                .request(self.client.post(format!("{BASE_URL}/login")))
                .json(&serde_json::json!({ "username": username, "password": password }))
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ArchivistError::Subtitle(format!(
                    "OpenSubtitles login failed with {}",
                    resp.status()
                )));
            }
            let body: Value = resp.json().await?;
            *token = body["token"].as_str().map(|t| t.to_string());
        }
        Ok(token.clone())
    }
}

/// The language code form the API expects: `en`, `pt-br`.
fn api_code(language: &Language) -> String {
    match language.country() {
        Some(cc) => format!("{}-{}", language.alpha2(), cc.to_lowercase()),
        None => language.alpha2().to_string(),
    }
}

fn parse_search_response(body: &Value, query: &VideoQuery) -> Vec<Candidate> {
    let Some(data) = body["data"].as_array() else {
        return Vec::new();
    };

    data.iter()
        .filter_map(|entry| {
            let attributes = &entry["attributes"];
            let language = Language::parse(attributes["language"].as_str()?).ok()?;
            let release = attributes["release"].as_str().unwrap_or_default().to_string();
            let file_id = attributes["files"][0]["file_id"].as_u64()?.to_string();

            let (mut score, matches) = score_release(query, &release);
            // popular subtitles win ties between equally-matching releases
            let downloads = attributes["download_count"].as_u64().unwrap_or(0);
            score += (downloads.max(1) as f64).log10() as i64;

            Some(Candidate {
                provider: "opensubtitles".to_string(),
                file_id,
                language,
                release,
                score,
                matches,
            })
        })
        .collect()
}

#[async_trait]
impl SubtitleProvider for OpenSubtitles {
    fn name(&self) -> &str {
        "opensubtitles"
    }

    async fn search(
        &self,
        query: &VideoQuery,
        languages: &[Language],
    ) -> Result<Vec<Candidate>> {
        let langs = languages.iter().map(api_code).collect::<Vec<_>>().join(",");
        let mut params: Vec<(&str, String)> = vec![
            ("query", query.title.clone()),
            ("languages", langs),
        ];
        if let Some(season) = query.season {
            params.push(("season_number", season.to_string()));
        }
        if let Some(episode) = query.episode {
            params.push(("episode_number", episode.to_string()));
        }
        if let Some(year) = query.year {
            params.push(("year", year.to_string()));
        }

        debug!("OpenSubtitles search: {params:?}");
        let resp = self
            .request(self.client.get(format!("{BASE_URL}/subtitles")))
            .query(&params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ArchivistError::Subtitle(format!(
                "OpenSubtitles search failed with {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await?;
        Ok(parse_search_response(&body, query))
    }

    async fn download(&self, candidate: &Candidate) -> Result<Vec<u8>> {
        let mut request = self
            .request(self.client.post(format!("{BASE_URL}/download")))
            .json(&serde_json::json!({ "file_id": candidate.file_id.parse::<u64>().unwrap_or(0) }));
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(ArchivistError::Subtitle(format!(
                "OpenSubtitles download request failed with {}",
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        let link = body["link"].as_str().ok_or_else(|| {
            ArchivistError::Subtitle("OpenSubtitles returned no download link".into())
        })?;

        let payload = self.client.get(link).send().await?.error_for_status()?.bytes().await?;
        Ok(payload.to_vec())
    }
}
