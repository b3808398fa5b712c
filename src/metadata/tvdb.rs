//! TVDB (TheTVDB) episode lookup client.
//!
//! Uses the v4 JSON API: authenticate once with the API key, then query
//! with the returned bearer token.

use serde_json::Value;
use tracing::{debug, info};

use super::{fetch_artwork, parse_date, string_list, Artwork, EpisodeRecord};
use crate::error::{ArchivistError, Result};

const BASE_URL: &str = "https://api4.thetvdb.com/v4";

pub struct TvdbClient {
    token: String,
    client: reqwest::Client,
}

impl TvdbClient {
    /// Exchanges the API key for a bearer token.
    pub async fn login(api_key: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{BASE_URL}/login"))
            .json(&serde_json::json!({ "apikey": api_key }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ArchivistError::Metadata(format!(
                "TVDB login failed with {}",
                resp.status()
            )));
        }
        let body: Value = resp.json().await?;
        let token = body["data"]["token"]
            .as_str()
            .ok_or_else(|| ArchivistError::Metadata("TVDB login returned no token".into()))?
            .to_string();
        Ok(Self { token, client })
    }

    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{BASE_URL}{path}");
        debug!("TVDB request: {url}");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ArchivistError::Metadata(format!(
                "TVDB returned {} for {path}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    /// Searches for a series and retrieves the record of one episode.
    pub async fn episode_from_query(
        &self,
        name: &str,
        season: u32,
        episode: u32,
    ) -> Result<EpisodeRecord> {
        info!("searching TVDB for `{name}', Season {season}, Episode {episode}");
        let search = self
            .get_json("/search", &[("query", name), ("type", "series")])
            .await?;
        let series_id = search["data"][0]["tvdb_id"]
            .as_str()
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| ArchivistError::Metadata(format!("no TVDB results for `{name}'")))?;

        let series = self.get_json(&format!("/series/{series_id}/extended"), &[]).await?;
        let season_str = season.to_string();
        let episodes = self
            .get_json(
                &format!("/series/{series_id}/episodes/default"),
                &[("page", "0"), ("season", season_str.as_str())],
            )
            .await?;

        let episode_id = find_episode(&episodes, episode).and_then(|e| e["id"].as_u64());
        let credits = match episode_id {
            Some(id) => Some(self.get_json(&format!("/episodes/{id}/extended"), &[]).await?),
            None => None,
        };

        episode_record(&series, &episodes, credits.as_ref(), season, episode)
    }

    pub async fn fetch_poster(&self, record: &EpisodeRecord) -> Result<Option<Artwork>> {
        match &record.poster_url {
            Some(url) => Ok(Some(fetch_artwork(&self.client, url).await?)),
            None => Ok(None),
        }
    }
}

fn find_episode<'v>(episodes: &'v Value, number: u32) -> Option<&'v Value> {
    episodes["data"]["episodes"]
        .as_array()?
        .iter()
        .find(|e| e["number"].as_u64() == Some(number as u64))
}

fn episode_record(
    series: &Value,
    episodes: &Value,
    credits: Option<&Value>,
    season: u32,
    number: u32,
) -> Result<EpisodeRecord> {
    let series_data = &series["data"];
    let series_name = series_data["name"].as_str().unwrap_or_default().to_string();

    let episode = find_episode(episodes, number).ok_or_else(|| {
        ArchivistError::Metadata(format!(
            "`{series_name}' has no episode {number} in season {season}"
        ))
    })?;

    let episodes_in_season = episodes["data"]["episodes"]
        .as_array()
        .map(|e| e.len() as u32)
        .unwrap_or(0);

    // count aired seasons once, not per episode order variant
    let seasons_in_series = series_data["seasons"]
        .as_array()
        .map(|seasons| {
            let mut numbers: Vec<u64> = seasons
                .iter()
                .filter(|s| s["type"]["type"].as_str() == Some("official"))
                .filter_map(|s| s["number"].as_u64())
                .filter(|n| *n > 0)
                .collect();
            numbers.sort_unstable();
            numbers.dedup();
            numbers.len() as u32
        })
        .unwrap_or(0);

    let people_named = |kind: &str| -> Vec<String> {
        credits
            .and_then(|c| c["data"]["characters"].as_array())
            .map(|chars| {
                chars
                    .iter()
                    .filter(|c| c["peopleType"].as_str() == Some(kind))
                    .filter_map(|c| c["personName"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    };

    let actors: Vec<String> = series_data["characters"]
        .as_array()
        .map(|chars| {
            chars
                .iter()
                .filter(|c| c["peopleType"].as_str() == Some("Actor"))
                .filter_map(|c| c["personName"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let certification = series_data["contentRatings"].as_array().and_then(|ratings| {
        ratings
            .iter()
            .find(|r| r["country"].as_str() == Some("usa"))
            .and_then(|r| r["name"].as_str())
            .map(|s| s.to_string())
    });

    let network = series_data["latestNetwork"]["name"]
        .as_str()
        .or_else(|| series_data["originalNetwork"]["name"].as_str())
        .map(|s| s.to_string());

    Ok(EpisodeRecord {
        series_name,
        episode_name: episode["name"].as_str().unwrap_or_default().to_string(),
        overview: episode["overview"].as_str().unwrap_or_default().to_string(),
        first_aired: parse_date(episode["aired"].as_str()),
        season,
        episode: number,
        network,
        genres: string_list(&series_data["genres"], "name"),
        actors,
        writers: people_named("Writer"),
        directors: people_named("Director"),
        episodes_in_season,
        seasons_in_series,
        certification,
        poster_url: episode["image"]
            .as_str()
            .filter(|s| !s.is_empty())
            .or_else(|| series_data["image"].as_str())
            .map(|s| s.to_string()),
    })
}
