//! Shared record types returned by the metadata providers.
//!
//! The clients under this module implement the narrow request/response
//! contracts the re-tagging tools need, nothing more: one movie lookup
//! against TMDB, one episode lookup against TVDB, plus artwork retrieval.

pub mod tmdb;
pub mod tvdb;

use chrono::NaiveDate;

use crate::error::Result;

/// Everything the movie tagger wants to know.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovieRecord {
    pub id: u64,
    pub title: String,
    pub tagline: String,
    pub overview: String,
    pub release_date: Option<NaiveDate>,
    pub genres: Vec<String>,
    pub cast: Vec<String>,
    pub screenwriters: Vec<String>,
    pub directors: Vec<String>,
    pub producers: Vec<String>,
    /// US certification as reported by the provider (e.g. `PG-13`).
    pub certification: Option<String>,
    pub poster_url: Option<String>,
}

/// Everything the episode tagger wants to know.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeRecord {
    pub series_name: String,
    pub episode_name: String,
    pub overview: String,
    pub first_aired: Option<NaiveDate>,
    pub season: u32,
    pub episode: u32,
    pub network: Option<String>,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub writers: Vec<String>,
    pub directors: Vec<String>,
    pub episodes_in_season: u32,
    pub seasons_in_series: u32,
    /// US content rating as reported by the provider (e.g. `TV-14`).
    pub certification: Option<String>,
    pub poster_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

/// Downloaded cover art.
#[derive(Debug, Clone)]
pub struct Artwork {
    pub data: Vec<u8>,
    pub format: ImageFormat,
}

/// Fetches cover art; the format is taken from the URL extension, JPEG
/// being the overwhelming default on both providers.
pub async fn fetch_artwork(client: &reqwest::Client, url: &str) -> Result<Artwork> {
    let format = if url.ends_with(".png") { ImageFormat::Png } else { ImageFormat::Jpeg };
    let data = client.get(url).send().await?.error_for_status()?.bytes().await?.to_vec();
    Ok(Artwork { data, format })
}

pub(crate) fn parse_date(s: Option<&str>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

pub(crate) fn string_list(value: &serde_json::Value, field: &str) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get(field).and_then(|v| v.as_str()).map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
