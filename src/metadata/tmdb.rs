//! TMDB (The Movie Database) lookup client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use serde_json::Value;
use tracing::{debug, info};

use super::{fetch_artwork, parse_date, string_list, Artwork, MovieRecord};
use crate::error::{ArchivistError, Result};
use crate::guess::Guess;

const BASE_URL: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

pub struct TmdbClient {
    api_key: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key, client: reqwest::Client::new() }
    }

    async fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{BASE_URL}{path}");
        debug!("TMDB request: {url}");

        let resp = self.client.get(&url).query(&all_params).send().await?;
        if !resp.status().is_success() {
            return Err(ArchivistError::Metadata(format!(
                "TMDB returned {} for {path}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    /// Searches for a movie and retrieves the full record of the first hit.
    pub async fn movie_from_query(&self, query: &str, year: Option<u16>) -> Result<MovieRecord> {
        let mut params = vec![("query", query)];
        let year_str = year.map(|y| y.to_string());
        if let Some(y) = &year_str {
            params.push(("year", y));
        }

        info!("searching TMDB for `{query}'");
        let search = self.get_json("/search/movie", &params).await?;
        let id = search["results"][0]["id"].as_u64().ok_or_else(|| {
            ArchivistError::Metadata(format!("no TMDB results for `{query}'"))
        })?;

        info!("retrieving information for movie id=`{id}'");
        let details = self.get_json(&format!("/movie/{id}"), &[]).await?;
        let credits = self.get_json(&format!("/movie/{id}/credits"), &[]).await?;
        let releases = self.get_json(&format!("/movie/{id}/release_dates"), &[]).await?;

        Ok(movie_record(&details, &credits, &releases))
    }

    /// Retrieves the record matching a filename guess.
    pub async fn movie_from_guess(&self, guess: &Guess) -> Result<MovieRecord> {
        match guess {
            Guess::Movie { title, year } => self.movie_from_query(title, *year).await,
            Guess::Episode { title, .. } => Err(ArchivistError::Metadata(format!(
                "`{title}' was guessed as a TV show episode - pass --query with the movie title"
            ))),
        }
    }

    pub async fn fetch_poster(&self, record: &MovieRecord) -> Result<Option<Artwork>> {
        match &record.poster_url {
            Some(url) => Ok(Some(fetch_artwork(&self.client, url).await?)),
            None => Ok(None),
        }
    }
}

fn movie_record(details: &Value, credits: &Value, releases: &Value) -> MovieRecord {
    let crew_in = |department: &str| -> Vec<String> {
        credits["crew"]
            .as_array()
            .map(|crew| {
                crew.iter()
                    .filter(|c| c["department"].as_str() == Some(department))
                    .filter_map(|c| c["name"].as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    };

    let certification = releases["results"].as_array().and_then(|countries| {
        countries
            .iter()
            .find(|c| c["iso_3166_1"].as_str() == Some("US"))
            .and_then(|us| us["release_dates"].as_array().cloned())
            .and_then(|dates| {
                dates
                    .iter()
                    .filter_map(|d| d["certification"].as_str())
                    .find(|c| !c.is_empty())
                    .map(|c| c.to_string())
            })
    });

    MovieRecord {
        id: details["id"].as_u64().unwrap_or(0),
        title: details["title"].as_str().unwrap_or_default().to_string(),
        tagline: details["tagline"].as_str().unwrap_or_default().to_string(),
        overview: details["overview"].as_str().unwrap_or_default().to_string(),
        release_date: parse_date(details["release_date"].as_str()),
        genres: string_list(&details["genres"], "name"),
        cast: string_list(&credits["cast"], "name"),
        screenwriters: crew_in("Writing"),
        directors: crew_in("Directing"),
        producers: crew_in("Production"),
        certification,
        poster_url: details["poster_path"]
            .as_str()
            .map(|p| format!("{IMAGE_BASE}{p}")),
    }
}
