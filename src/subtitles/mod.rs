//! Subtitle search, scoring and download orchestration.
//!
//! Providers implement the [`SubtitleProvider`] contract; the functions here
//! fan a query out, bucket the candidates per requested language sorted by
//! score, and download the best candidate with fall-through to the next one
//! when a provider serves an empty payload. Saved side-car files are always
//! UTF-8 and named `<stem>.<alpha3b>.srt`.

pub mod opensubtitles;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::{ArchivistError, Result};
use crate::guess::{guess, Guess};
use crate::lang::Language;
use crate::srt;

/// What a provider gets asked about.
#[derive(Debug, Clone)]
pub struct VideoQuery {
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u16>,
}

impl VideoQuery {
    /// Builds a query from a media file path, guessing what it contains.
    pub fn from_path(path: &Path) -> Self {
        match guess(path, true) {
            Ok(Guess::Movie { title, year }) => {
                Self { title, season: None, episode: None, year }
            }
            Ok(Guess::Episode { title, season, episode, year }) => Self {
                title,
                season: Some(season),
                episode: Some(episode),
                year,
            },
            Err(e) => {
                warn!("{e}; querying with the raw file stem");
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().replace(['.', '_'], " "))
                    .unwrap_or_default();
                Self { title: stem, season: None, episode: None, year: None }
            }
        }
    }
}

/// One subtitle a provider can deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub provider: String,
    pub file_id: String,
    pub language: Language,
    pub release: String,
    pub score: i64,
    pub matches: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubtitleProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Searches for subtitles matching a query in any of the languages.
    async fn search(
        &self,
        query: &VideoQuery,
        languages: &[Language],
    ) -> Result<Vec<Candidate>>;

    /// Retrieves the raw subtitle payload of a candidate.
    async fn download(&self, candidate: &Candidate) -> Result<Vec<u8>>;
}

/// Scores how well a release name fits the query. Returns the score and the
/// attributes that matched.
pub fn score_release(query: &VideoQuery, release: &str) -> (i64, Vec<String>) {
    let haystack = release.to_lowercase().replace(['.', '_'], " ");
    let mut score = 0;
    let mut matches = Vec::new();

    if !query.title.is_empty() && haystack.contains(&query.title.to_lowercase()) {
        score += 30;
        matches.push("title".to_string());
    }
    if let Some(year) = query.year {
        if haystack.contains(&year.to_string()) {
            score += 10;
            matches.push("year".to_string());
        }
    }
    if let Some(season) = query.season {
        if haystack.contains(&format!("s{season:02}")) || haystack.contains(&format!("{season}x")) {
            score += 15;
            matches.push("season".to_string());
        }
    }
    if let Some(episode) = query.episode {
        if haystack.contains(&format!("e{episode:02}"))
            || haystack.contains(&format!("x{episode:02}"))
        {
            score += 15;
            matches.push("episode".to_string());
        }
    }

    (score, matches)
}

/// Queries every provider once and buckets the results per requested
/// language, best score first. A failing provider is skipped with a warning.
pub async fn search_all(
    providers: &[Box<dyn SubtitleProvider>],
    query: &VideoQuery,
    languages: &[Language],
) -> Result<HashMap<Language, Vec<Candidate>>> {
    info!("contacting subtitle providers...");
    let mut all: Vec<Candidate> = Vec::new();
    for provider in providers {
        match provider.search(query, languages).await {
            Ok(found) => all.extend(found),
            Err(e) => warn!("provider `{}' failed: {e}", provider.name()),
        }
    }

    info!("sorting subtitles by score...");
    let mut results = HashMap::new();
    for lang in languages {
        let mut bucket: Vec<Candidate> =
            all.iter().filter(|c| c.language == *lang).cloned().collect();
        bucket.sort_by_key(|c| std::cmp::Reverse(c.score));
        results.insert(lang.clone(), bucket);
    }
    Ok(results)
}

/// Renders search results in scoring order; `limit` of zero prints all.
pub fn render_results(
    results: &HashMap<Language, Vec<Candidate>>,
    languages: &[Language],
    limit: usize,
) -> String {
    let mut out = String::new();
    for lang in languages {
        out.push_str(&format!("  Language `{lang}':\n"));
        let bucket = results.get(lang).map(|b| b.as_slice()).unwrap_or_default();
        let shown = if limit > 0 { bucket.iter().take(limit) } else { bucket.iter().take(usize::MAX) };
        for candidate in shown {
            out.push_str(&format!(
                "    [{}] @{}: {}\n",
                candidate.score,
                candidate.provider,
                candidate.matches.join(", ")
            ));
        }
    }
    out
}

/// Side-car path for a downloaded subtitle: `<stem>.<alpha3b>.srt`.
pub fn sidecar_path(video: &Path, language: &Language) -> PathBuf {
    let stem = video.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    video.with_file_name(format!("{stem}.{}.srt", language.alpha3b()))
}

/// Downloads the best candidate per requested language and saves it in
/// UTF-8 beside the video. An empty payload falls through to the next-best
/// candidate. Returns the paths written.
pub async fn download_best(
    video: &Path,
    results: &mut HashMap<Language, Vec<Candidate>>,
    languages: &[Language],
    providers: &[Box<dyn SubtitleProvider>],
) -> Result<Vec<PathBuf>> {
    let mut saved = Vec::new();

    for lang in languages {
        let bucket = results.entry(lang.clone()).or_default();
        if bucket.is_empty() {
            error!("did not find any subtitle for language `{lang}'");
            continue;
        }

        let mut payload: Option<Vec<u8>> = None;
        while !bucket.is_empty() && payload.is_none() {
            let candidate = bucket.remove(0);
            let provider = providers
                .iter()
                .find(|p| p.name() == candidate.provider)
                .ok_or_else(|| {
                    ArchivistError::Subtitle(format!(
                        "no provider named `{}'",
                        candidate.provider
                    ))
                })?;

            info!(
                "downloading subtitle for language `{lang}' from `{}' (score: {})",
                candidate.provider, candidate.score
            );
            match provider.download(&candidate).await {
                Ok(bytes) if !bytes.is_empty() => payload = Some(bytes),
                Ok(_) => warn!(
                    "`{}' served an empty subtitle for language `{lang}', trying the next one",
                    candidate.provider
                ),
                Err(e) => warn!(
                    "download from `{}' failed ({e}), trying the next one",
                    candidate.provider
                ),
            }
        }

        let Some(bytes) = payload else {
            error!("all candidates for language `{lang}' failed to download");
            continue;
        };

        // re-encode to UTF-8 whatever the provider served
        let encoding = srt::detect_encoding(&bytes);
        let (decoded, _, _) = encoding.decode(&bytes);
        let path = sidecar_path(video, lang);
        info!("saving `{}' in UTF-8 encoding...", path.display());
        std::fs::write(&path, decoded.as_bytes())?;
        saved.push(path);
    }

    Ok(saved)
}

/// Splits a flat `<provider>_<parameter>` credential map into per-provider
/// parameter maps (`opensubtitles_username` -> `opensubtitles.username`).
pub fn provider_credentials(
    section: &HashMap<String, String>,
) -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();
    for (key, value) in section {
        match key.split_once('_') {
            Some((provider, param)) => {
                out.entry(provider.to_string())
                    .or_default()
                    .insert(param.to_string(), value.clone());
            }
            None => warn!("ignoring malformed subtitle credential key `{key}'"),
        }
    }
    out
}

/// Builds the provider set from resolved credentials.
pub fn build_providers(
    credentials: &HashMap<String, HashMap<String, String>>,
) -> Vec<Box<dyn SubtitleProvider>> {
    if credentials.is_empty() {
        warn!("no subtitle setup was provided - this may limit your search");
    }
    for name in credentials.keys() {
        if name != "opensubtitles" {
            warn!("no provider implementation for `{name}', its credentials are unused");
        }
    }
    let empty = HashMap::new();
    let params = credentials.get("opensubtitles").unwrap_or(&empty);
    vec![Box::new(opensubtitles::OpenSubtitles::new(params))]
}
