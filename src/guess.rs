//! Best-effort movie/episode guessing from file names.
//!
//! This is the thin local stand-in for a full release-name parser: it
//! recognizes the common episode numbering schemes and `Title (Year)` /
//! `Title.Year.` movie forms, and cuts titles at well-known release noise
//! tokens. Anything fancier is the caller's job via `--query`/`--name`.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{ArchivistError, Result};

/// What a file name looks like it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guess {
    Movie {
        title: String,
        year: Option<u16>,
    },
    Episode {
        title: String,
        season: u32,
        episode: u32,
        year: Option<u16>,
    },
}

// S01E02, s1e3
static RE_SXXEXX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[Ss](\d{1,2})[Ee](\d{1,3})\b").unwrap());

// 1x02, 12X103
static RE_XEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})[xX](\d{2,3})\b").unwrap());

// a plausible production year
static RE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

// Tokens that terminate a title in release names.
static NOISE_TOKENS: &[&str] = &[
    "480p", "720p", "1080p", "2160p", "4k", "x264", "x265", "h264", "h265",
    "hevc", "avc", "bluray", "brrip", "bdrip", "webrip", "web-dl", "webdl",
    "hdtv", "dvdrip", "remux", "proper", "repack", "extended", "unrated",
    "hdr", "hdr10", "aac", "ac3", "dts", "10bit", "8bit", "amzn", "nf",
    "internal", "limited",
];

/// Guesses movie/TV show information from a file name.
///
/// With `fullpath` set, parent directory names are used as a fallback title
/// when the file name itself carries none (e.g. `Friends/s01e01.mp4`).
pub fn guess(path: &Path, fullpath: bool) -> Result<Guess> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| ArchivistError::Guess(format!("no file name in `{}'", path.display())))?;

    let text = normalize(&stem);
    debug!("guessing from `{text}'");

    let result = guess_text(&text).or_else(|| {
        if !fullpath {
            return None;
        }
        // the file name alone was not enough; borrow a title from the
        // directory structure, closest component first
        path.ancestors().skip(1).find_map(|dir| {
            let name = dir.file_name()?.to_string_lossy();
            let combined = format!("{} {}", normalize(&name), text);
            guess_text(&combined)
        })
    });

    result.ok_or_else(|| {
        ArchivistError::Guess(format!(
            "cannot guess a title from `{}' - pass one explicitly",
            path.display()
        ))
    })
}

fn normalize(s: &str) -> String {
    s.replace(['.', '_'], " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn guess_text(text: &str) -> Option<Guess> {
    if let Some(m) = RE_SXXEXX.captures(text).or_else(|| RE_XEP.captures(text)) {
        let whole = m.get(0).unwrap();
        let season: u32 = m[1].parse().ok()?;
        let episode: u32 = m[2].parse().ok()?;
        let head = &text[..whole.start()];
        let (head, year) = match RE_YEAR.find(head) {
            Some(y) => (&head[..y.start()], y.as_str().parse().ok()),
            None => (head, None),
        };
        let title = clean_title(head);
        if title.is_empty() {
            return None;
        }
        return Some(Guess::Episode { title, season, episode, year });
    }

    // movie: cut the title at a year or at the first noise token
    if let Some(m) = RE_YEAR.captures(text) {
        let whole = m.get(0).unwrap();
        let year: u16 = m[1].parse().ok()?;
        let title = clean_title(&text[..whole.start()]);
        if !title.is_empty() {
            return Some(Guess::Movie { title, year: Some(year) });
        }
    }

    let title = clean_title(text);
    if title.is_empty() {
        return None;
    }
    Some(Guess::Movie { title, year: None })
}

fn clean_title(s: &str) -> String {
    let mut tokens = Vec::new();
    for token in s.split_whitespace() {
        let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
        if bare.is_empty() {
            continue;
        }
        if NOISE_TOKENS.contains(&bare.to_lowercase().as_str()) {
            break;
        }
        tokens.push(bare.to_string());
    }
    tokens.join(" ")
}
