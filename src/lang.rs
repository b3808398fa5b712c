//! Language identification for audio/subtitle streams and side-car files.
//!
//! Streams are compared by their ISO 639-2/B (bibliographic) code, which is
//! what MP4 containers and subtitle side-car naming conventions use. Input
//! may be given as a 2-letter code (`fr`), a 3-letter code (`fre` or `fra`)
//! or a 2-letter code with a country (`pt-BR`).

use std::fmt;

use crate::error::{ArchivistError, Result};

struct Entry {
    alpha3b: &'static str,
    alpha3t: &'static str,
    alpha2: &'static str,
    name: &'static str,
}

// The languages a home media library realistically encounters. The
// bibliographic/terminology split only exists for a handful of entries.
static LANGUAGES: &[Entry] = &[
    Entry { alpha3b: "eng", alpha3t: "eng", alpha2: "en", name: "English" },
    Entry { alpha3b: "fre", alpha3t: "fra", alpha2: "fr", name: "French" },
    Entry { alpha3b: "ger", alpha3t: "deu", alpha2: "de", name: "German" },
    Entry { alpha3b: "spa", alpha3t: "spa", alpha2: "es", name: "Spanish" },
    Entry { alpha3b: "por", alpha3t: "por", alpha2: "pt", name: "Portuguese" },
    Entry { alpha3b: "ita", alpha3t: "ita", alpha2: "it", name: "Italian" },
    Entry { alpha3b: "dut", alpha3t: "nld", alpha2: "nl", name: "Dutch" },
    Entry { alpha3b: "jpn", alpha3t: "jpn", alpha2: "ja", name: "Japanese" },
    Entry { alpha3b: "chi", alpha3t: "zho", alpha2: "zh", name: "Chinese" },
    Entry { alpha3b: "kor", alpha3t: "kor", alpha2: "ko", name: "Korean" },
    Entry { alpha3b: "rus", alpha3t: "rus", alpha2: "ru", name: "Russian" },
    Entry { alpha3b: "pol", alpha3t: "pol", alpha2: "pl", name: "Polish" },
    Entry { alpha3b: "swe", alpha3t: "swe", alpha2: "sv", name: "Swedish" },
    Entry { alpha3b: "nor", alpha3t: "nor", alpha2: "no", name: "Norwegian" },
    Entry { alpha3b: "dan", alpha3t: "dan", alpha2: "da", name: "Danish" },
    Entry { alpha3b: "fin", alpha3t: "fin", alpha2: "fi", name: "Finnish" },
    Entry { alpha3b: "gre", alpha3t: "ell", alpha2: "el", name: "Greek" },
    Entry { alpha3b: "tur", alpha3t: "tur", alpha2: "tr", name: "Turkish" },
    Entry { alpha3b: "ara", alpha3t: "ara", alpha2: "ar", name: "Arabic" },
    Entry { alpha3b: "heb", alpha3t: "heb", alpha2: "he", name: "Hebrew" },
    Entry { alpha3b: "hin", alpha3t: "hin", alpha2: "hi", name: "Hindi" },
    Entry { alpha3b: "tha", alpha3t: "tha", alpha2: "th", name: "Thai" },
    Entry { alpha3b: "vie", alpha3t: "vie", alpha2: "vi", name: "Vietnamese" },
    Entry { alpha3b: "cze", alpha3t: "ces", alpha2: "cs", name: "Czech" },
    Entry { alpha3b: "hun", alpha3t: "hun", alpha2: "hu", name: "Hungarian" },
    Entry { alpha3b: "rum", alpha3t: "ron", alpha2: "ro", name: "Romanian" },
    Entry { alpha3b: "ukr", alpha3t: "ukr", alpha2: "uk", name: "Ukrainian" },
    Entry { alpha3b: "ice", alpha3t: "isl", alpha2: "is", name: "Icelandic" },
    Entry { alpha3b: "per", alpha3t: "fas", alpha2: "fa", name: "Persian" },
    Entry { alpha3b: "ind", alpha3t: "ind", alpha2: "id", name: "Indonesian" },
    Entry { alpha3b: "und", alpha3t: "und", alpha2: "", name: "Undetermined" },
];

/// A language, canonicalized to its ISO 639-2/B code, with an optional
/// ISO 3166-1 country refinement (e.g. `pt-BR`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    index: usize,
    country: Option<String>,
}

impl Language {
    /// Parses `en`, `eng`, `fra`, `pt-br`, `pt_BR` style specifications.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        let (main, country) = match code.split_once(['-', '_']) {
            Some((m, c)) => (m, Some(c)),
            None => (code, None),
        };

        let main = main.to_lowercase();
        if main.is_empty() {
            return Err(ArchivistError::Language(code.to_string()));
        }
        let index = LANGUAGES
            .iter()
            .position(|e| e.alpha3b == main || e.alpha3t == main || e.alpha2 == main)
            .ok_or_else(|| ArchivistError::Language(code.to_string()))?;

        let country = match country {
            Some(c) if c.len() == 2 && c.chars().all(|k| k.is_ascii_alphabetic()) => {
                Some(c.to_uppercase())
            }
            Some(_) => return Err(ArchivistError::Language(code.to_string())),
            None => None,
        };

        Ok(Language { index, country })
    }

    pub fn undetermined() -> Self {
        // "und" is always present in the table
        let index = LANGUAGES.iter().position(|e| e.alpha3b == "und").unwrap();
        Language { index, country: None }
    }

    pub fn is_undetermined(&self) -> bool {
        self.alpha3b() == "und"
    }

    pub fn alpha3b(&self) -> &'static str {
        LANGUAGES[self.index].alpha3b
    }

    pub fn alpha2(&self) -> &'static str {
        LANGUAGES[self.index].alpha2
    }

    pub fn name(&self) -> &'static str {
        LANGUAGES[self.index].name
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    /// The same language with any country refinement stripped. MP4 stream
    /// language tags carry no country, so stream comparisons go through this.
    pub fn primary(&self) -> Language {
        Language { index: self.index, country: None }
    }

    /// Codes under which a subtitle side-car file for this language may be
    /// found on disk, most specific first: `movie.pt-BR.srt`, `movie.por.srt`,
    /// `movie.pt.srt` and so on.
    pub fn acronyms(&self) -> Vec<String> {
        let e = &LANGUAGES[self.index];
        let mut out = Vec::new();
        if let Some(cc) = &self.country {
            out.push(format!("{}-{}", e.alpha2, cc));
            out.push(format!("{}-{}", e.alpha2, cc.to_lowercase()));
            out.push(format!("{}_{}", e.alpha2, cc));
        }
        out.push(e.alpha3b.to_string());
        if e.alpha3t != e.alpha3b {
            out.push(e.alpha3t.to_string());
        }
        if !e.alpha2.is_empty() {
            out.push(e.alpha2.to_string());
        }
        out
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(cc) => write!(f, "{}-{}", self.alpha2(), cc),
            None => write!(f, "{}", self.alpha3b()),
        }
    }
}

/// Parses a stream language tag, mapping absent/unknown tags to `und`.
/// ffmpeg writes `und` itself for untagged streams.
pub fn stream_language(tag: Option<&str>) -> Language {
    tag.and_then(|t| Language::parse(t).ok())
        .unwrap_or_else(Language::undetermined)
}

/// Removes duplicates while preserving first-occurrence order.
pub fn uniq(languages: Vec<Language>) -> Vec<Language> {
    let mut out: Vec<Language> = Vec::with_capacity(languages.len());
    for l in languages {
        if !out.contains(&l) {
            out.push(l);
        }
    }
    out
}
