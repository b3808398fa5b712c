//! SubRip (.srt) parsing, formatting and maintenance.
//!
//! Cue indexes are the ones assigned by the original author and survive
//! parsing untouched; `reindex` renumbers them into an uninterrupted
//! sequence starting at 1. Files are decoded through charset detection so
//! legacy single-byte subtitles can be rewritten as UTF-8.

use std::fs;
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::error::{ArchivistError, Result};

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: Vec<String>,
}

/// A parsed subtitle file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtitles {
    pub cues: Vec<Cue>,
}

impl Subtitles {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_start_matches('\u{feff}');
        let mut cues = Vec::new();
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

        while let Some(first) = lines.by_ref().find(|l| !l.trim().is_empty()) {
            let index: u32 = first.trim().parse().map_err(|_| {
                ArchivistError::Subtitle(format!("`{first}' is not a cue index"))
            })?;

            let timing = lines.next().ok_or_else(|| {
                ArchivistError::Subtitle(format!("cue {index} has no timing line"))
            })?;
            let (start, end) = timing.split_once("-->").ok_or_else(|| {
                ArchivistError::Subtitle(format!("cue {index}: bad timing line `{timing}'"))
            })?;
            let start_ms = parse_timestamp(start.trim())?;
            let end_ms = parse_timestamp(end.trim())?;

            let mut body = Vec::new();
            for line in lines.by_ref() {
                if line.trim().is_empty() {
                    break;
                }
                body.push(line.to_string());
            }

            cues.push(Cue { index, start_ms, end_ms, text: body });
        }

        Ok(Subtitles { cues })
    }

    /// Reads and decodes a subtitle file, detecting its character set.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let encoding = detect_encoding(&bytes);
        debug!("`{}' decoded as {}", path.display(), encoding.name());
        let (decoded, _, had_errors) = encoding.decode(&bytes);
        if had_errors {
            warn!("`{}' contains bytes invalid in {}", path.display(), encoding.name());
        }
        Self::parse(&decoded)
    }

    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for cue in &self.cues {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                cue.index,
                format_timestamp(cue.start_ms),
                format_timestamp(cue.end_ms),
                cue.text.join("\n"),
            ));
        }
        out
    }

    /// Writes the file in UTF-8.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_srt())?;
        Ok(())
    }

    /// Renumbers cues into an uninterrupted 1-based sequence.
    pub fn reindex(&mut self) {
        for (position, cue) in self.cues.iter_mut().enumerate() {
            cue.index = position as u32 + 1;
        }
    }

    /// Linearly remaps all cue timings so that the cue carrying author index
    /// `start_index` starts at `start_ms` and the one carrying `end_index`
    /// starts at `end_ms`. Cues are renumbered afterwards.
    pub fn resync(
        &mut self,
        start_index: u32,
        start_ms: u64,
        end_index: u32,
        end_ms: u64,
    ) -> Result<()> {
        let anchor = |wanted: u32| -> Result<u64> {
            self.cues
                .iter()
                .find(|c| c.index == wanted)
                .map(|c| c.start_ms)
                .ok_or_else(|| {
                    ArchivistError::Subtitle(format!("no cue with index {wanted} in file"))
                })
        };
        let old_start = anchor(start_index)?;
        let old_end = anchor(end_index)?;
        if old_end <= old_start {
            return Err(ArchivistError::Subtitle(format!(
                "cue {end_index} does not start after cue {start_index}"
            )));
        }

        let scale = (end_ms as f64 - start_ms as f64) / (old_end as f64 - old_start as f64);
        let remap = |t: u64| -> u64 {
            let shifted = start_ms as f64 + (t as f64 - old_start as f64) * scale;
            shifted.round().max(0.0) as u64
        };

        for cue in &mut self.cues {
            cue.start_ms = remap(cue.start_ms);
            cue.end_ms = remap(cue.end_ms);
        }
        self.reindex();
        Ok(())
    }
}

/// Parses `HH:MM:SS,mmm` (or `HH:MM:SS.mmm`) into milliseconds.
pub fn parse_timestamp(s: &str) -> Result<u64> {
    let bad = || ArchivistError::Subtitle(format!("`{s}' is not a hh:mm:ss,mmm timestamp"));

    let (clock, millis) = s.split_once([',', '.']).ok_or_else(bad)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(bad());
    }
    let hours: u64 = parts[0].parse().map_err(|_| bad())?;
    let minutes: u64 = parts[1].parse().map_err(|_| bad())?;
    let seconds: u64 = parts[2].parse().map_err(|_| bad())?;
    let millis: u64 = millis.parse().map_err(|_| bad())?;
    if minutes > 59 || seconds > 59 || millis > 999 {
        return Err(bad());
    }
    Ok(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

/// Formats milliseconds as `HH:MM:SS,mmm`.
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Detects the character set of raw subtitle bytes.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Copies `path` to `path~`, replacing any previous backup.
pub fn write_backup(path: &Path) -> Result<PathBuf> {
    let mut name = path.as_os_str().to_os_string();
    name.push("~");
    let backup = PathBuf::from(name);
    if backup.exists() {
        fs::remove_file(&backup)?;
    }
    fs::copy(path, &backup)?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:10,000 --> 00:00:12,500\nHello there.\n\n\
                          2\n00:01:00,000 --> 00:01:02,000\nGeneral Kenobi!\nYou are bold.\n\n";

    #[test]
    fn parse_and_format_round_trip() {
        let subs = Subtitles::parse(SAMPLE).unwrap();
        assert_eq!(subs.cues.len(), 2);
        assert_eq!(subs.cues[0].start_ms, 10_000);
        assert_eq!(subs.cues[1].text, vec!["General Kenobi!", "You are bold."]);
        assert_eq!(subs.to_srt(), SAMPLE);
    }

    #[test]
    fn parse_tolerates_crlf_and_bom() {
        let windows = format!("\u{feff}{}", SAMPLE.replace('\n', "\r\n"));
        let subs = Subtitles::parse(&windows).unwrap();
        assert_eq!(subs.cues.len(), 2);
        assert_eq!(subs.cues[0].text, vec!["Hello there."]);
    }

    #[test]
    fn timestamp_parsing() {
        assert_eq!(parse_timestamp("00:00:00,000").unwrap(), 0);
        assert_eq!(parse_timestamp("00:01:05,123").unwrap(), 65_123);
        assert_eq!(parse_timestamp("01:01:01,500").unwrap(), 3_661_500);
        assert_eq!(parse_timestamp("01:01:01.500").unwrap(), 3_661_500);
        assert!(parse_timestamp("01:01:61,000").is_err());
        assert!(parse_timestamp("garbage").is_err());
    }

    #[test]
    fn timestamp_formatting() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(65_123), "00:01:05,123");
        assert_eq!(format_timestamp(3_661_500), "01:01:01,500");
    }

    #[test]
    fn reindex_closes_gaps() {
        let gappy = SAMPLE.replace("1\n00:00:10", "3\n00:00:10").replace("2\n00:01:00", "7\n00:01:00");
        let mut subs = Subtitles::parse(&gappy).unwrap();
        subs.reindex();
        assert_eq!(subs.cues[0].index, 1);
        assert_eq!(subs.cues[1].index, 2);
    }

    #[test]
    fn resync_remaps_linearly() {
        let mut subs = Subtitles::parse(SAMPLE).unwrap();
        // cue 1: 10s -> 20s, cue 2: 60s -> 120s, so scale = 2
        subs.resync(1, 20_000, 2, 120_000).unwrap();
        assert_eq!(subs.cues[0].start_ms, 20_000);
        assert_eq!(subs.cues[0].end_ms, 25_000); // 20 + (12.5 - 10) * 2
        assert_eq!(subs.cues[1].start_ms, 120_000);
        assert_eq!(subs.cues[1].end_ms, 124_000);
    }

    #[test]
    fn resync_with_unknown_anchor_fails() {
        let mut subs = Subtitles::parse(SAMPLE).unwrap();
        assert!(subs.resync(1, 0, 99, 1_000).is_err());
    }

    #[test]
    fn detects_legacy_encodings() {
        // "caf\xe9" in windows-1252
        let bytes = b"1\r\n00:00:01,000 --> 00:00:02,000\r\ncaf\xe9\r\n\r\n";
        let encoding = detect_encoding(bytes);
        let (decoded, _, _) = encoding.decode(bytes);
        assert!(decoded.contains("café"));
    }

    #[test]
    fn load_decodes_through_detection() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("legacy.srt");
        std::fs::write(&path, b"1\n00:00:01,000 --> 00:00:02,000\ncaf\xe9\n\n").unwrap();
        let subs = Subtitles::load(&path).unwrap();
        assert_eq!(subs.cues[0].text, vec!["café"]);
    }

    #[test]
    fn backup_sits_beside_the_original() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("subs.srt");
        std::fs::write(&path, SAMPLE).unwrap();
        let backup = write_backup(&path).unwrap();
        assert_eq!(backup, dir.path().join("subs.srt~"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), SAMPLE);
    }
}
