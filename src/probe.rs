//! ffprobe invocation and typed stream information.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ArchivistError, Result};
use crate::lang::{stream_language, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl StreamKind {
    pub fn label(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Other => "other",
        }
    }
}

/// One stream of a probed media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub index: u32,
    pub kind: StreamKind,
    pub codec: String,
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub language_tag: Option<String>,
    pub is_default: bool,
    pub frames: Option<u64>,
}

impl Stream {
    pub fn language(&self) -> Language {
        stream_language(self.language_tag.as_deref())
    }
}

/// Typed result of probing a media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    pub filename: String,
    pub container: String,
    pub duration_secs: f64,
    pub streams: Vec<Stream>,
}

impl Probe {
    pub fn streams_of(&self, kind: StreamKind) -> Vec<&Stream> {
        self.streams.iter().filter(|s| s.kind == kind).collect()
    }

    /// The stream of `kind` marked with the default disposition; falls back
    /// to the first stream of that kind.
    pub fn default_stream(&self, kind: StreamKind) -> Option<&Stream> {
        let of_kind = self.streams_of(kind);
        let defaults: Vec<&&Stream> = of_kind.iter().filter(|s| s.is_default).collect();
        match defaults.len() {
            0 => {
                if !of_kind.is_empty() {
                    warn!("no {} stream tagged as default - using the first one", kind.label());
                }
                of_kind.first().copied()
            }
            1 => Some(defaults[0]),
            _ => {
                warn!("more than one default {} stream - keeping the first", kind.label());
                Some(defaults[0])
            }
        }
    }
}

/// Runs ffprobe on a file and parses the JSON output. ffprobe is resolved
/// from `PATH`.
pub async fn probe(file: &Path) -> Result<Probe> {
    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(file)
        .output()
        .await
        .map_err(|e| {
            ArchivistError::Media(format!("cannot run ffprobe - did you install it? ({e})"))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ArchivistError::Media(format!(
            "ffprobe failed on `{}': {}",
            file.display(),
            stderr.trim()
        )));
    }

    let raw: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    parse_probe_output(&raw)
}

fn parse_probe_output(raw: &serde_json::Value) -> Result<Probe> {
    let format = raw
        .get("format")
        .ok_or_else(|| ArchivistError::Media("ffprobe output has no `format' section".into()))?;

    let filename = format
        .get("filename")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let container = format
        .get("format_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let duration_secs: f64 = format
        .get("duration")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    let streams = raw
        .get("streams")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let streams = streams
        .iter()
        .map(|s| {
            let kind = match s.get("codec_type").and_then(|v| v.as_str()).unwrap_or("") {
                "video" => StreamKind::Video,
                "audio" => StreamKind::Audio,
                "subtitle" => StreamKind::Subtitle,
                _ => StreamKind::Other,
            };
            Stream {
                index: s.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                kind,
                codec: s
                    .get("codec_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                channels: s.get("channels").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                width: s.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                height: s.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                language_tag: s
                    .get("tags")
                    .and_then(|t| t.get("language"))
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string()),
                is_default: s
                    .get("disposition")
                    .and_then(|d| d.get("default"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0)
                    == 1,
                frames: s
                    .get("nb_frames")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok()),
            }
        })
        .collect();

    Ok(Probe { filename, container, duration_secs, streams })
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_probe_json() -> serde_json::Value {
        serde_json::json!({
            "format": {
                "filename": "/library/movie.mkv",
                "format_name": "matroska,webm",
                "duration": "7200.123"
            },
            "streams": [
                {
                    "index": 0,
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "nb_frames": "172800",
                    "disposition": { "default": 1 }
                },
                {
                    "index": 1,
                    "codec_type": "audio",
                    "codec_name": "dts",
                    "channels": 6,
                    "tags": { "language": "eng" },
                    "disposition": { "default": 1 }
                },
                {
                    "index": 2,
                    "codec_type": "audio",
                    "codec_name": "ac3",
                    "channels": 2,
                    "tags": { "language": "fre" },
                    "disposition": { "default": 0 }
                },
                {
                    "index": 3,
                    "codec_type": "subtitle",
                    "codec_name": "subrip",
                    "tags": { "language": "fre" },
                    "disposition": { "default": 0 }
                }
            ]
        })
    }

    #[test]
    fn parse_probe_json() {
        let probe = parse_probe_output(&sample_probe_json()).unwrap();
        assert_eq!(probe.filename, "/library/movie.mkv");
        assert_eq!(probe.container, "matroska,webm");
        assert!((probe.duration_secs - 7200.123).abs() < 0.001);
        assert_eq!(probe.streams.len(), 4);

        let video = probe.default_stream(StreamKind::Video).unwrap();
        assert_eq!(video.codec, "h264");
        assert_eq!(video.frames, Some(172_800));
        assert_eq!((video.width, video.height), (1920, 1080));

        let audio = probe.default_stream(StreamKind::Audio).unwrap();
        assert_eq!(audio.index, 1);
        assert_eq!(audio.channels, 6);
        assert_eq!(audio.language().alpha3b(), "eng");

        assert_eq!(probe.streams_of(StreamKind::Subtitle).len(), 1);
    }

    #[test]
    fn untagged_streams_are_undetermined() {
        let probe = parse_probe_output(&serde_json::json!({
            "format": { "format_name": "mov,mp4", "duration": "10.0" },
            "streams": [
                { "index": 0, "codec_type": "audio", "codec_name": "aac", "channels": 2 }
            ]
        }))
        .unwrap();
        assert!(probe.streams[0].language().is_undetermined());
        assert!(!probe.streams[0].is_default);
    }

    #[test]
    fn default_stream_falls_back_to_first() {
        let probe = parse_probe_output(&serde_json::json!({
            "format": { "format_name": "mov,mp4", "duration": "10.0" },
            "streams": [
                { "index": 0, "codec_type": "audio", "codec_name": "aac", "channels": 2 },
                { "index": 1, "codec_type": "audio", "codec_name": "ac3", "channels": 6 }
            ]
        }))
        .unwrap();
        assert_eq!(probe.default_stream(StreamKind::Audio).unwrap().index, 0);
    }
}
