//! ffmpeg subprocess execution: codec capability discovery and transcode
//! runs with live progress reporting.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::LazyLock;

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::error::{ArchivistError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Video,
    Audio,
    Subtitle,
}

/// What a compiled-in ffmpeg codec supports.
#[derive(Debug, Clone)]
pub struct CodecCaps {
    pub decode: bool,
    pub encode: bool,
    pub kind: CodecKind,
    pub description: String,
}

// one `ffmpeg -codecs` table row, e.g. " DEV.LS h264  H.264 / AVC ..."
static RE_CODEC_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s(?P<decode>[D.])(?P<encode>[E.])(?P<kind>[AVS.])[I.][L.][S.]\s+(?P<codec>\S+)\s+(?P<desc>.*)$")
        .unwrap()
});

/// Queries ffmpeg for the codecs it was compiled with. Used to prefer
/// libfdk_aac over the stock AAC encoder when available.
pub async fn codec_capabilities() -> Result<HashMap<String, CodecCaps>> {
    let output = tokio::process::Command::new("ffmpeg")
        .arg("-codecs")
        .output()
        .await
        .map_err(|e| {
            ArchivistError::Media(format!("cannot run ffmpeg - did you install it? ({e})"))
        })?;

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(parse_codec_table(&text))
}

fn parse_codec_table(text: &str) -> HashMap<String, CodecCaps> {
    let mut caps = HashMap::new();
    for line in text.lines() {
        let Some(m) = RE_CODEC_ROW.captures(line) else { continue };
        let kind = match &m["kind"] {
            "V" => CodecKind::Video,
            "A" => CodecKind::Audio,
            "S" => CodecKind::Subtitle,
            _ => continue,
        };
        caps.insert(
            m["codec"].to_string(),
            CodecCaps {
                decode: &m["decode"] == "D",
                encode: &m["encode"] == "E",
                kind,
                description: m["desc"].trim().to_string(),
            },
        );
    }
    caps
}

/// How much work a run represents, for progress display.
#[derive(Debug, Clone, Copy)]
pub enum Workload {
    Frames(u64),
    Seconds(f64),
    Unknown,
}

static RE_PROGRESS_KV: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)=\s*(.+)$").unwrap());

/// Runs ffmpeg with the given argument vector, rendering a progress bar fed
/// by the `-progress` key/value protocol. Fails on a non-zero exit status.
pub async fn run(args: &[String], workload: Workload) -> Result<()> {
    debug!("executing ffmpeg {}", args.join(" "));

    let mut child = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-nostats", "-loglevel", "error", "-progress", "pipe:1"])
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            ArchivistError::Media(format!("cannot run ffmpeg - did you install it? ({e})"))
        })?;

    let bar = match workload {
        Workload::Frames(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(
                    "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames {msg} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
            );
            bar
        }
        Workload::Seconds(total) => {
            let bar = ProgressBar::new((total * 1000.0).max(1.0) as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "[{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
            );
            bar
        }
        Workload::Unknown => ProgressBar::hidden(),
    };

    let stdout = child.stdout.take().expect("stdout was piped");
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ArchivistError::Media(format!("reading ffmpeg progress: {e}")))?
    {
        let Some(kv) = RE_PROGRESS_KV.captures(&line) else { continue };
        match (&kv[1], &kv[2]) {
            ("frame", value) => {
                if matches!(workload, Workload::Frames(_)) {
                    if let Ok(frame) = value.parse::<u64>() {
                        bar.set_position(frame);
                    }
                }
            }
            // despite the name, ffmpeg reports out_time_ms in microseconds
            ("out_time_ms", value) => {
                if matches!(workload, Workload::Seconds(_)) {
                    if let Ok(us) = value.parse::<u64>() {
                        bar.set_position(us / 1000);
                    }
                }
            }
            ("speed", value) => bar.set_message(value.to_string()),
            ("progress", "end") => bar.finish(),
            _ => {}
        }
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ArchivistError::Media(format!("waiting for ffmpeg: {e}")))?;
    if !output.status.success() {
        bar.abandon();
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ArchivistError::Media(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    info!("ffmpeg run completed");
    Ok(())
}
