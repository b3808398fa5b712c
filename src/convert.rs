//! Planning and assembling ffmpeg invocations that standardize any input
//! container into a streaming-friendly MP4.
//!
//! The planner decides, per input stream, whether it is copied, transcoded
//! or dropped, where it lands in the output and which disposition it gets.
//! The desired output shape: H.264 video first, default-language AAC audio
//! next, an optional iOS-friendly stereo track, remaining audio by language
//! preference, then mov_text subtitles (internal streams or discovered
//! side-car SRT files).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ArchivistError, Result};
use crate::ffmpeg::{CodecCaps, Workload};
use crate::lang::{uniq, Language};
use crate::probe::{Probe, Stream, StreamKind};
use crate::srt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Off,
}

impl Disposition {
    fn flag(&self) -> &'static str {
        match self {
            Disposition::Default => "default",
            Disposition::Off => "0",
        }
    }
}

/// Target codec for a planned output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Copy,
    H264,
    Aac,
    MovText,
}

impl Codec {
    fn label(&self) -> &'static str {
        match self {
            Codec::Copy => "copy",
            Codec::H264 => "h264",
            Codec::Aac => "aac",
            Codec::MovText => "mov_text",
        }
    }
}

/// Where a planned output stream takes its data from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanInput {
    /// An input stream, by source index.
    Stream(u32),
    /// A stereo AAC track synthesized from a surround input stream.
    IosDownmix { source: u32 },
    /// A subtitle side-car file found next to the input.
    ExternalSrt { path: PathBuf, encoding: Option<String> },
}

#[derive(Debug, Clone)]
pub struct PlannedStream {
    pub input: PlanInput,
    pub out_index: u32,
    pub kind: StreamKind,
    pub codec: Codec,
    pub disposition: Disposition,
    pub language: Language,
    pub channels: u32,
}

/// A complete conversion plan for one input file.
#[derive(Debug, Clone)]
pub struct Plan {
    pub streams: Vec<PlannedStream>,
    /// Source stream indexes with no counterpart in the output.
    pub dropped: Vec<u32>,
}

fn copy_or(target: Codec, stream: &Stream, names: &[&str]) -> Codec {
    if names.iter().any(|n| stream.codec.contains(n)) {
        info!(
            "{} stream (index={}, language={}) is already encoded with codec={} - copying",
            stream.kind.label(),
            stream.index,
            stream.language(),
            stream.codec
        );
        Codec::Copy
    } else {
        info!(
            "{} stream (index={}, language={}) is encoded with codec={} - transcoding to {}",
            stream.kind.label(),
            stream.index,
            stream.language(),
            stream.codec,
            target.label()
        );
        target
    }
}

/// Plans the conversion of a probed input into a standardized MP4.
///
/// `languages` orders audio and subtitle streams by preference; the first
/// entry defines the default audio language. `default_subtitle_language`
/// marks one subtitle language as shown by default. With `ios_audio`, a
/// stereo AAC track is planned right after the default audio whenever that
/// one carries more than two channels. `preserve_audio_streams` keeps every
/// stream in the selected languages instead of one per language.
/// `ignore_subtitle_streams` skips internal subtitle tracks and considers
/// side-car files only.
pub fn plan(
    probe: &Probe,
    languages: &[Language],
    default_subtitle_language: Option<&Language>,
    ios_audio: bool,
    preserve_audio_streams: bool,
    ignore_subtitle_streams: bool,
) -> Result<Plan> {
    let languages = uniq(languages.to_vec());
    let mut planned: Vec<PlannedStream> = Vec::new();

    // video: always first, shown by default
    let video = probe
        .default_stream(StreamKind::Video)
        .ok_or_else(|| ArchivistError::Media(format!("`{}' has no video stream", probe.filename)))?;
    planned.push(PlannedStream {
        input: PlanInput::Stream(video.index),
        out_index: 0,
        kind: StreamKind::Video,
        codec: copy_or(Codec::H264, video, &["264"]),
        disposition: Disposition::Default,
        language: video.language(),
        channels: 0,
    });

    plan_audio(probe, &languages, ios_audio, preserve_audio_streams, &mut planned);
    plan_subtitles(
        probe,
        &languages,
        default_subtitle_language,
        ignore_subtitle_streams,
        &mut planned,
    );

    let dropped = probe
        .streams
        .iter()
        .filter(|s| {
            !planned.iter().any(|p| match &p.input {
                PlanInput::Stream(idx) | PlanInput::IosDownmix { source: idx } => *idx == s.index,
                PlanInput::ExternalSrt { .. } => false,
            })
        })
        .map(|s| s.index)
        .collect();

    Ok(Plan { streams: planned, dropped })
}

fn plan_audio(
    probe: &Probe,
    languages: &[Language],
    ios_audio: bool,
    preserve_audio_streams: bool,
    planned: &mut Vec<PlannedStream>,
) {
    let audio_streams = probe.streams_of(StreamKind::Audio);
    if audio_streams.is_empty() {
        warn!("`{}' has no audio streams", probe.filename);
        return;
    }

    // audio comparisons ignore country refinements
    let languages: Vec<Language> = uniq(languages.iter().map(|l| l.primary()).collect());

    // default audio: the first preferred language available, else whatever
    // the file marks as default
    let found = languages.iter().find_map(|l| {
        audio_streams.iter().find(|s| s.language().primary() == *l).map(|s| {
            if *l != languages[0] {
                warn!("no audio stream in `{}' - using `{}' instead", languages[0], l);
            }
            *s
        })
    });
    let Some(default_audio) = found.or_else(|| probe.default_stream(StreamKind::Audio)) else {
        return;
    };
    let default_lang = default_audio.language().primary();

    planned.push(PlannedStream {
        input: PlanInput::Stream(default_audio.index),
        out_index: planned.len() as u32,
        kind: StreamKind::Audio,
        codec: copy_or(Codec::Aac, default_audio, &["aac"]),
        disposition: Disposition::Default,
        language: default_lang.clone(),
        channels: default_audio.channels,
    });

    let mut secondary: Vec<&Stream> =
        audio_streams.iter().filter(|s| s.index != default_audio.index).copied().collect();

    // iOS track: stereo AAC right after the default audio
    let mut ios_used: Option<u32> = None;
    if ios_audio && default_audio.channels > 2 {
        let stereo = secondary.iter().find(|s| {
            s.language().primary() == default_lang && s.channels == 2
        });
        match stereo {
            Some(s) => {
                planned.push(PlannedStream {
                    input: PlanInput::Stream(s.index),
                    out_index: planned.len() as u32,
                    kind: StreamKind::Audio,
                    codec: copy_or(Codec::Aac, s, &["ac3", "aac"]),
                    disposition: Disposition::Off,
                    language: default_lang.clone(),
                    channels: s.channels,
                });
                ios_used = Some(s.index);
            }
            None => {
                info!(
                    "iOS audio track will be down-mixed from stream index={} \
                     (codec={}, channels={})",
                    default_audio.index, default_audio.codec, default_audio.channels
                );
                planned.push(PlannedStream {
                    input: PlanInput::IosDownmix { source: default_audio.index },
                    out_index: planned.len() as u32,
                    kind: StreamKind::Audio,
                    codec: Codec::Aac,
                    disposition: Disposition::Off,
                    language: default_lang.clone(),
                    channels: 2,
                });
            }
        }
    } else {
        info!("skipping creation of optimized iOS audio track");
    }
    secondary.retain(|s| Some(s.index) != ios_used);

    let mut languages = languages;
    if !preserve_audio_streams {
        // drop untagged streams and extra copies of the default language
        secondary.retain(|s| {
            let l = s.language().primary();
            !l.is_undetermined() && l != default_lang
        });
        languages.retain(|l| *l != default_lang);
    }

    for wanted in &languages {
        for s in secondary.iter().filter(|s| s.language().primary() == *wanted) {
            planned.push(PlannedStream {
                input: PlanInput::Stream(s.index),
                out_index: planned.len() as u32,
                kind: StreamKind::Audio,
                codec: copy_or(Codec::Aac, s, &["ac3", "aac"]),
                disposition: Disposition::Off,
                language: wanted.clone(),
                channels: s.channels,
            });
        }
        secondary.retain(|s| s.language().primary() != *wanted);
    }
}

fn plan_subtitles(
    probe: &Probe,
    languages: &[Language],
    default_subtitle_language: Option<&Language>,
    ignore_subtitle_streams: bool,
    planned: &mut Vec<PlannedStream>,
) {
    let mut wanted: Vec<Language> = languages.to_vec();
    if let Some(show) = default_subtitle_language {
        if !wanted.contains(show) {
            wanted.insert(0, show.clone());
            wanted = uniq(wanted);
        }
    }

    let mut internal: Vec<&Stream> = if ignore_subtitle_streams {
        Vec::new()
    } else {
        probe.streams_of(StreamKind::Subtitle)
    };

    for k in &wanted {
        let disposition = if default_subtitle_language == Some(k) {
            Disposition::Default
        } else {
            Disposition::Off
        };

        // MP4 subtitle language tags carry no country, so internal streams
        // are matched on the bibliographic code alone
        if let Some(s) = internal.iter().find(|s| s.language().alpha3b() == k.alpha3b()) {
            planned.push(PlannedStream {
                input: PlanInput::Stream(s.index),
                out_index: planned.len() as u32,
                kind: StreamKind::Subtitle,
                codec: copy_or(Codec::MovText, s, &["mov_text"]),
                disposition,
                language: k.clone(),
                channels: 0,
            });
            let used = s.index;
            internal.retain(|s| s.index != used && s.language().alpha3b() != k.alpha3b());
            continue;
        }

        // no internal stream: look for a side-car SRT on disk
        for acronym in k.acronyms() {
            let candidate = sidecar_path(&probe.filename, &acronym);
            if candidate.exists() {
                info!(
                    "using external SRT file `{}' as `{}' subtitle input",
                    candidate.display(),
                    k.alpha3b()
                );
                let encoding = std::fs::read(&candidate)
                    .ok()
                    .map(|bytes| srt::detect_encoding(&bytes).name().to_string());
                planned.push(PlannedStream {
                    input: PlanInput::ExternalSrt { path: candidate, encoding },
                    out_index: planned.len() as u32,
                    kind: StreamKind::Subtitle,
                    codec: Codec::MovText,
                    disposition,
                    language: k.clone(),
                    channels: 0,
                });
                break;
            }
        }
        internal.retain(|s| s.language().alpha3b() != k.alpha3b());
    }
}

fn sidecar_path(filename: &str, acronym: &str) -> PathBuf {
    let path = Path::new(filename);
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    path.with_file_name(format!("{stem}.{acronym}.srt"))
}

fn audio_codec_args(caps: &HashMap<String, CodecCaps>, out_index: u32, channels: u32) -> Vec<String> {
    let has_fdk = caps
        .get("aac")
        .map(|c| c.description.contains("libfdk_aac"))
        .unwrap_or(false);
    if has_fdk {
        vec!["libfdk_aac".into(), "-vbr".into(), "4".into()]
    } else {
        let bitrate = channels.max(1) * 64;
        vec!["aac".into(), format!("-b:{out_index}"), format!("{bitrate}k")]
    }
}

/// Assembles the full ffmpeg argument vector realizing a plan.
pub fn options(
    infile: &Path,
    outfile: &Path,
    plan: &Plan,
    threads: u32,
    caps: &HashMap<String, CodecCaps>,
) -> Vec<String> {
    let mut ordered: Vec<&PlannedStream> = plan.streams.iter().collect();
    ordered.sort_by_key(|p| p.out_index);

    let mut inopt: Vec<String> = Vec::new();
    let mut mapopt: Vec<String> = Vec::new();
    let mut codopt: Vec<String> = Vec::new();
    let mut ext_input = 1u32; // input 0 is the movie itself

    for p in ordered {
        let out = p.out_index;
        match &p.input {
            PlanInput::IosDownmix { source } => {
                mapopt.extend(["-map".into(), "[iOS]".into()]);
                codopt.extend([format!("-disposition:{out}"), p.disposition.flag().into()]);
                codopt.push(format!("-codec:{out}"));
                codopt.extend(audio_codec_args(caps, out, 2));
                codopt.extend([
                    "-filter_complex".into(),
                    // surround to stereo down-mix per the ATSC A/52 mapping
                    format!(
                        "[0:{source}]pan=stereo|FL<1.0*FL+0.707*FC+0.707*BL|\
                         FR<1.0*FR+0.707*FC+0.707*BR[iOS]"
                    ),
                    format!("-metadata:s:{out}"),
                    format!("language={}", p.language.alpha3b()),
                ]);
            }
            PlanInput::ExternalSrt { path, encoding } => {
                if let Some(enc) = encoding {
                    inopt.extend(["-sub_charenc".into(), enc.clone()]);
                }
                inopt.extend(["-i".into(), path.display().to_string()]);
                mapopt.extend(["-map".into(), format!("{ext_input}:0")]);
                ext_input += 1;
                codopt.extend([
                    format!("-disposition:{out}"),
                    p.disposition.flag().into(),
                    format!("-codec:{out}"),
                    "mov_text".into(),
                    format!("-metadata:s:{out}"),
                    format!("language={}", p.language.alpha3b()),
                ]);
            }
            PlanInput::Stream(idx) => {
                mapopt.extend(["-map".into(), format!("0:{idx}")]);
                codopt.extend([format!("-disposition:{out}"), p.disposition.flag().into()]);
                codopt.push(format!("-codec:{out}"));
                match p.codec {
                    Codec::Copy => codopt.push("copy".into()),
                    Codec::H264 => codopt.extend([
                        "libx264".into(),
                        "-preset".into(),
                        "slower".into(),
                        "-crf".into(),
                        "21".into(),
                    ]),
                    Codec::Aac => codopt.extend(audio_codec_args(caps, out, p.channels)),
                    Codec::MovText => codopt.push("mov_text".into()),
                }
                if matches!(p.kind, StreamKind::Audio | StreamKind::Subtitle) {
                    codopt.extend([
                        format!("-metadata:s:{out}"),
                        format!("language={}", p.language.alpha3b()),
                    ]);
                }
            }
        }
    }

    // MP4 optimized for streaming without a separate faststart pass
    codopt.extend(["-movflags".into(), "+faststart".into()]);

    let mut args: Vec<String> = vec![
        "-threads".into(),
        threads.to_string(),
        "-fix_sub_duration".into(),
        "-i".into(),
        infile.display().to_string(),
    ];
    args.extend(inopt);
    args.extend(mapopt);
    args.extend(codopt);
    args.push(outfile.display().to_string());
    args
}

/// Renders a human-readable plan table for dry runs.
pub fn render_plan(plan: &Plan, probe: &Probe) -> String {
    let mut out = String::new();
    let stream = |idx: u32| probe.streams.iter().find(|s| s.index == idx);

    for &idx in &plan.dropped {
        if let Some(s) = stream(idx) {
            out.push_str(&format!(
                "  {} stream [{}] lang={} codec={} -> [deleted]\n",
                s.kind.label(),
                s.index,
                s.language().alpha3b(),
                s.codec
            ));
        }
    }

    for p in &plan.streams {
        let mark = if p.disposition == Disposition::Default { " **" } else { "" };
        match &p.input {
            PlanInput::IosDownmix { source } => {
                let s = stream(*source);
                out.push_str(&format!(
                    "  audio stream [{}] lang={} codec={} -> [{}] codec={} (iOS)\n",
                    source,
                    p.language.alpha3b(),
                    s.map(|s| s.codec.as_str()).unwrap_or("?"),
                    p.out_index,
                    p.codec.label()
                ));
            }
            PlanInput::ExternalSrt { path, encoding } => {
                out.push_str(&format!(
                    "  ({}) lang={} encoding={} -> [{}] codec={}{}\n",
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                    p.language.alpha3b(),
                    encoding.as_deref().unwrap_or("??"),
                    p.out_index,
                    p.codec.label(),
                    mark
                ));
            }
            PlanInput::Stream(idx) => {
                let s = stream(*idx);
                let channels = match p.kind {
                    StreamKind::Audio => format!(
                        " channels={}",
                        s.map(|s| s.channels).unwrap_or(0)
                    ),
                    _ => String::new(),
                };
                out.push_str(&format!(
                    "  {} stream [{}] lang={} codec={}{} -> [{}] codec={}{}\n",
                    p.kind.label(),
                    idx,
                    p.language.alpha3b(),
                    s.map(|s| s.codec.as_str()).unwrap_or("?"),
                    channels,
                    p.out_index,
                    p.codec.label(),
                    mark
                ));
            }
        }
    }
    out
}

/// Progress workload for running a plan: frame-accurate when the video
/// stream advertises its frame count, duration-based otherwise.
pub fn workload(probe: &Probe) -> Workload {
    match probe.default_stream(StreamKind::Video).and_then(|s| s.frames) {
        Some(frames) => Workload::Frames(frames),
        None => {
            info!("number of frames not available - using stream duration");
            if probe.duration_secs > 0.0 {
                Workload::Seconds(probe.duration_secs)
            } else {
                Workload::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Stream;

    fn lang(code: &str) -> Language {
        Language::parse(code).unwrap()
    }

    fn stream(
        index: u32,
        kind: StreamKind,
        codec: &str,
        channels: u32,
        language: Option<&str>,
        is_default: bool,
    ) -> Stream {
        Stream {
            index,
            kind,
            codec: codec.to_string(),
            channels,
            width: 0,
            height: 0,
            language_tag: language.map(|l| l.to_string()),
            is_default,
            frames: None,
        }
    }

    fn probe_with(streams: Vec<Stream>) -> Probe {
        Probe {
            filename: "/library/movie.mkv".to_string(),
            container: "matroska,webm".to_string(),
            duration_secs: 5400.0,
            streams,
        }
    }

    #[test]
    fn compliant_input_is_copied() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
        ]);
        let plan = plan(&probe, &[lang("en")], None, true, false, false).unwrap();

        assert_eq!(plan.streams.len(), 2);
        assert_eq!(plan.streams[0].codec, Codec::Copy);
        assert_eq!(plan.streams[1].codec, Codec::Copy);
        // stereo default audio: no iOS track needed
        assert!(!plan.streams.iter().any(|p| matches!(p.input, PlanInput::IosDownmix { .. })));
        assert!(plan.dropped.is_empty());
    }

    #[test]
    fn surround_input_synthesizes_ios_downmix() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "mpeg4", 0, None, true),
            stream(1, StreamKind::Audio, "dts", 6, Some("eng"), true),
        ]);
        let plan = plan(&probe, &[lang("en")], None, true, false, false).unwrap();

        assert_eq!(plan.streams[0].codec, Codec::H264);
        assert_eq!(plan.streams[1].codec, Codec::Aac);
        let ios = &plan.streams[2];
        assert_eq!(ios.input, PlanInput::IosDownmix { source: 1 });
        assert_eq!(ios.out_index, 2);
        assert_eq!(ios.disposition, Disposition::Off);
    }

    #[test]
    fn matching_stereo_track_is_reused_for_ios() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "dts", 6, Some("eng"), true),
            stream(2, StreamKind::Audio, "ac3", 2, Some("eng"), false),
        ]);
        let plan = plan(&probe, &[lang("en")], None, true, false, false).unwrap();

        let ios = &plan.streams[2];
        assert_eq!(ios.input, PlanInput::Stream(2));
        assert_eq!(ios.codec, Codec::Copy);
    }

    #[test]
    fn secondary_audio_follows_preference_order() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Audio, "ac3", 2, Some("fre"), false),
            stream(3, StreamKind::Audio, "mp3", 2, Some("ita"), false),
        ]);
        let plan =
            plan(&probe, &[lang("en"), lang("it"), lang("fr")], None, false, false, false).unwrap();

        let audio: Vec<_> = plan
            .streams
            .iter()
            .filter(|p| p.kind == StreamKind::Audio)
            .collect();
        assert_eq!(audio.len(), 3);
        assert_eq!(audio[0].language.alpha3b(), "eng");
        assert_eq!(audio[1].language.alpha3b(), "ita");
        assert_eq!(audio[1].codec, Codec::Aac); // mp3 gets transcoded
        assert_eq!(audio[2].language.alpha3b(), "fre");
        assert_eq!(audio[2].codec, Codec::Copy); // ac3 is copied
    }

    #[test]
    fn unrequested_and_untagged_audio_is_dropped() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Audio, "aac", 2, None, false),
            stream(3, StreamKind::Audio, "aac", 2, Some("eng"), false),
        ]);
        let plan = plan(&probe, &[lang("en")], None, false, false, false).unwrap();

        assert_eq!(plan.streams.len(), 2);
        assert_eq!(plan.dropped, vec![2, 3]);
    }

    #[test]
    fn preserve_audio_keeps_extra_default_language_streams() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Audio, "ac3", 6, Some("eng"), false),
        ]);
        let plan = plan(&probe, &[lang("en")], None, false, true, false).unwrap();

        let audio: Vec<_> =
            plan.streams.iter().filter(|p| p.kind == StreamKind::Audio).collect();
        assert_eq!(audio.len(), 2);
        assert_eq!(audio[1].input, PlanInput::Stream(2));
    }

    #[test]
    fn internal_subtitles_matched_by_language() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Subtitle, "subrip", 0, Some("fre"), false),
            stream(3, StreamKind::Subtitle, "mov_text", 0, Some("eng"), false),
        ]);
        let plan =
            plan(&probe, &[lang("en"), lang("fr")], None, false, false, false).unwrap();

        let subs: Vec<_> =
            plan.streams.iter().filter(|p| p.kind == StreamKind::Subtitle).collect();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].language.alpha3b(), "eng");
        assert_eq!(subs[0].codec, Codec::Copy);
        assert_eq!(subs[1].language.alpha3b(), "fre");
        assert_eq!(subs[1].codec, Codec::MovText);
    }

    #[test]
    fn show_language_gets_default_disposition_and_is_prepended() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Subtitle, "subrip", 0, Some("fre"), false),
        ]);
        let show = lang("fr");
        let plan = plan(&probe, &[lang("en")], Some(&show), false, false, false).unwrap();

        let sub = plan
            .streams
            .iter()
            .find(|p| p.kind == StreamKind::Subtitle)
            .unwrap();
        assert_eq!(sub.language.alpha3b(), "fre");
        assert_eq!(sub.disposition, Disposition::Default);
    }

    #[test]
    fn ignore_subtitle_streams_skips_internal_tracks() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Subtitle, "subrip", 0, Some("eng"), false),
        ]);
        let plan = plan(&probe, &[lang("en")], None, false, false, true).unwrap();
        assert!(!plan.streams.iter().any(|p| p.kind == StreamKind::Subtitle));
        assert!(plan.dropped.contains(&2));
    }

    #[test]
    fn external_sidecar_is_discovered() {
        let dir = tempfile::TempDir::new().unwrap();
        let movie = dir.path().join("movie.mkv");
        std::fs::write(dir.path().join("movie.fre.srt"), "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n\n")
            .unwrap();

        let mut probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
        ]);
        probe.filename = movie.display().to_string();

        let plan = plan(&probe, &[lang("en"), lang("fr")], None, false, false, false).unwrap();
        let sub = plan
            .streams
            .iter()
            .find(|p| p.kind == StreamKind::Subtitle)
            .expect("side-car subtitle planned");
        match &sub.input {
            PlanInput::ExternalSrt { path, encoding } => {
                assert!(path.ends_with("movie.fre.srt"));
                assert!(encoding.is_some());
            }
            other => panic!("expected external srt, got {other:?}"),
        }
        assert_eq!(sub.codec, Codec::MovText);
    }

    #[test]
    fn options_vector_for_a_copy_plan() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
        ]);
        let plan = plan(&probe, &[lang("en")], None, false, false, false).unwrap();
        let args = options(
            Path::new("in.mkv"),
            Path::new("out.mp4"),
            &plan,
            4,
            &HashMap::new(),
        );

        let expected: Vec<String> = [
            "-threads", "4", "-fix_sub_duration", "-i", "in.mkv",
            "-map", "0:0", "-map", "0:1",
            "-disposition:0", "default", "-codec:0", "copy",
            "-disposition:1", "default", "-codec:1", "copy",
            "-metadata:s:1", "language=eng",
            "-movflags", "+faststart",
            "out.mp4",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn options_use_stock_aac_without_fdk() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "dts", 6, Some("eng"), true),
        ]);
        let plan = plan(&probe, &[lang("en")], None, false, false, false).unwrap();
        let args =
            options(Path::new("in.mkv"), Path::new("out.mp4"), &plan, 0, &HashMap::new());

        // 6 channels at 64 kbps each
        let pos = args.iter().position(|a| a == "-codec:1").unwrap();
        assert_eq!(&args[pos + 1..pos + 4], ["aac", "-b:1", "384k"]);
    }

    #[test]
    fn render_plan_mentions_dropped_streams() {
        let probe = probe_with(vec![
            stream(0, StreamKind::Video, "h264", 0, None, true),
            stream(1, StreamKind::Audio, "aac", 2, Some("eng"), true),
            stream(2, StreamKind::Audio, "aac", 2, Some("fre"), false),
        ]);
        let plan = plan(&probe, &[lang("en")], None, false, false, false).unwrap();
        let rendered = render_plan(&plan, &probe);
        assert!(rendered.contains("[deleted]"));
        assert!(rendered.contains("audio stream [1] lang=eng codec=aac channels=2 -> [1] codec=copy **"));
    }
}
