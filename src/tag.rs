//! MP4 re-tagging with metadata records.
//!
//! Writes the iTunes-style atom set media players expect: basic titles and
//! descriptions, TV show numbering, genre/date atoms, cover art and the two
//! freeform Apple atoms (`iTunMOVI` cast/crew plist, `iTunEXTC`
//! certification). The atom codec itself lives in the `mp4ameta` crate.

use std::path::Path;

use mp4ameta::{Data, Fourcc, FreeformIdent, Img, ImgFmt, MediaType, Tag};
use tracing::{info, warn};

use crate::error::{ArchivistError, Result};
use crate::metadata::{Artwork, EpisodeRecord, ImageFormat, MovieRecord};

const LONG_DESCRIPTION: Fourcc = Fourcc(*b"ldes");
const TV_EPISODE_ID: Fourcc = Fourcc(*b"tven");
const HD_VIDEO: Fourcc = Fourcc(*b"hdvd");

const ITUNES_MEAN: &str = "com.apple.iTunes";

/// The `hdvd` atom value iTunes uses to badge video quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdFlag {
    Sd,
    Hd720,
    Hd1080,
}

impl HdFlag {
    fn atom_value(&self) -> u8 {
        match self {
            HdFlag::Sd => 0,
            HdFlag::Hd720 => 1,
            HdFlag::Hd1080 => 2,
        }
    }
}

/// Classifies video dimensions for the `hdvd` atom.
pub fn hd_flag(width: u32, height: u32) -> HdFlag {
    if width >= 1900 || height >= 1060 {
        HdFlag::Hd1080
    } else if width >= 1260 || height >= 700 {
        HdFlag::Hd720
    } else {
        HdFlag::Sd
    }
}

fn tag_err(e: mp4ameta::Error) -> ArchivistError {
    ArchivistError::Tag(e.to_string())
}

fn open_tag(path: &Path) -> Tag {
    match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) => {
            warn!("unable to read existing tags ({e}), starting from an empty set");
            Tag::default()
        }
    }
}

fn set_artwork(tag: &mut Tag, artwork: Option<&Artwork>) {
    if let Some(art) = artwork {
        let fmt = match art.format {
            ImageFormat::Jpeg => ImgFmt::Jpeg,
            ImageFormat::Png => ImgFmt::Png,
        };
        tag.set_artwork(Img::new(fmt, art.data.clone()));
    }
}

/// Re-tags an MP4 movie file from a TMDB record.
pub fn retag_movie(path: &Path, movie: &MovieRecord, artwork: Option<&Artwork>) -> Result<()> {
    info!("tagging file: {}", path.display());

    let mut tag = open_tag(path);
    tag.clear();

    tag.set_title(movie.title.clone());
    tag.set_description(movie.tagline.clone());
    tag.set_data(LONG_DESCRIPTION, Data::Utf8(movie.overview.clone()));
    if let Some(date) = &movie.release_date {
        tag.set_year(date.to_string());
    }
    tag.set_media_type(MediaType::Movie);
    if !movie.genres.is_empty() {
        tag.set_genre(movie.genres.join(", "));
    }
    tag.set_data(
        FreeformIdent::new(ITUNES_MEAN, "iTunMOVI"),
        Data::Utf8(movie_plist(movie)),
    );
    if let Some(cert) = movie.certification.as_deref().and_then(movie_certification) {
        tag.set_data(FreeformIdent::new(ITUNES_MEAN, "iTunEXTC"), Data::Utf8(cert));
    }
    set_artwork(&mut tag, artwork);

    info!("finally saving tags to file...");
    tag.write_to_path(path).map_err(tag_err)?;
    info!("tags written successfully");
    Ok(())
}

/// Re-tags an MP4 episode file from a TVDB record.
pub fn retag_episode(
    path: &Path,
    episode: &EpisodeRecord,
    artwork: Option<&Artwork>,
    hd: HdFlag,
) -> Result<()> {
    info!("tagging file: {}", path.display());

    let mut tag = open_tag(path);
    tag.clear();

    tag.set_tv_show_name(episode.series_name.clone());
    tag.set_title(episode.episode_name.clone());
    tag.set_data(TV_EPISODE_ID, Data::Utf8(episode.episode_name.clone()));
    tag.set_description(short_description(&episode.overview));
    tag.set_data(LONG_DESCRIPTION, Data::Utf8(episode.overview.clone()));
    if let Some(network) = &episode.network {
        tag.set_tv_network_name(network.clone());
    }
    if let Some(date) = &episode.first_aired {
        tag.set_year(date.to_string());
    }
    tag.set_tv_season(episode.season);
    tag.set_disc_number(episode.season as u16);
    tag.set_total_discs(episode.seasons_in_series as u16);
    tag.set_album(format!("{}, Season {}", episode.series_name, episode.season));
    tag.set_tv_episode(episode.episode);
    tag.set_track_number(episode.episode as u16);
    tag.set_total_tracks(episode.episodes_in_season as u16);
    tag.set_media_type(MediaType::TvShow);
    tag.set_data(HD_VIDEO, Data::BeSigned(vec![hd.atom_value()]));
    if !episode.genres.is_empty() {
        tag.set_genre(episode.genres.join(", "));
    }
    tag.set_data(
        FreeformIdent::new(ITUNES_MEAN, "iTunMOVI"),
        Data::Utf8(episode_plist(episode)),
    );
    if let Some(cert) = episode.certification.as_deref().and_then(tv_certification) {
        tag.set_data(FreeformIdent::new(ITUNES_MEAN, "iTunEXTC"), Data::Utf8(cert));
    }
    set_artwork(&mut tag, artwork);

    info!("finally saving tags to file...");
    tag.write_to_path(path).map_err(tag_err)?;
    info!("tags written successfully");
    Ok(())
}

/// Renders the atoms an episode re-tag would write, for dry runs.
pub fn pretty_print_episode(episode: &EpisodeRecord, hd: HdFlag) -> String {
    let mut out = String::new();
    out.push_str(&format!("tvsh = {}\n", episode.series_name));
    out.push_str(&format!("\u{a9}nam = {}\n", episode.episode_name));
    out.push_str(&format!("tven = {}\n", episode.episode_name));
    out.push_str(&format!("desc = {}\n", short_description(&episode.overview)));
    out.push_str(&format!("ldes = {}\n", episode.overview));
    out.push_str(&format!("tvnn = {}\n", episode.network.as_deref().unwrap_or("")));
    out.push_str(&format!(
        "\u{a9}day = {}\n",
        episode.first_aired.map(|d| d.to_string()).unwrap_or_default()
    ));
    out.push_str(&format!("tvsn = {}\n", episode.season));
    out.push_str(&format!("disk = ({}, {})\n", episode.season, episode.seasons_in_series));
    out.push_str(&format!(
        "\u{a9}alb = {}, Season {}\n",
        episode.series_name, episode.season
    ));
    out.push_str(&format!("tves = {}\n", episode.episode));
    out.push_str(&format!("trkn = ({}, {})\n", episode.episode, episode.episodes_in_season));
    out.push_str("stik = 10 # TV show iTunes category\n");
    out.push_str(&format!("hdvd = {}\n", hd.atom_value()));
    out.push_str(&format!("\u{a9}gen = {}\n", episode.genres.join(", ")));
    out.push_str(&format!("covr = {}\n", episode.poster_url.as_deref().unwrap_or("")));
    out.push_str(&format!(
        "----:com.apple.iTunes:iTunEXTC = {}\n",
        episode.certification.as_deref().and_then(tv_certification).unwrap_or_default()
    ));
    out.push_str(&format!(
        "----:com.apple.iTunes:iTunMOVI = {}\n",
        episode_plist(episode)
    ));
    out
}

/// MPAA certification atom for movies: `mpaa|PG-13|300|`.
fn movie_certification(cert: &str) -> Option<String> {
    let numerical = match cert {
        "G" => "100",
        "PG" => "200",
        "PG-13" => "300",
        "R" => "400",
        "NC-17" => "500",
        _ => return None,
    };
    Some(format!("mpaa|{cert}|{numerical}|"))
}

/// US TV content rating atom for episodes: `us-tv|TV-14|500|`.
fn tv_certification(cert: &str) -> Option<String> {
    let numerical = match cert {
        "TV-Y" => "100",
        "TV-Y7" => "200",
        "TV-G" => "300",
        "TV-PG" => "400",
        "TV-14" => "500",
        "TV-MA" => "600",
        _ => return None,
    };
    Some(format!("us-tv|{cert}|{numerical}|"))
}

fn movie_plist(movie: &MovieRecord) -> String {
    apple_plist(&[
        ("cast", &movie.cast),
        ("screenwriters", &movie.screenwriters),
        ("directors", &movie.directors),
        ("producers", &movie.producers),
    ])
}

fn episode_plist(episode: &EpisodeRecord) -> String {
    apple_plist(&[
        ("cast", &episode.actors),
        ("screenwriters", &episode.writers),
        ("directors", &episode.directors),
    ])
}

/// Builds the single-line `iTunMOVI` plist document Apple players parse for
/// cast and crew names. Five entries per section at most.
fn apple_plist(sections: &[(&str, &Vec<String>)]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd"><plist version="1.0"><dict>"#,
    );
    for (name, entries) in sections {
        out.push_str(&format!("<key>{name}</key><array>"));
        for entry in entries.iter().take(5) {
            out.push_str(&format!(
                "<dict><key>name</key><string>{}</string></dict>",
                xml_escape(entry)
            ));
        }
        out.push_str("</array>");
    }
    out.push_str("</dict></plist>");
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Shortens an overview to what the `desc` atom tolerates (256 characters),
/// breaking at a sentence boundary.
pub fn short_description(overview: &str) -> String {
    const MAX: usize = 256;
    if overview.chars().count() < MAX {
        return overview.to_string();
    }
    let head: String = overview.chars().take(MAX).collect();
    let mut sentences: Vec<&str> = head.split('.').collect();
    sentences.pop();
    format!("{}.", sentences.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode() -> EpisodeRecord {
        EpisodeRecord {
            series_name: "Friends".to_string(),
            episode_name: "The One Where Monica Gets a Roommate".to_string(),
            overview: "Monica and the gang introduce Rachel to the real world.".to_string(),
            first_aired: chrono::NaiveDate::from_ymd_opt(1994, 9, 22),
            season: 1,
            episode: 1,
            network: Some("NBC".to_string()),
            genres: vec!["Comedy".to_string()],
            actors: vec!["Jennifer Aniston".to_string(), "Courteney Cox".to_string()],
            writers: vec!["David Crane".to_string()],
            directors: vec!["James Burrows".to_string()],
            episodes_in_season: 24,
            seasons_in_series: 10,
            certification: Some("TV-14".to_string()),
            poster_url: Some("https://artworks.thetvdb.com/banners/posters/friends.jpg".into()),
        }
    }

    #[test]
    fn certifications_map_to_apple_atoms() {
        assert_eq!(movie_certification("PG-13").unwrap(), "mpaa|PG-13|300|");
        assert_eq!(movie_certification("NC-17").unwrap(), "mpaa|NC-17|500|");
        assert!(movie_certification("U").is_none());

        assert_eq!(tv_certification("TV-14").unwrap(), "us-tv|TV-14|500|");
        assert!(tv_certification("12").is_none());
    }

    #[test]
    fn plist_escapes_and_caps_sections() {
        let names: Vec<String> = (0..7).map(|i| format!("Actor <{i}> & Co")).collect();
        let plist = apple_plist(&[("cast", &names)]);

        assert!(plist.starts_with("<?xml"));
        assert!(plist.contains("<key>cast</key>"));
        assert_eq!(plist.matches("<dict><key>name</key>").count(), 5);
        assert!(plist.contains("Actor &lt;0&gt; &amp; Co"));
        assert!(!plist.contains("<0>"));
        assert!(!plist.contains('\n'));
    }

    #[test]
    fn short_description_respects_sentence_boundaries() {
        let short = "A brief overview.";
        assert_eq!(short_description(short), short);

        let long = format!("{} {}", "First sentence.", "x".repeat(300));
        let shortened = short_description(&long);
        assert_eq!(shortened, "First sentence.");
        assert!(shortened.chars().count() <= 256);
    }

    #[test]
    fn hd_flag_thresholds() {
        assert_eq!(hd_flag(720, 576), HdFlag::Sd);
        assert_eq!(hd_flag(1280, 720), HdFlag::Hd720);
        assert_eq!(hd_flag(1920, 1080), HdFlag::Hd1080);
        assert_eq!(hd_flag(0, 2160), HdFlag::Hd1080);
    }

    #[test]
    fn pretty_print_lists_every_atom() {
        let rendered = pretty_print_episode(&episode(), HdFlag::Hd1080);
        assert!(rendered.contains("tvsh = Friends"));
        assert!(rendered.contains("tven = The One Where Monica Gets a Roommate"));
        assert!(rendered.contains("\u{a9}day = 1994-09-22"));
        assert!(rendered.contains("disk = (1, 10)"));
        assert!(rendered.contains("trkn = (1, 24)"));
        assert!(rendered.contains("stik = 10"));
        assert!(rendered.contains("hdvd = 2"));
        assert!(rendered.contains("----:com.apple.iTunes:iTunEXTC = us-tv|TV-14|500|"));
        assert!(rendered.contains("<key>cast</key>"));
    }
}
