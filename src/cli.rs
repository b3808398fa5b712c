use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "archivist", version, about, long_about = None)]
pub struct Args {
    /// Increase output verbosity; may be used multiple times
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-tag an MP4 movie with information from TMDB
    RetagMovie {
        /// The input file (should end in ".mp4")
        file: PathBuf,

        /// Title (or query) to search for on TMDB; handy when the movie
        /// name cannot be guessed from the filename
        #[arg(short, long)]
        query: Option<String>,

        /// Use this TMDB API key instead of searching the environment
        /// (TMDB_APIKEY), the working directory or your home directory
        /// (.archivistrc)
        #[arg(short, long)]
        apikey: Option<String>,

        /// Guess the movie title from the file basename only instead of
        /// the full path
        #[arg(short, long)]
        basename_only: bool,
    },

    /// Re-tag an MP4 TV show episode with information from TVDB
    RetagTvshow {
        /// The input file (should end in ".mp4")
        file: PathBuf,

        /// TV show name to search for on TVDB; handy when it cannot be
        /// guessed from the filename
        #[arg(short, long)]
        name: Option<String>,

        /// Season number, overriding any guess from the filename
        #[arg(short, long)]
        season: Option<u32>,

        /// Episode number, overriding any guess from the filename
        #[arg(short, long)]
        episode: Option<u32>,

        /// Use this TVDB API key instead of searching the environment
        /// (TVDB_APIKEY), the working directory or your home directory
        /// (.archivistrc)
        #[arg(short, long)]
        apikey: Option<String>,

        /// Guess the episode from the file basename only instead of the
        /// full path
        #[arg(short, long)]
        basename_only: bool,

        /// Show the episode information retrieved from the remote database
        /// without re-tagging the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Download subtitles for a media file
    Getsubs {
        /// The file to download subtitles for
        file: PathBuf,

        /// Languages of preference ("fre", "en", "pt-br", ...); downloaded
        /// files are named with 3-character ISO 639-2/B codes
        #[arg(required = true)]
        languages: Vec<String>,

        /// Provider credentials as comma-separated key=value pairs,
        /// overriding the [subtitles] rc section and $SUBTITLES_SETUP
        #[arg(long)]
        setup: Option<String>,

        /// Query the providers and list the subtitles that would be
        /// downloaded
        #[arg(short, long)]
        dry_run: bool,

        /// Limit dry-run listings to the top N subtitles per language;
        /// 0 removes the limit
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Re-encode a video into a standardized MP4 respecting language preferences
    Tomp4 {
        /// The input file (any container ffmpeg supports)
        infile: PathBuf,

        /// The output file (should end in ".mp4")
        outfile: PathBuf,

        /// Languages of preference for audio and subtitle streams; the
        /// first one defines the default audio stream
        #[arg(required = true)]
        languages: Vec<String>,

        /// Display subtitles of this language by default
        #[arg(short, long)]
        show: Option<String>,

        /// Create a stereo AAC track prioritized by iOS devices when the
        /// default audio carries more than two channels
        #[arg(short, long)]
        ios_audio: bool,

        /// Number of threads ffmpeg may use; 0 lets ffmpeg decide
        #[arg(short, long, default_value_t = 0)]
        threads: u32,

        /// Print the stream planning and the ffmpeg options without
        /// transcoding anything
        #[arg(short, long)]
        dry_run: bool,

        /// Ignore internal subtitle streams and consider side-car files only
        #[arg(short = 'g', long)]
        ignore_sstreams: bool,

        /// Preserve all audio streams matching the selected languages
        /// (e.g. director's commentary tracks)
        #[arg(short = 'a', long)]
        preserve_astreams: bool,
    },

    /// Re-sync a subrip (.srt) file using newly provided start/end timings
    ResyncSubs {
        /// Author-assigned index of the cue anchoring the new start time
        start_index: u32,

        /// New start time for that cue, as "hh:mm:ss,mmm"
        start_time: String,

        /// Author-assigned index of the cue anchoring the new end time
        end_index: u32,

        /// New start time for that cue, as "hh:mm:ss,mmm"
        end_time: String,

        /// The file to re-sync (overwritten; a backup is kept beside it)
        file: PathBuf,
    },

    /// Clean up a subrip (.srt) file: re-index it and rewrite it in UTF-8
    CleanupSubs {
        /// The file to clean up (overwritten; a backup is kept beside it)
        file: PathBuf,
    },
}
