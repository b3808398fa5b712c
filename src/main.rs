//! archivist - command-line utilities for organizing movie/TV show
//! libraries: re-tag MP4s from TMDB/TVDB, fetch subtitles, maintain SRT
//! files and standardize containers with ffmpeg.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use archivist::cli::{Args, Commands};
use archivist::config::{Resolver, APIKEYS_SECTION, SUBTITLES_SECTION};
use archivist::convert;
use archivist::error::ArchivistError;
use archivist::ffmpeg;
use archivist::guess::{guess, Guess};
use archivist::lang::Language;
use archivist::metadata::tmdb::TmdbClient;
use archivist::metadata::tvdb::TvdbClient;
use archivist::probe::{self, StreamKind};
use archivist::srt;
use archivist::subtitles;
use archivist::tag;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    match args.command {
        Commands::RetagMovie { file, query, apikey, basename_only } => {
            retag_movie(&file, query, apikey, basename_only).await
        }
        Commands::RetagTvshow { file, name, season, episode, apikey, basename_only, dry_run } => {
            retag_tvshow(&file, name, season, episode, apikey, basename_only, dry_run).await
        }
        Commands::Getsubs { file, languages, setup, dry_run, limit } => {
            getsubs(&file, &languages, setup, dry_run, limit).await
        }
        Commands::Tomp4 {
            infile,
            outfile,
            languages,
            show,
            ios_audio,
            threads,
            dry_run,
            ignore_sstreams,
            preserve_astreams,
        } => {
            tomp4(
                &infile,
                &outfile,
                &languages,
                show,
                ios_audio,
                threads,
                dry_run,
                ignore_sstreams,
                preserve_astreams,
            )
            .await
        }
        Commands::ResyncSubs { start_index, start_time, end_index, end_time, file } => {
            resync_subs(start_index, &start_time, end_index, &end_time, &file)
        }
        Commands::CleanupSubs { file } => cleanup_subs(&file),
    }
}

/// Maps the `-v` count onto a level filter: errors only by default, then
/// warnings, informational messages and finally debug output.
fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_languages(codes: &[String]) -> Result<Vec<Language>> {
    codes
        .iter()
        .map(|c| Language::parse(c).map_err(anyhow::Error::from))
        .collect()
}

async fn retag_movie(
    file: &Path,
    query: Option<String>,
    apikey: Option<String>,
    basename_only: bool,
) -> Result<()> {
    let resolver = Resolver::standard(apikey, "TMDB_APIKEY");
    let client = TmdbClient::new(resolver.resolve(APIKEYS_SECTION, "tmdb")?);

    let movie = match query {
        Some(query) => client.movie_from_query(&query, None).await?,
        None => {
            debug!("trying to guess the movie from the filename");
            let info = guess(file, !basename_only)?;
            client.movie_from_guess(&info).await?
        }
    };

    info!("Title: {}", movie.title);
    if let Some(date) = &movie.release_date {
        info!("Release date: {date}");
    }
    info!("TMDB id: {}", movie.id);

    let artwork = client.fetch_poster(&movie).await?;
    tag::retag_movie(file, &movie, artwork.as_ref())?;
    Ok(())
}

async fn retag_tvshow(
    file: &Path,
    name: Option<String>,
    season: Option<u32>,
    episode: Option<u32>,
    apikey: Option<String>,
    basename_only: bool,
    dry_run: bool,
) -> Result<()> {
    let resolver = Resolver::standard(apikey, "TVDB_APIKEY");
    let api_key = resolver.resolve(APIKEYS_SECTION, "tvdb")?;

    // always guess, then complete with whatever came on the command line
    let (mut title, mut season_no, mut episode_no) = match guess(file, !basename_only) {
        Ok(Guess::Episode { title, season, episode, .. }) => {
            (Some(title), Some(season), Some(episode))
        }
        Ok(Guess::Movie { title, .. }) => (Some(title), None, None),
        Err(e) => {
            debug!("{e}");
            (None, None, None)
        }
    };
    if let Some(name) = name {
        title = Some(name);
    }
    if let Some(s) = season {
        season_no = Some(s);
    }
    if let Some(e) = episode {
        episode_no = Some(e);
    }
    let (Some(title), Some(season), Some(episode)) = (title, season_no, episode_no) else {
        anyhow::bail!(
            "`{}' was not guessed as a TV show episode - pass --name, --season and \
             --episode with the right information to fix this",
            file.display()
        );
    };

    let client = TvdbClient::login(&api_key).await?;
    let record = client.episode_from_query(&title, season, episode).await?;

    let probe = probe::probe(file).await?;
    let hd = probe
        .default_stream(StreamKind::Video)
        .map(|v| tag::hd_flag(v.width, v.height))
        .unwrap_or(tag::HdFlag::Sd);

    if dry_run {
        print!("{}", tag::pretty_print_episode(&record, hd));
        return Ok(());
    }

    info!("TV show name: {}", record.series_name);
    if let Some(date) = &record.first_aired {
        info!("Air date: {date}");
    }

    let artwork = match client.fetch_poster(&record).await {
        Ok(artwork) => artwork,
        Err(e) => {
            warn!("did not retrieve cover art ({e}), tagging without it");
            None
        }
    };
    tag::retag_episode(file, &record, artwork.as_ref(), hd)?;
    Ok(())
}

async fn getsubs(
    file: &Path,
    languages: &[String],
    setup: Option<String>,
    dry_run: bool,
    limit: usize,
) -> Result<()> {
    let languages = parse_languages(languages)?;

    let resolver = Resolver::standard(setup, "SUBTITLES_SETUP");
    let section = resolver.resolve_section(SUBTITLES_SECTION)?;
    let credentials = subtitles::provider_credentials(&section);
    let providers = subtitles::build_providers(&credentials);

    let query = subtitles::VideoQuery::from_path(file);
    let mut results = subtitles::search_all(&providers, &query, &languages).await?;

    if dry_run {
        println!("Subtitles for `{}'", file.display());
        print!("{}", subtitles::render_results(&results, &languages, limit));
    } else {
        let saved =
            subtitles::download_best(file, &mut results, &languages, &providers).await?;
        for path in saved {
            info!("saved `{}'", path.display());
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn tomp4(
    infile: &Path,
    outfile: &Path,
    languages: &[String],
    show: Option<String>,
    ios_audio: bool,
    threads: u32,
    dry_run: bool,
    ignore_sstreams: bool,
    preserve_astreams: bool,
) -> Result<()> {
    let languages = parse_languages(languages)?;
    let show = show.map(|s| Language::parse(&s)).transpose()?;

    let probe = probe::probe(infile).await?;
    let plan = convert::plan(
        &probe,
        &languages,
        show.as_ref(),
        ios_audio,
        preserve_astreams,
        ignore_sstreams,
    )?;

    let caps = match ffmpeg::codec_capabilities().await {
        Ok(caps) => caps,
        Err(e) => {
            warn!("{e}; assuming stock codecs");
            Default::default()
        }
    };
    let options = convert::options(infile, outfile, &plan, threads, &caps);

    if dry_run {
        println!("Stream planning:");
        print!("{}", convert::render_plan(&plan, &probe));
        println!("Options for ffmpeg:");
        println!("  {}", options.join(" "));
        return Ok(());
    }

    if outfile.exists() {
        warn!("renaming {} to {}~", outfile.display(), outfile.display());
        let mut backup = outfile.as_os_str().to_os_string();
        backup.push("~");
        let backup = PathBuf::from(backup);
        if backup.exists() {
            fs::remove_file(&backup).map_err(ArchivistError::Io)?;
        }
        fs::rename(outfile, &backup).map_err(ArchivistError::Io)?;
    }

    ffmpeg::run(&options, convert::workload(&probe)).await?;
    Ok(())
}

fn resync_subs(
    start_index: u32,
    start_time: &str,
    end_index: u32,
    end_time: &str,
    file: &Path,
) -> Result<()> {
    let start_ms = srt::parse_timestamp(start_time)?;
    let end_ms = srt::parse_timestamp(end_time)?;

    let mut subs = srt::Subtitles::load(file)?;
    subs.resync(start_index, start_ms, end_index, end_ms)?;

    srt::write_backup(file)?;
    subs.save(file)?;
    Ok(())
}

fn cleanup_subs(file: &Path) -> Result<()> {
    let mut subs = srt::Subtitles::load(file)?;
    subs.reindex();

    srt::write_backup(file)?;
    subs.save(file)?;
    Ok(())
}
