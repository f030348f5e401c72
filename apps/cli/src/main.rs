use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Result, bail};
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use shortsmith_core::{
    CaptionStyle, ChatCompletionsClient, ConfigOverrides, GenerationConfig, HighlightSelector,
    Provider, RunDir, Selection, SelectorOptions, align_captions, compose_captions,
    crop_to_vertical, download_video, ensure_model, extract_audio, find_video_in_cache,
    format_window_readable, get_audio_path, get_cache_dir, get_root_cache_dir,
    get_transcript_path, load_transcript, local_source, mux_audio_video, probe_duration,
    transcribe_audio, trim_video,
};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    #[value(name = "openrouter")]
    OpenRouter,
    Openai,
    Grok,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::OpenRouter => Provider::OpenRouter,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "shortsmith")]
#[command(
    about = "Turn a long video into a vertical highlight short with burned-in subtitles"
)]
struct Cli {
    /// Video URL or local video file. Asked for interactively when omitted.
    input: Option<String>,

    /// AI provider used to pick the highlight
    #[arg(short, long, default_value = "openrouter")]
    provider: CliProvider,

    /// Chat-completions endpoint, overriding the provider default
    #[arg(long)]
    endpoint: Option<String>,

    /// Model identifier, overriding the provider default
    #[arg(short, long)]
    model: Option<String>,

    /// API key, overriding the provider's environment variable
    #[arg(long, env = "SHORTSMITH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Sampling temperature for the highlight request
    #[arg(long)]
    temperature: Option<f32>,

    /// Where to write the finished short
    #[arg(short, long, default_value = "Final.mp4")]
    output: PathBuf,

    /// Upper bound on highlight requests when the model keeps returning a zero-length span
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Retry zero-length highlights without asking
    #[arg(short, long)]
    yes: bool,

    /// Fail when the model leaves out the start or end time instead of assuming 0
    #[arg(long)]
    strict: bool,

    /// Force re-processing even if cached files exist
    #[arg(short, long)]
    force: bool,

    /// Keep the intermediate clips of this run
    #[arg(long)]
    keep_work: bool,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn done(msg: impl std::fmt::Display, started: Instant) -> String {
    format!(
        "{} {} {}",
        style("✓").green().bold(),
        msg,
        style(format!("[{}]", format_duration(started.elapsed()))).dim()
    )
}

fn cached(msg: impl std::fmt::Display) {
    println!(
        "{} {} {}",
        style("✓").green().bold(),
        msg,
        style("(cached)").dim()
    );
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
    std::process::exit(1);
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = format!("shortsmith={0},shortsmith_core={0}", default_level);
        EnvFilter::new(directives)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

fn prompt_for_input() -> Result<String> {
    let line: String = Input::new()
        .with_prompt("Enter YouTube video URL or local video file path")
        .interact_text()?;
    clean_input(&line)
}

fn clean_input(line: &str) -> Result<String> {
    let input = line.trim().trim_matches(['"', '\'']).trim();
    if input.is_empty() {
        bail!("no video given");
    }
    Ok(input.to_string())
}

async fn acquire_video(input: &str, cache_dir: &Path, force: bool) -> Result<PathBuf> {
    if let Some(path) = local_source(input) {
        println!(
            "{} Using local video: {}",
            style("✓").green().bold(),
            style(path.display()).dim()
        );
        return Ok(path);
    }

    if !force && let Some(cached_video) = find_video_in_cache(cache_dir) {
        cached("Downloaded");
        return Ok(cached_video);
    }

    let step_start = Instant::now();
    let spinner = create_spinner("Downloading video...");
    let video = download_video(input, cache_dir).await?;
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    spinner.finish_with_message(done(format!("Downloaded: {}", style(name).dim()), step_start));
    Ok(video)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose < 2 {
        unsafe {
            whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
        }
    }

    // Validate generation settings before any work starts
    let provider: Provider = cli.provider.into();
    let overrides = ConfigOverrides {
        endpoint: cli.endpoint,
        model: cli.model,
        api_key: cli.api_key,
        temperature: cli.temperature,
    };
    let config = match GenerationConfig::resolve(&provider, overrides) {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    let input = match cli.input {
        Some(input) => input,
        None => prompt_for_input()?,
    };

    let root_cache_dir = get_root_cache_dir();
    let cache_dir = get_cache_dir(&input);
    fs::create_dir_all(&cache_dir).await?;

    println!(
        "\n{}  {}\n",
        style("shortsmith").cyan().bold(),
        style("Highlight Shorts").dim()
    );

    println!("{} Checking model...", style("✓").green().bold());
    let model_path = ensure_model(&root_cache_dir).await?;

    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();

    // Step 1: Acquire the source video
    let video_file = acquire_video(&input, &cache_dir, cli.force).await?;

    // Step 2: Extract audio (check cache)
    let step_start = Instant::now();
    let audio_file = get_audio_path(&cache_dir);
    if !cli.force && audio_file.exists() {
        cached("Audio extracted");
    } else {
        let spinner = create_spinner("Extracting audio...");
        extract_audio(&video_file, &audio_file).await?;
        spinner.finish_with_message(done("Audio extracted", step_start));
    }

    // Step 3: Transcribe (check cache)
    let step_start = Instant::now();
    let transcript_path = get_transcript_path(&cache_dir);
    let transcript = if !cli.force && transcript_path.exists() {
        let transcript = load_transcript(&transcript_path).await?;
        cached(format!(
            "Transcribed: {} segments, {}",
            transcript.segments.len(),
            style(&transcript.language).yellow()
        ));
        transcript
    } else {
        let spinner = create_spinner("Transcribing with Whisper...");
        let transcript = transcribe_audio(&audio_file, &transcript_path, &model_path).await?;
        spinner.finish_with_message(done(
            format!(
                "Transcribed: {} segments, {:.1} min, {}",
                transcript.segments.len(),
                transcript.duration() / 60.0,
                style(&transcript.language).yellow()
            ),
            step_start
        ));
        transcript
    };

    if transcript.is_empty() {
        fail("No transcriptions found");
    }

    // Step 4: Pick the highlight
    let step_start = Instant::now();
    let selector = HighlightSelector::with_options(
        ChatCompletionsClient::new(config),
        SelectorOptions {
            strict_fields: cli.strict,
        },
    );
    let spinner = create_spinner(&format!("Selecting highlight with {}...", provider.name()));
    let auto_retry = cli.yes;
    let confirm = |attempt: u32| {
        if auto_retry {
            return true;
        }
        spinner.suspend(|| {
            Confirm::new()
                .with_prompt(format!(
                    "Model returned a zero-length highlight (attempt {attempt}). Get highlights again?"
                ))
                .default(true)
                .interact()
                .unwrap_or(false)
        })
    };

    let window = match selector
        .select_with_retry(&transcript, cli.max_attempts, confirm)
        .await
    {
        Ok(Selection::Window(window)) => {
            spinner.finish_with_message(done(
                format!("Highlight selected ({})", provider.name()),
                step_start,
            ));
            window
        }
        Ok(Selection::Degenerate { at, .. }) => {
            spinner.finish_and_clear();
            fail(format!("Error in getting highlight: zero-length window at {at}s"));
        }
        Err(e) => {
            spinner.finish_and_clear();
            fail(e);
        }
    };

    println!("\n{}\n", format_window_readable(&window));

    let run_dir = RunDir::new(&cache_dir);
    fs::create_dir_all(run_dir.root()).await?;

    // Step 5: Cut the highlight out of the source
    let step_start = Instant::now();
    let spinner = create_spinner("Extracting clip from original video...");
    let clip = run_dir.clip_path();
    trim_video(&video_file, window.start, window.end, &clip).await?;
    spinner.finish_with_message(done("Clip extracted", step_start));

    // Step 6: Reframe to 9:16
    let step_start = Instant::now();
    let spinner = create_spinner("Cropping to vertical format (9:16)...");
    let vertical = run_dir.vertical_path();
    crop_to_vertical(&clip, &vertical).await?;
    spinner.finish_with_message(done("Cropped to vertical", step_start));

    // Step 7: Subtitles, re-timed onto the clip
    let step_start = Instant::now();
    let spinner = create_spinner("Adding subtitles...");
    let clip_duration = match probe_duration(&vertical).await {
        Ok(duration) => duration,
        Err(e) => {
            warn!(error = %e, "falling back to the selected window length");
            window.duration()
        }
    };
    let captions = align_captions(&transcript.segments, clip_duration, window.start);
    let captioned = compose_captions(
        &vertical,
        &captions,
        &run_dir.captions_path(),
        &run_dir.captioned_path(),
        &CaptionStyle::default(),
    )
    .await?;
    let caption_msg = if captions.is_empty() {
        "No subtitles for this segment".to_string()
    } else {
        format!("Subtitles added: {} segments", captions.len())
    };
    spinner.finish_with_message(done(caption_msg, step_start));

    // Step 8: Put the original sound back
    let step_start = Instant::now();
    let spinner = create_spinner("Adding audio to final video...");
    mux_audio_video(&clip, &captioned, &cli.output).await?;
    spinner.finish_with_message(done("Audio attached", step_start));

    if cli.keep_work {
        println!(
            "{} {}",
            style("Work files:").dim(),
            style(run_dir.root().display()).cyan()
        );
    } else if let Err(e) = fs::remove_dir_all(run_dir.root()).await {
        warn!(path = %run_dir.root().display(), error = %e, "failed to clean up run dir");
    }

    println!(
        "\n{} {}",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!("{}", style("─".repeat(60)).dim());
    println!(
        "{} {} is ready!\n",
        style("✓").green().bold(),
        style(cli.output.display()).cyan().bold()
    );

    Ok(())
}
