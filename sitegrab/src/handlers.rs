use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use sitegrab_core::{
    MirrorOptions, ReportFormat, default_output_dir, execute_mirror, render_report,
    validate_seed,
};
use sitegrab_engine::MirrorSummary;
use sitegrab_engine::fetch::DEFAULT_USER_AGENT;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use url::Url;

pub const DEFAULT_DELAY_SECS: f64 = 1.0;

/// How a download invocation ended. Maps to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed,
    /// The user declined to overwrite the output directory.
    Cancelled,
    Interrupted,
}

impl DownloadOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            DownloadOutcome::Completed | DownloadOutcome::Cancelled => 0,
            DownloadOutcome::Interrupted => 1,
        }
    }
}

/// URL, output directory and delay for one download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub url: Url,
    pub output_dir: PathBuf,
    pub delay: f64,
}

// Helper functions for the download handler

/// clap value parser for `--delay`
pub fn parse_delay_arg(s: &str) -> Result<f64, String> {
    let delay: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", s))?;
    if !delay.is_finite() || delay < 0.0 {
        return Err(format!("delay must be zero or more seconds, got '{}'", s));
    }
    if Duration::try_from_secs_f64(delay).is_err() {
        return Err(format!("delay '{}' is too large", s));
    }
    Ok(delay)
}

/// Parse an interactively entered delay; empty or invalid input gives the default.
pub fn parse_delay(input: &str) -> f64 {
    let input = input.trim();
    if input.is_empty() {
        return DEFAULT_DELAY_SECS;
    }
    parse_delay_arg(input).unwrap_or_else(|_| {
        println!(
            "{} Invalid delay value, using default: {} seconds",
            "⚠".yellow().bold(),
            DEFAULT_DELAY_SECS
        );
        DEFAULT_DELAY_SECS
    })
}

pub fn is_affirmative(response: &str) -> bool {
    matches!(response.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Use the given directory (with `~` expanded) or derive one from the URL's host
pub fn resolve_output_dir(explicit: Option<&str>, url: &Url) -> PathBuf {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(dir) => PathBuf::from(shellexpand::tilde(dir).as_ref()),
        None => PathBuf::from(default_output_dir(url)),
    }
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, msg: &str) -> io::Result<String> {
    write!(out, "{} ", msg.bright_cyan().bold())?;
    out.flush()?;
    let mut response = String::new();
    if input.read_line(&mut response)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed while waiting for an answer",
        ));
    }
    Ok(response.trim().to_string())
}

/// Ask for the URL until a valid one is entered
pub fn prompt_url<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Url> {
    loop {
        let response = print_prompt(input, out, "Enter the website URL to download:")?;
        if response.is_empty() {
            writeln!(out, "{} Please enter a valid URL.", "✗".red().bold())?;
            continue;
        }
        match validate_seed(&response) {
            Ok(url) => return Ok(url),
            Err(_) => writeln!(
                out,
                "{} Invalid URL format. Please enter a valid URL (e.g., https://example.com)",
                "✗".red().bold()
            )?,
        }
    }
}

/// Prompt for URL, output directory and delay
pub fn prompt_settings<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
) -> io::Result<DownloadSettings> {
    let url = prompt_url(input, out)?;

    let default_output = default_output_dir(&url);
    let output = print_prompt(
        input,
        out,
        &format!("Output directory (default: {}):", default_output),
    )?;
    let output_dir = resolve_output_dir(Some(&output), &url);

    let delay = print_prompt(
        input,
        out,
        &format!(
            "Delay between requests in seconds (default: {}):",
            DEFAULT_DELAY_SECS
        ),
    )?;

    Ok(DownloadSettings {
        url,
        output_dir,
        delay: parse_delay(&delay),
    })
}

/// Ask before replacing an existing output directory. Returns false when declined.
pub fn confirm_overwrite<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    output_dir: &Path,
) -> io::Result<bool> {
    writeln!(out, "{}", "⚠ WARNING".yellow().bold())?;
    writeln!(
        out,
        "Output directory already exists: {}",
        output_dir.display().to_string().bright_white()
    )?;
    let response = print_prompt(input, out, "Overwrite? [y/N]:")?;
    Ok(is_affirmative(&response))
}

fn print_settings(settings: &DownloadSettings) {
    println!();
    print_divider();
    println!("{}", "  DOWNLOAD SETTINGS".bright_white().bold());
    print_divider();
    println!("{} URL: {}", "→".blue(), settings.url.as_str().bright_white());
    println!(
        "{} Output directory: {}",
        "→".blue(),
        settings.output_dir.display().to_string().bright_white()
    );
    println!(
        "{} Delay between requests: {} seconds",
        "→".blue(),
        settings.delay.to_string().cyan()
    );
    println!();
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when called more than once
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub async fn handle_download(sub_matches: &ArgMatches) -> anyhow::Result<DownloadOutcome> {
    init_tracing();

    let interactive = sub_matches.get_flag("interactive");
    let url_arg = sub_matches.get_one::<String>("URL");
    let json = sub_matches.get_flag("json");

    let settings = if interactive || url_arg.is_none() {
        print_divider();
        println!("{}", "  SITEGRAB INTERACTIVE MODE".bright_white().bold());
        print_divider();
        println!("This tool creates a complete static copy of a website.");
        println!();

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut out = io::stdout();
        prompt_settings(&mut input, &mut out).context("Failed to read interactive input")?
    } else {
        let raw = url_arg.map(String::as_str).unwrap_or_default();
        let url = match validate_seed(raw) {
            Ok(url) => url,
            Err(_) => bail!("Invalid URL '{}'", raw),
        };
        let output_dir =
            resolve_output_dir(sub_matches.get_one::<String>("OUTPUT_DIR").map(String::as_str), &url);
        let delay = *sub_matches
            .get_one::<f64>("delay")
            .unwrap_or(&DEFAULT_DELAY_SECS);
        DownloadSettings {
            url,
            output_dir,
            delay,
        }
    };

    if !json {
        print_settings(&settings);
    }

    if settings.output_dir.exists() {
        let confirmed = sub_matches.get_flag("yes") || {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut out = io::stdout();
            confirm_overwrite(&mut input, &mut out, &settings.output_dir)
                .context("Failed to read confirmation")?
        };
        if !confirmed {
            println!("{} Download cancelled.", "✗".red().bold());
            return Ok(DownloadOutcome::Cancelled);
        }
        fs::remove_dir_all(&settings.output_dir).with_context(|| {
            format!(
                "Failed to remove existing directory {}",
                settings.output_dir.display()
            )
        })?;
        info!(output_dir = %settings.output_dir.display(), "removed existing output directory");
        println!("{} Existing directory removed", "✓".green().bold());
    }

    let mut options = MirrorOptions::new(settings.url.clone(), settings.output_dir.clone());
    options.delay = Duration::try_from_secs_f64(settings.delay)
        .with_context(|| format!("Invalid delay of {} seconds", settings.delay))?;
    options.timeout_secs = *sub_matches.get_one::<u64>("timeout").unwrap_or(&30);
    options.user_agent = sub_matches
        .get_one::<String>("user-agent")
        .cloned()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
    options.respect_robots = !sub_matches.get_flag("ignore-robots");
    options.max_pages = sub_matches.get_one::<usize>("max-pages").copied();
    options.show_progress = !json;
    debug!(
        url = %options.url,
        delay = ?options.delay,
        timeout_secs = options.timeout_secs,
        respect_robots = options.respect_robots,
        max_pages = ?options.max_pages,
        "starting mirror"
    );

    if !json {
        println!("{} Starting download...", "→".blue());
    }
    let summary = execute_mirror(options, None).await?;

    let format = if json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    let outcome = print_outcome(
        &mut io::stdout(),
        &mut io::stderr(),
        &summary,
        &settings.output_dir,
        format,
    )?;
    Ok(outcome)
}

/// File to open first: where the seed page was saved, or `index.html` when
/// no page was saved.
pub fn entry_point(summary: &MirrorSummary, output_dir: &Path) -> PathBuf {
    summary
        .pages
        .first()
        .and_then(|page| page.local_path.clone())
        .unwrap_or_else(|| output_dir.join("index.html"))
}

/// Write the report to `out` and status notes to `err`.
///
/// JSON output carries only the summary document, so `out` stays parseable.
pub fn print_outcome<W: Write, E: Write>(
    out: &mut W,
    err: &mut E,
    summary: &MirrorSummary,
    output_dir: &Path,
    format: ReportFormat,
) -> anyhow::Result<DownloadOutcome> {
    let report = render_report(summary, output_dir, format).map_err(anyhow::Error::msg)?;
    writeln!(out, "{}", report)?;

    if summary.interrupted {
        writeln!(err, "{} Download interrupted by user.", "✗".red().bold())?;
        return Ok(DownloadOutcome::Interrupted);
    }

    if format == ReportFormat::Text {
        let divider = "═".repeat(60).bright_blue().bold();
        writeln!(out, "{}", divider)?;
        writeln!(out, "{}", "  DOWNLOAD COMPLETE".green().bold())?;
        writeln!(out, "{}", divider)?;
        writeln!(
            out,
            "{} Static copy saved to: {}",
            "✓".green().bold(),
            output_dir.display().to_string().bright_white()
        )?;
        writeln!(
            out,
            "{} Open {} in your browser to view the site",
            "ℹ".blue(),
            entry_point(summary, output_dir)
                .display()
                .to_string()
                .bright_white()
        )?;
    }

    Ok(DownloadOutcome::Completed)
}
