use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use nu_ansi_term::{Color, Style as AnsiStyle};

use skypelog::{find_log_files, format_message, load_chat_log, ChatMessage, TimeDisplay};

const ACCENT_COLOR: Color = Color::Rgb(188, 205, 238);
const EDGE_COLOR: Color = Color::Rgb(217, 182, 203);
const DIM_COLOR: Color = Color::Rgb(125, 132, 140);
const DOT_ACTIVE_COLOR: Color = Color::Rgb(188, 205, 238);
const DOT_INACTIVE_COLOR: Color = Color::Rgb(90, 94, 104);
const PROGRESS_FRAMES: [&str; 6] = ["●○○○○○", "●●○○○○", "●●●○○○", "●●●●○○", "●●●●●○", "●●●●●●"];

const USAGE: &str = "Usage: skypelog [--json] [--utc] <path-to-profile>";

fn accent_style() -> AnsiStyle {
    AnsiStyle::new().fg(ACCENT_COLOR)
}

fn dim_style() -> AnsiStyle {
    AnsiStyle::new().fg(DIM_COLOR)
}

fn edge_style() -> AnsiStyle {
    AnsiStyle::new().fg(EDGE_COLOR)
}

fn accent(text: &str) -> String {
    accent_style().paint(text).to_string()
}

fn dim(text: &str) -> String {
    dim_style().paint(text).to_string()
}

fn edge(text: &str) -> String {
    edge_style().paint(text).to_string()
}

fn accent_bullet() -> String {
    edge_style().paint("⋆").to_string()
}

fn style_frame(frame: &str) -> String {
    frame
        .chars()
        .map(|ch| match ch {
            '●' => AnsiStyle::new()
                .fg(DOT_ACTIVE_COLOR)
                .bold()
                .paint("●")
                .to_string(),
            '○' => AnsiStyle::new()
                .fg(DOT_INACTIVE_COLOR)
                .paint("○")
                .to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("")
}

// All styled status output goes to stderr so the record stream on stdout
// stays clean for piping.
fn print_banner(profile: &Path) {
    eprintln!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
    eprintln!("{} {}", accent_bullet(), accent("skypelog is warming up"));
    eprintln!(
        "{} {}",
        accent_bullet(),
        dim(&format!("profile {}", profile.display()))
    );
    eprintln!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
}

fn with_progress<F, T>(label: &str, action: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let running = Arc::new(AtomicBool::new(true));
    let spinner_running = Arc::clone(&running);
    let display_label = format!("{} {}", accent_bullet(), accent(&format!("{}...", label)));
    let spinner_label = display_label.clone();

    let handle = thread::spawn(move || {
        let mut index = 0usize;
        while spinner_running.load(Ordering::Relaxed) {
            let frame = PROGRESS_FRAMES[index % PROGRESS_FRAMES.len()];
            let styled = style_frame(frame);
            eprint!("\r{} {}", spinner_label, styled);
            let _ = io::stderr().flush();
            index += 1;
            thread::sleep(Duration::from_millis(110));
        }
    });

    let result = action();

    running.store(false, Ordering::Relaxed);
    let _ = handle.join();
    let final_frame = style_frame(PROGRESS_FRAMES.last().copied().unwrap_or("●●●●●●"));
    eprint!("\r{} {}\n", display_label, final_frame);
    io::stderr().flush()?;

    result
}

fn main() -> Result<()> {
    let mut json = false;
    let mut display = TimeDisplay::Local;
    let mut profile: Option<PathBuf> = None;

    let mut args = env::args_os();
    let _ = args.next(); // executable name

    for arg in args {
        if arg == "--json" {
            json = true;
        } else if arg == "--utc" {
            display = TimeDisplay::Utc;
        } else if arg.to_string_lossy().starts_with("--") {
            eprintln!("Unknown option `{}`.", arg.to_string_lossy());
            eprintln!("{USAGE}");
            std::process::exit(64);
        } else if profile.is_some() {
            eprintln!("Only one profile path is expected.");
            std::process::exit(64);
        } else {
            profile = Some(PathBuf::from(arg));
        }
    }

    let Some(profile) = profile else {
        eprintln!("{USAGE}");
        std::process::exit(64);
    };

    if !profile.exists() {
        eprintln!("The provided path `{}` does not exist.", profile.display());
        std::process::exit(66);
    }

    if !profile.is_dir() {
        eprintln!(
            "The provided path `{}` is not a directory.",
            profile.display()
        );
        std::process::exit(66);
    }

    if let Err(err) = run(&profile, json, display) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(profile: &Path, json: bool, display: TimeDisplay) -> Result<()> {
    print_banner(profile);

    let files = with_progress("scanning profile", || find_log_files(profile))?;
    eprintln!(
        "{} {}",
        accent_bullet(),
        dim(&format!("{} log file(s) found", files.len()))
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut exported: Vec<ChatMessage> = Vec::new();
    let mut total_messages = 0usize;
    let mut stopped_files = 0usize;

    for path in &files {
        let log = match load_chat_log(path) {
            Ok(log) => log,
            Err(err) => {
                eprintln!(
                    "{} {}",
                    accent_bullet(),
                    dim(&format!("skipping `{}`: {err}", path.display()))
                );
                continue;
            }
        };

        if json {
            exported.extend(log.messages.iter().cloned());
        } else {
            for message in &log.messages {
                writeln!(out, "{}", format_message(message, display))?;
            }
        }
        total_messages += log.messages.len();

        if log.extra_member_lists > 0 {
            eprintln!(
                "{} {}",
                accent_bullet(),
                dim(&format!(
                    "`{}`: {} recipient list(s) carry extra member separators",
                    path.display(),
                    log.extra_member_lists
                ))
            );
        }
        if let Some(err) = log.error {
            stopped_files += 1;
            eprintln!(
                "{} {}",
                accent_bullet(),
                dim(&format!("`{}`: decoding stopped: {err}", path.display()))
            );
        }
    }

    if json {
        let rendered =
            serde_json::to_string_pretty(&exported).context("serialising messages to JSON")?;
        writeln!(out, "{rendered}")?;
    }
    out.flush()?;

    eprintln!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
    let summary = if stopped_files > 0 {
        format!(
            "{} message(s) from {} file(s), {} stopped early",
            total_messages,
            files.len(),
            stopped_files
        )
    } else {
        format!("{} message(s) from {} file(s)", total_messages, files.len())
    };
    eprintln!("{}", dim(&summary));
    eprintln!("{}", edge("~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~ ~"));
    Ok(())
}
