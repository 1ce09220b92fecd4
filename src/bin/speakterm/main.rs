//! Speakterm entrypoint: resolve configuration and credentials, then hand the
//! terminal to the interactive console.

mod ui;

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use speakterm::cli::Cli;
use speakterm::config::{default_config_path, ConfigStore};
use speakterm::player::AudioPlayer;
use speakterm::styles::VOICES;
use speakterm::synth::OpenAiSpeech;
use speakterm::virtual_speaker;
use speakterm::{init_logging, init_tracing, log_event, Engine};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args()?;

    if let Some(code) = virtual_speaker::maybe_install(cli.install_virtual_speaker, cli.force_virtual_speaker)
    {
        return Ok(ExitCode::from(code as u8));
    }

    if cli.list_voices {
        for voice in VOICES {
            println!("{voice}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = cli.config_path.clone().unwrap_or_else(default_config_path);
    init_logging(!cli.no_logs, !cli.no_log_content, &config_path);
    init_tracing(cli.trace);
    log_event("=== Speakterm starting ===");

    let store = ConfigStore::new(config_path);
    ensure_credential(&store)?;

    let backend = OpenAiSpeech::new(
        cli.base_url.as_deref(),
        &cli.model,
        Duration::from_secs(cli.timeout_secs),
    )?;
    let player = AudioPlayer::new();
    let mut engine = Engine::new(store, Arc::new(backend), Arc::new(player));

    ui::run_app(&mut engine)?;

    log_event("=== Speakterm exiting ===");
    println!("Goodbye!");
    Ok(ExitCode::SUCCESS)
}

/// One-time stdin prompt when no credential is persisted or in the
/// environment. Runs before the terminal enters raw mode; an entered key is
/// persisted so the prompt never repeats. Leaving it blank is allowed, the
/// session just reports the missing credential on first use.
fn ensure_credential(store: &ConfigStore) -> Result<()> {
    let (mut cfg, _) = store.load();
    let persisted = cfg.api_key.as_deref().is_some_and(|key| !key.trim().is_empty());
    let in_env = std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.trim().is_empty());
    if persisted || in_env {
        return Ok(());
    }

    println!("\nOpenAI API key not set.");
    print!("Enter your OpenAI API key (leave empty to continue without): ");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(());
    }
    let key = line.trim();
    if !key.is_empty() {
        cfg.api_key = Some(key.to_string());
        store.save(&cfg)?;
    }
    Ok(())
}
