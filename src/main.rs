use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parley_channel::{ChannelConfig, SessionChannel, WsConnector};
use parley_core::{BearerToken, SessionId};
use parley_session::{LearningSession, SessionOptions, SessionUpdate};
use parley_settings::{load_settings, load_settings_from_path, RepetitionMode};
use parley_telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};
use parley_vocab::{FallbackTranslator, TranslationService, TurnProcessor};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::{info, warn, Level};

/// Run one live learning session against a tutor endpoint.
///
/// Lines typed on stdin are sent as learner messages. `/translate <word>`,
/// `/mark <words..>`, `/miss <words..>`, `/stats` and `/log <module> <level>`
/// are handled locally.
#[derive(Parser, Debug)]
#[command(name = "parley", version)]
struct Cli {
    /// Session endpoint, overrides `channel.url`.
    #[arg(long)]
    url: Option<String>,

    /// Bearer credential for the session socket.
    #[arg(long, env = "PARLEY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Settings file (default `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Target language code.
    #[arg(long)]
    language: Option<String>,

    /// new_words, mixed or heavy_repetition.
    #[arg(long)]
    mode: Option<RepetitionMode>,

    /// Echo proposals and mastery as word_interaction frames.
    #[arg(long)]
    echo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path),
        None => load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(url) = cli.url {
        settings.channel.url = url;
    }
    if let Some(language) = cli.language {
        settings.learner.language = language;
    }
    if let Some(mode) = cli.mode {
        settings.learner.mode = mode;
    }
    if cli.echo {
        settings.session.echo_proposals = true;
    }
    settings.validate()?;

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: settings.telemetry.level.parse().unwrap_or(Level::INFO),
        module_levels: Vec::new(),
        json: settings.telemetry.json,
    });

    let config = ChannelConfig::from_settings(&settings.channel, cli.token.map(BearerToken::new));
    let channel = SessionChannel::builder(config, Arc::new(WsConnector::new()))
        .metrics(telemetry.metrics())
        .spawn();
    let translator: Arc<dyn TranslationService> =
        Arc::new(FallbackTranslator::from_settings(&settings.translation)?);
    let session = LearningSession::spawn(
        SessionId::new(),
        channel,
        TurnProcessor::from_settings(&settings),
        SessionOptions::from_settings(&settings.session, translator),
    );

    info!(
        session_id = %session.id(),
        url = %settings.channel.url,
        language = %settings.learner.language,
        "starting session"
    );
    session.connect();

    let mut updates = std::pin::pin!(session.update_stream());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(update) = updates.next() => log_update(&update),
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&session, &telemetry, line.trim()).await?,
                None => break,
            },
        }
    }

    let snapshot = session.snapshot().await?;
    info!(
        practiced = snapshot.stats.practiced,
        mastered = snapshot.stats.mastered,
        xp = snapshot.xp,
        "shutting down"
    );
    session.shutdown();
    if tokio::time::timeout(Duration::from_secs(2), session.closed()).await.is_err() {
        warn!("session did not stop in time");
    }
    Ok(())
}

async fn handle_line(
    session: &LearningSession,
    telemetry: &TelemetryGuard,
    line: &str,
) -> anyhow::Result<()> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => {}
        Some("/translate") => {
            for word in parts {
                let translation = session.translate(word).await?;
                info!(word, ?translation, "translation");
            }
        }
        Some(cmd @ ("/mark" | "/miss")) => {
            let mastered = session.mark_words(parts, cmd == "/mark").await?;
            if !mastered.is_empty() {
                info!(?mastered, "mastered");
            }
        }
        Some("/stats") => {
            let snapshot = session.snapshot().await?;
            info!(
                connection = %snapshot.connection,
                total = snapshot.stats.total,
                practiced = snapshot.stats.practiced,
                mastered = snapshot.stats.mastered,
                proposals = ?snapshot.proposals,
                "session stats"
            );
        }
        Some("/log") => match (parts.next(), parts.next().map(str::parse::<Level>)) {
            (Some(module), Some(Ok(level))) => {
                telemetry.set_module_level(module, level)?;
                info!(module, %level, "log level changed");
            }
            _ => warn!("usage: /log <module> <level>"),
        },
        Some(_) => session.send_chat(line)?,
    }
    Ok(())
}

fn log_update(update: &SessionUpdate) {
    match update {
        SessionUpdate::Proposals { words, mastered } => {
            info!(?words, ?mastered, "proposals");
        }
        SessionUpdate::Typing(typing) => info!(typing, "tutor typing"),
        SessionUpdate::Xp { gained, total } => info!(gained, total, "xp"),
        SessionUpdate::Summary(summary) => {
            info!(
                xp = summary.xp_earned,
                learned = ?summary.vocabulary_learned,
                feedback = %summary.feedback,
                "session summary"
            );
        }
        SessionUpdate::Connection(state) => info!(%state, "connection"),
    }
}
