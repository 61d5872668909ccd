use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nextspot_core::{
    AppSettings, AttachmentEncoder, ConfigOutcome, ConfigPatch, GeminiClient, ModelTier, Persona,
    SendOutcome, SessionController, SessionEvent, SettingsJsonRepository, SettingsRepository,
    TacticalPhase,
};

mod commands;
mod input;
mod render;

use commands::Command;
use input::{Input, LineReader};
use render::ReplyPrinter;

const UPGRADE_HINT: &str =
    "The advanced model and premium presets need a subscription. Run /upgrade or /model fast.";

#[derive(Parser)]
#[command(name = "nextspot")]
#[command(about = "Streaming security research assistant for the terminal", long_about = None)]
struct Cli {
    /// Settings file (defaults to <config dir>/nextspot/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model tier: fast or advanced
    #[arg(long)]
    model: Option<ModelTier>,

    #[arg(long)]
    persona: Option<Persona>,

    #[arg(long)]
    phase: Option<TacticalPhase>,

    /// Enable search grounding
    #[arg(long)]
    search: bool,

    /// Log filter, e.g. `debug` or `nextspot_core=trace` (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let repository = match &cli.config {
        Some(path) => SettingsJsonRepository::with_path(path),
        None => SettingsJsonRepository::new().context("Failed to locate settings file")?,
    };
    let stored = repository
        .load()
        .await
        .with_context(|| format!("Failed to load settings from {}", repository.storage_path()))?;
    let mut settings = stored.clone();

    if let Some(model) = cli.model {
        settings.session.model = model;
    }
    if let Some(persona) = cli.persona {
        settings.session.persona = persona;
    }
    if let Some(phase) = cli.phase {
        settings.session.phase = phase;
    }
    if cli.search {
        settings.session.use_search = true;
    }

    let api_key = settings
        .api_key()
        .with_context(|| format!("Set {} to your Gemini API key", settings.api_key_env))?;

    let client = GeminiClient::new(api_key, settings.models.clone())
        .with_base_url(settings.base_url.clone());
    let controller = SessionController::new(Arc::new(client), settings.session.clone())
        .with_encoder(AttachmentEncoder::new(settings.attachments.clone()))
        .with_presets(settings.presets.clone())
        .with_chunk_timeout(settings.chunk_timeout());

    info!(
        settings = %repository.storage_path(),
        model = %settings.session.model,
        persona = %settings.session.persona,
        phase = %settings.session.phase,
        "Starting NextSpot session"
    );

    let saved = SavedSettings {
        repository,
        settings: stored,
    };
    Repl::new(controller, saved, LineReader::spawn()?).run().await
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'"))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Settings as loaded from disk, before command-line overrides
struct SavedSettings {
    repository: SettingsJsonRepository,
    settings: AppSettings,
}

impl SavedSettings {
    /// Store the persona, phase and search choices for the next start.
    /// The model tier stays as configured since the subscription is not stored.
    async fn remember(&mut self, controller: &SessionController) {
        let config = controller.config();
        let session = &mut self.settings.session;
        if session.persona == config.persona
            && session.phase == config.phase
            && session.use_search == config.use_search
        {
            return;
        }
        session.persona = config.persona;
        session.phase = config.phase;
        session.use_search = config.use_search;

        if let Err(e) = self.repository.save(self.settings.clone()).await {
            warn!(
                error = %e,
                path = %self.repository.storage_path(),
                "Failed to save settings"
            );
        }
    }
}

struct Repl {
    controller: SessionController,
    events: broadcast::Receiver<SessionEvent>,
    saved: SavedSettings,
    reader: LineReader,
    printer: ReplyPrinter,
}

impl Repl {
    fn new(controller: SessionController, saved: SavedSettings, reader: LineReader) -> Self {
        let events = controller.subscribe();
        Self {
            controller,
            events,
            saved,
            reader,
            printer: ReplyPrinter::default(),
        }
    }

    async fn run(mut self) -> Result<()> {
        println!(
            "{} {}",
            "NextSpot ready.".bold(),
            "Type /help for commands.".dark_grey()
        );

        loop {
            let line = match self.reader.read_line("> ").await? {
                Input::Line(line) => line,
                Input::Interrupted => {
                    println!("{}", "Ctrl-C. Type /quit or press Ctrl-D to exit.".yellow());
                    continue;
                }
                Input::Eof => break,
            };

            match commands::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command).await?,
                Err(message) => println!("{}", message.red()),
            }
        }

        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        let controller = self.controller.clone();

        match command {
            Command::Send(text) => {
                controller.set_draft(text);
                self.drive(async move { controller.send_message(None).await })
                    .await?;
            }
            Command::Preset(id) => {
                self.drive(async move { controller.run_preset(&id).await })
                    .await?;
            }
            Command::Attach(paths) => {
                let report = controller.upload_files(paths).await;
                let pending = controller.snapshot().pending_attachments.len();
                println!("{} attached, {} pending", report.added, pending);
                for failure in &report.failures {
                    println!("  {}", format!("skipped {failure}").red());
                }
            }
            Command::Detach(index) => {
                if controller.remove_pending_attachment(index - 1) {
                    println!("Removed attachment {index}");
                } else {
                    println!("No pending attachment {index}");
                }
            }
            Command::Clear => {
                if self.confirm("Clear the whole conversation? [y/N] ").await? {
                    let removed = controller.clear_conversation();
                    println!("Cleared {removed} messages");
                }
            }
            Command::Model(model) => self.apply(ConfigPatch::model(model)).await,
            Command::Persona(persona) => self.apply(ConfigPatch::persona(persona)).await,
            Command::Phase(phase) => self.apply(ConfigPatch::phase(phase)).await,
            Command::Search(enabled) => self.apply(ConfigPatch::use_search(enabled)).await,
            Command::Presets => {
                let subscribed = controller.config().is_subscribed;
                print!("{}", render::format_presets(controller.presets(), subscribed));
            }
            Command::Upgrade => {
                if controller.config().is_subscribed {
                    println!("Subscription already active");
                } else if self
                    .confirm("Activate the subscription? No payment is taken. [y/N] ")
                    .await?
                {
                    let config = controller.confirm_upgrade();
                    println!(
                        "{}",
                        format!("Subscription active, model set to {}", config.model).green()
                    );
                }
            }
            Command::Status => print!("{}", render::format_status(&controller.snapshot())),
            Command::Help => println!("{}", commands::HELP),
            Command::Quit | Command::Empty => {}
        }

        Ok(())
    }

    async fn apply(&mut self, patch: ConfigPatch) {
        match self.controller.set_config(patch) {
            ConfigOutcome::Applied => {
                self.saved.remember(&self.controller).await;
                let config = self.controller.config();
                println!(
                    "model: {}, persona: {}, phase: {}, search: {}",
                    config.model,
                    config.persona,
                    config.phase,
                    if config.use_search { "on" } else { "off" }
                );
            }
            ConfigOutcome::UpgradeRequired => println!("{}", UPGRADE_HINT.yellow()),
        }
    }

    /// Run a send to completion, printing the reply as it streams.
    /// Ctrl-C drops the send, which abandons the reply.
    async fn drive(&mut self, send: impl Future<Output = SendOutcome>) -> Result<()> {
        self.drain_events(false)?;

        let mut send = Box::pin(send);
        let outcome = loop {
            tokio::select! {
                outcome = &mut send => break Some(outcome),
                event = self.events.recv() => self.on_event(event)?,
                _ = tokio::signal::ctrl_c() => break None,
            }
        };
        drop(send);
        self.drain_events(true)?;

        match outcome {
            Some(SendOutcome::Completed { .. }) | Some(SendOutcome::Failed { .. }) => {}
            Some(SendOutcome::Rejected(reason)) => {
                println!("{}", format!("Not sent: {reason}").yellow())
            }
            Some(SendOutcome::UpgradeRequired) => println!("{}", UPGRADE_HINT.yellow()),
            None => println!("{}", "[reply abandoned]".dark_yellow()),
        }
        Ok(())
    }

    fn drain_events(&mut self, render: bool) -> Result<()> {
        loop {
            match self.events.try_recv() {
                Ok(event) if render => self.on_event(Ok(event))?,
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
            }
        }
    }

    fn on_event(&mut self, event: Result<SessionEvent, RecvError>) -> Result<()> {
        let mut stdout = std::io::stdout();

        match event {
            Ok(SessionEvent::StreamStarted { reply_id, .. }) => self.printer.start(reply_id),
            Ok(SessionEvent::MessageUpdated { id }) if self.printer.is_tracking(id) => {
                if let Some(message) = self.controller.message(id) {
                    write!(stdout, "{}", self.printer.update(&message))?;
                    stdout.flush()?;
                }
            }
            Ok(SessionEvent::StreamEnded {
                reply_id, status, ..
            }) if self.printer.is_tracking(reply_id) => {
                let message = self.controller.message(reply_id);
                write!(stdout, "{}", self.printer.finish(message.as_ref(), status))?;
                stdout.flush()?;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event receiver lagged"),
            Err(RecvError::Closed) => {}
        }
        Ok(())
    }

    async fn confirm(&mut self, question: &str) -> Result<bool> {
        match self.reader.read_line(question).await? {
            Input::Line(answer) => Ok(commands::is_confirmation(&answer)),
            Input::Interrupted | Input::Eof => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nextspot_core::{ModelCatalog, SessionConfig};

    #[tokio::test]
    async fn test_session_choices_are_saved_without_model_tier() {
        let dir = tempfile::tempdir().unwrap();
        let repository = SettingsJsonRepository::with_path(dir.path().join("settings.json"));
        let mut saved = SavedSettings {
            repository: SettingsJsonRepository::with_path(dir.path().join("settings.json")),
            settings: AppSettings::default(),
        };

        let controller = SessionController::new(
            Arc::new(GeminiClient::new("test-key", ModelCatalog::default())),
            SessionConfig::default(),
        );
        controller.confirm_upgrade();
        controller.set_config(ConfigPatch {
            persona: Some(Persona::BugBounty),
            phase: Some(TacticalPhase::Lateral),
            use_search: Some(true),
            ..ConfigPatch::default()
        });

        saved.remember(&controller).await;

        let stored = repository.load().await.unwrap();
        assert_eq!(stored.session.persona, Persona::BugBounty);
        assert_eq!(stored.session.phase, TacticalPhase::Lateral);
        assert!(stored.session.use_search);
        assert_eq!(stored.session.model, ModelTier::default());
    }
}
