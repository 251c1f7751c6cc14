use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use corner_coach::audio::{AudioCapture, AudioSink, NullSink};
use corner_coach::checkin::CheckinRecorder;
use corner_coach::coach::MistralCoach;
use corner_coach::config::CoachConfig;
use corner_coach::drills::{Difficulty, Stance};
use corner_coach::keys::{check_elevenlabs_key, check_mistral_key};
use corner_coach::records::SessionRecorder;
use corner_coach::session::{
    Phase, SessionDriver, SessionEvent, SessionHandle, SessionOrchestrator, SessionServices,
    StyleProfile,
};
use corner_coach::speech::{
    CommandSpeech, ElevenLabsSynthesizer, MistralTranscriber, SpeechSynthesizer, VoiceAnnouncer,
};
use corner_coach::vision::{FileFrameSource, FormAnalysisPoller, MistralVision};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "corner-coach")]
#[command(about = "Voice-coached boxing rounds in the terminal", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a training session
    Run {
        #[arg(long)]
        difficulty: Option<Difficulty>,

        #[arg(long)]
        style: Option<StyleProfile>,

        #[arg(long)]
        stance: Option<Stance>,

        /// Snapshot file kept up to date by a camera, enables form analysis
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Listen for check-ins automatically during rounds
        #[arg(long)]
        auto_listen: bool,

        /// Do not open audio devices
        #[arg(long)]
        quiet: bool,
    },
    /// Validate the configured API keys
    CheckKeys,
    /// List saved sessions
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the last finished session once
    Last,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corner_coach=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CoachConfig::load_from(path)?.with_env_overrides(),
        None => CoachConfig::load()?,
    };

    match cli.command.unwrap_or(Command::Run {
        difficulty: None,
        style: None,
        stance: None,
        frames: None,
        auto_listen: false,
        quiet: false,
    }) {
        Command::Run {
            difficulty,
            style,
            stance,
            frames,
            auto_listen,
            quiet,
        } => {
            let mut config = config;
            if let Some(difficulty) = difficulty {
                config = config.with_difficulty(difficulty);
            }
            if let Some(style) = style {
                config = config.with_style(style);
            }
            if let Some(stance) = stance {
                config.stance = stance;
            }
            config.checkin.auto_listen |= auto_listen;
            run_session(config, frames, quiet).await
        }
        Command::CheckKeys => check_keys(&config).await,
        Command::History { limit } => show_history(&config, limit),
        Command::Last => show_last(&config),
    }
}

async fn run_session(config: CoachConfig, frames: Option<PathBuf>, quiet: bool) -> Result<()> {
    config.validate()?;
    info!(
        "Starting {} session, {} style",
        config.difficulty,
        config.style.label()
    );

    let services = build_services(&config, frames, quiet);
    let (handle, task) = SessionDriver::spawn(
        SessionOrchestrator::new(config.difficulty, config.style),
        services,
    );

    spawn_keyboard(handle.clone());
    print_help();
    handle.start()?;

    let events = handle.event_receiver();
    let viewer = handle.clone();
    let printer = thread::spawn(move || {
        for event in events.iter() {
            if !print_event(&event, &viewer) {
                break;
            }
        }
    });

    task.await.context("Session driver panicked")?;
    let _ = printer.join();
    Ok(())
}

fn build_services(config: &CoachConfig, frames: Option<PathBuf>, quiet: bool) -> SessionServices {
    let sink = open_sink(quiet);

    let remote: Option<Arc<dyn SpeechSynthesizer>> =
        match ElevenLabsSynthesizer::from_config(&config.speech) {
            Ok(synth) => Some(Arc::new(synth)),
            Err(e) => {
                info!("Remote voice disabled: {}", e);
                None
            }
        };
    let announcer = VoiceAnnouncer::new(
        remote,
        Arc::new(CommandSpeech::from_config(&config.speech)),
        Arc::clone(&sink),
    )
    .configured(&config.speech);

    let poller = frames.and_then(|path| match MistralVision::from_config(&config.mistral) {
        Ok(vision) => Some(FormAnalysisPoller::new(
            Arc::new(FileFrameSource::new(path)),
            Arc::new(vision),
            config.timing.analysis_timeout(),
        )),
        Err(e) => {
            warn!("Form analysis disabled: {}", e);
            None
        }
    });

    let checkin = open_microphone(quiet).and_then(|capture| {
        let transcriber = MistralTranscriber::from_config(&config.mistral);
        let coach = MistralCoach::from_config(&config.mistral);
        match (transcriber, coach) {
            (Ok(transcriber), Ok(coach)) => Some(CheckinRecorder::new(
                capture,
                Arc::new(transcriber),
                Arc::new(coach),
                announcer.clone(),
                config.checkin.clone(),
            )),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Voice check-ins disabled: {}", e);
                None
            }
        }
    });

    SessionServices {
        sink,
        announcer,
        poller,
        checkin,
        recorder: SessionRecorder::from_config(&config.storage),
        stance: config.stance,
        timing: config.timing.clone(),
    }
}

#[cfg(feature = "audio-io")]
fn open_sink(quiet: bool) -> Arc<dyn AudioSink> {
    if quiet {
        return Arc::new(NullSink);
    }
    match corner_coach::audio::SpeakerSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!("No speaker, running silent: {}", e);
            Arc::new(NullSink)
        }
    }
}

#[cfg(not(feature = "audio-io"))]
fn open_sink(_quiet: bool) -> Arc<dyn AudioSink> {
    Arc::new(NullSink)
}

#[cfg(feature = "audio-io")]
fn open_microphone(quiet: bool) -> Option<Arc<dyn AudioCapture>> {
    if quiet {
        None
    } else {
        Some(Arc::new(corner_coach::audio::MicrophoneCapture::new()))
    }
}

#[cfg(not(feature = "audio-io"))]
fn open_microphone(_quiet: bool) -> Option<Arc<dyn AudioCapture>> {
    None
}

fn print_help() {
    println!("Keys: [enter] next round   p pause/resume   s skip   c check-in   e end   r restart   q quit");
}

/// Map terminal lines to session commands
fn spawn_keyboard(handle: SessionHandle) {
    thread::spawn(move || {
        let mut checkin_open = false;
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let result = match line.trim() {
                "" => handle.acknowledge_checklist(),
                "p" => handle.toggle_pause(),
                "s" => handle.skip(),
                "e" => handle.end_early(),
                "r" => handle.reset().and_then(|_| handle.start()),
                "c" => {
                    checkin_open = !checkin_open;
                    if checkin_open {
                        println!("Listening... press c again when done");
                        handle.start_checkin()
                    } else {
                        handle.stop_checkin()
                    }
                }
                "1" | "2" | "3" | "4" => {
                    let index = line.trim().parse::<usize>().unwrap_or(1) - 1;
                    handle.toggle_checklist_item(index)
                }
                "q" => {
                    let _ = handle.shutdown();
                    break;
                }
                other => {
                    println!("Unknown key {:?}", other);
                    print_help();
                    Ok(())
                }
            };
            if result.is_err() {
                break;
            }
        }
    });
}

/// Print one event; false once the session is gone
fn print_event(event: &SessionEvent, handle: &SessionHandle) -> bool {
    match event {
        SessionEvent::PhaseChanged(Phase::ChecklistGate) => {
            let snapshot = handle.snapshot();
            if let (Some(next), Some(secs)) = (
                snapshot.drills.get(snapshot.current_index + 1),
                snapshot.next_duration_secs,
            ) {
                println!("Up next: {} ({}:{:02})", next.name, secs / 60, secs % 60);
            }
            println!("Round over. Recovery checklist (1-4 to tick, enter to continue):");
            for (i, item) in corner_coach::session::state::CHECKLIST_ITEMS.iter().enumerate() {
                println!("  {}. {}", i + 1, item);
            }
        }
        SessionEvent::PhaseChanged(phase) => println!("[{}]", phase),
        SessionEvent::Tick {
            time_remaining_secs,
            ..
        } => {
            if *time_remaining_secs % 30 == 0 || *time_remaining_secs <= 5 {
                println!("{}:{:02}", time_remaining_secs / 60, time_remaining_secs % 60);
            }
        }
        SessionEvent::Bell => println!("*ding*"),
        SessionEvent::Announced(text) => println!("Coach: {}", text),
        SessionEvent::Feedback(feedback) => {
            println!("Form ({:?}): {}", feedback.tone, feedback.label)
        }
        SessionEvent::Transcript(log) => {
            println!("You: {}", log.transcript);
            println!("Coach: {}", log.reply);
        }
        SessionEvent::CheckinError(message) => println!("Check-in: {}", message),
        SessionEvent::SessionComplete(record) => {
            println!();
            println!("{}", record.summary_text());
            println!("Press r to go again or q to quit.");
        }
        SessionEvent::Shutdown => return false,
    }
    true
}

async fn check_keys(config: &CoachConfig) -> Result<()> {
    match &config.mistral.api_key {
        Some(key) => {
            let check = check_mistral_key(&config.mistral, key).await;
            println!("Mistral: {}", serde_json::to_string(&check)?);
        }
        None => println!("Mistral: no key configured"),
    }
    match &config.speech.api_key {
        Some(key) => {
            let check = check_elevenlabs_key(&config.speech, key).await;
            println!("ElevenLabs: {}", serde_json::to_string(&check)?);
        }
        None => println!("ElevenLabs: no key configured (local voice only)"),
    }
    Ok(())
}

fn show_history(config: &CoachConfig, limit: usize) -> Result<()> {
    let recorder = SessionRecorder::from_config(&config.storage);
    let records = recorder.history().load()?;
    if records.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }
    for record in records.iter().take(limit) {
        println!(
            "{}  {:<12} {:<9} {}/{} rounds  {}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.difficulty.as_str(),
            record.style_label,
            record.rounds_completed,
            record.total_rounds,
            record.duration_label()
        );
    }
    Ok(())
}

fn show_last(config: &CoachConfig) -> Result<()> {
    let recorder = SessionRecorder::from_config(&config.storage);
    match recorder.handoff().take()? {
        Some(record) => println!("{}", record.summary_text()),
        None => println!("No unread session."),
    }
    Ok(())
}
