//! Application entry point — Interview Coach.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Load the candidate profile (resume / job description) into the
//!    prompt builder.
//! 5. Build the answer generator ([`GeminiClient`]) from config.
//! 6. Load Google credentials and build the cloud synthesizer and
//!    recognizer (degrade gracefully when the key file is missing).
//! 7. Locate the local speech engine and pick its best voice.
//! 8. Open the audio output device.
//! 9. Spawn the pipeline orchestrator on the tokio runtime.
//! 10. Run the terminal loop — blocks the main thread reading stdin.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;

use interview_coach::{
    capture::{CaptureError, CloudRecognizer, RecognitionEngine, RecognitionEvent},
    config::{AppConfig, AppPaths, VoicePreference},
    llm::{GeminiClient, PromptBuilder, ResponseGenerator},
    pipeline::{new_shared_state, PipelineOrchestrator, UiCommand, UiUpdate},
    playback::{AudioOutput, CpalOutput},
    tts::{
        log_backend_choice, CloudSynthesizer, FallbackSynthesizer, LocalSynthesizer,
        ServiceAccountKey, SpeechSynthesizer, TokenProvider,
    },
};

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Interview Coach starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if config.llm.api_key.is_none() {
        config.llm.api_key = std::env::var("GEMINI_API_KEY").ok();
    }

    // 3. Tokio runtime (2 workers — synthesis and generation overlap)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Candidate profile
    let mut prompt = PromptBuilder::new();
    prompt.set_resume(std::fs::read_to_string(&paths.resume_file).ok());
    prompt.set_job_description(std::fs::read_to_string(&paths.job_description_file).ok());
    if prompt.is_roleplay() {
        log::info!("resume loaded; answering in character as the candidate");
    } else {
        log::info!(
            "no resume at {}; answering as a generic assistant",
            paths.resume_file.display()
        );
    }

    // 5. Answer generator
    let generator: Arc<dyn ResponseGenerator> = Arc::new(GeminiClient::from_config(&config.llm));
    if config.llm.api_key.is_none() {
        log::warn!("no Gemini API key configured; questions will fail until one is set");
    }

    // 6. Google credentials → cloud synthesis + cloud recognition.
    //    Both are optional: without the key file the app still runs with the
    //    local engine and typed questions.
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let tokens = match ServiceAccountKey::from_file(&paths.credentials_file) {
        Ok(key) => Some(Arc::new(TokenProvider::new(key, http.clone()))),
        Err(e) => {
            log::warn!(
                "Google credentials unavailable ({}): {e}. Cloud speech is disabled.",
                paths.credentials_file.display()
            );
            None
        }
    };

    let cloud: Option<Arc<CloudSynthesizer>> = tokens.as_ref().map(|tokens| {
        Arc::new(CloudSynthesizer::new(
            http.clone(),
            Arc::clone(tokens),
            &config.tts,
        ))
    });

    let engine: Arc<dyn RecognitionEngine> = match &tokens {
        Some(tokens) => Arc::new(CloudRecognizer::new(http.clone(), Arc::clone(tokens))),
        None => Arc::new(NoCredentialsEngine),
    };

    // 7. Local speech engine (required fallback)
    let local = match LocalSynthesizer::locate() {
        Ok(mut local) => {
            rt.block_on(local.select_voice());
            local
        }
        Err(e) => {
            log::error!("no local speech engine found: {e}");
            log::error!("install espeak-ng and try again");
            return;
        }
    };

    let synth = Arc::new(FallbackSynthesizer::new(
        cloud
            .as_ref()
            .map(|c| Arc::clone(c) as Arc<dyn SpeechSynthesizer>),
        Arc::new(local),
    ));
    if matches!(config.tts.voice, VoicePreference::LocalEngine) {
        synth.set_cloud_enabled(false);
    }
    log_backend_choice(&synth);

    // 8. Audio output
    let output: Arc<dyn AudioOutput> = match CpalOutput::new() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            log::error!("no audio output device: {e}");
            return;
        }
    };

    // 9. Orchestrator
    let state = new_shared_state(config);
    let (command_tx, command_rx) = mpsc::channel::<UiCommand>(16);
    let (ui_tx, ui_rx) = mpsc::channel::<UiUpdate>(64);

    let orchestrator = PipelineOrchestrator::new(
        Arc::clone(&state),
        engine,
        generator,
        synth,
        cloud,
        output,
        prompt,
        paths.settings_file.clone(),
        ui_tx,
    );
    let pipeline = rt.spawn(orchestrator.run(command_rx));
    rt.spawn(print_updates(ui_rx));

    // 10. Terminal loop
    print_help();
    run_terminal(command_tx);

    // Command channel dropped; wait for in-flight work to drain.
    let _ = rt.block_on(pipeline);
    log::info!("goodbye");
}

// ---------------------------------------------------------------------------
// Terminal front end
// ---------------------------------------------------------------------------

fn print_help() {
    println!("Type a question and press Enter, or use a command:");
    println!("  /mic           start or finish voice capture");
    println!("  /play          pause / resume playback");
    println!("  /replay        speak the shown answer again");
    println!("  /skip          show the rest of the answer at once");
    println!("  /stop          stop revealing and speaking");
    println!("  /speed <rate>  speaking rate, 0.5 – 2.0");
    println!("  /voice <name>  cloud voice name, or 'local'");
    println!("  /live on|off   speak answers while they appear");
    println!("  /prev /next    browse earlier questions");
    println!("  /clear         forget the conversation");
    println!("  /quit          exit");
}

/// Read stdin lines and translate them into [`UiCommand`]s.  Returns when
/// stdin closes or the user quits, dropping the command channel.
fn run_terminal(commands: mpsc::Sender<UiCommand>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match parse_line(line) {
            ParsedLine::Command(cmd) => cmd,
            ParsedLine::Quit => break,
            ParsedLine::Invalid(msg) => {
                println!("{msg}");
                continue;
            }
        };

        if commands.blocking_send(cmd).is_err() {
            break;
        }
    }
}

enum ParsedLine {
    Command(UiCommand),
    Quit,
    Invalid(String),
}

fn parse_line(line: &str) -> ParsedLine {
    if !line.starts_with('/') {
        return ParsedLine::Command(UiCommand::SendText(line.to_string()));
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let cmd = match word {
        "/mic" => UiCommand::MicToggle,
        "/play" => UiCommand::PlayPause,
        "/replay" => UiCommand::Replay,
        "/skip" => UiCommand::SkipToEnd,
        "/stop" => UiCommand::Stop,
        "/prev" => UiCommand::PrevTurn,
        "/next" => UiCommand::NextTurn,
        "/clear" => UiCommand::Clear,
        "/quit" | "/exit" => return ParsedLine::Quit,
        "/speed" => match rest.parse::<f32>() {
            Ok(rate) => UiCommand::SetSpeed(rate),
            Err(_) => return ParsedLine::Invalid("usage: /speed <rate>".into()),
        },
        "/voice" => {
            if rest.is_empty() {
                return ParsedLine::Invalid("usage: /voice <name> | /voice local".into());
            }
            if rest.eq_ignore_ascii_case("local") {
                UiCommand::SelectVoice(VoicePreference::LocalEngine)
            } else {
                UiCommand::SelectVoice(VoicePreference::CloudVoice(rest.to_string()))
            }
        }
        "/live" => match rest {
            "on" => UiCommand::SetLiveSpeech(true),
            "off" => UiCommand::SetLiveSpeech(false),
            _ => return ParsedLine::Invalid("usage: /live on|off".into()),
        },
        other => return ParsedLine::Invalid(format!("unknown command: {other}")),
    };
    ParsedLine::Command(cmd)
}

/// Print pipeline updates to the terminal as they arrive.
async fn print_updates(mut ui_rx: mpsc::Receiver<UiUpdate>) {
    use std::io::Write;

    let mut revealing = false;
    while let Some(update) = ui_rx.recv().await {
        match update {
            UiUpdate::Phase(phase) => {
                if revealing {
                    println!();
                    revealing = false;
                }
                println!("[{}]", phase.label());
            }
            UiUpdate::Transcript(text) => println!("heard: {text}"),
            UiUpdate::Question(question) => println!("Q: {question}"),
            UiUpdate::ResponseIncrement(piece) => {
                if !revealing {
                    print!("A: ");
                    revealing = true;
                }
                print!("{piece}");
                let _ = std::io::stdout().flush();
            }
            UiUpdate::ResponseDone => {
                if revealing {
                    println!();
                    revealing = false;
                }
            }
            UiUpdate::Playback(status) => log::debug!("playback: {status:?}"),
            UiUpdate::TurnShown {
                position: (current, total),
                question,
                answer,
            } => {
                println!("--- turn {current}/{total} ---");
                println!("Q: {question}");
                if let Some(answer) = answer {
                    println!("A: {answer}");
                }
            }
            UiUpdate::Error(message) => {
                if revealing {
                    println!();
                    revealing = false;
                }
                eprintln!("error: {message}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// NoCredentialsEngine — recognition stub when no service account is present
// ---------------------------------------------------------------------------

/// Refuses to start so the capture session reports a clear failure instead
/// of silently recording audio nothing can transcribe.
struct NoCredentialsEngine;

#[async_trait::async_trait]
impl RecognitionEngine for NoCredentialsEngine {
    async fn start(
        &self,
        _language: &str,
        _events: mpsc::Sender<RecognitionEvent>,
    ) -> Result<(), CaptureError> {
        Err(CaptureError::Engine(
            "cloud speech credentials not configured".into(),
        ))
    }

    async fn stop(&self) {}

    async fn abort(&self) {}
}
