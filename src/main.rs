//! Application entry point: Loki desktop voice assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the [`tokio`] runtime that runs listen cycles.
//! 4. Probe the microphone, load Whisper and build the Gemini client; each
//!    one that is unavailable degrades with a message in the log instead of
//!    stopping startup.
//! 5. Start the speech worker and assemble the coordinator.
//! 6. Run [`eframe::run_native`], which blocks until the window is closed.

use std::sync::Arc;

use eframe::egui;
use loki_assistant::{
    app::LokiApp,
    audio::{AudioSource, Microphone},
    config::{AppConfig, AppPaths},
    dispatch::{ActionDispatcher, SystemBrowser, SystemLauncher},
    intent::{AliasBook, IntentResolver},
    llm::{AssistantClient, GeminiClient, LlmError, PromptBuilder},
    pipeline::{Conversation, CycleComponents, CycleSettings, ListenCycleCoordinator, StatusModel},
    stt::{SttEngine, TranscribeParams, UnavailableStt, WhisperEngine},
    tts::{CommandSynthesizer, SilentSynthesizer, SpeechOutputQueue, SpeechSynthesizer},
};

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (w, h) = config.ui.window_size;
    let viewport = egui::ViewportBuilder::default()
        .with_title(&config.assistant.name)
        .with_inner_size([w, h])
        .with_min_inner_size([420.0, 320.0]);

    eframe::NativeOptions {
        viewport,
        ..Default::default()
    }
}

fn load_stt(config: &AppConfig) -> Arc<dyn SttEngine> {
    let model_path = AppPaths::new().model_file(&config.stt.model);
    let params = TranscribeParams {
        language: config.stt.language.clone(),
        ..TranscribeParams::default()
    };

    match WhisperEngine::load(&model_path, params) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            log::warn!("Could not load Whisper model: {e}. Transcription will fail.");
            Arc::new(UnavailableStt::new(format!(
                "{e}. Download a ggml model to {}",
                model_path.display()
            )))
        }
    }
}

fn build_assistant(config: &AppConfig) -> Result<Arc<dyn AssistantClient>, LlmError> {
    Ok(Arc::new(GeminiClient::from_config(&config.llm)?))
}

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Loki starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let name = config.assistant.name.clone();

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Collaborators, degrading where unavailable
    let status = StatusModel::new();
    let history = Conversation::new();
    history.push(&name, config.assistant.greeting.as_str());

    let microphone: Option<Arc<dyn AudioSource>> = match Microphone::new(config.audio.clone()) {
        Ok(mic) => Some(Arc::new(mic)),
        Err(e) => {
            log::warn!("Audio capture unavailable: {e}");
            history.push(
                &name,
                format!("Microphone unavailable: {e}. Check your audio devices and drivers."),
            );
            None
        }
    };

    let stt = load_stt(&config);

    let assistant = match build_assistant(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            log::warn!("Gemini client unavailable: {e}");
            history.push(
                &name,
                format!(
                    "Gemini API key missing. Set {} to enable AI responses.",
                    config.llm.api_key_env
                ),
            );
            None
        }
    };

    // 5. Speech worker + coordinator
    let synth: Arc<dyn SpeechSynthesizer> = match CommandSynthesizer::from_config(&config.speech) {
        Some(synth) => {
            log::info!("Speech via {}", synth.program());
            Arc::new(synth)
        }
        None => {
            log::warn!("No speech program found; responses will only be shown");
            Arc::new(SilentSynthesizer)
        }
    };

    let speech = SpeechOutputQueue::start(synth, status.clone(), history.clone(), name.clone())
        .map_err(|e| eframe::Error::AppCreation(Box::new(e)))?;

    let aliases = Arc::new(AliasBook::from_config(&config.aliases));
    let dispatcher = ActionDispatcher::new(
        Arc::clone(&aliases),
        Arc::new(SystemLauncher),
        Arc::new(SystemBrowser),
        assistant,
        PromptBuilder::new(name.clone()),
    );

    let coordinator = ListenCycleCoordinator::new(
        CycleComponents {
            status,
            history,
            assistant_name: name.clone(),
            microphone,
            stt,
            resolver: IntentResolver::new(aliases),
            dispatcher,
            speech: Arc::new(speech),
            settings: CycleSettings::from_config(&config.audio),
        },
        rt.handle().clone(),
    );

    // 6. Window (blocks until closed)
    let app = LokiApp::new(name.clone(), coordinator);
    let options = native_options(&config);

    let result = eframe::run_native(&name, options, Box::new(move |_cc| Ok(Box::new(app))));
    rt.shutdown_timeout(std::time::Duration::from_secs(1));
    log::info!("Loki stopped");
    result
}
