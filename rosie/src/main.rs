mod config;
mod keys;
mod logging;
mod mic;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use config::Cli;
use cortex::{
    CaptureEvent, ConversationEngine, Event, MovementWatchdog, Orchestrator, Queues, Searcher,
    Speaker, SpeechTier, ToolDispatcher, Transcriber, VoiceCapture, shared_movement,
};
use keys::KeyboardListener;
use llm::{ChatClient, WhisperTranscriber};
use mic::MicRecorder;
use robot::{LoggingRobot, Robot};
use search::{SearchClient, SearchProvider};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tts::{ElevenLabsTts, HostedTts};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init();

    // Stand-in driver: the real body plugs in behind the Robot trait.
    let robot: Arc<dyn Robot> = Arc::new(LoggingRobot);

    let chatter = Arc::new(ChatClient::new(
        &cli.llm_base_url,
        &cli.llm_api_key,
        &cli.llm_model,
    ));
    let transcriber: Arc<dyn Transcriber> = Arc::new(
        WhisperTranscriber::new(&cli.llm_base_url, &cli.llm_api_key, &cli.whisper_model)
            .with_language("en"),
    );

    let dispatcher = ToolDispatcher::new(robot.clone(), build_searcher(&cli));
    let engine = Arc::new(ConversationEngine::new(
        chatter,
        dispatcher,
        cli.engine_config(),
    ));
    let speaker = Arc::new(Speaker::new(robot.clone(), build_tiers(&cli)));
    let (orchestrator, queues) =
        Orchestrator::new(engine, speaker, robot.clone(), cli.orchestrator_config());

    // Movement: keyboard writes, the watchdog loop drives and clears.
    let movement = shared_movement();
    let watchdog = MovementWatchdog::new(movement.clone(), robot.clone(), cli.watchdog_config())
        .with_status(orchestrator.status_sender());
    let watchdog_task = tokio::spawn(watchdog.run(orchestrator.shutdown_signal()));

    // Push-to-talk capture feeding transcripts back into the orchestrator.
    let recorder = Arc::new(MicRecorder::spawn()?);
    let (capture, capture_events) = VoiceCapture::new(recorder, transcriber, cli.capture_config());
    tokio::spawn(route_capture_events(capture_events, orchestrator.clone()));

    let console = tokio::spawn(console_loop(queues, orchestrator.shutdown_signal()));

    print_controls(&cli);
    let keyboard = KeyboardListener::new(
        movement,
        capture,
        orchestrator.clone(),
        robot.clone(),
    );
    keyboard.run().await?;

    orchestrator.shutdown().await;
    let _ = watchdog_task.await;
    let _ = console.await;
    println!("goodbye");
    Ok(())
}

fn build_searcher(cli: &Cli) -> Arc<dyn Searcher> {
    if let Some(key) = &cli.brave_api_key {
        return Arc::new(SearchClient::new(SearchProvider::Brave {
            api_key: key.clone(),
        }));
    }
    if let Some(key) = &cli.serper_api_key {
        return Arc::new(SearchClient::new(SearchProvider::Serper {
            api_key: key.clone(),
        }));
    }
    Arc::new(DisabledSearch)
}

fn build_tiers(cli: &Cli) -> Vec<SpeechTier> {
    let mut tiers = vec![SpeechTier::new(
        "hosted",
        Arc::new(HostedTts::new(
            &cli.llm_base_url,
            &cli.llm_api_key,
            &cli.tts_model,
            &cli.tts_voice,
        )),
        Duration::from_secs(10),
    )];
    if let Some(key) = &cli.elevenlabs_api_key {
        tiers.push(SpeechTier::new(
            "elevenlabs",
            Arc::new(ElevenLabsTts::new(key, &cli.elevenlabs_voice)),
            Duration::from_secs(10),
        ));
    }
    tiers
}

/// Searcher used when no search API key is configured; the model reads this
/// and tells the user instead of hallucinating results.
struct DisabledSearch;

#[async_trait]
impl Searcher for DisabledSearch {
    async fn search(&self, _query: &str) -> Result<String> {
        Ok("Web search is not configured on this robot.".into())
    }
}

async fn route_capture_events(
    mut events: mpsc::UnboundedReceiver<CaptureEvent>,
    orchestrator: Orchestrator,
) {
    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Started => {
                orchestrator.post_status("recording… release R when done");
            }
            CaptureEvent::Stopped => {}
            CaptureEvent::Transcribing => orchestrator.post_status("transcribing…"),
            CaptureEvent::Transcribed(text) => {
                orchestrator.submit_voice(text);
            }
            CaptureEvent::Failed(reason) => {
                orchestrator.post_status(format!("voice error: {reason}"));
            }
        }
    }
}

/// Drain both delivery queues once per tick and print them. Replies are
/// matched to what the operator said by origin id upstream; here they are
/// just shown in arrival order.
async fn console_loop(mut queues: Queues, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in queues.drain_messages() {
                    print_event(&event);
                }
                for event in queues.drain_statuses() {
                    print_event(&event);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

fn print_event(event: &Event) {
    // Raw mode is active while the keyboard listener runs, so lines need an
    // explicit carriage return.
    match event {
        Event::UserText { text, .. } => print!("you> {text}\r\n"),
        Event::UserVoice { text, .. } => print!("you (voice)> {text}\r\n"),
        Event::AssistantText { text, .. } => print!("robot> {text}\r\n"),
        Event::Status { text, .. } => print!("  · {text}\r\n"),
        Event::Error { text, .. } => print!("  ! {text}\r\n"),
    }
    let _ = std::io::stdout().flush();
}

fn print_controls(cli: &Cli) {
    println!("{} — operator console", cli.robot_name);
    println!("  movement (hold): W/S forward/back   A/D turn   Q/E strafe");
    println!("  gestures:        1 wave  2 nod  3 shake  4 think  8 explain  9 excited  0 point");
    println!("  eyes:            5 blue  6 green  7 red");
    println!("  voice:           hold R to talk, release to send");
    println!("  system:          SPACE active/idle   X quit");
    println!("  farewell phrase: \"{}\"", cli.farewell);
    println!();
}
