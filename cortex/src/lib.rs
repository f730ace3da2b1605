//! Concurrent orchestration layer for a live-operated conversational robot.
//!
//! Reconciles independently-timed event sources — keyboard input, the
//! movement safety timer, network responses, audio completion — into one
//! consistent robot state without blocking the interactive loop. Two
//! invariants rule everything here: the robot never moves unsupervised
//! (see [`movement::MovementWatchdog`]) and never speaks two utterances at
//! once (see [`speech::SpeechLock`]).
//!
//! All network backends sit behind the traits in [`ling`]; the hardware sits
//! behind [`robot::Robot`]. Every component is testable with in-memory
//! stand-ins.

pub mod capture;
pub mod convo;
pub mod ling;
pub mod movement;
pub mod orchestrator;
pub mod speech;
pub mod tools;
pub mod types;

pub use capture::{CaptureConfig, CaptureEvent, CaptureState, VoiceCapture};
pub use convo::{ConversationEngine, ConversationLog, EngineConfig, default_system_prompt};
pub use ling::{
    ChatMessage, ChatReply, Chatter, RecordedAudio, Recorder, Role, Searcher, Synthesizer,
    ToolCallRequest, ToolCallResult, ToolSpec, Transcriber,
};
pub use movement::{
    MovementPhase, MovementState, MovementWatchdog, SharedMovement, WatchdogConfig,
    shared_movement,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Queues};
pub use speech::{Acquisition, SpeakOutcome, Speaker, SpeechLock, SpeechTier};
pub use tools::{ToolDispatcher, tool_schema};
pub use types::{Event, Modality, Origin, Utterance};
