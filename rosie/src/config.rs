use clap::Parser;
use cortex::{CaptureConfig, EngineConfig, OrchestratorConfig, WatchdogConfig, default_system_prompt};
use std::time::Duration;

/// Live operator console for the robot. Settings come from flags or the
/// environment (a `.env` file is loaded first), with working defaults for
/// everything except the API key.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// OpenAI-compatible API base for chat, transcription and synthesis
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.groq.com/openai/v1")]
    pub llm_base_url: String,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true, default_value = "")]
    pub llm_api_key: String,

    #[arg(long, env = "LLM_MODEL", default_value = "llama-3.3-70b-versatile")]
    pub llm_model: String,

    #[arg(long, env = "WHISPER_MODEL", default_value = "whisper-large-v3-turbo")]
    pub whisper_model: String,

    /// Primary synthesis tier model
    #[arg(long, env = "TTS_MODEL", default_value = "canopylabs/orpheus-v1-english")]
    pub tts_model: String,

    #[arg(long, env = "TTS_VOICE", default_value = "hannah")]
    pub tts_voice: String,

    /// Enables the secondary synthesis tier when set
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_api_key: Option<String>,

    #[arg(long, env = "ELEVENLABS_VOICE", default_value = "Rachel")]
    pub elevenlabs_voice: String,

    /// Enables web search via Brave when set
    #[arg(long, env = "BRAVE_API_KEY", hide_env_values = true)]
    pub brave_api_key: Option<String>,

    /// Enables web search via Serper when set (Brave wins if both are set)
    #[arg(long, env = "SERPER_API_KEY", hide_env_values = true)]
    pub serper_api_key: Option<String>,

    /// Robot name used in the persona prompt and the console
    #[arg(long, env = "ROBOT_NAME", default_value = "Rosie")]
    pub robot_name: String,

    /// Phrase that sends the robot back to idle
    #[arg(long, env = "FAREWELL_PHRASE", default_value = "bye rosie")]
    pub farewell: String,

    /// Dialogue window, in turns
    #[arg(long, default_value_t = 10)]
    pub max_turns: usize,

    /// Inference rounds allowed per turn once tools get involved
    #[arg(long, default_value_t = 2)]
    pub max_tool_rounds: usize,

    /// Concurrent conversation workers
    #[arg(long, default_value_t = 4)]
    pub worker_cap: usize,

    /// Movement loop period, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub watchdog_tick_ms: u64,

    /// Movement halt timeout, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub watchdog_halt_ms: u64,

    /// Shortest recording worth transcribing, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub record_floor_ms: u64,

    /// Longest recording before auto-stop, in seconds
    #[arg(long, default_value_t = 30)]
    pub record_ceiling_secs: u64,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            system_prompt: default_system_prompt(&self.robot_name),
            max_turns: self.max_turns,
            max_tool_rounds: self.max_tool_rounds,
            ..EngineConfig::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            worker_cap: self.worker_cap,
            farewell: Some(self.farewell.to_lowercase()),
        }
    }

    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            tick: Duration::from_millis(self.watchdog_tick_ms),
            halt_timeout: Duration::from_millis(self.watchdog_halt_ms),
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            min_duration: Duration::from_millis(self.record_floor_ms),
            max_duration: Duration::from_secs(self.record_ceiling_secs),
        }
    }
}
