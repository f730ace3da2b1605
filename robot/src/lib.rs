//! Hardware seam for the robot body.
//!
//! The orchestration layer drives the body exclusively through the [`Robot`]
//! trait; the concrete driver (motor controller, LED bus, speakers) lives
//! behind it. [`LoggingRobot`] stands in when no hardware is attached.

mod command;

pub use command::{AudioClip, AudioFormat, EyeColor, Gesture, MoveDirection, UnknownCommand};

use async_trait::async_trait;
use tracing::info;

/// Host-side actions the body can take.
///
/// Implementations must be `Send + Sync` so they can be shared across worker
/// tasks. Gesture and LED calls are best-effort: drivers log failures rather
/// than surface them, since a dropped wave must never take down a
/// conversation. Clip playback is the one fallible call, because the caller
/// falls back to [`Robot::say`] when it fails.
#[async_trait]
pub trait Robot: Send + Sync {
    /// Perform a canned gesture animation.
    async fn perform(&self, gesture: Gesture);
    /// Set the eye LEDs to a steady color.
    async fn set_eye_color(&self, color: EyeColor);
    /// Turn the pulsing "thinking" eye animation on or off.
    async fn indicate_thinking(&self, on: bool);
    /// Drive the base in `direction` at the driver's configured speed.
    ///
    /// Held directions are re-issued on every controller tick; drivers treat
    /// repeated calls as a refresh, not an accumulation.
    async fn drive(&self, direction: MoveDirection);
    /// Stop all base movement immediately.
    async fn halt(&self);
    /// Speak `text` through the built-in voice. Blocks until done.
    async fn say(&self, text: &str);
    /// Play a synthesized clip through the speakers. Blocks until playback
    /// finishes.
    async fn play_clip(&self, clip: &AudioClip) -> anyhow::Result<()>;
    /// Relax the motors; called once on shutdown.
    async fn rest(&self);
}

/// [`Robot`] implementation that logs each action and does nothing else.
#[derive(Clone, Default)]
pub struct LoggingRobot;

#[async_trait]
impl Robot for LoggingRobot {
    async fn perform(&self, gesture: Gesture) {
        info!(target: "robot", %gesture, "perform");
    }

    async fn set_eye_color(&self, color: EyeColor) {
        info!(target: "robot", %color, "set eye color");
    }

    async fn indicate_thinking(&self, on: bool) {
        info!(target: "robot", on, "thinking indicator");
    }

    async fn drive(&self, direction: MoveDirection) {
        info!(target: "robot", %direction, "drive");
    }

    async fn halt(&self) {
        info!(target: "robot", "halt");
    }

    async fn say(&self, text: &str) {
        info!(target: "robot", %text, "say");
    }

    async fn play_clip(&self, clip: &AudioClip) -> anyhow::Result<()> {
        info!(target: "robot", bytes = clip.data.len(), "play clip");
        Ok(())
    }

    async fn rest(&self) {
        info!(target: "robot", "rest");
    }
}
