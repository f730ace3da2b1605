//! The operator keyboard surface.
//!
//! Directional keys drive the movement state, numeric keys fire gestures and
//! LEDs directly (no model round-trip), `r` is push-to-talk, space toggles
//! active/idle and `x` quits. Key-release reporting needs the terminal's
//! keyboard-enhancement protocol; without it, held movement degrades to key
//! repeat plus the watchdog halt.

use cortex::movement::SharedMovement;
use cortex::{Orchestrator, VoiceCapture};
use crossterm::event::{
    Event as TermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use futures::StreamExt;
use robot::{EyeColor, Gesture, MoveDirection, Robot};
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

pub fn direction_for(key: char) -> Option<MoveDirection> {
    match key {
        'w' => Some(MoveDirection::Forward),
        's' => Some(MoveDirection::Back),
        'a' => Some(MoveDirection::TurnLeft),
        'd' => Some(MoveDirection::TurnRight),
        'q' => Some(MoveDirection::StrafeLeft),
        'e' => Some(MoveDirection::StrafeRight),
        _ => None,
    }
}

pub fn gesture_for(key: char) -> Option<Gesture> {
    match key {
        '1' => Some(Gesture::Wave),
        '2' => Some(Gesture::Nod),
        '3' => Some(Gesture::ShakeHead),
        '4' => Some(Gesture::Think),
        '8' => Some(Gesture::Explain),
        '9' => Some(Gesture::Excited),
        '0' => Some(Gesture::Point),
        _ => None,
    }
}

pub fn eye_color_for(key: char) -> Option<EyeColor> {
    match key {
        '5' => Some(EyeColor::Blue),
        '6' => Some(EyeColor::Green),
        '7' => Some(EyeColor::Red),
        _ => None,
    }
}

/// The push-to-talk key.
pub const PTT_KEY: char = 'r';

pub struct KeyboardListener {
    movement: SharedMovement,
    capture: VoiceCapture,
    orchestrator: Orchestrator,
    robot: Arc<dyn Robot>,
}

impl KeyboardListener {
    pub fn new(
        movement: SharedMovement,
        capture: VoiceCapture,
        orchestrator: Orchestrator,
        robot: Arc<dyn Robot>,
    ) -> Self {
        Self {
            movement,
            capture,
            orchestrator,
            robot,
        }
    }

    /// Run until the quit key. Restores the terminal before returning.
    pub async fn run(self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let enhanced = supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        } else {
            warn!("terminal lacks key-release reporting; movement relies on key repeat and the watchdog");
        }

        let result = self.listen().await;

        if enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        disable_raw_mode()?;
        result
    }

    async fn listen(&self) -> anyhow::Result<()> {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!(?e, "keyboard event error");
                    continue;
                }
            };
            let TermEvent::Key(key) = event else { continue };
            if self.handle_key(key) {
                break;
            }
        }
        Ok(())
    }

    /// Returns `true` on quit.
    fn handle_key(&self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }
        let KeyCode::Char(c) = key.code else {
            return false;
        };
        let c = c.to_ascii_lowercase();
        match key.kind {
            KeyEventKind::Press => self.on_press(c),
            KeyEventKind::Repeat => {
                // A held key refreshes the movement clock; everything else
                // ignores repeats.
                if let Some(direction) = direction_for(c) {
                    self.movement.lock().unwrap().press(direction);
                }
                false
            }
            KeyEventKind::Release => {
                self.on_release(c);
                false
            }
        }
    }

    fn on_press(&self, c: char) -> bool {
        if let Some(direction) = direction_for(c) {
            debug!(%direction, "movement key down");
            self.movement.lock().unwrap().press(direction);
            return false;
        }
        match c {
            PTT_KEY => self.capture.press(),
            ' ' => {
                let active = !self.orchestrator.is_active();
                self.orchestrator.set_active(active);
            }
            'x' => return true,
            _ => {
                if let Some(gesture) = gesture_for(c) {
                    // Direct invocation, bypassing the model.
                    let robot = self.robot.clone();
                    tokio::spawn(async move { robot.perform(gesture).await });
                    self.orchestrator.post_status(format!("gesture: {gesture}"));
                } else if let Some(color) = eye_color_for(c) {
                    let robot = self.robot.clone();
                    tokio::spawn(async move { robot.set_eye_color(color).await });
                    self.orchestrator.post_status(format!("eyes: {color}"));
                }
            }
        }
        false
    }

    fn on_release(&self, c: char) {
        if let Some(direction) = direction_for(c) {
            debug!(%direction, "movement key up");
            self.movement.lock().unwrap().release(direction);
        } else if c == PTT_KEY {
            self.capture.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_directional_key_maps() {
        for (key, expected) in [
            ('w', MoveDirection::Forward),
            ('s', MoveDirection::Back),
            ('a', MoveDirection::TurnLeft),
            ('d', MoveDirection::TurnRight),
            ('q', MoveDirection::StrafeLeft),
            ('e', MoveDirection::StrafeRight),
        ] {
            assert_eq!(direction_for(key), Some(expected));
        }
        assert_eq!(direction_for('z'), None);
    }

    #[test]
    fn gesture_and_led_keys_do_not_collide() {
        let gesture_keys = ['1', '2', '3', '4', '8', '9', '0'];
        let led_keys = ['5', '6', '7'];
        for key in gesture_keys {
            assert!(gesture_for(key).is_some());
            assert!(eye_color_for(key).is_none());
        }
        for key in led_keys {
            assert!(eye_color_for(key).is_some());
            assert!(gesture_for(key).is_none());
        }
    }
}
