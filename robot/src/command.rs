use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A canned expressive animation the robot can perform.
///
/// Gestures are short, self-contained and safe to fire at any time; the
/// driver is responsible for sequencing joint angles and returning the limbs
/// to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    Wave,
    Nod,
    ShakeHead,
    Think,
    Explain,
    Excited,
    Point,
    LookAtSound,
    Shrug,
    Celebrate,
    LookAround,
    Bow,
}

impl Gesture {
    /// Every gesture, in the order it is advertised to the model.
    pub const ALL: [Gesture; 12] = [
        Gesture::Wave,
        Gesture::Nod,
        Gesture::ShakeHead,
        Gesture::Think,
        Gesture::Explain,
        Gesture::Excited,
        Gesture::Point,
        Gesture::LookAtSound,
        Gesture::Shrug,
        Gesture::Celebrate,
        Gesture::LookAround,
        Gesture::Bow,
    ];

    /// Stable name used both as the tool name and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::Wave => "wave",
            Gesture::Nod => "nod",
            Gesture::ShakeHead => "shake_head",
            Gesture::Think => "think",
            Gesture::Explain => "explain",
            Gesture::Excited => "excited",
            Gesture::Point => "point",
            Gesture::LookAtSound => "look_at_sound",
            Gesture::Shrug => "shrug",
            Gesture::Celebrate => "celebrate",
            Gesture::LookAround => "look_around",
            Gesture::Bow => "bow",
        }
    }

    /// One-line description advertised in the tool schema.
    pub fn description(&self) -> &'static str {
        match self {
            Gesture::Wave => "Wave hello or goodbye with one arm",
            Gesture::Nod => "Nod the head in agreement or acknowledgment",
            Gesture::ShakeHead => "Shake the head to disagree or say no",
            Gesture::Think => "Rest a hand on the chin while pondering",
            Gesture::Explain => "Use open hand gestures while explaining",
            Gesture::Excited => "Raise both arms to show excitement",
            Gesture::Point => "Point forward with one hand",
            Gesture::LookAtSound => "Turn the head toward the current sound source",
            Gesture::Shrug => "Shrug both shoulders (I don't know)",
            Gesture::Celebrate => "Wave both arms in celebration",
            Gesture::LookAround => "Look around to the left and right",
            Gesture::Bow => "Bow politely",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gesture {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .iter()
            .copied()
            .find(|g| g.name() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Eye LED color. The palette is deliberately small; operators learn it as a
/// status code (white = idle, blue = active).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeColor {
    Blue,
    Green,
    Red,
    White,
}

impl EyeColor {
    pub const ALL: [EyeColor; 4] = [
        EyeColor::Blue,
        EyeColor::Green,
        EyeColor::Red,
        EyeColor::White,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EyeColor::Blue => "blue",
            EyeColor::Green => "green",
            EyeColor::Red => "red",
            EyeColor::White => "white",
        }
    }
}

impl fmt::Display for EyeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EyeColor {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EyeColor::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// A locomotion direction held by the operator.
///
/// Locomotion is keyboard-only; the model has no tool that reaches these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Forward,
    Back,
    TurnLeft,
    TurnRight,
    StrafeLeft,
    StrafeRight,
}

impl MoveDirection {
    /// Dispatch priority when several directions are held at once.
    pub const PRIORITY: [MoveDirection; 6] = [
        MoveDirection::Forward,
        MoveDirection::Back,
        MoveDirection::TurnLeft,
        MoveDirection::TurnRight,
        MoveDirection::StrafeLeft,
        MoveDirection::StrafeRight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MoveDirection::Forward => "forward",
            MoveDirection::Back => "back",
            MoveDirection::TurnLeft => "turn_left",
            MoveDirection::TurnRight => "turn_right",
            MoveDirection::StrafeLeft => "strafe_left",
            MoveDirection::StrafeRight => "strafe_right",
        }
    }
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a name does not match any known command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown robot command: {0}")]
pub struct UnknownCommand(pub String);

/// Container format of a synthesized audio clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

/// A synthesized utterance ready for playback through the robot speakers.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioClip {
    pub fn wav(data: Vec<u8>) -> Self {
        Self {
            data,
            format: AudioFormat::Wav,
        }
    }

    pub fn mp3(data: Vec<u8>) -> Self {
        Self {
            data,
            format: AudioFormat::Mp3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_names_round_trip() {
        for g in Gesture::ALL {
            assert_eq!(g.name().parse::<Gesture>().unwrap(), g);
        }
    }

    #[test]
    fn unknown_gesture_is_rejected() {
        assert!("moonwalk".parse::<Gesture>().is_err());
    }

    #[test]
    fn eye_color_parses_spec_palette_only() {
        for c in EyeColor::ALL {
            assert_eq!(c.name().parse::<EyeColor>().unwrap(), c);
        }
        assert!("yellow".parse::<EyeColor>().is_err());
    }
}
