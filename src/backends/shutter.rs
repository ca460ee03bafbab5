// SPDX-License-Identifier: GPL-3.0-only

//! Audible shutter cue played before a still capture
//!
//! Playing the cue is a courtesy to the user. Callers log failures and carry
//! on with the capture.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Sound theme id played by the system sound backend
const SHUTTER_SOUND_ID: &str = "camera-shutter";

/// Shutter sound selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShutterSound {
    /// No sound
    Off,
    /// Terminal bell on stderr
    #[default]
    Bell,
    /// Desktop sound theme via `canberra-gtk-play`
    System,
}

impl ShutterSound {
    /// Build the cue for this selection
    pub fn cue(self) -> Box<dyn ShutterCue> {
        match self {
            ShutterSound::Off => Box::new(SilentShutter),
            ShutterSound::Bell => Box::new(TerminalBell),
            ShutterSound::System => Box::new(SystemSound::default()),
        }
    }
}

/// Something that can make a shutter noise
pub trait ShutterCue: Send + Sync {
    /// Start playing the cue. Must not block for the duration of the sound.
    fn play(&self) -> io::Result<()>;
}

/// Plays nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentShutter;

impl ShutterCue for SilentShutter {
    fn play(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl ShutterCue for TerminalBell {
    fn play(&self) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()
    }
}

/// Plays the desktop's camera shutter sound through libcanberra
#[derive(Debug, Clone)]
pub struct SystemSound {
    player: String,
}

impl Default for SystemSound {
    fn default() -> Self {
        Self {
            player: "canberra-gtk-play".to_string(),
        }
    }
}

impl ShutterCue for SystemSound {
    fn play(&self) -> io::Result<()> {
        // Fire and forget; the cue never waits on the player
        let child = Command::new(&self.player)
            .args(["--id", SHUTTER_SOUND_ID])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(pid = child.id(), player = %self.player, "Shutter sound started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_shutter_never_fails() {
        assert!(ShutterSound::Off.cue().play().is_ok());
    }

    #[test]
    fn test_missing_player_is_an_error() {
        let cue = SystemSound {
            player: "/nonexistent/card-scanner-player".to_string(),
        };
        assert!(cue.play().is_err());
    }
}
