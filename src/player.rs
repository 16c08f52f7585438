use std::path::PathBuf;
use std::time::Duration;

use crate::models::VideoDescriptor;

/// The playing clip: a locally cached file and a position clock. The
/// terminal cannot decode video, so "playing" advances `position` against
/// the probed duration; an unknown duration (probe failure) means the clip
/// never ends on its own and must be navigated away from.
pub struct Player {
    pub descriptor: VideoDescriptor,
    pub path: PathBuf,
    pub duration: Option<f64>,
    pub position: f64,
    pub paused: bool,
    pub muted: bool,
}

impl Player {
    pub fn new(
        descriptor: VideoDescriptor,
        path: PathBuf,
        duration: Option<f64>,
        muted: bool,
    ) -> Self {
        Self {
            descriptor,
            path,
            duration,
            position: 0.0,
            paused: false,
            muted,
        }
    }

    pub fn tick(&mut self, dt: Duration) {
        if self.paused {
            return;
        }
        self.position += dt.as_secs_f64();
        if let Some(duration) = self.duration {
            self.position = self.position.min(duration);
        }
    }

    pub fn ended(&self) -> bool {
        self.duration
            .map(|duration| self.position >= duration)
            .unwrap_or(false)
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    /// Playback fraction in `[0, 1]`, if the duration is known.
    pub fn progress(&self) -> Option<f64> {
        self.duration.map(|duration| {
            if duration <= 0.0 {
                1.0
            } else {
                (self.position / duration).min(1.0)
            }
        })
    }
}
