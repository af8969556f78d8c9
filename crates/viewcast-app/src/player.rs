//! Owned playback state container for the viewing session.
//!
//! Tracks what the player is showing and whether it is rendering in
//! picture-in-picture. Each viewing surface owns one `PlayerState`; there is
//! no ambient singleton, so rapid open/close cycles cannot race. State
//! changes are published over a watch channel so observers always see the
//! latest snapshot.

use tokio::sync::watch;
use viewcast_common::LivestreamId;

/// What the player is currently showing.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSource {
    /// On-demand video, with the current playback position.
    Video { id: String, position_secs: f64 },
    /// Live content; no seekable position.
    Livestream { id: LivestreamId },
}

/// Snapshot of the player, published on every change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub source: Option<PlaybackSource>,
    pub playing: bool,
    pub pip_active: bool,
}

pub struct PlayerState {
    snapshot: PlayerSnapshot,
    tx: watch::Sender<PlayerSnapshot>,
}

impl PlayerState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PlayerSnapshot::default());
        Self {
            snapshot: PlayerSnapshot::default(),
            tx,
        }
    }

    /// Subscribe to state changes. The receiver always holds the latest
    /// published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> &PlayerSnapshot {
        &self.snapshot
    }

    pub fn load_video(&mut self, id: impl Into<String>, resume_secs: f64) {
        self.snapshot = PlayerSnapshot {
            source: Some(PlaybackSource::Video {
                id: id.into(),
                position_secs: resume_secs,
            }),
            playing: true,
            pip_active: false,
        };
        self.publish();
    }

    pub fn load_livestream(&mut self, id: LivestreamId) {
        self.snapshot = PlayerSnapshot {
            source: Some(PlaybackSource::Livestream { id }),
            playing: true,
            pip_active: false,
        };
        self.publish();
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.snapshot.source.is_some() && self.snapshot.playing != playing {
            self.snapshot.playing = playing;
            self.publish();
        }
    }

    /// Update the playback position of an on-demand video. No-op for live
    /// content.
    pub fn seek(&mut self, secs: f64) {
        if let Some(PlaybackSource::Video { position_secs, .. }) = &mut self.snapshot.source {
            *position_secs = secs;
            self.publish();
        }
    }

    /// Shrink the player into picture-in-picture. Requires a loaded source;
    /// playback continues.
    pub fn enter_pip(&mut self) {
        if self.snapshot.source.is_none() || self.snapshot.pip_active {
            return;
        }
        self.snapshot.pip_active = true;
        self.publish();
    }

    /// Expand picture-in-picture back to the full player; playback continues.
    pub fn exit_pip(&mut self) {
        if !self.snapshot.pip_active {
            return;
        }
        self.snapshot.pip_active = false;
        self.publish();
    }

    /// The floating window was closed outright: leave picture-in-picture
    /// and pause.
    pub fn dismiss_pip(&mut self) {
        if !self.snapshot.pip_active {
            return;
        }
        self.snapshot.pip_active = false;
        self.snapshot.playing = false;
        self.publish();
    }

    /// Unload whatever is playing.
    pub fn clear(&mut self) {
        self.snapshot = PlayerSnapshot::default();
        self.publish();
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot.clone());
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_livestream_starts_playing_fullscreen() {
        let mut player = PlayerState::new();
        player.load_livestream(LivestreamId::from("ls-1"));

        let snap = player.snapshot();
        assert!(snap.playing);
        assert!(!snap.pip_active);
        assert_eq!(
            snap.source,
            Some(PlaybackSource::Livestream {
                id: LivestreamId::from("ls-1")
            })
        );
    }

    #[test]
    fn pip_requires_a_loaded_source() {
        let mut player = PlayerState::new();
        player.enter_pip();
        assert!(!player.snapshot().pip_active);

        player.load_video("vid-1", 0.0);
        player.enter_pip();
        assert!(player.snapshot().pip_active);
    }

    #[test]
    fn exit_pip_keeps_playing_but_dismiss_pauses() {
        let mut player = PlayerState::new();
        player.load_video("vid-1", 12.0);
        player.enter_pip();

        player.exit_pip();
        assert!(!player.snapshot().pip_active);
        assert!(player.snapshot().playing);

        player.enter_pip();
        player.dismiss_pip();
        assert!(!player.snapshot().pip_active);
        assert!(!player.snapshot().playing);
    }

    #[test]
    fn seek_only_applies_to_videos() {
        let mut player = PlayerState::new();
        player.load_video("vid-1", 0.0);
        player.seek(33.5);
        assert_eq!(
            player.snapshot().source,
            Some(PlaybackSource::Video {
                id: "vid-1".into(),
                position_secs: 33.5
            })
        );

        player.load_livestream(LivestreamId::from("ls-1"));
        player.seek(10.0);
        assert_eq!(
            player.snapshot().source,
            Some(PlaybackSource::Livestream {
                id: LivestreamId::from("ls-1")
            })
        );
    }

    #[test]
    fn subscribers_see_the_latest_snapshot() {
        let mut player = PlayerState::new();
        let rx = player.subscribe();

        player.load_livestream(LivestreamId::from("ls-1"));
        player.enter_pip();

        let seen = rx.borrow().clone();
        assert!(seen.pip_active);
        assert_eq!(seen, *player.snapshot());
    }

    #[test]
    fn clear_resets_everything() {
        let mut player = PlayerState::new();
        player.load_video("vid-1", 5.0);
        player.enter_pip();
        player.clear();

        assert_eq!(*player.snapshot(), PlayerSnapshot::default());
    }
}
