//! Runtime control channel between the host UI and a rendered document.
//!
//! The channel is receive-only from the document's side. The host posts
//! [`ControlMessage`]s; the document switches on the message `type` and
//! silently ignores anything it does not recognise. [`ControlChannel`]
//! is the Rust model of that listener, and the same band table and
//! thresholds are embedded in every generated document so the browser
//! listener derives identical state.

mod celestial;
mod message;
mod sky;

pub use celestial::{CelestialState, GodRays, LightingConfig};
pub use message::ControlMessage;
pub use sky::{band_for, BandKind, Hsl, SkyBand, SKY_BANDS};

use serde::{Deserialize, Serialize};

/// Time of day and god-ray strength, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvironmentState {
    /// 0 is dawn, 0.25 noon, 0.75 midnight.
    pub time_of_day: f32,
    pub god_ray_intensity: f32,
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self {
            time_of_day: 0.2,
            god_ray_intensity: 0.5,
        }
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl EnvironmentState {
    /// Out-of-range inputs are clamped.
    pub fn new(time_of_day: f32, god_ray_intensity: f32) -> Self {
        Self {
            time_of_day: unit(time_of_day),
            god_ray_intensity: unit(god_ray_intensity),
        }
    }

    pub fn clamped(self) -> Self {
        Self::new(self.time_of_day, self.god_ray_intensity)
    }

    /// The message that moves a document to this state.
    pub fn to_message(self) -> ControlMessage {
        ControlMessage::Environment {
            sunlight: f64::from(self.time_of_day),
            godrays: f64::from(self.god_ray_intensity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelState {
    /// Rendered with the initial environment; nothing received yet.
    AwaitingFirstEnvironmentUpdate,
    /// At least one environment message has been applied.
    Live,
}

/// Per-document listener state.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    state: ChannelState,
    environment: EnvironmentState,
    instructions_visible: bool,
    lighting: LightingConfig,
    celestial: CelestialState,
}

impl ControlChannel {
    pub fn new(initial: EnvironmentState, lighting: LightingConfig) -> Self {
        let environment = initial.clamped();
        Self {
            state: ChannelState::AwaitingFirstEnvironmentUpdate,
            environment,
            instructions_visible: true,
            lighting,
            celestial: CelestialState::compute(&environment, &lighting),
        }
    }

    pub fn with_instructions_visible(mut self, visible: bool) -> Self {
        self.instructions_visible = visible;
        self
    }

    /// Apply one message. Returns whether anything changed.
    pub fn handle(&mut self, message: &ControlMessage) -> bool {
        match *message {
            ControlMessage::Environment { sunlight, godrays } => {
                self.environment = EnvironmentState::new(sunlight as f32, godrays as f32);
                self.celestial = CelestialState::compute(&self.environment, &self.lighting);
                if self.state == ChannelState::AwaitingFirstEnvironmentUpdate {
                    log::debug!("control channel live");
                    self.state = ChannelState::Live;
                }
                true
            }
            ControlMessage::ToggleInstructions => {
                self.instructions_visible = !self.instructions_visible;
                true
            }
        }
    }

    /// Apply a raw payload; unrecognised payloads are a no-op.
    pub fn handle_raw(&mut self, raw: &str) -> bool {
        match ControlMessage::parse(raw) {
            Some(message) => self.handle(&message),
            None => {
                log::debug!("ignoring unrecognised control message");
                false
            }
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn environment(&self) -> EnvironmentState {
        self.environment
    }

    pub fn celestial(&self) -> &CelestialState {
        &self.celestial
    }

    pub fn instructions_visible(&self) -> bool {
        self.instructions_visible
    }

    pub fn lighting(&self) -> &LightingConfig {
        &self.lighting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ControlChannel {
        ControlChannel::new(EnvironmentState::default(), LightingConfig::default())
    }

    #[test]
    fn test_first_environment_message_goes_live() {
        let mut channel = channel();
        assert_eq!(channel.state(), ChannelState::AwaitingFirstEnvironmentUpdate);

        assert!(channel.handle(&ControlMessage::Environment {
            sunlight: 0.45,
            godrays: 0.2
        }));
        assert_eq!(channel.state(), ChannelState::Live);
        assert_eq!(channel.celestial().band, BandKind::Night);

        channel.handle(&ControlMessage::Environment {
            sunlight: 0.0,
            godrays: 0.2,
        });
        assert_eq!(channel.state(), ChannelState::Live);
        assert_eq!(channel.celestial().band, BandKind::Dawn);
    }

    #[test]
    fn test_toggle_is_independent_of_environment() {
        let mut channel = channel();
        assert!(channel.instructions_visible());
        channel.handle(&ControlMessage::ToggleInstructions);
        assert!(!channel.instructions_visible());
        assert_eq!(channel.state(), ChannelState::AwaitingFirstEnvironmentUpdate);
        channel.handle(&ControlMessage::ToggleInstructions);
        assert!(channel.instructions_visible());
    }

    #[test]
    fn test_unknown_messages_are_ignored() {
        let mut channel = channel();
        let before = channel.environment();
        assert!(!channel.handle_raw(r#"{"type":"setCamera","x":1}"#));
        assert!(!channel.handle_raw("garbage"));
        assert_eq!(channel.environment(), before);
        assert_eq!(channel.state(), ChannelState::AwaitingFirstEnvironmentUpdate);
    }

    #[test]
    fn test_raw_environment_message() {
        let mut channel = channel();
        assert!(channel.handle_raw(r#"{"type":"environment","sunlight":0.25,"godrays":1}"#));
        assert!(channel.celestial().god_rays.visible);
    }

    #[test]
    fn test_inputs_are_clamped() {
        let mut channel = channel();
        channel.handle(&ControlMessage::Environment {
            sunlight: 4.0,
            godrays: -1.0,
        });
        assert_eq!(channel.environment(), EnvironmentState::new(1.0, 0.0));
        assert!(!channel.celestial().god_rays.visible);
    }

    #[test]
    fn test_environment_round_trips_through_message() {
        let state = EnvironmentState::new(0.3, 0.7);
        let mut channel = channel();
        channel.handle(&state.to_message());
        let applied = channel.environment();
        assert!((applied.time_of_day - 0.3).abs() < 1e-6);
        assert!((applied.god_ray_intensity - 0.7).abs() < 1e-6);
    }
}
