//! Preview host: owns the live document and its frame loop.
//!
//! Each mounted document gets one [`SceneRuntime`] owned by a dedicated
//! frame-loop thread. The host talks to it only through a mailbox, and every
//! message is handled to completion before the next frame ticks. Mounting a
//! new document cancels and joins the previous loop first, so at most one
//! runtime is ever alive.

use crate::builder::{BuildOutput, SceneBuilder};
use crate::control::{ChannelState, ControlChannel, ControlMessage, EnvironmentState};
use crate::document::escape_html;
use crate::error::{Result, SceneError};
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Roughly 60 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Wrap a document in a sandboxed iframe.
pub fn embed_frame(document: &str) -> String {
    format!(
        "<iframe sandbox=\"allow-scripts allow-same-origin\" title=\"Voxel scene preview\" srcdoc=\"{}\"></iframe>",
        escape_html(document)
    )
}

/// State of one document's runtime.
#[derive(Debug)]
pub struct SceneRuntime {
    channel: ControlChannel,
    frames: u64,
    handled: u64,
    ignored: u64,
}

impl SceneRuntime {
    pub fn new(channel: ControlChannel) -> Self {
        Self {
            channel,
            frames: 0,
            handled: 0,
            ignored: 0,
        }
    }

    fn receive(&mut self, raw: &str) {
        if self.channel.handle_raw(raw) {
            self.handled += 1;
        } else {
            self.ignored += 1;
        }
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            state: self.channel.state(),
            environment: self.channel.environment(),
            instructions_visible: self.channel.instructions_visible(),
            frames: self.frames,
            messages_handled: self.handled,
            messages_ignored: self.ignored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeSnapshot {
    pub state: ChannelState,
    pub environment: EnvironmentState,
    pub instructions_visible: bool,
    pub frames: u64,
    pub messages_handled: u64,
    pub messages_ignored: u64,
}

enum Command {
    Post(String),
    Snapshot(Sender<RuntimeSnapshot>),
}

/// Stops a frame loop. Cancelling twice is harmless.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Sender<()>,
}

impl CancelHandle {
    fn new() -> (Self, Receiver<()>) {
        let (sender, receiver) = bounded(1);
        (Self { sender }, receiver)
    }

    pub fn cancel(&self) {
        let _ = self.sender.try_send(());
    }
}

fn frame_loop(
    mut runtime: SceneRuntime,
    mailbox: Receiver<Command>,
    cancel: Receiver<()>,
    interval: Duration,
) -> RuntimeSnapshot {
    let ticker = tick(interval);
    loop {
        select! {
            recv(cancel) -> _ => break,
            recv(mailbox) -> command => match command {
                Ok(Command::Post(raw)) => runtime.receive(&raw),
                Ok(Command::Snapshot(reply)) => {
                    let _ = reply.send(runtime.snapshot());
                }
                // Host dropped without tearing down.
                Err(_) => break,
            },
            recv(ticker) -> _ => runtime.frames += 1,
        }
    }
    log::debug!("frame loop stopped after {} frame(s)", runtime.frames);
    runtime.snapshot()
}

struct Mounted {
    html: String,
    mailbox: Sender<Command>,
    cancel: CancelHandle,
    handle: JoinHandle<RuntimeSnapshot>,
}

/// Hosts at most one live document.
pub struct PreviewHost {
    frame_interval: Duration,
    current: Option<Mounted>,
}

impl Default for PreviewHost {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl PreviewHost {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            current: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.current.is_some()
    }

    /// The live document, if any.
    pub fn document(&self) -> Option<&str> {
        self.current.as_ref().map(|mounted| mounted.html.as_str())
    }

    pub fn cancel_handle(&self) -> Option<CancelHandle> {
        self.current.as_ref().map(|mounted| mounted.cancel.clone())
    }

    /// Replace the live document. Any previous runtime is torn down first.
    pub fn mount(&mut self, html: String, channel: ControlChannel) -> Result<()> {
        self.teardown();

        let (mailbox, inbox) = unbounded();
        let (cancel, cancelled) = CancelHandle::new();
        let interval = self.frame_interval;
        let runtime = SceneRuntime::new(channel);
        let handle = thread::Builder::new()
            .name("scene-frame-loop".to_string())
            .spawn(move || frame_loop(runtime, inbox, cancelled, interval))?;

        log::debug!("mounted document ({} bytes)", html.len());
        self.current = Some(Mounted {
            html,
            mailbox,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Build from generator output and mount the result.
    pub fn rebuild(&mut self, builder: &mut SceneBuilder, generated: &str) -> Result<BuildOutput> {
        let output = builder.build(generated)?;
        let config = builder.config();
        let channel = ControlChannel::new(config.initial_environment, config.lighting)
            .with_instructions_visible(config.instructions_visible);
        self.mount(output.html.clone(), channel)?;
        Ok(output)
    }

    pub fn post(&self, message: &ControlMessage) -> Result<()> {
        self.post_raw(&message.to_json()?)
    }

    /// Deliver a raw payload, as `postMessage` would.
    pub fn post_raw(&self, raw: &str) -> Result<()> {
        self.send(Command::Post(raw.to_string()))
    }

    pub fn snapshot(&self) -> Result<RuntimeSnapshot> {
        let (reply, response) = bounded(1);
        self.send(Command::Snapshot(reply))?;
        response
            .recv()
            .map_err(|_| SceneError::Host("frame loop stopped before replying".to_string()))
    }

    fn send(&self, command: Command) -> Result<()> {
        let mounted = self
            .current
            .as_ref()
            .ok_or_else(|| SceneError::Host("no document mounted".to_string()))?;
        mounted
            .mailbox
            .send(command)
            .map_err(|_| SceneError::Host("frame loop is not running".to_string()))
    }

    /// Cancel and join the live frame loop, returning its final state.
    pub fn teardown(&mut self) -> Option<RuntimeSnapshot> {
        let mounted = self.current.take()?;
        mounted.cancel.cancel();
        drop(mounted.mailbox);
        match mounted.handle.join() {
            Ok(snapshot) => Some(snapshot),
            Err(_) => {
                log::warn!("frame loop panicked");
                None
            }
        }
    }
}

impl Drop for PreviewHost {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::control::LightingConfig;

    fn channel() -> ControlChannel {
        ControlChannel::new(EnvironmentState::default(), LightingConfig::default())
    }

    fn host() -> PreviewHost {
        PreviewHost::new(Duration::from_millis(1))
    }

    #[test]
    fn test_messages_reach_runtime_in_order() {
        let mut host = host();
        host.mount("<html></html>".to_string(), channel()).unwrap();

        let before = host.snapshot().unwrap();
        assert_eq!(before.state, ChannelState::AwaitingFirstEnvironmentUpdate);

        host.post(&ControlMessage::Environment {
            sunlight: 0.6,
            godrays: 0.9,
        })
        .unwrap();
        host.post(&ControlMessage::ToggleInstructions).unwrap();
        host.post_raw("{\"type\":\"resize\"}").unwrap();
        host.post_raw("garbage").unwrap();

        let after = host.snapshot().unwrap();
        assert_eq!(after.state, ChannelState::Live);
        assert_eq!(after.environment, EnvironmentState::new(0.6, 0.9));
        assert!(!after.instructions_visible);
        assert_eq!(after.messages_handled, 2);
        assert_eq!(after.messages_ignored, 2);
    }

    #[test]
    fn test_frames_tick_until_teardown() {
        let mut host = host();
        host.mount("<html></html>".to_string(), channel()).unwrap();
        thread::sleep(Duration::from_millis(30));
        let last = host.teardown().unwrap();
        assert!(last.frames > 0);
        assert!(!host.is_mounted());
        assert!(matches!(host.snapshot(), Err(SceneError::Host(_))));
        assert!(host.teardown().is_none());
    }

    #[test]
    fn test_cancel_handle_stops_loop() {
        let mut host = host();
        host.mount("<html></html>".to_string(), channel()).unwrap();
        let cancel = host.cancel_handle().unwrap();
        cancel.cancel();
        cancel.cancel();
        // The loop exits; the next teardown still joins cleanly.
        assert!(host.teardown().is_some());
    }

    #[test]
    fn test_remount_replaces_runtime() {
        let mut host = host();
        host.mount("<html>one</html>".to_string(), channel()).unwrap();
        host.post(&ControlMessage::ToggleInstructions).unwrap();
        host.mount("<html>two</html>".to_string(), channel()).unwrap();

        assert_eq!(host.document(), Some("<html>two</html>"));
        let fresh = host.snapshot().unwrap();
        assert!(fresh.instructions_visible);
        assert_eq!(fresh.messages_handled, 0);
    }

    #[test]
    fn test_rebuild_mounts_built_document() {
        let mut host = host();
        let mut builder = SceneBuilder::new(SceneConfig {
            instructions_visible: false,
            ..SceneConfig::default()
        });
        let output = host.rebuild(&mut builder, "place(0, 0, 0, 'stone');").unwrap();
        assert_eq!(host.document(), Some(output.html.as_str()));
        assert!(!host.snapshot().unwrap().instructions_visible);
    }

    #[test]
    fn test_embed_frame_is_sandboxed_and_escaped() {
        let frame = embed_frame("<p class=\"x\">a & b</p>");
        assert!(frame.starts_with("<iframe sandbox=\"allow-scripts allow-same-origin\""));
        assert!(frame.contains("srcdoc=\"&lt;p class=&quot;x&quot;&gt;a &amp; b&lt;/p&gt;\""));
        assert!(frame.ends_with("</iframe>"));
    }
}
