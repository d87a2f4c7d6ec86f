//! # Voxel Scene
//!
//! Turns generated block-placement programs into self-contained, explorable
//! voxel scenes.
//!
//! ## Overview
//!
//! A content generator is asked to describe an image as a list of
//! `place(x, y, z, type)` commands. This library takes that free-form text,
//! runs the program in a sandbox, textures every block procedurally and
//! renders a single HTML document that draws the scene with three.js. The
//! only external reference in the document is the `three` module import.
//!
//! ## Quick Start
//!
//! ```ignore
//! use voxel_scene::{SceneBuilder, SceneConfig};
//!
//! let mut builder = SceneBuilder::new(SceneConfig::default());
//! let output = builder.build("place(0, 0, 0, 'stone'); place(0, 1, 0, 'grass_block');")?;
//!
//! std::fs::write("scene.html", &output.html)?;
//! println!("{} blocks over {} layers", output.guide.total_blocks(), output.guide.layers.len());
//! ```
//!
//! ## Driving a live document
//!
//! Documents listen for `postMessage` payloads. [`ControlMessage`] builds
//! them, and [`host::PreviewHost`] models a host page that owns one live
//! document at a time:
//!
//! ```ignore
//! use voxel_scene::{host::PreviewHost, ControlMessage};
//!
//! let mut host = PreviewHost::default();
//! host.rebuild(&mut builder, generated_text)?;
//! host.post(&ControlMessage::Environment { sunlight: 0.3, godrays: 0.8 })?;
//! ```

pub mod builder;
pub mod config;
pub mod control;
pub mod document;
pub mod error;
pub mod guide;
pub mod host;
pub mod interpreter;
pub mod postprocess;
pub mod scene;
pub mod texture;
pub mod types;

// Re-export main types for convenience
pub use builder::{BuildOutput, SceneBuilder};
pub use config::SceneConfig;
pub use control::{ChannelState, ControlChannel, ControlMessage, EnvironmentState, LightingConfig};
pub use error::{Result, SceneError};
pub use guide::BuildGuide;
pub use interpreter::{fallback_structure, Interpretation, Interpreter, InterpreterConfig, Outcome};
pub use postprocess::{extract_document, rescale_initial_camera, suppress_overlay_text};
pub use scene::{SceneAssembler, SceneDescription};
pub use types::{BoundingBox, Voxel, VoxelList};

#[cfg(feature = "wasm")]
pub mod wasm;
