//! Sandboxed interpreter for block-placement programs.
//!
//! Programs are written in a small JavaScript-like language whose only
//! capability is `place(x, y, z, type)`. There is no access to the host:
//! the evaluator knows nothing beyond its own values, a pure `Math`
//! namespace and a `console` that forwards to the `log` facade.
//!
//! ```ignore
//! use voxel_scene::interpreter::{Interpreter, InterpreterConfig};
//!
//! let interpretation = Interpreter::new(InterpreterConfig::default()).run(
//!     "function build() { for (let x = 0; x < 4; x++) place(x, 0, 0, 'stone'); }",
//! );
//! assert_eq!(interpretation.voxels.len(), 4);
//! ```

mod ast;
mod eval;
mod lexer;
mod parser;

use crate::error::{Result, SceneError};
use crate::types::{Voxel, VoxelList};
use eval::{Limits, Machine};
use serde::{Deserialize, Serialize};

/// Half-width of the fallback bedrock platform.
const FALLBACK_RADIUS: i32 = 2;
/// Highest configurable function call nesting.
pub const MAX_CALL_DEPTH: usize = 128;

/// Sandbox settings for program execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Top-level function invoked after the program runs, unless already called.
    pub entry_point: String,
    /// Maximum evaluation steps (statements and calls).
    pub max_steps: u64,
    /// Maximum number of `place` calls.
    pub max_voxels: usize,
    /// Maximum function call nesting.
    pub max_call_depth: usize,
    /// Seed for `Math.random`.
    pub random_seed: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            entry_point: "build".to_string(),
            max_steps: 5_000_000,
            max_voxels: 100_000,
            max_call_depth: 64,
            random_seed: 0x5eed,
        }
    }
}

impl InterpreterConfig {
    pub fn with_entry_point(mut self, name: &str) -> Self {
        self.entry_point = name.to_string();
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_max_voxels(mut self, voxels: usize) -> Self {
        self.max_voxels = voxels;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.entry_point.trim().is_empty() {
            return Err(SceneError::Config("entry point name is empty".to_string()));
        }
        if self.max_steps == 0 || self.max_voxels == 0 {
            return Err(SceneError::Config(
                "interpreter step and voxel limits must be positive".to_string(),
            ));
        }
        if !(1..=MAX_CALL_DEPTH).contains(&self.max_call_depth) {
            return Err(SceneError::Config(format!(
                "interpreter call depth must be between 1 and {}, got {}",
                MAX_CALL_DEPTH, self.max_call_depth
            )));
        }
        Ok(())
    }
}

/// Why the fallback structure replaced the program's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum FallbackReason {
    /// The program failed to lex, parse or run.
    Failed(String),
    /// The program ran but placed nothing.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum Outcome {
    Placed,
    Fallback(FallbackReason),
}

/// Result of running a program: always a non-empty voxel list.
#[derive(Debug, Clone)]
pub struct Interpretation {
    pub voxels: VoxelList,
    pub outcome: Outcome,
}

impl Interpretation {
    pub fn used_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback(_))
    }

    /// The error message when the program failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Fallback(FallbackReason::Failed(message)) => Some(message),
            _ => None,
        }
    }
}

/// Runs placement programs under a fixed sandbox configuration.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    config: InterpreterConfig,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Execute a program and return exactly the voxels it placed.
    ///
    /// Errors are returned as-is; use [`Interpreter::run`] for the
    /// fallback behaviour.
    pub fn execute(&self, source: &str) -> Result<VoxelList> {
        let program = parser::parse_program(source)?;
        let limits = Limits {
            max_steps: self.config.max_steps,
            max_voxels: self.config.max_voxels,
            max_call_depth: self.config.max_call_depth,
        };
        let mut machine = Machine::new(limits, self.config.random_seed);
        let voxels = machine.run(&program, &self.config.entry_point)?;
        log::debug!(
            "program placed {} voxel(s) in {} step(s)",
            voxels.len(),
            machine.steps()
        );
        Ok(voxels)
    }

    /// Execute a program, substituting the fallback structure when it fails
    /// or places nothing. Partial output of a failed program is discarded.
    pub fn run(&self, source: &str) -> Interpretation {
        match self.execute(source) {
            Ok(voxels) if !voxels.is_empty() => Interpretation {
                voxels,
                outcome: Outcome::Placed,
            },
            Ok(_) => {
                log::warn!("program placed no voxels, using fallback structure");
                Interpretation {
                    voxels: fallback_structure(),
                    outcome: Outcome::Fallback(FallbackReason::Empty),
                }
            }
            Err(e) => {
                log::warn!("program failed ({}), using fallback structure", e);
                Interpretation {
                    voxels: fallback_structure(),
                    outcome: Outcome::Fallback(FallbackReason::Failed(e.to_string())),
                }
            }
        }
    }
}

/// A 5x5 bedrock platform at y = 0 centred on the origin, with a two-block
/// oak plank marker standing on its centre.
pub fn fallback_structure() -> VoxelList {
    let mut voxels = VoxelList::new();
    for x in -FALLBACK_RADIUS..=FALLBACK_RADIUS {
        for z in -FALLBACK_RADIUS..=FALLBACK_RADIUS {
            voxels.push(Voxel::new(x, 0, z, "bedrock"));
        }
    }
    voxels.push(Voxel::new(0, 1, 0, "oak_planks"));
    voxels.push(Voxel::new(0, 2, 0, "oak_planks"));
    voxels
}
