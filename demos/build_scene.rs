//! Cottage demo scene.
//!
//!   cargo run --example build_scene
//!
//! Writes artifacts/cottage.html (the standalone document) and
//! artifacts/cottage_frame.html (the same document in a sandboxed iframe),
//! then drives the document through a preview host for a moment.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use voxel_scene::{
    host::{embed_frame, PreviewHost},
    ControlMessage, SceneBuilder, SceneConfig,
};

const GENERATED: &str = r#"
Here is a small cottage built from the picture:

```javascript
function wall(x0, x1, z0, z1, height, type) {
  for (let y = 1; y <= height; y++) {
    for (let x = x0; x <= x1; x++) {
      place(x, y, z0, type);
      place(x, y, z1, type);
    }
    for (let z = z0 + 1; z < z1; z++) {
      place(x0, y, z, type);
      place(x1, y, z, type);
    }
  }
}

function build() {
  // Foundation
  for (let x = -4; x <= 4; x++) {
    for (let z = -3; z <= 3; z++) {
      place(x, 0, z, 'cobblestone');
    }
  }

  wall(-4, 4, -3, 3, 3, 'oak_planks');

  // Corner posts
  for (const corner of [[-4, -3], [4, -3], [-4, 3], [4, 3]]) {
    for (let y = 1; y <= 3; y++) place(corner[0], y, corner[1], 'oak_log');
  }

  // Windows
  place(-2, 2, -3, 'glass');
  place(2, 2, -3, 'glass');

  // Stepped roof
  for (let layer = 0; layer < 4; layer++) {
    for (let x = -5 + layer; x <= 5 - layer; x++) {
      for (let z = -4; z <= 4; z++) {
        place(x, 4 + layer, z, 'bricks');
      }
    }
  }
}
```
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = SceneConfig::default().with_title("Cottage");
    let mut builder = SceneBuilder::new(config);

    let mut host = PreviewHost::default();
    let output = host.rebuild(&mut builder, GENERATED)?;

    println!(
        "Placed {} blocks over {} layers",
        output.guide.total_blocks(),
        output.guide.layers.len()
    );
    for (block_type, count) in &output.guide.totals {
        println!("  {:>5} x {}", count, block_type);
    }
    if let Some(error) = &output.error {
        println!("  Error: {}", error);
    }

    let out_dir = Path::new("artifacts");
    fs::create_dir_all(out_dir)?;
    fs::write(out_dir.join("cottage.html"), &output.html)?;
    fs::write(out_dir.join("cottage_frame.html"), embed_frame(&output.html))?;
    println!("Wrote {} bytes to artifacts/cottage.html", output.html.len());

    // Sweep through a day.
    for step in 0..=8 {
        let sunlight = f64::from(step) / 8.0;
        host.post(&ControlMessage::Environment { sunlight, godrays: 0.8 })?;
        thread::sleep(Duration::from_millis(20));
    }
    host.post(&ControlMessage::ToggleInstructions)?;

    if let Some(snapshot) = host.teardown() {
        println!(
            "Runtime rendered {} frames, handled {} messages, state {:?}",
            snapshot.frames, snapshot.messages_handled, snapshot.state
        );
    }

    Ok(())
}
