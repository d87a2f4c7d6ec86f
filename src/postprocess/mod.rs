//! Post-processing of text returned by an external generator.
//!
//! All functions here are pure string transforms that never fail: malformed
//! input degrades to a best-effort result rather than an error.

mod camera;
mod extract;
mod overlay;

pub use camera::rescale_initial_camera;
pub(crate) use camera::format_number;
pub use extract::{extract_document, is_complete_document};
pub use overlay::{suppress_overlay_text, BUILD_GUIDE_ID, OVERLAY_STYLE_ID};
