//! Hiding of leaked overlay text in generated or templated markup.

/// Element id of the build-guide panel. Never hidden by overlay suppression.
pub const BUILD_GUIDE_ID: &str = "build-guide";

/// Id of the injected `<style>` element.
pub const OVERLAY_STYLE_ID: &str = "overlay-suppression";

/// Overlay ids and classes commonly emitted by generated scenes.
const OVERLAY_SELECTORS: &[&str] = &[
    "#info",
    "#loading",
    "#loading-screen",
    "#loader",
    "#overlay",
    "#caption",
    "#title",
    "#instructions",
    "#description",
    ".info",
    ".info-panel",
    ".loading",
    ".loader",
    ".overlay",
    ".caption",
    ".label",
];

/// Inject a style block that force-hides known overlay elements.
///
/// The block goes before the first `</head>`, else before the first `</body>`,
/// else at the end of the document. The build-guide panel is exempt.
pub fn suppress_overlay_text(document: &str) -> String {
    let style = overlay_style();
    let lower = document.to_ascii_lowercase();

    let insert_at = lower.find("</head>").or_else(|| lower.find("</body>"));

    match insert_at {
        Some(pos) => {
            let mut out = String::with_capacity(document.len() + style.len());
            out.push_str(&document[..pos]);
            out.push_str(&style);
            out.push_str(&document[pos..]);
            out
        }
        None => {
            let mut out = String::with_capacity(document.len() + style.len());
            out.push_str(document);
            out.push_str(&style);
            out
        }
    }
}

fn overlay_style() -> String {
    let selectors = OVERLAY_SELECTORS
        .iter()
        .map(|selector| format!("{}:not(#{})", selector, BUILD_GUIDE_ID))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "<style id=\"{}\">{} {{ display: none !important; visibility: hidden !important; }}</style>",
        OVERLAY_STYLE_ID, selectors
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_injects_before_head_close() {
        let doc = "<html><head><title>x</title></head><body></body></html>";
        let out = suppress_overlay_text(doc);

        assert_eq!(count(&out, "</head>"), 1);
        let style_pos = out.find(OVERLAY_STYLE_ID).unwrap();
        let head_pos = out.find("</head>").unwrap();
        assert!(style_pos < head_pos);
        assert!(out.starts_with("<html><head><title>x</title>"));
        assert!(out.ends_with("</head><body></body></html>"));
    }

    #[test]
    fn test_uppercase_head_close() {
        let out = suppress_overlay_text("<HTML><HEAD></HEAD><BODY></BODY></HTML>");
        assert!(out.find(OVERLAY_STYLE_ID).unwrap() < out.find("</HEAD>").unwrap());
    }

    #[test]
    fn test_injects_before_body_close_without_head() {
        let doc = "<body><div id=\"info\">Loading...</div></body>";
        let out = suppress_overlay_text(doc);
        assert!(out.find(OVERLAY_STYLE_ID).unwrap() < out.find("</body>").unwrap());
        assert_eq!(count(&out, "</body>"), 1);
    }

    #[test]
    fn test_appends_without_closing_tags() {
        let doc = "<div class=\"caption\">Hello</div>";
        let out = suppress_overlay_text(doc);
        assert!(out.starts_with(doc));
        assert!(out[doc.len()..].starts_with("<style"));
        assert!(out.ends_with("</style>"));
    }

    #[test]
    fn test_build_guide_is_exempt() {
        let out = suppress_overlay_text("");
        assert!(out.contains("#info:not(#build-guide)"));
        assert!(out.contains(".overlay:not(#build-guide)"));
        assert!(!out.contains("#build-guide:not"));
    }
}
