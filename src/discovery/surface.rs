//! The abstract rendered-listing surface and its declared pattern tables.
//!
//! Discovery never touches a browser directly: it drives this trait, which
//! an embedder backs with whatever renders the listing. The label tables
//! below are the authoritative affordance vocabulary; adding a variant
//! means adding a row here, not another inline check.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("navigation to {reference} failed: {detail}")]
    Navigation { reference: String, detail: String },
    #[error("surface interaction failed: {0}")]
    Interaction(String),
    #[error("still logged out after re-authentication")]
    ReauthFailed,
}

/// Consent/anti-bot dialog buttons, dismissed during state normalization.
pub const CONSENT_LABELS: [&str; 5] = [r"^I agree$", r"^Agree$", r"^Accept$", r"^Ok$", r"^Close$"];

/// "Next" affordances, in preference order: explicit labels across the
/// site's textual variants, then directional glyphs.
pub const NEXT_LABELS: [&str; 7] = [
    r"^Next$",
    r"^Next Episode$",
    r"^Next Chapter$",
    "^다음$",
    "^다음 화$",
    "^▶$",
    "^›$",
];

/// "Start/continue reading" affordances used to seed the fallback walker.
pub const START_LABELS: [&str; 4] = [r"^Start reading$", r"^Read$", r"^Start$", r"^Continue$"];

/// Sign-in affordance text: a weak logged-out signal that works well in
/// practice once cookies expire.
pub const SIGN_IN_LABEL: &str = r"^\s*Sign In\s*$";

/// Shape of a chapter-view reference.
pub const VIEWER_REFERENCE_PATTERN: &str = r"/viewer/\d+";

/// What the listing surface must expose. Implementations own their own
/// waiting: every method that can block is expected to apply a bounded
/// timeout internally and report "not found" rather than hang.
pub trait ListingSurface {
    fn location(&self) -> String;
    fn navigate(&mut self, reference: &str) -> Result<(), SurfaceError>;
    /// Bounded wait for the chapter-list container; false means the
    /// structured listing is not present on this surface.
    fn listing_ready(&mut self) -> bool;
    fn page_title(&self) -> Option<String>;
    fn content_html(&self) -> String;

    /// Listing header's declared total, when shown.
    fn total_items(&self) -> Option<u32>;
    /// The highlighted page number of the pagination control.
    fn current_page(&self) -> Option<u32>;

    fn row_count(&self) -> usize;
    fn row_number_text(&self, row: usize) -> Option<String>;
    fn row_title_text(&self, row: usize) -> Option<String>;
    /// Activate the row and capture the resulting location, bounded by the
    /// implementation's click timeout. The surface may be left on the
    /// revealed page; callers re-navigate explicitly.
    fn open_row(&mut self, row: usize) -> Option<String>;
    /// A reference embedded directly in the row's markup, when present.
    fn row_embedded_reference(&self, row: usize) -> Option<String>;

    /// Whether a direct numeric control for `page` is currently selectable.
    fn page_control_visible(&self, page: u32) -> bool;
    fn select_page(&mut self, page: u32) -> Result<(), SurfaceError>;
    /// Advance the pagination window ("next group"); false when no such
    /// control exists or it is exhausted.
    fn advance_page_group(&mut self) -> bool;

    fn affordance_visible(&self, patterns: &[&str]) -> bool;
    /// Activate the first affordance matching any pattern and return the
    /// resulting location (the link target, or wherever the click landed).
    fn activate_affordance(&mut self, patterns: &[&str]) -> Option<String>;
    /// Dismiss a dialog button matching any pattern; true when one was hit.
    fn dismiss(&mut self, patterns: &[&str]) -> bool;
    /// First embedded link whose target matches `pattern`.
    fn first_reference_matching(&self, pattern: &str) -> Option<String>;
    /// `rel="next"`-style affordance, the walker's last resort.
    fn rel_next_reference(&self) -> Option<String>;
}

/// Action taken when a normalization pattern matches.
#[derive(Debug, Clone, Copy)]
pub enum NormalizeAction {
    Dismiss,
}

/// The declared pattern → action table applied before and after every
/// navigation. Idempotent: matching nothing is the common case.
pub const SURFACE_NORMALIZERS: [(&str, NormalizeAction); 5] = [
    (r"^I agree$", NormalizeAction::Dismiss),
    (r"^Agree$", NormalizeAction::Dismiss),
    (r"^Accept$", NormalizeAction::Dismiss),
    (r"^Ok$", NormalizeAction::Dismiss),
    (r"^Close$", NormalizeAction::Dismiss),
];

pub fn normalize_surface<S: ListingSurface + ?Sized>(surface: &mut S) {
    for (pattern, action) in SURFACE_NORMALIZERS {
        match action {
            NormalizeAction::Dismiss => {
                if surface.dismiss(&[pattern]) {
                    break;
                }
            }
        }
    }
}

fn re_login_route() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)/auth|/login|/signin").expect("compile login route regex"))
}

fn re_viewer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VIEWER_REFERENCE_PATTERN).expect("compile viewer regex"))
}

/// Heuristic logged-out check: a login route, or a visible sign-in button.
pub fn looks_logged_out<S: ListingSurface + ?Sized>(surface: &S) -> bool {
    re_login_route().is_match(&surface.location())
        || surface.affordance_visible(&[SIGN_IN_LABEL])
}

pub fn is_viewer_reference(reference: &str) -> bool {
    re_viewer().is_match(reference)
}

/// Resolve a possibly protocol-relative or root-relative href against the
/// site base.
pub fn absolutize(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{}{href}", base.trim_end_matches('/'))
    } else {
        href.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::testing::FakeSurface;

    #[test]
    fn viewer_reference_shape() {
        assert!(is_viewer_reference(
            "https://global.novelpia.com/viewer/339345"
        ));
        assert!(!is_viewer_reference("https://global.novelpia.com/novel/1213"));
    }

    #[test]
    fn absolutize_handles_all_href_forms() {
        let base = "https://global.novelpia.com";
        assert_eq!(
            absolutize(base, "/viewer/1"),
            "https://global.novelpia.com/viewer/1"
        );
        assert_eq!(absolutize(base, "//cdn.example.com/x.jpg"), "https://cdn.example.com/x.jpg");
        assert_eq!(absolutize(base, "https://a/b"), "https://a/b");
    }

    #[test]
    fn logged_out_by_route_or_affordance() {
        let mut s = FakeSurface::empty("https://global.novelpia.com/novel/1");
        assert!(!looks_logged_out(&s));

        s.location = "https://global.novelpia.com/auth/signin".to_string();
        assert!(looks_logged_out(&s));

        s.location = "https://global.novelpia.com/novel/1".to_string();
        s.sign_in_visible = true;
        assert!(looks_logged_out(&s));
    }
}
