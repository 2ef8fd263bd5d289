//! Sequential next-link walking (discovery strategy B).
//!
//! Used only when structured pagination yields nothing usable: seed one
//! viewer reference, then follow "next" affordances until they run out, a
//! reference repeats, or the step bound is reached.

use std::collections::HashSet;

use tracing::{debug, info};

use super::Chapter;
use super::surface::{self, ListingSurface};

pub const DEFAULT_MAX_STEPS: usize = 300;

#[derive(Debug, Clone, Copy)]
pub struct WalkerOptions {
    pub max_steps: usize,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Find a starting viewer reference on the current page: activate a
/// start/continue affordance and capture where it lands, else take the
/// first embedded link with the viewer shape.
pub fn seed_start_reference<S: ListingSurface + ?Sized>(surface: &mut S) -> Option<String> {
    if let Some(location) = surface.activate_affordance(&surface::START_LABELS) {
        surface::normalize_surface(surface);
        if surface::is_viewer_reference(&location) {
            debug!(target: "toc", "walker seeded by start affordance: {location}");
            return Some(location);
        }
    }
    let found = surface.first_reference_matching(surface::VIEWER_REFERENCE_PATTERN);
    if let Some(reference) = found.as_deref() {
        debug!(target: "toc", "walker seeded by embedded link: {reference}");
    }
    found
}

/// Follow "next" affordances from `start`, collecting one chapter per page.
/// A failed navigation ends the walk with whatever was gathered; it never
/// aborts the run.
pub fn walk_next_chapters<S: ListingSurface + ?Sized>(
    surface: &mut S,
    start: &str,
    opts: &WalkerOptions,
) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut reference = start.to_string();

    for _ in 0..opts.max_steps {
        if reference.is_empty() || !seen.insert(reference.clone()) {
            debug!(target: "toc", "walker revisited {reference}; stopping");
            break;
        }

        if let Err(err) = surface.navigate(&reference) {
            info!(target: "toc", "walker navigation failed ({err}); stopping");
            break;
        }
        surface::normalize_surface(surface);

        let title = surface
            .page_title()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| format!("Chapter {}", chapters.len() + 1));
        chapters.push(Chapter {
            index: chapters.len() as u32 + 1,
            title,
            reference: reference.clone(),
        });

        let next = surface
            .activate_affordance(&surface::NEXT_LABELS)
            .or_else(|| surface.rel_next_reference());

        match next {
            Some(next) if next != reference => reference = next,
            _ => break,
        }
    }

    info!(target: "toc", "walker collected {} chapters", chapters.len());
    chapters
}
