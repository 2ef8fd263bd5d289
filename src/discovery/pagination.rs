//! Structured pagination over the chapter listing (discovery strategy A).
//!
//! A bounded state machine over `PageCursor`: enumerate the rows of each
//! numbered page, reveal each row's viewer reference, and always return to
//! the originating page by explicit page number, never through a history
//! stack, which drifts on SPA listings. Every loop carries an explicit
//! bound: the page bound, the group-advance bound, the visited-page set,
//! and the optional row-attempt cap.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::Chapter;
use super::surface::{self, ListingSurface, SurfaceError};

/// Ephemeral traversal position. `total_pages` is estimated from the
/// listing's declared item total; when the listing shows no total the
/// traversal runs under `max_pages_bound` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub current_page: u32,
    pub total_pages: Option<u32>,
    pub total_items: Option<u32>,
}

impl PageCursor {
    pub fn new(current_page: u32, total_items: Option<u32>, items_per_page: u32) -> Self {
        let total_pages = total_items.map(|total| total.div_ceil(items_per_page.max(1)));
        Self {
            current_page,
            total_pages,
            total_items,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationOptions {
    pub items_per_page: u32,
    pub max_group_advances: u32,
    pub max_pages_bound: u32,
    /// Cap on row *attempts*, not pages; reaching it stops the traversal
    /// before any further page is requested.
    pub row_cap: Option<usize>,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            items_per_page: 20,
            max_group_advances: 40,
            max_pages_bound: 200,
            row_cap: None,
        }
    }
}

/// Walk the listing page by page, capturing one viewer reference per row.
///
/// `reauth` is invoked (at most once per logged-out detection) when the
/// surface heuristically looks signed out; returning false, or remaining
/// signed out after re-authentication, aborts the traversal. An empty
/// result is not an error: the caller falls back to the sequential
/// walker.
pub fn collect_chapters<S, R>(
    surface: &mut S,
    listing_url: &str,
    opts: &PaginationOptions,
    mut reauth: R,
) -> Result<Vec<Chapter>, SurfaceError>
where
    S: ListingSurface + ?Sized,
    R: FnMut(&mut S) -> bool,
{
    surface::normalize_surface(surface);
    if !surface.listing_ready() {
        info!(target: "toc", "chapter list container not found; structured pagination unavailable");
        return Ok(Vec::new());
    }

    let mut cursor = PageCursor::new(
        surface.current_page().unwrap_or(1),
        surface.total_items(),
        opts.items_per_page,
    );
    info!(
        target: "toc",
        "listing: total_items={:?} items_per_page={} total_pages={:?}",
        cursor.total_items, opts.items_per_page, cursor.total_pages
    );

    let page_bound = cursor.total_pages.unwrap_or(opts.max_pages_bound);
    let mut chapters: Vec<Chapter> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut visited_pages: HashSet<u32> = HashSet::new();
    let mut items_tried = 0usize;

    for _ in 0..page_bound {
        if opts.row_cap.is_some_and(|cap| items_tried >= cap) {
            break;
        }

        cursor.current_page = surface.current_page().unwrap_or(cursor.current_page);
        let page = cursor.current_page;
        if !visited_pages.insert(page) {
            debug!(target: "toc", "page {page} already processed; stopping traversal");
            break;
        }

        let count = surface.row_count();
        debug!(target: "toc", "page {page}: {count} rows");

        let mut limit = count;
        if let Some(cap) = opts.row_cap {
            let remaining = cap.saturating_sub(items_tried);
            if remaining == 0 {
                break;
            }
            limit = limit.min(remaining);
        }

        let mut new_on_page = 0usize;
        let mut row = 0usize;
        while row < limit {
            if surface::looks_logged_out(surface) {
                recover_session(surface, listing_url, page, opts, &mut reauth)?;
                // Resume at the same row index on the restored page.
                continue;
            }

            let label = row_label(surface, row, chapters.len() + 1);
            let reference = reveal_reference(surface, row, listing_url, page, opts)?;
            items_tried += 1;
            row += 1;

            let Some(reference) = reference else {
                debug!(target: "toc", "page {page} row {}: no reference revealed", row - 1);
                continue;
            };
            if !surface::is_viewer_reference(&reference) || !seen.insert(reference.clone()) {
                continue;
            }
            debug!(target: "toc", "captured {reference} ({label})");
            new_on_page += 1;
            chapters.push(Chapter {
                index: chapters.len() as u32 + 1,
                title: label,
                reference,
            });
            if opts.row_cap.is_some_and(|cap| chapters.len() >= cap) {
                return Ok(chapters);
            }
        }

        // A non-final page that yields nothing new usually means the
        // configured items_per_page no longer matches the remote listing.
        if new_on_page == 0 && count > 0 && cursor.total_pages.is_some_and(|tp| page < tp) {
            warn!(
                target: "toc",
                "page {page} yielded no new references; items_per_page={} may not match the listing",
                opts.items_per_page
            );
        }

        if cursor.total_pages.is_some_and(|tp| page >= tp) {
            break;
        }
        if opts.row_cap.is_some_and(|cap| items_tried >= cap) {
            break;
        }

        let target = page + 1;
        match goto(surface, target, opts.max_group_advances) {
            Ok(true) => cursor.current_page = target,
            Ok(false) => {
                info!(target: "toc", "page {target} unreachable; stopping with partial results");
                break;
            }
            Err(err) => {
                warn!(target: "toc", "advancing to page {target} failed: {err}");
                break;
            }
        }
    }

    Ok(chapters)
}

/// Navigate the pagination control to `target`.
///
/// Idempotent: a no-op when the control already shows `target`. Otherwise
/// tries the direct numeric control, then advances the window with the
/// "next group" control up to `max_group_advances` times. `Ok(false)` means
/// the page never became selectable; callers stop with partial results.
pub fn goto<S: ListingSurface + ?Sized>(
    surface: &mut S,
    target: u32,
    max_group_advances: u32,
) -> Result<bool, SurfaceError> {
    if surface.current_page() == Some(target) {
        return Ok(true);
    }

    if surface.page_control_visible(target) {
        surface.select_page(target)?;
        return Ok(surface.current_page() == Some(target));
    }

    for _ in 0..max_group_advances {
        if !surface.advance_page_group() {
            return Ok(false);
        }
        if surface.page_control_visible(target) {
            surface.select_page(target)?;
            return Ok(surface.current_page() == Some(target));
        }
    }
    Ok(false)
}

/// Reveal one row's reference: open it and capture the resulting location,
/// then re-navigate to the explicit originating page; fall back to a
/// reference embedded in the row markup.
fn reveal_reference<S>(
    surface: &mut S,
    row: usize,
    listing_url: &str,
    page: u32,
    opts: &PaginationOptions,
) -> Result<Option<String>, SurfaceError>
where
    S: ListingSurface + ?Sized,
{
    let before = surface.location();
    let captured = surface.open_row(row);

    if surface.location() != before {
        surface.navigate(listing_url)?;
        surface::normalize_surface(surface);
        surface.listing_ready();
        goto(surface, page, opts.max_group_advances)?;
    }

    match captured {
        Some(reference) if surface::is_viewer_reference(&reference) => Ok(Some(reference)),
        _ => Ok(surface.row_embedded_reference(row)),
    }
}

fn recover_session<S, R>(
    surface: &mut S,
    listing_url: &str,
    page: u32,
    opts: &PaginationOptions,
    reauth: &mut R,
) -> Result<(), SurfaceError>
where
    S: ListingSurface + ?Sized,
    R: FnMut(&mut S) -> bool,
{
    warn!(target: "toc", "login surface detected mid-traversal; re-authenticating");
    if !reauth(surface) {
        return Err(SurfaceError::ReauthFailed);
    }
    surface.navigate(listing_url)?;
    surface::normalize_surface(surface);
    surface.listing_ready();
    goto(surface, page, opts.max_group_advances)?;

    // One recovery per detection; a second consecutive failure is surfaced.
    if surface::looks_logged_out(surface) {
        return Err(SurfaceError::ReauthFailed);
    }
    Ok(())
}

fn row_label<S: ListingSurface + ?Sized>(surface: &S, row: usize, fallback_index: usize) -> String {
    let number = surface.row_number_text(row).unwrap_or_default();
    let title = surface.row_title_text(row).unwrap_or_default();
    let joined = format!("{} {}", number.trim(), title.trim())
        .trim()
        .to_string();
    if joined.is_empty() {
        format!("Chapter {fallback_index}")
    } else {
        joined
    }
}
