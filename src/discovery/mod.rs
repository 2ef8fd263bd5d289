//! Chapter discovery: structured pagination, the next-link fallback walker,
//! and the dedup/ordering finalizer, all running against an abstract
//! rendered-listing surface.

pub mod finalize;
pub mod pagination;
pub mod surface;
pub mod walker;

use serde::Serialize;

/// One discovered chapter. `index` reflects discovery order until the
/// finalizer re-numbers the merged list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub index: u32,
    pub title: String,
    pub reference: String,
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory surface used by the discovery tests.

    use std::collections::HashMap;

    use regex::Regex;

    use super::surface::{ListingSurface, SurfaceError};

    #[derive(Debug, Clone, Default)]
    pub struct FakeRow {
        pub number_text: Option<String>,
        pub title: Option<String>,
        /// Location reached by clicking the row.
        pub click_target: Option<String>,
        /// Reference embedded in the row markup.
        pub embedded: Option<String>,
    }

    impl FakeRow {
        pub fn clickable(n: u32, target: &str) -> Self {
            Self {
                number_text: Some(format!("{n}.")),
                title: Some(format!("Episode {n}")),
                click_target: Some(target.to_string()),
                embedded: None,
            }
        }

        pub fn embedded_only(n: u32, href: &str) -> Self {
            Self {
                number_text: Some(format!("{n}.")),
                title: Some(format!("Episode {n}")),
                click_target: None,
                embedded: Some(href.to_string()),
            }
        }
    }

    /// Pages are keyed by their 1-based number; the numeric pagination
    /// window exposes `window_size` page buttons at a time.
    pub struct FakeSurface {
        pub listing_url: String,
        pub pages: Vec<Vec<FakeRow>>,
        pub total_items: Option<u32>,
        pub window_start: u32,
        pub window_size: u32,
        pub current_page: u32,
        pub location: String,
        /// Every mutating interaction, for assertions.
        pub actions: Vec<String>,
        /// Affordance label -> location reached by activating it.
        pub affordances: Vec<(String, String)>,
        /// Per-location next-link map for walker tests.
        pub next_of: HashMap<String, String>,
        pub titles: HashMap<String, String>,
        pub html: HashMap<String, String>,
        pub rel_next: HashMap<String, String>,
        pub sign_in_visible: bool,
        /// Navigations remaining until `sign_in_visible` clears (reauth tests).
        pub reauth_heals_after: Option<u32>,
        pub first_embedded: Option<String>,
        /// Remaining successful "next group" clicks, `None` = unlimited.
        pub group_advance_budget: Option<u32>,
    }

    impl FakeSurface {
        pub fn new(listing_url: &str, pages: Vec<Vec<FakeRow>>) -> Self {
            Self {
                listing_url: listing_url.to_string(),
                pages,
                total_items: None,
                window_start: 1,
                window_size: 5,
                current_page: 1,
                location: listing_url.to_string(),
                actions: Vec::new(),
                affordances: Vec::new(),
                next_of: HashMap::new(),
                titles: HashMap::new(),
                html: HashMap::new(),
                rel_next: HashMap::new(),
                sign_in_visible: false,
                reauth_heals_after: None,
                first_embedded: None,
                group_advance_budget: None,
            }
        }

        pub fn empty(listing_url: &str) -> Self {
            Self::new(listing_url, Vec::new())
        }

        fn rows(&self) -> &[FakeRow] {
            let idx = (self.current_page as usize).saturating_sub(1);
            self.pages.get(idx).map(Vec::as_slice).unwrap_or(&[])
        }

        pub fn action_count(&self, prefix: &str) -> usize {
            self.actions
                .iter()
                .filter(|a| a.starts_with(prefix))
                .count()
        }

        fn matches_any(patterns: &[&str], label: &str) -> bool {
            patterns
                .iter()
                .any(|p| Regex::new(p).map(|re| re.is_match(label)).unwrap_or(false))
        }
    }

    impl ListingSurface for FakeSurface {
        fn location(&self) -> String {
            self.location.clone()
        }

        fn navigate(&mut self, reference: &str) -> Result<(), SurfaceError> {
            self.actions.push(format!("nav:{reference}"));
            self.location = reference.to_string();
            if reference == self.listing_url {
                // A fresh listing load always lands on page 1.
                self.current_page = 1;
                self.window_start = 1;
            }
            if let Some(left) = self.reauth_heals_after.as_mut() {
                if *left == 0 {
                    self.sign_in_visible = false;
                } else {
                    *left -= 1;
                }
            }
            Ok(())
        }

        fn listing_ready(&mut self) -> bool {
            !self.pages.is_empty()
        }

        fn page_title(&self) -> Option<String> {
            self.titles.get(&self.location).cloned()
        }

        fn content_html(&self) -> String {
            self.html.get(&self.location).cloned().unwrap_or_default()
        }

        fn total_items(&self) -> Option<u32> {
            self.total_items
        }

        fn current_page(&self) -> Option<u32> {
            (self.location == self.listing_url).then_some(self.current_page)
        }

        fn row_count(&self) -> usize {
            self.rows().len()
        }

        fn row_number_text(&self, row: usize) -> Option<String> {
            self.rows().get(row)?.number_text.clone()
        }

        fn row_title_text(&self, row: usize) -> Option<String> {
            self.rows().get(row)?.title.clone()
        }

        fn open_row(&mut self, row: usize) -> Option<String> {
            self.actions
                .push(format!("open:{}:{row}", self.current_page));
            let target = self.rows().get(row)?.click_target.clone()?;
            self.location = target.clone();
            Some(target)
        }

        fn row_embedded_reference(&self, row: usize) -> Option<String> {
            self.rows().get(row)?.embedded.clone()
        }

        fn page_control_visible(&self, page: u32) -> bool {
            page >= self.window_start && page < self.window_start + self.window_size
        }

        fn select_page(&mut self, page: u32) -> Result<(), SurfaceError> {
            self.actions.push(format!("select:{page}"));
            if !self.page_control_visible(page) {
                return Err(SurfaceError::Interaction(format!(
                    "page control {page} not in window"
                )));
            }
            self.current_page = page;
            Ok(())
        }

        fn advance_page_group(&mut self) -> bool {
            self.actions.push("group+".to_string());
            if let Some(budget) = self.group_advance_budget.as_mut() {
                if *budget == 0 {
                    return false;
                }
                *budget -= 1;
            }
            let last_page = self.pages.len() as u32;
            if self.window_start + self.window_size > last_page {
                return false;
            }
            self.window_start += self.window_size;
            true
        }

        fn affordance_visible(&self, patterns: &[&str]) -> bool {
            if self.sign_in_visible && Self::matches_any(patterns, "Sign In") {
                return true;
            }
            self.affordances
                .iter()
                .any(|(label, _)| Self::matches_any(patterns, label))
        }

        fn activate_affordance(&mut self, patterns: &[&str]) -> Option<String> {
            let hit = self
                .affordances
                .iter()
                .find(|(label, _)| Self::matches_any(patterns, label))
                .map(|(label, target)| (label.clone(), target.clone()));
            if let Some((label, target)) = hit {
                self.actions.push(format!("activate:{label}"));
                self.location = target.clone();
                return Some(target);
            }
            // Walker-style "next" affordances depend on the current page.
            if let Some(next) = self.next_of.get(&self.location).cloned() {
                if Self::matches_any(patterns, "Next") || Self::matches_any(patterns, "›") {
                    self.actions.push(format!("next-from:{}", self.location));
                    self.location = next.clone();
                    return Some(next);
                }
            }
            None
        }

        fn dismiss(&mut self, _patterns: &[&str]) -> bool {
            false
        }

        fn first_reference_matching(&self, pattern: &str) -> Option<String> {
            let re = Regex::new(pattern).ok()?;
            self.first_embedded
                .iter()
                .find(|href| re.is_match(href))
                .cloned()
        }

        fn rel_next_reference(&self) -> Option<String> {
            self.rel_next.get(&self.location).cloned()
        }
    }
}
