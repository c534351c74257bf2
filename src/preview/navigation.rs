//! Slot-to-slot navigation across pages
//!
//! The staging bar steps through every slot that has variants, in name
//! order. When the next slot lives on another page the bar navigates there
//! with `?preview=1&slot=<name>` and stashes the slot name, so the freshly
//! loaded page reopens the preview on it.

use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::Direction;
use crate::manifest::Manifest;

const QUERY_ORIGIN: &str = "http://preview.local/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMove {
    pub slot: String,
    /// Set when the slot is shown on a page other than the current one
    pub navigate_to: Option<String>,
}

/// Static slot → page lookup
#[derive(Debug, Clone, Default)]
pub struct SlotNavigator {
    slot_pages: BTreeMap<String, String>,
}

impl SlotNavigator {
    pub fn new(slot_pages: BTreeMap<String, String>) -> Self {
        Self { slot_pages }
    }

    pub fn page_for(&self, slot: &str) -> Option<&str> {
        self.slot_pages.get(slot).map(String::as_str)
    }

    /// Next or previous slot with at least one variant, wrapping around
    ///
    /// With no current slot (or one without variants) `Next` starts at the
    /// first slot and `Prev` at the last. Returns `None` when no slot has
    /// variants.
    pub fn cycle_slot(
        &self,
        manifest: &Manifest,
        current: Option<&str>,
        direction: Direction,
        current_page: &str,
    ) -> Option<SlotMove> {
        let slots = manifest.slots_with_files();
        if slots.is_empty() {
            return None;
        }

        let position = current.and_then(|name| slots.iter().position(|s| *s == name));
        let target = match (position, direction) {
            (Some(index), direction) => direction.step(index, slots.len()),
            (None, Direction::Next) => 0,
            (None, Direction::Prev) => slots.len() - 1,
        };
        let slot = slots[target];

        let navigate_to = self
            .page_for(slot)
            .filter(|page| !same_page(page, current_page))
            .map(|page| preview_url(page, slot));

        Some(SlotMove {
            slot: slot.to_string(),
            navigate_to,
        })
    }
}

fn same_page(a: &str, b: &str) -> bool {
    let normalize = |p: &str| {
        let path = p.split(['?', '#']).next().unwrap_or(p);
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() { "/" } else { trimmed }.to_string()
    };
    normalize(a) == normalize(b)
}

/// `page` with the preview query parameters for `slot`
pub fn preview_url(page: &str, slot: &str) -> String {
    let Ok(mut url) = Url::parse(QUERY_ORIGIN).and_then(|origin| origin.join(page)) else {
        return format!("{page}?preview=1");
    };
    url.query_pairs_mut()
        .clear()
        .append_pair("preview", "1")
        .append_pair("slot", slot);

    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

/// `preview=1` or `preview=true` in a query string
pub fn preview_mode_from_query(query: &str) -> bool {
    query_value(query, "preview")
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn slot_from_query(query: &str) -> Option<String> {
    query_value(query, "slot").filter(|slot| !slot.is_empty())
}

fn query_value(query: &str, key: &str) -> Option<String> {
    let url = Url::parse(&format!("{QUERY_ORIGIN}?{}", query.trim_start_matches('?'))).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Short-lived hand-off of the target slot across a page navigation
#[derive(Debug)]
pub struct NavigationStash {
    ttl: Duration,
    entry: Mutex<Option<(String, Instant)>>,
}

impl NavigationStash {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn stash(&self, slot: &str) {
        *self.lock() = Some((slot.to_string(), Instant::now()));
    }

    /// Stashed slot if still fresh; the entry is consumed either way
    pub fn take(&self) -> Option<String> {
        self.take_at(Instant::now())
    }

    pub fn take_at(&self, now: Instant) -> Option<String> {
        let (slot, stashed_at) = self.lock().take()?;
        (now.saturating_duration_since(stashed_at) <= self.ttl).then_some(slot)
    }

    fn lock(&self) -> MutexGuard<'_, Option<(String, Instant)>> {
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
