//! Read-side slot lookup for page rendering
//!
//! Answers "which path should slot X display" without any session state.
//! Resolution order for one slot:
//!
//! 1. missing slot, no files, or unreadable manifest → the caller's fallback
//! 2. the promoted `selectedPath`, whenever a selection exists
//! 3. `path` of the selected variant
//! 4. the first variant's path (absent selection, or dangling without a promoted path)
//!
//! Step 4 only helps in development, where unselected variants are still
//! served; production deployments should always have a selection.

use crate::manifest::{Manifest, ManifestStore, Slot};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SlotResolver {
    store: Arc<ManifestStore>,
}

impl SlotResolver {
    pub fn new(store: Arc<ManifestStore>) -> Self {
        Self { store }
    }

    /// Resolve against a fresh manifest read
    pub fn resolve(&self, slot: &str, fallback: Option<&str>) -> Option<String> {
        self.snapshot().resolve(slot, fallback)
    }

    pub fn resolve_versioned(&self, base: &str, fallback: Option<&str>) -> Option<String> {
        self.snapshot().resolve_versioned(base, fallback)
    }

    /// Load the manifest once for a render pass resolving many slots
    pub fn snapshot(&self) -> ResolverSnapshot {
        match self.store.load() {
            Ok(manifest) => ResolverSnapshot::from_manifest(manifest),
            Err(e) => {
                warn!(location = %self.store.location(), error = %e, "Manifest unavailable, using fallbacks");
                ResolverSnapshot { manifest: None }
            }
        }
    }
}

/// One manifest read; every lookup on it sees the same data
#[derive(Debug, Clone)]
pub struct ResolverSnapshot {
    manifest: Option<Manifest>,
}

impl ResolverSnapshot {
    pub fn from_manifest(manifest: Manifest) -> Self {
        Self {
            manifest: Some(manifest),
        }
    }

    pub fn resolve(&self, slot: &str, fallback: Option<&str>) -> Option<String> {
        self.manifest
            .as_ref()
            .and_then(|m| m.slot(slot))
            .and_then(resolve_slot)
            .or_else(|| fallback.map(str::to_string))
    }

    /// Resolve the newest version of `base` (`base`, `base-v2`, `base-v3`, ...)
    ///
    /// The highest version carrying a real selection wins. When no version
    /// has one, the highest version with any file is used.
    pub fn resolve_versioned(&self, base: &str, fallback: Option<&str>) -> Option<String> {
        let Some(manifest) = self.manifest.as_ref() else {
            return fallback.map(str::to_string);
        };

        let mut versions: Vec<(u32, &Slot)> = manifest
            .slots
            .iter()
            .filter_map(|(key, slot)| version_of(key, base).map(|v| (v, slot)))
            .collect();
        versions.sort_by(|a, b| b.0.cmp(&a.0));

        let selected = versions.iter().find_map(|(version, slot)| {
            selected_path(slot).inspect(|_| debug!(base, version, "Resolved versioned slot"))
        });

        selected
            .or_else(|| versions.iter().find_map(|(_, slot)| resolve_slot(slot)))
            .or_else(|| fallback.map(str::to_string))
    }
}

fn resolve_slot(slot: &Slot) -> Option<String> {
    if slot.files.is_empty() {
        return None;
    }
    selected_path(slot).or_else(|| slot.files.first().map(|f| f.path.clone()))
}

/// Path of the selected variant
///
/// A promoted `selectedPath` wins whenever a selection exists, even if the
/// generation-time entry is gone. Otherwise `None` when nothing or a missing
/// file is selected.
fn selected_path(slot: &Slot) -> Option<String> {
    slot.selected.as_ref()?;
    if let Some(promoted) = slot.selected_path.as_deref().filter(|p| !p.is_empty()) {
        return Some(promoted.to_string());
    }
    slot.selected_file().map(|file| file.path.clone())
}

/// Version number of `key` relative to `base`: `base` is 0, `base-v<N>` is N
pub fn version_of(key: &str, base: &str) -> Option<u32> {
    if key == base {
        return Some(0);
    }
    let digits = key.strip_prefix(base)?.strip_prefix("-v")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AspectRatio, GeneratedFile, MediaKind};
    use chrono::Utc;

    fn slot(name: &str, files: &[&str], selected: Option<&str>) -> Slot {
        let mut slot = Slot::new(name, "prompt", "model", AspectRatio::Landscape);
        slot.files = files
            .iter()
            .map(|f| GeneratedFile {
                filename: f.to_string(),
                path: format!("/generated/images/{name}/{f}"),
                generated_at: Utc::now(),
                duration_seconds: None,
            })
            .collect();
        slot.selected = selected.map(str::to_string);
        slot
    }

    fn snapshot(slots: Vec<Slot>) -> ResolverSnapshot {
        let mut manifest = Manifest::new();
        for s in slots {
            manifest.slots.insert(s.slot.clone(), s);
        }
        ResolverSnapshot::from_manifest(manifest)
    }

    #[test]
    fn test_fallback_chain() {
        let snap = snapshot(vec![
            slot("empty-slot", &[], None),
            slot("hero", &["hero-001.png", "hero-002.png"], Some("hero-002.png")),
        ]);

        assert_eq!(
            snap.resolve("missing-slot", Some("/fallback.png")),
            Some("/fallback.png".to_string())
        );
        assert_eq!(snap.resolve("empty-slot", None), None);
        assert_eq!(
            snap.resolve("hero", None),
            Some("/generated/images/hero/hero-002.png".to_string())
        );
    }

    #[test]
    fn test_selected_path_preferred() {
        let mut hero = slot("hero", &["hero-001.png"], Some("hero-001.png"));
        hero.selected_path = Some("/images/hero.png".to_string());
        let snap = snapshot(vec![hero]);

        assert_eq!(snap.resolve("hero", None), Some("/images/hero.png".to_string()));
    }

    #[test]
    fn test_promoted_path_survives_dangling_selection() {
        let mut hero = slot("hero", &["hero-001.png"], Some("hero-003.png"));
        hero.selected_path = Some("/images/hero.png".to_string());
        let mut about = slot("about", &["about-001.png"], None);
        about.selected_path = Some("/images/about.png".to_string());
        let mut base_v2 = slot("banner-v2", &["banner-v2-001.png"], Some("gone.png"));
        base_v2.selected_path = Some("/images/banner.png".to_string());
        let snap = snapshot(vec![
            hero,
            about,
            base_v2,
            slot("banner-v3", &["banner-v3-001.png"], None),
        ]);

        assert_eq!(snap.resolve("hero", None), Some("/images/hero.png".to_string()));
        // No selection: a leftover promoted path is ignored
        assert_eq!(
            snap.resolve("about", None),
            Some("/generated/images/about/about-001.png".to_string())
        );
        assert_eq!(
            snap.resolve_versioned("banner", None),
            Some("/images/banner.png".to_string())
        );
    }

    #[test]
    fn test_dangling_or_missing_selection_uses_first_file() {
        let snap = snapshot(vec![
            slot("dangling", &["dangling-003.png", "dangling-004.png"], Some("gone.png")),
            slot("unselected", &["unselected-001.png"], None),
        ]);

        assert_eq!(
            snap.resolve("dangling", Some("/fallback.png")),
            Some("/generated/images/dangling/dangling-003.png".to_string())
        );
        assert_eq!(
            snap.resolve("unselected", None),
            Some("/generated/images/unselected/unselected-001.png".to_string())
        );
    }

    #[test]
    fn test_versioned_prefers_highest_selected() {
        let snap = snapshot(vec![
            slot("base", &["base-001.png"], Some("base-001.png")),
            slot("base-v2", &["base-v2-001.png"], Some("base-v2-001.png")),
            slot("base-v3", &["base-v3-001.png"], None),
        ]);

        assert_eq!(
            snap.resolve_versioned("base", None),
            Some("/generated/images/base-v2/base-v2-001.png".to_string())
        );
    }

    #[test]
    fn test_versioned_numeric_order() {
        let snap = snapshot(vec![
            slot("base-v9", &["a.png"], Some("a.png")),
            slot("base-v10", &["b.png"], Some("b.png")),
        ]);

        assert_eq!(
            snap.resolve_versioned("base", None),
            Some("/generated/images/base-v10/b.png".to_string())
        );
    }

    #[test]
    fn test_versioned_without_selection_uses_highest_with_files() {
        let snap = snapshot(vec![
            slot("base", &["base-001.png"], None),
            slot("base-v2", &["base-v2-001.png"], None),
            slot("base-v3", &[], None),
        ]);

        assert_eq!(
            snap.resolve_versioned("base", Some("/fallback.png")),
            Some("/generated/images/base-v2/base-v2-001.png".to_string())
        );
        assert_eq!(
            snap.resolve_versioned("other", Some("/fallback.png")),
            Some("/fallback.png".to_string())
        );
    }

    #[test]
    fn test_version_of() {
        assert_eq!(version_of("hero", "hero"), Some(0));
        assert_eq!(version_of("hero-v2", "hero"), Some(2));
        assert_eq!(version_of("hero-v12", "hero"), Some(12));
        assert_eq!(version_of("hero-vx", "hero"), None);
        assert_eq!(version_of("hero-v2-extra", "hero"), None);
        assert_eq!(version_of("hero-v", "hero"), None);
        assert_eq!(version_of("heroes", "hero"), None);
    }

    #[test]
    fn test_unreadable_manifest_uses_fallback() {
        let store = Arc::new(ManifestStore::new(
            MediaKind::Image,
            Arc::new(crate::manifest::MemoryBackend::with_bytes("{broken")),
        ));
        let resolver = SlotResolver::new(store);

        assert_eq!(
            resolver.resolve("hero", Some("/fallback.png")),
            Some("/fallback.png".to_string())
        );
        assert_eq!(resolver.resolve_versioned("hero", None), None);
    }

    #[test]
    fn test_resolver_reads_store() {
        let store = Arc::new(ManifestStore::in_memory(MediaKind::Image));
        let mut manifest = Manifest::new();
        manifest
            .slots
            .insert("hero".to_string(), slot("hero", &["hero-001.png"], Some("hero-001.png")));
        store.save(&mut manifest).unwrap();

        let resolver = SlotResolver::new(store);
        assert_eq!(
            resolver.resolve("hero", None),
            Some("/generated/images/hero/hero-001.png".to_string())
        );
    }
}
