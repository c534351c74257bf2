use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::client::StagingClient;
use super::navigation::{NavigationStash, SlotMove, SlotNavigator};
use super::{Direction, Result, SessionError};
use crate::api::models::{GenerateBody, VariantRef};
use crate::generator::BatchReport;
use crate::manifest::{GeneratedFile, Manifest, MediaKind, Slot};

/// Save request produced by cycling; run it with [`PreviewSession::persist_selection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCommand {
    pub slot: String,
    pub filename: String,
    pub index: usize,
}

impl SelectionCommand {
    fn variant(&self) -> VariantRef {
        VariantRef {
            slot: self.slot.clone(),
            filename: self.filename.clone(),
        }
    }
}

pub struct PreviewSession {
    client: Arc<dyn StagingClient>,
    kind: MediaKind,
    preview_mode: bool,
    manifest: Option<Manifest>,
    current_slot: Option<String>,
    variant_index: HashMap<String, usize>,
    last_error: Option<String>,
}

impl PreviewSession {
    pub fn new(client: Arc<dyn StagingClient>, kind: MediaKind) -> Self {
        Self {
            client,
            kind,
            preview_mode: false,
            manifest: None,
            current_slot: None,
            variant_index: HashMap::new(),
            last_error: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn is_preview_mode(&self) -> bool {
        self.preview_mode
    }

    pub fn set_preview_mode(&mut self, enabled: bool) {
        self.preview_mode = enabled;
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn current_slot(&self) -> Option<&str> {
        self.current_slot.as_deref()
    }

    pub fn variant_index(&self, slot: &str) -> Option<usize> {
        self.variant_index.get(slot).copied()
    }

    /// Most recent network failure, cleared by the next successful call
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Variant the session currently shows for `slot`
    pub fn current_file(&self, slot: &str) -> Option<&GeneratedFile> {
        let index = self.variant_index(slot)?;
        self.manifest.as_ref()?.slot(slot)?.files.get(index)
    }

    /// Re-fetch the manifest
    ///
    /// Indices derived from each slot's selection fill in only where the
    /// session has none yet; indices the operator navigated to are kept
    /// (clamped when the slot shrank).
    pub async fn refresh(&mut self) -> Result<()> {
        let result = self.client.fetch_manifest(self.kind).await;
        let manifest = self.record(result)?;

        let mut indices = HashMap::with_capacity(manifest.slots.len());
        for (name, slot) in &manifest.slots {
            let derived = slot.selected_index().unwrap_or(0);
            let index = match self.variant_index.get(name) {
                Some(&held) => held.min(slot.files.len().saturating_sub(1)),
                None => derived,
            };
            indices.insert(name.clone(), index);
        }

        if let Some(current) = &self.current_slot {
            if !manifest.slots.contains_key(current) {
                debug!(slot = %current, "Current slot no longer in manifest");
                self.current_slot = None;
            }
        }

        debug!(kind = %self.kind, slots = manifest.slots.len(), "Manifest refreshed");
        self.variant_index = indices;
        self.manifest = Some(manifest);
        Ok(())
    }

    /// Move the slot's index one step, wrapping at both ends
    ///
    /// Cycling is selecting: the returned command is what should be saved.
    pub fn cycle_variant(&mut self, slot: &str, direction: Direction) -> Result<SelectionCommand> {
        let entry = self.slot_with_files(slot)?;
        let len = entry.files.len();
        let current = self.variant_index.get(slot).copied().unwrap_or(0);
        let index = direction.step(current, len);
        let filename = entry.files[index].filename.clone();

        self.variant_index.insert(slot.to_string(), index);
        Ok(SelectionCommand {
            slot: slot.to_string(),
            filename,
            index,
        })
    }

    pub async fn persist_selection(&mut self, command: &SelectionCommand) -> Result<Slot> {
        let result = self.client.save_selection(self.kind, &command.variant()).await;
        let slot = self.record(result)?;

        info!(slot = %command.slot, filename = %command.filename, "Selection saved");
        self.replace_slot(slot.clone());
        Ok(slot)
    }

    /// Cycle and save; a failed save is logged and kept in `last_error`
    pub async fn cycle_and_persist(
        &mut self,
        slot: &str,
        direction: Direction,
    ) -> Option<SelectionCommand> {
        let command = match self.cycle_variant(slot, direction) {
            Ok(command) => command,
            Err(e) => {
                warn!(slot = %slot, error = %e, "Cannot cycle variants");
                self.last_error = Some(e.to_string());
                return None;
            }
        };

        if let Err(e) = self.persist_selection(&command).await {
            warn!(slot = %slot, filename = %command.filename, error = %e, "Failed to save selection");
        }
        Some(command)
    }

    /// Explicit confirmation of the variant currently shown
    pub async fn select_current_variant(&mut self, slot: &str) -> Result<Slot> {
        let command = self.current_command(slot)?;
        self.persist_selection(&command).await
    }

    /// Delete the variant currently shown, then refresh
    pub async fn delete_current_variant(&mut self, slot: &str) -> Result<Slot> {
        let command = self.current_command(slot)?;
        let len = self.slot_with_files(slot)?.files.len();

        let result = self.client.delete_variant(self.kind, &command.variant()).await;
        let updated = self.record(result)?;
        info!(slot = %slot, filename = %command.filename, "Variant deleted");

        if command.index + 1 == len && command.index > 0 {
            self.variant_index.insert(slot.to_string(), command.index - 1);
        }
        self.replace_slot(updated.clone());

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Refresh after delete failed");
        }
        Ok(updated)
    }

    /// Generate a new batch for `slot`, then refresh
    ///
    /// An override prompt is used for this batch only; the slot keeps its
    /// canonical prompt.
    pub async fn regenerate_slot(
        &mut self,
        slot: &str,
        prompt_override: Option<&str>,
    ) -> Result<BatchReport> {
        let body = GenerateBody {
            slot: slot.to_string(),
            prompt: prompt_override.map(str::to_string),
            persist_prompt: prompt_override.map(|_| false),
            ..GenerateBody::default()
        };

        let result = self.client.regenerate(self.kind, &body).await;
        let report = self.record(result)?;
        info!(summary = %report.summary(), "Regeneration finished");

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Refresh after regeneration failed");
        }
        Ok(report)
    }

    pub fn set_current_slot(&mut self, slot: Option<&str>) {
        self.current_slot = slot.map(str::to_string);
    }

    /// Reopen the preview on a slot stashed before a page navigation
    pub fn restore_from_stash(&mut self, stash: &NavigationStash) -> Option<String> {
        let slot = stash.take()?;
        let known = self
            .manifest
            .as_ref()
            .is_some_and(|m| m.slots.contains_key(&slot));
        if !known {
            debug!(slot = %slot, "Stashed slot not in manifest");
            return None;
        }

        self.preview_mode = true;
        self.current_slot = Some(slot.clone());
        Some(slot)
    }

    /// Step to the next or previous slot with variants
    ///
    /// A move to another page stashes the target slot; the caller performs
    /// the navigation to `navigate_to`.
    pub fn cycle_slot(
        &mut self,
        navigator: &SlotNavigator,
        stash: &NavigationStash,
        direction: Direction,
        current_page: &str,
    ) -> Option<SlotMove> {
        let manifest = self.manifest.as_ref()?;
        let next = navigator.cycle_slot(
            manifest,
            self.current_slot.as_deref(),
            direction,
            current_page,
        )?;

        if let Some(url) = &next.navigate_to {
            debug!(slot = %next.slot, url = %url, "Slot lives on another page");
            stash.stash(&next.slot);
        }
        self.current_slot = Some(next.slot.clone());
        Some(next)
    }

    fn slot_with_files(&self, slot: &str) -> Result<&Slot> {
        let manifest = self.manifest.as_ref().ok_or(SessionError::NotLoaded)?;
        let entry = manifest
            .slot(slot)
            .ok_or_else(|| SessionError::UnknownSlot(slot.to_string()))?;
        if entry.files.is_empty() {
            return Err(SessionError::EmptySlot(slot.to_string()));
        }
        Ok(entry)
    }

    fn current_command(&self, slot: &str) -> Result<SelectionCommand> {
        let entry = self.slot_with_files(slot)?;
        let index = self
            .variant_index
            .get(slot)
            .copied()
            .unwrap_or(0)
            .min(entry.files.len() - 1);
        Ok(SelectionCommand {
            slot: slot.to_string(),
            filename: entry.files[index].filename.clone(),
            index,
        })
    }

    fn replace_slot(&mut self, slot: Slot) {
        if let Some(manifest) = self.manifest.as_mut() {
            manifest.slots.insert(slot.slot.clone(), slot);
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => self.last_error = Some(e.to_string()),
        }
        result
    }
}
