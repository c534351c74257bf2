//! Variant filename and path conventions
//!
//! Variants are named `<base>-<NNN>.<ext>`, where `NNN` is a per-slot
//! sequence number zero-padded to three digits. The next number is always
//! `max(existing) + 1`, derived by scanning the slot's filenames; numbers
//! freed by deletion are never reused.
//!
//! - `hero` + 3 → `hero-003.png`
//! - slot `services/ai` → directory `services-ai`

/// Extract the sequence number from a variant filename (`hero-012.png` → 12)
pub fn parse_sequence(filename: &str) -> Option<u32> {
    let stem = match filename.rfind('.') {
        Some(dot) if dot > 0 => &filename[..dot],
        _ => filename,
    };
    let (_, digits) = stem.rsplit_once('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Next sequence number for a slot holding `filenames`; 1 for an empty slot
pub fn next_sequence<'a>(filenames: impl IntoIterator<Item = &'a str>) -> u32 {
    filenames
        .into_iter()
        .filter_map(parse_sequence)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Directory segment for a slot; path separators become hyphens
pub fn slot_dir(slot: &str) -> String {
    slot.trim_matches('/').replace('/', "-")
}

/// Default base filename for a slot's variants
pub fn default_base_name(slot: &str) -> String {
    slot_dir(slot)
}

pub fn variant_filename(base: &str, sequence: u32, extension: &str) -> String {
    format!("{base}-{sequence:03}.{extension}")
}

/// Public, servable path of a variant: `/<output_dir>/<slot_dir>/<filename>`
pub fn public_path(output_dir: &str, slot: &str, filename: &str) -> String {
    let prefix = output_dir.trim_matches('/');
    if prefix.is_empty() {
        format!("/{}/{}", slot_dir(slot), filename)
    } else {
        format!("/{}/{}/{}", prefix, slot_dir(slot), filename)
    }
}
