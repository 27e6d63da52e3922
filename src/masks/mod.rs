//! Mask collection management.
//!
//! A [`MaskCollection`] is an immutable value: every operation returns a new
//! collection and leaves the receiver untouched. The `revision` counter
//! increases whenever the content changes, which is what observers watch to
//! decide whether to redraw or persist.
//!
//! Groups are never stored. They are derived on demand from each mask's
//! grouping key (see [`group_key_of`]).

use std::collections::HashMap;

use crate::color_utils::{Color, MASK_PALETTE, next_palette_color};
use crate::config::EngineConfig;
use crate::constants::DUPLICATE_IOU_THRESHOLD;
use crate::model::{Mask, MaskId, MaskSource, RawMask, base_label_of, group_key_of, numbered_label};


/// Settings for [`merge_masks`] and group reassignment.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Group colors in assignment order
    pub palette: Vec<Color>,
    /// IoU strictly above this marks an incoming mask as a duplicate
    pub iou_threshold: f32,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            palette: MASK_PALETTE.to_vec(),
            iou_threshold: DUPLICATE_IOU_THRESHOLD,
        }
    }
}

impl From<&EngineConfig> for MergeOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            palette: config.palette.clone(),
            iou_threshold: config.duplicate_iou_threshold,
        }
    }
}

/// A derived view of masks sharing a grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskGroup<'a> {
    /// Lowercased base label
    pub key: String,
    /// Base label as written on the first member
    pub base_label: String,
    /// Color of the first member; every member renders with it
    pub color: Color,
    pub members: Vec<&'a Mask>,
}

impl MaskGroup<'_> {
    /// True when every member is visible.
    pub fn all_visible(&self) -> bool {
        self.members.iter().all(|m| m.visible)
    }
}

/// The committed masks of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCollection {
    masks: Vec<Mask>,
    next_id: MaskId,
    revision: u64,
}

impl Default for MaskCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-group bookkeeping built from an existing collection.
struct GroupIndex {
    counts: HashMap<String, usize>,
    colors: HashMap<String, Color>,
    /// Base label as written on each group's first member
    bases: HashMap<String, String>,
    /// Distinct group colors in first-appearance order
    used: Vec<Color>,
}

impl GroupIndex {
    fn build<'a>(masks: impl IntoIterator<Item = &'a Mask>) -> Self {
        let mut index = Self {
            counts: HashMap::new(),
            colors: HashMap::new(),
            bases: HashMap::new(),
            used: Vec::new(),
        };
        for mask in masks {
            let key = mask.group_key();
            *index.counts.entry(key.clone()).or_insert(0) += 1;
            if !index.colors.contains_key(&key) {
                index.bases.insert(key.clone(), mask.base_label().to_string());
                index.colors.insert(key, mask.color);
                index.used.push(mask.color);
            }
        }
        index
    }

    /// Existing color for a group, or the next palette color (recorded).
    fn color_for(&mut self, key: &str, palette: &[Color]) -> Color {
        if let Some(color) = self.colors.get(key) {
            return *color;
        }
        let color = next_palette_color(palette, &self.used, self.colors.len());
        self.colors.insert(key.to_string(), color);
        self.used.push(color);
        color
    }

    /// The group's display base, or `label`'s base for a new group (recorded).
    fn display_base(&mut self, key: &str, label: &str) -> String {
        self.bases
            .entry(key.to_string())
            .or_insert_with(|| base_label_of(label).to_string())
            .clone()
    }

    /// Next ordinal for a group, counting the new member.
    fn next_ordinal(&mut self, key: &str) -> usize {
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Whether `raw` overlaps any existing mask by more than `threshold` IoU.
///
/// Masks without a bounding box on either side are never duplicates.
fn is_duplicate(raw: &RawMask, existing: &[Mask], threshold: f32) -> bool {
    let Some(incoming) = raw.bbox else {
        return false;
    };
    existing
        .iter()
        .filter_map(|m| m.bbox)
        .any(|b| b.iou(&incoming) > threshold)
}

/// Merge a batch of raw masks into `existing`, returning the new collection.
///
/// Incoming masks that duplicate an existing mask are dropped. Survivors are
/// grouped by base label and numbered after the group's current member count.
/// They take the group's existing spelling and color; a new group keeps the
/// first incoming spelling and gets the next free palette color.
pub fn merge_masks(
    existing: &MaskCollection,
    incoming: &[RawMask],
    source: MaskSource,
    options: &MergeOptions,
) -> MaskCollection {
    let mut index = GroupIndex::build(&existing.masks);

    let mut grouped: Vec<(String, Vec<&RawMask>)> = Vec::new();
    let mut dropped = 0usize;
    for raw in incoming {
        if is_duplicate(raw, &existing.masks, options.iou_threshold) {
            dropped += 1;
            continue;
        }
        let key = group_key_of(&raw.label);
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(raw),
            None => grouped.push((key, vec![raw])),
        }
    }

    if grouped.is_empty() {
        if dropped > 0 {
            log::info!("All {} incoming masks were duplicates", dropped);
        }
        return existing.clone();
    }

    let mut next = existing.clone();
    let mut added = 0usize;
    for (key, members) in grouped {
        let color = index.color_for(&key, &options.palette);
        for raw in members {
            let base = index.display_base(&key, &raw.label);
            let ordinal = index.next_ordinal(&key);
            next.masks.push(Mask {
                id: next.next_id,
                label: numbered_label(&base, ordinal),
                color,
                mask_data: raw.mask_data.clone(),
                bbox: raw.bbox,
                area: raw.area,
                visible: true,
                source,
            });
            next.next_id += 1;
            added += 1;
        }
    }
    next.revision += 1;

    log::debug!(
        "Merged {} masks ({} duplicates dropped); collection now holds {}",
        added,
        dropped,
        next.masks.len()
    );
    next
}

impl MaskCollection {
    pub fn new() -> Self {
        Self {
            masks: Vec::new(),
            next_id: 1,
            revision: 0,
        }
    }

    /// Wrap existing masks (e.g. restored from persistence) without relabeling.
    pub fn from_masks(masks: Vec<Mask>) -> Self {
        let next_id = masks.iter().map(|m| m.id).max().map_or(1, |max| max + 1);
        Self {
            masks,
            next_id,
            revision: 0,
        }
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Increases with every content change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: MaskId) -> Option<&Mask> {
        self.masks.iter().find(|m| m.id == id)
    }

    pub fn visible_masks(&self) -> impl Iterator<Item = &Mask> {
        self.masks.iter().filter(|m| m.visible)
    }

    /// Merge a batch; see [`merge_masks`].
    #[must_use]
    pub fn merge(&self, incoming: &[RawMask], source: MaskSource, options: &MergeOptions) -> Self {
        merge_masks(self, incoming, source, options)
    }

    /// Groups in order of their first member.
    pub fn groups(&self) -> Vec<MaskGroup<'_>> {
        let mut groups: Vec<MaskGroup<'_>> = Vec::new();
        for mask in &self.masks {
            let key = mask.group_key();
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.members.push(mask),
                None => groups.push(MaskGroup {
                    key,
                    base_label: mask.base_label().to_string(),
                    color: mask.color,
                    members: vec![mask],
                }),
            }
        }
        groups
    }

    /// Group for a base label (case-insensitive, suffix ignored).
    pub fn group(&self, base_label: &str) -> Option<MaskGroup<'_>> {
        let key = group_key_of(base_label);
        self.groups().into_iter().find(|g| g.key == key)
    }

    /// Color a mask renders with: its group's color.
    pub fn render_color(&self, id: MaskId) -> Option<Color> {
        let mask = self.get(id)?;
        let key = mask.group_key();
        self.masks
            .iter()
            .find(|m| m.group_key() == key)
            .map(|m| m.color)
    }

    /// Apply `edit` to the mask with `id`, or return an unchanged copy.
    fn with_mask(&self, id: MaskId, edit: impl FnOnce(&mut Mask)) -> Self {
        let mut next = self.clone();
        match next.masks.iter_mut().find(|m| m.id == id) {
            Some(mask) => {
                edit(mask);
                next.revision += 1;
            }
            None => log::debug!("No mask with id {}; collection unchanged", id),
        }
        next
    }

    #[must_use]
    pub fn toggle_visibility(&self, id: MaskId) -> Self {
        self.with_mask(id, |m| m.visible = !m.visible)
    }

    /// Set `visible` on every member of a group.
    #[must_use]
    pub fn set_group_visibility(&self, base_label: &str, visible: bool) -> Self {
        let key = group_key_of(base_label);
        let mut next = self.clone();
        let mut touched = false;
        for mask in next.masks.iter_mut().filter(|m| m.group_key() == key) {
            mask.visible = visible;
            touched = true;
        }
        if touched {
            next.revision += 1;
        }
        next
    }

    /// Change a label verbatim.
    ///
    /// No renumbering happens: a rename that moves a mask into another group
    /// leaves both groups' ordinals as they were. A mask renamed into an
    /// existing group takes that group's color, so the group keeps rendering
    /// with the color it already had.
    #[must_use]
    pub fn rename_mask(&self, id: MaskId, new_label: &str) -> Self {
        let label = new_label.trim();
        if label.is_empty() {
            log::debug!("Ignoring blank rename for mask {}", id);
            return self.clone();
        }
        let key = group_key_of(label);
        let joined_color = self
            .masks
            .iter()
            .find(|m| m.id != id && m.group_key() == key)
            .map(|m| m.color);
        self.with_mask(id, |m| {
            if m.group_key() != key {
                if let Some(color) = joined_color {
                    m.color = color;
                }
            }
            m.label = label.to_string();
        })
    }

    #[must_use]
    pub fn remove_mask(&self, id: MaskId) -> Self {
        let mut next = self.clone();
        next.masks.retain(|m| m.id != id);
        if next.masks.len() != self.masks.len() {
            next.revision += 1;
        }
        next
    }

    /// Remove every member of a group.
    #[must_use]
    pub fn remove_group(&self, base_label: &str) -> Self {
        let key = group_key_of(base_label);
        let mut next = self.clone();
        next.masks.retain(|m| m.group_key() != key);
        if next.masks.len() != self.masks.len() {
            next.revision += 1;
            log::debug!(
                "Removed group '{}' ({} masks)",
                key,
                self.masks.len() - next.masks.len()
            );
        }
        next
    }

    /// Move a mask into another group (drag-to-regroup).
    ///
    /// The mask is numbered after the target group's current member count and
    /// adopts the group's color; a target with no members becomes a new group
    /// with the next free palette color. Reassigning into the mask's own group
    /// changes nothing.
    #[must_use]
    pub fn reassign_to_group(&self, id: MaskId, target_base_label: &str, palette: &[Color]) -> Self {
        let Some(mask) = self.get(id) else {
            log::debug!("No mask with id {}; collection unchanged", id);
            return self.clone();
        };
        let target_key = group_key_of(target_base_label);
        if mask.group_key() == target_key {
            return self.clone();
        }

        let mut index = GroupIndex::build(self.masks.iter().filter(|m| m.id != id));
        let display_base = index.display_base(&target_key, target_base_label);
        let color = index.color_for(&target_key, palette);
        let ordinal = index.next_ordinal(&target_key);

        self.with_mask(id, |m| {
            m.label = numbered_label(&display_base, ordinal);
            m.color = color;
        })
    }
}
