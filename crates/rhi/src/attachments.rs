//! Attachment view tables for render targets and depth buffers.
//!
//! This module provides fixed-capacity tables of image views:
//! - [`SlotTable`] is the pure slot bookkeeping
//! - [`AttachmentTable`] owns the Vulkan views and creates them from images
//!
//! # Overview
//!
//! The engine addresses its attachments by slot index rather than by raw
//! view handle: slot `i` of the color table is back buffer `i`, slot 0 of
//! the depth table is the depth buffer. The capacity is fixed when the
//! table is created and a slot keeps its index across replacement, so a
//! resize can swap the view behind a slot without disturbing anything that
//! recorded the slot number.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use facet_rhi::device::Device;
//! use facet_rhi::attachments::{AttachmentKind, AttachmentTable};
//!
//! # fn example(device: Arc<Device>, image: vk::Image) -> Result<(), facet_rhi::RhiError> {
//! let mut table = AttachmentTable::new(device, AttachmentKind::Color, 3)?;
//!
//! // Populate slot 0 with a view of `image`
//! table.assign(0, image, vk::Format::B8G8R8A8_SRGB)?;
//!
//! // Slot 0 now resolves to that view
//! let view = table.view(0)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What a table's views attach as. Determines the image aspect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Color render target views.
    Color,
    /// Depth buffer views.
    Depth,
}

impl AttachmentKind {
    /// Returns the image aspect views of this kind cover.
    #[inline]
    pub fn aspect_mask(self) -> vk::ImageAspectFlags {
        match self {
            AttachmentKind::Color => vk::ImageAspectFlags::COLOR,
            AttachmentKind::Depth => vk::ImageAspectFlags::DEPTH,
        }
    }
}

/// Fixed-capacity slot bookkeeping for image views.
///
/// The table never grows: capacity is chosen at creation and indexing past
/// it is an error rather than a reallocation. Slots are stable, so the view
/// behind a slot can be replaced without invalidating the slot index.
///
/// This type only tracks handles. View creation and destruction belong to
/// [`AttachmentTable`], which keeps the bookkeeping testable without a
/// device.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Option<vk::ImageView>>,
}

impl SlotTable {
    /// Creates a table with `capacity` vacant slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Number of slots, occupied or not.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Stores `view` in `slot`, returning any view it displaced.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `slot` is out of capacity.
    pub fn insert(&mut self, slot: usize, view: vk::ImageView) -> RhiResult<Option<vk::ImageView>> {
        let capacity = self.slots.len();
        let entry = self.slots.get_mut(slot).ok_or_else(|| {
            RhiError::InvalidHandle(format!("slot {} out of capacity {}", slot, capacity))
        })?;
        Ok(entry.replace(view))
    }

    /// Resolves `slot` to its view.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `slot` is out of capacity or
    /// vacant.
    pub fn get(&self, slot: usize) -> RhiResult<vk::ImageView> {
        self.slots
            .get(slot)
            .copied()
            .flatten()
            .ok_or_else(|| RhiError::InvalidHandle(format!("slot {} is vacant", slot)))
    }

    /// Empties every slot, returning the views that were stored.
    pub fn take_all(&mut self) -> Vec<vk::ImageView> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

/// Fixed-capacity table of image views the engine renders into.
///
/// The table creates views from images handed to [`AttachmentTable::assign`]
/// and destroys them when a slot is overwritten, the table is cleared, or
/// the table is dropped.
///
/// Replacing or clearing a slot destroys the old view immediately. Callers
/// must ensure the GPU is no longer using it; the engine flushes the command
/// queue before every resize for exactly this reason.
pub struct AttachmentTable {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// What the stored views attach as.
    kind: AttachmentKind,
    /// Slot bookkeeping.
    table: SlotTable,
}

impl AttachmentTable {
    /// Creates a table of `capacity` vacant slots for `kind` attachments.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `kind` - Whether the table holds color or depth views
    /// * `capacity` - Number of slots, fixed for the table's lifetime
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `capacity` is zero.
    pub fn new(device: Arc<Device>, kind: AttachmentKind, capacity: usize) -> RhiResult<Self> {
        if capacity == 0 {
            return Err(RhiError::InvalidHandle(
                "attachment table capacity must be at least 1".to_string(),
            ));
        }

        debug!(
            "Created {:?} attachment table with {} slot(s)",
            kind, capacity
        );

        Ok(Self {
            device,
            kind,
            table: SlotTable::new(capacity),
        })
    }

    /// Returns what the stored views attach as.
    #[inline]
    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// Number of slots, occupied or not.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Number of occupied slots.
    #[inline]
    pub fn occupied(&self) -> usize {
        self.table.occupied()
    }

    /// Creates a view of `image` and stores it in `slot`.
    ///
    /// Any view previously stored in the slot is destroyed. The slot index
    /// stays valid across the replacement.
    ///
    /// # Arguments
    ///
    /// * `slot` - Slot index, below the table's capacity
    /// * `image` - Image to view
    /// * `format` - Format of the image
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `slot` is out of capacity, or
    /// a Vulkan error if view creation fails.
    pub fn assign(
        &mut self,
        slot: usize,
        image: vk::Image,
        format: vk::Format,
    ) -> RhiResult<vk::ImageView> {
        let subresource_range = vk::ImageSubresourceRange::default()
            .aspect_mask(self.kind.aspect_mask())
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1);

        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(subresource_range);

        let view = unsafe { self.device.handle().create_image_view(&create_info, None)? };

        match self.table.insert(slot, view) {
            Ok(Some(old_view)) => {
                unsafe { self.device.handle().destroy_image_view(old_view, None) };
                Ok(view)
            }
            Ok(None) => Ok(view),
            Err(e) => {
                // Don't leak the new view when the slot index was bad
                unsafe { self.device.handle().destroy_image_view(view, None) };
                Err(e)
            }
        }
    }

    /// Resolves `slot` to its view.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if `slot` is out of capacity or
    /// vacant.
    #[inline]
    pub fn view(&self, slot: usize) -> RhiResult<vk::ImageView> {
        self.table.get(slot)
    }

    /// Destroys every stored view and leaves all slots vacant.
    ///
    /// The capacity is unchanged.
    pub fn clear(&mut self) {
        let views = self.table.take_all();
        let count = views.len();
        for view in views {
            unsafe { self.device.handle().destroy_image_view(view, None) };
        }
        if count > 0 {
            debug!("Cleared {} {:?} attachment view(s)", count, self.kind);
        }
    }
}

impl Drop for AttachmentTable {
    fn drop(&mut self) {
        self.clear();
        debug!("Destroyed {:?} attachment table", self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn view(raw: u64) -> vk::ImageView {
        vk::ImageView::from_raw(raw)
    }

    #[test]
    fn slots_fill_up_to_capacity() {
        let mut table = SlotTable::new(3);
        assert_eq!(table.capacity(), 3);

        for slot in 0..3 {
            assert!(table.insert(slot, view(slot as u64 + 1)).is_ok());
        }
        assert_eq!(table.occupied(), 3);
    }

    #[test]
    fn out_of_capacity_slot_is_an_error() {
        let mut table = SlotTable::new(2);
        let result = table.insert(2, view(1));
        assert!(matches!(result, Err(RhiError::InvalidHandle(_))));
        assert_eq!(table.occupied(), 0);
    }

    #[test]
    fn vacant_slot_lookup_is_an_error() {
        let table = SlotTable::new(2);
        assert!(matches!(table.get(0), Err(RhiError::InvalidHandle(_))));
        assert!(matches!(table.get(5), Err(RhiError::InvalidHandle(_))));
    }

    #[test]
    fn slot_index_survives_replacement() {
        let mut table = SlotTable::new(2);
        table.insert(1, view(10)).unwrap();

        // Replacing hands back the displaced view and keeps the index valid
        let displaced = table.insert(1, view(20)).unwrap();
        assert_eq!(displaced, Some(view(10)));
        assert_eq!(table.get(1).unwrap(), view(20));
        assert_eq!(table.occupied(), 1);
    }

    #[test]
    fn take_all_vacates_every_slot() {
        let mut table = SlotTable::new(3);
        table.insert(0, view(1)).unwrap();
        table.insert(2, view(3)).unwrap();

        let views = table.take_all();
        assert_eq!(views.len(), 2);
        assert_eq!(table.occupied(), 0);
        assert_eq!(table.capacity(), 3);
    }

    #[test]
    fn aspect_masks_match_kind() {
        assert_eq!(
            AttachmentKind::Color.aspect_mask(),
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(
            AttachmentKind::Depth.aspect_mask(),
            vk::ImageAspectFlags::DEPTH
        );
    }
}
