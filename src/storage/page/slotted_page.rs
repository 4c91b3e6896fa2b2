use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{PageId, RecordId, Result, SlotId, StrataError};
use crate::tuple::{Schema, Tuple};

use super::formatter;

/// A page of fixed-length records, all sharing one schema.
///
/// The number of slots is determined by the page size and the record size
/// (see [`formatter::compute_page_capacity`]). A record inserted into the
/// page is assigned a slot and keeps it until it is deleted.
///
/// The page also keeps a before image: the bytes it had when it was last
/// known to be durable. The write-ahead log records it alongside the current
/// bytes whenever the page is dirtied.
pub struct SlottedPage {
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    slots: Vec<Option<Tuple>>,
    /// Maintained on insert/delete
    empty_slots: usize,
    before_image: Mutex<Vec<u8>>,
}

impl SlottedPage {
    /// Creates an empty page.
    pub fn new(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Self {
        let num_slots = formatter::compute_page_capacity(page_size, schema.record_size());
        let page = Self {
            page_id,
            schema,
            page_size,
            slots: vec![None; num_slots],
            empty_slots: num_slots,
            before_image: Mutex::new(Vec::new()),
        };
        page.set_before_image();
        page
    }

    /// Creates a page populated from its on-disk bytes.
    /// The page size is the length of `data`.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let mut page = Self::new(page_id, schema, data.len());
        formatter::bytes_to_page(data, &mut page)?;
        page.set_before_image();
        Ok(page)
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of slots this page can hold.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of empty slots.
    pub fn num_empty_slots(&self) -> usize {
        self.empty_slots
    }

    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        matches!(self.slots.get(slot), Some(Some(_)))
    }

    pub fn is_slot_empty(&self, slot: SlotId) -> bool {
        !self.is_slot_used(slot)
    }

    /// Returns the tuple in the given slot.
    pub fn get_tuple(&self, slot: SlotId) -> Result<&Tuple> {
        match self.slots.get(slot) {
            Some(Some(tuple)) => Ok(tuple),
            Some(None) => Err(StrataError::EmptySlot(slot)),
            None => Err(StrataError::InvalidSlot(slot)),
        }
    }

    pub(crate) fn tuple_at(&self, slot: SlotId) -> Option<&Tuple> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Stores a tuple in a specific slot and returns its new location.
    pub fn insert_tuple_at(&mut self, slot: SlotId, mut tuple: Tuple) -> Result<RecordId> {
        self.check_schema(&tuple)?;
        match self.slots.get(slot) {
            None => return Err(StrataError::InvalidSlot(slot)),
            Some(Some(_)) => return Err(StrataError::SlotOccupied(slot)),
            Some(None) => {}
        }

        let rid = RecordId::new(self.page_id, slot);
        tuple.set_record_id(Some(rid));
        self.slots[slot] = Some(tuple);
        self.empty_slots -= 1;
        Ok(rid)
    }

    /// Stores a tuple in the first free slot.
    pub fn insert_tuple(&mut self, tuple: Tuple) -> Result<RecordId> {
        self.check_schema(&tuple)?;
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(StrataError::PageFull)?;
        self.insert_tuple_at(slot, tuple)
    }

    /// Removes a tuple from the page and clears its location.
    pub fn delete_tuple(&mut self, tuple: &mut Tuple) -> Result<()> {
        let rid = match tuple.record_id() {
            Some(rid) if rid.page_id == self.page_id => rid,
            _ => return Err(StrataError::TupleNotOnPage(self.page_id)),
        };
        match self.slots.get_mut(rid.slot) {
            None => return Err(StrataError::InvalidSlot(rid.slot)),
            Some(None) => return Err(StrataError::EmptySlot(rid.slot)),
            Some(slot) => *slot = None,
        }

        self.empty_slots += 1;
        tuple.set_record_id(None);
        Ok(())
    }

    /// Iterates over the occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Serializes the page to exactly `page_size` bytes.
    pub fn page_data(&self) -> Vec<u8> {
        formatter::page_to_bytes(self)
    }

    /// Returns a copy of the before image.
    pub fn before_image(&self) -> Vec<u8> {
        self.before_image.lock().clone()
    }

    /// Rebuilds the page from its before image, dropping every change made
    /// since. Returns false if the page already matched it.
    pub fn revert_to_before_image(&mut self) -> Result<bool> {
        let before = self.before_image();
        if before == self.page_data() {
            return Ok(false);
        }
        *self = Self::from_bytes(self.page_id, Arc::clone(&self.schema), &before)?;
        Ok(true)
    }

    /// Captures the current bytes as the new before image.
    pub fn set_before_image(&self) {
        let data = self.page_data();
        *self.before_image.lock() = data;
    }

    fn check_schema(&self, tuple: &Tuple) -> Result<()> {
        if **tuple.schema() != *self.schema || !tuple.conforms() {
            return Err(StrataError::SchemaMismatch);
        }
        Ok(())
    }
}
