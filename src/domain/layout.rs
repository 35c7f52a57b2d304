// Memory layout of the object a pointer parameter points into.

use serde::Serialize;

/// Where an address-description query placed a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Global,
    Heap,
    Stack,
}

/// Region bounds as reported by one address description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRegion {
    pub kind: RegionKind,
    pub byte_offset: u64,
    pub byte_size: u64,
    pub base_address: u64,
}

/// Layout of one pointer/array parameter.
///
/// Filled in two steps: the layout pass sets everything except
/// `element_count`, which comes from the value dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerLayout {
    pub region: RegionKind,
    pub byte_offset: u64,
    pub byte_size: u64,
    pub base_address: u64,
    pub element_type_size: u64,
    pub element_offset: u64,
    pub element_count: Option<usize>,
}

impl PointerLayout {
    pub fn new(region: ResolvedRegion, element_type_size: u64) -> Self {
        let element_offset = if element_type_size == 0 {
            0
        } else {
            region.byte_offset / element_type_size
        };
        Self {
            region: region.kind,
            byte_offset: region.byte_offset,
            byte_size: region.byte_size,
            base_address: region.base_address,
            element_type_size,
            element_offset,
            element_count: None,
        }
    }

    /// Number of `word_size` words the value pass dumps from the base.
    /// Rounds up so a partial trailing word is still captured.
    pub fn dump_words(&self, word_size: u64) -> u64 {
        let word_size = word_size.max(1);
        ((self.byte_size + word_size - 1) / word_size).max(1)
    }

    /// Element count implied by the region size and the element type.
    pub fn expected_element_count(&self) -> Option<u64> {
        if self.element_type_size == 0 {
            None
        } else {
            Some(self.byte_size / self.element_type_size)
        }
    }
}
