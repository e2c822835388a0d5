//! Compartment registry.
//!
//! Built once at startup from the detected hardware rows. Every slot position
//! on a detected row becomes a compartment, except the extra positions a
//! large compartment covers: the slot below the first one adds a second
//! lock/sensor pair, and the two slots to their right only add lights.
//! Compartment ids are handed out contiguously from 1 in slot order.
//!
//! ```
//! use keybox_engine::registry::CompartmentRegistry;
//! use keybox_core::CompartmentId;
//!
//! // Two rows, one large compartment at slot 5.
//! let registry = CompartmentRegistry::from_topology(2, &[5]).unwrap();
//! assert_eq!(registry.len(), 13);
//!
//! let large = registry.get(CompartmentId::new(5).unwrap()).unwrap();
//! assert_eq!(large.slots().len(), 2);
//! assert_eq!(large.leds(), &[4, 5, 12, 13]);
//! ```

use crate::config::large_compartment_span;
use keybox_core::constants::{MAX_COMPARTMENT_ID, SLOTS_PER_ROW};
use keybox_core::{CompartmentId, ContentStatus, DoorStatus, Error, Result};
use keybox_hardware::SlotId;

/// One lockable unit and what the device believes about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compartment {
    id: CompartmentId,
    slots: Vec<SlotId>,
    leds: Vec<usize>,
    large_at: Option<usize>,

    /// Authoritative only right after an actuation or an explicit poll.
    pub door_status: DoorStatus,
    pub content_status: ContentStatus,
}

impl Compartment {
    fn new(id: CompartmentId, slot: SlotId) -> Self {
        Self {
            id,
            slots: vec![slot],
            leds: vec![slot.led_index()],
            large_at: None,
            door_status: DoorStatus::Closed,
            content_status: ContentStatus::Unknown,
        }
    }

    pub fn id(&self) -> CompartmentId {
        self.id
    }

    /// Lock/sensor pairs, driven together.
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    /// Indices on the compartment light strip.
    pub fn leds(&self) -> &[usize] {
        &self.leds
    }

    pub fn is_large(&self) -> bool {
        self.large_at.is_some()
    }

    /// Door and content state, as recorded in audit events.
    pub fn snapshot(&self) -> (ContentStatus, DoorStatus) {
        (self.content_status, self.door_status)
    }
}

/// All compartments present on the detected hardware, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct CompartmentRegistry {
    compartments: Vec<Compartment>,
    rows: usize,
}

impl CompartmentRegistry {
    /// Build the registry for `rows` detected row boards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Topology`] if the hardware would yield more
    /// compartments than ids exist.
    pub fn from_topology(rows: usize, large_positions: &[usize]) -> Result<Self> {
        let mut compartments: Vec<Compartment> = Vec::new();
        let mut large: Vec<(usize, [usize; 4])> = large_positions
            .iter()
            .map(|&start| (start, large_compartment_span(start)))
            .collect();
        large.sort_unstable();

        for position in 1..=rows * SLOTS_PER_ROW {
            let Some(slot) = SlotId::from_position(position) else {
                continue;
            };

            let owner = large
                .iter()
                .find(|(_, span)| span[1..].contains(&position))
                .map(|(start, span)| (*start, span.iter().position(|p| *p == position)));

            if let Some((start, offset)) = owner {
                // Only reachable once the first slot created the compartment.
                let Some(target) = compartments.iter_mut().find(|c| c.large_at == Some(start))
                else {
                    continue;
                };
                target.leds.push(slot.led_index());
                if offset == Some(2) {
                    target.slots.push(slot);
                }
                continue;
            }

            let next = compartments.len() + 1;
            let id = u8::try_from(next)
                .ok()
                .filter(|id| *id <= MAX_COMPARTMENT_ID)
                .ok_or_else(|| {
                    Error::Topology(format!("{next} compartments exceed the id range"))
                })
                .and_then(CompartmentId::new)?;

            let mut compartment = Compartment::new(id, slot);
            if large.iter().any(|(start, _)| *start == position) {
                compartment.large_at = Some(position);
            }
            compartments.push(compartment);
        }

        // Keep LED order by strip index for a stable layout.
        for compartment in &mut compartments {
            compartment.leds.sort_unstable();
        }

        Ok(Self { compartments, rows })
    }

    /// Number of row boards the registry was built from.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.compartments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compartments.is_empty()
    }

    pub fn contains(&self, id: CompartmentId) -> bool {
        id.index() < self.compartments.len()
    }

    pub fn get(&self, id: CompartmentId) -> Option<&Compartment> {
        self.compartments.get(id.index())
    }

    pub fn get_mut(&mut self, id: CompartmentId) -> Option<&mut Compartment> {
        self.compartments.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Compartment> {
        self.compartments.iter()
    }

    pub fn ids(&self) -> Vec<CompartmentId> {
        self.compartments.iter().map(Compartment::id).collect()
    }

    /// Slot positions at which large compartments were actually created.
    pub fn large_positions(&self) -> Vec<usize> {
        self.compartments.iter().filter_map(|c| c.large_at).collect()
    }
}
