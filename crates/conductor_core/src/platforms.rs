//! Platform registry: a fixed pool of platform slots allocated once per session.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{PlatformId, TrainId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: PlatformId,
    pub occupant: Option<TrainId>,
}

impl Platform {
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRegistry {
    slots: SmallVec<[Platform; 4]>,
}

impl PlatformRegistry {
    /// Platforms are numbered `1..=count`.
    pub fn new(count: u8) -> Self {
        Self {
            slots: (1..=count)
                .map(|n| Platform {
                    id: PlatformId(n),
                    occupant: None,
                })
                .collect(),
        }
    }

    pub fn get(&self, id: PlatformId) -> Option<&Platform> {
        self.slots.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlatformId) -> bool {
        self.get(id).is_some()
    }

    /// Unknown platforms report `false`.
    pub fn is_occupied(&self, id: PlatformId) -> bool {
        self.get(id).is_some_and(Platform::is_occupied)
    }

    /// Caller must check [`Self::is_occupied`] first; occupying a taken or
    /// unknown platform is a logic error.
    pub fn occupy(&mut self, id: PlatformId, train: TrainId) -> &Platform {
        let slot = self
            .slots
            .iter_mut()
            .find(|p| p.id == id)
            .unwrap_or_else(|| panic!("occupy: unknown {id}"));
        assert!(
            slot.occupant.is_none(),
            "occupy: {id} already occupied by {:?}",
            slot.occupant
        );
        slot.occupant = Some(train);
        slot
    }

    /// Returns the previous occupant.
    pub fn free(&mut self, id: PlatformId) -> Option<TrainId> {
        self.slots
            .iter_mut()
            .find(|p| p.id == id)
            .and_then(|p| p.occupant.take())
    }

    pub fn list_available(&self) -> Vec<PlatformId> {
        self.slots
            .iter()
            .filter(|p| !p.is_occupied())
            .map(|p| p.id)
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|p| p.is_occupied()).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.slots.iter()
    }
}
