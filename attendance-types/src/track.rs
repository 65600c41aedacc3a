use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Keypoints};
use crate::ids::EmployeeId;

/// Generational handle into a camera's [`TrackArena`].
///
/// Keeping a `(index, generation)` pair rather than a raw index means a HUD
/// renderer or transport layer that cached a `TrackId` across frames cannot
/// silently alias a reused slot once the original track has aged out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId {
    index: u32,
    generation: u32,
}

/// A person actively being verified against a candidate identity.
#[derive(Debug, Clone)]
pub struct Verification {
    pub target_id: EmployeeId,
    pub samples: Vec<(EmployeeId, f32)>,
    pub started_ts: f64,
}

/// Per-track identity state. See Design Notes in `SPEC_FULL.md` §9.
#[derive(Debug, Clone)]
pub enum Identity {
    Unknown {
        /// `0.0` until the track first goes unknown, then held until cleared.
        unknown_since_ts: f64,
    },
    Known {
        person_id: EmployeeId,
        name: String,
        similarity: f32,
        stable_id_hits: u32,
        last_known_ts: f64,
        last_known_bbox: BBox,
        last_identity_change_ts: f64,
        verification: Option<Verification>,
    },
}

impl Identity {
    pub fn person_id(&self) -> Option<&EmployeeId> {
        match self {
            Identity::Unknown { .. } => None,
            Identity::Known { person_id, .. } => Some(person_id),
        }
    }

    pub fn stable_id_hits(&self) -> u32 {
        match self {
            Identity::Unknown { .. } => 0,
            Identity::Known { stable_id_hits, .. } => *stable_id_hits,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known { .. })
    }
}

/// A single tracked face on one camera.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,

    // Geometry.
    pub bbox: BBox,
    pub kps: Option<Keypoints>,
    pub created_ts: f64,
    pub last_seen_ts: f64,
    pub last_det_ts: f64,

    // Tracker bookkeeping (single-object tracker instance lives alongside in
    // `attendance-tracker`, keyed by the same `TrackId`).
    pub det_misses: u32,
    pub lost_frames: u32,

    // Identity.
    pub identity: Identity,
    pub last_embed_ts: f64,
    pub force_recognition_until_ts: f64,

    /// A candidate identity competing with `identity` for this track, and how
    /// many consecutive ticks it has cleared the strict threshold. Cleared
    /// whenever a tick doesn't renew the same candidate.
    pub flip_candidate: Option<(EmployeeId, u32)>,

    pub det_score: f32,
}

impl Track {
    pub fn new(id: TrackId, bbox: BBox, now: f64) -> Self {
        Track {
            id,
            bbox,
            kps: None,
            created_ts: now,
            last_seen_ts: now,
            last_det_ts: now,
            det_misses: 0,
            lost_frames: 0,
            identity: Identity::Unknown {
                unknown_since_ts: 0.0,
            },
            last_embed_ts: 0.0,
            force_recognition_until_ts: 0.0,
            flip_candidate: None,
            det_score: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.identity.is_known()
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A generational arena of tracks, one per camera.
///
/// Removed slots are reused; their generation is bumped so stale
/// [`TrackId`]s fail lookups instead of aliasing the new occupant.
#[derive(Default)]
pub struct TrackArena {
    slots: Vec<Slot<Track>>,
    free: Vec<u32>,
}

impl TrackArena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, bbox: BBox, now: f64) -> TrackId {
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let id = TrackId {
                index,
                generation: slot.generation,
            };
            slot.value = Some(Track::new(id, bbox, now));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = TrackId {
                index,
                generation: 0,
            };
            self.slots.push(Slot {
                generation: 0,
                value: Some(Track::new(id, bbox, now)),
            });
            id
        };
        id
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.slots.get(id.index as usize).and_then(|slot| {
            if slot.generation == id.generation {
                slot.value.as_ref()
            } else {
                None
            }
        })
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.slots.get_mut(id.index as usize).and_then(|slot| {
            if slot.generation == id.generation {
                slot.value.as_mut()
            } else {
                None
            }
        })
    }

    pub fn remove(&mut self, id: TrackId) -> Option<Track> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take();
        if value.is_some() {
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
        value
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn retain<F: FnMut(&Track) -> bool>(&mut self, mut keep: F) {
        for index in 0..self.slots.len() {
            let should_remove = match &self.slots[index].value {
                Some(track) => !keep(track),
                None => false,
            };
            if should_remove {
                let slot = &mut self.slots[index];
                slot.value = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_id_does_not_alias_reused_slot() {
        let mut arena = TrackArena::new();
        let a = arena.insert(BBox::new(0, 0, 1, 1), 0.0);
        arena.remove(a).unwrap();
        let b = arena.insert(BBox::new(0, 0, 1, 1), 0.0);
        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());
    }

    #[test]
    fn retain_frees_matching_slots() {
        let mut arena = TrackArena::new();
        let a = arena.insert(BBox::new(0, 0, 1, 1), 0.0);
        let b = arena.insert(BBox::new(0, 0, 2, 2), 0.0);
        arena.retain(|t| t.id != a);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());
        assert_eq!(arena.len(), 1);
    }
}
