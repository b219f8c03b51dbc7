//! Identity types for the graph arena.
//!
//! Every handle is an index into its slot vector plus the generation the slot
//! had when the object was inserted. Releasing an object bumps the slot's
//! generation, so handles that outlive their object are detected instead of
//! silently aliasing a newer occupant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Common behaviour of arena handles.
pub trait ArenaId: Copy + Eq {
    const NAME: &'static str;
    fn from_parts(index: u32, generation: u32) -> Self;
    fn index(self) -> usize;
    fn generation(self) -> u32;
}

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            pub const INVALID: $name = $name {
                index: u32::MAX,
                generation: 0,
            };

            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl ArenaId for $name {
            const NAME: &'static str = stringify!($name);

            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(self) -> usize {
                self.index as usize
            }

            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if *self == Self::INVALID {
                    write!(f, "{}(INVALID)", stringify!($name))
                } else {
                    write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index)
            }
        }
    };
}

arena_id!(
    /// Handle to a `FilterNode` in a `Session`.
    NodeId
);
arena_id!(
    /// Handle to a `Plug` in a `Session`.
    PlugId
);
arena_id!(
    /// Handle to a `Socket` in a `Session`.
    SocketId
);

struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Generation-checked slot storage.
pub struct Arena<I: ArenaId, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _id: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            _id: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> I {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            I::from_parts(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(value),
                generation: 0,
            });
            I::from_parts(index, 0)
        }
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index() as u32);
        slot.value.take()
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (I::from_parts(i as u32, slot.generation), v))
        })
    }
}
