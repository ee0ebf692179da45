//! Generational slot storage backing the world's bodies and joints.

/// Why a slot lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotError {
    /// Index was never allocated.
    OutOfRange,
    /// Slot was freed (and possibly reused) since the handle was issued.
    Stale,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Vector of slots with a free list. Freeing a slot bumps its generation.
#[derive(Debug, Clone)]
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    /// Store `value`, returning its `(index, generation)`.
    pub(crate) fn insert(&mut self, value: T) -> (u32, u32) {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return (index, slot.generation);
        }
        // Worlds never approach u32::MAX slots.
        #[allow(clippy::cast_possible_truncation)]
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        (index, 0)
    }

    pub(crate) fn get(&self, index: u32, generation: u32) -> Result<&T, SlotError> {
        let slot = self.slots.get(index as usize).ok_or(SlotError::OutOfRange)?;
        match &slot.value {
            Some(value) if slot.generation == generation => Ok(value),
            _ => Err(SlotError::Stale),
        }
    }

    pub(crate) fn get_mut(&mut self, index: u32, generation: u32) -> Result<&mut T, SlotError> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(SlotError::OutOfRange)?;
        if slot.generation != generation {
            return Err(SlotError::Stale);
        }
        slot.value.as_mut().ok_or(SlotError::Stale)
    }

    pub(crate) fn remove(&mut self, index: u32, generation: u32) -> Result<T, SlotError> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(SlotError::OutOfRange)?;
        if slot.generation != generation || slot.value.is_none() {
            return Err(SlotError::Stale);
        }
        let value = slot.value.take().ok_or(SlotError::Stale)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Ok(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Live entries in slot order as `(index, generation, value)`.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            #[allow(clippy::cast_possible_truncation)]
            slot.value.as_ref().map(|v| (i as u32, slot.generation, v))
        })
    }

    /// Live entries in slot order, mutably.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            #[allow(clippy::cast_possible_truncation)]
            slot.value.as_mut().map(|v| (i as u32, generation, v))
        })
    }
}
