//! Texture slot binding tracker
//!
//! Remembers which cache key sits in a resource slot so binding the same
//! key again costs nothing.

/// Key currently bound to one resource slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotBinding<K> {
    bound: Option<K>,
}

impl<K: Copy + PartialEq> SlotBinding<K> {
    /// Empty slot
    pub const fn new() -> Self {
        Self { bound: None }
    }

    /// Key currently in the slot
    pub fn bound(&self) -> Option<K> {
        self.bound
    }

    /// Whether `key` is already in the slot
    pub fn is_bound(&self, key: K) -> bool {
        self.bound == Some(key)
    }

    /// Put `key` in the slot; returns `false` if it was already there
    pub fn assign(&mut self, key: K) -> bool {
        if self.is_bound(key) {
            return false;
        }
        self.bound = Some(key);
        true
    }

    /// Forget the assignment; returns the key that was bound
    pub fn clear(&mut self) -> Option<K> {
        self.bound.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebinding_same_key_is_free() {
        let mut slot = SlotBinding::new();
        assert!(slot.assign(42u32));
        assert!(!slot.assign(42));
        assert!(slot.is_bound(42));

        assert!(slot.assign(7));
        assert_eq!(slot.bound(), Some(7));
    }

    #[test]
    fn test_clear_forgets_the_key() {
        let mut slot = SlotBinding::new();
        assert_eq!(slot.clear(), None);

        slot.assign(7u32);
        assert_eq!(slot.clear(), Some(7));
        assert_eq!(slot.bound(), None);
        assert!(slot.assign(7), "cleared slot rebinds");
    }
}
