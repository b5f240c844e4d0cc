// Single-slot memoization.
//
// Only the latest computation is ever consulted, so one slot is enough: a
// lookup with an equal key reuses the stored value, anything else replaces it.

#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    slot: Option<(K, V)>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, computing and storing it if the slot holds another key.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        let entry = match self.slot.take() {
            Some((k, v)) if k == key => (k, v),
            _ => (key, compute()),
        };
        &self.slot.insert(entry).1
    }

    /// Stored value, if it was computed for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        match &self.slot {
            Some((k, v)) if k == key => Some(v),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_equal_key() {
        let mut memo: Memo<u32, String> = Memo::new();
        let mut calls = 0;
        memo.get_or_compute(1, || {
            calls += 1;
            "one".to_string()
        });
        let v = memo.get_or_compute(1, || {
            calls += 1;
            "uno".to_string()
        });
        assert_eq!(v, "one");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_new_key_replaces_slot() {
        let mut memo: Memo<u32, u32> = Memo::new();
        memo.get_or_compute(1, || 10);
        assert_eq!(*memo.get_or_compute(2, || 20), 20);
        assert_eq!(memo.get(&1), None);
        assert_eq!(memo.get(&2), Some(&20));
        memo.clear();
        assert_eq!(memo.get(&2), None);
    }
}
