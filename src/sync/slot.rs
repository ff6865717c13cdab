//! Single-slot "latest value" register
//!
//! One writer publishes, any number of readers take copies. There is no
//! queue: every `set` overwrites the previous value, so readers may see
//! the same value twice or miss intermediate ones, but never a partial one.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Mutex-guarded single slot holding the most recent value
pub struct LatestCell<T> {
    slot: Mutex<Option<T>>,
    /// Number of completed writes
    writes: AtomicU64,
}

impl<T: Clone> LatestCell<T> {
    /// Create an empty cell
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            writes: AtomicU64::new(0),
        }
    }
    
    /// Create a cell that already holds `value`
    ///
    /// The initial value does not count as a write.
    pub fn with_value(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
            writes: AtomicU64::new(0),
        }
    }
    
    /// Replace the stored value
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
        self.writes.fetch_add(1, Ordering::Release);
    }
    
    /// Copy of the stored value, if any
    pub fn get_copy(&self) -> Option<T> {
        self.slot.lock().clone()
    }
    
    /// Drop the stored value
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
    
    /// Whether a value is present
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }
    
    /// Number of `set` calls so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }
}

impl<T: Clone> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;
    
    #[test]
    fn test_empty_cell() {
        let cell: LatestCell<u32> = LatestCell::new();
        assert!(cell.get_copy().is_none());
        assert!(!cell.is_set());
        assert_eq!(cell.writes(), 0);
    }
    
    #[test]
    fn test_last_write_wins() {
        let cell = LatestCell::with_value("init".to_string());
        assert_eq!(cell.get_copy().as_deref(), Some("init"));
        
        cell.set("a".to_string());
        cell.set("b".to_string());
        assert_eq!(cell.get_copy().as_deref(), Some("b"));
        assert_eq!(cell.writes(), 2);
        
        cell.clear();
        assert!(cell.get_copy().is_none());
    }
    
    #[test]
    fn test_reads_never_torn() {
        // Each written value is a vector whose elements all equal its tag,
        // so any mixture of two writes would be detectable.
        let cell = Arc::new(LatestCell::<Vec<u32>>::new());
        let writer_cell = cell.clone();
        
        let writer = thread::spawn(move || {
            for tag in 0..2000u32 {
                writer_cell.set(vec![tag; 4096]);
            }
        });
        
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        if let Some(value) = cell.get_copy() {
                            assert_eq!(value.len(), 4096);
                            let tag = value[0];
                            assert!(value.iter().all(|&v| v == tag));
                        }
                    }
                })
            })
            .collect();
        
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        
        assert_eq!(cell.get_copy().unwrap()[0], 1999);
    }
    
    proptest! {
        #[test]
        fn prop_get_returns_a_written_value(values in proptest::collection::vec(any::<u16>(), 0..64)) {
            let cell = LatestCell::with_value(u32::MAX);
            for v in &values {
                cell.set(*v as u32);
                let got = cell.get_copy().unwrap();
                prop_assert!(values.iter().any(|w| *w as u32 == got));
            }
            let expected = values.last().map(|v| *v as u32).unwrap_or(u32::MAX);
            prop_assert_eq!(cell.get_copy(), Some(expected));
        }
    }
}
