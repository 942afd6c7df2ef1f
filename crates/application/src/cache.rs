use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug)]
struct Entries<V> {
    map: HashMap<String, V>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Bounded text-keyed cache with first-in first-out eviction.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: Mutex<Entries<V>>,
    capacity: Mutex<usize>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: Mutex::new(capacity),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries<V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        *self.capacity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the bound, evicting the oldest entries if needed.
    pub fn set_capacity(&self, capacity: usize) {
        *self.capacity.lock().unwrap_or_else(|e| e.into_inner()) = capacity;
        let mut entries = self.lock();
        Self::evict(&mut entries, capacity);
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().map.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: V) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        if entries.map.insert(key.to_string(), value).is_none() {
            entries.order.push_back(key.to_string());
        }
        Self::evict(&mut entries, capacity);
    }

    fn evict(entries: &mut Entries<V>, capacity: usize) {
        while entries.order.len() > capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
