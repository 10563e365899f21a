//! Bounded cache for generated content.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::traits::{ContentGenerator, GeneratedStory, StoryRequest};

/// Least-recently-used cache with a fixed capacity.
///
/// Entries are evicted when the cache is full or removed explicitly with
/// [`invalidate`](Self::invalidate) / [`clear`](Self::clear).
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: Mutex<CacheEntries<K, V>>,
}

struct CacheEntries<K, V> {
    map: HashMap<K, V>,
    // Front is least recently used.
    order: VecDeque<K>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(CacheEntries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheEntries<K, V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        let value = entries.map.get(key).cloned()?;
        touch(&mut entries.order, key);
        Some(value)
    }

    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        if entries.map.insert(key.clone(), value).is_some() {
            touch(&mut entries.order, &key);
            return;
        }
        entries.order.push_back(key);
        while entries.map.len() > self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut entries = self.lock();
        if entries.map.remove(key).is_none() {
            return false;
        }
        entries.order.retain(|k| k != key);
        true
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

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn touch<K: Eq + Clone>(order: &mut VecDeque<K>, key: &K) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}

/// Wraps a generator so identical requests are answered from a cache.
pub struct CachedGenerator {
    inner: Arc<dyn ContentGenerator>,
    cache: BoundedCache<StoryRequest, GeneratedStory>,
}

impl CachedGenerator {
    pub fn new(inner: Arc<dyn ContentGenerator>, capacity: usize) -> Self {
        Self {
            inner,
            cache: BoundedCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &BoundedCache<StoryRequest, GeneratedStory> {
        &self.cache
    }
}

#[async_trait]
impl ContentGenerator for CachedGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &StoryRequest) -> anyhow::Result<GeneratedStory> {
        if let Some(story) = self.cache.get(request) {
            tracing::debug!(generator = self.inner.name(), "story cache hit");
            return Ok(story);
        }
        let story = self.inner.generate(request).await?;
        self.cache.insert(request.clone(), story.clone());
        Ok(story)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Level, StoryLength};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn evicts_least_recently_used() {
        let cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = BoundedCache::new(4);
        cache.insert(1, "x");
        cache.insert(2, "y");
        assert!(cache.invalidate(&1));
        assert!(!cache.invalidate(&1));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = BoundedCache::new(0);
        cache.insert("k", 1);
        assert!(cache.get(&"k").is_none());
    }

    struct Counting(AtomicU32);

    #[async_trait]
    impl ContentGenerator for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn generate(&self, request: &StoryRequest) -> anyhow::Result<GeneratedStory> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(GeneratedStory {
                text: format!("story {n} about {}", request.terms.join(" ")),
                model: request.model.clone(),
                token_usage: Default::default(),
                latency_ms: 0,
            })
        }
    }

    #[tokio::test]
    async fn cached_generator_reuses_stories() {
        let inner = Arc::new(Counting(AtomicU32::new(0)));
        let generator = CachedGenerator::new(inner.clone(), 8);
        let request = StoryRequest {
            model: "m".into(),
            terms: vec!["sol".into()],
            level: Level::A1,
            length: StoryLength::Short,
            topic: None,
        };

        let first = generator.generate(&request).await.unwrap();
        let second = generator.generate(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);

        generator.cache().invalidate(&request);
        let third = generator.generate(&request).await.unwrap();
        assert_ne!(first.text, third.text);
    }
}
