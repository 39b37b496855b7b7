//! Last-known-good caches
//!
//! When a module cannot produce fresh output for a frame, the pipeline may fall back
//! to what it produced last time for the same camera and aspect ratio. The cache is
//! owned by the caller and passed in explicitly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Camera instance identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CameraId(pub u32);

/// Reduced output aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatioKey {
    width: u32,
    height: u32,
}

impl AspectRatioKey {
    /// Key for a `width` x `height` output, reduced to lowest terms
    pub fn new(width: u32, height: u32) -> Self {
        let divisor = gcd(width, height).max(1);
        Self {
            width: width / divisor,
            height: height / divisor,
        }
    }

    /// Reduced width term
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Reduced height term
    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Display for AspectRatioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Scope of one cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarryOverKey {
    /// Camera instance
    pub camera: CameraId,
    /// Output aspect ratio
    pub aspect: AspectRatioKey,
}

impl CarryOverKey {
    /// Key for `camera` at `width` x `height`
    pub fn new(camera: CameraId, width: u32, height: u32) -> Self {
        Self {
            camera,
            aspect: AspectRatioKey::new(width, height),
        }
    }
}

/// Caller-owned store of the last good value per camera and aspect ratio
#[derive(Debug, Clone)]
pub struct CarryOverCache<V> {
    entries: HashMap<CarryOverKey, V>,
}

impl<V> Default for CarryOverCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V: Clone> CarryOverCache<V> {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `value` as the last good value for `key`
    pub fn store(&mut self, key: CarryOverKey, value: V) {
        self.entries.insert(key, value);
    }

    /// Last good value for `key`
    pub fn get(&self, key: &CarryOverKey) -> Option<&V> {
        self.entries.get(key)
    }

    /// Mutable access, inserting a default entry if absent
    pub fn entry_or_default(&mut self, key: CarryOverKey) -> &mut V
    where
        V: Default,
    {
        self.entries.entry(key).or_default()
    }

    /// Store `fresh` when present, otherwise return the last good value
    pub fn resolve(&mut self, key: CarryOverKey, fresh: Option<V>) -> Option<V> {
        match fresh {
            Some(value) => {
                self.entries.insert(key, value.clone());
                Some(value)
            }
            None => self.entries.get(&key).cloned(),
        }
    }

    /// Drop every entry of `camera`
    pub fn invalidate_camera(&mut self, camera: CameraId) {
        self.entries.retain(|key, _| key.camera != camera);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_reduces() {
        assert_eq!(AspectRatioKey::new(1920, 1080), AspectRatioKey::new(16, 9));
        assert_eq!(AspectRatioKey::new(4000, 3000).to_string(), "4:3");
        assert_eq!(AspectRatioKey::new(0, 0), AspectRatioKey::new(0, 0));
    }

    #[test]
    fn test_resolve_falls_back() {
        let mut cache = CarryOverCache::new();
        let key = CarryOverKey::new(CameraId(0), 1920, 1080);

        assert_eq!(cache.resolve(key, None), None);
        assert_eq!(cache.resolve(key, Some(7)), Some(7));
        assert_eq!(cache.resolve(key, None), Some(7));

        // Another aspect ratio of the same camera is a separate scope
        let other = CarryOverKey::new(CameraId(0), 4000, 3000);
        assert_eq!(cache.resolve(other, None), None);
    }

    #[test]
    fn test_invalidate_camera() {
        let mut cache = CarryOverCache::new();
        cache.store(CarryOverKey::new(CameraId(0), 16, 9), 1);
        cache.store(CarryOverKey::new(CameraId(1), 16, 9), 2);
        cache.invalidate_camera(CameraId(0));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&CarryOverKey::new(CameraId(1), 16, 9)), Some(&2));
    }
}
