use crate::{error::ProviderResult, math::{Extent, TileCoordinate}};
use bevy::{prelude::*, utils::HashMap};
use image::RgbaImage;
use std::{collections::VecDeque, sync::Arc};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ImageryState {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// A tile of imagery of a single layer, shared by all terrain tiles it covers.
#[derive(Clone, Debug)]
pub struct Imagery {
    pub coordinate: TileCoordinate,
    pub extent: Extent,
    pub state: ImageryState,
    pub image: Option<Arc<RgbaImage>>,
    reference_count: u32,
}

impl Imagery {
    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }
}

/// The imagery of a layer, reference counted by the terrain tiles using it.
///
/// Imagery that is no longer referenced stays in the cache until it is evicted in
/// least recently released order.
pub struct ImageryCache {
    entries: HashMap<TileCoordinate, Imagery>,
    unused: VecDeque<TileCoordinate>,
    capacity: usize,
}

impl Default for ImageryCache {
    fn default() -> Self {
        Self::new(128)
    }
}

impl ImageryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: default(),
            unused: default(),
            capacity,
        }
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.trim();
    }

    pub fn get(&self, coordinate: TileCoordinate) -> Option<&Imagery> {
        self.entries.get(&coordinate)
    }

    pub(crate) fn get_mut(&mut self, coordinate: TileCoordinate) -> Option<&mut Imagery> {
        self.entries.get_mut(&coordinate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unused_len(&self) -> usize {
        self.unused.len()
    }

    /// Adds a reference to the imagery, creating it if necessary.
    pub(crate) fn acquire(&mut self, coordinate: TileCoordinate, extent: Extent) -> &mut Imagery {
        let imagery = self.entries.entry(coordinate).or_insert_with(|| Imagery {
            coordinate,
            extent,
            state: ImageryState::Unloaded,
            image: None,
            reference_count: 0,
        });

        if imagery.reference_count == 0 {
            self.unused.retain(|&unused| unused != coordinate);
        }

        imagery.reference_count += 1;
        imagery
    }

    pub(crate) fn release(&mut self, coordinate: TileCoordinate) {
        let Some(imagery) = self.entries.get_mut(&coordinate) else {
            debug_assert!(false, "released imagery {coordinate} that is not cached");
            return;
        };

        debug_assert!(imagery.reference_count > 0);
        imagery.reference_count = imagery.reference_count.saturating_sub(1);

        if imagery.reference_count == 0 {
            self.unused.push_back(coordinate);
            self.trim();
        }
    }

    /// Stores the result of a request. Results for imagery that was already evicted are
    /// kept as unused entries.
    pub(crate) fn loaded(
        &mut self,
        coordinate: TileCoordinate,
        extent: Extent,
        result: ProviderResult<Arc<RgbaImage>>,
    ) {
        let imagery = self.entries.entry(coordinate).or_insert_with(|| {
            self.unused.push_back(coordinate);

            Imagery {
                coordinate,
                extent,
                state: ImageryState::Unloaded,
                image: None,
                reference_count: 0,
            }
        });

        match result {
            Ok(image) => {
                imagery.state = ImageryState::Ready;
                imagery.image = Some(image);
            }
            Err(_) => {
                imagery.state = ImageryState::Failed;
                imagery.image = None;
            }
        }

        self.trim();
    }

    /// The closest coarser imagery tile that is ready to be drawn.
    pub fn nearest_ready_ancestor(&self, coordinate: TileCoordinate) -> Option<&Imagery> {
        let mut current = coordinate.parent();

        while let Some(coordinate) = current {
            match self.entries.get(&coordinate) {
                Some(imagery) if imagery.state == ImageryState::Ready => return Some(imagery),
                _ => current = coordinate.parent(),
            }
        }

        None
    }

    pub(crate) fn trim(&mut self) {
        while self.unused.len() > self.capacity {
            let Some(coordinate) = self.unused.pop_front() else {
                break;
            };

            if self
                .entries
                .get(&coordinate)
                .is_some_and(|imagery| imagery.reference_count == 0)
            {
                self.entries.remove(&coordinate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    fn coordinate(level: u32, x: u32) -> TileCoordinate {
        TileCoordinate::new(level, x, 0)
    }

    #[test]
    fn unreferenced_imagery_is_evicted_oldest_first() {
        let mut cache = ImageryCache::new(1);

        cache.acquire(coordinate(1, 0), Extent::default());
        cache.acquire(coordinate(1, 1), Extent::default());
        cache.acquire(coordinate(1, 1), Extent::default());

        cache.release(coordinate(1, 0));
        assert_eq!(cache.len(), 2, "one unused entry fits");

        cache.release(coordinate(1, 1));
        assert_eq!(cache.len(), 2, "still referenced once");

        cache.release(coordinate(1, 1));
        assert!(cache.get(coordinate(1, 0)).is_none());
        assert_eq!(cache.get(coordinate(1, 1)).unwrap().reference_count(), 0);

        cache.acquire(coordinate(1, 1), Extent::default());
        assert_eq!(cache.unused_len(), 0);
    }

    #[test]
    fn late_results_are_kept() {
        let mut cache = ImageryCache::new(4);

        cache.loaded(
            coordinate(0, 0),
            Extent::default(),
            Ok(Arc::new(RgbaImage::new(1, 1))),
        );
        cache.loaded(coordinate(2, 0), Extent::default(), Err(ProviderError::NotFound));

        assert_eq!(cache.get(coordinate(0, 0)).unwrap().state, ImageryState::Ready);
        assert_eq!(cache.get(coordinate(2, 0)).unwrap().state, ImageryState::Failed);
        assert_eq!(cache.unused_len(), 2);

        let ancestor = cache.nearest_ready_ancestor(coordinate(2, 0)).unwrap();
        assert_eq!(ancestor.coordinate, coordinate(0, 0));
        assert!(cache.nearest_ready_ancestor(coordinate(0, 0)).is_none());
    }
}
