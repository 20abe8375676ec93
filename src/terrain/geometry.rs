use crate::math::TileCoordinate;
use bevy::{math::DVec2, prelude::*, utils::HashMap};
use ndarray::Array2;
use std::{collections::VecDeque, sync::Arc};

/// The heightmap of a terrain tile.
///
/// Row 0 lies on the northern edge of the tile, column 0 on the western edge.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGeometry {
    pub heights: Array2<f32>,
    pub minimum_height: f32,
    pub maximum_height: f32,
}

impl TileGeometry {
    pub fn new(heights: Array2<f32>) -> Self {
        let (minimum_height, maximum_height) = heights
            .iter()
            .fold((f32::MAX, f32::MIN), |(min, max), &height| {
                (min.min(height), max.max(height))
            });

        if heights.is_empty() {
            return Self {
                heights,
                minimum_height: 0.0,
                maximum_height: 0.0,
            };
        }

        Self {
            heights,
            minimum_height,
            maximum_height,
        }
    }

    /// A heightmap lying on the ellipsoid.
    pub fn flat(width: usize, height: usize) -> Self {
        Self::new(Array2::zeros((height, width)))
    }

    pub fn width(&self) -> usize {
        self.heights.ncols()
    }

    pub fn height(&self) -> usize {
        self.heights.nrows()
    }

    /// Bilinearly samples the heightmap, `uv` runs from the south west (0, 0)
    /// to the north east (1, 1) corner.
    pub fn sample(&self, uv: DVec2) -> f32 {
        let (rows, columns) = self.heights.dim();

        if rows == 0 || columns == 0 {
            return 0.0;
        }

        let uv = uv.clamp(DVec2::ZERO, DVec2::ONE);
        let x = uv.x * (columns - 1) as f64;
        let y = (1.0 - uv.y) * (rows - 1) as f64;

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(columns - 1);
        let y1 = (y0 + 1).min(rows - 1);
        let fx = (x - x0 as f64) as f32;
        let fy = (y - y0 as f64) as f32;

        let top = self.heights[[y0, x0]] * (1.0 - fx) + self.heights[[y0, x1]] * fx;
        let bottom = self.heights[[y1, x0]] * (1.0 - fx) + self.heights[[y1, x1]] * fx;

        top * (1.0 - fy) + bottom * fy
    }

    /// Creates the geometry of a child tile at the same resolution, by sampling the
    /// quadrant of this heightmap that the child covers.
    pub fn upsample(&self, child_index: usize) -> Self {
        let (rows, columns) = self.heights.dim();
        let offset = DVec2::new(
            0.5 * (child_index % 2) as f64,
            0.5 * (1 - child_index / 2) as f64,
        );

        let heights = Array2::from_shape_fn((rows, columns), |(row, column)| {
            let local = DVec2::new(
                column as f64 / (columns.max(2) - 1) as f64,
                1.0 - row as f64 / (rows.max(2) - 1) as f64,
            );

            self.sample(offset + 0.5 * local)
        });

        Self::new(heights)
    }
}

/// Keeps the geometry of tiles that were evicted from the quadtree, so that it can be
/// reused once they are needed again.
pub(crate) struct GeometryCache {
    entries: HashMap<TileCoordinate, Arc<TileGeometry>>,
    order: VecDeque<TileCoordinate>,
    capacity: usize,
}

impl GeometryCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: default(),
            order: default(),
            capacity,
        }
    }

    pub(crate) fn insert(&mut self, coordinate: TileCoordinate, geometry: Arc<TileGeometry>) {
        if self.entries.insert(coordinate, geometry).is_some() {
            self.order.retain(|&cached| cached != coordinate);
        }

        self.order.push_back(coordinate);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub(crate) fn take(&mut self, coordinate: TileCoordinate) -> Option<Arc<TileGeometry>> {
        let geometry = self.entries.remove(&coordinate)?;
        self.order.retain(|&cached| cached != coordinate);

        Some(geometry)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sample_interpolates_between_posts() {
        // west to east: 0 -> 10, north row is raised by 100
        let geometry = TileGeometry::new(array![[100.0, 110.0], [0.0, 10.0]]);

        assert_eq!(geometry.minimum_height, 0.0);
        assert_eq!(geometry.maximum_height, 110.0);
        assert_eq!(geometry.sample(DVec2::new(0.0, 0.0)), 0.0);
        assert_eq!(geometry.sample(DVec2::new(1.0, 1.0)), 110.0);
        assert_eq!(geometry.sample(DVec2::new(0.5, 0.5)), 55.0);
    }

    #[test]
    fn upsampled_child_covers_its_quadrant() {
        let geometry = TileGeometry::new(array![[100.0, 110.0], [0.0, 10.0]]);

        // north east child
        let child = geometry.upsample(1);
        assert_eq!(child.heights[[0, 0]], 105.0);
        assert_eq!(child.heights[[0, 1]], 110.0);
        assert_eq!(child.heights[[1, 0]], 55.0);
        assert_eq!(child.heights[[1, 1]], 60.0);

        // south west child
        let child = geometry.upsample(2);
        assert_eq!(child.heights[[1, 0]], 0.0);
        assert_eq!(child.maximum_height, 55.0);
    }

    #[test]
    fn cache_evicts_least_recently_inserted() {
        let mut cache = GeometryCache::new(2);
        let geometry = Arc::new(TileGeometry::flat(2, 2));

        for x in 0..3 {
            cache.insert(TileCoordinate::new(1, x, 0), geometry.clone());
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.take(TileCoordinate::new(1, 0, 0)).is_none());
        assert!(cache.take(TileCoordinate::new(1, 2, 0)).is_some());
        assert_eq!(cache.len(), 1);
    }
}
