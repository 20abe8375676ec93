use crate::{
    frame_state::FrameState,
    imagery::{LayerId, TileImagery},
    math::{BoundingSphere, Extent, SceneMode, TileCoordinate},
    terrain::TileGeometry,
};
use std::sync::Arc;

/// The key of a tile inside of its [`Quadtree`](super::Quadtree).
///
/// Keys are only valid as long as the tile exists. Tiles that are recreated,
/// for example after the terrain provider changed or after they were trimmed,
/// receive new keys, even if their slot is reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub(crate) key: usize,
    pub(crate) generation: u64,
}

/// The load state of a tile's own geometry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TileLoadState {
    #[default]
    Unloaded,
    Loading,
    Done,
    Failed,
}

/// The geometry a tile was drawn with in the latest frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GeometrySource {
    /// The tile was not drawn.
    #[default]
    None,
    /// The tile's own loaded geometry.
    Own,
    /// The geometry of a loaded ancestor, referenced while the tile's own geometry loads.
    Ancestor { tile: TileId, level: u32 },
    /// A flat heightmap, used for root tiles whose geometry failed to load.
    Fallback,
}

/// A node of the terrain quadtree.
#[derive(Debug)]
pub struct Tile {
    pub(crate) generation: u64,
    pub(crate) coordinate: TileCoordinate,
    pub(crate) extent: Extent,
    pub(crate) parent: Option<TileId>,
    pub(crate) children: Option<[TileId; 4]>,
    pub(crate) state: TileLoadState,
    pub(crate) geometry: Option<Arc<TileGeometry>>,
    pub(crate) imagery: Vec<TileImagery>,
    /// The layers whose imagery was attached to this tile, in no particular order.
    pub(crate) attached_layers: Vec<LayerId>,
    pub(crate) geometry_source: GeometrySource,
    pub(crate) last_visited_frame: u64,
    pub(crate) last_rendered_frame: u64,
    pub(crate) used_by_descendant_frame: u64,
    bounding_sphere_3d: Option<BoundingSphere>,
}

impl Tile {
    pub(crate) fn new(
        generation: u64,
        coordinate: TileCoordinate,
        extent: Extent,
        parent: Option<TileId>,
    ) -> Self {
        Self {
            generation,
            coordinate,
            extent,
            parent,
            children: None,
            state: TileLoadState::Unloaded,
            geometry: None,
            imagery: Vec::new(),
            attached_layers: Vec::new(),
            geometry_source: GeometrySource::None,
            last_visited_frame: 0,
            last_rendered_frame: 0,
            used_by_descendant_frame: 0,
            bounding_sphere_3d: None,
        }
    }

    pub fn coordinate(&self) -> TileCoordinate {
        self.coordinate
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn parent(&self) -> Option<TileId> {
        self.parent
    }

    pub fn children(&self) -> Option<[TileId; 4]> {
        self.children
    }

    pub fn state(&self) -> TileLoadState {
        self.state
    }

    pub fn geometry(&self) -> Option<&Arc<TileGeometry>> {
        self.geometry.as_ref()
    }

    /// The imagery draped over the tile, ordered like the layers of the collection.
    pub fn imagery(&self) -> &[TileImagery] {
        &self.imagery
    }

    pub fn geometry_source(&self) -> GeometrySource {
        self.geometry_source
    }

    pub fn last_visited_frame(&self) -> u64 {
        self.last_visited_frame
    }

    pub fn last_rendered_frame(&self) -> u64 {
        self.last_rendered_frame
    }

    /// Whether a descendant was drawn with this tile's geometry in the given frame.
    pub fn is_used_by_descendant(&self, frame: u64) -> bool {
        self.used_by_descendant_frame == frame
    }

    pub fn has_layer(&self, id: LayerId) -> bool {
        self.attached_layers.contains(&id)
    }

    pub(crate) fn set_geometry(&mut self, geometry: Arc<TileGeometry>) {
        debug_assert!(
            self.geometry.is_none(),
            "geometry of tile {} is immutable once loaded",
            self.coordinate
        );

        self.state = TileLoadState::Done;
        self.geometry = Some(geometry);
        self.bounding_sphere_3d = None;
    }

    pub(crate) fn height_range(&self) -> (f64, f64) {
        self.geometry.as_ref().map_or((0.0, 0.0), |geometry| {
            (
                geometry.minimum_height as f64,
                geometry.maximum_height as f64,
            )
        })
    }

    /// The bounding volume of the tile in the coordinate system of the scene mode.
    pub(crate) fn bounding_sphere(
        &mut self,
        frame_state: &FrameState,
        height_range: (f64, f64),
    ) -> BoundingSphere {
        let (minimum_height, maximum_height) = height_range;

        if frame_state.mode != SceneMode::Scene3D {
            return frame_state.bounding_sphere(&self.extent, minimum_height, maximum_height);
        }

        if self.geometry.is_some() {
            if let Some(sphere) = self.bounding_sphere_3d {
                return sphere;
            }
        }

        let sphere = frame_state.bounding_sphere(&self.extent, minimum_height, maximum_height);

        if self.geometry.is_some() {
            self.bounding_sphere_3d = Some(sphere);
        }

        sphere
    }

    /// Removes the imagery of a layer, returning the removed entries.
    pub(crate) fn detach_layer(&mut self, id: LayerId) -> Vec<TileImagery> {
        self.attached_layers.retain(|&layer| layer != id);

        let (removed, kept) = self
            .imagery
            .drain(..)
            .partition(|tile_imagery| tile_imagery.layer == id);
        self.imagery = kept;

        removed
    }

    /// Restores the drawing order of the imagery after the layers were reordered.
    pub(crate) fn sort_imagery(&mut self, layer_index: impl Fn(LayerId) -> usize) {
        self.imagery
            .sort_by_key(|tile_imagery| layer_index(tile_imagery.layer));
    }
}
