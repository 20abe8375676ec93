//! The quadtree of terrain tiles.
//!
//! Tiles live in a slab and reference their parent and children by [`TileId`].
//! Children are created lazily, the first time a tile is refined.

mod tile;

pub use tile::{GeometrySource, Tile, TileId, TileLoadState};

use crate::{
    math::{TileCoordinate, TilingScheme},
    terrain::GeometryCache,
};
use bevy::{prelude::*, utils::HashMap};
use itertools::Itertools;
use slab::Slab;

pub struct Quadtree {
    tiles: Slab<Tile>,
    roots: Vec<TileId>,
    index: HashMap<TileCoordinate, TileId>,
    tiling_scheme: TilingScheme,
    next_generation: u64,
}

impl Quadtree {
    pub fn new(tiling_scheme: TilingScheme) -> Self {
        let mut quadtree = Self {
            tiles: Slab::new(),
            roots: Vec::new(),
            index: default(),
            tiling_scheme,
            next_generation: 0,
        };

        quadtree.insert_roots();

        quadtree
    }

    /// Drops all tiles and recreates the roots of the tiling scheme.
    /// Keys handed out before stay invalid.
    pub(crate) fn reset(&mut self, tiling_scheme: TilingScheme) {
        self.tiles.clear();
        self.index.clear();
        self.tiling_scheme = tiling_scheme;
        self.insert_roots();
    }

    fn insert_roots(&mut self) {
        self.roots = self
            .tiling_scheme
            .root_tiles()
            .map(|coordinate| self.insert(coordinate, None))
            .collect();
    }

    fn insert(&mut self, coordinate: TileCoordinate, parent: Option<TileId>) -> TileId {
        let extent = self.tiling_scheme.tile_extent(coordinate);
        let generation = self.next_generation;
        self.next_generation += 1;

        let key = self
            .tiles
            .insert(Tile::new(generation, coordinate, extent, parent));
        let id = TileId { key, generation };
        self.index.insert(coordinate, id);

        id
    }

    pub fn tiling_scheme(&self) -> TilingScheme {
        self.tiling_scheme
    }

    pub fn roots(&self) -> &[TileId] {
        &self.roots
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles
            .get(id.key)
            .filter(|tile| tile.generation == id.generation)
    }

    pub(crate) fn get_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles
            .get_mut(id.key)
            .filter(|tile| tile.generation == id.generation)
    }

    pub fn find(&self, coordinate: TileCoordinate) -> Option<TileId> {
        self.index.get(&coordinate).copied()
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles.iter().map(|(key, tile)| {
            let id = TileId {
                key,
                generation: tile.generation,
            };

            (id, tile)
        })
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (TileId, &mut Tile)> {
        self.tiles.iter_mut().map(|(key, tile)| {
            let id = TileId {
                key,
                generation: tile.generation,
            };

            (id, tile)
        })
    }

    /// Returns the children of the tile, creating them if necessary.
    /// Geometry kept for evicted tiles is reused.
    pub(crate) fn create_children(
        &mut self,
        id: TileId,
        geometry_cache: &mut GeometryCache,
    ) -> [TileId; 4] {
        if let Some(children) = self.tiles[id.key].children {
            return children;
        }

        let coordinate = self.tiles[id.key].coordinate;
        let children = coordinate.children().map(|child| {
            let child_id = self.insert(child, Some(id));

            if let Some(geometry) = geometry_cache.take(child) {
                self.tiles[child_id.key].set_geometry(geometry);
            }

            child_id
        });

        self.tiles[id.key].children = Some(children);

        children
    }

    /// Removes all descendants of the tile. Every removed tile is handed to `removed`.
    pub(crate) fn collapse_children(&mut self, id: TileId, removed: &mut impl FnMut(Tile)) {
        let Some(children) = self.get_mut(id).and_then(|tile| tile.children.take()) else {
            return;
        };

        for child in children {
            self.collapse_children(child, removed);

            let tile = self.tiles.remove(child.key);
            self.index.remove(&tile.coordinate);
            removed(tile);
        }
    }

    /// The closest ancestor whose own geometry is loaded.
    pub fn nearest_loaded_ancestor(&self, id: TileId) -> Option<TileId> {
        let mut current = self.get(id)?.parent;

        while let Some(ancestor) = current {
            let tile = self.get(ancestor)?;

            if tile.state == TileLoadState::Done && tile.geometry.is_some() {
                return Some(ancestor);
            }

            current = tile.parent;
        }

        None
    }

    /// Collapses the children of tiles whose children were not visited in `frame`,
    /// least recently visited first, until at most `cache_size` tiles remain.
    pub(crate) fn trim(&mut self, frame: u64, cache_size: usize, removed: &mut impl FnMut(Tile)) {
        if self.len() <= cache_size {
            return;
        }

        let candidates = self
            .iter()
            .filter_map(|(id, tile)| {
                let children = tile.children?;
                let last_visited = children
                    .iter()
                    .map(|child| self.tiles[child.key].last_visited_frame)
                    .max()?;

                (last_visited < frame).then_some((last_visited, tile.coordinate.level, id))
            })
            .sorted()
            .collect_vec();

        for (_, _, id) in candidates {
            if self.len() <= cache_size {
                break;
            }

            if self.contains(id) {
                self.collapse_children(id, removed);
            }
        }
    }
}
