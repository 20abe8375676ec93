//! The central body surface: selects the terrain tiles to draw each frame, keeps their
//! geometry and imagery loaded and turns them into draw commands.
//!
//! Every update runs the same steps:
//! 1. apply the provider responses that arrived since the previous update,
//! 2. traverse the quadtree from the root tiles, culling invisible tiles and refining
//!    tiles whose screen space error is too large,
//! 3. attach the imagery of every shown layer to the selected tiles,
//! 4. dispatch the most important missing geometry and imagery to the providers,
//! 5. collapse unused subtrees once the tile cache is full,
//! 6. group the selected tiles by texture count and emit their draw commands.

use crate::{
    config::SurfaceConfig,
    debug::SurfaceDebug,
    error::{SurfaceError, SurfaceResult},
    frame_state::{projected_bounds, FrameState},
    imagery::{
        covering_imagery, ImageryLayer, ImageryLayerCollection, ImageryProvider, ImageryState,
        LayerAdjustment, LayerId, ReadyImagery, TileImagery,
    },
    loader::{LoadKey, LoadPayload, LoadQueue},
    math::{BoundingSphere, CullingVolume, Intersect, SceneMode, TileCoordinate},
    quadtree::{GeometrySource, Quadtree, Tile, TileId, TileLoadState},
    render::{
        CommandList, DrawCommand, GeometryBinding, RenderContext, TextureBinding, UniformMap,
        DAY_TEXTURE_ALPHA, DAY_TEXTURE_BRIGHTNESS, DAY_TEXTURE_CONTRAST, DAY_TEXTURE_COUNT,
        DAY_TEXTURE_ONE_OVER_GAMMA, DAY_TEXTURE_TEX_COORDS_EXTENT,
        DAY_TEXTURE_TRANSLATION_AND_SCALE,
    },
    terrain::{EllipsoidTerrainProvider, GeometryCache, TerrainProvider, TileGeometry},
};
use bevy::{math::DVec4, prelude::*, utils::HashMap};
use std::sync::Arc;


/// The collaborators and settings a [`CentralBodySurface`] is created from.
#[derive(Default)]
pub struct SurfaceDescriptor {
    pub terrain_provider: Option<Arc<dyn TerrainProvider>>,
    pub imagery_layers: Option<ImageryLayerCollection>,
    pub config: SurfaceConfig,
}

impl SurfaceDescriptor {
    pub fn with_terrain_provider(mut self, provider: impl TerrainProvider) -> Self {
        self.terrain_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_imagery_layers(mut self, imagery_layers: ImageryLayerCollection) -> Self {
        self.imagery_layers = Some(imagery_layers);
        self
    }

    pub fn with_config(mut self, config: SurfaceConfig) -> Self {
        self.config = config;
        self
    }
}

/// A tile selected for drawing in the current frame.
struct RenderTile {
    id: TileId,
    screen_space_error: f64,
    bounding_sphere: BoundingSphere,
}

#[derive(Resource)]
pub struct CentralBodySurface {
    config: SurfaceConfig,
    terrain_provider: Arc<dyn TerrainProvider>,
    imagery_layers: ImageryLayerCollection,
    quadtree: Quadtree,
    load_queue: LoadQueue,
    geometry_cache: GeometryCache,
    fallback_geometry: Arc<TileGeometry>,
    tiles_to_render: Vec<RenderTile>,
    tiles_to_render_by_texture_count: Vec<Vec<TileId>>,
    frame: u64,
    terrain_epoch: u64,
    debug: SurfaceDebug,
}

impl CentralBodySurface {
    pub fn new(descriptor: SurfaceDescriptor) -> SurfaceResult<Self> {
        let SurfaceDescriptor {
            terrain_provider,
            imagery_layers,
            config,
        } = descriptor;

        config.validate()?;
        let terrain_provider = terrain_provider.ok_or(SurfaceError::MissingTerrainProvider)?;
        let mut imagery_layers =
            imagery_layers.ok_or(SurfaceError::MissingImageryLayerCollection)?;

        for layer in imagery_layers.iter_mut() {
            layer.cache.set_capacity(config.imagery_cache_size);
        }

        info!(
            "Created the surface with {} imagery layers.",
            imagery_layers.len()
        );

        Ok(Self {
            quadtree: Quadtree::new(terrain_provider.tiling_scheme()),
            geometry_cache: GeometryCache::new(config.geometry_cache_size),
            fallback_geometry: Arc::new(TileGeometry::flat(
                EllipsoidTerrainProvider::HEIGHTMAP_WIDTH,
                EllipsoidTerrainProvider::HEIGHTMAP_WIDTH,
            )),
            config,
            terrain_provider,
            imagery_layers,
            load_queue: LoadQueue::default(),
            tiles_to_render: Vec::new(),
            tiles_to_render_by_texture_count: Vec::new(),
            frame: 0,
            terrain_epoch: 0,
            debug: default(),
        })
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn terrain_provider(&self) -> &Arc<dyn TerrainProvider> {
        &self.terrain_provider
    }

    pub fn imagery_layers(&self) -> &ImageryLayerCollection {
        &self.imagery_layers
    }

    pub fn quadtree(&self) -> &Quadtree {
        &self.quadtree
    }

    pub fn load_queue(&self) -> &LoadQueue {
        &self.load_queue
    }

    pub fn debug(&self) -> &SurfaceDebug {
        &self.debug
    }

    pub fn debug_mut(&mut self) -> &mut SurfaceDebug {
        &mut self.debug
    }

    /// The number of updates run so far.
    pub fn frame_number(&self) -> u64 {
        self.frame
    }

    /// Increases every time the terrain provider is replaced.
    pub fn terrain_epoch(&self) -> u64 {
        self.terrain_epoch
    }

    /// The tiles drawn in the latest update, grouped by the number of imagery textures
    /// they bind. The tiles at index `n` bind `n` textures.
    pub fn tiles_to_render_by_texture_count(&self) -> &[Vec<TileId>] {
        &self.tiles_to_render_by_texture_count
    }

    /// Iterates over the tiles drawn in the latest update.
    pub fn rendered_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles_to_render_by_texture_count
            .iter()
            .flatten()
            .filter_map(|&id| self.quadtree.get(id))
    }

    /// Whether all geometry and imagery of the drawn tiles is loaded or failed.
    pub fn is_settled(&self) -> bool {
        self.load_queue.is_empty() && self.debug.tiles_waiting_for_children == 0
    }

    /// Replaces the terrain provider. All tiles are recreated, responses to requests
    /// made to the previous provider are discarded.
    pub fn set_terrain_provider(&mut self, terrain_provider: Arc<dyn TerrainProvider>) {
        let Self {
            quadtree,
            imagery_layers,
            ..
        } = self;

        for (_, tile) in quadtree.iter() {
            release_imagery(imagery_layers, &tile.imagery);
        }

        self.quadtree.reset(terrain_provider.tiling_scheme());
        self.terrain_provider = terrain_provider;
        self.load_queue.forget_geometry();
        self.geometry_cache.clear();
        self.tiles_to_render.clear();
        self.tiles_to_render_by_texture_count.clear();
        self.terrain_epoch += 1;

        info!(
            "Replaced the terrain provider, starting terrain epoch {}.",
            self.terrain_epoch
        );
    }

    /// Adds a layer on top of all other layers. Its imagery is attached to the tiles
    /// during the following updates.
    pub fn add_imagery_provider(&mut self, provider: Arc<dyn ImageryProvider>) -> LayerId {
        self.add_imagery_layer(provider, None)
    }

    /// Adds a layer at the given index of the collection, or on top if `None`.
    pub fn add_imagery_layer(
        &mut self,
        provider: Arc<dyn ImageryProvider>,
        index: Option<usize>,
    ) -> LayerId {
        let id = self.imagery_layers.add(provider, index);

        if let Some(layer) = self.imagery_layers.layer_mut(id) {
            layer.cache.set_capacity(self.config.imagery_cache_size);
        }

        info!("Added imagery layer {}.", id.0);

        id
    }

    /// Removes a layer and detaches its imagery from every tile.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<ImageryLayer> {
        if !self.imagery_layers.contains(id) {
            return None;
        }

        for (_, tile) in self.quadtree.iter_mut() {
            tile.detach_layer(id);
        }

        self.load_queue.forget_layer(id);

        info!("Removed imagery layer {}.", id.0);

        self.imagery_layers.remove(id)
    }

    pub fn remove_all_layers(&mut self) -> Vec<ImageryLayer> {
        self.imagery_layers
            .ids()
            .into_iter()
            .filter_map(|id| self.remove_layer(id))
            .collect()
    }

    pub fn raise_layer(&mut self, id: LayerId) -> bool {
        let changed = self.imagery_layers.raise(id);
        self.layers_reordered(changed)
    }

    pub fn lower_layer(&mut self, id: LayerId) -> bool {
        let changed = self.imagery_layers.lower(id);
        self.layers_reordered(changed)
    }

    pub fn raise_layer_to_top(&mut self, id: LayerId) -> bool {
        let changed = self.imagery_layers.raise_to_top(id);
        self.layers_reordered(changed)
    }

    pub fn lower_layer_to_bottom(&mut self, id: LayerId) -> bool {
        let changed = self.imagery_layers.lower_to_bottom(id);
        self.layers_reordered(changed)
    }

    /// Shows or hides a layer. Hidden layers are detached from all tiles immediately.
    pub fn set_layer_show(&mut self, id: LayerId, show: bool) -> bool {
        let Some(layer) = self.imagery_layers.layer_mut(id) else {
            return false;
        };

        if layer.show() == show {
            return true;
        }

        layer.set_show(show);

        if !show {
            for (_, tile) in self.quadtree.iter_mut() {
                let removed = tile.detach_layer(id);

                for tile_imagery in removed {
                    layer.cache.release(tile_imagery.imagery);
                }
            }
        }

        debug!("Set the visibility of imagery layer {} to {show}.", id.0);

        true
    }

    /// Gives access to the adjustments of a layer.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut ImageryLayer> {
        self.imagery_layers.layer_mut(id)
    }

    fn layers_reordered(&mut self, changed: bool) -> bool {
        if !changed {
            return false;
        }

        let layer_order = self.layer_order();

        for (_, tile) in self.quadtree.iter_mut() {
            tile.sort_imagery(|layer| layer_order.get(&layer).copied().unwrap_or(usize::MAX));
        }

        debug!("Reordered imagery layers to {:?}.", self.imagery_layers.ids());

        true
    }

    fn layer_order(&self) -> HashMap<LayerId, usize> {
        self.imagery_layers
            .iter()
            .enumerate()
            .map(|(index, layer)| (layer.id(), index))
            .collect()
    }

    /// Selects, loads and draws the tiles for the frame.
    /// The draw commands are appended to `command_lists`.
    pub fn update(
        &mut self,
        context: &RenderContext,
        frame_state: &FrameState,
        command_lists: &mut Vec<CommandList>,
    ) {
        self.frame += 1;
        self.debug.reset();

        self.apply_responses();
        self.load_queue.clear_pending();

        self.select_tiles(frame_state);

        for index in 0..self.tiles_to_render.len() {
            let RenderTile {
                id,
                screen_space_error,
                ..
            } = self.tiles_to_render[index];

            self.attach_imagery(id);
            self.update_tile_imagery(id, screen_space_error);
        }

        self.dispatch_requests();
        self.trim_tile_cache();

        let command_list = self.create_commands(context, frame_state);

        self.debug.log(self.frame);

        if !command_list.is_empty() {
            command_lists.push(command_list);
        }
    }

    fn apply_responses(&mut self) {
        for response in self.load_queue.receive() {
            match (response.key, response.payload) {
                (LoadKey::Geometry(coordinate), LoadPayload::Geometry(result)) => {
                    let tile = self
                        .quadtree
                        .find(coordinate)
                        .and_then(|id| self.quadtree.get_mut(id));

                    match (tile, result) {
                        (Some(tile), Ok(geometry)) => {
                            if tile.geometry.is_none() {
                                tile.set_geometry(Arc::new(geometry));
                            }
                        }
                        (Some(tile), Err(error)) => {
                            warn!("Failed to load the geometry of tile {coordinate}: {error}.");
                            tile.state = TileLoadState::Failed;
                        }
                        (None, Ok(geometry)) => {
                            // the tile was evicted while loading
                            self.geometry_cache.insert(coordinate, Arc::new(geometry));
                        }
                        (None, Err(error)) => {
                            debug!("Evicted tile {coordinate} failed to load: {error}.");
                        }
                    }
                }
                (LoadKey::Imagery { layer, coordinate }, LoadPayload::Imagery(result)) => {
                    let Some(layer) = self.imagery_layers.layer_mut(layer) else {
                        continue;
                    };

                    if let Err(error) = &result {
                        warn!(
                            "Failed to load imagery {coordinate} of layer {}: {error}.",
                            layer.id().0
                        );
                    }

                    let extent = layer.provider().tiling_scheme().tile_extent(coordinate);
                    layer.cache.loaded(coordinate, extent, result);
                }
                (key, _) => unreachable!("response payload does not match {key}"),
            }
        }
    }

    fn select_tiles(&mut self, frame_state: &FrameState) {
        self.tiles_to_render.clear();

        let culling_volume = frame_state.camera.culling_volume();

        for root in self.quadtree.roots().to_vec() {
            self.visit_tile(root, frame_state, &culling_volume);
        }
    }

    fn visit_tile(&mut self, id: TileId, frame_state: &FrameState, culling_volume: &CullingVolume) {
        let frame = self.frame;
        let height_range = self.height_range(id);

        let Some(tile) = self.quadtree.get_mut(id) else {
            return;
        };

        tile.last_visited_frame = frame;
        tile.geometry_source = GeometrySource::None;

        let level = tile.coordinate.level;
        let bounding_sphere = tile.bounding_sphere(frame_state, height_range);

        self.debug.tiles_visited += 1;
        self.debug.max_depth = self.debug.max_depth.max(level);

        if !self.is_visible(id, frame_state, culling_volume, &bounding_sphere) {
            self.debug.tiles_culled += 1;
            return;
        }

        let screen_space_error = self.screen_space_error(level, frame_state, &bounding_sphere);

        self.ensure_geometry(id, screen_space_error);

        if screen_space_error > self.config.maximum_screen_space_error
            && level < self.config.maximum_level
        {
            let children = self
                .quadtree
                .create_children(id, &mut self.geometry_cache);

            for child in children {
                self.visit_tile(child, frame_state, culling_volume);
            }

            let waiting = children.iter().any(|&child| {
                self.quadtree.get(child).is_some_and(|tile| {
                    matches!(tile.geometry_source, GeometrySource::Ancestor { .. })
                        && tile.state != TileLoadState::Failed
                })
            });

            if waiting {
                self.debug.tiles_waiting_for_children += 1;
            }

            return;
        }

        self.add_tile_to_render(id, screen_space_error, bounding_sphere);
    }

    /// The height range of the geometry the tile will most likely be drawn with.
    fn height_range(&self, id: TileId) -> (f64, f64) {
        let Some(tile) = self.quadtree.get(id) else {
            return (0.0, 0.0);
        };

        if tile.geometry.is_some() {
            return tile.height_range();
        }

        self.quadtree
            .nearest_loaded_ancestor(id)
            .and_then(|ancestor| self.quadtree.get(ancestor))
            .map_or((0.0, 0.0), Tile::height_range)
    }

    fn is_visible(
        &self,
        id: TileId,
        frame_state: &FrameState,
        culling_volume: &CullingVolume,
        bounding_sphere: &BoundingSphere,
    ) -> bool {
        if frame_state.mode == SceneMode::Scene2D {
            if let (Some((view_min, view_max)), Some(tile)) = (
                frame_state.camera.orthographic_bounds(),
                self.quadtree.get(id),
            ) {
                let (tile_min, tile_max) = projected_bounds(&tile.extent, &frame_state.projection);

                return tile_min.x <= view_max.x
                    && tile_max.x >= view_min.x
                    && tile_min.y <= view_max.y
                    && tile_max.y >= view_min.y;
            }
        }

        culling_volume.visibility(bounding_sphere) != Intersect::Outside
    }

    fn screen_space_error(
        &self,
        level: u32,
        frame_state: &FrameState,
        bounding_sphere: &BoundingSphere,
    ) -> f64 {
        let geometric_error = self.terrain_provider.level_maximum_geometric_error(level);
        let distance = bounding_sphere.distance_to(frame_state.camera.position);

        geometric_error / frame_state.camera.pixel_size(distance)
    }

    /// Queues the tile's own geometry, or creates it right away from the parent when the
    /// provider has no data at the tile's level.
    fn ensure_geometry(&mut self, id: TileId, priority: f64) {
        let Some(tile) = self.quadtree.get(id) else {
            return;
        };

        if tile.state != TileLoadState::Unloaded {
            return;
        }

        let coordinate = tile.coordinate;

        if self.terrain_provider.is_tile_available(coordinate) {
            self.load_queue
                .enqueue(LoadKey::Geometry(coordinate), priority);
            return;
        }

        let Some(parent) = tile.parent.and_then(|parent| self.quadtree.get(parent)) else {
            return;
        };

        match (parent.state, parent.geometry.clone()) {
            (TileLoadState::Done, Some(geometry)) => {
                let geometry = geometry.upsample(coordinate.child_index());

                if let Some(tile) = self.quadtree.get_mut(id) {
                    tile.set_geometry(Arc::new(geometry));
                }

                trace!("Upsampled the geometry of tile {coordinate}.");
            }
            (TileLoadState::Failed, _) => {
                if let Some(tile) = self.quadtree.get_mut(id) {
                    tile.state = TileLoadState::Failed;
                }
            }
            // the parent is requested while it is visited
            _ => {}
        }
    }

    fn add_tile_to_render(
        &mut self,
        id: TileId,
        screen_space_error: f64,
        bounding_sphere: BoundingSphere,
    ) {
        let frame = self.frame;

        let Some(tile) = self.quadtree.get(id) else {
            return;
        };

        let source = if tile.state == TileLoadState::Done {
            GeometrySource::Own
        } else if let Some(ancestor) = self.quadtree.nearest_loaded_ancestor(id) {
            let level = self
                .quadtree
                .get(ancestor)
                .map_or(0, |ancestor| ancestor.coordinate.level);

            if let Some(ancestor) = self.quadtree.get_mut(ancestor) {
                ancestor.used_by_descendant_frame = frame;
            }

            GeometrySource::Ancestor {
                tile: ancestor,
                level,
            }
        } else if self.root_failed(id) {
            GeometrySource::Fallback
        } else {
            return;
        };

        if let Some(tile) = self.quadtree.get_mut(id) {
            tile.geometry_source = source;
            tile.last_rendered_frame = frame;
        }

        self.debug.tiles_rendered += 1;
        self.tiles_to_render.push(RenderTile {
            id,
            screen_space_error,
            bounding_sphere,
        });
    }

    fn root_failed(&self, id: TileId) -> bool {
        let mut current = self.quadtree.get(id);

        while let Some(tile) = current {
            match tile.parent {
                Some(parent) => current = self.quadtree.get(parent),
                None => return tile.state == TileLoadState::Failed,
            }
        }

        false
    }

    /// Attaches the imagery of every shown layer that the tile does not have yet.
    /// The entries are inserted after those of all lower layers.
    fn attach_imagery(&mut self, id: TileId) {
        let layer_order = self.layer_order();

        let Self {
            quadtree,
            imagery_layers,
            ..
        } = self;

        let Some(tile) = quadtree.get_mut(id) else {
            return;
        };

        for (index, layer) in imagery_layers.iter_mut().enumerate() {
            if !layer.show() || tile.has_layer(layer.id()) {
                continue;
            }

            let layer_id = layer.id();
            let tiling_scheme = layer.provider().tiling_scheme();
            let coordinates = covering_imagery(layer.provider().as_ref(), &tile.extent);

            let entries = coordinates
                .into_iter()
                .map(|coordinate| {
                    let imagery = layer
                        .cache
                        .acquire(coordinate, tiling_scheme.tile_extent(coordinate));

                    TileImagery::new(layer_id, imagery, &tile.extent)
                })
                .collect::<Vec<_>>();

            let position = tile
                .imagery
                .iter()
                .position(|tile_imagery| {
                    layer_order
                        .get(&tile_imagery.layer)
                        .is_some_and(|&other| other > index)
                })
                .unwrap_or(tile.imagery.len());

            tile.imagery.splice(position..position, entries);
            tile.attached_layers.push(layer_id);
        }
    }

    /// Queues missing imagery and replaces failed imagery with its parent.
    fn update_tile_imagery(&mut self, id: TileId, priority: f64) {
        let Self {
            quadtree,
            imagery_layers,
            load_queue,
            ..
        } = self;

        let Some(tile) = quadtree.get_mut(id) else {
            return;
        };

        let mut index = 0;

        while index < tile.imagery.len() {
            let tile_imagery = &tile.imagery[index];
            let (layer_id, coordinate) = (tile_imagery.layer, tile_imagery.imagery);

            debug_assert!(
                imagery_layers.contains(layer_id),
                "tile {} references the removed layer {}",
                tile.coordinate,
                layer_id.0
            );

            let Some(layer) = imagery_layers.layer_mut(layer_id) else {
                tile.imagery.remove(index);
                continue;
            };

            let state = layer.cache.get(coordinate).map(|imagery| imagery.state);

            match state {
                Some(ImageryState::Unloaded) => {
                    load_queue.enqueue(
                        LoadKey::Imagery {
                            layer: layer_id,
                            coordinate,
                        },
                        priority,
                    );
                }
                Some(ImageryState::Failed)
                    if coordinate.level > layer.provider().minimum_level() =>
                {
                    let Some(parent) = coordinate.parent() else {
                        index += 1;
                        continue;
                    };

                    layer.cache.release(coordinate);

                    let duplicate = tile.imagery.iter().any(|tile_imagery| {
                        tile_imagery.layer == layer_id && tile_imagery.imagery == parent
                    });

                    if duplicate {
                        tile.imagery.remove(index);
                    } else {
                        let extent = layer.provider().tiling_scheme().tile_extent(parent);
                        let imagery = layer.cache.acquire(parent, extent);
                        tile.imagery[index] = TileImagery::new(layer_id, imagery, &tile.extent);
                    }

                    // revisit the entry now referencing the parent
                    continue;
                }
                _ => {}
            }

            index += 1;
        }
    }

    fn dispatch_requests(&mut self) {
        let dispatched = self.load_queue.drain(
            self.config.max_requests_per_frame,
            self.config.max_concurrent_requests,
        );

        for (key, ticket) in dispatched {
            match key {
                LoadKey::Geometry(coordinate) => {
                    if let Some(tile) = self
                        .quadtree
                        .find(coordinate)
                        .and_then(|id| self.quadtree.get_mut(id))
                    {
                        tile.state = TileLoadState::Loading;
                    }

                    self.terrain_provider
                        .request_tile_geometry(self.load_queue.request(key, ticket));
                }
                LoadKey::Imagery { layer, coordinate } => {
                    let Some(layer) = self.imagery_layers.layer_mut(layer) else {
                        self.load_queue.finish(&key);
                        continue;
                    };

                    if let Some(imagery) = layer.cache.get_mut(coordinate) {
                        imagery.state = ImageryState::Loading;
                    }

                    layer
                        .provider()
                        .request_image(self.load_queue.request(key, ticket));
                }
            }
        }
    }

    fn trim_tile_cache(&mut self) {
        let Self {
            quadtree,
            imagery_layers,
            geometry_cache,
            config,
            frame,
            ..
        } = self;

        quadtree.trim(*frame, config.tile_cache_size, &mut |tile: Tile| {
            release_imagery(imagery_layers, &tile.imagery);

            if let (TileLoadState::Done, Some(geometry)) = (tile.state, tile.geometry) {
                geometry_cache.insert(tile.coordinate, geometry);
            }
        });
    }

    fn create_commands(&mut self, context: &RenderContext, frame_state: &FrameState) -> CommandList {
        let max_textures = self
            .config
            .max_textures_per_command
            .min(context.maximum_texture_image_units)
            .max(1);

        let mut tiles = Vec::with_capacity(self.tiles_to_render.len());

        for render_tile in &self.tiles_to_render {
            let Some(tile) = self.quadtree.get(render_tile.id) else {
                continue;
            };

            let textures = tile
                .imagery
                .iter()
                .filter_map(|tile_imagery| {
                    let layer = self.imagery_layers.layer(tile_imagery.layer)?;
                    let ready = tile_imagery.ready_imagery(&layer.cache, &tile.extent)?;

                    Some((tile_imagery.layer, ready))
                })
                .collect::<Vec<_>>();

            tiles.push((render_tile, tile, textures));
        }

        let mut by_texture_count: Vec<Vec<usize>> = Vec::new();

        for (index, (_, _, textures)) in tiles.iter().enumerate() {
            if by_texture_count.len() <= textures.len() {
                by_texture_count.resize_with(textures.len() + 1, Vec::new);
            }

            by_texture_count[textures.len()].push(index);
        }

        let mut command_list = CommandList::default();

        for &index in by_texture_count.iter().flatten() {
            let (render_tile, tile, textures) = &tiles[index];

            let Some((geometry, geometry_binding)) = self.geometry_binding(tile) else {
                continue;
            };

            let groups = if textures.is_empty() {
                vec![&textures[..]]
            } else {
                textures.chunks(max_textures).collect()
            };

            for (pass, group) in groups.into_iter().enumerate() {
                command_list.color_list.push(DrawCommand {
                    tile: tile.coordinate,
                    geometry: geometry.clone(),
                    geometry_binding: geometry_binding.clone(),
                    bounding_sphere: render_tile.bounding_sphere,
                    textures: group
                        .iter()
                        .map(|(layer, ready)| TextureBinding {
                            layer: *layer,
                            imagery: ready.imagery,
                            image: ready.image.clone(),
                        })
                        .collect(),
                    pass,
                    blend: pass > 0,
                    uniform_map: self.uniform_map(frame_state, tile, group),
                });

                self.debug.texture_groups += 1;
            }
        }

        self.tiles_to_render_by_texture_count = by_texture_count
            .into_iter()
            .map(|indices| {
                indices
                    .into_iter()
                    .map(|index| tiles[index].0.id)
                    .collect()
            })
            .collect();

        command_list
    }

    fn geometry_binding(&self, tile: &Tile) -> Option<(Arc<TileGeometry>, GeometryBinding)> {
        match tile.geometry_source {
            GeometrySource::Own => Some((tile.geometry.clone()?, GeometryBinding::Own)),
            GeometrySource::Ancestor { tile: ancestor, level } => {
                let ancestor = self.quadtree.get(ancestor)?;
                let (min, max) = ancestor.extent.relative(&tile.extent);

                Some((
                    ancestor.geometry.clone()?,
                    GeometryBinding::Ancestor {
                        coordinate: ancestor.coordinate,
                        level,
                        subregion: DVec4::new(min.x, min.y, max.x, max.y),
                    },
                ))
            }
            GeometrySource::Fallback => {
                Some((self.fallback_geometry.clone(), GeometryBinding::Fallback))
            }
            GeometrySource::None => None,
        }
    }

    fn uniform_map(
        &self,
        frame_state: &FrameState,
        tile: &Tile,
        textures: &[(LayerId, ReadyImagery)],
    ) -> UniformMap {
        let TileCoordinate { level, x, y } = tile.coordinate;

        let mut alpha = Vec::with_capacity(textures.len());
        let mut brightness = Vec::with_capacity(textures.len());
        let mut contrast = Vec::with_capacity(textures.len());
        let mut one_over_gamma = Vec::with_capacity(textures.len());
        let mut texture_coordinates_extent = Vec::with_capacity(textures.len());
        let mut translation_and_scale = Vec::with_capacity(textures.len());

        for (layer_id, ready) in textures {
            let Some(layer) = self.imagery_layers.layer(*layer_id) else {
                continue;
            };

            let evaluate = |adjustment: &LayerAdjustment| {
                adjustment.evaluate(frame_state, layer, x, y, level)
            };

            alpha.push(evaluate(&layer.alpha));
            brightness.push(evaluate(&layer.brightness));
            contrast.push(evaluate(&layer.contrast));
            one_over_gamma.push(1.0 / evaluate(&layer.gamma));
            texture_coordinates_extent.push(ready.texture_coordinates_extent.as_vec4());
            translation_and_scale.push(ready.translation_and_scale.as_vec4());
        }

        let mut uniform_map = UniformMap::default();
        uniform_map.insert(DAY_TEXTURE_COUNT, alpha.len() as i32);
        uniform_map.insert(DAY_TEXTURE_ALPHA, alpha);
        uniform_map.insert(DAY_TEXTURE_BRIGHTNESS, brightness);
        uniform_map.insert(DAY_TEXTURE_CONTRAST, contrast);
        uniform_map.insert(DAY_TEXTURE_ONE_OVER_GAMMA, one_over_gamma);
        uniform_map.insert(DAY_TEXTURE_TEX_COORDS_EXTENT, texture_coordinates_extent);
        uniform_map.insert(DAY_TEXTURE_TRANSLATION_AND_SCALE, translation_and_scale);
        uniform_map
    }
}

fn release_imagery(imagery_layers: &mut ImageryLayerCollection, entries: &[TileImagery]) {
    for tile_imagery in entries {
        if let Some(layer) = imagery_layers.layer_mut(tile_imagery.layer) {
            layer.cache.release(tile_imagery.imagery);
        }
    }
}
