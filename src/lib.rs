//! This crate renders the surface of a central body, like the earth, as a quadtree of
//! terrain tiles with layers of imagery draped over them.
//!
//! # Background
//! The surface has to answer two questions every frame:
//!
//! ## Which tiles should be drawn?
//! The globe is subdivided into a quadtree of tiles according to a
//! [`TilingScheme`](math::TilingScheme). Starting at the root tiles, every tile that is
//! visible and whose screen space error is too large is replaced by its four children.
//! Tiles whose geometry is still loading are drawn with the geometry of their closest
//! loaded ancestor, so that the surface never has holes.
//! See the [`surface`] and [`quadtree`] modules for more information.
//!
//! ## Which imagery should be draped over a tile?
//! Every [`ImageryLayer`](imagery::ImageryLayer) of the
//! [`ImageryLayerCollection`](imagery::ImageryLayerCollection) contributes the imagery
//! tiles that best match the resolution of the terrain tile. Imagery is reference counted
//! and shared between all tiles it covers. The layers are blended in collection order,
//! split into several draw commands if the backend can not sample all of them at once.
//! See the [`imagery`] and [`render`] modules for more information.
//!
//! Geometry and imagery are fetched through the [`TerrainProvider`](terrain::TerrainProvider)
//! and [`ImageryProvider`](imagery::ImageryProvider) traits, which answer asynchronously
//! through the request objects of the [`loader`] module.

pub mod config;
pub mod debug;
pub mod error;
pub mod frame_state;
pub mod imagery;
pub mod loader;
pub mod math;
pub mod path_visualizer;
pub mod plugin;
pub mod quadtree;
pub mod render;
pub mod surface;
pub mod terrain;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        config::SurfaceConfig,
        error::{ProviderError, SurfaceError},
        frame_state::{Camera, FrameState, Frustum},
        imagery::{
            ImageryLayer, ImageryLayerCollection, ImageryProvider, LayerAdjustment, LayerId,
            SingleTileImageryProvider,
        },
        loader::{GeometryRequest, ImageryRequest},
        math::{Ellipsoid, Extent, MapProjection, SceneMode, TileCoordinate, TilingScheme},
        path_visualizer::PathVisualizer,
        plugin::{CentralBodySurfacePlugin, SurfaceCommandLists},
        render::{CommandList, DrawCommand, RenderContext},
        surface::{CentralBodySurface, SurfaceDescriptor},
        terrain::{EllipsoidTerrainProvider, TerrainProvider, TileGeometry},
    };
}
