//! Imagery layers draped over the terrain.
//!
//! An [`ImageryLayerCollection`] holds the layers in drawing order. Each layer owns an
//! [`ImageryCache`] of the imagery tiles requested from its [`ImageryProvider`].
//! Terrain tiles reference the imagery covering them through [`TileImagery`] entries.

mod cache;
mod layer;
mod layer_collection;
mod provider;
mod tile_imagery;

pub use cache::{Imagery, ImageryCache, ImageryState};
pub use layer::{AdjustmentFn, ImageryLayer, LayerAdjustment, LayerId};
pub use layer_collection::ImageryLayerCollection;
pub use provider::{ImageryProvider, SingleTileImageryProvider};
pub use tile_imagery::{covering_imagery, imagery_level, ReadyImagery, TileImagery};
