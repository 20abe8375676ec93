//! The interface to the rendering backend.
//!
//! The surface describes what to draw with [`DrawCommand`]s, which are collected into the
//! [`CommandList`]s handed to [`CentralBodySurface::update`](crate::surface::CentralBodySurface::update).

mod uniforms;

pub use uniforms::*;

use crate::{
    imagery::LayerId,
    math::{BoundingSphere, TileCoordinate},
    terrain::TileGeometry,
};
use bevy::{math::DVec4, prelude::*};
use image::RgbaImage;
use std::sync::Arc;

/// Capabilities of the rendering backend.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct RenderContext {
    /// The number of textures a fragment shader can sample from.
    pub maximum_texture_image_units: usize,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            maximum_texture_image_units: 16,
        }
    }
}

/// The geometry a draw command uses.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryBinding {
    Own,
    /// The geometry of an ancestor, of which only `subregion` (west, south, east, north)
    /// in the ancestor's unit space is covered by the tile.
    Ancestor {
        coordinate: TileCoordinate,
        level: u32,
        subregion: DVec4,
    },
    /// A flat heightmap standing in for geometry that failed to load.
    Fallback,
}

/// An imagery texture bound by a draw command.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureBinding {
    pub layer: LayerId,
    pub imagery: TileCoordinate,
    pub image: Arc<RgbaImage>,
}

/// Draws one tile with a group of its imagery.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub tile: TileCoordinate,
    pub geometry: Arc<TileGeometry>,
    pub geometry_binding: GeometryBinding,
    pub bounding_sphere: BoundingSphere,
    pub textures: Vec<TextureBinding>,
    /// The index of this command among the commands of the tile.
    pub pass: usize,
    /// Whether the command is blended over the previous passes of the tile.
    pub blend: bool,
    pub uniform_map: UniformMap,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    pub color_list: Vec<DrawCommand>,
}

impl CommandList {
    pub fn is_empty(&self) -> bool {
        self.color_list.is_empty()
    }
}
