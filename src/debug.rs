//! Per frame statistics of the surface, useful to inspect the level of detail selection.

use bevy::prelude::*;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceDebug {
    /// Logs the statistics after every update.
    pub enable_debug_output: bool,
    pub tiles_visited: u32,
    pub tiles_culled: u32,
    pub tiles_rendered: u32,
    pub max_depth: u32,
    /// Refined tiles with a drawn child that still waits for its own geometry.
    pub tiles_waiting_for_children: u32,
    /// The number of draw commands emitted.
    pub texture_groups: u32,
}

impl SurfaceDebug {
    pub(crate) fn reset(&mut self) {
        *self = Self {
            enable_debug_output: self.enable_debug_output,
            ..default()
        };
    }

    pub(crate) fn log(&self, frame: u64) {
        if !self.enable_debug_output {
            return;
        }

        trace!(
            "Frame {frame}: visited {}, culled {}, rendered {} tiles in {} commands, max depth {}, {} waiting for children.",
            self.tiles_visited,
            self.tiles_culled,
            self.tiles_rendered,
            self.texture_groups,
            self.max_depth,
            self.tiles_waiting_for_children
        );
    }
}
