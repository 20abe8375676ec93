use crate::{
    frame_state::FrameState,
    imagery::{ImageryCache, ImageryProvider},
};
use bevy::prelude::default;
use std::{fmt, sync::Arc};

/// Identifies an imagery layer for its whole lifetime. Identifiers are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

pub type AdjustmentFn =
    dyn Fn(&FrameState, &ImageryLayer, u32, u32, u32) -> f64 + Send + Sync + 'static;

/// A color adjustment of an imagery layer, either constant or computed per tile
/// from the frame state, the layer and the tile's `x`, `y` and `level`.
#[derive(Clone)]
pub enum LayerAdjustment {
    Constant(f64),
    Function(Arc<AdjustmentFn>),
}

impl Default for LayerAdjustment {
    fn default() -> Self {
        Self::Constant(1.0)
    }
}

impl From<f64> for LayerAdjustment {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl fmt::Debug for LayerAdjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerAdjustment::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            LayerAdjustment::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl LayerAdjustment {
    pub fn from_fn(
        function: impl Fn(&FrameState, &ImageryLayer, u32, u32, u32) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self::Function(Arc::new(function))
    }

    pub fn evaluate(
        &self,
        frame_state: &FrameState,
        layer: &ImageryLayer,
        x: u32,
        y: u32,
        level: u32,
    ) -> f64 {
        match self {
            LayerAdjustment::Constant(value) => *value,
            LayerAdjustment::Function(function) => function(frame_state, layer, x, y, level),
        }
    }
}

/// A layer of imagery draped over the terrain.
pub struct ImageryLayer {
    id: LayerId,
    provider: Arc<dyn ImageryProvider>,
    show: bool,
    pub alpha: LayerAdjustment,
    pub brightness: LayerAdjustment,
    pub contrast: LayerAdjustment,
    pub gamma: LayerAdjustment,
    pub(crate) cache: ImageryCache,
}

impl ImageryLayer {
    pub(crate) fn new(id: LayerId, provider: Arc<dyn ImageryProvider>) -> Self {
        Self {
            id,
            provider,
            show: true,
            alpha: default(),
            brightness: default(),
            contrast: default(),
            gamma: default(),
            cache: ImageryCache::default(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn provider(&self) -> &Arc<dyn ImageryProvider> {
        &self.provider
    }

    pub fn show(&self) -> bool {
        self.show
    }

    pub(crate) fn set_show(&mut self, show: bool) {
        self.show = show;
    }

    pub fn cache(&self) -> &ImageryCache {
        &self.cache
    }
}

impl fmt::Debug for ImageryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageryLayer")
            .field("id", &self.id)
            .field("show", &self.show)
            .field("alpha", &self.alpha)
            .field("brightness", &self.brightness)
            .field("contrast", &self.contrast)
            .field("gamma", &self.gamma)
            .finish_non_exhaustive()
    }
}
