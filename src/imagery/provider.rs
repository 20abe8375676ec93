use crate::{
    loader::ImageryRequest,
    math::{Extent, TilingScheme},
};
use image::{imageops, RgbaImage};
use std::sync::Arc;

/// Produces the image tiles of an imagery layer.
pub trait ImageryProvider: Send + Sync + 'static {
    fn tiling_scheme(&self) -> TilingScheme;

    /// The region covered by the provider's imagery.
    fn extent(&self) -> Extent {
        self.tiling_scheme().extent()
    }

    fn minimum_level(&self) -> u32 {
        0
    }

    fn maximum_level(&self) -> u32 {
        u32::MAX
    }

    fn request_image(&self, request: ImageryRequest);
}

/// Drapes a single image over the whole globe.
pub struct SingleTileImageryProvider {
    image: Arc<RgbaImage>,
}

impl SingleTileImageryProvider {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }
}

impl ImageryProvider for SingleTileImageryProvider {
    fn tiling_scheme(&self) -> TilingScheme {
        TilingScheme::Geographic
    }

    fn maximum_level(&self) -> u32 {
        0
    }

    /// Answers with the west or east half of the image.
    fn request_image(&self, request: ImageryRequest) {
        let x = request.coordinate().x;
        let half_width = self.image.width() / 2;

        let half = imageops::crop_imm(
            self.image.as_ref(),
            x * half_width,
            0,
            half_width.max(1),
            self.image.height(),
        )
        .to_image();

        request.complete(Ok(Arc::new(half)));
    }
}
