use crate::{
    imagery::{Imagery, ImageryCache, ImageryProvider, ImageryState, LayerId},
    math::{Extent, TileCoordinate, MAXIMUM_LEVEL},
};
use bevy::math::{DVec2, DVec4};
use image::RgbaImage;
use std::sync::Arc;

/// A piece of imagery draped over a terrain tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileImagery {
    pub layer: LayerId,
    pub imagery: TileCoordinate,
    /// The extent of the imagery tile in the unit space of the terrain tile,
    /// as `(west, south, east, north)`.
    pub texture_coordinate_rectangle: DVec4,
}

/// The imagery that is actually drawn for a [`TileImagery`] this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadyImagery {
    pub imagery: TileCoordinate,
    pub image: Arc<RgbaImage>,
    /// Maps the texture coordinates of the terrain tile into the imagery texture.
    pub translation_and_scale: DVec4,
    /// The part of the terrain tile covered by this piece, as `(west, south, east, north)`.
    pub texture_coordinates_extent: DVec4,
}

impl TileImagery {
    pub fn new(layer: LayerId, imagery: &Imagery, tile_extent: &Extent) -> Self {
        Self {
            layer,
            imagery: imagery.coordinate,
            texture_coordinate_rectangle: texture_coordinate_rectangle(tile_extent, &imagery.extent),
        }
    }

    /// Resolves the imagery to draw, falling back to the nearest ready ancestor while
    /// the imagery itself is loading or failed.
    pub fn ready_imagery(&self, cache: &ImageryCache, tile_extent: &Extent) -> Option<ReadyImagery> {
        let own = cache.get(self.imagery)?;

        let imagery = if own.state == ImageryState::Ready {
            own
        } else {
            cache.nearest_ready_ancestor(self.imagery)?
        };

        let image = imagery.image.clone()?;
        let rectangle = texture_coordinate_rectangle(tile_extent, &imagery.extent);

        Some(ReadyImagery {
            imagery: imagery.coordinate,
            image,
            translation_and_scale: translation_and_scale(rectangle),
            texture_coordinates_extent: self
                .texture_coordinate_rectangle
                .clamp(DVec4::ZERO, DVec4::ONE),
        })
    }
}

/// The imagery level whose tiles best match the resolution of a terrain tile.
pub fn imagery_level(provider: &dyn ImageryProvider, tile_extent: &Extent) -> u32 {
    let level = provider
        .tiling_scheme()
        .level_for_tile_width(tile_extent.width());

    let minimum_level = provider.minimum_level().min(MAXIMUM_LEVEL);
    let maximum_level = provider.maximum_level().clamp(minimum_level, MAXIMUM_LEVEL);

    level.clamp(minimum_level, maximum_level)
}

/// The imagery tiles of a provider covering a terrain tile, row by row from the north west.
pub fn covering_imagery(provider: &dyn ImageryProvider, tile_extent: &Extent) -> Vec<TileCoordinate> {
    let Some(extent) = tile_extent.intersection(&provider.extent()) else {
        return Vec::new();
    };

    provider
        .tiling_scheme()
        .tiles_in_extent(&extent, imagery_level(provider, tile_extent))
}

pub(crate) fn texture_coordinate_rectangle(tile_extent: &Extent, imagery_extent: &Extent) -> DVec4 {
    let (min, max) = tile_extent.relative(imagery_extent);

    DVec4::new(min.x, min.y, max.x, max.y)
}

pub(crate) fn translation_and_scale(rectangle: DVec4) -> DVec4 {
    let scale = DVec2::ONE / DVec2::new(rectangle.z - rectangle.x, rectangle.w - rectangle.y);
    let translation = -DVec2::new(rectangle.x, rectangle.y) * scale;

    DVec4::new(translation.x, translation.y, scale.x, scale.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ProviderError,
        loader::ImageryRequest,
        math::TilingScheme,
    };

    struct TestProvider;

    impl ImageryProvider for TestProvider {
        fn tiling_scheme(&self) -> TilingScheme {
            TilingScheme::Geographic
        }

        fn minimum_level(&self) -> u32 {
            1
        }

        fn maximum_level(&self) -> u32 {
            3
        }

        fn request_image(&self, request: ImageryRequest) {
            request.complete(Err(ProviderError::NotFound));
        }
    }

    #[test]
    fn imagery_level_is_clamped_to_provider_levels() {
        let scheme = TilingScheme::Geographic;

        let root = scheme.tile_extent(TileCoordinate::new(0, 0, 0));
        let fine = scheme.tile_extent(TileCoordinate::new(6, 0, 0));
        let medium = scheme.tile_extent(TileCoordinate::new(2, 1, 1));

        assert_eq!(imagery_level(&TestProvider, &root), 1);
        assert_eq!(imagery_level(&TestProvider, &fine), 3);
        assert_eq!(imagery_level(&TestProvider, &medium), 2);

        let covering = covering_imagery(&TestProvider, &root);
        assert_eq!(
            covering,
            vec![
                TileCoordinate::new(1, 0, 0),
                TileCoordinate::new(1, 1, 0),
                TileCoordinate::new(1, 0, 1),
                TileCoordinate::new(1, 1, 1),
            ]
        );
    }

    struct UnboundedProvider;

    impl ImageryProvider for UnboundedProvider {
        fn tiling_scheme(&self) -> TilingScheme {
            TilingScheme::Geographic
        }

        fn request_image(&self, request: ImageryRequest) {
            request.complete(Err(ProviderError::NotFound));
        }
    }

    #[test]
    fn imagery_level_never_exceeds_the_deepest_level() {
        let tiny = Extent::new(0.0, 0.0, 1e-12, 1e-12);

        assert_eq!(imagery_level(&UnboundedProvider, &tiny), MAXIMUM_LEVEL);
        assert!(!covering_imagery(&UnboundedProvider, &tiny).is_empty());
    }

    #[test]
    fn ancestor_imagery_is_drawn_until_own_is_ready() {
        let scheme = TilingScheme::Geographic;
        let layer = LayerId(0);
        let tile = TileCoordinate::new(2, 1, 1);
        let tile_extent = scheme.tile_extent(tile);

        let mut cache = ImageryCache::default();
        let root = TileCoordinate::new(0, 0, 0);
        cache.acquire(root, scheme.tile_extent(root));
        cache.loaded(root, scheme.tile_extent(root), Ok(Arc::new(RgbaImage::new(2, 2))));

        let imagery = cache.acquire(tile, tile_extent).clone();
        let tile_imagery = TileImagery::new(layer, &imagery, &tile_extent);
        assert_eq!(tile_imagery.texture_coordinate_rectangle, DVec4::new(0.0, 0.0, 1.0, 1.0));

        let ready = tile_imagery.ready_imagery(&cache, &tile_extent).unwrap();
        assert_eq!(ready.imagery, root);
        // a quarter of the root's width and height, starting at its center latitude
        assert!((ready.translation_and_scale - DVec4::new(0.25, 0.5, 0.25, 0.25)).length() < 1e-9);
        assert_eq!(ready.texture_coordinates_extent, DVec4::new(0.0, 0.0, 1.0, 1.0));

        cache.loaded(tile, tile_extent, Ok(Arc::new(RgbaImage::new(2, 2))));
        let ready = tile_imagery.ready_imagery(&cache, &tile_extent).unwrap();
        assert_eq!(ready.imagery, tile);
        assert!((ready.translation_and_scale - DVec4::new(0.0, 0.0, 1.0, 1.0)).length() < 1e-9);
    }
}
