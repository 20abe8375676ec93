use crate::{
    frame_state::FrameState,
    render::{CommandList, RenderContext},
    surface::CentralBodySurface,
};
use bevy::prelude::*;

/// The draw commands of the surface, recreated every frame.
#[derive(Resource, Default, Debug)]
pub struct SurfaceCommandLists(pub Vec<CommandList>);

/// Updates the [`CentralBodySurface`] resource once per frame.
///
/// The surface, the [`FrameState`] and the [`RenderContext`] have to be inserted by the
/// application; the surface is not updated while any of them is missing.
pub struct CentralBodySurfacePlugin;

impl Plugin for CentralBodySurfacePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SurfaceCommandLists>().add_systems(
            Last,
            update_central_body_surface.run_if(
                resource_exists::<CentralBodySurface>
                    .and(resource_exists::<FrameState>)
                    .and(resource_exists::<RenderContext>),
            ),
        );
    }
}

pub fn update_central_body_surface(
    mut surface: ResMut<CentralBodySurface>,
    frame_state: Res<FrameState>,
    context: Res<RenderContext>,
    mut command_lists: ResMut<SurfaceCommandLists>,
) {
    command_lists.0.clear();
    surface.update(&context, &frame_state, &mut command_lists.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        imagery::{ImageryLayerCollection, SingleTileImageryProvider},
        math::{Extent, SceneMode},
        surface::SurfaceDescriptor,
        terrain::EllipsoidTerrainProvider,
    };
    use image::RgbaImage;
    use std::sync::Arc;

    #[test]
    fn surface_is_updated_in_last() {
        let mut imagery_layers = ImageryLayerCollection::new();
        imagery_layers
            .add_imagery_provider(Arc::new(SingleTileImageryProvider::new(RgbaImage::new(2, 1))));

        let surface = CentralBodySurface::new(
            SurfaceDescriptor::default()
                .with_terrain_provider(EllipsoidTerrainProvider::default())
                .with_imagery_layers(imagery_layers),
        )
        .unwrap();

        let mut frame_state = FrameState::default();
        frame_state.view_extent(
            &Extent::new(0.0001, 0.0001, 0.0025, 0.0025),
            SceneMode::ColumbusView,
        );

        let mut app = App::new();
        app.add_plugins(CentralBodySurfacePlugin)
            .insert_resource(frame_state)
            .init_resource::<RenderContext>();

        app.update();
        assert!(app.world().resource::<SurfaceCommandLists>().0.is_empty());

        app.insert_resource(surface);

        for _ in 0..2000 {
            app.update();

            if app.world().resource::<CentralBodySurface>().is_settled() {
                break;
            }
        }

        let surface = app.world().resource::<CentralBodySurface>();
        assert!(surface.is_settled());
        assert!(surface.frame_number() > 1);
        assert!(!app.world().resource::<SurfaceCommandLists>().0.is_empty());
    }
}
