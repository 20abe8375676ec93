use thiserror::Error;

/// Errors returned when constructing a [`CentralBodySurface`](crate::surface::CentralBodySurface).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("a terrain provider is required")]
    MissingTerrainProvider,
    #[error("an imagery layer collection is required")]
    MissingImageryLayerCollection,
    #[error("invalid surface configuration: {0}")]
    InvalidConfig(String),
}

/// The reason a provider could not deliver a tile.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Failed(String),
    #[error("tile not available")]
    NotFound,
    #[error("request was dropped without a response")]
    Abandoned,
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;
pub type ProviderResult<T> = Result<T, ProviderError>;
