use crate::imagery::{ImageryLayer, ImageryProvider, LayerId};
use std::sync::Arc;

/// An ordered collection of imagery layers. The layer at index 0 is drawn first,
/// every further layer is drawn on top of the previous ones.
#[derive(Default)]
pub struct ImageryLayerCollection {
    layers: Vec<ImageryLayer>,
    next_id: u64,
}

impl ImageryLayerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a layer for the provider on top of all other layers.
    pub fn add_imagery_provider(&mut self, provider: Arc<dyn ImageryProvider>) -> LayerId {
        self.add(provider, None)
    }

    /// Creates a layer for the provider at the given index, or on top if `None`.
    pub fn add(&mut self, provider: Arc<dyn ImageryProvider>, index: Option<usize>) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;

        let index = index.map_or(self.layers.len(), |index| index.min(self.layers.len()));
        self.layers.insert(index, ImageryLayer::new(id, provider));

        id
    }

    pub fn remove(&mut self, id: LayerId) -> Option<ImageryLayer> {
        let index = self.index_of(id)?;

        Some(self.layers.remove(index))
    }

    pub fn remove_all(&mut self) -> Vec<ImageryLayer> {
        self.layers.drain(..).collect()
    }

    /// Moves the layer one position up. Returns whether the order changed.
    pub fn raise(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index + 1 < self.layers.len() => {
                self.layers.swap(index, index + 1);
                true
            }
            _ => false,
        }
    }

    /// Moves the layer one position down. Returns whether the order changed.
    pub fn lower(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                self.layers.swap(index, index - 1);
                true
            }
            _ => false,
        }
    }

    pub fn raise_to_top(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index + 1 < self.layers.len() => {
                let layer = self.layers.remove(index);
                self.layers.push(layer);
                true
            }
            _ => false,
        }
    }

    pub fn lower_to_bottom(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => {
                let layer = self.layers.remove(index);
                self.layers.insert(0, layer);
                true
            }
            _ => false,
        }
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }

    pub fn get(&self, index: usize) -> Option<&ImageryLayer> {
        self.layers.get(index)
    }

    pub fn layer(&self, id: LayerId) -> Option<&ImageryLayer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut ImageryLayer> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageryLayer> {
        self.layers.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ImageryLayer> {
        self.layers.iter_mut()
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(ImageryLayer::id).collect()
    }
}
