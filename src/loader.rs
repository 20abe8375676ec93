//! The tile load queue.
//!
//! Work is collected during traversal with a priority, deduplicated per resource and
//! dispatched to the providers in priority order under a per frame budget.
//! Providers answer through a request object that may be completed from any thread;
//! the responses are applied at the start of the next update.

use crate::{
    error::{ProviderError, ProviderResult},
    imagery::LayerId,
    math::TileCoordinate,
    terrain::TileGeometry,
};
use async_channel::{Receiver, Sender};
use bevy::{
    prelude::*,
    utils::{HashMap, HashSet},
};
use image::RgbaImage;
use std::{cmp::Ordering, collections::BinaryHeap, fmt, marker::PhantomData, sync::Arc};

/// Identifies a single resource of a tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LoadKey {
    Geometry(TileCoordinate),
    Imagery {
        layer: LayerId,
        coordinate: TileCoordinate,
    },
}

impl fmt::Display for LoadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadKey::Geometry(coordinate) => write!(f, "geometry {coordinate}"),
            LoadKey::Imagery { layer, coordinate } => {
                write!(f, "imagery {coordinate} of layer {}", layer.0)
            }
        }
    }
}

#[doc(hidden)]
pub enum LoadPayload {
    Geometry(ProviderResult<TileGeometry>),
    Imagery(ProviderResult<Arc<RgbaImage>>),
}

pub(crate) struct LoadResponse {
    pub(crate) key: LoadKey,
    ticket: u64,
    pub(crate) payload: LoadPayload,
}

/// A resource that can be delivered through a [`LoadRequest`].
pub trait RequestPayload: Sized {
    #[doc(hidden)]
    fn into_payload(result: ProviderResult<Self>) -> LoadPayload;
}

impl RequestPayload for TileGeometry {
    fn into_payload(result: ProviderResult<Self>) -> LoadPayload {
        LoadPayload::Geometry(result)
    }
}

impl RequestPayload for Arc<RgbaImage> {
    fn into_payload(result: ProviderResult<Self>) -> LoadPayload {
        LoadPayload::Imagery(result)
    }
}

/// A pending fetch handed to a provider.
///
/// The provider answers by calling [`LoadRequest::complete`], possibly later and from
/// another thread. Dropping the request without completing it reports
/// [`ProviderError::Abandoned`].
pub struct LoadRequest<T: RequestPayload> {
    key: LoadKey,
    ticket: u64,
    sender: Option<Sender<LoadResponse>>,
    _payload: PhantomData<fn(T)>,
}

pub type GeometryRequest = LoadRequest<TileGeometry>;
pub type ImageryRequest = LoadRequest<Arc<RgbaImage>>;

impl<T: RequestPayload> LoadRequest<T> {
    pub fn coordinate(&self) -> TileCoordinate {
        match self.key {
            LoadKey::Geometry(coordinate) | LoadKey::Imagery { coordinate, .. } => coordinate,
        }
    }

    pub fn key(&self) -> LoadKey {
        self.key
    }

    pub fn complete(mut self, result: ProviderResult<T>) {
        self.respond(T::into_payload(result));
    }

    fn respond(&mut self, payload: LoadPayload) {
        if let Some(sender) = self.sender.take() {
            // the surface may have been dropped in the meantime
            let _ = sender.try_send(LoadResponse {
                key: self.key,
                ticket: self.ticket,
                payload,
            });
        }
    }
}

impl<T: RequestPayload> Drop for LoadRequest<T> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.respond(T::into_payload(Err(ProviderError::Abandoned)));
        }
    }
}

impl<T: RequestPayload> fmt::Debug for LoadRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("key", &self.key)
            .field("ticket", &self.ticket)
            .finish()
    }
}

#[derive(Debug)]
struct PendingLoad {
    priority: f64,
    sequence: u64,
    key: LoadKey,
}

impl PartialEq for PendingLoad {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingLoad {}

impl PartialOrd for PendingLoad {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingLoad {
    // highest priority first, then first come first served
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Priority ordered set of unmet tile dependencies and the requests in flight.
pub struct LoadQueue {
    pending: BinaryHeap<PendingLoad>,
    queued: HashSet<LoadKey>,
    in_flight: HashMap<LoadKey, u64>,
    next_sequence: u64,
    sender: Sender<LoadResponse>,
    receiver: Receiver<LoadResponse>,
}

impl Default for LoadQueue {
    fn default() -> Self {
        let (sender, receiver) = async_channel::unbounded();

        Self {
            pending: default(),
            queued: default(),
            in_flight: default(),
            next_sequence: 0,
            sender,
            receiver,
        }
    }
}

impl LoadQueue {
    /// Queues a resource, unless it is already queued or in flight.
    /// Larger priorities are dispatched first.
    pub fn enqueue(&mut self, key: LoadKey, priority: f64) -> bool {
        if self.in_flight.contains_key(&key) || !self.queued.insert(key) {
            return false;
        }

        self.pending.push(PendingLoad {
            priority,
            sequence: self.next_sequence,
            key,
        });
        self.next_sequence += 1;

        true
    }

    /// Pops up to `budget` of the highest priority entries, as long as fewer than
    /// `max_in_flight` requests are outstanding, and marks them in flight.
    pub(crate) fn drain(&mut self, budget: usize, max_in_flight: usize) -> Vec<(LoadKey, u64)> {
        let mut dispatched = Vec::new();

        while dispatched.len() < budget && self.in_flight.len() < max_in_flight {
            let Some(PendingLoad { key, .. }) = self.pending.pop() else {
                break;
            };

            self.queued.remove(&key);

            let ticket = self.next_sequence;
            self.next_sequence += 1;
            self.in_flight.insert(key, ticket);

            dispatched.push((key, ticket));
        }

        dispatched
    }

    /// Forgets the queued entries; traversal queues what is still needed every frame.
    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }

    pub(crate) fn request<T: RequestPayload>(&self, key: LoadKey, ticket: u64) -> LoadRequest<T> {
        LoadRequest {
            key,
            ticket,
            sender: Some(self.sender.clone()),
            _payload: PhantomData,
        }
    }

    /// Collects the responses that arrived since the last call.
    /// Responses to requests that were forgotten in the meantime are discarded.
    pub(crate) fn receive(&mut self) -> Vec<LoadResponse> {
        let mut responses = Vec::new();

        while let Ok(response) = self.receiver.try_recv() {
            if self.in_flight.get(&response.key) == Some(&response.ticket) {
                self.in_flight.remove(&response.key);
                responses.push(response);
            } else {
                trace!("Discarding stale response for {}.", response.key);
            }
        }

        responses
    }

    /// Marks a dispatched request as finished without a response.
    pub(crate) fn finish(&mut self, key: &LoadKey) {
        self.in_flight.remove(key);
    }

    /// Drops all queued and in flight imagery of a layer.
    pub(crate) fn forget_layer(&mut self, id: LayerId) {
        let is_layer =
            |key: &LoadKey| matches!(key, LoadKey::Imagery { layer, .. } if *layer == id);

        self.in_flight.retain(|key, _| !is_layer(key));
        self.queued.retain(|key| !is_layer(key));
        self.pending.retain(|pending| !is_layer(&pending.key));
    }

    /// Drops all queued and in flight geometry.
    pub(crate) fn forget_geometry(&mut self) {
        let is_geometry = |key: &LoadKey| matches!(key, LoadKey::Geometry(_));

        self.in_flight.retain(|key, _| !is_geometry(key));
        self.queued.retain(|key| !is_geometry(key));
        self.pending.retain(|pending| !is_geometry(&pending.key));
    }

    pub fn is_queued(&self, key: &LoadKey) -> bool {
        self.queued.contains(key)
    }

    pub fn is_in_flight(&self, key: &LoadKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether no tile has outstanding geometry or imagery work.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}
