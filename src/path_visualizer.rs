//! Draws the paths of moving objects as polylines.
//!
//! Every object with a position property and path graphics gets one polyline, sampled over
//! a window around the current time. Positions given in the inertial frame are collected
//! in a separate polyline collection, whose model matrix rotates them into the fixed frame.

use bevy::{
    color::Color,
    math::{DMat3, DMat4, DVec3},
    prelude::*,
    utils::HashMap,
};
use slab::Slab;
use std::{f64::consts::TAU, sync::Arc};

/// Seconds in a day.
const SECONDS_PER_DAY: f64 = 86400.0;

/// The frame in which the positions of an object are expressed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReferenceFrame {
    /// Fixed to the rotating central body.
    #[default]
    Fixed,
    /// Not rotating with the central body.
    Inertial,
}

/// Identifies a dynamic object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// A closed time interval in seconds since the J2000 epoch.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeInterval {
    pub start: f64,
    pub stop: f64,
}

impl TimeInterval {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }
}

/// A value that may change over time.
#[derive(Clone)]
pub enum Property<T> {
    Constant(T),
    Function(Arc<dyn Fn(f64) -> T + Send + Sync>),
}

impl<T: Clone> Property<T> {
    pub fn from_fn(function: impl Fn(f64) -> T + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(function))
    }

    pub fn value(&self, time: f64) -> T {
        match self {
            Property::Constant(value) => value.clone(),
            Property::Function(function) => function(time),
        }
    }
}

impl<T> From<T> for Property<T> {
    fn from(value: T) -> Self {
        Self::Constant(value)
    }
}

/// The position of an object over time.
pub trait PositionProperty: Send + Sync {
    fn reference_frame(&self) -> ReferenceFrame {
        ReferenceFrame::Fixed
    }

    /// The positions between `start` and `stop`, in chronological order.
    fn positions_in_range(&self, start: f64, stop: f64, time: f64) -> Vec<DVec3>;
}

/// Positions known at discrete times.
#[derive(Clone, Debug, Default)]
pub struct SampledPositionProperty {
    pub reference_frame: ReferenceFrame,
    samples: Vec<(f64, DVec3)>,
}

impl SampledPositionProperty {
    pub fn new(reference_frame: ReferenceFrame) -> Self {
        Self {
            reference_frame,
            samples: Vec::new(),
        }
    }

    /// Adds a sample, keeping the samples sorted by time.
    pub fn add_sample(&mut self, time: f64, position: DVec3) {
        let index = self.samples.partition_point(|&(sample, _)| sample <= time);
        self.samples.insert(index, (time, position));
    }
}

impl PositionProperty for SampledPositionProperty {
    fn reference_frame(&self) -> ReferenceFrame {
        self.reference_frame
    }

    fn positions_in_range(&self, start: f64, stop: f64, _time: f64) -> Vec<DVec3> {
        self.samples
            .iter()
            .filter(|&&(time, _)| time >= start && time <= stop)
            .map(|&(_, position)| position)
            .collect()
    }
}

/// How the path of an object is drawn. Unset properties keep their defaults.
#[derive(Clone, Default)]
pub struct PathGraphics {
    pub show: Option<Property<bool>>,
    /// Seconds ahead of the current time to draw.
    pub lead_time: Option<Property<f64>>,
    /// Seconds behind the current time to draw.
    pub trail_time: Option<Property<f64>>,
    pub color: Option<Property<Color>>,
    pub outline_color: Option<Property<Color>>,
    pub width: Option<Property<f64>>,
    pub outline_width: Option<Property<f64>>,
}

/// An object of the scene, of which only the properties describing its path are used.
#[derive(Clone)]
pub struct DynamicObject {
    pub id: EntityId,
    pub position: Option<Arc<dyn PositionProperty>>,
    pub path: Option<PathGraphics>,
    /// The times the object exists. Unbounded if `None`.
    pub availability: Option<TimeInterval>,
}

impl DynamicObject {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            position: None,
            path: None,
            availability: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub positions: Vec<DVec3>,
    pub color: Color,
    pub outline_color: Color,
    pub width: f64,
    pub outline_width: f64,
    pub show: bool,
}

impl Default for Polyline {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            color: Color::WHITE,
            outline_color: Color::BLACK,
            width: 1.0,
            outline_width: 1.0,
            show: true,
        }
    }
}

#[derive(Debug)]
pub struct PolylineCollection {
    polylines: Slab<Polyline>,
    pub model_matrix: DMat4,
}

impl Default for PolylineCollection {
    fn default() -> Self {
        Self {
            polylines: Slab::new(),
            model_matrix: DMat4::IDENTITY,
        }
    }
}

impl PolylineCollection {
    pub fn len(&self) -> usize {
        self.polylines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Polyline> {
        self.polylines.iter().map(|(_, polyline)| polyline)
    }
}

/// Refers to a polyline in one of the collections of a [`PathVisualizer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PolylineHandle {
    pub reference_frame: ReferenceFrame,
    key: usize,
}

/// The rotation from the inertial into the fixed frame, based on the earth rotation angle.
pub fn inertial_to_fixed(seconds_since_j2000: f64) -> DMat3 {
    let days = seconds_since_j2000 / SECONDS_PER_DAY;
    let rotation_angle = TAU * (0.7790572732640 + 1.00273781191135448 * days);

    DMat3::from_rotation_z(-rotation_angle.rem_euclid(TAU))
}

/// Maps the paths of dynamic objects to polylines.
#[derive(Default)]
pub struct PathVisualizer {
    fixed: PolylineCollection,
    inertial: PolylineCollection,
    polylines: HashMap<EntityId, PolylineHandle>,
}

impl PathVisualizer {
    pub fn new() -> Self {
        default()
    }

    pub fn collection(&self, reference_frame: ReferenceFrame) -> &PolylineCollection {
        match reference_frame {
            ReferenceFrame::Fixed => &self.fixed,
            ReferenceFrame::Inertial => &self.inertial,
        }
    }

    fn collection_mut(&mut self, reference_frame: ReferenceFrame) -> &mut PolylineCollection {
        match reference_frame {
            ReferenceFrame::Fixed => &mut self.fixed,
            ReferenceFrame::Inertial => &mut self.inertial,
        }
    }

    /// The polyline drawing the path of an object.
    pub fn polyline(&self, id: EntityId) -> Option<&Polyline> {
        let handle = self.polylines.get(&id)?;
        self.collection(handle.reference_frame)
            .polylines
            .get(handle.key)
    }

    /// Updates the polylines of all objects to the given time,
    /// in seconds since the J2000 epoch.
    pub fn update(&mut self, time: f64, objects: &[DynamicObject]) {
        self.inertial.model_matrix = DMat4::from_mat3(inertial_to_fixed(time));

        for object in objects {
            self.update_object(time, object);
        }
    }

    fn update_object(&mut self, time: f64, object: &DynamicObject) {
        let (Some(path), Some(position)) = (&object.path, &object.position) else {
            return;
        };

        let id = object.id;

        let reference_frame = position.reference_frame();
        let show = path.show.as_ref().map_or(true, |show| show.value(time));

        if !show {
            self.remove(id);
            return;
        }

        // the object may have moved to the other reference frame
        if self
            .polylines
            .get(&id)
            .is_some_and(|handle| handle.reference_frame != reference_frame)
        {
            self.remove(id);
        }

        let handle = match self.polylines.get(&id) {
            Some(&handle) => handle,
            None => {
                let key = self
                    .collection_mut(reference_frame)
                    .polylines
                    .insert(Polyline::default());
                let handle = PolylineHandle {
                    reference_frame,
                    key,
                };

                trace!("Created the path polyline of entity {}.", id.0);
                self.polylines.insert(id, handle);
                handle
            }
        };

        let lead_time = path.lead_time.as_ref().map(|lead| lead.value(time));
        let trail_time = path.trail_time.as_ref().map(|trail| trail.value(time));
        let positions = sample_window(time, object.availability, lead_time, trail_time)
            .map(|interval| position.positions_in_range(interval.start, interval.stop, time))
            .unwrap_or_default();

        let Some(polyline) = self
            .collection_mut(handle.reference_frame)
            .polylines
            .get_mut(handle.key)
        else {
            return;
        };

        polyline.show = true;
        polyline.positions = positions;

        if let Some(color) = &path.color {
            polyline.color = color.value(time);
        }
        if let Some(outline_color) = &path.outline_color {
            polyline.outline_color = outline_color.value(time);
        }
        if let Some(width) = &path.width {
            polyline.width = width.value(time);
        }
        if let Some(outline_width) = &path.outline_width {
            polyline.outline_width = outline_width.value(time);
        }
    }

    fn remove(&mut self, id: EntityId) {
        if let Some(handle) = self.polylines.remove(&id) {
            self.collection_mut(handle.reference_frame)
                .polylines
                .try_remove(handle.key);
        }
    }

    /// Removes the polylines of objects that were removed from the scene.
    pub fn objects_removed(&mut self, ids: &[EntityId]) {
        for &id in ids {
            self.remove(id);
        }
    }

    pub fn remove_all_primitives(&mut self) {
        self.fixed.polylines.clear();
        self.inertial.polylines.clear();
        self.polylines.clear();
    }
}

/// The interval to sample, the lead and trail window around `time` clipped to the
/// availability. Without availability, both lead and trail time are required.
fn sample_window(
    time: f64,
    availability: Option<TimeInterval>,
    lead_time: Option<f64>,
    trail_time: Option<f64>,
) -> Option<TimeInterval> {
    let start = match (trail_time, availability) {
        (Some(trail_time), Some(availability)) => (time - trail_time).max(availability.start),
        (Some(trail_time), None) => time - trail_time,
        (None, Some(availability)) => availability.start,
        (None, None) => return None,
    };

    let stop = match (lead_time, availability) {
        (Some(lead_time), Some(availability)) => (time + lead_time).min(availability.stop),
        (Some(lead_time), None) => time + lead_time,
        (None, Some(availability)) => availability.stop,
        (None, None) => return None,
    };

    Some(TimeInterval::new(start, stop))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(reference_frame: ReferenceFrame) -> Arc<dyn PositionProperty> {
        let mut property = SampledPositionProperty::new(reference_frame);

        for second in (0..=10).rev() {
            property.add_sample(second as f64, DVec3::new(second as f64, 0.0, 0.0));
        }

        Arc::new(property)
    }

    fn object(id: u64, path: PathGraphics) -> DynamicObject {
        DynamicObject {
            position: Some(track(ReferenceFrame::Fixed)),
            path: Some(path),
            ..DynamicObject::new(EntityId(id))
        }
    }

    fn xs(polyline: &Polyline) -> Vec<f64> {
        polyline.positions.iter().map(|position| position.x).collect()
    }

    #[test]
    fn samples_the_lead_and_trail_window() {
        let mut visualizer = PathVisualizer::new();
        let mut object = object(
            1,
            PathGraphics {
                lead_time: Some(2.0.into()),
                trail_time: Some(1.0.into()),
                ..default()
            },
        );

        visualizer.update(5.0, &[object.clone()]);
        let polyline = visualizer.polyline(EntityId(1)).unwrap();
        assert_eq!(xs(polyline), vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(polyline.color, Color::WHITE);
        assert_eq!(polyline.outline_color, Color::BLACK);
        assert_eq!((polyline.width, polyline.outline_width), (1.0, 1.0));

        object.availability = Some(TimeInterval::new(4.5, 6.5));
        visualizer.update(5.0, &[object]);
        assert_eq!(xs(visualizer.polyline(EntityId(1)).unwrap()), vec![5.0, 6.0]);
        assert_eq!(visualizer.collection(ReferenceFrame::Fixed).len(), 1);
    }

    #[test]
    fn window_requires_availability_or_both_times() {
        assert_eq!(sample_window(5.0, None, Some(1.0), None), None);
        assert_eq!(
            sample_window(5.0, Some(TimeInterval::new(0.0, 8.0)), Some(1.0), None),
            Some(TimeInterval::new(0.0, 6.0))
        );

        let mut visualizer = PathVisualizer::new();
        let object = object(
            2,
            PathGraphics {
                lead_time: Some(1.0.into()),
                ..default()
            },
        );

        visualizer.update(5.0, &[object]);
        assert!(visualizer.polyline(EntityId(2)).unwrap().positions.is_empty());
    }

    #[test]
    fn hidden_paths_are_removed() {
        let mut visualizer = PathVisualizer::new();
        let visible = object(
            3,
            PathGraphics {
                show: Some(Property::from_fn(|time| time < 5.0)),
                lead_time: Some(1.0.into()),
                trail_time: Some(1.0.into()),
                width: Some(3.0.into()),
                ..default()
            },
        );

        visualizer.update(1.0, &[visible.clone()]);
        assert_eq!(visualizer.polyline(EntityId(3)).unwrap().width, 3.0);

        visualizer.update(6.0, &[visible]);
        assert!(visualizer.polyline(EntityId(3)).is_none());
        assert!(visualizer.collection(ReferenceFrame::Fixed).is_empty());
    }

    #[test]
    fn inertial_paths_are_rotated_into_the_fixed_frame() {
        let mut visualizer = PathVisualizer::new();
        let path = PathGraphics {
            lead_time: Some(1.0.into()),
            trail_time: Some(1.0.into()),
            ..default()
        };
        let inertial = DynamicObject {
            position: Some(track(ReferenceFrame::Inertial)),
            ..object(4, path.clone())
        };

        visualizer.update(0.0, &[inertial, object(5, path)]);

        assert_eq!(visualizer.collection(ReferenceFrame::Inertial).len(), 1);
        assert_eq!(visualizer.collection(ReferenceFrame::Fixed).len(), 1);

        let expected = DMat3::from_rotation_z(-TAU * 0.7790572732640);
        let actual = DMat3::from_mat4(visualizer.collection(ReferenceFrame::Inertial).model_matrix);
        assert!(actual.abs_diff_eq(expected, 1e-9));

        // a sidereal day later the earth has turned once more
        let sidereal_day = SECONDS_PER_DAY / 1.00273781191135448;
        assert!(inertial_to_fixed(sidereal_day).abs_diff_eq(expected, 1e-6));

        visualizer.objects_removed(&[EntityId(4)]);
        assert!(visualizer.polyline(EntityId(4)).is_none());
        assert!(visualizer.collection(ReferenceFrame::Inertial).is_empty());

        visualizer.remove_all_primitives();
        assert!(visualizer.polyline(EntityId(5)).is_none());
        assert!(visualizer.collection(ReferenceFrame::Fixed).is_empty());
    }
}
