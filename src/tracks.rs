//! Per-frame, per-object track store shared by every pipeline stage.

use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::tracker::BBox;

/// Stable identity of a tracked object.
pub type TrackId = u32;

/// The ball is tracked as a single synthetic identity.
pub const BALL_TRACK_ID: TrackId = 1;

/// Object classes kept in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectClass {
    Player,
    Referee,
    Ball,
}

impl ObjectClass {
    pub const ALL: [ObjectClass; 3] =
        [ObjectClass::Player, ObjectClass::Referee, ObjectClass::Ball];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectClass::Player => "player",
            ObjectClass::Referee => "referee",
            ObjectClass::Ball => "ball",
        }
    }
}

/// 2D point, used for pixel positions, camera displacements and pitch coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn distance_to(&self, other: Point) -> f64 {
        (*self - other).norm()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// One of the two teams on the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    /// Cluster index backing this team.
    pub fn index(self) -> usize {
        match self {
            Team::A => 0,
            Team::B => 1,
        }
    }

    pub fn from_index(index: usize) -> Self {
        if index == 0 { Team::A } else { Team::B }
    }
}

/// RGB colour with floating point channels in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color(pub [f32; 3]);

impl Color {
    pub fn distance(&self, other: &Color) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Attributes shared by every tracked object in a frame.
///
/// Everything but `bbox` is filled in by later stages; `None` means the stage
/// has not produced a value for this observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub bbox: BBox,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub adjusted_position: Option<Point>,
    /// Pitch coordinates in metres; absent when off the calibrated area.
    #[serde(default)]
    pub transformed_position: Option<Point>,
    /// km/h
    #[serde(default)]
    pub speed: Option<f64>,
    /// Cumulative metres.
    #[serde(default)]
    pub distance: Option<f64>,
}

impl Observation {
    pub fn new(bbox: BBox) -> Self {
        Self {
            bbox,
            position: None,
            adjusted_position: None,
            transformed_position: None,
            speed: None,
            distance: None,
        }
    }
}

/// A player observation: the common attributes plus team and possession.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerObservation {
    #[serde(flatten)]
    pub observation: Observation,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub team_color: Option<Color>,
    #[serde(default)]
    pub has_ball: bool,
}

impl PlayerObservation {
    pub fn new(bbox: BBox) -> Self {
        Self {
            observation: Observation::new(bbox),
            team: None,
            team_color: None,
            has_ball: false,
        }
    }

    #[inline]
    pub fn bbox(&self) -> &BBox {
        &self.observation.bbox
    }
}

/// Typed records that expose their common [`Observation`].
pub trait AsObservation {
    fn observation(&self) -> &Observation;
    fn observation_mut(&mut self) -> &mut Observation;
}

impl AsObservation for Observation {
    fn observation(&self) -> &Observation {
        self
    }

    fn observation_mut(&mut self) -> &mut Observation {
        self
    }
}

impl AsObservation for PlayerObservation {
    fn observation(&self) -> &Observation {
        &self.observation
    }

    fn observation_mut(&mut self) -> &mut Observation {
        &mut self.observation
    }
}

/// Observations of one class in one frame, ordered by track id.
pub type FrameTracks<T> = BTreeMap<TrackId, T>;

/// All observations of a video, one entry per frame for every class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStore {
    pub players: Vec<FrameTracks<PlayerObservation>>,
    pub referees: Vec<FrameTracks<Observation>>,
    pub ball: Vec<FrameTracks<Observation>>,
}

impl TrackStore {
    /// A store with `frames` empty entries per class.
    pub fn with_frames(frames: usize) -> Self {
        Self {
            players: vec![FrameTracks::new(); frames],
            referees: vec![FrameTracks::new(); frames],
            ball: vec![FrameTracks::new(); frames],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.players.len()
    }

    /// Every class covers the same number of frames.
    pub fn is_consistent(&self) -> bool {
        self.referees.len() == self.players.len() && self.ball.len() == self.players.len()
    }

    /// Number of sequence entries kept for `class`.
    pub fn sequence_len(&self, class: ObjectClass) -> usize {
        match class {
            ObjectClass::Player => self.players.len(),
            ObjectClass::Referee => self.referees.len(),
            ObjectClass::Ball => self.ball.len(),
        }
    }

    /// Number of observations of `class` in `frame`.
    pub fn frame_len(&self, class: ObjectClass, frame: usize) -> usize {
        match class {
            ObjectClass::Player => self.players.get(frame).map_or(0, |f| f.len()),
            ObjectClass::Referee => self.referees.get(frame).map_or(0, |f| f.len()),
            ObjectClass::Ball => self.ball.get(frame).map_or(0, |f| f.len()),
        }
    }

    pub fn observation(
        &self,
        class: ObjectClass,
        frame: usize,
        id: TrackId,
    ) -> Option<&Observation> {
        match class {
            ObjectClass::Player => self
                .players
                .get(frame)
                .and_then(|f| f.get(&id))
                .map(AsObservation::observation),
            ObjectClass::Referee => self.referees.get(frame).and_then(|f| f.get(&id)),
            ObjectClass::Ball => self.ball.get(frame).and_then(|f| f.get(&id)),
        }
    }

    /// Visit every observation of `class` in frame order.
    pub fn visit_mut<F>(&mut self, class: ObjectClass, mut f: F)
    where
        F: FnMut(usize, TrackId, &mut Observation),
    {
        match class {
            ObjectClass::Player => visit_frames(&mut self.players, &mut f),
            ObjectClass::Referee => visit_frames(&mut self.referees, &mut f),
            ObjectClass::Ball => visit_frames(&mut self.ball, &mut f),
        }
    }

    /// Visit every observation of `class`, frames in parallel.
    pub fn par_visit_mut<F>(&mut self, class: ObjectClass, f: F)
    where
        F: Fn(usize, TrackId, &mut Observation) + Sync + Send,
    {
        match class {
            ObjectClass::Player => par_visit_frames(&mut self.players, &f),
            ObjectClass::Referee => par_visit_frames(&mut self.referees, &f),
            ObjectClass::Ball => par_visit_frames(&mut self.ball, &f),
        }
    }
}

fn visit_frames<T, F>(frames: &mut [FrameTracks<T>], f: &mut F)
where
    T: AsObservation,
    F: FnMut(usize, TrackId, &mut Observation),
{
    for (frame, tracks) in frames.iter_mut().enumerate() {
        for (id, track) in tracks.iter_mut() {
            f(frame, *id, track.observation_mut());
        }
    }
}

fn par_visit_frames<T, F>(frames: &mut [FrameTracks<T>], f: &F)
where
    T: AsObservation + Send,
    F: Fn(usize, TrackId, &mut Observation) + Sync + Send,
{
    frames
        .par_iter_mut()
        .enumerate()
        .for_each(|(frame, tracks)| {
            for (id, track) in tracks.iter_mut() {
                f(frame, *id, track.observation_mut());
            }
        });
}
