//! Ball possession: nearest player per frame and running team control.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PossessionError;
use crate::tracker::BBox;
use crate::tracks::{
    BALL_TRACK_ID, FrameTracks, PlayerObservation, Point, Team, TrackId, TrackStore,
};

/// Pixel distances closer than this are a tie; the lower track id keeps the ball.
const TIE_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PossessionConfig {
    /// Pixels between a foot corner and the ball centre.
    pub max_player_ball_distance: f64,
}

impl Default for PossessionConfig {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

pub struct PlayerBallAssigner {
    max_player_ball_distance: f64,
}

impl PlayerBallAssigner {
    /// Assigner using the configured reach.
    pub fn new(config: &PossessionConfig) -> Self {
        Self {
            max_player_ball_distance: config.max_player_ball_distance,
        }
    }

    /// The player closest to the ball, if any foot is strictly within range.
    pub fn assign_ball_to_player(
        &self,
        players: &FrameTracks<PlayerObservation>,
        ball_bbox: &BBox,
    ) -> Option<TrackId> {
        let ball = ball_bbox.center_point();
        let mut best: Option<(TrackId, f64)> = None;
        for (id, player) in players {
            let bbox = player.bbox();
            let left = Point::new(bbox.left as f64, bbox.bottom as f64);
            let right = Point::new(bbox.right as f64, bbox.bottom as f64);
            let distance = left.distance_to(ball).min(right.distance_to(ball));

            if distance >= self.max_player_ball_distance {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d - TIE_TOLERANCE) {
                best = Some((*id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Mark the ball carrier of every frame and return the team in control.
    pub fn team_ball_control(&self, store: &mut TrackStore) -> Result<Vec<Team>, PossessionError> {
        let mut controlling = Vec::with_capacity(store.frame_count());
        for (index, players) in store.players.iter_mut().enumerate() {
            let ball = store.ball.get(index).and_then(|b| b.get(&BALL_TRACK_ID));
            let carrier = ball.and_then(|ball| self.assign_ball_to_player(players, &ball.bbox));

            let team = carrier.and_then(|id| {
                let player = players.get_mut(&id)?;
                player.has_ball = true;
                player.team
            });
            if team.is_none() {
                debug!(frame = index, "no player in control of the ball");
            }
            controlling.push(team);
        }
        carry_forward(&controlling)
    }
}

/// Replace every `None` with the previous frame's team.
pub fn carry_forward(teams: &[Option<Team>]) -> Result<Vec<Team>, PossessionError> {
    let mut out = Vec::with_capacity(teams.len());
    for team in teams {
        let resolved = match (team, out.last()) {
            (Some(team), _) => *team,
            (None, Some(previous)) => *previous,
            (None, None) => return Err(PossessionError::NoInitialPossession),
        };
        out.push(resolved);
    }
    Ok(out)
}

/// Share of frames each team has controlled the ball.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PossessionShare {
    pub team_a: f64,
    pub team_b: f64,
}

/// Running ball-control statistics, one entry per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BallControl {
    running: Vec<PossessionShare>,
}

impl BallControl {
    pub fn from_sequence(teams: &[Team]) -> Self {
        let mut a = 0usize;
        let running = teams
            .iter()
            .enumerate()
            .map(|(i, team)| {
                if *team == Team::A {
                    a += 1;
                }
                let seen = (i + 1) as f64;
                PossessionShare {
                    team_a: a as f64 / seen,
                    team_b: (i + 1 - a) as f64 / seen,
                }
            })
            .collect();
        Self { running }
    }

    /// Shares over frames `0..=frame`.
    pub fn at(&self, frame: usize) -> Option<PossessionShare> {
        self.running.get(frame).copied()
    }

    /// Shares over the whole video.
    pub fn overall(&self) -> PossessionShare {
        self.running.last().copied().unwrap_or_default()
    }

    pub fn running(&self) -> &[PossessionShare] {
        &self.running
    }
}
