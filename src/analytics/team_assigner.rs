//! Team membership from jersey colours.

use std::collections::HashMap;

use ndarray::{Array2, Axis, s};
use tracing::{debug, info, warn};

use crate::analytics::kmeans::{Clustering, KMeans};
use crate::error::TeamError;
use crate::frame::Frame;
use crate::tracker::BBox;
use crate::tracks::{Color, FrameTracks, PlayerObservation, Team, TrackId, TrackStore};

/// Jersey colour of the player inside `bbox`.
///
/// Clusters the upper half of the crop into two colours; the cluster owning
/// most of the four corner pixels is background, the other is the jersey.
pub fn player_color(frame: &Frame, bbox: &BBox) -> Option<Color> {
    let crop = frame.crop(bbox)?;
    let rows = (crop.shape()[0] / 2).max(1);
    let top = crop.slice(s![..rows, .., ..]);
    let (h, w) = (top.shape()[0], top.shape()[1]);

    let pixels: Array2<f32> = top
        .to_shape((h * w, 3))
        .ok()?
        .mapv(f32::from);

    let Some(clustering) = KMeans::new(2).fit(pixels.view()) else {
        // A single pixel is its own colour.
        let p = pixels.row(0);
        return Some(Color([p[0], p[1], p[2]]));
    };

    let corners = [0, w - 1, (h - 1) * w, h * w - 1];
    let background_votes = corners.iter().filter(|&&i| clustering.labels[i] == 1).count();
    let background = usize::from(background_votes > corners.len() / 2);
    let jersey = clustering.centroids.row(1 - background);
    Some(Color([jersey[0], jersey[1], jersey[2]]))
}

/// Assigns players to teams by jersey colour.
///
/// Colours are fitted once on the first frame; after that each track keeps
/// the team it was first given.
#[derive(Debug, Default)]
pub struct TeamAssigner {
    model: Option<Clustering>,
    cache: HashMap<TrackId, Team>,
}

impl TeamAssigner {
    /// An unfitted assigner with an empty team cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the two team colours on the players of one frame.
    pub fn assign_team_color(
        &mut self,
        frame: &Frame,
        players: &FrameTracks<PlayerObservation>,
    ) -> Result<(), TeamError> {
        let colors: Vec<Color> = players
            .values()
            .filter_map(|player| player_color(frame, player.bbox()))
            .collect();
        if colors.len() < 2 {
            return Err(TeamError::InsufficientPlayers { found: colors.len() });
        }

        let samples = Array2::from_shape_fn((colors.len(), 3), |(i, c)| colors[i].0[c]);
        let model = KMeans::new(2)
            .fit(samples.view())
            .ok_or(TeamError::InsufficientPlayers { found: colors.len() })?;
        debug!(
            team_a = ?model.centroids.row(0).to_vec(),
            team_b = ?model.centroids.row(1).to_vec(),
            "fitted team colours"
        );
        self.model = Some(model);
        Ok(())
    }

    /// Team of a tracked player, cached per track id.
    pub fn get_player_team(
        &mut self,
        frame: &Frame,
        bbox: &BBox,
        track_id: TrackId,
    ) -> Result<Team, TeamError> {
        if let Some(team) = self.cache.get(&track_id) {
            return Ok(*team);
        }
        let model = self.model.as_ref().ok_or(TeamError::NotFitted)?;
        let color = player_color(frame, bbox).ok_or(TeamError::EmptyCrop { track_id })?;

        let sample = ndarray::arr1(&color.0);
        let team = Team::from_index(model.predict(sample.view()));
        self.cache.insert(track_id, team);
        Ok(team)
    }

    /// Centroid colour of `team`.
    pub fn team_color(&self, team: Team) -> Option<Color> {
        let model = self.model.as_ref()?;
        let row = model.centroids.index_axis(Axis(0), team.index());
        Some(Color([row[0], row[1], row[2]]))
    }

    /// Fit on frame 0, then label every player observation.
    pub fn assign_teams(
        &mut self,
        frames: &[Frame],
        store: &mut TrackStore,
    ) -> Result<(), TeamError> {
        let (Some(first), Some(first_players)) = (frames.first(), store.players.first()) else {
            return Err(TeamError::InsufficientPlayers { found: 0 });
        };
        self.assign_team_color(first, first_players)?;

        for (index, (frame, players)) in frames.iter().zip(store.players.iter_mut()).enumerate() {
            for (id, player) in players.iter_mut() {
                match self.get_player_team(frame, &player.observation.bbox, *id) {
                    Ok(team) => {
                        player.team = Some(team);
                        player.team_color = self.team_color(team);
                    }
                    Err(TeamError::EmptyCrop { track_id }) => {
                        warn!(
                            frame = index,
                            track_id,
                            "player box lies outside the frame, team left unassigned"
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        info!(tracks = self.cache.len(), "assigned teams");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRASS: [u8; 3] = [40, 160, 40];
    const RED: [u8; 3] = [220, 20, 20];
    const BLUE: [u8; 3] = [20, 20, 220];

    fn paint_player(frame: &mut Frame, left: usize, top: usize, jersey: [u8; 3]) -> BBox {
        frame.fill_rect(left + 4, top + 4, left + 16, top + 20, jersey);
        BBox::new(left as f32, top as f32, left as f32 + 20.0, top as f32 + 40.0)
    }

    fn two_team_frame() -> (Frame, FrameTracks<PlayerObservation>) {
        let mut frame = Frame::filled(200, 100, GRASS);
        let mut players = FrameTracks::new();
        players.insert(2, PlayerObservation::new(paint_player(&mut frame, 10, 10, RED)));
        players.insert(3, PlayerObservation::new(paint_player(&mut frame, 60, 10, BLUE)));
        players.insert(5, PlayerObservation::new(paint_player(&mut frame, 110, 10, RED)));
        (frame, players)
    }

    #[test]
    fn test_jersey_color_ignores_background() {
        let (frame, players) = two_team_frame();
        let color = player_color(&frame, players[&2].bbox()).unwrap();
        assert!(color.distance(&Color([220.0, 20.0, 20.0])) < 1.0);
    }

    #[test]
    fn test_players_split_by_jersey() {
        let (frame, players) = two_team_frame();
        let mut assigner = TeamAssigner::new();
        assigner.assign_team_color(&frame, &players).unwrap();

        let red = assigner.get_player_team(&frame, players[&2].bbox(), 2).unwrap();
        let blue = assigner.get_player_team(&frame, players[&3].bbox(), 3).unwrap();
        assert_eq!(red, Team::A);
        assert_eq!(blue, Team::B);
        assert_eq!(assigner.get_player_team(&frame, players[&5].bbox(), 5).unwrap(), red);
        let blue_color = assigner.team_color(Team::B).unwrap();
        assert!(blue_color.distance(&Color([20.0, 20.0, 220.0])) < 1.0);
    }

    #[test]
    fn test_cached_team_survives_colour_change() {
        let (frame, players) = two_team_frame();
        let mut assigner = TeamAssigner::new();
        assigner.assign_team_color(&frame, &players).unwrap();
        let team = assigner.get_player_team(&frame, players[&2].bbox(), 2).unwrap();

        let mut recoloured = frame.clone();
        paint_player(&mut recoloured, 10, 10, BLUE);
        assert_eq!(assigner.get_player_team(&recoloured, players[&2].bbox(), 2).unwrap(), team);
    }

    #[test]
    fn test_errors() {
        let (frame, players) = two_team_frame();
        let mut assigner = TeamAssigner::new();
        assert_eq!(
            assigner.get_player_team(&frame, players[&2].bbox(), 2),
            Err(TeamError::NotFitted)
        );

        let mut lonely = FrameTracks::new();
        lonely.insert(2, players[&2].clone());
        assert_eq!(
            assigner.assign_team_color(&frame, &lonely),
            Err(TeamError::InsufficientPlayers { found: 1 })
        );

        assigner.assign_team_color(&frame, &players).unwrap();
        let outside = BBox::new(500.0, 500.0, 520.0, 540.0);
        assert_eq!(
            assigner.get_player_team(&frame, &outside, 9),
            Err(TeamError::EmptyCrop { track_id: 9 })
        );
    }

    #[test]
    fn test_player_outside_frame_keeps_no_team() {
        let (frame, players) = two_team_frame();
        let mut second = players.clone();
        second.insert(9, PlayerObservation::new(BBox::new(500.0, 500.0, 520.0, 540.0)));
        let mut store = TrackStore::with_frames(2);
        store.players = vec![players, second];

        let mut assigner = TeamAssigner::new();
        assigner
            .assign_teams(&[frame.clone(), frame], &mut store)
            .unwrap();

        assert_eq!(store.players[1][&9].team, None);
        assert_eq!(store.players[1][&9].team_color, None);
        for id in [2, 3, 5] {
            assert!(store.players[1][&id].team.is_some());
        }
        assert_eq!(store.players[1][&2].team, store.players[0][&5].team);
    }
}
