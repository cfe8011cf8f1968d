use approx::assert_abs_diff_eq;
use pitchtrack_rs::analytics::{SpeedConfig, ViewConfig};
use pitchtrack_rs::integration::RecordedDetections;
use pitchtrack_rs::stub::StubPaths;
use pitchtrack_rs::{
    Analysis, BALL_TRACK_ID, CameraMovement, DetectedClass, Detection, DetectionSource, Frame,
    ObjectClass, ObjectTracker, PipelineConfig, PipelineError, Precomputed, TrackId, TrackStore,
};

const GRASS: [u8; 3] = [40, 160, 40];
const RED: [u8; 3] = [220, 20, 20];
const BLUE: [u8; 3] = [20, 20, 220];

/// Three frames: a red player running right with the ball at their feet, a
/// blue player running down the image. The ball is missed in frame 1.
fn scenario() -> (Vec<Frame>, Vec<Vec<Detection>>) {
    let mut frames = Vec::new();
    let mut detections = Vec::new();
    for i in 0..3usize {
        let mut frame = Frame::filled(320, 240, GRASS);
        let (rx, by) = (100 + 3 * i, 100 + 4 * i);
        frame.fill_rect(rx + 4, 104, rx + 16, 120, RED);
        frame.fill_rect(204, by + 4, 216, by + 20, BLUE);
        frames.push(frame);

        let mut dets = vec![
            Detection::new(DetectedClass::Player, rx as f32, 100.0, rx as f32 + 20.0, 140.0, 0.9),
            Detection::new(DetectedClass::Player, 200.0, by as f32, 220.0, by as f32 + 40.0, 0.9),
        ];
        if i != 1 {
            let cx = 112.0 + 3.0 * i as f32;
            dets.push(Detection::new(DetectedClass::Ball, cx - 3.0, 139.0, cx + 3.0, 145.0, 0.7));
        }
        detections.push(dets);
    }
    (frames, detections)
}

fn scenario_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.camera.feature_bands = vec![(0, 20)];
    config.view = ViewConfig {
        pixel_vertices: [[0.0, 240.0], [0.0, 0.0], [320.0, 0.0], [320.0, 240.0]],
        pitch_width: 24.0,
        pitch_length: 32.0,
    };
    config.speed = SpeedConfig {
        frame_window: 2,
        frame_rate: 24.0,
    };
    config
}

fn track_id_where(store: &TrackStore, frame: usize, pred: impl Fn(f32) -> bool) -> TrackId {
    *store.players[frame]
        .iter()
        .find(|(_, p)| pred(p.bbox().left))
        .map(|(id, _)| id)
        .unwrap()
}

#[test]
fn test_two_players_end_to_end() {
    let (frames, detections) = scenario();
    let analysis = Analysis::new(scenario_config());
    let output = analysis.run(&frames, RecordedDetections::new(detections)).unwrap();
    let tracks = &output.tracks;

    for class in ObjectClass::ALL {
        assert_eq!(tracks.sequence_len(class), 3);
    }
    assert_eq!(output.camera_movement, CameraMovement::zero(3));

    let red = track_id_where(tracks, 0, |left| left < 150.0);
    let blue = track_id_where(tracks, 0, |left| left > 150.0);
    assert_ne!(red, blue);
    for frame in 0..3 {
        assert!(tracks.players[frame].contains_key(&red));
        assert!(tracks.players[frame].contains_key(&blue));
    }

    // The missed ball is interpolated between its neighbours.
    let ball = tracks.ball[1][&BALL_TRACK_ID].bbox;
    assert_abs_diff_eq!(ball.center().0, 115.0, epsilon = 1e-4);

    // Stabilised positions equal raw positions without camera motion.
    let first = &tracks.players[0][&red].observation;
    assert_eq!(first.adjusted_position, first.position);
    let pitch = first.transformed_position.unwrap();
    assert_abs_diff_eq!(pitch.x, 11.0, epsilon = 1e-6);
    assert_abs_diff_eq!(pitch.y, 14.0, epsilon = 1e-6);

    // 6 px = 0.6 m over 2 frames at 24 fps.
    for frame in 0..3 {
        let obs = &tracks.players[frame][&red].observation;
        assert_abs_diff_eq!(obs.distance.unwrap(), 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(obs.speed.unwrap(), 25.92, epsilon = 1e-6);
    }
    assert_abs_diff_eq!(output.distances[&ObjectClass::Player][&red], 0.6, epsilon = 1e-6);
    assert_abs_diff_eq!(output.distances[&ObjectClass::Player][&blue], 0.8, epsilon = 1e-6);

    let red_team = tracks.players[0][&red].team.unwrap();
    let blue_team = tracks.players[0][&blue].team.unwrap();
    assert_ne!(red_team, blue_team);
    for frame in 0..3 {
        assert_eq!(tracks.players[frame][&red].team, Some(red_team));
        assert!(tracks.players[frame][&red].has_ball);
        assert!(!tracks.players[frame][&blue].has_ball);
        let color = tracks.players[frame][&red].team_color.unwrap();
        assert!(color.0[0] > 200.0 && color.0[2] < 50.0);
    }

    assert_eq!(output.team_ball_control, vec![red_team; 3]);
    let share = output.ball_control.overall();
    let red_share = if red_team.index() == 0 { share.team_a } else { share.team_b };
    assert_abs_diff_eq!(red_share, 1.0);
}

#[test]
fn test_precomputed_tracks_skip_detection() {
    let (frames, detections) = scenario();
    let config = scenario_config();
    let recorded = RecordedDetections::new(detections);
    let mut tracker = ObjectTracker::new(recorded, config.tracker.clone());
    let tracks = tracker.get_object_tracks(&frames).unwrap();

    let analysis = Analysis::new(config);
    let output = analysis
        .run_with(
            &frames,
            ExplodingDetector,
            Precomputed {
                tracks: Some(tracks),
                camera_movement: None,
            },
        )
        .unwrap();
    assert_eq!(output.team_ball_control.len(), 3);
}

#[test]
fn test_stubs_are_written_then_reused() {
    let (frames, detections) = scenario();
    let dir = tempfile::tempdir().unwrap();
    let stubs = StubPaths {
        tracks: Some(dir.path().join("track_stubs.json")),
        camera_movement: Some(dir.path().join("camera_movement_stub.json")),
        read_from_stub: true,
    };
    let analysis = Analysis::new(scenario_config());

    let first = analysis
        .run_with_stubs(&frames, RecordedDetections::new(detections), &stubs)
        .unwrap();
    assert!(dir.path().join("track_stubs.json").exists());
    assert!(dir.path().join("camera_movement_stub.json").exists());

    let second = analysis.run_with_stubs(&frames, ExplodingDetector, &stubs).unwrap();
    assert_eq!(second.tracks, first.tracks);
    assert_eq!(second.team_ball_control, first.team_ball_control);
}

#[test]
fn test_detector_failure_aborts_run() {
    let (frames, _) = scenario();
    let err = Analysis::new(scenario_config())
        .run(&frames, ExplodingDetector)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Tracking(_)));
    assert!(err.to_string().contains("frame 0"));
}

#[test]
fn test_ball_out_of_reach_in_first_frame() {
    let (frames, mut detections) = scenario();
    for dets in &mut detections {
        for det in dets.iter_mut().filter(|d| d.class == DetectedClass::Ball) {
            det.bbox.top += 150.0;
            det.bbox.bottom += 150.0;
        }
    }
    let err = Analysis::new(scenario_config())
        .run(&frames, RecordedDetections::new(detections))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Possession(_)));
}

/// Fails on every call; proves a stage was skipped.
struct ExplodingDetector;

impl DetectionSource for ExplodingDetector {
    type Error = String;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
        Err("detector should not be called".to_string())
    }
}
