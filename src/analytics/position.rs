use crate::tracker::BBox;
use crate::tracks::{ObjectClass, Point, TrackStore};

/// Reference point of a box: ground contact for people, centroid for the ball.
pub fn position_for(class: ObjectClass, bbox: &BBox) -> Point {
    match class {
        ObjectClass::Player | ObjectClass::Referee => bbox.foot_position(),
        ObjectClass::Ball => bbox.center_point(),
    }
}

/// Fill `position` for every observation in the store.
pub fn add_position_to_tracks(store: &mut TrackStore) {
    for class in ObjectClass::ALL {
        store.par_visit_mut(class, |_, _, obs| {
            obs.position = Some(position_for(class, &obs.bbox));
        });
    }
}
