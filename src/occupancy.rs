// src/occupancy.rs
//
// Turns one frame's vehicle detections plus the spot polygon set into
// per-spot occupancy verdicts.

use std::collections::HashSet;

use crate::geometry::point_in_polygon;
use crate::types::{OccupancyRecord, ParkingSpot};
use crate::vehicle_detection::Detection;

/// Classify spot occupancy for a single frame.
///
/// Each detection whose class is in `vehicle_classes` probes the spot
/// polygons with its bounding-box centroid, in spot-list order. The
/// first containing spot wins and the detection stops probing: one
/// vehicle occupies at most one spot. Spots without a polygon are
/// skipped and do not appear in the output.
///
/// Output is deterministic for a given `(detections, spots)` input and
/// does not depend on detection order: a spot marked occupied stays
/// marked regardless of later detections.
pub fn classify(
    detections: &[Detection],
    spots: &[ParkingSpot],
    vehicle_classes: &[String],
) -> Vec<OccupancyRecord> {
    let mut occupied: HashSet<i64> = HashSet::new();

    for detection in detections {
        if !vehicle_classes.iter().any(|c| c == &detection.class_name) {
            continue;
        }

        let centroid = detection.centroid();

        for spot in spots {
            let Some(polygon) = spot.polygon.as_ref() else {
                continue;
            };
            if point_in_polygon(polygon, centroid) {
                occupied.insert(spot.id);
                break;
            }
        }
    }

    spots
        .iter()
        .filter(|spot| spot.polygon.is_some())
        .map(|spot| OccupancyRecord {
            spot_id: spot.id,
            occupied: occupied.contains(&spot.id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn square_at(x: f32, y: f32, size: f32) -> Vec<Point> {
        vec![(x, y), (x + size, y), (x + size, y + size), (x, y + size)]
    }

    fn spot(id: i64, polygon: Option<Vec<Point>>) -> ParkingSpot {
        ParkingSpot {
            id,
            label: id.to_string(),
            polygon,
        }
    }

    fn car_at(cx: f32, cy: f32) -> Detection {
        Detection {
            bbox: [cx - 5.0, cy - 5.0, cx + 5.0, cy + 5.0],
            confidence: 0.9,
            class_id: 2,
            class_name: "car".to_string(),
        }
    }

    fn vehicle_classes() -> Vec<String> {
        vec!["car".to_string()]
    }

    #[test]
    fn test_three_disjoint_spots_one_occupied() {
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 10.0))),
            spot(2, Some(square_at(20.0, 0.0, 10.0))),
            spot(3, Some(square_at(40.0, 0.0, 10.0))),
        ];
        let detections = vec![car_at(25.0, 5.0)];

        let records = classify(&detections, &spots, &vehicle_classes());
        assert_eq!(
            records,
            vec![
                OccupancyRecord { spot_id: 1, occupied: false },
                OccupancyRecord { spot_id: 2, occupied: true },
                OccupancyRecord { spot_id: 3, occupied: false },
            ]
        );
    }

    #[test]
    fn test_zero_detections_all_free() {
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 10.0))),
            spot(2, Some(square_at(20.0, 0.0, 10.0))),
        ];
        let records = classify(&[], &spots, &vehicle_classes());
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.occupied));
    }

    #[test]
    fn test_spot_without_polygon_excluded() {
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 10.0))),
            spot(2, None),
            spot(3, Some(square_at(40.0, 0.0, 10.0))),
        ];
        let records = classify(&[], &spots, &vehicle_classes());
        let ids: Vec<i64> = records.iter().map(|r| r.spot_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_first_containing_spot_wins_on_overlap() {
        // Two overlapping spots both contain the centroid; the first in
        // list order takes the detection.
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 20.0))),
            spot(2, Some(square_at(10.0, 0.0, 20.0))),
        ];
        let detections = vec![car_at(15.0, 5.0)];

        let records = classify(&detections, &spots, &vehicle_classes());
        assert_eq!(
            records,
            vec![
                OccupancyRecord { spot_id: 1, occupied: true },
                OccupancyRecord { spot_id: 2, occupied: false },
            ]
        );
    }

    #[test]
    fn test_single_detection_marks_at_most_one_spot() {
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 30.0))),
            spot(2, Some(square_at(5.0, 5.0, 30.0))),
            spot(3, Some(square_at(10.0, 10.0, 30.0))),
        ];
        let detections = vec![car_at(15.0, 15.0)];

        let records = classify(&detections, &spots, &vehicle_classes());
        let occupied: Vec<i64> = records
            .iter()
            .filter(|r| r.occupied)
            .map(|r| r.spot_id)
            .collect();
        assert_eq!(occupied, vec![1]);
    }

    #[test]
    fn test_non_vehicle_classes_ignored() {
        let spots = vec![spot(1, Some(square_at(0.0, 0.0, 10.0)))];
        let mut person = car_at(5.0, 5.0);
        person.class_id = 0;
        person.class_name = "person".to_string();

        let records = classify(&[person], &spots, &vehicle_classes());
        assert!(!records[0].occupied);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 10.0))),
            spot(2, Some(square_at(20.0, 0.0, 10.0))),
        ];
        let detections = vec![car_at(5.0, 5.0), car_at(100.0, 100.0)];

        let first = classify(&detections, &spots, &vehicle_classes());
        let second = classify(&detections, &spots, &vehicle_classes());
        assert_eq!(first, second);
    }

    #[test]
    fn test_detection_order_does_not_change_result() {
        let spots = vec![
            spot(1, Some(square_at(0.0, 0.0, 10.0))),
            spot(2, Some(square_at(20.0, 0.0, 10.0))),
        ];
        let a = car_at(5.0, 5.0);
        let b = car_at(25.0, 5.0);

        let forward = classify(&[a.clone(), b.clone()], &spots, &vehicle_classes());
        let reverse = classify(&[b, a], &spots, &vehicle_classes());
        assert_eq!(forward, reverse);
    }
}
