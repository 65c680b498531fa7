// Derived traffic statistics, computed on demand from the live snapshot map
use super::congestion::{CongestionLevel, CongestionThresholds};
use super::road::RoadId;
use super::telemetry::{Presence, SnapshotMap, TelemetrySnapshot};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AverageSpeeds {
    pub car: f64,
    pub motor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusiestRoad {
    pub road: RoadId,
    pub vehicles: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadBreakdown {
    pub road: RoadId,
    pub cars: u32,
    pub motors: u32,
    pub total: u64,
}

fn present<'a>(
    snapshots: &'a SnapshotMap,
    roads: &'a [RoadId],
) -> impl Iterator<Item = (&'a RoadId, &'a TelemetrySnapshot)> + 'a {
    roads.iter().filter_map(move |road| match snapshots.get(road) {
        Some(Presence::Present(snapshot)) => Some((road, snapshot)),
        _ => None,
    })
}

/// Sum of cars and motorbikes over every road with data.
pub fn total_vehicles(snapshots: &SnapshotMap, roads: &[RoadId]) -> u64 {
    present(snapshots, roads).map(|(_, s)| s.total()).sum()
}

/// Mean speed per vehicle class over roads that reported; zeros when none did.
pub fn average_speeds(snapshots: &SnapshotMap, roads: &[RoadId]) -> AverageSpeeds {
    let (count, car, motor) = present(snapshots, roads).fold((0usize, 0.0, 0.0), |acc, (_, s)| {
        (acc.0 + 1, acc.1 + s.speed_car, acc.2 + s.speed_motor)
    });

    if count == 0 {
        return AverageSpeeds { car: 0.0, motor: 0.0 };
    }

    AverageSpeeds {
        car: car / count as f64,
        motor: motor / count as f64,
    }
}

/// Road with the highest vehicle total. Ties go to the earlier road in `roads`.
pub fn busiest_road(snapshots: &SnapshotMap, roads: &[RoadId]) -> Option<BusiestRoad> {
    let mut busiest: Option<BusiestRoad> = None;
    for (road, snapshot) in present(snapshots, roads) {
        let vehicles = snapshot.total();
        if busiest.as_ref().is_none_or(|b| vehicles > b.vehicles) {
            busiest = Some(BusiestRoad {
                road: road.clone(),
                vehicles,
            });
        }
    }
    busiest
}

/// Per-road vehicle split, in membership order, for roads carrying any traffic.
pub fn vehicle_breakdown(snapshots: &SnapshotMap, roads: &[RoadId]) -> Vec<RoadBreakdown> {
    present(snapshots, roads)
        .filter(|(_, s)| s.total() > 0)
        .map(|(road, s)| RoadBreakdown {
            road: road.clone(),
            cars: s.count_car,
            motors: s.count_motor,
            total: s.total(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadStatus {
    pub road: RoadId,
    pub level: CongestionLevel,
}

/// Overview figures, all derived from the same snapshot map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub total_vehicles: u64,
    pub average_speeds: AverageSpeeds,
    pub busiest_road: Option<BusiestRoad>,
    pub breakdown: Vec<RoadBreakdown>,
    pub statuses: Vec<RoadStatus>,
}

pub fn summarize(
    snapshots: &SnapshotMap,
    roads: &[RoadId],
    thresholds: &CongestionThresholds,
) -> TrafficSummary {
    let statuses = roads
        .iter()
        .map(|road| RoadStatus {
            road: road.clone(),
            level: thresholds.classify(
                snapshots
                    .get(road)
                    .map(Presence::as_ref)
                    .unwrap_or(Presence::Absent),
            ),
        })
        .collect();

    TrafficSummary {
        total_vehicles: total_vehicles(snapshots, roads),
        average_speeds: average_speeds(snapshots, roads),
        busiest_road: busiest_road(snapshots, roads),
        breakdown: vehicle_breakdown(snapshots, roads),
        statuses,
    }
}
