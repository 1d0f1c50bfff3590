//! Response shaping for merged station result sets.

use std::collections::HashSet;

use crate::radio_browser::Station;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Concatenate `lists` keeping the first station seen for each identifier.
pub fn merge_unique<I>(lists: I) -> Vec<Station>
where
    I: IntoIterator<Item = Vec<Station>>,
{
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|station| seen.insert(station.stationuuid.clone()))
        .collect()
}

/// Sort by `votes + clickcount` descending and keep the first `limit`.
#[must_use]
pub fn rank_by_popularity(mut stations: Vec<Station>, limit: usize) -> Vec<Station> {
    stations.sort_by(|a, b| b.popularity().cmp(&a.popularity()));
    stations.truncate(limit);
    stations
}

/// Great-circle distance in kilometres.
#[must_use]
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Stations within `radius_km` of `origin`, nearest first, at most `limit`.
///
/// Each result carries its `distance`. Stations without coordinates are
/// placed at `radius_km + 1`, which always falls outside the radius.
#[must_use]
pub fn nearest(stations: Vec<Station>, origin: (f64, f64), radius_km: f64, limit: usize) -> Vec<Station> {
    let mut within: Vec<Station> = stations
        .into_iter()
        .map(|station| {
            let distance = station
                .coordinates()
                .map_or(radius_km + 1.0, |point| haversine_km(origin, point));
            Station {
                distance: Some(distance),
                ..station
            }
        })
        .filter(|station| station.distance.is_some_and(|d| d <= radius_km))
        .collect();

    within.sort_by(|a, b| {
        a.distance
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.distance.unwrap_or(f64::INFINITY))
    });
    within.truncate(limit);
    within
}
