//! Pixel-radius clustering of render points.

use std::collections::HashMap;

use crate::data::{ClusterConfig, GeoPoint, RenderPoint, StyleKey};
use crate::viewport::{project, unproject, Pixel};

pub const MIN_POINT_DIAMETER: f64 = 10.0;
pub const MAX_POINT_DIAMETER: f64 = 36.0;
const HOTNESS_SCALE: f64 = 2.0;

pub const MIN_CLUSTER_DIAMETER: f64 = 28.0;
pub const MAX_CLUSTER_DIAMETER: f64 = 72.0;
const CLUSTER_GROWTH: f64 = 6.0;

/// Colour bucket of a cluster marker, ordered by population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeightBucket {
    Low,
    Medium,
    High,
    Critical,
}

impl WeightBucket {
    pub fn for_count(count: usize) -> Self {
        match count {
            0..=9 => WeightBucket::Low,
            10..=49 => WeightBucket::Medium,
            50..=199 => WeightBucket::High,
            _ => WeightBucket::Critical,
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            WeightBucket::Low => "cluster-low",
            WeightBucket::Medium => "cluster-medium",
            WeightBucket::High => "cluster-high",
            WeightBucket::Critical => "cluster-critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterStyle {
    pub diameter: f64,
    pub bucket: WeightBucket,
}

/// Visual weight of a cluster. Never decreases as `count` grows.
pub fn cluster_style(count: usize) -> ClusterStyle {
    let growth = CLUSTER_GROWTH * (count.max(1) as f64).log2();
    ClusterStyle {
        diameter: (MIN_CLUSTER_DIAMETER + growth).min(MAX_CLUSTER_DIAMETER),
        bucket: WeightBucket::for_count(count),
    }
}

/// Diameter of a discrete point. Zero weight means "no hotness".
pub fn point_diameter(weight: f64) -> f64 {
    if !weight.is_finite() || weight <= 0.0 {
        return MIN_POINT_DIAMETER;
    }
    (MIN_POINT_DIAMETER + weight * HOTNESS_SCALE).clamp(MIN_POINT_DIAMETER, MAX_POINT_DIAMETER)
}

/// One visual unit on the map.
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    Point {
        event: usize,
        position: GeoPoint,
        diameter: f64,
        style: StyleKey,
    },
    Cluster {
        position: GeoPoint,
        /// Event indices of every member point.
        members: Vec<usize>,
        style: ClusterStyle,
    },
}

impl Marker {
    fn point(point: &RenderPoint) -> Self {
        Marker::Point {
            event: point.event,
            position: point.position(),
            diameter: point_diameter(point.weight),
            style: point.style,
        }
    }

    pub fn position(&self) -> GeoPoint {
        match self {
            Marker::Point { position, .. } | Marker::Cluster { position, .. } => *position,
        }
    }

    /// Number of events represented by this marker.
    pub fn population(&self) -> usize {
        match self {
            Marker::Point { .. } => 1,
            Marker::Cluster { members, .. } => members.len(),
        }
    }
}

/// Every point as its own marker.
pub fn discrete(points: &[RenderPoint]) -> Vec<Marker> {
    points.iter().map(Marker::point).collect()
}

/// Greedy grid clustering at `zoom`. Points are visited in input order so the
/// same input always yields the same partition.
pub fn partition(points: &[RenderPoint], zoom: f64, config: &ClusterConfig) -> Vec<Marker> {
    let radius = config.radius_pixels;
    let min_size = config.min_cluster_size.max(2);
    if radius <= 0.0 || !radius.is_finite() || points.len() < min_size {
        return discrete(points);
    }

    let pixels: Vec<Pixel> = points.iter().map(|p| project(p.position(), zoom)).collect();
    let cell_of = |pixel: &Pixel| ((pixel.x / radius).floor() as i64, (pixel.y / radius).floor() as i64);

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (index, pixel) in pixels.iter().enumerate() {
        grid.entry(cell_of(pixel)).or_default().push(index);
    }

    let mut assigned = vec![false; points.len()];
    let mut markers = Vec::new();

    for seed in 0..points.len() {
        if assigned[seed] {
            continue;
        }
        let origin = pixels[seed];
        let (cx, cy) = cell_of(&origin);

        let mut group = vec![seed];
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = grid.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                group.extend(bucket.iter().copied().filter(|&other| {
                    other != seed && !assigned[other] && origin.distance(&pixels[other]) <= radius
                }));
            }
        }

        if group.len() < min_size {
            // Neighbours stay free to join a later group.
            assigned[seed] = true;
            markers.push(Marker::point(&points[seed]));
            continue;
        }

        group.sort_unstable();
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        for &member in &group {
            assigned[member] = true;
            sum_x += pixels[member].x;
            sum_y += pixels[member].y;
        }
        let count = group.len() as f64;
        let centroid = unproject(Pixel { x: sum_x / count, y: sum_y / count }, zoom);

        markers.push(Marker::Cluster {
            position: centroid,
            members: group.iter().map(|&member| points[member].event).collect(),
            style: cluster_style(group.len()),
        });
    }

    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Sentiment;

    fn point(event: usize, lat: f64, lng: f64) -> RenderPoint {
        RenderPoint {
            event,
            lat,
            lng,
            weight: 0.0,
            style: Sentiment::Neutral,
        }
    }

    #[test]
    fn cluster_weight_is_monotonic() {
        let mut previous = cluster_style(1);
        for count in 2..2_000 {
            let current = cluster_style(count);
            assert!(current.diameter >= previous.diameter, "diameter shrank at {count}");
            assert!(current.bucket >= previous.bucket, "bucket dropped at {count}");
            previous = current;
        }
        assert_eq!(previous.diameter, MAX_CLUSTER_DIAMETER);
        assert_eq!(previous.bucket, WeightBucket::Critical);
    }

    #[test]
    fn hotness_scales_point_size_with_a_floor() {
        assert_eq!(point_diameter(0.0), MIN_POINT_DIAMETER);
        assert_eq!(point_diameter(f64::NAN), MIN_POINT_DIAMETER);
        assert_eq!(point_diameter(-4.0), MIN_POINT_DIAMETER);
        assert!(point_diameter(8.0) > point_diameter(5.0));
        assert_eq!(point_diameter(1_000.0), MAX_POINT_DIAMETER);
    }

    #[test]
    fn nearby_points_merge_and_distant_points_stay_apart() {
        let points = vec![
            point(0, 39.9042, 116.4074),
            point(1, 39.9050, 116.4080),
            point(2, 31.2304, 121.4737),
        ];
        let markers = partition(&points, 5.0, &ClusterConfig::default());

        assert_eq!(markers.len(), 2);
        match &markers[0] {
            Marker::Cluster { members, style, .. } => {
                assert_eq!(members, &vec![0, 1]);
                assert_eq!(style.bucket, WeightBucket::Low);
            }
            other => panic!("expected cluster, got {other:?}"),
        }
        assert!(matches!(markers[1], Marker::Point { event: 2, .. }));
    }

    #[test]
    fn zooming_in_splits_clusters_from_the_same_points() {
        let points = vec![point(0, 39.90, 116.40), point(1, 39.95, 116.45)];
        let config = ClusterConfig::default();

        assert_eq!(partition(&points, 4.0, &config).len(), 1);
        assert_eq!(partition(&points, 16.0, &config).len(), 2);
    }

    #[test]
    fn groups_below_minimum_render_as_plain_points() {
        let points = vec![
            point(0, 39.9042, 116.4074),
            point(1, 39.9043, 116.4075),
            point(2, 22.5431, 114.0579),
        ];
        let config = ClusterConfig {
            min_cluster_size: 3,
            ..ClusterConfig::default()
        };
        let markers = partition(&points, 10.0, &config);

        assert_eq!(markers, discrete(&points));
        assert!(markers.iter().all(|m| m.population() == 1));
    }

    #[test]
    fn population_is_preserved() {
        let points: Vec<_> = (0..40)
            .map(|i| point(i, 30.0 + (i % 7) as f64 * 0.01, 110.0 + (i / 7) as f64 * 0.5))
            .collect();
        let markers = partition(&points, 6.0, &ClusterConfig::default());
        let total: usize = markers.iter().map(Marker::population).sum();
        assert_eq!(total, points.len());
    }

    #[test]
    fn non_positive_radius_disables_merging() {
        let points = vec![point(0, 1.0, 1.0), point(1, 1.0, 1.0)];
        let config = ClusterConfig {
            radius_pixels: 0.0,
            ..ClusterConfig::default()
        };
        assert_eq!(partition(&points, 3.0, &config).len(), 2);
    }
}
