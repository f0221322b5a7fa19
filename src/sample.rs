//! Generated sentiment events for the dashboard pages.

use chrono::{Duration, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::data::{GeoPoint, Sentiment, SentimentEvent};

const CITIES: &[(&str, f64, f64)] = &[
    ("Beijing", 39.9042, 116.4074),
    ("Shanghai", 31.2304, 121.4737),
    ("Guangzhou", 23.1291, 113.2644),
    ("Shenzhen", 22.5431, 114.0579),
    ("Chengdu", 30.5728, 104.0668),
    ("Hangzhou", 30.2741, 120.1551),
    ("Wuhan", 30.5928, 114.3055),
    ("Xi'an", 34.3416, 108.9398),
    ("Nanjing", 32.0603, 118.7969),
    ("Chongqing", 29.4316, 106.9123),
];

const SOURCES: &[&str] = &["weibo", "wechat", "news", "forum", "douyin"];

const TOPICS: &[&str] = &[
    "transit fare change",
    "air quality report",
    "housing policy",
    "food safety inspection",
    "flood response",
    "school enrollment",
    "hospital wait times",
    "new metro line",
];

const JITTER_DEGREES: f64 = 0.3;

/// `count` deterministic events around a fixed set of cities. About one in
/// twenty has an unusable location.
pub fn generate(count: usize, seed: u64) -> Vec<SentimentEvent> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let now = Utc::now();

    (0..count)
        .map(|index| {
            let (city, lat, lng) = CITIES[rng.gen_range(0..CITIES.len())];
            let topic = TOPICS[rng.gen_range(0..TOPICS.len())];

            let sentiment = match rng.gen_range(0..3) {
                0 => Sentiment::Positive,
                1 => Sentiment::Negative,
                _ => Sentiment::Neutral,
            };
            let score = match sentiment {
                Sentiment::Positive => rng.gen_range(0.3..=1.0),
                Sentiment::Negative => rng.gen_range(-1.0..=-0.3),
                Sentiment::Neutral => rng.gen_range(-0.3..0.3),
            };

            let location = if rng.gen_bool(0.05) {
                if rng.gen_bool(0.5) {
                    None
                } else {
                    Some(GeoPoint::new(f64::NAN, lng))
                }
            } else {
                Some(GeoPoint::new(
                    lat + rng.gen_range(-JITTER_DEGREES..JITTER_DEGREES),
                    lng + rng.gen_range(-JITTER_DEGREES..JITTER_DEGREES),
                ))
            };

            let hotness = rng.gen_bool(0.9).then(|| f64::from(rng.gen_range(1..=10u8)));
            let minutes_ago = rng.gen_range(0..7 * 24 * 60);
            let source = SOURCES[rng.gen_range(0..SOURCES.len())];

            SentimentEvent {
                id: format!("evt-{index:05}"),
                title: format!("{city}: {topic}"),
                sentiment,
                score,
                location,
                hotness,
                address: Some(format!("{city}, China")),
                source: Some(source.to_string()),
                timestamp: Some((now - Duration::minutes(minutes_ago)).to_rfc3339()),
                tags: vec![topic.to_string(), sentiment.label().to_string()],
            }
        })
        .collect()
}
