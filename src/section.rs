use crate::buckets::{WeightBucket, WeightThresholds};
use crate::model::Feature;

/// A feature as a timeline section hands it over: with its weight resolved
/// and bucketed against the rest of the set.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFeature {
    pub feature: Feature,
    pub weight: f64,
    pub bucket: WeightBucket,
}

/// The weight of a feature: its own `weight`, else the numeric metadata entry
/// named by `weight_key` (e.g. a render count), else zero.
pub fn weight_of(feature: &Feature, weight_key: Option<&str>) -> f64 {
    feature
        .weight
        .or_else(|| {
            weight_key
                .and_then(|key| feature.metadata.get(key))
                .and_then(serde_yaml::Value::as_f64)
        })
        .unwrap_or(0.0)
}

/// Ranks features by weight quartile and orders them by group, then start
/// date, so grouped features sit together in the sidebar.
pub fn rank(features: &[Feature], weight_key: Option<&str>) -> (WeightThresholds, Vec<RankedFeature>) {
    let weights: Vec<f64> = features.iter().map(|f| weight_of(f, weight_key)).collect();
    let thresholds = WeightThresholds::from_weights(&weights);
    let mut ranked: Vec<RankedFeature> = features
        .iter()
        .zip(weights)
        .map(|(feature, weight)| RankedFeature {
            feature: feature.clone(),
            weight,
            bucket: thresholds.bucket(weight),
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.feature
            .group_label()
            .cmp(&b.feature.group_label())
            .then(a.feature.start_at.cmp(&b.feature.start_at))
            .then_with(|| a.feature.name.cmp(&b.feature.name))
    });
    (thresholds, ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureGroup;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn competition(id: &str, sport: &str, start: NaiveDate, renders: i64) -> Feature {
        let mut feature = Feature::new(id.into(), id.to_uppercase(), start)
            .with_group(FeatureGroup::Label(sport.into()));
        feature
            .metadata
            .insert("renders".into(), serde_yaml::Value::from(renders));
        feature
    }

    #[test]
    fn weight_falls_back_to_metadata() {
        let feature = competition("a", "Golf", date(2024, 7, 1), 12);
        assert_eq!(weight_of(&feature, Some("renders")), 12.0);
        assert_eq!(weight_of(&feature, None), 0.0);
        assert_eq!(weight_of(&feature.clone().with_weight(3.0), Some("renders")), 3.0);
    }

    #[test]
    fn ranking_buckets_and_groups() {
        let features = vec![
            competition("d", "Tennis", date(2024, 9, 1), 40),
            competition("a", "Golf", date(2024, 8, 1), 10),
            competition("b", "Tennis", date(2024, 7, 1), 30),
            competition("c", "Golf", date(2024, 6, 1), 20),
            competition("e", "Golf", date(2024, 6, 1), 50),
        ];
        let (thresholds, ranked) = rank(&features, Some("renders"));
        assert_eq!(thresholds.p50, 30.0);
        let order: Vec<&str> = ranked.iter().map(|r| r.feature.id.as_str()).collect();
        assert_eq!(order, vec!["c", "e", "a", "b", "d"]);
        let e = ranked.iter().find(|r| r.feature.id == "e").unwrap();
        assert_eq!(e.bucket, WeightBucket::High);
        let a = ranked.iter().find(|r| r.feature.id == "a").unwrap();
        assert_eq!(a.bucket, WeightBucket::Low);
    }
}
