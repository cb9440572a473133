use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type FeatureId = String;

/// Caller-owned extension keys (counts, season, sport, ...). Carried through
/// untouched.
pub type Metadata = BTreeMap<String, serde_yaml::Value>;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FeatureSet {
    pub name: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// A single timeline bar.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    pub start_at: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<FeatureGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FeatureGroup {
    Label(String),
    Named { id: String, name: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GanttError {
    #[error("feature not found: {0}")]
    FeatureNotFound(String),
    #[error("feature already exists: {0}")]
    DuplicateFeature(String),
    #[error("timeline context used outside of a mounted provider")]
    NoProvider,
    #[error("zoom must be a positive percentage, got {0}")]
    InvalidZoom(u32),
    #[error("unknown range: {0}")]
    UnknownRange(String),
}

impl FeatureSet {
    pub fn named(name: impl Into<String>) -> Self {
        FeatureSet {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Feature> {
        self.features.iter_mut().find(|f| f.id == id)
    }

    pub fn add(&mut self, feature: Feature) -> Result<(), GanttError> {
        if self.find(&feature.id).is_some() {
            return Err(GanttError::DuplicateFeature(feature.id));
        }
        self.features.push(feature);
        Ok(())
    }

    /// Applies a resolved drag (or CLI move): both edges are replaced.
    pub fn move_feature(
        &mut self,
        id: &str,
        start_at: NaiveDate,
        end_at: Option<NaiveDate>,
    ) -> Result<(), GanttError> {
        let feature = self
            .find_mut(id)
            .ok_or_else(|| GanttError::FeatureNotFound(id.to_string()))?;
        feature.start_at = start_at;
        feature.end_at = end_at;
        Ok(())
    }

    /// Distinct group labels in first-seen order.
    pub fn groups(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for label in self
            .features
            .iter()
            .filter_map(|f| f.group.as_ref().map(|g| g.label().to_string()))
        {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }
}

impl Feature {
    pub fn new(id: FeatureId, name: String, start_at: NaiveDate) -> Self {
        Feature {
            id,
            name,
            start_at,
            end_at: None,
            group: None,
            weight: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_end(mut self, end_at: NaiveDate) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn with_group(mut self, group: FeatureGroup) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn group_label(&self) -> Option<&str> {
        self.group.as_ref().map(FeatureGroup::label)
    }
}

impl FeatureGroup {
    pub fn label(&self) -> &str {
        match self {
            FeatureGroup::Label(label) => label,
            FeatureGroup::Named { name, .. } => name,
        }
    }
}

impl Range {
    pub const ALL: [Range; 5] = [
        Range::Daily,
        Range::Weekly,
        Range::Monthly,
        Range::Quarterly,
        Range::Yearly,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Range::Daily => "daily",
            Range::Weekly => "weekly",
            Range::Monthly => "monthly",
            Range::Quarterly => "quarterly",
            Range::Yearly => "yearly",
        }
    }

    pub fn next(&self) -> Range {
        match self {
            Range::Daily => Range::Weekly,
            Range::Weekly => Range::Monthly,
            Range::Monthly => Range::Quarterly,
            Range::Quarterly => Range::Yearly,
            Range::Yearly => Range::Daily,
        }
    }

    pub fn prev(&self) -> Range {
        match self {
            Range::Daily => Range::Yearly,
            Range::Weekly => Range::Daily,
            Range::Monthly => Range::Weekly,
            Range::Quarterly => Range::Monthly,
            Range::Yearly => Range::Quarterly,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Range {
    type Err = GanttError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Range::ALL
            .into_iter()
            .find(|r| r.label() == wanted)
            .ok_or_else(|| GanttError::UnknownRange(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unknown_keys_land_in_metadata() {
        let yaml = r#"
name: Spring fixtures
features:
  - id: c1
    name: Premier League
    start_at: 2024-08-16
    end_at: 2025-05-25
    group: { id: football, name: Football }
    weight: 80
    season: 2024/25
    renders: 112
  - id: c2
    name: Ashes
    start_at: 2024-11-21
    group: Cricket
"#;
        let set: FeatureSet = serde_yaml::from_str(yaml).unwrap();
        let first = &set.features[0];
        assert_eq!(first.group_label(), Some("Football"));
        assert_eq!(first.weight, Some(80.0));
        assert_eq!(
            first.metadata.get("renders"),
            Some(&serde_yaml::Value::from(112))
        );
        assert!(first.metadata.contains_key("season"));
        assert!(!first.metadata.contains_key("weight"));
        assert_eq!(set.features[1].end_at, None);
        assert_eq!(set.features[1].group_label(), Some("Cricket"));

        let back = serde_yaml::to_string(&set).unwrap();
        let again: FeatureSet = serde_yaml::from_str(&back).unwrap();
        assert_eq!(again.features, set.features);
    }

    #[test]
    fn move_feature_replaces_both_edges() {
        let mut set = FeatureSet::named("test");
        set.add(Feature::new("a".into(), "A".into(), date(2024, 6, 1)).with_end(date(2024, 6, 10)))
            .unwrap();
        set.move_feature("a", date(2024, 7, 1), Some(date(2024, 7, 10)))
            .unwrap();
        let a = set.find("a").unwrap();
        assert_eq!(a.start_at, date(2024, 7, 1));
        assert_eq!(a.end_at, Some(date(2024, 7, 10)));
        assert_eq!(
            set.move_feature("missing", date(2024, 7, 1), None),
            Err(GanttError::FeatureNotFound("missing".into()))
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut set = FeatureSet::named("test");
        set.add(Feature::new("a".into(), "A".into(), date(2024, 6, 1)))
            .unwrap();
        let err = set
            .add(Feature::new("a".into(), "Again".into(), date(2024, 6, 2)))
            .unwrap_err();
        assert_eq!(err, GanttError::DuplicateFeature("a".into()));
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let mut set = FeatureSet::named("test");
        for (id, group) in [("a", "Tennis"), ("b", "Golf"), ("c", "Tennis")] {
            set.add(
                Feature::new(id.into(), id.into(), date(2024, 6, 1))
                    .with_group(FeatureGroup::Label(group.into())),
            )
            .unwrap();
        }
        assert_eq!(set.groups(), vec!["Tennis".to_string(), "Golf".to_string()]);
    }

    #[test]
    fn range_parses_and_cycles() {
        assert_eq!("Quarterly".parse::<Range>(), Ok(Range::Quarterly));
        assert!("hourly".parse::<Range>().is_err());
        let mut range = Range::Monthly;
        for _ in 0..Range::ALL.len() {
            range = range.next();
        }
        assert_eq!(range, Range::Monthly);
        assert_eq!(Range::Daily.prev(), Range::Yearly);
    }
}
