use crate::config::Config;
use crate::context::{timeline_start_for, GanttProvider, ProviderProps};
use crate::item::BarGeometry;
use crate::model::{Feature, FeatureGroup, FeatureSet, Metadata, Range};
use crate::offset::{self, OffsetParams};
use crate::section;
use crate::storage::{
    init_project_features, load_features, locate_features, save_features, FeatureLocation,
};
use crate::ui;
use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use log::info;
use rand::{distributions::Alphanumeric, Rng};
use std::env;

pub fn init(name: Option<String>) -> Result<()> {
    let location = init_project_features(name)?;
    println!("Initialized features at {}", location.path.display());
    Ok(())
}

pub fn list(config: &Config, group: Option<String>) -> Result<()> {
    let (set, location) = load_current_features()?;
    println!("Features: {} ({})", set.name, location.scope.label());
    let groups = set.groups();
    if !groups.is_empty() {
        println!("Groups: {}", groups.join(", "));
    }
    let mut provider = GanttProvider::new();
    provider.mount(today(), provider_props(config, config.range, config.zoom))?;
    let ctx = provider.use_gantt()?;
    println!(
        "Window: {} months from {} ({}, zoom {}%)",
        ctx.timeline_data().len(),
        ctx.timeline_start(),
        ctx.range(),
        ctx.zoom()
    );
    let shown: Vec<&Feature> = set
        .features
        .iter()
        .filter(|f| match &group {
            Some(wanted) => f.group_label() == Some(wanted.as_str()),
            None => true,
        })
        .collect();
    if shown.is_empty() {
        println!("  (empty)");
    }
    for feature in shown {
        let bar = BarGeometry::for_feature(ctx, feature);
        println!(
            "  - {}: {} [{} .. {}] left {:.1} width {:.1}",
            feature.id,
            feature.name,
            feature.start_at,
            feature
                .end_at
                .map(|d| d.to_string())
                .unwrap_or_else(|| "open".to_string()),
            bar.left,
            bar.width
        );
        if let Some(group) = feature.group_label() {
            println!("    group: {}", group);
        }
        for (key, value) in &feature.metadata {
            println!("    {}: {}", key, format_value(value));
        }
    }
    Ok(())
}

pub fn add(
    name: String,
    start: String,
    end: Option<String>,
    group: Option<String>,
    weight: Option<f64>,
    meta: Vec<String>,
) -> Result<()> {
    let (mut set, location) = load_current_features()?;
    let feature = build_feature(
        generate_id(),
        name,
        parse_date(&start)?,
        end.as_deref().map(parse_date).transpose()?,
        group,
        weight,
        parse_metadata(&meta)?,
    );
    let id = feature.id.clone();
    set.add(feature).context("adding feature")?;
    save_features(&location, &set)?;
    info!("added feature {}", id);
    println!("Added feature {}", id);
    Ok(())
}

fn build_feature(
    id: String,
    name: String,
    start_at: NaiveDate,
    end_at: Option<NaiveDate>,
    group: Option<String>,
    weight: Option<f64>,
    metadata: Metadata,
) -> Feature {
    let mut feature = Feature::new(id, name, start_at);
    if let Some(end_at) = end_at {
        feature = feature.with_end(end_at);
    }
    if let Some(group) = group {
        feature = feature.with_group(FeatureGroup::Label(group));
    }
    if let Some(weight) = weight {
        feature = feature.with_weight(weight);
    }
    feature.metadata = metadata;
    feature
}

pub fn move_feature(feature_id: String, start: String, end: Option<String>) -> Result<()> {
    let (mut set, location) = load_current_features()?;
    let start_at = parse_date(&start)?;
    let end_at = match end {
        Some(raw) => Some(parse_date(&raw)?),
        None => {
            let current = set
                .find(&feature_id)
                .ok_or_else(|| anyhow!("feature {} not found", feature_id))?;
            let shift = start_at - current.start_at;
            current.end_at.and_then(|e| e.checked_add_signed(shift))
        }
    };
    set.move_feature(&feature_id, start_at, end_at)
        .with_context(|| format!("moving feature {}", feature_id))?;
    save_features(&location, &set)?;
    println!("Moved feature {} to {}", feature_id, start_at);
    Ok(())
}

pub fn offset(
    config: &Config,
    date: String,
    range: Option<String>,
    zoom: Option<u32>,
    origin: Option<String>,
) -> Result<()> {
    let date = parse_date(&date)?;
    let range = parse_range(range.as_deref(), config.range)?;
    let origin = match origin {
        Some(raw) => parse_date(&raw)?,
        None => timeline_start_for(today()),
    };
    let params = OffsetParams {
        range,
        zoom: zoom.unwrap_or(config.zoom) as f64,
        column_width: config.layout.column_width,
    };
    let x = offset::offset(date, origin, params);
    println!(
        "{} from origin {} ({}, zoom {}%): {:.4} ({:.4} columns)",
        date,
        origin,
        range,
        params.zoom,
        x,
        x / (params.column_width * params.zoom / 100.0)
    );
    Ok(())
}

pub fn buckets(config: &Config) -> Result<()> {
    let (set, _) = load_current_features()?;
    let (thresholds, ranked) = section::rank(&set.features, config.weight_key.as_deref());
    println!(
        "p25 {:.2}  p50 {:.2}  p75 {:.2}",
        thresholds.p25, thresholds.p50, thresholds.p75
    );
    for entry in ranked {
        println!(
            "  - {:<8} {:>8.2}  {}",
            entry.bucket.label(),
            entry.weight,
            entry.feature.name
        );
    }
    Ok(())
}

pub fn tui(config: &Config, range: Option<String>, zoom: Option<u32>) -> Result<()> {
    let range = parse_range(range.as_deref(), config.range)?;
    let props = provider_props(config, range, zoom.unwrap_or(config.zoom));
    let (set, location) = load_current_features()?;
    ui::run(set, location, config.clone(), props)
}

fn provider_props(config: &Config, range: Range, zoom: u32) -> ProviderProps {
    ProviderProps {
        range,
        zoom,
        layout: config.layout,
        accepts_new_items: true,
    }
}

fn load_current_features() -> Result<(FeatureSet, FeatureLocation)> {
    let cwd = env::current_dir()?;
    let location = locate_features(&cwd)?;
    let set = load_features(&location)?;
    Ok((set, location))
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn parse_range(raw: Option<&str>, fallback: Range) -> Result<Range> {
    match raw {
        Some(r) => Ok(r.parse::<Range>()?),
        None => Ok(fallback),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date format (use YYYY-MM-DD): {}", raw))
}

fn parse_metadata(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("metadata must be key=value: {}", pair))?;
        // numbers stay numbers so they can serve as weights
        let value: serde_yaml::Value = serde_yaml::from_str(value.trim())
            .unwrap_or_else(|_| serde_yaml::Value::from(value.trim()));
        metadata.insert(key.trim().to_string(), value);
    }
    Ok(metadata)
}

fn format_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_in_iso_format() {
        assert_eq!(
            parse_date(" 2024-07-15 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
        );
        assert!(parse_date("15/07/2024").is_err());
    }

    #[test]
    fn metadata_pairs_keep_numbers_numeric() {
        let meta = parse_metadata(&["renders=12".into(), "sport = Rugby Union".into()]).unwrap();
        assert_eq!(meta.get("renders"), Some(&serde_yaml::Value::from(12)));
        assert_eq!(
            meta.get("sport"),
            Some(&serde_yaml::Value::from("Rugby Union"))
        );
        assert!(parse_metadata(&["oops".into()]).is_err());
    }

    #[test]
    fn added_features_carry_every_optional_field() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 20).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
        let meta = parse_metadata(&["renders=48".into()]).unwrap();
        let feature = build_feature(
            "rwc".into(),
            "Rugby Championship".into(),
            start,
            Some(end),
            Some("Rugby".into()),
            Some(4.5),
            meta,
        );
        assert_eq!(feature.end_at, Some(end));
        assert_eq!(feature.group_label(), Some("Rugby"));
        assert_eq!(feature.weight, Some(4.5));
        assert_eq!(feature.metadata.len(), 1);

        let bare = build_feature(
            "x".into(),
            "Open".into(),
            start,
            None,
            None,
            None,
            Metadata::new(),
        );
        assert_eq!(bare.end_at, None);
        assert!(bare.group.is_none());
        assert!(bare.weight.is_none());
    }

    #[test]
    fn ids_are_six_alphanumerics() {
        let id = generate_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
