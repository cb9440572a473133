use crate::model::FeatureSet;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::{debug, info};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = ".ganttline";
const FEATURES_FILE: &str = "features.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureScope {
    Project,
    Global,
}

#[derive(Debug, Clone)]
pub struct FeatureLocation {
    pub path: PathBuf,
    pub scope: FeatureScope,
}

impl FeatureScope {
    pub fn label(&self) -> &'static str {
        match self {
            FeatureScope::Project => "project",
            FeatureScope::Global => "global",
        }
    }
}

pub fn init_project_features(name: Option<String>) -> Result<FeatureLocation> {
    let cwd = env::current_dir()?;
    let dir = cwd.join(PROJECT_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {PROJECT_DIR} directory"))?;
    let location = FeatureLocation {
        path: dir.join(FEATURES_FILE),
        scope: FeatureScope::Project,
    };
    if !location.path.exists() {
        let set_name = name.unwrap_or_else(|| dir_name(&cwd, "project"));
        save_features(&location, &FeatureSet::named(set_name))?;
        info!("created {}", location.path.display());
    }
    Ok(location)
}

pub fn locate_features(start: &Path) -> Result<FeatureLocation> {
    if let Some(project_path) = find_project_features(start) {
        return Ok(FeatureLocation {
            path: project_path,
            scope: FeatureScope::Project,
        });
    }
    Ok(FeatureLocation {
        path: global_features_path()?,
        scope: FeatureScope::Global,
    })
}

/// Loads the set, creating an empty one on first use.
pub fn load_features(location: &FeatureLocation) -> Result<FeatureSet> {
    if location.path.exists() {
        let data = fs::read_to_string(&location.path)
            .with_context(|| format!("reading {:?}", location.path))?;
        let set: FeatureSet = serde_yaml::from_str(&data).context("parsing features file")?;
        debug!(
            "loaded {} features from {}",
            set.features.len(),
            location.path.display()
        );
        Ok(set)
    } else {
        let fallback_name = match location.scope {
            FeatureScope::Project => location
                .path
                .parent()
                .and_then(|p| p.parent())
                .map(|p| dir_name(p, "project"))
                .unwrap_or_else(|| "project".to_string()),
            FeatureScope::Global => "default".to_string(),
        };
        let set = FeatureSet::named(fallback_name);
        save_features(location, &set)?;
        Ok(set)
    }
}

pub fn save_features(location: &FeatureLocation, set: &FeatureSet) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(set).context("serializing features")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    debug!("saved {} features", set.features.len());
    Ok(())
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "ganttline").context("locating data directory")
}

fn find_project_features(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR).join(FEATURES_FILE))
        .find(|candidate| candidate.exists())
}

fn global_features_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join(FEATURES_FILE))
}

fn dir_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fallback)
        .to_string()
}
