use crate::extract::Strategy;
use crate::output::ImageAsset;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.json";

/// The last completed research run, as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub topic: String,
    pub result: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub provider: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl Session {
    fn path(dir: &Path) -> PathBuf {
        dir.join(SESSION_FILE)
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path(dir);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path(dir);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("no stored session at {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

/// One record per `run`, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistory {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub success: bool,
    pub timed_out: bool,
    pub strategy: Option<Strategy>,
    pub duration_secs: f64,
    pub image_count: usize,
    pub error: Option<String>,
}

impl RunHistory {
    pub fn new(topic: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            topic: topic.into(),
            success: false,
            timed_out: false,
            strategy: None,
            duration_secs: 0.0,
            image_count: 0,
            error: None,
        }
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let dir = dir.join("history");
        std::fs::create_dir_all(&dir)?;
        let filename = format!("{}.json", self.timestamp.format("%Y%m%dT%H%M%S%.3f"));
        let path = dir.join(filename);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// All stored records, oldest first.
    pub fn load_all(dir: &Path) -> Vec<Self> {
        let Ok(entries) = std::fs::read_dir(dir.join("history")) else {
            return Vec::new();
        };
        let mut records: Vec<Self> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
            .filter_map(|e| std::fs::read_to_string(e.path()).ok())
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect();
        records.sort_by_key(|r| r.timestamp);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session {
            topic: "photosynthesis".into(),
            result: "Plants make sugar.".into(),
            strategy: Strategy::LabeledSection,
            images: Vec::new(),
            provider: None,
            completed_at: Utc::now(),
        };
        let path = session.save(dir.path()).unwrap();
        assert!(path.ends_with("session.json"));

        let loaded = Session::load(dir.path()).unwrap();
        assert_eq!(loaded.topic, "photosynthesis");
        assert_eq!(loaded.strategy, Strategy::LabeledSection);
    }

    #[test]
    fn loading_without_a_session_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Session::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no stored session"));
    }

    #[test]
    fn history_records_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = RunHistory::new("tides");
        first.error = Some("Research timed out after 300 seconds".into());
        first.timed_out = true;
        first.save(dir.path()).unwrap();

        let mut second = RunHistory::new("tides");
        second.timestamp = first.timestamp + chrono::Duration::seconds(5);
        second.success = true;
        second.strategy = Some(Strategy::Marker);
        second.save(dir.path()).unwrap();

        let all = RunHistory::load_all(dir.path());
        assert_eq!(all.len(), 2);
        assert!(all[0].timed_out);
        assert!(all[1].success);
    }
}
