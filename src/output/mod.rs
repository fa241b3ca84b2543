use crate::error::Error;
use crate::session::Session;
use askama::Template;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

pub const REPORT_FILE: &str = "research_report.html";

/// Characters that cannot appear in a file name on common platforms.
const UNSAFE_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Download name for a topic's text result: spaces become underscores.
///
/// Path separators, characters invalid in file names and `..` runs are also
/// replaced, so the name always stays a single component of the output dir.
pub fn download_file_name(topic: &str) -> String {
    let mut stem: String = topic
        .trim()
        .chars()
        .map(|c| {
            if c == ' ' || c.is_control() || UNSAFE_FILE_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    while stem.contains("..") {
        stem = stem.replace("..", "_");
    }
    format!("research_{stem}.txt")
}

/// Up to `limit` image files directly inside `dir`, most recently modified first.
///
/// A missing or unreadable directory yields an empty list.
pub fn latest_images(dir: &Path, limit: usize) -> Vec<PathBuf> {
    let mut images: Vec<(SystemTime, PathBuf)> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image(e.path()))
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((modified, e.into_path()))
        })
        .collect();
    images.sort_by(|a, b| b.0.cmp(&a.0));
    images.into_iter().take(limit).map(|(_, p)| p).collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// A generated image offered for download. Problems reading or copying it are
/// kept on the asset instead of failing the whole page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAsset {
    pub source: PathBuf,
    pub file_name: String,
    pub size: u64,
    #[serde(default)]
    pub error: Option<String>,
}

/// Copy the newest images from `images_dir` into `dest`.
pub fn collect_images(images_dir: &Path, dest: &Path, limit: usize) -> Vec<ImageAsset> {
    latest_images(images_dir, limit)
        .into_iter()
        .map(|source| {
            let file_name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match std::fs::copy(&source, dest.join(&file_name)) {
                Ok(size) => {
                    info!(image = %file_name, size, "image collected");
                    ImageAsset {
                        source,
                        file_name,
                        size,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(image = %file_name, error = %e, "could not copy image");
                    ImageAsset {
                        source,
                        file_name,
                        size: 0,
                        error: Some(format!("Error loading image: {e}")),
                    }
                }
            }
        })
        .collect()
}

#[derive(Template)]
#[template(path = "research_report.html")]
struct ResearchReport<'a> {
    topic: &'a str,
    generated_at: String,
    strategy: String,
    provider: String,
    result: &'a str,
    download_name: String,
    images: Vec<ImageView>,
    image_count: usize,
}

#[allow(dead_code)] // fields used by Askama template
struct ImageView {
    file_name: String,
    size_fmt: String,
    has_error: bool,
    error: String,
}

fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= 1 << 20 => format!("{:.1} MB", b as f64 / (1 << 20) as f64),
        b if b >= 1 << 10 => format!("{:.1} KB", b as f64 / (1 << 10) as f64),
        b => format!("{b} B"),
    }
}

pub fn render_report(session: &Session) -> anyhow::Result<String> {
    let images: Vec<ImageView> = session
        .images
        .iter()
        .map(|img| ImageView {
            file_name: img.file_name.clone(),
            size_fmt: format_size(img.size),
            has_error: img.error.is_some(),
            error: img.error.clone().unwrap_or_default(),
        })
        .collect();

    let report = ResearchReport {
        topic: &session.topic,
        generated_at: session
            .completed_at
            .format("%Y-%m-%d %H:%M UTC")
            .to_string(),
        strategy: session.strategy.to_string(),
        provider: session.provider.clone().unwrap_or_else(|| "unknown".into()),
        result: &session.result,
        download_name: download_file_name(&session.topic),
        image_count: images.len(),
        images,
    };

    Ok(report
        .render()
        .map_err(|e| Error::Template(e.to_string()))?)
}

/// Files written for one completed run.
#[derive(Debug, Clone)]
pub struct WrittenOutputs {
    pub text: PathBuf,
    pub report: PathBuf,
}

/// Write the downloadable text result and the HTML page into `dir`.
pub fn write_outputs(dir: &Path, session: &Session) -> anyhow::Result<WrittenOutputs> {
    std::fs::create_dir_all(dir)?;

    let text = dir.join(download_file_name(&session.topic));
    std::fs::write(&text, &session.result)?;

    let report = dir.join(REPORT_FILE);
    std::fs::write(&report, render_report(session)?)?;

    info!(text = %text.display(), report = %report.display(), "outputs written");
    Ok(WrittenOutputs { text, report })
}
