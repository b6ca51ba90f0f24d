use crate::config::Config;
use crate::services::FootageFinder;
use crate::timeline::{FootageSegment, TimedQuery};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const PEXELS_SEARCH: &str = "https://api.pexels.com/videos/search";
const PER_PAGE: &str = "15";
const TARGET_WIDTH: i64 = 1920;
const TARGET_HEIGHT: i64 = 1080;

#[derive(Debug, Deserialize)]
pub struct VideoFile {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub videos: Vec<Video>,
}

fn closest_file(video: &Video) -> Option<&VideoFile> {
    video
        .video_files
        .iter()
        .filter(|f| !f.link.is_empty())
        .min_by_key(|f| {
            let w = f.width.unwrap_or(0);
            let h = f.height.unwrap_or(0);
            (w - TARGET_WIDTH).abs() + (h - TARGET_HEIGHT).abs()
        })
}

/// First video in search order whose best-sized file has not been used yet.
pub fn pick_link(response: &SearchResponse, used: &HashSet<String>) -> Option<String> {
    response
        .videos
        .iter()
        .filter_map(closest_file)
        .map(|f| f.link.clone())
        .find(|link| !used.contains(link))
}

pub struct PexelsFinder {
    client: Client,
    api_key: String,
}

impl PexelsFinder {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.pexels_key.clone(),
        }
    }

    async fn search(&self, keyword: &str) -> Result<SearchResponse> {
        let resp = self
            .client
            .get(PEXELS_SEARCH)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", keyword),
                ("orientation", "landscape"),
                ("per_page", PER_PAGE),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .context("Pexels request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Pexels search HTTP {}", resp.status().as_u16());
        }
        resp.json::<SearchResponse>()
            .await
            .context("Pexels response parse failed")
    }
}

#[async_trait]
impl FootageFinder for PexelsFinder {
    async fn find(&self, queries: &[TimedQuery]) -> Result<Vec<FootageSegment>> {
        let mut used = HashSet::new();
        let mut segments = Vec::with_capacity(queries.len());

        for query in queries {
            let mut url = None;
            for keyword in &query.keywords {
                match self.search(keyword).await {
                    Ok(response) => {
                        if let Some(link) = pick_link(&response, &used) {
                            logi(format!("Footage for '{keyword}': {link}"));
                            used.insert(link.clone());
                            url = Some(link);
                            break;
                        }
                    }
                    Err(err) => logw(format!("Footage search failed for '{keyword}': {err:#}")),
                }
            }
            if url.is_none() {
                logw(format!(
                    "No footage for {:.2}-{:.2}s",
                    query.interval.start, query.interval.end
                ));
            }
            segments.push(FootageSegment {
                interval: query.interval,
                url,
            });
        }

        let resolved = segments.iter().filter(|s| s.is_resolved()).count();
        logok(format!("Footage resolved for {resolved}/{} intervals", segments.len()));
        Ok(segments)
    }
}
