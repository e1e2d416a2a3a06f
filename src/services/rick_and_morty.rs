//! Rick and Morty API: characters, locations, episodes.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RickAndMortyConfig;
use crate::resilience::ResilientCaller;
use crate::services::{DependencyHealth, ServiceContext};
use crate::upstream::{HttpExecutor, UpstreamAuth, UpstreamError, UpstreamRequest, UpstreamResult};

const STATUSES: [&str; 3] = ["alive", "dead", "unknown"];
const GENDERS: [&str; 4] = ["female", "male", "genderless", "unknown"];

/// Pagination block returned with every list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub count: u64,
    pub pages: u64,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub info: PageInfo,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: u64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub species: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub gender: Option<String>,
    pub origin: Option<serde_json::Value>,
    pub location: Option<serde_json::Value>,
    pub image: Option<String>,
    #[serde(default)]
    pub episode: Vec<String>,
    pub url: Option<String>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub dimension: Option<String>,
    #[serde(default)]
    pub residents: Vec<String>,
    pub url: Option<String>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    pub name: Option<String>,
    pub air_date: Option<String>,
    pub episode: Option<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    pub url: Option<String>,
    pub created: Option<String>,
}

/// `character/{ids}` answers with an object for one id and an array for several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacterLookup {
    One(Character),
    Many(Vec<Character>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CharacterFilter {
    pub name: Option<String>,
    pub status: Option<String>,
    pub species: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub gender: Option<String>,
    pub page: Option<u32>,
}

impl CharacterFilter {
    pub fn validate(&self) -> Result<(), String> {
        validate_page(self.page)?;
        validate_choice("status", self.status.as_deref(), &STATUSES)?;
        validate_choice("gender", self.gender.as_deref(), &GENDERS)
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        params([
            ("name", self.name.clone()),
            ("status", self.status.clone()),
            ("species", self.species.clone()),
            ("type", self.kind.clone()),
            ("gender", self.gender.clone()),
            ("page", self.page.map(|p| p.to_string())),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocationFilter {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub dimension: Option<String>,
    pub page: Option<u32>,
}

impl LocationFilter {
    pub fn validate(&self) -> Result<(), String> {
        validate_page(self.page)
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        params([
            ("name", self.name.clone()),
            ("type", self.kind.clone()),
            ("dimension", self.dimension.clone()),
            ("page", self.page.map(|p| p.to_string())),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EpisodeFilter {
    pub name: Option<String>,
    pub episode: Option<String>,
    pub page: Option<u32>,
}

impl EpisodeFilter {
    pub fn validate(&self) -> Result<(), String> {
        validate_page(self.page)
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        params([
            ("name", self.name.clone()),
            ("episode", self.episode.clone()),
            ("page", self.page.map(|p| p.to_string())),
        ])
    }
}

fn params<const N: usize>(pairs: [(&str, Option<String>); N]) -> Vec<(String, String)> {
    pairs
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
        .collect()
}

fn validate_page(page: Option<u32>) -> Result<(), String> {
    match page {
        Some(0) => Err("page must be at least 1".to_string()),
        _ => Ok(()),
    }
}

fn validate_choice(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<(), String> {
    match value {
        Some(v) if !allowed.contains(&v.to_ascii_lowercase().as_str()) => Err(format!(
            "Invalid {} '{}'. Expected one of: {}",
            field,
            v,
            allowed.join(", ")
        )),
        _ => Ok(()),
    }
}

/// `1` or `1,2,3`: positive integers, no blanks.
pub fn validate_ids(ids: &str) -> Result<(), String> {
    let valid = !ids.is_empty()
        && ids
            .split(',')
            .all(|id| id.trim().parse::<u64>().map(|n| n > 0).unwrap_or(false));
    if valid {
        Ok(())
    } else {
        Err(format!(
            "Invalid character ids '{}'. Expected a comma-separated list of positive integers",
            ids
        ))
    }
}

/// Client for the Rick and Morty API.
#[derive(Clone)]
pub struct RickAndMortyService {
    caller: ResilientCaller,
    base_url: String,
}

impl RickAndMortyService {
    pub const DEPENDENCY: &'static str = "rick_and_morty";

    pub fn new(config: &RickAndMortyConfig, ctx: &ServiceContext) -> Result<Self, url::ParseError> {
        let executor = HttpExecutor::new(Self::DEPENDENCY, &config.base_url, UpstreamAuth::None, ctx.pool.clone())?;

        tracing::info!(base_url = %config.base_url, "Rick and Morty service initialized");
        Ok(Self {
            caller: ctx.caller(Self::DEPENDENCY, Arc::new(executor), config.circuit),
            base_url: config.base_url.clone(),
        })
    }

    pub fn from_caller(caller: ResilientCaller, base_url: impl Into<String>) -> Self {
        Self {
            caller,
            base_url: base_url.into(),
        }
    }

    pub async fn characters(&self, filter: &CharacterFilter) -> UpstreamResult<Page<Character>> {
        filter.validate().map_err(invalid)?;
        self.fetch(UpstreamRequest::get("character"), filter.to_params()).await
    }

    pub async fn characters_by_ids(&self, ids: &str) -> UpstreamResult<CharacterLookup> {
        let ids = ids.trim();
        validate_ids(ids).map_err(invalid)?;
        let compact: String = ids.split(',').map(str::trim).collect::<Vec<_>>().join(",");
        self.fetch(UpstreamRequest::get("character/{ids}").path_param("ids", compact), Vec::new())
            .await
    }

    pub async fn locations(&self, filter: &LocationFilter) -> UpstreamResult<Page<Location>> {
        filter.validate().map_err(invalid)?;
        self.fetch(UpstreamRequest::get("location"), filter.to_params()).await
    }

    pub async fn episodes(&self, filter: &EpisodeFilter) -> UpstreamResult<Page<Episode>> {
        filter.validate().map_err(invalid)?;
        self.fetch(UpstreamRequest::get("episode"), filter.to_params()).await
    }

    pub async fn health_check(&self) -> DependencyHealth {
        let started = Instant::now();
        let result = self.caller.call(&UpstreamRequest::get("")).await;
        DependencyHealth::from_probe(Self::DEPENDENCY, &self.base_url, started, result)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        mut request: UpstreamRequest,
        params: Vec<(String, String)>,
    ) -> UpstreamResult<T> {
        for (name, value) in params {
            request = request.query(name, value);
        }
        tracing::info!(endpoint = %request.endpoint, params = ?request.query, "Fetching Rick and Morty data");
        let response = self.caller.call(&request).await?;
        response.parse(Self::DEPENDENCY)
    }
}

fn invalid(message: String) -> UpstreamError {
    UpstreamError::request_validation(RickAndMortyService::DEPENDENCY, message)
}
