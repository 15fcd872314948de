use crate::{
    feed::{Feed, FeedPolicy},
    infrastructure::SiteLayout,
    models::{FcrModel, MortalityModel, TgcModel},
    temperature::TemperatureProfile,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SiteLayoutFile {
    pub schema_version: String,
    pub site_layout: SiteLayout,
}

#[derive(Debug, Deserialize)]
pub struct FeedFile {
    pub schema_version: String,
    pub feeds: Vec<Feed>,
    pub feed_policy: FeedPolicy,
}

#[derive(Debug, Deserialize)]
pub struct ModelFile {
    pub schema_version: String,
    pub tgc_models: Vec<TgcModel>,
    pub fcr_models: Vec<FcrModel>,
    pub mortality_models: Vec<MortalityModel>,
}

#[derive(Debug, Deserialize)]
pub struct TemperatureFile {
    pub schema_version: String,
    pub profiles: Vec<TemperatureProfile>,
}
