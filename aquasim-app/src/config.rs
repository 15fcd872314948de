use anyhow::{Context, Result};
use aquasim_schemas::{
    feed::{self, Feed, FeedPolicy},
    file_formats::{FeedFile, ModelFile, SiteLayoutFile, TemperatureFile},
    infrastructure::SiteLayout,
    models::{self, ModelSet},
    temperature::{self, TemperatureProfile},
};
use std::{collections::HashMap, fs, path::Path};

/// A container for all the static data loaded from YAML files.
/// This represents the complete "knowledge base" for a simulation run.
pub struct KnowledgeBase {
    pub site_layout: SiteLayout,
    pub feeds: Vec<Feed>,
    pub feed_policy: FeedPolicy,
    pub models_by_geography: HashMap<String, ModelSet>,
    pub temperature_by_geography: HashMap<String, TemperatureProfile>,
}

impl KnowledgeBase {
    /// Loads all data from the specified base directory.
    pub fn load(base_path: &Path) -> Result<Self> {
        println!("Loading knowledge base from '{}'...", base_path.display());

        let layout_file: SiteLayoutFile = load_yaml(&base_path.join("site_layout.yaml"))?;
        let feed_file: FeedFile = load_yaml(&base_path.join("feeds.yaml"))?;
        let model_file: ModelFile = load_yaml(&base_path.join("models.yaml"))?;
        let temperature_file: TemperatureFile = load_yaml(&base_path.join("temperature.yaml"))?;

        let mut models_by_geography = HashMap::new();
        for tgc in model_file.tgc_models {
            let geography_id = tgc.key.geography_id.clone();
            let fcr = model_file
                .fcr_models
                .iter()
                .find(|m| m.key == tgc.key)
                .cloned()
                .with_context(|| format!("no FCR model paired with '{}'", tgc.model_id))?;
            let mortality = model_file
                .mortality_models
                .iter()
                .find(|m| m.key == tgc.key)
                .cloned()
                .with_context(|| format!("no mortality model paired with '{}'", tgc.model_id))?;
            models_by_geography.insert(
                geography_id,
                ModelSet {
                    tgc,
                    fcr,
                    mortality,
                },
            );
        }

        let temperature_by_geography = temperature_file
            .profiles
            .into_iter()
            .map(|p| (p.geography_id.clone(), p))
            .collect();

        println!("Knowledge base loaded successfully.");
        Ok(Self {
            site_layout: layout_file.site_layout,
            feeds: feed_file.feeds,
            feed_policy: feed_file.feed_policy,
            models_by_geography,
            temperature_by_geography,
        })
    }

    /// The built-in knowledge base used when no data directory is given:
    /// the default estate, feeds, models and temperature profiles.
    pub fn builtin() -> Self {
        let mut models_by_geography = HashMap::new();
        let mut temperature_by_geography = HashMap::new();
        for profile in temperature::default_profiles() {
            models_by_geography.insert(
                profile.geography_id.clone(),
                models::default_model_set(&profile.geography_id),
            );
            temperature_by_geography.insert(profile.geography_id.clone(), profile);
        }
        Self {
            site_layout: SiteLayout::default(),
            feeds: feed::default_feeds(),
            feed_policy: FeedPolicy::default(),
            models_by_geography,
            temperature_by_geography,
        }
    }
}

fn load_yaml<T: for<'de> serde::Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_knowledge_base_covers_both_geographies() {
        let kb = KnowledgeBase::builtin();
        assert!(kb.models_by_geography.contains_key("FO"));
        assert!(kb.models_by_geography.contains_key("SC"));
        assert!(kb.temperature_by_geography.contains_key("FO"));
        assert_eq!(kb.feeds.len(), 5);
        assert_eq!(kb.site_layout.geographies.len(), 2);
    }
}
