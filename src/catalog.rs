//! Static recommendation data.
//!
//! The results step shows a fixed set of metric summaries and in-store product picks.
//! Nothing here looks at the captured image; the payload is an immutable lookup table
//! supplied by a `RecommendationSource`. `StaticCatalog::builtin()` carries the
//! default store payload; a TOML file can replace it per store.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub label: String,
    pub value: String,
    pub note: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecommendation {
    pub name: String,
    pub description: String,
    /// Where to find it in the store, e.g. "Haircare · Aisle 2".
    pub location: String,
    pub price: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Metrics and products shown on the results step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPayload {
    pub metrics: Vec<MetricSummary>,
    pub products: Vec<ProductRecommendation>,
}

/// Supplies the result payload once an analysis completes.
pub trait RecommendationSource: Send {
    fn name(&self) -> &str;

    fn payload(&self) -> Arc<ResultPayload>;
}

/// Fixed catalog, built in or loaded once from TOML.
pub struct StaticCatalog {
    origin: String,
    payload: Arc<ResultPayload>,
}

impl StaticCatalog {
    pub fn builtin() -> Self {
        Self {
            origin: "builtin".to_string(),
            payload: Arc::new(builtin_payload()),
        }
    }

    pub fn from_toml_str(origin: &str, raw: &str) -> Result<Self> {
        let payload: ResultPayload =
            toml::from_str(raw).map_err(|e| anyhow!("invalid catalog {}: {}", origin, e))?;
        validate(&payload).with_context(|| format!("invalid catalog {}", origin))?;
        Ok(Self {
            origin: origin.to_string(),
            payload: Arc::new(payload),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let catalog = Self::from_toml_str(&path.display().to_string(), &raw)?;
        log::info!(
            "catalog loaded from {}: {} metrics, {} products",
            path.display(),
            catalog.payload.metrics.len(),
            catalog.payload.products.len()
        );
        Ok(catalog)
    }
}

impl RecommendationSource for StaticCatalog {
    fn name(&self) -> &str {
        &self.origin
    }

    fn payload(&self) -> Arc<ResultPayload> {
        Arc::clone(&self.payload)
    }
}

fn validate(payload: &ResultPayload) -> Result<()> {
    if payload.metrics.is_empty() {
        return Err(anyhow!("catalog must define at least one metric"));
    }
    if payload.products.is_empty() {
        return Err(anyhow!("catalog must define at least one product"));
    }
    for metric in &payload.metrics {
        if metric.label.trim().is_empty() || metric.value.trim().is_empty() {
            return Err(anyhow!("metric entries need a label and a value"));
        }
    }
    for product in &payload.products {
        if product.name.trim().is_empty() {
            return Err(anyhow!("product entries need a name"));
        }
        if product.price.trim().is_empty() {
            return Err(anyhow!("product '{}' has no price", product.name));
        }
    }
    Ok(())
}

fn metric(label: &str, value: &str, note: &str) -> MetricSummary {
    MetricSummary {
        label: label.to_string(),
        value: value.to_string(),
        note: note.to_string(),
    }
}

fn product(
    name: &str,
    description: &str,
    location: &str,
    price: &str,
    tags: &[&str],
) -> ProductRecommendation {
    ProductRecommendation {
        name: name.to_string(),
        description: description.to_string(),
        location: location.to_string(),
        price: price.to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

fn builtin_payload() -> ResultPayload {
    ResultPayload {
        metrics: vec![
            metric(
                "Scalp hydration",
                "Slightly dry",
                "Recommend gentle, hydrating cleanser",
            ),
            metric(
                "Breakage risk",
                "Moderate on mid-lengths",
                "Strengthening & bonding care",
            ),
            metric(
                "Frizz & porosity",
                "High in humidity",
                "Oil-based serums + heat protection",
            ),
            metric(
                "Texture pattern",
                "Wavy 2B–2C",
                "Define waves without weighing down",
            ),
        ],
        products: vec![
            product(
                "HydraCalm Balancing Scalp Cleanser",
                "Gentle, sulfate-free wash that adds moisture.",
                "Haircare · Aisle 2",
                "$18",
                &["Shampoo", "Dry scalp"],
            ),
            product(
                "FiberShield Bond Repair Mask",
                "Weekly treatment for color-treated or heat-styled hair.",
                "Haircare · Aisle 3",
                "$32",
                &["Mask", "Bond repair"],
            ),
            product(
                "CloudVeil Anti-Frizz Leave-In",
                "Lightweight smoothing for wavy hair.",
                "Styling · Aisle 5",
                "$24",
                &["Leave-in", "Frizz"],
            ),
            product(
                "GlowWave Lightweight Hair Oil",
                "Adds shine and tames flyaways.",
                "Styling · Aisle 5",
                "$20",
                &["Oil", "Shine"],
            ),
        ],
    }
}
