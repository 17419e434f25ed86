//! Site profile registry
//!
//! A profile is per-domain tuning for the extraction cascade: ordered selector
//! lists per field, an optional named [`CustomExtractor`], and page-load timing.
//! Profiles come from YAML (`profiles.yaml` is compiled in; a user file can be
//! merged over it) and are read-only once the registry is built.

mod custom;
mod trendyol;
mod zara;

pub use custom::{CustomExtractor, ExtractorCatalog};
pub use trendyol::TrendyolExtractor;
pub use zara::ZaraExtractor;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain;
use crate::error::ProfileError;
use crate::page::WaitUntil;
use crate::utils::{validate_navigation_timeout, validate_settle_wait};

/// Profiles shipped with the crate
const BUILTIN_PROFILES: &str = include_str!("../../profiles.yaml");

/// Ordered selector lists, one per extracted field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub original_price: Vec<String>,
    pub image: Vec<String>,
    /// Selectors, or a literal brand name (an entry without CSS punctuation)
    pub brand: Vec<String>,
    pub discount: Vec<String>,
}

/// One profile entry as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileSpec {
    #[serde(default)]
    pub selectors: SelectorSet,

    #[serde(default)]
    pub custom_extractor: Option<String>,

    #[serde(default)]
    pub wait_time_ms: Option<u64>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub wait_until: WaitUntil,
}

/// Top-level shape of a profile file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSpec>,
}

/// A resolved, ready-to-use profile
#[derive(Clone)]
pub struct SiteProfile {
    /// Bare domain key, matched against page hosts by containment
    pub domain: String,
    pub selectors: SelectorSet,
    pub custom_extractor: Option<Arc<dyn CustomExtractor>>,
    /// Settle wait after navigation; `None` uses the configured default
    pub wait_time: Option<Duration>,
    /// Navigation timeout; `None` uses the configured default
    pub timeout: Option<Duration>,
    pub wait_until: WaitUntil,
}

impl SiteProfile {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            selectors: SelectorSet::default(),
            custom_extractor: None,
            wait_time: None,
            timeout: None,
            wait_until: WaitUntil::default(),
        }
    }

    pub fn with_selectors(mut self, selectors: SelectorSet) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_custom_extractor(mut self, extractor: Arc<dyn CustomExtractor>) -> Self {
        self.custom_extractor = Some(extractor);
        self
    }

    pub fn with_wait_time(mut self, wait: Duration) -> Self {
        self.wait_time = Some(wait);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn from_spec(
        domain: String,
        spec: ProfileSpec,
        catalog: &ExtractorCatalog,
    ) -> Result<Self, ProfileError> {
        let custom_extractor = match spec.custom_extractor {
            Some(name) => Some(catalog.get(&name).ok_or_else(|| {
                ProfileError::UnknownExtractor {
                    domain: domain.clone(),
                    name,
                }
            })?),
            None => None,
        };

        let invalid_timing = |message: String| ProfileError::InvalidTiming {
            domain: domain.clone(),
            message,
        };
        let timeout = spec
            .timeout_ms
            .map(|ms| validate_navigation_timeout(Some(ms), ms))
            .transpose()
            .map_err(invalid_timing)?;
        let wait_time = spec
            .wait_time_ms
            .map(|ms| validate_settle_wait(Some(ms), ms))
            .transpose()
            .map_err(invalid_timing)?;

        Ok(Self {
            domain,
            selectors: spec.selectors,
            custom_extractor,
            wait_time,
            timeout,
            wait_until: spec.wait_until,
        })
    }
}

impl std::fmt::Debug for SiteProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteProfile")
            .field("domain", &self.domain)
            .field("selectors", &self.selectors)
            .field(
                "custom_extractor",
                &self.custom_extractor.as_ref().map(|e| e.name()),
            )
            .field("wait_time", &self.wait_time)
            .field("timeout", &self.timeout)
            .field("wait_until", &self.wait_until)
            .finish()
    }
}

/// Immutable set of site profiles, looked up by page URL
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    /// Longest domain key first, so the most specific key wins a lookup
    profiles: Vec<SiteProfile>,
}

impl SiteRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Profiles compiled into the crate
    pub fn builtin() -> Result<Self, ProfileError> {
        Self::from_yaml_str(BUILTIN_PROFILES, &ExtractorCatalog::builtin())
    }

    /// Built-in profiles with an optional user file merged over them
    pub fn load(path: Option<&Path>) -> Result<Self, ProfileError> {
        let registry = Self::builtin()?;
        match path {
            Some(path) => {
                let user = Self::from_file(path, &ExtractorCatalog::builtin())?;
                info!(
                    "Loaded {} site profile(s) from {}",
                    user.len(),
                    path.display()
                );
                Ok(registry.merge(user))
            }
            None => Ok(registry),
        }
    }

    pub fn from_file(path: &Path, catalog: &ExtractorCatalog) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents, catalog)
    }

    pub fn from_yaml_str(yaml: &str, catalog: &ExtractorCatalog) -> Result<Self, ProfileError> {
        let file: ProfileFile = serde_yaml::from_str(yaml)?;

        let mut registry = Self::empty();
        for (key, spec) in file.profiles {
            let domain = validate_domain_key(&key)?;
            registry = registry.with_profile(SiteProfile::from_spec(domain, spec, catalog)?);
        }
        Ok(registry)
    }

    /// Add a profile, replacing any existing one for the same domain
    pub fn with_profile(mut self, profile: SiteProfile) -> Self {
        self.profiles.retain(|p| p.domain != profile.domain);
        self.profiles.push(profile);
        self.profiles
            .sort_by(|a, b| b.domain.len().cmp(&a.domain.len()).then(a.domain.cmp(&b.domain)));
        self
    }

    /// Profiles of `other` replace same-domain profiles of `self`
    pub fn merge(self, other: SiteRegistry) -> Self {
        other
            .profiles
            .into_iter()
            .fold(self, |registry, profile| registry.with_profile(profile))
    }

    /// Profile whose domain key occurs in the URL's host
    pub fn lookup(&self, url: &str) -> Option<&SiteProfile> {
        let host = domain::host(url)?;
        let found = self.profiles.iter().find(|p| host.contains(&p.domain));
        if let Some(profile) = found {
            debug!("Using site profile '{}' for {}", profile.domain, host);
        }
        found
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.domain.as_str())
    }
}

/// Profile keys are bare, lower-case domains: no scheme, path or `www.`
fn validate_domain_key(key: &str) -> Result<String, ProfileError> {
    let domain = key.trim().to_ascii_lowercase();
    let malformed = domain.is_empty()
        || domain.contains("://")
        || domain.contains(['/', '?', '#', ' '])
        || domain.starts_with("www.")
        || domain.starts_with('.')
        || domain.ends_with('.');

    if malformed {
        return Err(ProfileError::InvalidDomain(key.to_string()));
    }
    Ok(domain)
}
