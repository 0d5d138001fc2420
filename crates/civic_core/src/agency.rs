use crate::ompnetwork::{DEFAULT_ORIGIN, sessions_url};
use crate::schema::{Classification, Location};
use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// The platform rejects limits above roughly 150.
pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Everything that distinguishes one committee's ingestion from another's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyConfig {
    pub name: String,   // stable slug, prefixes meeting ids
    pub agency: String, // display name, also the title fallback
    pub site_id: String,
    pub category_id: String,
    #[serde(default = "default_classification")]
    pub classification: Classification,
    #[serde(default = "default_location")]
    pub location: Location,
    #[serde(default = "default_timezone")]
    pub timezone: String, // informational only
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_origin")]
    pub origin: String,
}

fn default_classification() -> Classification {
    Classification::NotClassified
}

pub fn default_location() -> Location {
    Location {
        name: "The Dalles City Hall".to_string(),
        address: "313 Court St, The Dalles, OR 97058".to_string(),
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

impl AgencyConfig {
    pub fn new(
        name: impl Into<String>,
        agency: impl Into<String>,
        site_id: impl Into<String>,
        category_id: impl Into<String>,
        classification: Classification,
    ) -> Self {
        Self {
            name: name.into(),
            agency: agency.into(),
            site_id: site_id.into(),
            category_id: category_id.into(),
            classification,
            location: default_location(),
            timezone: default_timezone(),
            page_size: default_page_size(),
            origin: default_origin(),
        }
    }

    pub fn page_url(&self, start: u64) -> String {
        sessions_url(
            &self.origin,
            &self.site_id,
            &self.category_id,
            start,
            self.page_size,
        )
    }

    /// The page-1 listing endpoint, also the fallback meeting source.
    pub fn listing_url(&self) -> String {
        self.page_url(0)
    }
}

const DALLES_SITE_ID: &str = "312";

pub fn dalles_agencies() -> Vec<AgencyConfig> {
    let table = [
        (
            "colgo_dalles_city_council",
            "The Dalles City Council",
            "214",
            Classification::CityCouncil,
        ),
        (
            "colgo_dalles_informational",
            "The Dalles Informational or Town Hall Meetings",
            "215",
            Classification::NotClassified,
        ),
        (
            "colgo_dalles_planning_commission",
            "The Dalles Planning Commission",
            "216",
            Classification::Commission,
        ),
        (
            "colgo_dalles_historic_landmarks",
            "The Dalles Historic Landmarks Commission",
            "217",
            Classification::Commission,
        ),
        (
            "colgo_dalles_urban_renewal",
            "The Dalles Urban Renewal Agency",
            "218",
            Classification::Board,
        ),
    ];
    table
        .into_iter()
        .map(|(name, agency, category_id, classification)| {
            AgencyConfig::new(name, agency, DALLES_SITE_ID, category_id, classification)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct AgencyFile {
    agencies: Vec<AgencyConfig>,
}

/// Ordered set of agency configurations, one ingestion worker each.
#[derive(Debug, Clone)]
pub struct AgencyRegistry {
    agencies: Vec<AgencyConfig>,
}

impl AgencyRegistry {
    pub fn new(agencies: Vec<AgencyConfig>) -> Result<Self> {
        let mut seen = HashSet::new();
        for agency in &agencies {
            if agency.name.trim().is_empty() {
                bail!("agency with display name {:?} has an empty name", agency.agency);
            }
            if !seen.insert(agency.name.as_str()) {
                bail!("duplicate agency name: {}", agency.name);
            }
            if agency.page_size == 0 {
                bail!("agency {} has page_size 0", agency.name);
            }
        }
        Ok(Self { agencies })
    }

    pub fn builtin() -> Self {
        Self {
            agencies: dalles_agencies(),
        }
    }

    /// Reads an `agencies` table from a `.toml`, `.yaml` or `.yml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        let file: AgencyFile = match ext {
            "toml" => toml::from_str(&raw)?,
            "yaml" | "yml" => serde_yaml::from_str(&raw)?,
            _ => return Err(anyhow!("unsupported agency config format: {}", path.display())),
        };
        Self::new(file.agencies)
    }

    pub fn get(&self, name: &str) -> Option<&AgencyConfig> {
        self.agencies.iter().find(|agency| agency.name == name)
    }

    /// Keeps registry order; unknown names are an error.
    pub fn select(&self, names: &[String]) -> Result<Vec<AgencyConfig>> {
        if names.is_empty() {
            return Ok(self.agencies.clone());
        }
        for name in names {
            if self.get(name).is_none() {
                bail!("unknown agency: {name}");
            }
        }
        Ok(self
            .agencies
            .iter()
            .filter(|agency| names.contains(&agency.name))
            .cloned()
            .collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgencyConfig> {
        self.agencies.iter()
    }

    pub fn len(&self) -> usize {
        self.agencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agencies.is_empty()
    }
}
