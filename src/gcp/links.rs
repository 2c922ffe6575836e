//! Resource references
//!
//! GCP resources point at each other with self-links
//! (`https://www.googleapis.com/compute/v1/projects/p/zones/z/disks/d`) or
//! relative names (`projects/p/locations/l/clusters/c`). Both parse into a
//! [`ResourceLink`] that knows the scope and Get query of its target.

use crate::model::{region_from_zone, Scope};

/// How a resource family forms the Get key of one of its resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    Name,
    /// `{zone}/{name}`
    Zonal,
    /// `{location}/{name}`, the location being a region or a zone
    Located,
}

/// Where a referenced resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Global,
    Region(String),
    Zone(String),
}

impl Location {
    /// `locations/{l}` in the GKE API names either a region or a zone
    fn from_location_id(id: &str) -> Self {
        if looks_like_zone(id) {
            Location::Zone(id.to_string())
        } else {
            Location::Region(id.to_string())
        }
    }

    pub fn region(&self) -> Option<String> {
        match self {
            Location::Global => None,
            Location::Region(region) => Some(region.clone()),
            Location::Zone(zone) => Some(region_from_zone(zone)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    pub project: String,
    pub location: Location,
    pub collection: String,
    pub name: String,
}

impl ResourceLink {
    /// Parse a self-link or relative resource name
    pub fn parse(link: &str) -> Option<Self> {
        let link = link.split(['?', '#']).next().unwrap_or(link);
        let start = link.find("projects/")?;
        let segments: Vec<&str> = link[start..].split('/').filter(|s| !s.is_empty()).collect();

        // projects/{p}/...
        let project = *segments.get(1)?;
        let rest = segments.get(2..)?;

        let (location, rest) = match rest {
            ["global", rest @ ..] => (Location::Global, rest),
            ["regions", region, rest @ ..] => (Location::Region(region.to_string()), rest),
            ["zones", zone, rest @ ..] => (Location::Zone(zone.to_string()), rest),
            ["locations", id, rest @ ..] => (Location::from_location_id(id), rest),
            _ => return None,
        };

        // Nested resources keep their innermost collection
        if rest.len() < 2 || rest.len() % 2 != 0 {
            return None;
        }
        let collection = rest[rest.len() - 2];
        let name = rest[rest.len() - 1];

        if project.is_empty() || name.is_empty() {
            return None;
        }

        Some(Self {
            project: project.to_string(),
            location,
            collection: collection.to_string(),
            name: name.to_string(),
        })
    }

    /// Scope the target is served in: regional for zonal resources
    pub fn scope(&self) -> Scope {
        match self.location.region() {
            Some(region) => Scope::new(self.project.clone(), region),
            None => Scope::global(self.project.clone()),
        }
    }

    /// Query a Get for the target takes under the target family's key style
    pub fn get_query(&self, style: KeyStyle) -> String {
        match (style, &self.location) {
            (KeyStyle::Zonal, Location::Zone(zone)) => location_key(zone, &self.name),
            (KeyStyle::Located, Location::Zone(location) | Location::Region(location)) => {
                location_key(location, &self.name)
            },
            _ => self.name.clone(),
        }
    }
}

/// Get key of a resource addressed by location and name
pub fn location_key(location: &str, name: &str) -> String {
    format!("{}/{}", location, name)
}

/// Split a `{location}/{name}` Get key back into its parts
pub fn split_location_key(key: &str) -> Option<(&str, &str)> {
    let (location, name) = key.split_once('/')?;
    if location.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((location, name))
}

/// Last path segment of a URL
pub fn short_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Zone ids end in a single-letter suffix (`us-central1-a`)
pub fn looks_like_zone(id: &str) -> bool {
    match id.rsplit_once('-') {
        Some((region, suffix)) => {
            region.contains('-') && suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase())
        },
        None => false,
    }
}

/// Region or zone id in GCP's lowercase form (`us-central1`, `us-central1-a`)
pub fn looks_like_location(id: &str) -> bool {
    id.contains('-')
        && id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && (looks_like_zone(id) || id.ends_with(|c: char| c.is_ascii_digit()))
}

/// Region of a GKE location id
pub fn region_of_location(id: &str) -> String {
    if looks_like_zone(id) {
        region_from_zone(id)
    } else {
        id.to_string()
    }
}
