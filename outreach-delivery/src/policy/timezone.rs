//! Region to timezone resolution.
//!
//! Leads carry a free-form country string. It is matched against a static
//! table, first exactly (after trimming) and then case-insensitively.
//! Anything unmatched resolves to UTC: an unknown region degrades the
//! business-hours gate, it never fails a send.

use ahash::AHashMap;
use chrono_tz::{Africa, America, Asia, Australia, Europe, Pacific, Tz};
use outreach_common::internal;

use crate::error::{DeliveryError, SystemError};

static COUNTRY_TIMEZONES: &[(&str, Tz)] = &[
    ("US", America::New_York),
    ("USA", America::New_York),
    ("United States", America::New_York),
    ("India", Asia::Kolkata),
    ("UK", Europe::London),
    ("United Kingdom", Europe::London),
    ("Canada", America::Toronto),
    ("Australia", Australia::Sydney),
    ("Germany", Europe::Berlin),
    ("France", Europe::Paris),
    ("Japan", Asia::Tokyo),
    ("China", Asia::Shanghai),
    ("Brazil", America::Sao_Paulo),
    ("Mexico", America::Mexico_City),
    ("Spain", Europe::Madrid),
    ("Italy", Europe::Rome),
    ("Netherlands", Europe::Amsterdam),
    ("Belgium", Europe::Brussels),
    ("Switzerland", Europe::Zurich),
    ("Sweden", Europe::Stockholm),
    ("Norway", Europe::Oslo),
    ("Denmark", Europe::Copenhagen),
    ("Poland", Europe::Warsaw),
    ("Russia", Europe::Moscow),
    ("South Korea", Asia::Seoul),
    ("Singapore", Asia::Singapore),
    ("Hong Kong", Asia::Hong_Kong),
    ("Taiwan", Asia::Taipei),
    ("Thailand", Asia::Bangkok),
    ("Indonesia", Asia::Jakarta),
    ("Malaysia", Asia::Kuala_Lumpur),
    ("Philippines", Asia::Manila),
    ("Vietnam", Asia::Ho_Chi_Minh),
    ("New Zealand", Pacific::Auckland),
    ("South Africa", Africa::Johannesburg),
    ("UAE", Asia::Dubai),
    ("United Arab Emirates", Asia::Dubai),
    ("Saudi Arabia", Asia::Riyadh),
    ("Israel", Asia::Jerusalem),
    ("Turkey", Europe::Istanbul),
    ("Argentina", America::Argentina::Buenos_Aires),
    ("Chile", America::Santiago),
    ("Colombia", America::Bogota),
    ("Peru", America::Lima),
    ("Venezuela", America::Caracas),
];

/// Look a country up in the built-in table.
#[must_use]
pub fn timezone_for_country(country: &str) -> Option<Tz> {
    let country = country.trim();

    COUNTRY_TIMEZONES
        .iter()
        .find(|(name, _)| *name == country)
        .or_else(|| {
            COUNTRY_TIMEZONES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(country))
        })
        .map(|(_, tz)| *tz)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneResolution {
    pub timezone: Tz,
    /// The region was absent or unmapped and UTC was used instead.
    pub fallback: bool,
}

/// Resolves lead regions, consulting configured overrides before the table.
#[derive(Debug, Clone, Default)]
pub struct RegionResolver {
    overrides: AHashMap<String, Tz>,
}

impl RegionResolver {
    /// Build a resolver from `country → IANA zone name` overrides.
    ///
    /// # Errors
    /// If an override names a zone that does not exist.
    pub fn new(overrides: &AHashMap<String, String>) -> Result<Self, DeliveryError> {
        let overrides = overrides
            .iter()
            .map(|(country, zone)| {
                zone.parse::<Tz>()
                    .map(|tz| (country.trim().to_lowercase(), tz))
                    .map_err(|e| {
                        SystemError::Configuration(format!(
                            "Invalid timezone override {country} => {zone}: {e}"
                        ))
                        .into()
                    })
            })
            .collect::<Result<_, DeliveryError>>()?;

        Ok(Self { overrides })
    }

    #[must_use]
    pub fn resolve(&self, country: Option<&str>) -> TimezoneResolution {
        let country = country.map(str::trim).filter(|c| !c.is_empty());

        let resolved = country.and_then(|c| {
            self.overrides
                .get(&c.to_lowercase())
                .copied()
                .or_else(|| timezone_for_country(c))
        });

        resolved.map_or_else(
            || {
                internal!(
                    level = WARN,
                    country = country.unwrap_or("<none>"),
                    "No timezone mapping for region, falling back to UTC"
                );
                TimezoneResolution {
                    timezone: Tz::UTC,
                    fallback: true,
                }
            },
            |timezone| TimezoneResolution {
                timezone,
                fallback: false,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_case_insensitive_lookup() {
        assert_eq!(timezone_for_country("India"), Some(Asia::Kolkata));
        assert_eq!(timezone_for_country("  india "), Some(Asia::Kolkata));
        assert_eq!(timezone_for_country("usa"), Some(America::New_York));
        assert_eq!(
            timezone_for_country("ARGENTINA"),
            Some(America::Argentina::Buenos_Aires)
        );
        assert_eq!(timezone_for_country("Atlantis"), None);
    }

    #[test]
    fn test_unmapped_falls_back_to_utc() {
        let resolver = RegionResolver::default();

        let unknown = resolver.resolve(Some("Atlantis"));
        assert_eq!(unknown.timezone, Tz::UTC);
        assert!(unknown.fallback);

        let missing = resolver.resolve(None);
        assert!(missing.fallback);

        let blank = resolver.resolve(Some("   "));
        assert!(blank.fallback);

        let known = resolver.resolve(Some("Japan"));
        assert_eq!(known.timezone, Asia::Tokyo);
        assert!(!known.fallback);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut overrides = AHashMap::new();
        overrides.insert("USA".to_string(), "America/Los_Angeles".to_string());
        overrides.insert("Iceland".to_string(), "Atlantic/Reykjavik".to_string());

        let resolver = RegionResolver::new(&overrides).unwrap_or_default();

        assert_eq!(
            resolver.resolve(Some("usa")).timezone,
            America::Los_Angeles
        );
        assert_eq!(
            resolver.resolve(Some("Iceland")).timezone,
            chrono_tz::Atlantic::Reykjavik
        );
        assert_eq!(resolver.resolve(Some("US")).timezone, America::New_York);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut overrides = AHashMap::new();
        overrides.insert("Mars".to_string(), "Olympus/Mons".to_string());

        assert!(RegionResolver::new(&overrides).is_err());
    }
}
