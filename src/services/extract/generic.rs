//! Generic fallback extraction strategy.
//!
//! Recognizes the listing shapes that most housing pages share: unit
//! numbers, address + apartment combinations, bedroom + rent phrases and
//! building + rent phrases. Counters and summary lines are filtered by the
//! validity rules.

use std::sync::LazyLock;

use regex::Regex;

use super::{ExtractionStrategy, ValidityRules};
use crate::models::GENERIC_STRATEGY;
use crate::utils::collapse_whitespace;

/// "Unit 408", "Apt 12F", "Apartment #3"
static UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:unit|apt|apartment)\.?\s*#?\s*\d+[a-z]?\b").expect("unit pattern")
});

/// "45 Clinton Apartments - Unit 3C"
static ADDRESS_APARTMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+ +[A-Z][a-z]+(?: +[A-Z][a-z]+)* +[Aa]partments?(?:[- ]*(?:Unit +)?\d+[A-Z]?)?")
        .expect("address apartments pattern")
});

/// "2 Bedroom Harlem: $2,104"
static BEDROOM_RENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)[- ]*Bedroom +([A-Za-z ]+?)[:;]? *\$? *(\d[\d,]*)")
        .expect("bedroom rent pattern")
});

/// "Riverside Park Apartments ... Rent: $1,950"
static BUILDING_RENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][a-z]+(?: +[A-Z][a-z]+){1,3}) +Apartments.*?Rent: *\$(\d[\d,]*)")
        .expect("building rent pattern")
});

/// "120 Broome Street ... $2,104"
static ADDRESS_RENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+ +[A-Z][a-z]+(?: +[A-Z][a-z]+)?)\b.*?\$ *(\d[\d,]*)")
        .expect("address rent pattern")
});

/// Pattern-matching strategy used when nothing site-specific applies.
#[derive(Debug, Clone, Default)]
pub struct GenericStrategy {
    validity: ValidityRules,
}

impl GenericStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validity(validity: ValidityRules) -> Self {
        Self { validity }
    }
}

fn rent(raw: &str) -> String {
    raw.replace(',', "")
}

impl ExtractionStrategy for GenericStrategy {
    fn name(&self) -> &str {
        GENERIC_STRATEGY
    }

    fn validity(&self) -> &ValidityRules {
        &self.validity
    }

    fn candidates(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();

        out.extend(UNIT.find_iter(text).map(|m| collapse_whitespace(m.as_str())));

        out.extend(ADDRESS_APARTMENTS.find_iter(text).map(|m| {
            collapse_whitespace(m.as_str())
                .trim_end_matches(['-', ' '])
                .to_string()
        }));

        for caps in BEDROOM_RENT.captures_iter(text) {
            let location: String = caps[2].trim().chars().take(20).collect();
            out.push(format!(
                "{}BR-{}-${}",
                &caps[1],
                location.trim(),
                rent(&caps[3])
            ));
        }

        for caps in BUILDING_RENT.captures_iter(text) {
            out.push(format!(
                "{}-${}",
                collapse_whitespace(&caps[1]),
                rent(&caps[2])
            ));
        }

        for caps in ADDRESS_RENT.captures_iter(text) {
            out.push(format!(
                "{}-${}",
                collapse_whitespace(&caps[1]),
                rent(&caps[2])
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<String> {
        GenericStrategy::new().extract(text).into_iter().collect()
    }

    #[test]
    fn test_unit_numbers() {
        let ids = extract("Unit 408 available\nApt 12F waitlist\napartment #3");
        assert!(ids.contains(&"Unit 408".to_string()));
        assert!(ids.contains(&"Apt 12F".to_string()));
        assert!(ids.contains(&"apartment #3".to_string()));
    }

    #[test]
    fn test_bedroom_rent() {
        let ids = extract("2 Bedroom Harlem: $2,104");
        assert!(ids.contains(&"2BR-Harlem-$2104".to_string()));
    }

    #[test]
    fn test_building_rent() {
        let ids = extract("Riverside Park Apartments, 3 floors. Rent: $1,950");
        assert!(ids.contains(&"Riverside Park-$1950".to_string()));
    }

    #[test]
    fn test_address_apartments() {
        let ids = extract("45 Clinton Apartments - Unit 3C");
        assert!(ids.contains(&"45 Clinton Apartments - Unit 3C".to_string()));
    }

    #[test]
    fn test_summary_counters_are_ignored() {
        let ids = extract("26 Results Neighborhood:$2104");
        assert!(ids.is_empty(), "unexpected ids: {ids:?}");
    }

    #[test]
    fn test_no_listings() {
        assert!(extract("Apartment rentals coming soon. Check back for rent info.").is_empty());
    }

    #[test]
    fn test_deterministic() {
        let text = "Unit 1 $900\n2 Bedroom Bronx: $1,800\n120 Broome Street Unit 4B $2,104";
        assert_eq!(extract(text), extract(text));
    }
}
