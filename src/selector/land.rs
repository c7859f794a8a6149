//! Geographic selectors: continent and DXCC country.
use std::collections::BTreeSet;

use super::{Candidate, Error, Selector, Tuning, CONTINENTS};
use crate::dxcc::Dxcc;

pub struct Continent {
    tuning: Tuning,
    list: BTreeSet<String>,
}

impl Continent {
    pub fn new(tuning: Tuning) -> Result<Continent, Error> {
        let list: BTreeSet<String> = tuning
            .strings()
            .into_iter()
            .map(|c| c.to_uppercase())
            .collect();
        if list.is_empty() {
            return Err(Error::Missing {
                selector: "Continent",
                setting: "list",
            });
        }
        if let Some(bogus) = list.iter().find(|c| !CONTINENTS.contains(&c.as_str())) {
            return Err(Error::BadContinent(bogus.clone()));
        }
        Ok(Continent { tuning, list })
    }
}

impl Selector for Continent {
    fn name(&self) -> &'static str {
        "Continent"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        self.list.contains(&candidate.row.continent)
    }
}

pub struct Country {
    tuning: Tuning,
    list: BTreeSet<String>,
}

impl Country {
    pub fn new(tuning: Tuning, dxcc: &Dxcc) -> Result<Country, Error> {
        let list = tuning.strings();
        if list.is_empty() {
            return Err(Error::Missing {
                selector: "Country",
                setting: "list",
            });
        }
        if let Some(bogus) = list.iter().find(|country| !dxcc.is_entity(country)) {
            return Err(Error::BadCountry(bogus.clone()));
        }
        Ok(Country { tuning, list })
    }
}

impl Selector for Country {
    fn name(&self) -> &'static str {
        "Country"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        self.list.contains(&candidate.row.country)
    }
}

#[cfg(test)]
mod test {
    use super::super::test_support::{candidate, sighting_from};
    use super::super::Candidate;
    use super::*;
    use crate::config::ConfigItem;

    fn listed(items: &[&str]) -> Tuning {
        Tuning {
            list: items
                .iter()
                .map(|s| ConfigItem::Text(s.to_string()))
                .collect(),
            ..Tuning::default()
        }
    }

    #[test]
    fn continent_membership() {
        let selector = Continent::new(listed(&["sa", "AF"])).unwrap();
        assert!(!selector.matches(&candidate("W1AW", -5)));
        let py = Candidate::new(sighting_from("PY2XYZ", 20, -5, "Brazil", "SA", None));
        assert!(selector.matches(&py));
    }

    #[test]
    fn bogus_continent_is_rejected() {
        assert!(matches!(
            Continent::new(listed(&["XX"])),
            Err(Error::BadContinent(_))
        ));
    }

    #[test]
    fn country_list_is_validated_against_the_prefix_db() {
        let dxcc = Dxcc::from_csv(
            "K,United States,291,NA,5,8,37.53,-91.67,5.0,W;".as_bytes(),
        )
        .unwrap();
        let selector = Country::new(listed(&["United States"]), &dxcc).unwrap();
        assert!(selector.matches(&candidate("W1AW", -5)));

        assert!(matches!(
            Country::new(listed(&["Atlantis"]), &dxcc),
            Err(Error::BadCountry(_))
        ));
    }
}
