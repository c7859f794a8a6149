//! Match on the announced Maidenhead locator.
use regex::Regex;

use super::{Candidate, Error, Selector, Tuning};

pub struct Grid {
    tuning: Tuning,
    regexp: Regex,
}

impl Grid {
    pub fn new(tuning: Tuning) -> Result<Grid, Error> {
        let Some(expr) = tuning.regexp.as_deref() else {
            return Err(Error::Missing {
                selector: "Grid",
                setting: "regexp",
            });
        };
        let regexp = Regex::new(expr)?;
        Ok(Grid { tuning, regexp })
    }
}

impl Selector for Grid {
    fn name(&self) -> &'static str {
        "Grid"
    }

    fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        candidate
            .row
            .grid
            .as_deref()
            .map(|grid| self.regexp.is_match(grid))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::super::test_support::sighting;
    use super::super::Candidate;
    use super::*;

    #[test]
    fn matches_on_the_grid_field() {
        let tuning = Tuning {
            regexp: Some("^FN".to_string()),
            ..Tuning::default()
        };
        let selector = Grid::new(tuning).unwrap();

        let fn31 = Candidate::new(sighting("W1AW", 20, -5));
        assert!(selector.matches(&fn31));

        let mut gridless = sighting("K1ABC", 20, -5);
        gridless.grid = None;
        assert!(!selector.matches(&Candidate::new(gridless)));
    }

    #[test]
    fn regexp_is_mandatory() {
        assert!(matches!(
            Grid::new(Tuning::default()),
            Err(Error::Missing { .. })
        ));
    }
}
