use crate::types::period::Year;
use std::fmt;

/// One `(station, year)` ingestion target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkUnit {
    pub station_id: String,
    pub year: Year,
}

impl WorkUnit {
    pub fn new(station_id: impl Into<String>, year: impl Into<Year>) -> Self {
        Self {
            station_id: station_id.into(),
            year: year.into(),
        }
    }

    /// Enumerates the station × year matrix: station list order first, ascending years within.
    /// Station ids are trimmed of surrounding whitespace.
    pub fn matrix<S: AsRef<str>>(
        stations: &[S],
        years: std::ops::RangeInclusive<i32>,
    ) -> Vec<WorkUnit> {
        stations
            .iter()
            .flat_map(|station| {
                years
                    .clone()
                    .map(move |year| WorkUnit::new(station.as_ref().trim(), year))
            })
            .collect()
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.station_id, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_order_is_station_then_year() {
        let units = WorkUnit::matrix(&["0201D", "0061X"], 2009..=2010);
        let labels: Vec<String> = units.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            [
                "0201D (2009)",
                "0201D (2010)",
                "0061X (2009)",
                "0061X (2010)"
            ]
        );
    }

    #[test]
    fn test_matrix_trims_station_ids() {
        let units = WorkUnit::matrix(&[" 0061X", "0061X\t"], 2009..=2009);
        assert_eq!(units[0], WorkUnit::new("0061X", 2009));
        assert_eq!(units[0], units[1]);
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn test_matrix_empty_range() {
        assert!(WorkUnit::matrix(&["0201D"], 2010..=2009).is_empty());
    }
}
