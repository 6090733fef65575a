//! Hour-range and species selections made on the page

use serde::Serialize;

use super::histogram::ChartSpec;

pub const SLIDER_MIN_HOUR: u32 = 5;
pub const SLIDER_MAX_HOUR: u32 = 22;
pub const DEFAULT_HOUR_RANGE: (u32, u32) = (6, 20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    /// Clamp both ends onto the slider and put them in order
    pub fn new(start: u32, end: u32) -> Self {
        let start = start.clamp(SLIDER_MIN_HOUR, SLIDER_MAX_HOUR);
        let end = end.clamp(SLIDER_MIN_HOUR, SLIDER_MAX_HOUR);
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Slider mark text, e.g. 5 -> "05 AM", 13 -> "01 PM"
    pub fn label(hour: u32) -> String {
        let (display, suffix) = match hour {
            0 => (12, "AM"),
            1..=11 => (hour, "AM"),
            12 => (12, "PM"),
            _ => (hour - 12, "PM"),
        };
        format!("{:02} {}", display, suffix)
    }

    pub fn marks() -> Vec<(u32, String)> {
        (SLIDER_MIN_HOUR..=SLIDER_MAX_HOUR)
            .map(|hour| (hour, Self::label(hour)))
            .collect()
    }
}

impl Default for HourRange {
    fn default() -> Self {
        Self::new(DEFAULT_HOUR_RANGE.0, DEFAULT_HOUR_RANGE.1)
    }
}

impl std::fmt::Display for HourRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewSelection {
    /// Slider position shown on the page
    pub hours: HourRange,
    /// Dropdown value shown on the page; None reads "All species"
    pub species: Option<String>,
    /// Whether the request chose an hour range; only then is the chart narrowed
    pub hours_applied: bool,
    /// Whether the request chose a species; only then is the chart filtered
    pub species_applied: bool,
}

impl ViewSelection {
    /// Resolve raw query values.
    ///
    /// Absent hours keep the default slider position and leave the chart at
    /// its full range. An absent species preselects the first known name in
    /// the dropdown without filtering. A species not in `known` (including
    /// the empty string) means all species.
    pub fn new(start: Option<u32>, end: Option<u32>, species: Option<&str>, known: &[String]) -> Self {
        let default = HourRange::default();
        let hours = HourRange::new(start.unwrap_or(default.start), end.unwrap_or(default.end));

        let (species, species_applied) = match species.map(str::trim) {
            Some(name) => (known.iter().find(|k| k.as_str() == name).cloned(), true),
            None => (known.first().cloned(), false),
        };

        Self {
            hours,
            species,
            hours_applied: start.is_some() || end.is_some(),
            species_applied,
        }
    }

    /// The chart as it should be drawn for this selection
    pub fn apply(&self, chart: &ChartSpec) -> ChartSpec {
        let mut view = chart.clone();
        if self.hours_applied {
            view.x_range = [self.hours.start as f64, self.hours.end as f64];
        }
        if let (true, Some(species)) = (self.species_applied, &self.species) {
            view.series.retain(|s| &s.name == species);
        }
        view
    }

    pub fn hours_message(&self) -> String {
        format!("You have selected \"{}\"", self.hours)
    }

    pub fn species_message(&self) -> String {
        format!("You have selected {}", self.species.as_deref().unwrap_or("All species"))
    }
}
