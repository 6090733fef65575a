//! Hour-of-day histogram, one series per common name

use serde::{Deserialize, Serialize};
use tweeters_common::OccurrenceSnapshot;

pub const HISTOGRAM_MIN_HOUR: f64 = 4.0;
pub const HISTOGRAM_MAX_HOUR: f64 = 22.0;
pub const HISTOGRAM_BINS: usize = 36;

/// Default qualitative palette, cycled per series
const SERIES_COLORS: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A",
    "#19D3F3", "#FF6692", "#B6E880", "#FF97FF", "#FECB52",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartLayout {
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub text_color: String,
    pub x_title: String,
    pub y_title: String,
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 300,
            background: "#111111".to_string(),
            text_color: "#FFFFFF".to_string(),
            x_title: "Hour".to_string(),
            y_title: "count".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    /// One count per bin
    pub counts: Vec<u32>,
}

impl ChartSeries {
    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

/// Binned counts plus everything needed to draw them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Visible x range in hours
    pub x_range: [f64; 2],
    pub bin_width: f64,
    /// Left edge of each bin
    pub bin_starts: Vec<f64>,
    pub series: Vec<ChartSeries>,
    /// Records whose hour fell outside the binned range
    pub out_of_range: usize,
    pub layout: ChartLayout,
}

impl ChartSpec {
    fn empty() -> Self {
        let bin_width = (HISTOGRAM_MAX_HOUR - HISTOGRAM_MIN_HOUR) / HISTOGRAM_BINS as f64;
        Self {
            x_range: [HISTOGRAM_MIN_HOUR, HISTOGRAM_MAX_HOUR],
            bin_width,
            bin_starts: (0..HISTOGRAM_BINS)
                .map(|i| HISTOGRAM_MIN_HOUR + i as f64 * bin_width)
                .collect(),
            series: Vec::new(),
            out_of_range: 0,
            layout: ChartLayout::default(),
        }
    }

    pub fn series(&self, name: &str) -> Option<&ChartSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Count for `name` in the bin containing `hour`
    pub fn count_at(&self, name: &str, hour: f64) -> u32 {
        match (self.series(name), bin_index(hour)) {
            (Some(series), Some(bin)) => series.counts[bin],
            _ => 0,
        }
    }

    /// Sum over all series for each bin
    pub fn stacked_totals(&self) -> Vec<u32> {
        let mut totals = vec![0u32; self.bin_starts.len()];
        for series in &self.series {
            for (total, count) in totals.iter_mut().zip(&series.counts) {
                *total += count;
            }
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.total() == 0)
    }

    /// Series names in legend order
    pub fn names(&self) -> Vec<String> {
        self.series.iter().map(|s| s.name.clone()).collect()
    }
}

/// Bin holding `hour`. Bins are half-open except the last, which also takes
/// the upper bound.
pub fn bin_index(hour: f64) -> Option<usize> {
    if !(HISTOGRAM_MIN_HOUR..=HISTOGRAM_MAX_HOUR).contains(&hour) {
        return None;
    }
    let width = (HISTOGRAM_MAX_HOUR - HISTOGRAM_MIN_HOUR) / HISTOGRAM_BINS as f64;
    let index = ((hour - HISTOGRAM_MIN_HOUR) / width).floor() as usize;
    Some(index.min(HISTOGRAM_BINS - 1))
}

/// Build the hour-of-day histogram. Series appear in order of first
/// occurrence in the snapshot; counts are raw.
pub fn histogram(occurrences: &OccurrenceSnapshot) -> ChartSpec {
    let mut chart = ChartSpec::empty();

    for record in &occurrences.records {
        let Some(bin) = bin_index(record.hour) else {
            chart.out_of_range += 1;
            continue;
        };

        let position = match chart.series.iter().position(|s| s.name == record.common_name) {
            Some(position) => position,
            None => {
                let color = SERIES_COLORS[chart.series.len() % SERIES_COLORS.len()];
                chart.series.push(ChartSeries {
                    name: record.common_name.clone(),
                    color: color.to_string(),
                    counts: vec![0; HISTOGRAM_BINS],
                });
                chart.series.len() - 1
            }
        };
        chart.series[position].counts[bin] += 1;
    }

    if chart.out_of_range > 0 {
        tracing::debug!("{} occurrences outside the charted hours", chart.out_of_range);
    }

    chart
}
