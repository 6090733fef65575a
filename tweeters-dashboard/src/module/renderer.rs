//! Dashboard page renderer
//!
//! Fills the HTML template with the published dashboard and draws the
//! histogram as inline SVG.

use chrono::{DateTime, Local};
use tweeters_common::{MessageColumn, Presentation};

use super::state::{Published, RefreshFailure};
use super::view::{ChartSpec, HourRange, TablePage, TableQuery, ViewSelection};
use crate::config::DashboardConfig;

const DASHBOARD_TEMPLATE: &str = include_str!("../../resources/dashboard.html");

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Query string reproducing the current view, with table state overridden.
/// Selections the request never made stay out so the chart stays whole.
fn page_link(selection: &ViewSelection, query: &TableQuery) -> String {
    let mut params = Vec::new();
    if selection.hours_applied {
        params.push(format!("start={}", selection.hours.start));
        params.push(format!("end={}", selection.hours.end));
    }
    if selection.species_applied {
        let species = selection.species.as_deref().unwrap_or("");
        params.push(format!("species={}", urlencoding::encode(species)));
    }
    if let Some(filter) = query.filter.as_deref().filter(|f| !f.is_empty()) {
        params.push(format!("filter={}", urlencoding::encode(filter)));
    }
    if let Some(column) = query.sort {
        params.push(format!("sort={}", urlencoding::encode(column.header())));
        if query.desc {
            params.push("desc=true".to_string());
        }
    }
    if query.page > 0 {
        params.push(format!("page={}", query.page));
    }
    format!("/?{}", params.join("&amp;"))
}

/// Substitute `{{NAME}}` tokens in a single pass. Substituted text is never
/// scanned again; unknown tokens are kept as they are.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            filled.push_str(&rest[open..]);
            return filled;
        };

        let name = &after[..close];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => filled.push_str(value),
            None => filled.push_str(&rest[open..open + close + 4]),
        }
        rest = &after[close + 2..];
    }

    filled.push_str(rest);
    filled
}

pub struct DashboardRenderer {
    title: String,
    asset_url_prefix: String,
    refresh_secs: u64,
}

impl DashboardRenderer {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            title: config.page.title.clone(),
            asset_url_prefix: config.storage.asset_url_prefix.clone(),
            refresh_secs: config.refresh.interval_secs,
        }
    }

    /// Browser-facing URL of a stored image
    pub fn asset_url(&self, name: &str) -> String {
        format!("{}{}", self.asset_url_prefix, name)
    }

    pub fn render_page(&self, published: &Published, selection: &ViewSelection, query: &TableQuery) -> String {
        let dashboard = &published.dashboard;
        let chart = selection.apply(&dashboard.chart);
        let page = query.apply(&dashboard.rows);

        let values = [
            ("TITLE", escape_html(&self.title)),
            ("REFRESH_SECS", self.refresh_secs.to_string()),
            ("BANNER", Self::render_banner(published.last_error.as_ref())),
            ("LAST_UPDATED", Self::render_last_updated(dashboard.refreshed_at)),
            ("HOUR_OPTIONS_START", Self::render_hour_options(selection.hours.start)),
            ("HOUR_OPTIONS_END", Self::render_hour_options(selection.hours.end)),
            ("HOURS_MESSAGE", escape_html(&selection.hours_message())),
            (
                "SPECIES_OPTIONS",
                Self::render_species_options(&dashboard.species(), selection.species.as_deref()),
            ),
            ("SPECIES_MESSAGE", escape_html(&selection.species_message())),
            ("FILTER", escape_html(query.filter.as_deref().unwrap_or(""))),
            ("SORT_INPUTS", Self::render_sort_inputs(query)),
            ("GIF_PANEL", self.render_gif_panel(dashboard.catalog.last_gif())),
            ("CHART", render_chart_svg(&chart)),
            ("THUMBNAILS", self.render_thumbnails(&dashboard.catalog.thumbnails())),
            ("TABLE", self.render_table(&page, selection, query)),
            ("PAGER", Self::render_pager(&page, selection, query)),
        ];

        fill_template(DASHBOARD_TEMPLATE, &values)
    }

    fn render_banner(failure: Option<&RefreshFailure>) -> String {
        match failure {
            Some(failure) => format!(
                r#"<div class="banner">Data refresh failed at {}: {}. Showing the last successful load.</div>"#,
                failure.at.format("%H:%M:%S"),
                escape_html(&failure.message)
            ),
            None => String::new(),
        }
    }

    fn render_last_updated(refreshed_at: Option<DateTime<Local>>) -> String {
        match refreshed_at {
            Some(at) => format!("Page last updated: {}", at.format("%H:%M:%S")),
            None => "Waiting for the first data load".to_string(),
        }
    }

    fn render_hour_options(selected: u32) -> String {
        HourRange::marks()
            .into_iter()
            .map(|(hour, label)| {
                let attr = if hour == selected { " selected" } else { "" };
                format!(r#"<option value="{}"{}>{}</option>"#, hour, attr, label)
            })
            .collect()
    }

    fn render_species_options(species: &[String], selected: Option<&str>) -> String {
        let mut options = format!(
            r#"<option value=""{}>All species</option>"#,
            if selected.is_none() { " selected" } else { "" }
        );
        for name in species {
            let attr = if selected == Some(name.as_str()) { " selected" } else { "" };
            let name = escape_html(name);
            options.push_str(&format!(r#"<option value="{}"{}>{}</option>"#, name, attr, name));
        }
        options
    }

    fn render_sort_inputs(query: &TableQuery) -> String {
        match query.sort {
            Some(column) => format!(
                r#"<input type="hidden" name="sort" value="{}"><input type="hidden" name="desc" value="{}">"#,
                escape_html(column.header()),
                query.desc
            ),
            None => String::new(),
        }
    }

    fn render_gif_panel(&self, last_gif: Option<&str>) -> String {
        match last_gif {
            Some(name) => {
                let url = escape_html(&self.asset_url(name));
                format!(
                    r#"<a href="{url}" target="_blank"><img src="{url}" id="animated_gif" class="gif" alt="{}"></a>"#,
                    escape_html(name)
                )
            }
            None => r#"<div id="animated_gif" class="gif placeholder">No animation yet</div>"#.to_string(),
        }
    }

    fn render_thumbnails(&self, thumbnails: &[Option<&str>]) -> String {
        thumbnails
            .iter()
            .map(|slot| match slot {
                Some(name) => {
                    let url = escape_html(&self.asset_url(name));
                    format!(
                        r#"<a href="{url}" target="_blank"><img src="{url}" class="thumb" alt="{}"></a>"#,
                        escape_html(name)
                    )
                }
                None => r#"<div class="thumb placeholder">No image</div>"#.to_string(),
            })
            .collect()
    }

    /// Markdown-presented cells hold either device-written markup, used as
    /// is, or a bare image name that gets linked to the asset.
    fn render_image_cell(&self, value: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            String::new()
        } else if value.starts_with('<') {
            value.to_string()
        } else {
            let url = escape_html(&self.asset_url(value));
            format!(
                r#"<a href="{url}" target="_blank"><img src="{url}" alt="{name}"></a>"#,
                name = escape_html(value)
            )
        }
    }

    fn render_table(&self, page: &TablePage, selection: &ViewSelection, query: &TableQuery) -> String {
        let mut html = String::from(r#"<table id="web_stream"><thead><tr>"#);

        for column in MessageColumn::ALL {
            let ascending_now = query.sort == Some(column) && !query.desc;
            let link = page_link(
                selection,
                &TableQuery {
                    filter: query.filter.clone(),
                    sort: Some(column),
                    desc: ascending_now,
                    page: 0,
                },
            );
            let arrow = match (query.sort == Some(column), query.desc) {
                (true, false) => " ▲",
                (true, true) => " ▼",
                _ => "",
            };
            html.push_str(&format!(
                r#"<th><a href="{}">{}</a>{}</th>"#,
                link,
                escape_html(column.header()),
                arrow
            ));
        }
        html.push_str("</tr></thead><tbody>");

        for row in &page.rows {
            html.push_str("<tr>");
            for column in MessageColumn::ALL {
                let class = format!("col-{}", column.header().to_lowercase().replace(' ', "-"));
                let content = match column.presentation() {
                    Presentation::Markdown => self.render_image_cell(&row.cell(column)),
                    Presentation::Text => escape_html(&row.cell(column)),
                };
                html.push_str(&format!(r#"<td class="{}">{}</td>"#, class, content));
            }
            html.push_str("</tr>");
        }

        html.push_str("</tbody></table>");
        html
    }

    fn render_pager(page: &TablePage, selection: &ViewSelection, query: &TableQuery) -> String {
        let at = |number: usize| TableQuery {
            page: number,
            ..query.clone()
        };

        let previous = if page.page > 0 {
            format!(r#"<a href="{}">&laquo; Prev</a>"#, page_link(selection, &at(page.page - 1)))
        } else {
            String::new()
        };
        let next = if page.page + 1 < page.page_count {
            format!(r#"<a href="{}">Next &raquo;</a>"#, page_link(selection, &at(page.page + 1)))
        } else {
            String::new()
        };

        format!(
            "{} Page {} of {} ({} rows) {}",
            previous,
            page.page + 1,
            page.page_count,
            page.total_rows,
            next
        )
    }
}

struct ChartGeometry;

impl ChartGeometry {
    const MARGIN_LEFT: f64 = 50.0;
    const MARGIN_RIGHT: f64 = 180.0;
    const MARGIN_TOP: f64 = 20.0;
    const MARGIN_BOTTOM: f64 = 45.0;
    const LEGEND_ROW_HEIGHT: f64 = 18.0;
    const LEGEND_SWATCH: f64 = 12.0;
    const BAR_GAP: f64 = 1.0;
}

/// Stacked hour-of-day histogram as an SVG element
pub fn render_chart_svg(chart: &ChartSpec) -> String {
    let layout = &chart.layout;
    let width = layout.width as f64;
    let height = layout.height as f64;
    let plot_left = ChartGeometry::MARGIN_LEFT;
    let plot_top = ChartGeometry::MARGIN_TOP;
    let plot_width = width - ChartGeometry::MARGIN_LEFT - ChartGeometry::MARGIN_RIGHT;
    let plot_height = height - ChartGeometry::MARGIN_TOP - ChartGeometry::MARGIN_BOTTOM;
    let plot_bottom = plot_top + plot_height;

    let [lo, hi] = chart.x_range;
    let hi = if hi > lo { hi } else { lo + chart.bin_width };
    let x = |hour: f64| plot_left + (hour - lo) / (hi - lo) * plot_width;

    // Bins overlapping the visible range, clipped to it
    let visible: Vec<(usize, f64, f64)> = chart
        .bin_starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = start + chart.bin_width;
            (end > lo && start < hi).then(|| (i, start.max(lo), end.min(hi)))
        })
        .collect();

    let totals = chart.stacked_totals();
    let y_max = visible.iter().map(|(i, _, _)| totals[*i]).max().unwrap_or(0).max(1) as f64;
    let y = |count: f64| plot_bottom - count / y_max * plot_height;

    let mut svg = format!(
        r#"<svg id="example-graph" xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">"#,
        w = layout.width,
        h = layout.height
    );
    svg.push_str(&format!(
        r#"<rect x="0" y="0" width="{}" height="{}" fill="{}"/>"#,
        layout.width, layout.height, layout.background
    ));

    // Bars, stacked in series order
    for &(bin, start, end) in &visible {
        let mut stacked = 0u32;
        for series in &chart.series {
            let count = series.counts[bin];
            if count == 0 {
                continue;
            }
            let top = y((stacked + count) as f64);
            let bottom = y(stacked as f64);
            svg.push_str(&format!(
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"><title>{}: {}</title></rect>"#,
                x(start),
                top,
                (x(end) - x(start) - ChartGeometry::BAR_GAP).max(0.5),
                bottom - top,
                series.color,
                escape_html(&series.name),
                count
            ));
            stacked += count;
        }
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{l:.1}" y1="{b:.1}" x2="{r:.1}" y2="{b:.1}" stroke="{c}"/><line x1="{l:.1}" y1="{t:.1}" x2="{l:.1}" y2="{b:.1}" stroke="{c}"/>"#,
        l = plot_left,
        r = plot_left + plot_width,
        t = plot_top,
        b = plot_bottom,
        c = layout.text_color
    ));

    let step = if hi - lo > 10.0 { 2 } else { 1 };
    let first_tick = lo.ceil() as u32;
    let last_tick = hi.floor() as u32;
    for hour in (first_tick..=last_tick).step_by(step) {
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" fill="{}" text-anchor="middle">{}</text>"#,
            x(hour as f64),
            plot_bottom + 16.0,
            layout.text_color,
            hour
        ));
    }

    let y_max_count = y_max as u32;
    let mut y_ticks = vec![0, y_max_count];
    if y_max_count >= 4 {
        y_ticks.insert(1, y_max_count / 2);
    }
    for count in y_ticks {
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" fill="{}" text-anchor="end">{}</text>"#,
            plot_left - 6.0,
            y(count as f64) + 4.0,
            layout.text_color,
            count
        ));
    }

    svg.push_str(&format!(
        r#"<text x="{:.1}" y="{:.1}" fill="{}" text-anchor="middle">{}</text>"#,
        plot_left + plot_width / 2.0,
        height - 8.0,
        layout.text_color,
        escape_html(&layout.x_title)
    ));
    svg.push_str(&format!(
        r#"<text x="14" y="{:.1}" fill="{}" text-anchor="middle" transform="rotate(-90 14 {:.1})">{}</text>"#,
        plot_top + plot_height / 2.0,
        layout.text_color,
        plot_top + plot_height / 2.0,
        escape_html(&layout.y_title)
    ));

    // Legend
    let legend_x = width - ChartGeometry::MARGIN_RIGHT + 15.0;
    for (i, series) in chart.series.iter().enumerate() {
        let row_y = plot_top + i as f64 * ChartGeometry::LEGEND_ROW_HEIGHT;
        svg.push_str(&format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{s}" height="{s}" fill="{}"/><text x="{:.1}" y="{:.1}" fill="{}">{}</text>"#,
            legend_x,
            row_y,
            series.color,
            legend_x + ChartGeometry::LEGEND_SWATCH + 6.0,
            row_y + ChartGeometry::LEGEND_SWATCH - 1.0,
            layout.text_color,
            escape_html(&series.name),
            s = ChartGeometry::LEGEND_SWATCH
        ));
    }

    if chart.is_empty() {
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" fill="{}" text-anchor="middle">No occurrences recorded yet</text>"#,
            plot_left + plot_width / 2.0,
            plot_top + plot_height / 2.0,
            layout.text_color
        ));
    }

    svg.push_str("</svg>");
    svg
}
