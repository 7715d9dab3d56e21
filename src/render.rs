//! Human-facing views of a report: class grids, exports and a free-period chart.

use crate::data::Report;
use crate::error::Result;
use itertools::Itertools;
use std::fmt::Write as _;

pub const FREE: &str = "Free";

/// One class's week laid out as days × periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassGrid {
    pub class: String,
    /// "Day", "Period 1", "Period 2", ...
    pub header: Vec<String>,
    /// One row per day, day name first.
    pub rows: Vec<Vec<String>>,
}

/// Grid for `class`, or `None` when the report has no timetable for it.
pub fn class_grid(report: &Report, class: &str) -> Option<ClassGrid> {
    let week = report.week()?;
    let slots = report.timetable.as_ref()?.get(class)?;

    let header = std::iter::once("Day".to_string())
        .chain((1..=week.periods_per_day).map(|p| format!("Period {p}")))
        .collect();
    let rows = (0..week.days)
        .map(|day| {
            std::iter::once(week.day_name(day))
                .chain((0..week.periods_per_day).map(|period| {
                    match slots.get(&week.slot(day, period)) {
                        Some(subjects) if !subjects.is_empty() => subjects.join(", "),
                        _ => FREE.to_string(),
                    }
                }))
                .collect()
        })
        .collect();

    Some(ClassGrid {
        class: class.to_string(),
        header,
        rows,
    })
}

/// Plain-text table with padded columns.
pub fn render_grid(grid: &ClassGrid) -> String {
    let widths: Vec<usize> = (0..grid.header.len())
        .map(|col| {
            std::iter::once(&grid.header)
                .chain(&grid.rows)
                .map(|row| row.get(col).map_or(0, |cell| cell.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = format!("{}\n", grid.class);
    let _ = writeln!(out, "{}", line(&grid.header));
    let _ = writeln!(out, "{}", widths.iter().map(|w| "-".repeat(*w)).join("-+-"));
    for row in &grid.rows {
        let _ = writeln!(out, "{}", line(row));
    }
    out
}

pub fn grid_to_csv(grid: &ClassGrid) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&grid.header)?;
    for row in &grid.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The report's timetable as pretty-printed JSON, `{}` when there is none.
pub fn timetable_json(report: &Report) -> Result<String> {
    match &report.timetable {
        Some(timetable) => Ok(serde_json::to_string_pretty(timetable)?),
        None => Ok("{}".to_string()),
    }
}

/// Horizontal bar per class, scaled so the longest bar is `width` characters.
pub fn free_period_chart(report: &Report, width: usize) -> String {
    let Some(free) = &report.free_periods else {
        return String::new();
    };
    let classes: Vec<&String> = match &report.class_names {
        Some(names) => names.iter().collect(),
        None => free.keys().collect(),
    };
    let most = free.values().copied().max().unwrap_or(0).max(1);
    let label = classes.iter().map(|c| c.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for class in classes {
        let count = free.get(class).copied().unwrap_or(0);
        let bar = "#".repeat(count * width / most);
        let _ = writeln!(out, "{class:<label$} | {bar} {count}");
    }
    out
}

/// Summary block followed by every class grid.
pub fn render_report(report: &Report) -> String {
    if !report.is_success() {
        let mut out = format!(
            "Failed: {}\n",
            report.message.as_deref().unwrap_or("unknown error")
        );
        for error in &report.errors {
            let _ = writeln!(out, "  [{}] {}", error.kind, error.message);
        }
        return out;
    }

    let mut out = String::new();
    if let Some(status) = report.search_status {
        let _ = writeln!(out, "Search status: {status:?}");
    }
    if let Some(objective) = report.objective_value {
        let _ = writeln!(out, "Objective value: {objective}");
    }
    if let Some(repeats) = report.consecutive_repeats {
        let _ = writeln!(out, "Consecutive repeats: {repeats}");
    }
    let _ = writeln!(out, "\nFree periods\n{}", free_period_chart(report, 30));
    for class in report.class_names.iter().flatten() {
        if let Some(grid) = class_grid(report, class) {
            let _ = writeln!(out, "{}", render_grid(&grid));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ReportStatus, SearchStatus, Timetable};
    use std::collections::BTreeMap;

    fn report() -> Report {
        let mut a = BTreeMap::new();
        a.insert(0, vec!["Math".to_string()]);
        a.insert(1, vec![]);
        a.insert(2, vec!["Art".to_string()]);
        a.insert(3, vec!["Math".to_string()]);
        let mut timetable = Timetable::new();
        timetable.insert("10A".to_string(), a);

        Report {
            status: ReportStatus::Success,
            search_status: Some(SearchStatus::Optimal),
            timetable: Some(timetable),
            free_periods: Some(BTreeMap::from([("10A".to_string(), 1)])),
            consecutive_repeats: Some(0),
            objective_value: Some(0.0),
            periods_per_day: Some(2),
            days_per_week: Some(2),
            class_names: Some(vec!["10A".to_string()]),
            message: None,
            errors: Vec::new(),
        }
    }

    #[test]
    fn grid_has_a_row_per_day_with_free_cells() {
        let grid = class_grid(&report(), "10A").unwrap();
        assert_eq!(grid.header, vec!["Day", "Period 1", "Period 2"]);
        assert_eq!(
            grid.rows,
            vec![vec!["Monday", "Math", "Free"], vec!["Tuesday", "Art", "Math"]]
        );
        assert!(class_grid(&report(), "10B").is_none());
    }

    #[test]
    fn csv_export_starts_with_header() {
        let csv = grid_to_csv(&class_grid(&report(), "10A").unwrap()).unwrap();
        assert_eq!(
            csv,
            "Day,Period 1,Period 2\nMonday,Math,Free\nTuesday,Art,Math\n"
        );
    }

    #[test]
    fn text_grid_aligns_columns() {
        let text = render_grid(&class_grid(&report(), "10A").unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "10A");
        assert_eq!(lines[1], "Day     | Period 1 | Period 2");
        assert_eq!(lines[3], "Monday  | Math     | Free");
    }

    #[test]
    fn chart_scales_to_width() {
        let mut report = report();
        report.class_names = Some(vec!["10A".to_string(), "10B".to_string()]);
        report
            .free_periods
            .as_mut()
            .unwrap()
            .insert("10B".to_string(), 4);

        let chart = free_period_chart(&report, 8);
        assert_eq!(chart, "10A | ## 1\n10B | ######## 4\n");
    }

    #[test]
    fn json_export_keys_slots_as_strings() {
        let json = timetable_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["10A"]["3"][0], "Math");
        assert_eq!(timetable_json(&Report::fail("x")).unwrap(), "{}");
    }

    #[test]
    fn failed_report_lists_message() {
        let text = render_report(&Report::fail("No feasible solution. Try adjusting the constraints."));
        assert!(text.starts_with("Failed: No feasible solution."));
    }
}
