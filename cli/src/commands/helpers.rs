use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::models::{DATE_FORMAT, Food, MealItem, format_date};
use nutrilog_core::progress::Progress;

/// Dates in the CLI are calendar days in UTC.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Resolve `today`/`yesterday`/`tomorrow` or pass a `YYYY-MM-DD` string
/// through. Validation of explicit dates is left to the service so the CLI
/// reports the same errors as the server.
pub(crate) fn resolve_date(date_str: Option<&str>) -> String {
    match date_str.map(str::trim) {
        None | Some("today") => format_date(today()),
        Some("yesterday") => format_date(today() - chrono::Duration::days(1)),
        Some("tomorrow") => format_date(today() + chrono::Duration::days(1)),
        Some(s) => s.to_string(),
    }
}

/// Window for range commands: explicit `--start/--end`, otherwise the last
/// `days` days ending at `--end` (or today).
pub(crate) fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
) -> Result<(String, String)> {
    let end = resolve_date(end);
    if let Some(start) = start {
        return Ok((resolve_date(Some(start)), end));
    }
    if days == 0 {
        bail!("--days must be at least 1");
    }
    let end_date = NaiveDate::parse_from_str(&end, DATE_FORMAT)
        .with_context(|| format!("Invalid date '{end}'. Use YYYY-MM-DD or today/yesterday"))?;
    let start_date = end_date
        .checked_sub_signed(chrono::Duration::days(i64::from(days) - 1))
        .with_context(|| format!("--days {days} reaches past the earliest supported date"))?;
    Ok((format_date(start_date), end))
}

/// Parse `FOOD_ID:GRAMS` (e.g. `12:150`).
pub(crate) fn parse_meal_item(s: &str) -> Result<MealItem> {
    let (id, grams) = s
        .split_once(':')
        .with_context(|| format!("Invalid item '{s}'. Use FOOD_ID:GRAMS (e.g. 12:150)"))?;
    let food_id: i64 = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid food id in '{s}'"))?;
    let quantity_grams: f64 = grams
        .trim()
        .trim_end_matches('g')
        .parse()
        .with_context(|| format!("Invalid quantity in '{s}'"))?;
    Ok(MealItem {
        food_id,
        quantity_grams,
    })
}

/// Kilograms to the stored tenths-of-a-kilogram integer.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn kg_to_deci(kg: f64) -> i64 {
    (kg * 10.0).round() as i64
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn format_deci(deci: Option<i64>) -> String {
    deci.map_or("-".into(), |d| format!("{:.1} kg", d as f64 / 10.0))
}

/// The sentence shown under the progress chart for a classified window.
pub(crate) fn render_progress(progress: &Progress, name: &str) -> String {
    match *progress {
        Progress::OnTrack { pct_met } => format!(
            "Well done, {name}! You stayed within your calorie goal on {pct_met}% of the days. \
             Keep it up, your target weight is within reach."
        ),
        Progress::SlightlyOver { avg, goal } => format!(
            "{name}, you have kept your focus, but your average intake ({avg} kcal) is slightly \
             above your goal of {goal} kcal. More vegetables and lean protein at lunch will help."
        ),
        Progress::NeedsAttention {
            avg,
            goal,
            pct_over,
        } => format!(
            "Heads up, {name}! Your average intake ({avg} kcal) is {pct_over}% above your goal \
             of {goal} kcal. Lighter snacks could help you get back on course."
        ),
        Progress::InsufficientData => {
            "Not enough data yet. Pick a wider date range (or valid dates) to get an analysis."
                .to_string()
        }
    }
}

pub(crate) fn print_food_table(foods: &[Food]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "")]
        icon: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal/100g")]
        calories: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            icon: f.icon.clone(),
            name: truncate(&f.name, 35),
            calories: f.calories_per_100g.map_or("-".into(), |c| c.to_string()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_date_keywords() {
        let t = today();
        assert_eq!(resolve_date(None), format_date(t));
        assert_eq!(resolve_date(Some("today")), format_date(t));
        assert_eq!(
            resolve_date(Some("yesterday")),
            format_date(t - chrono::Duration::days(1))
        );
        assert_eq!(
            resolve_date(Some("tomorrow")),
            format_date(t + chrono::Duration::days(1))
        );
    }

    #[test]
    fn test_resolve_date_passes_through() {
        assert_eq!(resolve_date(Some("2025-10-01")), "2025-10-01");
        // Left for the service to reject
        assert_eq!(resolve_date(Some("nope")), "nope");
    }

    #[test]
    fn test_resolve_window_days() {
        let (start, end) = resolve_window(None, Some("2025-10-07"), 7).unwrap();
        assert_eq!(start, "2025-10-01");
        assert_eq!(end, "2025-10-07");

        let (start, end) = resolve_window(None, Some("2025-10-07"), 1).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn test_resolve_window_explicit() {
        let (start, end) = resolve_window(Some("2025-09-01"), Some("2025-09-30"), 7).unwrap();
        assert_eq!((start.as_str(), end.as_str()), ("2025-09-01", "2025-09-30"));
    }

    #[test]
    fn test_resolve_window_rejects_zero_days() {
        assert!(resolve_window(None, Some("2025-10-07"), 0).is_err());
        assert!(resolve_window(None, Some("garbage"), 7).is_err());
    }

    #[test]
    fn test_resolve_window_rejects_days_before_min_date() {
        let err = resolve_window(None, Some("2025-10-07"), u32::MAX).unwrap_err();
        assert!(err.to_string().contains("earliest supported date"));
        assert!(resolve_window(None, Some("2025-10-07"), 36_500).is_ok());
    }

    #[test]
    fn test_parse_meal_item() {
        let item = parse_meal_item("12:150").unwrap();
        assert_eq!(item.food_id, 12);
        assert!((item.quantity_grams - 150.0).abs() < f64::EPSILON);

        let item = parse_meal_item("3: 87.5g").unwrap();
        assert!((item.quantity_grams - 87.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_meal_item_invalid() {
        assert!(parse_meal_item("12").is_err());
        assert!(parse_meal_item("x:100").is_err());
        assert!(parse_meal_item("12:lots").is_err());
    }

    #[test]
    fn test_weights() {
        assert_eq!(kg_to_deci(72.5), 725);
        assert_eq!(kg_to_deci(70.04), 700);
        assert_eq!(format_deci(Some(655)), "65.5 kg");
        assert_eq!(format_deci(None), "-");
    }

    #[test]
    fn test_render_progress() {
        let text = render_progress(&Progress::OnTrack { pct_met: 86 }, "Maria");
        assert!(text.starts_with("Well done, Maria!"));
        assert!(text.contains("86%"));

        let text = render_progress(
            &Progress::NeedsAttention {
                avg: 2500,
                goal: 2000,
                pct_over: 25,
            },
            "Maria",
        );
        assert!(text.contains("2500 kcal"));
        assert!(text.contains("25% above"));

        let text = render_progress(&Progress::SlightlyOver { avg: 2040, goal: 2000 }, "Maria");
        assert!(text.contains("slightly"));

        assert!(render_progress(&Progress::InsufficientData, "Maria").starts_with("Not enough"));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Pão de Queijo", 20), "Pão de Queijo");
        assert_eq!(truncate("Frango Grelhado com Batata Doce", 10), "Frango ...");
    }
}
