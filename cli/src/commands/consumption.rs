use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::NutritionService;
use nutrilog_core::models::Profile;

use super::helpers::{print_json, resolve_date, resolve_window};

pub(crate) fn cmd_consumption_set(
    svc: &NutritionService,
    user_id: i64,
    consumed: i64,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = resolve_date(date);
    let row = svc.upsert_consumption(user_id, &date, consumed)?;

    if json {
        print_json(&row)
    } else {
        println!("{}: {} kcal", row.date, row.consumed);
        Ok(())
    }
}

pub(crate) fn cmd_consumption_range(
    svc: &NutritionService,
    user_id: i64,
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
    json: bool,
) -> Result<()> {
    let (start, end) = resolve_window(start, end, days)?;
    let rows = svc.get_consumption_range(user_id, &start, &end)?;

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        eprintln!("No daily totals between {start} and {end}");
        process::exit(2);
    }

    let goal = Profile::effective(svc.get_profile(user_id)?.as_ref()).daily_goal;

    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Consumed")]
        consumed: i64,
        #[tabled(rename = "Goal")]
        goal: i64,
        #[tabled(rename = "")]
        status: &'static str,
    }

    let table_rows: Vec<DayRow> = rows
        .iter()
        .map(|r| DayRow {
            date: r.date.to_string(),
            consumed: r.consumed,
            goal,
            status: if r.consumed <= goal { "ok" } else { "over" },
        })
        .collect();

    let table = Table::new(&table_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
