use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::NutritionService;
use nutrilog_core::catalog;

use super::helpers::{parse_meal_item, print_json, resolve_date, resolve_window, truncate};

pub(crate) fn cmd_entry_list(
    svc: &NutritionService,
    user_id: i64,
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
    json: bool,
) -> Result<()> {
    let (start, end) = resolve_window(start, end, days)?;
    let entries = svc.list_food_consumption(user_id, &start, &end)?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        eprintln!("No entries between {start} and {end}");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Qty (g)")]
        quantity: String,
        #[tabled(rename = "kcal")]
        calories: i64,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            date: e.date.to_string(),
            food: format!(
                "{} {}",
                e.food_icon.as_deref().unwrap_or(catalog::DEFAULT_ICON),
                truncate(e.food_name.as_deref().unwrap_or("?"), 30)
            ),
            quantity: format!("{:.0}", e.quantity),
            calories: e.calories,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

/// Append a single entry. Calories default to the catalog value for the
/// given quantity; the day's total is left alone.
pub(crate) fn cmd_entry_add(
    svc: &NutritionService,
    user_id: i64,
    food_id: i64,
    quantity: Option<f64>,
    calories: Option<i64>,
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let date = resolve_date(date);
    let calories = match calories {
        Some(c) => c,
        None => {
            let food = svc.get_food(food_id)?;
            catalog::calories_for(&food, quantity.unwrap_or(nutrilog_core::service::DEFAULT_QUANTITY))
        }
    };
    let entry = svc.add_food_consumption(user_id, food_id, &date, quantity, calories)?;

    if json {
        print_json(&entry)
    } else {
        let name = entry.food_name.as_deref().unwrap_or("?");
        println!(
            "Added [{}] {name}, {:.0} g, {} kcal on {}",
            entry.id, entry.quantity, entry.calories, entry.date
        );
        Ok(())
    }
}

pub(crate) fn cmd_entry_delete(
    svc: &NutritionService,
    user_id: i64,
    entry_id: i64,
    json: bool,
) -> Result<()> {
    let deleted = svc.delete_food_consumption(user_id, entry_id)?;

    if json {
        return print_json(&serde_json::json!({ "deleted": deleted, "id": entry_id }));
    }

    if !deleted {
        bail!("Entry {entry_id} not found");
    }
    println!("Deleted entry {entry_id} (the daily total was not changed)");
    Ok(())
}

pub(crate) fn cmd_log_meal(
    svc: &NutritionService,
    user_id: i64,
    items: &[String],
    date: Option<&str>,
    json: bool,
) -> Result<()> {
    let items = items
        .iter()
        .map(|s| parse_meal_item(s))
        .collect::<Result<Vec<_>>>()?;
    let date = resolve_date(date);
    let meal = svc.log_meal(user_id, &date, &items)?;

    if json {
        return print_json(&meal);
    }

    for e in &meal.entries {
        let icon = e.food_icon.as_deref().unwrap_or(catalog::DEFAULT_ICON);
        let name = e.food_name.as_deref().unwrap_or("?");
        println!("  {icon} {name}: {:.0} g, {} kcal", e.quantity, e.calories);
    }
    println!("Total for {}: {} kcal", meal.daily.date, meal.daily.consumed);
    Ok(())
}
