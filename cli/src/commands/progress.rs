use anyhow::Result;

use nutrilog_core::NutritionService;

use super::helpers::{print_json, render_progress, resolve_window};

pub(crate) fn cmd_progress(
    svc: &NutritionService,
    user_id: i64,
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
    json: bool,
) -> Result<()> {
    let (start, end) = resolve_window(start, end, days)?;
    let dashboard = svc.dashboard(user_id, &start, &end)?;

    if json {
        return print_json(&dashboard);
    }

    let name = svc
        .get_user(user_id)?
        .map_or_else(|| "there".to_string(), |u| u.name);

    println!("=== {} to {} (goal {} kcal) ===\n", dashboard.start, dashboard.end, dashboard.goal);

    for day in &dashboard.totals {
        let marker = if day.consumed <= dashboard.goal { ' ' } else { '!' };
        println!("  {} {:>6} kcal {marker}", day.date, day.consumed);
    }
    if !dashboard.totals.is_empty() {
        println!();
    }

    if !dashboard.top_foods.is_empty() {
        println!("  Most logged:");
        for food in &dashboard.top_foods {
            println!("    {} {} x{}", food.food_icon, food.food_name, food.count);
        }
        println!();
    }

    println!("{}", render_progress(&dashboard.progress, &name));
    Ok(())
}
