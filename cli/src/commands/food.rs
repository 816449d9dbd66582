use anyhow::Result;
use std::process;

use nutrilog_core::NutritionService;
use nutrilog_core::models::NewFood;

use super::helpers::{print_food_table, print_json, resolve_window};

pub(crate) fn cmd_food_list(svc: &NutritionService, json: bool) -> Result<()> {
    let foods = svc.list_foods()?;

    if json {
        return print_json(&foods);
    }

    if foods.is_empty() {
        eprintln!("No foods yet. Run `nutrilog food seed` to load the built-in list.");
        process::exit(2);
    }

    print_food_table(&foods);
    Ok(())
}

pub(crate) fn cmd_food_add(
    svc: &NutritionService,
    name: &str,
    icon: Option<String>,
    calories: Option<i64>,
    json: bool,
) -> Result<()> {
    let food = svc.create_food(&NewFood {
        name: name.to_string(),
        icon,
        calories_per_100g: calories,
    })?;

    if json {
        print_json(&food)
    } else {
        let name = &food.name;
        let id = food.id;
        println!("Added food: {} {name} (id: {id})", food.icon);
        Ok(())
    }
}

pub(crate) fn cmd_food_seed(svc: &NutritionService, json: bool) -> Result<()> {
    let inserted = svc.seed_foods()?;

    if json {
        print_json(&serde_json::json!({ "inserted": inserted }))
    } else {
        println!("Seeded {inserted} foods");
        Ok(())
    }
}

pub(crate) fn cmd_food_top(
    svc: &NutritionService,
    user_id: i64,
    start: Option<&str>,
    end: Option<&str>,
    days: u32,
    limit: Option<i64>,
    json: bool,
) -> Result<()> {
    let (start, end) = resolve_window(start, end, days)?;
    let top = svc.top_consumed_foods(user_id, &start, &end, limit)?;

    if json {
        return print_json(&top);
    }

    if top.is_empty() {
        eprintln!("Nothing logged between {start} and {end}");
        process::exit(2);
    }

    for (rank, food) in top.iter().enumerate() {
        let times = if food.count == 1 { "time" } else { "times" };
        println!(
            "{:>2}. {} {} ({} {times})",
            rank + 1,
            food.food_icon,
            food.food_name,
            food.count
        );
    }
    Ok(())
}
