use anyhow::{Result, bail};

use nutrilog_core::NutritionService;
use nutrilog_core::models::{Profile, ProfileUpdate};

use super::helpers::{format_deci, kg_to_deci, print_json};

pub(crate) fn cmd_profile_show(svc: &NutritionService, user_id: i64, json: bool) -> Result<()> {
    let profile = svc.get_profile(user_id)?;

    if json {
        return print_json(&profile);
    }

    let effective = Profile::effective(profile.as_ref());
    if profile.is_none() {
        eprintln!("No profile saved yet, showing defaults.");
    }
    println!("Age:            {}", effective.age);
    println!("Height:         {} cm", effective.height_cm);
    println!(
        "Current weight: {}",
        format_deci(Some(effective.current_weight_deci))
    );
    println!(
        "Target weight:  {}",
        format_deci(Some(effective.target_weight_deci))
    );
    println!("Daily goal:     {} kcal", effective.daily_goal);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_profile_set(
    svc: &NutritionService,
    user_id: i64,
    age: Option<i64>,
    height_cm: Option<i64>,
    weight_kg: Option<f64>,
    target_kg: Option<f64>,
    goal: Option<i64>,
    json: bool,
) -> Result<()> {
    let update = ProfileUpdate {
        age,
        height_cm,
        current_weight_deci: weight_kg.map(kg_to_deci),
        target_weight_deci: target_kg.map(kg_to_deci),
        daily_goal: goal,
    };
    if update.age.is_none()
        && update.height_cm.is_none()
        && update.current_weight_deci.is_none()
        && update.target_weight_deci.is_none()
        && update.daily_goal.is_none()
    {
        bail!("Nothing to update. Pass at least one of --age, --height, --weight, --target, --goal");
    }

    let profile = svc.upsert_profile(user_id, &update)?;

    if json {
        print_json(&profile)
    } else {
        let goal = profile.daily_goal;
        println!("Profile saved (daily goal: {goal} kcal)");
        Ok(())
    }
}
