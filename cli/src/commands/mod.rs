mod consumption;
mod entry;
mod food;
mod helpers;
mod profile;
mod progress;

pub(crate) use consumption::{cmd_consumption_range, cmd_consumption_set};
pub(crate) use entry::{cmd_entry_add, cmd_entry_delete, cmd_entry_list, cmd_log_meal};
pub(crate) use food::{cmd_food_add, cmd_food_list, cmd_food_seed, cmd_food_top};
pub(crate) use profile::{cmd_profile_set, cmd_profile_show};
pub(crate) use progress::cmd_progress;
