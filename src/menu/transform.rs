//! Pure mapping from the upstream menu payload to a [`MenuView`].

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	menu::{
		DAY_KEY, DAY_NAME_KEY, EXTRA_KEY, Language, MenuView, NO_MENU_AVAILABLE,
		payload::{self, MealOption, MenuDay},
	},
};

/// Placeholder used when the first dish row has no name in the requested language.
pub const MISSING_DISH: &str = "None";

/// Maps raw upstream JSON to display entries.
#[derive(Clone, Copy, Debug, Default)]
pub struct MenuTransformer;
impl MenuTransformer {
	/// Builds the view for `date` in `language` from `raw`.
	///
	/// Accepts the documented array of day objects, a bare day object, or `null`. Only the day
	/// whose `date` matches is used; a payload without it, or one that does not decode at all,
	/// is treated as empty. Missing names are filled with placeholders.
	pub fn transform(raw: &Value, date: Date, language: Language) -> MenuView {
		let days = decode_days(raw).unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Menu payload does not match the expected shape.");

			Vec::new()
		});
		let day = days.iter().find(|day| day.is_for(date));
		let mut view = MenuView::new(date, language);

		match day {
			Some(day) if !day.meal_options.is_empty() => {
				let mut unnamed = 0;

				for option in &day.meal_options {
					let name = match payload::localized(&option.names, language) {
						Some(name) => name.to_owned(),
						None => {
							unnamed += 1;

							format!("Unnamed meal option {unnamed}")
						},
					};

					view.insert(option_key(name), dish(option, language));
				}
			},
			_ => view.insert(EXTRA_KEY, NO_MENU_AVAILABLE),
		}

		view
	}
}

/// Keeps options from overwriting the day header.
fn option_key(name: String) -> String {
	if name == DAY_KEY || name == DAY_NAME_KEY {
		format!("{name} (meal option)")
	} else {
		name
	}
}

fn decode_days(raw: &Value) -> Result<Vec<MenuDay>, serde_path_to_error::Error<serde_json::Error>> {
	match raw {
		Value::Null => Ok(Vec::new()),
		Value::Object(_) => serde_path_to_error::deserialize(raw).map(|day: MenuDay| vec![day]),
		_ => serde_path_to_error::deserialize(raw),
	}
}

/// `dish (A, B)` for the first row of `option`.
fn dish(option: &MealOption, language: Language) -> String {
	let Some(row) = option.rows.first() else {
		return MISSING_DISH.into();
	};
	let name = payload::localized(&row.names, language).unwrap_or(MISSING_DISH);
	let allergens = row
		.diets
		.iter()
		.filter(|diets| payload::speaks(diets.language.as_deref(), language))
		.flat_map(|diets| diets.diet_shorts.iter().map(|code| code.trim()))
		.filter(|code| !code.is_empty())
		.collect::<Vec<_>>();

	if allergens.is_empty() {
		name.to_owned()
	} else {
		format!("{name} ({})", allergens.join(", "))
	}
}
