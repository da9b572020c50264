//! Upstream menu payload shapes.
//!
//! Every field is optional on the wire; missing values and explicit `null`s both decode to
//! defaults so the transformer can apply its own placeholders.

// crates.io
use serde::Deserializer;
// self
use crate::{_prelude::*, menu::Language};

/// One day in `GET /public/publicmenu/dates/{site}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDay {
	/// Day the options are served, ISO date possibly followed by a time component.
	#[serde(default)]
	pub date: Option<String>,
	/// Meal options served that day.
	#[serde(default, deserialize_with = "null_as_default")]
	pub meal_options: Vec<MealOption>,
}
impl MenuDay {
	/// Whether this entry describes `date`.
	pub fn is_for(&self, date: Date) -> bool {
		self.date.as_deref().is_some_and(|raw| raw.trim().starts_with(&date.to_string()))
	}
}

/// A single option (e.g. "Lunch 1", "Vegetarian").
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealOption {
	/// Localized option names.
	#[serde(default, deserialize_with = "null_as_default")]
	pub names: Vec<LocalizedText>,
	/// Dish rows; only the first one is displayed.
	#[serde(default, deserialize_with = "null_as_default")]
	pub rows: Vec<MealRow>,
}

/// A dish row inside a [`MealOption`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRow {
	/// Localized dish names.
	#[serde(default, deserialize_with = "null_as_default")]
	pub names: Vec<LocalizedText>,
	/// Localized allergen/diet short codes.
	#[serde(default, deserialize_with = "null_as_default")]
	pub diets: Vec<LocalizedDiets>,
}

/// Text tagged with the language it is written in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedText {
	/// Upstream language code.
	#[serde(default)]
	pub language: Option<String>,
	/// Text in that language.
	#[serde(default)]
	pub name: Option<String>,
}

/// Diet short codes tagged with the language they are written in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedDiets {
	/// Upstream language code.
	#[serde(default)]
	pub language: Option<String>,
	/// Short codes such as `G` or `L`.
	#[serde(default, deserialize_with = "null_as_default")]
	pub diet_shorts: Vec<String>,
}

/// Whether an upstream language tag denotes `language`.
pub(crate) fn speaks(tag: Option<&str>, language: Language) -> bool {
	tag.and_then(Language::parse) == Some(language)
}

/// Picks the first non-blank text written in `language`.
pub(crate) fn localized(texts: &[LocalizedText], language: Language) -> Option<&str> {
	texts
		.iter()
		.filter(|text| speaks(text.language.as_deref(), language))
		.filter_map(|text| text.name.as_deref().map(str::trim))
		.find(|name| !name.is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn nulls_and_missing_fields_decode_to_defaults() {
		let day: MenuDay = serde_json::from_value(serde_json::json!({
			"date": "2025-01-06T00:00:00",
			"mealOptions": [{ "names": null, "rows": [{ "diets": null }] }],
		}))
		.expect("Sparse day objects should decode.");

		assert!(day.is_for(macros::date!(2025 - 01 - 06)));
		assert!(!day.is_for(macros::date!(2025 - 01 - 07)));
		assert_eq!(day.meal_options.len(), 1);
		assert!(day.meal_options[0].names.is_empty());
		assert!(day.meal_options[0].rows[0].names.is_empty());
		assert!(day.meal_options[0].rows[0].diets.is_empty());
	}

	#[test]
	fn localized_skips_other_languages_and_blanks() {
		let texts = vec![
			LocalizedText { language: Some("sv".into()), name: Some("Köttbullar".into()) },
			LocalizedText { language: Some("en".into()), name: Some("  ".into()) },
			LocalizedText { language: Some("EN".into()), name: Some("Meatballs".into()) },
		];

		assert_eq!(localized(&texts, Language::Sv), Some("Köttbullar"));
		assert_eq!(localized(&texts, Language::En), Some("Meatballs"));
		assert_eq!(localized(&texts, Language::Fi), None);
	}
}
