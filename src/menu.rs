//! Menu domain: cache keys, normalized views, and the upstream payload mapping.

pub mod language;
pub mod payload;
pub mod transform;

pub use language::*;
pub use payload::{LocalizedDiets, LocalizedText, MealOption, MealRow, MenuDay};
pub use transform::*;

// crates.io
use serde::ser::SerializeMap;
use time::macros::format_description;
// self
use crate::_prelude::*;

/// Display key holding the ISO date.
pub const DAY_KEY: &str = "day";
/// Display key holding the localized weekday name.
pub const DAY_NAME_KEY: &str = "dayName";
/// Display key used when no options are available.
pub const EXTRA_KEY: &str = "Extra";
/// Placeholder shown when the upstream has nothing for the day.
pub const NO_MENU_AVAILABLE: &str = "No menu available";

/// Parses an ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_iso_date(raw: &str) -> Result<Date, time::error::Parse> {
	Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
}

/// Identifies one cache entry and one single-flight slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MenuKey {
	/// Upstream site.
	pub site: String,
	/// Served day.
	pub date: Date,
	/// Normalized language.
	pub language: Language,
}
impl MenuKey {
	/// Builds a key from its parts.
	pub fn new(site: impl Into<String>, date: Date, language: Language) -> Self {
		Self { site: site.into(), date, language }
	}
}
impl Display for MenuKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}/{}", self.site, self.date, self.language)
	}
}

/// Ordered display mapping handed to the routing layer.
///
/// Always starts with [`DAY_KEY`] and [`DAY_NAME_KEY`], followed by one entry per meal option
/// or a single [`EXTRA_KEY`] entry. Serializes as a JSON object in insertion order and renders
/// as `key: value` lines through [`Display`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuView {
	entries: Vec<(String, String)>,
}
impl MenuView {
	/// Creates a view holding only the day header for `date` in `language`.
	pub fn new(date: Date, language: Language) -> Self {
		let mut view = Self { entries: Vec::with_capacity(4) };

		view.insert(DAY_KEY, date.to_string());
		view.insert(DAY_NAME_KEY, language.weekday_name(date.weekday()));

		view
	}

	/// Creates the "No menu available" view for `date` in `language`.
	pub fn unavailable(date: Date, language: Language) -> Self {
		let mut view = Self::new(date, language);

		view.insert(EXTRA_KEY, NO_MENU_AVAILABLE);

		view
	}

	/// Sets `key`, replacing an earlier value in place or appending a new entry.
	pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();

		match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
			Some((_, slot)) => *slot = value,
			None => self.entries.push((key, value)),
		}
	}

	/// Looks up a display value.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.entries.iter().find(|(existing, _)| existing == key).map(|(_, value)| value.as_str())
	}

	/// ISO date string.
	pub fn day(&self) -> &str {
		self.get(DAY_KEY).unwrap_or_default()
	}

	/// Localized weekday name.
	pub fn day_name(&self) -> &str {
		self.get(DAY_NAME_KEY).unwrap_or_default()
	}

	/// Entries in display order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	/// Meal option entries, i.e. everything after the day header.
	pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
		self.iter().filter(|(key, _)| *key != DAY_KEY && *key != DAY_NAME_KEY)
	}

	/// Number of entries, day header included.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the view is empty (never true for views built by this crate).
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Whether the view is the "No menu available" placeholder.
	pub fn is_unavailable(&self) -> bool {
		let mut options = self.options();

		matches!(
			(options.next(), options.next()),
			(Some((EXTRA_KEY, NO_MENU_AVAILABLE)), None) | (None, None)
		)
	}
}
impl Serialize for MenuView {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;

		for (key, value) in &self.entries {
			map.serialize_entry(key, value)?;
		}

		map.end()
	}
}
impl Display for MenuView {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (idx, (key, value)) in self.entries.iter().enumerate() {
			if idx > 0 {
				f.write_str("\n")?;
			}

			write!(f, "{key}: {value}")?;
		}

		Ok(())
	}
}
