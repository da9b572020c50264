//! Prints today's menu using configuration from the environment.
//!
//! ```sh
//! API_BASE_URL=https://menu.example.com/api MENU_NAME=lunch SITE_NAME=campus \
//! API_USERNAME=kitchen API_PASSWORD=secret cargo run --example fetch_menu -- sv
//! ```

// crates.io
use color_eyre::Result;
// self
use menu_broker::{config::MenuConfig, service::ReqwestMenuService};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let language = std::env::args().nth(1).unwrap_or_else(|| "en".into());
	let config = MenuConfig::from_env()?;
	let service = ReqwestMenuService::from_config(&config)?;
	let view = service.fetch_today(&language).await;

	println!("{view}");
	println!("{}", serde_json::to_string_pretty(&view)?);

	Ok(())
}
