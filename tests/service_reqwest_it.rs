#![cfg(feature = "reqwest")]

// std
use std::{sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
use url::Url;
// self
use menu_broker::{
	config::{Credentials, MenuConfig},
	menu::{EXTRA_KEY, NO_MENU_AVAILABLE},
	service::ReqwestMenuService,
};

const TOKEN: &str = "fresh-token";
const MENU_PATH: &str = "/public/publicmenu/dates/test-site";

fn monday_menu() -> Value {
	json!([{
		"date": "2025-01-06T00:00:00",
		"mealOptions": [
			{
				"names": [{ "language": "en", "name": "Lunch" }],
				"rows": [{
					"names": [{ "language": "en", "name": "Meatballs" }],
					"diets": [{ "language": "en", "dietShorts": ["G", "L"] }],
				}],
			},
			{
				"names": [{ "language": "en", "name": "Vegetarian" }],
				"rows": [{ "names": [{ "language": "en", "name": "Falafel" }] }],
			},
		],
	}])
}

/// Mock-server configuration with a rate budget generous enough that tests never wait on it.
fn test_config(base_url: &str) -> MenuConfig {
	let base_url = Url::parse(base_url).expect("Failed to parse mock upstream base URL.");

	MenuConfig::new(
		base_url,
		"lunch",
		"test-site",
		Credentials::new("tf", "menu-user", "menu-password"),
	)
	.with_rate_limit(100.)
	.with_cache_ttl(Duration::from_secs(60))
}

fn build_reqwest_test_service(base_url: &str) -> ReqwestMenuService {
	ReqwestMenuService::from_config(&test_config(base_url))
		.expect("Failed to build menu service for upstream tests.")
}

async fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/login").json_body(json!({
				"tenant": "tf",
				"publicApiUserName": "menu-user",
				"password": "menu-password",
			}));
			then.status(200).json_body(json!({ "token": TOKEN }));
		})
		.await
}

async fn mock_anonymous_forbidden(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path(MENU_PATH).header_missing("authorization");
			then.status(403);
		})
		.await
}

#[tokio::test]
async fn logs_in_after_403_and_serves_the_transformed_menu() {
	let server = MockServer::start_async().await;
	let login = mock_login(&server).await;
	let anonymous = mock_anonymous_forbidden(&server).await;
	let menu = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(MENU_PATH)
				.header("authorization", TOKEN)
				.query_param("dates", "2025-01-06")
				.query_param("menu", "lunch");
			then.status(200).json_body(monday_menu());
		})
		.await;
	let service = build_reqwest_test_service(&server.base_url());
	let view = service.fetch_menu("2025-01-06", "en").await;

	assert_eq!(view.day(), "2025-01-06");
	assert_eq!(view.day_name(), "Monday");
	assert_eq!(view.get("Lunch"), Some("Meatballs (G, L)"));
	assert_eq!(view.get("Vegetarian"), Some("Falafel"));
	assert!(!view.is_unavailable());

	login.assert_calls_async(1).await;
	anonymous.assert_calls_async(1).await;
	menu.assert_calls_async(1).await;
}

#[tokio::test]
async fn cached_views_are_served_without_upstream_calls() {
	let server = MockServer::start_async().await;
	let login = mock_login(&server).await;
	let _anonymous = mock_anonymous_forbidden(&server).await;
	let menu = server
		.mock_async(|when, then| {
			when.method(GET).path(MENU_PATH).header("authorization", TOKEN);
			then.status(200).json_body(monday_menu());
		})
		.await;
	let service = build_reqwest_test_service(&server.base_url());
	let first = service.fetch_menu("2025-01-06", "en").await;
	let second = service.fetch_menu("2025-01-06", "english").await;

	assert_eq!(first, second);
	assert_eq!(service.flight_metrics().hits(), 1);

	// A different language is a different key.
	let swedish = service.fetch_menu("2025-01-06", "sv").await;

	assert_eq!(swedish.day_name(), "Måndag");

	login.assert_calls_async(1).await;
	menu.assert_calls_async(2).await;
}

#[tokio::test]
async fn concurrent_requests_share_one_upstream_fetch() {
	let server = MockServer::start_async().await;
	let login = mock_login(&server).await;
	let _anonymous = mock_anonymous_forbidden(&server).await;
	let menu = server
		.mock_async(|when, then| {
			when.method(GET).path(MENU_PATH).header("authorization", TOKEN);
			then.status(200).delay(Duration::from_millis(300)).json_body(monday_menu());
		})
		.await;
	let service = Arc::new(build_reqwest_test_service(&server.base_url()));
	let handles = (0..6)
		.map(|_| {
			let service = service.clone();

			tokio::spawn(async move { service.fetch_menu("2025-01-06", "en").await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let view = handle.await.expect("Fetch task should not panic.");

		assert_eq!(view.get("Lunch"), Some("Meatballs (G, L)"));
	}

	assert_eq!(service.flight_metrics().computes(), 1);
	assert_eq!(service.flight_metrics().fallbacks(), 0);

	login.assert_calls_async(1).await;
	menu.assert_calls_async(1).await;
}

#[tokio::test]
async fn persistent_403_surfaces_the_placeholder_after_one_login() {
	let server = MockServer::start_async().await;
	let login = mock_login(&server).await;
	let anonymous = mock_anonymous_forbidden(&server).await;
	let menu = server
		.mock_async(|when, then| {
			when.method(GET).path(MENU_PATH).header("authorization", TOKEN);
			then.status(403);
		})
		.await;
	let service = build_reqwest_test_service(&server.base_url());
	let view = service.fetch_menu("2025-01-06", "en").await;

	assert_eq!(view.get(EXTRA_KEY), Some(NO_MENU_AVAILABLE));
	assert_eq!(view.day_name(), "Monday");

	login.assert_calls_async(1).await;
	anonymous.assert_calls_async(1).await;
	menu.assert_calls_async(1).await;
}

#[tokio::test]
async fn empty_payloads_are_not_cached() {
	let server = MockServer::start_async().await;
	let _login = mock_login(&server).await;
	let _anonymous = mock_anonymous_forbidden(&server).await;
	let menu = server
		.mock_async(|when, then| {
			when.method(GET).path(MENU_PATH).header("authorization", TOKEN);
			then.status(200).json_body(json!([]));
		})
		.await;
	let service = build_reqwest_test_service(&server.base_url());

	for _ in 0..2 {
		let view = service.fetch_menu("2025-01-06", "fi").await;

		assert_eq!(
			view.options().collect::<Vec<_>>(),
			vec![(EXTRA_KEY, NO_MENU_AVAILABLE)]
		);
		assert_eq!(view.day_name(), "Maanantai");
	}

	menu.assert_calls_async(2).await;
}

#[tokio::test]
async fn malformed_and_client_error_bodies_yield_the_placeholder() {
	let server = MockServer::start_async().await;
	let _login = mock_login(&server).await;
	let _anonymous = mock_anonymous_forbidden(&server).await;
	let html = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(MENU_PATH)
				.header("authorization", TOKEN)
				.query_param("dates", "2025-01-06");
			then.status(200).body("<html>maintenance</html>");
		})
		.await;
	let missing = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(MENU_PATH)
				.header("authorization", TOKEN)
				.query_param("dates", "2025-01-07");
			then.status(404).body("unknown site");
		})
		.await;
	let service = build_reqwest_test_service(&server.base_url());

	assert!(service.fetch_menu("2025-01-06", "en").await.is_unavailable());
	assert!(service.fetch_menu("2025-01-07", "en").await.is_unavailable());

	html.assert_calls_async(1).await;
	// Client errors other than 403/429 are not retried.
	missing.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_login_yields_the_placeholder() {
	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/login");
			then.status(401).json_body(json!({ "error": "bad credentials" }));
		})
		.await;
	let anonymous = mock_anonymous_forbidden(&server).await;
	let service = build_reqwest_test_service(&server.base_url());
	let view = service.fetch_menu("2025-01-06", "sv").await;

	assert!(view.is_unavailable());
	assert_eq!(view.day_name(), "Måndag");

	login.assert_calls_async(1).await;
	anonymous.assert_calls_async(1).await;
}

#[tokio::test]
async fn retry_after_header_is_honored_end_to_end() {
	let server = MockServer::start_async().await;
	let _login = mock_login(&server).await;
	let _anonymous = mock_anonymous_forbidden(&server).await;
	let mut throttled = server
		.mock_async(|when, then| {
			when.method(GET).path(MENU_PATH).header("authorization", TOKEN);
			then.status(429).header("Retry-After", "1");
		})
		.await;
	let service = build_reqwest_test_service(&server.base_url());
	let started = tokio::time::Instant::now();
	// Swap the throttling mock for a successful one once the first authorized GET has landed.
	let swap = async {
		while throttled.calls_async().await == 0 {
			tokio::time::sleep(Duration::from_millis(20)).await;
		}

		throttled.delete_async().await;

		server
			.mock_async(|when, then| {
				when.method(GET).path(MENU_PATH).header("authorization", TOKEN);
				then.status(200).json_body(monday_menu());
			})
			.await
	};
	let (view, menu) = tokio::join!(service.fetch_menu("2025-01-06", "en"), swap);

	assert_eq!(view.get("Lunch"), Some("Meatballs (G, L)"));
	assert!(started.elapsed() >= Duration::from_secs(1));

	menu.assert_calls_async(1).await;
}
