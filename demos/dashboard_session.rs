//! Signs in to a gateway admin API, loads a few dashboard resources, and prints the request
//! metrics gathered along the way.
//!
//! ```sh
//! GATEWAY_URL=http://localhost:3000/api GATEWAY_EMAIL=ops@example.com GATEWAY_PASSWORD=... \
//!     RUST_LOG=gateway_client=debug cargo run --example dashboard_session
//! ```
//!
//! Credentials persist in `gateway-credentials.json`, so later runs reuse the stored bearer and
//! exercise the refresh path once the backend expires it.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use tracing_subscriber::EnvFilter;
// self
use gateway_client::{
	auth::LoginRequest,
	config::ClientConfig,
	pipeline::ReqwestPipeline,
	store::{CredentialStore, FileStore},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

	let base_url = env::var("GATEWAY_URL").unwrap_or_else(|_| "http://localhost:3000/api".into());
	let config = ClientConfig::builder(Url::parse(&base_url)?).build()?;
	let store: Arc<dyn CredentialStore> = Arc::new(FileStore::open("gateway-credentials.json")?);
	let pipeline = ReqwestPipeline::new(config, store)?;

	if !pipeline.is_authenticated().await? {
		let email = env::var("GATEWAY_EMAIL")?;
		let password = env::var("GATEWAY_PASSWORD")?;
		let login = pipeline.login(&LoginRequest::new(email, password).remember_me(true)).await?;

		println!("signed in as {}", login.user["email"]);
	}

	for path in ["/routes", "/services", "/security/settings"] {
		match pipeline.get_json::<serde_json::Value>(path).await {
			Ok(body) => println!("{path}: {body}"),
			Err(e) if e.requires_login() => {
				println!("{path}: session expired, sign in again");

				break;
			},
			Err(e) => println!("{path}: {e}"),
		}
	}

	println!("{}", serde_json::to_string_pretty(&pipeline.metrics.summary())?);

	Ok(())
}
