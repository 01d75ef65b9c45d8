use std::sync::Arc;

use screener_config::Config;
use screener_service::ScreenerService;
use screener_storage::Connector;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ScreenerService>,
}
impl AppState {
	/// The store is connected on the first request, not here.
	pub fn new(config: Config) -> Self {
		Self { service: Arc::new(ScreenerService::new(config)) }
	}

	pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
		Self { service: Arc::new(ScreenerService::with_connector(config, connector)) }
	}
}
