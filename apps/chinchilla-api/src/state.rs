use std::sync::Arc;

use chinchilla_config::Config;
use chinchilla_service::AgentService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AgentService>,
}
impl AppState {
	pub fn new(config: Config) -> color_eyre::Result<Self> {
		let service = AgentService::new(config)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: AgentService) -> Self {
		Self { service: Arc::new(service) }
	}
}
