use std::sync::Arc;

use pulse_agent::AgentService;
use pulse_storage::qdrant::QdrantStore;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AgentService>,
}
impl AppState {
	/// Connects the Qdrant-backed index and the configured model providers.
	pub fn new(config: pulse_config::Config) -> color_eyre::Result<Self> {
		let index = QdrantStore::new(&config.storage.qdrant)?;
		let service = AgentService::new(config, Arc::new(index));

		Ok(Self::from_service(Arc::new(service)))
	}

	pub fn from_service(service: Arc<AgentService>) -> Self {
		Self { service }
	}
}
