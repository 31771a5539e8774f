pub mod store;
pub mod error;
pub mod identity_store;
pub mod matcher;

pub mod identities;

use std::sync::Arc;

use crate::tools::{log::{log_info, log_warn, LogServiceType}, recognition::EmbeddingService};

use self::identity_store::IdentityStore;


#[derive(Clone)]
pub struct ModelController {
	store: Arc<IdentityStore>,
	embedder: Arc<EmbeddingService>,
	threshold: f32,
}


// Constructor
impl ModelController {
	pub fn new(store: IdentityStore, embedder: EmbeddingService, threshold: f32) -> Self {
		log_info(LogServiceType::Register, format!("Recognition threshold: {}", threshold));
		Self {
			store: Arc::new(store),
			embedder: Arc::new(embedder),
			threshold,
		}
	}

	pub async fn identity_count(&self) -> usize {
		self.store.len().await
	}

	pub fn model_loaded(&self) -> bool {
		self.embedder.is_loaded()
	}

	/// Closes the database once no other controller clone is alive.
	pub async fn close(self) -> error::Result<()> {
		match Arc::try_unwrap(self.store) {
			Ok(store) => store.close().await,
			Err(_) => {
				log_warn(LogServiceType::Database, "Identity store still in use, not closing".to_string());
				Ok(())
			}
		}
	}
}
