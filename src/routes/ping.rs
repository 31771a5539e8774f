use crate::{model::ModelController, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};


pub fn routes(mc: ModelController) -> Router {
	Router::new().route("/", get(handler_ping)).with_state(mc)
}

async fn handler_ping(State(mc): State<ModelController>) -> Result<Json<Value>> {
	let body = Json(json!({
		"result": {
			"success": true,
			"identities": mc.identity_count().await,
			"model_loaded": mc.model_loaded(),
		}
	}));

	Ok(body)
}
