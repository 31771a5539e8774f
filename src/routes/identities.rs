
use crate::{model::{identities::{IdentityForAdd, IdentityForRecognition, IdentityForUpdate}, ModelController}, Result};
use axum::{extract::{Path, State}, routing::{delete, get, patch, post}, Json, Router};
use serde_json::{json, Value};



pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/", get(handler_list))
		.route("/", post(handler_post))
		.route("/recognize", post(handler_recognize))
		.route("/:name", patch(handler_patch))
		.route("/:name", delete(handler_delete))
		.with_state(mc)
}

async fn handler_list(State(mc): State<ModelController>) -> Result<Json<Value>> {
	let names = mc.get_identity_names().await?;
	Ok(Json(json!({ "names": names })))
}

async fn handler_post(State(mc): State<ModelController>, Json(identity): Json<IdentityForAdd>) -> Result<Json<Value>> {
	mc.add_identity(identity).await?;
	Ok(Json(json!({ "ok": true })))
}

async fn handler_recognize(State(mc): State<ModelController>, Json(request): Json<IdentityForRecognition>) -> Result<Json<Value>> {
	let found = mc.recognize_identity(request).await?;
	Ok(Json(json!({ "name": found.map(|m| m.name) })))
}

async fn handler_patch(Path(name): Path<String>, State(mc): State<ModelController>, Json(update): Json<IdentityForUpdate>) -> Result<Json<Value>> {
	mc.rename_identity(&name, update).await?;
	Ok(Json(json!({ "ok": true })))
}

async fn handler_delete(Path(name): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	mc.remove_identity(&name).await?;
	Ok(Json(json!({ "ok": true })))
}
