use std::sync::Arc;

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use derive_more::From;
use serde_json::json;
use serde_with::{serde_as, DisplayFromStr};
use nanoid::nanoid;

use crate::tools::log::{log_error, log_warn, LogServiceType};

pub type Result<T> = core::result::Result<T, Error>;

#[serde_as]
#[derive(Debug, Serialize, From, strum_macros::AsRefStr)]
#[serde(tag = "type", content = "data")]
pub enum Error {
	// -- Servers errors.
	ServerMalformatedConfigFile,
	ServerUnableToAccessServerLocalFolder,
	ServerUnableToWriteConfig,

	// -- Externals

	#[from]
	Model(#[serde_as(as = "DisplayFromStr")] crate::model::error::Error),

	#[from]
	Io(#[serde_as(as = "DisplayFromStr")] std::io::Error),

	#[from]
	Serde(#[serde_as(as = "DisplayFromStr")] serde_json::Error),
}

// region:    --- Error Boilerplate
impl core::fmt::Display for Error {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}
// endregion: --- Error Boilerplate

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let nanoid = nanoid!();
		let (status_code, client_error) = self.client_status_and_error();
		if status_code.is_server_error() {
			log_error(LogServiceType::Other, format!("{} {:?}", nanoid, self));
		} else {
			log_warn(LogServiceType::Other, format!("{} rejected request: {:?}", nanoid, self));
		}

		let mut error = json!({
			"type": client_error.as_ref(),
			"req_uuid": nanoid.to_string(),
		});
		if let Some(message) = client_error.message() {
			error["message"] = json!(message);
		}

		let mut error_response = (status_code, Json(json!({ "error": error }))).into_response();

		// Insert the Error into the reponse.
		error_response.extensions_mut().insert(Arc::new(self));

		error_response
	}
}

impl Error {
	pub fn client_status_and_error(&self) -> (StatusCode, ClientError) {
		#[allow(unreachable_patterns)]
		match self {
			Self::Model(err) => err.client_status_and_error(),
			Self::Serde(_) => (StatusCode::BAD_REQUEST, ClientError::INVALID_PARAMS),

			// -- Fallback.
			_ => (
				StatusCode::INTERNAL_SERVER_ERROR,
				ClientError::SERVICE_ERROR,
			),
		}
	}
}


#[derive(Debug, strum_macros::AsRefStr)]
#[allow(non_camel_case_types)]
pub enum ClientError {
	NOT_FOUND,
	DUPLICATE(String),
	INVALID_PARAMS,
	SERVICE_ERROR,
	Custom(String),
}

impl ClientError {
	pub fn message(&self) -> Option<String> {
		match self {
			Self::DUPLICATE(name) => Some(format!("Identity {} already exists", name)),
			Self::Custom(message) => Some(message.clone()),
			_ => None,
		}
	}
}
