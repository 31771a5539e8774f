use derive_more::From;
use hyper::StatusCode;
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};

use crate::{error::ClientError, tools::{alignment::AlignmentError, image_tools::ImageError, recognition::RecognitionError}};


pub type Result<T> = core::result::Result<T, Error>;

#[serde_as]
#[derive(Debug, Serialize, From, strum_macros::AsRefStr)]
pub enum Error {
	NotFound(String),
	Duplicate(String),

	InvalidName,
	MissingImage,
	InvalidEmbedding(usize),
	InvalidSearchLimit,

	// -- Externals
	#[from]
	Alignment(#[serde_as(as = "DisplayFromStr")] AlignmentError),

	#[from]
	Image(#[serde_as(as = "DisplayFromStr")] ImageError),

	#[from]
	Recognition(#[serde_as(as = "DisplayFromStr")] RecognitionError),

	#[from]
	TokioRusqlite(#[serde_as(as = "DisplayFromStr")] tokio_rusqlite::Error),

	#[from]
	Join(#[serde_as(as = "DisplayFromStr")] tokio::task::JoinError),
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


impl Error {
	pub fn client_status_and_error(&self) -> (StatusCode, ClientError) {
		#[allow(unreachable_patterns)]
		match self {
			Error::NotFound(_) => (StatusCode::NOT_FOUND, ClientError::NOT_FOUND),
			Error::Duplicate(name) => (StatusCode::CONFLICT, ClientError::DUPLICATE(name.to_string())),

			Error::InvalidName => (StatusCode::BAD_REQUEST, ClientError::Custom("A non empty name is required".to_string())),
			Error::MissingImage => (StatusCode::BAD_REQUEST, ClientError::Custom("An image is required".to_string())),
			Error::InvalidEmbedding(len) => (StatusCode::BAD_REQUEST, ClientError::Custom(format!("Invalid embedding length {}", len))),
			Error::InvalidSearchLimit => (StatusCode::BAD_REQUEST, ClientError::INVALID_PARAMS),

			Error::Alignment(AlignmentError::InsufficientKeypoints(count)) => (StatusCode::BAD_REQUEST, ClientError::Custom(format!("At least 4 keypoints are required, got {}", count))),
			Error::Alignment(AlignmentError::DegenerateInput) => (StatusCode::BAD_REQUEST, ClientError::Custom("Keypoints are degenerate".to_string())),
			Error::Image(_) => (StatusCode::BAD_REQUEST, ClientError::Custom("Unable to decode image".to_string())),

			Error::Recognition(_) => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),
			Error::TokioRusqlite(_) => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),

			_ => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),
		}
	}
}
