use branchline_model::GuardError;
use thiserror::Error;

use crate::CacheKey;

/// Classified failure reported by the transport collaborator.
///
/// Cloned into every reader attached to the same fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The server could not be reached.
	#[error("network error: {0}")]
	Network(String),
	/// The credential was rejected; the session must re-authenticate.
	#[error("authentication rejected: {0}")]
	Auth(String),
	/// The server rejected the payload shape or a business rule.
	#[error("validation failed: {0}")]
	Validation(String),
	/// A referenced parent no longer exists.
	#[error("not found: {0}")]
	NotFound(String),
}

impl TransportError {
	/// Returns true for credential rejections.
	pub fn is_auth(&self) -> bool {
		matches!(self, Self::Auth(_))
	}
}

/// Errors surfaced by cache mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// The transport write or a required context fetch failed.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// A local consistency guard rejected the mutation.
	#[error(transparent)]
	Guard(#[from] GuardError),
	/// Context needed to validate the mutation is not cached and could not be loaded.
	#[error("{0} is not loaded")]
	NotLoaded(CacheKey),
	/// The mutation targets a blank parent identifier.
	#[error("mutation targets an unknown business")]
	UnknownParent,
}

impl Error {
	/// Returns true when the failure was raised locally, before any write was sent.
	///
	/// Local failures carry no retry affordance.
	pub fn is_local(&self) -> bool {
		!matches!(self, Self::Transport(_))
	}
}

/// Result type for cache mutations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
