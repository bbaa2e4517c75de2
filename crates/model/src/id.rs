use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Wraps a server-assigned identifier.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Returns the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}

			/// Returns true when the identifier is empty or whitespace.
			///
			/// Blank identifiers come from unselected form state and never name a
			/// real entity.
			pub fn is_blank(&self) -> bool {
				self.0.trim().is_empty()
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self::new(id)
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}
	};
}

string_id!(
	/// Server-assigned business identifier.
	BusinessId
);

string_id!(
	/// Server-assigned branch identifier.
	BranchId
);
