//! Principal identifier keying remote sessions.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const PRINCIPAL_MAX_LEN: usize = 256;

/// Error returned when a principal identifier fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Principal identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace or control characters.
	#[error("Principal identifier contains whitespace or control characters.")]
	InvalidCharacter,
	/// The identifier exceeded the allowed byte length.
	#[error("Principal identifier exceeds {max} bytes.")]
	TooLong {
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

/// Authenticated principal (or session) that owns one remote token pair.
///
/// Passed explicitly through every token call; nothing is read from ambient context.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);
impl PrincipalId {
	/// Validates and wraps `value`.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for PrincipalId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for PrincipalId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for PrincipalId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<PrincipalId> for String {
	fn from(value: PrincipalId) -> Self {
		value.0
	}
}
impl TryFrom<String> for PrincipalId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for PrincipalId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for PrincipalId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Principal({})", self.0)
	}
}
impl Display for PrincipalId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(|c| c.is_whitespace() || c.is_control()) {
		return Err(IdentifierError::InvalidCharacter);
	}
	if view.len() > PRINCIPAL_MAX_LEN {
		return Err(IdentifierError::TooLong { max: PRINCIPAL_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn principals_reject_blank_and_spaced_values() {
		assert_eq!(PrincipalId::new(""), Err(IdentifierError::Empty));
		assert_eq!(PrincipalId::new(" alice"), Err(IdentifierError::InvalidCharacter));
		assert_eq!(PrincipalId::new("ali\tce"), Err(IdentifierError::InvalidCharacter));

		let principal = PrincipalId::new("alice@clinic.example.org")
			.expect("E-mail style usernames should be accepted.");

		assert_eq!(principal.as_ref(), "alice@clinic.example.org");
		assert_eq!(format!("{principal:?}"), "Principal(alice@clinic.example.org)");
	}

	#[test]
	fn serde_enforces_validation() {
		let principal: PrincipalId =
			serde_json::from_str("\"session-42\"").expect("Principal should deserialize.");

		assert_eq!(principal.as_ref(), "session-42");
		assert!(serde_json::from_str::<PrincipalId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_enforced() {
		PrincipalId::new("a".repeat(PRINCIPAL_MAX_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			PrincipalId::new("a".repeat(PRINCIPAL_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { max: PRINCIPAL_MAX_LEN })
		);
	}

	#[test]
	fn borrowed_str_lookup_hits_the_session_map() {
		let map: HashMap<PrincipalId, u8> = HashMap::from_iter([(
			PrincipalId::new("alice").expect("Principal used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("alice"), Some(&7));
	}
}
