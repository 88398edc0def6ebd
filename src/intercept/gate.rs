//! Bearer-token authorization gate evaluated ahead of every other stage.

// self
use crate::{_prelude::*, intercept::HookFuture};

/// Validates a bearer token against the local identity system.
pub trait TokenValidator
where
	Self: Send + Sync,
{
	/// Resolves to `true` when `token` is accepted.
	fn check_token<'a>(&'a self, token: &'a str) -> HookFuture<'a, bool>;
}
impl<F> TokenValidator for F
where
	F: Fn(&str) -> bool + Send + Sync,
{
	fn check_token<'a>(&'a self, token: &'a str) -> HookFuture<'a, bool> {
		let accepted = self(token);

		Box::pin(async move { accepted })
	}
}

/// Rule list returned by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleSet {
	/// Every operation is permitted.
	AllowAll,
	/// Every operation is rejected.
	DenyAll,
}
impl RuleSet {
	/// Turns the rule list into a pass/fail result.
	pub fn enforce(self) -> Result<()> {
		match self {
			Self::AllowAll => Ok(()),
			Self::DenyAll => Err(Error::AccessDenied),
		}
	}
}

/// Decides, from the `Authorization` header alone, whether a request may proceed.
#[derive(Clone)]
pub struct AuthorizationGate {
	validator: Arc<dyn TokenValidator>,
}
impl AuthorizationGate {
	/// Creates a gate backed by `validator`.
	pub fn new(validator: impl TokenValidator + 'static) -> Self {
		Self { validator: Arc::new(validator) }
	}

	/// Extracts the token: the second whitespace-separated field of the header.
	pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
		authorization?.split_whitespace().nth(1)
	}

	/// Builds the rule list for a request; a missing or malformed header denies everything.
	pub async fn build_rule_list(&self, authorization: Option<&str>) -> RuleSet {
		let Some(token) = Self::bearer_token(authorization) else {
			return RuleSet::DenyAll;
		};

		if self.validator.check_token(token).await { RuleSet::AllowAll } else { RuleSet::DenyAll }
	}
}
impl Debug for AuthorizationGate {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("AuthorizationGate").finish_non_exhaustive()
	}
}
