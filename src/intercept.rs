//! Interception pipeline mirroring local FHIR writes to the remote system.
//!
//! Stages, in request order:
//!
//! 1. [`AuthorizationGate`] turns the caller's bearer token into an allow-all or deny-all
//!    [`RuleSet`].
//! 2. [`Interceptor::pre_check`] asks the adapter (through an [`AdapterProbe`]) whether the
//!    write may go ahead.
//! 3. [`Interceptor::pre_handle`] resets the saved marker and, for updates, stashes the
//!    server-side copy fetched through a [`LocalResourceClient`].
//! 4. The hosting server performs the local write.
//! 5. [`RelayDispatcher`] POSTs the written resource to the adapter and defers failures to
//!    the [`AdapterErrorPolicy`].
//!
//! Stages 2, 3, and 5 step aside for requests carrying the [`LoopGuard`] marker.

pub mod context;
pub mod envelope;
pub mod gate;
pub mod guard;
pub mod local;
pub mod pipeline;
pub mod policy;
pub mod probe;
pub mod relay;

pub use context::*;
pub use envelope::*;
pub use gate::*;
pub use guard::*;
pub use local::*;
pub use pipeline::*;
pub use policy::*;
pub use probe::*;
pub use relay::*;

// self
use crate::_prelude::*;

/// Boxed future returned by the pipeline's pluggable hooks.
pub type HookFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;
