//! Client-side reconciliation of cart quantity inputs with the cart endpoint.
//!
//! A [`CartReconciler`] owns one scope of a page (the whole page or a single
//! `cart-<id>` container), keeps that scope's total display in step with its
//! quantity inputs, and saves accepted quantities through a [`SaveTransport`].

pub mod config;
pub mod csrf;
pub mod page;
pub mod reconciler;
pub mod surface;
pub mod transport;

pub use config::{BoundsPolicy, InputAttributes, ReconcilerConfig, SuccessPolicy, UiText};
pub use csrf::CsrfSource;
pub use page::{MemoryPage, PageSnapshot, SnapshotError};
pub use reconciler::{CartReconciler, LineInput, LiveEdit, SaveOutcome, SaveState};
pub use surface::{Border, CartSurface, InputKey, InputView, SaveButton, Scope};
pub use transport::{HttpTransport, SaveTransport, TransportError};

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod reconciler_tests;

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod transport_tests;
