//! Facade crate re-exporting the `iop-p2p-core` workspace members.
//!
//! Downstream crates typically depend on [`iop_p2p`], [`iop_net_poll`] and
//! [`iop_common`] directly; this crate exists so the workspace can also be
//! consumed as a single dependency with feature-gated re-exports.

#[cfg(feature = "iop-common")]
pub use iop_common;
#[cfg(feature = "iop-net")]
pub use iop_net;
#[cfg(feature = "iop-net-poll")]
pub use iop_net_poll;
#[cfg(feature = "iop-p2p")]
pub use iop_p2p;
