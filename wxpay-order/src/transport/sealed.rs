//! Sealed trait marker for [`Transport`](super::Transport) implementations.
//!
//! Only this crate may implement the trait, so every request path enforces the HTTPS
//! endpoint policy.

pub(crate) mod private {
    /// Sealed trait marker.
    pub trait Sealed {}
}
