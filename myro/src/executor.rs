//! The [`Executor`] trait.
use std::future::Ready;

use crate::{Result, transport::MyTransport};

/// A source of [`MyTransport`] for one operation.
///
/// Implemented for `&mut` of any transport, including [`Connection`] and
/// [`Transaction`], and for [`SharedConnection`] which waits for exclusive
/// access.
///
/// [`Connection`]: crate::Connection
/// [`Transaction`]: crate::Transaction
/// [`SharedConnection`]: crate::SharedConnection
pub trait Executor: Unpin {
    /// The returned transport.
    type Transport: MyTransport;

    /// Future that resolve to [`Executor::Transport`].
    type Future: Future<Output = Result<Self::Transport>> + Unpin;

    /// Acquire the transport.
    fn connection(self) -> Self::Future;
}

impl<T: MyTransport> Executor for &mut T {
    type Transport = Self;

    type Future = Ready<Result<Self>>;

    fn connection(self) -> Self::Future {
        std::future::ready(Ok(self))
    }
}
