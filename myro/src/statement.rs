//! Server side prepared statement handle.
use crate::{
    Result,
    binding::{Binding, InputBindings},
    error::{ParameterCountMismatch, Released},
    executor::Executor,
    mysql::frontend::{StmtClose, StmtExecute},
    sql::PrepareRequest,
    transport::{MyTransport, MyTransportExt},
    value::{ColumnKind, Value},
};

/// A statement prepared on the server.
///
/// The handle is bound to the connection that prepared it. Release it with
/// [`PreparedStatement::release`], dropping an unreleased statement leaks the
/// server handle until the connection is closed.
#[derive(Debug)]
pub struct PreparedStatement {
    id: Option<u32>,
    sql: String,
    return_id: Option<String>,
    kinds: Vec<ColumnKind>,
    params: u16,
    columns: u16,
    connection_id: u32,
    bindings: Option<InputBindings>,
}

impl PreparedStatement {
    pub(crate) fn new(
        id: u32,
        request: PrepareRequest,
        params: u16,
        columns: u16,
        connection_id: u32,
    ) -> Self {
        Self {
            id: Some(id),
            sql: request.sql,
            return_id: request.return_id,
            kinds: request.kinds,
            params,
            columns,
            connection_id,
            bindings: None,
        }
    }

    /// Server statement id, [`None`] if released.
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// The prepared statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of parameters declared by the server.
    pub fn params(&self) -> u16 {
        self.params
    }

    /// Number of result columns declared by the server.
    pub fn columns(&self) -> u16 {
        self.columns
    }

    /// Id of the connection that prepared this statement.
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    pub fn is_released(&self) -> bool {
        self.id.is_none()
    }

    /// Alias of the generated id to be returned after execution.
    pub(crate) fn return_id(&self) -> Option<&str> {
        self.return_id.as_deref()
    }

    /// Input bindings, [`None`] until the first execution.
    pub fn bindings(&self) -> Option<&InputBindings> {
        self.bindings.as_ref()
    }

    /// Bind parameters for the next execution.
    ///
    /// The binding set is allocated on first bind and reused afterwards.
    pub(crate) fn bind(&mut self, params: &[Option<Value>]) -> Result<(), ParameterCountMismatch> {
        let expected = self.params as usize;
        if params.len() != expected {
            return Err(ParameterCountMismatch { expected, found: params.len() });
        }
        self.bindings
            .get_or_insert_with(|| InputBindings::with_count(expected))
            .bind(params, &self.kinds)
    }

    /// Returns the statement id, if it is usable on `io`.
    pub(crate) fn handle_on<IO: MyTransport>(&self, io: &IO) -> Result<u32, Released> {
        match self.id {
            Some(id) if io.connection_id() == self.connection_id => Ok(id),
            _ => Err(Released),
        }
    }

    /// `COM_STMT_EXECUTE` with the current bindings.
    pub(crate) fn execute_message(&self, stmt_id: u32) -> StmtExecute<'_> {
        let params: &[Binding] = match &self.bindings {
            Some(bindings) => bindings.as_slice(),
            None => &[],
        };
        StmtExecute { stmt_id, params }
    }

    /// Invalidate the handle and drop the bindings.
    ///
    /// `COM_STMT_CLOSE` is buffered to `io` if the statement belongs to it,
    /// it is sent along the next command. Calling it more than once is noop.
    pub(crate) fn close_on<IO: MyTransport>(&mut self, io: &mut IO) {
        let Some(stmt_id) = self.id.take() else {
            return;
        };
        self.bindings = None;

        if io.connection_id() != self.connection_id || !io.is_connected() {
            #[cfg(feature = "log")]
            log::debug!("statement {stmt_id} released without connection, server handle is gone with it");
            return;
        }

        crate::common::verbose!(stmt_id, "close statement");
        io.send(StmtClose { stmt_id });
    }

    /// Release the server handle.
    ///
    /// Releasing an already released statement is noop.
    pub async fn release<E: Executor>(&mut self, exe: E) -> Result<()> {
        if self.id.is_none() {
            return Ok(());
        }
        let mut io = exe.connection().await?;
        self.close_on(&mut io);
        io.flush().await?;
        Ok(())
    }
}

impl Drop for PreparedStatement {
    fn drop(&mut self) {
        if let Some(_id) = self.id {
            #[cfg(feature = "log")]
            log::warn!("prepared statement {_id} ({:?}) dropped without release", self.sql);
        }
    }
}
