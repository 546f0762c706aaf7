//! Statement lifecycle.
//!
//! ```text
//! COM_STMT_PREPARE ─▶ COM_STMT_EXECUTE ─┬▶ result set ─▶ rows ─▶ COM_STMT_CLOSE
//!                                       └▶ OK ──────────────────▶ COM_STMT_CLOSE
//! ```
//!
//! A statement prepared for a single call is owned by the call and released
//! when it finishes, including on error. A caller owned statement outlives a
//! successful execution, but is released once the server rejects it.
use std::fmt;

use crate::{
    ErrorKind, Result,
    common::{ByteStr, verbose},
    describe::{Described, describe, read_definitions},
    error::ConnectionClosed,
    fetch::{RowFetcher, StatementSlot},
    mysql::{
        BackendProtocol, OkPacket, ProtocolError,
        backend::PrepareOk,
        frontend::{StmtClose, StmtPrepare},
        header,
    },
    sql::PrepareRequest,
    statement::PreparedStatement,
    transport::{MyTransport, MyTransportExt},
    value::Value,
};

/// Outcome of a statement execution.
#[derive(Debug)]
pub enum QueryResult<'s, IO: MyTransport> {
    /// Statement produce a result set.
    ResultSet(RowFetcher<'s, IO>),
    /// Statement affected rows or generated an id.
    Success(Summary),
    /// Statement completed without result set and affected nothing.
    SuccessNoData,
}

impl<'s, IO: MyTransport> QueryResult<'s, IO> {
    /// Returns the result set, if any.
    pub fn into_result_set(self) -> Option<RowFetcher<'s, IO>> {
        match self {
            Self::ResultSet(fetcher) => Some(fetcher),
            _ => None,
        }
    }

    /// Returns the execution summary, if statement produce no result set.
    pub fn summary(&self) -> Option<Summary> {
        match self {
            Self::ResultSet(_) => None,
            Self::Success(summary) => Some(summary.clone()),
            Self::SuccessNoData => Some(Summary::default()),
        }
    }
}

/// Completion information of a statement without result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub warnings: u16,
    /// Server provided message, e.g. `Rows matched: 1  Changed: 1  Warnings: 0`.
    pub info: ByteStr,
}

impl From<OkPacket> for Summary {
    fn from(ok: OkPacket) -> Self {
        Self {
            affected_rows: ok.affected_rows,
            last_insert_id: ok.last_insert_id,
            warnings: ok.warnings,
            info: ok.info,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows affected", self.affected_rows)
    }
}

/// Execution outcome keeping the transport for statement without result set.
pub(crate) enum Executed<'s, IO: MyTransport> {
    ResultSet(RowFetcher<'s, IO>),
    Done { io: IO, summary: Summary },
}

impl<'s, IO: MyTransport> Executed<'s, IO> {
    pub(crate) fn into_result(self) -> QueryResult<'s, IO> {
        match self {
            Self::ResultSet(fetcher) => QueryResult::ResultSet(fetcher),
            Self::Done { summary, .. } if summary.affected_rows == 0 && summary.last_insert_id == 0 => {
                QueryResult::SuccessNoData
            }
            Self::Done { summary, .. } => QueryResult::Success(summary),
        }
    }

    /// Returns the result set, or an empty one.
    pub(crate) fn into_fetcher(self) -> RowFetcher<'s, IO> {
        match self {
            Self::ResultSet(fetcher) => fetcher,
            Self::Done { io, .. } => RowFetcher::exhausted(io),
        }
    }
}

/// Prepare a statement on `io`.
///
/// Server rejection is reported as [`Syntax`][crate::ErrorKind::Syntax] error.
pub(crate) async fn prepare<IO: MyTransport>(io: &mut IO, request: PrepareRequest) -> Result<PreparedStatement> {
    verbose!(sql = %request.sql, "prepare");

    if !io.is_connected() {
        return Err(ConnectionClosed.into());
    }

    io.send(StmtPrepare { sql: &request.sql });
    let first = io.recv().await.map_err(crate::Error::into_syntax)?;
    let ok = match PrepareOk::decode(first.clone()) {
        Ok(ok) => ok,
        Err(err) => {
            if let Some(stmt_id) = prepared_id(&first) {
                #[cfg(feature = "log")]
                log::error!("malformed prepare response, closing statement {stmt_id}: {err}");
                io.send(StmtClose { stmt_id });
            }
            return Err(err.into());
        }
    };

    verbose!(stmt_id = ok.stmt_id, params = ok.params, columns = ok.columns, "prepared");

    let mut stmt = PreparedStatement::new(ok.stmt_id, request, ok.params, ok.columns, io.connection_id());

    match read_prepare_definitions(io, &ok).await {
        Ok(()) => Ok(stmt),
        Err(err) => {
            stmt.close_on(io);
            Err(err)
        }
    }
}

/// Statement id of a `COM_STMT_PREPARE_OK` too short to decode.
fn prepared_id(payload: &[u8]) -> Option<u32> {
    match payload {
        [header::OK, id @ ..] => Some(u32::from_le_bytes(id.get(..4)?.try_into().ok()?)),
        _ => None,
    }
}

/// Parameter and column definitions are not used, the column definitions
/// are sent again on execution.
async fn read_prepare_definitions<IO: MyTransport>(io: &mut IO, ok: &PrepareOk) -> Result<()> {
    if ok.params > 0 {
        read_definitions(io, ok.params as usize).await?;
    }
    if ok.columns > 0 {
        read_definitions(io, ok.columns as usize).await?;
    }
    Ok(())
}

/// Execute statement in `slot` with `params`.
///
/// Owned statement is released when execution fails, when statement produce
/// no result set, or when the returned result set finishes.
///
/// If the statement requests its generated id, `SELECT LAST_INSERT_ID()` is
/// prepared and executed next, and its result set is returned instead.
pub(crate) async fn execute<'s, IO: MyTransport>(
    mut io: IO,
    mut slot: StatementSlot<'s>,
    params: &[Option<Value>],
) -> Result<Executed<'s, IO>> {
    let return_id = slot.get_mut().and_then(|stmt| stmt.return_id().map(str::to_owned));

    let summary = match run(&mut io, &mut slot, params).await? {
        Described::Columns(columns) => return start(io, slot, columns).await,
        Described::Done(ok) => Summary::from(ok),
    };

    let Some(alias) = return_id else {
        return Ok(Executed::Done { io, summary });
    };

    verbose!(last_insert_id = summary.last_insert_id, "returning generated id");

    let stmt = prepare(&mut io, PrepareRequest::last_insert_id(&alias)).await?;
    let mut slot = StatementSlot::Owned(stmt);
    match run(&mut io, &mut slot, &[]).await? {
        Described::Columns(columns) => start(io, slot, columns).await,
        Described::Done(_) => Err(ProtocolError::unexpected(None, "LAST_INSERT_ID result set").into()),
    }
}

/// Bind, execute and describe.
///
/// Owned statement is released unless a result set follows. Any statement is
/// released when execution fails past the local checks.
async fn run<IO: MyTransport>(
    io: &mut IO,
    slot: &mut StatementSlot<'_>,
    params: &[Option<Value>],
) -> Result<Described> {
    let result = execute_statement(io, slot, params).await;
    match &result {
        Ok(Described::Columns(_)) => {}
        Err(err) if !is_local(err) => slot.release(io),
        _ => slot.release_owned(io),
    }
    result
}

/// Errors raised before `COM_STMT_EXECUTE` is sent.
fn is_local(err: &crate::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ParameterCountMismatch(_) | ErrorKind::Released(_) | ErrorKind::Connection(_)
    )
}

async fn execute_statement<IO: MyTransport>(
    io: &mut IO,
    slot: &mut StatementSlot<'_>,
    params: &[Option<Value>],
) -> Result<Described> {
    let Some(stmt) = slot.get_mut() else {
        return Err(crate::error::Released.into());
    };

    if !io.is_connected() {
        return Err(ConnectionClosed.into());
    }

    let stmt_id = stmt.handle_on(&*io)?;
    stmt.bind(params)?;

    verbose!(stmt_id, "execute");

    io.send(stmt.execute_message(stmt_id));
    io.flush().await?;

    let first = io.recv().await?;
    describe(io, first).await
}

async fn start<'s, IO: MyTransport>(
    io: IO,
    slot: StatementSlot<'s>,
    columns: std::sync::Arc<[crate::describe::ColumnDescriptor]>,
) -> Result<Executed<'s, IO>> {
    let mut fetcher = RowFetcher::new(io, slot, columns);
    fetcher.prefetch().await?;
    Ok(Executed::ResultSet(fetcher))
}
