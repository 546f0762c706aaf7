//! Binary result set rows.
//!
//! ```text
//! u8    header, always 0x00
//! [u8]  null bitmap, (columns + 7 + 2) / 8, offset by 2 bits
//! [..]  non null values
//! ```
use bytes::{Buf, Bytes};
use futures_core::Stream;
use std::{
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};

use crate::{
    Result, Row,
    binding::Binding,
    common::verbose,
    describe::{ColumnDescriptor, bind_outputs},
    ext::BytesExt,
    mysql::{BackendProtocol, EofPacket, ProtocolError, header, is_eof, status},
    statement::PreparedStatement,
    transport::MyTransport,
    types,
};

/// Prepared statement used by a result set.
#[derive(Debug)]
pub(crate) enum StatementSlot<'s> {
    /// One shot statement, released when the result set finishes.
    Owned(PreparedStatement),
    /// Caller owned statement.
    Borrowed(&'s mut PreparedStatement),
    None,
}

impl StatementSlot<'_> {
    pub(crate) fn get_mut(&mut self) -> Option<&mut PreparedStatement> {
        match self {
            Self::Owned(stmt) => Some(stmt),
            Self::Borrowed(stmt) => Some(stmt),
            Self::None => None,
        }
    }

    /// Release the statement if it is owned.
    pub(crate) fn release_owned<IO: MyTransport>(&mut self, io: &mut IO) {
        if let Self::Owned(mut stmt) = mem::replace(self, Self::None) {
            stmt.close_on(io);
        }
    }

    /// Release the statement, caller owned one included.
    pub(crate) fn release<IO: MyTransport>(&mut self, io: &mut IO) {
        match mem::replace(self, Self::None) {
            Self::Owned(mut stmt) => stmt.close_on(io),
            Self::Borrowed(stmt) => stmt.close_on(io),
            Self::None => {}
        }
    }
}

#[derive(Debug)]
enum State {
    /// First row is prefetched.
    Fresh(Row),
    Streaming,
    Exhausted,
    Closed,
}

/// A result set, fetched one row at a time.
///
/// Remaining rows are discarded when fetcher is closed or dropped before
/// exhausted. Once finished, the fetcher never returns a row again.
#[derive(Debug)]
#[must_use = "unread rows are discarded on drop"]
pub struct RowFetcher<'s, IO: MyTransport> {
    io: IO,
    stmt: StatementSlot<'s>,
    columns: Arc<[ColumnDescriptor]>,
    outputs: Option<Vec<Binding>>,
    state: State,
}

impl<'s, IO: MyTransport> RowFetcher<'s, IO> {
    pub(crate) fn new(io: IO, stmt: StatementSlot<'s>, columns: Arc<[ColumnDescriptor]>) -> Self {
        let outputs = bind_outputs(&columns);
        Self { io, stmt, columns, outputs: Some(outputs), state: State::Streaming }
    }

    /// Empty fetcher, for statement without result set.
    pub(crate) fn exhausted(io: IO) -> Self {
        Self {
            io,
            stmt: StatementSlot::None,
            columns: Arc::from([]),
            outputs: None,
            state: State::Exhausted,
        }
    }

    /// Read the first row ahead.
    pub(crate) async fn prefetch(&mut self) -> Result<()> {
        if let Some(row) = self.fetch_next().await? {
            self.state = State::Fresh(row);
        }
        Ok(())
    }

    /// Returns the result set description.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Returns `true` if no more row will be returned.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Exhausted | State::Closed)
    }

    /// Returns the output buffers of the current row, [`None`] once finished.
    pub fn outputs(&self) -> Option<&[Binding]> {
        self.outputs.as_deref()
    }

    /// Fetch the next row.
    ///
    /// An error is returned once, the fetcher is finished afterwards.
    pub async fn fetch_next(&mut self) -> Result<Option<Row>> {
        std::future::poll_fn(|cx| self.poll_fetch(cx)).await
    }

    /// Poll for the next row.
    pub fn poll_fetch(&mut self, cx: &mut Context) -> Poll<Result<Option<Row>>> {
        match mem::replace(&mut self.state, State::Streaming) {
            State::Fresh(row) => return Poll::Ready(Ok(Some(row))),
            State::Streaming => {}
            finished @ (State::Exhausted | State::Closed) => {
                self.state = finished;
                return Poll::Ready(Ok(None));
            }
        }

        let packet = match ready!(self.io.poll_recv(cx)) {
            Ok(ok) => ok,
            Err(err) => {
                // `ERR` terminates the statement, io error breaks the connection
                #[cfg(feature = "log")]
                log::error!("fetching row failed: {err}");
                self.stmt.release(&mut self.io);
                self.finish();
                return Poll::Ready(Err(err));
            }
        };

        if is_eof(&packet) {
            let eof = match EofPacket::decode(packet) {
                Ok(ok) => ok,
                Err(err) => {
                    self.finish();
                    return Poll::Ready(Err(err.into()));
                }
            };
            if eof.status & status::MORE_RESULTS_EXISTS != 0 {
                verbose!("discarding subsequent result");
                self.io.discard_response();
            }
            verbose!(warnings = eof.warnings, "result set exhausted");
            self.finish();
            return Poll::Ready(Ok(None));
        }

        match self.decode_row(packet) {
            Ok(row) => Poll::Ready(Ok(Some(row))),
            Err(err) => {
                #[cfg(feature = "log")]
                log::error!("decoding row failed: {err}");
                self.io.drain_request();
                self.finish();
                Poll::Ready(Err(err))
            }
        }
    }

    fn decode_row(&mut self, mut packet: Bytes) -> Result<Row> {
        let Some(outputs) = self.outputs.as_mut() else {
            return Err(ProtocolError::unexpected(packet.first(), "released result set").into());
        };

        let found = packet.try_get_u8().map_err(ProtocolError::from)?;
        if found != header::OK {
            return Err(ProtocolError::unexpected(Some(&found), "binary row").into());
        }

        let bitmap = packet.try_split_to((self.columns.len() + 7 + 2) / 8)?;

        for (i, (output, column)) in outputs.iter_mut().zip(self.columns.iter()).enumerate() {
            let bit = i + 2;
            if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
                output.fill_null();
                continue;
            }
            let raw = types::split_value(column.wire_type(), &mut packet)?;
            output.fill(&raw);
        }

        let values = outputs
            .iter()
            .zip(self.columns.iter())
            .map(|(output, column)| output.decode(column))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Row::new(self.columns.clone(), values))
    }

    /// Release buffers and owned statement.
    fn finish(&mut self) {
        self.outputs = None;
        self.stmt.release_owned(&mut self.io);
        self.state = State::Exhausted;
    }

    /// Discard remaining rows and release resources.
    ///
    /// Calling it more than once is noop.
    pub fn close(&mut self) {
        match self.state {
            State::Closed => return,
            State::Exhausted => {}
            State::Fresh(_) | State::Streaming => {
                verbose!("result set closed before exhausted");
                self.io.drain_request();
            }
        }
        self.finish();
        self.state = State::Closed;
    }
}

impl<IO: MyTransport> Stream for RowFetcher<'_, IO> {
    type Item = Result<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_fetch(cx).map(Result::transpose)
    }
}

impl<IO: MyTransport> Drop for RowFetcher<'_, IO> {
    fn drop(&mut self) {
        self.close();
    }
}
