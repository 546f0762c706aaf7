//! Result set metadata.
//!
//! A statement response is either an `OK` packet, or a result set:
//!
//! ```text
//! column count (length encoded integer)
//! column definition * column count
//! EOF
//! row *
//! EOF | ERR
//! ```
use bytes::{Buf, Bytes};
use std::sync::Arc;

use crate::{
    Result,
    binding::Binding,
    common::{ByteStr, verbose},
    ext::BytesExt,
    mysql::{BINARY_CHARSET, BackendProtocol, ColumnFlags, OkPacket, ProtocolError, WireType, header, is_eof},
    transport::{MyTransport, MyTransportExt},
};

/// Result set column metadata, `Protocol::ColumnDefinition41`.
///
/// <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_com_query_response_text_resultset_column_definition.html>
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    schema: ByteStr,
    table: ByteStr,
    org_table: ByteStr,
    name: ByteStr,
    org_name: ByteStr,
    charset: u16,
    length: u32,
    wire_type: WireType,
    flags: ColumnFlags,
    decimals: u8,
}

impl ColumnDescriptor {
    #[cfg(test)]
    pub(crate) fn new(name: &'static str, wire_type: WireType, flags: ColumnFlags, charset: u16, length: u32) -> Self {
        Self {
            schema: ByteStr::default(),
            table: ByteStr::default(),
            org_table: ByteStr::default(),
            name: ByteStr::from_static(name),
            org_name: ByteStr::from_static(name),
            charset,
            length,
            wire_type,
            flags,
            decimals: 0,
        }
    }

    /// Column name or alias.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical column name.
    pub fn org_name(&self) -> &str {
        &self.org_name
    }

    /// Table name or alias.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Physical table name.
    pub fn org_table(&self) -> &str {
        &self.org_table
    }

    /// Database name.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    /// Character set id.
    pub fn charset(&self) -> u16 {
        self.charset
    }

    /// Declared maximum length in bytes.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.is_unsigned()
    }

    pub fn is_nullable(&self) -> bool {
        !self.flags.is_not_null()
    }

    /// Returns `true` if value is raw bytes instead of text.
    pub fn is_binary(&self) -> bool {
        self.charset == BINARY_CHARSET
    }

    /// Returns `true` for `TINYINT(1)`.
    pub fn is_boolean(&self) -> bool {
        self.wire_type == WireType::Tiny && self.length == 1 && !self.is_unsigned()
    }
}

impl BackendProtocol for ColumnDescriptor {
    fn decode(mut payload: Bytes) -> Result<Self, ProtocolError> {
        let _catalog = payload.get_lenenc_bytes()?;
        let schema = payload.get_lenenc_bytestr()?;
        let table = payload.get_lenenc_bytestr()?;
        let org_table = payload.get_lenenc_bytestr()?;
        let name = payload.get_lenenc_bytestr()?;
        let org_name = payload.get_lenenc_bytestr()?;
        // length of fixed length fields, always 0x0C
        let _ = payload.get_lenenc_int()?;
        let charset = payload.try_get_u16_le()?;
        let length = payload.try_get_u32_le()?;
        let wire_type = WireType::from_code(payload.try_get_u8()?)?;
        let flags = ColumnFlags(payload.try_get_u16_le()?);
        let decimals = payload.try_get_u8()?;
        if payload.remaining() >= 2 {
            payload.advance(2);
        }
        Ok(Self { schema, table, org_table, name, org_name, charset, length, wire_type, flags, decimals })
    }
}

/// Statement response after metadata is read.
#[derive(Debug)]
pub(crate) enum Described {
    /// No result set.
    Done(OkPacket),
    /// Result set, rows follow.
    Columns(Arc<[ColumnDescriptor]>),
}

/// Read result set metadata following the first response packet.
///
/// An `OK` packet means the statement produce no result set.
pub(crate) async fn describe<IO: MyTransport>(io: &mut IO, mut first: Bytes) -> Result<Described> {
    match first.first() {
        Some(&header::OK) => Ok(Described::Done(OkPacket::decode(first)?)),
        Some(&header::LOCAL_INFILE) | None => {
            Err(ProtocolError::unexpected(first.first(), "describe").into())
        }
        Some(_) => {
            let count = first.get_lenenc_int()? as usize;
            let columns = read_definitions(io, count).await?;
            verbose!(columns = columns.len(), "result set described");
            Ok(Described::Columns(columns.into()))
        }
    }
}

/// Read `count` column definitions and the terminating `EOF`.
///
/// Parameter definitions of prepare response use the same format.
pub(crate) async fn read_definitions<IO: MyTransport>(io: &mut IO, count: usize) -> Result<Vec<ColumnDescriptor>> {
    let mut columns = Vec::with_capacity(count);
    for _ in 0..count {
        let packet = io.recv().await?;
        if is_eof(&packet) {
            return Err(ProtocolError::unexpected(packet.first(), "column definition").into());
        }
        columns.push(ColumnDescriptor::decode(packet)?);
    }
    let eof = io.recv().await?;
    if !is_eof(&eof) {
        return Err(ProtocolError::unexpected(eof.first(), "column definition end").into());
    }
    Ok(columns)
}

/// Allocate one output binding per column, sized by the column declaration.
pub(crate) fn bind_outputs(columns: &[ColumnDescriptor]) -> Vec<Binding> {
    columns.iter().map(Binding::output).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ErrorKind, transport::mock::MockTransport, types::OUTPUT_BUFFER_CEILING};

    #[tokio::test]
    async fn ok_is_no_result_set() {
        let mut io = MockTransport::new();
        io.push_ok(2, 0);
        let first = io.recv().await.unwrap();
        let Described::Done(ok) = describe(&mut io, first).await.unwrap() else {
            panic!("expected no result set")
        };
        assert_eq!(ok.affected_rows, 2);
    }

    #[tokio::test]
    async fn columns_and_outputs() {
        let mut io = MockTransport::new();
        io.push_columns(
            &[
                ("id", WireType::LongLong, ColumnFlags::UNSIGNED | ColumnFlags::PRIMARY_KEY),
                ("name", WireType::VarString, 0),
                ("body", WireType::LongBlob, ColumnFlags::BLOB | ColumnFlags::BINARY),
            ],
            true,
        );
        let first = io.recv().await.unwrap();
        let Described::Columns(columns) = describe(&mut io, first).await.unwrap() else {
            panic!("expected result set")
        };
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].name(), "id");
        assert!(columns[0].is_unsigned());
        assert_eq!(columns[1].wire_type(), WireType::VarString);
        assert!(!columns[1].is_binary());

        let outputs = bind_outputs(&columns);
        assert_eq!(outputs[0].capacity(), 8);
        assert_eq!(outputs[1].capacity(), 1020);
        assert!(outputs[2].capacity() <= OUTPUT_BUFFER_CEILING);
    }

    #[tokio::test]
    async fn missing_metadata_is_protocol_error() {
        let mut io = MockTransport::new();
        io.push(Bytes::from_static(&[2]));
        io.push_column("a", WireType::Long, 0).push_eof();
        let first = io.recv().await.unwrap();
        let err = describe(&mut io, first).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }
}
