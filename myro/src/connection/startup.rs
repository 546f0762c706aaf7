//! Connection phase.
//!
//! <https://dev.mysql.com/doc/dev/mysql-server/latest/page_protocol_connection_phase.html>
use super::{Config, UnsupportedAuth};
use crate::{
    Result,
    common::{ByteStr, verbose},
    mysql::{
        MAX_PACKET_LEN, ProtocolError,
        backend::{AuthMessage, Handshake},
        capability,
        frontend::{AuthResponse, HandshakeResponse},
    },
    transport::{MyTransport, MyTransportExt},
};

pub(crate) const NATIVE_PASSWORD: &str = "mysql_native_password";
pub(crate) const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";

/// `caching_sha2_password` fast authentication succeed.
const FAST_AUTH_OK: u8 = 0x03;
/// `caching_sha2_password` requires full authentication.
const FULL_AUTH: u8 = 0x04;

/// Connection phase successful response.
#[derive(Debug)]
pub(crate) struct StartupResponse {
    pub connection_id: u32,
    pub server_version: ByteStr,
    pub capabilities: u32,
    pub status: u16,
}

/// Perform the handshake and authentication.
pub(crate) async fn startup<IO: MyTransport>(io: &mut IO, config: &Config) -> Result<StartupResponse> {
    verbose!(user = %config.user, "startup");

    let handshake = io.recv_as::<Handshake>().await?;

    verbose!(
        version = %handshake.server_version,
        connection_id = handshake.connection_id,
        plugin = %handshake.auth_plugin,
        "handshake"
    );

    if handshake.capabilities & capability::PROTOCOL_41 == 0 {
        return Err(ProtocolError::UnsupportedVersion(9).into());
    }

    let mut capabilities = capability::CLIENT & handshake.capabilities;
    if config.dbname.is_some() {
        capabilities |= capability::CONNECT_WITH_DB;
    }

    // default plugin we cannot speak is answered with native password,
    // server then switch to the plugin of the account
    let mut plugin = match scramble(&handshake.auth_plugin, &config.pass, &handshake.auth_data) {
        Ok(_) => handshake.auth_plugin.clone(),
        Err(_) => ByteStr::from_static(NATIVE_PASSWORD),
    };
    let auth_response = scramble(&plugin, &config.pass, &handshake.auth_data)?;

    io.send_continue(HandshakeResponse {
        capabilities,
        max_packet_size: MAX_PACKET_LEN as u32,
        charset: config.charset.id(),
        user: &config.user,
        auth_response: &auth_response,
        database: config.get_database(),
        auth_plugin: &plugin,
    });
    io.flush().await?;

    let ok = loop {
        match io.recv_as::<AuthMessage>().await? {
            AuthMessage::Ok(ok) => break ok,
            AuthMessage::Switch { plugin: next, data } => {
                verbose!(plugin = %next, "auth switch");
                let response = scramble(&next, &config.pass, &data)?;
                io.send_continue(AuthResponse { data: &response });
                io.flush().await?;
                plugin = next;
            }
            AuthMessage::MoreData(data) if plugin == CACHING_SHA2_PASSWORD => match data.first() {
                Some(&FAST_AUTH_OK) => {
                    verbose!("fast auth succeed");
                }
                Some(&FULL_AUTH) => return Err(UnsupportedAuth::FullAuthentication.into()),
                found => return Err(ProtocolError::unexpected(found, CACHING_SHA2_PASSWORD).into()),
            },
            AuthMessage::MoreData(data) => {
                return Err(ProtocolError::unexpected(data.first(), "Authentication").into());
            }
        }
    };

    Ok(StartupResponse {
        connection_id: handshake.connection_id,
        server_version: handshake.server_version,
        capabilities,
        status: ok.status,
    })
}

/// Authentication response of `plugin`.
fn scramble(plugin: &str, password: &str, nonce: &[u8]) -> Result<Vec<u8>, UnsupportedAuth> {
    if password.is_empty() {
        return match plugin {
            NATIVE_PASSWORD | CACHING_SHA2_PASSWORD => Ok(Vec::new()),
            _ => Err(UnsupportedAuth::Plugin(ByteStr::copy_from_str(plugin))),
        };
    }
    match plugin {
        NATIVE_PASSWORD => Ok(native_password(password, nonce).to_vec()),
        CACHING_SHA2_PASSWORD => Ok(caching_sha2_password(password, nonce).to_vec()),
        _ => Err(UnsupportedAuth::Plugin(ByteStr::copy_from_str(plugin))),
    }
}

/// `SHA1(password) XOR SHA1(nonce + SHA1(SHA1(password)))`
fn native_password(password: &str, nonce: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};

    let hash: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let double: [u8; 20] = Sha1::digest(hash).into();
    let scramble: [u8; 20] = Sha1::new().chain_update(nonce).chain_update(double).finalize().into();

    xor(hash, scramble)
}

/// `SHA256(password) XOR SHA256(SHA256(SHA256(password)) + nonce)`
fn caching_sha2_password(password: &str, nonce: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let hash: [u8; 32] = Sha256::digest(password.as_bytes()).into();
    let double: [u8; 32] = Sha256::digest(hash).into();
    let scramble: [u8; 32] = Sha256::new().chain_update(double).chain_update(nonce).finalize().into();

    xor(hash, scramble)
}

fn xor<const N: usize>(mut left: [u8; N], right: [u8; N]) -> [u8; N] {
    for (l, r) in left.iter_mut().zip(right) {
        *l ^= r;
    }
    left
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, Bytes, BytesMut};
    use sha1::{Digest, Sha1};

    use super::*;
    use crate::{
        ErrorKind,
        ext::BufMutExt,
        mysql::{header, status},
        transport::mock::MockTransport,
    };

    const NONCE: &[u8; 20] = b"abcdefghijklmnopqrst";

    fn handshake(plugin: &str) -> Bytes {
        let capabilities = capability::CLIENT | capability::CONNECT_WITH_DB;
        let mut buf = BytesMut::new();
        buf.put_u8(10);
        buf.put_nul_string("8.0.36");
        buf.put_u32_le(42);
        buf.put_slice(&NONCE[..8]);
        buf.put_u8(0);
        buf.put_u16_le(capabilities as u16);
        buf.put_u8(45);
        buf.put_u16_le(status::AUTOCOMMIT);
        buf.put_u16_le((capabilities >> 16) as u16);
        buf.put_u8(21);
        buf.put_bytes(0, 10);
        buf.put_slice(&NONCE[8..]);
        buf.put_u8(0);
        buf.put_nul_string(plugin);
        buf.freeze()
    }

    fn config() -> Config {
        Config::default().user("app").password("secret").database("shop")
    }

    #[test]
    fn native_password_is_verifiable() {
        let response = native_password("secret", NONCE);

        // server side check, with only the stored double hash
        let stored = Sha1::digest(Sha1::digest(b"secret"));
        let scramble = Sha1::new().chain_update(NONCE).chain_update(stored).finalize();
        let candidate = xor(response, scramble.into());
        assert_eq!(Sha1::digest(candidate), stored);
    }

    #[test]
    fn empty_password() {
        assert!(scramble(NATIVE_PASSWORD, "", NONCE).unwrap().is_empty());
        assert!(scramble(CACHING_SHA2_PASSWORD, "", NONCE).unwrap().is_empty());
        assert!(scramble("sha256_password", "", NONCE).is_err());
    }

    #[tokio::test]
    async fn native_password_login() {
        let mut io = MockTransport::new();
        io.push(handshake(NATIVE_PASSWORD)).push_ok_status(0, 0, status::AUTOCOMMIT);

        let res = startup(&mut io, &config()).await.unwrap();
        assert_eq!(res.connection_id, 42);
        assert_eq!(res.server_version, "8.0.36");
        assert_ne!(res.capabilities & capability::CONNECT_WITH_DB, 0);
        assert_eq!(res.status, status::AUTOCOMMIT);

        let response = &io.sent[0];
        // capabilities, max packet, charset, filler
        assert_eq!(response[8], 45);
        assert_eq!(&response[32..36], b"app\0");
        assert_eq!(response[36], 20);
        assert_eq!(&response[37..57], native_password("secret", NONCE));
        assert!(response.ends_with(b"shop\0mysql_native_password\0"));
    }

    #[tokio::test]
    async fn caching_sha2_fast_auth() {
        let mut io = MockTransport::new();
        io.push(handshake(CACHING_SHA2_PASSWORD))
            .push(Bytes::from_static(&[0x01, FAST_AUTH_OK]))
            .push_ok(0, 0);

        startup(&mut io, &config()).await.unwrap();
        assert_eq!(io.sent.len(), 1);
        assert_eq!(&io.sent[0][37..69], caching_sha2_password("secret", NONCE));
    }

    #[tokio::test]
    async fn caching_sha2_full_auth_is_unsupported() {
        let mut io = MockTransport::new();
        io.push(handshake(CACHING_SHA2_PASSWORD)).push(Bytes::from_static(&[0x01, FULL_AUTH]));

        let err = startup(&mut io, &config()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Unsupported(_)));
    }

    #[tokio::test]
    async fn auth_switch() {
        let mut switch = BytesMut::new();
        switch.put_u8(header::EOF);
        switch.put_nul_string(NATIVE_PASSWORD);
        switch.put_slice(b"zyxwvutsrqponmlkjihg");
        switch.put_u8(0);

        let mut io = MockTransport::new();
        io.push(handshake("sha256_password")).push(switch.freeze()).push_ok(0, 0);

        startup(&mut io, &config()).await.unwrap();
        assert_eq!(io.sent.len(), 2);
        // unknown default plugin is answered with native password
        assert!(io.sent[0].ends_with(b"mysql_native_password\0"));
        assert_eq!(&io.sent[1][..], native_password("secret", b"zyxwvutsrqponmlkjihg"));
    }

    #[tokio::test]
    async fn access_denied() {
        let mut io = MockTransport::new();
        io.push(handshake(NATIVE_PASSWORD))
            .push_err(1045, "28000", "Access denied for user 'app'");

        let err = startup(&mut io, &config()).await.unwrap_err();
        assert_eq!(err.as_server_error().map(|e| e.code()), Some(1045));
    }
}
