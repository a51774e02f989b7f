//! Encoding and decoding of [Query](https://wiki.vg/Query) packets.
//!
//! Everything here works on in-memory buffers, socket handling lives in
//! [crate::transport].

use crate::{
    query::{FullResponse, SimpleResponse},
    session::{ChallengeToken, SessionId},
    QueryErr,
};
use std::str::FromStr;

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const TYPE_HANDSHAKE: u8 = 0x09;
const TYPE_STAT: u8 = 0x00;
// Type byte plus session id.
const HEADER_LEN: usize = 5;
// Full stat request payload must be padded to 8 bytes, the padding is what
// makes the server answer with a full stat.
const FULL_STAT_PADDING: [u8; 4] = [0x00; 4];
// `splitnum\0\x80\0`
const KEY_VALUE_PADDING_LEN: usize = 11;
// `\x01player_\0\0`, follows the empty key ending the key/value section.
const PLAYER_PADDING_LEN: usize = 10;

/// Pull based tokenizer over NUL-terminated fields.
///
/// Yields the bytes before each `0x00`. Trailing bytes without a terminator
/// are never yielded, the iterator simply ends.
#[derive(Debug, Clone)]
pub struct NulTokens<'a> {
    bufs: &'a [u8],
}

impl<'a> NulTokens<'a> {
    pub fn new(bufs: &'a [u8]) -> Self {
        Self { bufs }
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.bufs
    }

    /// Consume exactly `len` raw bytes, regardless of NULs among them.
    pub fn take_bytes(&mut self, len: usize, field: &str) -> Result<&'a [u8], QueryErr> {
        if self.bufs.len() < len {
            return Err(truncated_field(field, len, self.bufs.len()));
        }

        let (taken, rest) = self.bufs.split_at(len);
        self.bufs = rest;

        Ok(taken)
    }

    pub fn skip_bytes(&mut self, len: usize, field: &str) -> Result<(), QueryErr> {
        self.take_bytes(len, field).map(|_| ())
    }

    /// Next token, failing when no terminated field is left.
    pub fn next_field(&mut self, field: &str) -> Result<&'a [u8], QueryErr> {
        self.next().ok_or_else(|| missing_field(field))
    }

    pub fn next_text(&mut self, field: &str) -> Result<String, QueryErr> {
        self.next_field(field).map(decode_text)
    }
}

impl<'a> Iterator for NulTokens<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.bufs.iter().position(|&b| b == 0x00)?;
        let token = &self.bufs[..end];
        self.bufs = &self.bufs[end + 1..];

        Some(token)
    }
}

fn missing_field(field: &str) -> QueryErr {
    QueryErr::MalformedResponse(format!(
        "Query response is missing the NUL-terminated {} field",
        field
    ))
}

fn truncated_field(field: &str, expected: usize, got: usize) -> QueryErr {
    QueryErr::MalformedResponse(format!(
        "Query response truncated at {}, expected {} bytes but only {} left",
        field, expected, got
    ))
}

/// Decode text sent by the server.
///
/// Valid UTF-8 is kept as is. Anything else is read as ISO-8859-1, which is
/// how servers send `server.properties` text such as `§` color codes.
pub fn decode_text(bufs: &[u8]) -> String {
    match std::str::from_utf8(bufs) {
        Ok(str) => str.into(),
        Err(_) => bufs.iter().map(|&b| b as char).collect(),
    }
}

fn parse_lenient<T: FromStr + Default>(str: &str) -> T {
    str.trim().parse().unwrap_or_default()
}

/// Build the [handshake request](https://wiki.vg/Query#Request).
pub fn encode_challenge_request(session_id: SessionId) -> Vec<u8> {
    [
        MAGIC.as_slice(),
        [TYPE_HANDSHAKE].as_slice(),
        session_id.to_bytes().as_slice(),
    ]
    .concat()
}

/// Build the basic stat request.
pub fn encode_simple_request(session_id: SessionId, token: ChallengeToken) -> Vec<u8> {
    [
        MAGIC.as_slice(),
        [TYPE_STAT].as_slice(),
        session_id.to_bytes().as_slice(),
        token.to_bytes().as_slice(),
    ]
    .concat()
}

/// Build the full stat request, the basic request plus 4 bytes of padding.
pub fn encode_full_request(session_id: SessionId, token: ChallengeToken) -> Vec<u8> {
    [
        encode_simple_request(session_id, token).as_slice(),
        FULL_STAT_PADDING.as_slice(),
    ]
    .concat()
}

/// Check type byte and echoed session id, returning the payload after them.
fn check_header(bufs: &[u8], expected_type: u8, session_id: SessionId) -> Result<&[u8], QueryErr> {
    match bufs.first() {
        Some(&packet_type) if packet_type != expected_type => {
            return Err(QueryErr::MalformedHeader(format!(
                "Response packet invalid, expected start with 0x{:02X}, but got: 0x{:02X}",
                expected_type, packet_type
            )));
        }
        Some(_) => {}
        None => {
            return Err(QueryErr::MalformedResponse("Response packet is empty".into()));
        }
    }

    let echoed: [u8; 4] = match bufs.get(1..HEADER_LEN).and_then(|b| b.try_into().ok()) {
        Some(echoed) => echoed,
        None => {
            return Err(QueryErr::MalformedResponse(format!(
                "Response packet len invalid, expected at least {} bytes, but got: {}",
                HEADER_LEN,
                bufs.len()
            )));
        }
    };
    let echoed = SessionId::from_bytes(echoed);

    if echoed != session_id {
        return Err(QueryErr::MalformedHeader(format!(
            "Query session ID mismatch, expected: {}, but got: {}",
            session_id, echoed
        )));
    }

    Ok(&bufs[HEADER_LEN..])
}

/// Decode the [handshake response](https://wiki.vg/Query#Response) into a challenge token.
///
/// The token is read up to the first NUL, or the end of the buffer when the
/// server omitted the terminator. Negative values are accepted and kept in
/// two's complement, values of any magnitude keep their lower 32 bits.
pub fn decode_challenge(bufs: &[u8], session_id: SessionId) -> Result<ChallengeToken, QueryErr> {
    let payload = check_header(bufs, TYPE_HANDSHAKE, session_id)?;
    let token_bufs = match payload.iter().position(|&b| b == 0x00) {
        Some(end) => &payload[..end],
        None => payload,
    };

    if token_bufs.is_empty() {
        return Err(QueryErr::MalformedChallenge(
            "Query handshake response carries no challenge token".into(),
        ));
    }

    let token_str = std::str::from_utf8(token_bufs).map_err(|err| {
        QueryErr::MalformedChallenge(format!("Challenge token is not ASCII text: {}", err))
    })?;

    match parse_wrapping_i32(token_str) {
        Some(token) => Ok(ChallengeToken::from_value(token)),
        None => Err(QueryErr::MalformedChallenge(format!(
            "Can not parse {:?} into challenge token, expected a decimal integer",
            token_str
        ))),
    }
}

/// Parse a signed decimal integer modulo 2^32.
fn parse_wrapping_i32(str: &str) -> Option<i32> {
    let (negative, digits) = match str.as_bytes() {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        digits => (false, digits),
    };

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let magnitude = digits.iter().fold(0u32, |acc, &d| {
        acc.wrapping_mul(10).wrapping_add((d - b'0') as u32)
    });

    Some(match negative {
        true => magnitude.wrapping_neg() as i32,
        false => magnitude as i32,
    })
}

/// Decode a [basic stat](https://wiki.vg/Query#Basic_stat) response.
///
/// Player counts that are not numbers decode as 0.
pub fn decode_simple(bufs: &[u8], session_id: SessionId) -> Result<SimpleResponse, QueryErr> {
    let mut tokens = NulTokens::new(check_header(bufs, TYPE_STAT, session_id)?);

    let motd = tokens.next_text("motd")?;
    let game_type = tokens.next_text("gametype")?;
    let map = tokens.next_text("map")?;
    let num_players = parse_lenient(&tokens.next_text("numplayers")?);
    let max_players = parse_lenient(&tokens.next_text("maxplayers")?);
    // Host port is a little-endian short, unlike the rest of the protocol, and
    // is directly followed by the host ip without a delimiter.
    let port_bufs = tokens.take_bytes(2, "hostport")?;
    let host_port = u16::from_le_bytes([port_bufs[0], port_bufs[1]]);
    let host_ip = tokens.next_text("hostip")?;

    Ok(SimpleResponse {
        motd,
        game_type,
        map,
        num_players,
        max_players,
        host_port,
        host_ip,
    })
}

/// Decode a [full stat](https://wiki.vg/Query#Full_stat) response.
///
/// Numeric values that do not parse decode as 0.
pub fn decode_full(bufs: &[u8], session_id: SessionId) -> Result<FullResponse, QueryErr> {
    let mut tokens = NulTokens::new(check_header(bufs, TYPE_STAT, session_id)?);
    let mut response = FullResponse::default();

    tokens.skip_bytes(KEY_VALUE_PADDING_LEN, "key/value padding")?;

    loop {
        let key = tokens.next_field("key")?;

        if key.is_empty() {
            break;
        }

        let key = decode_text(key);
        let value = tokens.next_text("value")?;

        match key.to_ascii_lowercase().as_str() {
            "hostname" => response.motd = value,
            "gametype" => response.game_type = value,
            "map" => response.map = value,
            "numplayers" => response.num_players = parse_lenient(&value),
            "maxplayers" => response.max_players = parse_lenient(&value),
            "hostport" => response.host_port = parse_lenient(&value),
            "hostip" => response.host_ip = value,
            _ => {
                response.info.insert(key, value);
            }
        }
    }

    tokens.skip_bytes(PLAYER_PADDING_LEN, "player padding")?;

    loop {
        let name = tokens.next_field("player")?;

        if name.is_empty() {
            break;
        }

        response.players.push(decode_text(name));
    }

    Ok(response)
}
