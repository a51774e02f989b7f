use rand::RngCore;
use std::time::{Duration, Instant};

/// Client chosen id echoed back by the server in every response.
///
/// Every byte is kept within `0x00..=0x0F`, some server implementations
/// reject ids containing other byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 4]);

impl SessionId {
    pub const BYTE_MASK: u8 = 0x0F;

    /// Generate a masked session id from the given random source.
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 4];

        rng.fill_bytes(&mut bytes);

        Self(bytes.map(|b| b & Self::BYTE_MASK))
    }

    /// Wrap raw bytes as read from the wire, no masking is applied.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", u32::from_be_bytes(self.0))
    }
}

/// Server issued value authorizing a stat request.
///
/// Sent by the server as decimal text, carried here as the big-endian
/// bytes of its lower 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeToken([u8; 4]);

impl ChallengeToken {
    pub fn from_value(value: i32) -> Self {
        Self(value.to_be_bytes())
    }

    pub fn value(self) -> i32 {
        i32::from_be_bytes(self.0)
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }
}

/// Session state of one connected client: its id plus the cached challenge token.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    challenge_token: Option<ChallengeToken>,
    // `None` together with a token means the expiry overflowed `Instant`.
    token_expiry: Option<Instant>,
}

impl Session {
    pub fn create<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self {
            id: SessionId::generate(rng),
            challenge_token: None,
            token_expiry: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether a token is cached and `now` is strictly before its expiry.
    pub fn has_valid_token(&self, now: Instant) -> bool {
        self.valid_token(now).is_some()
    }

    /// The cached token, if it is still valid at `now`.
    pub fn valid_token(&self, now: Instant) -> Option<ChallengeToken> {
        let token = self.challenge_token?;

        match self.token_expiry {
            Some(expiry) if now >= expiry => None,
            _ => Some(token),
        }
    }

    /// Whether a token is cached at all, expired or not.
    pub fn has_token(&self) -> bool {
        self.challenge_token.is_some()
    }

    /// Cache `token` until `now + ttl`.
    pub fn set_token(&mut self, token: ChallengeToken, ttl: Duration, now: Instant) {
        self.challenge_token = Some(token);
        self.token_expiry = now.checked_add(ttl);
    }

    pub fn clear_token(&mut self) {
        self.challenge_token = None;
        self.token_expiry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn session_id_bytes_are_masked() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..64 {
            let id = SessionId::generate(&mut rng);

            assert!(id.to_bytes().iter().all(|&b| b <= SessionId::BYTE_MASK));
        }
    }

    #[test]
    fn fixed_seed_gives_fixed_id() {
        let first = Session::create(&mut StdRng::seed_from_u64(42));
        let second = Session::create(&mut StdRng::seed_from_u64(42));

        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn token_value_keeps_sign() {
        let token = ChallengeToken::from_value(-1);

        assert_eq!(token.to_bytes(), [0xFF; 4]);
        assert_eq!(token.value(), -1);
        assert_eq!(ChallengeToken::from_value(9513307).to_bytes(), [0x00, 0x91, 0x29, 0x5B]);
    }

    #[test]
    fn token_expires_exactly_at_ttl() {
        let mut session = Session::create(&mut StdRng::seed_from_u64(1));
        let now = Instant::now();
        let token = ChallengeToken::from_value(1234);

        assert!(!session.has_valid_token(now));

        session.set_token(token, Duration::from_secs(30), now);

        assert_eq!(session.valid_token(now), Some(token));
        assert!(session.has_valid_token(now + Duration::from_millis(29_999)));
        assert!(!session.has_valid_token(now + Duration::from_secs(30)));
        assert!(session.has_token());
    }

    #[test]
    fn zero_ttl_never_valid() {
        let mut session = Session::create(&mut StdRng::seed_from_u64(1));
        let now = Instant::now();

        session.set_token(ChallengeToken::from_value(1), Duration::ZERO, now);

        assert!(!session.has_valid_token(now));
    }

    #[test]
    fn clear_drops_token() {
        let mut session = Session::create(&mut StdRng::seed_from_u64(1));
        let now = Instant::now();

        session.set_token(ChallengeToken::from_value(1), Duration::from_secs(5), now);
        session.clear_token();

        assert!(!session.has_token());
        assert!(!session.has_valid_token(now));
    }
}
