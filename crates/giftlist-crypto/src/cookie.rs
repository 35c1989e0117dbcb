use anyhow::{Result, bail};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Turns session ids into bearer tokens and back.
///
/// A token is `"<id>:<hex HMAC-SHA256(secret, id)>"`. Tokens are
/// authenticated, not encrypted: the id is visible, but a client cannot mint
/// a token for an id it was not given. Expiry and ownership live in the
/// session row, not in the token.
#[derive(Clone)]
pub struct CookieCodec {
    mac: HmacSha256,
}

impl CookieCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            bail!("session secret is empty");
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;
        Ok(Self { mac })
    }

    pub fn encode(&self, session_id: i64) -> String {
        let id = session_id.to_string();
        let tag = self.tag(&id).finalize().into_bytes();
        format!("{}:{}", id, hex::encode(tag))
    }

    /// Returns the embedded session id if and only if the token is exactly
    /// what [`encode`](Self::encode) would produce for it.
    pub fn decode(&self, token: &str) -> Option<i64> {
        let (id, tag) = token.split_once(':')?;

        let session_id: i64 = id.parse().ok()?;
        // Reject "+7", "007" and friends: only the canonical form was signed.
        if session_id.to_string() != id {
            return None;
        }
        if tag.bytes().any(|b| b.is_ascii_uppercase()) {
            return None;
        }

        let tag = hex::decode(tag).ok()?;
        self.tag(id).verify_slice(&tag).ok()?;
        Some(session_id)
    }

    fn tag(&self, id: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac
    }
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec").finish_non_exhaustive()
    }
}
