//! giftlist crypto helpers
//!
//! - `cookie`: authenticated session tokens (HMAC-SHA256 over the session id)
//! - `password`: one-way password digests (Argon2id by default)
//! - `secret`: generation and loading of the server-held cookie secret

pub mod cookie;
pub mod password;
pub mod secret;

pub use cookie::CookieCodec;
pub use password::{Argon2Digest, PasswordDigest};
