pub mod api;
pub mod clock;

/// Store-assigned identifiers. SQLite rowids are `i64`.
pub type UserId = i64;
pub type SessionId = i64;
pub type ListId = i64;
pub type ItemId = i64;
