//! Codec Module
//!
//! Maps application keys to store keys and values to stored payloads.

mod key;
mod value;

pub use key::KeyCodec;
pub use value::ValueCodec;

// == Public Constants ==
/// Maximum key length accepted by memcached
pub const MAX_STORE_KEY_LENGTH: usize = 250;
