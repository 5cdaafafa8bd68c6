//! Wire protocol spoken by clients, the master and workers.
//!
//! Three inbound forms are accepted on every listener:
//!
//! - legacy line form: `LANGUAGE\n<code-byte-length>\n<code bytes>`
//! - delimited form: `language|filename|source`
//! - admin form: `ADMIN|[TOKEN=<secret>|]SUBCOMMAND[|value]`
//!
//! Responses are raw text with no framing; the server closes the connection
//! once the whole response is written.

pub mod codec;
pub mod message;

pub use codec::read_request;
pub use message::{AdminRequest, Request};
