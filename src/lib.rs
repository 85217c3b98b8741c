//! Core of a draft-HTTP/2 endpoint: frame codec, per-stream lifecycle
//! state machine, flow-control accounting and a single-task connection
//! coordinator.
//!
//! The crate is transport-agnostic at its center. The coordinator
//! ([`Connection`]) multiplexes three event sources -- parsed inbound
//! frames, client-submitted frames and the write sink -- over plain
//! channels, and [`open`] wires it onto an `ntex-io` transport with a
//! pair of adapter tasks.
//!
//! # Layout
//!
//! * [`frame`] -- typed frames and their wire codecs.
//! * [`Codec`] -- the stateful frame decoder/encoder, enforcing every
//!   structural invariant of the wire format (reserved bits, per-type
//!   flag masks, padding arithmetic, CONTINUATION adjacency).
//! * [`Connection`] -- stream map, flow ledgers and the ordered write
//!   queue, owned by one task.
//! * [`hpack`] -- the interface seam to an external header-block
//!   decoder; no compression state lives in this crate.
//!
//! # Flow control
//!
//! Received DATA is accounted against a connection-scope ledger first and
//! the stream's ledger second; once more than half a window is consumed
//! without acknowledgement a WINDOW_UPDATE is emitted. On the send side
//! each DATA frame is prepared against both windows, split at the lesser
//! bound when it does not fit, and stalled (re-queued at the front)
//! when a window is empty. A stalled frame never blocks sibling streams.

#![deny(rust_2018_idioms)]

macro_rules! proto_err {
    (conn: $($msg:tt)+) => {
        log::debug!("connection error PROTOCOL_ERROR -- {};", format_args!($($msg)+))
    };
}

mod codec;
mod config;
mod connection;
mod consts;
mod error;
mod flow;
mod io;
mod queue;
mod stream;

pub mod frame;
pub mod hpack;

pub use self::codec::{Codec, EncoderError};
pub use self::config::Config;
pub use self::connection::{Connection, FrameIo, Handle, OpenedStream};
pub use self::error::{ErrorLevel, OperationError};
pub use self::flow::{RecvFlow, SendFlow};
pub use self::frame::{Frame, FrameError, Reason, StreamId};
pub use self::io::open;
pub use self::stream::{Direction, StreamState};
