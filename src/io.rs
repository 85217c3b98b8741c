use ntex_io::{IoBoxed, IoRef};
use ntex_util::channel::mpsc;
use ntex_util::future::Either;

use crate::codec::Codec;
use crate::config::Config;
use crate::connection::{Connection, FrameIo, Handle};
use crate::error::OperationError;
use crate::frame::Frame;

/// Wire a connection onto a transport.
///
/// Spawns the read adapter (owns the transport, decodes frames), the
/// write adapter (encodes prepared frames into the transport buffer) and
/// the coordinator itself, and returns the client handle.
pub fn open(io: IoBoxed, cfg: Config, codec: Codec) -> Handle {
    let (connection, frame_io, handle) = Connection::new(cfg);
    let FrameIo {
        frames_in,
        frames_out,
    } = frame_io;

    let io_ref = io.get_ref();
    let write_codec = codec.clone();

    ntex_rt::spawn(read_task(io, codec, frames_in));
    ntex_rt::spawn(write_task(io_ref, write_codec, frames_out));
    ntex_rt::spawn(connection.run());

    handle
}

/// Translate the inbound byte stream into framed events, preserving wire
/// order. Suspends inside the codec on short reads; EOF mid-frame is
/// reported as an internal error.
async fn read_task(io: IoBoxed, codec: Codec, tx: mpsc::Sender<Result<Frame, OperationError>>) {
    loop {
        match io.recv(&codec).await {
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).is_err() {
                    // coordinator is gone
                    break;
                }
            }
            Ok(None) => {
                log::trace!("peer closed the connection");
                break;
            }
            Err(Either::Left(err)) => {
                let _ = tx.send(Err(err.into()));
                break;
            }
            Err(Either::Right(err)) => match err.kind() {
                // io.recv() reports the dispatcher-stop and keep-alive-timeout
                // conditions as io::Error with these kinds; everything else is
                // an actual peer-gone I/O error.
                std::io::ErrorKind::UnexpectedEof => break,
                std::io::ErrorKind::TimedOut => break,
                _ => {
                    log::debug!("peer gone; err={err:?}");
                    let _ = tx.send(Err(OperationError::internal("unexpected EOF")));
                    break;
                }
            },
        }
    }
}

/// Push prepared frames into the transport write buffer, in coordinator
/// order.
async fn write_task(io: IoRef, codec: Codec, rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        log::trace!("writing {:?} frame", frame.kind());
        if let Err(err) = io.encode(frame, &codec) {
            log::error!("failed to encode outbound frame: {err}");
            break;
        }
    }
    io.close();
}
