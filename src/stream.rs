use std::fmt;

use ntex_util::channel::mpsc;

use crate::error::OperationError;
use crate::flow::{RecvFlow, SendFlow};
use crate::frame::{Kind, Reason, StreamId, WindowSize};

/// Lifecycle of one stream.
///
/// `ClosedWithSentReset` is a substate of `Closed`: the stream is done and
/// this side already answered with RST_STREAM, so late frames from the
/// peer are dropped silently instead of resetting again.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
    ClosedWithSentReset,
}

impl StreamState {
    pub fn is_closed(&self) -> bool {
        matches!(self, StreamState::Closed | StreamState::ClosedWithSentReset)
    }
}

/// Whether a frame is being sent by this endpoint or was received from the
/// peer. Transitions and error classification depend on it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    Send,
    Receive,
}

/// One-way notifier telling the stream's writer how many octets it may
/// submit. Credits are deltas: the initial window on open, negative
/// debits as DATA is prepared, positive credits as WINDOW_UPDATEs arrive.
/// Dropped (closed) exactly once, when local writing ends.
#[derive(Debug)]
struct FlowSignal {
    tx: Option<mpsc::Sender<i32>>,
    opened: bool,
}

impl FlowSignal {
    fn open(&mut self, initial: WindowSize) {
        debug_assert!(!self.opened);
        if let Some(ref tx) = self.tx {
            self.opened = true;
            let _ = tx.send(initial as i32);
        }
    }

    fn send(&self, delta: i32) {
        if self.opened {
            if let Some(ref tx) = self.tx {
                let _ = tx.send(delta);
            }
        }
    }

    fn close(&mut self) {
        self.tx.take();
    }
}

pub struct Stream {
    id: StreamId,
    state: StreamState,
    recv_flow: RecvFlow,
    send_flow: SendFlow,
    signal: FlowSignal,
}

impl Stream {
    /// Create a stream in `Idle` with the given receive window and peer
    /// send window. The returned receiver is the stream's send-flow
    /// signal, handed to whoever writes on the stream.
    pub(crate) fn new(
        id: StreamId,
        recv_window: WindowSize,
        send_window: WindowSize,
    ) -> (Stream, mpsc::Receiver<i32>) {
        let (tx, rx) = mpsc::channel();
        let stream = Stream {
            id,
            state: StreamState::Idle,
            recv_flow: RecvFlow::new(recv_window),
            send_flow: SendFlow::new(send_window as i32),
            signal: FlowSignal {
                tx: Some(tx),
                opened: false,
            },
        };
        (stream, rx)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub(crate) fn recv_flow(&mut self) -> &mut RecvFlow {
        &mut self.recv_flow
    }

    pub(crate) fn send_available(&self) -> WindowSize {
        self.send_flow.available()
    }

    /// Consume send window for prepared DATA and report the debit on the
    /// signal.
    pub(crate) fn debit_send(&mut self, sz: WindowSize) {
        self.send_flow.debit(sz);
        self.signal.send(-(sz as i32));
    }

    /// Grow the send window after a WINDOW_UPDATE and report the credit.
    pub(crate) fn credit_send(&mut self, sz: WindowSize) -> Result<(), OperationError> {
        self.send_flow.credit(sz).map_err(|e| {
            OperationError::stream(
                e.code(),
                format!("stream {}: {}", self.id, e.message()),
            )
        })?;
        self.signal.send(sz as i32);
        Ok(())
    }

    /// Apply a SETTINGS_INITIAL_WINDOW_SIZE delta.
    pub(crate) fn adjust_send(&mut self, delta: i32) {
        self.send_flow.adjust(delta);
    }

    /// A HEADERS frame moved through the stream.
    pub(crate) fn on_headers(&mut self, dir: Direction, fin: bool) -> Result<(), OperationError> {
        use StreamState::*;

        let valid = matches!(self.state, Idle | Open)
            || (self.state == ReservedLocal && dir == Direction::Send)
            || (self.state == ReservedRemote && dir == Direction::Receive)
            || (self.state == HalfClosedLocal && dir == Direction::Receive)
            || (self.state == HalfClosedRemote && dir == Direction::Send);
        if !valid {
            return Err(self.frame_error(dir, Kind::Headers));
        }

        let mut local_open = false;
        match self.state {
            Idle => {
                self.state = Open;
                local_open = true;
            }
            ReservedLocal => {
                self.state = HalfClosedRemote;
                local_open = true;
            }
            ReservedRemote => self.state = HalfClosedLocal,
            _ => {}
        }

        if fin {
            if dir == Direction::Send {
                self.on_local_fin();
                local_open = false;
            } else {
                self.on_remote_fin();
            }
        }

        if local_open {
            // Stream was locally opened and remains locally writable.
            self.signal.open(self.send_flow.available());
        }
        Ok(())
    }

    /// A DATA frame moved through the stream.
    pub(crate) fn on_data(&mut self, dir: Direction, fin: bool) -> Result<(), OperationError> {
        use StreamState::*;

        let valid = self.state == Open
            || (self.state == HalfClosedLocal && dir == Direction::Receive)
            || (self.state == HalfClosedRemote && dir == Direction::Send);
        if !valid {
            return Err(self.frame_error(dir, Kind::Data));
        }

        if fin {
            if dir == Direction::Send {
                self.on_local_fin();
            } else {
                self.on_remote_fin();
            }
        }
        Ok(())
    }

    /// A PUSH_PROMISE reserved this stream.
    pub(crate) fn on_push_promise(&mut self, dir: Direction) -> Result<(), OperationError> {
        if self.state != StreamState::Idle {
            return Err(self.frame_error(dir, Kind::PushPromise));
        }

        if dir == Direction::Send {
            self.state = StreamState::ReservedLocal;
        } else {
            self.state = StreamState::ReservedRemote;
            self.signal.close();
        }
        Ok(())
    }

    /// A RST_STREAM moved through the stream.
    pub(crate) fn on_reset(&mut self, dir: Direction) -> Result<(), OperationError> {
        use StreamState::*;

        if self.state == Idle || self.state == ClosedWithSentReset {
            return Err(self.frame_error(dir, Kind::Reset));
        }

        self.signal.close();
        self.state = if dir == Direction::Receive {
            Closed
        } else {
            ClosedWithSentReset
        };
        Ok(())
    }

    /// END_STREAM left this endpoint; no further local DATA or HEADERS.
    pub(crate) fn on_local_fin(&mut self) {
        self.state = match self.state {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            state => unreachable!("local fin on {state:?} stream"),
        };
        self.signal.close();
    }

    /// END_STREAM arrived from the peer.
    fn on_remote_fin(&mut self) {
        self.state = match self.state {
            StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            state => unreachable!("remote fin on {state:?} stream"),
        };
    }

    fn frame_error(&self, dir: Direction, kind: Kind) -> OperationError {
        use StreamState::*;

        match (dir, self.state) {
            // Remote close raced our view of the stream: reset it, keep
            // the connection.
            (Direction::Receive, Closed) => OperationError::stream(
                Reason::STREAM_CLOSED,
                format!("received {kind:?} on Closed stream {}", self.id),
            ),
            // We already answered with RST_STREAM; drop silently.
            (Direction::Receive, ClosedWithSentReset) => OperationError::recoverable(
                Reason::STREAM_CLOSED,
                format!("received {kind:?} on reset stream {}", self.id),
            ),
            // Writes queued behind a close race are expected; drop them.
            (Direction::Send, Closed | ClosedWithSentReset) => OperationError::recoverable(
                Reason::STREAM_CLOSED,
                format!("dropping {kind:?} queued for closed stream {}", self.id),
            ),
            (Direction::Send, state) => OperationError::internal(format!(
                "attempt to send {kind:?} on {state:?} stream {}",
                self.id
            )),
            (Direction::Receive, state) => OperationError::protocol(format!(
                "received {kind:?} on {state:?} stream {}",
                self.id
            )),
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("send_available", &self.send_flow.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ntex_util::future::lazy;

    use super::*;
    use crate::error::ErrorLevel;

    const SEND_WINDOW: WindowSize = 4096;

    struct Fixture {
        stream: Stream,
        rx: mpsc::Receiver<i32>,
    }

    fn from(state: StreamState) -> Fixture {
        let (mut stream, rx) = Stream::new(1.into(), 65_535, SEND_WINDOW);
        stream.state = state;
        Fixture { stream, rx }
    }

    #[derive(Debug, PartialEq)]
    enum Signal {
        Opened(i32),
        Closed,
        Silent,
    }

    impl Fixture {
        async fn signal(&self) -> Signal {
            match lazy(|cx| self.rx.poll_recv(cx)).await {
                std::task::Poll::Ready(Some(v)) => Signal::Opened(v),
                std::task::Poll::Ready(None) => Signal::Closed,
                std::task::Poll::Pending => Signal::Silent,
            }
        }
    }

    struct Expect {
        state: StreamState,
        signal: Signal,
    }

    enum Outcome {
        Ok(Expect),
        Err(ErrorLevel, Reason),
    }

    async fn verify(fx: Fixture, result: Result<(), OperationError>, outcome: Outcome) {
        match outcome {
            Outcome::Ok(expected) => {
                assert!(result.is_ok(), "unexpected error: {result:?}");
                assert_eq!(fx.stream.state, expected.state);
                assert_eq!(fx.signal().await, expected.signal);
            }
            Outcome::Err(level, code) => {
                let err = result.expect_err("expected transition error");
                assert_eq!(err.level(), level, "wrong level: {err}");
                assert_eq!(err.code(), code, "wrong code: {err}");
            }
        }
    }

    #[ntex::test]
    async fn headers_transitions() {
        use Direction::*;
        use StreamState::*;

        let window = SEND_WINDOW as i32;
        let cases: Vec<(StreamState, Direction, bool, Outcome)> = vec![
            (Idle, Send, false, Outcome::Ok(Expect { state: Open, signal: Signal::Opened(window) })),
            (Idle, Send, true, Outcome::Ok(Expect { state: HalfClosedLocal, signal: Signal::Closed })),
            (Idle, Receive, false, Outcome::Ok(Expect { state: Open, signal: Signal::Opened(window) })),
            (Idle, Receive, true, Outcome::Ok(Expect { state: HalfClosedRemote, signal: Signal::Opened(window) })),
            (ReservedLocal, Send, false, Outcome::Ok(Expect { state: HalfClosedRemote, signal: Signal::Opened(window) })),
            (ReservedLocal, Send, true, Outcome::Ok(Expect { state: Closed, signal: Signal::Closed })),
            (ReservedLocal, Receive, false, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (ReservedRemote, Send, false, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (ReservedRemote, Receive, false, Outcome::Ok(Expect { state: HalfClosedLocal, signal: Signal::Silent })),
            (ReservedRemote, Receive, true, Outcome::Ok(Expect { state: Closed, signal: Signal::Silent })),
            (Open, Send, false, Outcome::Ok(Expect { state: Open, signal: Signal::Silent })),
            (Open, Send, true, Outcome::Ok(Expect { state: HalfClosedLocal, signal: Signal::Closed })),
            (Open, Receive, false, Outcome::Ok(Expect { state: Open, signal: Signal::Silent })),
            (Open, Receive, true, Outcome::Ok(Expect { state: HalfClosedRemote, signal: Signal::Silent })),
            (HalfClosedLocal, Send, false, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (HalfClosedLocal, Receive, false, Outcome::Ok(Expect { state: HalfClosedLocal, signal: Signal::Silent })),
            (HalfClosedLocal, Receive, true, Outcome::Ok(Expect { state: Closed, signal: Signal::Silent })),
            (HalfClosedRemote, Send, false, Outcome::Ok(Expect { state: HalfClosedRemote, signal: Signal::Silent })),
            (HalfClosedRemote, Send, true, Outcome::Ok(Expect { state: Closed, signal: Signal::Closed })),
            (HalfClosedRemote, Receive, false, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (Closed, Send, false, Outcome::Err(ErrorLevel::Recoverable, Reason::STREAM_CLOSED)),
            (Closed, Receive, false, Outcome::Err(ErrorLevel::Stream, Reason::STREAM_CLOSED)),
            (ClosedWithSentReset, Receive, false, Outcome::Err(ErrorLevel::Recoverable, Reason::STREAM_CLOSED)),
        ];

        for (initial, dir, fin, outcome) in cases {
            let mut fx = from(initial);
            let result = fx.stream.on_headers(dir, fin);
            verify(fx, result, outcome).await;
        }
    }

    #[ntex::test]
    async fn data_transitions() {
        use Direction::*;
        use StreamState::*;

        let cases: Vec<(StreamState, Direction, bool, Outcome)> = vec![
            (Idle, Send, false, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (Idle, Receive, false, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (Open, Send, false, Outcome::Ok(Expect { state: Open, signal: Signal::Silent })),
            (Open, Receive, true, Outcome::Ok(Expect { state: HalfClosedRemote, signal: Signal::Silent })),
            (Open, Send, true, Outcome::Ok(Expect { state: HalfClosedLocal, signal: Signal::Closed })),
            (HalfClosedLocal, Receive, false, Outcome::Ok(Expect { state: HalfClosedLocal, signal: Signal::Silent })),
            (HalfClosedLocal, Receive, true, Outcome::Ok(Expect { state: Closed, signal: Signal::Silent })),
            (HalfClosedLocal, Send, false, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (HalfClosedRemote, Send, true, Outcome::Ok(Expect { state: Closed, signal: Signal::Closed })),
            (HalfClosedRemote, Receive, false, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (Closed, Receive, false, Outcome::Err(ErrorLevel::Stream, Reason::STREAM_CLOSED)),
            (Closed, Send, false, Outcome::Err(ErrorLevel::Recoverable, Reason::STREAM_CLOSED)),
            (ClosedWithSentReset, Receive, false, Outcome::Err(ErrorLevel::Recoverable, Reason::STREAM_CLOSED)),
        ];

        for (initial, dir, fin, outcome) in cases {
            let mut fx = from(initial);
            let result = fx.stream.on_data(dir, fin);
            verify(fx, result, outcome).await;
        }
    }

    #[ntex::test]
    async fn push_promise_transitions() {
        use Direction::*;
        use StreamState::*;

        let cases: Vec<(StreamState, Direction, Outcome)> = vec![
            (Idle, Send, Outcome::Ok(Expect { state: ReservedLocal, signal: Signal::Silent })),
            (Idle, Receive, Outcome::Ok(Expect { state: ReservedRemote, signal: Signal::Closed })),
            (ReservedLocal, Send, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (ReservedLocal, Receive, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (Open, Send, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (Open, Receive, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (HalfClosedRemote, Receive, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (Closed, Receive, Outcome::Err(ErrorLevel::Stream, Reason::STREAM_CLOSED)),
        ];

        for (initial, dir, outcome) in cases {
            let mut fx = from(initial);
            let result = fx.stream.on_push_promise(dir);
            verify(fx, result, outcome).await;
        }
    }

    #[ntex::test]
    async fn reset_transitions() {
        use Direction::*;
        use StreamState::*;

        let cases: Vec<(StreamState, Direction, Outcome)> = vec![
            (Idle, Send, Outcome::Err(ErrorLevel::Connection, Reason::INTERNAL_ERROR)),
            (Idle, Receive, Outcome::Err(ErrorLevel::Connection, Reason::PROTOCOL_ERROR)),
            (Open, Receive, Outcome::Ok(Expect { state: Closed, signal: Signal::Closed })),
            (Open, Send, Outcome::Ok(Expect { state: ClosedWithSentReset, signal: Signal::Closed })),
            (HalfClosedRemote, Receive, Outcome::Ok(Expect { state: Closed, signal: Signal::Closed })),
            // receiving a reset for a closed stream is idempotent
            (Closed, Receive, Outcome::Ok(Expect { state: Closed, signal: Signal::Closed })),
            (Closed, Send, Outcome::Ok(Expect { state: ClosedWithSentReset, signal: Signal::Closed })),
            (ClosedWithSentReset, Receive, Outcome::Err(ErrorLevel::Recoverable, Reason::STREAM_CLOSED)),
            (ClosedWithSentReset, Send, Outcome::Err(ErrorLevel::Recoverable, Reason::STREAM_CLOSED)),
        ];

        for (initial, dir, outcome) in cases {
            let mut fx = from(initial);
            let result = fx.stream.on_reset(dir);
            verify(fx, result, outcome).await;
        }
    }

    #[ntex::test]
    async fn debits_and_credits_flow_through_signal() {
        let mut fx = from(StreamState::Idle);
        fx.stream.on_headers(Direction::Send, false).unwrap();
        assert_eq!(fx.signal().await, Signal::Opened(SEND_WINDOW as i32));

        fx.stream.debit_send(1000);
        assert_eq!(fx.signal().await, Signal::Opened(-1000));
        assert_eq!(fx.stream.send_available(), SEND_WINDOW - 1000);

        fx.stream.credit_send(500).unwrap();
        assert_eq!(fx.signal().await, Signal::Opened(500));
        assert_eq!(fx.stream.send_available(), SEND_WINDOW - 500);
    }
}
