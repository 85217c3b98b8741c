use ntex_bytes::Bytes;
use ntex_util::channel::mpsc;

use h2proto::frame::{self, Frame, Reason, StreamId, WindowUpdate};
use h2proto::{Config, Connection, Handle, OperationError};

struct TestConn {
    frames_in: mpsc::Sender<Result<Frame, OperationError>>,
    frames_out: mpsc::Receiver<Frame>,
    handle: Handle,
}

fn start(cfg: Config) -> TestConn {
    let (connection, io, handle) = Connection::new(cfg);
    ntex::rt::spawn(connection.run());
    TestConn {
        frames_in: io.frames_in,
        frames_out: io.frames_out,
        handle,
    }
}

impl TestConn {
    fn feed(&self, frame: impl Into<Frame>) {
        self.frames_in.send(Ok(frame.into())).unwrap();
    }

    async fn next(&self) -> Frame {
        self.frames_out.recv().await.expect("frame sink closed")
    }

    /// The coordinator always advertises its SETTINGS first.
    async fn skip_preface(&self) {
        match self.next().await {
            Frame::Settings(s) if !s.is_ack() => {}
            frame => panic!("expected initial SETTINGS; actual={frame:?}"),
        }
    }
}

fn headers(id: u32) -> frame::Headers {
    let mut hdrs = frame::Headers::new(id.into(), Bytes::from_static(b"\x88"));
    hdrs.set_end_headers();
    hdrs
}

fn data(id: u32, payload: &'static [u8]) -> frame::Data {
    frame::Data::new(id.into(), Bytes::from_static(payload))
}

#[ntex::test]
async fn advertises_settings_first() {
    let conn = start(Config::default().initial_window_size(100));

    match conn.next().await {
        Frame::Settings(s) => {
            assert!(!s.is_ack());
            assert_eq!(s.initial_window_size(), Some(100));
        }
        frame => panic!("expected SETTINGS; actual={frame:?}"),
    }
}

#[ntex::test]
async fn ping_is_answered_with_pong() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    conn.feed(frame::Ping::new([1, 2, 3, 4, 5, 6, 7, 8]));
    match conn.next().await {
        Frame::Ping(pong) => {
            assert!(pong.is_ack());
            assert_eq!(pong.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        }
        frame => panic!("expected PING ack; actual={frame:?}"),
    }
}

#[ntex::test]
async fn peer_settings_are_acknowledged() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    let mut settings = frame::Settings::new();
    settings.set_initial_window_size(Some(2048));
    conn.feed(settings);

    match conn.next().await {
        Frame::Settings(s) => assert!(s.is_ack()),
        frame => panic!("expected SETTINGS ack; actual={frame:?}"),
    }
}

#[ntex::test]
async fn unexpected_settings_ack_is_a_connection_error() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    // first ack matches our advertised SETTINGS, the second is bogus
    conn.feed(frame::Settings::ack());
    conn.feed(frame::Settings::ack());

    match conn.next().await {
        Frame::GoAway(goaway) => assert_eq!(goaway.reason(), Reason::PROTOCOL_ERROR),
        frame => panic!("expected GOAWAY; actual={frame:?}"),
    }
}

#[ntex::test]
async fn remote_headers_open_a_stream_and_signal_the_window() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    let mut hdrs = headers(1);
    hdrs.set_end_stream();
    conn.feed(hdrs);

    let opened = conn.handle.opened().await.expect("stream event");
    assert_eq!(opened.id, StreamId::from(1));
    // opened once, with the initial send window
    assert_eq!(opened.send_flow.recv().await, Some(65_535));

    // DATA on a half-closed (remote) stream is a connection error
    conn.feed(data(1, b"late"));
    match conn.next().await {
        Frame::GoAway(goaway) => {
            assert_eq!(goaway.reason(), Reason::PROTOCOL_ERROR);
            assert_eq!(goaway.last_stream_id(), StreamId::from(1));
        }
        frame => panic!("expected GOAWAY; actual={frame:?}"),
    }

    // the coordinator drains and closes its channels afterwards
    assert!(conn.frames_out.recv().await.is_none());
}

#[ntex::test]
async fn stream_errors_reset_the_stream_and_keep_the_connection() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    conn.feed(headers(1));
    let _ = conn.handle.opened().await.expect("stream event");

    // zero-delta WINDOW_UPDATE is a stream-level flow-control fault
    conn.feed(WindowUpdate::new(1.into(), 0));
    match conn.next().await {
        Frame::Reset(reset) => {
            assert_eq!(reset.stream_id(), StreamId::from(1));
            assert_eq!(reset.reason(), Reason::FLOW_CONTROL_ERROR);
        }
        frame => panic!("expected RST_STREAM; actual={frame:?}"),
    }

    // the connection survives
    conn.feed(frame::Ping::new([0; 8]));
    match conn.next().await {
        Frame::Ping(pong) => assert!(pong.is_ack()),
        frame => panic!("expected PING ack; actual={frame:?}"),
    }
}

#[ntex::test]
async fn received_data_is_acknowledged_past_half_window() {
    let conn = start(
        Config::default()
            .initial_window_size(100)
            .initial_connection_window_size(1000),
    );
    conn.skip_preface().await;

    conn.feed(headers(1));
    conn.feed(data(1, &[0xd1; 60]));

    // 60 of 100 octets unacknowledged tips the stream threshold; the
    // connection ledger (60 of 1000) stays quiet
    match conn.next().await {
        Frame::WindowUpdate(wu) => {
            assert_eq!(wu.stream_id(), StreamId::from(1));
            assert_eq!(wu.size_delta(), 60);
        }
        frame => panic!("expected WINDOW_UPDATE; actual={frame:?}"),
    }
}

#[ntex::test]
async fn data_is_split_at_the_window_and_stalls_until_credited() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    // the peer grants 5-octet stream windows
    let mut settings = frame::Settings::new();
    settings.set_initial_window_size(Some(5));
    conn.feed(settings);
    match conn.next().await {
        Frame::Settings(s) => assert!(s.is_ack()),
        frame => panic!("expected SETTINGS ack; actual={frame:?}"),
    }

    conn.handle.submit(headers(1)).unwrap();
    match conn.next().await {
        Frame::Headers(h) => assert_eq!(h.stream_id(), StreamId::from(1)),
        frame => panic!("expected HEADERS; actual={frame:?}"),
    }

    let opened = conn.handle.opened().await.expect("stream event");
    assert_eq!(opened.send_flow.recv().await, Some(5));

    let mut payload = data(1, b"helloworld");
    payload.set_end_stream();
    conn.handle.submit(payload).unwrap();

    // the prefix fits the window; END_STREAM stays on the remainder
    match conn.next().await {
        Frame::Data(d) => {
            assert_eq!(d.payload(), &b"hello"[..]);
            assert!(!d.is_end_stream());
        }
        frame => panic!("expected DATA; actual={frame:?}"),
    }
    assert_eq!(opened.send_flow.recv().await, Some(-5));

    // stalled until the peer credits the stream window
    conn.feed(WindowUpdate::new(1.into(), 5));
    assert_eq!(opened.send_flow.recv().await, Some(5));

    match conn.next().await {
        Frame::Data(d) => {
            assert_eq!(d.payload(), &b"world"[..]);
            assert!(d.is_end_stream());
        }
        frame => panic!("expected DATA; actual={frame:?}"),
    }
    assert_eq!(opened.send_flow.recv().await, Some(-5));

    // local fin closes the send-flow signal
    assert_eq!(opened.send_flow.recv().await, None);
}

#[ntex::test]
async fn close_writes_a_goaway_and_terminates() {
    let conn = start(Config::default());
    conn.skip_preface().await;

    conn.handle.close();
    match conn.next().await {
        Frame::GoAway(goaway) => assert_eq!(goaway.reason(), Reason::NO_ERROR),
        frame => panic!("expected GOAWAY; actual={frame:?}"),
    }
    assert!(conn.frames_out.recv().await.is_none());
}
