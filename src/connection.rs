use std::task::Poll;

use ntex_util::channel::mpsc;
use std::future::poll_fn;
use ntex_util::HashMap;

use crate::config::Config;
use crate::consts;
use crate::error::{ErrorLevel, OperationError};
use crate::flow::{RecvFlow, SendFlow};
use crate::frame::{
    self, Frame, GoAway, Ping, Reason, Reset, Settings, StreamId, WindowSize, WindowUpdate,
};
use crate::queue::WriteQueue;
use crate::stream::{Direction, Stream};

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug)]
    struct Flags: u8 {
        const WAITING_ACK   = 0b0000_0001;
        const GOAWAY_QUEUED = 0b0000_0010;
        const GOAWAY_SENT   = 0b0000_0100;
        const REMOTE_GOAWAY = 0b0000_1000;
        const RECV_CLOSED   = 0b0001_0000;
        const SUBMIT_CLOSED = 0b0010_0000;
        const SINK_CLOSED   = 0b0100_0000;
    }
}

/// The coordinator's framed transport ends. Parsed inbound frames enter
/// through `frames_in`; prepared outbound frames leave through
/// `frames_out`, in wire order.
pub struct FrameIo {
    pub frames_in: mpsc::Sender<Result<Frame, OperationError>>,
    pub frames_out: mpsc::Receiver<Frame>,
}

/// Announcement of a stream whose send-flow signal has been created.
/// `send_flow` delivers window deltas: the initial window once the stream
/// becomes locally writable, negative debits as DATA is prepared, and
/// positive credits as WINDOW_UPDATE frames arrive. It terminates when
/// local writing ends.
pub struct OpenedStream {
    pub id: StreamId,
    pub send_flow: mpsc::Receiver<i32>,
}

/// Client-side handle to a running connection.
pub struct Handle {
    submit: mpsc::Sender<Frame>,
    events: mpsc::Receiver<OpenedStream>,
}

impl Handle {
    /// Queue a frame for writing, behind everything already submitted.
    pub fn submit(&self, frame: impl Into<Frame>) -> Result<(), OperationError> {
        self.submit
            .send(frame.into())
            .map_err(|_| OperationError::internal("connection is closed"))
    }

    /// The next stream announcement, in creation order.
    pub async fn opened(&self) -> Option<OpenedStream> {
        self.events.recv().await
    }

    /// A standalone producer for the submit channel; clones freely across
    /// tasks.
    pub fn submitter(&self) -> mpsc::Sender<Frame> {
        self.submit.clone()
    }

    /// Ask the coordinator to shut the connection down cleanly.
    pub fn close(&self) {
        let _ = self.submit.send(GoAway::new(Reason::NO_ERROR).into());
    }
}

enum Event {
    Recv(Result<Frame, OperationError>),
    RecvClosed,
    Submit(Frame),
    SubmitClosed,
}

enum Prepared {
    Write(Frame),
    Stalled(Frame),
    Dropped,
}

/// Connection coordinator.
///
/// A single task owns every piece of mutable connection state: the stream
/// map, the flow ledgers and the write queue. It multiplexes three event
/// sources -- parsed inbound frames, client submissions and the write
/// sink -- processing exactly one event at a time.
pub struct Connection {
    cfg: Config,
    recv_rx: mpsc::Receiver<Result<Frame, OperationError>>,
    write_tx: mpsc::Sender<Frame>,
    submit_rx: mpsc::Receiver<Frame>,
    events_tx: mpsc::Sender<OpenedStream>,

    streams: HashMap<StreamId, Stream>,
    recv_flow: RecvFlow,
    send_flow: SendFlow,
    write_queue: WriteQueue,
    /// Highest stream ID observed on inbound frames
    last_inbound_stream: StreamId,
    /// Reference point frozen when a local GOAWAY was queued
    goaway_last_stream: StreamId,
    /// Last stream the peer promised to process, from its GOAWAY
    remote_last_stream: Option<StreamId>,
    /// Peer's SETTINGS_INITIAL_WINDOW_SIZE
    remote_initial_window: WindowSize,
    flags: Flags,
}

impl Connection {
    pub fn new(cfg: Config) -> (Connection, FrameIo, Handle) {
        let (recv_tx, recv_rx) = mpsc::channel();
        let (write_tx, write_rx) = mpsc::channel();
        let (submit_tx, submit_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();

        let connection = Connection {
            recv_rx,
            write_tx,
            submit_rx,
            events_tx,
            streams: HashMap::default(),
            recv_flow: RecvFlow::new(cfg.connection_window_sz),
            send_flow: SendFlow::new(consts::DEFAULT_INITIAL_WINDOW_SIZE as i32),
            write_queue: WriteQueue::new(),
            last_inbound_stream: StreamId::CON,
            goaway_last_stream: StreamId::CON,
            remote_last_stream: None,
            remote_initial_window: consts::DEFAULT_INITIAL_WINDOW_SIZE,
            flags: Flags::empty(),
            cfg,
        };
        let io = FrameIo {
            frames_in: recv_tx,
            frames_out: write_rx,
        };
        let handle = Handle {
            submit: submit_tx,
            events: events_rx,
        };
        (connection, io, handle)
    }

    /// Drive the connection until it terminates.
    pub async fn run(mut self) {
        // Advertise our settings before anything else is written.
        self.write_queue.enqueue_back(self.cfg.to_settings().into());
        self.flags.insert(Flags::WAITING_ACK);

        loop {
            self.flush_queue();

            if self
                .flags
                .intersects(Flags::GOAWAY_SENT | Flags::SINK_CLOSED | Flags::RECV_CLOSED)
            {
                break;
            }

            let submit_open = !self.flags.contains(Flags::SUBMIT_CLOSED);

            let event = {
                let recv_rx = &self.recv_rx;
                let submit_rx = &self.submit_rx;
                poll_fn(|cx| {
                    match recv_rx.poll_recv(cx) {
                        Poll::Ready(Some(res)) => return Poll::Ready(Event::Recv(res)),
                        Poll::Ready(None) => return Poll::Ready(Event::RecvClosed),
                        Poll::Pending => {}
                    }
                    if submit_open {
                        match submit_rx.poll_recv(cx) {
                            Poll::Ready(Some(frame)) => return Poll::Ready(Event::Submit(frame)),
                            Poll::Ready(None) => return Poll::Ready(Event::SubmitClosed),
                            Poll::Pending => {}
                        }
                    }
                    Poll::Pending
                })
                .await
            };

            match event {
                Event::Recv(Ok(frame)) => {
                    log::trace!("received {:?} frame", frame.kind());
                    let id = frame.stream_id();
                    if let Err(err) = self.receive_frame(frame) {
                        self.handle_error(err, id);
                    }
                }
                Event::Recv(Err(err)) => self.handle_error(err, StreamId::CON),
                Event::RecvClosed => {
                    self.flags.insert(Flags::RECV_CLOSED);
                }
                Event::Submit(frame) => self.write_queue.enqueue_back(frame),
                Event::SubmitClosed => {
                    self.flags.insert(Flags::SUBMIT_CLOSED);
                }
            }
        }

        // Write out whatever the loop left behind, then close both
        // channels.
        self.flush_queue();
        self.recv_rx.close();
        self.submit_rx.close();
        log::trace!("connection coordinator terminated");
    }

    fn closing(&self) -> bool {
        self.flags
            .intersects(Flags::GOAWAY_QUEUED | Flags::RECV_CLOSED)
    }

    /// Prepare queued frames and hand them to the sink, until the queue is
    /// empty or its head is stalled on flow control.
    fn flush_queue(&mut self) {
        if self.flags.contains(Flags::SINK_CLOSED) {
            return;
        }
        while let Some(frame) = self.write_queue.dequeue() {
            let id = frame.stream_id();
            match self.prepare_frame(frame) {
                Ok(Prepared::Write(frame)) => {
                    let is_goaway = matches!(frame, Frame::GoAway(_));
                    if self.write_tx.send(frame).is_err() {
                        log::error!("frame sink is gone, terminating connection");
                        self.flags.insert(Flags::SINK_CLOSED);
                        return;
                    }
                    if is_goaway {
                        self.flags.insert(Flags::GOAWAY_SENT);
                    }
                    self.gc_stream(id);
                }
                Ok(Prepared::Stalled(frame)) => {
                    if self.closing() {
                        log::debug!("dropping stalled frame at shutdown: {frame:?}");
                        continue;
                    }
                    // Retried after the next event; siblings keep flowing
                    // on the other event sources meanwhile.
                    self.write_queue.enqueue_front(frame);
                    return;
                }
                Ok(Prepared::Dropped) => self.gc_stream(id),
                Err(err) => self.handle_error(err, id),
            }
        }
    }

    /// Run a frame through preparation: flow-control accounting and window
    /// splitting for DATA, the state machine for stream lifecycle frames.
    fn prepare_frame(&mut self, frame: Frame) -> Result<Prepared, OperationError> {
        match frame {
            Frame::Data(data) => self.prepare_data(data),
            Frame::Headers(hdrs) => {
                let id = hdrs.stream_id();
                if let Some(last) = self.remote_last_stream {
                    if id > last && !self.streams.contains_key(&id) {
                        log::debug!("peer sent GOAWAY; dropping HEADERS for new stream {id}");
                        return Ok(Prepared::Dropped);
                    }
                }
                let fin = hdrs.is_end_stream();
                match self
                    .get_or_create_stream(id)
                    .on_headers(Direction::Send, fin)
                {
                    Ok(()) => Ok(Prepared::Write(hdrs.into())),
                    Err(err) => recoverable_drop(err).map(|()| Prepared::Dropped),
                }
            }
            Frame::PushPromise(pp) => {
                match self
                    .get_or_create_stream(pp.promised_id())
                    .on_push_promise(Direction::Send)
                {
                    Ok(()) => Ok(Prepared::Write(pp.into())),
                    Err(err) => recoverable_drop(err).map(|()| Prepared::Dropped),
                }
            }
            Frame::Reset(rst) => {
                match self
                    .get_or_create_stream(rst.stream_id())
                    .on_reset(Direction::Send)
                {
                    Ok(()) => Ok(Prepared::Write(rst.into())),
                    Err(err) => recoverable_drop(err).map(|()| Prepared::Dropped),
                }
            }
            Frame::GoAway(frm) => {
                if !self.flags.contains(Flags::GOAWAY_QUEUED) {
                    self.flags.insert(Flags::GOAWAY_QUEUED);
                    self.goaway_last_stream = self.last_inbound_stream;
                }
                Ok(Prepared::Write(frm.into()))
            }
            other => Ok(Prepared::Write(other)),
        }
    }

    /// Prepare a DATA frame: verify the stream accepts it, bound it by the
    /// connection and stream send windows, split at the lesser bound, and
    /// debit what goes out.
    fn prepare_data(&mut self, mut data: frame::Data) -> Result<Prepared, OperationError> {
        let id = data.stream_id();

        if let Err(err) = self
            .get_or_create_stream(id)
            .on_data(Direction::Send, false)
        {
            return recoverable_drop(err).map(|()| Prepared::Dropped);
        }

        let conn_avail = self.send_flow.available();
        if conn_avail == 0 {
            let err =
                OperationError::recoverable(Reason::FLOW_CONTROL_ERROR, "connection stall");
            log::debug!("{err}");
            return Ok(Prepared::Stalled(data.into()));
        }
        let mut bound = self.cfg.max_frame_payload.min(conn_avail as usize);

        let stream_avail = self
            .streams
            .get(&id)
            .map(|s| s.send_available())
            .unwrap_or(0);
        if stream_avail == 0 {
            let err = OperationError::recoverable(Reason::FLOW_CONTROL_ERROR, "stream stall");
            log::debug!("{err}");
            return Ok(Prepared::Stalled(data.into()));
        }
        bound = bound.min(stream_avail as usize);

        // Split at the window bound; END_STREAM travels with the
        // remainder, which goes back to the queue front.
        if bound < data.payload().len() {
            let rest = data.split_off(bound);
            self.write_queue.enqueue_front(rest.into());
        }

        let sent = data.payload().len() as WindowSize;
        self.send_flow.debit(sent);
        let fin = data.is_end_stream();
        if let Some(stream) = self.streams.get_mut(&id) {
            stream.debit_send(sent);
            if fin {
                stream.on_local_fin();
            }
        }
        Ok(Prepared::Write(data.into()))
    }

    fn receive_frame(&mut self, frame: Frame) -> Result<(), OperationError> {
        let id = frame.stream_id();

        // After a local GOAWAY, traffic past the reference point is still
        // parsed but no longer acted upon.
        if self.flags.contains(Flags::GOAWAY_QUEUED)
            && !id.is_zero()
            && id > self.goaway_last_stream
        {
            log::trace!("ignoring {:?} on stream {id} past GOAWAY", frame.kind());
            return Ok(());
        }
        if !id.is_zero() && id > self.last_inbound_stream {
            self.last_inbound_stream = id;
        }

        match frame {
            Frame::Data(data) => self.receive_data(data),
            Frame::Headers(hdrs) => {
                let fin = hdrs.is_end_stream();
                let res = self
                    .get_or_create_stream(id)
                    .on_headers(Direction::Receive, fin);
                self.gc_stream(id);
                res
            }
            Frame::PushPromise(pp) => {
                if !self.cfg.enable_push {
                    return Err(OperationError::protocol(
                        "received PUSH_PROMISE with push disabled",
                    ));
                }
                let promised = pp.promised_id();
                let res = self
                    .get_or_create_stream(promised)
                    .on_push_promise(Direction::Receive);
                self.gc_stream(promised);
                res
            }
            Frame::Reset(rst) => {
                let res = self.get_or_create_stream(id).on_reset(Direction::Receive);
                self.gc_stream(id);
                res
            }
            Frame::WindowUpdate(wu) => self.receive_window_update(wu),
            Frame::Settings(settings) => self.receive_settings(settings),
            Frame::Ping(ping) => {
                if !ping.is_ack() {
                    self.write_queue
                        .enqueue_back(Ping::pong(ping.into_payload()).into());
                }
                Ok(())
            }
            Frame::GoAway(frm) => {
                log::debug!(
                    "received GOAWAY; last_stream={}, code={:?}",
                    frm.last_stream_id(),
                    frm.reason()
                );
                self.flags.insert(Flags::REMOTE_GOAWAY);
                self.remote_last_stream = Some(frm.last_stream_id());
                Ok(())
            }
            Frame::Priority(prio) => {
                // No priority tree; scheduling stays FIFO.
                log::trace!("ignoring PRIORITY for {:?}", prio.stream_id());
                Ok(())
            }
            Frame::Continuation(_) => {
                // Header fields were already delivered by the codec; the
                // stream transition happened on the opening HEADERS.
                Ok(())
            }
        }
    }

    fn receive_data(&mut self, data: frame::Data) -> Result<(), OperationError> {
        let id = data.stream_id();
        let len = data.flow_len() as WindowSize;
        let fin = data.is_end_stream();

        // Connection ledger first: its violations shadow stream-level
        // ones.
        self.recv_flow.apply_received(len)?;

        let res = {
            let stream = self.get_or_create_stream(id);
            stream
                .on_data(Direction::Receive, fin)
                .and_then(|()| stream.recv_flow().apply_received(len))
        };
        if let Err(err) = res {
            // The octets still occupied the connection window.
            self.recv_flow.apply_consumed(len);
            return Err(err);
        }

        // The core has no application sink below it; received data is
        // consumed on the spot.
        self.recv_flow.apply_consumed(len);
        let stream_update = {
            let stream = self.get_or_create_stream(id);
            let flow = stream.recv_flow();
            flow.apply_consumed(len);
            flow.over_unacked_threshold().then(|| flow.take_unacked())
        };

        if self.recv_flow.over_unacked_threshold() {
            let inc = self.recv_flow.take_unacked();
            self.write_queue
                .enqueue_back(WindowUpdate::new(StreamId::CON, inc).into());
        }
        if let Some(inc) = stream_update {
            self.write_queue
                .enqueue_back(WindowUpdate::new(id, inc).into());
        }

        self.gc_stream(id);
        Ok(())
    }

    fn receive_window_update(&mut self, wu: WindowUpdate) -> Result<(), OperationError> {
        let id = wu.stream_id();
        let delta = wu.size_delta();

        if id.is_zero() {
            if delta == 0 {
                return Err(OperationError::flow("zero WINDOW_UPDATE delta on connection"));
            }
            return self.send_flow.credit(delta);
        }

        match self.streams.get_mut(&id) {
            // Tolerate updates racing a stream we already dropped.
            None => {
                log::debug!("WINDOW_UPDATE for unknown stream {id}, ignoring");
                Ok(())
            }
            Some(stream) if stream.state() == crate::stream::StreamState::Idle => Err(
                OperationError::protocol(format!("WINDOW_UPDATE on idle stream {id}")),
            ),
            Some(stream) => {
                if delta == 0 {
                    return Err(OperationError::stream(
                        Reason::FLOW_CONTROL_ERROR,
                        format!("zero WINDOW_UPDATE delta on stream {id}"),
                    ));
                }
                stream.credit_send(delta)
            }
        }
    }

    fn receive_settings(&mut self, settings: Settings) -> Result<(), OperationError> {
        log::trace!("processing SETTINGS: {settings:?}");

        if settings.is_ack() {
            if self.flags.contains(Flags::WAITING_ACK) {
                self.flags.remove(Flags::WAITING_ACK);
                Ok(())
            } else {
                // We haven't sent any SETTINGS frames to be ACKed, so
                // this is very bizarre! Remote is either buggy or
                // malicious.
                Err(OperationError::protocol("received unexpected settings ack"))
            }
        } else {
            if let Some(size) = settings.initial_window_size() {
                if size > consts::MAX_WINDOW_SIZE {
                    return Err(OperationError::flow(format!(
                        "SETTINGS_INITIAL_WINDOW_SIZE {size} exceeds the maximum window"
                    )));
                }
                let delta = size as i64 - self.remote_initial_window as i64;
                self.remote_initial_window = size;
                for stream in self.streams.values_mut() {
                    stream.adjust_send(delta as i32);
                }
            }
            self.write_queue.enqueue_back(Settings::ack().into());
            Ok(())
        }
    }

    /// Route an error by severity: RST_STREAM for stream faults, GOAWAY
    /// for connection faults, a log line for recoverable conditions.
    fn handle_error(&mut self, err: OperationError, id: StreamId) {
        match err.level() {
            ErrorLevel::Recoverable => log::debug!("{err}"),
            ErrorLevel::Stream => {
                log::debug!("stream {id}: {err}");
                self.write_queue
                    .enqueue_front(Reset::new(id, err.code()).into());
            }
            ErrorLevel::Connection => {
                log::error!("{err}");
                if !self.flags.contains(Flags::GOAWAY_QUEUED) {
                    self.flags.insert(Flags::GOAWAY_QUEUED);
                    self.goaway_last_stream = self.last_inbound_stream;
                    self.write_queue.enqueue_front(
                        GoAway::new(err.code())
                            .set_last_stream_id(self.last_inbound_stream)
                            .set_data(err.message().to_string())
                            .into(),
                    );
                }
            }
        }
    }

    fn get_or_create_stream(&mut self, id: StreamId) -> &mut Stream {
        self.streams.entry(id).or_insert_with(|| {
            log::trace!("creating stream {id}");
            let (stream, send_flow) =
                Stream::new(id, self.cfg.window_sz, self.remote_initial_window);
            let _ = self.events_tx.send(OpenedStream { id, send_flow });
            stream
        })
    }

    /// Streams are destroyed once closed with no writes left queued for
    /// them.
    fn gc_stream(&mut self, id: StreamId) {
        if id.is_zero() {
            return;
        }
        let closed = self
            .streams
            .get(&id)
            .map(|s| s.state().is_closed())
            .unwrap_or(false);
        if closed && !self.write_queue.has_stream(id) {
            log::trace!("stream {id} is done, dropping its state");
            self.streams.remove(&id);
        }
    }
}

fn recoverable_drop(err: OperationError) -> Result<(), OperationError> {
    if err.is_recoverable() {
        log::debug!("{err}");
        Ok(())
    } else {
        Err(err)
    }
}
