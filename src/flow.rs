use crate::consts::MAX_WINDOW_SIZE;
use crate::error::OperationError;
use crate::frame::WindowSize;

/// Receive-direction flow ledger.
///
/// Tracks octets received against the advertised window (`win_used`) and
/// octets consumed but not yet acknowledged by an outgoing WINDOW_UPDATE
/// (`win_unacked`). One ledger exists for the connection and one per open
/// stream.
#[derive(Debug, Copy, Clone)]
pub struct RecvFlow {
    win_used: WindowSize,
    win_unacked: WindowSize,
    win_size: WindowSize,
}

impl RecvFlow {
    pub fn new(win_size: WindowSize) -> RecvFlow {
        RecvFlow {
            win_used: 0,
            win_unacked: 0,
            win_size,
        }
    }

    /// Account received DATA octets (payload plus padding) against the
    /// window.
    pub fn apply_received(&mut self, len: WindowSize) -> Result<(), OperationError> {
        self.win_used += len;
        if self.win_used > self.win_size {
            Err(OperationError::flow(format!(
                "DATA exceeded available window ({} vs {})",
                self.win_used, self.win_size
            )))
        } else {
            Ok(())
        }
    }

    /// Mark received octets as consumed; they become eligible for window
    /// acknowledgement.
    pub fn apply_consumed(&mut self, len: WindowSize) {
        self.win_unacked += len;
        debug_assert!(self.win_unacked <= self.win_used);
    }

    /// More than half the window is consumed-but-unacknowledged.
    pub fn over_unacked_threshold(&self) -> bool {
        2 * self.win_unacked > self.win_size
    }

    /// The increment to advertise in a WINDOW_UPDATE; resets the
    /// unacknowledged count.
    pub fn take_unacked(&mut self) -> WindowSize {
        std::mem::take(&mut self.win_unacked)
    }

    #[cfg(test)]
    pub(crate) fn win_used(&self) -> WindowSize {
        self.win_used
    }
}

/// Send-direction window accounting, for the connection and per stream.
///
/// The window can go negative when the peer shrinks
/// SETTINGS_INITIAL_WINDOW_SIZE below what is already in flight.
#[derive(Debug, Copy, Clone)]
pub struct SendFlow {
    window: i32,
}

impl SendFlow {
    pub fn new(window: i32) -> SendFlow {
        SendFlow { window }
    }

    /// Octets that may currently be sent.
    pub fn available(&self) -> WindowSize {
        if self.window < 0 {
            0
        } else {
            self.window as WindowSize
        }
    }

    /// Consume window capacity for sent octets.
    pub fn debit(&mut self, sz: WindowSize) {
        log::trace!("send window debit; sz={}; window={}", sz, self.window);
        self.window -= sz as i32;
    }

    /// Grow the window after a received WINDOW_UPDATE.
    pub fn credit(&mut self, sz: WindowSize) -> Result<(), OperationError> {
        let (val, overflow) = self.window.overflowing_add(sz as i32);
        if overflow || val > MAX_WINDOW_SIZE as i32 {
            return Err(OperationError::flow(format!(
                "window increment {sz} overflows the maximum window size"
            )));
        }
        log::trace!("send window credit; sz={}; old={}; new={}", sz, self.window, val);
        self.window = val;
        Ok(())
    }

    /// Apply a (possibly negative) SETTINGS_INITIAL_WINDOW_SIZE delta.
    pub fn adjust(&mut self, delta: i32) {
        self.window += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn received_octets_count_against_the_window() {
        let mut flow = RecvFlow::new(100);
        assert!(flow.apply_received(60).is_ok());
        assert!(flow.apply_received(40).is_ok());

        let err = flow.apply_received(1).unwrap_err();
        assert_eq!(err.code(), crate::frame::Reason::FLOW_CONTROL_ERROR);
    }

    #[test]
    fn window_update_resets_unacked_but_not_used() {
        let mut flow = RecvFlow::new(100);
        flow.apply_received(80).unwrap();
        assert!(!flow.over_unacked_threshold());

        flow.apply_consumed(80);
        assert!(flow.over_unacked_threshold());

        assert_eq!(flow.take_unacked(), 80);
        assert!(!flow.over_unacked_threshold());
        assert_eq!(flow.win_used(), 80);
    }

    #[test]
    fn threshold_is_half_the_window() {
        let mut flow = RecvFlow::new(100);
        flow.apply_received(50).unwrap();
        flow.apply_consumed(50);
        assert!(!flow.over_unacked_threshold());

        flow.apply_received(1).unwrap();
        flow.apply_consumed(1);
        assert!(flow.over_unacked_threshold());
    }

    #[test]
    fn send_window_can_go_negative() {
        let mut flow = SendFlow::new(10);
        flow.debit(10);
        assert_eq!(flow.available(), 0);

        // peer shrank SETTINGS_INITIAL_WINDOW_SIZE mid-flight
        flow.adjust(-5);
        assert_eq!(flow.available(), 0);

        flow.credit(8).unwrap();
        assert_eq!(flow.available(), 3);
    }

    #[test]
    fn send_window_overflow_is_rejected() {
        let mut flow = SendFlow::new(crate::consts::MAX_WINDOW_SIZE as i32);
        assert!(flow.credit(1).is_err());
    }
}
