/// Relay lifecycle. A running session cycles Capturing → InFlight → Waiting;
/// every exit path lands back on Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Starting = 1,
    Capturing = 2,
    InFlight = 3,
    Waiting = 4,
}

/// Discrete events that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    StartRequested,
    SourceReady,
    FrameSent,
    RoundTripSettled,
    TimerFired,
    CaptureFailed,
    StopRequested,
}

impl Phase {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Phase::Starting,
            2 => Phase::Capturing,
            3 => Phase::InFlight,
            4 => Phase::Waiting,
            _ => Phase::Idle,
        }
    }

    /// Status-line label for this phase.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "stopped",
            Phase::Starting => "starting",
            Phase::Capturing => "capturing",
            Phase::InFlight => "sending frame",
            Phase::Waiting => "ok",
        }
    }
}

/// Advances the machine by one event. Stop and capture failure win from any
/// phase; an event that makes no sense for the current phase leaves it
/// unchanged.
pub fn step(phase: Phase, signal: Signal) -> Phase {
    match (phase, signal) {
        (_, Signal::StopRequested) | (_, Signal::CaptureFailed) => Phase::Idle,
        (Phase::Idle, Signal::StartRequested) => Phase::Starting,
        (Phase::Starting, Signal::SourceReady) => Phase::Capturing,
        (Phase::Capturing, Signal::FrameSent) => Phase::InFlight,
        (Phase::InFlight, Signal::RoundTripSettled) => Phase::Waiting,
        (Phase::Waiting, Signal::TimerFired) => Phase::Capturing,
        (other, _) => other,
    }
}
