use std::fmt;

use thiserror::Error;

/// Receiver lifecycle step, used to report where a sequence failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverStep {
    Begin,
    Select,
    ColdStart,
    Stop,
    End,
    HotStart,
}

impl fmt::Display for ReceiverStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReceiverStep::Begin => "begin",
            ReceiverStep::Select => "select",
            ReceiverStep::ColdStart => "cold start",
            ReceiverStep::Stop => "stop",
            ReceiverStep::End => "end",
            ReceiverStep::HotStart => "hot start",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("receiver i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("receiver not open")]
    NotOpen,
    #[error("receiver not started")]
    NotStarted,
    #[error("end of sample stream")]
    EndOfStream,
    #[error("no sample within {0:?}")]
    Timeout(std::time::Duration),
    #[error("receiver rejected command: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum RtcError {
    #[error("rtc i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("rtc value unreadable: {0}")]
    Parse(String),
    #[error("rtc time out of range")]
    Range,
    #[error("rtc write command failed: {0}")]
    Command(String),
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("rtc read failed")]
    Read(#[source] RtcError),
    #[error("rtc write failed")]
    Write(#[source] RtcError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("receiver bring-up failed at {step}")]
    ReceiverBringupFailure {
        step: ReceiverStep,
        #[source]
        source: ReceiverError,
    },
    #[error("receiver restart failed at {step}")]
    ReceiverRestartFailure {
        step: ReceiverStep,
        #[source]
        source: ReceiverError,
    },
    #[error("receiver halted after a fatal error")]
    Halted,
    #[error(transparent)]
    Clock(#[from] ClockError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
