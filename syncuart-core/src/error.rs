//! Transport errors

/// Errors reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No free timer to clock the link
    ResourceUnavailable,
    /// Peer never answered the firmware version query with a usable version
    DeviceNotResponding,
    /// Outbound buffer filled up; only `accepted` source bytes were queued
    ShortWrite { accepted: usize },
    /// Priority frame is empty or larger than the whole outbound buffer
    PriorityRejected,
    /// Priority frame did not complete in time; its remainder is sent as data
    PriorityTimeout,
    /// Priority frame was replaced by a newer one before it completed
    PrioritySuperseded,
    /// Requeueing would have evicted unread inbound bytes
    RequeueRejected,
    /// `open` called on an open transport
    AlreadyOpen,
    /// Operation needs a running link
    Closed,
}

impl TransportError {
    /// Whether the error ends initialization and leaves the link closed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::ResourceUnavailable | TransportError::DeviceNotResponding
        )
    }
}

impl embedded_io::Error for TransportError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;

        match self {
            TransportError::ResourceUnavailable => ErrorKind::OutOfMemory,
            TransportError::DeviceNotResponding => ErrorKind::NotConnected,
            TransportError::ShortWrite { .. } => ErrorKind::WriteZero,
            TransportError::PriorityRejected | TransportError::RequeueRejected => {
                ErrorKind::InvalidInput
            }
            TransportError::PriorityTimeout => ErrorKind::TimedOut,
            TransportError::PrioritySuperseded => ErrorKind::Interrupted,
            TransportError::AlreadyOpen => ErrorKind::AlreadyExists,
            TransportError::Closed => ErrorKind::NotConnected,
        }
    }
}
