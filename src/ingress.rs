//! Bounded hand-off between transport tasks and the control loop.
//!
//! Transports push what they receive; the control loop drains with
//! non-blocking polls, so it never waits on I/O.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::protocol::{Response, MAX_REQUEST_LEN};
use crate::MAX_TOKEN_BYTES;

/// Reliable-channel requests waiting for the control loop.
pub const REQUEST_DEPTH: usize = 4;
/// Datagrams waiting for the control loop. Further ones are dropped.
pub const DATAGRAM_DEPTH: usize = 4;
/// Longest best-effort payload kept, in bytes.
pub const MAX_DATAGRAM_LEN: usize = MAX_TOKEN_BYTES;

pub type RequestLine = Vec<u8, MAX_REQUEST_LEN>;
pub type Datagram = Vec<u8, MAX_DATAGRAM_LEN>;

pub struct Inbox<M: RawMutex> {
    requests: Channel<M, RequestLine, REQUEST_DEPTH>,
    responses: Channel<M, Response, REQUEST_DEPTH>,
    datagrams: Channel<M, Datagram, DATAGRAM_DEPTH>,
}

impl<M: RawMutex> Inbox<M> {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: Channel::new(),
            datagrams: Channel::new(),
        }
    }

    /// Sends a reliable-channel request and waits for its answer.
    ///
    /// Meant for a single requester; answers come back in request order.
    pub async fn request(&self, line: RequestLine) -> Response {
        self.requests.send(line).await;
        self.responses.receive().await
    }

    pub fn try_request(&self, line: RequestLine) -> Result<(), RequestLine> {
        self.requests.try_send(line).map_err(|err| match err {
            embassy_sync::channel::TrySendError::Full(line) => line,
        })
    }

    pub fn try_response(&self) -> Option<Response> {
        self.responses.try_receive().ok()
    }

    /// Queues a datagram. Returns `false` if it was dropped for lack of room.
    pub fn offer_datagram(&self, datagram: Datagram) -> bool {
        self.datagrams.try_send(datagram).is_ok()
    }

    pub(crate) fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub(crate) fn poll_request(&self) -> Option<RequestLine> {
        self.requests.try_receive().ok()
    }

    pub(crate) fn poll_datagram(&self) -> Option<Datagram> {
        self.datagrams.try_receive().ok()
    }

    pub(crate) fn respond(&self, response: Response) -> bool {
        self.responses.try_send(response).is_ok()
    }
}

impl<M: RawMutex> Default for Inbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn full_datagram_queue_drops_newest() {
        let inbox = Inbox::<NoopRawMutex>::new();
        for i in 0..DATAGRAM_DEPTH {
            assert!(inbox.offer_datagram(Vec::from_slice(&[i as u8]).unwrap()));
        }
        assert!(!inbox.offer_datagram(Vec::from_slice(b"late").unwrap()));

        assert_eq!(inbox.poll_datagram().unwrap(), [0u8]);
    }

    #[test]
    fn requests_are_polled_in_order() {
        let inbox = Inbox::<NoopRawMutex>::new();
        assert!(inbox.poll_request().is_none());
        inbox.try_request(Vec::from_slice(b"STATUS").unwrap()).unwrap();
        inbox.try_request(Vec::from_slice(b"PROBE").unwrap()).unwrap();

        assert_eq!(inbox.pending_requests(), 2);
        assert_eq!(inbox.poll_request().unwrap(), *b"STATUS");
        assert_eq!(inbox.poll_request().unwrap(), *b"PROBE");
    }
}
