/*!
 * Boundary Connection
 *
 * Host end of a boundary channel. Requests are correlated by id and may be
 * issued concurrently from any thread: a reader thread routes each reply to
 * the caller waiting on it, so a lease renewal never queues behind a slow
 * module call.
 */

use super::framing::{decode, encode, FrameReader, FrameWriter};
use super::protocol::{Envelope, Request, Response};
use crate::core::errors::BoundaryError;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

type Pending = DashMap<u64, flume::Sender<Response>, RandomState>;

pub struct Connection {
    name: String,
    next_id: AtomicU64,
    writer: Mutex<Option<Box<dyn FrameWriter>>>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Wrap a channel and start routing its replies
    pub fn open(
        name: impl Into<String>,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
    ) -> Result<Arc<Self>, BoundaryError> {
        let name = name.into();
        let pending: Arc<Pending> = Arc::new(DashMap::with_hasher(RandomState::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let connection = Arc::new(Self {
            name: name.clone(),
            next_id: AtomicU64::new(1),
            writer: Mutex::new(Some(writer)),
            pending: pending.clone(),
            closed: closed.clone(),
        });

        thread::Builder::new()
            .name(format!("{}-reader", name))
            .spawn(move || route_replies(name, reader, pending, closed))
            .map_err(BoundaryError::Io)?;

        Ok(connection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and block until its reply arrives
    pub fn call(&self, request: Request) -> Result<Response, BoundaryError> {
        if self.is_closed() {
            return Err(BoundaryError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.pending.insert(id, reply_tx);

        // The reader may have closed between the check above and the insert
        if self.is_closed() {
            self.pending.remove(&id);
            return Err(BoundaryError::Closed);
        }

        trace!(boundary = %self.name, id, request = request.name(), "Sending request");
        if let Err(e) = self.write(id, &request) {
            self.pending.remove(&id);
            return Err(e);
        }

        reply_rx.recv().map_err(|_| BoundaryError::Closed)
    }

    /// Send a request without waiting for the reply
    pub fn notify(&self, request: Request) -> Result<(), BoundaryError> {
        if self.is_closed() {
            return Err(BoundaryError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(boundary = %self.name, id, request = request.name(), "Sending notification");
        self.write(id, &request)
    }

    fn write(&self, id: u64, request: &Request) -> Result<(), BoundaryError> {
        let frame = encode(&Envelope {
            id,
            body: request,
        })?;
        let mut writer = self.writer.lock();
        match writer.as_mut() {
            Some(writer) => writer.send(frame),
            None => Err(BoundaryError::Closed),
        }
    }

    /// Close the channel; every waiting and future call fails with `Closed`
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the writer closes the module's input
        self.writer.lock().take();
        self.pending.clear();
        debug!(boundary = %self.name, "Connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending.len())
            .finish()
    }
}

fn route_replies(
    name: String,
    mut reader: Box<dyn FrameReader>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let frame = match reader.recv() {
            Ok(frame) => frame,
            Err(BoundaryError::Closed) => break,
            Err(e) => {
                warn!(boundary = %name, error = %e, "Boundary channel failed");
                break;
            }
        };

        match decode::<Envelope<Response>>(&frame) {
            Ok(envelope) => match pending.remove(&envelope.id) {
                Some((_, reply_tx)) => {
                    let _ = reply_tx.send(envelope.body);
                }
                None => trace!(boundary = %name, id = envelope.id, "Discarding unsolicited reply"),
            },
            Err(e) => {
                warn!(boundary = %name, error = %e, "Undecodable reply, closing channel");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    // Dropping the senders wakes every waiting caller with `Closed`
    pending.clear();
    debug!(boundary = %name, "Reply reader stopped");
}
