/*!
 * Module Server
 *
 * Boundary-side request loop. Lease traffic (renew, release, shutdown) is
 * answered directly on the control path; everything that runs module code
 * is handed to a single worker thread and executed in arrival order. A
 * reaper thread reclaims objects whose leases lapsed.
 */

use super::host::ModuleHost;
use super::objects::ObjectTable;
use super::registry::ModuleRegistry;
use crate::boundary::framing::{decode, encode, FrameReader, FrameWriter, StreamReader, StreamWriter};
use crate::boundary::{Envelope, Request, Response};
use crate::core::errors::{BoundaryError, ModuleError};
use crate::core::limits::BOUNDARY_REAP_INTERVAL;
use crate::monitoring::{init_module_tracing, CallSpan};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

type SharedWriter = Arc<Mutex<Box<dyn FrameWriter>>>;

pub struct ModuleServer {
    host: ModuleHost,
}

impl ModuleServer {
    /// `isolated` servers own their process and may change its working directory
    pub fn new(registry: ModuleRegistry, isolated: bool) -> Self {
        Self {
            host: ModuleHost::new(registry, isolated),
        }
    }

    /// Serve requests until shutdown or until the host goes away
    pub fn run(
        self,
        mut reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
    ) -> Result<(), BoundaryError> {
        let module = self.host.name().to_string();
        let writer: SharedWriter = Arc::new(Mutex::new(writer));
        let objects = self.host.objects().clone();

        let (work_tx, work_rx) = flume::unbounded::<Envelope<Request>>();
        let worker_writer = writer.clone();
        let mut host = self.host;
        thread::Builder::new()
            .name(format!("{}-worker", module))
            .spawn(move || {
                for envelope in work_rx.iter() {
                    let reply = handle(&mut host, envelope.body);
                    match reply_to(&worker_writer, envelope.id, reply) {
                        Ok(()) => {}
                        Err(BoundaryError::Closed) => {
                            debug!("Host stopped listening");
                            break;
                        }
                        Err(e) => warn!(id = envelope.id, error = %e, "Reply lost"),
                    }
                }
            })?;

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let reaper_objects = objects.clone();
        let reaper = thread::Builder::new()
            .name(format!("{}-reaper", module))
            .spawn(move || {
                while let Err(flume::RecvTimeoutError::Timeout) =
                    stop_rx.recv_timeout(BOUNDARY_REAP_INTERVAL)
                {
                    let reclaimed = reaper_objects.reap(Instant::now());
                    if !reclaimed.is_empty() {
                        debug!(count = reclaimed.len(), "Reaped expired objects");
                    }
                }
            })?;

        info!(module = %module, "Module server ready");
        let result = control_loop(&mut *reader, &writer, &objects, &work_tx);

        drop(work_tx);
        let _ = stop_tx.send(());
        let _ = reaper.join();
        objects.clear();
        info!(module = %module, "Module server stopped");
        result
    }
}

fn control_loop(
    reader: &mut dyn FrameReader,
    writer: &SharedWriter,
    objects: &ObjectTable,
    work_tx: &flume::Sender<Envelope<Request>>,
) -> Result<(), BoundaryError> {
    loop {
        let frame = match reader.recv() {
            Ok(frame) => frame,
            Err(BoundaryError::Closed) => {
                debug!("Host closed the boundary channel");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let envelope: Envelope<Request> = decode(&frame)?;
        trace!(id = envelope.id, request = envelope.body.name(), "Request received");

        match envelope.body {
            Request::Renew { object, lease_time } => {
                let reply = if objects.renew(object, lease_time) {
                    Response::Ack
                } else {
                    Response::Failed(ModuleError::disconnected(format!(
                        "{} was already reclaimed",
                        object
                    )))
                };
                reply_to(writer, envelope.id, reply)?;
            }
            Request::Release { object } => {
                if objects.release(object) {
                    debug!(object = %object, "Released by host");
                }
                reply_to(writer, envelope.id, Response::Ack)?;
            }
            Request::Shutdown => {
                // Best effort: the host may already have stopped reading
                let _ = reply_to(writer, envelope.id, Response::Ack);
                return Ok(());
            }
            _ => {
                if work_tx.send(envelope).is_err() {
                    return Err(BoundaryError::Closed);
                }
            }
        }
    }
}

/// Send `body` as the reply to request `id`
///
/// A reply that cannot be framed is replaced by a call failure so the caller
/// is never left waiting.
fn reply_to(writer: &SharedWriter, id: u64, body: Response) -> Result<(), BoundaryError> {
    let frame = match encode(&Envelope { id, body }) {
        Ok(frame) => frame,
        Err(e @ (BoundaryError::FrameTooLarge { .. } | BoundaryError::Codec(_))) => {
            warn!(id, error = %e, "Reply could not be framed");
            let failed = Response::Failed(ModuleError::call(format!("reply could not be sent: {}", e)));
            encode(&Envelope { id, body: failed })?
        }
        Err(e) => return Err(e),
    };
    writer.lock().send(frame)
}

/// Run one module-code request on the worker thread
fn handle(host: &mut ModuleHost, request: Request) -> Response {
    let result = match request {
        Request::Load {
            package,
            settings,
            lease,
        } => host
            .load(&package, settings, lease)
            .map(|types| Response::Loaded {
                module: host.name().to_string(),
                types,
            }),
        Request::GetTypes { capability } => host.get_types(&capability).map(Response::Types),
        Request::HasAnyCapability { capabilities } => {
            host.has_any_capability(&capabilities).map(Response::Bool)
        }
        Request::Create {
            type_name,
            primary,
            optional,
        } => host
            .create(&type_name, &primary, &optional)
            .map(|(object, exposed, lease)| Response::Created {
                object,
                capabilities: exposed.names(),
                lease,
            }),
        Request::GetResource { name } => host.resource(&name).map(Response::Resource),
        Request::Invoke { object, invocation } => {
            let span = CallSpan::new(invocation.method(), object.0);
            let _entered = span.enter();
            let result = host.invoke(object, &invocation);
            match &result {
                Ok(_) => span.succeeded(),
                Err(e) => span.failed(e.message()),
            }
            result.map(Response::Returned)
        }
        other => Err(ModuleError::protocol(format!(
            "{} is not a module request",
            other.name()
        ))),
    };
    result.unwrap_or_else(Response::Failed)
}

/// Entry point of a module package process
///
/// Serves `registry` over stdin/stdout until the host shuts the boundary down.
pub fn serve(registry: ModuleRegistry) -> anyhow::Result<()> {
    init_module_tracing();
    let module = registry.name().to_string();

    let server = ModuleServer::new(registry, true);
    let reader = Box::new(StreamReader::new(std::io::stdin()));
    let writer = Box::new(StreamWriter::new(std::io::stdout()));

    if let Err(e) = server.run(reader, writer) {
        warn!(module = %module, error = %e, "Module server failed");
        return Err(e.into());
    }
    Ok(())
}
