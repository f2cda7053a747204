//! TCP transport: accepts connections and routes frames to the dispatcher.
//!
//! One task per TCP connection; requests on a connection are processed in
//! order, concurrent connections run in parallel. Malformed frames close
//! the connection with a logged error.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use cabledb_error::{CableError, Result};
use cabledb_proto::{
    Reply, Request, RequestFrame, ResponseFrame, ResponsePayload, WireError, read_frame,
    write_frame,
};

use crate::service::DatabaseService;

/// A bound, not-yet-running server.
pub struct Server {
    listener: TcpListener,
    service: Arc<DatabaseService>,
}

impl Server {
    /// Bind the listener. Use port 0 to pick an ephemeral port.
    pub async fn bind(addr: impl ToSocketAddrs, service: Arc<DatabaseService>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, service })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; runs until the listener fails.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "cabledb listening");
        loop {
            let (stream, remote) = self.listener.accept().await?;
            let service = Arc::clone(&self.service);
            tokio::spawn(async move {
                debug!(%remote, "client connected");
                if let Err(err) = handle_connection(stream, service).await {
                    warn!(%remote, error = %err, "connection closed with error");
                } else {
                    debug!(%remote, "client disconnected");
                }
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, service: Arc<DatabaseService>) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    while let Some(frame) = read_frame::<_, RequestFrame>(&mut reader).await? {
        let id = frame.id;
        debug!(id, method = frame.request.method(), "request");
        match frame.request {
            Request::Listen(request) => {
                serve_listen(&service, id, request, &mut writer).await?;
            }
            request => {
                let payload = match dispatch_unary(&service, request).await {
                    Ok(reply) => ResponsePayload::Reply(reply),
                    Err(err) => {
                        warn!(id, error = %err, code = %err.status_code(), "request failed");
                        ResponsePayload::Error(WireError::from_error(&err))
                    }
                };
                write_frame(
                    &mut writer,
                    &ResponseFrame {
                        id,
                        done: true,
                        payload,
                    },
                )
                .await?;
            }
        }
    }
    Ok(())
}

async fn dispatch_unary(service: &DatabaseService, request: Request) -> Result<Reply> {
    match request {
        Request::Connect(req) => service.connect(req).await.map(Reply::Connect),
        Request::Query(req) => service.query(req).await.map(Reply::Query),
        Request::List(req) => service.list(req).await.map(Reply::List),
        Request::Tables(req) => service.tables(req).await.map(Reply::Tables),
        Request::Listen(_) => {
            // Routed before we get here; a listen frame in the unary path is
            // a programming error, not a client one.
            error!("listen request reached the unary dispatcher");
            Err(CableError::internal("listen is not a unary operation"))
        }
    }
}

/// Forward listen events as non-final frames, then terminate the stream.
///
/// Event streaming is defined by the protocol but not provided by this
/// server, so the terminal status is `UNIMPLEMENTED`. A client that goes
/// away mid-stream surfaces as a write error and tears the connection down.
async fn serve_listen(
    service: &DatabaseService,
    id: u64,
    request: cabledb_proto::ListenRequest,
    writer: &mut BufWriter<OwnedWriteHalf>,
) -> Result<()> {
    match service.listen(request).await {
        Ok(mut events) => {
            while let Some(event) = events.recv().await {
                write_frame(
                    writer,
                    &ResponseFrame {
                        id,
                        done: false,
                        payload: ResponsePayload::Event(event),
                    },
                )
                .await?;
            }
            let status = CableError::unimplemented("Listen");
            write_frame(
                writer,
                &ResponseFrame {
                    id,
                    done: true,
                    payload: ResponsePayload::Error(WireError::from_error(&status)),
                },
            )
            .await
        }
        Err(err) => {
            write_frame(
                writer,
                &ResponseFrame {
                    id,
                    done: true,
                    payload: ResponsePayload::Error(WireError::from_error(&err)),
                },
            )
            .await
        }
    }
}
