//! Client-side frame transport over one TCP connection.
//!
//! Calls are sequential: one request frame out, response frames in until the
//! `done` frame for that id arrives. The correlation id catches a server
//! that answers out of turn.

use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use cabledb_error::{CableError, Result};
use cabledb_proto::{
    ConnectionRef, ListenEvent, ListenRequest, Reply, Request, RequestFrame, ResponseFrame,
    ResponsePayload, read_frame, write_frame,
};

pub struct Transport {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    next_id: u64,
}

impl Transport {
    /// Connect to a server address (`host:port`).
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!(addr, "transport connected");
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            next_id: 1,
        })
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn next_response(&mut self, id: u64) -> Result<ResponseFrame> {
        let frame: ResponseFrame = read_frame(&mut self.reader)
            .await?
            .ok_or_else(|| CableError::protocol("server closed the connection mid-call"))?;
        if frame.id != id {
            return Err(CableError::protocol(format!(
                "response for call {} while waiting on call {id}",
                frame.id
            )));
        }
        Ok(frame)
    }

    /// Issue a unary request and await its reply.
    pub async fn call(&mut self, request: Request) -> Result<Reply> {
        let id = self.allocate_id();
        debug!(id, method = request.method(), "call");
        write_frame(&mut self.writer, &RequestFrame { id, request }).await?;

        let frame = self.next_response(id).await?;
        match frame.payload {
            ResponsePayload::Reply(reply) => Ok(reply),
            ResponsePayload::Error(err) => Err(err.into_error()),
            ResponsePayload::Event(_) => Err(CableError::protocol(
                "stream event on a unary call",
            )),
        }
    }

    /// Open a listen stream and collect it: the events received, plus the
    /// terminal status if the stream ended with one.
    pub async fn listen(
        &mut self,
        connection: ConnectionRef,
    ) -> Result<(Vec<ListenEvent>, Option<CableError>)> {
        let id = self.allocate_id();
        let request = Request::Listen(ListenRequest {
            connection: Some(connection),
        });
        write_frame(&mut self.writer, &RequestFrame { id, request }).await?;

        let mut events = Vec::new();
        loop {
            let frame = self.next_response(id).await?;
            match frame.payload {
                ResponsePayload::Event(event) => {
                    events.push(event);
                    if frame.done {
                        return Ok((events, None));
                    }
                }
                ResponsePayload::Error(err) => return Ok((events, Some(err.into_error()))),
                ResponsePayload::Reply(_) => {
                    return Err(CableError::protocol("unary reply on a stream call"));
                }
            }
        }
    }
}
