//! Framed TCP connection to the worker.
//!
//! One connection at a time, split into framed read/write halves. The
//! exchange here is strictly write-one-line / read-one-line; callers hold
//! the service's exchange lock for its whole duration.

use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::bridge::codec::LineJsonCodec;
use crate::bridge::protocol::{WireRequest, WireResponse};
use crate::error::BridgeError;

type ResponseReader = FramedRead<OwnedReadHalf, LineJsonCodec<WireResponse>>;
type RequestWriter = FramedWrite<OwnedWriteHalf, LineJsonCodec<WireRequest>>;

const INITIAL_PROBE_DELAY: Duration = Duration::from_millis(50);
const MAX_PROBE_DELAY: Duration = Duration::from_millis(500);

/// One live framed connection to the worker endpoint.
#[derive(Debug)]
pub struct WorkerConnection {
    reader: ResponseReader,
    writer: RequestWriter,
}

impl WorkerConnection {
    /// Open a single connection attempt with a bounded timeout.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| BridgeError::connection(format!("timed out connecting to {addr}")))?
            .map_err(|e| BridgeError::connection(format!("failed to connect to {addr}: {e}")))?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FramedRead::new(read_half, LineJsonCodec::new()),
            writer: FramedWrite::new(write_half, LineJsonCodec::new()),
        })
    }

    /// Probe the endpoint until it accepts, with exponential backoff.
    ///
    /// This is the post-spawn readiness check: the worker signals ready by
    /// listening, so repeated connection attempts replace a fixed settle
    /// delay.
    pub async fn connect_with_backoff(
        addr: &str,
        attempt_timeout: Duration,
        deadline: Duration,
    ) -> Result<Self, BridgeError> {
        let start = tokio::time::Instant::now();
        let mut delay = INITIAL_PROBE_DELAY;

        loop {
            match Self::connect(addr, attempt_timeout).await {
                Ok(conn) => {
                    tracing::debug!(
                        addr,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Worker accepted connection"
                    );
                    return Ok(conn);
                }
                Err(e) if start.elapsed() + delay >= deadline => {
                    return Err(BridgeError::connection(format!(
                        "worker not ready within {}ms: {e}",
                        deadline.as_millis()
                    )));
                }
                Err(e) => {
                    tracing::debug!(
                        addr,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Worker not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_PROBE_DELAY);
                }
            }
        }
    }

    /// Send one request line and read the next response line.
    ///
    /// I/O failures and stream close surface as connection errors; a line
    /// that is not valid JSON surfaces as a decode error. The caller
    /// decides which of those invalidate the connection.
    pub async fn exchange(
        &mut self,
        request: WireRequest,
        read_timeout: Duration,
    ) -> Result<WireResponse, BridgeError> {
        self.writer
            .send(request)
            .await
            .map_err(|e| classify_io(e, "failed to send request"))?;

        let frame = tokio::time::timeout(read_timeout, self.reader.next())
            .await
            .map_err(|_| BridgeError::connection("timed out waiting for worker response"))?;

        match frame {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(classify_io(e, "failed to read response")),
            None => Err(BridgeError::connection("worker closed the connection")),
        }
    }

    /// Flush and close the write half. Failures are logged, never surfaced.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.close().await {
            tracing::debug!(error = %e, "Error closing worker connection");
        }
    }
}

fn classify_io(err: io::Error, context: &str) -> BridgeError {
    if err.kind() == io::ErrorKind::InvalidData {
        BridgeError::decode(format!("{context}: {err}"))
    } else {
        BridgeError::connection(format!("{context}: {err}"))
    }
}
