use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::booking::{BookingError, BookingService, Response, ValidationError};
use crate::limits::MAX_FRAME_LEN;

/// Serve one client: each line is a request body, each reply one line of
/// `{"statusCode": .., "body": ..}`. Requests on a connection are answered in order.
pub async fn process_connection(socket: TcpStream, service: Arc<BookingService>) -> Result<(), LinesCodecError> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_FRAME_LEN));
    while let Some(line) = framed.next().await {
        let response = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => service.handle(&line, Utc::now()).await,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                debug!("oversized request line dropped");
                Response::rejected(&BookingError::Validation(ValidationError::BadRequest).rejection())
            }
            Err(e) => return Err(e),
        };
        let encoded = serde_json::to_string(&response).map_err(|e| LinesCodecError::Io(io::Error::other(e)))?;
        framed.send(encoded).await?;
    }
    Ok(())
}

/// Accept loop. Stops accepting when `shutdown` resolves, then waits up to
/// `drain` for open connections to finish.
pub async fn serve(
    listener: TcpListener,
    service: Arc<BookingService>,
    max_connections: usize,
    drain: Duration,
    shutdown: impl Future<Output = ()>,
) {
    let semaphore = Arc::new(Semaphore::new(max_connections));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    warn!("connection limit reached, rejecting {peer}");
                    metrics::counter!(crate::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                    drop(socket);
                    continue;
                };

                debug!("connection from {peer}");
                metrics::counter!(crate::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(crate::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let service = service.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = process_connection(socket, service).await {
                        warn!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(crate::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    info!("draining connections...");
    let deadline = tokio::time::sleep(drain);
    tokio::pin!(deadline);
    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut deadline => {
                let remaining = max_connections - semaphore.available_permits();
                warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }
}
