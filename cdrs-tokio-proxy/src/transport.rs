//! This module contains a declaration of `ProxyTransport` trait, which abstracts the socket a
//! proxy connection writes to, and `TransportConnector`, which opens such sockets.
//!
//! The default implementation is [`TransportTcp`], created by [`TcpConnector`]. The connector is
//! configured once with the compression agreed between the proxy and the backend and registers
//! it with every transport it creates.
use cassandra_proxy_protocol::compression::Compression;
use cassandra_proxy_protocol::frame::{Frame, StreamId, EVENT_STREAM_ID};
use derive_more::Constructor;
use futures::FutureExt;
use fxhash::FxHashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::*;

use crate::cluster::ProxyConnectionConfig;
use crate::frame_parser::parse_frame;
use crate::future::BoxFuture;
use crate::Error;
use crate::Result;

/// Socket to the proxy, as seen by a proxy connection.
pub trait ProxyTransport: Send + Sync {
    /// Schedules a frame for writing and returns without waiting for the write or the response.
    fn enqueue_frame<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<PendingResponse>>;

    /// Tears the socket down. Requests waiting for responses fail.
    fn close(&self);

    /// Checks if the connection is broken (e.g. after read or write errors)
    fn is_broken(&self) -> bool;

    /// Returns associated proxy address
    fn address(&self) -> SocketAddr;
}

/// Opens sockets to the proxy.
pub trait TransportConnector: Send + Sync {
    type Transport: ProxyTransport + 'static;

    /// Connects to given address. Read and write failures of the resulting transport are sent to
    /// `error_handler`, if present.
    fn connect(
        &self,
        addr: SocketAddr,
        error_handler: Option<mpsc::Sender<Error>>,
    ) -> BoxFuture<'_, Result<Self::Transport>>;
}

/// Handle to the response of an enqueued frame.
#[derive(Debug)]
pub struct PendingResponse {
    stream: StreamId,
    receiver: oneshot::Receiver<Result<Frame>>,
}

impl PendingResponse {
    pub fn new(stream: StreamId, receiver: oneshot::Receiver<Result<Frame>>) -> Self {
        PendingResponse { stream, receiver }
    }

    #[inline]
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Waits for the response frame.
    pub async fn response(self) -> Result<Frame> {
        self.receiver
            .await
            .map_err(|_| Error::General("Connection closed while waiting for response!".into()))?
    }
}

/// Creates [`TransportTcp`] instances with a fixed compression.
#[derive(Clone, Copy, Debug, Constructor)]
pub struct TcpConnector {
    compression: Compression,
    buffer_size: usize,
    tcp_nodelay: bool,
}

impl TcpConnector {
    pub fn from_config(config: &ProxyConnectionConfig) -> Self {
        TcpConnector::new(
            config.compression(),
            config.buffer_size(),
            config.tcp_nodelay(),
        )
    }

    #[inline]
    pub fn compression(&self) -> Compression {
        self.compression
    }
}

impl TransportConnector for TcpConnector {
    type Transport = TransportTcp;

    fn connect(
        &self,
        addr: SocketAddr,
        error_handler: Option<mpsc::Sender<Error>>,
    ) -> BoxFuture<'_, Result<TransportTcp>> {
        async move {
            TransportTcp::new(
                addr,
                error_handler,
                self.compression,
                self.buffer_size,
                self.tcp_nodelay,
            )
            .await
            .map_err(Error::from)
        }
        .boxed()
    }
}

/// Default Tcp transport.
pub struct TransportTcp {
    inner: AsyncTransport,
}

impl TransportTcp {
    pub async fn new(
        addr: SocketAddr,
        error_handler: Option<mpsc::Sender<Error>>,
        compression: Compression,
        buffer_size: usize,
        tcp_nodelay: bool,
    ) -> io::Result<TransportTcp> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(tcp_nodelay)?;

        let (read_half, write_half) = split(socket);
        Ok(TransportTcp {
            inner: AsyncTransport::new(
                addr,
                compression,
                buffer_size,
                read_half,
                write_half,
                error_handler,
            ),
        })
    }
}

impl ProxyTransport for TransportTcp {
    #[inline]
    fn enqueue_frame<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Result<PendingResponse>> {
        self.inner.enqueue_frame(frame).boxed()
    }

    #[inline]
    fn close(&self) {
        self.inner.close()
    }

    #[inline]
    fn is_broken(&self) -> bool {
        self.inner.is_broken()
    }

    #[inline]
    fn address(&self) -> SocketAddr {
        self.inner.addr()
    }
}

struct AsyncTransport {
    addr: SocketAddr,
    compression: Compression,
    write_sender: mpsc::Sender<Request>,
    is_broken: Arc<AtomicBool>,
    processing_handle: JoinHandle<()>,
}

impl Drop for AsyncTransport {
    fn drop(&mut self) {
        self.processing_handle.abort();
    }
}

impl AsyncTransport {
    fn new<T: AsyncRead + AsyncWrite + Send + 'static>(
        addr: SocketAddr,
        compression: Compression,
        buffer_size: usize,
        read_half: ReadHalf<T>,
        write_half: WriteHalf<T>,
        error_handler: Option<mpsc::Sender<Error>>,
    ) -> Self {
        let (write_sender, write_receiver) = mpsc::channel(buffer_size);
        let is_broken = Arc::new(AtomicBool::new(false));

        let processing_handle = tokio::spawn(Self::start_processing(
            addr,
            write_receiver,
            error_handler,
            read_half,
            write_half,
            is_broken.clone(),
            compression,
        ));

        AsyncTransport {
            addr,
            compression,
            write_sender,
            is_broken,
            processing_handle,
        }
    }

    #[inline]
    fn is_broken(&self) -> bool {
        self.is_broken.load(Ordering::Relaxed)
    }

    #[inline]
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn close(&self) {
        debug!(addr = ?self.addr, "Closing transport.");

        self.is_broken.store(true, Ordering::Relaxed);
        self.processing_handle.abort();
    }

    async fn enqueue_frame(&self, frame: &Frame) -> Result<PendingResponse> {
        let (sender, receiver) = oneshot::channel();
        let stream_id = frame.stream;

        let data = frame.encode_with(self.compression)?;

        self.write_sender
            .send(Request::new(data, stream_id, sender))
            .await
            .map_err(|_| Error::General("Connection closed when writing data!".into()))?;

        Ok(PendingResponse::new(stream_id, receiver))
    }

    async fn start_processing<T: AsyncRead + AsyncWrite>(
        addr: SocketAddr,
        write_receiver: mpsc::Receiver<Request>,
        error_handler: Option<mpsc::Sender<Error>>,
        read_half: ReadHalf<T>,
        write_half: WriteHalf<T>,
        is_broken: Arc<AtomicBool>,
        compression: Compression,
    ) {
        let response_handler_map = ResponseHandlerMap::new();

        let writer = Self::start_writing(
            write_receiver,
            BufWriter::new(write_half),
            &response_handler_map,
        );

        let reader = Self::start_reading(read_half, compression, &response_handler_map);

        let result = tokio::try_join!(writer, reader);
        if let Err(error) = result {
            error!(%error, ?addr, "Transport error!");

            is_broken.store(true, Ordering::Relaxed);
            response_handler_map.signal_general_error(&error.to_string());

            if let Some(error_handler) = error_handler {
                let _ = error_handler.send(error).await;
            }
        }
    }

    async fn start_reading<T: AsyncRead>(
        mut read_half: ReadHalf<T>,
        compression: Compression,
        response_handler_map: &ResponseHandlerMap,
    ) -> Result<()> {
        loop {
            let frame = parse_frame(&mut read_half, compression).await?;
            if frame.stream >= 0 {
                response_handler_map.send_response(frame.stream, Ok(frame))?;
            } else if frame.stream == EVENT_STREAM_ID {
                // the proxy owns event registration with the backend
                debug!(opcode = %frame.opcode, "Ignoring server event.");
            }
        }
    }

    async fn start_writing(
        mut write_receiver: mpsc::Receiver<Request>,
        mut write_half: impl AsyncWrite + Unpin,
        response_handler_map: &ResponseHandlerMap,
    ) -> Result<()> {
        while let Some(mut request) = write_receiver.recv().await {
            loop {
                response_handler_map.add_handler(request.stream_id, request.handler);

                if let Err(error) = write_half.write_all(&request.data).await {
                    response_handler_map.send_response(request.stream_id, Err(error.into()))?;
                    return Err(Error::General("Write channel failure!".into()));
                }

                request = match write_receiver.try_recv() {
                    Ok(request) => request,
                    Err(_) => break,
                }
            }

            if let Err(error) = write_half.flush().await {
                response_handler_map.send_response(request.stream_id, Err(error.into()))?;
                return Err(Error::General("Write channel failure!".into()));
            }
        }

        Ok(())
    }
}

type ResponseHandler = oneshot::Sender<Result<Frame>>;

#[derive(Default)]
struct ResponseHandlerMap {
    stream_handlers: Mutex<FxHashMap<StreamId, ResponseHandler>>,
}

impl ResponseHandlerMap {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    fn handlers(&self) -> MutexGuard<'_, FxHashMap<StreamId, ResponseHandler>> {
        self.stream_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn add_handler(&self, stream_id: StreamId, handler: ResponseHandler) {
        self.handlers().insert(stream_id, handler);
    }

    pub fn send_response(&self, stream_id: StreamId, response: Result<Frame>) -> Result<()> {
        match self.handlers().remove(&stream_id) {
            Some(handler) => {
                let _ = handler.send(response);
                Ok(())
            }
            // unmatched stream - probably a bug somewhere
            None => Err(Error::General(format!("Unmatched stream id: {stream_id}"))),
        }
    }

    pub fn signal_general_error(&self, error: &str) {
        for (_, handler) in self.handlers().drain() {
            let _ = handler.send(Err(Error::General(error.to_string())));
        }
    }
}

#[derive(Constructor)]
struct Request {
    data: Vec<u8>,
    stream_id: StreamId,
    handler: ResponseHandler,
}
