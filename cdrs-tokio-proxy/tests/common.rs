use cdrs_tokio_proxy::compression::Compression;
use cdrs_tokio_proxy::frame::{Direction, Flags, Frame, Opcode};
use cdrs_tokio_proxy::frame_parser::parse_frame;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

/// In-process stand-in for the proxy: records every request frame and answers it with a VOID
/// result.
pub struct FakeProxy {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Frame>,
    handle: JoinHandle<()>,
}

impl FakeProxy {
    pub async fn start(compression: Compression) -> Self {
        Self::start_at("127.0.0.1:0".parse().unwrap(), compression).await
    }

    pub async fn start_at(addr: SocketAddr, compression: Compression) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (sender, frames) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            // dropping the set closes all accepted sockets
            let mut connections = JoinSet::new();
            while let Ok((socket, _)) = listener.accept().await {
                connections.spawn(serve(socket, compression, sender.clone()));
            }
        });

        FakeProxy {
            addr,
            frames,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn next_frame(&mut self) -> Frame {
        timeout(Duration::from_secs(5), self.frames.recv())
            .await
            .expect("Timeout waiting for frame")
            .expect("Proxy stopped")
    }

    /// Stops listening and drops all connections.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn serve(socket: TcpStream, compression: Compression, sender: mpsc::UnboundedSender<Frame>) {
    let (mut read_half, mut write_half) = socket.into_split();

    while let Ok(frame) = parse_frame(&mut read_half, compression).await {
        let response = Frame {
            version: frame.version,
            direction: Direction::Response,
            flags: Flags::empty(),
            opcode: Opcode::Result,
            stream: frame.stream,
            body: vec![0, 0, 0, 1],
            tracing_id: None,
            warnings: vec![],
            custom_payload: None,
        };

        let _ = sender.send(frame);

        let Ok(response) = response.encode_with(compression) else {
            break;
        };

        if write_half.write_all(&response).await.is_err() {
            break;
        }
    }
}

#[allow(dead_code)]
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    panic!("Condition not met in time");
}
