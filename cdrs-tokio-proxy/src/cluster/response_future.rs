use cassandra_proxy_protocol::frame::message_request::RequestMessage;
use cassandra_proxy_protocol::frame::{Frame, Opcode};

use crate::cluster::ProxyConnection;
use crate::error::{Error, Result};
use crate::statement::Query;
use crate::transport::TransportConnector;

/// A single in-flight query: the query itself and the request message sent for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFuture {
    pub query: Query,
    pub message: RequestMessage,
}

impl ResponseFuture {
    pub fn new(query: Query) -> Self {
        let message = RequestMessage::new(query.request_body());
        ResponseFuture { query, message }
    }

    /// Sends the message and waits for the response. Server errors are reported together with
    /// the consistency of the sent message.
    pub async fn send_request<C: TransportConnector + 'static>(
        mut self,
        connection: &ProxyConnection<C>,
    ) -> Result<Frame> {
        let response = connection.send(&mut self.message).await?.response().await?;
        if response.opcode != Opcode::Error {
            return Ok(response);
        }

        let body = response
            .response_body()?
            .into_error()
            .ok_or_else(|| Error::General("Malformed error response!".into()))?;

        Err(Error::Server {
            body,
            consistency: self.message.consistency.unwrap_or_default(),
            addr: connection.address(),
        })
    }
}

/// Creates response futures for queries.
pub trait ResponseFutureFactory: Send + Sync {
    fn create_future(&self, query: Query) -> ResponseFuture;
}

/// Creates futures sending the query as is.
#[derive(Default, Clone, Copy, Debug)]
pub struct DefaultResponseFutureFactory;

impl ResponseFutureFactory for DefaultResponseFutureFactory {
    #[inline]
    fn create_future(&self, query: Query) -> ResponseFuture {
        ResponseFuture::new(query)
    }
}
