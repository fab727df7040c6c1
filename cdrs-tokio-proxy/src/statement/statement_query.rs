use bytes::Bytes;
use cassandra_proxy_protocol::frame::message_execute::BodyReqExecute;
use cassandra_proxy_protocol::frame::message_prepare::BodyReqPrepare;
use cassandra_proxy_protocol::frame::message_query::BodyReqQuery;
use cassandra_proxy_protocol::frame::message_request::RequestBody;

use crate::statement::StatementParams;

/// What a query does on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Regular CQL statement.
    Simple(String),
    /// Statement to prepare.
    Prepare(String),
    /// Execution of a prepared statement with given id.
    Execute(Vec<u8>),
}

/// A query issued through a session, together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub statement: Statement,
    pub params: StatementParams,
}

impl Query {
    pub fn new(statement: Statement, params: StatementParams) -> Self {
        Query { statement, params }
    }

    pub fn simple(query: impl Into<String>) -> Self {
        Query::new(Statement::Simple(query.into()), Default::default())
    }

    pub fn prepare(query: impl Into<String>) -> Self {
        Query::new(Statement::Prepare(query.into()), Default::default())
    }

    pub fn execute(id: Vec<u8>, params: StatementParams) -> Self {
        Query::new(Statement::Execute(id), params)
    }

    /// Routing key of this query, if any.
    #[inline]
    pub fn routing_key(&self) -> Option<&Bytes> {
        self.params.routing_key.as_ref()
    }

    /// Creates the protocol body sent for this query.
    pub fn request_body(&self) -> RequestBody {
        match &self.statement {
            Statement::Simple(query) => RequestBody::Query(BodyReqQuery {
                query: query.clone(),
                query_params: self.params.query_params.clone(),
            }),
            Statement::Prepare(query) => RequestBody::Prepare(BodyReqPrepare::new(query.clone())),
            Statement::Execute(id) => RequestBody::Execute(BodyReqExecute {
                id: id.clone(),
                query_params: self.params.query_params.clone(),
            }),
        }
    }
}
