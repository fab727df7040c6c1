mod statement_params;
mod statement_params_builder;
mod statement_query;

pub use crate::statement::statement_params::StatementParams;
pub use crate::statement::statement_params_builder::StatementParamsBuilder;
pub use crate::statement::statement_query::{Query, Statement};
