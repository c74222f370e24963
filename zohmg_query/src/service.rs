//! One dataset's query entry point: raw query string in, rendered response out.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, info, warn};
use zohmg_schema::Schema;
use zohmg_store::RowStore;

use crate::{
    Error, Query, QueryParams, QueryResult, Result, ScanMergeExecutor, plan, render_error,
    render_result,
};

/// What is sent back for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
}

/// Answers raw query strings against one dataset
#[derive(Debug)]
pub struct QueryService<S: RowStore + ?Sized> {
    schema: Arc<Schema>,
    store: Arc<S>,
}

impl<S: RowStore + ?Sized> Clone for QueryService<S> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RowStore + ?Sized> QueryService<S> {
    pub fn new(schema: Arc<Schema>, store: Arc<S>) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Run a query and render the response, errors included
    pub fn query(&self, query_string: &str) -> Response {
        let params = match QueryParams::from_query_string(query_string) {
            Ok(params) => params,
            Err(e) => return error_response(&e, None),
        };
        let callback = match params.callback() {
            Ok(callback) => callback,
            Err(e) => return error_response(&e, None),
        };

        match self
            .execute(&params)
            .and_then(|result| render_result(&result, callback))
        {
            Ok(body) => Response {
                status: StatusCode::OK,
                body,
            },
            Err(e) => error_response(&e, callback),
        }
    }

    pub fn execute(&self, params: &QueryParams) -> Result<QueryResult> {
        let query = Query::from_params(params, &self.schema)?;
        let plan = plan(&self.schema, &query)?;
        debug!(
            projection = %plan.projection,
            scans = plan.scans.len(),
            "planned query"
        );
        let result = ScanMergeExecutor::new(&*self.store).execute(&query, &plan)?;
        info!(
            base_dimension = %query.base_dimension,
            unit = %query.unit,
            buckets = result.len(),
            "query complete"
        );
        Ok(result)
    }
}

fn error_response(error: &Error, callback: Option<&str>) -> Response {
    let status = error.status_code();
    if status.is_server_error() {
        warn!(%error, "query failed");
    } else {
        debug!(%error, "query rejected");
    }
    match render_error(error, callback) {
        Ok(body) => Response { status, body },
        Err(_) => internal_error_response(),
    }
}

/// Sent when even the error body cannot be rendered
fn internal_error_response() -> Response {
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    Response {
        status,
        body: format!(
            r#"{{"error_msg":"internal error","status_code":{}}}"#,
            status.as_u16()
        ),
    }
}
