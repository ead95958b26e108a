//! Response envelopes returned by the query pipeline.

use crate::error::QueryError;
use crate::query::AssembledQuery;
use crate::sql::QueryBuf;
use serde::Serialize;
use serde_json::Value;

/// Outcome of a CRUD operation or of any failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub message: String,
    pub result: bool,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Rows the request matched before any mutation; 0 when the request failed.
    pub total: u64,
}

impl Message {
    pub fn success(message: impl Into<String>) -> Self {
        Message {
            message: message.into(),
            result: true,
            type_: "success".to_string(),
            id: None,
            total: 0,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Message {
            message: message.into(),
            result: false,
            type_: "warning".to_string(),
            id: None,
            total: 0,
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total = total;
        self
    }
}

impl From<&QueryError> for Message {
    fn from(e: &QueryError) -> Self {
        Message::warning(e.to_string())
    }
}

/// Rendered rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultBody {
    /// Object list; also the count-only shape with empty `data`.
    Objects { data: Vec<Value>, count: u64 },
    Datatable { draw: u32, data: Vec<Vec<Value>>, count: u64 },
    Chart {
        count: u64,
        label: Vec<Value>,
        data: Vec<Value>,
        color: Vec<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultSet {
    #[serde(flatten)]
    pub body: ResultBody,
    /// Matching rows before the limit.
    pub total: u64,
    /// Filter document clauses that were dropped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// The assembled query plus its SQL rendering.
#[derive(Clone, Debug, Serialize)]
pub struct QueryPlan {
    #[serde(flatten)]
    pub query: AssembledQuery,
    pub sql: QueryBuf,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    /// Visible column names.
    Schema(Vec<String>),
    Query(QueryPlan),
    Rows(ResultSet),
    Message(Message),
}

impl QueryOutcome {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            QueryOutcome::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_rows(&self) -> Option<&ResultSet> {
        match self {
            QueryOutcome::Rows(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&[String]> {
        match self {
            QueryOutcome::Schema(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_query(&self) -> Option<&QueryPlan> {
        match self {
            QueryOutcome::Query(q) => Some(q),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn count_only_shape() {
        let rs = ResultSet {
            body: ResultBody::Objects { data: vec![], count: 7 },
            total: 7,
            diagnostics: vec![],
        };
        assert_eq!(serde_json::to_value(&rs).unwrap(), json!({"data": [], "count": 7, "total": 7}));
    }

    #[test]
    fn message_shape() {
        let m = Message::success("Insert Success.").with_id(Some(json!(3)));
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({"message": "Insert Success.", "result": true, "type": "success", "id": 3, "total": 0})
        );
        let w = Message::from(&QueryError::MissingColumnData);
        assert_eq!(w.message, "Missing column data.");
        assert!(!w.result);
    }
}
