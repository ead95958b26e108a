//! QuerySpecBuilder: explicit fields first, raw request args fill whatever is still unset.

use super::*;
use crate::error::QueryError;
use std::collections::HashMap;

/// Row limit applied when neither an explicit nor a raw limit is given.
pub const DEFAULT_LIMIT: u32 = 10;

/// Flag parsing for raw args: only the literal `true` (any case) is true.
/// `"1"`, `"yes"`, `"false"` and `""` are all false.
pub fn parse_flag(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}

#[derive(Clone, Debug, Default)]
pub struct QuerySpecBuilder {
    model: String,
    access_level: i64,
    filters: Vec<FilterTriple>,
    group_by: Vec<GroupField>,
    order_by: Option<OrderBy>,
    include_fields: Vec<String>,
    exclude_fields: Vec<String>,
    limit: Option<Option<u32>>,
    get_first: bool,
    get_count: bool,
    as_query: bool,
    as_datatables: bool,
    as_chartjs: bool,
    as_schema: bool,
    crud: Option<String>,
    payload: Map<String, Value>,
    tree: Option<Value>,
    request_args: HashMap<String, String>,
}

impl QuerySpecBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        QuerySpecBuilder {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn access_level(mut self, level: i64) -> Self {
        self.access_level = level;
        self
    }

    pub fn filter(mut self, field: impl Into<String>, op: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FilterTriple::new(field, op, value));
        self
    }

    pub fn filters(mut self, filters: Vec<FilterTriple>) -> Self {
        self.filters = filters;
        self
    }

    pub fn group_by(mut self, field: impl Into<String>, op: GroupOp) -> Self {
        self.group_by.push(GroupField::new(field, op));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn include_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// `None` disables the limit.
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn get_first(mut self, on: bool) -> Self {
        self.get_first = on;
        self
    }

    pub fn get_count(mut self, on: bool) -> Self {
        self.get_count = on;
        self
    }

    pub fn as_query(mut self, on: bool) -> Self {
        self.as_query = on;
        self
    }

    pub fn as_datatables(mut self, on: bool) -> Self {
        self.as_datatables = on;
        self
    }

    pub fn as_chartjs(mut self, on: bool) -> Self {
        self.as_chartjs = on;
        self
    }

    pub fn as_schema(mut self, on: bool) -> Self {
        self.as_schema = on;
        self
    }

    pub fn crud(mut self, op: impl Into<String>) -> Self {
        self.crud = Some(op.into());
        self
    }

    pub fn payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn qjson(mut self, tree: Value) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Raw string args (e.g. a URI query string). Only consulted for fields not set explicitly.
    pub fn request_args(mut self, args: HashMap<String, String>) -> Self {
        self.request_args = args;
        self
    }

    pub fn build(mut self) -> Result<QuerySpec, QueryError> {
        let args = std::mem::take(&mut self.request_args);
        for (key, value) in &args {
            if value.is_empty() {
                continue;
            }
            self.apply_raw(key, value)?;
        }

        let cardinality = if self.get_count {
            Cardinality::Count
        } else if self.get_first {
            Cardinality::First
        } else {
            Cardinality::All
        };
        let render = if self.as_schema {
            RenderMode::Schema
        } else if self.as_query {
            RenderMode::Query
        } else if self.as_datatables {
            RenderMode::Datatable
        } else if self.as_chartjs {
            RenderMode::Chart
        } else {
            RenderMode::Object
        };

        Ok(QuerySpec {
            model: self.model,
            access_level: self.access_level,
            filters: self.filters,
            group_by: self.group_by,
            order_by: self.order_by,
            include_fields: self.include_fields,
            exclude_fields: self.exclude_fields,
            limit: self.limit.unwrap_or(Some(DEFAULT_LIMIT)),
            cardinality,
            render,
            crud: self.crud.filter(|c| !c.is_empty()),
            payload: self.payload,
            tree: self.tree.filter(|t| !t.is_null()),
        })
    }

    fn apply_raw(&mut self, key: &str, value: &str) -> Result<(), QueryError> {
        match key {
            "filter" if self.filters.is_empty() => self.filters = parse_filters(value)?,
            "groupby" if self.group_by.is_empty() => self.group_by = parse_group_by(value)?,
            "orderby" if self.order_by.is_none() => self.order_by = Some(parse_order_by(value)?),
            "inc_fields" if self.include_fields.is_empty() => self.include_fields = parse_list(value),
            "exc_fields" if self.exclude_fields.is_empty() => self.exclude_fields = parse_list(value),
            "limit" if self.limit.is_none() => self.limit = Some(parse_limit(value)?),
            "getfirst" if !self.get_first => self.get_first = parse_flag(value),
            "getcount" if !self.get_count => self.get_count = parse_flag(value),
            "as_query" if !self.as_query => self.as_query = parse_flag(value),
            // object list is the default view
            "as_object" => {}
            "as_datatables" if !self.as_datatables => self.as_datatables = parse_flag(value),
            "as_chartjs" if !self.as_chartjs => self.as_chartjs = parse_flag(value),
            "as_schema" if !self.as_schema => self.as_schema = parse_flag(value),
            "crud" if self.crud.is_none() => self.crud = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }
}

/// `a,eq,1;b,like,x%` → triples. Empty segments are skipped.
fn parse_filters(value: &str) -> Result<Vec<FilterTriple>, QueryError> {
    value
        .split(';')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let parts: Vec<&str> = seg.split(',').collect();
            match parts.as_slice() {
                [field, op, v] => Ok(FilterTriple::new(*field, *op, Value::String((*v).to_string()))),
                _ => Err(QueryError::InvalidFilter(format!("Invalid filter: {}", seg))),
            }
        })
        .collect()
}

fn parse_group_by(value: &str) -> Result<Vec<GroupField>, QueryError> {
    value
        .split(';')
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let parts: Vec<&str> = seg.split(',').collect();
            match parts.as_slice() {
                [field, op] => Ok(GroupField::new(*field, GroupOp::parse(op))),
                _ => Err(QueryError::InvalidFilter(format!("Invalid groupby: {}", seg))),
            }
        })
        .collect()
}

fn parse_order_by(value: &str) -> Result<OrderBy, QueryError> {
    let mut parts = value.split(',');
    let field = parts.next().unwrap_or_default().to_string();
    let direction = match parts.next().map(str::to_lowercase).as_deref() {
        None | Some("asc") => Direction::Asc,
        Some("desc") => Direction::Desc,
        Some(other) => {
            return Err(QueryError::InvalidSpec(format!("unknown order direction '{}'", other)));
        }
    };
    if field.is_empty() || parts.next().is_some() {
        return Err(QueryError::InvalidSpec(format!("invalid orderby '{}'", value)));
    }
    Ok(OrderBy { field, direction })
}

fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.to_string()).collect()
}

/// `0` disables the limit.
fn parse_limit(value: &str) -> Result<Option<u32>, QueryError> {
    let n: u32 = value
        .trim()
        .parse()
        .map_err(|_| QueryError::InvalidSpec(format!("invalid limit '{}'", value)))?;
    Ok(if n == 0 { None } else { Some(n) })
}
