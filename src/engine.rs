//! The request pipeline: access gate, compilation, CRUD, counting, fetching and shaping.

use crate::access;
use crate::config::ModelRegistry;
use crate::error::QueryError;
use crate::predicate::{compile, TreePolicy};
use crate::query::assemble;
use crate::response::{Message, QueryOutcome, QueryPlan, ResultBody, ResultSet};
use crate::service::{CrudExecutor, InsertHook};
use crate::shape::{self, FieldFilter};
use crate::spec::{Cardinality, QuerySpec, QuerySpecBuilder, RenderMode};
use crate::sql;
use crate::store::Store;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default)]
pub struct QueryOptions {
    pub tree_policy: TreePolicy,
}

/// Stateless between requests; share it behind an `Arc`.
pub struct QueryEngine {
    registry: Arc<ModelRegistry>,
    store: Arc<dyn Store>,
    options: QueryOptions,
    hooks: HashMap<String, Arc<dyn InsertHook>>,
}

impl QueryEngine {
    pub fn new(registry: Arc<ModelRegistry>, store: Arc<dyn Store>) -> Self {
        QueryEngine {
            registry,
            store,
            options: QueryOptions::default(),
            hooks: HashMap::new(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Route inserts for `model` (case-insensitive) through `hook`.
    pub fn with_insert_hook(mut self, model: &str, hook: Arc<dyn InsertHook>) -> Self {
        self.hooks.insert(model.to_lowercase(), hook);
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Build the spec and run it. Parse failures come back as a warning message.
    pub async fn generate_from(&self, builder: QuerySpecBuilder) -> QueryOutcome {
        match builder.build() {
            Ok(spec) => self.generate(&spec).await,
            Err(e) => failure(&e),
        }
    }

    /// Run one request. Never fails: errors become a warning `Message`.
    pub async fn generate(&self, spec: &QuerySpec) -> QueryOutcome {
        match self.run(spec).await {
            Ok(outcome) => outcome,
            Err(e) => failure(&e),
        }
    }

    async fn run(&self, spec: &QuerySpec) -> Result<QueryOutcome, QueryError> {
        let model = self.registry.resolve(&spec.model);
        access::check_read(&model, spec.access_level)?;
        if !model.known {
            return Err(QueryError::UnknownModel(spec.model.clone()));
        }

        let filter = FieldFilter::new(&model, &spec.include_fields, &spec.exclude_fields);
        if spec.render == RenderMode::Schema {
            return Ok(QueryOutcome::Schema(shape::visible_columns(&model, &filter)));
        }

        let compiled = compile(&model, &spec.filters, spec.tree.as_ref(), self.options.tree_policy)?;
        let query = assemble(model.clone(), compiled.predicate, &spec.group_by, spec.order_by.as_ref())?;
        tracing::debug!(model = %model.name, query = ?query.predicate, "assembled");

        if let Some(verb) = &spec.crud {
            access::check_write(&model, spec.access_level)?;
            let total = self.store.count(&query).await?;
            let visible = shape::visible_columns(&model, &filter);
            let msg = CrudExecutor::new(self.store.as_ref(), &self.hooks)
                .execute(verb, &query, &spec.payload, &visible)
                .await?;
            return Ok(QueryOutcome::Message(msg.with_total(total)));
        }

        let total = self.store.count(&query).await?;
        let query = query.with_limit(spec.limit);

        if spec.render == RenderMode::Query {
            let sql = sql::select(&query);
            return Ok(QueryOutcome::Query(QueryPlan { query, sql }));
        }

        let body = match spec.cardinality {
            Cardinality::Count => shape::to_count(total),
            cardinality => {
                let query = match cardinality {
                    Cardinality::First => query.with_limit(Some(1)),
                    _ => query,
                };
                let rows = self.store.fetch(&query).await?;
                let output = query.output_columns();
                let trimmed = shape::trim(&rows, &output, &filter);
                let columns = if query.is_grouped() {
                    output
                } else if !spec.include_fields.is_empty() {
                    spec.include_fields.clone()
                } else {
                    shape::visible_columns(&model, &filter)
                };
                render(spec.render, trimmed, &columns)
            }
        };

        Ok(QueryOutcome::Rows(ResultSet {
            body,
            total,
            diagnostics: compiled.diagnostics,
        }))
    }
}

fn render(mode: RenderMode, rows: Vec<Map<String, Value>>, columns: &[String]) -> ResultBody {
    match mode {
        RenderMode::Datatable => shape::to_datatable(&rows, columns),
        RenderMode::Chart => shape::to_chart(&rows, columns, &mut rand::thread_rng()),
        _ => shape::to_objects(rows),
    }
}

fn failure(e: &QueryError) -> QueryOutcome {
    match e {
        QueryError::Store(inner) => tracing::error!(error = %inner, "storage failure"),
        other => tracing::debug!(error = %other, "request rejected"),
    }
    QueryOutcome::Message(Message::from(e))
}
