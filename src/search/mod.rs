//! Paginated, conjunctive multi-attribute search over the Link Store,
//! honoring the current request's `QueryFilter`.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use crate::error::AppError;
use crate::policy::{BoundValue, QueryFilter};
use crate::store::link_store::Link;

const DEFAULT_LIMIT: i64 = 100;

static NOT_IN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)not\s+in\s*\(([^)]*)\)").unwrap());
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").unwrap());

pub struct SearchEngine {
    pool: PgPool,
}

impl SearchEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// `links` empty -> ascending scan subject to `cursor`/`filter`.
    /// Non-empty -> only identifiers carrying every requested pair.
    #[instrument(skip(self, links, filter))]
    pub async fn search_aas_ids_by_links(
        &self,
        links: &[Link],
        limit: i64,
        cursor: &str,
        filter: Option<&QueryFilter>,
    ) -> Result<(Vec<String>, String), AppError> {
        let limit = if limit <= 0 { DEFAULT_LIMIT } else { limit };

        let mut deduped: Vec<&Link> = Vec::with_capacity(links.len());
        for link in links {
            if !deduped.iter().any(|l| l.name == link.name && l.value == link.value) {
                deduped.push(link);
            }
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT aas_id FROM aas_identifier WHERE 1 = 1");

        if !cursor.is_empty() {
            builder.push(" AND aas_id >= ").push_bind(cursor.to_string());
        }

        for link in &deduped {
            builder.push(
                " AND EXISTS (SELECT 1 FROM asset_link al WHERE al.aas_ref = aas_identifier.id AND al.name = ",
            );
            builder.push_bind(link.name.clone());
            builder.push(" AND al.value = ");
            builder.push_bind(link.value.clone());
            builder.push(")");
        }

        if let Some(filter) = filter {
            append_filter(&mut builder, filter);
        }

        builder.push(" ORDER BY aas_id ASC LIMIT ").push_bind(limit + 1);

        let rows: Vec<(String,)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::internal("search", "search_aas_ids_by_links", "DISC-SEARCH-QUERY", e))?;

        let mut ids: Vec<String> = rows.into_iter().map(|(id,)| id).collect();
        let next_cursor = if ids.len() as i64 > limit {
            ids.pop().unwrap_or_default()
        } else {
            String::new()
        };

        Ok((ids, next_cursor))
    }
}

/// Splices the policy-produced filter fragment into the query. A
/// recognized `... NOT IN (...)` shape has its banned identifiers
/// extracted and re-bound against `aas_id`, skipping any placeholder
/// that resolved to a missing claim (a bound `NULL` inside `NOT IN`
/// would make the whole clause evaluate to unknown, excluding
/// everything). Any other shape is treated as opaque: its placeholders
/// are bound positionally and the fragment is appended verbatim — it is
/// policy-authored, not user input.
fn append_filter(builder: &mut QueryBuilder<Postgres>, filter: &QueryFilter) {
    if let Some(captures) = NOT_IN_PATTERN.captures(&filter.fragment) {
        let inner = &captures[1];
        let banned: Vec<String> = PLACEHOLDER
            .captures_iter(inner)
            .filter_map(|c| match filter.bindings.get(&c[1]) {
                Some(BoundValue::Text(v)) => Some(v.clone()),
                _ => None,
            })
            .collect();

        if banned.is_empty() {
            return;
        }

        builder.push(" AND aas_id NOT IN (");
        let mut separated = builder.separated(", ");
        for value in banned {
            separated.push_bind(value);
        }
        separated.push_unseparated(")");
        return;
    }

    builder.push(" AND (");
    let mut last_end = 0;
    for capture in PLACEHOLDER.captures_iter(&filter.fragment) {
        let whole = capture.get(0).unwrap();
        builder.push(&filter.fragment[last_end..whole.start()]);
        match filter.bindings.get(&capture[1]) {
            Some(BoundValue::Text(v)) => {
                builder.push_bind(v.clone());
            }
            _ => {
                builder.push("NULL");
            }
        }
        last_end = whole.end();
    }
    builder.push(&filter.fragment[last_end..]);
    builder.push(")");
}
