//! Shared paging and filtering for admin list queries.

use emporium_core::api::{ListQuery, Paginated};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::RepositoryError;

/// How `?status=` filters a table.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StatusColumn {
    /// The table has no status filter.
    None,
    /// Compare an enum column by its text value.
    Enum(&'static str),
    /// Map `active`/`inactive` onto a boolean column.
    Active(&'static str),
}

/// Describes a list query over one table (optionally joined).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListSpec {
    pub select: &'static str,
    pub from: &'static str,
    pub search: &'static [&'static str],
    pub status: StatusColumn,
    pub order_by: &'static str,
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, spec: &ListSpec, query: &ListQuery) {
    qb.push(" WHERE TRUE");

    if let Some(term) = query.search()
        && !spec.search.is_empty()
    {
        let pattern = like_pattern(term);
        qb.push(" AND (");
        for (i, column) in spec.search.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        qb.push(")");
    }

    match (spec.status, query.status_filter()) {
        (StatusColumn::Enum(column), Some(status)) => {
            qb.push(" AND ")
                .push(column)
                .push("::text = ")
                .push_bind(status.to_owned());
        }
        (StatusColumn::Active(column), Some("active")) => {
            qb.push(" AND ").push(column);
        }
        (StatusColumn::Active(column), Some("inactive")) => {
            qb.push(" AND NOT ").push(column);
        }
        _ => {}
    }
}

/// Fetch one page of rows matching `query`.
pub(crate) async fn fetch_page<T>(
    pool: &PgPool,
    spec: &ListSpec,
    query: &ListQuery,
) -> Result<Paginated<T>, RepositoryError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", spec.from));
    push_filters(&mut count, spec, query);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut rows =
        QueryBuilder::<Postgres>::new(format!("SELECT {} FROM {}", spec.select, spec.from));
    push_filters(&mut rows, spec, query);
    rows.push(" ORDER BY ")
        .push(spec.order_by)
        .push(" LIMIT ")
        .push_bind(query.limit())
        .push(" OFFSET ")
        .push_bind(query.offset());
    let items = rows.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Paginated::new(items, query, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    #[test]
    fn test_filters_sql() {
        let spec = ListSpec {
            select: "*",
            from: "shop.brands",
            search: &["name", "slug"],
            status: StatusColumn::Active("is_active"),
            order_by: "name",
        };
        let query = ListQuery {
            q: Some("acme".to_owned()),
            status: Some("inactive".to_owned()),
            ..ListQuery::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM shop.brands");
        push_filters(&mut qb, &spec, &query);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM shop.brands WHERE TRUE AND (name ILIKE $1 OR slug ILIKE $2) AND NOT is_active"
        );
    }

    #[test]
    fn test_enum_status_filter_sql() {
        let spec = ListSpec {
            select: "*",
            from: "shop.orders",
            search: &[],
            status: StatusColumn::Enum("status"),
            order_by: "id",
        };
        let query = ListQuery {
            q: Some("ignored".to_owned()),
            status: Some("shipped".to_owned()),
            ..ListQuery::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM shop.orders");
        push_filters(&mut qb, &spec, &query);
        assert_eq!(
            qb.sql(),
            "SELECT * FROM shop.orders WHERE TRUE AND status::text = $1"
        );
    }
}
