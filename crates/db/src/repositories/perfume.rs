use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use scentpick_core::attributes::parse_tokens;
use scentpick_core::domain::perfume::{Gender, GenderFilter, Perfume, PerfumeId};

use super::{
    parse_timestamp, CatalogFacets, PerfumeRepository, RepositoryError, SearchFilter, SearchPage,
};
use crate::DbPool;

const PERFUME_COLUMNS: &str = "id, brand, name, description, concentration, gender, sizes, \
     detail_url, main_accords, top_notes, middle_notes, base_notes, notes_score, season_score, \
     day_night_score, created_at, updated_at";

pub struct SqlPerfumeRepository {
    pool: DbPool,
}

impl SqlPerfumeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Structured pass: the accord must appear as an element of the
    /// `main_accords` JSON array. Errors out on rows whose attribute is not
    /// valid JSON, which the caller treats the same as an empty result.
    async fn accords_containment(
        &self,
        accords: &[String],
        limit: u32,
        gender: Option<GenderFilter>,
    ) -> Result<Vec<Perfume>, sqlx::Error> {
        let mut sql = format!("SELECT {PERFUME_COLUMNS} FROM perfumes WHERE (");
        for index in 0..accords.len() {
            if index > 0 {
                sql.push_str(" OR ");
            }
            sql.push_str(
                "EXISTS (SELECT 1 FROM json_each(perfumes.main_accords) WHERE json_each.value = ?)",
            );
        }
        sql.push(')');
        push_gender_clause(&mut sql, gender);
        sql.push_str(" ORDER BY id LIMIT ?");

        let mut query = sqlx::query(&sql);
        for accord in accords {
            query = query.bind(accord);
        }
        query = bind_gender(query, gender);

        let rows = query.bind(limit as i64).fetch_all(&self.pool).await?;
        rows.iter().map(map_perfume).collect::<Result<Vec<_>, _>>().map_err(decode_as_sqlx)
    }

    /// Substring pass over the raw attribute text. `quoted` wraps each token
    /// in double quotes so it only matches JSON-encoded string elements.
    async fn accords_substring(
        &self,
        accords: &[String],
        limit: u32,
        gender: Option<GenderFilter>,
        quoted: bool,
    ) -> Result<Vec<Perfume>, RepositoryError> {
        let mut sql = format!("SELECT {PERFUME_COLUMNS} FROM perfumes WHERE (");
        for index in 0..accords.len() {
            if index > 0 {
                sql.push_str(" OR ");
            }
            sql.push_str("main_accords LIKE ?");
        }
        sql.push(')');
        push_gender_clause(&mut sql, gender);
        sql.push_str(" ORDER BY id LIMIT ?");

        let mut query = sqlx::query(&sql);
        for accord in accords {
            let pattern = if quoted {
                format!("%\"{accord}\"%")
            } else {
                format!("%{accord}%")
            };
            query = query.bind(pattern);
        }
        query = bind_gender(query, gender);

        let rows = query.bind(limit as i64).fetch_all(&self.pool).await?;
        rows.iter().map(map_perfume).collect()
    }
}

#[async_trait::async_trait]
impl PerfumeRepository for SqlPerfumeRepository {
    async fn find_by_id(&self, id: PerfumeId) -> Result<Option<Perfume>, RepositoryError> {
        let sql = format!("SELECT {PERFUME_COLUMNS} FROM perfumes WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(map_perfume).transpose()
    }

    async fn find_by_accords(
        &self,
        accords: &[String],
        limit: u32,
        gender: Option<GenderFilter>,
    ) -> Result<Vec<Perfume>, RepositoryError> {
        if accords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // Structured containment first; a failure there (heterogeneous rows
        // that are not valid JSON) degrades to the substring ladder rather
        // than surfacing an error.
        match self.accords_containment(accords, limit, gender).await {
            Ok(perfumes) if !perfumes.is_empty() => return Ok(perfumes),
            Ok(_) | Err(_) => {}
        }

        let quoted = self.accords_substring(accords, limit, gender, true).await?;
        if !quoted.is_empty() {
            return Ok(quoted);
        }
        self.accords_substring(accords, limit, gender, false).await
    }

    async fn search(
        &self,
        filter: &SearchFilter,
        page: u32,
        per_page: u32,
    ) -> Result<SearchPage, RepositoryError> {
        let per_page = per_page.max(1);
        let (where_sql, binds) = build_search_where(filter);

        let count_sql = format!("SELECT COUNT(*) AS count FROM perfumes{where_sql}");
        let mut count_query = sqlx::query(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(&self.pool).await?.try_get::<i64, _>("count")? as u64;

        let total_pages = (total.div_ceil(per_page as u64)).max(1) as u32;
        let page = page.clamp(1, total_pages);

        let page_sql = format!(
            "SELECT {PERFUME_COLUMNS} FROM perfumes{where_sql} ORDER BY brand, name LIMIT ? OFFSET ?",
        );
        let mut page_query = sqlx::query(&page_sql);
        for bind in &binds {
            page_query = page_query.bind(bind);
        }
        let rows = page_query
            .bind(per_page as i64)
            .bind(((page - 1) * per_page) as i64)
            .fetch_all(&self.pool)
            .await?;
        let items = rows.iter().map(map_perfume).collect::<Result<Vec<_>, _>>()?;

        Ok(SearchPage { items, total, page, total_pages })
    }

    async fn neighbor_ids(
        &self,
        id: PerfumeId,
    ) -> Result<(Option<PerfumeId>, Option<PerfumeId>), RepositoryError> {
        let row = sqlx::query(
            "SELECT (SELECT MAX(id) FROM perfumes WHERE id < ?) AS prev_id,
                    (SELECT MIN(id) FROM perfumes WHERE id > ?) AS next_id",
        )
        .bind(id.0)
        .bind(id.0)
        .fetch_one(&self.pool)
        .await?;

        let prev = row.try_get::<Option<i64>, _>("prev_id")?.map(PerfumeId);
        let next = row.try_get::<Option<i64>, _>("next_id")?.map(PerfumeId);
        Ok((prev, next))
    }

    async fn facets(&self) -> Result<CatalogFacets, RepositoryError> {
        let brands = distinct_column(&self.pool, "brand").await?;
        let concentrations = distinct_column(&self.pool, "concentration").await?;
        let genders = distinct_column(&self.pool, "gender").await?;

        // Accords are heterogeneously encoded, so the distinct set is built
        // by normalizing each row through the shared token parser.
        let rows = sqlx::query("SELECT main_accords FROM perfumes WHERE main_accords IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        let mut accord_set = BTreeSet::new();
        for row in &rows {
            let raw = row.try_get::<String, _>("main_accords")?;
            let value = parse_attribute(Some(raw));
            for token in parse_tokens(&value) {
                accord_set.insert(token);
            }
        }

        Ok(CatalogFacets { brands, concentrations, genders, accords: accord_set.into_iter().collect() })
    }
}

fn push_gender_clause(sql: &mut String, gender: Option<GenderFilter>) {
    if let Some(filter) = gender {
        sql.push_str(" AND gender IN (");
        for index in 0..filter.admitted().len() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
        }
        sql.push(')');
    }
}

fn bind_gender<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    gender: Option<GenderFilter>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    if let Some(filter) = gender {
        for tag in filter.admitted() {
            query = query.bind(*tag);
        }
    }
    query
}

/// Builds the WHERE clause for catalog search. Filter groups AND together;
/// values within a group OR together. Returns the clause and its bind
/// values in order.
fn build_search_where(filter: &SearchFilter) -> (String, Vec<String>) {
    let mut groups: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    const FREE_TEXT_COLUMNS: &[&str] =
        &["brand", "name", "description", "main_accords", "top_notes", "middle_notes", "base_notes"];

    if let Some(query) = filter.query.as_deref() {
        for word in query.split_whitespace() {
            let members =
                FREE_TEXT_COLUMNS.iter().map(|col| format!("{col} LIKE ?")).collect::<Vec<_>>();
            groups.push(format!("({})", members.join(" OR ")));
            let pattern = format!("%{word}%");
            binds.extend(std::iter::repeat(pattern).take(FREE_TEXT_COLUMNS.len()));
        }
    }

    if !filter.brands.is_empty() {
        let marks = vec!["?"; filter.brands.len()].join(", ");
        groups.push(format!("brand IN ({marks})"));
        binds.extend(filter.brands.iter().cloned());
    }

    if !filter.sizes.is_empty() {
        let members = vec![
            "EXISTS (SELECT 1 FROM json_each(perfumes.sizes) WHERE json_each.value = ?)";
            filter.sizes.len()
        ]
        .join(" OR ");
        groups.push(format!("({members})"));
        binds.extend(filter.sizes.iter().map(|size| size.to_string()));
    }

    if !filter.genders.is_empty() {
        let marks = vec!["?"; filter.genders.len()].join(", ");
        groups.push(format!("gender IN ({marks})"));
        binds.extend(filter.genders.iter().map(|label| Gender::parse(label).as_str().to_string()));
    }

    if !filter.concentrations.is_empty() {
        let marks = vec!["?"; filter.concentrations.len()].join(", ");
        groups.push(format!("concentration IN ({marks})"));
        binds.extend(filter.concentrations.iter().cloned());
    }

    if !filter.accords.is_empty() {
        let members = vec!["main_accords LIKE ?"; filter.accords.len()].join(" OR ");
        groups.push(format!("({members})"));
        binds.extend(filter.accords.iter().map(|accord| format!("%{accord}%")));
    }

    if groups.is_empty() {
        (String::new(), binds)
    } else {
        (format!(" WHERE {}", groups.join(" AND ")), binds)
    }
}

async fn distinct_column(pool: &DbPool, column: &str) -> Result<Vec<String>, RepositoryError> {
    let sql = format!(
        "SELECT DISTINCT {column} AS value FROM perfumes WHERE {column} <> '' ORDER BY {column}",
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(|row| row.try_get::<String, _>("value").map_err(Into::into)).collect()
}

pub(crate) fn map_perfume(row: &SqliteRow) -> Result<Perfume, RepositoryError> {
    let sizes_raw = row.try_get::<String, _>("sizes")?;
    let sizes = serde_json::from_str::<serde_json::Value>(&sizes_raw)
        .ok()
        .and_then(|value| {
            value.as_array().map(|items| items.iter().filter_map(|item| item.as_i64()).collect())
        })
        .unwrap_or_default();

    Ok(Perfume {
        id: PerfumeId(row.try_get::<i64, _>("id")?),
        brand: row.try_get("brand")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        concentration: row.try_get("concentration")?,
        gender: Gender::parse(&row.try_get::<String, _>("gender")?),
        sizes,
        detail_url: row.try_get("detail_url")?,
        main_accords: parse_attribute(row.try_get("main_accords")?),
        top_notes: parse_attribute(row.try_get("top_notes")?),
        middle_notes: parse_attribute(row.try_get("middle_notes")?),
        base_notes: parse_attribute(row.try_get("base_notes")?),
        notes_score: parse_attribute(row.try_get("notes_score")?),
        season_score: parse_attribute(row.try_get("season_score")?),
        day_night_score: parse_attribute(row.try_get("day_night_score")?),
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

/// Attribute columns carry whatever the import wrote: a JSON document or a
/// plain string. Valid JSON is decoded; anything else is kept verbatim as a
/// JSON string so the token and score parsers can take over.
fn parse_attribute(raw: Option<String>) -> serde_json::Value {
    match raw {
        None => serde_json::Value::Null,
        Some(text) => serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::Value::String(text)),
    }
}

fn decode_as_sqlx(err: RepositoryError) -> sqlx::Error {
    match err {
        RepositoryError::Database(inner) => inner,
        RepositoryError::Decode(message) => sqlx::Error::Decode(message.into()),
        RepositoryError::Conflict(message) => sqlx::Error::Protocol(message),
    }
}
