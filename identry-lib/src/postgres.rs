use crate::backend::ProfileBackend;
use crate::error::BackendError;
use crate::models::{
    AccountId, Block, ChildCollections, ChildItems, ChildKind, EducationItem, EmploymentItem,
    PortfolioItem, Profile, ProfileUpsert,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_query::{Alias, Expr, PostgresQueryBuilder, Query, SimpleExpr};
use sea_query_postgres::PostgresBinder;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls, Row};
use tracing::error;
use uuid::Uuid;

/// Statements creating the profile tables
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

const PROFILE_COLUMNS: &str = "id, account_id, name, nickname, bio, location, gender, \
birth_year, birth_month, birth_day, birth_date, skills, photo, provider_avatar_url, avatar_url, \
banner_image, twitter, instagram, linkedin, github, show_education, show_employment, \
show_portfolio, show_skills, show_social, is_public, views_count, custom_id, created_at, updated_at";

const EDUCATION_COLUMNS: &[&str] = &["profile_id", "sort_order", "school", "degree", "year"];
const EMPLOYMENT_COLUMNS: &[&str] = &["profile_id", "sort_order", "company", "position", "period"];
const PORTFOLIO_COLUMNS: &[&str] = &["profile_id", "sort_order", "title", "description", "url", "image"];

/// Profile storage on PostgreSQL
pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    /// Connect to the database and drive the connection in the background
    pub async fn connect(database_url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "database connection error");
            }
        });

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying client for advanced operations
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Create the profile tables if they do not exist yet
    pub async fn apply_schema(&self) -> Result<()> {
        self.client
            .batch_execute(SCHEMA_SQL)
            .await
            .with_context(|| "Failed to apply profile schema")
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<()> {
        self.client
            .execute("SELECT 1", &[])
            .await
            .with_context(|| "Failed to test database connection")?;
        Ok(())
    }

    async fn update_returning(
        &self,
        operation: &str,
        account: &AccountId,
        values: Vec<(&'static str, SimpleExpr)>,
    ) -> Result<Profile, BackendError> {
        let (sql, values) = {
            let mut update = Query::update();
            update.table(Alias::new("profiles"));
            for (column, value) in values {
                update.value(Alias::new(column), value);
            }
            update
                .value(Alias::new("updated_at"), Expr::current_timestamp())
                .and_where(Expr::col(Alias::new("account_id")).eq(account.as_str()))
                .returning_all();
            update.build_postgres(PostgresQueryBuilder)
        };
        let row = self
            .client
            .query_opt(sql.as_str(), &values.as_params())
            .await
            .map_err(|e| map_pg_error(operation, e))?
            .ok_or_else(|| BackendError::NotFound(format!("profile for account {}", account)))?;
        profile_from_row(&row).map_err(|e| map_pg_error(operation, e))
    }
}

#[async_trait]
impl ProfileBackend for PostgresBackend {
    async fn find_profile_by_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<Profile>, BackendError> {
        let sql = format!("SELECT {} FROM profiles WHERE account_id = $1", PROFILE_COLUMNS);
        let row = self
            .client
            .query_opt(sql.as_str(), &[&account.as_str()])
            .await
            .map_err(|e| map_pg_error("select profile", e))?;
        row.as_ref()
            .map(profile_from_row)
            .transpose()
            .map_err(|e| map_pg_error("select profile", e))
    }

    async fn upsert_profile(&self, row: &ProfileUpsert) -> Result<Profile, BackendError> {
        let sql = format!(
            "INSERT INTO profiles (account_id, name, nickname, bio, location, gender, \
birth_year, birth_month, birth_day, birth_date, skills, photo, provider_avatar_url, avatar_url, \
banner_image, twitter, instagram, linkedin, github, show_education, show_employment, \
show_portfolio, show_skills, show_social, is_public, custom_id)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
ON CONFLICT (account_id) DO UPDATE SET
    name = EXCLUDED.name, nickname = EXCLUDED.nickname, bio = EXCLUDED.bio,
    location = EXCLUDED.location, gender = EXCLUDED.gender,
    birth_year = EXCLUDED.birth_year, birth_month = EXCLUDED.birth_month,
    birth_day = EXCLUDED.birth_day, birth_date = EXCLUDED.birth_date,
    skills = EXCLUDED.skills, photo = EXCLUDED.photo,
    provider_avatar_url = COALESCE(EXCLUDED.provider_avatar_url, profiles.provider_avatar_url),
    avatar_url = COALESCE(EXCLUDED.avatar_url, profiles.provider_avatar_url),
    banner_image = EXCLUDED.banner_image, twitter = EXCLUDED.twitter,
    instagram = EXCLUDED.instagram, linkedin = EXCLUDED.linkedin, github = EXCLUDED.github,
    show_education = EXCLUDED.show_education, show_employment = EXCLUDED.show_employment,
    show_portfolio = EXCLUDED.show_portfolio, show_skills = EXCLUDED.show_skills,
    show_social = EXCLUDED.show_social, is_public = EXCLUDED.is_public,
    custom_id = EXCLUDED.custom_id, updated_at = NOW()
RETURNING {}",
            PROFILE_COLUMNS
        );

        let f = &row.fields;
        let stmt = self
            .client
            .prepare(&sql)
            .await
            .map_err(|e| map_pg_error("upsert profile", e))?;
        let returned = self
            .client
            .query_one(
                &stmt,
                &[
                    &row.account_id.as_str(),
                    &f.name,
                    &f.nickname,
                    &f.bio,
                    &f.location,
                    &f.gender,
                    &f.birth_year,
                    &f.birth_month,
                    &f.birth_day,
                    &f.birth_date,
                    &f.skills,
                    &f.photo,
                    &row.provider_avatar_url,
                    &row.avatar_url,
                    &f.banner_image,
                    &f.twitter,
                    &f.instagram,
                    &f.linkedin,
                    &f.github,
                    &f.show_education,
                    &f.show_employment,
                    &f.show_portfolio,
                    &f.show_skills,
                    &f.show_social,
                    &f.is_public,
                    &f.custom_id,
                ],
            )
            .await
            .map_err(|e| map_pg_error("upsert profile", e))?;
        profile_from_row(&returned).map_err(|e| map_pg_error("upsert profile", e))
    }

    async fn find_public_profile(&self, custom_id: &str) -> Result<Option<Profile>, BackendError> {
        let sql = format!(
            "SELECT {} FROM profiles WHERE custom_id = $1 AND is_public",
            PROFILE_COLUMNS
        );
        let row = self
            .client
            .query_opt(sql.as_str(), &[&custom_id])
            .await
            .map_err(|e| map_pg_error("select public profile", e))?;
        row.as_ref()
            .map(profile_from_row)
            .transpose()
            .map_err(|e| map_pg_error("select public profile", e))
    }

    async fn load_children(&self, profile_id: Uuid) -> Result<ChildCollections, BackendError> {
        let education = self
            .client
            .query(
                "SELECT school, degree, year FROM education WHERE profile_id = $1 ORDER BY sort_order",
                &[&profile_id],
            )
            .await
            .map_err(|e| map_pg_error("select education", e))?
            .iter()
            .map(|row| -> Result<EducationItem, tokio_postgres::Error> {
                Ok(EducationItem {
                    school: row.try_get("school")?,
                    degree: row.try_get("degree")?,
                    year: row.try_get("year")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| map_pg_error("select education", e))?;

        let employment = self
            .client
            .query(
                "SELECT company, position, period FROM employment WHERE profile_id = $1 ORDER BY sort_order",
                &[&profile_id],
            )
            .await
            .map_err(|e| map_pg_error("select employment", e))?
            .iter()
            .map(|row| -> Result<EmploymentItem, tokio_postgres::Error> {
                Ok(EmploymentItem {
                    company: row.try_get("company")?,
                    position: row.try_get("position")?,
                    period: row.try_get("period")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| map_pg_error("select employment", e))?;

        let portfolio = self
            .client
            .query(
                "SELECT title, description, url, image FROM portfolio WHERE profile_id = $1 ORDER BY sort_order",
                &[&profile_id],
            )
            .await
            .map_err(|e| map_pg_error("select portfolio", e))?
            .iter()
            .map(|row| -> Result<PortfolioItem, tokio_postgres::Error> {
                Ok(PortfolioItem {
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    url: row.try_get("url")?,
                    image: row.try_get("image")?,
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| map_pg_error("select portfolio", e))?;

        Ok(ChildCollections {
            education,
            employment,
            portfolio,
        })
    }

    async fn delete_children(&self, profile_id: Uuid, kind: ChildKind) -> Result<(), BackendError> {
        let (sql, values) = Query::delete()
            .from_table(Alias::new(kind.table_name()))
            .and_where(Expr::col(Alias::new("profile_id")).eq(profile_id))
            .build_postgres(PostgresQueryBuilder);
        self.client
            .execute(sql.as_str(), &values.as_params())
            .await
            .map_err(|e| map_pg_error(&format!("delete {}", kind), e))?;
        Ok(())
    }

    async fn insert_children(&self, profile_id: Uuid, items: &ChildItems) -> Result<(), BackendError> {
        if items.is_empty() {
            return Ok(());
        }

        let kind = items.kind();
        let operation = format!("insert {}", kind);

        // The statement must not live across the await below
        let (sql, values) = {
            let (columns, rows) = child_rows(profile_id, items);
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(kind.table_name()))
                .columns(columns.iter().map(|c| Alias::new(*c)));
            for row in rows {
                insert
                    .values(row)
                    .map_err(|e| BackendError::query(operation.as_str(), e.to_string()))?;
            }
            insert.build_postgres(PostgresQueryBuilder)
        };
        self.client
            .execute(sql.as_str(), &values.as_params())
            .await
            .map_err(|e| map_pg_error(&operation, e))?;
        Ok(())
    }

    async fn set_public(&self, account: &AccountId, is_public: bool) -> Result<Profile, BackendError> {
        self.update_returning("update public flag", account, vec![("is_public", is_public.into())])
            .await
    }

    async fn set_block_visibility(
        &self,
        account: &AccountId,
        block: Block,
        visible: bool,
    ) -> Result<Profile, BackendError> {
        self.update_returning(
            "update block visibility",
            account,
            vec![(block.column_name(), visible.into())],
        )
        .await
    }

    async fn set_custom_id(
        &self,
        account: &AccountId,
        custom_id: Option<&str>,
    ) -> Result<Profile, BackendError> {
        self.update_returning(
            "update custom id",
            account,
            vec![("custom_id", custom_id.map(str::to_string).into())],
        )
        .await
    }

    async fn set_photo(
        &self,
        account: &AccountId,
        photo: &str,
        avatar_url: Option<&str>,
    ) -> Result<Profile, BackendError> {
        self.update_returning(
            "update photo",
            account,
            vec![
                ("photo", photo.into()),
                ("avatar_url", avatar_url.map(str::to_string).into()),
            ],
        )
        .await
    }

    async fn increment_views(&self, profile_id: Uuid) -> Result<(), BackendError> {
        self.client
            .execute("SELECT increment_profile_views($1)", &[&profile_id])
            .await
            .map_err(|e| map_pg_error("increment views", e))?;
        Ok(())
    }
}

/// Column list and value rows for a multi-row child insert
fn child_rows(profile_id: Uuid, items: &ChildItems) -> (&'static [&'static str], Vec<Vec<SimpleExpr>>) {
    fn row(profile_id: Uuid, index: usize, values: &[&str]) -> Vec<SimpleExpr> {
        let mut row: Vec<SimpleExpr> = vec![profile_id.into(), (index as i32).into()];
        row.extend(values.iter().map(|v| SimpleExpr::from(v.to_string())));
        row
    }

    match items {
        ChildItems::Education(items) => (
            EDUCATION_COLUMNS,
            items
                .iter()
                .enumerate()
                .map(|(i, e)| row(profile_id, i, &[e.school.as_str(), e.degree.as_str(), e.year.as_str()]))
                .collect(),
        ),
        ChildItems::Employment(items) => (
            EMPLOYMENT_COLUMNS,
            items
                .iter()
                .enumerate()
                .map(|(i, e)| row(profile_id, i, &[e.company.as_str(), e.position.as_str(), e.period.as_str()]))
                .collect(),
        ),
        ChildItems::Portfolio(items) => (
            PORTFOLIO_COLUMNS,
            items
                .iter()
                .enumerate()
                .map(|(i, p)| row(profile_id, i, &[p.title.as_str(), p.description.as_str(), p.url.as_str(), p.image.as_str()]))
                .collect(),
        ),
    }
}

fn profile_from_row(row: &Row) -> Result<Profile, tokio_postgres::Error> {
    Ok(Profile {
        id: row.try_get("id")?,
        account_id: AccountId::new(row.try_get::<_, String>("account_id")?),
        name: row.try_get("name")?,
        nickname: row.try_get("nickname")?,
        bio: row.try_get("bio")?,
        location: row.try_get("location")?,
        gender: row.try_get("gender")?,
        birth_year: row.try_get("birth_year")?,
        birth_month: row.try_get("birth_month")?,
        birth_day: row.try_get("birth_day")?,
        birth_date: row.try_get("birth_date")?,
        skills: row.try_get("skills")?,
        photo: row.try_get("photo")?,
        provider_avatar_url: row.try_get("provider_avatar_url")?,
        avatar_url: row.try_get("avatar_url")?,
        banner_image: row.try_get("banner_image")?,
        twitter: row.try_get("twitter")?,
        instagram: row.try_get("instagram")?,
        linkedin: row.try_get("linkedin")?,
        github: row.try_get("github")?,
        show_education: row.try_get("show_education")?,
        show_employment: row.try_get("show_employment")?,
        show_portfolio: row.try_get("show_portfolio")?,
        show_skills: row.try_get("show_skills")?,
        show_social: row.try_get("show_social")?,
        is_public: row.try_get("is_public")?,
        views_count: row.try_get("views_count")?,
        custom_id: row.try_get("custom_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_pg_error(operation: &str, e: tokio_postgres::Error) -> BackendError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let constraint = e
            .as_db_error()
            .and_then(|db| db.constraint())
            .unwrap_or("unknown constraint")
            .to_string();
        return BackendError::UniqueViolation(constraint);
    }

    let message = e
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| e.to_string());
    BackendError::query(operation, message)
}
