//! SQLite-backed [`ReleaseRepository`].
//!
//! Every mutation is a single statement, so an interrupted run leaves at most the
//! current item unwritten. Timestamps are stored as fixed-width RFC 3339 UTC strings
//! (microsecond precision, `Z` suffix) so that SQL string comparison orders them
//! chronologically.
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use herald_common::{
    CodeHostingKind, Language, PackageStatus, ReleaseCandidate, ReleaseStatus,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::repository::ReleaseRepository;
use crate::{
    NewPackage, Package, PackageMetadata, PendingRelease, Release, RepositoryRef, TrackPackage,
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const PACKAGE_COLUMNS: &str = r#"
    p.id, p.name, p.programming_language, p.description, p.keywords, p.homepage,
    p.site_url, p.hashtags, p.rank, p.status, p.code_hosting, p.repository_owner,
    p.repository_name, p.release_regex"#;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply pending migrations.
    ///
    /// In-memory URLs get a single long-lived connection, since every SQLite memory
    /// connection is its own database.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Connection(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = pool_opts
            .connect_with(opts)
            .await
            .map_err(|e| StoreError::Connection(format!("failed to open database: {e}")))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(in_memory, "store.connected");
        Ok(store)
    }

    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR.run(&self.pool).await?;
        debug!("store.migrations_applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn package_by_key(&self, name: &str, language: Language) -> StoreResult<Package> {
        let sql = format!(
            "SELECT {PACKAGE_COLUMNS} FROM packages p WHERE p.name = ?1 AND p.programming_language = ?2"
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(language.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("package {language}/{name}")))?;
        package_from_row(&row)
    }
}

pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {raw:?}: {e}")))
}

fn package_from_row(r: &SqliteRow) -> StoreResult<Package> {
    let rank: i64 = r.try_get("rank")?;
    let hosting: Option<String> = r.try_get("code_hosting")?;
    let owner: Option<String> = r.try_get("repository_owner")?;
    let repo: Option<String> = r.try_get("repository_name")?;

    let repository = match (hosting, owner, repo) {
        (Some(hosting), Some(owner), Some(name)) => Some(RepositoryRef {
            hosting: CodeHostingKind::from_str(&hosting)?,
            owner,
            name,
        }),
        _ => None,
    };

    Ok(Package {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        language: Language::from_str(&r.try_get::<String, _>("programming_language")?)?,
        description: r.try_get("description")?,
        keywords: r.try_get("keywords")?,
        homepage: r.try_get("homepage")?,
        site_url: r.try_get("site_url")?,
        hashtags: r.try_get("hashtags")?,
        rank: u32::try_from(rank)
            .map_err(|_| StoreError::InvalidData(format!("negative rank {rank}")))?,
        status: PackageStatus::from_str(&r.try_get::<String, _>("status")?)?,
        repository,
        release_regex: r.try_get("release_regex")?,
    })
}

fn release_from_row(r: &SqliteRow, prefix: &str) -> StoreResult<Release> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(Release {
        id: r.try_get(col("id").as_str())?,
        package_id: r.try_get("package_id")?,
        name: r.try_get(col("name").as_str())?,
        created: parse_ts(&r.try_get::<String, _>(col("created").as_str())?)?,
        status: ReleaseStatus::from_str(&r.try_get::<String, _>(col("status").as_str())?)?,
    })
}

#[async_trait]
impl ReleaseRepository for SqliteStore {
    async fn get_or_create_package(&self, new: &NewPackage) -> StoreResult<Package> {
        let now = fmt_ts(Utc::now());
        let res = sqlx::query(
            r#"INSERT INTO packages
               (name, programming_language, description, keywords, homepage, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
               ON CONFLICT (name, programming_language) DO NOTHING"#,
        )
        .bind(new.name.as_str())
        .bind(new.language.as_str())
        .bind(new.description.as_str())
        .bind(new.keywords.as_str())
        .bind(new.homepage.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 1 {
            info!(
                package = %new.name,
                language = %new.language,
                "store.package.created"
            );
        }
        self.package_by_key(&new.name, new.language).await
    }

    async fn track_package(&self, track: &TrackPackage) -> StoreResult<Package> {
        let now = fmt_ts(Utc::now());
        sqlx::query(
            r#"INSERT INTO packages
               (name, programming_language, rank, code_hosting, repository_owner,
                repository_name, release_regex, created_at, updated_at)
               VALUES (?1, ?2, COALESCE(?3, 0), ?4, ?5, ?6, ?7, ?8, ?8)
               ON CONFLICT (name, programming_language) DO UPDATE SET
                 rank = COALESCE(?3, packages.rank),
                 code_hosting = excluded.code_hosting,
                 repository_owner = excluded.repository_owner,
                 repository_name = excluded.repository_name,
                 release_regex = excluded.release_regex,
                 updated_at = excluded.updated_at"#,
        )
        .bind(track.name.as_str())
        .bind(track.language.as_str())
        .bind(track.rank.map(i64::from))
        .bind(track.repository.hosting.as_str())
        .bind(track.repository.owner.trim())
        .bind(track.repository.name.trim())
        .bind(track.release_regex.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(
            package = %track.name,
            language = %track.language,
            owner = %track.repository.owner,
            repo = %track.repository.name,
            rank = ?track.rank,
            "store.package.tracked"
        );
        self.package_by_key(&track.name, track.language).await
    }

    async fn tracked_packages(&self) -> StoreResult<Vec<Package>> {
        let sql = format!(
            r#"SELECT {PACKAGE_COLUMNS} FROM packages p
               WHERE p.code_hosting IS NOT NULL
                 AND p.repository_owner IS NOT NULL
                 AND p.repository_name IS NOT NULL
               ORDER BY p.id"#
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(package_from_row).collect()
    }

    async fn update_package_metadata(
        &self,
        package_id: i64,
        meta: &PackageMetadata,
    ) -> StoreResult<()> {
        let res = sqlx::query(
            r#"UPDATE packages
               SET description = ?1, hashtags = ?2, site_url = ?3, status = ?4, updated_at = ?5
               WHERE id = ?6"#,
        )
        .bind(meta.description.as_str())
        .bind(meta.hashtags.as_str())
        .bind(meta.site_url.as_str())
        .bind(meta.status.as_str())
        .bind(fmt_ts(Utc::now()))
        .bind(package_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("package id {package_id}")));
        }
        debug!(package_id, status = %meta.status, "store.package.metadata_updated");
        Ok(())
    }

    async fn set_package_status(&self, package_id: i64, status: PackageStatus) -> StoreResult<()> {
        let res = sqlx::query("UPDATE packages SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(fmt_ts(Utc::now()))
            .bind(package_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("package id {package_id}")));
        }
        Ok(())
    }

    async fn release_exists(&self, package_id: i64, name: &str) -> StoreResult<bool> {
        let found = sqlx::query("SELECT 1 FROM releases WHERE package_id = ?1 AND name = ?2")
            .bind(package_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert_release(
        &self,
        package_id: i64,
        candidate: &ReleaseCandidate,
    ) -> StoreResult<Release> {
        let res = sqlx::query(
            r#"INSERT INTO releases (package_id, name, created, status)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(package_id)
        .bind(candidate.name.as_str())
        .bind(fmt_ts(candidate.created))
        .bind(ReleaseStatus::New.as_str())
        .execute(&self.pool)
        .await?;

        let release = Release {
            id: res.last_insert_rowid(),
            package_id,
            name: candidate.name.clone(),
            created: candidate.created,
            status: ReleaseStatus::New,
        };
        info!(
            release_id = release.id,
            package_id,
            release = %release.name,
            "store.release.inserted"
        );
        Ok(release)
    }

    async fn get_release(&self, release_id: i64) -> StoreResult<Release> {
        let row = sqlx::query(
            "SELECT id, package_id, name, created, status FROM releases WHERE id = ?1",
        )
        .bind(release_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("release id {release_id}")))?;
        release_from_row(&row, "")
    }

    async fn oldest_new_releases(
        &self,
        language: Language,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<PendingRelease>> {
        let sql = format!(
            r#"SELECT r.id AS release_id, r.package_id, r.name AS release_name,
                      r.created AS release_created, r.status AS release_status, {PACKAGE_COLUMNS}
               FROM releases r
               JOIN packages p ON p.id = r.package_id
               WHERE r.status = ?1
                 AND p.programming_language = ?2
                 AND r.created <= ?3
               ORDER BY r.created ASC, r.id ASC
               LIMIT ?4"#
        );
        let rows = sqlx::query(&sql)
            .bind(ReleaseStatus::New.as_str())
            .bind(language.as_str())
            .bind(fmt_ts(created_before))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(PendingRelease {
                    release: release_from_row(row, "release_")?,
                    package: package_from_row(row)?,
                })
            })
            .collect()
    }

    async fn save_release_status(
        &self,
        release_id: i64,
        status: ReleaseStatus,
    ) -> StoreResult<()> {
        if status == ReleaseStatus::New {
            return Err(StoreError::InvalidData(format!(
                "release id {release_id} cannot go back to new"
            )));
        }
        let res = sqlx::query("UPDATE releases SET status = ?1 WHERE id = ?2 AND status = ?3")
            .bind(status.as_str())
            .bind(release_id)
            .bind(ReleaseStatus::New.as_str())
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM releases WHERE id = ?1")
                    .bind(release_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return Err(match current {
                Some(current) => StoreError::AlreadySettled(format!(
                    "release id {release_id} is {current}"
                )),
                None => StoreError::NotFound(format!("release id {release_id}")),
            });
        }
        info!(release_id, status = %status, "store.release.status_saved");
        Ok(())
    }

    async fn delete_releases_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM releases WHERE created <= ?1")
            .bind(fmt_ts(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn delete_releases_of_failed_packages(&self) -> StoreResult<u64> {
        let res = sqlx::query(
            "DELETE FROM releases WHERE package_id IN (SELECT id FROM packages WHERE status = ?1)",
        )
        .bind(PackageStatus::Fail.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn delete_releases_of_low_rank_packages(&self, min_rank: u32) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"DELETE FROM releases WHERE package_id IN
               (SELECT id FROM packages WHERE status = ?1 AND rank < ?2)"#,
        )
        .bind(PackageStatus::Done.as_str())
        .bind(i64::from(min_rank))
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn count_releases(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM releases")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        let c = a + chrono::Duration::days(400);
        let (fa, fb, fc) = (fmt_ts(a), fmt_ts(b), fmt_ts(c));
        assert_eq!(fa, "2024-01-01T00:00:00.000000Z");
        assert!(fa < fb && fb < fc);
        assert_eq!(parse_ts(&fb).unwrap(), b);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(matches!(parse_ts("yesterday"), Err(StoreError::InvalidData(_))));
    }
}
