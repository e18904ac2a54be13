use chrono::NaiveDate;
use serenity::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use super::{Store, StoreResult};
use crate::clock::parse_days;
use crate::error::StoreError;
use crate::lobby::slot_for;
use crate::models::{CaptchaChallenge, LobbyRoleGrant, NewRegistration, Registration, Scrim, Team};

#[derive(Debug, FromRow)]
struct ScrimRow {
    name: String,
    days: String,
    start_minute: i32,
    end_minute: i32,
    mention_role: Option<i64>,
}

impl TryFrom<ScrimRow> for Scrim {
    type Error = StoreError;

    fn try_from(row: ScrimRow) -> Result<Self, Self::Error> {
        let days = parse_days(&row.days)
            .map_err(|_| StoreError::Corrupt(format!("scrim {} days '{}'", row.name, row.days)))?;
        Ok(Scrim {
            name: row.name,
            days,
            start_minute: row.start_minute as u32,
            end_minute: row.end_minute as u32,
            mention_role: row.mention_role,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn map_insert_err(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Duplicate
    } else {
        StoreError::Database(err)
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(15)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }
}

const TEAM_COLUMNS: &str = "name, tag, captain_id, captain_name, player2_id, player2_name, \
                            player3_id, player3_name, created_at";

#[async_trait]
impl Store for PgStore {
    async fn team(&self, name: &str) -> StoreResult<Option<Team>> {
        Ok(
            sqlx::query_as::<_, Team>(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE name = $1"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn team_by_member(&self, member: i64) -> StoreResult<Option<Team>> {
        Ok(sqlx::query_as::<_, Team>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams
                WHERE captain_id = $1 OR player2_id = $1 OR player3_id = $1
                LIMIT 1"
        ))
        .bind(member)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_team(&self, team: &Team) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO teams
                    (name, tag, captain_id, captain_name, player2_id, player2_name,
                     player3_id, player3_name, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&team.name)
        .bind(&team.tag)
        .bind(team.captain_id)
        .bind(&team.captain_name)
        .bind(team.player2_id)
        .bind(&team.player2_name)
        .bind(team.player3_id)
        .bind(&team.player3_name)
        .bind(team.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;
        Ok(())
    }

    async fn update_team(&self, original_name: &str, team: &Team) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE teams
                SET name = $1, tag = $2, captain_id = $3, captain_name = $4,
                    player2_id = $5, player2_name = $6, player3_id = $7, player3_name = $8
                WHERE name = $9",
        )
        .bind(&team.name)
        .bind(&team.tag)
        .bind(team.captain_id)
        .bind(&team.captain_name)
        .bind(team.player2_id)
        .bind(&team.player2_name)
        .bind(team.player3_id)
        .bind(&team.player3_name)
        .bind(original_name)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_team(&self, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn teams(&self) -> StoreResult<Vec<Team>> {
        Ok(sqlx::query_as::<_, Team>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams ORDER BY created_at DESC, name"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_scrim(&self, scrim: &Scrim) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scrims (name, days, start_minute, end_minute, mention_role)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (name) DO UPDATE
                SET days = $2, start_minute = $3, end_minute = $4, mention_role = $5",
        )
        .bind(&scrim.name)
        .bind(scrim.days_label())
        .bind(scrim.start_minute as i32)
        .bind(scrim.end_minute as i32)
        .bind(scrim.mention_role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_scrim(&self, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM scrims WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn scrim(&self, name: &str) -> StoreResult<Option<Scrim>> {
        sqlx::query_as::<_, ScrimRow>(
            "SELECT name, days, start_minute, end_minute, mention_role FROM scrims WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .map(Scrim::try_from)
        .transpose()
    }

    async fn scrims(&self) -> StoreResult<Vec<Scrim>> {
        sqlx::query_as::<_, ScrimRow>(
            "SELECT name, days, start_minute, end_minute, mention_role FROM scrims ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Scrim::try_from)
        .collect()
    }

    async fn count_registrations(&self, scrim: &str, date: NaiveDate) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM daily_registration WHERE scrim_name = $1 AND scrim_date = $2",
        )
        .bind(scrim)
        .bind(date)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn registration(
        &self,
        scrim: &str,
        date: NaiveDate,
        team: &str,
    ) -> StoreResult<Option<Registration>> {
        Ok(sqlx::query_as::<_, Registration>(
            "SELECT scrim_name, scrim_date, team_name, checked_in_by, checked_in_at,
                    lobby_number, check_in_order
                FROM daily_registration
                WHERE scrim_name = $1 AND scrim_date = $2 AND team_name = $3",
        )
        .bind(scrim)
        .bind(date)
        .bind(team)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn append_registration(&self, new: NewRegistration) -> StoreResult<Registration> {
        let mut transaction = self.pool.begin().await?;
        // Serializes appends per (scrim, date) until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", new.scrim_name, new.scrim_date))
            .execute(&mut transaction)
            .await?;
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM daily_registration WHERE scrim_name = $1 AND scrim_date = $2",
        )
        .bind(&new.scrim_name)
        .bind(new.scrim_date)
        .fetch_one(&mut transaction)
        .await?;
        let slot = slot_for(existing);
        let registration = sqlx::query_as::<_, Registration>(
            "INSERT INTO daily_registration
                    (scrim_name, scrim_date, team_name, checked_in_by, checked_in_at,
                     lobby_number, check_in_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING scrim_name, scrim_date, team_name, checked_in_by, checked_in_at,
                          lobby_number, check_in_order",
        )
        .bind(&new.scrim_name)
        .bind(new.scrim_date)
        .bind(&new.team_name)
        .bind(new.checked_in_by)
        .bind(new.checked_in_at)
        .bind(slot.lobby)
        .bind(slot.order)
        .fetch_one(&mut transaction)
        .await
        .map_err(map_insert_err)?;
        transaction.commit().await?;
        Ok(registration)
    }

    async fn registrations(&self, scrim: &str, date: NaiveDate) -> StoreResult<Vec<Registration>> {
        Ok(sqlx::query_as::<_, Registration>(
            "SELECT scrim_name, scrim_date, team_name, checked_in_by, checked_in_at,
                    lobby_number, check_in_order
                FROM daily_registration
                WHERE scrim_name = $1 AND scrim_date = $2
                ORDER BY check_in_order",
        )
        .bind(scrim)
        .bind(date)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn registered_scrims(&self, date: NaiveDate) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT scrim_name FROM daily_registration
                WHERE scrim_date = $1 ORDER BY scrim_name",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_captcha(&self, challenge: &CaptchaChallenge) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO captcha_tracking (user_id, scrim_name, scrim_date, captcha_word, verified)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, scrim_name, scrim_date) DO UPDATE
                SET captcha_word = $4, verified = $5, created_at = now()",
        )
        .bind(challenge.user_id)
        .bind(&challenge.scrim_name)
        .bind(challenge.scrim_date)
        .bind(&challenge.captcha_word)
        .bind(challenge.verified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_captcha_verified(
        &self,
        user: i64,
        scrim: &str,
        date: NaiveDate,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE captcha_tracking SET verified = TRUE
                WHERE user_id = $1 AND scrim_name = $2 AND scrim_date = $3",
        )
        .bind(user)
        .bind(scrim)
        .bind(date)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_lobby_role_grant(&self, grant: &LobbyRoleGrant) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO lobby_roles (scrim_name, scrim_date, user_id, lobby_number)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (scrim_name, scrim_date, user_id) DO UPDATE
                SET lobby_number = $4, assigned_at = now()",
        )
        .bind(&grant.scrim_name)
        .bind(grant.scrim_date)
        .bind(grant.user_id)
        .bind(grant.lobby_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn move_lobby_role_grants(
        &self,
        date: NaiveDate,
        lobby: i32,
        from: i64,
        to: i64,
    ) -> StoreResult<u64> {
        let mut transaction = self.pool.begin().await?;
        // The recipient already holds a grant for that scrim; drop the duplicate
        sqlx::query(
            "DELETE FROM lobby_roles r
                WHERE r.scrim_date = $1 AND r.lobby_number = $2 AND r.user_id = $3
                  AND EXISTS (SELECT 1 FROM lobby_roles o
                              WHERE o.scrim_name = r.scrim_name
                                AND o.scrim_date = r.scrim_date
                                AND o.user_id = $4)",
        )
        .bind(date)
        .bind(lobby)
        .bind(from)
        .bind(to)
        .execute(&mut transaction)
        .await?;
        let moved = sqlx::query(
            "UPDATE lobby_roles SET user_id = $4, assigned_at = now()
                WHERE scrim_date = $1 AND lobby_number = $2 AND user_id = $3",
        )
        .bind(date)
        .bind(lobby)
        .bind(from)
        .bind(to)
        .execute(&mut transaction)
        .await?
        .rows_affected();
        transaction.commit().await?;
        Ok(moved)
    }

    async fn lobby_role_grants(&self, date: NaiveDate, user: i64) -> StoreResult<Vec<LobbyRoleGrant>> {
        Ok(sqlx::query_as::<_, LobbyRoleGrant>(
            "SELECT scrim_name, scrim_date, user_id, lobby_number FROM lobby_roles
                WHERE scrim_date = $1 AND user_id = $2
                ORDER BY scrim_name",
        )
        .bind(date)
        .bind(user)
        .fetch_all(&self.pool)
        .await?)
    }
}
