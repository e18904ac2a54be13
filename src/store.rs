use chrono::NaiveDate;
use serenity::async_trait;

use crate::error::StoreError;
use crate::models::{CaptchaChallenge, LobbyRoleGrant, NewRegistration, Registration, Scrim, Team};

pub mod postgres;

pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable records behind the engine.
///
/// `append_registration` is the only write with an ordering contract: the
/// count of existing rows for the (scrim, date) scope and the insert of the
/// new row must happen as one step, so concurrent arrivals never share a
/// check-in order.
#[async_trait]
pub trait Store: Send + Sync {
    async fn team(&self, name: &str) -> StoreResult<Option<Team>>;
    /// The team that has `member` in any of its three slots.
    async fn team_by_member(&self, member: i64) -> StoreResult<Option<Team>>;
    /// Fails with [`StoreError::Duplicate`] if the name is taken.
    async fn insert_team(&self, team: &Team) -> StoreResult<()>;
    /// Replaces the team stored under `original_name`, possibly re-keying it.
    async fn update_team(&self, original_name: &str, team: &Team) -> StoreResult<bool>;
    async fn delete_team(&self, name: &str) -> StoreResult<bool>;
    /// Newest first.
    async fn teams(&self) -> StoreResult<Vec<Team>>;

    async fn upsert_scrim(&self, scrim: &Scrim) -> StoreResult<()>;
    async fn delete_scrim(&self, name: &str) -> StoreResult<bool>;
    async fn scrim(&self, name: &str) -> StoreResult<Option<Scrim>>;
    async fn scrims(&self) -> StoreResult<Vec<Scrim>>;

    async fn count_registrations(&self, scrim: &str, date: NaiveDate) -> StoreResult<i64>;
    async fn registration(
        &self,
        scrim: &str,
        date: NaiveDate,
        team: &str,
    ) -> StoreResult<Option<Registration>>;
    /// Atomically assigns the next check-in order and lobby for the scope and
    /// inserts the row. Fails with [`StoreError::Duplicate`] if the team
    /// already has a row for this scrim and date.
    async fn append_registration(&self, new: NewRegistration) -> StoreResult<Registration>;
    /// Ordered by check-in order.
    async fn registrations(&self, scrim: &str, date: NaiveDate) -> StoreResult<Vec<Registration>>;
    /// Distinct scrim names with at least one registration on `date`.
    async fn registered_scrims(&self, date: NaiveDate) -> StoreResult<Vec<String>>;

    async fn upsert_captcha(&self, challenge: &CaptchaChallenge) -> StoreResult<()>;
    async fn mark_captcha_verified(
        &self,
        user: i64,
        scrim: &str,
        date: NaiveDate,
    ) -> StoreResult<bool>;

    async fn record_lobby_role_grant(&self, grant: &LobbyRoleGrant) -> StoreResult<()>;
    /// Re-points every grant `from` holds for `lobby` on `date` to `to`.
    async fn move_lobby_role_grants(
        &self,
        date: NaiveDate,
        lobby: i32,
        from: i64,
        to: i64,
    ) -> StoreResult<u64>;
    async fn lobby_role_grants(&self, date: NaiveDate, user: i64) -> StoreResult<Vec<LobbyRoleGrant>>;
}
