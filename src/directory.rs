//! Query contracts over the care directory: elders, user accounts, staff
//! assignments and the subscription link. The engine only reads these
//! entities; profile CRUD lives elsewhere in the platform.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::{EngineError, Result};
use crate::model::{Assignment, Elder, User, UserRole};

#[async_trait]
pub trait CareDirectory: Send + Sync {
    async fn find_elder_by_id(&self, id: Uuid) -> Result<Option<Elder>>;

    /// Second leg of the dual-identity lookup: an elder found through its
    /// linked user account.
    async fn find_elder_by_user_id(&self, user_id: Uuid) -> Result<Option<Elder>>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Active assignment rows only; joining to the account happens in the
    /// recipient resolver so the active-account filter stays visible there.
    async fn find_active_assignments(&self, elder_id: Uuid) -> Result<Vec<Assignment>>;

    /// The user paying for the elder's current subscription, if any.
    async fn find_subscription_user(&self, elder_id: Uuid) -> Result<Option<User>>;
}

pub struct PgCareDirectory {
    pool: PgPool,
}

impl PgCareDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ElderRow {
    id: Uuid,
    user_id: Option<Uuid>,
    full_name: String,
    phone: Option<String>,
    conditions: Vec<String>,
    allergies: Vec<String>,
    medications: Vec<String>,
    blood_type: Option<String>,
}

impl From<ElderRow> for Elder {
    fn from(row: ElderRow) -> Self {
        Elder {
            id: row.id,
            user_id: row.user_id,
            full_name: row.full_name,
            phone: row.phone,
            conditions: row.conditions,
            allergies: row.allergies,
            medications: row.medications,
            blood_type: row.blood_type,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    email: String,
    role: String,
    active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = EngineError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = UserRole::from_str(&row.role)
            .ok_or_else(|| EngineError::Integrity(format!("unknown user role '{}'", row.role)))?;
        Ok(User {
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            role,
            active: row.active,
        })
    }
}

#[derive(FromRow)]
struct AssignmentRow {
    id: Uuid,
    elder_id: Uuid,
    caregiver_id: Uuid,
    active: bool,
}

const ELDER_COLUMNS: &str =
    "id, user_id, full_name, phone, conditions, allergies, medications, blood_type";

#[async_trait]
impl CareDirectory for PgCareDirectory {
    async fn find_elder_by_id(&self, id: Uuid) -> Result<Option<Elder>> {
        let row = sqlx::query_as::<_, ElderRow>(&format!(
            "SELECT {ELDER_COLUMNS} FROM elders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Elder::from))
    }

    async fn find_elder_by_user_id(&self, user_id: Uuid) -> Result<Option<Elder>> {
        let row = sqlx::query_as::<_, ElderRow>(&format!(
            "SELECT {ELDER_COLUMNS} FROM elders WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Elder::from))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, full_name, email, role, active FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_active_assignments(&self, elder_id: Uuid) -> Result<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT id, elder_id, caregiver_id, active FROM assignments \
             WHERE elder_id = $1 AND active = TRUE",
        )
        .bind(elder_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| Assignment {
                id: row.id,
                elder_id: row.elder_id,
                caregiver_id: row.caregiver_id,
                active: row.active,
            })
            .collect())
    }

    async fn find_subscription_user(&self, elder_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.full_name, u.email, u.role, u.active \
             FROM subscriptions s JOIN users u ON u.id = s.user_id \
             WHERE s.elder_id = $1 AND s.active = TRUE \
             ORDER BY s.created_at DESC LIMIT 1",
        )
        .bind(elder_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }
}
