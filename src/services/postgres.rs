use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, PgPool, Postgres, Row};
use std::time::Duration;
use thiserror::Error;

use crate::core::checkin::{checkin_title, CheckInTarget, NewLocation};
use crate::models::{ApiKey, BoundingBox, Event, EventType, GpsPosition, Point, SavedLocation};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("In use: {0}")]
    InUse(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// Persistence boundary the nearby and check-in flows depend on
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// All saved locations of a user
    async fn fetch_saved_locations(&self, user_id: &str) -> Result<Vec<SavedLocation>, PostgresError>;

    /// Save a new location for a user
    ///
    /// Saving a venue that the user already promoted returns the existing row.
    async fn create_saved_location(
        &self,
        user_id: &str,
        location: &NewLocation,
    ) -> Result<SavedLocation, PostgresError>;
}

/// Fields of an event as written by the user
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location_id: Option<i64>,
    pub notes: Option<String>,
    pub attributes: serde_json::Value,
}

/// Fields of a check-in event
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of recording a check-in
#[derive(Debug, Clone)]
pub struct RecordedCheckIn {
    pub event: Event,
    pub location: SavedLocation,
    pub promoted: bool,
}

/// Counts from a batch position insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub inserted: u64,
    pub duplicates: u64,
}

const LOCATION_COLUMNS: &str =
    "id, user_id, name, category, address, latitude, longitude, origin, external_id, created_at";

const EVENT_COLUMNS: &str =
    "id, user_id, event_type, title, start_time, end_time, location_id, notes, attributes";

const POSITION_COLUMNS: &str =
    "recorded_at, latitude, longitude, altitude, accuracy, speed, bearing, provider, source";

fn point_from_row(row: &PgRow) -> Result<Point, PostgresError> {
    let latitude: f64 = row.get("latitude");
    let longitude: f64 = row.get("longitude");
    Point::new(latitude, longitude).map_err(|e| PostgresError::Corrupt(e.to_string()))
}

fn location_from_row(row: &PgRow) -> Result<SavedLocation, PostgresError> {
    Ok(SavedLocation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        category: row.get("category"),
        address: row.get("address"),
        point: point_from_row(row)?,
        origin: row.get("origin"),
        external_id: row.get("external_id"),
        created_at: row.get("created_at"),
    })
}

fn event_from_row(row: &PgRow) -> Event {
    Event {
        id: row.get("id"),
        user_id: row.get("user_id"),
        event_type: row.get("event_type"),
        title: row.get("title"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        location_id: row.get("location_id"),
        notes: row.get("notes"),
        attributes: row.get("attributes"),
    }
}

fn position_from_row(row: &PgRow) -> Result<GpsPosition, PostgresError> {
    Ok(GpsPosition {
        timestamp: row.get("recorded_at"),
        point: point_from_row(row)?,
        altitude: row.get("altitude"),
        accuracy: row.get("accuracy"),
        speed: row.get("speed"),
        bearing: row.get("bearing"),
        provider: row.get("provider"),
        source: row.get("source"),
    })
}

fn api_key_from_row(row: &PgRow) -> ApiKey {
    ApiKey {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        last_used: row.get("last_used"),
    }
}

/// Insert a location, or return the user's existing row for the same venue.
/// The flag is false when the venue had already been promoted.
async fn upsert_location<'e, E>(
    executor: E,
    user_id: &str,
    location: &NewLocation,
) -> Result<(SavedLocation, bool), PostgresError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(&upsert_location_query())
        .bind(user_id)
        .bind(&location.name)
        .bind(&location.category)
        .bind(&location.address)
        .bind(location.point.latitude())
        .bind(location.point.longitude())
        .bind(location.origin)
        .bind(&location.external_id)
        .fetch_one(executor)
        .await?;

    let inserted: bool = row.get("inserted");
    Ok((location_from_row(&row)?, inserted))
}

// Re-promoting a venue is a no-op update so RETURNING yields the existing
// row; xmax is only zero for a freshly inserted tuple.
fn upsert_location_query() -> String {
    format!(
        r#"
        INSERT INTO locations (user_id, name, category, address, latitude, longitude, origin, external_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, external_id) WHERE external_id IS NOT NULL
        DO UPDATE SET name = locations.name
        RETURNING {}, (xmax = 0) AS inserted
        "#,
        LOCATION_COLUMNS
    )
}

async fn insert_location<'e, E>(
    executor: E,
    user_id: &str,
    location: &NewLocation,
) -> Result<SavedLocation, PostgresError>
where
    E: Executor<'e, Database = Postgres>,
{
    let (location, _) = upsert_location(executor, user_id, location).await?;
    Ok(location)
}

async fn find_location<'e, E>(
    executor: E,
    user_id: &str,
    location_id: i64,
) -> Result<SavedLocation, PostgresError>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM locations WHERE id = $1 AND user_id = $2",
        LOCATION_COLUMNS
    );

    let row = sqlx::query(&query)
        .bind(location_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("Location {} not found", location_id)))?;

    location_from_row(&row)
}

/// PostgreSQL client for locations, events, GPS positions and API keys
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Create a client whose pool connects on first use
    ///
    /// Migrations are not run.
    pub fn connect_lazy(database_url: &str, acquire_timeout: Duration) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

    // ---- Locations ----

    /// Get one of the user's locations
    pub async fn get_location(&self, user_id: &str, location_id: i64) -> Result<SavedLocation, PostgresError> {
        find_location(&self.pool, user_id, location_id).await
    }

    /// Replace the editable fields of a location. Origin never changes.
    pub async fn update_location(
        &self,
        user_id: &str,
        location_id: i64,
        name: &str,
        point: Point,
        category: Option<&str>,
        address: Option<&str>,
    ) -> Result<SavedLocation, PostgresError> {
        let query = format!(
            r#"
            UPDATE locations
            SET name = $3, latitude = $4, longitude = $5, category = $6, address = $7
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            LOCATION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(location_id)
            .bind(user_id)
            .bind(name)
            .bind(point.latitude())
            .bind(point.longitude())
            .bind(category)
            .bind(address)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Location {} not found", location_id)))?;

        location_from_row(&row)
    }

    /// Delete a location that no event references
    pub async fn delete_location(&self, user_id: &str, location_id: i64) -> Result<(), PostgresError> {
        let mut tx = self.pool.begin().await?;

        find_location(&mut *tx, user_id, location_id).await?;

        let in_use: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE location_id = $1)")
            .bind(location_id)
            .fetch_one(&mut *tx)
            .await?;

        if in_use {
            return Err(PostgresError::InUse(format!(
                "Location {} is referenced by events",
                location_id
            )));
        }

        sqlx::query("DELETE FROM locations WHERE id = $1 AND user_id = $2")
            .bind(location_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Deleted location {} for user {}", location_id, user_id);
        Ok(())
    }

    // ---- Events ----

    /// Create an event, optionally saving a new location for it first
    pub async fn create_event(
        &self,
        user_id: &str,
        event: &NewEvent,
        new_location: Option<&NewLocation>,
    ) -> Result<Event, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let location_id = match new_location {
            Some(location) => Some(insert_location(&mut *tx, user_id, location).await?.id),
            None => match event.location_id {
                Some(id) => Some(find_location(&mut *tx, user_id, id).await.map_err(owned_location_error)?.id),
                None => None,
            },
        };

        let query = format!(
            r#"
            INSERT INTO events (user_id, event_type, title, start_time, end_time, location_id, notes, attributes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(event.event_type)
            .bind(&event.title)
            .bind(event.start_time)
            .bind(event.end_time)
            .bind(location_id)
            .bind(&event.notes)
            .bind(&event.attributes)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let created = event_from_row(&row);
        tracing::debug!("Created event {} ({:?}) for user {}", created.id, created.event_type, user_id);
        Ok(created)
    }

    /// Get one of the user's events
    pub async fn get_event(&self, user_id: &str, event_id: i64) -> Result<Event, PostgresError> {
        let query = format!("SELECT {} FROM events WHERE id = $1 AND user_id = $2", EVENT_COLUMNS);

        let row = sqlx::query(&query)
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Event {} not found", event_id)))?;

        Ok(event_from_row(&row))
    }

    /// Replace an event's fields
    pub async fn update_event(
        &self,
        user_id: &str,
        event_id: i64,
        event: &NewEvent,
        new_location: Option<&NewLocation>,
    ) -> Result<Event, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let location_id = match new_location {
            Some(location) => Some(insert_location(&mut *tx, user_id, location).await?.id),
            None => match event.location_id {
                Some(id) => Some(find_location(&mut *tx, user_id, id).await.map_err(owned_location_error)?.id),
                None => None,
            },
        };

        let query = format!(
            r#"
            UPDATE events
            SET event_type = $3, title = $4, start_time = $5, end_time = $6,
                location_id = $7, notes = $8, attributes = $9
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(event_id)
            .bind(user_id)
            .bind(event.event_type)
            .bind(&event.title)
            .bind(event.start_time)
            .bind(event.end_time)
            .bind(location_id)
            .bind(&event.notes)
            .bind(&event.attributes)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("Event {} not found", event_id)))?;

        tx.commit().await?;

        Ok(event_from_row(&row))
    }

    /// Delete an event, returns whether it existed
    pub async fn delete_event(&self, user_id: &str, event_id: i64) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All of the user's events, newest first
    pub async fn list_events(&self, user_id: &str) -> Result<Vec<Event>, PostgresError> {
        let query = format!(
            "SELECT {} FROM events WHERE user_id = $1 ORDER BY start_time DESC",
            EVENT_COLUMNS
        );

        let rows = sqlx::query(&query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(event_from_row).collect())
    }

    /// Events starting in `[start, end)`, oldest first
    pub async fn events_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM events
            WHERE user_id = $1 AND start_time >= $2 AND start_time < $3
            ORDER BY start_time
            "#,
            EVENT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(event_from_row).collect())
    }

    // ---- Check-ins ----

    /// Record a check-in event, promoting the venue first when needed
    pub async fn record_checkin(
        &self,
        user_id: &str,
        target: CheckInTarget,
        checkin: NewCheckIn,
    ) -> Result<RecordedCheckIn, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let (location, promoted) = match target {
            CheckInTarget::Existing(id) => (find_location(&mut *tx, user_id, id).await?, false),
            CheckInTarget::Promote(new_location) => upsert_location(&mut *tx, user_id, &new_location).await?,
        };

        let title = checkin
            .title
            .unwrap_or_else(|| checkin_title(&location.name))
            .chars()
            .take(100)
            .collect::<String>();

        let query = format!(
            r#"
            INSERT INTO events (user_id, event_type, title, start_time, location_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(EventType::CheckIn)
            .bind(&title)
            .bind(checkin.timestamp)
            .bind(location.id)
            .bind(&checkin.notes)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "User {} checked in at location {} (promoted: {})",
            user_id,
            location.id,
            promoted
        );

        Ok(RecordedCheckIn {
            event: event_from_row(&row),
            location,
            promoted,
        })
    }

    // ---- GPS positions ----

    /// Store a single position, returns false for a duplicate timestamp
    pub async fn insert_position(&self, user_id: &str, position: &GpsPosition) -> Result<bool, PostgresError> {
        let inserted = insert_position(&self.pool, user_id, position).await?;
        Ok(inserted)
    }

    /// Store a batch of positions in one transaction
    pub async fn insert_positions(
        &self,
        user_id: &str,
        positions: &[GpsPosition],
    ) -> Result<InsertStats, PostgresError> {
        let mut tx = self.pool.begin().await?;
        let mut stats = InsertStats::default();

        for position in positions {
            if insert_position(&mut *tx, user_id, position).await? {
                stats.inserted += 1;
            } else {
                stats.duplicates += 1;
            }
        }

        tx.commit().await?;

        tracing::info!(
            "Stored {} positions for user {} ({} duplicates)",
            stats.inserted,
            user_id,
            stats.duplicates
        );

        Ok(stats)
    }

    /// Positions recorded in `[start, end)`, oldest first
    pub async fn positions_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GpsPosition>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM gps_positions
            WHERE user_id = $1 AND recorded_at >= $2 AND recorded_at < $3
            ORDER BY recorded_at
            "#,
            POSITION_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(position_from_row).collect()
    }

    /// Positions inside a bounding box, newest first
    pub async fn positions_in_box(
        &self,
        user_id: &str,
        bbox: &BoundingBox,
    ) -> Result<Vec<GpsPosition>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM gps_positions
            WHERE user_id = $1
              AND latitude BETWEEN $2 AND $3
              AND (longitude BETWEEN $4 AND $5 OR longitude BETWEEN $6 AND $7)
            ORDER BY recorded_at DESC
            "#,
            POSITION_COLUMNS
        );

        let [east, west] = bbox.longitude_ranges();
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(east.0)
            .bind(east.1)
            .bind(west.0)
            .bind(west.1)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(position_from_row).collect()
    }

    // ---- API keys ----

    /// Store a new API key digest
    pub async fn create_api_key(&self, user_id: &str, name: &str, key_hash: &str) -> Result<ApiKey, PostgresError> {
        let row = sqlx::query(
            r#"
            INSERT INTO api_keys (user_id, name, key_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, created_at, last_used
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(key_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(api_key_from_row(&row))
    }

    /// The user's API keys, newest first
    pub async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKey>, PostgresError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at, last_used
            FROM api_keys
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(api_key_from_row).collect())
    }

    /// Revoke an API key, returns whether it existed
    pub async fn delete_api_key(&self, user_id: &str, key_id: i64) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(key_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Resolve a key digest to its owner and stamp `last_used`
    pub async fn authenticate_api_key(&self, key_hash: &str) -> Result<Option<String>, PostgresError> {
        let user_id: Option<String> = sqlx::query_scalar(
            "UPDATE api_keys SET last_used = NOW() WHERE key_hash = $1 RETURNING user_id",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

#[async_trait]
impl LocationStore for PostgresClient {
    async fn fetch_saved_locations(&self, user_id: &str) -> Result<Vec<SavedLocation>, PostgresError> {
        let query = format!(
            "SELECT {} FROM locations WHERE user_id = $1 ORDER BY name",
            LOCATION_COLUMNS
        );

        let rows = sqlx::query(&query).bind(user_id).fetch_all(&self.pool).await?;

        tracing::debug!("User {} has {} saved locations", user_id, rows.len());

        rows.iter().map(location_from_row).collect()
    }

    async fn create_saved_location(
        &self,
        user_id: &str,
        location: &NewLocation,
    ) -> Result<SavedLocation, PostgresError> {
        insert_location(&self.pool, user_id, location).await
    }
}

async fn insert_position<'e, E>(executor: E, user_id: &str, position: &GpsPosition) -> Result<bool, PostgresError>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO gps_positions
            (user_id, recorded_at, latitude, longitude, altitude, accuracy, speed, bearing, provider, source)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id, recorded_at) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(position.timestamp)
    .bind(position.point.latitude())
    .bind(position.point.longitude())
    .bind(position.altitude)
    .bind(position.accuracy)
    .bind(position.speed)
    .bind(position.bearing)
    .bind(&position.provider)
    .bind(position.source)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// An event pointing at someone else's (or a missing) location is bad input
fn owned_location_error(err: PostgresError) -> PostgresError {
    match err {
        PostgresError::NotFound(message) => PostgresError::InvalidInput(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owned_location_error_maps_not_found() {
        let mapped = owned_location_error(PostgresError::NotFound("Location 3 not found".to_string()));
        assert!(matches!(mapped, PostgresError::InvalidInput(_)));

        let passed = owned_location_error(PostgresError::InUse("x".to_string()));
        assert!(matches!(passed, PostgresError::InUse(_)));
    }

    #[test]
    fn test_column_lists_cover_row_mappers() {
        for column in ["origin", "external_id", "latitude", "longitude"] {
            assert!(LOCATION_COLUMNS.contains(column));
        }
        assert!(EVENT_COLUMNS.contains("attributes"));
        assert!(POSITION_COLUMNS.contains("recorded_at"));
    }

    #[test]
    fn test_upsert_reports_whether_row_is_new() {
        let query = upsert_location_query();
        assert!(query.contains("ON CONFLICT (user_id, external_id) WHERE external_id IS NOT NULL"));
        assert!(query.contains("(xmax = 0) AS inserted"));
        assert!(query.contains(LOCATION_COLUMNS));
    }
}
