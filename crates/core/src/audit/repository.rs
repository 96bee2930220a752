use super::{
    traits::{AuditBackend, AuditFilter, BackendHealth, SortOrder},
    AuditEvent,
};
use crate::error::{Error, ErrorCode, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder, Row};
use std::sync::Arc;
use tracing::{error, info};

/// Database-backed audit repository. Always queries through the `audit_log`
/// table defined in `sql/schema.sql` — row-level `tenant_id` scoping is
/// enforced by this repository, not left to callers (see `AuditFilter`).
pub struct DatabaseAuditRepository {
    pool: Arc<PgPool>,
}

impl DatabaseAuditRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditBackend for DatabaseAuditRepository {
    async fn store_event(&self, event: &AuditEvent) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, event_type, severity, event_time, actor_id, impersonator_id,
                tenant_id, request_id, resource_type, resource_id, source_ip,
                user_agent, description, metadata, previous_values, new_values,
                outcome, tags
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7::uuid, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18
            )
            "#,
        )
        .bind(&event.id)
        .bind(event.event_type.to_string())
        .bind(event.severity.to_string())
        .bind(event.timestamp)
        .bind(&event.actor_id)
        .bind(&event.impersonator_id)
        .bind(&event.tenant_id)
        .bind(&event.request_id)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.source_ip)
        .bind(&event.user_agent)
        .bind(&event.description)
        .bind(serde_json::to_value(&event.metadata).unwrap_or(serde_json::Value::Null))
        .bind(&event.previous_values)
        .bind(&event.new_values)
        .bind(event.outcome.to_string())
        .bind(&event.tags)
        .execute(self.pool.as_ref())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to store audit event {}: {}", event.id, e);
                Err(e.into())
            }
        }
    }

    async fn retrieve_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"SELECT id, event_type, severity, event_time, actor_id, impersonator_id,
                      tenant_id, request_id, resource_type, resource_id, source_ip,
                      user_agent, description, metadata, previous_values, new_values,
                      outcome, tags
               FROM audit_log WHERE 1 = 1"#,
        );
        push_filter_conditions(&mut qb, filter);

        let order_by = match filter.sort_order {
            SortOrder::TimestampAsc => " ORDER BY event_time ASC",
            SortOrder::TimestampDesc => " ORDER BY event_time DESC",
            SortOrder::SeverityDesc => {
                " ORDER BY CASE severity WHEN 'critical' THEN 1 WHEN 'warning' THEN 2 ELSE 3 END, event_time DESC"
            }
        };
        qb.push(order_by);

        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = qb.build().fetch_all(self.pool.as_ref()).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(AuditEvent {
                id: row.get("id"),
                event_type: parse_event_type(&row.get::<String, _>("event_type")),
                severity: parse_severity(&row.get::<String, _>("severity")),
                timestamp: row.get("event_time"),
                actor_id: row.get("actor_id"),
                impersonator_id: row.get("impersonator_id"),
                tenant_id: row.get("tenant_id"),
                request_id: row.get("request_id"),
                resource_type: row.get("resource_type"),
                resource_id: row.get("resource_id"),
                source_ip: row.get("source_ip"),
                user_agent: row.get("user_agent"),
                description: row.get("description"),
                metadata: serde_json::from_value(row.get::<serde_json::Value, _>("metadata"))
                    .unwrap_or_default(),
                previous_values: row.get("previous_values"),
                new_values: row.get("new_values"),
                outcome: parse_outcome(&row.get::<String, _>("outcome")),
                tags: row.get::<Vec<String>, _>("tags"),
            });
        }

        Ok(events)
    }

    async fn count_events(&self, filter: &AuditFilter) -> Result<u64> {
        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM audit_log WHERE 1 = 1");
        push_filter_conditions(&mut qb, filter);

        let count: i64 = qb.build_query_scalar().fetch_one(self.pool.as_ref()).await?;
        Ok(count as u64)
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        match sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await {
            Ok(_) => Ok(BackendHealth {
                is_healthy: true,
                message: None,
                last_write: None,
                events_stored_today: None,
            }),
            Err(e) => Ok(BackendHealth {
                is_healthy: false,
                message: Some(e.to_string()),
                last_write: None,
                events_stored_today: None,
            }),
        }
    }

    async fn cleanup_old_events(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM audit_log WHERE event_time < $1")
            .bind(older_than)
            .execute(self.pool.as_ref())
            .await?;

        info!("Cleaned up {} old audit events", result.rows_affected());
        Ok(result.rows_affected())
    }
}

/// Appends this filter's WHERE conditions to an in-progress query. Shared by
/// `retrieve_events` and `count_events` so the two never drift apart.
fn push_filter_conditions(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &AuditFilter) {
    if let Some(start_time) = &filter.start_time {
        qb.push(" AND event_time >= ").push_bind(*start_time);
    }
    if let Some(end_time) = &filter.end_time {
        qb.push(" AND event_time <= ").push_bind(*end_time);
    }
    if let Some(actor_id) = &filter.actor_id {
        qb.push(" AND actor_id = ").push_bind(actor_id.clone());
    }
    if let Some(tenant_id) = &filter.tenant_id {
        qb.push(" AND tenant_id = ")
            .push_bind(tenant_id.clone())
            .push("::uuid");
    }
    if let Some(resource_type) = &filter.resource_type {
        qb.push(" AND resource_type = ").push_bind(resource_type.clone());
    }
    if let Some(resource_id) = &filter.resource_id {
        qb.push(" AND resource_id = ").push_bind(resource_id.clone());
    }
    if let Some(event_types) = &filter.event_types {
        qb.push(" AND event_type = ANY(").push_bind(event_types.clone()).push(")");
    }
    if let Some(severities) = &filter.severities {
        qb.push(" AND severity = ANY(").push_bind(severities.clone()).push(")");
    }
    if let Some(outcomes) = &filter.outcomes {
        qb.push(" AND outcome = ANY(").push_bind(outcomes.clone()).push(")");
    }
    if let Some(tags) = &filter.tags {
        qb.push(" AND tags && ").push_bind(tags.clone());
    }
    if let Some(description_contains) = &filter.description_contains {
        qb.push(" AND description ILIKE ")
            .push_bind(format!("%{}%", description_contains));
    }
}

/// Generic audit repository that can use multiple backends
pub struct AuditRepository {
    backends: Vec<Box<dyn AuditBackend>>,
    primary_backend: usize,
}

impl AuditRepository {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            primary_backend: 0,
        }
    }

    pub fn add_backend(mut self, backend: Box<dyn AuditBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn with_primary_backend(mut self, index: usize) -> Self {
        if index < self.backends.len() {
            self.primary_backend = index;
        }
        self
    }
}

#[async_trait]
impl AuditBackend for AuditRepository {
    async fn store_event(&self, event: &AuditEvent) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::new(ErrorCode::ConfigurationError, "No audit backends configured"));
        }

        // Store to all backends, but only fail if primary backend fails
        let mut primary_result = Ok(());
        for (i, backend) in self.backends.iter().enumerate() {
            match backend.store_event(event).await {
                Ok(_) => {
                    if i == self.primary_backend {
                        primary_result = Ok(());
                    }
                }
                Err(e) => {
                    if i == self.primary_backend {
                        primary_result = Err(e);
                    } else {
                        error!("Secondary audit backend {} failed: {}", i, e);
                    }
                }
            }
        }

        primary_result
    }

    async fn retrieve_events(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        if self.primary_backend >= self.backends.len() {
            return Err(Error::new(ErrorCode::ConfigurationError, "Invalid primary backend index"));
        }

        self.backends[self.primary_backend]
            .retrieve_events(filter)
            .await
    }

    async fn count_events(&self, filter: &AuditFilter) -> Result<u64> {
        if self.primary_backend >= self.backends.len() {
            return Err(Error::new(ErrorCode::ConfigurationError, "Invalid primary backend index"));
        }

        self.backends[self.primary_backend]
            .count_events(filter)
            .await
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        if self.primary_backend >= self.backends.len() {
            return Err(Error::new(ErrorCode::ConfigurationError, "Invalid primary backend index"));
        }

        self.backends[self.primary_backend]
            .health_check()
            .await
    }

    async fn cleanup_old_events(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut total_cleaned = 0u64;
        
        for backend in &self.backends {
            match backend.cleanup_old_events(older_than).await {
                Ok(cleaned) => total_cleaned += cleaned,
                Err(e) => error!("Failed to cleanup events in backend: {}", e),
            }
        }

        Ok(total_cleaned)
    }
}

impl Default for AuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

// Helper functions for parsing database values
fn parse_event_type(s: &str) -> crate::audit::event::EventType {
    use crate::audit::event::EventType;
    
    match s {
        "AUTHENTICATION_ATTEMPT" => EventType::AuthenticationAttempt,
        "AUTHENTICATION_SUCCESS" => EventType::AuthenticationSuccess,
        "AUTHENTICATION_FAILURE" => EventType::AuthenticationFailure,
        // Add more cases as needed
        _ => EventType::Custom(s.to_string()),
    }
}

fn parse_severity(s: &str) -> crate::audit::event::EventSeverity {
    use crate::audit::event::EventSeverity;
    
    match s.to_lowercase().as_str() {
        "info" => EventSeverity::Info,
        "warning" => EventSeverity::Warning,
        "critical" => EventSeverity::Critical,
        _ => EventSeverity::Info,
    }
}

fn parse_outcome(s: &str) -> crate::audit::event::EventOutcome {
    use crate::audit::event::EventOutcome;
    
    match s.to_lowercase().as_str() {
        "success" => EventOutcome::Success,
        "failure" => EventOutcome::Failure,
        "partial" => EventOutcome::Partial,
        _ => EventOutcome::Unknown,
    }
}