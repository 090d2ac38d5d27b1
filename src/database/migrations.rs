//! # Schema Migrations
//!
//! Embedded, idempotent DDL for the execution engine's tables. Every
//! statement is `IF NOT EXISTS`-guarded so the runner is safe to execute on
//! every startup; production deployments typically run it once from a
//! release task.

use sqlx::PgPool;
use tracing::info;

use crate::error::{EngineError, Result};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id UUID PRIMARY KEY,
            instance_id UUID NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "service_configurations",
        r#"
        CREATE TABLE IF NOT EXISTS service_configurations (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            url TEXT,
            http_method TEXT NOT NULL DEFAULT 'POST',
            timeout_seconds INTEGER NOT NULL DEFAULT 30,
            max_retries INTEGER NOT NULL DEFAULT 3,
            auth JSONB NOT NULL DEFAULT '{"scheme": "none"}',
            extra_headers JSONB,
            mock_template TEXT,
            mock_definition JSONB,
            active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "model_interfaces",
        r#"
        CREATE TABLE IF NOT EXISTS model_interfaces (
            id UUID PRIMARY KEY,
            provider TEXT NOT NULL,
            encrypted_credential TEXT NOT NULL,
            base_url TEXT,
            default_model TEXT,
            active BOOLEAN NOT NULL DEFAULT true,
            is_default BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "prompt_templates",
        r#"
        CREATE TABLE IF NOT EXISTS prompt_templates (
            id UUID PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            category TEXT,
            system_prompt TEXT NOT NULL DEFAULT '',
            user_prompt TEXT NOT NULL,
            model_interface_id UUID REFERENCES model_interfaces(id),
            default_model TEXT,
            temperature DOUBLE PRECISION,
            max_tokens INTEGER,
            input_schema JSONB,
            output_schema JSONB,
            output_format TEXT NOT NULL DEFAULT 'text',
            active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "execution_queue",
        r#"
        CREATE TABLE IF NOT EXISTS execution_queue (
            id BIGSERIAL PRIMARY KEY,
            instance_id UUID NOT NULL,
            task_id UUID NOT NULL,
            config_kind TEXT NOT NULL,
            config_id UUID NOT NULL,
            input_data JSONB NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            error_message TEXT,
            available_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "execution_queue_claim_index",
        r#"
        CREATE INDEX IF NOT EXISTS idx_execution_queue_claimable
        ON execution_queue (created_at)
        WHERE status = 'pending'
        "#,
    ),
    (
        "execution_audits",
        r#"
        CREATE TABLE IF NOT EXISTS execution_audits (
            id UUID PRIMARY KEY,
            instance_id UUID NOT NULL,
            task_id UUID NOT NULL,
            config_id UUID NOT NULL,
            service_name TEXT NOT NULL,
            status TEXT NOT NULL,
            request_payload JSONB,
            response_payload JSONB,
            error_message TEXT,
            duration_ms BIGINT NOT NULL DEFAULT 0,
            http_status INTEGER,
            attempt INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "prompt_executions",
        r#"
        CREATE TABLE IF NOT EXISTS prompt_executions (
            id UUID PRIMARY KEY,
            template_code TEXT NOT NULL,
            model_interface_id UUID,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            rendered_system_prompt TEXT NOT NULL DEFAULT '',
            rendered_user_prompt TEXT NOT NULL DEFAULT '',
            raw_response TEXT,
            parsed_output JSONB,
            status TEXT NOT NULL DEFAULT 'running',
            prompt_tokens INTEGER,
            completion_tokens INTEGER,
            cost_usd DOUBLE PRECISION,
            duration_ms BIGINT,
            error_message TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            completed_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "resumption_signals",
        r#"
        CREATE TABLE IF NOT EXISTS resumption_signals (
            id BIGSERIAL PRIMARY KEY,
            instance_id UUID NOT NULL,
            task_id UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "resumption_signals_instance_index",
        r#"
        CREATE INDEX IF NOT EXISTS idx_resumption_signals_instance
        ON resumption_signals (instance_id, created_at)
        "#,
    ),
];

/// Run all embedded migrations in order
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, ddl) in MIGRATIONS {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| EngineError::database(format!("migrate:{name}"), e.to_string()))?;
    }
    info!(count = MIGRATIONS.len(), "Schema migrations applied");
    Ok(())
}
