//! # Prompt Execution Pipeline
//!
//! The full path from a template code to a normalized
//! [`CompletionResponse`]: load the template, validate input variables,
//! render prompts, resolve a model client, write the dispatch-time audit
//! row, execute, validate output, and complete the audit row.
//!
//! ## Failure semantics
//!
//! - Input validation failure short-circuits BEFORE any audit row or model
//!   call; nothing is billed and nothing is recorded.
//! - Output schema mismatch downgrades an otherwise-successful model call to
//!   a failed response. The audit row keeps the raw response either way.
//! - Audit writes are best-effort: a failed insert or update is logged and
//!   execution proceeds, because losing a model response is worse than
//!   losing its audit row.

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::renderer::render_template;
use super::schema;
use crate::constants::ExecutionStatus;
use crate::error::{EngineError, Result};
use crate::llm::{
    Complexity, CompletionResponse, ModelClientFactory, ModelOptions, Provider, ResolvedClient,
};
use crate::models::{ModelInterface, PromptExecution, PromptExecutionOutcome, PromptTemplate};
use crate::models::prompt_template::OutputFormat;

/// Per-request overrides layered over template and interface defaults.
///
/// Model resolution order: explicit `model` > `complexity`-selected model >
/// the resolved interface's default > the template's default.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub model: Option<String>,
    pub provider: Option<Provider>,
    pub complexity: Option<Complexity>,
}

/// Executes prompt templates against AI model clients
pub struct PromptRunner {
    pool: PgPool,
    factory: ModelClientFactory,
}

impl PromptRunner {
    pub fn new(pool: PgPool) -> Self {
        let factory = ModelClientFactory::new(pool.clone());
        Self { pool, factory }
    }

    /// Execute the template named by `code` with the given variables.
    ///
    /// Infrastructure faults (datastore down, no resolvable client) surface
    /// as `Err`; business failures (validation, provider errors, parse
    /// failures) come back as an error-valued [`CompletionResponse`].
    pub async fn execute_prompt(
        &self,
        code: &str,
        variables: &serde_json::Value,
        context: &ExecutionContext,
    ) -> Result<CompletionResponse> {
        let template = PromptTemplate::find_by_code(&self.pool, code)
            .await?
            .ok_or_else(|| {
                EngineError::validation(format!("Prompt template '{code}' not found"))
            })?;

        // Gate on input before any audit row or model call
        if let Some(input_schema) = &template.input_schema {
            if let Err(violations) = schema::validate(input_schema, variables) {
                info!(template_code = %code, %violations, "Input validation rejected execution");
                return Ok(CompletionResponse::failure(
                    format!("Input validation failed: {violations}"),
                    template.default_model.clone().unwrap_or_default(),
                ));
            }
        }

        let rendered_system = render_template(&template.system_prompt, variables);
        let rendered_user = render_template(&template.user_prompt, variables);

        let resolved = self.resolve_client(&template, context).await?;
        let model = Self::resolve_model(&template, context, &resolved);
        let options = ModelOptions {
            model: Some(model.clone()),
            temperature: template.temperature,
            max_tokens: template.max_tokens.map(|n| n as u32),
        };

        let output_format = template
            .output_format()
            .map_err(EngineError::integrity)?;

        let audit_id = self
            .record_dispatch(&template, &resolved, &model, &rendered_system, &rendered_user)
            .await;

        let mut response = match output_format {
            OutputFormat::Json => {
                resolved
                    .client
                    .execute_for_json(&rendered_system, &rendered_user, &options)
                    .await
            }
            OutputFormat::Markdown | OutputFormat::Text => {
                resolved
                    .client
                    .execute_raw(&rendered_system, &rendered_user, &options)
                    .await
            }
        };

        if response.success && output_format == OutputFormat::Json {
            if let (Some(output_schema), Some(data)) = (&template.output_schema, &response.data) {
                if let Err(violations) = schema::validate(output_schema, data) {
                    response.success = false;
                    response.error = Some(format!("Output validation failed: {violations}"));
                }
            }
        }

        self.record_completion(audit_id, &response).await;

        info!(
            template_code = %code,
            model = %response.model,
            success = response.success,
            duration_ms = response.duration_ms,
            cost_usd = response.cost_usd,
            "Prompt execution finished"
        );
        Ok(response)
    }

    async fn resolve_client(
        &self,
        template: &PromptTemplate,
        context: &ExecutionContext,
    ) -> Result<ResolvedClient> {
        if let Some(provider) = context.provider {
            return self.factory.resolve(provider, None).await;
        }

        if let Some(interface_id) = template.model_interface_id {
            if let Some(record) = ModelInterface::find_by_id(&self.pool, interface_id).await? {
                let provider = record.provider().map_err(EngineError::integrity)?;
                return self.factory.resolve(provider, Some(interface_id)).await;
            }
            warn!(
                %interface_id,
                template_code = %template.code,
                "Template references a missing model interface; using provider default"
            );
        }

        self.factory.resolve(Provider::Anthropic, None).await
    }

    /// Resolution order: context override > complexity-selected model >
    /// interface record default > template default > client default.
    fn resolve_model(
        template: &PromptTemplate,
        context: &ExecutionContext,
        resolved: &ResolvedClient,
    ) -> String {
        if let Some(model) = &context.model {
            return model.clone();
        }
        if let Some(complexity) = context.complexity {
            return resolved.client.select_model(complexity);
        }
        resolved
            .interface_default_model
            .clone()
            .or_else(|| template.default_model.clone())
            .unwrap_or_else(|| resolved.client.default_model().to_string())
    }

    async fn record_dispatch(
        &self,
        template: &PromptTemplate,
        resolved: &ResolvedClient,
        model: &str,
        rendered_system: &str,
        rendered_user: &str,
    ) -> Option<Uuid> {
        match PromptExecution::create_running(
            &self.pool,
            &template.code,
            resolved.interface_id,
            &resolved.client.provider().to_string(),
            model,
            rendered_system,
            rendered_user,
        )
        .await
        {
            Ok(row) => Some(row.id),
            Err(e) => {
                warn!(template_code = %template.code, error = %e, "Audit insert failed; continuing");
                None
            }
        }
    }

    async fn record_completion(&self, audit_id: Option<Uuid>, response: &CompletionResponse) {
        let Some(id) = audit_id else { return };

        let outcome = PromptExecutionOutcome {
            status: if response.success {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Error
            },
            raw_response: if response.content.is_empty() {
                None
            } else {
                Some(response.content.clone())
            },
            parsed_output: response.data.clone(),
            prompt_tokens: Some(response.usage.prompt_tokens as i32),
            completion_tokens: Some(response.usage.completion_tokens as i32),
            cost_usd: Some(response.cost_usd),
            duration_ms: response.duration_ms as i64,
            error_message: response.error.clone(),
        };

        if let Err(e) = PromptExecution::complete(&self.pool, id, outcome).await {
            warn!(audit_id = %id, error = %e, "Audit completion update failed; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AnthropicClient;
    use chrono::Utc;

    fn template(default_model: Option<&str>) -> PromptTemplate {
        PromptTemplate {
            id: Uuid::new_v4(),
            code: "summarize".to_string(),
            category: None,
            system_prompt: "You summarize text.".to_string(),
            user_prompt: "Summarize: {{text}}".to_string(),
            model_interface_id: None,
            default_model: default_model.map(String::from),
            temperature: None,
            max_tokens: None,
            input_schema: None,
            output_schema: None,
            output_format: "text".to_string(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resolved(interface_default_model: Option<&str>) -> ResolvedClient {
        ResolvedClient {
            client: Box::new(AnthropicClient::new("key")),
            interface_id: Some(Uuid::new_v4()),
            interface_default_model: interface_default_model.map(String::from),
        }
    }

    #[test]
    fn test_context_model_wins() {
        let context = ExecutionContext {
            model: Some("claude-3-opus-latest".to_string()),
            ..ExecutionContext::default()
        };
        let model = PromptRunner::resolve_model(
            &template(Some("template-model")),
            &context,
            &resolved(Some("interface-model")),
        );
        assert_eq!(model, "claude-3-opus-latest");
    }

    #[test]
    fn test_interface_default_wins_over_template_default() {
        let model = PromptRunner::resolve_model(
            &template(Some("template-model")),
            &ExecutionContext::default(),
            &resolved(Some("interface-model")),
        );
        assert_eq!(model, "interface-model");
    }

    #[test]
    fn test_template_default_applies_when_interface_declares_none() {
        let model = PromptRunner::resolve_model(
            &template(Some("template-model")),
            &ExecutionContext::default(),
            &resolved(None),
        );
        assert_eq!(model, "template-model");
    }

    #[test]
    fn test_client_default_is_last_resort() {
        let model = PromptRunner::resolve_model(
            &template(None),
            &ExecutionContext::default(),
            &resolved(None),
        );
        assert_eq!(model, "claude-3-5-sonnet-latest");
    }
}
