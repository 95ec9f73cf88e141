/// Activity plan endpoints
///
/// - `GET /api/plans` - The organization's plans, newest first (ADMIN, TEACHER)
/// - `POST /api/plans/generate` - Generate a plan with the AI provider and save it (ADMIN)
///
/// Generation is rate limited per client. The provider's answer is validated
/// against the plan schema before anything is stored.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use phonoplan_shared::{
    auth::{
        authorization::{require_role, ADMIN_ONLY, ANY_ROLE},
        middleware::Session,
    },
    models::plan::{CreatePlan, Plan, PlanListItem},
    plans::{PlanGenerationError, PlanGenerationInput},
    validation::validate_in_order,
};

const GENERATION_FAILED: &str = "Não foi possível gerar o plano com a IA.";

/// Maps provider failures to 502 responses
pub fn generation_error(err: PlanGenerationError) -> ApiError {
    match err {
        PlanGenerationError::Upstream(ref cause) => {
            tracing::error!(error = %cause, "Plan generation request failed");
            ApiError::BadGateway {
                message: GENERATION_FAILED.to_string(),
                details: None,
            }
        }
        PlanGenerationError::EmptyResponse => {
            tracing::warn!("Plan generation returned no content");
            ApiError::BadGateway {
                message: GENERATION_FAILED.to_string(),
                details: None,
            }
        }
        PlanGenerationError::InvalidJson(ref cause) => {
            tracing::warn!(error = %cause, "Plan generation returned invalid JSON");
            ApiError::BadGateway {
                message: "Resposta inválida da IA.".to_string(),
                details: None,
            }
        }
        PlanGenerationError::SchemaMismatch(details) => {
            tracing::warn!(errors = details.len(), "Generated plan failed validation");
            ApiError::BadGateway {
                message: "Plano gerado fora do formato esperado.".to_string(),
                details: Some(details),
            }
        }
    }
}

pub async fn list_plans(
    State(state): State<AppState>,
    Session(session): Session,
) -> ApiResult<Json<Vec<PlanListItem>>> {
    let scope = require_role(session.as_ref(), ANY_ROLE)?;

    let plans = Plan::list_by_org(&state.db, scope.org_id).await?;

    Ok(Json(plans))
}

/// Generate and save a plan
///
/// ```text
/// POST /api/plans/generate
/// {
///   "targetIpa": "/r/",
///   "ageOrGrade": "2º ano",
///   "objectives": ["Produzir /r/ em sílabas simples"],
///   "accessibilityNeeds": [{ "area": "Atenção", "support": "Pausas curtas entre etapas" }]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: invalid input, with field details
/// - `403 Forbidden`: caller is not an ADMIN
/// - `429 Too Many Requests`: generation policy exceeded
/// - `500 Internal Server Error`: no AI provider configured, or the plan could not be saved
/// - `502 Bad Gateway`: the provider failed or answered outside the schema
pub async fn generate_plan(
    State(state): State<AppState>,
    Session(session): Session,
    body: Result<Json<PlanGenerationInput>, JsonRejection>,
) -> ApiResult<Json<Plan>> {
    let scope = require_role(session.as_ref(), ADMIN_ONLY)?;
    let Json(input) = body?;
    validate_in_order(&input).map_err(|details| {
        ApiError::validation_with_message("Dados inválidos para geração do plano.", details)
    })?;

    let generator = state.plan_generator.as_ref().ok_or_else(|| {
        tracing::error!("Plan generation requested without an AI provider configured");
        ApiError::InternalError("Configuração do modelo de IA ausente no servidor.".to_string())
    })?;

    let plan = generator.generate(&input).await.map_err(generation_error)?;

    let needs_json = serde_json::to_value(input.needs())
        .map_err(|e| ApiError::internal("Não foi possível salvar o plano.", e))?;
    let plan_json = serde_json::to_value(&plan)
        .map_err(|e| ApiError::internal("Não foi possível salvar o plano.", e))?;

    let saved = Plan::create(
        &state.db,
        CreatePlan {
            org_id: scope.org_id,
            created_by_user_id: scope.user_id,
            target_ipa: input.target_ipa,
            age_or_grade: input.age_or_grade,
            needs_json,
            plan_json,
        },
    )
    .await
    .map_err(|e| ApiError::internal("Não foi possível salvar o plano.", e))?;

    tracing::info!(
        org_id = %scope.org_id,
        plan_id = %saved.id,
        activities = plan.activities.len(),
        "Plan generated"
    );

    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonoplan_shared::validation::FieldError;

    #[test]
    fn test_generation_errors_are_bad_gateway() {
        let errors = [
            PlanGenerationError::Upstream("timeout".to_string()),
            PlanGenerationError::EmptyResponse,
            PlanGenerationError::InvalidJson("expected value".to_string()),
        ];

        for err in errors {
            assert!(matches!(
                generation_error(err),
                ApiError::BadGateway { details: None, .. }
            ));
        }
    }

    #[test]
    fn test_schema_mismatch_keeps_details() {
        let err = PlanGenerationError::SchemaMismatch(vec![FieldError {
            field: "activities".to_string(),
            message: "Inclua ao menos uma atividade.".to_string(),
        }]);

        match generation_error(err) {
            ApiError::BadGateway { message, details } => {
                assert_eq!(message, "Plano gerado fora do formato esperado.");
                assert_eq!(details.unwrap().len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_message() {
        match generation_error(PlanGenerationError::InvalidJson("eof".to_string())) {
            ApiError::BadGateway { message, .. } => assert_eq!(message, "Resposta inválida da IA."),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
