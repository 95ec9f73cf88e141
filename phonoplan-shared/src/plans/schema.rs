/// Activity plan schema
///
/// The same shape is used for what teachers submit (without `activities`) and
/// for what the AI provider must return. Field names are camelCase on the wire.
/// Missing fields deserialize to empty values so that the validation rules,
/// not serde, report them.
///
/// # Rules
///
/// | field | rule |
/// |---|---|
/// | `targetIpa` | non-empty |
/// | `ageOrGrade` | at least 2 characters |
/// | `objectives` | at least one, each at least 3 characters |
/// | `accessibilityNeeds[]` | `area` ≥ 2, `support` ≥ 5 characters |
/// | `activities` | at least one |
/// | `activities[].title` | at least 3 characters |
/// | `activities[].steps` | at least one `{title ≥ 3, instructions ≥ 10, durationMinutes > 0}` |
/// | `activities[].resources` | each at least 2 characters |

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::validation::{validate_in_order, FieldError, FieldOrder};

/// Declaration order of every plan field, nested ones included
const PLAN_FIELD_ORDER: &[&str] = &[
    "targetIpa",
    "ageOrGrade",
    "objectives",
    "accessibilityNeeds",
    "area",
    "support",
    "activities",
    "title",
    "steps",
    "instructions",
    "durationMinutes",
    "resources",
];

/// One step of an activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityStep {
    #[validate(length(min = 3, message = "Informe um título para a etapa."))]
    pub title: String,

    #[validate(length(min = 10, message = "Detalhe as instruções pedagógicas da atividade."))]
    pub instructions: String,

    #[validate(range(min = 1, message = "A duração precisa ser positiva."))]
    pub duration_minutes: i64,
}

/// An accessibility need and the support it calls for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessibilityNeed {
    #[validate(length(min = 2, message = "Informe o domínio da necessidade."))]
    pub area: String,

    #[validate(length(min = 5, message = "Descreva o apoio ou ajuste necessário."))]
    pub support: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Activity {
    #[validate(length(min = 3, message = "Atividades precisam de um título."))]
    pub title: String,

    #[validate(length(min = 1, message = "Inclua pelo menos um passo."), nested)]
    pub steps: Vec<ActivityStep>,

    #[validate(custom(function = "validate_resources"))]
    pub resources: Vec<String>,
}

/// A complete activity plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityPlan {
    #[validate(length(min = 1, message = "O alvo IPA é obrigatório."))]
    pub target_ipa: String,

    #[validate(length(min = 2, message = "Idade ou série obrigatória para contextualizar o plano."))]
    pub age_or_grade: String,

    #[validate(
        length(min = 1, message = "Adicione pelo menos um objetivo de aprendizagem."),
        custom(function = "validate_objectives")
    )]
    pub objectives: Vec<String>,

    #[validate(nested)]
    pub accessibility_needs: Vec<AccessibilityNeed>,

    #[validate(length(min = 1, message = "Inclua ao menos uma atividade no plano."), nested)]
    pub activities: Vec<Activity>,
}

impl FieldOrder for ActivityPlan {
    const FIELD_ORDER: &'static [&'static str] = PLAN_FIELD_ORDER;
}

impl ActivityPlan {
    /// Parses and validates a plan produced outside this process
    ///
    /// # Errors
    ///
    /// Every rule violation, or a single `plan` error when the value is not an
    /// object of the expected shape.
    pub fn from_json(value: JsonValue) -> Result<Self, Vec<FieldError>> {
        let plan: ActivityPlan = serde_json::from_value(value).map_err(|e| {
            vec![FieldError {
                field: "plan".to_string(),
                message: format!("Estrutura inválida: {}", e),
            }]
        })?;

        validate_in_order(&plan)?;
        Ok(plan)
    }
}

/// What a teacher submits to generate a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct PlanGenerationInput {
    #[validate(length(min = 1, message = "O alvo IPA é obrigatório."))]
    pub target_ipa: String,

    #[validate(length(min = 2, message = "Idade ou série obrigatória para contextualizar o plano."))]
    pub age_or_grade: String,

    #[validate(
        length(min = 1, message = "Adicione pelo menos um objetivo de aprendizagem."),
        custom(function = "validate_objectives")
    )]
    pub objectives: Vec<String>,

    #[validate(nested)]
    pub accessibility_needs: Vec<AccessibilityNeed>,
}

impl FieldOrder for PlanGenerationInput {
    const FIELD_ORDER: &'static [&'static str] = PLAN_FIELD_ORDER;
}

impl PlanGenerationInput {
    /// The part of the input persisted as a plan's `needs_json`
    pub fn needs(&self) -> PlanNeeds {
        PlanNeeds {
            accessibility_needs: self.accessibility_needs.clone(),
            objectives: self.objectives.clone(),
        }
    }
}

/// Stored needs of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNeeds {
    pub accessibility_needs: Vec<AccessibilityNeed>,
    pub objectives: Vec<String>,
}

fn min_chars_each(
    items: &[String],
    min: usize,
    message: &'static str,
) -> Result<(), ValidationError> {
    if items.iter().any(|item| item.chars().count() < min) {
        let mut error = ValidationError::new("length");
        error.message = Some(Cow::Borrowed(message));
        return Err(error);
    }
    Ok(())
}

fn validate_objectives(objectives: &[String]) -> Result<(), ValidationError> {
    min_chars_each(objectives, 3, "Descreva o objetivo de forma clara.")
}

fn validate_resources(resources: &[String]) -> Result<(), ValidationError> {
    min_chars_each(resources, 2, "Liste recursos com pelo menos 2 caracteres.")
}
