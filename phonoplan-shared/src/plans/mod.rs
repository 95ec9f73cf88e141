/// Activity plans
///
/// - [`schema`]: plan and generation-input types with their validation rules
/// - [`generator`]: the `PlanGenerator` seam and its OpenAI-compatible implementation

pub mod generator;
pub mod schema;

pub use generator::{OpenAiConfig, OpenAiPlanGenerator, PlanGenerationError, PlanGenerator};
pub use schema::{AccessibilityNeed, Activity, ActivityPlan, ActivityStep, PlanGenerationInput, PlanNeeds};
