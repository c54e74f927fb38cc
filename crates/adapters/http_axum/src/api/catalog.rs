//! Closed catalogs of metrics, operators and actions.

use axum::Json;
use serde::Serialize;

use adpilot_domain::metric::{MetricField, ValueType};
use adpilot_domain::rule::{ActionDescriptor, ActionType, Operator, ScheduleFrequency};

#[derive(Debug, Serialize)]
pub struct MetricDescriptor {
    pub field: MetricField,
    pub label: &'static str,
    pub value_type: ValueType,
}

/// Everything a rule editor needs to offer valid choices.
#[derive(Debug, Serialize)]
pub struct Catalog {
    pub metrics: Vec<MetricDescriptor>,
    pub operators: Vec<Operator>,
    pub actions: Vec<ActionDescriptor>,
    pub schedules: Vec<ScheduleFrequency>,
}

impl Catalog {
    fn build() -> Self {
        Self {
            metrics: MetricField::ALL
                .into_iter()
                .map(|field| MetricDescriptor {
                    field,
                    label: field.label(),
                    value_type: field.value_type(),
                })
                .collect(),
            operators: Operator::ALL.to_vec(),
            actions: ActionType::ALL.into_iter().map(ActionType::descriptor).collect(),
            schedules: vec![
                ScheduleFrequency::Every15Minutes,
                ScheduleFrequency::Hourly,
                ScheduleFrequency::Every6Hours,
                ScheduleFrequency::Daily,
            ],
        }
    }
}

/// `GET /api/catalog` — the metric and action registries.
pub async fn get() -> Json<Catalog> {
    Json(Catalog::build())
}
