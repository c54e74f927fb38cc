//! Condition expressions and their evaluation.
//!
//! A rule's expression is a two-level tree: a logic operator over ordered
//! [`ConditionGroup`]s, each of which folds its own [`Condition`]s with its
//! own logic operator. Deeper nesting is not representable.
//!
//! Evaluation is pure. A condition whose metric is absent from the snapshot
//! evaluates to `false`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::metric::{BaselineKey, MetricField, MetricKey, MetricSnapshot, Window};

/// Absolute tolerance used by `eq` / `neq` on floating point metrics.
const EQ_TOLERANCE: f64 = 1e-9;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    /// Inclusive on both bounds.
    Between,
    /// `current - baseline > threshold`, baseline aged by the window.
    ChangeGt,
    /// `current - baseline < threshold`, baseline aged by the window.
    ChangeLt,
}

impl Operator {
    pub const ALL: [Self; 9] = [
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Eq,
        Self::Neq,
        Self::Between,
        Self::ChangeGt,
        Self::ChangeLt,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Between => "between",
            Self::ChangeGt => "change_gt",
            Self::ChangeLt => "change_lt",
        }
    }

    /// Whether the operator compares a delta against a baseline.
    #[must_use]
    pub fn is_change(self) -> bool {
        matches!(self, Self::ChangeGt | Self::ChangeLt)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand of a condition: a scalar, or a `[low, high]` pair for `between`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Scalar(f64),
    Range(f64, f64),
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<(f64, f64)> for ConditionValue {
    fn from((low, high): (f64, f64)) -> Self {
        Self::Range(low, high)
    }
}

/// A single threshold check against one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: MetricField,
    pub operator: Operator,
    pub value: ConditionValue,
    /// Aggregation window for absolute operators, baseline age for `change_*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
}

impl Condition {
    #[must_use]
    pub fn new(field: MetricField, operator: Operator, value: impl Into<ConditionValue>) -> Self {
        Self {
            field,
            operator,
            value: value.into(),
            window: None,
        }
    }

    /// Attach a window to the condition.
    #[must_use]
    pub fn over(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    /// Check operand shape and value-type constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let value_type = self.field.value_type();
        let out_of_range = |reason| ValidationError::ValueOutOfRange {
            field: self.field,
            reason,
        };

        match (self.operator, self.value) {
            (Operator::Between, ConditionValue::Range(low, high)) => {
                self.ensure_finite(&[low, high])?;
                if low > high {
                    return Err(ValidationError::InvertedRange { low, high });
                }
                value_type.check_absolute(low).map_err(out_of_range)?;
                value_type.check_absolute(high).map_err(out_of_range)?;
            }
            (Operator::Between, ConditionValue::Scalar(_)) => {
                return Err(ValidationError::OperandMismatch {
                    operator: self.operator,
                    expected: "a [low, high] pair",
                });
            }
            (operator, ConditionValue::Range(..)) => {
                return Err(ValidationError::OperandMismatch {
                    operator,
                    expected: "a single value",
                });
            }
            (operator, ConditionValue::Scalar(threshold)) if operator.is_change() => {
                self.ensure_finite(&[threshold])?;
                if self.window.is_none() {
                    return Err(ValidationError::MissingWindow { operator });
                }
                value_type.check_delta(threshold).map_err(out_of_range)?;
            }
            (_, ConditionValue::Scalar(threshold)) => {
                self.ensure_finite(&[threshold])?;
                value_type.check_absolute(threshold).map_err(out_of_range)?;
            }
        }
        Ok(())
    }

    fn ensure_finite(&self, values: &[f64]) -> Result<(), ValidationError> {
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(ValidationError::NonFiniteValue { field: self.field })
        }
    }

    /// Key of the current value this condition reads.
    #[must_use]
    pub fn reading_key(&self) -> MetricKey {
        MetricKey {
            field: self.field,
            window: if self.operator.is_change() {
                None
            } else {
                self.window
            },
        }
    }

    /// Key of the baseline this condition reads, for `change_*` operators.
    #[must_use]
    pub fn baseline_key(&self) -> Option<BaselineKey> {
        match (self.operator.is_change(), self.window) {
            (true, Some(window)) => Some(BaselineKey {
                field: self.field,
                window,
            }),
            _ => None,
        }
    }

    /// Evaluate against a snapshot. Missing readings yield `false`.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> bool {
        let Some(current) = snapshot.current(self.reading_key()) else {
            return false;
        };

        match (self.operator, self.value) {
            (Operator::Between, ConditionValue::Range(low, high)) => {
                low <= current && current <= high
            }
            (Operator::ChangeGt | Operator::ChangeLt, ConditionValue::Scalar(threshold)) => {
                let Some(baseline) = self.baseline_key().and_then(|k| snapshot.baseline(k))
                else {
                    return false;
                };
                let delta = current - baseline;
                if self.operator == Operator::ChangeGt {
                    delta > threshold
                } else {
                    delta < threshold
                }
            }
            (Operator::Gt, ConditionValue::Scalar(t)) => current > t,
            (Operator::Gte, ConditionValue::Scalar(t)) => current >= t,
            (Operator::Lt, ConditionValue::Scalar(t)) => current < t,
            (Operator::Lte, ConditionValue::Scalar(t)) => current <= t,
            (Operator::Eq, ConditionValue::Scalar(t)) => (current - t).abs() <= EQ_TOLERANCE,
            (Operator::Neq, ConditionValue::Scalar(t)) => (current - t).abs() > EQ_TOLERANCE,
            // Shape mismatches are rejected by `validate` before a rule is saved.
            _ => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            ConditionValue::Scalar(v) => write!(f, "{} {} {v}", self.field, self.operator)?,
            ConditionValue::Range(low, high) => {
                write!(f, "{} {} [{low}, {high}]", self.field, self.operator)?;
            }
        }
        if let Some(window) = self.window {
            write!(f, " over {window}")?;
        }
        Ok(())
    }
}

/// Boolean combinator for groups and expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    /// Fold results: `And` is all-true (empty → `true`), `Or` is
    /// any-true (empty → `false`). Short-circuits.
    pub fn fold(self, results: impl IntoIterator<Item = bool>) -> bool {
        let mut results = results.into_iter();
        match self {
            Self::And => results.all(|r| r),
            Self::Or => results.any(|r| r),
        }
    }
}

/// A logic-combined set of conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub logic: LogicOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    #[must_use]
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            logic: LogicOperator::And,
            conditions,
        }
    }

    #[must_use]
    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            logic: LogicOperator::Or,
            conditions,
        }
    }

    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> bool {
        self.logic
            .fold(self.conditions.iter().map(|c| c.evaluate(snapshot)))
    }
}

/// Root of a rule's condition tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionExpression {
    /// Combines the groups' results.
    #[serde(default)]
    pub logic: LogicOperator,
    #[serde(default)]
    pub groups: Vec<ConditionGroup>,
}

impl ConditionExpression {
    #[must_use]
    pub fn all(groups: Vec<ConditionGroup>) -> Self {
        Self {
            logic: LogicOperator::And,
            groups,
        }
    }

    #[must_use]
    pub fn any(groups: Vec<ConditionGroup>) -> Self {
        Self {
            logic: LogicOperator::Or,
            groups,
        }
    }

    /// Validate every condition in the tree.
    ///
    /// # Errors
    ///
    /// Returns the first condition's [`ValidationError`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.conditions().try_for_each(Condition::validate)
    }

    /// Evaluate the whole tree against a snapshot. Side-effect free.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> bool {
        self.logic
            .fold(self.groups.iter().map(|g| g.evaluate(snapshot)))
    }

    /// Iterate every condition in declaration order.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.groups.iter().flat_map(|g| g.conditions.iter())
    }

    /// Deduplicated current-value keys the tree reads.
    #[must_use]
    pub fn reading_keys(&self) -> Vec<MetricKey> {
        let mut seen = HashSet::new();
        self.conditions()
            .map(Condition::reading_key)
            .filter(|k| seen.insert(*k))
            .collect()
    }

    /// Deduplicated baseline keys the tree reads.
    #[must_use]
    pub fn baseline_keys(&self) -> Vec<BaselineKey> {
        let mut seen = HashSet::new();
        self.conditions()
            .filter_map(Condition::baseline_key)
            .filter(|k| seen.insert(*k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roas_lt_2() -> Condition {
        Condition::new(MetricField::Roas, Operator::Lt, 2.0)
    }

    fn spend_gt_100() -> Condition {
        Condition::new(MetricField::Spend, Operator::Gt, 100.0)
    }

    fn snapshot(roas: f64, spend: f64) -> MetricSnapshot {
        MetricSnapshot::new()
            .with_value(MetricField::Roas, roas)
            .with_value(MetricField::Spend, spend)
    }

    #[test]
    fn should_trigger_when_both_groups_true_under_and() {
        let expr = ConditionExpression::all(vec![
            ConditionGroup::all(vec![roas_lt_2()]),
            ConditionGroup::all(vec![spend_gt_100()]),
        ]);
        assert!(expr.evaluate(&snapshot(1.8, 150.0)));
        assert!(!expr.evaluate(&snapshot(3.0, 150.0)));
    }

    #[test]
    fn should_trigger_when_one_group_true_under_or() {
        let expr = ConditionExpression::any(vec![
            ConditionGroup::all(vec![roas_lt_2()]),
            ConditionGroup::all(vec![spend_gt_100()]),
        ]);
        assert!(expr.evaluate(&snapshot(3.0, 150.0)));
        assert!(!expr.evaluate(&snapshot(3.0, 50.0)));
    }

    #[test]
    fn should_fold_each_group_with_its_own_logic() {
        let expr = ConditionExpression::all(vec![ConditionGroup::any(vec![
            roas_lt_2(),
            spend_gt_100(),
        ])]);
        assert!(expr.evaluate(&snapshot(3.0, 150.0)));
    }

    #[test]
    fn should_include_both_bounds_when_operator_is_between() {
        let c = Condition::new(MetricField::Ctr, Operator::Between, (1.0, 5.0));
        let at = |v| MetricSnapshot::new().with_value(MetricField::Ctr, v);
        assert!(c.evaluate(&at(5.0)));
        assert!(c.evaluate(&at(1.0)));
        assert!(!c.evaluate(&at(5.01)));
        assert!(!c.evaluate(&at(0.99)));
    }

    #[test]
    fn should_fold_empty_group_to_identity_of_its_operator() {
        let s = MetricSnapshot::new();
        assert!(ConditionGroup::all(vec![]).evaluate(&s));
        assert!(!ConditionGroup::any(vec![]).evaluate(&s));
        assert!(ConditionExpression::all(vec![]).evaluate(&s));
        assert!(!ConditionExpression::any(vec![]).evaluate(&s));
    }

    #[test]
    fn should_evaluate_false_when_reading_is_missing() {
        let c = Condition::new(MetricField::Cpa, Operator::Lt, 1000.0);
        assert!(!c.evaluate(&MetricSnapshot::new()));
        let neq = Condition::new(MetricField::Cpa, Operator::Neq, 5.0);
        assert!(!neq.evaluate(&MetricSnapshot::new()));
    }

    #[test]
    fn should_compare_delta_against_baseline_when_operator_is_change() {
        let c = Condition::new(MetricField::Spend, Operator::ChangeGt, 50.0).over(Window::hours(24));
        let s = MetricSnapshot::new()
            .with_value(MetricField::Spend, 200.0)
            .with_baseline(MetricField::Spend, Window::hours(24), 120.0);
        assert!(c.evaluate(&s));

        let drop = Condition::new(MetricField::Spend, Operator::ChangeLt, -50.0)
            .over(Window::hours(24));
        assert!(!drop.evaluate(&s));
    }

    #[test]
    fn should_evaluate_false_when_baseline_is_missing() {
        let c = Condition::new(MetricField::Spend, Operator::ChangeGt, 0.0).over(Window::days(7));
        let s = MetricSnapshot::new().with_value(MetricField::Spend, 200.0);
        assert!(!c.evaluate(&s));
    }

    #[test]
    fn should_read_windowed_value_when_absolute_condition_has_window() {
        let c = Condition::new(MetricField::Spend, Operator::Gt, 500.0).over(Window::days(7));
        let s = MetricSnapshot::new()
            .with_value(MetricField::Spend, 100.0)
            .with_windowed_value(MetricField::Spend, Window::days(7), 900.0);
        assert!(c.evaluate(&s));
    }

    #[test]
    fn should_compare_equality_with_tolerance() {
        let c = Condition::new(MetricField::Roas, Operator::Eq, 0.3);
        let s = MetricSnapshot::new().with_value(MetricField::Roas, 0.1 + 0.2);
        assert!(c.evaluate(&s));
    }

    #[test]
    fn should_reject_scalar_when_operator_is_between() {
        let c = Condition::new(MetricField::Ctr, Operator::Between, 3.0);
        assert!(matches!(
            c.validate(),
            Err(ValidationError::OperandMismatch { .. })
        ));
    }

    #[test]
    fn should_reject_pair_when_operator_is_scalar() {
        let c = Condition::new(MetricField::Ctr, Operator::Gt, (1.0, 2.0));
        assert!(matches!(
            c.validate(),
            Err(ValidationError::OperandMismatch {
                operator: Operator::Gt,
                ..
            })
        ));
    }

    #[test]
    fn should_reject_change_operator_without_window() {
        let c = Condition::new(MetricField::Spend, Operator::ChangeLt, -10.0);
        assert_eq!(
            c.validate(),
            Err(ValidationError::MissingWindow {
                operator: Operator::ChangeLt
            })
        );
    }

    #[test]
    fn should_reject_inverted_range() {
        let c = Condition::new(MetricField::Ctr, Operator::Between, (5.0, 1.0));
        assert!(matches!(
            c.validate(),
            Err(ValidationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn should_reject_value_type_mismatch() {
        let pct = Condition::new(MetricField::Ctr, Operator::Gt, 150.0);
        assert!(matches!(
            pct.validate(),
            Err(ValidationError::ValueOutOfRange { .. })
        ));
        let money = Condition::new(MetricField::Cpa, Operator::Lt, -5.0);
        assert!(money.validate().is_err());
    }

    #[test]
    fn should_reject_non_finite_operand() {
        let c = Condition::new(MetricField::Roas, Operator::Gt, f64::NAN);
        assert_eq!(
            c.validate(),
            Err(ValidationError::NonFiniteValue {
                field: MetricField::Roas
            })
        );
    }

    #[test]
    fn should_collect_deduplicated_keys() {
        let expr = ConditionExpression::all(vec![
            ConditionGroup::all(vec![roas_lt_2(), roas_lt_2()]),
            ConditionGroup::all(vec![
                Condition::new(MetricField::Spend, Operator::ChangeGt, 10.0)
                    .over(Window::hours(24)),
            ]),
        ]);
        assert_eq!(expr.reading_keys().len(), 2);
        assert_eq!(expr.baseline_keys().len(), 1);
    }

    #[test]
    fn should_deserialize_expression_from_json() {
        let json = serde_json::json!({
            "logic": "or",
            "groups": [{
                "logic": "and",
                "conditions": [
                    {"field": "ctr", "operator": "between", "value": [1.0, 5.0]},
                    {"field": "spend", "operator": "change_gt", "value": 20.0, "window": "24h"}
                ]
            }]
        });
        let expr: ConditionExpression = serde_json::from_value(json).unwrap();
        assert_eq!(expr.logic, LogicOperator::Or);
        assert_eq!(
            expr.groups[0].conditions[0].value,
            ConditionValue::Range(1.0, 5.0)
        );
        assert_eq!(expr.groups[0].conditions[1].window, Some(Window::hours(24)));
        assert!(expr.validate().is_ok());
    }

    #[test]
    fn should_display_condition_with_window() {
        let c = Condition::new(MetricField::Spend, Operator::ChangeGt, 20.0).over(Window::hours(24));
        assert_eq!(c.to_string(), "spend change_gt 20 over 24h");
    }
}
