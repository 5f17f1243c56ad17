//! Validation of activity data.
//!
//! Validation failures are caller-recoverable: the caller rejects the
//! offending update and keeps the prior state. Each failure carries a stable
//! numeric code and ordered substitution arguments so hosts can render their
//! own messages.
//!
//! Detects:
//! - Non-positive people counts
//! - Negative quantities and spans
//! - Incremental quantities that overflow
//! - Finish dates on unfinished activities
//! - Lock indices past the operation's requirement list
//! - Duplicate activity IDs

use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;

use crate::models::{
    ActivityId, InternalActivity, OperationContext, ProductionStatus, Stage, TimeSpan,
};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Stable numeric code.
    pub code: u32,
    /// Substitution arguments, in message order.
    pub args: Vec<String>,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// People count must be positive.
    NonPositivePeopleCount,
    /// Status is not allowed on an omitted operation.
    OmittedOperationStatus,
    /// A quantity is negative.
    NegativeQuantity,
    /// A lock index is outside the requirement list.
    LockIndexOutOfRange,
    /// A finish date is set on an unfinished activity.
    FinishDateWithoutFinish,
    /// A dynamic buffer is negative.
    InvalidDynamicBuffer,
    /// Two activities share an ID.
    DuplicateId,
    /// Split quantity must be strictly between zero and the required quantity.
    SplitQuantityOutOfRange,
    /// The activity was not produced by a split.
    NotASplit,
    /// An incremental quantity does not fit in a decimal.
    QuantityOverflow,
    /// A reported stage span is negative.
    NegativeSpan,
}

/// Stable error codes.
pub mod codes {
    /// [`ValidationErrorKind::NonPositivePeopleCount`](super::ValidationErrorKind::NonPositivePeopleCount)
    pub const NON_POSITIVE_PEOPLE_COUNT: u32 = 2001;
    /// [`ValidationErrorKind::OmittedOperationStatus`](super::ValidationErrorKind::OmittedOperationStatus)
    pub const OMITTED_OPERATION_STATUS: u32 = 2002;
    /// [`ValidationErrorKind::NegativeQuantity`](super::ValidationErrorKind::NegativeQuantity)
    pub const NEGATIVE_QUANTITY: u32 = 2003;
    /// [`ValidationErrorKind::LockIndexOutOfRange`](super::ValidationErrorKind::LockIndexOutOfRange)
    pub const LOCK_INDEX_OUT_OF_RANGE: u32 = 2004;
    /// [`ValidationErrorKind::FinishDateWithoutFinish`](super::ValidationErrorKind::FinishDateWithoutFinish)
    pub const FINISH_DATE_WITHOUT_FINISH: u32 = 2005;
    /// [`ValidationErrorKind::InvalidDynamicBuffer`](super::ValidationErrorKind::InvalidDynamicBuffer)
    pub const INVALID_DYNAMIC_BUFFER: u32 = 2006;
    /// [`ValidationErrorKind::DuplicateId`](super::ValidationErrorKind::DuplicateId)
    pub const DUPLICATE_ID: u32 = 2007;
    /// [`ValidationErrorKind::SplitQuantityOutOfRange`](super::ValidationErrorKind::SplitQuantityOutOfRange)
    pub const SPLIT_QUANTITY_OUT_OF_RANGE: u32 = 2008;
    /// [`ValidationErrorKind::NotASplit`](super::ValidationErrorKind::NotASplit)
    pub const NOT_A_SPLIT: u32 = 2009;
    /// [`ValidationErrorKind::QuantityOverflow`](super::ValidationErrorKind::QuantityOverflow)
    pub const QUANTITY_OVERFLOW: u32 = 2010;
    /// [`ValidationErrorKind::NegativeSpan`](super::ValidationErrorKind::NegativeSpan)
    pub const NEGATIVE_SPAN: u32 = 2011;
}

impl ValidationErrorKind {
    /// Stable code for this kind.
    pub fn code(self) -> u32 {
        match self {
            Self::NonPositivePeopleCount => codes::NON_POSITIVE_PEOPLE_COUNT,
            Self::OmittedOperationStatus => codes::OMITTED_OPERATION_STATUS,
            Self::NegativeQuantity => codes::NEGATIVE_QUANTITY,
            Self::LockIndexOutOfRange => codes::LOCK_INDEX_OUT_OF_RANGE,
            Self::FinishDateWithoutFinish => codes::FINISH_DATE_WITHOUT_FINISH,
            Self::InvalidDynamicBuffer => codes::INVALID_DYNAMIC_BUFFER,
            Self::DuplicateId => codes::DUPLICATE_ID,
            Self::SplitQuantityOutOfRange => codes::SPLIT_QUANTITY_OUT_OF_RANGE,
            Self::NotASplit => codes::NOT_A_SPLIT,
            Self::QuantityOverflow => codes::QUANTITY_OVERFLOW,
            Self::NegativeSpan => codes::NEGATIVE_SPAN,
        }
    }
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, args: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code(),
            args,
            message: message.into(),
        }
    }

    /// People count must be positive.
    pub fn non_positive_people_count(activity: ActivityId, count: Decimal) -> Self {
        Self::new(
            ValidationErrorKind::NonPositivePeopleCount,
            vec![activity.to_string(), count.to_string()],
            format!("Activity {activity}: people count must be positive, got {count}"),
        )
    }

    /// Status not allowed on an omitted operation.
    pub fn omitted_operation_status(activity: ActivityId, status: ProductionStatus) -> Self {
        Self::new(
            ValidationErrorKind::OmittedOperationStatus,
            vec![activity.to_string(), status.to_string()],
            format!(
                "Activity {activity}: status {status} is not allowed on an omitted operation"
            ),
        )
    }

    /// A quantity field is negative.
    pub fn negative_quantity(activity: ActivityId, field: &str, qty: Decimal) -> Self {
        Self::new(
            ValidationErrorKind::NegativeQuantity,
            vec![activity.to_string(), field.to_string(), qty.to_string()],
            format!("Activity {activity}: {field} must not be negative, got {qty}"),
        )
    }

    /// Lock index outside the requirement list.
    pub fn lock_index_out_of_range(activity: ActivityId, index: usize, count: usize) -> Self {
        Self::new(
            ValidationErrorKind::LockIndexOutOfRange,
            vec![activity.to_string(), index.to_string(), count.to_string()],
            format!(
                "Activity {activity}: lock index {index} is outside {count} resource requirements"
            ),
        )
    }

    /// Finish date on an unfinished activity.
    pub fn finish_date_without_finish(activity: ActivityId, status: ProductionStatus) -> Self {
        Self::new(
            ValidationErrorKind::FinishDateWithoutFinish,
            vec![activity.to_string(), status.to_string()],
            format!("Activity {activity}: finish date set while status is {status}"),
        )
    }

    /// Negative dynamic buffer.
    pub fn invalid_dynamic_buffer(span: TimeSpan) -> Self {
        Self::new(
            ValidationErrorKind::InvalidDynamicBuffer,
            vec![span.ticks().to_string()],
            format!("Dynamic buffer must not be negative, got {} ticks", span.ticks()),
        )
    }

    /// Duplicate activity ID.
    pub fn duplicate_id(activity: ActivityId) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateId,
            vec![activity.to_string()],
            format!("Duplicate activity ID: {activity}"),
        )
    }

    /// Split quantity not strictly inside `(0, required)`.
    pub fn split_quantity_out_of_range(
        activity: ActivityId,
        qty: Decimal,
        required: Decimal,
    ) -> Self {
        Self::new(
            ValidationErrorKind::SplitQuantityOutOfRange,
            vec![activity.to_string(), qty.to_string(), required.to_string()],
            format!(
                "Activity {activity}: split quantity {qty} must be between 0 and {required} exclusive"
            ),
        )
    }

    /// Activity has no split group.
    pub fn not_a_split(activity: ActivityId) -> Self {
        Self::new(
            ValidationErrorKind::NotASplit,
            vec![activity.to_string()],
            format!("Activity {activity} was not produced by a split"),
        )
    }

    /// Adding an incremental quantity overflowed.
    pub fn quantity_overflow(
        activity: ActivityId,
        field: &str,
        current: Decimal,
        delta: Decimal,
    ) -> Self {
        Self::new(
            ValidationErrorKind::QuantityOverflow,
            vec![
                activity.to_string(),
                field.to_string(),
                current.to_string(),
                delta.to_string(),
            ],
            format!("Activity {activity}: {field} {current} + {delta} overflows"),
        )
    }

    /// A reported stage span is negative.
    pub fn negative_span(activity: ActivityId, stage: Stage, span: TimeSpan) -> Self {
        Self::new(
            ValidationErrorKind::NegativeSpan,
            vec![activity.to_string(), stage.to_string(), span.ticks().to_string()],
            format!(
                "Activity {activity}: reported {stage} time must not be negative, got {} ticks",
                span.ticks()
            ),
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Checks one activity's integrity against its operation.
///
/// Checks:
/// 1. Required, good and scrap quantities are non-negative
/// 2. No finish date unless finished
/// 3. Every lock index is inside the requirement list
/// 4. People count is positive
/// 5. Dynamic buffers are non-negative
/// 6. Reported stage spans are non-negative
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_activity(
    activity: &InternalActivity,
    operation: &OperationContext,
) -> ValidationResult {
    let mut errors = Vec::new();
    let id = activity.id();
    let base = &activity.base;

    for (field, qty) in [
        ("required finish qty", base.required_finish_qty()),
        ("reported good qty", base.reported_good_qty),
        ("reported scrap qty", base.reported_scrap_qty),
    ] {
        if qty < Decimal::ZERO {
            errors.push(ValidationError::negative_quantity(id, field, qty));
        }
    }

    let status = activity.stored_production_status();
    if status < ProductionStatus::Finished && base.reported_finish_date().is_set() {
        errors.push(ValidationError::finish_date_without_finish(id, status));
    }

    for (index, _) in activity.resource_locks().iter() {
        if index >= operation.resource_requirement_count {
            errors.push(ValidationError::lock_index_out_of_range(
                id,
                index,
                operation.resource_requirement_count,
            ));
        }
    }

    if activity.nbr_of_people() <= Decimal::ZERO {
        errors.push(ValidationError::non_positive_people_count(
            id,
            activity.nbr_of_people(),
        ));
    }

    for (_, info) in activity.buffer().resources() {
        if let Some(span) = info.dynamic_buffer() {
            if span.is_negative() {
                errors.push(ValidationError::invalid_dynamic_buffer(span));
            }
        }
    }

    for stage in Stage::ALL {
        let span = activity.reported.span(stage);
        if span.is_negative() {
            errors.push(ValidationError::negative_span(id, stage, span));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that activity IDs are unique.
pub fn validate_activities<'a>(
    activities: impl IntoIterator<Item = &'a InternalActivity>,
) -> ValidationResult {
    let mut seen = HashSet::new();
    let errors: Vec<_> = activities
        .into_iter()
        .filter(|a| !seen.insert(a.id()))
        .map(|a| ValidationError::duplicate_id(a.id()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
