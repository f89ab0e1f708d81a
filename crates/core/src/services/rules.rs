//! Inputs and guards shared by vote polls and rank polls.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use toggo_common::{AppError, AppResult, IdGenerator, deadline_passed};
use toggo_db::entities::{poll, poll_option::OptionType};
use toggo_db::repositories::{NewPollOption, PollPatch};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::access::TripRole;

/// Input for one poll option.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_option_reference"))]
pub struct CreateOptionInput {
    pub option_type: OptionType,
    #[validate(length(min = 1, max = 64))]
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

fn validate_option_reference(input: &CreateOptionInput) -> Result<(), ValidationError> {
    match input.option_type {
        OptionType::Entity if input.entity_type.is_none() || input.entity_id.is_none() => {
            Err(ValidationError::new("entity_reference_required"))
        }
        OptionType::Custom if input.entity_type.is_some() || input.entity_id.is_some() => {
            Err(ValidationError::new("entity_reference_not_allowed"))
        }
        _ => Ok(()),
    }
}

impl CreateOptionInput {
    pub(crate) fn into_new_option(self, id_gen: &IdGenerator) -> NewPollOption {
        NewPollOption {
            id: id_gen.generate(),
            option_type: self.option_type,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            name: self.name,
        }
    }
}

/// Input for updating a poll's question and/or deadline.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePollInput {
    #[validate(length(min = 1, max = 500))]
    pub question: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

impl UpdatePollInput {
    pub(crate) fn into_patch(self) -> PollPatch {
        PollPatch {
            question: self.question,
            deadline: self.deadline,
        }
    }
}

/// Polls addressed through a trip they do not belong to do not exist.
pub(crate) fn ensure_in_trip(poll: &poll::Model, trip_id: Uuid) -> AppResult<()> {
    if poll.trip_id != trip_id {
        return Err(AppError::NotFound(format!("Poll not found: {}", poll.id)));
    }
    Ok(())
}

/// Reject mutations strictly after the deadline.
pub(crate) fn ensure_open(poll: &poll::Model, now: DateTime<Utc>) -> AppResult<()> {
    if deadline_passed(poll.deadline.map(|d| d.with_timezone(&Utc)), now) {
        return Err(AppError::DeadlinePassed);
    }
    Ok(())
}

/// A deadline being set must lie in the future.
pub(crate) fn ensure_future_deadline(
    deadline: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    match deadline {
        Some(d) if d <= now => Err(AppError::BadRequest(
            "deadline must be in the future".to_string(),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn ensure_creator(poll: &poll::Model, user_id: Uuid, action: &str) -> AppResult<()> {
    if poll.created_by != user_id {
        return Err(AppError::Forbidden(format!(
            "only the poll creator can {action}"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_creator_or_admin(
    poll: &poll::Model,
    user_id: Uuid,
    role: TripRole,
) -> AppResult<()> {
    if poll.created_by != user_id && !role.is_admin() {
        return Err(AppError::Forbidden(
            "only the poll creator or a trip admin can delete this poll".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll_with_deadline(deadline: Option<DateTime<Utc>>) -> poll::Model {
        let now = Utc::now().fixed_offset();
        poll::Model {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            question: "When do we leave?".to_string(),
            poll_type: poll::PollType::Single,
            deadline: deadline.map(|d| d.fixed_offset()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_option_reference_rules() {
        let custom = CreateOptionInput {
            option_type: OptionType::Custom,
            entity_type: None,
            entity_id: None,
            name: "Lisbon".to_string(),
        };
        assert!(custom.validate().is_ok());

        let dangling = CreateOptionInput {
            option_type: OptionType::Entity,
            entity_type: Some("activity".to_string()),
            entity_id: None,
            name: "Surf lesson".to_string(),
        };
        assert!(dangling.validate().is_err());

        let entity = CreateOptionInput {
            entity_id: Some(Uuid::new_v4()),
            ..dangling
        };
        assert!(entity.validate().is_ok());

        let empty_name = CreateOptionInput {
            name: String::new(),
            ..custom
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_deadline_boundaries() {
        let now = Utc::now();
        let at_deadline = poll_with_deadline(Some(now));
        assert!(ensure_open(&at_deadline, now).is_ok());
        assert!(matches!(
            ensure_open(&at_deadline, now + Duration::seconds(1)),
            Err(AppError::DeadlinePassed)
        ));
        assert!(ensure_open(&poll_with_deadline(None), now).is_ok());

        assert!(ensure_future_deadline(None, now).is_ok());
        assert!(ensure_future_deadline(Some(now + Duration::minutes(1)), now).is_ok());
        assert!(matches!(
            ensure_future_deadline(Some(now), now),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_permission_guards() {
        let poll = poll_with_deadline(None);
        let stranger = Uuid::new_v4();

        assert!(ensure_creator(&poll, poll.created_by, "edit").is_ok());
        assert!(matches!(
            ensure_creator(&poll, stranger, "edit"),
            Err(AppError::Forbidden(_))
        ));
        assert!(ensure_creator_or_admin(&poll, stranger, TripRole::Admin).is_ok());
        assert!(ensure_creator_or_admin(&poll, poll.created_by, TripRole::Member).is_ok());
        assert!(matches!(
            ensure_creator_or_admin(&poll, stranger, TripRole::Member),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_in_trip(&poll, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
    }
}
