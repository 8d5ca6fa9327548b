//! Badge catalog, rule table and awarding service.

mod engine;
mod model;
mod rules;

pub use engine::{BadgeEngine, InstructorAward};
pub use model::{
    AwardOrigin, AwardOutcome, Badge, BadgeDefinition, BadgeScope, BadgeType, CANONICAL_BADGES,
    NewStudentBadge, ParseBadgeTypeError, StudentBadge,
};
pub use rules::{BadgeGrant, BadgeTrigger, rules_for};
