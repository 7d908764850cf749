//! # Domain Events
//!
//! Logical events emitted after canonical state transitions. Delivery
//! transport (websocket broadcast, notification fan-out) lives with the
//! consuming collaborator; the subsystem only guarantees emission.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContentRef, ReactionCounts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A question, answer, or solution was created.
    ContentCreated { content: ContentRef },

    /// An answer's acceptance flag changed. `accepted` is the new state.
    AnswerAccepted {
        answer_id: Uuid,
        question_id: Uuid,
        accepted: bool,
    },

    /// A reaction toggle settled; carries the fresh totals.
    ReactionChanged {
        content: ContentRef,
        counts: ReactionCounts,
    },
}
