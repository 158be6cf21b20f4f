//! # Interview Records
//!
//! Typed shapes for everything the store persists. Rows are validated into these
//! types at the storage boundary, so the rest of the service never sees a
//! half-populated interview or message.
//!
//! ## Lifecycle:
//! - **Interview**: `created → in_progress → completed | cancelled`, forward only
//! - **Message**: immutable once written, ordered by insertion

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles a candidate can be interviewed for.
///
/// Serialized exactly as the variant name (`"SystemArchitect"`), which is also
/// the form stored in the `title` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterviewTitle {
    JuniorDeveloper,
    SeniorDeveloper,
    FullStackDeveloper,
    FrontendDeveloper,
    BackendDeveloper,
    SystemArchitect,
    DevOpsEngineer,
    DataScientist,
    MachineLearningEngineer,
    ProductManager,
    QAEngineer,
    MobileDeveloper,
    SecurityEngineer,
    TechnicalLead,
}

impl InterviewTitle {
    pub const ALL: [InterviewTitle; 14] = [
        InterviewTitle::JuniorDeveloper,
        InterviewTitle::SeniorDeveloper,
        InterviewTitle::FullStackDeveloper,
        InterviewTitle::FrontendDeveloper,
        InterviewTitle::BackendDeveloper,
        InterviewTitle::SystemArchitect,
        InterviewTitle::DevOpsEngineer,
        InterviewTitle::DataScientist,
        InterviewTitle::MachineLearningEngineer,
        InterviewTitle::ProductManager,
        InterviewTitle::QAEngineer,
        InterviewTitle::MobileDeveloper,
        InterviewTitle::SecurityEngineer,
        InterviewTitle::TechnicalLead,
    ];

    /// Stable identifier used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewTitle::JuniorDeveloper => "JuniorDeveloper",
            InterviewTitle::SeniorDeveloper => "SeniorDeveloper",
            InterviewTitle::FullStackDeveloper => "FullStackDeveloper",
            InterviewTitle::FrontendDeveloper => "FrontendDeveloper",
            InterviewTitle::BackendDeveloper => "BackendDeveloper",
            InterviewTitle::SystemArchitect => "SystemArchitect",
            InterviewTitle::DevOpsEngineer => "DevOpsEngineer",
            InterviewTitle::DataScientist => "DataScientist",
            InterviewTitle::MachineLearningEngineer => "MachineLearningEngineer",
            InterviewTitle::ProductManager => "ProductManager",
            InterviewTitle::QAEngineer => "QAEngineer",
            InterviewTitle::MobileDeveloper => "MobileDeveloper",
            InterviewTitle::SecurityEngineer => "SecurityEngineer",
            InterviewTitle::TechnicalLead => "TechnicalLead",
        }
    }

    /// Human-readable form used when talking to the language model.
    pub fn display_name(&self) -> &'static str {
        match self {
            InterviewTitle::JuniorDeveloper => "Junior Developer",
            InterviewTitle::SeniorDeveloper => "Senior Developer",
            InterviewTitle::FullStackDeveloper => "Full Stack Developer",
            InterviewTitle::FrontendDeveloper => "Frontend Developer",
            InterviewTitle::BackendDeveloper => "Backend Developer",
            InterviewTitle::SystemArchitect => "System Architect",
            InterviewTitle::DevOpsEngineer => "DevOps Engineer",
            InterviewTitle::DataScientist => "Data Scientist",
            InterviewTitle::MachineLearningEngineer => "Machine Learning Engineer",
            InterviewTitle::ProductManager => "Product Manager",
            InterviewTitle::QAEngineer => "QA Engineer",
            InterviewTitle::MobileDeveloper => "Mobile Developer",
            InterviewTitle::SecurityEngineer => "Security Engineer",
            InterviewTitle::TechnicalLead => "Technical Lead",
        }
    }
}

impl fmt::Display for InterviewTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewTitle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        InterviewTitle::ALL
            .iter()
            .copied()
            .find(|title| title.as_str() == trimmed)
            .ok_or_else(|| format!("Unknown interview title: {}", s))
    }
}

/// Lifecycle status of an interview.
///
/// ## Ordering:
/// Status only ever moves forward. `completed` and `cancelled` are terminal and
/// share the same rank, so neither can follow the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Created,
    InProgress,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Created => "created",
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the value stored in the `status` column. Unknown values are `None`
    /// so the caller can report them as a data-integrity failure.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "created" => Some(InterviewStatus::Created),
            "in_progress" => Some(InterviewStatus::InProgress),
            "completed" => Some(InterviewStatus::Completed),
            "cancelled" => Some(InterviewStatus::Cancelled),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            InterviewStatus::Created => 0,
            InterviewStatus::InProgress => 1,
            InterviewStatus::Completed | InterviewStatus::Cancelled => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Whether moving from `self` to `next` is a forward step.
    pub fn can_transition_to(&self, next: InterviewStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InterviewStatus::from_db(s.trim()).ok_or_else(|| format!("Unknown interview status: {}", s))
    }
}

/// Who authored a message. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interview metadata without its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub title: InterviewTitle,
    /// Ordered, non-empty, no duplicates
    pub skills: Vec<String>,
    pub status: InterviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single persisted utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub interview_id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Interview joined with its full message history in creation order.
///
/// Serializes flat: the interview fields plus a `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewWithMessages {
    #[serde(flatten)]
    pub interview: Interview,
    pub messages: Vec<Message>,
}

/// Trim skill tags, drop exact duplicates (first occurrence wins) and reject an
/// empty or blank list.
pub fn normalize_skills<I, S>(skills: I) -> Result<Vec<String>, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for skill in skills {
        let trimmed = skill.as_ref().trim();
        if trimmed.is_empty() {
            return Err("Skill tags cannot be blank".to_string());
        }
        if !normalized.iter().any(|existing| existing == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }

    if normalized.is_empty() {
        return Err("At least one skill is required".to_string());
    }

    Ok(normalized)
}
