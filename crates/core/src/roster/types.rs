use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::Entity;

/// A scheduled event that needs staffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Server-assigned numeric identifier.
    pub key: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: NaiveDate,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    /// Keys of the positions this event needs filled.
    pub positions: Vec<String>,
}

impl Event {
    /// Creates an all-day event on `date`.
    pub fn new(key: i64, title: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            key,
            title: title.into(),
            description: None,
            location: None,
            date,
            start: None,
            end: None,
            positions: Vec::new(),
        }
    }

    /// Sets the start and end times.
    pub fn with_times(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a position that must be staffed.
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.positions.push(position.into());
        self
    }

    /// Returns true if the event has no specific times.
    pub fn is_all_day(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

impl Entity for Event {
    type Key = i64;
    const COLLECTION: &'static str = "events";

    fn key(&self) -> i64 {
        self.key
    }
}

/// A person on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub key: Uuid,
    pub name: String,
    pub email: String,
    /// Keys of the qualifications this person holds.
    pub qualifications: Vec<String>,
    pub active: bool,
}

impl User {
    /// Creates a new active user with a fresh key.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            key: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            qualifications: Vec::new(),
            active: true,
        }
    }

    /// Sets a specific key for this user (useful for testing).
    pub fn with_key(mut self, key: Uuid) -> Self {
        self.key = key;
        self
    }

    /// Grants a qualification.
    pub fn with_qualification(mut self, qualification: impl Into<String>) -> Self {
        self.qualifications.push(qualification.into());
        self
    }

    /// Returns true if the user holds every qualification the position requires.
    pub fn can_fill(&self, position: &Position) -> bool {
        position
            .required_qualifications
            .iter()
            .all(|required| self.qualifications.contains(required))
    }
}

impl Entity for User {
    type Key = Uuid;
    const COLLECTION: &'static str = "users";

    fn key(&self) -> Uuid {
        self.key
    }
}

/// A role that can be staffed at an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub key: String,
    pub name: String,
    pub required_qualifications: Vec<String>,
}

impl Position {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            required_qualifications: Vec::new(),
        }
    }

    pub fn requiring(mut self, qualification: impl Into<String>) -> Self {
        self.required_qualifications.push(qualification.into());
        self
    }
}

impl Entity for Position {
    type Key = String;
    const COLLECTION: &'static str = "positions";

    fn key(&self) -> String {
        self.key.clone()
    }
}

/// A certification a person can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    /// Short code, e.g. "EMT".
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

impl Qualification {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: None,
        }
    }
}

impl Entity for Qualification {
    type Key = String;
    const COLLECTION: &'static str = "qualifications";

    fn key(&self) -> String {
        self.key.clone()
    }
}
