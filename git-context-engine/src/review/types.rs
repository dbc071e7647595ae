//! Review-level data model: normalized comments and the review record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Finding category with a closed set of values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Bug,
    Security,
    Performance,
    Style,
    BestPractice,
    Other,
}

impl Category {
    /// Case- and accent-insensitive lookup; unknown labels map to `Other`.
    pub fn from_label(raw: &str) -> Self {
        match fold_label(raw).as_str() {
            "bug" | "bugs" | "error" | "errors" | "correctness" | "logic" | "bogue" | "erreur"
            | "anomalie" => Category::Bug,
            "security" | "securite" | "vulnerability" | "vulnerabilite" | "faille" => {
                Category::Security
            }
            "performance" | "perf" | "performances" => Category::Performance,
            "style" | "formatting" | "readability" | "lisibilite" | "mise_en_forme" => {
                Category::Style
            }
            "best_practice" | "best_practices" | "bestpractice" | "bestpractices"
            | "maintenance" | "maintainability" | "maintenabilite" | "bonne_pratique"
            | "bonnes_pratiques" => Category::BestPractice,
            _ => Category::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Bug => "Bug",
            Category::Security => "Security",
            Category::Performance => "Performance",
            Category::Style => "Style",
            Category::BestPractice => "Best Practice",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Finding severity, ordered from most to least severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Major,
        Severity::Minor,
        Severity::Info,
    ];

    /// Case- and accent-insensitive lookup; unknown labels map to `Info`.
    pub fn from_label(raw: &str) -> Self {
        match fold_label(raw).as_str() {
            "critical" | "critique" | "high" | "haute" | "haut" | "eleve" | "elevee"
            | "blocker" | "bloquant" => Severity::Critical,
            "major" | "majeur" | "majeure" | "medium" | "moyen" | "moyenne" => Severity::Major,
            "minor" | "mineur" | "mineure" | "low" | "faible" | "basse" | "bas" => {
                Severity::Minor
            }
            _ => Severity::Info,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Major => "Major",
            Severity::Minor => "Minor",
            Severity::Info => "Info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lowercases, strips French accents and joins words with `_`.
fn fold_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            ' ' | '-' => '_',
            other => other,
        })
        .collect()
}

/// One validated finding, ready to be placed on the diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewComment {
    pub file_path: String,
    pub line_number: u32,
    pub end_line_number: Option<u32>,
    pub category: Category,
    pub severity: Severity,
    pub text: String,
}

/// Review lifecycle. Moves forward only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReviewStatus::Completed | ReviewStatus::Failed)
    }

    fn can_move_to(self, next: ReviewStatus) -> bool {
        matches!(
            (self, next),
            (ReviewStatus::Pending, ReviewStatus::InProgress)
                | (ReviewStatus::Pending, ReviewStatus::Failed)
                | (ReviewStatus::InProgress, ReviewStatus::Completed)
                | (ReviewStatus::InProgress, ReviewStatus::Failed)
        )
    }
}

/// Counters collected while posting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewStats {
    pub posted_positional: usize,
    pub posted_as_note: usize,
    pub failed: usize,
    pub deleted_previous: usize,
    pub summary_posted: bool,
}

/// The record of one review run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub id: Uuid,
    pub project_id: String,
    pub request_id: u64,
    pub status: ReviewStatus,
    pub comments: Vec<ReviewComment>,
    pub summary: Option<String>,
    pub triggered_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stats: ReviewStats,
}

impl ReviewOutcome {
    pub fn new(project_id: &str, request_id: u64, triggered_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            request_id,
            status: ReviewStatus::Pending,
            comments: Vec::new(),
            summary: None,
            triggered_by: triggered_by.to_string(),
            created_at: now,
            updated_at: now,
            stats: ReviewStats::default(),
        }
    }

    /// Moves to `next` if the lifecycle allows it; returns whether it moved.
    pub fn transition(&mut self, next: ReviewStatus) -> bool {
        if !self.status.can_move_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_aliases() {
        assert_eq!(Category::from_label("sécurité"), Category::Security);
        assert_eq!(Category::from_label("SECURITY"), Category::Security);
        assert_eq!(Category::from_label("Maintenance"), Category::BestPractice);
        assert_eq!(Category::from_label("best-practice"), Category::BestPractice);
        assert_eq!(Category::from_label("Bonnes pratiques"), Category::BestPractice);
        assert_eq!(Category::from_label("weird"), Category::Other);
    }

    #[test]
    fn severity_aliases() {
        assert_eq!(Severity::from_label("HIGH"), Severity::Critical);
        assert_eq!(Severity::from_label("Élevée"), Severity::Critical);
        assert_eq!(Severity::from_label("medium"), Severity::Major);
        assert_eq!(Severity::from_label("faible"), Severity::Minor);
        assert_eq!(Severity::from_label(""), Severity::Info);
        assert!(Severity::Critical < Severity::Info);
    }

    #[test]
    fn status_is_monotonic() {
        let mut o = ReviewOutcome::new("group/app", 7, "alice");
        assert!(!o.transition(ReviewStatus::Completed));
        assert!(o.transition(ReviewStatus::InProgress));
        assert!(o.transition(ReviewStatus::Completed));
        assert!(!o.transition(ReviewStatus::Failed));
        assert!(!o.transition(ReviewStatus::InProgress));
        assert_eq!(o.status, ReviewStatus::Completed);
        assert!(o.status.is_terminal());
    }
}
