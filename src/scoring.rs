//! Reality Score: 18 pillar answers reduced to category averages, a total
//! average and a zone.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

pub const PILLAR_COUNT: usize = 18;
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

const SUCCESS_THRESHOLD: f64 = 4.0;
const WARNING_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    A,
    B,
    C,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::A, Category::B, Category::C];

    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "Results",
            Self::B => "Behavior",
            Self::C => "Leadership & Growth",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pillar {
    TargetAchievement,
    MarginGrowth,
    NewAccountAcquisition,
    ClientRetention,
    PipelineManagement,
    ProductKnowledge,
    Discipline,
    Integrity,
    Teamwork,
    Communication,
    Initiative,
    Compliance,
    Leadership,
    Coaching,
    Planning,
    ProblemSolving,
    Adaptability,
    SelfDevelopment,
}

impl Pillar {
    pub const ALL: [Pillar; PILLAR_COUNT] = [
        Pillar::TargetAchievement,
        Pillar::MarginGrowth,
        Pillar::NewAccountAcquisition,
        Pillar::ClientRetention,
        Pillar::PipelineManagement,
        Pillar::ProductKnowledge,
        Pillar::Discipline,
        Pillar::Integrity,
        Pillar::Teamwork,
        Pillar::Communication,
        Pillar::Initiative,
        Pillar::Compliance,
        Pillar::Leadership,
        Pillar::Coaching,
        Pillar::Planning,
        Pillar::ProblemSolving,
        Pillar::Adaptability,
        Pillar::SelfDevelopment,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::TargetAchievement => "target_achievement",
            Self::MarginGrowth => "margin_growth",
            Self::NewAccountAcquisition => "new_account_acquisition",
            Self::ClientRetention => "client_retention",
            Self::PipelineManagement => "pipeline_management",
            Self::ProductKnowledge => "product_knowledge",
            Self::Discipline => "discipline",
            Self::Integrity => "integrity",
            Self::Teamwork => "teamwork",
            Self::Communication => "communication",
            Self::Initiative => "initiative",
            Self::Compliance => "compliance",
            Self::Leadership => "leadership",
            Self::Coaching => "coaching",
            Self::Planning => "planning",
            Self::ProblemSolving => "problem_solving",
            Self::Adaptability => "adaptability",
            Self::SelfDevelopment => "self_development",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TargetAchievement => "Target Achievement",
            Self::MarginGrowth => "Margin Growth",
            Self::NewAccountAcquisition => "New Account Acquisition",
            Self::ClientRetention => "Client Retention",
            Self::PipelineManagement => "Pipeline Management",
            Self::ProductKnowledge => "Product Knowledge",
            Self::Discipline => "Discipline",
            Self::Integrity => "Integrity",
            Self::Teamwork => "Teamwork",
            Self::Communication => "Communication",
            Self::Initiative => "Initiative",
            Self::Compliance => "Compliance",
            Self::Leadership => "Leadership",
            Self::Coaching => "Coaching",
            Self::Planning => "Planning",
            Self::ProblemSolving => "Problem Solving",
            Self::Adaptability => "Adaptability",
            Self::SelfDevelopment => "Self Development",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::TargetAchievement
            | Self::MarginGrowth
            | Self::NewAccountAcquisition
            | Self::ClientRetention
            | Self::PipelineManagement
            | Self::ProductKnowledge => Category::A,
            Self::Discipline
            | Self::Integrity
            | Self::Teamwork
            | Self::Communication
            | Self::Initiative
            | Self::Compliance => Category::B,
            Self::Leadership
            | Self::Coaching
            | Self::Planning
            | Self::ProblemSolving
            | Self::Adaptability
            | Self::SelfDevelopment => Category::C,
        }
    }

    pub fn from_id(id: &str) -> Option<Pillar> {
        Self::ALL.iter().copied().find(|p| p.id() == id)
    }
}

/// One answered pillar as submitted by an auditor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarAnswer {
    pub pillar_id: String,
    pub score: u8,
}

impl PillarAnswer {
    pub fn new(pillar: Pillar, score: u8) -> Self {
        Self {
            pillar_id: pillar.id().to_string(),
            score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Success,
    Warning,
    Critical,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Zone> {
        match s {
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a set of answers cannot be scored, or `None` if it can.
pub fn answer_problem(answers: &[PillarAnswer]) -> Option<String> {
    if answers.len() != PILLAR_COUNT {
        return Some(format!("expected {PILLAR_COUNT} answers, got {}", answers.len()));
    }
    let mut seen: HashSet<Pillar> = HashSet::new();
    for answer in answers {
        let Some(pillar) = Pillar::from_id(&answer.pillar_id) else {
            return Some(format!("unknown pillar: {}", answer.pillar_id));
        };
        if !seen.insert(pillar) {
            return Some(format!("duplicate pillar: {}", answer.pillar_id));
        }
        if !(MIN_SCORE..=MAX_SCORE).contains(&answer.score) {
            return Some(format!(
                "score for {} must be between {MIN_SCORE} and {MAX_SCORE}, got {}",
                answer.pillar_id, answer.score
            ));
        }
    }
    None
}

/// True only when all 18 canonical pillars are answered exactly once with
/// an in-range score.
pub fn validate_pillar_answers(answers: &[PillarAnswer]) -> bool {
    answer_problem(answers).is_none()
}

fn mean(scores: impl Iterator<Item = u8>) -> f64 {
    let (sum, n) = scores.fold((0u32, 0u32), |(sum, n), s| (sum + s as u32, n + 1));
    if n == 0 {
        0.0
    } else {
        sum as f64 / n as f64
    }
}

/// Mean score of the answers whose pillar belongs to `category`; 0 if none.
pub fn category_average(answers: &[PillarAnswer], category: Category) -> f64 {
    mean(
        answers
            .iter()
            .filter(|a| Pillar::from_id(&a.pillar_id).map(|p| p.category()) == Some(category))
            .map(|a| a.score),
    )
}

pub fn total_average(answers: &[PillarAnswer]) -> f64 {
    mean(answers.iter().map(|a| a.score))
}

/// Half-open bands, compared on the unrounded average.
pub fn classify_zone(total_average: f64) -> Zone {
    if total_average >= SUCCESS_THRESHOLD {
        Zone::Success
    } else if total_average >= WARNING_THRESHOLD {
        Zone::Warning
    } else {
        Zone::Critical
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealityScore {
    pub category_a: f64,
    pub category_b: f64,
    pub category_c: f64,
    pub total_average: f64,
    pub zone: Zone,
}

impl RealityScore {
    /// Score a complete answer set; incomplete or malformed sets are rejected.
    pub fn from_answers(answers: &[PillarAnswer]) -> Result<Self> {
        if let Some(problem) = answer_problem(answers) {
            return Err(AuditError::InvalidAnswers(problem));
        }
        let total = total_average(answers);
        Ok(Self {
            category_a: category_average(answers, Category::A),
            category_b: category_average(answers, Category::B),
            category_c: category_average(answers, Category::C),
            total_average: total,
            zone: classify_zone(total),
        })
    }

    pub fn category(&self, category: Category) -> f64 {
        match category {
            Category::A => self.category_a,
            Category::B => self.category_b,
            Category::C => self.category_c,
        }
    }
}
