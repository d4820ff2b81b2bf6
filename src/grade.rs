// grade.rs - Academic Grade Ranking
// Parses roster grade tokens such as "21B" and orders members by their
// highest grade, activity and name.
//
// Used by: commands/inspector.rs (roster rendering)

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static GRADE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)([BMD])$").expect("Invalid grade regex pattern")
});

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GradeError {
    #[error("Invalid grade format: {0:?}")]
    InvalidGradeFormat(String),
}

/// Degree ordinal, declared in ascending rank so the derived `Ord` matches
/// Bachelor < Master < Doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Degree {
    Bachelor,
    Master,
    Doctor,
}

impl Degree {
    pub fn label(self) -> char {
        match self {
            Degree::Bachelor => 'B',
            Degree::Master => 'M',
            Degree::Doctor => 'D',
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "B" => Some(Degree::Bachelor),
            "M" => Some(Degree::Master),
            "D" => Some(Degree::Doctor),
            _ => None,
        }
    }
}

/// A (year, degree) pair. The year is the two-digit admission year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grade {
    pub year: u32,
    pub degree: Degree,
}

impl Grade {
    pub fn new(year: u32, degree: Degree) -> Self {
        Self { year, degree }
    }
}

// Rank order, not chronological order: a higher degree outranks a lower one,
// and within one degree the earlier admission year outranks the later one.
impl Ord for Grade {
    fn cmp(&self, other: &Self) -> Ordering {
        self.degree
            .cmp(&other.degree)
            .then_with(|| other.year.cmp(&self.year))
    }
}

impl PartialOrd for Grade {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.year, self.degree.label())
    }
}

impl FromStr for Grade {
    type Err = GradeError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        parse_grade(token)
    }
}

/// Roster entry as served by the members API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
    pub name: String,
    #[serde(default)]
    pub grade: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub grades: Vec<Grade>,
    pub is_active: bool,
}

impl Member {
    pub fn new(name: impl Into<String>, grades: Vec<Grade>, is_active: bool) -> Self {
        Self {
            name: name.into(),
            grades,
            is_active,
        }
    }

    pub fn effective_grade(&self) -> Option<Grade> {
        max_grade(&self.grades)
    }
}

impl TryFrom<RawMember> for Member {
    type Error = GradeError;

    fn try_from(raw: RawMember) -> Result<Self, Self::Error> {
        let grades = raw
            .grade
            .iter()
            .map(|token| parse_grade(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Member::new(raw.name, grades, raw.is_active))
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Parse a token of the form `<digits><B|M|D>`. The year must be positive.
pub fn parse_grade(token: &str) -> Result<Grade, GradeError> {
    let invalid = || GradeError::InvalidGradeFormat(token.to_string());

    let captures = GRADE_PATTERN.captures(token).ok_or_else(invalid)?;
    let year = captures[1]
        .parse::<u32>()
        .ok()
        .filter(|year| *year > 0)
        .ok_or_else(invalid)?;
    let degree = Degree::from_label(&captures[2]).ok_or_else(invalid)?;

    Ok(Grade::new(year, degree))
}

/// Highest-ranked grade, or `None` for an empty list.
pub fn max_grade(grades: &[Grade]) -> Option<Grade> {
    grades.iter().copied().reduce(|best, grade| {
        if grade > best {
            grade
        } else {
            best
        }
    })
}

pub fn parse_members(raw: Vec<RawMember>) -> Result<Vec<Member>, GradeError> {
    raw.into_iter().map(Member::try_from).collect()
}

/// Stable sort: effective grade descending (members without grades last),
/// then active before inactive, then name ascending.
pub fn sort_members(mut members: Vec<Member>) -> Vec<Member> {
    members.sort_by_cached_key(|member| {
        (
            Reverse(member.effective_grade()),
            Reverse(member.is_active),
            member.name.clone(),
        )
    });
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graded(name: &str, tokens: &[&str], is_active: bool) -> Member {
        let grades = tokens.iter().map(|t| parse_grade(t).unwrap()).collect();
        Member::new(name, grades, is_active)
    }

    fn names(members: &[Member]) -> Vec<&str> {
        members.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_parse_grade_valid_degrees() {
        assert_eq!(parse_grade("21B").unwrap(), Grade::new(21, Degree::Bachelor));
        assert_eq!(parse_grade("21M").unwrap(), Grade::new(21, Degree::Master));
        assert_eq!(parse_grade("21D").unwrap(), Grade::new(21, Degree::Doctor));
    }

    #[test]
    fn test_parse_grade_rejects_unknown_degree() {
        for token in ["21A", "21C", "21E"] {
            assert_eq!(
                parse_grade(token),
                Err(GradeError::InvalidGradeFormat(token.to_string()))
            );
        }
    }

    #[test]
    fn test_parse_grade_rejects_malformed_tokens() {
        assert!(parse_grade("").is_err());
        assert!(parse_grade("B").is_err());
        assert!(parse_grade("21").is_err());
        assert!(parse_grade("21BM").is_err());
        assert!(parse_grade("x21B").is_err());
        assert!(parse_grade("99999999999B").is_err());
    }

    #[test]
    fn test_parse_grade_rejects_year_zero() {
        for token in ["0B", "00M", "000D"] {
            assert_eq!(
                parse_grade(token),
                Err(GradeError::InvalidGradeFormat(token.to_string()))
            );
        }
        assert_eq!(parse_grade("01B"), Ok(Grade::new(1, Degree::Bachelor)));
    }

    #[test]
    fn test_grade_display_round_trips_token() {
        assert_eq!(parse_grade("18M").unwrap().to_string(), "18M");
        assert_eq!("23D".parse::<Grade>().unwrap(), Grade::new(23, Degree::Doctor));
    }

    #[test]
    fn test_max_grade_prefers_higher_degree() {
        let grades = [
            Grade::new(21, Degree::Bachelor),
            Grade::new(18, Degree::Master),
            Grade::new(23, Degree::Doctor),
        ];
        assert_eq!(max_grade(&grades), Some(Grade::new(23, Degree::Doctor)));
    }

    #[test]
    fn test_max_grade_same_degree_prefers_smaller_year() {
        let grades = [
            Grade::new(21, Degree::Bachelor),
            Grade::new(18, Degree::Bachelor),
            Grade::new(23, Degree::Bachelor),
        ];
        assert_eq!(max_grade(&grades), Some(Grade::new(18, Degree::Bachelor)));
    }

    #[test]
    fn test_max_grade_empty() {
        assert_eq!(max_grade(&[]), None);
    }

    #[test]
    fn test_sort_same_grade_orders_by_name() {
        let sorted = sort_members(vec![
            graded("C", &["21B"], true),
            graded("A", &["21B"], true),
            graded("B", &["21B"], true),
        ]);
        assert_eq!(names(&sorted), ["A", "B", "C"]);
    }

    #[test]
    fn test_sort_same_degree_orders_by_year() {
        let sorted = sort_members(vec![
            graded("C", &["25B"], true),
            graded("A", &["21B"], true),
            graded("B", &["23B"], true),
        ]);
        assert_eq!(names(&sorted), ["A", "B", "C"]);
    }

    #[test]
    fn test_sort_degree_descending() {
        let sorted = sort_members(vec![
            graded("A", &["21B"], true),
            graded("B", &["21M"], true),
            graded("C", &["21D"], true),
        ]);
        assert_eq!(names(&sorted), ["C", "B", "A"]);
    }

    #[test]
    fn test_sort_active_members_first() {
        let sorted = sort_members(vec![
            graded("A", &["21B"], false),
            graded("B", &["21B"], true),
        ]);
        assert_eq!(names(&sorted), ["B", "A"]);
    }

    #[test]
    fn test_sort_uses_highest_of_multiple_grades() {
        let sorted = sort_members(vec![
            graded("B", &["23B"], true),
            graded("A", &["21B", "25M"], true),
        ]);
        assert_eq!(names(&sorted), ["A", "B"]);
    }

    #[test]
    fn test_sort_combined_keys() {
        let sorted = sort_members(vec![
            graded("A", &["21B"], true),
            graded("B", &["23B"], true),
            graded("C", &["25B"], true),
            graded("D", &["21B", "25M"], true),
            graded("E", &["21B"], false),
            graded("F", &["21M"], true),
            graded("G", &["21M"], false),
        ]);
        assert_eq!(names(&sorted), ["F", "G", "D", "A", "E", "B", "C"]);
    }

    #[test]
    fn test_sort_members_without_grades_last() {
        let sorted = sort_members(vec![
            Member::new("Nobody", vec![], true),
            graded("Z", &["25B"], false),
        ]);
        assert_eq!(names(&sorted), ["Z", "Nobody"]);
    }

    #[test]
    fn test_sort_is_stable_for_identical_records() {
        let first = graded("Same", &["21B"], true);
        let mut second = graded("Same", &["21B"], true);
        second.grades.push(Grade::new(22, Degree::Bachelor));
        let sorted = sort_members(vec![first.clone(), second.clone()]);
        assert_eq!(sorted, vec![first, second]);
    }

    #[test]
    fn test_parse_members_from_api_json() {
        let body = r#"[
            {"id": "a", "name": "Alice", "grade": ["21B", "25M"], "isActive": true},
            {"id": "b", "name": "Bob", "grade": ["22B"], "isActive": false}
        ]"#;
        let raw: Vec<RawMember> = serde_json::from_str(body).unwrap();
        let members = parse_members(raw).unwrap();

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].effective_grade(), Some(Grade::new(25, Degree::Master)));
        assert!(!members[1].is_active);
    }

    #[test]
    fn test_parse_members_propagates_invalid_grade() {
        let raw = vec![RawMember {
            name: "X".to_string(),
            grade: vec!["21Z".to_string()],
            is_active: true,
        }];
        assert_eq!(
            parse_members(raw),
            Err(GradeError::InvalidGradeFormat("21Z".to_string()))
        );
    }
}
