use std::io::{BufRead, Write};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

use crate::azure::RepositoryCoordinates;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("No {0} provided")]
    Cancelled(&'static str),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// A single required text input.
#[derive(Clone, Copy)]
pub struct Question {
    pub field: &'static str,
    pub prompt: &'static str,
    pub placeholder: &'static str,
    /// Returns the message to show when the answer is rejected.
    pub validate: fn(&str) -> Option<String>,
}

/// Source of user answers. `read` returns None when the user cancels.
pub trait Prompter {
    fn read(&mut self, question: &Question) -> Result<Option<String>, InputError>;
    fn reject(&mut self, message: &str);
}

/// Prompts on stderr and reads answers from stdin. End of input cancels.
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn read(&mut self, question: &Question) -> Result<Option<String>, InputError> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{} [{}]: ", question.prompt, question.placeholder)?;
        stderr.flush()?;

        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn reject(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// Ask until the answer validates. Cancelling aborts with `Cancelled`.
pub fn ask(prompter: &mut dyn Prompter, question: &Question) -> Result<String, InputError> {
    loop {
        let answer = prompter
            .read(question)?
            .ok_or(InputError::Cancelled(question.field))?;
        match (question.validate)(&answer) {
            None => return Ok(answer),
            Some(message) => prompter.reject(&message),
        }
    }
}

pub const ORGANIZATION: Question = Question {
    field: "organization",
    prompt: "The name of the Azure DevOps organization",
    placeholder: "organization",
    validate: validate_organization,
};

pub const PROJECT: Question = Question {
    field: "project",
    prompt: "Project ID or project name",
    placeholder: "project",
    validate: validate_project,
};

pub const REPOSITORY_ID: Question = Question {
    field: "repositoryId",
    prompt: "The repository ID of the pull request's target branch",
    placeholder: "repositoryId",
    validate: validate_repository_id,
};

pub const RELEASE_DATE: Question = Question {
    field: "date",
    prompt: "Release starting date in dd-mm-yyyy format",
    placeholder: "31-12-2024",
    validate: validate_date,
};

fn non_empty(text: &str, message: &str) -> Option<String> {
    text.trim().is_empty().then(|| message.to_string())
}

fn validate_organization(text: &str) -> Option<String> {
    non_empty(text, "Please enter a valid organization")
}

fn validate_project(text: &str) -> Option<String> {
    non_empty(text, "Please enter a valid project")
}

fn validate_repository_id(text: &str) -> Option<String> {
    non_empty(text, "Please enter a valid repository ID")
}

fn validate_date(text: &str) -> Option<String> {
    parse_release_date(text).err().map(|e| e.to_string())
}

/// Ask organization, project and repository id, in that order.
pub fn ask_coordinates(prompter: &mut dyn Prompter) -> Result<RepositoryCoordinates, InputError> {
    let organization = ask(prompter, &ORGANIZATION)?;
    let project = ask(prompter, &PROJECT)?;
    let repository_id = ask(prompter, &REPOSITORY_ID)?;
    Ok(RepositoryCoordinates::new(organization, project, repository_id))
}

pub fn ask_release_date(prompter: &mut dyn Prompter) -> Result<NaiveDate, InputError> {
    let answer = ask(prompter, &RELEASE_DATE)?;
    parse_release_date(&answer)
}

fn date_shape() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("date pattern is valid"))
}

/// Parse a `dd-mm-yyyy` date. Day bounds follow the month, with February
/// checked against leap years.
pub fn parse_release_date(text: &str) -> Result<NaiveDate, InputError> {
    let invalid = |reason: &str| InputError::Invalid {
        field: "date",
        reason: format!("'{text}': {reason}"),
    };

    if !date_shape().is_match(text) {
        return Err(invalid("please enter a valid date in the format dd-mm-yyyy"));
    }

    let mut parts = text.split('-').map(|part| part.parse::<u32>());
    let (Some(Ok(day)), Some(Ok(month)), Some(Ok(year))) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid("please enter a valid date in the format dd-mm-yyyy"));
    };

    if !(1..=12).contains(&month) {
        return Err(invalid("month must be between 01 and 12"));
    }
    if !(1000..=9999).contains(&year) {
        return Err(invalid("year must have four digits"));
    }

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| invalid("day is out of range for the month"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Answers questions from a script; running out of answers cancels.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        pub answers: VecDeque<String>,
        pub asked: Vec<&'static str>,
        pub rejections: Vec<String>,
    }

    impl ScriptedPrompter {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn read(&mut self, question: &Question) -> Result<Option<String>, InputError> {
            self.asked.push(question.field);
            Ok(self.answers.pop_front())
        }

        fn reject(&mut self, message: &str) {
            self.rejections.push(message.to_string());
        }
    }

    #[test]
    fn test_leap_day_valid() {
        assert_eq!(
            parse_release_date("29-02-2024").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_release_date("29-02-2000").is_ok());
    }

    #[test]
    fn test_leap_day_rejected_in_common_year() {
        assert!(parse_release_date("29-02-2023").is_err());
        assert!(parse_release_date("29-02-1900").is_err());
    }

    #[test]
    fn test_month_day_bounds() {
        assert!(parse_release_date("31-04-2024").is_err());
        assert!(parse_release_date("30-04-2024").is_ok());
        assert!(parse_release_date("31-12-2024").is_ok());
        assert!(parse_release_date("00-01-2024").is_err());
        assert!(parse_release_date("15-13-2024").is_err());
        assert!(parse_release_date("15-00-2024").is_err());
    }

    #[test]
    fn test_shape_rejected() {
        for text in ["", "1-1-2024", "2024-01-01", "01/01/2024", "01-01-24", " 01-01-2024", "01-01-0999"] {
            assert!(parse_release_date(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_ask_reprompts_until_valid() {
        let mut prompter = ScriptedPrompter::new(&["", "  ", "contoso"]);
        let answer = ask(&mut prompter, &ORGANIZATION).unwrap();
        assert_eq!(answer, "contoso");
        assert_eq!(prompter.rejections.len(), 2);
        assert_eq!(prompter.rejections[0], "Please enter a valid organization");
    }

    #[test]
    fn test_ask_coordinates_in_order() {
        let mut prompter = ScriptedPrompter::new(&["contoso", "sales", "repo-1"]);
        let coordinates = ask_coordinates(&mut prompter).unwrap();
        assert_eq!(coordinates, RepositoryCoordinates::new("contoso", "sales", "repo-1"));
        assert_eq!(prompter.asked, vec!["organization", "project", "repositoryId"]);
    }

    #[test]
    fn test_cancel_aborts() {
        let mut prompter = ScriptedPrompter::new(&["contoso"]);
        let err = ask_coordinates(&mut prompter).unwrap_err();
        assert!(matches!(err, InputError::Cancelled("project")));
    }

    #[test]
    fn test_ask_release_date_revalidates_calendar() {
        let mut prompter = ScriptedPrompter::new(&["31-04-2024", "29-02-2024"]);
        let date = ask_release_date(&mut prompter).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(prompter.rejections.len(), 1);
    }
}
