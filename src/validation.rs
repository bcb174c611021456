//! Request-field checks applied before any external call.

use crate::config::InputLimits;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Body of an analyze request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub resume_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(resume_text: impl Into<String>) -> Self {
        Self {
            resume_text: Some(resume_text.into()),
            ..Self::default()
        }
    }

    pub fn job_title(mut self, title: impl Into<String>) -> Self {
        self.job_title = Some(title.into());
        self
    }

    pub fn job_description(mut self, description: impl Into<String>) -> Self {
        self.job_description = Some(description.into());
        self
    }

    /// Check every field against `limits`, returning the first violation.
    pub fn validate(&self, limits: &InputLimits) -> Result<(), ValidationError> {
        let resume = self
            .resume_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::MissingResumeText)?;
        validate_resume_text(resume, limits)?;
        if let Some(title) = self.job_title.as_deref() {
            validate_job_title(title, limits)?;
        }
        if let Some(description) = self.job_description.as_deref() {
            validate_job_description(description, limits)?;
        }
        Ok(())
    }
}

pub fn validate_resume_text(text: &str, limits: &InputLimits) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyResumeText);
    }
    if text.chars().count() > limits.max_resume_chars {
        return Err(ValidationError::ResumeTextTooLong {
            max: limits.max_resume_chars,
        });
    }
    Ok(())
}

pub fn validate_job_title(title: &str, limits: &InputLimits) -> Result<(), ValidationError> {
    if title.chars().count() > limits.max_job_title_chars {
        return Err(ValidationError::JobTitleTooLong {
            max: limits.max_job_title_chars,
        });
    }
    Ok(())
}

pub fn validate_job_description(
    description: &str,
    limits: &InputLimits,
) -> Result<(), ValidationError> {
    if description.chars().count() > limits.max_job_description_chars {
        return Err(ValidationError::JobDescriptionTooLong {
            max: limits.max_job_description_chars,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> InputLimits {
        InputLimits::default()
    }

    #[test]
    fn missing_and_blank_resume() {
        assert_eq!(
            AnalyzeRequest::default().validate(&limits()),
            Err(ValidationError::MissingResumeText)
        );
        assert_eq!(
            AnalyzeRequest::new("").validate(&limits()),
            Err(ValidationError::MissingResumeText)
        );
        assert_eq!(
            AnalyzeRequest::new(" \n\t").validate(&limits()),
            Err(ValidationError::EmptyResumeText)
        );
    }

    #[test]
    fn length_limits_are_inclusive() {
        let ok = AnalyzeRequest::new("x".repeat(50_000))
            .job_title("t".repeat(200))
            .job_description("d".repeat(10_000));
        assert_eq!(ok.validate(&limits()), Ok(()));

        let err = AnalyzeRequest::new("x".repeat(50_001)).validate(&limits());
        assert_eq!(err, Err(ValidationError::ResumeTextTooLong { max: 50_000 }));

        let err = AnalyzeRequest::new("cv").job_title("t".repeat(201)).validate(&limits());
        assert_eq!(
            err.unwrap_err().to_string(),
            "Job title exceeds maximum length of 200 characters"
        );

        let err = AnalyzeRequest::new("cv")
            .job_description("d".repeat(10_001))
            .validate(&limits());
        assert_eq!(
            err,
            Err(ValidationError::JobDescriptionTooLong { max: 10_000 })
        );
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let title = "é".repeat(200);
        assert!(title.len() > 200);
        assert_eq!(validate_job_title(&title, &limits()), Ok(()));
    }

    #[test]
    fn deserialises_camel_case() {
        let req: AnalyzeRequest = serde_json::from_str(
            r#"{"resumeText": "Jane", "jobTitle": "Dev", "jobDescription": null}"#,
        )
        .unwrap();
        assert_eq!(req.resume_text.as_deref(), Some("Jane"));
        assert_eq!(req.job_title.as_deref(), Some("Dev"));
        assert_eq!(req.job_description, None);
    }
}
