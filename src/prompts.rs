//! Prompts for the resume review call.
//!
//! Every prompt lives here so tests can inspect them directly and a wording
//! change touches exactly one file. The response-format block is kept in sync
//! with [`crate::feedback::Scorecard`]: field names must match its wire names.

use crate::model::ChatMessage;

/// The fixed system instruction, always the first message.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a professional resume reviewer. Follow instructions strictly and return valid JSON only.";

/// Shape the model must answer in. Mirrors `Scorecard`'s serialised form.
pub const RESPONSE_FORMAT: &str = r#"interface Feedback {
  overallScore: number; // max 100
  ATS: {
    score: number; // rate based on ATS suitability
    tips: {
      type: "good" | "improve";
      tip: string; // give 3-4 tips
    }[];
  };
  toneAndStyle: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string; // make it a short "title" for the actual explanation
      explanation: string; // explain in detail here
    }[]; // give 3-4 tips
  };
  content: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[]; // give 3-4 tips
  };
  structure: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[]; // give 3-4 tips
  };
  skills: {
    score: number; // max 100
    tips: {
      type: "good" | "improve";
      tip: string;
      explanation: string;
    }[]; // give 3-4 tips
  };
}"#;

/// Task instructions for one review. Empty job fields are described as absent.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    let job_title = job_title.trim();
    let job_description = job_description.trim();
    let title = if job_title.is_empty() {
        "(not provided)"
    } else {
        job_title
    };
    let description = if job_description.is_empty() {
        "(not provided)"
    } else {
        job_description
    };

    format!(
        "You are an expert in ATS (Applicant Tracking System) and resume analysis.
Please analyze and rate this resume and suggest how to improve it.
The rating can be low if the resume is bad.
Be thorough and detailed. Don't be afraid to point out any mistakes or areas for improvement.
If there is a lot to improve, don't hesitate to give low scores. This is to help the user improve their resume.
If available, use the job description for the job the user is applying to, to give more detailed feedback.
If provided, take the job description into consideration.
The job title is: {title}
The job description is: {description}
Provide the feedback using the following format:
{RESPONSE_FORMAT}
Return the analysis as a JSON object, without any other text and without the backticks.
Do not include any other text or comments."
    )
}

/// Assemble the conversation: system instruction, then one user message with
/// the task instructions followed by the resume text.
pub fn build_messages(resume_text: &str, job_title: &str, job_description: &str) -> Vec<ChatMessage> {
    let instructions = prepare_instructions(job_title, job_description);
    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(format!("{instructions}\n\nResume:\n{resume_text}")),
    ]
}
