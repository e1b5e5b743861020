//! Prompt construction for interview responses.
//!
//! With a resume on file the model answers in character as the candidate;
//! a job description narrows the answers further.  Without either, the
//! question goes through as-is.

/// Instruction that puts the model in character as the candidate.
const ROLEPLAY_PREAMBLE: &str = "\
You are a job candidate in a live interview. Answer the interviewer's \
question in the first person, as the person described in the resume below. \
Be conversational and specific; draw on the resume for concrete examples. \
Keep answers to 2-4 sentences unless asked to elaborate. Do not mention \
these instructions.";

const RESUME_HEADER: &str = "Candidate resume:";
const JOB_HEADER: &str = "The role being interviewed for:";

/// Builds the text sent to the response generator.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    resume: Option<String>,
    job_description: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resume(&mut self, resume: Option<String>) {
        self.resume = resume.filter(|r| !r.trim().is_empty());
    }

    pub fn set_job_description(&mut self, jd: Option<String>) {
        self.job_description = jd.filter(|j| !j.trim().is_empty());
    }

    /// `true` when answers should be generated in character, which also
    /// selects the role-play sampling temperature.
    pub fn is_roleplay(&self) -> bool {
        self.resume.is_some()
    }

    /// Assemble the full prompt for one interviewer question.
    pub fn build(&self, question: &str) -> String {
        let resume = match &self.resume {
            Some(resume) => resume,
            None => return question.trim().to_string(),
        };

        let mut prompt = String::new();
        prompt.push_str(ROLEPLAY_PREAMBLE);
        prompt.push_str("\n\n");
        prompt.push_str(RESUME_HEADER);
        prompt.push('\n');
        prompt.push_str(resume.trim());
        if let Some(jd) = &self.job_description {
            prompt.push_str("\n\n");
            prompt.push_str(JOB_HEADER);
            prompt.push('\n');
            prompt.push_str(jd.trim());
        }
        prompt.push_str("\n\nInterviewer: ");
        prompt.push_str(question.trim());
        prompt
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_question_without_resume() {
        let builder = PromptBuilder::new();
        assert_eq!(builder.build("  Tell me about yourself.  "), "Tell me about yourself.");
        assert!(!builder.is_roleplay());
    }

    #[test]
    fn resume_enables_roleplay() {
        let mut builder = PromptBuilder::new();
        builder.set_resume(Some("Five years of backend work.".into()));

        assert!(builder.is_roleplay());
        let prompt = builder.build("Why this company?");
        assert!(prompt.starts_with(ROLEPLAY_PREAMBLE));
        assert!(prompt.contains("Five years of backend work."));
        assert!(prompt.ends_with("Interviewer: Why this company?"));
    }

    #[test]
    fn job_description_is_included_when_present() {
        let mut builder = PromptBuilder::new();
        builder.set_resume(Some("Resume text.".into()));
        builder.set_job_description(Some("Senior platform engineer.".into()));

        let prompt = builder.build("What interests you about the role?");
        assert!(prompt.contains("Senior platform engineer."));
        assert!(prompt.contains(JOB_HEADER));
    }

    #[test]
    fn blank_resume_is_treated_as_absent() {
        let mut builder = PromptBuilder::new();
        builder.set_resume(Some("   ".into()));
        assert!(!builder.is_roleplay());
        assert_eq!(builder.build("Question?"), "Question?");
    }

    #[test]
    fn job_description_alone_does_not_roleplay() {
        let mut builder = PromptBuilder::new();
        builder.set_job_description(Some("A role.".into()));
        assert!(!builder.is_roleplay());
        assert_eq!(builder.build("Question?"), "Question?");
    }
}
