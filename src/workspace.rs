use crate::editor::ResumeEditor;
use crate::records::resumes::ResumeRecord;

/// Per-user view state of the profile page: the resume on screen and its
/// editor. Switching owners starts from scratch.
#[derive(Debug, Default)]
pub struct Workspace {
    owner: Option<String>,
    resume: Option<ResumeEditor>,
    loaded: bool,
}

impl Workspace {
    /// Attach to `owner_id`, dropping anything left over from another user.
    pub fn bind(&mut self, owner_id: &str) {
        if self.owner.as_deref() != Some(owner_id) {
            *self = Workspace {
                owner: Some(owner_id.to_string()),
                ..Workspace::default()
            };
        }
    }

    pub fn reset(&mut self) {
        *self = Workspace::default();
    }

    /// Whether the latest resume has been looked up for this owner.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn mark_loaded(&mut self, latest: Option<ResumeRecord>) {
        self.resume = latest.map(ResumeEditor::new);
        self.loaded = true;
    }

    pub fn resume(&self) -> Option<&ResumeEditor> {
        self.resume.as_ref()
    }

    pub fn resume_mut(&mut self) -> Option<&mut ResumeEditor> {
        self.resume.as_mut()
    }

    pub fn set_resume(&mut self, record: ResumeRecord) {
        self.resume = Some(ResumeEditor::new(record));
        self.loaded = true;
    }

    /// Back to the "upload a resume" state; nothing is deleted.
    pub fn clear_resume(&mut self) {
        self.resume = None;
        self.loaded = true;
    }
}
