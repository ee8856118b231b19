//! Writes the generated plan as a Word document.

use std::{fs::File, path::Path};

use docx_rs::{BreakType, Docx, Paragraph, Run, Style, StyleType};

use crate::error::PipelineError;

pub const PLAN_HEADING: &str = "Plan de Materia";

const HEADING_STYLE_ID: &str = "Heading1";

/// A document with one level-1 heading followed by one plain paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    heading: String,
    body: String,
}

impl PlanDocument {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            heading: PLAN_HEADING.to_string(),
            body: body.into(),
        }
    }

    fn heading_style() -> Style {
        Style::new(HEADING_STYLE_ID, StyleType::Paragraph)
            .name("Heading 1")
            .size(32)
            .bold()
    }

    /// Line breaks in the body become soft breaks, so the text stays one paragraph.
    fn body_run(&self) -> Run {
        let mut run = Run::new();
        for (index, line) in self.body.split('\n').enumerate() {
            if index > 0 {
                run = run.add_break(BreakType::TextWrapping);
            }
            run = run.add_text(line.trim_end_matches('\r'));
        }
        run
    }

    pub fn to_docx(&self) -> Docx {
        Docx::new()
            .add_style(Self::heading_style())
            .add_paragraph(
                Paragraph::new()
                    .style(HEADING_STYLE_ID)
                    .add_run(Run::new().add_text(&self.heading)),
            )
            .add_paragraph(Paragraph::new().add_run(self.body_run()))
    }

    /// Saves to `path`, replacing any existing file. The parent directory must exist.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let document_error = |message: String| PipelineError::Document {
            path: path.to_path_buf(),
            message,
        };

        let file = File::create(path).map_err(|e| document_error(e.to_string()))?;
        self.to_docx()
            .build()
            .pack(file)
            .map_err(|e| document_error(e.to_string()))?;

        log::info!("Plan saved to {}", path.display());
        Ok(())
    }
}
