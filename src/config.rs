//! Plan configuration: which subject to plan, where reference material lives,
//! where the document goes and how the assistant is set up.
//!
//! Values come from built-in defaults, an optional TOML file and command-line
//! overrides, in that order. [`PlanConfig::validate`] runs before any remote call.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{client::DEFAULT_POLL_INTERVAL, error::ConfigError, prompt};

/// Number of lesson titles a plan is built around.
pub const LESSON_COUNT: usize = 5;

pub const DEFAULT_SUBJECT: &str = "Introducción al Excel";

pub const DEFAULT_LESSONS: [&str; LESSON_COUNT] = [
    "Fundamentos de excel",
    "Manejo de datos en excel",
    "Análisis de datos con funciones y fórmulas",
    "Visualización de datos con gráficos",
    "Tablas dinámicas y análisis",
];

pub const DEFAULT_ASSISTANT_NAME: &str = "Asistente de creación de planes de materia";

pub const DEFAULT_INSTRUCTIONS: &str = "Eres un experto pedagogo en crear planes de materia, \
bajo la corriente de crear competencias en cada estudiante. \
No proporcionas las fuentes de información.";

pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantSettings {
    pub name: String,
    pub instructions: String,
    pub model: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_ASSISTANT_NAME.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    /// Subject name, used in the prompt, the vector store name and the output file name.
    pub subject: String,
    /// Exactly [`LESSON_COUNT`] lesson or unit titles.
    pub lessons: Vec<String>,
    /// Directory whose regular files are uploaded as reference material.
    pub source_dir: PathBuf,
    /// Existing directory that receives `{subject}.docx`.
    pub output_dir: PathBuf,
    pub assistant: AssistantSettings,
    /// Delay between status checks while waiting on the service.
    pub poll_interval_ms: u64,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            lessons: DEFAULT_LESSONS.iter().map(|l| l.to_string()).collect(),
            source_dir: PathBuf::from("material"),
            output_dir: PathBuf::from("planes"),
            assistant: AssistantSettings::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Values given on the command line. Unset fields keep the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub subject: Option<String>,
    pub lessons: Vec<String>,
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl PlanConfig {
    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents, path)
    }

    /// Loads `path` when given, otherwise starts from the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(subject) = overrides.subject {
            self.subject = subject;
        }
        if !overrides.lessons.is_empty() {
            self.lessons = overrides.lessons;
        }
        if let Some(source_dir) = overrides.source_dir {
            self.source_dir = source_dir;
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = output_dir;
        }
        self
    }

    /// Checks the fields the prompt needs: a usable subject and exactly five lessons.
    pub fn validate_prompt(&self) -> Result<(), ConfigError> {
        let subject = self.subject();
        if subject.is_empty() {
            return Err(ConfigError::Invalid("subject must not be empty".to_string()));
        }
        if subject.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "subject `{subject}` must not contain path separators"
            )));
        }
        if self.lessons.len() != LESSON_COUNT {
            return Err(ConfigError::Invalid(format!(
                "expected exactly {LESSON_COUNT} lessons, got {}",
                self.lessons.len()
            )));
        }
        if let Some(index) = self.lessons.iter().position(|l| l.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "lesson {} must not be empty",
                index + 1
            )));
        }
        Ok(())
    }

    /// Full validation for a generation run: prompt fields, both directories and the
    /// assistant model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_prompt()?;

        if !self.source_dir.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "source directory {} does not exist",
                self.source_dir.display()
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "output directory {} does not exist",
                self.output_dir.display()
            )));
        }
        if self.assistant.model.trim().is_empty() {
            return Err(ConfigError::Invalid("assistant model must not be empty".to_string()));
        }
        Ok(())
    }

    /// The subject without surrounding whitespace. Everything derived from the
    /// subject goes through here.
    pub fn subject(&self) -> &str {
        self.subject.trim()
    }

    pub fn lessons(&self) -> &[String] {
        &self.lessons
    }

    /// The request sent to the assistant for this subject and its lessons.
    pub fn prompt(&self) -> Result<String, ConfigError> {
        prompt::compose_from_slice(self.subject(), self.lessons()).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "expected exactly {LESSON_COUNT} lessons, got {}",
                self.lessons.len()
            ))
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.docx", self.subject()))
    }

    pub fn vector_store_name(&self) -> String {
        format!("Planes de materia - {}", self.subject())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &Path) -> PlanConfig {
        PlanConfig {
            source_dir: dir.to_path_buf(),
            output_dir: dir.to_path_buf(),
            ..PlanConfig::default()
        }
    }

    #[test]
    fn defaults_match_the_excel_plan() {
        let config = PlanConfig::default();
        assert_eq!(config.subject, "Introducción al Excel");
        assert_eq!(config.lessons.len(), LESSON_COUNT);
        assert_eq!(config.assistant.model, "gpt-4o");
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(
            config.vector_store_name(),
            "Planes de materia - Introducción al Excel"
        );
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let config = PlanConfig::from_toml_str(
            r#"
            subject = "Power BI"
            output_dir = "out"

            [assistant]
            model = "gpt-4o-mini"
            "#,
            Path::new("plan.toml"),
        )
        .unwrap();

        assert_eq!(config.subject, "Power BI");
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.assistant.name, DEFAULT_ASSISTANT_NAME);
        assert_eq!(config.lessons.len(), LESSON_COUNT);
        assert_eq!(config.output_path(), PathBuf::from("out").join("Power BI.docx"));
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let result = PlanConfig::from_toml_str("subjetc = \"typo\"", Path::new("plan.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PlanConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = PlanConfig::default().apply(Overrides {
            subject: Some("Estadística".to_string()),
            lessons: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            source_dir: Some(PathBuf::from("refs")),
            output_dir: None,
        });

        assert_eq!(config.subject, "Estadística");
        assert_eq!(config.lessons[4], "e");
        assert_eq!(config.source_dir, PathBuf::from("refs"));
        assert_eq!(config.output_dir, PathBuf::from("planes"));
    }

    #[test]
    fn valid_config_passes() {
        let dir = tempfile::tempdir().unwrap();
        valid_config(dir.path()).validate().unwrap();
    }

    #[test]
    fn wrong_lesson_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.lessons.pop();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exactly 5 lessons, got 4"));
    }

    #[test]
    fn blank_lesson_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.lessons[2] = "  ".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lesson 3"));
    }

    #[test]
    fn empty_subject_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.subject = String::new();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn subject_with_separator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.subject = "Excel/Power BI".to_string();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_output_dir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.output_dir = dir.path().join("nope");

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output directory"));
    }

    #[test]
    fn prompt_validation_ignores_directories() {
        let config = PlanConfig {
            source_dir: PathBuf::from("/definitely/not/here"),
            ..PlanConfig::default()
        };
        config.validate_prompt().unwrap();
    }

    #[test]
    fn padded_subject_is_trimmed_everywhere() {
        let config = PlanConfig {
            subject: "  Power BI \n".to_string(),
            output_dir: PathBuf::from("out"),
            ..PlanConfig::default()
        };

        let prompt = config.prompt().unwrap();
        assert!(prompt.starts_with("Propuesta del plan de materia para Power BI:\n"));
        assert_eq!(config.output_path(), PathBuf::from("out").join("Power BI.docx"));
        assert_eq!(config.vector_store_name(), "Planes de materia - Power BI");
    }

    #[test]
    fn prompt_reports_lesson_count() {
        let mut config = PlanConfig::default();
        config.lessons.truncate(3);

        let err = config.prompt().unwrap_err();
        assert_eq!(
            err.to_string(),
            ConfigError::Invalid("expected exactly 5 lessons, got 3".to_string()).to_string()
        );
    }
}
