//! The subject plan request sent to the assistant.

use crate::config::LESSON_COUNT;

/// The eleven sections the assistant is asked to produce, in order. Section 6
/// is followed by the lesson titles.
pub const SECTION_LABELS: [&str; 11] = [
    "JUSTIFICACIÓN DE LA ASIGNATURA (500-1000 tokens)",
    "COMPETENCIA PROPIA DE LA ASIGNATURA",
    "COMPETENCIA GENÉRICA O TRANSVERSAL",
    "Competencias específicas obtenidas (4 principales)",
    "Lista de ELEMENTOS DE COMPETENCIA en línea con la competencia genérica",
    "Títulos de lección o unidad para:",
    "Actividades didácticas para cada lección",
    "SABERES PROCEDIMENTALES para cada elemento",
    "SABERES CONCEPTUALES para cada elemento",
    "SABERES ACTITUDINALES para cada elemento",
    "PERFIL PROFESIONAL del estudiante al finalizar el curso",
];

const LESSONS_SECTION: usize = 5;

/// Builds the plan request for `subject` and its lessons.
///
/// ```
/// use subject_plan::prompt::compose;
///
/// let prompt = compose("Excel", &["a", "b", "c", "d", "e"]);
/// assert!(prompt.starts_with("Propuesta del plan de materia para Excel:"));
/// assert!(prompt.contains("6. Títulos de lección o unidad para:\n- a\n"));
/// ```
pub fn compose<S: AsRef<str>>(subject: &str, lessons: &[S; LESSON_COUNT]) -> String {
    let mut prompt = format!("Propuesta del plan de materia para {subject}:\n");

    for (index, label) in SECTION_LABELS.iter().enumerate() {
        prompt.push_str(&format!("{}. {label}\n", index + 1));
        if index == LESSONS_SECTION {
            for lesson in lessons {
                prompt.push_str(&format!("- {}\n", lesson.as_ref()));
            }
        }
    }

    prompt
}

/// Same as [`compose`] for a slice, which must hold exactly [`LESSON_COUNT`] titles.
pub fn compose_from_slice<S: AsRef<str>>(subject: &str, lessons: &[S]) -> Option<String> {
    let lessons: &[S; LESSON_COUNT] = lessons.try_into().ok()?;
    Some(compose(subject, lessons))
}
