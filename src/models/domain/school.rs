//! Records owned by the wider school backend. The exam subsystem only reads them.

use serde::{Deserialize, Serialize};

use crate::models::domain::exam_definition::Term;

/// Result-setting component key that carries the objective (CBT) paper weight.
pub const OBJECTIVE_COMPONENT_KEY: &str = "obj";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TermInfo {
    pub name: Term,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AcademicSession {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub terms: Vec<TermInfo>,
}

impl AcademicSession {
    pub fn is_term_active(&self, term: Term) -> bool {
        self.is_active && self.terms.iter().any(|t| t.name == term && t.is_active)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct TeacherSubjectAssignment {
    pub subject_id: String,
    pub teacher_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchoolClass {
    pub id: String,
    pub name: String,
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_teacher_id: Option<String>,
    #[serde(default)]
    pub compulsory_subjects: Vec<String>,
    #[serde(default)]
    pub teacher_subject_assignments: Vec<TeacherSubjectAssignment>,
}

impl SchoolClass {
    pub fn offers_subject(&self, subject_id: &str) -> bool {
        self.compulsory_subjects.iter().any(|s| s == subject_id)
    }

    pub fn subject_teacher(&self, subject_id: &str) -> Option<&str> {
        self.teacher_subject_assignments
            .iter()
            .find(|a| a.subject_id == subject_id)
            .map(|a| a.teacher_id.as_str())
    }

    pub fn is_class_teacher(&self, teacher_id: &str) -> bool {
        self.class_teacher_id.as_deref() == Some(teacher_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassEnrolment {
    pub id: String,
    pub class_id: String,
    pub academic_session_id: String,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl ClassEnrolment {
    pub fn is_enrolled(&self, student_id: &str) -> bool {
        self.is_active && self.students.iter().any(|s| s == student_id)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResultComponent {
    pub key: String,
    pub name: String,
    /// Share of the subject's total grade, in percent.
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ExamComponents {
    pub exam_name: String,
    #[serde(default)]
    pub components: Vec<ResultComponent>,
}

/// Grading layout configured per class level.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ResultSetting {
    pub level: String,
    pub exam_components: ExamComponents,
}

impl ResultSetting {
    pub fn objective_component(&self) -> Option<&ResultComponent> {
        self.exam_components
            .components
            .iter()
            .find(|c| c.key == OBJECTIVE_COMPONENT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_activity_requires_active_session() {
        let mut session = AcademicSession {
            id: "sess".into(),
            name: "2030/2031".into(),
            is_active: true,
            terms: vec![
                TermInfo { name: Term::FirstTerm, is_active: true },
                TermInfo { name: Term::SecondTerm, is_active: false },
            ],
        };
        assert!(session.is_term_active(Term::FirstTerm));
        assert!(!session.is_term_active(Term::SecondTerm));
        assert!(!session.is_term_active(Term::ThirdTerm));

        session.is_active = false;
        assert!(!session.is_term_active(Term::FirstTerm));
    }

    #[test]
    fn class_lookups() {
        let class = SchoolClass {
            id: "c1".into(),
            name: "JSS 1A".into(),
            level: "jss1".into(),
            class_teacher_id: Some("t-class".into()),
            compulsory_subjects: vec!["math".into(), "english".into()],
            teacher_subject_assignments: vec![TeacherSubjectAssignment {
                subject_id: "math".into(),
                teacher_id: "t-math".into(),
            }],
        };

        assert!(class.offers_subject("english"));
        assert!(!class.offers_subject("physics"));
        assert_eq!(class.subject_teacher("math"), Some("t-math"));
        assert_eq!(class.subject_teacher("english"), None);
        assert!(class.is_class_teacher("t-class"));
        assert!(!class.is_class_teacher("t-math"));
    }

    #[test]
    fn objective_component_is_found_by_key() {
        let setting = ResultSetting {
            level: "jss1".into(),
            exam_components: ExamComponents {
                exam_name: "Examination".into(),
                components: vec![
                    ResultComponent { key: "theory".into(), name: "Theory".into(), percentage: 30.0 },
                    ResultComponent { key: "obj".into(), name: "Objective".into(), percentage: 40.0 },
                ],
            },
        };
        assert_eq!(setting.objective_component().map(|c| c.percentage), Some(40.0));
    }
}
