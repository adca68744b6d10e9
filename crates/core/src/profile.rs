//! Profile completeness, as shown on the intake forms.

use serde::Serialize;
use serde_json::Value;

/// What a schema section requires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// Every listed field must be filled.
    Fields(Vec<Field>),
    /// The array stored under `key` must not be empty. The whole section
    /// counts as a single item.
    List(Field),
}

/// A required profile field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    /// Key in the flat profile record.
    pub key: String,
    /// Label shown when the field is missing.
    pub label: String,
}

impl Field {
    /// Creates a field.
    #[inline]
    pub fn new<S1: Into<String>, S2: Into<String>>(key: S1, label: S2) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// A named group of requirements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    /// Section heading.
    pub name: String,
    /// What the section requires.
    pub requirement: Requirement,
}

/// Describes which parts of a profile are required.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileSchema {
    sections: Vec<Section>,
}

impl ProfileSchema {
    /// Creates an empty schema.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a section of scalar fields, given as `(key, label)` pairs.
    pub fn with_fields<S, I, K, L>(mut self, name: S, fields: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (K, L)>,
        K: Into<String>,
        L: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, label)| Field::new(key, label))
            .collect();
        self.sections.push(Section {
            name: name.into(),
            requirement: Requirement::Fields(fields),
        });
        self
    }

    /// Adds an array-valued section.
    pub fn with_list<S, K, L>(mut self, name: S, key: K, label: L) -> Self
    where
        S: Into<String>,
        K: Into<String>,
        L: Into<String>,
    {
        self.sections.push(Section {
            name: name.into(),
            requirement: Requirement::List(Field::new(key, label)),
        });
        self
    }

    /// Returns the sections in display order.
    #[inline]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The schema used by the admissions intake forms.
    pub fn admissions() -> Self {
        Self::new()
            .with_fields(
                "Basic information",
                [
                    ("full_name", "Full name"),
                    ("email", "Email"),
                    ("high_school", "High school"),
                    ("graduation_year", "Graduation year"),
                    ("state", "State of residence"),
                ],
            )
            .with_fields(
                "Academics",
                [
                    ("gpa", "GPA"),
                    ("course_rigor", "Course rigor"),
                    ("test_scores", "Test scores"),
                ],
            )
            .with_fields(
                "Goals",
                [
                    ("intended_major", "Intended major"),
                    ("college_preferences", "College preferences"),
                ],
            )
            .with_list("Activities", "extracurriculars", "Extracurricular activities")
            .with_list("Awards", "awards", "Awards and honors")
    }
}

/// How complete a profile is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// `filled / total`, rounded to a whole percent.
    pub percentage: u8,
    /// Number of filled items.
    pub filled: usize,
    /// Number of required items.
    pub total: usize,
    /// Labels of the missing items, in schema order.
    pub missing_labels: Vec<String>,
}

/// Computes how much of `profile` the schema considers filled.
///
/// A field is filled when it's present and not null, a blank string or an
/// empty array. An empty schema is complete.
pub fn profile_completion(profile: &Value, schema: &ProfileSchema) -> Completion {
    let mut filled = 0;
    let mut total = 0;
    let mut missing_labels = vec![];

    let mut check = |field: &Field| {
        total += 1;
        if is_filled(profile.get(&field.key)) {
            filled += 1;
        } else {
            missing_labels.push(field.label.clone());
        }
    };

    for section in schema.sections() {
        match &section.requirement {
            Requirement::Fields(fields) => fields.iter().for_each(&mut check),
            Requirement::List(field) => check(field),
        }
    }

    let percentage = if total == 0 {
        100
    } else {
        ((filled as f64 / total as f64) * 100.0).round() as u8
    };
    Completion {
        percentage,
        filled,
        total,
        missing_labels,
    }
}

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => true,
    }
}
