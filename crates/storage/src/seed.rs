//! Built-in starter catalog used to bootstrap an empty store.

use speakup_core::model::{Exercise, ExerciseDraft, ExerciseError, ExerciseId, ExerciseKind};

struct Entry {
    id: &'static str,
    kind: ExerciseKind,
    question: &'static str,
    options: [&'static str; 4],
    explanation: &'static str,
}

const A1_ENTRIES: [Entry; 5] = [
    Entry {
        id: "a1_001",
        kind: ExerciseKind::MultipleChoice,
        question: "How do you greet someone in the morning?",
        options: ["Good morning", "Good night", "Goodbye", "See you"],
        explanation: "'Good morning' is the standard greeting used in the morning hours.",
    },
    Entry {
        id: "a1_002",
        kind: ExerciseKind::MultipleChoice,
        question: "Which sentence is correct?",
        options: [
            "She is a teacher.",
            "She am a teacher.",
            "She are a teacher.",
            "She be a teacher.",
        ],
        explanation: "For he/she/it we use 'is'. The verb 'to be': I am, You are, He/She/It is.",
    },
    Entry {
        id: "a1_003",
        kind: ExerciseKind::MultipleChoice,
        question: "What does 'Hello, how are you?' mean in common usage?",
        options: [
            "A greeting asking about someone's wellbeing",
            "A farewell expression",
            "A way to say thank you",
            "A question about the weather",
        ],
        explanation: "'Hello, how are you?' is a basic greeting used to acknowledge and check on someone.",
    },
    Entry {
        id: "a1_004",
        kind: ExerciseKind::MultipleChoice,
        question: "Choose the correct response to 'What is your name?'",
        options: [
            "My name is Maria.",
            "I have 20 years.",
            "I am fine, thank you.",
            "Nice to meet you.",
        ],
        explanation: "The answer introduces your name. 'My name is ___' is the standard form.",
    },
    Entry {
        id: "a1_005",
        kind: ExerciseKind::FillInTheBlank,
        question: "Please ___ down.",
        options: ["sit", "sat", "sits", "sitting"],
        explanation: "After 'please', use the base form of the verb. 'Please sit down' is a polite invitation.",
    },
];

/// The five A1 starter exercises. Every entry's correct option is the first.
///
/// # Errors
///
/// Returns `ExerciseError` if an entry fails validation.
pub fn starter_catalog() -> Result<Vec<Exercise>, ExerciseError> {
    A1_ENTRIES
        .iter()
        .map(|entry| {
            ExerciseDraft {
                id: ExerciseId::new(entry.id),
                level: "A1".to_owned(),
                kind: entry.kind,
                prompt: entry.question.to_owned(),
                options: entry.options.iter().map(|o| (*o).to_owned()).collect(),
                correct_option_index: 0,
                explanation: entry.explanation.to_owned(),
            }
            .validate()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn starter_catalog_is_valid_and_unique() {
        let catalog = starter_catalog().unwrap();
        assert_eq!(catalog.len(), 5);
        let ids: HashSet<_> = catalog.iter().map(|e| e.id().clone()).collect();
        assert_eq!(ids.len(), 5);
        assert!(catalog.iter().all(|e| e.level() == "A1" && e.options().len() == 4));
    }
}
