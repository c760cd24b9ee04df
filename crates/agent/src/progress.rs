//! Conversation progress through a script
//!
//! Progress is derived from the transcript on every turn and never stored:
//! `current = min(user_turns + 1, len)` and `completed = user_turns >= len`.
//! Only user turns count; assistant turns never move the script.

use serde::Serialize;

use counselor_core::{FieldKind, Question, Script, Transcript};

/// Where the conversation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 1-based ordinal of the question being asked (0 for an empty script)
    pub current: usize,
    /// Every question has been answered
    pub completed: bool,
}

/// Compute progress from the transcript
///
/// An empty script is complete from the start.
pub fn advance(transcript: &Transcript, script: &Script) -> Progress {
    let len = script.len();
    if len == 0 {
        return Progress {
            current: 0,
            completed: true,
        };
    }

    let user_turns = transcript.user_turn_count();
    Progress {
        current: (user_turns + 1).min(len),
        completed: user_turns >= len,
    }
}

/// Parser family for the question at `ordinal`
pub fn parser_for(script: &Script, ordinal: usize) -> Option<FieldKind> {
    script.question(ordinal).map(Question::kind)
}

/// The question the most recent user turn answers
///
/// Call after appending the user turn. Uses the ordinal that was current
/// before the turn, `min(user_turns, len)`. Returns `None` before any user
/// turn and for turns arriving after the script was already complete.
pub fn answered_question<'a>(transcript: &Transcript, script: &'a Script) -> Option<&'a Question> {
    let user_turns = transcript.user_turn_count();
    if user_turns == 0 || user_turns > script.len() {
        return None;
    }
    script.question(user_turns.min(script.len()))
}

/// The question still waiting for an answer, if any
pub fn pending_question<'a>(transcript: &Transcript, script: &'a Script) -> Option<&'a Question> {
    let progress = advance(transcript, script);
    if progress.completed {
        return None;
    }
    script.question(progress.current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use counselor_core::{FieldName, Turn};

    fn transcript_with(user_turns: usize) -> Transcript {
        let mut transcript = Transcript::new();
        for i in 0..user_turns {
            transcript.push(Turn::assistant(format!("pregunta {}", i + 1)));
            transcript.push(Turn::user(format!("respuesta {}", i + 1)));
        }
        transcript
    }

    #[test]
    fn test_progress_before_completion() {
        let script = Script::financial_profile();
        let n = script.len();
        for k in 0..n {
            let progress = advance(&transcript_with(k), &script);
            assert_eq!(progress.current, k + 1);
            assert!(!progress.completed);
        }
    }

    #[test]
    fn test_progress_at_and_after_completion() {
        let script = Script::budget();
        let n = script.len();
        for k in n..n + 3 {
            let progress = advance(&transcript_with(k), &script);
            assert_eq!(progress.current, n);
            assert!(progress.completed);
        }
    }

    #[test]
    fn test_assistant_turns_do_not_count() {
        let script = Script::budget();
        let mut transcript = Transcript::new();
        transcript.push(Turn::assistant("hola"));
        transcript.push(Turn::assistant("¿Cuánto recibes al mes?"));
        assert_eq!(advance(&transcript, &script).current, 1);
    }

    #[test]
    fn test_empty_script_is_complete() {
        let script = Script::new::<_, String>("empty", Vec::new()).unwrap();
        let progress = advance(&Transcript::new(), &script);
        assert_eq!(progress, Progress { current: 0, completed: true });
        assert!(answered_question(&transcript_with(1), &script).is_none());
        assert!(pending_question(&Transcript::new(), &script).is_none());
    }

    #[test]
    fn test_answered_question_uses_pre_advance_ordinal() {
        let script = Script::financial_profile();

        assert!(answered_question(&transcript_with(0), &script).is_none());

        // First answer goes to question 1 even though progress already moved to 2
        let transcript = transcript_with(1);
        assert_eq!(advance(&transcript, &script).current, 2);
        let answered = answered_question(&transcript, &script).unwrap();
        assert_eq!(answered.ordinal, 1);
        assert_eq!(answered.field, FieldName::FullName);

        let transcript = transcript_with(script.len());
        assert_eq!(
            answered_question(&transcript, &script).map(|q| q.field),
            Some(FieldName::MonthlyIncome)
        );

        assert!(answered_question(&transcript_with(script.len() + 1), &script).is_none());
    }

    #[test]
    fn test_parser_for() {
        let script = Script::financial_profile();
        assert_eq!(parser_for(&script, 2), Some(FieldKind::Age));
        assert_eq!(parser_for(&script, 3), Some(FieldKind::MaritalStatus));
        assert_eq!(parser_for(&script, 0), None);
        assert_eq!(parser_for(&script, 99), None);
    }

    #[test]
    fn test_pending_question() {
        let script = Script::budget();
        assert_eq!(
            pending_question(&transcript_with(2), &script).map(|q| q.ordinal),
            Some(3)
        );
        assert!(pending_question(&transcript_with(6), &script).is_none());
    }
}
