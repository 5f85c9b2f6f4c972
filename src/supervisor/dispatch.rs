use crate::listener::{InteractionsListener, ResultStyle};
use crate::supervisor::error::SupervisorError;
use crate::worker::EvalOutcome;

/// Maps one evaluation outcome onto exactly one interactions notification.
///
/// `Busy` and `UnexpectedFault` are contract violations, not results: the
/// listener is first told the call returned void so the interaction can
/// close cleanly, then the violation is raised to the caller.
pub(crate) fn dispatch(
    outcome: EvalOutcome,
    listener: &dyn InteractionsListener,
) -> Result<(), SupervisorError> {
    match outcome {
        EvalOutcome::NoValue => listener.returned_void(),
        EvalOutcome::Object(text) => listener.returned_result(&text, ResultStyle::Object),
        EvalOutcome::Boolean(value) => {
            let text = if value { "true" } else { "false" };
            listener.returned_result(text, ResultStyle::Object);
        }
        EvalOutcome::Number(text) => listener.returned_result(&text, ResultStyle::Number),
        EvalOutcome::Str(text) => {
            listener.returned_result(&format!("\"{text}\""), ResultStyle::String);
        }
        EvalOutcome::Char(c) => listener.returned_result(&format!("'{c}'"), ResultStyle::Character),
        EvalOutcome::Exception(message) => listener.threw_exception(&message),
        EvalOutcome::Busy => {
            listener.returned_void();
            return Err(SupervisorError::WorkerBusy);
        }
        EvalOutcome::UnexpectedFault(cause) => {
            listener.returned_void();
            return Err(SupervisorError::WorkerFault(cause));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::listener::recorder::{Note, Recorder};

    use super::*;

    #[test]
    fn void_and_value_outcomes_notify_once() {
        let recorder = Recorder::default();

        dispatch(EvalOutcome::NoValue, &recorder).unwrap();
        dispatch(EvalOutcome::Object("Pair(1, 2)".to_owned()), &recorder).unwrap();
        dispatch(EvalOutcome::Number("42".to_owned()), &recorder).unwrap();

        assert_eq!(
            vec![
                Note::Void,
                Note::Result("Pair(1, 2)".to_owned(), ResultStyle::Object),
                Note::Result("42".to_owned(), ResultStyle::Number),
            ],
            recorder.taken()
        );
    }

    #[test]
    fn strings_are_double_quoted_and_chars_single_quoted() {
        let recorder = Recorder::default();

        dispatch(EvalOutcome::Str("hi".to_owned()), &recorder).unwrap();
        dispatch(EvalOutcome::Char('x'), &recorder).unwrap();

        assert_eq!(
            vec![
                Note::Result("\"hi\"".to_owned(), ResultStyle::String),
                Note::Result("'x'".to_owned(), ResultStyle::Character),
            ],
            recorder.taken()
        );
    }

    #[test]
    fn booleans_render_under_the_object_style() {
        let recorder = Recorder::default();

        dispatch(EvalOutcome::Boolean(true), &recorder).unwrap();
        dispatch(EvalOutcome::Boolean(false), &recorder).unwrap();

        assert_eq!(
            vec![
                Note::Result("true".to_owned(), ResultStyle::Object),
                Note::Result("false".to_owned(), ResultStyle::Object),
            ],
            recorder.taken()
        );
    }

    #[test]
    fn exceptions_carry_their_message() {
        let recorder = Recorder::default();

        dispatch(EvalOutcome::Exception("boom".to_owned()), &recorder).unwrap();

        assert_eq!(vec![Note::Exception("boom".to_owned())], recorder.taken());
    }

    #[test]
    fn busy_notifies_void_then_raises() {
        let recorder = Recorder::default();

        let result = dispatch(EvalOutcome::Busy, &recorder);

        assert_matches!(result, Err(SupervisorError::WorkerBusy));
        assert_eq!(vec![Note::Void], recorder.taken());
    }

    #[test]
    fn unexpected_fault_notifies_void_then_raises() {
        let recorder = Recorder::default();

        let result = dispatch(EvalOutcome::UnexpectedFault("heap gone".to_owned()), &recorder);

        assert_matches!(result, Err(SupervisorError::WorkerFault(cause)) if cause == "heap gone");
        assert_eq!(vec![Note::Void], recorder.taken());
    }
}
