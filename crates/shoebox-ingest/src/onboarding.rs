//! Onboarding state machine.
//!
//! Steps advance in a fixed forward-only order; `completed` is absorbing.
//! The machine observes every accepted inbound message independently of
//! normal tag processing, and each transition may carry an outbound nudge.
//! Delivery failures never block a transition.

use shoebox_types::models::OnboardingStep;

/// What the machine sees of one inbound message.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    /// Resolved tag set contains something other than the sentinel.
    pub has_real_tags: bool,
    /// Content contains an http(s) URL.
    pub has_link: bool,
}

/// One fired transition: the step entered, and the nudge to send (best
/// effort) on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: OnboardingStep,
    pub nudge: Option<&'static str>,
}

pub const WELCOME_TEXT: &str = "Welcome to Shoebox! Text anything here to save it. \
    Add a hashtag like #ideas to file it onto a board.";

const FIRST_TEXT_NUDGE: &str = "Saved! Try adding a hashtag like #recipes to your next \
    text to organize it onto a board.";

const FIRST_HASHTAG_NUDGE: &str = "Nice, that's on its board now. You can also text links \
    — we'll keep them with the same tags.";

const COMPLETED_NUDGE: &str = "You're all set. Everything you text here lands on your boards.";

/// Transition table, `(step, observation) -> fired transitions`.
///
/// At most one durable advance per observed message, except that
/// `first_link` is transient: entering it immediately yields `completed`,
/// so both transitions fire from one observation. Guards are evaluated
/// against the step the user held when the message arrived.
pub fn advance(step: OnboardingStep, obs: Observation) -> Vec<Transition> {
    match step {
        OnboardingStep::WelcomeSent => vec![Transition {
            to: OnboardingStep::FirstText,
            nudge: Some(FIRST_TEXT_NUDGE),
        }],
        OnboardingStep::FirstText if obs.has_real_tags => vec![Transition {
            to: OnboardingStep::FirstHashtag,
            nudge: Some(FIRST_HASHTAG_NUDGE),
        }],
        OnboardingStep::FirstHashtag if obs.has_link => vec![
            Transition {
                to: OnboardingStep::FirstLink,
                nudge: None,
            },
            Transition {
                to: OnboardingStep::Completed,
                nudge: Some(COMPLETED_NUDGE),
            },
        ],
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: Observation = Observation {
        has_real_tags: false,
        has_link: false,
    };
    const TAGGED: Observation = Observation {
        has_real_tags: true,
        has_link: false,
    };
    const LINKED: Observation = Observation {
        has_real_tags: false,
        has_link: true,
    };

    fn last_step(step: OnboardingStep, obs: Observation) -> OnboardingStep {
        advance(step, obs).last().map_or(step, |t| t.to)
    }

    #[test]
    fn any_message_advances_welcome() {
        assert_eq!(last_step(OnboardingStep::WelcomeSent, PLAIN), OnboardingStep::FirstText);
        assert_eq!(last_step(OnboardingStep::WelcomeSent, TAGGED), OnboardingStep::FirstText);
    }

    #[test]
    fn first_text_needs_real_tags() {
        assert_eq!(last_step(OnboardingStep::FirstText, PLAIN), OnboardingStep::FirstText);
        assert_eq!(last_step(OnboardingStep::FirstText, LINKED), OnboardingStep::FirstText);
        assert_eq!(last_step(OnboardingStep::FirstText, TAGGED), OnboardingStep::FirstHashtag);
    }

    #[test]
    fn first_link_is_transient() {
        let fired = advance(OnboardingStep::FirstHashtag, LINKED);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].to, OnboardingStep::FirstLink);
        assert_eq!(fired[1].to, OnboardingStep::Completed);
        assert!(fired[1].nudge.is_some());
    }

    #[test]
    fn first_hashtag_without_link_holds() {
        assert_eq!(last_step(OnboardingStep::FirstHashtag, TAGGED), OnboardingStep::FirstHashtag);
    }

    #[test]
    fn completed_is_absorbing() {
        for obs in [PLAIN, TAGGED, LINKED] {
            assert!(advance(OnboardingStep::Completed, obs).is_empty());
        }
    }

    #[test]
    fn steps_never_regress() {
        // Exhaustive: every fired transition moves strictly forward.
        let steps = [
            OnboardingStep::WelcomeSent,
            OnboardingStep::FirstText,
            OnboardingStep::FirstHashtag,
            OnboardingStep::FirstLink,
            OnboardingStep::Completed,
        ];
        for step in steps {
            for obs in [PLAIN, TAGGED, LINKED] {
                let mut current = step;
                for t in advance(step, obs) {
                    assert!(t.to > current);
                    current = t.to;
                }
            }
        }
    }
}
