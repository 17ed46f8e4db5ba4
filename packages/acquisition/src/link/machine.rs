use statig::blocking::IntoStateMachineExt as _;
use statig::prelude::*;

use super::{LinkState, LinkTransition};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    AttachRequested,
    AttemptFailed,
    LinkAcquired,
    AttachExhausted,
    LinkLost,
    BackoffElapsed,
}

impl LinkEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AttachRequested => "attach_requested",
            Self::AttemptFailed => "attempt_failed",
            Self::LinkAcquired => "link_acquired",
            Self::AttachExhausted => "attach_exhausted",
            Self::LinkLost => "link_lost",
            Self::BackoffElapsed => "backoff_elapsed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkApplyStatus {
    Unchanged,
    Applied,
    InvalidTransition,
}

#[derive(Clone, Copy, Debug)]
pub struct LinkApplyResult {
    pub before: LinkState,
    pub after: LinkState,
    pub status: LinkApplyStatus,
}

impl LinkApplyResult {
    pub fn changed(self) -> bool {
        matches!(self.status, LinkApplyStatus::Applied)
    }

    pub fn transition(self, trigger: &'static str) -> Option<LinkTransition> {
        self.changed().then_some(LinkTransition {
            from: self.before,
            to: self.after,
            trigger,
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct LinkMachine {
    state: LinkState,
    attempts: u8,
}

#[derive(Clone, Copy, Debug)]
struct DispatchContext {
    status: LinkApplyStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: LinkApplyStatus::Unchanged,
        }
    }
}

impl LinkMachine {
    fn enter(&mut self, context: &mut DispatchContext, state: LinkState) {
        self.state = state;
        context.status = LinkApplyStatus::Applied;
    }

    fn reject(context: &mut DispatchContext) -> Outcome<State> {
        context.status = LinkApplyStatus::InvalidTransition;
        Handled
    }
}

#[state_machine(initial = "State::disconnected()")]
impl LinkMachine {
    #[state]
    fn disconnected(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::AttachRequested => {
                self.attempts = 0;
                self.enter(context, LinkState::Connecting);
                Transition(State::connecting())
            }
            LinkEvent::LinkLost => Handled,
            _ => Self::reject(context),
        }
    }

    #[state]
    fn connecting(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::AttemptFailed => {
                self.attempts = self.attempts.saturating_add(1);
                Handled
            }
            LinkEvent::LinkAcquired => {
                self.enter(context, LinkState::Connected);
                Transition(State::connected())
            }
            LinkEvent::AttachExhausted => {
                self.enter(context, LinkState::Failed);
                Transition(State::failed())
            }
            LinkEvent::AttachRequested => Handled,
            _ => Self::reject(context),
        }
    }

    #[state]
    fn connected(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::LinkLost => {
                self.enter(context, LinkState::Disconnected);
                Transition(State::disconnected())
            }
            LinkEvent::AttachRequested => Handled,
            _ => Self::reject(context),
        }
    }

    #[state]
    fn failed(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::BackoffElapsed => {
                self.attempts = 0;
                self.enter(context, LinkState::Connecting);
                Transition(State::connecting())
            }
            _ => Self::reject(context),
        }
    }
}

/// Link state machine behind an apply/result wrapper.
pub struct LinkEngine {
    machine: statig::blocking::StateMachine<LinkMachine>,
}

impl Default for LinkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEngine {
    pub fn new() -> Self {
        Self {
            machine: LinkMachine {
                state: LinkState::Disconnected,
                attempts: 0,
            }
            .state_machine(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.machine.inner().state
    }

    /// Failed attempts in the current connecting episode.
    pub fn attempts(&self) -> u8 {
        self.machine.inner().attempts
    }

    pub fn apply(&mut self, event: LinkEvent) -> LinkApplyResult {
        let before = self.state();
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        LinkApplyResult {
            before,
            after: self.state(),
            status: context.status,
        }
    }
}
