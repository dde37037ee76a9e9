use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{parse_amount, AccountKey, TransactionKind};

use super::Command;

/// Default time a pending question stays open.
pub const DEFAULT_TIMEOUT_SECS: u32 = 300;

/// Multi-step flows a user can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    AddIncome,
    AddExpense,
    Edit,
    Delete,
}

/// What an account's pending flow is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInput {
    AwaitingCategory { kind: TransactionKind },
    AwaitingAmount { kind: TransactionKind, category: String },
    AwaitingEditPosition,
    AwaitingEditAmount { position: usize },
    AwaitingDeletePosition,
}

impl PendingInput {
    fn start(intent: Intent) -> Self {
        match intent {
            Intent::AddIncome => PendingInput::AwaitingCategory {
                kind: TransactionKind::Income,
            },
            Intent::AddExpense => PendingInput::AwaitingCategory {
                kind: TransactionKind::Expense,
            },
            Intent::Edit => PendingInput::AwaitingEditPosition,
            Intent::Delete => PendingInput::AwaitingDeletePosition,
        }
    }

    /// The question to ask for this state.
    pub fn prompt(&self) -> String {
        match self {
            PendingInput::AwaitingCategory { kind } => match kind {
                TransactionKind::Income => "Enter the source of the income:".to_string(),
                TransactionKind::Expense => "Enter what the expense was for:".to_string(),
            },
            PendingInput::AwaitingAmount { kind, category } => {
                let what = kind.as_str().to_lowercase();
                if category.is_empty() {
                    format!("Enter the amount of the {}:", what)
                } else {
                    format!("Enter the amount of the {} for {}:", what, category)
                }
            }
            PendingInput::AwaitingEditPosition => {
                "Enter the number of the entry to edit:".to_string()
            }
            PendingInput::AwaitingEditAmount { position } => {
                format!("Enter the new amount for entry {}:", position)
            }
            PendingInput::AwaitingDeletePosition => {
                "Enter the number of the entry to delete:".to_string()
            }
        }
    }
}

/// Result of feeding one message into a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Input accepted, ask the next question
    Prompt(String),
    /// Input rejected, the same question is asked again
    Retry(String),
    /// All arguments collected
    Ready(Command),
    /// The flow timed out and was dropped
    Expired,
    /// Nothing is pending for this account
    Idle,
}

#[derive(Debug)]
struct Pending {
    state: PendingInput,
    touched_at: DateTime<Utc>,
}

/// Pending multi-step inputs, at most one per account.
#[derive(Debug)]
pub struct Conversations {
    pending: HashMap<AccountKey, Pending>,
    timeout: TimeDelta,
}

impl Default for Conversations {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(i64::from(DEFAULT_TIMEOUT_SECS)))
    }
}

impl Conversations {
    pub fn new(timeout: TimeDelta) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Start a flow for `key`, replacing any flow already pending.
    /// Returns the first question.
    pub fn begin(&mut self, key: &str, intent: Intent, now: DateTime<Utc>) -> String {
        let state = PendingInput::start(intent);
        let prompt = state.prompt();
        self.pending.insert(
            key.to_string(),
            Pending {
                state,
                touched_at: now,
            },
        );
        prompt
    }

    pub fn pending(&self, key: &str) -> Option<&PendingInput> {
        self.pending.get(key).map(|p| &p.state)
    }

    /// Drop the pending flow of `key`. Returns whether there was one.
    pub fn cancel(&mut self, key: &str) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Drop every flow idle for longer than the timeout.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<AccountKey> {
        let timeout = self.timeout;
        let expired: Vec<AccountKey> = self
            .pending
            .iter()
            .filter(|(_, p)| now - p.touched_at > timeout)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.pending.remove(key);
        }
        expired
    }

    /// Feed one message from `key` into its pending flow.
    pub fn feed(&mut self, key: &str, text: &str, now: DateTime<Utc>) -> Step {
        let Some(pending) = self.pending.remove(key) else {
            return Step::Idle;
        };
        if now - pending.touched_at > self.timeout {
            return Step::Expired;
        }

        let text = text.trim();
        let next = match &pending.state {
            PendingInput::AwaitingCategory { kind } => {
                if *kind == TransactionKind::Expense && text.is_empty() {
                    Err("An expense needs a category.".to_string())
                } else {
                    Ok(PendingInput::AwaitingAmount {
                        kind: *kind,
                        category: text.to_string(),
                    })
                }
            }
            PendingInput::AwaitingAmount { kind, category } => match parse_amount(text) {
                Ok(amount) => {
                    return Step::Ready(Command::Record {
                        kind: *kind,
                        category: category.clone(),
                        amount,
                    });
                }
                Err(e) => Err(format!("Invalid amount: {}.", e)),
            },
            PendingInput::AwaitingEditPosition => {
                parse_position(text).map(|position| PendingInput::AwaitingEditAmount { position })
            }
            PendingInput::AwaitingEditAmount { position } => match parse_amount(text) {
                Ok(amount) => {
                    return Step::Ready(Command::Edit {
                        position: *position,
                        amount,
                    });
                }
                Err(e) => Err(format!("Invalid amount: {}.", e)),
            },
            PendingInput::AwaitingDeletePosition => match parse_position(text) {
                Ok(position) => return Step::Ready(Command::Delete { position }),
                Err(message) => Err(message),
            },
        };

        match next {
            Ok(state) => {
                let prompt = state.prompt();
                self.pending.insert(
                    key.to_string(),
                    Pending {
                        state,
                        touched_at: now,
                    },
                );
                Step::Prompt(prompt)
            }
            Err(message) => {
                let retry = format!("{} {}", message, pending.state.prompt());
                self.pending.insert(
                    key.to_string(),
                    Pending {
                        state: pending.state,
                        touched_at: now,
                    },
                );
                Step::Retry(retry)
            }
        }
    }
}

fn parse_position(text: &str) -> Result<usize, String> {
    match text.parse::<usize>() {
        Ok(position) if position > 0 => Ok(position),
        _ => Err(format!("'{}' is not an entry number.", text)),
    }
}
