//! Ordered conversation transcript
//!
//! Append-only apart from in-place content updates of existing turns and a
//! full reset. Readers only ever get copies.

mod turn;

pub use turn::{Speaker, Turn, TurnId, TurnStamp, TurnStatus};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Turn not found: {0}")]
    NotFound(TurnId),
    #[error("Turn {0} is still pending, cannot add another pending turn")]
    PendingTurnExists(TurnId),
}

/// The ordered list of turns
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn to the end.
    ///
    /// At most one turn may be pending at a time.
    pub fn append(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        if turn.is_pending() {
            if let Some(existing) = self.pending() {
                return Err(TranscriptError::PendingTurnExists(existing.id.clone()));
            }
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Replace the text of a turn
    pub fn update_text(&mut self, id: &TurnId, text: &str) -> Result<(), TranscriptError> {
        let turn = self.find_mut(id)?;
        if turn.text != text {
            text.clone_into(&mut turn.text);
        }
        Ok(())
    }

    /// Mark a turn as fully received
    pub fn finalize(&mut self, id: &TurnId) -> Result<(), TranscriptError> {
        self.find_mut(id)?.status = TurnStatus::Complete;
        Ok(())
    }

    /// Mark a turn whose stream broke off
    pub fn mark_failed(&mut self, id: &TurnId) -> Result<(), TranscriptError> {
        self.find_mut(id)?.status = TurnStatus::Failed;
        Ok(())
    }

    /// Replace everything with a single seed turn
    pub fn reset(&mut self, seed: Turn) {
        self.turns.clear();
        self.turns.push(seed);
    }

    /// Copy of the turns in display order
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn get(&self, id: &TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| &t.id == id)
    }

    /// The outstanding pending turn, if any
    pub fn pending(&self) -> Option<&Turn> {
        self.turns.iter().find(|t| t.is_pending())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    fn find_mut(&mut self, id: &TurnId) -> Result<&mut Turn, TranscriptError> {
        self.turns
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| TranscriptError::NotFound(id.clone()))
    }
}
