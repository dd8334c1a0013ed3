//! Per-transaction execution context.

use crate::collaborators::PaymentRouter;
use crate::events::{Event, EventLog};
use crate::ledger::Ledger;
use crate::types::BlockHeight;

/// Everything a transaction may touch outside the entity it runs on.
///
/// All deadline checks compare against `block`, so two calls in the same block
/// observe identical deadlines.
pub struct TxContext<'a> {
    pub block: BlockHeight,
    pub ledger: &'a mut Ledger,
    pub router: &'a dyn PaymentRouter,
    pub events: &'a mut EventLog,
}

impl<'a> TxContext<'a> {
    pub fn emit(&mut self, event: Event) {
        self.events.emit(event);
    }
}
