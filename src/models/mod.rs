pub mod event;
pub mod ticket;
pub mod user;

pub use event::{Event, EventUpdate, NewEvent};
pub use ticket::{
    CustomFieldKey, EnrichedTicket, NewTicket, Ticket, TicketFilter, TicketScan, TicketUpdate,
    DEFAULT_MAX_SCAN_COUNT,
};
pub use user::{User, UserUpdate};
