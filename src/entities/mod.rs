// Entity Models
//
// Bank and Loan carry a RecordId (persisted or pending) and are owned by an appraiser.
// Every store call names that appraiser explicitly through ActorId.

pub mod actor;
pub mod bank;
pub mod loan;

pub use actor::ActorId;
pub use bank::Bank;
pub use loan::{Loan, UNKNOWN_BANK};
